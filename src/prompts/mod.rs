/// Rendered in place of the emotion list when the classifier picked nothing.
pub const NO_EMOTION_PHRASE: &str = "no clear emotion detected";

const GUARDRAILS: &[&str] = &[
    "Be empathetic, calm, warm, and understanding.",
    "DO NOT give medical, legal, or professional advice.",
    "Encourage emotional awareness, grounding, and safe thinking.",
    "Avoid telling them what to do directly.",
    "Avoid diagnosing anything.",
    "Keep responses supportive and human-like.",
    "If the user expresses dangerous intent (self-harm, harm to others), express care and \
     gently encourage reaching out to trusted people or emergency services.",
];

/// Builds the instruction sent to the response generator.
///
/// Pure and infallible: the same `(text, labels)` always renders the same string.
pub fn build_prompt<S: AsRef<str>>(text: &str, labels: &[S]) -> String {
    let emotions = if labels.is_empty() {
        NO_EMOTION_PHRASE.to_string()
    } else {
        labels
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::with_capacity(text.len() + 768);
    out.push_str("You are an empathetic mental-health AI assistant.\n\n");
    out.push_str(&format!("The user's detected emotions are: {emotions}.\n"));
    out.push_str(&format!("Their message: \"{text}\"\n\n"));
    out.push_str("Your task:\n");
    for rule in GUARDRAILS {
        out.push_str("- ");
        out.push_str(rule);
        out.push('\n');
    }
    out.push_str("\nNow generate a compassionate response to the user.");

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_labels_use_fallback_phrase() {
        let prompt = build_prompt::<&str>("hello", &[]);
        assert!(prompt.contains("The user's detected emotions are: no clear emotion detected."));
        assert!(prompt.contains("Their message: \"hello\""));
    }

    #[test]
    fn labels_are_comma_joined_in_order() {
        let prompt = build_prompt("I miss her", &["sadness", "grief"]);
        assert!(prompt.contains("detected emotions are: sadness, grief."));
        assert!(!prompt.contains(NO_EMOTION_PHRASE));
    }

    #[test]
    fn deterministic() {
        let labels = vec!["joy".to_string(), "relief".to_string()];
        assert_eq!(
            build_prompt("finally done", &labels),
            build_prompt("finally done", &labels)
        );
    }

    #[test]
    fn carries_guardrails() {
        let prompt = build_prompt("", &["fear"]);
        assert!(prompt.starts_with("You are an empathetic mental-health AI assistant."));
        assert!(prompt.contains("DO NOT give medical, legal, or professional advice."));
        assert!(prompt.contains("self-harm, harm to others"));
        assert!(prompt.ends_with("Now generate a compassionate response to the user."));
    }
}
