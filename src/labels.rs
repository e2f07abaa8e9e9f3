//! Emotion label vocabulary and the decision policy that turns a per-label
//! probability vector into the emotion tags shown to the user.

use std::{collections::HashSet, fmt, fs, path::Path};

use thiserror::Error;

pub const DEFAULT_THRESHOLD: f32 = 0.45;

/// Number of labels picked when nothing clears the threshold.
pub const FALLBACK_TOP_K: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("label vocabulary not found at {0}")]
    MissingVocabulary(String),
    #[error("failed to read label vocabulary {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("label vocabulary is empty")]
    EmptyVocabulary,
    #[error("blank label on line {line} of vocabulary")]
    BlankLabel { line: usize },
    #[error("duplicate label '{0}' in vocabulary")]
    DuplicateLabel(String),
    #[error("label vocabulary has {vocabulary} entries but the model emits {model} scores")]
    DimensionMismatch { vocabulary: usize, model: usize },
    #[error("threshold must be a finite value in (0, 1], got {0}")]
    InvalidThreshold(f32),
    #[error("score {score} at index {index} is outside [0, 1]")]
    InvalidScore { index: usize, score: f32 },
}

/// Ordered emotion names; position `i` names score `i` of every probability vector.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVocabulary {
    names: Vec<String>,
}

impl LabelVocabulary {
    pub fn new<I, S>(names: I) -> Result<Self, LabelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(LabelError::EmptyVocabulary);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(LabelError::DuplicateLabel(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// One label per line, surrounding whitespace trimmed.
    ///
    /// Blank lines are only tolerated at the end of the file; a blank line
    /// between labels would shift every later index.
    pub fn from_file(path: &Path) -> Result<Self, LabelError> {
        if !path.exists() {
            return Err(LabelError::MissingVocabulary(path.display().to_string()));
        }
        let raw = fs::read_to_string(path).map_err(|e| LabelError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut lines: Vec<&str> = raw.lines().map(str::trim).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        if let Some(blank) = lines.iter().position(|line| line.is_empty()) {
            return Err(LabelError::BlankLabel { line: blank + 1 });
        }
        Self::new(lines)
    }

    /// Fails unless the vocabulary covers exactly `model_labels` outputs.
    pub fn ensure_aligned(&self, model_labels: usize) -> Result<(), LabelError> {
        if self.names.len() != model_labels {
            return Err(LabelError::DimensionMismatch {
                vocabulary: self.names.len(),
                model: model_labels,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionThreshold(f32);

impl DecisionThreshold {
    pub fn new(value: f32) -> Result<Self, LabelError> {
        if !value.is_finite() || value <= 0.0 || value > 1.0 {
            return Err(LabelError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for DecisionThreshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl fmt::Display for DecisionThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Picks label indices from one probability vector.
///
/// Every index scoring at or above the threshold is returned in vocabulary
/// order. When none qualifies, the `FALLBACK_TOP_K` best scores are returned
/// instead, highest first, with ties going to the lower index. Scores must be
/// finite and inside `[0, 1]`.
pub fn select_labels(
    probs: &[f32],
    threshold: DecisionThreshold,
) -> Result<Vec<usize>, LabelError> {
    for (index, &score) in probs.iter().enumerate() {
        if !(0.0..=1.0).contains(&score) {
            return Err(LabelError::InvalidScore { index, score });
        }
    }

    let above: Vec<usize> = probs
        .iter()
        .enumerate()
        .filter(|(_, &score)| score >= threshold.value())
        .map(|(index, _)| index)
        .collect();
    if !above.is_empty() {
        return Ok(above);
    }

    let mut ranked: Vec<usize> = (0..probs.len()).collect();
    // Stable sort keeps lower indices first among equal scores.
    ranked.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    ranked.truncate(FALLBACK_TOP_K);
    Ok(ranked)
}
