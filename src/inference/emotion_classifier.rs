use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use super::{device::select_device, xlm_roberta, EmotionScorer, XlmRobertaScorer};
use crate::config::ClassifierConfig;
use crate::labels::{select_labels, DecisionThreshold, LabelVocabulary};

/// Emotions picked for one input text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionResult {
    pub text: String,
    pub emotions: Vec<String>,
    /// Score of each entry in `emotions`, same order.
    pub probs: Vec<f32>,
}

/// Long-lived classifier service: model, vocabulary and threshold are fixed at
/// construction and shared read-only by every request.
pub struct EmotionClassifier {
    scorer: Box<dyn EmotionScorer>,
    vocabulary: LabelVocabulary,
    threshold: DecisionThreshold,
}

impl EmotionClassifier {
    /// Fails if the vocabulary does not cover exactly the model's outputs.
    pub fn new(
        scorer: Box<dyn EmotionScorer>,
        vocabulary: LabelVocabulary,
        threshold: DecisionThreshold,
    ) -> Result<Self> {
        vocabulary.ensure_aligned(scorer.num_labels())?;
        Ok(Self {
            scorer,
            vocabulary,
            threshold,
        })
    }

    /// Loads vocabulary and weights. Blocking and slow; call once at startup.
    pub fn load(cfg: &ClassifierConfig) -> Result<Self> {
        let vocabulary = LabelVocabulary::from_file(&cfg.labels_path)
            .with_context(|| format!("loading labels from {}", cfg.labels_path.display()))?;
        info!(
            "🏷  {} emotion labels from {}",
            vocabulary.len(),
            cfg.labels_path.display()
        );
        info!("🎚  decision threshold {}", cfg.threshold);

        let files = xlm_roberta::resolve_model_files(&cfg.model_dir, cfg.model_repo.as_deref())?;
        let device = select_device(cfg.device.as_deref())?;
        let scorer = XlmRobertaScorer::load(&files, device, cfg.max_seq_len)?;

        Self::new(Box::new(scorer), vocabulary, cfg.threshold)
    }

    /// Classifies every text with one batched forward pass.
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<EmotionResult>> {
        let refs: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.scorer.score(&refs)?;
        if rows.len() != refs.len() {
            bail!(
                "classifier returned {} score rows for {} inputs",
                rows.len(),
                refs.len()
            );
        }

        refs.iter()
            .zip(rows)
            .map(|(text, probs)| self.decide(text, &probs))
            .collect()
    }

    pub fn predict_one(&self, text: &str) -> Result<EmotionResult> {
        self.predict(&[text])?
            .pop()
            .context("classifier returned no result")
    }

    fn decide(&self, text: &str, probs: &[f32]) -> Result<EmotionResult> {
        self.vocabulary.ensure_aligned(probs.len())?;
        let picked = select_labels(probs, self.threshold)?;

        let mut emotions = Vec::with_capacity(picked.len());
        let mut scores = Vec::with_capacity(picked.len());
        for idx in picked {
            let name = self
                .vocabulary
                .name(idx)
                .with_context(|| format!("label index {idx} out of range"))?;
            emotions.push(name.to_string());
            scores.push(probs[idx]);
        }
        debug!(?emotions, "emotion labels selected");

        Ok(EmotionResult {
            text: text.to_string(),
            emotions,
            probs: scores,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::labels::LabelError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns canned scores per text and counts forward passes.
    pub struct FixedScorer {
        pub width: usize,
        pub rows: HashMap<String, Vec<f32>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FixedScorer {
        pub fn new(width: usize) -> Self {
            Self {
                width,
                rows: HashMap::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn with(mut self, text: &str, row: &[f32]) -> Self {
            self.rows.insert(text.to_string(), row.to_vec());
            self
        }
    }

    impl EmotionScorer for FixedScorer {
        fn num_labels(&self) -> usize {
            self.width
        }

        fn score(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    self.rows
                        .get(*t)
                        .cloned()
                        .unwrap_or_else(|| vec![0.0; self.width])
                })
                .collect())
        }
    }

    pub fn sample_classifier() -> EmotionClassifier {
        let scorer = FixedScorer::new(3)
            .with("I lost my dog", &[0.10, 0.50, 0.20])
            .with("meh", &[0.10, 0.20, 0.05])
            .with("I am furious and thrilled", &[0.80, 0.05, 0.90]);
        EmotionClassifier::new(
            Box::new(scorer),
            LabelVocabulary::new(["joy", "sadness", "anger"]).unwrap(),
            DecisionThreshold::default(),
        )
        .unwrap()
    }

    #[test]
    fn predicts_threshold_and_fallback_labels() {
        let clf = sample_classifier();
        let out = clf.predict(&["I lost my dog", "meh"]).unwrap();
        assert_eq!(out[0].emotions, vec!["sadness"]);
        assert_eq!(out[0].probs, vec![0.50]);
        assert_eq!(out[1].emotions, vec!["sadness", "joy", "anger"]);
        assert_eq!(out[1].probs, vec![0.20, 0.10, 0.05]);
    }

    #[test]
    fn primary_labels_stay_in_vocabulary_order() {
        let clf = sample_classifier();
        let out = clf.predict_one("I am furious and thrilled").unwrap();
        assert_eq!(out.emotions, vec!["joy", "anger"]);
        assert_eq!(out.text, "I am furious and thrilled");
    }

    #[test]
    fn batch_uses_single_forward_pass() {
        let scorer = FixedScorer::new(3);
        let calls = scorer.calls.clone();
        let clf = EmotionClassifier::new(
            Box::new(scorer),
            LabelVocabulary::new(["joy", "sadness", "anger"]).unwrap(),
            DecisionThreshold::default(),
        )
        .unwrap();
        let out = clf.predict(&["a", "b", "c", ""]).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // all-zero rows still resolve to three labels
        assert!(out.iter().all(|r| r.emotions.len() == 3));
    }

    #[test]
    fn empty_batch_skips_the_model() {
        let scorer = FixedScorer::new(3);
        let calls = scorer.calls.clone();
        let clf = EmotionClassifier::new(
            Box::new(scorer),
            LabelVocabulary::new(["joy", "sadness", "anger"]).unwrap(),
            DecisionThreshold::default(),
        )
        .unwrap();
        assert!(clf.predict::<&str>(&[]).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn misaligned_vocabulary_is_fatal() {
        let err = EmotionClassifier::new(
            Box::new(FixedScorer::new(28)),
            LabelVocabulary::new(["joy", "sadness", "anger"]).unwrap(),
            DecisionThreshold::default(),
        )
        .err()
        .expect("construction should fail");
        assert_eq!(
            err.downcast_ref::<LabelError>(),
            Some(&LabelError::DimensionMismatch {
                vocabulary: 3,
                model: 28
            })
        );
    }

    #[test]
    fn invalid_scores_surface_as_errors() {
        let scorer = FixedScorer::new(3).with("broken", &[0.1, f32::NAN, 0.2]);
        let clf = EmotionClassifier::new(
            Box::new(scorer),
            LabelVocabulary::new(["joy", "sadness", "anger"]).unwrap(),
            DecisionThreshold::default(),
        )
        .unwrap();
        let err = clf.predict_one("broken").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LabelError>(),
            Some(LabelError::InvalidScore { index: 1, .. })
        ));
    }

    fn offline_config(dir: &std::path::Path) -> ClassifierConfig {
        ClassifierConfig {
            model_dir: dir.to_path_buf(),
            labels_path: dir.join("label_names.txt"),
            model_repo: None,
            ..ClassifierConfig::default()
        }
    }

    fn label_error(err: &anyhow::Error) -> Option<&LabelError> {
        err.chain().find_map(|cause| cause.downcast_ref::<LabelError>())
    }

    #[test]
    fn missing_label_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmotionClassifier::load(&offline_config(dir.path()))
            .err()
            .expect("load should fail");
        assert!(matches!(
            label_error(&err),
            Some(LabelError::MissingVocabulary(_))
        ));
    }

    #[test]
    fn gapped_label_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("label_names.txt"), "joy\n\nsadness\nanger\n").unwrap();
        let err = EmotionClassifier::load(&offline_config(dir.path()))
            .err()
            .expect("load should fail");
        assert_eq!(label_error(&err), Some(&LabelError::BlankLabel { line: 2 }));
    }
}
