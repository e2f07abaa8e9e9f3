pub mod device;
pub mod emotion_classifier;
pub mod xlm_roberta;

use anyhow::Result;

pub use emotion_classifier::{EmotionClassifier, EmotionResult};
pub use xlm_roberta::XlmRobertaScorer;

/// A multi-label text model emitting one sigmoid score per label for each input.
pub trait EmotionScorer: Send + Sync {
    fn num_labels(&self) -> usize;

    /// Scores a batch in one forward pass; row `i` belongs to `texts[i]`.
    fn score(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}
