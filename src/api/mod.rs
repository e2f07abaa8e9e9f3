use axum::{
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

use crate::{generator::ResponseGenerator, inference::EmotionClassifier};

pub mod handlers;
pub mod types;

use handlers::{classify, health, index, predict};

/// Load state of the emotion classifier.
#[derive(Clone)]
pub enum Readiness {
    Initializing,
    Ready(Arc<EmotionClassifier>),
    Failed(String),
}

/// Write side of the readiness flag, held by the loader.
///
/// Transitions only out of `Initializing`; a ready classifier is never replaced
/// and a failure is never retracted.
pub struct ReadinessHandle {
    tx: watch::Sender<Readiness>,
}

impl ReadinessHandle {
    pub fn new() -> (Self, watch::Receiver<Readiness>) {
        let (tx, rx) = watch::channel(Readiness::Initializing);
        (Self { tx }, rx)
    }

    pub fn mark_ready(&self, classifier: Arc<EmotionClassifier>) -> bool {
        self.tx.send_if_modified(|state| match state {
            Readiness::Initializing => {
                *state = Readiness::Ready(classifier);
                true
            }
            _ => false,
        })
    }

    pub fn mark_failed(&self, reason: String) -> bool {
        self.tx.send_if_modified(|state| match state {
            Readiness::Initializing => {
                *state = Readiness::Failed(reason);
                true
            }
            _ => false,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub readiness: watch::Receiver<Readiness>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub llm_timeout: Duration,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/classify", post(classify))
}
