use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Html,
    Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api::{
        types::{ClassifyRequest, ClassifyResponse, HealthResponse, PredictRequest, PredictResponse},
        AppState, Readiness,
    },
    error::ServiceError,
    generator::generate_with_timeout,
    inference::{EmotionClassifier, EmotionResult},
    prompts::build_prompt,
};

const CHAT_UI: &str = include_str!("../../ui/index.html");

pub async fn index() -> Html<&'static str> {
    Html(CHAT_UI)
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let readiness = state.readiness.borrow().clone();
    match readiness {
        Readiness::Ready(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".into(),
                detail: None,
            }),
        ),
        Readiness::Initializing => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "initializing".into(),
                detail: None,
            }),
        ),
        Readiness::Failed(reason) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "error".into(),
                detail: Some(reason),
            }),
        ),
    }
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ServiceError> {
    let Json(req) = payload.map_err(|e| ServiceError::MalformedBody(e.body_text()))?;
    if req.text.trim().is_empty() {
        return Err(ServiceError::InvalidInput("text must not be empty".into()));
    }

    let classifier = ready_classifier(&state)?;
    let request_id = Uuid::new_v4();

    let text = req.text.clone();
    let mut results = run_classifier(classifier, vec![text]).await?;
    let result = results
        .pop()
        .ok_or_else(|| ServiceError::Classification("classifier returned no result".into()))?;
    info!(%request_id, emotions = ?result.emotions, "emotions detected");

    let prompt = build_prompt(&req.text, &result.emotions);

    let llm_response =
        match generate_with_timeout(state.generator.as_ref(), &prompt, state.llm_timeout).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%request_id, "response generation failed: {err}");
                format!("[generation error] {err}")
            }
        };

    Ok(Json(PredictResponse {
        text: req.text,
        emotions: result.emotions,
        prompt,
        llm_response,
        probs: result.probs,
    }))
}

pub async fn classify(
    State(state): State<AppState>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ServiceError> {
    let Json(req) = payload.map_err(|e| ServiceError::MalformedBody(e.body_text()))?;
    if req.texts.is_empty() {
        return Err(ServiceError::InvalidInput("texts must not be empty".into()));
    }

    let classifier = ready_classifier(&state)?;
    let results = run_classifier(classifier, req.texts).await?;
    Ok(Json(ClassifyResponse { results }))
}

fn ready_classifier(state: &AppState) -> Result<Arc<EmotionClassifier>, ServiceError> {
    match &*state.readiness.borrow() {
        Readiness::Ready(classifier) => Ok(classifier.clone()),
        Readiness::Initializing => Err(ServiceError::NotReady),
        Readiness::Failed(reason) => Err(ServiceError::Load(reason.clone())),
    }
}

/// Inference is CPU/GPU bound, so it runs on the blocking pool.
async fn run_classifier(
    classifier: Arc<EmotionClassifier>,
    texts: Vec<String>,
) -> Result<Vec<EmotionResult>, ServiceError> {
    tokio::task::spawn_blocking(move || classifier.predict(&texts))
        .await
        .map_err(|e| ServiceError::Classification(e.to_string()))?
        .map_err(|e| {
            error!("classification failed: {e:#}");
            ServiceError::Classification(format!("{e:#}"))
        })
}
