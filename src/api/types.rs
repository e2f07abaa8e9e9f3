use serde::{Deserialize, Serialize};

use crate::inference::EmotionResult;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub text: String,
    pub emotions: Vec<String>,
    pub prompt: String,
    pub llm_response: String,
    /// Scores aligned with `emotions`.
    pub probs: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub results: Vec<EmotionResult>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
