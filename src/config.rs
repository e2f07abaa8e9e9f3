use anyhow::{anyhow, Context, Result};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::labels::DecisionThreshold;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MODEL_DIR: &str = "models/emotion";
pub const DEFAULT_MODEL_REPO: &str = "OVERLOOKHOTEL13/emotion-detector-final";
pub const DEFAULT_LABELS_PATH: &str = "label_names.txt";
pub const DEFAULT_MAX_SEQ_LEN: usize = 512;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 512;
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: String,
    pub classifier: ClassifierConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub model_dir: PathBuf,
    /// Hub repo used when `model_dir` lacks the snapshot files.
    pub model_repo: Option<String>,
    pub labels_path: PathBuf,
    pub threshold: DecisionThreshold,
    pub device: Option<String>,
    pub max_seq_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            model_repo: Some(DEFAULT_MODEL_REPO.to_string()),
            labels_path: PathBuf::from(DEFAULT_LABELS_PATH),
            threshold: DecisionThreshold::default(),
            device: None,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            temperature: DEFAULT_LLM_TEMPERATURE,
        }
    }
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let threshold = match parse::<f32>(&get, "EMPATHIC_THRESHOLD")? {
            Some(value) => DecisionThreshold::new(value).context("EMPATHIC_THRESHOLD")?,
            None => DecisionThreshold::default(),
        };

        // An explicitly empty repo disables hub downloads.
        let model_repo = match lookup("EMPATHIC_MODEL_REPO") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_string()),
            None => Some(DEFAULT_MODEL_REPO.to_string()),
        };

        let classifier = ClassifierConfig {
            model_dir: get("EMPATHIC_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            model_repo,
            labels_path: get("EMPATHIC_LABELS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            threshold,
            device: get("EMPATHIC_DEVICE"),
            max_seq_len: parse(&get, "EMPATHIC_MAX_SEQ_LEN")?.unwrap_or(DEFAULT_MAX_SEQ_LEN),
        };

        let generator = GeneratorConfig {
            base_url: get("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: get("LLM_API_KEY"),
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timeout: Duration::from_secs(
                parse(&get, "LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
            ),
            max_tokens: parse(&get, "LLM_MAX_TOKENS")?.unwrap_or(DEFAULT_LLM_MAX_TOKENS),
            temperature: parse(&get, "LLM_TEMPERATURE")?.unwrap_or(DEFAULT_LLM_TEMPERATURE),
        };

        Ok(Self {
            addr: get("EMPATHIC_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            classifier,
            generator,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow!("invalid {key}='{raw}': {e}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.addr, DEFAULT_ADDR);
        assert_eq!(cfg.classifier.threshold.value(), 0.45);
        assert_eq!(cfg.classifier.model_repo.as_deref(), Some(DEFAULT_MODEL_REPO));
        assert_eq!(cfg.classifier.labels_path, PathBuf::from("label_names.txt"));
        assert_eq!(cfg.generator.timeout, Duration::from_secs(30));
        assert!(cfg.generator.api_key.is_none());
    }

    #[test]
    fn overrides_apply() {
        let cfg = config_from(&[
            ("EMPATHIC_THRESHOLD", "0.6"),
            ("EMPATHIC_MODEL_REPO", ""),
            ("EMPATHIC_DEVICE", "cpu"),
            ("LLM_BASE_URL", "http://localhost:11434/v1/"),
            ("LLM_API_KEY", "sk-test"),
            ("LLM_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(cfg.classifier.threshold.value(), 0.6);
        assert!(cfg.classifier.model_repo.is_none());
        assert_eq!(cfg.classifier.device.as_deref(), Some("cpu"));
        assert_eq!(cfg.generator.base_url, "http://localhost:11434/v1");
        assert_eq!(cfg.generator.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.generator.timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = config_from(&[("LLM_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("LLM_TIMEOUT_SECS"));

        let err = config_from(&[("EMPATHIC_THRESHOLD", "2.0")]).unwrap_err();
        assert!(err.to_string().contains("EMPATHIC_THRESHOLD"));
    }
}
