use anyhow::{anyhow, bail, Context, Result};
use candle::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config, XLMRobertaForSequenceClassification};
use std::fs;
use std::path::{Path, PathBuf};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::info;

use super::EmotionScorer;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Files making up one classifier snapshot.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        }
    }

    fn all_present(&self) -> bool {
        self.config.exists() && self.tokenizer.exists() && self.weights.exists()
    }
}

/// Uses the local snapshot when it is complete, otherwise pulls the files from
/// the Hugging Face Hub. Blocking; run it off the async runtime.
pub fn resolve_model_files(dir: &Path, repo: Option<&str>) -> Result<ModelFiles> {
    let local = ModelFiles::in_dir(dir);
    if local.all_present() {
        info!("📁 emotion model snapshot: {}", dir.display());
        return Ok(local);
    }

    let Some(repo_id) = repo.filter(|r| !r.trim().is_empty()) else {
        bail!(
            "model snapshot incomplete under {} (need {CONFIG_FILE}, {TOKENIZER_FILE}, \
             {WEIGHTS_FILE}) and no hub repo configured",
            dir.display()
        );
    };

    info!("📦 fetching emotion model from hub repo {repo_id}");
    let api = hf_hub::api::sync::Api::new().context("failed to initialize Hugging Face Hub API")?;
    let repo = api.model(repo_id.to_string());
    let fetch = |name: &str| {
        repo.get(name)
            .with_context(|| format!("failed to download {name} from {repo_id}"))
    };

    Ok(ModelFiles {
        config: fetch(CONFIG_FILE)?,
        tokenizer: fetch(TOKENIZER_FILE)?,
        weights: fetch(WEIGHTS_FILE)?,
    })
}

/// RoBERTa-family sequence classifier with independent sigmoid outputs.
pub struct XlmRobertaScorer {
    model: XLMRobertaForSequenceClassification,
    tokenizer: Tokenizer,
    device: Device,
    num_labels: usize,
}

impl XlmRobertaScorer {
    pub fn load(files: &ModelFiles, device: Device, max_len: usize) -> Result<Self> {
        let raw = fs::read(&files.config)
            .with_context(|| format!("failed to read {}", files.config.display()))?;
        let config: Config = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", files.config.display()))?;
        let num_labels = output_dimension(&raw)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(|e| {
            anyhow!(
                "Tokenizer load failed ({}): {e}",
                files.tokenizer.display()
            )
        })?;
        let max_len = max_len.min(config.max_position_embeddings.saturating_sub(2)).max(2);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Tokenizer truncation config failed: {e}"))?;
        let pad_id = pad_token_id(&tokenizer, config.pad_token_id);
        let pad_token = tokenizer
            .id_to_token(pad_id)
            .unwrap_or_else(|| "<pad>".to_string());
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            pad_id,
            pad_token,
            ..Default::default()
        }));

        if !files.weights.exists() {
            bail!("{WEIGHTS_FILE} not found at {}", files.weights.display());
        }
        let dtype = if device.is_cuda() { DType::F16 } else { DType::F32 };
        let weights = vec![files.weights.clone()];
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&weights, dtype, &device)
                .map_err(|e| anyhow!("failed to load {}: {e}", files.weights.display()))?
        };
        let model = XLMRobertaForSequenceClassification::new(num_labels, &config, vb)
            .context("failed to construct emotion classifier")?;

        info!("🟦 emotion classifier loaded ({num_labels} labels, max_len={max_len})");

        Ok(Self {
            model,
            tokenizer,
            device,
            num_labels,
        })
    }
}

impl EmotionScorer for XlmRobertaScorer {
    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn score(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenizer encode error: {e}"))?;

        let batch = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        if seq_len == 0 {
            bail!("tokenizer produced no tokens for the batch");
        }

        let ids: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_ids().iter().copied())
            .collect();
        let mask: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().iter().copied())
            .collect();

        let ids = Tensor::from_vec(ids, (batch, seq_len), &self.device)?;
        let mask = Tensor::from_vec(mask, (batch, seq_len), &self.device)?;
        let token_type_ids = ids.zeros_like()?;

        let logits = self
            .model
            .forward(&ids, &mask, &token_type_ids)
            .context("emotion classifier forward pass failed")?;
        let probs = candle_nn::ops::sigmoid(&logits)?
            .to_dtype(DType::F32)?
            .to_vec2::<f32>()
            .map_err(|e| anyhow!("failed to decode scores: {e}"))?;

        Ok(probs)
    }
}

/// Number of classifier outputs declared by a Hugging Face `config.json`.
fn output_dimension(raw_config: &[u8]) -> Result<usize> {
    let json: serde_json::Value = serde_json::from_slice(raw_config)?;
    if let Some(id2label) = json.get("id2label").and_then(|v| v.as_object()) {
        if !id2label.is_empty() {
            return Ok(id2label.len());
        }
    }
    json.get("num_labels")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .filter(|&n| n > 0)
        .ok_or_else(|| anyhow!("config.json declares neither id2label nor num_labels"))
}

/// Pad id from the tokenizer's own padding or vocabulary, else `config.json`.
fn pad_token_id(tokenizer: &Tokenizer, config_pad_id: u32) -> u32 {
    tokenizer
        .get_padding()
        .map(|params| params.pad_id)
        .or_else(|| tokenizer.token_to_id("<pad>"))
        .unwrap_or(config_pad_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn output_dimension_prefers_id2label() {
        let raw = br#"{"id2label": {"0": "joy", "1": "anger"}, "num_labels": 5}"#;
        assert_eq!(output_dimension(raw).unwrap(), 2);
        let raw = br#"{"num_labels": 28}"#;
        assert_eq!(output_dimension(raw).unwrap(), 28);
        assert!(output_dimension(br#"{}"#).is_err());
    }

    fn word_level_tokenizer(vocab: &str) -> Tokenizer {
        let json = format!(
            r#"{{"version":"1.0","truncation":null,"padding":null,"added_tokens":[],
                "normalizer":null,"pre_tokenizer":null,"post_processor":null,"decoder":null,
                "model":{{"type":"WordLevel","vocab":{vocab},"unk_token":"<unk>"}}}}"#
        );
        Tokenizer::from_str(&json).unwrap()
    }

    #[test]
    fn pad_id_prefers_tokenizer_then_config() {
        let with_pad = word_level_tokenizer(r#"{"<s>":0,"<unk>":1,"<pad>":3}"#);
        assert_eq!(pad_token_id(&with_pad, 1), 3);

        let without_pad = word_level_tokenizer(r#"{"<s>":0,"<unk>":1}"#);
        assert_eq!(pad_token_id(&without_pad, 7), 7);
    }

    #[test]
    fn incomplete_snapshot_without_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_model_files(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("snapshot incomplete"));
    }

    #[test]
    fn run_emotion_scoring() {
        let snapshot = PathBuf::from("models/emotion");
        let files = ModelFiles::in_dir(&snapshot);
        if !files.all_present() {
            eprintln!(
                "emotion snapshot missing under {}, skipping test",
                snapshot.display()
            );
            return;
        }
        let scorer =
            XlmRobertaScorer::load(&files, Device::Cpu, 128).expect("failed to load scorer");
        let rows = scorer
            .score(&["I am so happy today", ""])
            .expect("scoring failed");
        assert_eq!(rows.len(), 2);
        for row in rows {
            assert_eq!(row.len(), scorer.num_labels());
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }
}
