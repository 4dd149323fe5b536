use std::sync::Arc;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder, linear};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};

use super::loader::fetch_model_files;
use crate::error::LlmError;
use crate::rerank::Reranker;

pub const DEFAULT_CROSS_ENCODER: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

const MAX_SEQUENCE_TOKENS: usize = 512;

/// BERT sequence-classification head scoring `(query, document)` pairs.
///
/// Weights are loaded once; every field is immutable afterwards so one
/// instance can be shared across concurrent retrievals behind an `Arc`.
#[derive(Clone)]
pub struct CrossEncoderReranker {
    model: Arc<BertModel>,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    repo_id: String,
}

impl std::fmt::Debug for CrossEncoderReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossEncoderReranker")
            .field("repo_id", &self.repo_id)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CrossEncoderReranker {
    /// Load a cross-encoder checkpoint from `HuggingFace` Hub.
    ///
    /// # Errors
    ///
    /// Returns an error if download, tokenizer setup or weight loading fails.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, LlmError> {
        let files = fetch_model_files(repo_id)?;

        let config_str = std::fs::read_to_string(&files.config)
            .map_err(|e| LlmError::ModelLoad(format!("failed to read BERT config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_str)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| LlmError::ModelLoad(format!("failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..TruncationParams::default()
            }))
            .map_err(|e| LlmError::ModelLoad(format!("failed to configure truncation: {e}")))?;
        tokenizer.with_padding(None);

        // SAFETY: file is a valid safetensors downloaded from hf-hub, not modified during
        // VarBuilder lifetime
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, device)?
        };

        let model = BertModel::load(vb.clone(), &config)?;

        let prefix = match config.model_type.as_deref() {
            Some(model_type) if vb.contains_tensor(&format!("{model_type}.pooler.dense.weight")) => {
                format!("{model_type}.")
            }
            _ => String::new(),
        };
        let hidden = config.hidden_size;
        let pooler = linear(hidden, hidden, vb.pp(format!("{prefix}pooler.dense")))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;

        tracing::info!(repo_id, "cross-encoder loaded");

        Ok(Self {
            model: Arc::new(model),
            pooler,
            classifier,
            tokenizer: Arc::new(tokenizer),
            device: device.clone(),
            repo_id: repo_id.to_owned(),
        })
    }

    fn score_pair(&self, query: &str, document: &str) -> Result<f32, LlmError> {
        let encoding = self
            .tokenizer
            .encode((query, document), true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logit = self.classifier.forward(&pooled)?;
        let prob = candle_nn::ops::sigmoid(&logit)?;

        let values = prob.squeeze(D::Minus1)?.to_vec1::<f32>()?;
        values
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Inference("cross-encoder produced no logit".into()))
    }
}

impl Reranker for CrossEncoderReranker {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, LlmError> {
        documents
            .iter()
            .map(|doc| self.score_pair(query, doc))
            .collect()
    }

    fn name(&self) -> &str {
        &self.repo_id
    }
}
