use std::path::PathBuf;

use crate::error::LlmError;

/// Local paths of a BERT-family checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Download (or reuse from the hf-hub cache) config, tokenizer and safetensors weights.
///
/// # Errors
///
/// Returns `ModelLoad` if the hub client cannot be built or a file is missing.
pub fn fetch_model_files(repo_id: &str) -> Result<ModelFiles, LlmError> {
    let api = hf_hub::api::sync::Api::new().map_err(|e| {
        LlmError::ModelLoad(format!("failed to create HuggingFace API client: {e}"))
    })?;
    let repo = api.model(repo_id.to_owned());

    let fetch = |name: &str| {
        repo.get(name).map_err(|e| {
            LlmError::ModelLoad(format!("failed to download {name} from {repo_id}: {e}"))
        })
    };

    Ok(ModelFiles {
        config: fetch("config.json")?,
        tokenizer: fetch("tokenizer.json")?,
        weights: fetch("model.safetensors")?,
    })
}
