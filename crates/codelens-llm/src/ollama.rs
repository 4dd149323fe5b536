use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;

use crate::error::LlmError;
use crate::provider::{GenerationOptions, LlmProvider, Message, Role};

const PROVIDER: &str = "ollama";
const DEFAULT_PORT: u16 = 11434;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        }
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client
            .list_local_models()
            .await
            .map_err(|e| request_error(format!("is Ollama running? {e}")))?;
        Ok(())
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();

        let mut request = ChatMessageRequest::new(self.model.clone(), ollama_messages);
        if let Some(opts) = model_options(options) {
            request = request.options(opts);
        }

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| request_error(format!("chat: {e}")))?;

        Ok(response.message.content)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| request_error(format!("embedding: {e}")))?;

        response
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn request_error(message: String) -> LlmError {
    LlmError::Request {
        provider: PROVIDER,
        message,
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    match msg.role {
        Role::System => ChatMessage::system(msg.content.clone()),
        Role::User => ChatMessage::user(msg.content.clone()),
        Role::Assistant => ChatMessage::assistant(msg.content.clone()),
    }
}

fn model_options(options: &GenerationOptions) -> Option<ModelOptions> {
    if options.is_default() {
        return None;
    }
    let mut opts = ModelOptions::default();
    if let Some(temperature) = options.temperature {
        opts = opts.temperature(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        opts = opts.num_predict(i32::try_from(max_tokens).unwrap_or(i32::MAX));
    }
    if !options.stop.is_empty() {
        opts = opts.stop(options.stop.clone());
    }
    Some(opts)
}

/// Split `scheme://host:port` for `Ollama::new`.
fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    url.rsplit_once(':')
        .and_then(|(host, port)| Some((host.to_owned(), port.parse().ok()?)))
        .unwrap_or_else(|| (url.to_owned(), DEFAULT_PORT))
}
