//! Gemini REST client implementation

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use scribe_core::{Embedder, Error, GenerationConfig, GenerationResult, LLMProvider, Result};

use crate::config::GeminiConfig;

/// The API rejects batch embedding requests with more entries than this
const MAX_EMBED_BATCH: usize = 100;

const API_VERSION: &str = "v1beta";

/// Gemini client for text generation and embeddings
pub struct GeminiClient {
    config: GeminiConfig,
    base_url: Url,
    client: Client,
    current_model: String,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationParams,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

/// A model advertised by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Whether the model can serve `generateContent` calls
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|method| method == "generateContent")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

impl GeminiClient {
    /// Model constants
    pub const GEMINI_PRO_LATEST: &'static str = "models/gemini-pro-latest";
    pub const EMBEDDING_001: &'static str = "models/embedding-001";

    /// Create a new Gemini client from configuration
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Configuration("Gemini API key is empty".to_string()));
        }

        let mut base_url = Url::parse(&config.api_url)
            .map_err(|e| {
                Error::Configuration(format!("invalid Gemini API URL {}: {}", config.api_url, e))
            })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let current_model = model_path(&config.chat_model);

        Ok(Self {
            config,
            base_url,
            client,
            current_model,
        })
    }

    /// Create a new Gemini client from environment variables
    pub fn from_env() -> Result<Self> {
        let config = GeminiConfig::from_env()?;
        Self::new(config)
    }

    /// Set the model to use for generation
    pub fn with_model(mut self, model_id: impl AsRef<str>) -> Self {
        self.current_model = model_path(model_id.as_ref());
        self
    }

    /// List every model visible to the configured key, following pagination
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.endpoint(&format!("{}/models", API_VERSION))?;
            if let Some(ref token) = page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let response = self
                .client
                .get(url)
                .header("x-goog-api-key", &self.config.api_key)
                .send()
                .await
                .map_err(transport_error)?;

            let page: ListModelsResponse = read_json(response, Error::LLMProvider).await?;
            models.extend(page.models);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Configuration(format!("invalid endpoint path {}: {}", path, e)))
    }

    async fn post_json<B, R>(&self, url: Url, body: &B, on_status: fn(String) -> Error) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        read_json(response, on_status).await
    }

    /// Perform the actual generation request
    async fn perform_generation(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let model = model_path(&config.model_id);
        let url = self.endpoint(&format!("{}/{}:generateContent", API_VERSION, model))?;
        let request_body = generation_request(prompt, config);

        tracing::debug!(
            model = %model,
            prompt_chars = prompt.len(),
            "sending generateContent request"
        );

        let response: GenerationResponse =
            self.post_json(url, &request_body, Error::LLMProvider).await?;
        let tokens_used = response
            .usage_metadata
            .as_ref()
            .and_then(|usage| usage.total_token_count);
        let text = extract_text(response)?;

        Ok(GenerationResult {
            text,
            model_id: model,
            tokens_used,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = model_path(&self.config.embedding_model);
        let url = self.endpoint(&format!("{}/{}:batchEmbedContents", API_VERSION, model))?;

        let request_body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| embed_request(&model, text, "RETRIEVAL_DOCUMENT"))
                .collect(),
        };

        let response: BatchEmbedResponse =
            self.post_json(url, &request_body, Error::Embedding).await?;
        check_batch_len(response, texts.len())
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        let config = GenerationConfig {
            model_id: self.current_model.clone(),
            timeout: Duration::from_secs(self.config.timeout_secs),
            ..Default::default()
        };
        self.generate_with_config(prompt, &config).await
    }

    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let generation_future = self.perform_generation(prompt, config);

        match timeout(config.timeout, generation_future).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout("Generation request timed out".to_string())),
        }
    }

    fn model_id(&self) -> &str {
        &self.current_model
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let model = model_path(&self.config.embedding_model);
        let url = self.endpoint(&format!("{}/{}:embedContent", API_VERSION, model))?;
        let request_body = embed_request(&model, text, "RETRIEVAL_QUERY");

        let response: EmbedResponse = self.post_json(url, &request_body, Error::Embedding).await?;
        if response.embedding.values.is_empty() {
            return Err(Error::MalformedResponse("query embedding has no values".to_string()));
        }
        Ok(response.embedding.values)
    }

    fn embedding_model_id(&self) -> &str {
        &self.config.embedding_model
    }
}

/// Normalize a model name to the `models/<name>` form the REST paths expect
pub(crate) fn model_path(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

pub(crate) fn generation_request<'a>(
    prompt: &'a str,
    config: &GenerationConfig,
) -> GenerationRequest<'a> {
    GenerationRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationParams {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
            stop_sequences: config.stop_sequences.clone(),
        },
    }
}

pub(crate) fn embed_request<'a>(
    model: &'a str,
    text: &'a str,
    task_type: &'static str,
) -> EmbedRequest<'a> {
    EmbedRequest {
        model,
        content: EmbedContent {
            parts: vec![Part { text }],
        },
        task_type,
    }
}

/// Pull the answer text out of a generation response
pub(crate) fn extract_text(response: GenerationResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        return Err(Error::LLMProvider(format!("prompt was blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::MalformedResponse("response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(Error::LLMProvider(format!(
            "empty response from Gemini (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text.to_string())
}

fn check_batch_len(response: BatchEmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.embeddings.len() != expected {
        return Err(Error::MalformedResponse(format!(
            "Gemini returned {} embeddings for {} inputs",
            response.embeddings.len(),
            expected
        )));
    }
    Ok(response.embeddings.into_iter().map(|e| e.values).collect())
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else {
        Error::Network(err.to_string())
    }
}

/// Map a non-success status to an error, using `on_status` for anything
/// that is not an auth or quota problem
pub(crate) fn status_error(
    status: StatusCode,
    body: &str,
    on_status: fn(String) -> Error,
) -> Error {
    let message = format!("Gemini API request failed with status {}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(message),
        StatusCode::TOO_MANY_REQUESTS => Error::Quota(message),
        _ => on_status(message),
    }
}

async fn read_json<R: DeserializeOwned>(
    response: reqwest::Response,
    on_status: fn(String) -> Error,
) -> Result<R> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(status_error(status, &body, on_status));
    }

    Ok(serde_json::from_str(&body)?)
}
