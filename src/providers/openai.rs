//! OpenAI-compatible Chat Completions streaming client.
//!
//! Sends `stream: true` requests and hands the event-stream body to a
//! [`StreamSession`](crate::session::StreamSession).
//! See: <https://platform.openai.com/docs/api-reference/chat/streaming>

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{ClientError, StreamingClient};
use crate::http::{add_extra_headers, build_http_client, ReqwestSource};
use crate::model::{Message, Role};
use crate::options::{HttpTransport, ModelOptions, OpenAiModel, TransportOptions};
use crate::session::EVENT_STREAM_MIME;

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI client using HTTP transport.
pub struct OpenAiClient {
    model_options: ModelOptions<OpenAiModel>,
    transport_options: TransportOptions<HttpTransport>,
}

impl OpenAiClient {
    /// Handle OpenAI error responses.
    fn handle_error_response(status: reqwest::StatusCode, body: &str) -> ClientError {
        if let Ok(error_resp) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            ClientError::ProviderError(format!(
                "OpenAI error ({}): {}",
                error_resp.error.error_type.as_deref().unwrap_or("unknown"),
                error_resp.error.message
            ))
        } else {
            ClientError::ProviderError(format!("HTTP {}: {}", status, body))
        }
    }

    fn endpoint(transport_options: &TransportOptions<HttpTransport>) -> String {
        let api_base = transport_options
            .provider
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');

        // Base URLs for compatible servers often already include the version.
        if api_base.ends_with("/v1") {
            format!("{}/chat/completions", api_base)
        } else {
            format!("{}/v1/chat/completions", api_base)
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new(
            ModelOptions::new(OpenAiModel::default()).with_model(DEFAULT_MODEL.to_string()),
            TransportOptions::new(HttpTransport::default()),
        )
    }
}

#[async_trait]
impl StreamingClient for OpenAiClient {
    type ModelProvider = OpenAiModel;
    type TransportProvider = HttpTransport;
    type Source = ReqwestSource;

    async fn open_stream(
        messages: Vec<Message>,
        model_options: &ModelOptions<Self::ModelProvider>,
        transport_options: &TransportOptions<Self::TransportProvider>,
    ) -> Result<Self::Source, ClientError> {
        // Validate API key is present
        let api_key = transport_options
            .provider
            .api_key
            .as_ref()
            .ok_or_else(|| ClientError::Config("API key is required".to_string()))?;

        let url = Self::endpoint(transport_options);
        let request_body = OpenAiRequest::from((messages, model_options));

        let http_client = build_http_client(transport_options)?;

        let mut req = http_client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, EVENT_STREAM_MIME);

        req = add_extra_headers(req, &transport_options.provider.extra_headers);

        debug!(
            url = %url,
            model = %request_body.model,
            messages = request_body.messages.len(),
            "opening chat stream"
        );
        let response = req.json(&request_body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::handle_error_response(status, &body));
        }

        Ok(ReqwestSource::new(response))
    }

    fn new(
        model_options: ModelOptions<Self::ModelProvider>,
        transport_options: TransportOptions<Self::TransportProvider>,
    ) -> Self {
        Self {
            model_options,
            transport_options,
        }
    }

    fn model_options(&self) -> &ModelOptions<Self::ModelProvider> {
        &self.model_options
    }

    fn transport_options(&self) -> &TransportOptions<Self::TransportProvider> {
        &self.transport_options
    }
}

impl From<(Vec<Message>, &ModelOptions<OpenAiModel>)> for OpenAiRequest {
    fn from((messages, model_options): (Vec<Message>, &ModelOptions<OpenAiModel>)) -> Self {
        let instructions = model_options
            .instructions
            .iter()
            .map(|text| OpenAiMessage {
                role: Role::System,
                content: text.clone(),
            });

        let messages = instructions
            .chain(messages.into_iter().map(OpenAiMessage::from))
            .collect();

        OpenAiRequest {
            model: model_options
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            messages,
            max_tokens: model_options.max_tokens,
            temperature: model_options.temperature,
            top_p: model_options.top_p,
            stream: true,
            extra: model_options.provider.clone(),
        }
    }
}

impl From<Message> for OpenAiMessage {
    fn from(msg: Message) -> Self {
        OpenAiMessage {
            role: msg.role,
            content: msg.content,
        }
    }
}

// --- OpenAI API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
    #[serde(flatten)]
    extra: OpenAiModel,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiError {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    message: String,
}
