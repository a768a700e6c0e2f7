use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{DirectivePart, ReasoningCall, ReasoningClient};
use super::TransportError;
use crate::config::ReasoningConfig;

/// HTTP client for a Gemini-compatible `generateContent` endpoint.
///
/// Constructed explicitly from a `ReasoningConfig` and passed by reference
/// into the pipeline; holds no global state.
pub struct GeminiClient {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &ReasoningConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    system_instruction: RequestContent<'a>,
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig<'a> {
    temperature: f32,
    response_mime_type: &'a str,
    response_schema: &'a serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn request_body(call: &ReasoningCall) -> GenerateContentRequest<'_> {
    let parts = call
        .parts
        .iter()
        .map(|p| match p {
            DirectivePart::Text(text) => RequestPart::Text { text },
            DirectivePart::InlineData { mime_type, data } => RequestPart::InlineData {
                inline_data: InlineData { mime_type, data },
            },
        })
        .collect();

    GenerateContentRequest {
        system_instruction: RequestContent {
            role: None,
            parts: vec![RequestPart::Text {
                text: &call.system_instruction,
            }],
        },
        contents: vec![RequestContent {
            role: Some("user"),
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: call.temperature,
            response_mime_type: "application/json",
            response_schema: &call.response_schema,
        },
    }
}

/// Concatenate the text parts of the first candidate. A prompt blocked
/// before any candidate was produced is a transport-level rejection.
fn response_text(response: GenerateContentResponse) -> Result<String, TransportError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(TransportError::Blocked(reason));
        }
        return Ok(String::new());
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            tracing::warn!(finish_reason = %reason, "Reasoning service stopped early");
        }
    }

    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default())
}

/// Extract the service's own error message from an error body when possible.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl ReasoningClient for GeminiClient {
    async fn generate(&self, call: &ReasoningCall) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(call))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TransportError::Connection(self.endpoint.clone())
                } else if e.is_timeout() {
                    TransportError::Timeout(self.timeout_secs)
                } else {
                    TransportError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout_secs)
            } else {
                TransportError::ResponseParsing(e.to_string())
            }
        })?;

        response_text(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock reasoning client for testing — replays a scripted sequence of
/// outcomes, repeating the last one once the script is exhausted.
pub struct MockReasoningClient {
    script: Mutex<VecDeque<Result<String, TransportError>>>,
    last: Mutex<Result<String, TransportError>>,
    calls: Mutex<Vec<ReasoningCall>>,
    delay: Option<Duration>,
}

impl MockReasoningClient {
    /// Always return `response`.
    pub fn new(response: &str) -> Self {
        Self::scripted(vec![Ok(response.to_string())])
    }

    pub fn scripted(outcomes: Vec<Result<String, TransportError>>) -> Self {
        let last = outcomes.last().cloned().unwrap_or_else(|| Ok(String::new()));
        Self {
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(last),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Suspend for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<ReasoningCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningClient for MockReasoningClient {
    async fn generate(&self, call: &ReasoningCall) -> Result<String, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(outcome) => outcome,
            None => self
                .last
                .lock()
                .map(|l| l.clone())
                .unwrap_or_else(|_| Ok(String::new())),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
