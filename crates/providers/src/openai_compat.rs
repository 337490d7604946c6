//! Client for OpenAI-style HTTP endpoints.
//!
//! Any server exposing `/chat/completions` and `/embeddings` with the OpenAI
//! wire format works here: LiteLLM proxies, Ollama, vLLM, OpenRouter and
//! OpenAI itself. Streaming responses arrive as server-sent events.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use toolwright_config::ProviderConfig;
use toolwright_core::error::ProviderError;
use toolwright_core::message::{Message, Role};
use toolwright_core::provider::*;
use tracing::{debug, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CHUNK_BUFFER: usize = 64;
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Chat and embedding client for an OpenAI-compatible endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "HTTP client builder failed, using defaults");
                reqwest::Client::new()
            }
        };

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            name: name.into(),
            base_url,
            api_key: api_key.into(),
            client,
        }
    }

    /// Build from the `[provider]` config section. A missing key is sent as
    /// an empty bearer token, which local servers accept.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            &config.name,
            &config.api_url,
            config.api_key.as_deref().unwrap_or(""),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        accept_events: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body);
        if accept_events {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        let response = builder.send().await.map_err(transport_error)?;
        ensure_success(response).await
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-2xx response into the matching provider error.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        429 => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            Err(ProviderError::RateLimited { retry_after_secs })
        }
        401 | 403 => Err(ProviderError::AuthenticationFailed(format!(
            "endpoint rejected credentials ({status})"
        ))),
        code => {
            let message = response.text().await.unwrap_or_default();
            warn!(status = code, body = %message, "Provider call failed");
            Err(ProviderError::ApiError {
                status_code: code,
                message,
            })
        }
    }
}

/// Decode a successful response body, reporting shape mismatches as API errors.
async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T, ProviderError> {
    let status_code = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| ProviderError::ApiError {
            status_code,
            message: format!("malformed {what} body: {e}"),
        })
}

#[async_trait]
impl toolwright_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, turns = request.messages.len(), "chat completion");

        let response = self
            .post("chat/completions", &ChatBody::new(&request, false), false)
            .await?;
        let reply: ChatReply = decode(response, "completion").await?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "completion carried no choices".into(),
            })?;

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: reply.usage.map(WireUsage::into_usage),
            model: reply.model,
        })
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        debug!(provider = %self.name, model = %request.model, turns = request.messages.len(), "streaming chat completion");

        let response = self
            .post("chat/completions", &ChatBody::new(&request, true), true)
            .await?;

        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        tokio::spawn(pump_events(self.name.clone(), response, tx));
        Ok(rx)
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        debug!(provider = %self.name, model = %request.model, inputs = request.inputs.len(), "embedding");

        let body = EmbedBody {
            model: &request.model,
            input: &request.inputs,
            encoding_format: "float",
        };
        let response = self.post("embeddings", &body, false).await?;
        let reply: EmbedReply = decode(response, "embedding").await?;
        Ok(reply.into_response())
    }
}

/// Forward SSE deltas from `response` into `tx` until `[DONE]`, end of body,
/// or the receiver goes away. Always finishes with a `done` chunk unless the
/// transport fails.
async fn pump_events(
    provider: String,
    response: reqwest::Response,
    tx: mpsc::Sender<Result<StreamChunk, ProviderError>>,
) {
    let mut body = response.bytes_stream();
    let mut lines = SseLines::default();
    let mut usage = None;

    while let Some(next) = body.next().await {
        let bytes = match next {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                return;
            }
        };

        for payload in lines.push(&bytes) {
            match SseEvent::parse(&payload) {
                SseEvent::Done => {
                    let _ = tx.send(Ok(closing_chunk(usage))).await;
                    return;
                }
                SseEvent::Delta { text, usage: reported } => {
                    usage = reported.or(usage);
                    let Some(text) = text else { continue };
                    let chunk = StreamChunk {
                        content: Some(text),
                        done: false,
                        usage: None,
                    };
                    if tx.send(Ok(chunk)).await.is_err() {
                        return;
                    }
                }
                SseEvent::Garbled(e) => {
                    trace!(provider = %provider, payload = %payload, error = %e, "skipping SSE payload");
                }
            }
        }
    }

    let _ = tx.send(Ok(closing_chunk(usage))).await;
}

fn closing_chunk(usage: Option<Usage>) -> StreamChunk {
    StreamChunk {
        content: None,
        done: true,
        usage,
    }
}

/// Reassembles `data:` payloads from an SSE body delivered in arbitrary
/// byte slices.
#[derive(Default)]
struct SseLines {
    pending: String,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            // Comments (`:`), blank separators and other fields carry no data.
            if let Some(data) = line.trim_end().strip_prefix("data:") {
                payloads.push(data.trim().to_string());
            }
        }
        payloads
    }
}

enum SseEvent {
    Done,
    Delta {
        text: Option<String>,
        usage: Option<Usage>,
    },
    Garbled(serde_json::Error),
}

impl SseEvent {
    fn parse(payload: &str) -> Self {
        if payload == "[DONE]" {
            return SseEvent::Done;
        }
        match serde_json::from_str::<DeltaFrame>(payload) {
            Ok(frame) => SseEvent::Delta {
                text: frame
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|t| !t.is_empty()),
                usage: frame.usage.map(WireUsage::into_usage),
            },
            Err(e) => SseEvent::Garbled(e),
        }
    }
}

// Wire format

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "no_stops")]
    stop: &'a [String],
}

impl<'a> ChatBody<'a> {
    fn new(request: &'a ProviderRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            stream,
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
            max_tokens: request.max_tokens,
            stop: &request.stop,
        }
    }
}

fn no_stops(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            role,
            content: &message.content,
        }
    }
}

#[derive(Deserialize)]
struct ChatReply {
    model: String,
    choices: Vec<ReplyChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct DeltaFrame {
    #[serde(default)]
    choices: Vec<DeltaChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    delta: ReplyMessage,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl WireUsage {
    fn into_usage(self) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbedReply {
    model: String,
    data: Vec<EmbedRow>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct EmbedRow {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl EmbedReply {
    /// Vectors in input order; embedding calls report no completion tokens.
    fn into_response(mut self) -> EmbeddingResponse {
        self.data.sort_by_key(|row| row.index);
        EmbeddingResponse {
            embeddings: self.data.into_iter().map(|row| row.embedding).collect(),
            model: self.model,
            usage: self.usage.map(|u| Usage {
                completion_tokens: 0,
                ..u.into_usage()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolwright_core::Provider;

    fn config(url: &str, key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            name: "litellm".into(),
            api_url: url.into(),
            api_key: key.map(str::to_string),
            model: "gemini/gemini-2.0-flash".into(),
        }
    }

    #[test]
    fn from_config_trims_trailing_slashes() {
        let provider = OpenAiCompatProvider::from_config(&config("http://proxy:4000/v1//", None));
        assert_eq!(provider.name(), "litellm");
        assert_eq!(provider.endpoint("chat/completions"), "http://proxy:4000/v1/chat/completions");
        assert!(provider.api_key.is_empty());
    }

    #[test]
    fn from_config_keeps_key() {
        let provider = OpenAiCompatProvider::from_config(&config("http://localhost:11434/v1", Some("sk-1")));
        assert_eq!(provider.api_key, "sk-1");
    }

    #[test]
    fn chat_body_wire_shape() {
        let request = ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                Message::system("You are helpful"),
                Message::user("Hello"),
                Message::assistant("Hi"),
            ],
            temperature: 0.2,
            max_tokens: Some(256),
            stream: false,
            stop: vec![],
        };

        let body = serde_json::to_value(ChatBody::new(&request, true)).unwrap();
        let roles: Vec<_> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert!(body.get("stop").is_none());

        let plain = serde_json::to_value(ChatBody::new(&request, false)).unwrap();
        assert!(plain.get("stream_options").is_none());
    }

    #[test]
    fn sse_payloads_survive_split_reads() {
        let mut lines = SseLines::default();
        assert!(lines.push(b"data: {\"choi").is_empty());
        let payloads = lines.push(b"ces\":[]}\r\n\r\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"choices\":[]}", "[DONE]"]);
    }

    #[test]
    fn delta_text_is_extracted() {
        let payload = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match SseEvent::parse(payload) {
            SseEvent::Delta { text, usage } => {
                assert_eq!(text.as_deref(), Some("Hello"));
                assert!(usage.is_none());
            }
            _ => panic!("expected delta"),
        }
    }

    #[test]
    fn empty_delta_has_no_text() {
        let payload = r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#;
        assert!(matches!(
            SseEvent::parse(payload),
            SseEvent::Delta { text: None, .. }
        ));
    }

    #[test]
    fn usage_frame_is_captured() {
        let payload = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match SseEvent::parse(payload) {
            SseEvent::Delta { usage: Some(u), .. } => assert_eq!(u.total_tokens, 15),
            _ => panic!("expected usage"),
        }
    }

    #[test]
    fn done_marker_and_garbage() {
        assert!(matches!(SseEvent::parse("[DONE]"), SseEvent::Done));
        assert!(matches!(SseEvent::parse("{not json"), SseEvent::Garbled(_)));
    }

    #[test]
    fn embedding_rows_come_back_in_input_order() {
        let body = r#"{
            "data": [
                {"embedding": [0.4, 0.5, 0.6], "index": 1},
                {"embedding": [0.1, 0.2, 0.3], "index": 0}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let reply: EmbedReply = serde_json::from_str(body).unwrap();
        let response = reply.into_response();
        assert_eq!(response.embeddings, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
        assert_eq!(response.model, "text-embedding-3-small");
        assert_eq!(response.usage.unwrap().prompt_tokens, 8);
    }
}
