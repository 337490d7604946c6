//! Shared test helpers for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use toolwright_core::error::ProviderError;
use toolwright_core::message::Message;
use toolwright_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};

/// Usage reported for every scripted reply.
pub const REPLY_USAGE: Usage = Usage {
    prompt_tokens: 10,
    completion_tokens: 5,
    total_tokens: 15,
};

/// A mock provider that answers from a script, one entry per model call.
///
/// `complete` and `stream` both consume the next entry; `stream` splits it
/// into fragments of `fragment_chars` characters. Calls past the end of the
/// script fail with `NotConfigured`.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    fragment_chars: usize,
}

impl SequentialMockProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::scripted(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn scripted(script: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            fragment_chars: 4,
        }
    }

    pub fn with_fragment_chars(mut self, n: usize) -> Self {
        self.fragment_chars = n.max(1);
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.complete_calls() + self.stream_calls()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::NotConfigured("script exhausted".into())))
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let text = self.next(request)?;
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(REPLY_USAGE),
            model: "mock-model".into(),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let text = self.next(request)?;
        let chars: Vec<char> = text.chars().collect();
        let fragments: Vec<String> = chars
            .chunks(self.fragment_chars)
            .map(|c| c.iter().collect())
            .collect();

        let (tx, rx) = tokio::sync::mpsc::channel(fragments.len() + 1);
        for fragment in fragments {
            let _ = tx.try_send(Ok(StreamChunk {
                content: Some(fragment),
                done: false,
                usage: None,
            }));
        }
        let _ = tx.try_send(Ok(StreamChunk {
            content: None,
            done: true,
            usage: Some(REPLY_USAGE),
        }));
        Ok(rx)
    }
}

/// Wrap a directive payload in markers.
pub fn directive(name: &str, params: serde_json::Value) -> String {
    format!(
        "<tool>{}</tool>",
        serde_json::json!({"name": name, "params": params})
    )
}
