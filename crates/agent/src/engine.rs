//! The reasoning loop: call the model, parse directives, run tools, repeat.
//!
//! Each round sends the transcript to the model. A reply without
//! directives finishes the invocation; a reply with directives has every
//! directive dispatched in order, and the raw reply plus a synthesized
//! "Tool results" user turn are appended before the next round. After
//! `max_iterations` rounds the invocation ends with a fixed limit message.
//!
//! `process` returns one [`EngineResult`]. `process_stream` runs the same
//! rounds on a spawned task and reports progress as [`AgentEvent`]s; every
//! model call, fragment and tool call is raced against the receiver going
//! away, so dropping the stream stops all further work.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use toolwright_config::{EngineConfig, StreamStrategy};
use toolwright_core::agent::{AgentProfile, AgentStore};
use toolwright_core::error::{Error, ProviderError, Result};
use toolwright_core::message::Message;
use toolwright_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use toolwright_core::tool::{ToolOutcome, ToolRegistry};
use tracing::{debug, info, warn};

use crate::directive::{self, SegmentKind, ToolDirective};
use crate::dispatch::{Dispatched, SourceSet, ToolSet};
use crate::invocation::Invocation;
use crate::persona::build_system_prompt;
use crate::stream_event::AgentEvent;

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

pub const LIMIT_MESSAGE: &str =
    "I've reached my processing limit. Please try simplifying your request.";

const EVENT_BUFFER: usize = 64;

/// Events produced by [`AgentEngine::process_stream`].
pub type EventStream = ReceiverStream<AgentEvent>;

/// The outcome of a non-streaming invocation.
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    /// Final answer with directives removed, or the limit message
    pub content: String,
    /// Every directive attempted, in order, unknown tools included
    pub tools_used: Vec<String>,
    /// `"Using tool: <name>"` lines, or `None` when no tool ran
    pub thinking: Option<String>,
    /// Deduplicated retrieval hits
    pub sources: Vec<serde_json::Value>,
    /// Model named by the last response
    pub model: Option<String>,
    /// Summed across rounds; `None` when the provider reported nothing
    pub usage: Option<Usage>,
}

/// One configured agent, ready to serve invocations.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct AgentEngine {
    profile: AgentProfile,
    tools: ToolSet,
    system_prompt: String,
    provider: Arc<dyn Provider>,
    model: String,
    max_iterations: u32,
    strategy: StreamStrategy,
}

impl AgentEngine {
    /// Build an engine for the agent named `slug`.
    pub fn load(
        slug: &str,
        store: &dyn AgentStore,
        catalog: &ToolRegistry,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let profile = store
            .load(slug)
            .ok_or_else(|| Error::AgentNotFound(slug.to_string()))?;
        Ok(Self::new(profile, catalog, provider, model))
    }

    pub fn new(
        profile: AgentProfile,
        catalog: &ToolRegistry,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        let tools = ToolSet::resolve(&profile.slug, &profile.tools, catalog);
        let system_prompt = build_system_prompt(&profile.persona, &tools);
        debug!(agent = %profile.slug, tools = ?tools.names(), "Agent engine ready");
        Self {
            profile,
            tools,
            system_prompt,
            provider,
            model: model.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            strategy: StreamStrategy::default(),
        }
    }

    /// Set the default round budget. Values below 1 are treated as 1.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_stream_strategy(mut self, strategy: StreamStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Apply the `[engine]` config section.
    pub fn with_engine_config(self, config: &EngineConfig) -> Self {
        self.with_max_iterations(config.max_iterations)
            .with_stream_strategy(config.stream_strategy)
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn budget(&self, invocation: &Invocation) -> u32 {
        invocation.max_iterations.unwrap_or(self.max_iterations).max(1)
    }

    fn request(&self, transcript: &[Message], stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: transcript.to_vec(),
            temperature: self.profile.settings.temperature,
            max_tokens: Some(self.profile.settings.max_tokens),
            stream,
            stop: vec![],
        }
    }

    fn start(&self, messages: Vec<Message>) -> Run {
        let mut transcript = Vec::with_capacity(messages.len() + 1);
        transcript.push(Message::system(self.system_prompt.clone()));
        transcript.extend(messages);
        Run {
            transcript,
            tools_used: Vec::new(),
            thinking: Vec::new(),
            sources: SourceSet::new(),
            usage: Usage::default(),
            model: None,
        }
    }

    /// Run the loop to completion and return the final answer.
    ///
    /// A model-call failure aborts the invocation; tool failures never do.
    pub async fn process(&self, messages: Vec<Message>, invocation: &Invocation) -> Result<EngineResult> {
        let budget = self.budget(invocation);
        let mut run = self.start(messages);
        info!(agent = %self.profile.slug, budget, "Processing invocation");

        for round in 1..=budget {
            let response = self.provider.complete(self.request(&run.transcript, false)).await?;
            run.record_response(&response);

            let parsed = directive::parse(&response.message.content);
            debug!(agent = %self.profile.slug, round, directives = parsed.directives.len(), "Round complete");

            if parsed.directives.is_empty() {
                info!(agent = %self.profile.slug, rounds = round, tools = run.tools_used.len(), "Invocation finished");
                return Ok(run.finish(parsed.visible));
            }

            let mut results = Vec::with_capacity(parsed.directives.len());
            for directive in &parsed.directives {
                let dispatched = self.tools.dispatch(directive, invocation).await;
                run.record_dispatch(directive, &dispatched);
                results.push((directive.name.clone(), dispatched.outcome));
            }
            run.continue_after_tools(response.message.content, &results)?;
        }

        warn!(agent = %self.profile.slug, budget, "Round budget exhausted");
        Ok(run.finish(LIMIT_MESSAGE.to_string()))
    }

    /// Run the loop on a background task, streaming events.
    ///
    /// The stream ends after `done`, or after `error` when a model call
    /// fails. Dropping it cancels the remaining work.
    pub fn process_stream(self: &Arc<Self>, messages: Vec<Message>, invocation: Invocation) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let engine = Arc::clone(self);

        tokio::spawn(async move {
            let sink = EventSink { tx };
            match engine.drive_stream(messages, &invocation, &sink).await {
                Ok(()) => {}
                Err(Halt::Closed) => {
                    debug!(agent = %engine.profile.slug, "Event receiver dropped, stopping");
                }
                Err(Halt::Failed(e)) => {
                    warn!(agent = %engine.profile.slug, error = %e, "Model call failed during stream");
                    let _ = sink.emit(AgentEvent::Error { message: e.to_string() }).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }

    async fn drive_stream(
        &self,
        messages: Vec<Message>,
        invocation: &Invocation,
        sink: &EventSink,
    ) -> std::result::Result<(), Halt> {
        let budget = self.budget(invocation);
        let mut run = self.start(messages);
        info!(agent = %self.profile.slug, budget, strategy = ?self.strategy, "Streaming invocation");

        for round in 1..=budget {
            let outcome = match self.strategy {
                StreamStrategy::Probe => self.probe_round(&mut run, sink).await?,
                StreamStrategy::LookAhead => self.look_ahead_round(&mut run, sink).await?,
            };

            let (reply, directives) = match outcome {
                RoundOutcome::Answered => {
                    info!(agent = %self.profile.slug, rounds = round, tools = run.tools_used.len(), "Stream finished");
                    return sink.emit(run.done_event()).await;
                }
                RoundOutcome::Directives { reply, directives } => (reply, directives),
            };
            debug!(agent = %self.profile.slug, round, directives = directives.len(), "Round complete");

            sink.emit(AgentEvent::Thinking {
                content: format!("Processing with {} tool(s)...", directives.len()),
            })
            .await?;

            let mut results = Vec::with_capacity(directives.len());
            for directive in &directives {
                sink.emit(AgentEvent::ToolCall {
                    name: directive.name.clone(),
                    params: directive.params.clone(),
                })
                .await?;

                let dispatched = sink.guard(self.tools.dispatch(directive, invocation)).await?;
                run.record_dispatch(directive, &dispatched);

                sink.emit(AgentEvent::ToolResult {
                    name: directive.name.clone(),
                    result: dispatched.outcome.clone(),
                })
                .await?;
                results.push((directive.name.clone(), dispatched.outcome));
            }
            run.continue_after_tools(reply, &results)?;
        }

        warn!(agent = %self.profile.slug, budget, "Round budget exhausted");
        sink.emit(AgentEvent::Content {
            content: LIMIT_MESSAGE.to_string(),
            done: true,
        })
        .await?;
        sink.emit(run.done_event()).await
    }

    /// Probe with a complete call; when it carries no directives, stream the
    /// same transcript for the visible answer.
    async fn probe_round(&self, run: &mut Run, sink: &EventSink) -> std::result::Result<RoundOutcome, Halt> {
        let response = sink
            .guard(self.provider.complete(self.request(&run.transcript, false)))
            .await??;
        run.record_response(&response);

        let directives = directive::parse_directives(&response.message.content);
        if !directives.is_empty() {
            return Ok(RoundOutcome::Directives {
                reply: response.message.content,
                directives,
            });
        }

        let mut chunks = sink
            .guard(self.provider.stream(self.request(&run.transcript, true)))
            .await??;

        while let Some(chunk) = sink.guard(chunks.recv()).await? {
            let chunk = chunk?;
            if let Some(usage) = &chunk.usage {
                run.usage.accumulate(usage);
            }
            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                sink.emit(AgentEvent::Content { content: text, done: false }).await?;
            }
            if chunk.done {
                break;
            }
        }
        Ok(RoundOutcome::Answered)
    }

    /// One streaming call. Text is forwarded until an opening marker shows
    /// up; from there the round is buffered and classified when the model
    /// finishes.
    async fn look_ahead_round(&self, run: &mut Run, sink: &EventSink) -> std::result::Result<RoundOutcome, Halt> {
        let mut chunks = sink
            .guard(self.provider.stream(self.request(&run.transcript, true)))
            .await??;

        let mut reply = String::new();
        let mut emitted = 0;
        let mut holding = false;

        while let Some(chunk) = sink.guard(chunks.recv()).await? {
            let chunk = chunk?;
            if let Some(usage) = &chunk.usage {
                run.usage.accumulate(usage);
            }
            if let Some(text) = &chunk.content {
                reply.push_str(text);
            }
            if !holding {
                let (visible, opened) = directive::visible_prefix_len(&reply);
                if visible > emitted {
                    sink.emit(AgentEvent::Content {
                        content: reply[emitted..visible].to_string(),
                        done: false,
                    })
                    .await?;
                    emitted = visible;
                }
                holding = opened;
            }
            if chunk.done {
                break;
            }
        }

        let segments = directive::scan(&reply);
        let mut directives = Vec::new();
        let mut rest = String::new();
        for segment in segments {
            match segment.kind {
                SegmentKind::Directive(d) => directives.push(d),
                SegmentKind::Text => {
                    let start = segment.range.start.max(emitted);
                    if start < segment.range.end {
                        rest.push_str(&reply[start..segment.range.end]);
                    }
                }
                SegmentKind::Malformed => {}
            }
        }

        if !directives.is_empty() {
            return Ok(RoundOutcome::Directives { reply, directives });
        }
        if !rest.is_empty() {
            sink.emit(AgentEvent::Content { content: rest, done: false }).await?;
        }
        Ok(RoundOutcome::Answered)
    }
}

/// Mutable state of one invocation.
struct Run {
    transcript: Vec<Message>,
    tools_used: Vec<String>,
    thinking: Vec<String>,
    sources: SourceSet,
    usage: Usage,
    model: Option<String>,
}

#[derive(Serialize)]
struct ToolResultEntry<'a> {
    tool: &'a str,
    result: &'a ToolOutcome,
}

impl Run {
    fn record_response(&mut self, response: &ProviderResponse) {
        if let Some(usage) = &response.usage {
            self.usage.accumulate(usage);
        }
        self.model = Some(response.model.clone());
    }

    fn record_dispatch(&mut self, directive: &ToolDirective, dispatched: &Dispatched) {
        self.tools_used.push(directive.name.clone());
        self.thinking.push(format!("Using tool: {}", directive.name));
        self.sources.absorb(dispatched);
    }

    /// Append the raw assistant reply and the tool-results turn.
    fn continue_after_tools(&mut self, reply: String, results: &[(String, ToolOutcome)]) -> Result<()> {
        let entries: Vec<ToolResultEntry<'_>> = results
            .iter()
            .map(|(tool, result)| ToolResultEntry { tool, result })
            .collect();
        let rendered = serde_json::to_string_pretty(&entries)?;

        self.transcript.push(Message::assistant(reply));
        self.transcript.push(Message::user(format!(
            "Tool results:\n{rendered}\n\nPlease provide your response based on these results."
        )));
        Ok(())
    }

    fn done_event(&mut self) -> AgentEvent {
        AgentEvent::Done {
            tools_used: std::mem::take(&mut self.tools_used),
            sources: std::mem::take(&mut self.sources).into_vec(),
        }
    }

    fn finish(self, content: String) -> EngineResult {
        EngineResult {
            content,
            tools_used: self.tools_used,
            thinking: (!self.thinking.is_empty()).then(|| self.thinking.join("\n")),
            sources: self.sources.into_vec(),
            model: self.model,
            usage: (!self.usage.is_empty()).then_some(self.usage),
        }
    }
}

enum RoundOutcome {
    Answered,
    Directives {
        reply: String,
        directives: Vec<ToolDirective>,
    },
}

/// Why a streaming run stopped early.
enum Halt {
    /// The receiver was dropped
    Closed,
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(e: Error) -> Self {
        Self::Failed(e)
    }
}

impl From<ProviderError> for Halt {
    fn from(e: ProviderError) -> Self {
        Self::Failed(e.into())
    }
}

struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventSink {
    async fn emit(&self, event: AgentEvent) -> std::result::Result<(), Halt> {
        self.tx.send(event).await.map_err(|_| Halt::Closed)
    }

    /// Await `fut` unless the receiver goes away first.
    async fn guard<F: Future>(&self, fut: F) -> std::result::Result<F::Output, Halt> {
        tokio::select! {
            biased;
            _ = self.tx.closed() => Err(Halt::Closed),
            out = fut => Ok(out),
        }
    }
}
