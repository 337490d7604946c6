//! Summarize tool: condenses text with a single model call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use toolwright_core::error::ToolError;
use toolwright_core::message::Message;
use toolwright_core::provider::{Provider, ProviderRequest};
use toolwright_core::tool::{Tool, ToolContext, ToolOutcome, ToolParams};

pub const DEFAULT_MAX_WORDS: u64 = 150;

pub struct SummarizeTool {
    provider: Arc<dyn Provider>,
    model: String,
}

impl SummarizeTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Paragraph,
    Bullets,
}

fn instructions(max_words: u64, style: Style) -> String {
    let shape = match style {
        Style::Paragraph => "a single concise paragraph",
        Style::Bullets => "a short list of bullet points",
    };
    format!(
        "Summarize the user's text as {shape} of at most {max_words} words. \
         Keep the key facts and figures. Reply with the summary only."
    )
}

#[async_trait]
impl Tool for SummarizeTool {
    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> &str {
        "Summarize a piece of text. Params: {\"text\": \"...\", \"max_words\": 150, \
         \"style\": \"paragraph\" | \"bullets\"}."
    }

    async fn execute(&self, params: ToolParams, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;

        let max_words = params
            .get("max_words")
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_WORDS);

        let style = match params.get("style").and_then(Value::as_str) {
            None | Some("paragraph") => Style::Paragraph,
            Some("bullets") => Style::Bullets,
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "Unknown style '{other}', expected 'paragraph' or 'bullets'"
                )));
            }
        };

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(instructions(max_words, style)),
                Message::user(text),
            ],
            temperature: 0.3,
            max_tokens: Some(u32::try_from(max_words).unwrap_or(u32::MAX).saturating_mul(2).max(256)),
            stream: false,
            stop: vec![],
        };

        let response = self.provider.complete(request).await?;
        Ok(ToolOutcome::ok(serde_json::json!({
            "summary": response.message.content.trim(),
            "model": response.model,
        })))
    }
}
