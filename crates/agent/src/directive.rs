//! Tool directives embedded in model output.
//!
//! Grammar:
//!
//! ```text
//! occurrence := "<tool>" WS* json-object WS* "</tool>"
//! object     := { "name": string, "params"?: object | null, ... }
//! ```
//!
//! The scanner walks the text once, left to right. At each opening marker
//! it reads exactly one JSON value with `serde_json`'s streaming
//! deserializer, so a JSON string may itself contain `</tool>`. When that
//! fails, the occurrence runs to the next closing marker and is malformed:
//! it is logged, dropped, and still removed from the visible text. An
//! opening marker followed by another opening marker before any closing
//! marker is left as literal text (the innermost opening wins), and an
//! opening marker that is never closed is literal text too.

use std::ops::Range;

use serde::Serialize;
use serde_json::Value;
use toolwright_core::tool::ToolParams;
use tracing::warn;

pub const OPEN: &str = "<tool>";
pub const CLOSE: &str = "</tool>";

/// A request, embedded in model output, to run a named tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDirective {
    pub name: String,
    pub params: ToolParams,
}

impl ToolDirective {
    pub fn new(name: impl Into<String>, params: ToolParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    /// User-visible text
    Text,
    /// A well-formed occurrence
    Directive(ToolDirective),
    /// An occurrence whose payload is not a valid directive
    Malformed,
}

/// One contiguous piece of the scanned text.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Byte range in the scanned text
    pub range: Range<usize>,
}

/// Result of scanning a model response once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub directives: Vec<ToolDirective>,
    /// The text with every occurrence removed, trimmed
    pub visible: String,
}

/// Split `text` into text, directive and malformed segments, in order.
pub fn scan(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find(OPEN) {
        let open = search_from + rel;
        let body = open + OPEN.len();

        let (end, kind) = match read_payload(&text[body..]) {
            Some((consumed, value)) => (body + consumed, classify(value)),
            None => {
                let Some(close_rel) = text[body..].find(CLOSE) else {
                    break;
                };
                let close = body + close_rel;
                if let Some(inner) = text[body..close].find(OPEN) {
                    search_from = body + inner;
                    continue;
                }
                (close + CLOSE.len(), SegmentKind::Malformed)
            }
        };

        if matches!(kind, SegmentKind::Malformed) {
            warn!(occurrence = %&text[open..end], "Dropping malformed tool directive");
        }
        if open > text_start {
            segments.push(Segment {
                kind: SegmentKind::Text,
                range: text_start..open,
            });
        }
        segments.push(Segment {
            kind,
            range: open..end,
        });
        text_start = end;
        search_from = end;
    }

    if text_start < text.len() {
        segments.push(Segment {
            kind: SegmentKind::Text,
            range: text_start..text.len(),
        });
    }
    segments
}

/// Read `WS* <json value> WS* </tool>` from the start of `rest`.
///
/// Returns the number of bytes consumed (closing marker included) and the
/// value, or `None` when `rest` does not have that shape.
fn read_payload(rest: &str) -> Option<(usize, Value)> {
    let leading = rest.len() - rest.trim_start().len();
    let json = &rest[leading..];

    let mut values = serde_json::Deserializer::from_str(json).into_iter::<Value>();
    let value = values.next()?.ok()?;
    let after_value = values.byte_offset();

    let tail = &json[after_value..];
    let trailing = tail.len() - tail.trim_start().len();
    tail[trailing..].starts_with(CLOSE).then(|| {
        (leading + after_value + trailing + CLOSE.len(), value)
    })
}

fn classify(value: Value) -> SegmentKind {
    let Value::Object(mut object) = value else {
        return SegmentKind::Malformed;
    };
    let Some(Value::String(name)) = object.remove("name") else {
        return SegmentKind::Malformed;
    };
    let params = match object.remove("params") {
        None | Some(Value::Null) => ToolParams::new(),
        Some(Value::Object(params)) => params,
        Some(_) => return SegmentKind::Malformed,
    };
    SegmentKind::Directive(ToolDirective { name, params })
}

/// Scan once, returning both the directives and the visible text.
pub fn parse(text: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut visible = String::with_capacity(text.len());
    for segment in scan(text) {
        match segment.kind {
            SegmentKind::Text => visible.push_str(&text[segment.range]),
            SegmentKind::Directive(d) => parsed.directives.push(d),
            SegmentKind::Malformed => {}
        }
    }
    parsed.visible = visible.trim().to_string();
    parsed
}

/// All well-formed directives in order of appearance.
pub fn parse_directives(text: &str) -> Vec<ToolDirective> {
    parse(text).directives
}

/// `text` with every occurrence (valid or malformed) removed, trimmed.
pub fn strip_directives(text: &str) -> String {
    parse(text).visible
}

/// Length of the prefix of `text` that can be shown before a directive
/// could begin.
///
/// Stops at the first opening marker, or holds back a trailing partial
/// marker (e.g. `"<to"`) that the next fragment might complete. The second
/// value reports whether a full opening marker was seen.
pub fn visible_prefix_len(text: &str) -> (usize, bool) {
    if let Some(pos) = text.find(OPEN) {
        return (pos, true);
    }
    let held = (1..OPEN.len())
        .rev()
        .find(|&n| text.ends_with(&OPEN[..n]))
        .unwrap_or(0);
    (text.len() - held, false)
}
