//! Page-script event wire format
//!
//! The observer script injected into the page batches its notifications as a
//! compact JSON array:
//!
//! ```text
//! [
//!   {"t":"dom","s":42,"r":[{"x":0,"y":120,"w":954,"h":80}]},
//!   {"t":"scroll","d":-35.5}
//! ]
//! ```
//!
//! - `"dom"`: integer score `s`, optional rectangle list `r`. The rectangles
//!   are folded into one bounding box.
//! - `"scroll"`: numeric delta `d`, truncated to whole pixels.
//! - `"trace"`: diagnostic note with a `reason` string, an integer `delta`
//!   and an optional `clickSeq`. Only self-repainting surfaces act on them.
//!
//! Elements that are not objects, and objects with an unknown `t`, are
//! skipped. A payload that is not valid JSON or not an array is rejected as a
//! whole.

use serde_json::{Map, Value};

use crate::event::{DirtyRect, RefreshEvent};

/// What a trace note reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceReason {
    /// The reading container scrolled (`scroll_event`).
    ScrollEvent,
    /// Scrolling stopped (`scroll_idle`).
    ScrollIdle,
    /// Book content mutated (any `dom_mutation*` reason).
    DomMutation,
    /// Content finished rendering (`content_ready`).
    ContentReady,
    /// Anything else. Logged, never acted on.
    Other,
}

impl TraceReason {
    fn parse(reason: &str) -> Self {
        match reason {
            "scroll_event" => TraceReason::ScrollEvent,
            "scroll_idle" => TraceReason::ScrollIdle,
            "content_ready" => TraceReason::ContentReady,
            r if r.starts_with("dom_mutation") => TraceReason::DomMutation,
            _ => TraceReason::Other,
        }
    }
}

/// One `"trace"` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    /// Reported reason
    pub reason: TraceReason,
    /// Scroll direction and distance for scroll notes (0 otherwise)
    pub delta: i32,
    /// Sequence number of the click that caused the note, if any
    pub click_seq: Option<i64>,
}

/// One usable element of a producer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRecord {
    /// A change to be batched
    Event(RefreshEvent),
    /// A trace note
    Trace(TraceRecord),
}

/// A producer payload that could not be used at all.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Valid JSON, but the top level is not an array.
    #[error("expected a JSON array, got {0}")]
    NotArray(&'static str),
}

/// Parse a producer payload into events and trace notes, in payload order.
pub fn parse_records(json: &str) -> Result<Vec<PageRecord>, PayloadError> {
    let doc: Value = serde_json::from_str(json)?;
    let items = match doc {
        Value::Array(items) => items,
        other => return Err(PayloadError::NotArray(value_kind(&other))),
    };

    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(parse_item)
        .collect())
}

/// Parse a producer payload into events, in payload order. Trace notes are
/// dropped.
pub fn parse_events(json: &str) -> Result<Vec<RefreshEvent>, PayloadError> {
    Ok(parse_records(json)?
        .into_iter()
        .filter_map(|record| match record {
            PageRecord::Event(event) => Some(event),
            PageRecord::Trace(_) => None,
        })
        .collect())
}

fn parse_item(obj: &Map<String, Value>) -> Option<PageRecord> {
    if obj.get("t").and_then(Value::as_str) == Some("trace") {
        return Some(PageRecord::Trace(parse_trace(obj)));
    }
    parse_event(obj).map(PageRecord::Event)
}

fn parse_trace(obj: &Map<String, Value>) -> TraceRecord {
    TraceRecord {
        reason: TraceReason::parse(obj.get("reason").and_then(Value::as_str).unwrap_or("")),
        delta: obj.get("delta").map_or(0, int_field),
        click_seq: obj.get("clickSeq").and_then(Value::as_i64).filter(|seq| *seq >= 0),
    }
}

fn parse_event(obj: &Map<String, Value>) -> Option<RefreshEvent> {
    match obj.get("t").and_then(Value::as_str)? {
        "dom" => {
            let score = obj.get("s").map_or(0, int_field);
            let region = obj.get("r").and_then(Value::as_array).and_then(|rects| {
                rects
                    .iter()
                    .filter_map(Value::as_object)
                    .map(parse_rect)
                    .reduce(|acc, r| acc.union(&r))
            });
            Some(RefreshEvent::dom_change(score, region))
        }
        "scroll" => {
            let delta = obj.get("d").and_then(Value::as_f64).unwrap_or(0.0);
            // `as` saturates at the i32 range and maps NaN to 0.
            #[allow(clippy::cast_possible_truncation)]
            let delta = delta as i32;
            Some(RefreshEvent::scroll(delta))
        }
        other => {
            tracing::trace!(t = other, "skipping unknown event type");
            None
        }
    }
}

fn parse_rect(obj: &Map<String, Value>) -> DirtyRect {
    let field = |k: &str| obj.get(k).map_or(0, int_field);
    DirtyRect::new(field("x"), field("y"), field("w"), field("h"))
}

fn int_field(v: &Value) -> i32 {
    v.as_i64()
        .map(|n| i32::try_from(n).unwrap_or(if n < 0 { i32::MIN } else { i32::MAX }))
        .unwrap_or(0)
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
