//! Recorded outputs: the side channel domain methods write into during a
//! run, plus the plain-text rendering handed to the final prompt.
//!
//! Rendering is indentation-sensitive: scalars stay on one line, composites
//! descend with tab indentation, homogeneous rows collapse into a
//! column-header table, and the depth guard emits `∞` instead of descending
//! without bound.

use std::sync::{Mutex, PoisonError};

use chrono::DateTime;
use serde_json::Value;

/// Depth at which the renderer stops descending and emits the sentinel.
const MAX_RENDER_DEPTH: usize = 16;

/// One recorded entry.
#[derive(Debug, Clone)]
pub struct RecordedOutput {
    pub category: String,
    pub content: Value,
}

/// Thread-safe, insertion-ordered list of recorded outputs. Safe to append
/// from concurrently running Task handlers.
#[derive(Debug, Default)]
pub struct OutputRecorder {
    entries: Mutex<Vec<RecordedOutput>>,
}

impl OutputRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `(category, content)` to the list.
    pub fn record(&self, category: impl Into<String>, content: Value) {
        self.lock().push(RecordedOutput {
            category: category.into(),
            content,
        });
    }

    /// Copy of the recorded entries, in insertion order.
    pub fn snapshot(&self) -> Vec<RecordedOutput> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all entries; called between runs sharing one recorder.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordedOutput>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render entries as indented plain text for the final prompt.
pub fn render_outputs(entries: &[RecordedOutput]) -> String {
    let mut out = String::new();
    for entry in entries {
        if is_simple(&entry.content) {
            out.push_str(&entry.category);
            out.push_str(": ");
            out.push_str(&render_scalar(&entry.content));
            out.push('\n');
        } else {
            out.push_str(&entry.category);
            out.push_str(":\n");
            render_value(&mut out, &entry.content, 1);
        }
    }
    out
}

fn is_simple(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => match DateTime::parse_from_rfc3339(text) {
            Ok(instant) => render_display_timestamp(&instant),
            Err(_) => text.clone(),
        },
        _ => String::new(),
    }
}

fn render_display_timestamp(instant: &DateTime<chrono::FixedOffset>) -> String {
    let base = instant.format("%Y-%m-%d %H:%M:%S").to_string();
    if instant.offset().local_minus_utc() == 0 {
        format!("{base}Z")
    } else {
        format!("{base}{}", instant.format("%:z"))
    }
}

fn render_value(out: &mut String, value: &Value, depth: usize) {
    let indent = "\t".repeat(depth);
    if depth > MAX_RENDER_DEPTH {
        out.push_str(&indent);
        out.push_str("∞\n");
        return;
    }
    match value {
        simple if is_simple(simple) => {
            out.push_str(&indent);
            out.push_str(&render_scalar(simple));
            out.push('\n');
        }
        Value::Object(map) => {
            for (key, entry) in map {
                if is_simple(entry) {
                    out.push_str(&indent);
                    out.push_str(key);
                    out.push_str(": ");
                    out.push_str(&render_scalar(entry));
                    out.push('\n');
                } else {
                    out.push_str(&indent);
                    out.push_str(key);
                    out.push_str(":\n");
                    render_value(out, entry, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            if let Some(headers) = table_headers(items) {
                out.push_str(&indent);
                out.push_str(&headers.join("\t"));
                out.push('\n');
                for item in items {
                    if let Value::Object(row) = item {
                        let cells: Vec<String> = headers
                            .iter()
                            .map(|header| {
                                row.get(header.as_str())
                                    .map(render_scalar)
                                    .unwrap_or_default()
                            })
                            .collect();
                        out.push_str(&indent);
                        out.push_str(&cells.join("\t"));
                        out.push('\n');
                    }
                }
            } else {
                for item in items {
                    if is_simple(item) {
                        out.push_str(&indent);
                        out.push_str(&render_scalar(item));
                        out.push('\n');
                    } else {
                        out.push_str(&indent);
                        out.push_str("-\n");
                        render_value(out, item, depth + 1);
                    }
                }
            }
        }
        _ => {}
    }
}

/// A sequence renders as a table when every element is a map with the same
/// keys and only simple values.
fn table_headers(items: &[Value]) -> Option<Vec<String>> {
    let first = items.first()?.as_object()?;
    if first.is_empty() || !first.values().all(is_simple) {
        return None;
    }
    let headers: Vec<String> = first.keys().cloned().collect();
    for item in items {
        let row = item.as_object()?;
        if row.len() != headers.len() || !row.values().all(is_simple) {
            return None;
        }
        if !headers.iter().all(|header| row.contains_key(header)) {
            return None;
        }
    }
    Some(headers)
}
