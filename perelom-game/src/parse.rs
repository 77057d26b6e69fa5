//! Reply parsing shared by every external-call site.
//!
//! The generator is asked for a single JSON object but routinely wraps it
//! in prose or code fences. Parsing runs three stages in order, accepting
//! the first success: strict parse, fence-stripped parse, then extraction
//! of the first balanced `{...}` block. Total failure yields `None`; call
//! sites treat that as a recoverable generation failure, never a panic.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

use crate::state::Choice;
use crate::stats::StatKey;

/// Run the three-stage policy and return the parsed object, if any.
#[must_use]
pub fn parse_reply_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }
    if let Some(value) = parse_object(&strip_code_fences(trimmed)) {
        return Some(value);
    }
    extract_balanced_object(trimmed).and_then(parse_object)
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Remove markdown fence markers anywhere in the text.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Find the first `{` and its matching close brace by depth counting,
/// skipping braces inside string literals. Returns the candidate slice.
#[must_use]
pub fn extract_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Accept a field of uncertain shape: deserialize if it matches, otherwise
/// drop it to `None` instead of failing the whole reply.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: for<'a> Deserialize<'a>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityPatch {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
}

/// The `updates` block of a turn reply: per-stat deltas at the top level
/// plus optional entity instructions. Malformed entity fields are dropped
/// individually rather than poisoning the reply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyUpdates {
    #[serde(default, deserialize_with = "lenient")]
    pub add_item: Option<EntityPatch>,
    #[serde(default, deserialize_with = "lenient")]
    pub remove_item: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub update_item: Option<EntityPatch>,
    #[serde(default, deserialize_with = "lenient")]
    pub add_npc: Option<EntityPatch>,
    #[serde(default, deserialize_with = "lenient")]
    pub remove_npc: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub update_npc: Option<EntityPatch>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ReplyUpdates {
    /// Numeric delta proposed for `key`, if the reply carried one.
    #[must_use]
    pub fn stat_delta(&self, key: StatKey) -> Option<i32> {
        let value = self.extra.get(key.as_str())?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .and_then(|v| i32::try_from(v).ok())
    }
}

/// A well-formed main-turn reply.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnReply {
    pub story: String,
    pub choices: Vec<Choice>,
    #[serde(default, deserialize_with = "lenient")]
    pub updates: Option<ReplyUpdates>,
}

/// Parse and validate a main-turn reply: `story` and `choices` must both
/// be present and non-empty.
#[must_use]
pub fn parse_turn_reply(text: &str) -> Option<TurnReply> {
    let value = parse_reply_object(text)?;
    let reply: TurnReply = serde_json::from_value(value).ok()?;
    if reply.story.trim().is_empty() || reply.choices.is_empty() {
        return None;
    }
    Some(reply)
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiracleReply {
    pub miracle_story: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[must_use]
pub fn parse_miracle_reply(text: &str) -> Option<MiracleReply> {
    let value = parse_reply_object(text)?;
    let reply: MiracleReply = serde_json::from_value(value).ok()?;
    if reply.miracle_story.trim().is_empty() {
        return None;
    }
    Some(reply)
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GameOverReply {
    #[serde(default)]
    pub epilogue: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub epitaph: String,
}

#[must_use]
pub fn parse_game_over_reply(text: &str) -> Option<GameOverReply> {
    let value = parse_reply_object(text)?;
    serde_json::from_value(value).ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryReply {
    pub summary: String,
}

#[must_use]
pub fn parse_summary_reply(text: &str) -> Option<SummaryReply> {
    let value = parse_reply_object(text)?;
    let reply: SummaryReply = serde_json::from_value(value).ok()?;
    if reply.summary.trim().is_empty() {
        return None;
    }
    Some(reply)
}
