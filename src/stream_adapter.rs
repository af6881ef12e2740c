//! C2 — Stream Adapter: normalises user-yielded chunks into canonical
//! message + usage form (spec §4.2). Pure, synchronous, no I/O.

use crate::model::{to_content_blocks, ContentBlock, Message, MessageStatus, RawContent, Role, Usage};
use crate::ids::{new_id, now_secs};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{role?, content}` carried by a chunk's `message` field.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub content: RawContent,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChunkUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}

/// One value yielded by the user generator. `r#type` is free-form and
/// opaque — semantics are driven purely by the presence of `message`/`usage`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chunk {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Option<ChunkMessage>,
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Result of draining a full chunk stream (spec §4.2 `collect`).
pub struct Collected {
    pub output: Vec<Message>,
    pub usage: Option<Usage>,
}

/// Produce the ordered text blocks for one chunk's `message`, or an empty
/// sequence if `message` is absent.
pub fn to_content_blocks_for_chunk(message: Option<&ChunkMessage>) -> Vec<ContentBlock> {
    match message {
        Some(m) => to_content_blocks(&m.content),
        None => Vec::new(),
    }
}

/// Build a fresh assistant Message from one chunk's `message`, attaching
/// `run_id`. Panics if `message` is `None` — callers only invoke this when
/// `chunk.message.is_some()`.
fn message_from_chunk(run_id: &str, message: &ChunkMessage) -> Message {
    Message {
        id: new_id("msg"),
        object: "thread.message",
        created_at: now_secs(),
        thread_id: None,
        run_id: Some(run_id.to_string()),
        role: Role::Assistant,
        status: MessageStatus::Completed,
        content: to_content_blocks(&message.content),
        metadata: None,
    }
}

/// Sum `prompt_tokens`/`completion_tokens` across every chunk that reported
/// `usage`, returning `None` if none did (spec §4.2).
pub fn accumulate_usage(chunks: &[Chunk]) -> Option<Usage> {
    let mut prompt_tokens = 0u64;
    let mut completion_tokens = 0u64;
    let mut has_usage = false;

    for chunk in chunks {
        if let Some(usage) = &chunk.usage {
            prompt_tokens += usage.prompt_tokens.unwrap_or(0);
            completion_tokens += usage.completion_tokens.unwrap_or(0);
            has_usage = true;
        }
    }

    has_usage.then(|| Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    })
}

/// Drain a complete, already-collected chunk sequence into `{output, usage}`.
/// One fresh Message per chunk whose `message` is present (spec §4.2) — used
/// by `syncRun`/`asyncRun`. `streamRun` instead accumulates all deltas into a
/// single Message (spec §4.3's `thread.message.*` event pair).
pub fn collect(chunks: &[Chunk], run_id: &str) -> Collected {
    let output = chunks
        .iter()
        .filter_map(|c| c.message.as_ref().map(|m| message_from_chunk(run_id, m)))
        .collect();
    Collected {
        output,
        usage: accumulate_usage(chunks),
    }
}
