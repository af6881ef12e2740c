//! Wire and storage data model (spec §3).
//!
//! Thread and Run records are stored exactly as they round-trip over the
//! wire; the HTTP layer only trims fields (e.g. `messages` on the
//! `createThread` projection) rather than using separate storage shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Roles & statuses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    Incomplete,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Cancelling,
    Expired,
}

impl RunStatus {
    /// Invariant 2 (spec §3): terminal statuses are sticky.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Expired => "expired",
        }
    }
}

// ─── Content blocks (output side) ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: TextContent },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

impl ContentBlock {
    pub fn text(value: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: TextContent {
                value: value.into(),
                annotations: Vec::new(),
            },
        }
    }
}

// ─── Free-form content (input side & chunk messages) ───────────────────────

/// `string | {type:"text", text:string}[]`, per spec §2 (toContentBlocks) and
/// §6 (InputMessage.content).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Text(String),
    Parts(Vec<RawContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Turn a `message.content` value into ordered text blocks (C2 toContentBlocks).
pub fn to_content_blocks(content: &RawContent) -> Vec<ContentBlock> {
    match content {
        RawContent::Text(s) => vec![ContentBlock::text(s.clone())],
        RawContent::Parts(parts) => parts
            .iter()
            .filter(|p| p.kind == "text")
            .map(|p| ContentBlock::text(p.text.clone().unwrap_or_default()))
            .collect(),
    }
}

// ─── Message ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub object: &'static str,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub role: Role,
    pub status: MessageStatus,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl Message {
    pub fn new_assistant(run_id: &str, content: Vec<ContentBlock>) -> Self {
        Message {
            id: crate::ids::new_id("msg"),
            object: "thread.message",
            created_at: crate::ids::now_secs(),
            thread_id: None,
            run_id: Some(run_id.to_string()),
            role: Role::Assistant,
            status: MessageStatus::Completed,
            content,
            metadata: None,
        }
    }
}

// ─── Thread ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub object: &'static str,
    pub messages: Vec<Message>,
    pub metadata: Value,
    pub created_at: i64,
}

impl Thread {
    pub fn new(metadata: Option<Value>) -> Self {
        Thread {
            id: crate::ids::new_id("thread"),
            object: "thread",
            messages: Vec::new(),
            metadata: metadata.unwrap_or_else(|| Value::Object(Default::default())),
            created_at: crate::ids::now_secs(),
        }
    }

    /// Projection returned by `createThread` — no `messages`.
    pub fn to_summary(&self) -> ThreadSummary {
        ThreadSummary {
            id: self.id.clone(),
            object: self.object,
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    pub object: &'static str,
    pub metadata: Value,
    pub created_at: i64,
}

// ─── Run ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRunConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: InputRole,
    pub content: RawContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub object: &'static str,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub status: RunStatus,
    pub input: Vec<InputMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<AgentRunConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
}

impl Run {
    pub fn new(
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<AgentRunConfig>,
        metadata: Option<Value>,
    ) -> Self {
        Run {
            id: crate::ids::new_id("run"),
            object: "thread.run",
            created_at: crate::ids::now_secs(),
            thread_id,
            status: RunStatus::Queued,
            input,
            output: None,
            last_error: None,
            usage: None,
            config,
            metadata,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            failed_at: None,
        }
    }
}

/// Shallow-merge patch applied by `RecordStore::update_run`. `id`, `object`,
/// `created_at`, and `input` are intentionally absent — spec §4.1 forbids
/// mutating them through `updateRun`.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub status: Option<RunStatus>,
    pub output: Option<Vec<Message>>,
    pub last_error: Option<LastError>,
    pub usage: Option<Usage>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub metadata: Option<Value>,
}

impl RunPatch {
    pub fn apply(self, run: &mut Run) {
        if let Some(v) = self.status {
            run.status = v;
        }
        if let Some(v) = self.output {
            run.output = Some(v);
        }
        if let Some(v) = self.last_error {
            run.last_error = Some(v);
        }
        if let Some(v) = self.usage {
            run.usage = Some(v);
        }
        if let Some(v) = self.started_at {
            run.started_at = Some(v);
        }
        if let Some(v) = self.completed_at {
            run.completed_at = Some(v);
        }
        if let Some(v) = self.cancelled_at {
            run.cancelled_at = Some(v);
        }
        if let Some(v) = self.failed_at {
            run.failed_at = Some(v);
        }
        if let Some(v) = self.metadata {
            run.metadata = Some(v);
        }
    }
}

// ─── HTTP request/response shapes (spec §6) ────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RunInputPayload {
    pub messages: Vec<InputMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRunInput {
    #[serde(default)]
    pub thread_id: Option<String>,
    pub input: RunInputPayload,
    #[serde(default)]
    pub config: Option<AgentRunConfig>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Drop role-`system` input messages before they ever reach thread history
/// (invariant 6, spec §3).
pub fn drop_system_messages(messages: &[InputMessage]) -> Vec<InputMessage> {
    messages
        .iter()
        .filter(|m| m.role != InputRole::System)
        .cloned()
        .collect()
}

/// Convert an accepted `InputMessage` (role already filtered to user/assistant)
/// into a persisted history `Message`.
pub fn input_message_to_history(msg: &InputMessage) -> Message {
    let role = match msg.role {
        InputRole::User => Role::User,
        InputRole::Assistant => Role::Assistant,
        InputRole::System => unreachable!("system messages are filtered before this call"),
    };
    Message {
        id: crate::ids::new_id("msg"),
        object: "thread.message",
        created_at: crate::ids::now_secs(),
        thread_id: None,
        run_id: None,
        role,
        status: MessageStatus::Completed,
        content: to_content_blocks(&msg.content),
        metadata: msg.metadata.clone(),
    }
}
