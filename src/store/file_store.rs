//! Default file-backed `RecordStore`.
//!
//! Layout (spec §6):
//! ```text
//! <data_dir>/threads/<thread_id>.json
//! <data_dir>/runs/<run_id>.json
//! ```
//! Atomic write protocol grounded on the teacher's
//! `tasks::queue_serializer::flush_queue`: serialize to a sibling temp file,
//! then rename over the target. The temp file name embeds a uuid (spec §4.1)
//! so concurrent writers never collide on the same tmp path.

use super::RecordStore;
use crate::error::RuntimeError;
use crate::ids::safe_join;
use crate::model::{AgentRunConfig, InputMessage, Message, Run, RunPatch, Thread};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            base_dir: base_dir.into(),
        }
    }

    fn threads_dir(&self) -> PathBuf {
        self.base_dir.join("threads")
    }

    fn runs_dir(&self) -> PathBuf {
        self.base_dir.join("runs")
    }

    fn thread_path(&self, id: &str) -> Result<PathBuf, RuntimeError> {
        safe_join(&self.threads_dir(), &format!("{id}.json"))
    }

    fn run_path(&self, id: &str) -> Result<PathBuf, RuntimeError> {
        safe_join(&self.runs_dir(), &format!("{id}.json"))
    }

    /// Serialize `value` to a sibling `<target>.<uuid>.tmp` file, then rename
    /// over `target`. The rename is the atomicity boundary: readers never
    /// observe a partially-written file.
    async fn write_atomic<T: serde::Serialize>(target: &Path, value: &T) -> Result<(), RuntimeError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_name = format!(
            "{}.{}.tmp",
            target.file_name().and_then(|n| n.to_str()).unwrap_or("record"),
            uuid::Uuid::new_v4()
        );
        let tmp_path = target.with_file_name(tmp_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, target).await?;
        Ok(())
    }

    /// Read + deserialize, distinguishing a missing file (`NotFound`) from
    /// any other I/O failure.
    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
        entity: &'static str,
        id: &str,
    ) -> Result<T, RuntimeError> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RuntimeError::not_found(entity, id))
            }
            Err(e) => Err(RuntimeError::Store(e)),
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn init(&self) -> Result<(), RuntimeError> {
        fs::create_dir_all(self.threads_dir()).await?;
        fs::create_dir_all(self.runs_dir()).await?;
        tracing::debug!(base_dir = %self.base_dir.display(), "file store initialized");
        Ok(())
    }

    async fn create_thread(&self, metadata: Option<Value>) -> Result<Thread, RuntimeError> {
        let thread = Thread::new(metadata);
        let path = self.thread_path(&thread.id)?;
        Self::write_atomic(&path, &thread).await?;
        Ok(thread)
    }

    async fn get_thread(&self, id: &str) -> Result<Thread, RuntimeError> {
        let path = self.thread_path(id)?;
        Self::read_json(&path, "Thread", id).await
    }

    async fn append_messages(&self, id: &str, msgs: Vec<Message>) -> Result<(), RuntimeError> {
        let path = self.thread_path(id)?;
        let mut thread: Thread = Self::read_json(&path, "Thread", id).await?;
        thread.messages.extend(msgs);
        Self::write_atomic(&path, &thread).await
    }

    async fn create_run(
        &self,
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<AgentRunConfig>,
        metadata: Option<Value>,
    ) -> Result<Run, RuntimeError> {
        let run = Run::new(input, thread_id, config, metadata);
        let path = self.run_path(&run.id)?;
        Self::write_atomic(&path, &run).await?;
        Ok(run)
    }

    async fn get_run(&self, id: &str) -> Result<Run, RuntimeError> {
        let path = self.run_path(id)?;
        Self::read_json(&path, "Run", id).await
    }

    async fn update_run(&self, id: &str, patch: RunPatch) -> Result<Run, RuntimeError> {
        let path = self.run_path(id)?;
        let mut run: Run = Self::read_json(&path, "Run", id).await?;
        patch.apply(&mut run);
        Self::write_atomic(&path, &run).await?;
        Ok(run)
    }
}

/// Resolve the default file store root per spec §6: `$TEGG_AGENT_DATA_DIR`,
/// falling back to `<cwd>/.agent-data`.
pub fn default_data_dir() -> PathBuf {
    std::env::var_os("TEGG_AGENT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".agent-data")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputRole, RawContent};
    use tempfile::TempDir;

    fn make_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        store.init().await.unwrap();
    }

    #[tokio::test]
    async fn create_and_get_thread_round_trips() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        let created = store.create_thread(None).await.unwrap();
        assert!(created.id.starts_with("thread_"));
        assert!(created.messages.is_empty());

        let fetched = store.get_thread(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.created_at, created.created_at);
        assert_eq!(fetched.messages.len(), 0);
    }

    #[tokio::test]
    async fn get_thread_not_found() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        let err = store.get_thread("thread_nope").await.unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn append_messages_preserves_order() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        let thread = store.create_thread(None).await.unwrap();

        let m1 = Message::new_assistant("run_1", vec![crate::model::ContentBlock::text("a")]);
        let m2 = Message::new_assistant("run_1", vec![crate::model::ContentBlock::text("b")]);
        store
            .append_messages(&thread.id, vec![m1.clone()])
            .await
            .unwrap();
        store
            .append_messages(&thread.id, vec![m2.clone()])
            .await
            .unwrap();

        let fetched = store.get_thread(&thread.id).await.unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(fetched.messages[0].id, m1.id);
        assert_eq!(fetched.messages[1].id, m2.id);
    }

    #[tokio::test]
    async fn create_and_update_run() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        let input = vec![InputMessage {
            role: InputRole::User,
            content: RawContent::Text("hi".into()),
            metadata: None,
        }];
        let run = store
            .create_run(input, None, None, None)
            .await
            .unwrap();
        assert!(run.id.starts_with("run_"));
        assert_eq!(run.status, crate::model::RunStatus::Queued);

        let patch = RunPatch {
            status: Some(crate::model::RunStatus::InProgress),
            started_at: Some(123),
            ..Default::default()
        };
        let updated = store.update_run(&run.id, patch).await.unwrap();
        assert_eq!(updated.status, crate::model::RunStatus::InProgress);
        assert_eq!(updated.started_at, Some(123));
        assert_eq!(updated.id, run.id);
        assert_eq!(updated.created_at, run.created_at);
    }

    #[tokio::test]
    async fn get_run_not_found() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        let err = store.get_run("run_nope").await.unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_traversal_id() {
        let (_dir, store) = make_store();
        store.init().await.unwrap();
        let err = store.get_thread("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, RuntimeError::IllegalArgument(_)));
    }
}
