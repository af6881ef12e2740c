//! A toy `ExecRun` used by the demo binary and integration tests: echoes the
//! last user message back, split into a couple of chunks, with a fixed
//! token-count usage report on the final chunk.

use crate::exec::{CancelToken, ChunkStream, ExecRun};
use crate::model::{InputMessage, RawContent};
use crate::stream_adapter::{Chunk, ChunkMessage, ChunkUsage};
use async_stream::stream;

pub struct EchoAgent;

impl ExecRun for EchoAgent {
    fn exec_run(&self, input: Vec<InputMessage>, cancel: CancelToken) -> ChunkStream {
        let text = last_user_text(&input);
        Box::pin(stream! {
            if cancel.is_cancelled() {
                return;
            }
            let words: Vec<&str> = text.split_whitespace().collect();
            if words.is_empty() {
                yield Ok(Chunk {
                    kind: "assistant".into(),
                    message: Some(ChunkMessage {
                        role: Some("assistant".into()),
                        content: RawContent::Text("(no input)".into()),
                    }),
                    usage: None,
                    extra: Default::default(),
                });
            } else {
                for word in &words {
                    if cancel.is_cancelled() {
                        return;
                    }
                    yield Ok(Chunk {
                        kind: "assistant".into(),
                        message: Some(ChunkMessage {
                            role: Some("assistant".into()),
                            content: RawContent::Text(format!("{word} ")),
                        }),
                        usage: None,
                        extra: Default::default(),
                    });
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }

            yield Ok(Chunk {
                kind: "result".into(),
                message: None,
                usage: Some(ChunkUsage {
                    prompt_tokens: Some(words.len() as u64),
                    completion_tokens: Some(words.len() as u64),
                }),
                extra: Default::default(),
            });
        })
    }
}

fn last_user_text(input: &[InputMessage]) -> String {
    input
        .iter()
        .rev()
        .find_map(|m| match &m.content {
            RawContent::Text(s) => Some(s.clone()),
            RawContent::Parts(parts) => parts
                .iter()
                .find(|p| p.kind == "text")
                .and_then(|p| p.text.clone()),
        })
        .unwrap_or_default()
}
