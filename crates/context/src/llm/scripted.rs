//! Chat model that plays back prepared replies

use super::{ChatMessage, ChatModel, ModelReply, ToolDefinition};
use clarus_common::errors::{AppError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;

enum Script {
    Sequence(VecDeque<ModelReply>),
    Repeat(ModelReply),
    Fail(String),
}

/// Replays a fixed script and records every conversation it was shown.
///
/// A sequence that runs out answers with a language model error.
pub struct ScriptedChatModel {
    script: Mutex<Script>,
    transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `replies` in order
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self::with_script(Script::Sequence(replies.into()))
    }

    /// Answer every call with the same reply
    pub fn repeating(reply: ModelReply) -> Self {
        Self::with_script(Script::Repeat(reply))
    }

    /// Fail every call with a language model error
    pub fn failing(message: &str) -> Self {
        Self::with_script(Script::Fail(message.to_string()))
    }

    /// Number of completions requested so far
    pub fn calls(&self) -> usize {
        self.transcripts.lock().map(|t| t.len()).unwrap_or_default()
    }

    /// Messages sent on each call, oldest first
    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.transcripts
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> Result<ModelReply> {
        let mut script = self.script.lock().map_err(|_| AppError::Internal {
            message: "Scripted model lock poisoned".to_string(),
        })?;

        match &mut *script {
            Script::Sequence(replies) => replies.pop_front().ok_or_else(|| AppError::LanguageModel {
                message: "Script exhausted".to_string(),
            }),
            Script::Repeat(reply) => Ok(reply.clone()),
            Script::Fail(message) => Err(AppError::LanguageModel {
                message: message.clone(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelReply> {
        if let Ok(mut transcripts) = self.transcripts.lock() {
            transcripts.push(messages.to_vec());
        }
        self.next_reply()
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_then_exhausted() {
        let model = ScriptedChatModel::new(vec![ModelReply::text("een"), ModelReply::text("twee")]);
        let messages = [ChatMessage::user("hallo")];

        assert_eq!(model.complete(&messages, &[]).await.unwrap().content.as_deref(), Some("een"));
        assert_eq!(model.complete(&messages, &[]).await.unwrap().content.as_deref(), Some("twee"));
        assert!(model.complete(&messages, &[]).await.is_err());
        assert_eq!(model.calls(), 3);
        assert_eq!(model.transcripts()[0], messages.to_vec());
    }

    #[tokio::test]
    async fn test_failing() {
        let model = ScriptedChatModel::failing("rate limited");
        let err = model.complete(&[], &[]).await.unwrap_err();
        assert!(err.is_upstream());
    }
}
