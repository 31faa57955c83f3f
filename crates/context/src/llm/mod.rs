//! Chat model abstraction
//!
//! The model is a black box that takes the conversation plus tool schema and
//! answers with text, tool calls, or both.

mod openai;
mod scripted;

pub use openai::OpenAIChatModel;
pub use scripted::ScriptedChatModel;

use clarus_common::config::LlmConfig;
use clarus_common::errors::{AppError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One message of a conversation
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// Result of one tool call, correlated by call id
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(call: &ToolCallRequest, content: impl Into<String>) -> Self {
        ChatMessage::Tool {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            ChatMessage::System { .. } => "system",
            ChatMessage::User { .. } => "user",
            ChatMessage::Assistant { .. } => "assistant",
            ChatMessage::Tool { .. } => "tool",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,

    /// Decoded arguments; `Value::String` holds raw text that was not JSON
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Build from the wire form, where arguments arrive as a JSON string
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw_arguments: &str) -> Self {
        let arguments = serde_json::from_str(raw_arguments)
            .unwrap_or_else(|_| Value::String(raw_arguments.to_string()));
        Self::new(id, name, arguments)
    }

    /// Arguments as sent back to the model in the assistant message
    pub fn raw_arguments(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Function schema offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What the model answered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Chat completion with tool support
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply>;

    fn model_name(&self) -> &str;
}

/// Create a chat model based on configuration
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChatModel::from_config(config)?)),
        "mock" => {
            tracing::warn!("Using mock chat model; answers are canned");
            Ok(Arc::new(ScriptedChatModel::repeating(ModelReply::text(
                "Clarus draait nu zonder taalmodel.",
            ))))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown chat model provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_arguments_are_kept_when_not_json() {
        let call = ToolCallRequest::from_raw("call_1", "search_bible", "{query: Johannes");
        assert_eq!(call.arguments, Value::String("{query: Johannes".to_string()));
        assert_eq!(call.raw_arguments(), "{query: Johannes");

        let call = ToolCallRequest::from_raw("call_2", "search_bible", r#"{"query":"Psalm 23"}"#);
        assert_eq!(call.arguments, json!({"query": "Psalm 23"}));
        assert_eq!(call.raw_arguments(), r#"{"query":"Psalm 23"}"#);
    }

    #[test]
    fn test_tool_result_correlates_with_call() {
        let call = ToolCallRequest::new("call_9", "search_bible", json!({}));
        let message = ChatMessage::tool_result(&call, "{}");
        assert_eq!(message.role(), "tool");
        assert_eq!(
            message,
            ChatMessage::Tool {
                tool_call_id: "call_9".to_string(),
                name: "search_bible".to_string(),
                content: "{}".to_string(),
            }
        );
    }

    #[test]
    fn test_create_chat_model() {
        let err = create_chat_model(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));

        let config = LlmConfig {
            provider: "mock".to_string(),
            ..LlmConfig::default()
        };
        let model = tokio_test::assert_ok!(create_chat_model(&config));
        assert_eq!(model.model_name(), "scripted");
    }
}
