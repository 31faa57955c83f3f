//! Clarus Context Engine
//!
//! The conversation core behind `/chat`:
//! - Chat model client with tool calling
//! - `search_bible` tool decoding and dispatch
//! - Bounded tool-call loop
//! - Service boundary that turns every outcome into an answer or an error

pub mod llm;
pub mod orchestrator;
pub mod service;
pub mod tools;

pub use llm::{ChatMessage, ChatModel, ModelReply, ToolCallRequest};
pub use orchestrator::{ConversationOutcome, ConversationState, Orchestrator};
pub use service::{ChatReply, ChatRequest, ChatService, HistoryMessage};
pub use tools::{ScriptureTool, ToolDispatcher, ToolError};
