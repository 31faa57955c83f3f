//! Tool-call loop
//!
//! Alternates between the chat model and the tool dispatcher until the
//! model answers in text or the round budget is spent. A round is one model
//! call; a reply that still asks for tools after the last round ends the
//! run as exhausted with those calls left unexecuted.

use crate::llm::{ChatMessage, ChatModel, ModelReply, ToolCallRequest};
use crate::tools::ToolDispatcher;
use clarus_common::errors::{AppError, Result};
use std::sync::Arc;

/// Where a run currently is
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCallRequest>),
    Final(String),
    Exhausted,
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::AwaitingModel => "awaiting_model",
            ConversationState::ExecutingTools(_) => "executing_tools",
            ConversationState::Final(_) => "final",
            ConversationState::Exhausted => "exhausted",
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    Answer { text: String, rounds: u32 },
    Exhausted { rounds: u32 },
}

impl ConversationOutcome {
    pub fn rounds(&self) -> u32 {
        match self {
            ConversationOutcome::Answer { rounds, .. }
            | ConversationOutcome::Exhausted { rounds } => *rounds,
        }
    }
}

pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    dispatcher: Arc<ToolDispatcher>,
    max_rounds: u32,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        dispatcher: Arc<ToolDispatcher>,
        max_rounds: u32,
    ) -> Self {
        Self {
            model,
            dispatcher,
            max_rounds: max_rounds.max(1),
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Drive the loop from a seeded message list
    pub async fn run(&self, mut messages: Vec<ChatMessage>) -> Result<ConversationOutcome> {
        let tools = self.dispatcher.definitions();
        let mut rounds = 0u32;
        let mut state = ConversationState::AwaitingModel;

        loop {
            tracing::trace!(state = state.name(), rounds, "Orchestrator step");

            state = match state {
                ConversationState::AwaitingModel => {
                    rounds += 1;
                    let reply = self.model.complete(&messages, &tools).await?;
                    self.after_reply(reply, rounds, &mut messages)?
                }
                ConversationState::ExecutingTools(calls) => {
                    for call in &calls {
                        let content = self.dispatcher.dispatch(call).await?;
                        messages.push(ChatMessage::tool_result(call, content));
                    }
                    ConversationState::AwaitingModel
                }
                ConversationState::Final(text) => {
                    return Ok(ConversationOutcome::Answer { text, rounds });
                }
                ConversationState::Exhausted => {
                    return Ok(ConversationOutcome::Exhausted { rounds });
                }
            };
        }
    }

    fn after_reply(
        &self,
        reply: ModelReply,
        rounds: u32,
        messages: &mut Vec<ChatMessage>,
    ) -> Result<ConversationState> {
        if !reply.has_tool_calls() {
            return reply.content.map(ConversationState::Final).ok_or_else(|| {
                AppError::LanguageModel {
                    message: "Reply carried neither text nor tool calls".to_string(),
                }
            });
        }

        let ModelReply { content, tool_calls } = reply;

        tracing::debug!(
            round = rounds,
            calls = tool_calls.len(),
            tools = %tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(","),
            "Model requested tools"
        );

        messages.push(ChatMessage::Assistant {
            content,
            tool_calls: tool_calls.clone(),
        });

        if rounds >= self.max_rounds {
            tracing::warn!(
                rounds,
                pending = tool_calls.len(),
                "Round budget spent with tool calls pending"
            );
            return Ok(ConversationState::Exhausted);
        }

        Ok(ConversationState::ExecutingTools(tool_calls))
    }
}
