//! OpenAI-compatible chat completions client

use super::{ChatMessage, ChatModel, ModelReply, ToolCallRequest, ToolDefinition};
use clarus_common::config::LlmConfig;
use clarus_common::errors::{AppError, Result};
use clarus_common::metrics;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl OpenAIChatModel {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "OpenAI API key required (llm.api_key or OPENAI_API_KEY)".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn build_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(message_to_api).collect::<Vec<_>>(),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }

        body
    }

    async fn send(&self, body: &Value) -> Result<ModelReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::LanguageModel {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::LanguageModel {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: CompletionResponse = response.json().await.map_err(|e| AppError::LanguageModel {
            message: format!("Failed to parse response: {}", e),
        })?;

        parse_choice(result)
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAIChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply> {
        let start = Instant::now();
        let body = self.build_body(messages, tools);
        let outcome = self.send(&body).await;
        metrics::record_llm(start.elapsed().as_secs_f64(), &self.model, outcome.is_ok());

        outcome.map_err(|e| {
            tracing::warn!(model = %self.model, error = %e, "Chat completion failed");
            e
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_choice(response: CompletionResponse) -> Result<ModelReply> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AppError::LanguageModel {
            message: "Response contained no choices".to_string(),
        })?;

    tracing::debug!(
        finish_reason = choice.finish_reason.as_deref().unwrap_or("-"),
        tool_calls = choice.message.tool_calls.as_ref().map_or(0, Vec::len),
        "Chat completion received"
    );

    Ok(ModelReply {
        content: choice.message.content.filter(|c| !c.trim().is_empty()),
        tool_calls: choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                ToolCallRequest::from_raw(call.id, call.function.name, &call.function.arguments)
            })
            .collect(),
    })
}

fn message_to_api(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System { content } => json!({"role": "system", "content": content}),
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Assistant { content, tool_calls } => {
            let mut result = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                result["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.raw_arguments(),
                            }
                        })
                    })
                    .collect();
            }
            result
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
            ..
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OpenAIChatModel {
        OpenAIChatModel::from_config(&LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "https://api.openai.com/v1/".to_string(),
            ..LlmConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        assert!(OpenAIChatModel::from_config(&LlmConfig::default()).is_err());
        assert_eq!(model().endpoint, "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_body_carries_sampling_and_tools() {
        let tools = vec![ToolDefinition {
            name: "search_bible".to_string(),
            description: "Zoek verzen".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let body = model().build_body(&[ChatMessage::user("Wat is genade?")], &tools);

        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["max_tokens"], 800);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_bible");
        assert_eq!(body["tool_choice"], "auto");

        let plain = model().build_body(&[ChatMessage::user("hallo")], &[]);
        assert!(plain.get("tools").is_none());
    }

    #[test]
    fn test_assistant_with_tool_calls_to_api() {
        let message = ChatMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCallRequest::new(
                "call_1",
                "search_bible",
                json!({"query": "Mattheüs 20"}),
            )],
        };

        let api = message_to_api(&message);
        assert_eq!(api["role"], "assistant");
        assert!(api["content"].is_null());
        assert_eq!(api["tool_calls"][0]["id"], "call_1");
        assert_eq!(api["tool_calls"][0]["function"]["arguments"], r#"{"query":"Mattheüs 20"}"#);
    }

    #[test]
    fn test_tool_message_to_api() {
        let call = ToolCallRequest::new("call_1", "search_bible", json!({}));
        let api = message_to_api(&ChatMessage::tool_result(&call, r#"{"hits":[]}"#));
        assert_eq!(api, json!({"role": "tool", "tool_call_id": "call_1", "content": r#"{"hits":[]}"#}));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "search_bible", "arguments": "{\"query\":\"1 Kor 13:4-7\",\"top_k\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let reply = parse_choice(serde_json::from_value(raw).unwrap()).unwrap();
        assert!(reply.content.is_none());
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].arguments["top_k"], 3);
    }

    #[test]
    fn test_parse_text_response_and_empty_choices() {
        let raw = json!({"choices": [{"message": {"content": "Welkom terug."}, "finish_reason": "stop"}]});
        let reply = parse_choice(serde_json::from_value(raw).unwrap()).unwrap();
        assert_eq!(reply, ModelReply::text("Welkom terug."));

        let empty = parse_choice(serde_json::from_value(json!({"choices": []})).unwrap());
        assert!(matches!(empty, Err(AppError::LanguageModel { .. })));
    }
}
