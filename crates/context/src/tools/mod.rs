//! Scripture tool
//!
//! The model's tool calls are decoded into a closed set of typed variants.
//! Undecodable calls become an error payload for the model instead of
//! aborting the turn; only upstream failures propagate.

use crate::llm::{ToolCallRequest, ToolDefinition};
use clarus_common::config::RetrievalConfig;
use clarus_common::errors::Result;
use clarus_common::{metrics, ReferenceParser, ScriptureReference};
use clarus_search::{RetrievalHit, ScriptureRetriever};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub const SEARCH_BIBLE: &str = "search_bible";

/// Decoded `search_bible` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBibleArgs {
    pub query: String,
    pub top_k: usize,
}

/// Tools the model may call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptureTool {
    SearchBible(SearchBibleArgs),
}

/// A tool call that cannot be executed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("malformed arguments for {tool}: {reason}")]
    MalformedArguments { tool: String, reason: String },
}

impl ToolError {
    fn malformed(reason: impl Into<String>) -> Self {
        ToolError::MalformedArguments {
            tool: SEARCH_BIBLE.to_string(),
            reason: reason.into(),
        }
    }
}

impl ScriptureTool {
    /// Schemas offered to the model
    pub fn definitions(retrieval: &RetrievalConfig) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: SEARCH_BIBLE.to_string(),
            description: "Zoek bijbelverzen. Geef een verwijzing (\"Mattheüs 20:1-16\", \"1 Kor 13\") \
                          of een onderwerp (\"vergeving\")."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Bijbelverwijzing of zoekterm"
                    },
                    "top_k": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": retrieval.max_top_k,
                        "default": retrieval.default_top_k,
                        "description": "Aantal verzen"
                    }
                },
                "required": ["query"]
            }),
        }]
    }

    pub fn decode(
        call: &ToolCallRequest,
        retrieval: &RetrievalConfig,
    ) -> std::result::Result<Self, ToolError> {
        match call.name.as_str() {
            SEARCH_BIBLE => {
                decode_search_bible(&call.arguments, retrieval).map(ScriptureTool::SearchBible)
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScriptureTool::SearchBible(_) => SEARCH_BIBLE,
        }
    }
}

fn decode_search_bible(
    arguments: &Value,
    retrieval: &RetrievalConfig,
) -> std::result::Result<SearchBibleArgs, ToolError> {
    let object = arguments_object(arguments)?;

    let query = match object.get("query") {
        Some(Value::String(query)) if !query.trim().is_empty() => query.trim().to_string(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(ToolError::malformed("query is required"))
        }
        Some(_) => return Err(ToolError::malformed("query must be a string")),
    };

    let requested = object.get("top_k").and_then(lenient_integer);

    Ok(SearchBibleArgs {
        query,
        top_k: retrieval.clamp_top_k(requested),
    })
}

/// Arguments as an object; some models double-encode them as a JSON string
fn arguments_object(arguments: &Value) -> std::result::Result<Map<String, Value>, ToolError> {
    match arguments {
        Value::Object(object) => Ok(object.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => Ok(object),
            _ => Err(ToolError::malformed("arguments are not a JSON object")),
        },
        _ => Err(ToolError::malformed("arguments are not a JSON object")),
    }
}

/// Integer from a number, a float or a numeric string
fn lenient_integer(value: &Value) -> Option<i64> {
    let float = match value {
        Value::Number(n) => return n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    float.is_finite().then(|| float.round() as i64)
}

#[derive(Serialize)]
struct SearchBiblePayload<'a> {
    query: &'a str,
    #[serde(rename = "ref")]
    reference: Option<&'a ScriptureReference>,
    hits: &'a [RetrievalHit],
}

/// Executes tool calls against the retriever
pub struct ToolDispatcher {
    parser: Arc<ReferenceParser>,
    retriever: Arc<ScriptureRetriever>,
    retrieval: RetrievalConfig,
}

impl ToolDispatcher {
    pub fn new(
        parser: Arc<ReferenceParser>,
        retriever: Arc<ScriptureRetriever>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            parser,
            retriever,
            retrieval,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ScriptureTool::definitions(&self.retrieval)
    }

    /// Run one tool call and return the tool message content.
    ///
    /// Only upstream failures are returned as errors.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> Result<String> {
        let tool = match ScriptureTool::decode(call, &self.retrieval) {
            Ok(tool) => tool,
            Err(e) => {
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %e,
                    "Rejected tool call"
                );
                metrics::record_tool_call(&call.name, "rejected");
                return Ok(json!({"error": e.to_string(), "tool": call.name}).to_string());
            }
        };

        let outcome = match &tool {
            ScriptureTool::SearchBible(args) => self.search_bible(args).await,
        };

        metrics::record_tool_call(tool.name(), if outcome.is_ok() { "ok" } else { "error" });
        outcome
    }

    /// Reference in `query`, retrying once with stray punctuation removed
    pub fn resolve_reference(&self, query: &str) -> Option<ScriptureReference> {
        match self.parser.parse_detailed(query) {
            Ok(reference) => Some(reference),
            Err(miss) if miss.allows_retry() => {
                let cleaned = strip_punctuation(query);
                let retried = (cleaned != query.trim())
                    .then(|| self.parser.parse(&cleaned))
                    .flatten();
                if retried.is_none() {
                    tracing::debug!(query, %miss, "No reference in query");
                }
                retried
            }
            Err(miss) => {
                tracing::debug!(query, %miss, "Reference rejected, searching unfiltered");
                None
            }
        }
    }

    async fn search_bible(&self, args: &SearchBibleArgs) -> Result<String> {
        let reference = self.resolve_reference(&args.query);
        let hits = self
            .retriever
            .retrieve(&args.query, args.top_k, reference.as_ref())
            .await?;

        let label = reference.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
        tracing::info!(
            query = %args.query,
            top_k = args.top_k,
            reference = %label,
            hits = hits.len(),
            "search_bible executed"
        );

        let payload = SearchBiblePayload {
            query: &args.query,
            reference: reference.as_ref(),
            hits: &hits,
        };
        Ok(serde_json::to_string(&payload)?)
    }
}

/// Keep letters, digits and citation punctuation; everything else becomes a space
fn strip_punctuation(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ':' | ',' | '.' | '-' | '–') {
                c
            } else {
                ' '
            }
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
