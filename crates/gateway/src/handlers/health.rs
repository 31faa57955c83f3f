//! Health check handlers

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use clarus_common::config::AppConfig;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub llm: CheckResult,
    pub embedding: CheckResult,
    pub vector_store: CheckResult,
    pub canon: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub detail: String,
}

impl CheckResult {
    fn new(up: bool, detail: impl Into<String>) -> Self {
        Self {
            status: if up { "up" } else { "down" }.to_string(),
            detail: detail.into(),
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: clarus_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports which upstreams are configured.
///
/// Upstreams are not called; a probe should not spend model quota.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let checks = checks(&state.config, state.canon.len());

    let all_up = [&checks.llm, &checks.embedding, &checks.vector_store, &checks.canon]
        .iter()
        .all(|check| check.is_up());

    let status = if all_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_up { "ready" } else { "not_ready" }.to_string(),
            checks,
        }),
    )
}

fn checks(config: &AppConfig, books: usize) -> HealthChecks {
    let llm = &config.llm;
    let embedding = &config.embedding;
    let store = &config.vector_store;

    HealthChecks {
        llm: CheckResult::new(
            llm.provider == "mock" || llm.api_key.is_some(),
            format!("{} ({})", llm.model, llm.provider),
        ),
        embedding: CheckResult::new(
            embedding.provider == "mock" || embedding.api_key.is_some(),
            format!("{} ({})", embedding.model, embedding.provider),
        ),
        vector_store: CheckResult::new(
            store.provider == "mock" || (store.host.is_some() && store.api_key.is_some()),
            format!(
                "{} ({})",
                store.index.as_deref().unwrap_or("-"),
                store.provider
            ),
        ),
        canon: CheckResult::new(books == 66, format!("{} books", books)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_follow_configuration() {
        let mut config = AppConfig::default();
        let report = checks(&config, 66);
        assert!(!report.llm.is_up());
        assert!(!report.vector_store.is_up());
        assert!(report.canon.is_up());

        config.llm.api_key = Some("sk-test".to_string());
        config.embedding.provider = "mock".to_string();
        config.vector_store.host = Some("bijbel.svc.pinecone.io".to_string());
        config.vector_store.api_key = Some("pc-test".to_string());

        let report = checks(&config, 66);
        assert!(report.llm.is_up());
        assert!(report.embedding.is_up());
        assert!(report.vector_store.is_up());
        assert_eq!(report.llm.detail, "gpt-4.1-mini (openai)");
    }
}
