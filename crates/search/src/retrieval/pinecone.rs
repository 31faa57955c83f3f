//! Pinecone data-plane client

use super::{VectorMatch, VectorQuery, VectorStore};
use clarus_common::config::PayloadFields;
use clarus_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

const API_VERSION: &str = "2024-07";

/// Vector store backed by a Pinecone index
pub struct PineconeStore {
    client: reqwest::Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
    fields: PayloadFields,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

impl PineconeStore {
    /// Create a client for the index at `host`.
    ///
    /// The console shows hosts without a scheme; https is assumed then.
    pub fn new(
        host: &str,
        api_key: String,
        namespace: Option<String>,
        fields: PayloadFields,
        timeout: Duration,
    ) -> Result<Self> {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(AppError::Configuration {
                message: "Pinecone host is empty".to_string(),
            });
        }

        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            host,
            api_key,
            namespace: namespace.filter(|ns| !ns.is_empty()),
            fields,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_request<'a>(&'a self, query: &'a VectorQuery) -> QueryRequest<'a> {
        QueryRequest {
            vector: &query.vector,
            top_k: query.top_k,
            include_metadata: true,
            include_values: false,
            filter: query.filter.as_ref().map(|f| f.to_pinecone(&self.fields)),
            namespace: self.namespace.as_deref(),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for PineconeStore {
    async fn query(&self, query: &VectorQuery) -> Result<Vec<VectorMatch>> {
        let start = Instant::now();
        let url = format!("{}/query", self.host);

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&self.build_request(query))
            .send()
            .await
            .map_err(|e| AppError::VectorStore {
                message: format!("Query request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore {
                message: format!("Pinecone error {}: {}", status, body),
            });
        }

        let result: QueryResponse = response.json().await.map_err(|e| AppError::VectorStore {
            message: format!("Failed to parse query response: {}", e),
        })?;

        tracing::debug!(
            matches = result.matches.len(),
            filtered = query.filter.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pinecone query completed"
        );

        Ok(result.matches)
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::MetadataFilter;
    use serde_json::json;

    fn store(host: &str, namespace: Option<&str>) -> PineconeStore {
        PineconeStore::new(
            host,
            "pc-test".to_string(),
            namespace.map(str::to_string),
            PayloadFields::default(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_host_normalization() {
        assert_eq!(
            store("bijbel-abc.svc.pinecone.io/", None).host(),
            "https://bijbel-abc.svc.pinecone.io"
        );
        assert_eq!(store("http://localhost:5080", None).host(), "http://localhost:5080");
        assert!(PineconeStore::new(
            "  ",
            "k".to_string(),
            None,
            PayloadFields::default(),
            Duration::from_secs(1)
        )
        .is_err());
    }

    #[test]
    fn test_request_body() {
        let store = store("bijbel.svc.pinecone.io", Some("hsv"));
        let query = VectorQuery {
            vector: vec![0.25, 0.5],
            top_k: 5,
            filter: Some(MetadataFilter {
                book: "Johannes".to_string(),
                chapter: Some(3),
            }),
        };

        let body = serde_json::to_value(store.build_request(&query)).unwrap();
        assert_eq!(
            body,
            json!({
                "vector": [0.25, 0.5],
                "topK": 5,
                "includeMetadata": true,
                "includeValues": false,
                "filter": {"boek": {"$eq": "Johannes"}, "hoofdstuk": {"$eq": 3}},
                "namespace": "hsv"
            })
        );
    }

    #[test]
    fn test_unfiltered_body_omits_filter_and_empty_namespace() {
        let store = store("bijbel.svc.pinecone.io", Some(""));
        let query = VectorQuery {
            vector: vec![1.0],
            top_k: 3,
            filter: None,
        };

        let body = serde_json::to_value(store.build_request(&query)).unwrap();
        assert!(body.get("filter").is_none());
        assert!(body.get("namespace").is_none());
    }

    #[test]
    fn test_response_decoding() {
        let raw = json!({
            "matches": [
                {"id": "jhn-3-16", "score": 0.91, "metadata": {"tekst": "Want zo lief", "boek": "Johannes", "hoofdstuk": 3.0, "vers": 16.0}},
                {"id": "bare", "score": 0.4}
            ],
            "namespace": "",
            "usage": {"readUnits": 5}
        });

        let response: QueryResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matches[0].id, "jhn-3-16");
        assert!(response.matches[1].metadata.is_empty());
    }
}
