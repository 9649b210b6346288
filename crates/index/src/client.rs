//! Elasticsearch HTTP adapter

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use parts_search_config::IndexSettings;
use parts_search_core::{EngineHit, EngineRequest, EngineResponse, Result, SearchEngine};

use crate::IndexError;

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    hits: EsHits,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    #[serde(default)]
    total: Option<EsTotal>,
    #[serde(default)]
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EsTotal {
    // ES 7+: {"value": 42, "relation": "eq"}
    Object { value: u64 },
    // Older clusters report a bare number
    Number(u64),
}

impl EsTotal {
    fn value(&self) -> u64 {
        match self {
            EsTotal::Object { value } => *value,
            EsTotal::Number(n) => *n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: serde_json::Value,
}

/// HTTP-backed implementation of the core `SearchEngine` trait
pub struct ElasticsearchEngine {
    settings: IndexSettings,
    client: Client,
}

impl ElasticsearchEngine {
    pub fn new(settings: IndexSettings) -> std::result::Result<Self, IndexError> {
        let client = Client::builder()
            // Transport ceiling above any per-request timeout
            .timeout(Duration::from_millis(settings.timeout_ms * 2))
            .build()
            .map_err(|e| IndexError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { settings, client })
    }

    fn search_url(&self, index: &str) -> String {
        format!(
            "{}/{}/_search",
            self.settings.base_url.trim_end_matches('/'),
            index
        )
    }

    async fn execute(&self, request: &EngineRequest) -> std::result::Result<EngineResponse, IndexError> {
        let mut body = json!({
            "query": request.query,
            "size": request.size,
            "timeout": format!("{}ms", request.timeout_ms),
            "_source": true,
        });
        if let Some(min_score) = request.min_score {
            body["min_score"] = json!(min_score);
        }

        let response = self
            .client
            .post(self.search_url(&request.index))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IndexError::Engine(format!("HTTP {status}: {text}")));
        }

        let parsed: EsSearchResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(e.to_string()))?;

        let hits = parsed
            .hits
            .hits
            .into_iter()
            .map(|h| EngineHit {
                id: h.id,
                score: h.score.unwrap_or(0.0),
                source: h.source,
            })
            .collect();

        Ok(EngineResponse {
            hits,
            total: parsed.hits.total.map(|t| t.value()),
        })
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchEngine {
    async fn search(&self, request: EngineRequest) -> Result<EngineResponse> {
        debug!(index = %request.index, size = request.size, "index search");
        let deadline = Duration::from_millis(request.timeout_ms);

        match tokio::time::timeout(deadline, self.execute(&request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(IndexError::Timeout(request.timeout_ms).into()),
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/_cluster/health", self.settings.base_url.trim_end_matches('/'));
        matches!(
            self.client.get(url).timeout(Duration::from_secs(2)).send().await,
            Ok(resp) if resp.status().is_success()
        )
    }
}
