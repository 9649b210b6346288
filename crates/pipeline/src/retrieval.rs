//! Stage 2: retrieval
//!
//! Exactly one strategy is selected from the intent. Exact part-number
//! lookups probe the per-part cache first and fall back to a fuzzy query on
//! an index miss. Every engine call runs under the index circuit breaker.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use parts_search_config::IndexSettings;
use parts_search_core::{
    BreakerRegistry, BreakerRole, Candidate, EngineHit, EngineRequest, EngineResponse, Intent,
    PartRecord, Result, SearchEngine, SearchError,
};
use parts_search_index::query::{build_query, fuzzy_part_number_query, normalize_part_number};
use parts_search_index::Strategy;

use crate::cache::{CacheNamespace, TieredCache};

/// Stage output
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub success: bool,
    pub candidates: Vec<Candidate>,
    pub count: usize,
    pub strategy: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl RetrievalResult {
    pub fn empty(strategy: Strategy, duration_ms: u64) -> Self {
        Self {
            success: false,
            candidates: Vec::new(),
            count: 0,
            strategy: strategy.as_str().to_string(),
            duration_ms,
            error: None,
        }
    }

    /// Passthrough default when the stage is disabled or skipped
    pub fn passthrough() -> Self {
        Self {
            success: true,
            candidates: Vec::new(),
            count: 0,
            strategy: "disabled".to_string(),
            duration_ms: 0,
            error: None,
        }
    }
}

/// Retrieval stage
pub struct RetrievalStage {
    settings: IndexSettings,
    engine: Option<Arc<dyn SearchEngine>>,
    cache: Arc<TieredCache>,
    breakers: Arc<BreakerRegistry>,
}

impl RetrievalStage {
    pub fn new(
        settings: IndexSettings,
        engine: Option<Arc<dyn SearchEngine>>,
        cache: Arc<TieredCache>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            settings,
            engine,
            cache,
            breakers,
        }
    }

    /// Run the stage for one intent
    pub async fn retrieve(&self, intent: &Intent) -> RetrievalResult {
        let start = Instant::now();
        let strategy = parts_search_index::select_strategy(intent);

        let Some(engine) = &self.engine else {
            return RetrievalResult {
                error: Some("no search engine configured".to_string()),
                ..RetrievalResult::empty(strategy, start.elapsed().as_millis() as u64)
            };
        };

        match strategy {
            Strategy::ExactPartNumber => {
                self.retrieve_part_number(engine, intent, start).await
            }
            _ => {
                let Some(query) = build_query(intent, strategy) else {
                    // Multi-field refusal: nothing to search on
                    debug!(strategy = %strategy, "no usable terms, returning empty");
                    return RetrievalResult::empty(strategy, start.elapsed().as_millis() as u64);
                };
                self.run_query(engine, strategy, query, start).await
            }
        }
    }

    /// Exact part-number path: per-part cache, exact query, fuzzy fallback
    async fn retrieve_part_number(
        &self,
        engine: &Arc<dyn SearchEngine>,
        intent: &Intent,
        start: Instant,
    ) -> RetrievalResult {
        let part_number = intent.part_number.as_deref().unwrap_or_default();
        let normalized = normalize_part_number(part_number);
        let cache_key = TieredCache::key(CacheNamespace::Parts, &normalized);

        if let Some(hits) = self
            .cache
            .get_json::<Vec<EngineHit>>(CacheNamespace::Parts, &cache_key)
            .await
        {
            let candidates = hits_to_candidates(hits);
            return RetrievalResult {
                success: true,
                count: candidates.len(),
                candidates,
                strategy: Strategy::ExactPartNumber.as_str().to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            };
        }

        let Some(exact) = build_query(intent, Strategy::ExactPartNumber) else {
            return RetrievalResult::empty(
                Strategy::ExactPartNumber,
                start.elapsed().as_millis() as u64,
            );
        };
        let mut result = self.run_query(engine, Strategy::ExactPartNumber, exact, start).await;

        // Index miss: try edit-distance matching before giving up
        if result.success && result.candidates.is_empty() {
            debug!(part_number, "exact lookup empty, trying fuzzy fallback");
            let fuzzy = fuzzy_part_number_query(part_number);
            result = self.run_query(engine, Strategy::FuzzyPartNumber, fuzzy, start).await;
        }

        if result.success && !result.candidates.is_empty() {
            let hits: Vec<EngineHit> = result
                .candidates
                .iter()
                .map(|c| EngineHit {
                    id: c.id.clone(),
                    score: c.score,
                    source: serde_json::to_value(&c.source).unwrap_or_default(),
                })
                .collect();
            self.cache
                .set_json(CacheNamespace::Parts, &cache_key, &hits)
                .await;
        }

        result
    }

    async fn run_query(
        &self,
        engine: &Arc<dyn SearchEngine>,
        strategy: Strategy,
        query: serde_json::Value,
        start: Instant,
    ) -> RetrievalResult {
        let request = EngineRequest {
            index: self.settings.index_name.clone(),
            query,
            size: self.settings.max_candidates,
            min_score: Some(self.settings.min_score),
            timeout_ms: self.settings.timeout_ms,
        };

        let breaker = self.breakers.get(BreakerRole::Index);
        let engine = Arc::clone(engine);
        let outcome: Result<EngineResponse> = breaker
            .execute(
                || async move {
                    let response = engine.search(request).await?;
                    Ok(Ok(response))
                },
                Err,
            )
            .await;

        match outcome {
            Ok(response) => {
                let candidates = hits_to_candidates(response.hits);
                RetrievalResult {
                    success: true,
                    count: candidates.len(),
                    candidates,
                    strategy: strategy.as_str().to_string(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(err) => {
                warn!(strategy = %strategy, error = %err, "retrieval failed");
                RetrievalResult {
                    success: false,
                    candidates: Vec::new(),
                    count: 0,
                    strategy: strategy.as_str().to_string(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(err.public_message()),
                }
            }
        }
    }
}

fn hits_to_candidates(hits: Vec<EngineHit>) -> Vec<Candidate> {
    hits.into_iter()
        .map(|hit| {
            let record: PartRecord = serde_json::from_value(hit.source).unwrap_or_default();
            Candidate::new(hit.id, hit.score, record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parts_search_core::NoopKeyValueStore;
    use serde_json::json;

    struct MockEngine {
        responses: Mutex<Vec<Result<EngineResponse>>>,
        requests: Mutex<Vec<EngineRequest>>,
    }

    impl MockEngine {
        fn new(responses: Vec<Result<EngineResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn hits(parts: &[(&str, f64)]) -> EngineResponse {
            EngineResponse {
                hits: parts
                    .iter()
                    .map(|(id, score)| EngineHit {
                        id: id.to_string(),
                        score: *score,
                        source: json!({ "partNumber": id, "brand": "Bosch" }),
                    })
                    .collect(),
                total: Some(parts.len() as u64),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl SearchEngine for MockEngine {
        async fn search(&self, request: EngineRequest) -> Result<EngineResponse> {
            self.requests.lock().push(request);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(EngineResponse::default())
            } else {
                responses.remove(0)
            }
        }
    }

    fn stage(engine: Arc<MockEngine>) -> RetrievalStage {
        RetrievalStage::new(
            IndexSettings::default(),
            Some(engine),
            Arc::new(TieredCache::new(true, Arc::new(NoopKeyValueStore))),
            Arc::new(BreakerRegistry::default()),
        )
    }

    fn part_number_intent(pn: &str) -> Intent {
        Intent {
            part_number: Some(pn.to_string()),
            confidence: 0.9,
            ..Intent::default()
        }
    }

    #[tokio::test]
    async fn test_exact_part_number_hits_and_caches() {
        let engine = Arc::new(MockEngine::new(vec![Ok(MockEngine::hits(&[("04152-YZZA1", 9.0)]))]));
        let stage = stage(engine.clone());
        let intent = part_number_intent("04152-YZZA1");

        let first = stage.retrieve(&intent).await;
        assert!(first.success);
        assert_eq!(first.count, 1);
        assert_eq!(first.strategy, "exactPartNumber");
        assert_eq!(engine.request_count(), 1);

        // Second call is served from the per-part cache
        let second = stage.retrieve(&intent).await;
        assert!(second.success);
        assert_eq!(second.count, 1);
        assert_eq!(engine.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fuzzy_fallback_on_exact_miss() {
        let engine = Arc::new(MockEngine::new(vec![
            Ok(EngineResponse::default()),
            Ok(MockEngine::hits(&[("04152-YZZA2", 4.0)])),
        ]));
        let stage = stage(engine.clone());
        let result = stage.retrieve(&part_number_intent("04152-YZZA1")).await;

        assert!(result.success);
        assert_eq!(result.strategy, "fuzzyPartNumber");
        assert_eq!(result.count, 1);
        assert_eq!(engine.request_count(), 2);
    }

    #[tokio::test]
    async fn test_multi_field_refuses_empty_intent() {
        let engine = Arc::new(MockEngine::new(vec![]));
        let stage = stage(engine.clone());
        let result = stage.retrieve(&Intent::default()).await;

        assert!(!result.success);
        assert!(result.error.is_none());
        assert_eq!(result.strategy, "multiField");
        assert_eq!(engine.request_count(), 0);
    }

    #[tokio::test]
    async fn test_engine_failure_is_reported() {
        let engine = Arc::new(MockEngine::new(vec![Err(SearchError::Engine("down".into()))]));
        let stage = stage(engine);
        let intent = Intent {
            brand: vec!["Bosch".into()],
            category: Some("oil filter".into()),
            ..Intent::default()
        };
        let result = stage.retrieve(&intent).await;
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(result.strategy, "catalogBrowse");
    }

    #[tokio::test]
    async fn test_breaker_opens_after_consecutive_failures() {
        let failures: Vec<Result<EngineResponse>> =
            (0..5).map(|_| Err(SearchError::Engine("down".into()))).collect();
        let engine = Arc::new(MockEngine::new(failures));
        let breakers = Arc::new(BreakerRegistry::default());
        let stage = RetrievalStage::new(
            IndexSettings::default(),
            Some(engine.clone()),
            Arc::new(TieredCache::new(false, Arc::new(NoopKeyValueStore))),
            breakers.clone(),
        );
        let intent = Intent {
            brand: vec!["Bosch".into()],
            category: Some("oil filter".into()),
            ..Intent::default()
        };

        // Index breaker threshold is 5
        for _ in 0..5 {
            assert!(!stage.retrieve(&intent).await.success);
        }
        assert_eq!(
            breakers.get(BreakerRole::Index).state(),
            parts_search_core::BreakerState::Open
        );

        // Further requests fail fast without touching the engine
        let result = stage.retrieve(&intent).await;
        assert!(!result.success);
        assert_eq!(engine.request_count(), 5);
    }

    #[tokio::test]
    async fn test_fitment_strategy_selected() {
        let engine = Arc::new(MockEngine::new(vec![Ok(MockEngine::hits(&[("p1", 3.0)]))]));
        let stage = stage(engine);
        let intent = Intent {
            category: Some("brake pad".into()),
            vehicle_make: Some("Toyota".into()),
            vehicle_year: Some(2019),
            ..Intent::default()
        };
        let result = stage.retrieve(&intent).await;
        assert!(result.success);
        assert_eq!(result.strategy, "fitment");
    }
}
