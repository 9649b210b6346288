//! End-to-end pipeline tests against in-process mock adapters
//!
//! Covers the full query-to-response flow: exact part numbers with a warm
//! cache, fitment queries with LLM enhancement, catalog browsing, and
//! degraded operation under LLM and index outages.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use parts_search_config::Settings;
use parts_search_core::response::UnderstandingMethod;
use parts_search_core::{
    EngineHit, EngineRequest, EngineResponse, GenerationOptions, LanguageModel, PipelineListener,
    Result, SearchEngine, SearchError, SearchLogEntry, SearchType,
};
use parts_search_pipeline::{SearchOptions, SearchPipeline};

/// Mock engine with a tiny in-memory catalog; matching is keyed off the
/// query JSON so each strategy exercises its own path.
struct CatalogEngine {
    calls: Mutex<usize>,
    fail_first: Mutex<usize>,
}

impl CatalogEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
            fail_first: Mutex::new(0),
        })
    }

    fn failing_first(n: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
            fail_first: Mutex::new(n),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }

    fn camry_pads() -> Vec<EngineHit> {
        vec![
            EngineHit {
                id: "pad-trw".into(),
                score: 7.2,
                source: json!({
                    "partNumber": "GDB1330",
                    "partNumberNormalized": "GDB1330",
                    "brand": "TRW",
                    "category": "brake pad",
                    "description": "Front axle brake pad set with acoustic wear warning contact",
                    "price": 42.5,
                    "stock": 14,
                    "imageUrl": "https://img.example/gdb1330.jpg",
                    "vehicleFitments": [
                        { "make": "Toyota", "model": "Camry", "yearFrom": 2018, "yearTo": 2023 }
                    ],
                }),
            },
            EngineHit {
                id: "pad-old".into(),
                score: 5.1,
                source: json!({
                    "partNumber": "GDB1110",
                    "partNumberNormalized": "GDB1110",
                    "brand": "TRW",
                    "category": "brake pad",
                    "description": "Brake pad set, older platform",
                    "price": 31.0,
                    "stock": 2,
                    "vehicleFitments": [
                        { "make": "Toyota", "model": "Camry", "yearFrom": 2006, "yearTo": 2011 }
                    ],
                }),
            },
        ]
    }

    fn toyota_oem() -> EngineHit {
        EngineHit {
            id: "oem-toyota".into(),
            score: 11.0,
            source: json!({
                "partNumber": "04152-YZZA1",
                "partNumberNormalized": "04152YZZA1",
                "brand": "Toyota",
                "category": "oil filter",
                "description": "Genuine Toyota oil filter element kit",
                "price": 11.9,
                "stock": 40,
                "imageUrl": "https://img.example/04152.jpg",
            }),
        }
    }

    fn bosch_filters() -> Vec<EngineHit> {
        vec![
            EngineHit {
                id: "bosch-p3355".into(),
                score: 6.4,
                source: json!({
                    "partNumber": "0451103355",
                    "partNumberNormalized": "0451103355",
                    "brand": "Bosch",
                    "category": "oil filter",
                    "description": "Bosch spin-on oil filter with anti-drainback valve",
                    "price": 8.9,
                    "stock": 60,
                    "imageUrl": "https://img.example/p3355.jpg",
                }),
            },
            EngineHit {
                id: "bosch-p3316".into(),
                score: 5.9,
                source: json!({
                    "partNumber": "0451103316",
                    "partNumberNormalized": "0451103316",
                    "brand": "Bosch",
                    "category": "oil filter",
                    "description": "Bosch oil filter insert",
                    "price": 7.5,
                    "stock": 0,
                    "inStock": false,
                }),
            },
        ]
    }
}

#[async_trait]
impl SearchEngine for CatalogEngine {
    async fn search(&self, request: EngineRequest) -> Result<EngineResponse> {
        *self.calls.lock() += 1;
        {
            let mut fail_first = self.fail_first.lock();
            if *fail_first > 0 {
                *fail_first -= 1;
                return Err(SearchError::Engine("connection refused".into()));
            }
        }

        let query = request.query.to_string();
        let hits = if query.contains("04152YZZA1") {
            vec![Self::toyota_oem()]
        } else if query.contains("vehicleFitments.make") {
            Self::camry_pads()
        } else if query.contains("\"brand\":[\"Bosch\"]") || query.contains("Bosch") {
            Self::bosch_filters()
        } else {
            Vec::new()
        };
        Ok(EngineResponse {
            total: Some(hits.len() as u64),
            hits,
        })
    }
}

/// LLM that returns one scripted body for every call, or always fails
struct ScriptedLlm {
    body: Option<String>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    fn returning(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Some(body.to_string()),
            calls: Mutex::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: None,
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate_content(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        *self.calls.lock() += 1;
        match &self.body {
            Some(body) => Ok(body.clone()),
            None => Err(SearchError::Llm("provider unavailable".into())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Captures analytics log entries for assertions on stage internals
#[derive(Default)]
struct CaptureListener {
    entries: Mutex<Vec<SearchLogEntry>>,
}

impl PipelineListener for CaptureListener {
    fn on_log_entry(&self, entry: &SearchLogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

fn base_settings() -> Settings {
    let mut settings = Settings::new();
    settings.llm.enabled = false;
    settings
}

#[tokio::test]
async fn test_exact_part_number_with_warm_cache() {
    let engine = CatalogEngine::new();
    let listener = Arc::new(CaptureListener::default());
    let pipeline = SearchPipeline::builder(base_settings())
        .with_engine(engine.clone())
        .with_listener(listener.clone())
        .build();

    let first = pipeline.search("04152-YZZA1", SearchOptions::default()).await;
    assert!(first.success);
    let understanding = first.understanding.as_ref().unwrap();
    assert_eq!(understanding.intent.part_number.as_deref(), Some("04152-YZZA1"));
    assert_eq!(understanding.search_type, SearchType::PartNumber);
    assert!(understanding.confidence >= 0.9);
    assert_eq!(first.results[0].part_number.as_deref(), Some("04152-YZZA1"));

    let entry = &listener.entries.lock()[0];
    assert_eq!(entry.retrieval_source, "exactPartNumber");

    // Identical request: served from the full-response cache
    let second = pipeline.search("04152-YZZA1", SearchOptions::default()).await;
    assert_eq!(second.meta.cache_status, "cache");
    assert_eq!(engine.calls(), 1);
    let first_ids: Vec<&str> = first.results.iter().map(|r| r.id.as_str()).collect();
    let second_ids: Vec<&str> = second.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn test_fitment_query_with_llm_enhancement() {
    let engine = CatalogEngine::new();
    let llm = ScriptedLlm::returning(
        r#"{"category": "brake pad", "vehicleMake": "Toyota", "vehicleModel": "Camry",
            "vehicleYear": 2019, "searchType": "fitment", "confidence": 0.85}"#,
    );
    let listener = Arc::new(CaptureListener::default());
    let mut settings = Settings::new();
    settings.llm.enabled = true;
    let pipeline = SearchPipeline::builder(settings)
        .with_engine(engine)
        .with_llm(llm.clone())
        .with_listener(listener.clone())
        .build();

    let response = pipeline
        .search("brake pads for 2019 Toyota Camry", SearchOptions::default())
        .await;
    assert!(response.success);

    let understanding = response.understanding.as_ref().unwrap();
    assert_eq!(understanding.method, UnderstandingMethod::Hybrid);
    assert_eq!(understanding.intent.category.as_deref(), Some("brake pad"));
    assert_eq!(understanding.intent.vehicle_make.as_deref(), Some("Toyota"));
    assert_eq!(understanding.intent.vehicle_model.as_deref(), Some("Camry"));
    assert_eq!(understanding.intent.vehicle_year, Some(2019));
    assert_eq!(understanding.search_type, SearchType::Fitment);
    assert!(understanding.confidence >= 0.8);
    assert_eq!(llm.calls(), 1);

    assert_eq!(listener.entries.lock()[0].retrieval_source, "fitment");
    assert_eq!(
        response.explanation.as_ref().unwrap().interpretation,
        "Showing brake pad for 2019 Toyota Camry"
    );

    // The 2006-2011 pad fails the 2019 year containment filter
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "pad-trw");
    assert!(response.results[0]
        .match_reasons
        .iter()
        .any(|r| r.reason == "vehicle-fitment"));
}

#[tokio::test]
async fn test_catalog_browse_with_cross_sell() {
    let engine = CatalogEngine::new();
    let listener = Arc::new(CaptureListener::default());
    let pipeline = SearchPipeline::builder(base_settings())
        .with_engine(engine)
        .with_listener(listener.clone())
        .build();

    let response = pipeline.search("Bosch oil filter", SearchOptions::default()).await;
    assert!(response.success);

    let understanding = response.understanding.as_ref().unwrap();
    assert_eq!(understanding.intent.brand, vec!["Bosch"]);
    assert_eq!(understanding.intent.category.as_deref(), Some("oil filter"));
    assert_eq!(understanding.search_type, SearchType::Catalog);
    assert_eq!(listener.entries.lock()[0].retrieval_source, "catalogBrowse");

    // Cross-sell from the category adjacency map
    let terms: Vec<&str> = response
        .explanation
        .as_ref()
        .unwrap()
        .suggestions
        .iter()
        .filter_map(|s| s.term.as_deref())
        .collect();
    assert!(terms.contains(&"air filter") || terms.contains(&"fuel filter"));

    // Stock priority: the in-stock filter ranks above the out-of-stock one
    assert_eq!(response.results[0].id, "bosch-p3355");
}

#[tokio::test]
async fn test_empty_query_is_rejected_without_backend_calls() {
    let engine = CatalogEngine::new();
    let pipeline = SearchPipeline::builder(base_settings())
        .with_engine(engine.clone())
        .build();

    let response = pipeline.search("   ", SearchOptions::default()).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Empty query"));
    assert_eq!(response.pagination.total, 0);
    assert_eq!(response.pagination.total_pages, 0);
    assert!(response.results.is_empty());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_llm_outage_degrades_to_token_parsing() {
    let engine = CatalogEngine::new();
    let llm = ScriptedLlm::failing();
    let mut settings = Settings::new();
    settings.llm.enabled = true;
    settings.caching.enabled = false;
    let pipeline = SearchPipeline::builder(settings)
        .with_engine(engine)
        .with_llm(llm.clone())
        .build();

    // Low-confidence queries that trigger LLM enhancement; the LLM breaker
    // trips after 3 consecutive failures
    for query in [
        "front left wheel bearing",
        "rear wheel bearing kit",
        "wheel bearing press tool",
    ] {
        let response = pipeline.search(query, SearchOptions::default()).await;
        assert!(response.success);
        assert_eq!(
            response.understanding.as_ref().unwrap().method,
            UnderstandingMethod::TokenFallback
        );
    }
    assert_eq!(llm.calls(), 3);

    // Breaker is open: the LLM is skipped entirely, the search still works
    let response = pipeline
        .search("front brake pads toyota camry", SearchOptions::default())
        .await;
    assert!(response.success);
    assert!(matches!(
        response.understanding.as_ref().unwrap().method,
        UnderstandingMethod::Token | UnderstandingMethod::TokenFallback
    ));
    assert!(!response.results.is_empty());
    assert_eq!(llm.calls(), 3);

    assert!(pipeline.metrics().report().counters.llm_fallbacks >= 3);
}

#[tokio::test]
async fn test_index_outage_opens_breaker_then_recovers() {
    // Fails 5 times, then serves normally
    let engine = CatalogEngine::failing_first(5);
    let mut settings = base_settings();
    settings.caching.enabled = false;
    settings.circuit_breakers.index.timeout_ms = 50;
    let pipeline = SearchPipeline::builder(settings)
        .with_engine(engine.clone())
        .build();

    for _ in 0..5 {
        let response = pipeline.search("Bosch oil filter", SearchOptions::default()).await;
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("SEARCH_ERROR"));
    }
    assert_eq!(engine.calls(), 5);

    // OPEN: fast-fail without touching the adapter
    let response = pipeline.search("Bosch oil filter", SearchOptions::default()).await;
    assert!(!response.success);
    assert_eq!(response.error_code.as_deref(), Some("SEARCH_ERROR"));
    assert_eq!(engine.calls(), 5);

    // After the cooldown the next request probes (HALF_OPEN) and succeeds
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    let probe = pipeline.search("Bosch oil filter", SearchOptions::default()).await;
    assert!(probe.success);
    assert_eq!(engine.calls(), 6);
}

#[tokio::test]
async fn test_response_envelope_invariants() {
    let engine = CatalogEngine::new();
    let pipeline = SearchPipeline::builder(base_settings())
        .with_engine(engine)
        .build();

    let response = pipeline
        .search(
            "Bosch oil filter",
            SearchOptions {
                page: Some(1),
                limit: Some(1),
                filters: None,
            },
        )
        .await;

    // Universal invariants on every successful response
    assert!(response.results.len() <= response.pagination.limit);
    assert!(response.pagination.total >= response.results.len());
    assert_eq!(
        response.pagination.total_pages,
        response.pagination.total.div_ceil(response.pagination.limit)
    );
    for (index, result) in response.results.iter().enumerate() {
        assert_eq!(result.rank, index + 1);
    }
    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}
