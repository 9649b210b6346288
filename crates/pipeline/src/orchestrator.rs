//! Pipeline orchestrator
//!
//! Wires the five stages, dispatches listener hooks between them, consults
//! the full-response cache, paginates, and converts stage errors into the
//! structured failure envelope. No stage error ever crosses this boundary as
//! a panic or a raw error.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use parts_search_config::constants::pagination;
use parts_search_config::Settings;
use parts_search_core::response::{
    Pagination, ResponseMeta, ResultItem, SearchResponse, Understanding, UnderstandingMethod,
};
use parts_search_core::{
    BreakerRegistry, BreakerSnapshot, Candidate, EngagementProvider, Intent, KeyValueStore,
    LanguageModel, NeutralEngagement, NoopKeyValueStore, NoopListener, PipelineListener,
    SearchEngine, SearchError, SearchLogEntry,
};
use parts_search_query::normalize_query;

use crate::cache::{canonical_json, CacheNamespace, CacheStats, TieredCache};
use crate::context::{RequestContext, RequestIds};
use crate::explanation::ExplanationStage;
use crate::filtering::{FilterResult, FilterStage};
use crate::metrics::SearchMetrics;
use crate::ranking::{RankResult, RankingStage};
use crate::retrieval::{RetrievalResult, RetrievalStage};
use crate::understanding::{UnderstandingResult, UnderstandingStage};

/// Per-request options from the API surface
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Opaque filter blob; participates in the response cache key
    pub filters: Option<serde_json::Value>,
}

/// Builder for the pipeline, replacing setter injection with explicit
/// construction
pub struct SearchPipelineBuilder {
    settings: Settings,
    engine: Option<Arc<dyn SearchEngine>>,
    llm: Option<Arc<dyn LanguageModel>>,
    l2: Arc<dyn KeyValueStore>,
    engagement: Option<Arc<dyn EngagementProvider>>,
    listeners: Vec<Arc<dyn PipelineListener>>,
}

impl SearchPipelineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            engine: None,
            llm: None,
            l2: Arc::new(NoopKeyValueStore),
            engagement: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn SearchEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace the no-op L2 stand-in with a real distributed store
    pub fn with_l2(mut self, l2: Arc<dyn KeyValueStore>) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_engagement(mut self, engagement: Arc<dyn EngagementProvider>) -> Self {
        self.engagement = Some(engagement);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn PipelineListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> SearchPipeline {
        let settings = self.settings;
        let cache = Arc::new(TieredCache::new(settings.caching.enabled, self.l2));
        let breakers = Arc::new(BreakerRegistry::new(
            settings.circuit_breakers.llm.into(),
            settings.circuit_breakers.index.into(),
            settings.circuit_breakers.db.into(),
        ));
        let engagement = self
            .engagement
            .unwrap_or_else(|| Arc::new(NeutralEngagement));
        let listeners = if self.listeners.is_empty() {
            vec![Arc::new(NoopListener) as Arc<dyn PipelineListener>]
        } else {
            self.listeners
        };

        let understanding = UnderstandingStage::new(
            settings.llm.clone(),
            self.llm,
            Arc::clone(&cache),
            Arc::clone(&breakers),
        );
        let retrieval = RetrievalStage::new(
            settings.index.clone(),
            self.engine,
            Arc::clone(&cache),
            Arc::clone(&breakers),
        );
        let filtering = FilterStage::new(settings.limits.max_results, settings.limits.stock_priority);
        let ranking = RankingStage::new(settings.ranking_experiment_group, engagement);

        SearchPipeline {
            settings,
            understanding,
            retrieval,
            filtering,
            ranking,
            explanation: ExplanationStage::new(),
            cache,
            breakers,
            metrics: Arc::new(SearchMetrics::new()),
            listeners,
            request_ids: RequestIds::new(),
        }
    }
}

/// The assembled pipeline; one instance per process, owned by the host
pub struct SearchPipeline {
    settings: Settings,
    understanding: UnderstandingStage,
    retrieval: RetrievalStage,
    filtering: FilterStage,
    ranking: RankingStage,
    explanation: ExplanationStage,
    cache: Arc<TieredCache>,
    breakers: Arc<BreakerRegistry>,
    metrics: Arc<SearchMetrics>,
    listeners: Vec<Arc<dyn PipelineListener>>,
    request_ids: RequestIds,
}

impl SearchPipeline {
    pub fn builder(settings: Settings) -> SearchPipelineBuilder {
        SearchPipelineBuilder::new(settings)
    }

    pub fn metrics(&self) -> Arc<SearchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn ranking(&self) -> &RankingStage {
        &self.ranking
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    /// Run one search end to end
    pub async fn search(&self, raw_query: &str, options: SearchOptions) -> SearchResponse {
        let request_id = self.request_ids.next();
        let mut ctx = RequestContext::new(
            request_id.clone(),
            Duration::from_millis(self.settings.request_timeout_ms),
        );
        for listener in &self.listeners {
            listener.before_search(&request_id, raw_query);
        }

        let page = options.page.unwrap_or(pagination::DEFAULT_PAGE).max(1);
        let limit = options
            .limit
            .unwrap_or(self.settings.limits.page_size)
            .clamp(1, pagination::MAX_LIMIT);

        // Full-response cache, keyed before any stage runs
        let normalized = normalize_query(raw_query);
        let response_key = (!normalized.is_empty()).then(|| {
            let payload = canonical_json(&json!({
                "query": normalized,
                "page": page,
                "limit": limit,
                "filters": options.filters,
            }));
            TieredCache::key(CacheNamespace::Search, &payload)
        });

        if let Some(key) = &response_key {
            if let Some(mut cached) = self
                .cache
                .get_json::<SearchResponse>(CacheNamespace::Search, key)
                .await
            {
                cached.meta.request_id = request_id.clone();
                cached.meta.cache_status = "cache".to_string();
                cached.timing.total = ctx.elapsed().as_millis() as u64;
                info!(request_id, "search served from response cache");
                for listener in &self.listeners {
                    listener.after_search(&cached);
                }
                return cached;
            }
        }

        let response = match self.run_stages(raw_query, page, limit, &mut ctx).await {
            Ok(response) => {
                if let Some(key) = &response_key {
                    self.cache
                        .set_with_ttl(
                            CacheNamespace::Search,
                            key,
                            serde_json::to_string(&response).unwrap_or_default(),
                            Duration::from_secs(self.settings.caching.search_results_ttl),
                        )
                        .await;
                }
                response
            }
            Err(err) => {
                if !err.is_client_error() {
                    error!(request_id, error = %err, "search failed");
                }
                let mut failure = SearchResponse::failure(raw_query, &err, request_id.clone());
                failure.meta.experiment_group = self.ranking.experiment_group().as_str().to_string();
                failure.timing = ctx.finish();
                let entry = failure_log_entry(&failure, raw_query);
                self.metrics.record_search(&entry, &failure.timing, false);
                for listener in &self.listeners {
                    listener.on_log_entry(&entry);
                    listener.after_search(&failure);
                }
                failure
            }
        };

        response
    }

    async fn run_stages(
        &self,
        raw_query: &str,
        page: usize,
        limit: usize,
        ctx: &mut RequestContext,
    ) -> Result<SearchResponse, SearchError> {
        // Understanding
        let understanding = self.run_understanding(raw_query, ctx).await;
        ctx.timings.understanding = understanding.duration_ms;
        if !understanding.success {
            return Err(SearchError::InvalidQuery);
        }
        let intent = understanding.intent.clone();
        for listener in &self.listeners {
            listener.after_understanding(&ctx.request_id, &intent);
        }
        if understanding.method == UnderstandingMethod::TokenFallback {
            self.metrics.record_llm_fallback();
        }

        // Retrieval
        let retrieval = self.run_retrieval(&intent, ctx).await;
        ctx.timings.retrieval = retrieval.duration_ms;
        if !retrieval.success {
            if let Some(message) = retrieval.error {
                return Err(SearchError::Retrieval(message));
            }
            // Strategy refusal: zero candidates is not an error
        }
        for listener in &self.listeners {
            listener.after_retrieval(&ctx.request_id, retrieval.count, &retrieval.strategy);
        }

        // Filtering
        let filtered = self.run_filtering(&intent, retrieval.candidates, ctx);
        ctx.timings.filtering = filtered.duration_ms;
        for listener in &self.listeners {
            listener.after_filtering(&ctx.request_id, filtered.count);
        }

        // Ranking
        let ranked = self.run_ranking(&intent, filtered.candidates, ctx);
        ctx.timings.ranking = ranked.duration_ms;
        for listener in &self.listeners {
            listener.after_ranking(&ctx.request_id, &ranked.candidates);
        }

        // Pagination over the ranked slice
        let total = ranked.candidates.len();
        let page_start = (page - 1).saturating_mul(limit).min(total);
        let page_end = (page_start + limit).min(total);
        let page_candidates = &ranked.candidates[page_start..page_end];
        let mut items: Vec<ResultItem> =
            page_candidates.iter().map(ResultItem::from_candidate).collect();

        // Explanation
        let explanation = if self.settings.stages.explanation.enabled
            && !ctx.should_skip_stage(self.settings.stages.explanation.timeout_ms)
        {
            self.explanation
                .explain(raw_query, &intent, total, page_candidates, &mut items)
        } else {
            crate::explanation::ExplanationResult::passthrough()
        };
        ctx.timings.explanation = explanation.duration_ms;

        let timing = ctx.finish();
        let response = SearchResponse {
            success: true,
            query: raw_query.to_string(),
            understanding: Some(Understanding {
                confidence: intent.confidence,
                search_type: intent.search_type,
                intent: intent.clone(),
                method: understanding.method,
            }),
            explanation: Some(explanation.block),
            results: items,
            pagination: Pagination::new(page, limit, total),
            timing,
            meta: ResponseMeta {
                request_id: ctx.request_id.clone(),
                experiment_group: ranked.method.clone(),
                cache_status: if understanding.method == UnderstandingMethod::Cache {
                    "hit".to_string()
                } else {
                    "miss".to_string()
                },
            },
            error: None,
            error_code: None,
        };

        let entry = SearchLogEntry {
            request_id: ctx.request_id.clone(),
            timestamp: chrono::Utc::now(),
            raw_query: raw_query.to_string(),
            parsed_intent: intent,
            parse_method: understanding.method,
            parse_time_ms: timing.understanding,
            parse_confidence: response
                .understanding
                .as_ref()
                .map(|u| u.confidence)
                .unwrap_or_default(),
            retrieval_source: retrieval.strategy.clone(),
            candidate_count: retrieval.count,
            retrieval_time_ms: timing.retrieval,
            pre_filter_count: filtered.pre_filter_count,
            post_filter_count: filtered.count,
            filters_applied: filtered.filters_applied.clone(),
            filter_time_ms: timing.filtering,
            ranking_method: ranked.method.clone(),
            weights: ranked.weights.clone(),
            rank_time_ms: timing.ranking,
            result_count: response.results.len(),
            top_result_id: response.results.first().map(|r| r.id.clone()),
            top_result_score: response.results.first().map(|r| r.score),
            total_time_ms: timing.total,
        };
        info!(
            target: "search_analytics",
            entry = %serde_json::to_string(&entry).unwrap_or_default(),
            "search completed"
        );
        self.metrics.record_search(&entry, &timing, true);
        for listener in &self.listeners {
            listener.on_log_entry(&entry);
            listener.after_search(&response);
        }

        Ok(response)
    }

    async fn run_understanding(
        &self,
        raw_query: &str,
        ctx: &RequestContext,
    ) -> UnderstandingResult {
        let stage = &self.settings.stages.understanding;
        if !stage.enabled || ctx.should_skip_stage(stage.timeout_ms) {
            return self.understanding.understand_token_only(raw_query);
        }
        self.understanding.understand(raw_query).await
    }

    async fn run_retrieval(&self, intent: &Intent, ctx: &RequestContext) -> RetrievalResult {
        let stage = &self.settings.stages.retrieval;
        if !stage.enabled || ctx.should_skip_stage(stage.timeout_ms) {
            return RetrievalResult::passthrough();
        }
        self.retrieval.retrieve(intent).await
    }

    fn run_filtering(
        &self,
        intent: &Intent,
        candidates: Vec<Candidate>,
        ctx: &RequestContext,
    ) -> FilterResult {
        let stage = &self.settings.stages.filtering;
        if !stage.enabled || ctx.should_skip_stage(stage.timeout_ms) {
            return FilterResult::passthrough(candidates);
        }
        self.filtering.filter(intent, candidates)
    }

    fn run_ranking(
        &self,
        intent: &Intent,
        candidates: Vec<Candidate>,
        ctx: &RequestContext,
    ) -> RankResult {
        let stage = &self.settings.stages.ranking;
        if !stage.enabled || ctx.should_skip_stage(stage.timeout_ms) {
            return passthrough_rank(candidates, self.ranking.experiment_group().as_str());
        }
        self.ranking.rank(intent, candidates)
    }
}

/// Ranking passthrough: preserve order, assign ranks, reuse the normalized
/// engine score so downstream consumers still see a monotonic score
fn passthrough_rank(mut candidates: Vec<Candidate>, method: &str) -> RankResult {
    let max_score = candidates
        .iter()
        .map(|c| c.score)
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = index + 1;
        candidate.rank_score = (candidate.score / max_score).min(1.0);
    }
    RankResult {
        success: true,
        count: candidates.len(),
        candidates,
        method: format!("{method}-passthrough"),
        weights: parts_search_core::RankWeights::default(),
        duration_ms: 0,
    }
}

fn failure_log_entry(response: &SearchResponse, raw_query: &str) -> SearchLogEntry {
    SearchLogEntry {
        request_id: response.meta.request_id.clone(),
        timestamp: chrono::Utc::now(),
        raw_query: raw_query.to_string(),
        parsed_intent: Intent::default(),
        parse_method: UnderstandingMethod::None,
        parse_time_ms: response.timing.understanding,
        parse_confidence: 0.0,
        retrieval_source: String::new(),
        candidate_count: 0,
        retrieval_time_ms: response.timing.retrieval,
        pre_filter_count: 0,
        post_filter_count: 0,
        filters_applied: Vec::new(),
        filter_time_ms: response.timing.filtering,
        ranking_method: String::new(),
        weights: parts_search_core::RankWeights::default(),
        rank_time_ms: response.timing.ranking,
        result_count: 0,
        top_result_id: None,
        top_result_score: None,
        total_time_ms: response.timing.total,
    }
}
