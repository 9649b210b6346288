//! Stage 1: query understanding
//!
//! Token parsing first, LLM enhancement only when it can still add signal:
//! the LLM is skipped on a cache hit, when token confidence is already high,
//! when a confident part number is present, or when its breaker is open.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use parts_search_config::constants::understanding as thresholds;
use parts_search_config::LlmSettings;
use parts_search_core::response::UnderstandingMethod;
use parts_search_core::{
    BreakerRegistry, BreakerRole, GenerationOptions, Intent, LanguageModel,
};
use parts_search_llm::{build_intent_prompt, extract_json_object, looks_like_intent};
use parts_search_query::{merge_hybrid, normalize_query, parse_query, SchemaValidator};

use crate::cache::{CacheNamespace, TieredCache};

/// Stage output
#[derive(Debug, Clone)]
pub struct UnderstandingResult {
    pub success: bool,
    pub intent: Intent,
    pub method: UnderstandingMethod,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl UnderstandingResult {
    fn empty_query(duration_ms: u64) -> Self {
        Self {
            success: false,
            intent: Intent::empty(),
            method: UnderstandingMethod::None,
            duration_ms,
            error: Some("Empty query".to_string()),
        }
    }
}

/// Query understanding stage
pub struct UnderstandingStage {
    settings: LlmSettings,
    llm: Option<Arc<dyn LanguageModel>>,
    cache: Arc<TieredCache>,
    breakers: Arc<BreakerRegistry>,
}

impl UnderstandingStage {
    pub fn new(
        settings: LlmSettings,
        llm: Option<Arc<dyn LanguageModel>>,
        cache: Arc<TieredCache>,
        breakers: Arc<BreakerRegistry>,
    ) -> Self {
        Self {
            settings,
            llm,
            cache,
            breakers,
        }
    }

    /// Run the stage. Returns `success = false` only for empty queries.
    pub async fn understand(&self, raw_query: &str) -> UnderstandingResult {
        let start = Instant::now();

        let normalized = normalize_query(raw_query);
        if normalized.is_empty() {
            return UnderstandingResult::empty_query(start.elapsed().as_millis() as u64);
        }

        // Cache first
        let cache_key = TieredCache::key(CacheNamespace::Intent, &normalized);
        if let Some(intent) = self.cache.get_json::<Intent>(CacheNamespace::Intent, &cache_key).await
        {
            return UnderstandingResult {
                success: true,
                intent,
                method: UnderstandingMethod::Cache,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            };
        }

        // Token parse never fails on a non-empty query
        let token = match parse_query(raw_query) {
            Ok(parse) => parse,
            Err(_) => return UnderstandingResult::empty_query(start.elapsed().as_millis() as u64),
        };

        let (intent, method) = self.maybe_enhance(raw_query, token.intent).await;

        // Final lenient validation keeps downstream invariants honest
        let outcome = SchemaValidator::lenient().validate_intent(&intent);
        if !outcome.warnings.is_empty() {
            debug!(warnings = ?outcome.warnings, "intent validation warnings");
        }
        let intent = outcome.intent;

        if intent.confidence >= thresholds::CACHE_MIN_CONFIDENCE {
            self.cache
                .set_json(CacheNamespace::Intent, &cache_key, &intent)
                .await;
        }

        UnderstandingResult {
            success: true,
            intent,
            method,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
        }
    }

    /// Token parse only, skipping cache and LLM. Used when the stage budget
    /// is exhausted or the stage's enhancements are disabled; the parse
    /// itself is constitutive and cannot be skipped.
    pub fn understand_token_only(&self, raw_query: &str) -> UnderstandingResult {
        let start = Instant::now();
        match parse_query(raw_query) {
            Ok(parse) => {
                let outcome = SchemaValidator::lenient().validate_intent(&parse.intent);
                UnderstandingResult {
                    success: true,
                    intent: outcome.intent,
                    method: UnderstandingMethod::Token,
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(_) => UnderstandingResult::empty_query(start.elapsed().as_millis() as u64),
        }
    }

    /// Decide whether to call the LLM and merge its output when usable
    async fn maybe_enhance(
        &self,
        raw_query: &str,
        token_intent: Intent,
    ) -> (Intent, UnderstandingMethod) {
        let Some(llm) = &self.llm else {
            return (token_intent, UnderstandingMethod::Token);
        };
        if !self.settings.enabled
            || token_intent.confidence >= self.settings.threshold
            || token_intent.has_confident_part_number()
        {
            return (token_intent, UnderstandingMethod::Token);
        }

        let breaker = self.breakers.get(BreakerRole::Llm);
        let prompt = build_intent_prompt(raw_query);
        let options = GenerationOptions {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature.min(0.1),
            timeout_ms: self.settings.timeout_ms,
        };

        let completion: Option<String> = breaker
            .execute(
                || async {
                    let text = llm.generate_content(&prompt, &options).await?;
                    Ok(Some(text))
                },
                |err| {
                    warn!(error = %err, "LLM enhancement failed, using token intent");
                    None
                },
            )
            .await;

        let Some(completion) = completion else {
            return (token_intent, UnderstandingMethod::TokenFallback);
        };

        match self.lower_completion(&completion) {
            Some(llm_intent) => {
                let merged = merge_hybrid(token_intent, llm_intent);
                (merged, UnderstandingMethod::Hybrid)
            }
            None => (token_intent, UnderstandingMethod::TokenFallback),
        }
    }

    /// Parse and validate LLM output: first JSON object, quick plausibility
    /// check, strict validation with a lenient retry
    fn lower_completion(&self, completion: &str) -> Option<Intent> {
        let raw = extract_json_object(completion)?;
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "LLM output was not valid JSON");
                return None;
            }
        };
        if !looks_like_intent(&value) {
            warn!("LLM output failed the intent quick-check, ignoring");
            return None;
        }

        let strict = SchemaValidator::strict().validate_value(&value);
        if strict.valid {
            return Some(strict.intent);
        }
        debug!(errors = ?strict.errors, "strict validation failed, retrying leniently");

        let lenient = SchemaValidator::lenient().validate_value(&value);
        lenient.valid.then_some(lenient.intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parts_search_core::{NoopKeyValueStore, Result, SearchError, SearchType};

    struct ScriptedLlm {
        responses: Mutex<Vec<Result<String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate_content(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
            *self.calls.lock() += 1;
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Err(SearchError::Llm("exhausted".into()))
            } else {
                responses.remove(0)
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn stage(llm: Option<Arc<dyn LanguageModel>>) -> UnderstandingStage {
        UnderstandingStage::new(
            LlmSettings::default(),
            llm,
            Arc::new(TieredCache::new(true, Arc::new(NoopKeyValueStore))),
            Arc::new(BreakerRegistry::default()),
        )
    }

    #[tokio::test]
    async fn test_empty_query() {
        let result = stage(None).understand("   ").await;
        assert!(!result.success);
        assert_eq!(result.method, UnderstandingMethod::None);
        assert_eq!(result.error.as_deref(), Some("Empty query"));
    }

    #[tokio::test]
    async fn test_confident_part_number_skips_llm() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("{}".into())]));
        let stage = stage(Some(llm.clone()));
        let result = stage.understand("04152-YZZA1").await;
        assert!(result.success);
        assert_eq!(result.method, UnderstandingMethod::Token);
        assert_eq!(result.intent.search_type, SearchType::PartNumber);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_hybrid_merge_with_llm() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(
            r#"{"category": "wheel bearing", "vehicleMake": "Toyota", "searchType": "fitment", "confidence": 0.85}"#
                .into(),
        )]));
        let stage = stage(Some(llm.clone()));
        let result = stage.understand("front left wheel bearing toyota thing").await;
        assert!(result.success);
        assert_eq!(result.method, UnderstandingMethod::Hybrid);
        assert_eq!(result.intent.vehicle_make.as_deref(), Some("Toyota"));
        assert_eq!(result.intent.search_type, SearchType::Fitment);
        assert!((result.intent.confidence - 0.85).abs() < 1e-9);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_token() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(SearchError::Llm("down".into()))]));
        let stage = stage(Some(llm));
        let result = stage.understand("front left wheel bearing").await;
        assert!(result.success);
        assert_eq!(result.method, UnderstandingMethod::TokenFallback);
        assert_eq!(result.intent.category.as_deref(), Some("wheel bearing"));
    }

    #[tokio::test]
    async fn test_garbage_llm_output_falls_back() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("no json at all".into())]));
        let stage = stage(Some(llm));
        let result = stage.understand("front left wheel bearing").await;
        assert_eq!(result.method, UnderstandingMethod::TokenFallback);
    }

    #[tokio::test]
    async fn test_vacuous_llm_object_rejected() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(r#"{"confidence": 0.99}"#.into())]));
        let stage = stage(Some(llm));
        let result = stage.understand("front left wheel bearing").await;
        // The quick-check rejects an object naming nothing
        assert_eq!(result.method, UnderstandingMethod::TokenFallback);
    }

    #[tokio::test]
    async fn test_second_request_is_cache_hit() {
        let stage = stage(None);
        let first = stage.understand("bosch oil filter").await;
        assert_eq!(first.method, UnderstandingMethod::Token);

        let second = stage.understand("Bosch  OIL   filter!").await;
        assert_eq!(second.method, UnderstandingMethod::Cache);
        assert_eq!(second.intent.category, first.intent.category);
    }

    #[tokio::test]
    async fn test_breaker_opens_after_llm_failures() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(SearchError::Llm("down".into())),
            Err(SearchError::Llm("down".into())),
            Err(SearchError::Llm("down".into())),
            Ok(r#"{"category": "brake pad"}"#.into()),
        ]));
        let breakers = Arc::new(BreakerRegistry::default());
        let stage = UnderstandingStage::new(
            LlmSettings::default(),
            Some(llm.clone()),
            Arc::new(TieredCache::new(false, Arc::new(NoopKeyValueStore))),
            breakers.clone(),
        );

        // Three failures trip the LLM breaker (threshold 3)
        for query in ["front wheel bearing", "rear wheel bearing", "left wheel bearing"] {
            let result = stage.understand(query).await;
            assert_eq!(result.method, UnderstandingMethod::TokenFallback);
        }
        assert_eq!(
            breakers.get(BreakerRole::Llm).state(),
            parts_search_core::BreakerState::Open
        );

        // Next request is denied by the breaker without reaching the adapter
        let result = stage.understand("right wheel bearing").await;
        assert_eq!(result.method, UnderstandingMethod::TokenFallback);
        assert_eq!(llm.calls(), 3);
    }
}
