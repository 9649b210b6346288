//! Server entrypoint
//!
//! Loads settings, wires the real adapters (Elasticsearch, LLM, Redis) into
//! the pipeline, and serves the HTTP API.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parts_search_config::load_settings;
use parts_search_index::ElasticsearchEngine;
use parts_search_llm::{HttpLanguageModel, LlmClientConfig};
use parts_search_pipeline::{InMemoryEngagementProvider, RedisStore, SearchPipeline};
use parts_search_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let env = std::env::var("PARTS_SEARCH_ENV").ok();
    let settings = load_settings(env.as_deref()).context("failed to load settings")?;
    info!(env = env.as_deref().unwrap_or("default"), "settings loaded");

    let engine = Arc::new(
        ElasticsearchEngine::new(settings.index.clone())
            .context("failed to build index adapter")?,
    );

    let engagement = Arc::new(InMemoryEngagementProvider::new());

    let mut builder = SearchPipeline::builder(settings.clone())
        .with_engine(engine)
        .with_engagement(engagement.clone());

    if settings.llm.enabled {
        match HttpLanguageModel::new(LlmClientConfig::from(&settings.llm)) {
            Ok(llm) => {
                info!(model = %settings.llm.model, "LLM enhancement enabled");
                builder = builder.with_llm(Arc::new(llm));
            }
            Err(err) => warn!(error = %err, "LLM adapter unavailable, running token-only"),
        }
    }

    if settings.redis.enabled {
        match RedisStore::connect(&settings.redis.url).await {
            Ok(store) => {
                info!("L2 cache enabled");
                builder = builder.with_l2(Arc::new(store));
            }
            Err(err) => warn!(error = %err, "L2 cache unavailable, running L1-only"),
        }
    }

    let pipeline = Arc::new(builder.build());
    let state = AppState::new(pipeline, engagement);
    let router = create_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr, "parts search server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install shutdown handler");
        return;
    }
    info!("shutdown signal received");
}
