//! Composition root: wires repositories, bus, SSE hub and the intent/
//! disposition services into an `AxumContext`, then starts the HTTP server.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callrelay_core::domain::CallId;

use callrelay_bus::InMemoryBus;
use callrelay_core::ports::{BusPort, ConsumerSubscribeNotifier, NullConsumerSubscribeNotifier, Repos};
use callrelay_core::services::SeqAllocator;
use callrelay_core::settings::{aggregator_config_from_env, max_concurrent_sse_clients, BusAdapterKind};
use callrelay_db::CoreFactory;
use callrelay_intent::{DispositionService, IntentService, LlmClient, MockLlmClient};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::sse::SseHub;

#[derive(Debug, Clone)]
pub enum CorsConfig {
    /// Any origin, any method — used in local dev only.
    Permissive,
    /// Exact allow-list of origins, used in production.
    Restricted(Vec<String>),
}

impl CorsConfig {
    fn into_layer(self) -> CorsLayer {
        match self {
            CorsConfig::Permissive => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
            CorsConfig::Restricted(origins) => {
                let origins: Vec<_> = origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect();
                CorsLayer::new()
                    .allow_origin(origins)
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Default)]
pub struct ServerConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    database_url: Option<String>,
    cors: Option<CorsConfig>,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn build(self) -> ServerConfig {
        ServerConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8080),
            database_url: self.database_url.unwrap_or_else(|| "sqlite::memory:".to_string()),
            cors: self.cors.unwrap_or(CorsConfig::Permissive),
        }
    }
}

/// Shared application state handed to every handler.
pub struct AxumContext {
    pub repos: Repos,
    pub bus: Arc<dyn BusPort>,
    pub sse_hub: Arc<SseHub>,
    pub seq_allocator: SeqAllocator,
    pub intent_service: Arc<IntentService>,
    pub disposition_service: Arc<DispositionService>,
    pub consumer_notifier: Arc<dyn ConsumerSubscribeNotifier>,
    pub cors: CorsConfig,
    /// Calls with an Intent+KB classification currently in flight, so a
    /// burst of fragments for one call invokes the LLM at most once
    /// concurrently.
    pub intent_inflight: Mutex<HashSet<CallId>>,
}

/// Builds the full dependency graph: database pool + schema, KB seed data,
/// bus adapter (chosen from `PUBSUB_ADAPTER`), the SSE hub as the shared
/// `AppEventEmitter`, and the Intent+KB / Disposition services on top of a
/// deterministic mock LLM client (swap for `HttpLlmClient` in production).
///
/// Deployments that run the Transcript Consumer in the same process (the
/// `all-in-one` dev binary) should use [`bootstrap_with_notifier`] instead,
/// so the App ingest endpoint can push first-fragment notifications
/// directly rather than relying solely on the consumer's recovery sweep.
pub async fn bootstrap(config: &ServerConfig) -> anyhow::Result<Arc<AxumContext>> {
    bootstrap_with_notifier(config, Arc::new(NullConsumerSubscribeNotifier)).await
}

pub async fn bootstrap_with_notifier(
    config: &ServerConfig,
    consumer_notifier: Arc<dyn ConsumerSubscribeNotifier>,
) -> anyhow::Result<Arc<AxumContext>> {
    let pool = if config.database_url == "sqlite::memory:" {
        callrelay_db::setup_test_database().await?
    } else {
        callrelay_db::setup_database(std::path::Path::new(&config.database_url)).await?
    };
    let repos = CoreFactory::build_repos(pool);

    let bus: Arc<dyn BusPort> = match BusAdapterKind::from_env()? {
        BusAdapterKind::InMemory => Arc::new(InMemoryBus::new()),
        BusAdapterKind::StreamLog => {
            let redis_url =
                std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
            match callrelay_bus::RedisBus::connect(&redis_url).await {
                Ok(bus) => Arc::new(bus),
                Err(err) => {
                    tracing::warn!(error = %err, "falling back to in-memory bus: could not reach redis");
                    Arc::new(InMemoryBus::new())
                }
            }
        }
    };

    let max_clients = max_concurrent_sse_clients()?;
    let sse_hub = Arc::new(SseHub::new(max_clients));

    let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient);

    let intent_service = Arc::new(IntentService::new(
        llm.clone(),
        repos.intents.clone(),
        repos.kb.clone(),
        sse_hub.clone(),
    ));

    let disposition_service = Arc::new(DispositionService::new(
        llm,
        repos.utterances.clone(),
        repos.intents.clone(),
        repos.dispositions.clone(),
        sse_hub.clone(),
    ));

    // Keep the aggregator config validated even though this crate doesn't
    // run the aggregator itself; a misconfigured env should fail fast here
    // rather than silently inside the ASR worker.
    let _ = aggregator_config_from_env(
        callrelay_core::settings::ProviderKind::from_env()?.default_aggregator_config(),
    )?;

    Ok(Arc::new(AxumContext {
        repos,
        bus,
        sse_hub,
        seq_allocator: SeqAllocator::new(),
        intent_service,
        disposition_service,
        consumer_notifier,
        cors: config.cors.clone(),
        intent_inflight: Mutex::new(HashSet::new()),
    }))
}

/// Starts the HTTP server and the SSE idle-sweep background task, both
/// cancelled together on shutdown.
pub async fn start_server(ctx: Arc<AxumContext>, config: ServerConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let sweep_cancel = cancel.clone();
    let sweep_hub = ctx.sse_hub.clone();
    let sweep_handle = tokio::spawn(crate::sse::run_idle_sweep(sweep_hub, sweep_cancel));

    let cors = ctx.cors.clone().into_layer();
    let app = crate::routes::create_router(ctx).layer(cors);

    let addr = config.socket_addr()?;
    info!(%addr, "starting callrelay app server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_signal = {
        let cancel = cancel.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            cancel.cancel();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    Ok(())
}
