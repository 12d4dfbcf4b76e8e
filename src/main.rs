//! CLI entry point — the composition root.
//!
//! This is the only place production infrastructure gets wired together:
//! each subcommand builds exactly the adapters its component needs and
//! nothing else. `all-in-one` is the exception, wiring every component into
//! one process over a single shared bus for local development.

mod bus;
mod cli;
mod provider_factory;

use std::sync::Arc;

use callrelay_asr::Dispatcher;
use callrelay_consumer::{ConsumerConfig, TranscriptConsumer};
use callrelay_core::ports::ConsumerSubscribeNotifier;
use callrelay_core::settings::{aggregator_config_from_env, ProviderKind};
use callrelay_gateway::{router, GatewayConfig, GatewayState, HealthFlag, JwtVerifier};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gateway { port } => run_gateway(port).await,
        Commands::AsrWorker => run_asr_worker().await,
        Commands::Consumer { app_base_url } => run_consumer(app_base_url).await,
        Commands::App { port, database_url } => run_app(port, database_url).await,
        Commands::AllInOne {
            app_port,
            gateway_port,
            database_url,
        } => run_all_in_one(app_port, gateway_port, database_url).await,
    }
}

fn jwt_verifier_from_env() -> anyhow::Result<Option<Arc<JwtVerifier>>> {
    match std::env::var("JWT_PUBLIC_KEY_PATH") {
        Ok(path) => {
            let pem = std::fs::read(&path)?;
            Ok(Some(Arc::new(JwtVerifier::from_pem(&pem)?)))
        }
        Err(_) => Ok(None),
    }
}

async fn run_gateway(port: u16) -> anyhow::Result<()> {
    let bus = bus::build_bus().await?;
    let state = GatewayState {
        bus,
        config: Arc::new(GatewayConfig::default()),
        health: HealthFlag::default(),
        jwt_verifier: jwt_verifier_from_env()?,
    };
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    info!(%addr, "starting callrelay ingest gateway");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_asr_worker() -> anyhow::Result<()> {
    let bus = bus::build_bus().await?;
    let provider_factory = provider_factory::build_provider_factory()?;
    let aggregator_config =
        aggregator_config_from_env(ProviderKind::from_env()?.default_aggregator_config())?;
    let consumer_name = std::env::var("ASR_WORKER_ID").unwrap_or_else(|_| "asr-worker-1".to_string());

    info!(%consumer_name, "starting callrelay ASR worker");
    Dispatcher::new(bus, provider_factory, aggregator_config, consumer_name)
        .run()
        .await;
    Ok(())
}

async fn run_consumer(app_base_url: String) -> anyhow::Result<()> {
    let bus = bus::build_bus().await?;
    let consumer = TranscriptConsumer::new(bus, ConsumerConfig::new(app_base_url));

    info!("recovering transcript subscriptions from prior run");
    consumer.recover().await?;

    let cancel = CancellationToken::new();
    let sweep = tokio::spawn(callrelay_consumer::run_idle_sweep(consumer.clone(), cancel.clone()));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        cancel.cancel();
    };
    shutdown.await;
    let _ = sweep.await;
    Ok(())
}

async fn run_app(port: u16, database_url: String) -> anyhow::Result<()> {
    let config = callrelay_app::ServerConfig::builder()
        .port(port)
        .database_url(database_url)
        .build();
    let ctx = callrelay_app::bootstrap(&config).await?;
    callrelay_app::start_server(ctx, config).await
}

/// Local dev mode: one shared in-memory bus, every component in one
/// process, the Transcript Consumer wired directly as the App API's
/// `ConsumerSubscribeNotifier` instead of relying only on its sweep.
async fn run_all_in_one(app_port: u16, gateway_port: u16, database_url: String) -> anyhow::Result<()> {
    let bus = Arc::new(callrelay_bus::InMemoryBus::new());

    let consumer = TranscriptConsumer::new(bus.clone(), ConsumerConfig::new(format!("http://127.0.0.1:{app_port}")));
    consumer.recover().await?;
    let notifier: Arc<dyn ConsumerSubscribeNotifier> = consumer.clone();

    let cancel = CancellationToken::new();
    let sweep = tokio::spawn(callrelay_consumer::run_idle_sweep(consumer, cancel.clone()));

    let provider_factory = provider_factory::build_provider_factory()?;
    let aggregator_config =
        aggregator_config_from_env(ProviderKind::from_env()?.default_aggregator_config())?;
    let dispatcher = Dispatcher::new(bus.clone(), provider_factory, aggregator_config, "asr-worker-1");
    let asr_handle = tokio::spawn(dispatcher.run());

    let gateway_state = GatewayState {
        bus: bus.clone(),
        config: Arc::new(GatewayConfig::default()),
        health: HealthFlag::default(),
        jwt_verifier: jwt_verifier_from_env()?,
    };
    let gateway_addr = format!("0.0.0.0:{gateway_port}");
    let gateway_listener = tokio::net::TcpListener::bind(&gateway_addr).await?;
    let gateway_handle = tokio::spawn(async move {
        let _ = axum::serve(gateway_listener, router(gateway_state)).await;
    });

    let app_config = callrelay_app::ServerConfig::builder()
        .port(app_port)
        .database_url(database_url)
        .build();
    let ctx = callrelay_app::bootstrap_with_notifier(&app_config, notifier).await?;

    info!(%app_port, %gateway_port, "all-in-one: app, gateway, ASR worker and transcript consumer sharing one process");
    callrelay_app::start_server(ctx, app_config).await?;

    cancel.cancel();
    asr_handle.abort();
    gateway_handle.abort();
    let _ = sweep.await;
    Ok(())
}
