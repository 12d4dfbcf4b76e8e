//! Shared bus construction from `PUBSUB_ADAPTER`, used by every subcommand
//! so each picks up the same backend choice from the environment.

use std::sync::Arc;

use callrelay_bus::InMemoryBus;
use callrelay_core::ports::BusPort;
use callrelay_core::settings::BusAdapterKind;

pub async fn build_bus() -> anyhow::Result<Arc<dyn BusPort>> {
    Ok(match BusAdapterKind::from_env()? {
        BusAdapterKind::InMemory => Arc::new(InMemoryBus::new()),
        BusAdapterKind::StreamLog => {
            let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
            Arc::new(callrelay_bus::RedisBus::connect(&redis_url).await?)
        }
    })
}
