//! Builds the `ProviderSessionFactory` selected by `ASR_PROVIDER`,
//! shared by the `asr-worker` and `all-in-one` subcommands.

use std::sync::Arc;

use callrelay_asr::provider::{p1, p2, MockProviderFactory};
use callrelay_core::ports::ProviderSessionFactory;
use callrelay_core::settings::{asr_provider_ws_url, ProviderKind};

pub fn build_provider_factory() -> anyhow::Result<Arc<dyn ProviderSessionFactory>> {
    Ok(match ProviderKind::from_env()? {
        ProviderKind::Mock => Arc::new(MockProviderFactory),
        ProviderKind::P1 => Arc::new(p1::factory(asr_provider_ws_url()?)),
        ProviderKind::P2 => Arc::new(p2::factory(asr_provider_ws_url()?)),
    })
}
