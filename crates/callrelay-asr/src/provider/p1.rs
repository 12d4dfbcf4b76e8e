//! "P1" vendor adapter: ultra-low-latency streaming ASR with a 250 ms
//! initial burst and a 100 ms normal-mode floor.

use crate::provider::ws_session::{VendorConfig, WsProviderFactory};

pub fn factory(ws_url: impl Into<String>) -> WsProviderFactory {
    WsProviderFactory {
        vendor: VendorConfig {
            ws_url: ws_url.into(),
            keepalive_payload: r#"{"type":"keepalive"}"#.to_string(),
        },
    }
}
