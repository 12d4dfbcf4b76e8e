//! "P2" vendor adapter: VAD-driven streaming ASR with a 500 ms initial
//! burst and a 300 ms normal-mode floor.

use crate::provider::ws_session::{VendorConfig, WsProviderFactory};

pub fn factory(ws_url: impl Into<String>) -> WsProviderFactory {
    WsProviderFactory {
        vendor: VendorConfig {
            ws_url: ws_url.into(),
            keepalive_payload: r#"{"type":"keep_alive"}"#.to_string(),
        },
    }
}
