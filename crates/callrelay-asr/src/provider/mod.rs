pub mod mock;
pub mod p1;
pub mod p2;
pub mod ws_session;

pub use mock::MockProviderFactory;
pub use ws_session::{VendorConfig, WsProviderFactory};
