pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

pub use bootstrap::{bootstrap, bootstrap_with_notifier, start_server, AxumContext, CorsConfig, ServerConfig};
pub use error::HttpError;
pub use state::AppState;
