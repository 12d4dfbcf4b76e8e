pub mod disposition_service;
pub mod http_llm_client;
pub mod intent_service;
pub mod llm_client;
pub mod mock_llm_client;

pub use disposition_service::DispositionService;
pub use http_llm_client::HttpLlmClient;
pub use intent_service::IntentService;
pub use llm_client::{ClassifyResult, LlmClient, LlmError, SummaryResult};
pub use mock_llm_client::MockLlmClient;
