//! Port traits: the seams between domain logic and adapters. Concrete
//! implementations live in `callrelay-db` (repositories), `callrelay-bus`
//! (bus), `callrelay-asr` (provider sessions) and `callrelay-app` (event
//! emitter).

pub mod bus;
pub mod consumer_notify;
pub mod disposition_repository;
pub mod event_emitter;
pub mod intent_repository;
pub mod kb_repository;
pub mod provider;
pub mod utterance_repository;

pub use bus::{BusMessage, BusPort, BusSubscription};
pub use consumer_notify::{ConsumerSubscribeNotifier, NullConsumerSubscribeNotifier};
pub use disposition_repository::DispositionRepository;
pub use event_emitter::AppEventEmitter;
pub use intent_repository::IntentRepository;
pub use kb_repository::KbRepository;
pub use provider::{ProviderEvent, ProviderSession, ProviderSessionFactory, ProviderTranscript, TransportState};
pub use utterance_repository::UtteranceRepository;

use std::sync::Arc;

/// Bundles the repository ports behind `Arc`, built by a single factory
/// module so every handler gets the same set of repositories.
#[derive(Clone)]
pub struct Repos {
    pub utterances: Arc<dyn UtteranceRepository>,
    pub intents: Arc<dyn IntentRepository>,
    pub dispositions: Arc<dyn DispositionRepository>,
    pub kb: Arc<dyn KbRepository>,
}
