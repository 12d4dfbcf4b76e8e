pub mod sqlite_disposition_repository;
pub mod sqlite_intent_repository;
pub mod sqlite_kb_repository;
pub mod sqlite_utterance_repository;

pub use sqlite_disposition_repository::SqliteDispositionRepository;
pub use sqlite_intent_repository::SqliteIntentRepository;
pub use sqlite_kb_repository::SqliteKbRepository;
pub use sqlite_utterance_repository::SqliteUtteranceRepository;
