//! Intent + KB: classifies the caller's intent from recent
//! utterances, retrieves matching KB articles above the confidence floor,
//! and broadcasts `intent_update`. Failures degrade to `unknown` silently
//! rather than retrying inline.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use callrelay_core::domain::{CallId, Intent, Utterance, INTENT_CONFIDENCE_FLOOR};
use callrelay_core::events::AppEvent;
use callrelay_core::ports::{AppEventEmitter, IntentRepository, KbRepository};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::warn;

use crate::llm_client::LlmClient;

const CACHE_TTL: Duration = Duration::from_secs(5);
const LAST_N_UTTERANCES: usize = 8;
const KB_RESULT_LIMIT: usize = 3;

struct CacheEntry {
    key_hash: u64,
    expires_at: Instant,
}

/// Caches by `(callId, hash(lastN utterances))` for `CACHE_TTL` so a burst
/// of fragments for an unchanged transcript window doesn't re-invoke the
/// LLM.
pub struct IntentService {
    llm: Arc<dyn LlmClient>,
    intents: Arc<dyn IntentRepository>,
    kb: Arc<dyn KbRepository>,
    events: Arc<dyn AppEventEmitter>,
    cache: Mutex<HashMap<CallId, CacheEntry>>,
}

impl IntentService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        intents: Arc<dyn IntentRepository>,
        kb: Arc<dyn KbRepository>,
        events: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            llm,
            intents,
            kb,
            events,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn hash_window(utterances: &[Utterance]) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for u in utterances {
            u.seq.hash(&mut hasher);
            u.text.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn cached_and_fresh(&self, call_id: &CallId, key_hash: u64, now: Instant) -> bool {
        let cache = self.cache.lock().unwrap();
        cache
            .get(call_id)
            .map(|entry| entry.key_hash == key_hash && entry.expires_at > now)
            .unwrap_or(false)
    }

    fn remember(&self, call_id: CallId, key_hash: u64, now: Instant) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(
            call_id,
            CacheEntry {
                key_hash,
                expires_at: now + CACHE_TTL,
            },
        );
    }

    /// Classifies intent for `call_id` given its current ordered
    /// utterances, and broadcasts `intent_update` if it clears the
    /// confidence floor. Never propagates an LLM failure to the caller.
    pub async fn classify_and_broadcast(&self, call_id: &CallId, utterances: &[Utterance]) {
        let window: Vec<Utterance> = utterances
            .iter()
            .rev()
            .take(LAST_N_UTTERANCES)
            .cloned()
            .collect();
        let key_hash = Self::hash_window(&window);
        let now = Instant::now();

        if self.cached_and_fresh(call_id, key_hash, now) {
            return;
        }
        self.remember(call_id.clone(), key_hash, now);

        let seq = utterances.last().map(|u| u.seq).unwrap_or(0);
        let prompt = Self::build_prompt(&window);

        let intent = match self.llm.classify(&prompt).await {
            Ok(result) => Intent {
                call_id: call_id.clone(),
                seq,
                label: result.intent,
                confidence: result.confidence,
            },
            Err(err) => {
                warn!(call_id = %call_id, error = %err, "intent classification failed, recording unknown");
                Intent::unknown(call_id.clone(), seq)
            }
        };

        if let Err(err) = self.intents.append(&intent).await {
            warn!(call_id = %call_id, error = %err, "failed to persist intent");
        }

        if !intent.meets_floor() {
            return;
        }

        let articles = match self
            .kb
            .search_by_tags(std::slice::from_ref(&intent.label), KB_RESULT_LIMIT)
            .await
        {
            Ok(articles) => articles,
            Err(err) => {
                warn!(call_id = %call_id, error = %err, "KB lookup failed");
                Vec::new()
            }
        };

        self.events
            .emit(
                call_id,
                AppEvent::IntentUpdate {
                    call_id: call_id.clone(),
                    intent: intent.label,
                    confidence: intent.confidence,
                    articles,
                },
            )
            .await;
    }

    fn build_prompt(window: &[Utterance]) -> String {
        window
            .iter()
            .rev()
            .map(|u| format!("{}: {}", u.speaker.as_str(), u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_llm_client::MockLlmClient;
    use async_trait::async_trait;
    use callrelay_core::domain::Speaker;
    use callrelay_core::error::RepositoryError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingIntentRepo {
        appended: AtomicUsize,
    }

    #[async_trait]
    impl IntentRepository for RecordingIntentRepo {
        async fn append(&self, _intent: &Intent) -> Result<(), RepositoryError> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn latest_for_call(&self, _call_id: &CallId) -> Result<Option<Intent>, RepositoryError> {
            Ok(None)
        }
        async fn delete_for_call(&self, _call_id: &CallId) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    struct EmptyKbRepo;

    #[async_trait]
    impl KbRepository for EmptyKbRepo {
        async fn search_by_tags(
            &self,
            _tags: &[String],
            _limit: usize,
        ) -> Result<Vec<callrelay_core::domain::KbArticle>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    struct NullEmitter;

    #[async_trait]
    impl AppEventEmitter for NullEmitter {
        async fn emit(&self, _call_id: &CallId, _event: AppEvent) {}
    }

    fn utterance(seq: u64, text: &str) -> Utterance {
        Utterance {
            call_id: CallId::new("call-1"),
            seq,
            text: text.to_string(),
            speaker: Speaker::Customer,
            ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn caches_identical_window_within_ttl() {
        let repo = Arc::new(RecordingIntentRepo {
            appended: AtomicUsize::new(0),
        });
        let service = IntentService::new(
            Arc::new(MockLlmClient),
            repo.clone(),
            Arc::new(EmptyKbRepo),
            Arc::new(NullEmitter),
        );

        let call_id = CallId::new("call-1");
        let utterances = vec![utterance(1, "I want to cancel my subscription")];

        service.classify_and_broadcast(&call_id, &utterances).await;
        service.classify_and_broadcast(&call_id, &utterances).await;

        assert_eq!(repo.appended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reclassifies_when_window_changes() {
        let repo = Arc::new(RecordingIntentRepo {
            appended: AtomicUsize::new(0),
        });
        let service = IntentService::new(
            Arc::new(MockLlmClient),
            repo.clone(),
            Arc::new(EmptyKbRepo),
            Arc::new(NullEmitter),
        );

        let call_id = CallId::new("call-1");
        service
            .classify_and_broadcast(&call_id, &[utterance(1, "hello")])
            .await;
        service
            .classify_and_broadcast(&call_id, &[utterance(1, "hello"), utterance(2, "I want to cancel")])
            .await;

        assert_eq!(repo.appended.load(Ordering::SeqCst), 2);
    }
}
