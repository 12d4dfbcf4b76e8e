//! Disposition: on call end, summarizes the full transcript via
//! the LLM, persists the disposition once, broadcasts `call_end`, and
//! clears the call's intent rows so a reused cache key never surfaces a
//! stale suggestion.

use std::sync::Arc;

use callrelay_core::domain::{CallId, Disposition, Utterance};
use callrelay_core::error::{CoreError, RepositoryError};
use callrelay_core::events::AppEvent;
use callrelay_core::ports::{AppEventEmitter, DispositionRepository, IntentRepository, UtteranceRepository};
use tracing::warn;

use crate::llm_client::LlmClient;

pub struct DispositionService {
    llm: Arc<dyn LlmClient>,
    utterances: Arc<dyn UtteranceRepository>,
    intents: Arc<dyn IntentRepository>,
    dispositions: Arc<dyn DispositionRepository>,
    events: Arc<dyn AppEventEmitter>,
}

impl DispositionService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        utterances: Arc<dyn UtteranceRepository>,
        intents: Arc<dyn IntentRepository>,
        dispositions: Arc<dyn DispositionRepository>,
        events: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            llm,
            utterances,
            intents,
            dispositions,
            events,
        }
    }

    /// Ends a call: summarizes, persists (idempotently), broadcasts, and
    /// cleans up intent rows. Repeat calls for an already-ended call return
    /// the stored disposition without re-invoking the LLM.
    pub async fn end_call(&self, call_id: &CallId) -> Result<Disposition, CoreError> {
        if let Some(existing) = self.dispositions.get(call_id).await? {
            return Ok(existing);
        }

        let utterances = self.utterances.list_for_call(call_id).await?;
        let prompt = Self::build_prompt(&utterances);

        let summary = match self.llm.summarize(&prompt).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(call_id = %call_id, error = %err, "disposition summarization failed, recording best-effort fallback");
                crate::llm_client::SummaryResult {
                    issue: "unknown".to_string(),
                    resolution: "unknown".to_string(),
                    next_steps: "unknown".to_string(),
                    confidence: 0.0,
                    categories: Vec::new(),
                }
            }
        };

        let disposition = Disposition {
            call_id: call_id.clone(),
            issue_summary: summary.issue,
            resolution: summary.resolution,
            next_steps: summary.next_steps,
            suggested_categories: summary.categories.into_iter().take(3).collect(),
            confidence: summary.confidence,
        };

        let persisted = self.dispositions.insert_if_absent(disposition).await?;

        self.events
            .emit(
                call_id,
                AppEvent::CallEnd {
                    call_id: call_id.clone(),
                    disposition: persisted.clone(),
                },
            )
            .await;

        if let Err(err) = self.intents.delete_for_call(call_id).await {
            warn!(call_id = %call_id, error = %err, "failed to clear intent rows on dispose");
        }

        Ok(persisted)
    }

    fn build_prompt(utterances: &[Utterance]) -> String {
        utterances
            .iter()
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
    use chrono::Utc;
    use std::sync::Mutex;

    struct InMemoryUtteranceRepo(Vec<Utterance>);

    #[async_trait]
    impl UtteranceRepository for InMemoryUtteranceRepo {
        async fn upsert(&self, _utterance: &Utterance) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn list_for_call(&self, _call_id: &CallId) -> Result<Vec<Utterance>, RepositoryError> {
            Ok(self.0.clone())
        }
        async fn max_seq(&self, _call_id: &CallId) -> Result<Option<u64>, RepositoryError> {
            Ok(self.0.iter().map(|u| u.seq).max())
        }
        async fn delete_for_call(&self, _call_id: &CallId) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    struct NullIntentRepo;

    #[async_trait]
    impl IntentRepository for NullIntentRepo {
        async fn append(&self, _intent: &callrelay_core::domain::Intent) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn latest_for_call(
            &self,
            _call_id: &CallId,
        ) -> Result<Option<callrelay_core::domain::Intent>, RepositoryError> {
            Ok(None)
        }
        async fn delete_for_call(&self, _call_id: &CallId) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryDispositionRepo(Mutex<Option<Disposition>>);

    #[async_trait]
    impl DispositionRepository for InMemoryDispositionRepo {
        async fn insert_if_absent(&self, disposition: Disposition) -> Result<Disposition, RepositoryError> {
            let mut slot = self.0.lock().unwrap();
            if let Some(existing) = slot.clone() {
                return Ok(existing);
            }
            *slot = Some(disposition.clone());
            Ok(disposition)
        }
        async fn get(&self, _call_id: &CallId) -> Result<Option<Disposition>, RepositoryError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct NullEmitter;

    #[async_trait]
    impl AppEventEmitter for NullEmitter {
        async fn emit(&self, _call_id: &CallId, _event: AppEvent) {}
    }

    #[tokio::test]
    async fn repeat_end_call_does_not_reinvoke_llm() {
        let utterances = vec![Utterance {
            call_id: CallId::new("call-1"),
            seq: 1,
            text: "Agent: how can I help?".to_string(),
            speaker: Speaker::Agent,
            ts: Utc::now(),
        }];

        let dispositions = Arc::new(InMemoryDispositionRepo::default());
        let service = DispositionService::new(
            Arc::new(MockLlmClient),
            Arc::new(InMemoryUtteranceRepo(utterances)),
            Arc::new(NullIntentRepo),
            dispositions.clone(),
            Arc::new(NullEmitter),
        );

        let call_id = CallId::new("call-1");
        let first = service.end_call(&call_id).await.unwrap();
        let second = service.end_call(&call_id).await.unwrap();

        assert_eq!(first.issue_summary, second.issue_summary);
    }
}
