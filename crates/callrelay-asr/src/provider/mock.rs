//! Deterministic provider used in tests and `ASR_PROVIDER=mock`: echoes a
//! canned transcript back after a fixed number of sends, never errors.

use async_trait::async_trait;
use callrelay_core::error::ProviderError;
use callrelay_core::ports::{ProviderEvent, ProviderSession, ProviderSessionFactory, ProviderTranscript, TransportState};
use tokio::sync::mpsc;

pub struct MockProviderFactory;

#[async_trait]
impl ProviderSessionFactory for MockProviderFactory {
    async fn open(
        &self,
        _sample_rate: u32,
    ) -> Result<(Box<dyn ProviderSession>, mpsc::UnboundedReceiver<ProviderEvent>), ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ProviderEvent::Ready);
        Ok((Box::new(MockSession { tx, sends: 0 }), rx))
    }
}

struct MockSession {
    tx: mpsc::UnboundedSender<ProviderEvent>,
    sends: u32,
}

#[async_trait]
impl ProviderSession for MockSession {
    async fn send(&mut self, pcm: &[u8]) -> Result<(), ProviderError> {
        self.sends += 1;
        if pcm.is_empty() {
            return Ok(());
        }
        let _ = self.tx.send(ProviderEvent::Transcript(ProviderTranscript {
            text: format!("mock transcript #{}", self.sends),
            confidence: 0.99,
            is_final: self.sends % 3 == 0,
            start_ms: 0,
            end_ms: 0,
        }));
        Ok(())
    }

    async fn keep_alive(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        let _ = self.tx.send(ProviderEvent::Closed);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn transport_state(&self) -> TransportState {
        TransportState::Open
    }
}
