//! The chunk-aggregation algorithm — the hardest piece of the
//! pipeline. Pure and synchronous: no I/O, no task spawning. The owning
//! per-call task calls [`ChunkAggregator::push`] as audio arrives and
//! [`ChunkAggregator::decide`] on its tick timer; when `decide` returns
//! `Some(bytes)`, the buffer has already been mutated and the task is free
//! to `send` those bytes to the provider without the aggregator waiting on
//! the reply — sends are fire-and-forget by design.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tunable timing constants, one instance per provider backend.
#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub initial_burst_ms: u32,
    pub min_chunk_ms: u32,
    pub max_wait_ms: u32,
    pub timeout_fallback_min_ms: u32,
    pub max_chunk_ms: u32,
    pub keepalive_period_ms: u32,
    pub processing_timer_ms: u32,
    pub first_audio_deadline_ms: u32,
}

impl AggregatorConfig {
    /// Defaults for the "P1" provider backend.
    pub const fn p1() -> Self {
        Self {
            initial_burst_ms: 250,
            min_chunk_ms: 100,
            max_wait_ms: 200,
            timeout_fallback_min_ms: 20,
            max_chunk_ms: 250,
            keepalive_period_ms: 3000,
            processing_timer_ms: 100,
            first_audio_deadline_ms: 1000,
        }
    }

    /// Defaults for the "P2" provider backend.
    pub const fn p2() -> Self {
        Self {
            initial_burst_ms: 500,
            min_chunk_ms: 300,
            max_wait_ms: 400,
            timeout_fallback_min_ms: 300,
            max_chunk_ms: 600,
            keepalive_period_ms: 3000,
            processing_timer_ms: 100,
            first_audio_deadline_ms: 1000,
        }
    }
}

struct Chunk {
    bytes: Vec<u8>,
    ms: f64,
}

pub struct ChunkAggregator {
    config: AggregatorConfig,
    sample_rate: u32,
    bytes_per_sample: u32,
    chunks: VecDeque<Chunk>,
    has_sent_initial_chunk: bool,
    last_continuous_send_at: Option<Instant>,
    buffer_created_at: Instant,
}

impl ChunkAggregator {
    pub fn new(config: AggregatorConfig, sample_rate: u32, channels: u8) -> Self {
        Self {
            config,
            sample_rate,
            bytes_per_sample: 2 * channels.max(1) as u32,
            chunks: VecDeque::new(),
            has_sent_initial_chunk: false,
            last_continuous_send_at: None,
            buffer_created_at: Instant::now(),
        }
    }

    #[cfg(test)]
    fn new_at(config: AggregatorConfig, sample_rate: u32, channels: u8, now: Instant) -> Self {
        let mut agg = Self::new(config, sample_rate, channels);
        agg.buffer_created_at = now;
        agg
    }

    fn chunk_duration_ms(&self, bytes_len: usize) -> f64 {
        if self.bytes_per_sample == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        let samples = bytes_len / self.bytes_per_sample as usize;
        samples as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Appends an inbound chunk. Does not decide whether to flush; call
    /// [`Self::decide`] afterward (the worker calls both on every inbound
    /// frame, plus on the aggregator's own tick timer).
    pub fn push(&mut self, bytes: Vec<u8>) {
        let ms = self.chunk_duration_ms(bytes.len());
        self.chunks.push_back(Chunk { bytes, ms });
    }

    pub fn total_buffered_ms(&self) -> f64 {
        self.chunks.iter().map(|c| c.ms).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drains whole buffered chunks until at least `target_ms` has been
    /// accumulated (or the buffer is exhausted), returning the concatenated
    /// payload.
    fn flush(&mut self, target_ms: f64) -> Vec<u8> {
        let mut out = Vec::new();
        let mut acc = 0.0;
        while acc < target_ms {
            let Some(chunk) = self.chunks.pop_front() else {
                break;
            };
            acc += chunk.ms;
            out.extend(chunk.bytes);
        }
        out
    }

    /// Drains everything buffered regardless of size, for end-of-call flush
    ///. Returns `None` if nothing is buffered.
    pub fn flush_all(&mut self) -> Option<Vec<u8>> {
        if self.chunks.is_empty() {
            return None;
        }
        Some(self.flush(f64::MAX))
    }

    /// Runs one tick of the decision algorithm. Returns the bytes to send
    /// if a flush is due; the buffer and internal timers are already
    /// updated when this returns `Some`.
    ///
    /// `MIN_TIME_BETWEEN_SENDS_MS` from the governing pseudocode is not a
    /// separately tuned constant in the constants table; this resolves it
    /// to `min_chunk_ms`, i.e. normal-mode sends are never issued closer
    /// together than the floor chunk size.
    pub fn decide(&mut self, now: Instant) -> Option<Vec<u8>> {
        let total = self.total_buffered_ms();

        if !self.has_sent_initial_chunk {
            let waited = now
                .saturating_duration_since(self.buffer_created_at)
                .as_millis() as f64;
            let deadline_elapsed = waited >= self.config.first_audio_deadline_ms as f64;
            if total >= self.config.initial_burst_ms as f64 || (deadline_elapsed && total > 0.0) {
                let to_send = total.min(self.config.max_chunk_ms as f64);
                let bytes = self.flush(to_send);
                self.has_sent_initial_chunk = true;
                self.last_continuous_send_at = Some(now);
                return Some(bytes);
            }
            return None;
        }

        let last_send = self.last_continuous_send_at.unwrap_or(self.buffer_created_at);
        let gap = now.saturating_duration_since(last_send).as_millis() as f64;
        let too_long = gap >= self.config.max_wait_ms as f64;
        let has_optimal = total >= self.config.min_chunk_ms as f64;
        let force_flush = total >= self.config.max_chunk_ms as f64;

        let flush_now = force_flush
            || (too_long && total >= self.config.timeout_fallback_min_ms as f64)
            || (gap >= self.config.min_chunk_ms as f64 && has_optimal);

        if !flush_now {
            return None;
        }

        let payload_ms = if too_long {
            total
        } else {
            total.min(self.config.min_chunk_ms as f64)
        };
        let bytes = self.flush(payload_ms);
        self.last_continuous_send_at = Some(now);
        Some(bytes)
    }

    pub fn processing_timer(&self) -> Duration {
        Duration::from_millis(self.config.processing_timer_ms as u64)
    }

    pub fn keepalive_period(&self) -> Duration {
        Duration::from_millis(self.config.keepalive_period_ms as u64)
    }

    /// Minimum buffered duration worth flushing at end-of-call.
    pub fn timeout_fallback_min_ms(&self) -> f64 {
        self.config.timeout_fallback_min_ms as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm16_chunk_ms(ms: u32, sample_rate: u32) -> Vec<u8> {
        let samples = (sample_rate as u64 * ms as u64 / 1000) as usize;
        vec![0u8; samples * 2]
    }

    #[test]
    fn does_not_flush_before_initial_burst() {
        let now = Instant::now();
        let mut agg = ChunkAggregator::new_at(AggregatorConfig::p1(), 16_000, 1, now);
        agg.push(pcm16_chunk_ms(20, 16_000));
        assert!(agg.decide(now).is_none());
    }

    #[test]
    fn flushes_initial_burst_once_threshold_reached() {
        let now = Instant::now();
        let mut agg = ChunkAggregator::new_at(AggregatorConfig::p1(), 16_000, 1, now);
        for _ in 0..13 {
            agg.push(pcm16_chunk_ms(20, 16_000)); // 260ms >= 250ms burst
        }
        let sent = agg.decide(now);
        assert!(sent.is_some());
        assert!(agg.has_sent_initial_chunk);
    }

    #[test]
    fn first_audio_deadline_forces_flush_of_partial_burst() {
        let t0 = Instant::now();
        let mut agg = ChunkAggregator::new_at(AggregatorConfig::p1(), 16_000, 1, t0);
        agg.push(pcm16_chunk_ms(20, 16_000));
        let later = t0 + Duration::from_millis(1100);
        let sent = agg.decide(later);
        assert!(sent.is_some(), "first send must occur by the deadline");
    }

    #[test]
    fn gap_never_exceeds_max_wait_plus_tick_under_sparse_input() {
        // Sparse carrier input every 8s must still produce sends at least
        // every MAX_WAIT_MS + processing tick.
        let cfg = AggregatorConfig::p1();
        let t0 = Instant::now();
        let mut agg = ChunkAggregator::new_at(cfg, 16_000, 1, t0);
        agg.push(pcm16_chunk_ms(20, 16_000));
        let after_burst = t0 + Duration::from_millis(1100);
        assert!(agg.decide(after_burst).is_some());

        // No more audio arrives for a long stretch; ticking must still
        // eventually flush whatever's buffered rather than exceeding the
        // ceiling indefinitely once more audio shows up.
        agg.push(pcm16_chunk_ms(20, 16_000));
        let tick_time = after_burst + Duration::from_millis(cfg.max_wait_ms as u64 + cfg.processing_timer_ms as u64);
        let sent = agg.decide(tick_time);
        assert!(sent.is_some());
    }

    #[test]
    fn force_flush_when_buffer_reaches_max_chunk_ms() {
        let t0 = Instant::now();
        let mut agg = ChunkAggregator::new_at(AggregatorConfig::p1(), 16_000, 1, t0);
        for _ in 0..13 {
            agg.push(pcm16_chunk_ms(20, 16_000));
        }
        agg.decide(t0); // initial burst
        for _ in 0..13 {
            agg.push(pcm16_chunk_ms(20, 16_000)); // another 260ms > MAX_CHUNK_MS(250)
        }
        let sent = agg.decide(t0);
        assert!(sent.is_some());
    }

    #[test]
    fn buffer_never_exceeds_max_chunk_plus_one_inbound_chunk() {
        // Bounded buffer growth.
        let cfg = AggregatorConfig::p1();
        let t0 = Instant::now();
        let mut agg = ChunkAggregator::new_at(cfg, 16_000, 1, t0);
        let mut now = t0;
        for _ in 0..200 {
            agg.push(pcm16_chunk_ms(20, 16_000));
            agg.decide(now);
            now += Duration::from_millis(20);
            assert!(agg.total_buffered_ms() <= (cfg.max_chunk_ms + 20) as f64);
        }
    }
}
