//! Telemetry hooks for generation performance measurement.
//!
//! Provides:
//! - [`GenerationMetrics`] — TTFT, tokens/sec, and generation summary
//! - [`TelemetryHook`] trait — callback interface for real-time reporting
//! - [`GenerationTimer`] — records timestamps and computes metrics
//! - [`NoopTelemetry`] / [`LogTelemetry`] — built-in hook implementations

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Aggregate metrics from one streaming completion.
#[derive(Debug, Clone)]
pub struct GenerationMetrics {
    /// Time to first text fragment in milliseconds.
    pub ttft_ms: f64,
    /// Fragments generated per second (excludes time before first fragment).
    pub tokens_per_sec: f64,
    /// Number of prompt tokens encoded for this completion.
    pub prompt_tokens: usize,
    /// Number of fragments yielded to the consumer.
    pub generated_tokens: usize,
    /// Total wall-clock time in milliseconds.
    pub total_time_ms: f64,
}

/// Callback trait for real-time generation telemetry.
///
/// All methods have default no-op implementations so hooks can be selective.
pub trait TelemetryHook: Send + Sync {
    /// Called when the first fragment is ready. `ttft_ms` is time from
    /// session start to that fragment.
    fn on_first_token(&self, _ttft_ms: f64) {}

    /// Called after each fragment is produced.
    fn on_token(&self, _token_idx: usize, _elapsed_ms: f64) {}

    /// Called when the session reaches a terminal state.
    fn on_complete(&self, _metrics: &GenerationMetrics) {}
}

/// No-op telemetry hook — zero overhead when metrics aren't needed.
#[derive(Debug, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetryHook for NoopTelemetry {}

/// Logging telemetry hook — collects metrics into a retrievable report.
#[derive(Debug, Clone)]
pub struct LogTelemetry {
    last_report: Arc<Mutex<Option<GenerationMetrics>>>,
}

impl Default for LogTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self {
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Retrieve the last completed session's metrics.
    pub fn last_metrics(&self) -> Option<GenerationMetrics> {
        self.last_report.lock().unwrap().clone()
    }
}

impl TelemetryHook for LogTelemetry {
    fn on_complete(&self, metrics: &GenerationMetrics) {
        *self.last_report.lock().unwrap() = Some(metrics.clone());
    }
}

/// Records timestamps during a session to compute [`GenerationMetrics`].
///
/// Usage:
/// 1. Call [`GenerationTimer::new`] when the session enters its loop
/// 2. Call [`mark_token`] after each fragment
/// 3. Call [`finish`] at the terminal state
pub struct GenerationTimer {
    prompt_tokens: usize,
    start: Instant,
    first_token: Option<Instant>,
    token_count: usize,
    hook: Arc<dyn TelemetryHook>,
}

impl GenerationTimer {
    pub fn new(prompt_tokens: usize, hook: Arc<dyn TelemetryHook>) -> Self {
        Self {
            prompt_tokens,
            start: Instant::now(),
            first_token: None,
            token_count: 0,
            hook,
        }
    }

    /// Mark a fragment produced. Fires `on_first_token` once, then
    /// `on_token` for every fragment.
    pub fn mark_token(&mut self) {
        let now = Instant::now();
        if self.first_token.is_none() {
            self.first_token = Some(now);
            let ttft_ms = now.duration_since(self.start).as_secs_f64() * 1000.0;
            self.hook.on_first_token(ttft_ms);
        }
        self.token_count += 1;
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.hook.on_token(self.token_count, elapsed_ms);
    }

    /// Finalize and return metrics. Fires `on_complete`.
    pub fn finish(self) -> GenerationMetrics {
        let total_time_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        let ttft_ms = self
            .first_token
            .map(|t| t.duration_since(self.start).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        let decode_time_ms = total_time_ms - ttft_ms;
        let tokens_per_sec = if decode_time_ms > 0.0 && self.token_count > 0 {
            self.token_count as f64 / (decode_time_ms / 1000.0)
        } else {
            0.0
        };

        let metrics = GenerationMetrics {
            ttft_ms,
            tokens_per_sec,
            prompt_tokens: self.prompt_tokens,
            generated_tokens: self.token_count,
            total_time_ms,
        };

        self.hook.on_complete(&metrics);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_telemetry_runs() {
        let hook = NoopTelemetry;
        hook.on_first_token(10.0);
        hook.on_token(1, 15.0);
        hook.on_complete(&GenerationMetrics {
            ttft_ms: 10.0,
            tokens_per_sec: 100.0,
            prompt_tokens: 5,
            generated_tokens: 10,
            total_time_ms: 110.0,
        });
    }

    #[test]
    fn log_telemetry_captures_metrics() {
        let hook = LogTelemetry::new();
        assert!(hook.last_metrics().is_none());

        let metrics = GenerationMetrics {
            ttft_ms: 12.5,
            tokens_per_sec: 80.0,
            prompt_tokens: 4,
            generated_tokens: 8,
            total_time_ms: 112.5,
        };
        hook.on_complete(&metrics);

        let captured = hook.last_metrics().unwrap();
        assert_eq!(captured.ttft_ms, 12.5);
        assert_eq!(captured.generated_tokens, 8);
    }

    #[test]
    fn timer_basic_flow() {
        let mut timer = GenerationTimer::new(3, Arc::new(NoopTelemetry));

        timer.mark_token();
        timer.mark_token();
        timer.mark_token();

        let metrics = timer.finish();
        assert_eq!(metrics.prompt_tokens, 3);
        assert_eq!(metrics.generated_tokens, 3);
        assert!(metrics.ttft_ms >= 0.0);
        assert!(metrics.total_time_ms >= metrics.ttft_ms);
    }

    #[test]
    fn timer_fires_hooks() {
        let log = LogTelemetry::new();

        let mut timer = GenerationTimer::new(2, Arc::new(log.clone()));
        timer.mark_token();
        timer.mark_token();
        let metrics = timer.finish();

        assert_eq!(metrics.generated_tokens, 2);

        let captured = log.last_metrics().unwrap();
        assert_eq!(captured.generated_tokens, 2);
        assert_eq!(captured.prompt_tokens, 2);
    }

    #[test]
    fn timer_with_no_tokens() {
        let timer = GenerationTimer::new(1, Arc::new(NoopTelemetry));
        let metrics = timer.finish();
        assert_eq!(metrics.ttft_ms, 0.0);
        assert_eq!(metrics.generated_tokens, 0);
        assert_eq!(metrics.tokens_per_sec, 0.0);
    }
}
