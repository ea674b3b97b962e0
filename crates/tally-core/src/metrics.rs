//! Global atomic counters for Tally observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, lock-free.
pub struct Metrics {
    evaluations_completed: AtomicU64,
    fallback_weights: AtomicU64,
    abstentions_skipped: AtomicU64,
    unweighted_fallbacks: AtomicU64,
    required_abstentions: AtomicU64,
    history_appends: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            evaluations_completed: AtomicU64::new(0),
            fallback_weights: AtomicU64::new(0),
            abstentions_skipped: AtomicU64::new(0),
            unweighted_fallbacks: AtomicU64::new(0),
            required_abstentions: AtomicU64::new(0),
            history_appends: AtomicU64::new(0),
        }
    }

    pub fn inc_evaluations(&self) {
        self.evaluations_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations_completed", "counter incremented");
    }

    /// An unknown rater was given an equal-share weight.
    pub fn inc_fallback_weights(&self) {
        self.fallback_weights.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "fallback_weights", "counter incremented");
    }

    pub fn add_abstentions(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.abstentions_skipped.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "abstentions_skipped", n, "counter incremented");
    }

    /// A consensus fell back to the unweighted mean.
    pub fn inc_unweighted_fallbacks(&self) {
        self.unweighted_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "unweighted_fallbacks", "counter incremented");
    }

    /// A rater abstained on a dimension that does not allow it.
    pub fn inc_required_abstentions(&self) {
        self.required_abstentions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "required_abstentions", "counter incremented");
    }

    pub fn inc_history_appends(&self) {
        self.history_appends.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "history_appends", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            evaluations_completed = self.evaluations_completed(),
            fallback_weights = self.fallback_weights(),
            abstentions_skipped = self.abstentions_skipped(),
            unweighted_fallbacks = self.unweighted_fallbacks(),
            required_abstentions = self.required_abstentions(),
            history_appends = self.history_appends(),
        );
    }

    pub fn evaluations_completed(&self) -> u64 {
        self.evaluations_completed.load(Ordering::Relaxed)
    }

    pub fn fallback_weights(&self) -> u64 {
        self.fallback_weights.load(Ordering::Relaxed)
    }

    pub fn abstentions_skipped(&self) -> u64 {
        self.abstentions_skipped.load(Ordering::Relaxed)
    }

    pub fn unweighted_fallbacks(&self) -> u64 {
        self.unweighted_fallbacks.load(Ordering::Relaxed)
    }

    pub fn required_abstentions(&self) -> u64 {
        self.required_abstentions.load(Ordering::Relaxed)
    }

    pub fn history_appends(&self) -> u64 {
        self.history_appends.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.evaluations_completed.store(0, Ordering::Relaxed);
        self.fallback_weights.store(0, Ordering::Relaxed);
        self.abstentions_skipped.store(0, Ordering::Relaxed);
        self.unweighted_fallbacks.store(0, Ordering::Relaxed);
        self.required_abstentions.store(0, Ordering::Relaxed);
        self.history_appends.store(0, Ordering::Relaxed);
    }
}
