// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for reconcile attempts.
#[derive(Debug, Default)]
pub struct ReconcileMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	noop: AtomicU64,
	retry: AtomicU64,
	failure: AtomicU64,
}
impl ReconcileMetrics {
	/// Returns the total number of reconcile attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of reconciles that finished without a requeue (including no-ops).
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of reconciles that took the no-op path.
	pub fn noops(&self) -> u64 {
		self.noop.load(Ordering::Relaxed)
	}

	/// Returns the number of reconciles that requested a retry.
	pub fn retries(&self) -> u64 {
		self.retry.load(Ordering::Relaxed)
	}

	/// Returns the number of reconciles that gave up with a fatal error.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_noop(&self) {
		self.noop.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retry.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
