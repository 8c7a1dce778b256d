//! Optional observability helpers for reconciles.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every reconcile in a span named `azurerator.reconcile` with the
//!   `namespace`, `name` and `correlation_id` fields, and to emit structured log events.
//! - Enable `metrics` to increment the `azurerator_reconcile_total` counter for every
//!   attempt and terminal outcome, labeled by `path` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Emits a structured log event when the `tracing` feature is enabled.
macro_rules! log_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	};
}
pub(crate) use log_event;

/// Branch a reconcile took.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReconcilePath {
	/// Entry, before the resource was loaded.
	Load,
	/// The resource no longer exists.
	Missing,
	/// The resource belongs to another tenant or a non-team namespace.
	Skipped,
	/// The finalizer was added.
	Finalizer,
	/// Nothing changed since the last successful sync.
	Noop,
	/// Directory state was created or updated.
	Sync,
	/// The application was deprovisioned.
	Teardown,
}
impl ReconcilePath {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ReconcilePath::Load => "load",
			ReconcilePath::Missing => "missing",
			ReconcilePath::Skipped => "skipped",
			ReconcilePath::Finalizer => "finalizer",
			ReconcilePath::Noop => "noop",
			ReconcilePath::Sync => "sync",
			ReconcilePath::Teardown => "teardown",
		}
	}
}
impl Display for ReconcilePath {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
	/// Entry to a reconcile.
	Attempt,
	/// Completed without a requeue.
	Success,
	/// Requeued.
	Retry,
	/// Gave up until the resource changes.
	Fatal,
}
impl OutcomeKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OutcomeKind::Attempt => "attempt",
			OutcomeKind::Success => "success",
			OutcomeKind::Retry => "retry",
			OutcomeKind::Fatal => "fatal",
		}
	}
}
impl Display for OutcomeKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
