// self
use crate::obs::{OutcomeKind, ReconcilePath};

/// Records a reconcile outcome via the global metrics recorder (when enabled).
pub fn record_reconcile_outcome(path: ReconcilePath, outcome: OutcomeKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"azurerator_reconcile_total",
			"path" => path.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (path, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_reconcile_outcome_noop_without_metrics() {
		record_reconcile_outcome(ReconcilePath::Sync, OutcomeKind::Fatal);
	}
}
