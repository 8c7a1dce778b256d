// self
use crate::{
	_prelude::*,
	resource::{CorrelationId, ResourceKey},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedReconcile<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedReconcile<F> = F;

/// Span covering one reconcile attempt.
#[derive(Clone, Debug)]
pub struct ReconcileSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl ReconcileSpan {
	/// Creates a new span tagged with the resource and the attempt's correlation id.
	pub fn new(key: &ResourceKey, correlation_id: &CorrelationId) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"azurerator.reconcile",
				namespace = %key.namespace,
				name = %key.name,
				correlation_id = %correlation_id,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (key, correlation_id);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedReconcile<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let key = ResourceKey::parse("team-a", "app").expect("Key fixture should be valid.");
		let span = ReconcileSpan::new(&key, &CorrelationId::generate());
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
