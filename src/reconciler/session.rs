//! Per-attempt state threaded through the reconcile steps.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	config::ReconcilerConfig,
	directory::DirectoryClient,
	event::{EventReason, ResourceEvent},
	obs::log_event,
	reconciler::Reconciler,
	resource::{ApplicationStatus, CorrelationId, ResourceKey, ResourceVersion},
	secret::SecretStore,
};

/// Working copy of one reconcile attempt.
///
/// `status` is the observed state as this attempt believes it to be; it is only persisted by
/// [`Session::persist_status`], which also advances `version` so later writes stay
/// conditional on this attempt's own last write.
pub(crate) struct Session<'r> {
	reconciler: &'r Reconciler,
	cancel: &'r CancellationToken,
	pub(crate) key: ResourceKey,
	pub(crate) version: ResourceVersion,
	pub(crate) status: ApplicationStatus,
	pub(crate) correlation_id: CorrelationId,
	pub(crate) now: OffsetDateTime,
}
impl<'r> Session<'r> {
	pub(crate) fn new(
		reconciler: &'r Reconciler,
		cancel: &'r CancellationToken,
		key: ResourceKey,
		version: ResourceVersion,
		status: ApplicationStatus,
		correlation_id: CorrelationId,
	) -> Self {
		Self {
			reconciler,
			cancel,
			key,
			version,
			status,
			correlation_id,
			now: OffsetDateTime::now_utc(),
		}
	}

	pub(crate) fn config(&self) -> &'r ReconcilerConfig {
		&self.reconciler.config
	}

	pub(crate) fn directory(&self) -> &'r dyn DirectoryClient {
		self.reconciler.directory.as_ref()
	}

	pub(crate) fn secrets(&self) -> &'r dyn SecretStore {
		self.reconciler.secrets.as_ref()
	}

	/// Runs one external call under the call timeout, aborting early on cancellation.
	pub(crate) async fn call<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T, E>>,
		Error: From<E>,
	{
		let timeout = self.reconciler.call_timeout();

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(Error::Cancelled { operation }),
			result = tokio::time::timeout(timeout, fut) => match result {
				Ok(inner) => inner.map_err(Error::from),
				Err(_) => Err(Error::Timeout { operation }),
			},
		}
	}

	/// Writes the working status, conditional on the last version this attempt observed.
	///
	/// Store writes honor the call timeout but not cancellation: a credential that was already
	/// issued must still be recorded.
	pub(crate) async fn persist_status(&mut self) -> Result<()> {
		let timeout = self.reconciler.call_timeout();
		let write =
			self.reconciler.resources.update_status(&self.key, self.version, self.status.clone());
		let version = tokio::time::timeout(timeout, write)
			.await
			.map_err(|_| Error::Timeout { operation: "update_status" })??;

		self.version = version;

		Ok(())
	}

	/// Adds the finalizer, conditional on the last version this attempt observed.
	pub(crate) async fn acquire_finalizer(&mut self) -> Result<()> {
		let timeout = self.reconciler.call_timeout();
		let finalizer = self.reconciler.config.finalizer.as_str();
		let write = self.reconciler.resources.add_finalizer(&self.key, self.version, finalizer);
		let version = tokio::time::timeout(timeout, write)
			.await
			.map_err(|_| Error::Timeout { operation: "add_finalizer" })??;

		self.version = version;

		Ok(())
	}

	/// Removes the finalizer, conditional on the last version this attempt observed.
	pub(crate) async fn release_finalizer(&mut self) -> Result<()> {
		let timeout = self.reconciler.call_timeout();
		let finalizer = self.reconciler.config.finalizer.as_str();
		let write = self.reconciler.resources.remove_finalizer(&self.key, self.version, finalizer);

		tokio::time::timeout(timeout, write)
			.await
			.map_err(|_| Error::Timeout { operation: "remove_finalizer" })??;

		Ok(())
	}

	/// Records an event stamped with this attempt's correlation id.
	pub(crate) fn emit(&self, reason: EventReason, message: impl Into<String>) {
		let message = message.into();

		log_event!(info, reason = reason.as_str(), %message, "Recorded resource event.");

		self.reconciler.events.record(ResourceEvent::new(
			self.key.clone(),
			reason,
			message,
			self.correlation_id.clone(),
		));
	}
}
