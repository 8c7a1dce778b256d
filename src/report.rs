//! Status commits and events at the end of a reconcile.
//!
//! A successful sync advances the hash only when everything the desired state asked for was
//! applied. A failed sync records `FailedSynchronization` while keeping the previous hash, so
//! the next attempt re-evaluates instead of short-circuiting. Interrupted attempts (timeout or
//! cancellation) leave status untouched.

// self
use crate::{
	_prelude::*,
	credential::Rotation,
	error::ErrorClass,
	event::EventReason,
	hash::SpecHash,
	obs::log_event,
	reconciler::{ReconcileOutcome, Session},
	resource::SyncState,
	store::StoreError,
};

/// What a full sync changed in the directory.
#[derive(Clone, Debug, Default)]
pub(crate) struct SyncReport {
	pub(crate) created: bool,
	pub(crate) updated: bool,
	pub(crate) rotations: Vec<Rotation>,
	/// Pre-authorized callers that do not exist in the directory yet.
	pub(crate) unresolved: Vec<String>,
}

/// Commits a successful sync and emits the matching events.
pub(crate) async fn synchronized(
	session: &mut Session<'_>,
	hash: SpecHash,
	report: SyncReport,
) -> ReconcileOutcome {
	let fully_applied = report.unresolved.is_empty();

	session.status.synchronization_state = Some(SyncState::Synchronized);
	session.status.synchronization_time = Some(session.now);
	session.status.correlation_id = Some(session.correlation_id.clone());

	if fully_applied {
		session.status.synchronization_hash = Some(hash);
	}
	if let Err(err) = session.persist_status().await {
		return status_update_failed(session, err);
	}

	let client_id = session.status.client_id.as_ref().map(ToString::to_string).unwrap_or_default();

	if report.created {
		session.emit(EventReason::CreatedInAzure, format!("Application created with client id {client_id}."));
	} else if report.updated {
		session.emit(EventReason::UpdatedInAzure, format!("Application {client_id} updated."));
	}
	if !report.created {
		for rotation in &report.rotations {
			session.emit(
				EventReason::RotatedInAzure,
				format!("Rotated {} credential, new key id {}.", rotation.kind, rotation.key_id),
			);
		}
	}

	session.emit(EventReason::Synchronized, "Application is synchronized with the directory.");

	if fully_applied {
		ReconcileOutcome::Success
	} else {
		log_event!(
			info,
			unresolved = ?report.unresolved,
			"Pre-authorized applications are not registered yet."
		);

		ReconcileOutcome::Retry { after: session.config().resync_interval }
	}
}

/// Commits a failed attempt and decides whether it is retried.
pub(crate) async fn failed(session: &mut Session<'_>, err: Error) -> ReconcileOutcome {
	let class = err.class();

	log_event!(warn, error = %err, class = class.as_str(), "Reconcile failed.");

	if class == ErrorClass::Interrupted {
		if matches!(err, Error::Timeout { .. }) {
			session.emit(EventReason::Retrying, format!("Retrying after timeout: {err}"));
		}

		return ReconcileOutcome::Retry { after: session.config().retry_interval };
	}
	// Someone else wrote the record; our view is stale, so leave status to the next attempt.
	if matches!(err, Error::Store(StoreError::Conflict { .. })) {
		session.emit(EventReason::Retrying, format!("Retrying after concurrent update: {err}"));

		return ReconcileOutcome::Retry { after: session.config().conflict_retry_interval };
	}

	session.status.synchronization_state = Some(SyncState::FailedSynchronization);
	session.status.correlation_id = Some(session.correlation_id.clone());

	if let Err(status_err) = session.persist_status().await {
		session.emit(
			EventReason::FailedStatusUpdate,
			format!("Failed to record the failure in status: {status_err}"),
		);
	}

	session.emit(EventReason::FailedSynchronization, err.to_string());

	if class.is_retryable() {
		let after = retry_delay(session, &err);

		session.emit(EventReason::Retrying, format!("Retrying in {after}."));

		ReconcileOutcome::Retry { after }
	} else {
		ReconcileOutcome::Fatal(err)
	}
}

/// The directory is in sync but status could not be written; retrying re-confirms it.
fn status_update_failed(session: &Session<'_>, err: Error) -> ReconcileOutcome {
	session.emit(EventReason::FailedStatusUpdate, format!("Failed to update status: {err}"));

	ReconcileOutcome::Retry { after: retry_delay(session, &err) }
}

fn retry_delay(session: &Session<'_>, err: &Error) -> Duration {
	let config = session.config();

	match err.class() {
		ErrorClass::Conflict => config.conflict_retry_interval,
		_ => err.retry_after().unwrap_or(config.retry_interval),
	}
}
