//! Finalizer state machine: external deprovisioning happens before the record may disappear.
//!
//! The finalizer is added (and committed) before the first directory call of a resource, and
//! only removed after the application and its credentials are gone. Each teardown step treats
//! `NotFound` as success, so an application deleted out of band never blocks deletion.

// self
use crate::{
	_prelude::*,
	credential::{self, CredentialKind},
	directory::{Application, ApplicationLookup},
	obs::log_event,
	reconciler::Session,
	resource::ApplicationResource,
};

/// Lifecycle of a resource with respect to the finalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FinalizerState {
	/// Finalizer absent; nothing was provisioned yet.
	Unmanaged,
	/// Finalizer present; the application may or may not exist.
	Managed,
	/// Deletion requested while the finalizer is present.
	Terminating,
	/// Deletion requested and the finalizer is gone; the record is awaiting removal.
	Deprovisioned,
}
impl FinalizerState {
	/// Derives the state from a record and the finalizer owned by this controller.
	pub fn observe(resource: &ApplicationResource, finalizer: &str) -> Self {
		match (resource.is_deletion_requested(), resource.has_finalizer(finalizer)) {
			(false, false) => FinalizerState::Unmanaged,
			(false, true) => FinalizerState::Managed,
			(true, true) => FinalizerState::Terminating,
			(true, false) => FinalizerState::Deprovisioned,
		}
	}
}

/// Result of a completed teardown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Teardown {
	/// Whether an application was deleted by this attempt.
	pub(crate) deleted: bool,
}

/// Revokes recorded credentials, deletes the application, then removes the finalizer.
pub(crate) async fn teardown(session: &mut Session<'_>, display_name: &str) -> Result<Teardown> {
	let mut outcome = Teardown::default();

	if let Some(application) = locate(session, display_name).await? {
		let object_id = application.object_id.clone();

		for kind in CredentialKind::ALL {
			for key_id in session.status.key_ids(kind).to_vec() {
				credential::revoke(session, &object_id, &key_id).await?;
				session.status.key_ids_mut(kind).retain(|id| id != &key_id);
			}
		}

		log_event!(info, object_id = %object_id, "Deleting application.");

		session
			.call("delete", credential::not_found_ok(session.directory().delete(&object_id)))
			.await?;
		session.status.forget_application();

		outcome.deleted = true;
	}

	session.release_finalizer().await?;

	Ok(outcome)
}

/// Finds the application by recorded client id, falling back to the display name so a crash
/// between create and the first status commit is still cleaned up.
async fn locate(session: &Session<'_>, display_name: &str) -> Result<Option<Application>> {
	if let Some(client_id) = session.status.client_id.clone() {
		let query = ApplicationLookup::ClientId(client_id);

		if let Some(application) = session.call("lookup", session.directory().lookup(&query)).await? {
			return Ok(Some(application));
		}
	}

	let query = ApplicationLookup::DisplayName(display_name.to_owned());

	session.call("lookup", session.directory().lookup(&query)).await
}
