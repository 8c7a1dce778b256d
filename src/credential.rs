//! Credential lifecycle: which credentials are current, when they rotate and how an interrupted
//! rotation is resumed.
//!
//! A rotation runs four individually idempotent steps: issue a credential, record its key id
//! in status (persisted before anything else happens), deliver the material to the secret
//! store, then revoke the previous credentials. A crash between any two steps leaves at least
//! one valid credential recorded. The next attempt compares status with the key id the secret
//! store actually holds: recorded ids newer than the delivered one were never handed out and
//! are revoked, older ones finish the interrupted revocation. When the store holds none of the
//! recorded ids (never delivered, or lost out of band) the current credential is kept and
//! replaced by a regular rotation.

mod material;
mod policy;

pub use material::*;
pub use policy::*;

// std
use std::collections::BTreeSet;
// self
use crate::{
	_prelude::*,
	directory::{Application, CredentialRequest, DirectoryError},
	error::ErrorClass,
	obs::log_event,
	reconciler::Session,
	resource::{KeyId, ObjectId, TenantAlias},
	secret::{SecretPayload, SecretTarget},
};

/// Credential issued during a reconcile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rotation {
	/// Kind of the new credential.
	pub kind: CredentialKind,
	/// Why it was issued.
	pub reason: RotationReason,
	/// Key id of the new credential.
	pub key_id: KeyId,
}

/// Brings the credentials of one application in line with the policy.
pub(crate) struct CredentialManager<'a> {
	policy: &'a CredentialPolicy,
	secret_name: &'a str,
	tenant: Option<TenantAlias>,
	force: bool,
}
impl<'a> CredentialManager<'a> {
	pub(crate) fn new(
		policy: &'a CredentialPolicy,
		secret_name: &'a str,
		tenant: Option<TenantAlias>,
		force: bool,
	) -> Self {
		Self { policy, secret_name, tenant, force }
	}

	/// Reconciles every required kind; a kind that fails does not block the others.
	///
	/// Returns the rotations performed. If any kind failed the attempt fails as a whole:
	/// non-retryable errors surface unchanged, otherwise a partially provisioned application
	/// is reported as [`Error::IncompleteCredentials`].
	pub(crate) async fn reconcile(
		&self,
		session: &mut Session<'_>,
		application: &Application,
	) -> Result<Vec<Rotation>> {
		let mut rotations = Vec::new();
		let mut missing = Vec::new();
		let mut first_error = None;

		for kind in self.policy.required_kinds() {
			match self.reconcile_kind(session, application, kind).await {
				Ok(rotation) => rotations.extend(rotation),
				Err(err) if err.class() == ErrorClass::Interrupted => return Err(err),
				Err(err) => {
					log_event!(warn, kind = kind.as_str(), error = %err, "Credential reconcile failed.");

					missing.push(kind);
					first_error.get_or_insert(err);
				},
			}
		}

		let Some(err) = first_error else {
			session.status.secret_name = Some(self.secret_name.to_owned());

			return Ok(rotations);
		};

		if !err.is_retryable() || missing.len() == self.policy.required_kinds().len() {
			Err(err)
		} else {
			Err(Error::IncompleteCredentials { missing })
		}
	}

	async fn reconcile_kind(
		&self,
		session: &mut Session<'_>,
		application: &Application,
		kind: CredentialKind,
	) -> Result<Option<Rotation>> {
		let object_id = &application.object_id;
		let mut revoked = BTreeSet::new();

		self.prune(session, application, kind);

		let (at_target, delivered) = self.delivered_key_ids(session, kind).await?;

		// Recorded ids newer than a delivered one belong to an interrupted rotation. Without any
		// delivered id the current credential stays until its replacement has been written.
		let resumable = session.status.key_ids(kind).iter().any(|id| delivered.contains(id));

		while let Some(newest) = session.status.current_key_id(kind).cloned() {
			if !resumable || delivered.contains(&newest) {
				break;
			}

			log_event!(info, kind = kind.as_str(), key_id = %newest, "Revoking undelivered credential.");

			revoke(session, object_id, &newest).await?;
			session.status.key_ids_mut(kind).pop();
			revoked.insert(newest);
		}

		// Older ids behind the delivered one finish an interrupted revocation.
		if session.status.key_ids(kind).len() > 1 {
			let stale = session.status.key_ids(kind).split_last().map(|(_, older)| older.to_vec());

			for key_id in stale.unwrap_or_default() {
				revoke(session, object_id, &key_id).await?;
				session.status.key_ids_mut(kind).retain(|id| id != &key_id);
				revoked.insert(key_id);
			}

			session.status.set_rotation_time(kind, Some(session.now));
		}
		if session.status.key_ids(kind).is_empty() {
			session.status.set_rotation_time(kind, None);
		}

		let strays: Vec<KeyId> = application
			.credentials
			.iter()
			.filter(|c| c.kind == kind)
			.map(|c| c.key_id.clone())
			.filter(|id| {
				!session.status.key_ids(kind).contains(id)
					&& !delivered.contains(id)
					&& !revoked.contains(id)
			})
			.collect();

		for key_id in strays {
			log_event!(info, kind = kind.as_str(), key_id = %key_id, "Revoking untracked credential.");

			revoke(session, object_id, &key_id).await?;
		}

		let current_delivered =
			at_target.is_some() && at_target.as_ref() == session.status.current_key_id(kind);
		let Some(reason) =
			self.policy.rotation_due(&session.status, kind, current_delivered, self.force, session.now)
		else {
			return Ok(None);
		};

		self.rotate(session, application, kind, reason).await.map(Some)
	}

	/// Drops recorded ids that are missing or expired in the directory.
	fn prune(&self, session: &mut Session<'_>, application: &Application, kind: CredentialKind) {
		let now = session.now;

		session.status.key_ids_mut(kind).retain(|key_id| {
			application.credential(key_id).is_some_and(|c| c.kind == kind && c.is_valid_at(now))
		});
	}

	/// Key id held by the desired secret target, plus every key id delivered to it or to the
	/// target last written.
	async fn delivered_key_ids(
		&self,
		session: &Session<'_>,
		kind: CredentialKind,
	) -> Result<(Option<KeyId>, BTreeSet<KeyId>)> {
		let desired = SecretTarget::new(session.key.namespace.clone(), self.secret_name);
		let at_target =
			session.call("read_secret", session.secrets().current_key_id(&desired, kind)).await?;
		let mut delivered: BTreeSet<KeyId> = at_target.iter().cloned().collect();

		if let Some(previous) = session.status.secret_name.as_deref().filter(|name| *name != self.secret_name)
		{
			let target = SecretTarget::new(session.key.namespace.clone(), previous);
			let current =
				session.call("read_secret", session.secrets().current_key_id(&target, kind)).await?;

			delivered.extend(current);
		}

		Ok((at_target, delivered))
	}

	async fn rotate(
		&self,
		session: &mut Session<'_>,
		application: &Application,
		kind: CredentialKind,
		reason: RotationReason,
	) -> Result<Rotation> {
		let object_id = &application.object_id;
		let request = CredentialRequest {
			kind,
			display_name: format!("{}-{}", kind.as_str(), session.now.unix_timestamp()),
			expires_at: self.policy.expires_at(session.now),
		};

		log_event!(info, kind = kind.as_str(), reason = ?reason, "Rotating credential.");

		let issued =
			session.call("add_credential", session.directory().add_credential(object_id, &request)).await?;
		let key_id = issued.info.key_id.clone();

		session.status.key_ids_mut(kind).push(key_id.clone());
		session.persist_status().await?;

		let target = SecretTarget::new(session.key.namespace.clone(), self.secret_name);
		let payload = SecretPayload {
			client_id: application.client_id.clone(),
			tenant: self.tenant.clone(),
			kind,
			key_id: key_id.clone(),
			material: issued.material,
			expires_at: issued.info.end,
		};

		session.call("write_secret", session.secrets().write(&target, &payload)).await?;

		let previous: Vec<KeyId> =
			session.status.key_ids(kind).iter().filter(|id| *id != &key_id).cloned().collect();

		for old in previous {
			revoke(session, object_id, &old).await?;
			session.status.key_ids_mut(kind).retain(|id| id != &old);
		}

		session.status.set_rotation_time(kind, Some(session.now));

		Ok(Rotation { kind, reason, key_id })
	}
}

/// Revokes one credential; a credential that is already gone counts as revoked.
pub(crate) async fn revoke(session: &Session<'_>, object_id: &ObjectId, key_id: &KeyId) -> Result<()> {
	let revocation = session.directory().revoke_credential(object_id, key_id);

	session.call("revoke_credential", not_found_ok(revocation)).await
}

/// Maps [`DirectoryErrorKind::NotFound`](crate::directory::DirectoryErrorKind::NotFound) to success.
pub(crate) async fn not_found_ok<F>(fut: F) -> Result<(), DirectoryError>
where
	F: Future<Output = Result<(), DirectoryError>>,
{
	match fut.await {
		Err(err) if err.is_not_found() => Ok(()),
		other => other,
	}
}
