//! Observed-state section of an application resource.

// self
use crate::{
	_prelude::*,
	credential::CredentialKind,
	hash::SpecHash,
	resource::{ClientId, CorrelationId, KeyId, ObjectId, ServicePrincipalId},
};

/// Synchronization state recorded on the resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
	/// The directory reflects the desired state.
	Synchronized,
	/// The last attempt failed; the directory state is unknown or stale.
	FailedSynchronization,
}
impl SyncState {
	/// Returns the stable wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			SyncState::Synchronized => "Synchronized",
			SyncState::FailedSynchronization => "FailedSynchronization",
		}
	}
}
impl Display for SyncState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Observed state written exclusively by the reconciler.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
	/// Outcome of the last reconcile attempt.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub synchronization_state: Option<SyncState>,
	/// Instant of the last successful synchronization.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub synchronization_time: Option<OffsetDateTime>,
	/// Hash of the last fully applied desired state.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub synchronization_hash: Option<SpecHash>,
	/// Reconcile attempt that produced this status.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub correlation_id: Option<CorrelationId>,
	/// Valid password credential key ids, newest last.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub password_key_ids: Vec<KeyId>,
	/// Valid certificate credential key ids, newest last.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub certificate_key_ids: Vec<KeyId>,
	/// Instant the current password credential was committed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub password_rotation_time: Option<OffsetDateTime>,
	/// Instant the current certificate credential was committed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub certificate_rotation_time: Option<OffsetDateTime>,
	/// Secret target that most recently received credential material.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret_name: Option<String>,
	/// Directory client id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_id: Option<ClientId>,
	/// Directory object id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub object_id: Option<ObjectId>,
	/// Directory service principal id.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub service_principal_id: Option<ServicePrincipalId>,
}
impl ApplicationStatus {
	/// Key ids recorded for the given credential kind.
	pub fn key_ids(&self, kind: CredentialKind) -> &[KeyId] {
		match kind {
			CredentialKind::Password => &self.password_key_ids,
			CredentialKind::Certificate => &self.certificate_key_ids,
		}
	}

	/// Returns the newest key id of the given kind.
	pub fn current_key_id(&self, kind: CredentialKind) -> Option<&KeyId> {
		self.key_ids(kind).last()
	}

	/// Rotation instant recorded for the given kind.
	pub fn rotation_time(&self, kind: CredentialKind) -> Option<OffsetDateTime> {
		match kind {
			CredentialKind::Password => self.password_rotation_time,
			CredentialKind::Certificate => self.certificate_rotation_time,
		}
	}

	/// Returns `true` once the external application is known.
	pub fn is_provisioned(&self) -> bool {
		self.client_id.is_some() && self.object_id.is_some()
	}

	pub(crate) fn key_ids_mut(&mut self, kind: CredentialKind) -> &mut Vec<KeyId> {
		match kind {
			CredentialKind::Password => &mut self.password_key_ids,
			CredentialKind::Certificate => &mut self.certificate_key_ids,
		}
	}

	pub(crate) fn set_rotation_time(&mut self, kind: CredentialKind, at: Option<OffsetDateTime>) {
		match kind {
			CredentialKind::Password => self.password_rotation_time = at,
			CredentialKind::Certificate => self.certificate_rotation_time = at,
		}
	}

	/// Forgets everything learned about an external application that no longer exists.
	pub(crate) fn forget_application(&mut self) {
		self.client_id = None;
		self.object_id = None;
		self.service_principal_id = None;

		for kind in CredentialKind::ALL {
			self.key_ids_mut(kind).clear();
			self.set_rotation_time(kind, None);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_serializes_with_camel_case_and_skips_empty_fields() {
		let status = ApplicationStatus {
			synchronization_state: Some(SyncState::Synchronized),
			client_id: Some(ClientId::new("client-1").expect("Client fixture should be valid.")),
			..Default::default()
		};
		let payload = serde_json::to_value(&status).expect("Status should serialize.");

		assert_eq!(payload["synchronizationState"], "Synchronized");
		assert_eq!(payload["clientId"], "client-1");
		assert!(payload.get("passwordKeyIds").is_none());
	}

	#[test]
	fn forget_application_clears_identifiers_and_credentials() {
		let mut status = ApplicationStatus {
			client_id: Some(ClientId::new("client-1").expect("Client fixture should be valid.")),
			object_id: Some(ObjectId::new("object-1").expect("Object fixture should be valid.")),
			password_key_ids: vec![KeyId::new("key-1").expect("Key fixture should be valid.")],
			password_rotation_time: Some(OffsetDateTime::UNIX_EPOCH),
			..Default::default()
		};

		assert!(status.is_provisioned());

		status.forget_application();

		assert!(!status.is_provisioned());
		assert!(status.key_ids(CredentialKind::Password).is_empty());
		assert_eq!(status.rotation_time(CredentialKind::Password), None);
	}
}
