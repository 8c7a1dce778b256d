//! Credential kinds and the rotation policy that decides when a new credential is due.

// self
use crate::{_prelude::*, resource::ApplicationStatus};

/// Kind of credential attached to an application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
	/// Client secret.
	Password,
	/// Certificate / private key pair.
	Certificate,
}
impl CredentialKind {
	/// Every kind, in provisioning order.
	pub const ALL: [CredentialKind; 2] = [CredentialKind::Password, CredentialKind::Certificate];

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::Password => "password",
			CredentialKind::Certificate => "certificate",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why a rotation was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationReason {
	/// No current credential of the kind is recorded.
	Missing,
	/// The current credential is older than the rotation interval.
	Aged,
	/// The caller asked for a rotation.
	Forced,
	/// The secret target does not hold the current credential (renamed, reset or never
	/// delivered).
	SecretTargetChanged,
}

/// Which credentials must exist and how long each one lives.
///
/// A credential is replaced once it is `rotation_interval` old and expires in the directory
/// after `lifetime`; the difference is the overlap during which the previous credential keeps
/// working for in-flight tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialPolicy {
	/// Maintain a password credential.
	pub require_password: bool,
	/// Maintain a certificate credential.
	pub require_certificate: bool,
	/// Age after which a new credential is issued.
	pub rotation_interval: Duration,
	/// Validity requested for each new credential.
	pub lifetime: Duration,
}
impl CredentialPolicy {
	const DEFAULT_LIFETIME: Duration = Duration::days(180);
	const DEFAULT_ROTATION_INTERVAL: Duration = Duration::days(90);

	/// Kinds that must be provisioned, in provisioning order.
	pub fn required_kinds(&self) -> Vec<CredentialKind> {
		CredentialKind::ALL
			.into_iter()
			.filter(|kind| match kind {
				CredentialKind::Password => self.require_password,
				CredentialKind::Certificate => self.require_certificate,
			})
			.collect()
	}

	/// Decides whether the recorded credential of `kind` must be replaced.
	///
	/// `delivered` tells whether the desired secret target already holds the current
	/// credential of this kind.
	pub fn rotation_due(
		&self,
		status: &ApplicationStatus,
		kind: CredentialKind,
		delivered: bool,
		force: bool,
		now: OffsetDateTime,
	) -> Option<RotationReason> {
		if status.current_key_id(kind).is_none() {
			return Some(RotationReason::Missing);
		}
		if force {
			return Some(RotationReason::Forced);
		}
		if !delivered {
			return Some(RotationReason::SecretTargetChanged);
		}

		match status.rotation_time(kind) {
			Some(rotated_at) if now - rotated_at < self.rotation_interval => None,
			_ => Some(RotationReason::Aged),
		}
	}

	/// Returns `true` when status alone proves every required credential is current.
	///
	/// A settled status names `secret_name` as the last fully written target, holds exactly
	/// one key id per required kind (no interrupted rotation), and none of them is due for
	/// rotation.
	pub fn is_settled(&self, status: &ApplicationStatus, secret_name: &str, now: OffsetDateTime) -> bool {
		let delivered = status.secret_name.as_deref() == Some(secret_name);

		self.required_kinds().into_iter().all(|kind| {
			status.key_ids(kind).len() == 1
				&& self.rotation_due(status, kind, delivered, false, now).is_none()
		})
	}

	/// Expiry requested for a credential issued at `now`.
	pub fn expires_at(&self, now: OffsetDateTime) -> OffsetDateTime {
		now + self.lifetime
	}
}
impl Default for CredentialPolicy {
	fn default() -> Self {
		Self {
			require_password: true,
			require_certificate: false,
			rotation_interval: Self::DEFAULT_ROTATION_INTERVAL,
			lifetime: Self::DEFAULT_LIFETIME,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::resource::KeyId;

	fn settled_status(rotated_at: OffsetDateTime) -> ApplicationStatus {
		ApplicationStatus {
			password_key_ids: vec![KeyId::new("key-1").expect("Key fixture should be valid.")],
			password_rotation_time: Some(rotated_at),
			secret_name: Some("s1".into()),
			..Default::default()
		}
	}

	#[test]
	fn default_policy_requires_password_only() {
		let policy = CredentialPolicy::default();

		assert_eq!(policy.required_kinds(), vec![CredentialKind::Password]);
		assert!(policy.lifetime > policy.rotation_interval);
	}

	#[test]
	fn rotation_reasons_follow_status() {
		let policy = CredentialPolicy::default();
		let rotated = macros::datetime!(2026-01-01 00:00 UTC);
		let status = settled_status(rotated);
		let soon = rotated + Duration::days(1);
		let late = rotated + Duration::days(91);

		assert_eq!(policy.rotation_due(&status, CredentialKind::Password, true, false, soon), None);
		assert_eq!(
			policy.rotation_due(&status, CredentialKind::Password, true, true, soon),
			Some(RotationReason::Forced)
		);
		assert_eq!(
			policy.rotation_due(&status, CredentialKind::Password, false, false, soon),
			Some(RotationReason::SecretTargetChanged)
		);
		assert_eq!(
			policy.rotation_due(&status, CredentialKind::Password, true, false, late),
			Some(RotationReason::Aged)
		);
		assert_eq!(
			policy.rotation_due(&status, CredentialKind::Certificate, true, false, soon),
			Some(RotationReason::Missing)
		);
	}

	#[test]
	fn renamed_secret_target_is_not_settled() {
		let policy = CredentialPolicy::default();
		let rotated = macros::datetime!(2026-01-01 00:00 UTC);
		let status = settled_status(rotated);

		assert!(policy.is_settled(&status, "s1", rotated));
		assert!(!policy.is_settled(&status, "s2", rotated));
	}

	#[test]
	fn interrupted_rotation_is_not_settled() {
		let policy = CredentialPolicy::default();
		let rotated = macros::datetime!(2026-01-01 00:00 UTC);
		let mut status = settled_status(rotated);

		assert!(policy.is_settled(&status, "s1", rotated));

		status.password_key_ids.push(KeyId::new("key-2").expect("Key fixture should be valid."));

		assert!(!policy.is_settled(&status, "s1", rotated));
	}
}
