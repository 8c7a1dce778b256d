//! Secret store contract for delivering credential material to workloads.

pub mod memory;

pub use memory::MemorySecretStore;

// self
use crate::{
	_prelude::*,
	credential::{CredentialKind, SecretMaterial},
	resource::{ClientId, KeyId, Namespace, TenantAlias},
};

/// Boxed future returned by [`SecretStore`] operations.
pub type SecretFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SecretStoreError>> + 'a + Send>>;

/// Storage backend that receives credential material.
///
/// `write` must complete before the credential it replaces is revoked. `current_key_id`
/// reports which credential a target currently holds so interrupted rotations can be resumed
/// without writing material twice.
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Writes (or replaces) the material of one credential kind at the target.
	fn write<'a>(&'a self, target: &'a SecretTarget, payload: &'a SecretPayload) -> SecretFuture<'a, ()>;

	/// Returns the key id of the credential of `kind` currently stored at the target.
	fn current_key_id<'a>(
		&'a self,
		target: &'a SecretTarget,
		kind: CredentialKind,
	) -> SecretFuture<'a, Option<KeyId>>;
}

/// Namespaced name of a secret.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretTarget {
	/// Namespace of the owning resource.
	pub namespace: Namespace,
	/// Secret name from the desired state.
	pub name: String,
}
impl SecretTarget {
	/// Builds a target.
	pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
		Self { namespace, name: name.into() }
	}
}
impl Display for SecretTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// Material and metadata written for one credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretPayload {
	/// Client id the credential authenticates.
	pub client_id: ClientId,
	/// Tenant alias the application lives in.
	pub tenant: Option<TenantAlias>,
	/// Credential kind.
	pub kind: CredentialKind,
	/// Key id of the credential.
	pub key_id: KeyId,
	/// Secret material.
	pub material: SecretMaterial,
	/// End of validity.
	pub expires_at: OffsetDateTime,
}

/// Error type produced by [`SecretStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SecretStoreError {
	/// Temporary failure; the write may be retried.
	#[error("Secret store is unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// The store refused the write; retrying will not help.
	#[error("Secret store rejected the write: {message}.")]
	Rejected {
		/// Human-readable error payload.
		message: String,
	},
}
