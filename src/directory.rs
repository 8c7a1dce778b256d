//! Directory client contract consumed by the reconciler.
//!
//! The reconciler never talks to the identity provider directly. Every call goes through
//! [`DirectoryClient`], whose implementations classify their failures with
//! [`DirectoryErrorKind`] so the reconciler can decide between retrying, healing and giving
//! up without inspecting message text. All operations must tolerate re-invocation after an
//! unknown outcome.

pub mod memory;

pub use memory::{DirectoryCall, DirectoryOperation, MemoryDirectory};

// self
use crate::{
	_prelude::*,
	credential::{CredentialKind, SecretMaterial},
	resource::{ClientId, ExtraClaim, KeyId, ObjectId, ServicePrincipalId},
};

/// Boxed future returned by [`DirectoryClient`] operations.
pub type DirectoryFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + 'a + Send>>;

/// Operations the reconciler needs from the identity directory.
pub trait DirectoryClient
where
	Self: Send + Sync,
{
	/// Finds an application by client id or display name.
	fn lookup<'a>(&'a self, query: &'a ApplicationLookup) -> DirectoryFuture<'a, Option<Application>>;

	/// Registers a new application with the provided metadata.
	fn create<'a>(&'a self, payload: &'a ApplicationPayload) -> DirectoryFuture<'a, Application>;

	/// Replaces reply URLs and metadata of an existing application.
	fn update<'a>(
		&'a self,
		object_id: &'a ObjectId,
		payload: &'a ApplicationPayload,
	) -> DirectoryFuture<'a, ()>;

	/// Returns the service principal for the client, creating it when missing.
	fn ensure_service_principal<'a>(
		&'a self,
		client_id: &'a ClientId,
	) -> DirectoryFuture<'a, ServicePrincipalId>;

	/// Issues a new credential; the material is only ever returned here.
	fn add_credential<'a>(
		&'a self,
		object_id: &'a ObjectId,
		request: &'a CredentialRequest,
	) -> DirectoryFuture<'a, IssuedCredential>;

	/// Revokes a credential by key id.
	fn revoke_credential<'a>(
		&'a self,
		object_id: &'a ObjectId,
		key_id: &'a KeyId,
	) -> DirectoryFuture<'a, ()>;

	/// Deletes the application and everything attached to it.
	fn delete<'a>(&'a self, object_id: &'a ObjectId) -> DirectoryFuture<'a, ()>;
}

/// Lookup key for [`DirectoryClient::lookup`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ApplicationLookup {
	/// Established identity; preferred once known.
	ClientId(ClientId),
	/// Deterministic `cluster:namespace:name` display name, used before a client id exists.
	DisplayName(String),
}
impl Display for ApplicationLookup {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			ApplicationLookup::ClientId(id) => write!(f, "client_id={id}"),
			ApplicationLookup::DisplayName(name) => write!(f, "display_name={name}"),
		}
	}
}

/// Caller resolved to a directory client id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PreAuthorizedClient {
	/// Display name of the caller.
	pub display_name: String,
	/// Client id of the caller.
	pub client_id: ClientId,
}

/// Metadata written to the directory on create and update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPayload {
	/// Display name (`cluster:namespace:name`).
	pub display_name: String,
	/// Normalized reply URLs.
	pub reply_urls: Vec<String>,
	/// Normalized logout URL.
	pub logout_url: Option<String>,
	/// Resolved pre-authorized callers, sorted.
	pub pre_authorized: Vec<PreAuthorizedClient>,
	/// Extra claims mapped into tokens.
	pub extra_claims: Vec<ExtraClaim>,
	/// Group ids emitted in the groups claim.
	pub group_ids: Vec<String>,
}

/// Credential metadata as reported by the directory; never carries secret material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
	/// Key id.
	pub key_id: KeyId,
	/// Credential kind.
	pub kind: CredentialKind,
	/// Start of validity.
	pub start: OffsetDateTime,
	/// End of validity.
	pub end: OffsetDateTime,
}
impl CredentialInfo {
	/// Returns `true` while the credential can still authenticate.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.end
	}
}

/// Application registration as stored in the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
	/// Client id.
	pub client_id: ClientId,
	/// Object id.
	pub object_id: ObjectId,
	/// Current metadata.
	pub payload: ApplicationPayload,
	/// Credentials currently attached.
	pub credentials: Vec<CredentialInfo>,
}
impl Application {
	/// Returns the credential with the given key id, if attached.
	pub fn credential(&self, key_id: &KeyId) -> Option<&CredentialInfo> {
		self.credentials.iter().find(|c| &c.key_id == key_id)
	}
}

/// Parameters for [`DirectoryClient::add_credential`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRequest {
	/// Kind to issue.
	pub kind: CredentialKind,
	/// Display name attached to the credential.
	pub display_name: String,
	/// Requested end of validity.
	pub expires_at: OffsetDateTime,
}

/// Freshly issued credential including its secret material.
#[derive(Clone, Debug)]
pub struct IssuedCredential {
	/// Metadata of the new credential.
	pub info: CredentialInfo,
	/// Secret material; only available at issue time.
	pub material: SecretMaterial,
}

/// Failure classification reported by directory adapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectoryErrorKind {
	/// The addressed object does not exist.
	NotFound,
	/// Timeout or temporary unavailability.
	Transient,
	/// The directory throttled the caller.
	RateLimited,
	/// The object was modified concurrently.
	Conflict,
	/// The request was rejected as invalid; retrying will not help.
	Rejected,
	/// The adapter cannot authenticate or is misconfigured.
	Unauthorized,
}
/// Error produced by [`DirectoryClient`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Directory {operation} failed ({kind:?}): {message}.")]
pub struct DirectoryError {
	/// Classification the reconciler acts on.
	pub kind: DirectoryErrorKind,
	/// Operation that failed.
	pub operation: &'static str,
	/// Human-readable detail, for logs only.
	pub message: String,
	/// Upstream retry hint.
	pub retry_after: Option<Duration>,
}
impl DirectoryError {
	/// Builds an error of the given kind.
	pub fn new(kind: DirectoryErrorKind, operation: &'static str, message: impl Into<String>) -> Self {
		Self { kind, operation, message: message.into(), retry_after: None }
	}

	/// Convenience constructor for [`DirectoryErrorKind::NotFound`].
	pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
		Self::new(DirectoryErrorKind::NotFound, operation, message)
	}

	/// Attaches an upstream retry hint.
	pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
		self.retry_after = Some(retry_after);

		self
	}

	/// Returns `true` for [`DirectoryErrorKind::NotFound`].
	pub fn is_not_found(&self) -> bool {
		matches!(self.kind, DirectoryErrorKind::NotFound)
	}
}
