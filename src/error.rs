//! Reconciler-level error types shared across the directory, secret and resource boundaries.

// self
use crate::{
	_prelude::*,
	credential::CredentialKind,
	directory::{DirectoryError, DirectoryErrorKind},
	resource::ValidationError,
	secret::SecretStoreError,
	store::StoreError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Desired state is malformed; fixing the resource is the only remedy.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Directory adapter failure, classified by the adapter.
	#[error("{0}")]
	Directory(
		#[from]
		#[source]
		DirectoryError,
	),
	/// Secret store failure.
	#[error("{0}")]
	Secret(
		#[from]
		#[source]
		SecretStoreError,
	),
	/// Resource store failure.
	#[error("{0}")]
	Store(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// An external call exceeded the configured call timeout.
	#[error("The {operation} call timed out.")]
	Timeout {
		/// Operation that was abandoned.
		operation: &'static str,
	},
	/// The reconcile was cancelled while waiting on an external call.
	#[error("The reconcile was cancelled during {operation}.")]
	Cancelled {
		/// Operation that was abandoned.
		operation: &'static str,
	},
	/// Some required credential kinds were provisioned but not all of them.
	#[error("Credentials are incomplete; missing {missing:?}.")]
	IncompleteCredentials {
		/// Kinds left without a current credential.
		missing: Vec<CredentialKind>,
	},
}
impl Error {
	/// Classifies the error for retry decisions.
	pub fn class(&self) -> ErrorClass {
		match self {
			Error::Validation(_) => ErrorClass::Validation,
			Error::Directory(err) => match err.kind {
				DirectoryErrorKind::Conflict => ErrorClass::Conflict,
				DirectoryErrorKind::Transient | DirectoryErrorKind::RateLimited => ErrorClass::Transient,
				// Resources vanishing mid-reconcile are healed by the next attempt.
				DirectoryErrorKind::NotFound => ErrorClass::Transient,
				DirectoryErrorKind::Rejected | DirectoryErrorKind::Unauthorized => ErrorClass::Fatal,
			},
			Error::Secret(SecretStoreError::Unavailable { .. }) => ErrorClass::Transient,
			Error::Secret(SecretStoreError::Rejected { .. }) => ErrorClass::Fatal,
			Error::Store(StoreError::Conflict { .. }) => ErrorClass::Conflict,
			Error::Store(StoreError::NotFound { .. } | StoreError::Backend { .. }) =>
				ErrorClass::Transient,
			Error::Config(_) => ErrorClass::Fatal,
			Error::Timeout { .. } | Error::Cancelled { .. } => ErrorClass::Interrupted,
			Error::IncompleteCredentials { .. } => ErrorClass::Transient,
		}
	}

	/// Returns `true` if a later attempt may succeed without operator action.
	pub fn is_retryable(&self) -> bool {
		self.class().is_retryable()
	}

	/// Upstream retry hint, when the directory supplied one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Error::Directory(err) => err.retry_after,
			_ => None,
		}
	}
}

/// Retry classification derived from [`Error::class`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
	/// Malformed desired state; not retried.
	Validation,
	/// Temporary failure; retried after the retry interval or upstream hint.
	Transient,
	/// Concurrent modification; retried after a short delay.
	Conflict,
	/// Misconfiguration or rejected request; requires operator intervention.
	Fatal,
	/// Timeout or cancellation; status is left untouched and the reconcile retried.
	Interrupted,
}
impl ErrorClass {
	/// Returns `true` for classes that schedule a retry.
	pub const fn is_retryable(self) -> bool {
		matches!(self, Self::Transient | Self::Conflict | Self::Interrupted)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorClass::Validation => "validation",
			ErrorClass::Transient => "transient",
			ErrorClass::Conflict => "conflict",
			ErrorClass::Fatal => "fatal",
			ErrorClass::Interrupted => "interrupted",
		}
	}
}
impl Display for ErrorClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration failures raised while building a [`ReconcilerConfig`](crate::config::ReconcilerConfig).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Cluster name is required to build display names.
	#[error("Cluster name must not be empty.")]
	EmptyCluster,
	/// Finalizer names must be `domain/name` shaped.
	#[error("Finalizer `{finalizer}` must look like `domain/name`.")]
	InvalidFinalizer {
		/// Rejected finalizer.
		finalizer: String,
	},
	/// A duration setting must be positive.
	#[error("The {field} setting must be positive.")]
	NonPositiveDuration {
		/// Name of the offending setting.
		field: &'static str,
	},
	/// Credentials would expire before their replacement is issued.
	#[error("Credential lifetime must exceed the rotation interval.")]
	RotationExceedsLifetime,
	/// The credential policy requires neither passwords nor certificates.
	#[error("Credential policy must require at least one credential kind.")]
	NoCredentialKinds,
}
