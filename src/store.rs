//! Persistence contract for resource records and their status subresource.
//!
//! Every mutation is conditional on the [`ResourceVersion`] the caller last observed. A write
//! carrying a stale version is rejected with [`StoreError::Conflict`], which keeps status
//! writes totally ordered: an attempt that started earlier can never overwrite the status
//! committed by a later one.

pub mod memory;

pub use memory::MemoryResourceStore;

// self
use crate::{
	_prelude::*,
	resource::{ApplicationResource, ApplicationStatus, ResourceKey, ResourceVersion},
};

/// Boxed future returned by [`ResourceStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for application resources.
pub trait ResourceStore
where
	Self: Send + Sync,
{
	/// Fetches the current record, if present.
	fn get<'a>(&'a self, key: &'a ResourceKey) -> StoreFuture<'a, Option<ApplicationResource>>;

	/// Adds a finalizer if the record is still at `expected`.
	fn add_finalizer<'a>(
		&'a self,
		key: &'a ResourceKey,
		expected: ResourceVersion,
		finalizer: &'a str,
	) -> StoreFuture<'a, ResourceVersion>;

	/// Removes a finalizer if the record is still at `expected`.
	///
	/// A record whose deletion was requested disappears once its last finalizer is removed.
	fn remove_finalizer<'a>(
		&'a self,
		key: &'a ResourceKey,
		expected: ResourceVersion,
		finalizer: &'a str,
	) -> StoreFuture<'a, ()>;

	/// Replaces the status section if the record is still at `expected`.
	fn update_status<'a>(
		&'a self,
		key: &'a ResourceKey,
		expected: ResourceVersion,
		status: ApplicationStatus,
	) -> StoreFuture<'a, ResourceVersion>;
}

/// Error type produced by [`ResourceStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// The record changed since the caller read it.
	#[error("Resource {key} is at version {actual}, expected {expected}.")]
	Conflict {
		/// Addressed record.
		key: ResourceKey,
		/// Version the caller observed.
		expected: ResourceVersion,
		/// Version currently stored.
		actual: ResourceVersion,
	},
	/// The record no longer exists.
	#[error("Resource {key} was not found.")]
	NotFound {
		/// Addressed record.
		key: ResourceKey,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_crate_error_with_source() {
		let store_error = StoreError::Backend { message: "etcd unreachable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Store(_)));
		assert!(error.to_string().contains("etcd unreachable"));

		let source = StdError::source(&error).expect("Crate error should expose the store error.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn conflict_message_names_versions() {
		let err = StoreError::Conflict {
			key: ResourceKey::parse("team-a", "app").expect("Key fixture should be valid."),
			expected: ResourceVersion(3),
			actual: ResourceVersion(4),
		};

		assert_eq!(err.to_string(), "Resource team-a/app is at version 4, expected 3.");
	}
}
