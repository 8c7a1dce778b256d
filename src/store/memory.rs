//! Thread-safe in-memory [`ResourceStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	resource::{ApplicationResource, ApplicationSpec, ApplicationStatus, ResourceKey, ResourceVersion},
	store::{ResourceStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<ResourceKey, ApplicationResource>>>;

/// Storage backend that keeps resource records in-process.
///
/// Besides the reconciler-facing [`ResourceStore`] contract it exposes the user-facing side
/// ([`apply`](Self::apply), [`request_deletion`](Self::request_deletion)) that a real API
/// server would provide.
#[derive(Clone, Debug, Default)]
pub struct MemoryResourceStore(StoreMap);
impl MemoryResourceStore {
	/// Creates the record or replaces its spec, bumping the generation when the spec changed.
	pub fn apply(&self, key: ResourceKey, spec: ApplicationSpec) -> ApplicationResource {
		let mut guard = self.0.write();

		match guard.get_mut(&key) {
			Some(existing) => {
				if existing.spec != spec {
					existing.spec = spec;
					existing.generation += 1;
					existing.resource_version = existing.resource_version.next();
				}

				existing.clone()
			},
			None => {
				let record = ApplicationResource::new(key.clone(), spec);

				guard.insert(key, record.clone());

				record
			},
		}
	}

	/// Marks the record for deletion; records without finalizers disappear immediately.
	///
	/// Returns `false` when no such record exists.
	pub fn request_deletion(&self, key: &ResourceKey) -> bool {
		let mut guard = self.0.write();
		let Some(record) = guard.get_mut(key) else {
			return false;
		};

		if record.finalizers.is_empty() {
			guard.remove(key);

			return true;
		}
		if record.deletion_timestamp.is_none() {
			record.deletion_timestamp = Some(OffsetDateTime::now_utc());
			record.resource_version = record.resource_version.next();
		}

		true
	}

	/// Returns a snapshot of the record.
	pub fn snapshot(&self, key: &ResourceKey) -> Option<ApplicationResource> {
		self.0.read().get(key).cloned()
	}

	fn checked<'g>(
		guard: &'g mut HashMap<ResourceKey, ApplicationResource>,
		key: &ResourceKey,
		expected: ResourceVersion,
	) -> Result<&'g mut ApplicationResource, StoreError> {
		let record = guard.get_mut(key).ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

		if record.resource_version != expected {
			return Err(StoreError::Conflict {
				key: key.clone(),
				expected,
				actual: record.resource_version,
			});
		}

		Ok(record)
	}

	fn add_finalizer_now(
		map: StoreMap,
		key: ResourceKey,
		expected: ResourceVersion,
		finalizer: String,
	) -> Result<ResourceVersion, StoreError> {
		let mut guard = map.write();
		let record = Self::checked(&mut guard, &key, expected)?;

		if record.finalizers.insert(finalizer) {
			record.resource_version = record.resource_version.next();
		}

		Ok(record.resource_version)
	}

	fn remove_finalizer_now(
		map: StoreMap,
		key: ResourceKey,
		expected: ResourceVersion,
		finalizer: String,
	) -> Result<(), StoreError> {
		let mut guard = map.write();
		let record = Self::checked(&mut guard, &key, expected)?;

		record.finalizers.remove(&finalizer);
		record.resource_version = record.resource_version.next();

		if record.deletion_timestamp.is_some() && record.finalizers.is_empty() {
			guard.remove(&key);
		}

		Ok(())
	}

	fn update_status_now(
		map: StoreMap,
		key: ResourceKey,
		expected: ResourceVersion,
		status: ApplicationStatus,
	) -> Result<ResourceVersion, StoreError> {
		let mut guard = map.write();
		let record = Self::checked(&mut guard, &key, expected)?;

		record.status = status;
		record.resource_version = record.resource_version.next();

		Ok(record.resource_version)
	}
}
impl ResourceStore for MemoryResourceStore {
	fn get<'a>(&'a self, key: &'a ResourceKey) -> StoreFuture<'a, Option<ApplicationResource>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn add_finalizer<'a>(
		&'a self,
		key: &'a ResourceKey,
		expected: ResourceVersion,
		finalizer: &'a str,
	) -> StoreFuture<'a, ResourceVersion> {
		let map = self.0.clone();
		let key = key.to_owned();
		let finalizer = finalizer.to_owned();

		Box::pin(async move { Self::add_finalizer_now(map, key, expected, finalizer) })
	}

	fn remove_finalizer<'a>(
		&'a self,
		key: &'a ResourceKey,
		expected: ResourceVersion,
		finalizer: &'a str,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();
		let finalizer = finalizer.to_owned();

		Box::pin(async move { Self::remove_finalizer_now(map, key, expected, finalizer) })
	}

	fn update_status<'a>(
		&'a self,
		key: &'a ResourceKey,
		expected: ResourceVersion,
		status: ApplicationStatus,
	) -> StoreFuture<'a, ResourceVersion> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Self::update_status_now(map, key, expected, status) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::resource::SyncState;

	fn key() -> ResourceKey {
		ResourceKey::parse("team-a", "app").expect("Key fixture should be valid.")
	}

	#[tokio::test]
	async fn stale_status_writes_are_rejected() {
		let store = MemoryResourceStore::default();
		let record = store.apply(key(), ApplicationSpec::new("s1"));
		let status = ApplicationStatus {
			synchronization_state: Some(SyncState::Synchronized),
			..Default::default()
		};
		let next = store
			.update_status(&key(), record.resource_version, status.clone())
			.await
			.expect("First write should succeed.");

		assert_eq!(next, record.resource_version.next());

		let err = store
			.update_status(&key(), record.resource_version, ApplicationStatus::default())
			.await
			.expect_err("Stale write must be rejected.");

		assert!(matches!(err, StoreError::Conflict { .. }));
		assert_eq!(store.snapshot(&key()).map(|r| r.status), Some(status));
	}

	#[tokio::test]
	async fn apply_bumps_generation_only_on_spec_change() {
		let store = MemoryResourceStore::default();
		let first = store.apply(key(), ApplicationSpec::new("s1"));
		let same = store.apply(key(), ApplicationSpec::new("s1"));
		let changed = store.apply(key(), ApplicationSpec::new("s2"));

		assert_eq!(first.generation, same.generation);
		assert_eq!(changed.generation, first.generation + 1);
		assert!(changed.resource_version > first.resource_version);
	}

	#[tokio::test]
	async fn deletion_waits_for_finalizers() {
		let store = MemoryResourceStore::default();
		let record = store.apply(key(), ApplicationSpec::new("s1"));
		let version = store
			.add_finalizer(&key(), record.resource_version, "test/finalizer")
			.await
			.expect("Finalizer should be added.");

		assert!(store.request_deletion(&key()));

		let pending = store.snapshot(&key()).expect("Record should still exist.");

		assert!(pending.is_deletion_requested());
		assert!(
			store.remove_finalizer(&key(), version, "test/finalizer").await.is_err(),
			"Deletion bumped the version, so the old version is stale."
		);

		store
			.remove_finalizer(&key(), pending.resource_version, "test/finalizer")
			.await
			.expect("Finalizer removal should succeed.");

		assert!(store.snapshot(&key()).is_none());
	}
}
