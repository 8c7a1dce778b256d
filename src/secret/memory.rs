//! Thread-safe in-memory [`SecretStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	credential::CredentialKind,
	resource::KeyId,
	secret::{SecretFuture, SecretPayload, SecretStore, SecretStoreError, SecretTarget},
};

#[derive(Debug, Default)]
struct SecretState {
	entries: HashMap<(SecretTarget, CredentialKind), SecretPayload>,
	writes: Vec<(SecretTarget, KeyId)>,
	failures: usize,
}

/// Secret store that keeps payloads in-process and records every write.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore(Arc<Mutex<SecretState>>);
impl MemorySecretStore {
	/// Makes the next `count` writes fail with [`SecretStoreError::Unavailable`].
	pub fn fail_next_writes(&self, count: usize) {
		self.0.lock().failures = count;
	}

	/// Returns the payload stored for a target and kind.
	pub fn payload(&self, target: &SecretTarget, kind: CredentialKind) -> Option<SecretPayload> {
		self.0.lock().entries.get(&(target.clone(), kind)).cloned()
	}

	/// Drops the payload of one kind, as an operator resetting the secret would.
	pub fn remove(&self, target: &SecretTarget, kind: CredentialKind) -> bool {
		self.0.lock().entries.remove(&(target.clone(), kind)).is_some()
	}

	/// Returns every successful write in order.
	pub fn writes(&self) -> Vec<(SecretTarget, KeyId)> {
		self.0.lock().writes.clone()
	}

	/// Number of successful writes.
	pub fn write_count(&self) -> usize {
		self.0.lock().writes.len()
	}
}
impl SecretStore for MemorySecretStore {
	fn write<'a>(&'a self, target: &'a SecretTarget, payload: &'a SecretPayload) -> SecretFuture<'a, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			let mut guard = state.lock();

			if guard.failures > 0 {
				guard.failures -= 1;

				return Err(SecretStoreError::Unavailable { message: format!("write to {target} failed") });
			}

			guard.entries.insert((target.clone(), payload.kind), payload.clone());
			guard.writes.push((target.clone(), payload.key_id.clone()));

			Ok(())
		})
	}

	fn current_key_id<'a>(
		&'a self,
		target: &'a SecretTarget,
		kind: CredentialKind,
	) -> SecretFuture<'a, Option<KeyId>> {
		let state = self.0.clone();

		Box::pin(async move {
			Ok(state.lock().entries.get(&(target.clone(), kind)).map(|payload| payload.key_id.clone()))
		})
	}
}
