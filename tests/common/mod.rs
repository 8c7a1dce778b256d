//! Shared fixtures for reconciler integration tests.

#![allow(dead_code)]

// crates.io
use tokio_util::sync::CancellationToken;
// self
use azurerator::{
	config::ReconcilerConfig,
	directory::MemoryDirectory,
	event::{EventReason, MemoryEventRecorder},
	reconciler::{ReconcileOutcome, ReconcileRequest, Reconciler},
	resource::{ApplicationResource, ApplicationSpec, ApplicationStatus, ResourceKey},
	secret::MemorySecretStore,
	store::MemoryResourceStore,
};

pub const CLUSTER: &str = "dev-gcp";

/// Reconciler wired to in-memory collaborators that the test can inspect.
pub struct Harness {
	pub directory: MemoryDirectory,
	pub secrets: MemorySecretStore,
	pub resources: MemoryResourceStore,
	pub events: MemoryEventRecorder,
	pub reconciler: Reconciler,
	pub cancel: CancellationToken,
}
impl Harness {
	pub fn new() -> Self {
		Self::build(default_config(), MemoryDirectory::default())
	}

	pub fn with_config(config: ReconcilerConfig) -> Self {
		Self::build(config, MemoryDirectory::default())
	}

	pub fn build(config: ReconcilerConfig, directory: MemoryDirectory) -> Self {
		let secrets = MemorySecretStore::default();
		let resources = MemoryResourceStore::default();
		let events = MemoryEventRecorder::default();
		let reconciler = Reconciler::new(
			config,
			std::sync::Arc::new(directory.clone()),
			std::sync::Arc::new(secrets.clone()),
			std::sync::Arc::new(resources.clone()),
			std::sync::Arc::new(events.clone()),
		);

		Self { directory, secrets, resources, events, reconciler, cancel: CancellationToken::new() }
	}

	pub fn apply(&self, key: &ResourceKey, spec: ApplicationSpec) -> ApplicationResource {
		self.resources.apply(key.clone(), spec)
	}

	pub async fn reconcile(&self, key: &ResourceKey) -> ReconcileOutcome {
		self.reconciler.reconcile(&ReconcileRequest::new(key.clone()), &self.cancel).await
	}

	pub async fn rotate(&self, key: &ResourceKey) -> ReconcileOutcome {
		let request = ReconcileRequest::new(key.clone()).with_forced_rotation();

		self.reconciler.reconcile(&request, &self.cancel).await
	}

	/// Reconciles until the outcome is no longer an immediate requeue.
	pub async fn converge(&self, key: &ResourceKey) -> ReconcileOutcome {
		for _ in 0..5 {
			let outcome = self.reconcile(key).await;

			if outcome.retry_after() != Some(time::Duration::ZERO) {
				return outcome;
			}
		}

		panic!("Reconcile of {key} kept requeueing immediately.");
	}

	pub fn record(&self, key: &ResourceKey) -> ApplicationResource {
		self.resources.snapshot(key).expect("Resource should exist in the store.")
	}

	pub fn status(&self, key: &ResourceKey) -> ApplicationStatus {
		self.record(key).status
	}

	pub fn reasons(&self, key: &ResourceKey) -> Vec<EventReason> {
		self.events.reasons_for(key)
	}
}

pub fn default_config() -> ReconcilerConfig {
	ReconcilerConfig::builder(CLUSTER).build().expect("Default test config should validate.")
}

pub fn key(namespace: &str, name: &str) -> ResourceKey {
	ResourceKey::parse(namespace, name).expect("Resource key fixture should be valid.")
}

pub fn spec(urls: &[&str]) -> ApplicationSpec {
	urls.iter().fold(ApplicationSpec::new("s1"), |spec, url| spec.with_reply_url(*url))
}
