mod common;

// std
use std::sync::Arc;
// crates.io
use parking_lot::Mutex;
// self
use azurerator::{
	controller::{Controller, OutcomeListener, ResourceChange},
	directory::{DirectoryOperation, MemoryDirectory},
	reconciler::ReconcileOutcome,
	resource::{ResourceKey, SyncState},
};
use common::*;

const WAIT: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Default)]
struct RecordingListener(Mutex<Vec<(ResourceKey, bool)>>);
impl RecordingListener {
	fn successes(&self, key: &ResourceKey) -> usize {
		self.0.lock().iter().filter(|(k, success)| k == key && *success).count()
	}
}
impl OutcomeListener for RecordingListener {
	fn on_outcome(&self, key: &ResourceKey, outcome: &ReconcileOutcome) {
		self.0.lock().push((key.clone(), outcome.is_success()));
	}
}

fn change(key: &ResourceKey) -> ResourceChange {
	ResourceChange { key: key.clone(), generation: 1, deletion_requested: false }
}

async fn wait_until<F>(mut condition: F)
where
	F: FnMut() -> bool,
{
	tokio::time::timeout(WAIT, async {
		while !condition() {
			tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("Condition should hold before the deadline.");
}

fn synchronized(harness: &Harness, key: &ResourceKey) -> bool {
	harness
		.resources
		.snapshot(key)
		.is_some_and(|record| record.status.synchronization_state == Some(SyncState::Synchronized))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_notifications_create_one_application() {
	let directory = MemoryDirectory::default().with_latency(std::time::Duration::from_millis(5));
	let harness = Harness::build(default_config(), directory);
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));

	let handle = Controller::new(Arc::new(harness.reconciler.clone())).with_workers(4).spawn();

	for _ in 0..10 {
		assert!(handle.notify(change(&key)));
	}

	wait_until(|| synchronized(&harness, &key)).await;
	handle.shutdown().await;

	assert_eq!(harness.directory.count(DirectoryOperation::Create), 1);
	assert_eq!(harness.directory.application_count(), 1);
	assert_eq!(harness.status(&key).password_key_ids.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_resources_are_reconciled_and_reported() {
	let harness = Harness::new();
	let keys: Vec<ResourceKey> = (0..5).map(|i| key("team-a", &format!("app-{i}"))).collect();
	let listener = Arc::new(RecordingListener::default());

	for key in &keys {
		harness.apply(key, spec(&["https://a/x"]));
	}

	let handle = Controller::new(Arc::new(harness.reconciler.clone()))
		.with_workers(3)
		.with_listener(listener.clone())
		.spawn();

	for key in &keys {
		handle.notify(change(key));
	}

	wait_until(|| keys.iter().all(|key| synchronized(&harness, key))).await;
	wait_until(|| keys.iter().all(|key| listener.successes(key) >= 1)).await;
	handle.shutdown().await;

	assert_eq!(harness.directory.application_count(), keys.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rotation_requests_issue_new_credentials() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.converge(&key).await;

	let before = harness.status(&key).password_key_ids;
	let handle = Controller::new(Arc::new(harness.reconciler.clone())).spawn();

	assert!(handle.rotate(key.clone()));

	wait_until(|| {
		let current = harness.status(&key).password_key_ids;

		current.len() == 1 && current != before
	})
	.await;
	handle.shutdown().await;

	assert_eq!(harness.secrets.write_count(), 2);
}
