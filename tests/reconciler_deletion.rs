mod common;

// self
use azurerator::{
	directory::{ApplicationPayload, DirectoryErrorKind, DirectoryOperation},
	event::EventReason,
	resource::SyncState,
};
use common::*;

#[tokio::test]
async fn deletion_revokes_credentials_and_deletes_the_application() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.converge(&key).await;
	harness.directory.clear_calls();

	assert!(harness.resources.request_deletion(&key));
	assert!(harness.reconcile(&key).await.is_success());
	assert!(harness.resources.snapshot(&key).is_none(), "Record should disappear with its finalizer.");
	assert_eq!(harness.directory.application_count(), 0);
	assert_eq!(harness.directory.count(DirectoryOperation::RevokeCredential), 1);
	assert_eq!(harness.directory.count(DirectoryOperation::Delete), 1);

	let reasons = harness.reasons(&key);

	assert_eq!(reasons[reasons.len() - 2..], [EventReason::DeletedInAzure, EventReason::DeletedFinalizer]);
}

#[tokio::test]
async fn deletion_tolerates_applications_removed_out_of_band() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.converge(&key).await;

	let client_id = harness.status(&key).client_id.expect("Client id should be recorded.");

	assert!(harness.directory.remove_out_of_band(&client_id));

	harness.events.clear();
	harness.directory.clear_calls();
	harness.resources.request_deletion(&key);

	assert!(harness.reconcile(&key).await.is_success());
	assert!(harness.resources.snapshot(&key).is_none());
	assert_eq!(harness.directory.count(DirectoryOperation::Delete), 0);
	assert_eq!(harness.reasons(&key), vec![EventReason::DeletedFinalizer]);
}

#[tokio::test]
async fn deletion_finds_applications_created_before_status_was_committed() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.reconcile(&key).await;

	// Simulates a crash between create and the first status write.
	harness
		.directory
		.seed(ApplicationPayload { display_name: format!("{CLUSTER}:team-a:app"), ..Default::default() })
		.expect("Seeding should succeed.");
	harness.resources.request_deletion(&key);

	assert!(harness.reconcile(&key).await.is_success());
	assert_eq!(harness.directory.application_count(), 0);
	assert!(harness.resources.snapshot(&key).is_none());
	assert!(harness.reasons(&key).contains(&EventReason::DeletedInAzure));
}

#[tokio::test]
async fn failed_deletion_keeps_the_finalizer_and_retries() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.converge(&key).await;
	harness.directory.fail_next(DirectoryOperation::Delete, DirectoryErrorKind::Transient);
	harness.resources.request_deletion(&key);

	let outcome = harness.reconcile(&key).await;

	assert_eq!(outcome.retry_after(), Some(harness.reconciler.config.retry_interval));

	let record = harness.record(&key);

	assert!(record.has_finalizer(&harness.reconciler.config.finalizer));
	assert_eq!(record.status.synchronization_state, Some(SyncState::FailedSynchronization));
	assert_eq!(harness.directory.application_count(), 1);
	assert!(harness.reasons(&key).contains(&EventReason::FailedSynchronization));

	assert!(harness.reconcile(&key).await.is_success());
	assert_eq!(harness.directory.application_count(), 0);
	assert!(harness.resources.snapshot(&key).is_none());
}

#[tokio::test]
async fn records_without_finalizer_vanish_without_directory_calls() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));

	assert!(harness.resources.request_deletion(&key));
	assert!(harness.reconcile(&key).await.is_success());
	assert!(harness.directory.calls().is_empty());
	assert!(harness.events.events().is_empty());
}
