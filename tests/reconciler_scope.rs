mod common;

// crates.io
use time::Duration;
// self
use azurerator::{
	config::{ReconcilerConfig, TenantScope},
	directory::{ApplicationPayload, DirectoryErrorKind, DirectoryOperation, MemoryDirectory},
	event::EventReason,
	hash::SpecHash,
	reconciler::ReconcileOutcome,
	resource::{Namespace, PreAuthorizedApplication, SyncState, TenantAlias},
};
use common::*;

fn tenant(alias: &str) -> TenantAlias {
	TenantAlias::new(alias).expect("Tenant fixture should be valid.")
}

#[tokio::test]
async fn foreign_tenant_is_skipped_without_side_effects() {
	let config = ReconcilerConfig::builder(CLUSTER)
		.tenant_scope(TenantScope::named(tenant("t1")))
		.build()
		.expect("Config should validate.");
	let harness = Harness::with_config(config);
	let foreign = key("team-a", "foreign");
	let unlabeled = key("team-a", "unlabeled");
	let own = key("team-a", "own");

	harness.apply(&foreign, spec(&["https://a/x"]).with_tenant("t2"));
	harness.apply(&unlabeled, spec(&["https://a/x"]));
	harness.apply(&own, spec(&["https://a/x"]).with_tenant("t1"));

	for key in [&foreign, &unlabeled] {
		let before = harness.record(key);

		assert!(harness.reconcile(key).await.is_success());
		assert_eq!(harness.record(key), before, "Skipped resources must not be written.");
		assert_eq!(harness.reasons(key), vec![EventReason::Skipped]);
	}

	assert!(harness.directory.calls().is_empty());
	assert!(harness.converge(&own).await.is_success());
	assert_eq!(harness.status(&own).synchronization_state, Some(SyncState::Synchronized));
}

#[tokio::test]
async fn default_tenant_instance_accepts_unlabeled_resources() {
	let config = ReconcilerConfig::builder(CLUSTER)
		.tenant_scope(TenantScope::default_tenant(tenant("t1")))
		.build()
		.expect("Config should validate.");
	let harness = Harness::with_config(config);
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));

	assert!(harness.converge(&key).await.is_success());
	assert_eq!(harness.directory.count(DirectoryOperation::Create), 1);
}

#[tokio::test]
async fn non_team_namespace_is_ignored() {
	let config = ReconcilerConfig::builder(CLUSTER)
		.non_team_namespace(Namespace::new("kube-system").expect("Namespace fixture should be valid."))
		.build()
		.expect("Config should validate.");
	let harness = Harness::with_config(config);
	let key = key("kube-system", "app");

	harness.apply(&key, spec(&["https://a/x"]));

	assert!(harness.reconcile(&key).await.is_success());
	assert!(harness.directory.calls().is_empty());
	assert!(harness.record(&key).finalizers.is_empty());
	assert_eq!(harness.reasons(&key), vec![EventReason::NotInTeamNamespace]);
}

#[tokio::test]
async fn transient_failure_keeps_the_previous_hash() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.converge(&key).await;

	let synchronized = harness.status(&key).synchronization_hash;

	harness.apply(&key, spec(&["https://a/y"]));
	harness.directory.fail_next(DirectoryOperation::Update, DirectoryErrorKind::Transient);

	let outcome = harness.reconcile(&key).await;

	assert_eq!(outcome.retry_after(), Some(harness.reconciler.config.retry_interval));

	let status = harness.status(&key);

	assert_eq!(status.synchronization_state, Some(SyncState::FailedSynchronization));
	assert_eq!(status.synchronization_hash, synchronized);

	let reasons = harness.reasons(&key);

	assert_eq!(reasons[reasons.len() - 2..], [EventReason::FailedSynchronization, EventReason::Retrying]);

	assert!(harness.reconcile(&key).await.is_success());
	assert_eq!(harness.status(&key).synchronization_hash, Some(SpecHash::of(&spec(&["https://a/y"]))));
}

#[tokio::test]
async fn unauthorized_directory_is_fatal() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.reconcile(&key).await;
	harness.directory.fail_next(DirectoryOperation::Create, DirectoryErrorKind::Unauthorized);

	assert!(matches!(harness.reconcile(&key).await, ReconcileOutcome::Fatal(_)));
	assert_eq!(harness.status(&key).synchronization_state, Some(SyncState::FailedSynchronization));
	assert!(!harness.reasons(&key).contains(&EventReason::Retrying));
	assert_eq!(harness.reconciler.metrics.failures(), 1);
}

#[tokio::test]
async fn timed_out_call_leaves_status_untouched() {
	let config = ReconcilerConfig::builder(CLUSTER)
		.call_timeout(Duration::milliseconds(10))
		.build()
		.expect("Config should validate.");
	let directory = MemoryDirectory::default().with_latency(std::time::Duration::from_millis(200));
	let harness = Harness::build(config, directory);
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.reconcile(&key).await;

	let before = harness.record(&key);
	let outcome = harness.reconcile(&key).await;

	assert_eq!(outcome.retry_after(), Some(harness.reconciler.config.retry_interval));
	assert_eq!(harness.record(&key), before);
	assert_eq!(harness.reasons(&key).last(), Some(&EventReason::Retrying));
	assert!(!harness.reasons(&key).contains(&EventReason::FailedSynchronization));
}

#[tokio::test]
async fn cancelled_reconcile_makes_no_calls() {
	let harness = Harness::new();
	let key = key("team-a", "app");

	harness.apply(&key, spec(&["https://a/x"]));
	harness.reconcile(&key).await;
	harness.cancel.cancel();

	let before = harness.record(&key);
	let outcome = harness.reconcile(&key).await;

	assert!(outcome.retry_after().is_some());
	assert!(harness.directory.calls().is_empty());
	assert_eq!(harness.record(&key), before);
	assert_eq!(harness.reasons(&key), vec![EventReason::AddedFinalizer]);
}

#[tokio::test]
async fn unresolved_pre_authorized_caller_is_added_once_registered() {
	let harness = Harness::new();
	let key = key("team-a", "app");
	let desired = spec(&["https://a/x"]).with_pre_authorized(PreAuthorizedApplication::new("caller", "", ""));

	harness.apply(&key, desired.clone());

	let outcome = harness.converge(&key).await;

	assert_eq!(outcome.retry_after(), Some(harness.reconciler.config.resync_interval));

	let status = harness.status(&key);

	assert_eq!(status.synchronization_state, Some(SyncState::Synchronized));
	assert_eq!(status.synchronization_hash, None);

	let caller = harness
		.directory
		.seed(ApplicationPayload {
			display_name: format!("{CLUSTER}:team-a:caller"),
			..Default::default()
		})
		.expect("Seeding should succeed.");

	assert!(harness.reconcile(&key).await.is_success());

	let status = harness.status(&key);
	let client_id = status.client_id.clone().expect("Client id should be recorded.");
	let application = harness.directory.application(&client_id).expect("Application should exist.");

	assert_eq!(status.synchronization_hash, Some(SpecHash::of(&desired)));
	assert_eq!(application.payload.pre_authorized.len(), 1);
	assert_eq!(application.payload.pre_authorized[0].client_id, caller.client_id);
}
