//! Synchronization reconciler orchestrating scope checks, finalizers, directory sync,
//! credentials and status.
//!
//! [`Reconciler::reconcile`] handles one change notification for one resource and returns a
//! [`ReconcileOutcome`]. It runs the following decision chain, stopping at the first branch
//! that applies:
//!
//! 1. resource gone: success;
//! 2. non-team namespace or foreign tenant: event only, no status write, no directory call;
//! 3. deletion requested with the finalizer present: teardown, then remove the finalizer;
//! 4. finalizer absent: add it and requeue immediately;
//! 5. hash unchanged, state synchronized and credentials settled: no-op;
//! 6. otherwise: lookup-or-create, update metadata, ensure the service principal and
//!    reconcile credentials, then commit status.
//!
//! Callers must not run two reconciles of the same resource concurrently; the
//! [`Controller`](crate::controller::Controller) enforces this with keyed guards. Status and
//! finalizer writes are conditional on the version each attempt observed, so even without the
//! guard a stale attempt can never overwrite a newer status.

mod metrics;
mod session;

pub use metrics::ReconcileMetrics;

pub(crate) use session::Session;

// std
use std::collections::BTreeSet;
// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	config::ReconcilerConfig,
	credential::CredentialManager,
	directory::{ApplicationLookup, ApplicationPayload, DirectoryClient, PreAuthorizedClient},
	event::{EventReason, EventRecorder, ResourceEvent},
	finalizer::{self, FinalizerState},
	hash::SpecHash,
	obs::{self, OutcomeKind, ReconcilePath, ReconcileSpan, log_event},
	report::{self, SyncReport},
	resource::{ApplicationResource, CorrelationId, ResourceKey, SyncState},
	secret::SecretStore,
	store::ResourceStore,
};

/// One reconcile request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileRequest {
	/// Resource to reconcile.
	pub key: ResourceKey,
	/// Rotate every credential even if none is due.
	pub force_rotation: bool,
}
impl ReconcileRequest {
	/// Plain reconcile of `key`.
	pub fn new(key: ResourceKey) -> Self {
		Self { key, force_rotation: false }
	}

	/// Requests a credential rotation regardless of age.
	pub fn with_forced_rotation(mut self) -> Self {
		self.force_rotation = true;

		self
	}
}

/// Terminal decision reported back to the event source.
#[derive(Debug)]
pub enum ReconcileOutcome {
	/// Nothing left to do until the resource changes.
	Success,
	/// Reconcile again after the delay.
	Retry {
		/// Delay before the next attempt.
		after: Duration,
	},
	/// Gave up; operator intervention or a resource change is required.
	Fatal(Error),
}
impl ReconcileOutcome {
	/// Returns `true` for [`ReconcileOutcome::Success`].
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success)
	}

	/// Returns the requested delay for [`ReconcileOutcome::Retry`].
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Retry { after } => Some(*after),
			_ => None,
		}
	}

	fn kind(&self) -> OutcomeKind {
		match self {
			Self::Success => OutcomeKind::Success,
			Self::Retry { .. } => OutcomeKind::Retry,
			Self::Fatal(_) => OutcomeKind::Fatal,
		}
	}
}

/// Reconciles application resources against the directory.
#[derive(Clone)]
pub struct Reconciler {
	/// Validated configuration, including the tenant scope.
	pub config: ReconcilerConfig,
	/// Directory adapter.
	pub directory: Arc<dyn DirectoryClient>,
	/// Secret store receiving credential material.
	pub secrets: Arc<dyn SecretStore>,
	/// Resource store holding desired and observed state.
	pub resources: Arc<dyn ResourceStore>,
	/// Event sink.
	pub events: Arc<dyn EventRecorder>,
	/// Shared counters for reconcile outcomes.
	pub metrics: Arc<ReconcileMetrics>,
}
impl Reconciler {
	/// Creates a reconciler over the provided collaborators.
	pub fn new(
		config: ReconcilerConfig,
		directory: Arc<dyn DirectoryClient>,
		secrets: Arc<dyn SecretStore>,
		resources: Arc<dyn ResourceStore>,
		events: Arc<dyn EventRecorder>,
	) -> Self {
		Self { config, directory, secrets, resources, events, metrics: Default::default() }
	}

	/// Runs one reconcile for the requested resource.
	pub async fn reconcile(
		&self,
		request: &ReconcileRequest,
		cancel: &CancellationToken,
	) -> ReconcileOutcome {
		let correlation_id = CorrelationId::generate();
		let span = ReconcileSpan::new(&request.key, &correlation_id);

		obs::record_reconcile_outcome(ReconcilePath::Load, OutcomeKind::Attempt);
		self.metrics.record_attempt();

		let (path, outcome) = span.instrument(self.run(request, cancel, correlation_id)).await;

		obs::record_reconcile_outcome(path, outcome.kind());

		match &outcome {
			ReconcileOutcome::Success => self.metrics.record_success(),
			ReconcileOutcome::Retry { .. } => self.metrics.record_retry(),
			ReconcileOutcome::Fatal(_) => self.metrics.record_failure(),
		}
		if path == ReconcilePath::Noop {
			self.metrics.record_noop();
		}

		log_event!(debug, path = path.as_str(), outcome = outcome.kind().as_str(), "Reconcile finished.");

		outcome
	}

	async fn run(
		&self,
		request: &ReconcileRequest,
		cancel: &CancellationToken,
		correlation_id: CorrelationId,
	) -> (ReconcilePath, ReconcileOutcome) {
		let key = &request.key;
		let resource = match self.load(key, cancel).await {
			Ok(Some(resource)) => resource,
			Ok(None) => return (ReconcilePath::Missing, ReconcileOutcome::Success),
			Err(err) => return (ReconcilePath::Load, self.load_failed(err)),
		};

		if let Some(reason) = self.out_of_scope(&resource) {
			let message = match reason {
				EventReason::NotInTeamNamespace =>
					format!("Namespace {} is not a team namespace.", key.namespace),
				_ => "Resource belongs to another tenant scope.".to_owned(),
			};

			self.events.record(ResourceEvent::new(key.clone(), reason, message, correlation_id));

			return (ReconcilePath::Skipped, ReconcileOutcome::Success);
		}

		let mut session = Session::new(
			self,
			cancel,
			key.clone(),
			resource.resource_version,
			resource.status.clone(),
			correlation_id,
		);

		match FinalizerState::observe(&resource, &self.config.finalizer) {
			FinalizerState::Deprovisioned => (ReconcilePath::Teardown, ReconcileOutcome::Success),
			FinalizerState::Terminating => {
				let outcome = self.deprovision(&mut session, &resource).await;

				(ReconcilePath::Teardown, outcome)
			},
			FinalizerState::Unmanaged => {
				let outcome = match session.acquire_finalizer().await {
					Ok(()) => {
						session.emit(EventReason::AddedFinalizer, "Added finalizer.");

						ReconcileOutcome::Retry { after: Duration::ZERO }
					},
					Err(err) => report::failed(&mut session, err).await,
				};

				(ReconcilePath::Finalizer, outcome)
			},
			FinalizerState::Managed => {
				let hash = SpecHash::of(&resource.spec);

				if !request.force_rotation && self.is_noop(&resource, &hash, session.now) {
					return (ReconcilePath::Noop, ReconcileOutcome::Success);
				}

				let outcome = match self.synchronize(&mut session, &resource, request.force_rotation).await {
					Ok(sync) => report::synchronized(&mut session, hash, sync).await,
					Err(err) => report::failed(&mut session, err).await,
				};

				(ReconcilePath::Sync, outcome)
			},
		}
	}

	async fn load(
		&self,
		key: &ResourceKey,
		cancel: &CancellationToken,
	) -> Result<Option<ApplicationResource>> {
		let timeout = self.call_timeout();

		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(Error::Cancelled { operation: "get" }),
			result = tokio::time::timeout(timeout, self.resources.get(key)) => match result {
				Ok(inner) => inner.map_err(Error::from),
				Err(_) => Err(Error::Timeout { operation: "get" }),
			},
		}
	}

	fn load_failed(&self, err: Error) -> ReconcileOutcome {
		log_event!(warn, error = %err, "Failed to load resource.");

		if err.is_retryable() {
			ReconcileOutcome::Retry { after: err.retry_after().unwrap_or(self.config.retry_interval) }
		} else {
			ReconcileOutcome::Fatal(err)
		}
	}

	/// Returns the event reason when this instance must leave the resource alone.
	fn out_of_scope(&self, resource: &ApplicationResource) -> Option<EventReason> {
		if self.config.is_non_team_namespace(&resource.key.namespace) {
			return Some(EventReason::NotInTeamNamespace);
		}

		match resource.spec.tenant() {
			Ok(declared) if self.config.tenant_scope.admits(declared.as_ref()) => None,
			_ => Some(EventReason::Skipped),
		}
	}

	fn is_noop(&self, resource: &ApplicationResource, hash: &SpecHash, now: OffsetDateTime) -> bool {
		let status = &resource.status;

		status.synchronization_state == Some(SyncState::Synchronized)
			&& status.synchronization_hash.as_ref() == Some(hash)
			&& status.is_provisioned()
			&& self.config.credential_policy.is_settled(status, &resource.spec.secret_name, now)
	}

	async fn deprovision(
		&self,
		session: &mut Session<'_>,
		resource: &ApplicationResource,
	) -> ReconcileOutcome {
		match finalizer::teardown(session, &self.display_name(&resource.key)).await {
			Ok(teardown) => {
				if teardown.deleted {
					session.emit(EventReason::DeletedInAzure, "Application deleted from the directory.");
				}

				session.emit(EventReason::DeletedFinalizer, "Removed finalizer.");

				ReconcileOutcome::Success
			},
			Err(err) => report::failed(session, err).await,
		}
	}

	async fn synchronize(
		&self,
		session: &mut Session<'_>,
		resource: &ApplicationResource,
		force_rotation: bool,
	) -> Result<SyncReport> {
		let spec = &resource.spec;

		spec.validate()?;

		let tenant = spec.tenant()?;
		let mut report = SyncReport::default();
		let (pre_authorized, unresolved) = self.resolve_pre_authorized(session, resource).await?;
		let payload = ApplicationPayload {
			display_name: self.display_name(&resource.key),
			reply_urls: spec.normalized_reply_urls()?,
			logout_url: spec.normalized_logout_url()?,
			pre_authorized,
			extra_claims: spec.extra_claims(),
			group_ids: spec.group_ids(),
		};

		report.unresolved = unresolved;

		let existing = match session.status.client_id.clone() {
			Some(client_id) => {
				let query = ApplicationLookup::ClientId(client_id);
				let found = session.call("lookup", self.directory.lookup(&query)).await?;

				if found.is_none() {
					log_event!(warn, "Recorded application is gone; re-creating it.");

					session.status.forget_application();
				}

				found
			},
			None => None,
		};
		let existing = match existing {
			Some(application) => Some(application),
			None => {
				let query = ApplicationLookup::DisplayName(payload.display_name.clone());

				session.call("lookup", self.directory.lookup(&query)).await?
			},
		};
		let application = match existing {
			Some(application) => application,
			None => {
				report.created = true;

				session.call("create", self.directory.create(&payload)).await?
			},
		};

		session.status.client_id = Some(application.client_id.clone());
		session.status.object_id = Some(application.object_id.clone());

		if !report.created && application.payload != payload {
			session.call("update", self.directory.update(&application.object_id, &payload)).await?;

			report.updated = true;
		}

		let service_principal = session
			.call("ensure_service_principal", self.directory.ensure_service_principal(&application.client_id))
			.await?;

		session.status.service_principal_id = Some(service_principal);

		let manager = CredentialManager::new(
			&self.config.credential_policy,
			&spec.secret_name,
			tenant,
			force_rotation,
		);

		report.rotations = manager.reconcile(session, &application).await?;

		Ok(report)
	}

	/// Resolves pre-authorized callers by display name; callers not registered yet are
	/// returned separately and left out of the payload.
	async fn resolve_pre_authorized(
		&self,
		session: &Session<'_>,
		resource: &ApplicationResource,
	) -> Result<(Vec<PreAuthorizedClient>, Vec<String>)> {
		let namespace = resource.key.namespace.as_ref();
		let names: BTreeSet<String> = resource
			.spec
			.pre_authorized_applications
			.iter()
			.map(|app| app.display_name(&self.config.cluster, namespace))
			.collect();
		let mut resolved = Vec::new();
		let mut unresolved = Vec::new();

		for display_name in names {
			let query = ApplicationLookup::DisplayName(display_name.clone());

			match session.call("lookup", self.directory.lookup(&query)).await? {
				Some(application) =>
					resolved.push(PreAuthorizedClient { display_name, client_id: application.client_id }),
				None => unresolved.push(display_name),
			}
		}

		Ok((resolved, unresolved))
	}

	fn display_name(&self, key: &ResourceKey) -> String {
		format!("{}:{}:{}", self.config.cluster, key.namespace, key.name)
	}

	pub(crate) fn call_timeout(&self) -> std::time::Duration {
		std::time::Duration::try_from(self.config.call_timeout).unwrap_or_default()
	}
}
impl Debug for Reconciler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Reconciler").field("config", &self.config).finish()
	}
}
