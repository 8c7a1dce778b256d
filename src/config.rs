//! Reconciler configuration and its validating builder.
//!
//! Every knob that shapes a reconcile lives here and is passed explicitly to each
//! [`Reconciler`](crate::reconciler::Reconciler), so several instances with different tenant
//! scopes can run side by side in one process.

// std
use std::collections::BTreeSet;
// self
use crate::{
	_prelude::*,
	credential::CredentialPolicy,
	error::ConfigError,
	resource::{Namespace, TenantAlias},
};

/// Default finalizer marker.
pub const DEFAULT_FINALIZER: &str = "azurerator.nais.io/finalizer";

/// Which declared tenants an instance processes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantScope {
	/// Tenant served by this instance; `None` serves every declared tenant.
	pub name: Option<TenantAlias>,
	/// Whether resources that declare no tenant belong to this instance.
	pub accepts_unlabeled: bool,
}
impl TenantScope {
	/// Single-instance deployment that processes everything.
	pub fn any() -> Self {
		Self { name: None, accepts_unlabeled: true }
	}

	/// Instance serving the default tenant: matching and unlabeled resources.
	pub fn default_tenant(name: TenantAlias) -> Self {
		Self { name: Some(name), accepts_unlabeled: true }
	}

	/// Instance serving one additional tenant: only resources that name it.
	pub fn named(name: TenantAlias) -> Self {
		Self { name: Some(name), accepts_unlabeled: false }
	}

	/// Returns `true` if a resource declaring `declared` belongs to this instance.
	pub fn admits(&self, declared: Option<&TenantAlias>) -> bool {
		match (declared, &self.name) {
			(None, _) => self.accepts_unlabeled,
			(Some(_), None) => true,
			(Some(declared), Some(name)) => declared == name,
		}
	}
}
impl Default for TenantScope {
	fn default() -> Self {
		Self::any()
	}
}

/// Validated reconciler configuration.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
	/// Cluster name, first segment of every display name.
	pub cluster: String,
	/// Tenant scope of this instance.
	pub tenant_scope: TenantScope,
	/// Namespaces that never hold team resources.
	pub non_team_namespaces: BTreeSet<Namespace>,
	/// Finalizer marker owned by this controller.
	pub finalizer: String,
	/// Credential kinds and rotation timing.
	pub credential_policy: CredentialPolicy,
	/// Upper bound for each external call.
	pub call_timeout: Duration,
	/// Delay before retrying transient failures without an upstream hint.
	pub retry_interval: Duration,
	/// Delay before retrying after a concurrent modification.
	pub conflict_retry_interval: Duration,
	/// Delay before re-checking resources with unresolved dependencies.
	pub resync_interval: Duration,
}
impl ReconcilerConfig {
	/// Starts a builder for the given cluster.
	pub fn builder(cluster: impl Into<String>) -> ReconcilerConfigBuilder {
		ReconcilerConfigBuilder::new(cluster)
	}

	/// Returns `true` if resources in `namespace` are excluded from processing.
	pub fn is_non_team_namespace(&self, namespace: &Namespace) -> bool {
		self.non_team_namespaces.contains(namespace)
	}
}

/// Builder for [`ReconcilerConfig`] values.
#[derive(Debug)]
pub struct ReconcilerConfigBuilder {
	/// Cluster name.
	pub cluster: String,
	/// Tenant scope.
	pub tenant_scope: TenantScope,
	/// Excluded namespaces.
	pub non_team_namespaces: BTreeSet<Namespace>,
	/// Finalizer marker.
	pub finalizer: String,
	/// Credential policy.
	pub credential_policy: CredentialPolicy,
	/// Per-call timeout.
	pub call_timeout: Duration,
	/// Transient retry delay.
	pub retry_interval: Duration,
	/// Conflict retry delay.
	pub conflict_retry_interval: Duration,
	/// Resync delay.
	pub resync_interval: Duration,
}
impl ReconcilerConfigBuilder {
	const DEFAULT_CALL_TIMEOUT: Duration = Duration::seconds(30);
	const DEFAULT_CONFLICT_RETRY_INTERVAL: Duration = Duration::seconds(2);
	const DEFAULT_RESYNC_INTERVAL: Duration = Duration::minutes(5);
	const DEFAULT_RETRY_INTERVAL: Duration = Duration::seconds(15);

	/// Creates a builder seeded with defaults.
	pub fn new(cluster: impl Into<String>) -> Self {
		Self {
			cluster: cluster.into(),
			tenant_scope: TenantScope::default(),
			non_team_namespaces: BTreeSet::new(),
			finalizer: DEFAULT_FINALIZER.into(),
			credential_policy: CredentialPolicy::default(),
			call_timeout: Self::DEFAULT_CALL_TIMEOUT,
			retry_interval: Self::DEFAULT_RETRY_INTERVAL,
			conflict_retry_interval: Self::DEFAULT_CONFLICT_RETRY_INTERVAL,
			resync_interval: Self::DEFAULT_RESYNC_INTERVAL,
		}
	}

	/// Sets the tenant scope.
	pub fn tenant_scope(mut self, scope: TenantScope) -> Self {
		self.tenant_scope = scope;

		self
	}

	/// Excludes a namespace from processing.
	pub fn non_team_namespace(mut self, namespace: Namespace) -> Self {
		self.non_team_namespaces.insert(namespace);

		self
	}

	/// Excludes several namespaces from processing.
	pub fn non_team_namespaces<I>(mut self, namespaces: I) -> Self
	where
		I: IntoIterator<Item = Namespace>,
	{
		self.non_team_namespaces.extend(namespaces);

		self
	}

	/// Overrides the finalizer marker.
	pub fn finalizer(mut self, finalizer: impl Into<String>) -> Self {
		self.finalizer = finalizer.into();

		self
	}

	/// Overrides the credential policy.
	pub fn credential_policy(mut self, policy: CredentialPolicy) -> Self {
		self.credential_policy = policy;

		self
	}

	/// Overrides the per-call timeout.
	pub fn call_timeout(mut self, timeout: Duration) -> Self {
		self.call_timeout = timeout;

		self
	}

	/// Overrides the transient retry delay.
	pub fn retry_interval(mut self, interval: Duration) -> Self {
		self.retry_interval = interval;

		self
	}

	/// Overrides the conflict retry delay.
	pub fn conflict_retry_interval(mut self, interval: Duration) -> Self {
		self.conflict_retry_interval = interval;

		self
	}

	/// Overrides the resync delay.
	pub fn resync_interval(mut self, interval: Duration) -> Self {
		self.resync_interval = interval;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ReconcilerConfig, ConfigError> {
		let config = ReconcilerConfig {
			cluster: self.cluster.trim().to_owned(),
			tenant_scope: self.tenant_scope,
			non_team_namespaces: self.non_team_namespaces,
			finalizer: self.finalizer,
			credential_policy: self.credential_policy,
			call_timeout: self.call_timeout,
			retry_interval: self.retry_interval,
			conflict_retry_interval: self.conflict_retry_interval,
			resync_interval: self.resync_interval,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ReconcilerConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.cluster.is_empty() {
			return Err(ConfigError::EmptyCluster);
		}

		validate_finalizer(&self.finalizer)?;
		validate_positive("call_timeout", self.call_timeout)?;
		validate_positive("retry_interval", self.retry_interval)?;
		validate_positive("conflict_retry_interval", self.conflict_retry_interval)?;
		validate_positive("resync_interval", self.resync_interval)?;
		validate_positive("rotation_interval", self.credential_policy.rotation_interval)?;

		if self.credential_policy.required_kinds().is_empty() {
			return Err(ConfigError::NoCredentialKinds);
		}
		if self.credential_policy.lifetime <= self.credential_policy.rotation_interval {
			return Err(ConfigError::RotationExceedsLifetime);
		}

		Ok(())
	}
}

fn validate_finalizer(finalizer: &str) -> Result<(), ConfigError> {
	let well_formed = finalizer
		.split_once('/')
		.map(|(domain, name)| !domain.is_empty() && !name.is_empty() && !name.contains('/'))
		.unwrap_or(false);

	if well_formed && !finalizer.chars().any(char::is_whitespace) {
		Ok(())
	} else {
		Err(ConfigError::InvalidFinalizer { finalizer: finalizer.to_owned() })
	}
}

fn validate_positive(field: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { field }) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn alias(raw: &str) -> TenantAlias {
		TenantAlias::new(raw).expect("Tenant fixture should be valid.")
	}

	#[test]
	fn builder_applies_defaults() {
		let config = ReconcilerConfig::builder("dev-gcp").build().expect("Defaults should validate.");

		assert_eq!(config.cluster, "dev-gcp");
		assert_eq!(config.finalizer, DEFAULT_FINALIZER);
		assert_eq!(config.call_timeout, Duration::seconds(30));
		assert_eq!(config.resync_interval, Duration::minutes(5));
		assert_eq!(config.tenant_scope, TenantScope::any());
	}

	#[test]
	fn builder_rejects_invalid_settings() {
		assert_eq!(ReconcilerConfig::builder(" ").build().unwrap_err(), ConfigError::EmptyCluster);
		assert!(matches!(
			ReconcilerConfig::builder("c").finalizer("no-slash").build(),
			Err(ConfigError::InvalidFinalizer { .. })
		));
		assert_eq!(
			ReconcilerConfig::builder("c").call_timeout(Duration::ZERO).build().unwrap_err(),
			ConfigError::NonPositiveDuration { field: "call_timeout" }
		);

		let short_lived = CredentialPolicy { lifetime: Duration::days(30), ..Default::default() };

		assert_eq!(
			ReconcilerConfig::builder("c").credential_policy(short_lived).build().unwrap_err(),
			ConfigError::RotationExceedsLifetime
		);

		let nothing = CredentialPolicy { require_password: false, ..Default::default() };

		assert_eq!(
			ReconcilerConfig::builder("c").credential_policy(nothing).build().unwrap_err(),
			ConfigError::NoCredentialKinds
		);
	}

	#[test]
	fn tenant_scope_admission() {
		let t1 = alias("t1");
		let t2 = alias("t2");

		assert!(TenantScope::any().admits(None));
		assert!(TenantScope::any().admits(Some(&t2)));
		assert!(TenantScope::default_tenant(t1.clone()).admits(None));
		assert!(TenantScope::default_tenant(t1.clone()).admits(Some(&t1)));
		assert!(!TenantScope::default_tenant(t1.clone()).admits(Some(&t2)));
		assert!(!TenantScope::named(t2.clone()).admits(None));
		assert!(TenantScope::named(t2.clone()).admits(Some(&t2)));
	}
}
