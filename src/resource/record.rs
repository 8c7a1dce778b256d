//! Versioned resource record holding desired and observed state side by side.

// std
use std::collections::BTreeSet;
// self
use crate::{
	_prelude::*,
	resource::{ApplicationSpec, ApplicationStatus, ResourceKey},
};

/// Monotonic version of a resource record, bumped by every write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceVersion(pub u64);
impl ResourceVersion {
	/// Returns the version following this one.
	pub const fn next(self) -> Self {
		Self(self.0 + 1)
	}
}
impl Display for ResourceVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}", self.0)
	}
}

/// Application resource as seen by the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResource {
	/// Namespaced identity.
	pub key: ResourceKey,
	/// Spec generation, bumped on every desired-state change.
	pub generation: u64,
	/// Record version used for conditional writes.
	pub resource_version: ResourceVersion,
	/// Set once deletion has been requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deletion_timestamp: Option<OffsetDateTime>,
	/// Finalizer markers blocking removal.
	#[serde(default)]
	pub finalizers: BTreeSet<String>,
	/// Desired state.
	pub spec: ApplicationSpec,
	/// Observed state.
	#[serde(default)]
	pub status: ApplicationStatus,
}
impl ApplicationResource {
	/// Creates a fresh record at generation 1 with an empty status.
	pub fn new(key: ResourceKey, spec: ApplicationSpec) -> Self {
		Self {
			key,
			generation: 1,
			resource_version: ResourceVersion(1),
			deletion_timestamp: None,
			finalizers: BTreeSet::new(),
			spec,
			status: ApplicationStatus::default(),
		}
	}

	/// Returns `true` once deletion has been requested.
	pub fn is_deletion_requested(&self) -> bool {
		self.deletion_timestamp.is_some()
	}

	/// Returns `true` if the named finalizer is present.
	pub fn has_finalizer(&self, finalizer: &str) -> bool {
		self.finalizers.contains(finalizer)
	}
}
