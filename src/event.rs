//! Human-readable events describing reconcile outcomes.

// self
use crate::{
	_prelude::*,
	resource::{CorrelationId, ResourceKey},
};

/// Closed set of machine-readable event reasons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventReason {
	/// The directory reflects the desired state.
	Synchronized,
	/// A reconcile attempt failed.
	FailedSynchronization,
	/// The directory was updated but the status could not be written.
	FailedStatusUpdate,
	/// The finalizer marker was added.
	AddedFinalizer,
	/// The finalizer marker was removed after deprovisioning.
	DeletedFinalizer,
	/// A new application was registered.
	CreatedInAzure,
	/// Metadata of an existing application was replaced.
	UpdatedInAzure,
	/// A credential was rotated.
	RotatedInAzure,
	/// The application was deleted from the directory.
	DeletedInAzure,
	/// The resource lives in a namespace excluded from processing.
	NotInTeamNamespace,
	/// The resource belongs to another tenant scope.
	Skipped,
	/// A retry was scheduled.
	Retrying,
}
impl EventReason {
	/// Returns the stable wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			EventReason::Synchronized => "Synchronized",
			EventReason::FailedSynchronization => "FailedSynchronization",
			EventReason::FailedStatusUpdate => "FailedStatusUpdate",
			EventReason::AddedFinalizer => "AddedFinalizer",
			EventReason::DeletedFinalizer => "DeletedFinalizer",
			EventReason::CreatedInAzure => "CreatedInAzure",
			EventReason::UpdatedInAzure => "UpdatedInAzure",
			EventReason::RotatedInAzure => "RotatedInAzure",
			EventReason::DeletedInAzure => "DeletedInAzure",
			EventReason::NotInTeamNamespace => "NotInTeamNamespace",
			EventReason::Skipped => "Skipped",
			EventReason::Retrying => "Retrying",
		}
	}

	/// Severity attached to events with this reason.
	pub const fn event_type(self) -> EventType {
		match self {
			EventReason::FailedSynchronization | EventReason::FailedStatusUpdate => EventType::Warning,
			_ => EventType::Normal,
		}
	}
}
impl Display for EventReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Event severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
	/// Informational.
	Normal,
	/// Needs attention.
	Warning,
}

/// Event attached to a resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
	/// Resource the event is about.
	pub key: ResourceKey,
	/// Machine-readable reason.
	pub reason: EventReason,
	/// Severity.
	pub event_type: EventType,
	/// Human-readable message.
	pub message: String,
	/// Reconcile attempt that emitted the event.
	pub correlation_id: CorrelationId,
	/// Emission instant.
	pub recorded_at: OffsetDateTime,
}
impl ResourceEvent {
	/// Builds an event stamped with the current time.
	pub fn new(
		key: ResourceKey,
		reason: EventReason,
		message: impl Into<String>,
		correlation_id: CorrelationId,
	) -> Self {
		Self {
			key,
			reason,
			event_type: reason.event_type(),
			message: message.into(),
			correlation_id,
			recorded_at: OffsetDateTime::now_utc(),
		}
	}
}

/// Sink for resource events. Recording is best effort and must not block.
pub trait EventRecorder
where
	Self: Send + Sync,
{
	/// Records one event.
	fn record(&self, event: ResourceEvent);
}

/// Recorder that keeps events in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryEventRecorder(Arc<Mutex<Vec<ResourceEvent>>>);
impl MemoryEventRecorder {
	/// Returns every recorded event in order.
	pub fn events(&self) -> Vec<ResourceEvent> {
		self.0.lock().clone()
	}

	/// Returns the reasons recorded for one resource, in order.
	pub fn reasons_for(&self, key: &ResourceKey) -> Vec<EventReason> {
		self.0.lock().iter().filter(|event| &event.key == key).map(|event| event.reason).collect()
	}

	/// Drops every recorded event.
	pub fn clear(&self) {
		self.0.lock().clear();
	}
}
impl EventRecorder for MemoryEventRecorder {
	fn record(&self, event: ResourceEvent) {
		self.0.lock().push(event);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failures_are_warnings() {
		assert_eq!(EventReason::FailedSynchronization.event_type(), EventType::Warning);
		assert_eq!(EventReason::FailedStatusUpdate.event_type(), EventType::Warning);
		assert_eq!(EventReason::Retrying.event_type(), EventType::Normal);
		assert_eq!(EventReason::CreatedInAzure.to_string(), "CreatedInAzure");
	}

	#[test]
	fn memory_recorder_filters_by_resource() {
		let recorder = MemoryEventRecorder::default();
		let a = ResourceKey::parse("team-a", "app").expect("Key fixture should be valid.");
		let b = ResourceKey::parse("team-b", "app").expect("Key fixture should be valid.");

		recorder.record(ResourceEvent::new(a.clone(), EventReason::AddedFinalizer, "", CorrelationId::generate()));
		recorder.record(ResourceEvent::new(b, EventReason::Skipped, "", CorrelationId::generate()));
		recorder.record(ResourceEvent::new(a.clone(), EventReason::Synchronized, "", CorrelationId::generate()));

		assert_eq!(recorder.reasons_for(&a), vec![EventReason::AddedFinalizer, EventReason::Synchronized]);
		assert_eq!(recorder.events().len(), 3);
	}
}
