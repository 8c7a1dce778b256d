//! Event-driven controller: a queue of resource keys consumed by a worker pool.
//!
//! Change notifications are pushed onto an unbounded queue. Each worker pops one request,
//! acquires the keyed guard for that resource and runs a reconcile, so reconciles of the same
//! resource never overlap while different resources proceed in parallel. Retries are
//! re-enqueued after the requested delay unless the controller is shutting down.

// crates.io
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	obs::log_event,
	reconciler::{ReconcileOutcome, ReconcileRequest, Reconciler},
	resource::ResourceKey,
};

type GuardMap = Arc<Mutex<HashMap<ResourceKey, Arc<AsyncMutex<()>>>>>;
type SharedReceiver = Arc<AsyncMutex<mpsc::UnboundedReceiver<ReconcileRequest>>>;

/// Notification delivered by the resource event source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceChange {
	/// Resource that changed.
	pub key: ResourceKey,
	/// Spec generation observed by the event source.
	pub generation: u64,
	/// Whether deletion has been requested.
	pub deletion_requested: bool,
}

/// Receives the terminal outcome of every reconcile.
pub trait OutcomeListener
where
	Self: Send + Sync,
{
	/// Called once per finished reconcile, before any retry is scheduled.
	fn on_outcome(&self, key: &ResourceKey, outcome: &ReconcileOutcome);
}

/// Listener that ignores every outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;
impl OutcomeListener for NoopListener {
	fn on_outcome(&self, _: &ResourceKey, _: &ReconcileOutcome) {}
}

/// Worker pool configuration.
#[derive(Clone)]
pub struct Controller {
	reconciler: Arc<Reconciler>,
	listener: Arc<dyn OutcomeListener>,
	workers: usize,
}
impl Controller {
	const DEFAULT_WORKERS: usize = 4;

	/// Creates a controller with the default worker count and no listener.
	pub fn new(reconciler: Arc<Reconciler>) -> Self {
		Self { reconciler, listener: Arc::new(NoopListener), workers: Self::DEFAULT_WORKERS }
	}

	/// Overrides the number of concurrent workers (at least one).
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers.max(1);

		self
	}

	/// Installs an outcome listener.
	pub fn with_listener(mut self, listener: Arc<dyn OutcomeListener>) -> Self {
		self.listener = listener;

		self
	}

	/// Spawns the worker pool on the current Tokio runtime.
	pub fn spawn(self) -> ControllerHandle {
		let (sender, receiver) = mpsc::unbounded_channel();
		let receiver: SharedReceiver = Arc::new(AsyncMutex::new(receiver));
		let guards = GuardMap::default();
		let cancel = CancellationToken::new();
		let workers = (0..self.workers)
			.map(|_| {
				let worker = Worker {
					reconciler: self.reconciler.clone(),
					listener: self.listener.clone(),
					guards: guards.clone(),
					receiver: receiver.clone(),
					sender: sender.clone(),
					cancel: cancel.clone(),
				};

				tokio::spawn(worker.run())
			})
			.collect();

		ControllerHandle { sender, cancel, workers }
	}
}
impl Debug for Controller {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Controller").field("workers", &self.workers).finish()
	}
}

/// Handle to a running controller.
#[derive(Debug)]
pub struct ControllerHandle {
	sender: mpsc::UnboundedSender<ReconcileRequest>,
	cancel: CancellationToken,
	workers: Vec<JoinHandle<()>>,
}
impl ControllerHandle {
	/// Enqueues a change notification; returns `false` once the controller stopped.
	pub fn notify(&self, change: ResourceChange) -> bool {
		log_event!(
			debug,
			key = %change.key,
			generation = change.generation,
			deletion_requested = change.deletion_requested,
			"Resource changed."
		);

		self.enqueue(ReconcileRequest::new(change.key))
	}

	/// Enqueues a reconcile that rotates every credential of the resource.
	pub fn rotate(&self, key: ResourceKey) -> bool {
		self.enqueue(ReconcileRequest::new(key).with_forced_rotation())
	}

	/// Cancels in-flight reconciles, stops the workers and waits for them to exit.
	pub async fn shutdown(self) {
		self.cancel.cancel();

		drop(self.sender);

		for worker in self.workers {
			let _ = worker.await;
		}
	}

	fn enqueue(&self, request: ReconcileRequest) -> bool {
		!self.cancel.is_cancelled() && self.sender.send(request).is_ok()
	}
}

struct Worker {
	reconciler: Arc<Reconciler>,
	listener: Arc<dyn OutcomeListener>,
	guards: GuardMap,
	receiver: SharedReceiver,
	sender: mpsc::UnboundedSender<ReconcileRequest>,
	cancel: CancellationToken,
}
impl Worker {
	async fn run(self) {
		while let Some(request) = self.next().await {
			let guard = self.guard(&request.key);
			let outcome = {
				let _serialized = guard.lock().await;

				self.reconciler.reconcile(&request, &self.cancel).await
			};

			self.release(&request.key, guard);
			self.listener.on_outcome(&request.key, &outcome);

			if let ReconcileOutcome::Retry { after } = outcome {
				self.requeue(request, after);
			}
		}
	}

	async fn next(&self) -> Option<ReconcileRequest> {
		let mut receiver = self.receiver.lock().await;

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => None,
			request = receiver.recv() => request,
		}
	}

	/// Returns (and creates on demand) the guard serializing reconciles of `key`.
	fn guard(&self, key: &ResourceKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Drops the guard entry once no other worker holds or awaits it.
	fn release(&self, key: &ResourceKey, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.guards.lock();

		drop(guard);

		if guards.get(key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
			guards.remove(key);
		}
	}

	fn requeue(&self, request: ReconcileRequest, after: Duration) {
		let sender = self.sender.clone();
		let cancel = self.cancel.clone();
		let delay = std::time::Duration::try_from(after).unwrap_or_default();

		tokio::spawn(async move {
			tokio::select! {
				_ = cancel.cancelled() => {},
				_ = tokio::time::sleep(delay) => {
					let _ = sender.send(request);
				},
			}
		});
	}
}
