//! Runs the controller against in-memory backends: provisions an application, rotates its
//! credential on demand, then deprovisions it.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use azurerator::{
	config::ReconcilerConfig,
	controller::{Controller, ResourceChange},
	credential::CredentialKind,
	directory::MemoryDirectory,
	event::MemoryEventRecorder,
	reconciler::Reconciler,
	resource::{ApplicationSpec, ResourceKey},
	secret::{MemorySecretStore, SecretTarget},
	store::MemoryResourceStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let directory = MemoryDirectory::default();
	let secrets = MemorySecretStore::default();
	let resources = MemoryResourceStore::default();
	let events = MemoryEventRecorder::default();
	let config = ReconcilerConfig::builder("dev-gcp").build()?;
	let reconciler = Reconciler::new(
		config,
		Arc::new(directory.clone()),
		Arc::new(secrets.clone()),
		Arc::new(resources.clone()),
		Arc::new(events.clone()),
	);
	let handle = Controller::new(Arc::new(reconciler)).with_workers(2).spawn();
	let key = ResourceKey::parse("team-a", "frontend")?;
	let spec =
		ApplicationSpec::new("frontend-azure").with_reply_url("https://frontend.example/oauth2/callback");
	let record = resources.apply(key.clone(), spec);

	handle.notify(ResourceChange { key: key.clone(), generation: record.generation, deletion_requested: false });

	let target = SecretTarget::new(key.namespace.clone(), "frontend-azure");

	wait_for(|| secrets.payload(&target, CredentialKind::Password).is_some()).await?;

	let first = secrets
		.payload(&target, CredentialKind::Password)
		.ok_or_else(|| eyre!("no secret delivered"))?;

	println!("Provisioned client {} with key {}.", first.client_id, first.key_id);

	handle.rotate(key.clone());

	wait_for(|| {
		secrets.payload(&target, CredentialKind::Password).is_some_and(|p| p.key_id != first.key_id)
	})
	.await?;

	println!("Rotated credential, {} secret writes so far.", secrets.write_count());

	resources.request_deletion(&key);
	handle.notify(ResourceChange { key: key.clone(), generation: record.generation, deletion_requested: true });

	wait_for(|| resources.snapshot(&key).is_none()).await?;
	handle.shutdown().await;

	for event in events.events() {
		println!("{:?} {}: {}", event.event_type, event.reason, event.message);
	}

	println!("Applications left in the directory: {}.", directory.application_count());

	Ok(())
}

async fn wait_for<F>(mut condition: F) -> Result<()>
where
	F: FnMut() -> bool,
{
	tokio::time::timeout(Duration::from_secs(5), async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.map_err(|_| eyre!("controller did not converge in time"))
}
