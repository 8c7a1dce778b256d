//! Keeps identity-provider application registrations, service principals and rotating
//! credentials in sync with declarative resources: finalizer-first deprovisioning,
//! crash-resumable rotations and version-conditional status in one reconciler core.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod controller;
pub mod credential;
pub mod directory;
pub mod error;
pub mod event;
pub mod finalizer;
pub mod hash;
pub mod obs;
pub mod reconciler;
pub mod resource;
pub mod secret;
pub mod store;

mod report;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use tokio_util;
pub use url;
#[cfg(test)] use color_eyre as _;
