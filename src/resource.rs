//! Resource model: identifiers, desired state, observed state and the versioned record.

pub mod id;
pub mod record;
pub mod spec;
pub mod status;

pub use id::*;
pub use record::*;
pub use spec::*;
pub use status::*;
