//! Strongly typed identifiers for resources, directory objects and credentials.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 253;
const CORRELATION_ID_LEN: usize = 24;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (namespace, client, key).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (namespace, client, key).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (namespace, client, key).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { Namespace, "Namespace that owns a resource.", "Namespace" }
def_id! { ResourceName, "Name of a resource within its namespace.", "ResourceName" }
def_id! { TenantAlias, "Alias of the directory tenant a controller instance serves.", "Tenant" }
def_id! { ClientId, "Client identifier minted by the directory for an application.", "ClientId" }
def_id! { ObjectId, "Directory object identifier of an application registration.", "ObjectId" }
def_id! { ServicePrincipalId, "Directory object identifier of a service principal.", "ServicePrincipal" }
def_id! { KeyId, "Key identifier of a password or certificate credential.", "KeyId" }
def_id! { CorrelationId, "Opaque token linking logs and events of one reconcile attempt.", "CorrelationId" }

impl CorrelationId {
	/// Generates a fresh random correlation identifier.
	pub fn generate() -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(CORRELATION_ID_LEN).map(char::from).collect())
	}
}

/// Namespaced identity of a resource record.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
	/// Owning namespace.
	pub namespace: Namespace,
	/// Resource name.
	pub name: ResourceName,
}
impl ResourceKey {
	/// Builds a key from already validated parts.
	pub fn new(namespace: Namespace, name: ResourceName) -> Self {
		Self { namespace, name }
	}

	/// Validates and builds a key from raw strings.
	pub fn parse(namespace: &str, name: &str) -> Result<Self, IdentifierError> {
		Ok(Self { namespace: Namespace::new(namespace)?, name: ResourceName::new(name)? })
	}
}
impl Debug for ResourceKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ResourceKey({}/{})", self.namespace, self.name)
	}
}
impl Display for ResourceKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
