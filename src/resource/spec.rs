//! Desired-state section of an application resource.

// std
use std::collections::BTreeSet;
// self
use crate::{_prelude::*, resource::TenantAlias};

/// Errors raised while parsing or validating a desired state.
#[derive(Debug, ThisError)]
pub enum ValidationError {
	/// The manifest could not be decoded; `path` points at the offending field.
	#[error("Application spec is malformed at `{path}`.")]
	Malformed {
		/// Dotted path of the field that failed to decode.
		path: String,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The secret target name is empty.
	#[error("Secret name must not be empty.")]
	EmptySecretName,
	/// The secret target name contains characters a secret name cannot hold.
	#[error("Secret name `{name}` is not a valid resource name.")]
	InvalidSecretName {
		/// Rejected secret name.
		name: String,
	},
	/// A reply URL failed to parse.
	#[error("Reply URL `{url}` is invalid.")]
	InvalidReplyUrl {
		/// Rejected URL.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The logout URL failed to parse.
	#[error("Logout URL `{url}` is invalid.")]
	InvalidLogoutUrl {
		/// Rejected URL.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The logout URL does not use HTTPS.
	#[error("Logout URL must use HTTPS: {url}.")]
	InsecureLogoutUrl {
		/// Rejected URL.
		url: String,
	},
	/// A pre-authorized application entry has no application name.
	#[error("Pre-authorized application entries require an application name.")]
	EmptyPreAuthorizedApplication,
	/// A group entry has no identifier.
	#[error("Group claim entries require an identifier.")]
	EmptyGroupId,
	/// The tenant alias is not a valid identifier.
	#[error("Tenant alias `{tenant}` is invalid.")]
	InvalidTenant {
		/// Rejected alias.
		tenant: String,
	},
}

/// Extra claims that can be mapped into issued tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExtraClaim {
	/// Employee identifier claim.
	#[serde(rename = "NAVident")]
	NavIdent,
}
impl ExtraClaim {
	/// Returns the wire name of the claim.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExtraClaim::NavIdent => "NAVident",
		}
	}
}

/// Reply URL entry as declared on the resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyUrl {
	/// Callback URL used after OIDC flows.
	#[serde(default)]
	pub url: String,
}
impl From<&str> for ReplyUrl {
	fn from(value: &str) -> Self {
		Self { url: value.to_owned() }
	}
}

/// Caller allowed to request on-behalf-of tokens for this application.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PreAuthorizedApplication {
	/// Application name of the caller.
	pub application: String,
	/// Namespace of the caller; empty means the owning resource's namespace.
	#[serde(default)]
	pub namespace: String,
	/// Cluster of the caller; empty means the controller's cluster.
	#[serde(default)]
	pub cluster: String,
}
impl PreAuthorizedApplication {
	/// Builds an entry from its three identifying parts.
	pub fn new(
		application: impl Into<String>,
		namespace: impl Into<String>,
		cluster: impl Into<String>,
	) -> Self {
		Self { application: application.into(), namespace: namespace.into(), cluster: cluster.into() }
	}

	/// Directory display name of the caller, filling blanks from the owner's location.
	pub fn display_name(&self, default_cluster: &str, default_namespace: &str) -> String {
		let cluster = if self.cluster.is_empty() { default_cluster } else { &self.cluster };
		let namespace = if self.namespace.is_empty() { default_namespace } else { &self.namespace };

		format!("{cluster}:{namespace}:{}", self.application)
	}
}

/// Group exposed in the groups claim.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Group {
	/// Directory group identifier.
	#[serde(default)]
	pub id: String,
}

/// Claim-mapping configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Extra claims mapped from a claim-mapping policy.
	#[serde(default)]
	pub extra: Vec<ExtraClaim>,
	/// Groups emitted in the groups claim.
	#[serde(default)]
	pub groups: Vec<Group>,
}

/// Desired state of an application registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
	/// Reply URLs in declaration order.
	#[serde(default)]
	pub reply_urls: Vec<ReplyUrl>,
	/// Callers allowed to request tokens on behalf of users.
	#[serde(default)]
	pub pre_authorized_applications: Vec<PreAuthorizedApplication>,
	/// Front-channel logout URL; must use HTTPS.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub logout_url: Option<String>,
	/// Name of the secret that receives credential material.
	pub secret_name: String,
	/// Tenant alias; empty or absent means the default tenant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tenant: Option<String>,
	/// Optional claim configuration.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub claims: Option<Claims>,
}
impl ApplicationSpec {
	/// Creates a spec that only names its secret target.
	pub fn new(secret_name: impl Into<String>) -> Self {
		Self { secret_name: secret_name.into(), ..Default::default() }
	}

	/// Adds a reply URL.
	pub fn with_reply_url(mut self, url: impl Into<String>) -> Self {
		self.reply_urls.push(ReplyUrl { url: url.into() });

		self
	}

	/// Sets the logout URL.
	pub fn with_logout_url(mut self, url: impl Into<String>) -> Self {
		self.logout_url = Some(url.into());

		self
	}

	/// Sets the tenant alias.
	pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Adds a pre-authorized application.
	pub fn with_pre_authorized(mut self, application: PreAuthorizedApplication) -> Self {
		self.pre_authorized_applications.push(application);

		self
	}

	/// Replaces the claim configuration.
	pub fn with_claims(mut self, claims: Claims) -> Self {
		self.claims = Some(claims);

		self
	}

	/// Decodes a spec from JSON, reporting the failing field path.
	pub fn from_json(payload: &str) -> Result<Self, ValidationError> {
		let deserializer = &mut serde_json::Deserializer::from_str(payload);

		serde_path_to_error::deserialize(deserializer).map_err(|source| {
			ValidationError::Malformed { path: source.path().to_string(), source }
		})
	}

	/// Returns the declared tenant, treating an empty string as the default tenant.
	pub fn tenant(&self) -> Result<Option<TenantAlias>, ValidationError> {
		match self.tenant.as_deref() {
			None | Some("") => Ok(None),
			Some(raw) => TenantAlias::new(raw)
				.map(Some)
				.map_err(|_| ValidationError::InvalidTenant { tenant: raw.to_owned() }),
		}
	}

	/// Checks every field the directory depends on.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.secret_name.is_empty() {
			return Err(ValidationError::EmptySecretName);
		}
		if !is_resource_name(&self.secret_name) {
			return Err(ValidationError::InvalidSecretName { name: self.secret_name.clone() });
		}

		self.normalized_reply_urls()?;
		self.normalized_logout_url()?;
		self.tenant()?;

		if self.pre_authorized_applications.iter().any(|app| app.application.is_empty()) {
			return Err(ValidationError::EmptyPreAuthorizedApplication);
		}
		if self.claims.iter().flat_map(|claims| &claims.groups).any(|group| group.id.is_empty()) {
			return Err(ValidationError::EmptyGroupId);
		}

		Ok(())
	}

	/// Parsed reply URLs, deduplicated and sorted since the directory treats them as a set.
	pub fn normalized_reply_urls(&self) -> Result<Vec<String>, ValidationError> {
		let mut set = BTreeSet::new();

		for entry in &self.reply_urls {
			let parsed = Url::parse(entry.url.trim()).map_err(|source| {
				ValidationError::InvalidReplyUrl { url: entry.url.clone(), source }
			})?;

			set.insert(parsed.to_string());
		}

		Ok(set.into_iter().collect())
	}

	/// Parsed logout URL; absent and empty values both mean "none".
	pub fn normalized_logout_url(&self) -> Result<Option<String>, ValidationError> {
		let Some(raw) = self.logout_url.as_deref().filter(|raw| !raw.is_empty()) else {
			return Ok(None);
		};
		let parsed = Url::parse(raw)
			.map_err(|source| ValidationError::InvalidLogoutUrl { url: raw.to_owned(), source })?;

		if parsed.scheme() != "https" {
			return Err(ValidationError::InsecureLogoutUrl { url: raw.to_owned() });
		}

		Ok(Some(parsed.to_string()))
	}

	/// Sorted, deduplicated extra claims.
	pub fn extra_claims(&self) -> Vec<ExtraClaim> {
		let set: BTreeSet<_> = self.claims.iter().flat_map(|c| c.extra.iter().copied()).collect();

		set.into_iter().collect()
	}

	/// Sorted, deduplicated group identifiers.
	pub fn group_ids(&self) -> Vec<String> {
		let set: BTreeSet<_> =
			self.claims.iter().flat_map(|c| c.groups.iter().map(|g| g.id.clone())).collect();

		set.into_iter().collect()
	}
}

fn is_resource_name(value: &str) -> bool {
	value.len() <= 253
		&& value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
		&& value.starts_with(|c: char| c.is_ascii_alphanumeric())
		&& value.ends_with(|c: char| c.is_ascii_alphanumeric())
}
