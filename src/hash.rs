//! Change detection for desired state.
//!
//! [`SpecHash::of`] digests only the fields that affect the directory or the credential
//! target. Sets whose order carries no meaning (reply URLs, pre-authorized callers, claims)
//! are deduplicated and sorted first, so reordering a manifest never triggers a sync. Each
//! field is fed with a label and a length prefix before hashing with SHA-256, and the digest
//! is rendered as unpadded base64.

// std
use std::collections::BTreeSet;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, resource::ApplicationSpec};

const CANONICAL_VERSION: &str = "v1";

/// Stable digest of the directory-relevant part of an [`ApplicationSpec`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecHash(String);
impl SpecHash {
	/// Hashes the provided desired state.
	pub fn of(spec: &ApplicationSpec) -> Self {
		let mut canonical = Canonical::default();

		canonical.field("version", [CANONICAL_VERSION]);
		canonical.field(
			"reply_urls",
			spec.reply_urls.iter().map(|r| r.url.trim()).collect::<BTreeSet<_>>(),
		);
		canonical.field("logout_url", spec.logout_url.as_deref().filter(|url| !url.is_empty()));
		canonical.field("secret_name", [spec.secret_name.as_str()]);

		let pre_authorized: BTreeSet<_> = spec
			.pre_authorized_applications
			.iter()
			.map(|app| format!("{}\u{1f}{}\u{1f}{}", app.cluster, app.namespace, app.application))
			.collect();

		canonical.field("pre_authorized", pre_authorized.iter().map(String::as_str));
		canonical.field("extra_claims", spec.extra_claims().into_iter().map(|c| c.as_str()));
		canonical.field("groups", spec.group_ids().iter().map(String::as_str));

		Self(STANDARD_NO_PAD.encode(canonical.finish()))
	}

	/// Returns the encoded digest.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Debug for SpecHash {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "SpecHash({})", self.0)
	}
}
impl Display for SpecHash {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[derive(Default)]
struct Canonical(Sha256);
impl Canonical {
	fn field<'a, I>(&mut self, label: &str, values: I)
	where
		I: IntoIterator<Item = &'a str>,
	{
		self.chunk(label);

		let values: Vec<_> = values.into_iter().collect();

		self.0.update((values.len() as u64).to_be_bytes());

		for value in values {
			self.chunk(value);
		}
	}

	fn chunk(&mut self, value: &str) {
		self.0.update((value.len() as u64).to_be_bytes());
		self.0.update(value.as_bytes());
	}

	fn finish(self) -> Vec<u8> {
		self.0.finalize().to_vec()
	}
}
