//! Redacting wrapper for credential material.

// self
use crate::_prelude::*;

/// Password or private-key material that never shows up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMaterial(String);
impl SecretMaterial {
	/// Wraps new material.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for SecretMaterial {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for SecretMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SecretMaterial").field(&"<redacted>").finish()
	}
}
impl Display for SecretMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn material_formatters_redact() {
		let material = SecretMaterial::new("hunter2");

		assert_eq!(format!("{material:?}"), "SecretMaterial(\"<redacted>\")");
		assert_eq!(format!("{material}"), "<redacted>");
		assert_eq!(material.expose(), "hunter2");
	}
}
