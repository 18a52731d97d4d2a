//! Redacted key material handed out by secret caches.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

/// Raw key material that keeps itself out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Vec<u8>);
impl KeyMaterial {
	const PEM_LINE_WIDTH: usize = 64;

	/// Wraps raw key bytes, e.g. the plaintext of a KMS decrypt.
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(bytes.into())
	}

	/// Wraps textual key material, e.g. a PEM document stored in a parameter store.
	pub fn from_string(value: impl Into<String>) -> Self {
		Self(value.into().into_bytes())
	}

	/// Returns the raw bytes. Callers must avoid logging them.
	pub fn expose_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Returns the material as UTF-8 text, if it is valid UTF-8.
	pub fn expose_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.0).ok()
	}

	/// Whether the material is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Wraps DER bytes into a PEM block with the given label (e.g. `PRIVATE KEY`).
	pub fn der_to_pem(&self, label: &str) -> Self {
		let encoded = STANDARD.encode(&self.0);
		let mut pem = format!("-----BEGIN {label}-----\n");

		for line in encoded.as_bytes().chunks(Self::PEM_LINE_WIDTH) {
			// Base64 output is ASCII, so every chunk is valid UTF-8.
			pem.push_str(&String::from_utf8_lossy(line));
			pem.push('\n');
		}

		pem.push_str(&format!("-----END {label}-----\n"));

		Self::from_string(pem)
	}
}
impl Debug for KeyMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("KeyMaterial").field(&"<redacted>").finish()
	}
}
impl Display for KeyMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
