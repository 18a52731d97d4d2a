// crates.io
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{error::SigningError, secret::KeyMaterial, sign::PolicySigner};

type HmacSha256 = Hmac<Sha256>;

/// [`PolicySigner`] computing HMAC-SHA256 over the policy document.
#[derive(Clone, Copy, Debug, Default)]
pub struct HmacSha256Signer;
impl PolicySigner for HmacSha256Signer {
	fn sign(&self, key: &KeyMaterial, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
		if key.is_empty() {
			return Err(SigningError::InvalidKey { reason: "HMAC key must not be empty" });
		}

		let mut mac = HmacSha256::new_from_slice(key.expose_bytes())
			.map_err(|_| SigningError::InvalidKey { reason: "HMAC key length was rejected" })?;

		mac.update(payload);

		Ok(mac.finalize().into_bytes().to_vec())
	}
}
