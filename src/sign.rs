//! Signed URL assembly: canned policy documents, the signature seam, and URL encoding.

mod mac;
mod policy;
mod rsa_sha1;

pub use mac::HmacSha256Signer;
pub use policy::CannedPolicy;
pub use rsa_sha1::RsaSha1Signer;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{_prelude::*, error::SigningError, secret::KeyMaterial};

/// Produces a signature over a policy document.
///
/// [`RsaSha1Signer`] yields signatures CloudFront verifies against the key pair's public half;
/// [`HmacSha256Signer`] suits verifiers that share the secret.
///
/// Signers are pure: the same key and payload always yield the same signature, and they never
/// perform I/O. Key retrieval is the caller's job (usually through a
/// [`SecretCache`](crate::cache::SecretCache)).
pub trait PolicySigner
where
	Self: Send + Sync,
{
	/// Signs `payload` with `key`.
	fn sign(&self, key: &KeyMaterial, payload: &[u8]) -> Result<Vec<u8>, SigningError>;
}

/// Base64-encodes a signature using the signed-URL alphabet (`+`→`-`, `=`→`_`, `/`→`~`).
pub fn encode_signature(signature: &[u8]) -> String {
	STANDARD
		.encode(signature)
		.chars()
		.map(|c| match c {
			'+' => '-',
			'=' => '_',
			'/' => '~',
			c => c,
		})
		.collect()
}

/// URL carrying an expiry, signature, and key pair identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedUrl {
	url: Url,
	expires_at: OffsetDateTime,
}
impl SignedUrl {
	/// Appends `Expires`, `Signature`, and `Key-Pair-Id` to `resource`.
	pub fn assemble(
		resource: &Url,
		expires_at: OffsetDateTime,
		signature: &[u8],
		key_pair_id: &str,
	) -> Self {
		let mut url = resource.clone();
		// Form encoding would escape `~`, so the query is composed verbatim.
		let signed = format!(
			"Expires={}&Signature={}&Key-Pair-Id={key_pair_id}",
			expires_at.unix_timestamp(),
			encode_signature(signature),
		);
		let query = match resource.query() {
			Some(existing) if !existing.is_empty() => format!("{existing}&{signed}"),
			_ => signed,
		};

		url.set_query(Some(&query));

		Self { url, expires_at }
	}

	/// The signed URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// The signed URL as a string.
	pub fn as_str(&self) -> &str {
		self.url.as_str()
	}

	/// Instant after which the URL stops being honored.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Consumes the wrapper, returning the URL.
	pub fn into_url(self) -> Url {
		self.url
	}
}
impl Display for SignedUrl {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
