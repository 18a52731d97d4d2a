//! Crate-level error types shared by the cache, signer, configuration, and pipeline.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by the signing pipeline.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Policy document could not be signed.
	#[error(transparent)]
	Signing(#[from] SigningError),

	/// Secret store reported a failure while refreshing cached key material.
	#[error("Secret material for cache `{cache}` could not be fetched.")]
	Secret {
		/// Label of the cache whose refresh failed.
		cache: String,
		/// Opaque failure reported by the secret store.
		#[source]
		source: BoxError,
	},
	/// Secret store did not answer within the cache's fetch timeout.
	#[error("Secret fetch for cache `{cache}` timed out after {timeout:?}.")]
	SecretTimeout {
		/// Label of the cache whose refresh timed out.
		cache: String,
		/// Configured fetch timeout.
		timeout: StdDuration,
	},
	/// Requested resource path cannot be signed below the protected prefix.
	#[error("Resource path `{path}` cannot be signed: {reason}.")]
	InvalidResource {
		/// Offending path.
		path: String,
		/// Why the path was rejected.
		reason: &'static str,
		/// Underlying parsing failure, if the URL did not parse.
		#[source]
		source: Option<url::ParseError>,
	},
}

/// Configuration and validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Distribution domain is required to build resource URLs.
	#[error("Missing distribution domain.")]
	MissingDistributionDomain,
	/// Key pair identifier is required in every signed URL.
	#[error("Missing key pair identifier.")]
	MissingKeyPairId,
	/// Distribution domain must be a bare host name.
	#[error("Distribution domain `{domain}` is not a valid host.")]
	InvalidDistributionDomain {
		/// Domain that failed validation.
		domain: String,
	},
	/// Protected prefix must be a single non-empty path segment.
	#[error("Protected prefix `{prefix}` must be a single non-empty path segment.")]
	InvalidProtectedPrefix {
		/// Prefix that failed validation.
		prefix: String,
	},
	/// Quantization windows must be strictly positive.
	#[error("Expiry window must be positive, got {window}.")]
	InvalidWindow {
		/// Window that failed validation.
		window: Duration,
	},
	/// Lead time shorter than the window could yield expiries in the past.
	#[error("Expiry lead {lead} must be at least as long as the window {window}.")]
	LeadShorterThanWindow {
		/// Configured window.
		window: Duration,
		/// Configured lead.
		lead: Duration,
	},
	/// Secret cache TTL cannot be negative.
	#[error("Secret cache TTL must not be negative, got {ttl}.")]
	NegativeTtl {
		/// TTL that failed validation.
		ttl: Duration,
	},
	/// Quantized expiry falls outside the representable time range.
	#[error("Quantized expiry falls outside the supported time range.")]
	ExpiryOutOfRange,
	/// Environment variable is present but cannot be parsed.
	#[error("Environment variable `{var}` has an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		var: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
}

/// Failures raised while producing a policy signature.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// Key material cannot be used by the signer.
	#[error("Key material is unusable: {reason}.")]
	InvalidKey {
		/// Signer-supplied reason string.
		reason: &'static str,
	},
	/// Policy document could not be serialized.
	#[error("Policy document could not be serialized.")]
	Policy(#[from] serde_json::Error),
	/// RSA backend refused to produce a signature.
	#[error("RSA signing failed.")]
	Rsa(#[from] rsa::signature::Error),
}
