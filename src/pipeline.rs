//! Composition root that turns a resource path into a signed, window-quantized URL.
//!
//! A [`SigningPipeline`] owns nothing global: the secret cache, signer, and clock are handed in
//! by whoever assembles the request handler, typically once per process. Each call to
//! [`SigningPipeline::sign`]:
//!
//! 1. quantizes the current time into an expiry via the configured [`ExpiryWindow`];
//! 2. obtains key material through the shared [`SecretCache`], which only contacts the secret
//!    store when its TTL has lapsed;
//! 3. serializes a [`CannedPolicy`] for the resource and signs it;
//! 4. appends `Expires`, `Signature`, and `Key-Pair-Id` to the resource URL.
//!
//! [`ExpiryWindow`]: crate::expiry::ExpiryWindow

// self
use crate::{
	_prelude::*,
	cache::{FetchError, SecretCache, SecretFetcher},
	clock::{Clock, SystemClock},
	config::SignerConfig,
	obs::{self, OpSpan, Operation, Outcome},
	secret::KeyMaterial,
	sign::{CannedPolicy, PolicySigner, SignedUrl},
};

/// Signs URLs for protected resources using cached key material.
pub struct SigningPipeline<E> {
	config: SignerConfig,
	secrets: Arc<SecretCache<KeyMaterial, E>>,
	signer: Arc<dyn PolicySigner>,
	clock: Arc<dyn Clock>,
}
impl<E> SigningPipeline<E>
where
	E: 'static + Send + Sync + StdError,
{
	/// Creates a pipeline over an existing secret cache and signer.
	pub fn new(
		config: SignerConfig,
		secrets: Arc<SecretCache<KeyMaterial, E>>,
		signer: Arc<dyn PolicySigner>,
	) -> Self {
		Self { config, secrets, signer, clock: Arc::new(SystemClock) }
	}

	/// Builds the secret cache from the configuration's TTL and fetch timeout, then wraps it.
	pub fn with_fetcher(
		config: SignerConfig,
		fetcher: impl 'static + SecretFetcher<KeyMaterial, E>,
		signer: Arc<dyn PolicySigner>,
	) -> Self {
		let mut cache =
			SecretCache::new(fetcher, config.secret_ttl).with_label(config.key_pair_id.clone());

		if let Some(timeout) = config.fetch_timeout {
			cache = cache.with_fetch_timeout(timeout);
		}

		Self::new(config, Arc::new(cache), signer)
	}

	/// Replaces the wall clock used for expiry quantization.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Configuration the pipeline was built with.
	pub fn config(&self) -> &SignerConfig {
		&self.config
	}

	/// Secret cache shared by this pipeline.
	pub fn secrets(&self) -> &Arc<SecretCache<KeyMaterial, E>> {
		&self.secrets
	}

	/// Whether a request for `path` should be answered with a signed URL.
	///
	/// Paths already under the protected prefix (`protected/...` or `/protected/...`) are served
	/// by the distribution itself and need no new URL.
	pub fn requires_signed_url(&self, path: &str) -> bool {
		let path = path.strip_prefix('/').unwrap_or(path);

		!path
			.strip_prefix(self.config.protected_prefix.as_str())
			.is_some_and(|rest| rest.starts_with('/'))
	}

	/// Absolute URL of `path` below the protected prefix on the distribution.
	///
	/// Dot segments (`.`, `..`, and their percent-encoded forms) are rejected outright, and the
	/// parsed URL must still live below the prefix; otherwise the call fails with
	/// [`Error::InvalidResource`].
	pub fn protected_url(&self, path: &str) -> Result<Url> {
		let relative = path.trim_start_matches('/');
		let rejected = |reason, source| Error::InvalidResource {
			path: path.to_owned(),
			reason,
			source,
		};

		if relative.split(['/', '\\']).any(is_dot_segment) {
			return Err(rejected("path contains dot segments", None));
		}

		let base = Url::parse(&format!(
			"https://{}/{}/",
			self.config.distribution_domain, self.config.protected_prefix
		))
		.map_err(|e| rejected("distribution URL is malformed", Some(e)))?;
		let url = Url::parse(&format!("{base}{relative}"))
			.map_err(|e| rejected("path is not a valid URL", Some(e)))?;

		if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
			return Err(rejected("path escapes the protected prefix", None));
		}

		Ok(url)
	}

	/// Signs `path` (relative to the protected prefix) with a quantized expiry.
	pub async fn sign(&self, path: &str) -> Result<SignedUrl> {
		let span = OpSpan::new(Operation::Sign, self.secrets.label(), "sign");
		let result = span.instrument(self.sign_inner(path)).await;
		let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };

		obs::record_outcome(Operation::Sign, self.secrets.label(), outcome);

		result
	}

	async fn sign_inner(&self, path: &str) -> Result<SignedUrl> {
		let resource = self.protected_url(path)?;
		let expires_at = self.config.expiry.expires_from(self.clock.as_ref())?;
		let key = self.secrets.get().await.map_err(|err| self.secret_error(err))?;
		let policy = CannedPolicy::new(&resource, expires_at).to_json()?;
		let signature = self.signer.sign(&key, &policy)?;

		Ok(SignedUrl::assemble(&resource, expires_at, &signature, &self.config.key_pair_id))
	}

	fn secret_error(&self, err: FetchError<E>) -> Error {
		let cache = self.secrets.label().to_owned();

		match err {
			FetchError::Source(source) => Error::Secret { cache, source: Box::new(source) },
			FetchError::TimedOut { timeout } => Error::SecretTimeout { cache, timeout },
		}
	}
}

impl<E> Debug for SigningPipeline<E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningPipeline")
			.field("config", &self.config)
			.field("secrets", &self.secrets)
			.finish()
	}
}

fn is_dot_segment(segment: &str) -> bool {
	matches!(segment.to_ascii_lowercase().replace("%2e", ".").as_str(), "." | "..")
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedError, ScriptedFetcher},
		clock::ManualClock,
		sign::HmacSha256Signer,
	};

	fn config() -> SignerConfig {
		SignerConfig::builder()
			.distribution_domain("d111111abcdef8.cloudfront.net")
			.key_pair_id("K2JCJMDEHXQW5F")
			.build()
			.expect("Pipeline config fixture should build.")
	}

	fn pipeline(
		script: impl IntoIterator<Item = Result<KeyMaterial, ScriptedError>>,
	) -> (SigningPipeline<ScriptedError>, Arc<ScriptedFetcher<KeyMaterial, ScriptedError>>) {
		let fetcher = Arc::new(ScriptedFetcher::new(script));
		let cache: SecretCache<KeyMaterial, ScriptedError> =
			SecretCache::from_shared(fetcher.clone(), Duration::seconds(15));
		let pipeline = SigningPipeline::new(config(), Arc::new(cache), Arc::new(HmacSha256Signer))
			.with_clock(Arc::new(ManualClock::new(macros::datetime!(2025-11-10 12:03 UTC))));

		(pipeline, fetcher)
	}

	#[test]
	fn protected_paths_do_not_need_new_urls() {
		let (pipeline, _) = pipeline([]);

		assert!(!pipeline.requires_signed_url("/protected/path"));
		assert!(!pipeline.requires_signed_url("protected/a/b"));
		assert!(pipeline.requires_signed_url("/"));
		assert!(pipeline.requires_signed_url("/protectedness/path"));
		assert!(pipeline.requires_signed_url("//protected/path"));
		assert!(pipeline.requires_signed_url("/protected"));
	}

	#[test]
	fn protected_url_joins_domain_prefix_and_path() {
		let (pipeline, _) = pipeline([]);
		let url = pipeline.protected_url("/path").expect("Protected URL should parse.");

		assert_eq!(url.as_str(), "https://d111111abcdef8.cloudfront.net/protected/path");
	}

	#[test]
	fn protected_url_rejects_paths_leaving_the_prefix() {
		let (pipeline, _) = pipeline([]);

		for path in ["../admin", "a/../../x", "/%2e%2E/admin", "a/.%2e/.%2E/x", "..\\admin", "./x"] {
			let err = pipeline.protected_url(path).expect_err("Dot segments should be rejected.");

			assert!(
				matches!(
					err,
					Error::InvalidResource { path: ref rejected, source: None, .. } if rejected == path
				),
				"unexpected error for {path}: {err:?}"
			);
		}

		let url = pipeline.protected_url("a:b/..c/file..txt").expect("Dotted names should pass.");

		assert_eq!(url.path(), "/protected/a:b/..c/file..txt");
	}

	#[tokio::test]
	async fn escaping_path_is_never_signed() {
		let (pipeline, fetcher) = pipeline([Ok(KeyMaterial::from_string("Jefe"))]);
		let err = pipeline
			.sign("../admin/secret")
			.await
			.expect_err("Paths outside the prefix should not be signed.");

		assert!(matches!(err, Error::InvalidResource { .. }));
		assert_eq!(fetcher.calls(), 0);
	}

	#[tokio::test]
	async fn sign_uses_quantized_expiry_and_cached_key() {
		let (pipeline, fetcher) = pipeline([Ok(KeyMaterial::from_string("Jefe"))]);
		let first = pipeline.sign("path").await.expect("First signature should succeed.");
		let second = pipeline.sign("path").await.expect("Second signature should succeed.");

		assert_eq!(first, second);
		assert_eq!(first.expires_at(), macros::datetime!(2025-11-10 12:15 UTC));
		assert_eq!(fetcher.calls(), 1);

		let query = first.url().query().expect("Signed URL should carry a query.");

		assert!(query.starts_with("Expires=1762776900&Signature="));
		assert!(query.ends_with("&Key-Pair-Id=K2JCJMDEHXQW5F"));
	}

	#[tokio::test]
	async fn fetch_failure_surfaces_as_secret_error() {
		let (pipeline, _) = pipeline([Err(ScriptedError("kms unavailable"))]);
		let err = pipeline.sign("path").await.expect_err("Signing should fail without a key.");

		assert!(matches!(err, Error::Secret { ref cache, .. } if cache == "secret"));
		assert!(
			StdError::source(&err)
				.is_some_and(|source| source.to_string().contains("kms unavailable"))
		);
	}
}
