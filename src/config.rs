//! Signing configuration: builder, serde-friendly settings, and environment loading.

// self
use crate::{_prelude::*, error::ConfigError, expiry::ExpiryWindow};

/// Validated configuration for a [`SigningPipeline`](crate::pipeline::SigningPipeline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerConfig {
	/// Host name of the distribution serving protected resources.
	pub distribution_domain: String,
	/// Identifier of the key pair whose private half signs the policies.
	pub key_pair_id: String,
	/// First path segment of protected resources, without slashes.
	pub protected_prefix: String,
	/// Expiry quantization applied to every signed URL.
	pub expiry: ExpiryWindow,
	/// How long fetched key material is reused before it is fetched again.
	pub secret_ttl: Duration,
	/// Upper bound on a single secret fetch, if any.
	pub fetch_timeout: Option<StdDuration>,
}
impl SignerConfig {
	/// Default protected prefix.
	pub const DEFAULT_PROTECTED_PREFIX: &'static str = "protected";
	/// Default secret TTL (15 seconds).
	pub const DEFAULT_SECRET_TTL: Duration = Duration::seconds(15);

	/// Starts a builder with default prefix, expiry window, and TTL.
	pub fn builder() -> SignerConfigBuilder {
		SignerConfigBuilder::default()
	}

	/// Builds a configuration from deserialized settings.
	pub fn from_settings(settings: SignerSettings) -> Result<Self, ConfigError> {
		let mut builder = Self::builder();

		if let Some(domain) = settings.distribution_domain {
			builder = builder.distribution_domain(domain);
		}
		if let Some(key_pair_id) = settings.key_pair_id {
			builder = builder.key_pair_id(key_pair_id);
		}
		if let Some(prefix) = settings.protected_prefix {
			builder = builder.protected_prefix(prefix);
		}

		let window = settings
			.expiry_window_secs
			.map_or(ExpiryWindow::DEFAULT_WINDOW, |secs| Duration::seconds(i64::from(secs)));
		let lead = settings
			.expiry_lead_secs
			.map_or(ExpiryWindow::DEFAULT_LEAD, |secs| Duration::seconds(i64::from(secs)));

		builder = builder.expiry(ExpiryWindow::new(window, lead)?);

		if let Some(secs) = settings.secret_ttl_secs {
			builder = builder.secret_ttl(Duration::seconds(i64::from(secs)));
		}
		if let Some(ms) = settings.fetch_timeout_ms {
			builder = builder.fetch_timeout(StdDuration::from_millis(ms));
		}

		builder.build()
	}

	/// Loads the configuration from process environment variables.
	///
	/// See [`SignerSettings::from_env_with`] for the variable names.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_settings(SignerSettings::from_env_with(|var| std::env::var(var).ok())?)
	}
}

/// Raw, deserializable configuration values.
///
/// Durations are plain integers so the struct can be embedded in any host configuration format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignerSettings {
	/// Host name of the distribution.
	pub distribution_domain: Option<String>,
	/// Key pair identifier.
	pub key_pair_id: Option<String>,
	/// Protected path prefix.
	pub protected_prefix: Option<String>,
	/// Secret TTL in seconds.
	pub secret_ttl_secs: Option<u32>,
	/// Quantization window in seconds.
	pub expiry_window_secs: Option<u32>,
	/// Expiry lead in seconds.
	pub expiry_lead_secs: Option<u32>,
	/// Secret fetch timeout in milliseconds.
	pub fetch_timeout_ms: Option<u64>,
}
impl SignerSettings {
	/// Reads settings through `lookup`, which maps a variable name to its value.
	///
	/// Recognized variables: `DISTRIBUTION_DOMAIN`, `KEYPAIR_ID`, `PROTECTED_PREFIX`,
	/// `SECRET_TTL_SECS`, `EXPIRY_WINDOW_SECS`, `EXPIRY_LEAD_SECS`, and `FETCH_TIMEOUT_MS`.
	pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		Ok(Self {
			distribution_domain: lookup("DISTRIBUTION_DOMAIN"),
			key_pair_id: lookup("KEYPAIR_ID"),
			protected_prefix: lookup("PROTECTED_PREFIX"),
			secret_ttl_secs: parse_var(&lookup, "SECRET_TTL_SECS")?,
			expiry_window_secs: parse_var(&lookup, "EXPIRY_WINDOW_SECS")?,
			expiry_lead_secs: parse_var(&lookup, "EXPIRY_LEAD_SECS")?,
			fetch_timeout_ms: parse_var(&lookup, "FETCH_TIMEOUT_MS")?,
		})
	}
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: std::str::FromStr,
{
	match lookup(var) {
		Some(value) => value
			.trim()
			.parse()
			.map(Some)
			.map_err(|_| ConfigError::InvalidEnv { var, value }),
		None => Ok(None),
	}
}

/// Builder for [`SignerConfig`] values.
#[derive(Debug)]
pub struct SignerConfigBuilder {
	/// Host name of the distribution.
	pub distribution_domain: Option<String>,
	/// Key pair identifier.
	pub key_pair_id: Option<String>,
	/// Protected path prefix.
	pub protected_prefix: String,
	/// Expiry quantization.
	pub expiry: ExpiryWindow,
	/// Secret TTL.
	pub secret_ttl: Duration,
	/// Optional secret fetch timeout.
	pub fetch_timeout: Option<StdDuration>,
}
impl SignerConfigBuilder {
	/// Sets the distribution host name.
	pub fn distribution_domain(mut self, domain: impl Into<String>) -> Self {
		self.distribution_domain = Some(domain.into());

		self
	}

	/// Sets the key pair identifier.
	pub fn key_pair_id(mut self, id: impl Into<String>) -> Self {
		self.key_pair_id = Some(id.into());

		self
	}

	/// Overrides the protected prefix; surrounding slashes are ignored.
	pub fn protected_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.protected_prefix = prefix.into();

		self
	}

	/// Overrides the expiry quantization.
	pub fn expiry(mut self, expiry: ExpiryWindow) -> Self {
		self.expiry = expiry;

		self
	}

	/// Overrides the secret TTL.
	pub fn secret_ttl(mut self, ttl: Duration) -> Self {
		self.secret_ttl = ttl;

		self
	}

	/// Bounds every secret fetch by `timeout`.
	pub fn fetch_timeout(mut self, timeout: StdDuration) -> Self {
		self.fetch_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SignerConfig, ConfigError> {
		let distribution_domain = self
			.distribution_domain
			.map(|domain| domain.trim().to_owned())
			.filter(|domain| !domain.is_empty())
			.ok_or(ConfigError::MissingDistributionDomain)?;
		let key_pair_id = self
			.key_pair_id
			.map(|id| id.trim().to_owned())
			.filter(|id| !id.is_empty())
			.ok_or(ConfigError::MissingKeyPairId)?;
		let protected_prefix = self.protected_prefix.trim_matches('/').to_owned();

		validate_domain(&distribution_domain)?;
		validate_prefix(&protected_prefix)?;

		if self.secret_ttl.is_negative() {
			return Err(ConfigError::NegativeTtl { ttl: self.secret_ttl });
		}

		Ok(SignerConfig {
			distribution_domain,
			key_pair_id,
			protected_prefix,
			expiry: self.expiry,
			secret_ttl: self.secret_ttl,
			fetch_timeout: self.fetch_timeout,
		})
	}
}
impl Default for SignerConfigBuilder {
	fn default() -> Self {
		Self {
			distribution_domain: None,
			key_pair_id: None,
			protected_prefix: SignerConfig::DEFAULT_PROTECTED_PREFIX.into(),
			expiry: ExpiryWindow::default(),
			secret_ttl: SignerConfig::DEFAULT_SECRET_TTL,
			fetch_timeout: None,
		}
	}
}

fn validate_domain(domain: &str) -> Result<(), ConfigError> {
	let invalid = || ConfigError::InvalidDistributionDomain { domain: domain.to_owned() };

	if domain.contains(['/', '?', '#', '@']) {
		return Err(invalid());
	}

	let url = Url::parse(&format!("https://{domain}/")).map_err(|_| invalid())?;

	if url.host_str().is_none() {
		return Err(invalid());
	}

	Ok(())
}

fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
	if prefix.is_empty() || prefix.contains(['/', '?', '#']) {
		Err(ConfigError::InvalidProtectedPrefix { prefix: prefix.to_owned() })
	} else {
		Ok(())
	}
}
