//! Optional observability helpers for cache lookups and URL signing.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `signed_url_broker.cache` (with `cache` and
//!   `stage` fields) and `signed_url_broker.sign` (with `cache` and `stage` fields).
//! - Enable `metrics` to increment `signed_url_broker_cache_total` for every cache lookup outcome
//!   and `signed_url_broker_sign_total` for every signing outcome, labeled by `cache` + `outcome`.
//!
//! Neither layer emits log events; failures are only counted and returned to the caller.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// [`SecretCache::get`](crate::cache::SecretCache::get) lookups.
	CacheGet,
	/// [`SigningPipeline::sign`](crate::pipeline::SigningPipeline::sign) calls.
	Sign,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::CacheGet => "cache_get",
			Operation::Sign => "sign",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Cached value served without contacting the secret store.
	Hit,
	/// Secret store was contacted and the refresh succeeded.
	Refresh,
	/// Non-cache operation completed successfully.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Secret store exceeded the configured fetch timeout.
	Timeout,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Hit => "hit",
			Outcome::Refresh => "refresh",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::Timeout => "timeout",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
