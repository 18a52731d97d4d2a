// self
use crate::obs::{Operation, Outcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(op: Operation, cache: &str, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		let cache = cache.to_owned();

		match op {
			Operation::CacheGet => metrics::counter!(
				"signed_url_broker_cache_total",
				"cache" => cache,
				"outcome" => outcome.as_str()
			)
			.increment(1),
			Operation::Sign => metrics::counter!(
				"signed_url_broker_sign_total",
				"cache" => cache,
				"outcome" => outcome.as_str()
			)
			.increment(1),
		}
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, cache, outcome);
	}
}
