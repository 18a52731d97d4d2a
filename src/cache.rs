//! Single-flight, TTL-bound value cache for expensive or rate-limited secrets.
//!
//! [`SecretCache::get`] serves the last fetched value while it is younger than the configured
//! TTL and otherwise runs exactly one refresh against the wrapped [`SecretFetcher`]. Every lookup
//! queues on a FIFO async mutex guarding the check-and-refresh step, so:
//!
//! - refreshes never overlap, even when the TTL lapses again while callers are queued;
//! - callers queued behind a successful refresh observe its value without fetching again;
//! - a failed refresh leaves the cached value untouched, is returned only to the caller whose
//!   step ran it, and the next step in the queue starts a fresh attempt;
//! - the refresh timestamp is taken when the refresh starts, so fetch latency never extends the
//!   value's lifetime.
//!
//! The cache never retries on its own and never logs. A hung fetcher stalls every queued caller
//! unless a bound is configured through [`SecretCache::with_fetch_timeout`].

mod entry;
mod metrics;

pub use metrics::CacheMetrics;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	cache::entry::CacheEntry,
	clock::{Clock, SystemClock},
	obs::{self, OpSpan, Operation, Outcome},
};

/// Boxed future returned by [`SecretFetcher::fetch`].
pub type FetchFuture<'a, V, E> = Pin<Box<dyn Future<Output = Result<V, E>> + 'a + Send>>;

/// Source of the value guarded by a [`SecretCache`], typically a secret-store client.
///
/// Implementations must tolerate being called again after a failure; the cache retries on the
/// next lookup. Closures returning a `'static` future implement this trait automatically.
pub trait SecretFetcher<V, E>
where
	Self: Send + Sync,
{
	/// Starts one fetch of the underlying value.
	fn fetch(&self) -> FetchFuture<'_, V, E>;
}
impl<F, Fut, V, E> SecretFetcher<V, E> for F
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<V, E>>,
{
	fn fetch(&self) -> FetchFuture<'_, V, E> {
		Box::pin(self())
	}
}

/// Failure returned by [`SecretCache::get`].
#[derive(Debug, ThisError)]
pub enum FetchError<E> {
	/// The fetcher failed; its error is forwarded verbatim.
	#[error("Secret fetch failed.")]
	Source(#[source] E),
	/// The fetcher did not resolve within the configured timeout.
	#[error("Secret fetch timed out after {timeout:?}.")]
	TimedOut {
		/// Timeout that elapsed.
		timeout: StdDuration,
	},
}
impl<E> FetchError<E> {
	/// Returns the fetcher's error, if this failure came from the fetcher.
	pub fn source_error(&self) -> Option<&E> {
		match self {
			Self::Source(e) => Some(e),
			Self::TimedOut { .. } => None,
		}
	}

	/// Consumes the failure, returning the fetcher's error if there is one.
	pub fn into_source(self) -> Option<E> {
		match self {
			Self::Source(e) => Some(e),
			Self::TimedOut { .. } => None,
		}
	}

	/// Whether the refresh was abandoned because of the fetch timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::TimedOut { .. })
	}
}

/// Observable refresh state of a cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
	/// No refresh is outstanding.
	Idle,
	/// Exactly one refresh is outstanding; other lookups are queued behind it.
	Refreshing,
}

/// Single-flight TTL memoizer around a [`SecretFetcher`].
///
/// Construct one per secret and share it (behind an [`Arc`]) with everything that needs the
/// secret; the fetcher, TTL, timeout, and clock are fixed once the cache is built.
pub struct SecretCache<V, E> {
	label: String,
	fetcher: Arc<dyn SecretFetcher<V, E>>,
	ttl: Duration,
	fetch_timeout: Option<StdDuration>,
	clock: Arc<dyn Clock>,
	entry: AsyncMutex<CacheEntry<V>>,
	refreshing: AtomicBool,
	metrics: CacheMetrics,
}
impl<V, E> SecretCache<V, E>
where
	V: Clone + Send,
{
	const DEFAULT_LABEL: &'static str = "secret";

	/// Creates a cache that keeps fetched values for `ttl`.
	///
	/// Negative TTLs are clamped to zero, which disables memoization but keeps refreshes
	/// serialized.
	pub fn new(fetcher: impl 'static + SecretFetcher<V, E>, ttl: Duration) -> Self {
		Self::from_shared(Arc::new(fetcher), ttl)
	}

	/// Creates a cache around an already shared fetcher.
	pub fn from_shared(fetcher: Arc<dyn SecretFetcher<V, E>>, ttl: Duration) -> Self {
		Self {
			label: Self::DEFAULT_LABEL.into(),
			fetcher,
			ttl: if ttl.is_negative() { Duration::ZERO } else { ttl },
			fetch_timeout: None,
			clock: Arc::new(SystemClock),
			entry: AsyncMutex::new(CacheEntry::empty()),
			refreshing: AtomicBool::new(false),
			metrics: Default::default(),
		}
	}

	/// Names the cache in spans, metrics, and pipeline errors.
	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = label.into();

		self
	}

	/// Abandons refreshes that take longer than `timeout`, reporting
	/// [`FetchError::TimedOut`] to the caller whose step ran the refresh.
	pub fn with_fetch_timeout(mut self, timeout: StdDuration) -> Self {
		self.fetch_timeout = Some(timeout);

		self
	}

	/// Replaces the wall clock used for TTL accounting.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Label used in spans, metrics, and errors.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Time-to-live applied to fetched values.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Fetch timeout, if one is configured.
	pub fn fetch_timeout(&self) -> Option<StdDuration> {
		self.fetch_timeout
	}

	/// Counters describing the cache's lookups so far.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Reports whether a refresh is currently outstanding.
	pub fn state(&self) -> CacheState {
		if self.refreshing.load(Ordering::Acquire) { CacheState::Refreshing } else { CacheState::Idle }
	}

	/// Returns the cached value, refreshing it first when it is absent or at least `ttl` old.
	///
	/// Lookups are served in arrival order. Dropping the returned future gives up the caller's
	/// place in the queue; if it was refreshing at the time, the refresh is abandoned and the
	/// cached state is left as it was.
	pub async fn get(&self) -> Result<V, FetchError<E>> {
		let span = OpSpan::new(Operation::CacheGet, &self.label, "get");

		span.instrument(self.get_serialized()).await
	}

	async fn get_serialized(&self) -> Result<V, FetchError<E>> {
		let mut entry = self.entry.lock().await;
		let initiated_at = self.clock.now();

		if let Some(value) = entry.fresh(initiated_at, self.ttl) {
			self.metrics.record_hit();
			obs::record_outcome(Operation::CacheGet, &self.label, Outcome::Hit);

			return Ok(value.clone());
		}

		let _refreshing = RefreshingFlag::raise(&self.refreshing);

		self.metrics.record_refresh();

		match self.fetch_bounded().await {
			Ok(value) => {
				entry.store(value.clone(), initiated_at);
				obs::record_outcome(Operation::CacheGet, &self.label, Outcome::Refresh);

				Ok(value)
			},
			Err(err) => {
				let outcome = if err.is_timeout() { Outcome::Timeout } else { Outcome::Failure };

				self.metrics.record_failure(err.is_timeout());
				obs::record_outcome(Operation::CacheGet, &self.label, outcome);

				Err(err)
			},
		}
	}

	async fn fetch_bounded(&self) -> Result<V, FetchError<E>> {
		let fetch = self.fetcher.fetch();

		match self.fetch_timeout {
			Some(timeout) => match tokio::time::timeout(timeout, fetch).await {
				Ok(result) => result.map_err(FetchError::Source),
				Err(_elapsed) => Err(FetchError::TimedOut { timeout }),
			},
			None => fetch.await.map_err(FetchError::Source),
		}
	}
}
impl<V, E> Debug for SecretCache<V, E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretCache")
			.field("label", &self.label)
			.field("ttl", &self.ttl)
			.field("fetch_timeout", &self.fetch_timeout)
			.field("refreshing", &self.refreshing.load(Ordering::Relaxed))
			.finish()
	}
}

/// Keeps [`CacheState::Refreshing`] visible for exactly as long as a refresh step is alive,
/// including when the step's future is dropped mid-fetch.
struct RefreshingFlag<'a>(&'a AtomicBool);
impl<'a> RefreshingFlag<'a> {
	fn raise(flag: &'a AtomicBool) -> Self {
		flag.store(true, Ordering::Release);

		Self(flag)
	}
}
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedError, ScriptedFetcher},
		clock::ManualClock,
	};

	type TestCache = SecretCache<&'static str, ScriptedError>;

	fn start() -> OffsetDateTime {
		macros::datetime!(2025-11-10 12:00 UTC)
	}

	fn scripted(
		script: impl IntoIterator<Item = Result<&'static str, ScriptedError>>,
	) -> Arc<ScriptedFetcher<&'static str, ScriptedError>> {
		Arc::new(ScriptedFetcher::new(script))
	}

	fn cache_with(
		fetcher: &Arc<ScriptedFetcher<&'static str, ScriptedError>>,
		ttl: Duration,
		clock: &ManualClock,
	) -> TestCache {
		let cache: TestCache = SecretCache::from_shared(fetcher.clone(), ttl);

		cache.with_clock(Arc::new(clock.clone()))
	}

	#[tokio::test]
	async fn ttl_scenario_serves_cached_then_refreshed_value() {
		let clock = ManualClock::new(start());
		let fetcher = scripted([Ok("v1"), Ok("v2")]);
		let cache = cache_with(&fetcher, Duration::milliseconds(15_000), &clock);

		assert_eq!(cache.get().await.expect("Initial fetch should succeed."), "v1");

		clock.advance(Duration::milliseconds(5_000));

		assert_eq!(cache.get().await.expect("Cached lookup should succeed."), "v1");

		clock.advance(Duration::milliseconds(15_000));

		assert_eq!(cache.get().await.expect("Refreshed lookup should succeed."), "v2");
		assert_eq!(fetcher.calls(), 2);
		assert_eq!(cache.metrics().hits(), 1);
		assert_eq!(cache.metrics().refreshes(), 2);
	}

	#[tokio::test]
	async fn value_expires_exactly_at_ttl() {
		let clock = ManualClock::new(start());
		let fetcher = scripted([Ok("v1"), Ok("v2")]);
		let cache = cache_with(&fetcher, Duration::seconds(15), &clock);

		cache.get().await.expect("Initial fetch should succeed.");
		clock.advance(Duration::seconds(15) - Duration::nanoseconds(1));

		assert_eq!(cache.get().await.expect("Lookup just before TTL should hit."), "v1");

		clock.advance(Duration::nanoseconds(1));

		assert_eq!(cache.get().await.expect("Lookup at TTL should refresh."), "v2");
		assert_eq!(fetcher.calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_timestamp_is_taken_when_refresh_starts() {
		let clock = ManualClock::new(start());
		let fetch_clock = clock.clone();
		let calls = Arc::new(AtomicUsize::new(0));
		let fetch_calls = calls.clone();
		let fetcher = move || {
			let n = fetch_calls.fetch_add(1, Ordering::SeqCst);

			// Fetch latency: the wall clock moves 10 seconds while the secret is in flight.
			fetch_clock.advance(Duration::seconds(10));

			async move { Ok::<_, ScriptedError>(n) }
		};
		let cache = SecretCache::new(fetcher, Duration::seconds(15))
			.with_clock(Arc::new(clock.clone()));

		assert_eq!(cache.get().await.expect("Initial fetch should succeed."), 0);

		// 16 seconds after the refresh started, only 6 after it completed.
		clock.advance(Duration::seconds(6));

		assert_eq!(cache.get().await.expect("Stale lookup should refresh."), 1);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_lookups_share_one_fetch() {
		let clock = ManualClock::new(start());
		let fetcher = Arc::new(
			ScriptedFetcher::new([Ok("v1")]).with_delay(StdDuration::from_millis(50)),
		);
		let cache = Arc::new(cache_with(&fetcher, Duration::seconds(15), &clock));
		let handles = (0..16)
			.map(|_| {
				let cache = cache.clone();

				tokio::spawn(async move { cache.get().await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			let value = handle
				.await
				.expect("Lookup task should not panic.")
				.expect("Lookup should observe the shared fetch.");

			assert_eq!(value, "v1");
		}

		assert_eq!(fetcher.calls(), 1);
		assert_eq!(cache.metrics().hits(), 15);
	}

	#[tokio::test(start_paused = true)]
	async fn back_to_back_stale_lookups_fetch_once() {
		let clock = ManualClock::new(start());
		let fetcher = Arc::new(
			ScriptedFetcher::new([Ok("v1"), Ok("v2")]).with_delay(StdDuration::from_millis(10)),
		);
		let cache = cache_with(&fetcher, Duration::seconds(15), &clock);

		cache.get().await.expect("Initial fetch should succeed.");
		clock.advance(Duration::seconds(30));

		let (first, second) = tokio::join!(cache.get(), cache.get());

		assert_eq!(first.expect("First stale lookup should refresh."), "v2");
		assert_eq!(second.expect("Second stale lookup should reuse the refresh."), "v2");
		assert_eq!(fetcher.calls(), 2);
	}

	#[tokio::test]
	async fn failure_is_not_cached() {
		let clock = ManualClock::new(start());
		let fetcher = scripted([Err(ScriptedError("throttled")), Ok("v1")]);
		let cache = cache_with(&fetcher, Duration::seconds(15), &clock);
		let err = cache.get().await.expect_err("First fetch should fail.");

		assert_eq!(err.source_error(), Some(&ScriptedError("throttled")));
		assert_eq!(cache.get().await.expect("Retry should succeed."), "v1");
		assert_eq!(fetcher.calls(), 2);
		assert_eq!(cache.metrics().failures(), 1);
	}

	#[test]
	fn fetch_error_reports_source_once() {
		let err = FetchError::Source(ScriptedError("throttled"));

		assert_eq!(err.to_string(), "Secret fetch failed.");
		assert_eq!(
			StdError::source(&err).map(ToString::to_string),
			Some("Scripted fetch failure: throttled.".to_owned())
		);
		assert!(StdError::source(&FetchError::<ScriptedError>::TimedOut {
			timeout: StdDuration::from_secs(1)
		})
		.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn queued_lookup_retries_after_failed_refresh() {
		let clock = ManualClock::new(start());
		let fetcher = Arc::new(
			ScriptedFetcher::new([Err(ScriptedError("unavailable")), Ok("v1")])
				.with_delay(StdDuration::from_millis(10)),
		);
		let cache = cache_with(&fetcher, Duration::seconds(15), &clock);
		let (first, second) = tokio::join!(cache.get(), cache.get());

		assert!(matches!(first, Err(FetchError::Source(ScriptedError("unavailable")))));
		assert_eq!(second.expect("Queued lookup should run its own refresh."), "v1");
		assert_eq!(fetcher.calls(), 2);
	}

	#[tokio::test]
	async fn failed_refresh_keeps_stale_value() {
		let clock = ManualClock::new(start());
		let fetcher = scripted([Ok("v1"), Err(ScriptedError("throttled")), Ok("v2")]);
		let cache = cache_with(&fetcher, Duration::seconds(15), &clock);

		cache.get().await.expect("Initial fetch should succeed.");
		clock.advance(Duration::seconds(20));
		cache.get().await.expect_err("Refresh should fail.");

		{
			let entry = cache.entry.lock().await;

			assert_eq!(entry.value(), Some(&"v1"));
			assert_eq!(entry.fetched_at(), Some(start()));
		}

		assert_eq!(cache.get().await.expect("Next refresh should succeed."), "v2");
		assert_eq!(fetcher.calls(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn timeout_is_reported_and_retried() {
		let calls = Arc::new(AtomicUsize::new(0));
		let fetch_calls = calls.clone();
		let fetcher = move || {
			let n = fetch_calls.fetch_add(1, Ordering::SeqCst);

			async move {
				if n == 0 {
					tokio::time::sleep(StdDuration::from_secs(60)).await;
				}

				Ok::<_, ScriptedError>("v1")
			}
		};
		let cache = SecretCache::new(fetcher, Duration::seconds(15))
			.with_fetch_timeout(StdDuration::from_secs(1));
		let err = cache.get().await.expect_err("Hung fetch should time out.");

		assert!(err.is_timeout());
		assert_eq!(cache.state(), CacheState::Idle);
		assert_eq!(cache.get().await.expect("Retry after timeout should succeed."), "v1");
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(cache.metrics().timeouts(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn cancelled_lookup_releases_the_queue() {
		let clock = ManualClock::new(start());
		let fetcher = Arc::new(
			ScriptedFetcher::new([Ok("slow"), Ok("v1")]).with_delay(StdDuration::from_secs(5)),
		);
		let cache = cache_with(&fetcher, Duration::seconds(15), &clock);
		let abandoned = tokio::time::timeout(StdDuration::from_secs(1), cache.get()).await;

		assert!(abandoned.is_err());
		assert_eq!(cache.state(), CacheState::Idle);
		assert!(cache.entry.lock().await.value().is_none());
		assert_eq!(cache.get().await.expect("Next lookup should refresh."), "v1");
		assert_eq!(fetcher.calls(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn state_tracks_outstanding_refresh() {
		let clock = ManualClock::new(start());
		let fetcher = Arc::new(
			ScriptedFetcher::new([Ok("v1")]).with_delay(StdDuration::from_millis(100)),
		);
		let cache = Arc::new(cache_with(&fetcher, Duration::seconds(15), &clock));

		assert_eq!(cache.state(), CacheState::Idle);

		let task = {
			let cache = cache.clone();

			tokio::spawn(async move { cache.get().await })
		};

		tokio::task::yield_now().await;

		assert_eq!(cache.state(), CacheState::Refreshing);

		task.await.expect("Lookup task should not panic.").expect("Lookup should succeed.");

		assert_eq!(cache.state(), CacheState::Idle);
	}

	#[test]
	fn negative_ttl_is_clamped() {
		let fetcher = scripted([]);
		let cache: TestCache = SecretCache::from_shared(fetcher, Duration::seconds(-5));

		assert_eq!(cache.ttl(), Duration::ZERO);
		assert_eq!(cache.label(), "secret");
	}
}
