// self
use crate::_prelude::*;

/// Last successful refresh of a [`SecretCache`](crate::cache::SecretCache).
///
/// Only the lookup holding the cache's refresh guard may touch the entry, and it only writes on
/// success, so a failed refresh leaves the previous value and timestamp in place.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
	value: Option<V>,
	fetched_at: Option<OffsetDateTime>,
}
impl<V> CacheEntry<V> {
	pub(crate) fn empty() -> Self {
		Self { value: None, fetched_at: None }
	}

	/// Returns the value when it is younger than `ttl` at `now`.
	pub(crate) fn fresh(&self, now: OffsetDateTime, ttl: Duration) -> Option<&V> {
		let value = self.value.as_ref()?;
		let fetched_at = self.fetched_at?;

		(now - fetched_at < ttl).then_some(value)
	}

	/// Records a successful refresh that started at `fetched_at`.
	pub(crate) fn store(&mut self, value: V, fetched_at: OffsetDateTime) {
		self.value = Some(value);
		self.fetched_at = Some(fetched_at);
	}

	#[cfg(test)]
	pub(crate) fn value(&self) -> Option<&V> {
		self.value.as_ref()
	}

	#[cfg(test)]
	pub(crate) fn fetched_at(&self) -> Option<OffsetDateTime> {
		self.fetched_at
	}
}
