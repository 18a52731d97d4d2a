//! Single-flight secret caching and window-quantized URL signing: fetch rate-limited key material
//! once, then sign cache-friendly expiring URLs for every request that needs one.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod obs;
pub mod pipeline;
pub mod secret;
pub mod sign;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::cache::{FetchFuture, SecretFetcher};

	/// Fetcher that replays a fixed script of outcomes and counts how often it was invoked.
	pub struct ScriptedFetcher<V, E> {
		script: Mutex<VecDeque<Result<V, E>>>,
		calls: AtomicUsize,
		delay: Option<StdDuration>,
	}
	impl<V, E> ScriptedFetcher<V, E> {
		/// Creates a fetcher that yields `script` in order, one outcome per invocation.
		pub fn new(script: impl IntoIterator<Item = Result<V, E>>) -> Self {
			Self {
				script: Mutex::new(script.into_iter().collect()),
				calls: AtomicUsize::new(0),
				delay: None,
			}
		}

		/// Makes every invocation sleep on the tokio timer before resolving.
		pub fn with_delay(mut self, delay: StdDuration) -> Self {
			self.delay = Some(delay);

			self
		}

		/// Number of times the underlying fetch has been started.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl<V, E> SecretFetcher<V, E> for ScriptedFetcher<V, E>
	where
		V: Send,
		E: Send,
	{
		fn fetch(&self) -> FetchFuture<'_, V, E> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let next = self.script.lock().pop_front();
			let delay = self.delay;

			Box::pin(async move {
				if let Some(delay) = delay {
					tokio::time::sleep(delay).await;
				}

				next.expect("Scripted fetcher ran out of responses.")
			})
		}
	}
	impl<V, E> Debug for ScriptedFetcher<V, E> {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("ScriptedFetcher").field("calls", &self.calls()).finish()
		}
	}

	/// Error type used by scripted fetchers in tests.
	#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
	#[error("Scripted fetch failure: {0}.")]
	pub struct ScriptedError(pub &'static str);
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio::sync::Mutex as AsyncMutex;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use time;
pub use url;
#[cfg(test)] use color_eyre as _;
