//! Expiration-window quantizer.
//!
//! Signed URLs embed their expiry, so two URLs for the same resource are only byte-identical
//! (and therefore shareable by edge caches) when they carry the same expiry. Rounding "now" down
//! to a fixed window and adding a lead time yields an expiry that stays constant for the whole
//! window: with a 5-minute window and a 15-minute lead every URL issued between `12:00:00` and
//! `12:04:59.999` expires at `12:15:00`, i.e. 10 to 15 minutes after it was issued.

// self
use crate::{_prelude::*, clock::Clock, error::ConfigError};

/// Computes `floor(now / window) * window + lead` on Unix millisecond timestamps.
///
/// Flooring uses Euclidean division so instants before the epoch round towards the past as well.
/// Fails only for non-positive windows or when the result overflows `i64`.
pub fn quantized_expiry(
	now_millis: i64,
	window_millis: i64,
	lead_millis: i64,
) -> Result<i64, ConfigError> {
	if window_millis <= 0 {
		return Err(ConfigError::InvalidWindow { window: Duration::milliseconds(window_millis) });
	}

	now_millis
		.div_euclid(window_millis)
		.checked_mul(window_millis)
		.and_then(|floor| floor.checked_add(lead_millis))
		.ok_or(ConfigError::ExpiryOutOfRange)
}

/// Validated window/lead pair used to derive URL expiries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryWindow {
	window: Duration,
	lead: Duration,
}
impl ExpiryWindow {
	/// Default quantization window (5 minutes).
	pub const DEFAULT_WINDOW: Duration = Duration::minutes(5);
	/// Default lead time (15 minutes).
	pub const DEFAULT_LEAD: Duration = Duration::minutes(15);

	/// Creates a window, rejecting non-positive windows and leads shorter than the window.
	///
	/// A lead at least as long as the window guarantees that every computed expiry lies strictly
	/// in the future of the instant it was computed for.
	pub fn new(window: Duration, lead: Duration) -> Result<Self, ConfigError> {
		if !window.is_positive() {
			return Err(ConfigError::InvalidWindow { window });
		}
		if lead < window {
			return Err(ConfigError::LeadShorterThanWindow { window, lead });
		}

		Ok(Self { window, lead })
	}

	/// Quantization window.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Lead added on top of the window boundary.
	pub fn lead(&self) -> Duration {
		self.lead
	}

	/// Returns the quantized expiry for `now`, in UTC.
	pub fn expires_at(&self, now: OffsetDateTime) -> Result<OffsetDateTime, ConfigError> {
		let now = now.unix_timestamp_nanos();
		let window = self.window.whole_nanoseconds();
		let expiry = now
			.div_euclid(window)
			.checked_mul(window)
			.and_then(|floor| floor.checked_add(self.lead.whole_nanoseconds()))
			.ok_or(ConfigError::ExpiryOutOfRange)?;

		OffsetDateTime::from_unix_timestamp_nanos(expiry)
			.map_err(|_| ConfigError::ExpiryOutOfRange)
	}

	/// Returns the quantized expiry for the clock's current instant.
	pub fn expires_from(&self, clock: &dyn Clock) -> Result<OffsetDateTime, ConfigError> {
		self.expires_at(clock.now())
	}
}
impl Default for ExpiryWindow {
	fn default() -> Self {
		Self { window: Self::DEFAULT_WINDOW, lead: Self::DEFAULT_LEAD }
	}
}
