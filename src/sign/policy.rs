// self
use crate::{_prelude::*, error::SigningError};

/// Fixed-shape policy binding one resource URL to an expiry.
///
/// Serializes to
/// `{"Statement":[{"Resource":"<url>","Condition":{"DateLessThan":{"AWS:EpochTime":<secs>}}}]}`,
/// byte for byte, which is what verifiers recompute before checking the signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CannedPolicy {
	statement: [Statement; 1],
}
impl CannedPolicy {
	/// Creates a policy for `resource` that expires at `expires_at` (whole seconds).
	pub fn new(resource: &Url, expires_at: OffsetDateTime) -> Self {
		Self {
			statement: [Statement {
				resource: resource.to_string(),
				condition: Condition {
					date_less_than: EpochTime { epoch_time: expires_at.unix_timestamp() },
				},
			}],
		}
	}

	/// Resource URL covered by the policy.
	pub fn resource(&self) -> &str {
		&self.statement[0].resource
	}

	/// Expiry as Unix seconds.
	pub fn expires_epoch(&self) -> i64 {
		self.statement[0].condition.date_less_than.epoch_time
	}

	/// Serializes the policy into the exact bytes that get signed.
	pub fn to_json(&self) -> Result<Vec<u8>, SigningError> {
		Ok(serde_json::to_vec(self)?)
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Statement {
	resource: String,
	condition: Condition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Condition {
	date_less_than: EpochTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct EpochTime {
	#[serde(rename = "AWS:EpochTime")]
	epoch_time: i64,
}
