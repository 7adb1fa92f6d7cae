//! Runtime configuration for a [`Link`](crate::flows::Link).
//!
//! Configuration is plain data: callers either build it with the `with_*` setters or decode a
//! JSON document with [`LinkConfig::from_json_str`], which reports the path of the first invalid
//! field.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError, model::TokenScope, poll::BackoffPolicy};

/// Polling schedule used by status pollers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
	/// How the interval grows between polls.
	pub backoff: BackoffPolicy,
	/// Delay before the first poll.
	#[serde(rename = "initial_interval_ms", with = "millis")]
	pub initial_interval: StdDuration,
	/// Upper bound for the interval, if any.
	#[serde(rename = "max_interval_ms", with = "millis::option")]
	pub max_interval: Option<StdDuration>,
}
impl PollingConfig {
	/// Default delay before the first poll.
	pub const DEFAULT_INITIAL_INTERVAL: StdDuration = StdDuration::from_secs(1);

	/// Overrides the backoff policy.
	pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;

		self
	}

	/// Overrides the initial interval.
	pub fn with_initial_interval(mut self, interval: StdDuration) -> Self {
		self.initial_interval = interval;

		self
	}

	/// Caps the interval growth.
	pub fn with_max_interval(mut self, interval: StdDuration) -> Self {
		self.max_interval = Some(interval);

		self
	}

	/// Rejects schedules that would poll in a tight loop.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.initial_interval.is_zero() || self.max_interval.is_some_and(|max| max.is_zero()) {
			return Err(ConfigError::NonPositiveInterval);
		}

		Ok(())
	}
}
impl Default for PollingConfig {
	fn default() -> Self {
		Self {
			backoff: BackoffPolicy::default(),
			initial_interval: Self::DEFAULT_INITIAL_INTERVAL,
			max_interval: None,
		}
	}
}

/// Top-level configuration consumed by [`Link::new`](crate::flows::Link::new).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
	/// Market + locale the anonymous user is created for.
	pub scope: TokenScope,
	/// Credential polling schedule.
	#[serde(default)]
	pub polling: PollingConfig,
	/// How many times a rejected token is re-acquired before the error surfaces.
	#[serde(default = "LinkConfig::default_max_auth_retries")]
	pub max_auth_retries: u8,
}
impl LinkConfig {
	const DEFAULT_MAX_AUTH_RETRIES: u8 = 1;

	/// Creates a configuration with default polling and a single authentication retry.
	pub fn new(scope: TokenScope) -> Self {
		Self {
			scope,
			polling: PollingConfig::default(),
			max_auth_retries: Self::DEFAULT_MAX_AUTH_RETRIES,
		}
	}

	/// Decodes and validates a JSON configuration document.
	pub fn from_json_str(document: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(document);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(ConfigError::from)?;

		config.validate()?;

		Ok(config)
	}

	/// Overrides the polling schedule.
	pub fn with_polling(mut self, polling: PollingConfig) -> Self {
		self.polling = polling;

		self
	}

	/// Overrides the authentication retry bound.
	pub fn with_max_auth_retries(mut self, retries: u8) -> Self {
		self.max_auth_retries = retries;

		self
	}

	/// Validates nested sections.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.polling.validate()
	}

	fn default_max_auth_retries() -> u8 {
		Self::DEFAULT_MAX_AUTH_RETRIES
	}
}

mod millis {
	// std
	use std::time::Duration as StdDuration;
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub(super) fn serialize<S>(value: &StdDuration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(StdDuration::from_millis)
	}

	pub(super) mod option {
		// std
		use std::time::Duration as StdDuration;
		// crates.io
		use serde::{Deserialize, Deserializer, Serializer};

		pub(in crate::config) fn serialize<S>(
			value: &Option<StdDuration>,
			serializer: S,
		) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			match value {
				Some(value) => super::serialize(value, serializer),
				None => serializer.serialize_none(),
			}
		}

		pub(in crate::config) fn deserialize<'de, D>(
			deserializer: D,
		) -> Result<Option<StdDuration>, D::Error>
		where
			D: Deserializer<'de>,
		{
			Ok(Option::<u64>::deserialize(deserializer)?.map(StdDuration::from_millis))
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::test_scope;

	#[test]
	fn documents_decode_with_defaults() {
		let config = LinkConfig::from_json_str(
			"{\"scope\":{\"market\":\"SE\",\"locale\":\"sv_SE\"},\"polling\":{\"backoff\":\"exponential\",\"max_interval_ms\":8000}}",
		)
		.expect("Configuration document should decode.");

		assert_eq!(config.scope, test_scope());
		assert_eq!(config.polling.backoff, BackoffPolicy::Exponential);
		assert_eq!(config.polling.initial_interval, StdDuration::from_secs(1));
		assert_eq!(config.polling.max_interval, Some(StdDuration::from_secs(8)));
		assert_eq!(config.max_auth_retries, 1);
	}

	#[test]
	fn decode_errors_name_the_failing_path() {
		let err = LinkConfig::from_json_str(
			"{\"scope\":{\"market\":\"SE\",\"locale\":\"sv_SE\"},\"polling\":{\"initial_interval_ms\":\"soon\"}}",
		)
		.expect_err("A string interval must be rejected.");

		let Error::Config(ConfigError::Decode { path, .. }) = &err else {
			panic!("Unexpected error: {err:?}");
		};

		assert_eq!(path, "polling.initial_interval_ms");
	}

	#[test]
	fn zero_intervals_are_rejected() {
		let err = LinkConfig::from_json_str(
			"{\"scope\":{\"market\":\"SE\",\"locale\":\"sv_SE\"},\"polling\":{\"initial_interval_ms\":0}}",
		)
		.expect_err("A zero interval must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::NonPositiveInterval)));
	}

	#[test]
	fn invalid_identifiers_surface_as_decode_errors() {
		let err = LinkConfig::from_json_str("{\"scope\":{\"market\":\"S E\",\"locale\":\"sv_SE\"}}")
			.expect_err("Whitespace in the market must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::Decode { .. })));
	}
}
