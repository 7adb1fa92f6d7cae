//! Polling interval schedules.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, config::PollingConfig};

/// How the delay between two polls evolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffPolicy {
	/// Constant interval.
	None,
	/// Interval grows by one second after every poll.
	#[default]
	Linear,
	/// Interval doubles after every poll.
	Exponential,
}

/// Stateful interval generator for one poller.
#[derive(Clone, Debug)]
pub struct Backoff {
	policy: BackoffPolicy,
	max: Option<StdDuration>,
	current: StdDuration,
}
impl Backoff {
	const LINEAR_STEP: StdDuration = StdDuration::from_secs(1);

	/// Creates a schedule starting at `config.initial_interval`.
	pub fn new(config: &PollingConfig) -> Self {
		Self {
			policy: config.backoff,
			max: config.max_interval,
			current: config.initial_interval,
		}
	}

	/// Returns the delay to wait now and advances the schedule.
	pub fn next_interval(&mut self) -> StdDuration {
		let interval = self.current;
		let grown = match self.policy {
			BackoffPolicy::None => interval,
			BackoffPolicy::Linear => interval.saturating_add(Self::LINEAR_STEP),
			BackoffPolicy::Exponential => interval.saturating_mul(2),
		};

		self.current = self.max.map_or(grown, |max| grown.min(max));

		interval
	}
}
impl Iterator for Backoff {
	type Item = StdDuration;

	fn next(&mut self) -> Option<Self::Item> {
		Some(self.next_interval())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn secs(backoff: BackoffPolicy, count: usize) -> Vec<u64> {
		Backoff::new(&PollingConfig::default().with_backoff(backoff))
			.take(count)
			.map(|interval| interval.as_secs())
			.collect()
	}

	#[test]
	fn policies_follow_their_growth_rules() {
		assert_eq!(secs(BackoffPolicy::None, 4), vec![1, 1, 1, 1]);
		assert_eq!(secs(BackoffPolicy::Linear, 4), vec![1, 2, 3, 4]);
		assert_eq!(secs(BackoffPolicy::Exponential, 4), vec![1, 2, 4, 8]);
	}

	#[test]
	fn max_interval_caps_growth() {
		let config = PollingConfig::default()
			.with_backoff(BackoffPolicy::Exponential)
			.with_max_interval(StdDuration::from_secs(5));
		let mut backoff = Backoff::new(&config);
		let intervals =
			(0..5).map(|_| backoff.next_interval().as_secs()).collect::<Vec<_>>();

		assert_eq!(intervals, vec![1, 2, 4, 5, 5]);
	}
}
