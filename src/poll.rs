//! Credential status polling with configurable backoff.
//!
//! Pollers use request-then-wait scheduling: the next delay starts only after the previous
//! response arrived, so a slow service never sees overlapping polls from one poller. A poll
//! result counts as a change when the status or its timestamp differs from the last one seen, or
//! when an `Updating` credential reports a new message.

pub mod backoff;
pub mod batch;
pub mod status;

pub use backoff::{Backoff, BackoffPolicy};
pub use batch::BatchStatusPoller;
pub use status::StatusPoller;

// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	model::{Credential, CredentialStatus},
};

/// Shared pause switch for a poller.
///
/// Clones control the same poller; while paused, no remote call is issued.
#[derive(Clone, Debug)]
pub struct PollGate(Arc<watch::Sender<bool>>);
impl PollGate {
	/// Suspends polling until [`PollGate::resume`] is called.
	pub fn pause(&self) {
		self.0.send_replace(true);
	}

	/// Lets a paused poller continue.
	pub fn resume(&self) {
		self.0.send_replace(false);
	}

	/// Returns `true` while paused.
	pub fn is_paused(&self) -> bool {
		*self.0.borrow()
	}

	pub(crate) async fn wait_open(&self) {
		let mut paused = self.0.subscribe();

		loop {
			let is_paused = *paused.borrow_and_update();

			// The sender lives in `self`, so the channel cannot close while waiting.
			if !is_paused || paused.changed().await.is_err() {
				break;
			}
		}
	}
}
impl Default for PollGate {
	fn default() -> Self {
		Self(Arc::new(watch::Sender::new(false)))
	}
}

/// Fields compared between two polls of the same credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Observed {
	status: CredentialStatus,
	status_updated: Option<OffsetDateTime>,
	message: Option<String>,
}
impl Observed {
	pub(crate) fn of(credential: &Credential) -> Self {
		Self {
			status: credential.status,
			status_updated: credential.status_updated,
			message: credential.status_message.clone(),
		}
	}

	pub(crate) fn is_change(previous: Option<&Self>, current: &Self) -> bool {
		let Some(previous) = previous else {
			return true;
		};

		previous.status != current.status
			|| previous.status_updated != current.status_updated
			|| (current.status == CredentialStatus::Updating && previous.message != current.message)
	}
}
