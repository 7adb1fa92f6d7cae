//! Shared plumbing for flow tasks: progress events, cancellation, and task spawning.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	flows::{
		state::Stage,
		supplement::SupplementInformationTask,
		third_party::ThirdPartyAppAuthenticationTask,
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Progress reported once per distinct status a flow reaches.
#[derive(Debug)]
pub enum CredentialProgress {
	/// The service accepted the request.
	Created,
	/// The service is authenticating against the bank.
	Authenticating,
	/// Data is being imported; carries the service's status message.
	Updating(String),
	/// The bank asks for more input; answer through the task.
	AwaitingSupplementalInformation(SupplementInformationTask),
	/// The user must approve the login in another app; open it through the task.
	AwaitingThirdPartyAppAuthentication(ThirdPartyAppAuthenticationTask),
	/// Data import finished.
	Updated,
}
impl From<Stage> for CredentialProgress {
	fn from(stage: Stage) -> Self {
		match stage {
			Stage::Created => Self::Created,
			Stage::Authenticating => Self::Authenticating,
			Stage::Updating(message) => Self::Updating(message),
			Stage::Updated => Self::Updated,
		}
	}
}

/// Cancels a running flow task.
///
/// After [`CancelHandle::cancel`] returns, no callback of the task runs again, and any callback
/// that was running on another thread has returned. Cancelling is idempotent and may be called
/// from inside one of the task's own callbacks.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
	token: CancellationToken,
	delivery: Arc<ReentrantMutex<()>>,
}
impl CancelHandle {
	/// Stops the task and suppresses every later callback.
	pub fn cancel(&self) {
		self.token.cancel();

		// Wait out a callback that is running right now.
		drop(self.delivery.lock());
	}

	/// Returns `true` once [`CancelHandle::cancel`] was called.
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Runs `callback` unless the task was cancelled.
	pub(crate) fn deliver(&self, callback: impl FnOnce()) -> bool {
		let _delivery = self.delivery.lock();

		if self.token.is_cancelled() {
			return false;
		}

		callback();

		true
	}
}

/// How the user resolved a hand-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandoffOutcome {
	/// The user acted; polling continues.
	Resumed,
	/// The user declined; the flow ends as cancelled.
	Cancelled,
}

/// Sending half of a hand-off, shared by clones of one hand-off task.
#[derive(Clone, Debug)]
pub(crate) struct HandoffSender(Arc<Mutex<Option<oneshot::Sender<HandoffOutcome>>>>);
impl HandoffSender {
	pub(crate) fn channel() -> (Self, HandoffReceiver) {
		let (sender, receiver) = oneshot::channel();

		(Self(Arc::new(Mutex::new(Some(sender)))), HandoffReceiver(receiver))
	}

	/// Resolves the hand-off; later calls are ignored.
	pub(crate) fn resolve(&self, outcome: HandoffOutcome) -> bool {
		match self.0.lock().take() {
			Some(sender) => sender.send(outcome).is_ok(),
			None => false,
		}
	}

	pub(crate) fn is_resolved(&self) -> bool {
		self.0.lock().is_none()
	}
}

/// Receiving half of a hand-off, awaited by the flow task.
#[derive(Debug)]
pub(crate) struct HandoffReceiver(oneshot::Receiver<HandoffOutcome>);
impl HandoffReceiver {
	/// Waits for the user; a task dropped without answer counts as cancelled.
	pub(crate) async fn outcome(self) -> HandoffOutcome {
		self.0.await.unwrap_or(HandoffOutcome::Cancelled)
	}
}

/// Spawns `flow` and reports its result through `on_complete`.
///
/// Cancellation drops the flow future (and any remote call it awaits) at its next suspension
/// point; `on_complete` is then suppressed.
pub(crate) fn spawn_flow<T, Fut>(
	kind: FlowKind,
	handle: CancelHandle,
	flow: Fut,
	on_complete: impl 'static + FnOnce(Result<T>) + Send,
) where
	T: 'static + Send,
	Fut: 'static + Future<Output = Result<T>> + Send,
{
	let span = FlowSpan::new(kind, "run");

	tokio::spawn(span.instrument(async move {
		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = tokio::select! {
			biased;
			_ = handle.token.cancelled() => Err(Error::Cancelled),
			result = flow => result,
		};

		obs::record_result(kind, &result);
		handle.deliver(|| on_complete(result));
	}));
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[test]
	fn cancelled_handles_suppress_delivery() {
		let handle = CancelHandle::default();
		let delivered = AtomicUsize::new(0);

		assert!(handle.deliver(|| {
			delivered.fetch_add(1, Ordering::SeqCst);
		}));

		handle.cancel();
		handle.cancel();

		assert!(!handle.deliver(|| {
			delivered.fetch_add(1, Ordering::SeqCst);
		}));
		assert!(handle.is_cancelled());
		assert_eq!(delivered.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn callbacks_may_cancel_their_own_task() {
		let handle = CancelHandle::default();

		assert!(handle.deliver(|| handle.cancel()));
		assert!(handle.is_cancelled());
	}

	#[tokio::test]
	async fn dropped_hand_offs_count_as_cancelled() {
		let (sender, receiver) = HandoffSender::channel();

		drop(sender);

		assert_eq!(receiver.outcome().await, HandoffOutcome::Cancelled);
	}

	#[tokio::test]
	async fn hand_offs_resolve_once() {
		let (sender, receiver) = HandoffSender::channel();

		assert!(sender.resolve(HandoffOutcome::Resumed));
		assert!(!sender.resolve(HandoffOutcome::Cancelled));
		assert!(sender.is_resolved());
		assert_eq!(receiver.outcome().await, HandoffOutcome::Resumed);
	}

	#[tokio::test]
	async fn cancelled_flows_never_complete() {
		let handle = CancelHandle::default();
		let (done, mut completed) = tokio::sync::mpsc::unbounded_channel();

		handle.cancel();
		spawn_flow(
			FlowKind::AddCredential,
			handle,
			async { Ok::<_, Error>(1) },
			move |result| {
				let _ = done.send(result.is_ok());
			},
		);

		assert_eq!(completed.recv().await, None);
	}
}
