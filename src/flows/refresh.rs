//! Refresh flow: request fresh data for several credentials and follow them as one batch.

// self
use crate::{
	_prelude::*,
	config::PollingConfig,
	flows::{
		common::{self, CancelHandle, CredentialProgress, HandoffOutcome},
		state::{self, CompletionPredicate, Transition},
		supplement::SupplementInformationTask,
		third_party::ThirdPartyAppAuthenticationTask,
	},
	model::{Credential, CredentialId},
	obs::FlowKind,
	poll::BatchStatusPoller,
	store::CredentialStore,
};

/// Per-credential outcome of a refresh.
pub type RefreshResults = BTreeMap<CredentialId, Result<Credential>>;

type ProgressCallback = Arc<dyn Fn(CredentialId, CredentialProgress) + Send + Sync>;

/// Refreshes a batch of credentials and reports progress per credential.
///
/// While one credential waits for the user the whole batch is paused. A credential whose
/// hand-off is cancelled, or that ends in an error status, fails on its own; transport errors
/// and unknown identifiers fail the whole task.
#[derive(Clone, Debug)]
pub struct RefreshCredentialsTask {
	store: Arc<CredentialStore>,
	polling: PollingConfig,
	ids: Vec<CredentialId>,
	predicate: CompletionPredicate,
}
impl RefreshCredentialsTask {
	/// Prepares a task for `ids` that completes once every credential is updated.
	pub fn new(
		store: Arc<CredentialStore>,
		polling: PollingConfig,
		ids: impl IntoIterator<Item = CredentialId>,
	) -> Self {
		let mut ids = ids.into_iter().collect::<Vec<_>>();

		ids.sort();
		ids.dedup();

		Self { store, polling, ids, predicate: CompletionPredicate::default() }
	}

	/// Overrides the completion predicate applied to every credential.
	pub fn with_completion_predicate(mut self, predicate: CompletionPredicate) -> Self {
		self.predicate = predicate;

		self
	}

	/// Spawns the task on the current Tokio runtime.
	///
	/// `on_complete` runs once every credential is done and is skipped after cancellation.
	pub fn start(
		self,
		on_progress: impl 'static + Fn(CredentialId, CredentialProgress) + Send + Sync,
		on_complete: impl 'static + FnOnce(Result<RefreshResults>) + Send,
	) -> CancelHandle {
		let handle = CancelHandle::default();

		common::spawn_flow(
			FlowKind::RefreshCredentials,
			handle.clone(),
			self.run(Arc::new(on_progress), handle.clone()),
			on_complete,
		);

		handle
	}

	async fn run(
		self,
		on_progress: ProgressCallback,
		handle: CancelHandle,
	) -> Result<RefreshResults> {
		let report = |id: CredentialId, progress: CredentialProgress| {
			handle.deliver(|| on_progress(id, progress));
		};
		let mut results = RefreshResults::new();

		if self.ids.is_empty() {
			return Ok(results);
		}

		// Polls are compared against the state from before the refresh request.
		let baselines =
			self.ids.iter().filter_map(|id| self.store.credential(id)).collect::<Vec<_>>();

		self.store.refresh(&self.ids).await?;

		let mut poller = BatchStatusPoller::new(self.store.clone(), self.ids, &self.polling)
			.with_baselines(&baselines);

		while !poller.is_done() {
			for credential in poller.next_changes().await? {
				let id = credential.id.clone();

				match state::transition(self.predicate, &credential) {
					Transition::Progress { stage, complete } => {
						report(id.clone(), stage.into());

						if complete {
							poller.finish(&id);
							results.insert(id, Ok(credential));
						}
					},
					Transition::SupplementalInformation => {
						let (task, receiver) =
							SupplementInformationTask::new(self.store.clone(), credential);

						poller.pause();
						report(id.clone(), CredentialProgress::AwaitingSupplementalInformation(task));

						let outcome = receiver.outcome().await;

						poller.resume();

						if outcome == HandoffOutcome::Cancelled {
							poller.finish(&id);
							results.insert(id, Err(Error::Cancelled));
						}
					},
					Transition::ThirdPartyAppAuthentication(authentication) => {
						let (task, receiver) =
							ThirdPartyAppAuthenticationTask::new(credential, authentication);

						poller.pause();
						report(
							id.clone(),
							CredentialProgress::AwaitingThirdPartyAppAuthentication(task),
						);

						let outcome = receiver.outcome().await;

						poller.resume();

						if outcome == HandoffOutcome::Cancelled {
							poller.finish(&id);
							results.insert(id, Err(Error::Cancelled));
						}
					},
					Transition::Failed(e) => {
						poller.finish(&id);
						results.insert(id, Err(e));
					},
				}
			}
		}

		Ok(results)
	}
}
