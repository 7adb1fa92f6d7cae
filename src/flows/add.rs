//! Add-credential flow: create a credential and follow it until the completion predicate holds.

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
	model::{Credential, ProviderName},
	obs::FlowKind,
	poll::StatusPoller,
	store::CredentialStore,
	transport::FieldValues,
};

type ProgressCallback = Arc<dyn Fn(CredentialProgress) + Send + Sync>;

/// Creates a credential for one provider and drives it to completion.
///
/// Progress is reported once per distinct status, and `Updating` again whenever its message
/// changes. The completion predicate only decides when the task completes; the progress before
/// that point is the same for both predicates.
#[derive(Clone, Debug)]
pub struct AddCredentialTask {
	store: Arc<CredentialStore>,
	polling: PollingConfig,
	provider: ProviderName,
	fields: FieldValues,
	predicate: CompletionPredicate,
}
impl AddCredentialTask {
	/// Prepares a task that completes once the credential is [`CompletionPredicate::Updated`].
	pub fn new(
		store: Arc<CredentialStore>,
		polling: PollingConfig,
		provider: ProviderName,
		fields: FieldValues,
	) -> Self {
		Self { store, polling, provider, fields, predicate: CompletionPredicate::default() }
	}

	/// Overrides the completion predicate.
	pub fn with_completion_predicate(mut self, predicate: CompletionPredicate) -> Self {
		self.predicate = predicate;

		self
	}

	/// Spawns the task on the current Tokio runtime.
	///
	/// Callbacks run on the task, one at a time. `on_complete` runs at most once and is skipped
	/// after cancellation.
	pub fn start(
		self,
		on_progress: impl 'static + Fn(CredentialProgress) + Send + Sync,
		on_complete: impl 'static + FnOnce(Result<Credential>) + Send,
	) -> CancelHandle {
		let handle = CancelHandle::default();

		common::spawn_flow(
			FlowKind::AddCredential,
			handle.clone(),
			self.run(Arc::new(on_progress), handle.clone()),
			on_complete,
		);

		handle
	}

	async fn run(self, on_progress: ProgressCallback, handle: CancelHandle) -> Result<Credential> {
		let report = |progress: CredentialProgress| {
			handle.deliver(|| on_progress(progress));
		};
		let created = self.store.create(&self.provider, &self.fields).await?;
		let id = created.id.clone();
		let mut status = created.status;

		report(CredentialProgress::Created);

		let mut poller =
			StatusPoller::new(self.store.clone(), id.clone(), &self.polling).with_baseline(&created);

		while let Some(credential) = poller.next_change().await? {
			status = credential.status;

			match state::transition(self.predicate, &credential) {
				Transition::Progress { stage, complete } => {
					report(stage.into());

					if complete {
						return Ok(credential);
					}
				},
				Transition::SupplementalInformation => {
					let (task, receiver) =
						SupplementInformationTask::new(self.store.clone(), credential);

					report(CredentialProgress::AwaitingSupplementalInformation(task));

					if receiver.outcome().await == HandoffOutcome::Cancelled {
						return Err(Error::Cancelled);
					}
				},
				Transition::ThirdPartyAppAuthentication(authentication) => {
					let (task, receiver) =
						ThirdPartyAppAuthenticationTask::new(credential, authentication);

					report(CredentialProgress::AwaitingThirdPartyAppAuthentication(task));

					if receiver.outcome().await == HandoffOutcome::Cancelled {
						return Err(Error::Cancelled);
					}
				},
				Transition::Failed(e) => return Err(e),
			}
		}

		Err(Error::UnexpectedStatus { credential: id, status })
	}
}
