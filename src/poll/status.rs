//! Single-credential status poller.

// self
use crate::{
	_prelude::*,
	config::PollingConfig,
	model::{Credential, CredentialId},
	obs,
	poll::{Backoff, Observed},
	store::CredentialStore,
};

/// Polls one credential until it reaches a terminal status.
///
/// [`StatusPoller::next_change`] returns each observed change to the owner. Awaiting statuses
/// are returned like any other change; the owner simply stops calling `next_change` until the
/// hand-off resolved.
#[derive(Debug)]
pub struct StatusPoller {
	store: Arc<CredentialStore>,
	id: CredentialId,
	backoff: Backoff,
	last: Option<Observed>,
	finished: bool,
}
impl StatusPoller {
	/// Creates a poller for `id` with no status seen yet.
	pub fn new(store: Arc<CredentialStore>, id: CredentialId, config: &PollingConfig) -> Self {
		Self { store, id, backoff: Backoff::new(config), last: None, finished: false }
	}

	/// Treats `credential` as already observed, so only later changes are reported.
	pub fn with_baseline(mut self, credential: &Credential) -> Self {
		self.last = Some(Observed::of(credential));

		self
	}

	/// Identifier of the polled credential.
	pub fn id(&self) -> &CredentialId {
		&self.id
	}

	/// Returns `true` once a terminal status was reported.
	pub fn is_finished(&self) -> bool {
		self.finished
	}

	/// Waits for the next status change.
	///
	/// Returns `Ok(None)` once the poller finished. The interval keeps growing across changes.
	pub async fn next_change(&mut self) -> Result<Option<Credential>> {
		while !self.finished {
			tokio::time::sleep(self.backoff.next_interval()).await;

			let credentials = self.store.list_all().await?;
			let credential = credentials
				.into_iter()
				.find(|credential| credential.id == self.id)
				.ok_or_else(|| Error::UnknownCredential { id: self.id.clone() })?;
			let observed = Observed::of(&credential);

			if !Observed::is_change(self.last.as_ref(), &observed) {
				continue;
			}

			obs::trace_status_change(&credential);

			self.last = Some(observed);
			self.finished = credential.status.is_terminal();

			return Ok(Some(credential));
		}

		Ok(None)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		model::{CredentialKind, CredentialStatus, ProviderName},
		token::AccessTokenCoordinator,
		transport::{AggregationTransport, FieldValues, MemoryTransport, RemoteCall, StatusStep},
	};

	async fn created() -> (StatusPoller, Arc<MemoryTransport>) {
		let transport = Arc::new(MemoryTransport::default());
		let remote: Arc<dyn AggregationTransport> = transport.clone();
		let tokens = Arc::new(AccessTokenCoordinator::new(remote.clone(), 1));
		let store = Arc::new(CredentialStore::new(remote, tokens, test_scope()));
		let credential = store
			.create(
				&ProviderName::new("seb-bankid").expect("Provider fixture should be valid."),
				&FieldValues::new(),
			)
			.await
			.expect("Creating a credential should succeed.");
		let poller = StatusPoller::new(store, credential.id.clone(), &test_config().polling)
			.with_baseline(&credential);

		(poller, transport)
	}

	#[tokio::test(start_paused = true)]
	async fn unchanged_polls_are_skipped_silently() {
		let (mut poller, transport) = created().await;

		transport.script(
			poller.id(),
			[
				StatusStep::new(CredentialStatus::Authenticating),
				StatusStep::new(CredentialStatus::Authenticating),
				StatusStep::new(CredentialStatus::Updating).with_message("Accounts"),
				StatusStep::new(CredentialStatus::Updating).with_message("Accounts"),
				StatusStep::new(CredentialStatus::Updating).with_message("Transactions"),
				StatusStep::new(CredentialStatus::Updated),
			],
		);

		let mut seen = Vec::new();

		while let Some(credential) = poller.next_change().await.expect("Polling should succeed.") {
			seen.push((credential.status, credential.status_message));
		}

		assert_eq!(
			seen,
			vec![
				(CredentialStatus::Authenticating, None),
				(CredentialStatus::Updating, Some("Accounts".into())),
				(CredentialStatus::Updating, Some("Transactions".into())),
				(CredentialStatus::Updated, None),
			]
		);
		assert!(poller.is_finished());
		assert_eq!(transport.calls(RemoteCall::ListCredentials), 6);
	}

	#[tokio::test(start_paused = true)]
	async fn vanished_credentials_are_reported_as_unknown() {
		let (mut poller, transport) = created().await;
		let id = poller.id().clone();
		let token = transport
			.create_anonymous_user(&test_scope().market, &test_scope().locale)
			.await
			.expect("Anonymous user creation should succeed.");

		transport.delete_credential(&token, &id).await.expect("Deleting should succeed.");

		let err = poller.next_change().await.expect_err("A missing credential must fail the poll.");

		assert!(matches!(err, Error::UnknownCredential { id: missing } if missing == id));
	}

	#[tokio::test(start_paused = true)]
	async fn other_credentials_do_not_disturb_the_poller() {
		let (mut poller, transport) = created().await;

		transport.insert_credential(Credential::new(
			CredentialId::new("credential-other").expect("Credential fixture should be valid."),
			ProviderName::new("nordea-bankid").expect("Provider fixture should be valid."),
			CredentialKind::MobileId,
		));
		transport.script(poller.id(), [CredentialStatus::PermanentError]);

		let credential = poller
			.next_change()
			.await
			.expect("Polling should succeed.")
			.expect("A terminal status should be reported.");

		assert_eq!(credential.status, CredentialStatus::PermanentError);
		assert_eq!(poller.next_change().await.expect("Finished pollers stay quiet."), None);
	}
}
