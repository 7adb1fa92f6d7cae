//! One remote listing per round for a batch of credentials.

// self
use crate::{
	_prelude::*,
	config::PollingConfig,
	model::{Credential, CredentialId},
	obs,
	poll::{Backoff, Observed, PollGate},
	store::CredentialStore,
};

/// Polls several credentials with one remote call per round.
///
/// Credentials leave the batch when they reach a terminal status or when the owner calls
/// [`BatchStatusPoller::finish`]. Once nothing is tracked the poller stops issuing remote
/// calls. The whole batch can be paused through its [`PollGate`].
#[derive(Debug)]
pub struct BatchStatusPoller {
	store: Arc<CredentialStore>,
	tracked: BTreeMap<CredentialId, Option<Observed>>,
	backoff: Backoff,
	gate: PollGate,
}
impl BatchStatusPoller {
	/// Creates a poller tracking `ids` with no status seen yet.
	pub fn new(
		store: Arc<CredentialStore>,
		ids: impl IntoIterator<Item = CredentialId>,
		config: &PollingConfig,
	) -> Self {
		Self {
			store,
			tracked: ids.into_iter().map(|id| (id, None)).collect(),
			backoff: Backoff::new(config),
			gate: PollGate::default(),
		}
	}

	/// Treats `credentials` as already observed, so only later changes are reported.
	///
	/// Credentials that are not tracked are ignored.
	pub fn with_baselines<'a>(
		mut self,
		credentials: impl IntoIterator<Item = &'a Credential>,
	) -> Self {
		for credential in credentials {
			if let Some(last) = self.tracked.get_mut(&credential.id) {
				*last = Some(Observed::of(credential));
			}
		}

		self
	}

	/// Returns a handle that pauses and resumes this batch.
	pub fn gate(&self) -> PollGate {
		self.gate.clone()
	}

	/// Suspends the whole batch.
	pub fn pause(&self) {
		self.gate.pause();
	}

	/// Resumes the whole batch.
	pub fn resume(&self) {
		self.gate.resume();
	}

	/// Stops tracking `id`.
	pub fn finish(&mut self, id: &CredentialId) {
		self.tracked.remove(id);
	}

	/// Returns `true` while `id` is still polled.
	pub fn is_tracking(&self, id: &CredentialId) -> bool {
		self.tracked.contains_key(id)
	}

	/// Returns `true` once every credential left the batch.
	pub fn is_done(&self) -> bool {
		self.tracked.is_empty()
	}

	/// Waits for the next round that changed at least one tracked credential.
	///
	/// Returns an empty list once the batch is done. Credentials that reached a terminal status
	/// are reported one last time and then dropped from tracking.
	pub async fn next_changes(&mut self) -> Result<Vec<Credential>> {
		while !self.is_done() {
			self.gate.wait_open().await;
			tokio::time::sleep(self.backoff.next_interval()).await;
			// A pause requested during the delay holds the poll back as well.
			self.gate.wait_open().await;

			let mut credentials = self
				.store
				.list_all()
				.await?
				.into_iter()
				.map(|credential| (credential.id.clone(), credential))
				.collect::<HashMap<_, _>>();
			let mut changes = Vec::new();

			for (id, last) in &mut self.tracked {
				let credential = credentials
					.remove(id)
					.ok_or_else(|| Error::UnknownCredential { id: id.clone() })?;
				let observed = Observed::of(&credential);

				if Observed::is_change(last.as_ref(), &observed) {
					obs::trace_status_change(&credential);

					*last = Some(observed);

					changes.push(credential);
				}
			}

			for credential in &changes {
				if credential.status.is_terminal() {
					self.tracked.remove(&credential.id);
				}
			}

			if !changes.is_empty() {
				return Ok(changes);
			}
		}

		Ok(Vec::new())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration as StdDuration;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		model::{CredentialKind, CredentialStatus, ProviderName},
		token::AccessTokenCoordinator,
		poll::BackoffPolicy,
		transport::{AggregationTransport, MemoryTransport, RemoteCall},
	};

	fn batch(ids: &[&str]) -> (BatchStatusPoller, Arc<MemoryTransport>, Vec<CredentialId>) {
		let transport = Arc::new(MemoryTransport::default());
		let remote: Arc<dyn AggregationTransport> = transport.clone();
		let tokens = Arc::new(AccessTokenCoordinator::new(remote.clone(), 1));
		let store = Arc::new(CredentialStore::new(remote, tokens, test_scope()));
		let ids = ids
			.iter()
			.map(|id| CredentialId::new(id).expect("Credential fixture should be valid."))
			.collect::<Vec<_>>();

		for id in &ids {
			transport.insert_credential(Credential::new(
				id.clone(),
				ProviderName::new("seb-bankid").expect("Provider fixture should be valid."),
				CredentialKind::MobileId,
			));
		}

		(BatchStatusPoller::new(store, ids.clone(), &test_config().polling), transport, ids)
	}

	#[tokio::test(start_paused = true)]
	async fn finished_batches_stop_polling() {
		let (mut poller, transport, ids) = batch(&["credential-a", "credential-b"]);

		transport.script(&ids[0], [CredentialStatus::Authenticating, CredentialStatus::Updated]);
		transport.script(
			&ids[1],
			[CredentialStatus::Authenticating, CredentialStatus::Updating, CredentialStatus::Updated],
		);

		let mut rounds = 0;

		while !poller.next_changes().await.expect("Polling should succeed.").is_empty() {
			rounds += 1;
		}

		assert_eq!(rounds, 3);
		assert!(poller.is_done());
		assert_eq!(transport.calls(RemoteCall::ListCredentials), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn finished_credentials_are_dropped_from_tracking() {
		let (mut poller, transport, ids) = batch(&["credential-a", "credential-b"]);

		transport.script(&ids[0], [CredentialStatus::Updating]);

		let changes = poller.next_changes().await.expect("Polling should succeed.");

		// The first round reports both credentials; only one was scripted forward.
		assert_eq!(changes.len(), 2);

		poller.finish(&ids[0]);
		poller.finish(&ids[1]);

		assert!(poller.is_done());
		assert!(poller.next_changes().await.expect("Done batches stay quiet.").is_empty());
		assert_eq!(transport.calls(RemoteCall::ListCredentials), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn baselines_hide_unchanged_first_rounds() {
		let (poller, transport, ids) = batch(&["credential-a", "credential-b"]);
		let baseline =
			transport.credential(&ids[0]).expect("The credential should exist remotely.");
		let mut poller = poller.with_baselines([&baseline]);

		transport.script(&ids[0], [CredentialStatus::Created, CredentialStatus::Authenticating]);
		transport.script(&ids[1], [CredentialStatus::Created]);

		let changes = poller.next_changes().await.expect("Polling should succeed.");

		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].id, ids[1]);

		let changes = poller.next_changes().await.expect("Polling should succeed.");

		assert_eq!(changes.len(), 1);
		assert_eq!(changes[0].id, ids[0]);
		assert_eq!(changes[0].status, CredentialStatus::Authenticating);
		assert_eq!(transport.calls(RemoteCall::ListCredentials), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn intervals_keep_growing_across_changes() {
		let (poller, transport, ids) = batch(&["credential-a"]);
		let store = poller.store.clone();
		let config = PollingConfig::default().with_backoff(BackoffPolicy::Exponential);
		let mut poller = BatchStatusPoller::new(store, ids.clone(), &config);
		let started = tokio::time::Instant::now();

		transport.script(
			&ids[0],
			[CredentialStatus::Authenticating, CredentialStatus::Updating, CredentialStatus::Updated],
		);

		let mut elapsed = Vec::new();

		while !poller.next_changes().await.expect("Polling should succeed.").is_empty() {
			elapsed.push(started.elapsed().as_secs());
		}

		assert_eq!(elapsed, vec![1, 3, 7]);
	}

	#[tokio::test(start_paused = true)]
	async fn paused_batches_issue_no_calls() {
		let (mut poller, transport, ids) = batch(&["credential-a"]);
		let gate = poller.gate();

		transport.script(&ids[0], [CredentialStatus::Updated]);
		gate.pause();

		let handle = tokio::spawn(async move {
			let changes = poller.next_changes().await;

			(poller, changes)
		});

		tokio::time::sleep(StdDuration::from_secs(30)).await;

		assert_eq!(transport.calls(RemoteCall::ListCredentials), 0);

		gate.resume();

		let (poller, changes) = handle.await.expect("Poller task should not panic.");

		assert_eq!(changes.expect("Polling should succeed.")[0].status, CredentialStatus::Updated);
		assert!(poller.is_done());
		assert_eq!(transport.calls(RemoteCall::ListCredentials), 1);
	}
}
