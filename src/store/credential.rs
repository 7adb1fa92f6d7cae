//! Credential cache backed by the remote credential list.

// self
use crate::{
	_prelude::*,
	flight::Singleflight,
	model::{AccessToken, Credential, CredentialId, CredentialStatus, ProviderName, TokenScope},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	observer::{ObserverRegistry, Subscription},
	token::AccessTokenCoordinator,
	transport::{AggregationTransport, FieldValues},
};

#[derive(Debug, Default)]
struct Entries {
	credentials: BTreeMap<CredentialId, Credential>,
	revision: u64,
	// Revision of the last local write per identifier, kept only while a listing may predate it.
	written: HashMap<CredentialId, u64>,
}
impl Entries {
	fn touch(&mut self, id: &CredentialId) -> Option<&mut Credential> {
		self.revision += 1;
		self.written.insert(id.clone(), self.revision);

		self.credentials.get_mut(id)
	}

	fn merge(&mut self, listed: &[Credential], since: u64) {
		let Self { credentials, written, .. } = self;
		let written_since = |id: &CredentialId| written.get(id).is_some_and(|at| *at > since);
		let listed_ids = listed.iter().map(|credential| &credential.id).collect::<BTreeSet<_>>();

		credentials.retain(|id, _| listed_ids.contains(id) || written_since(id));

		for credential in listed {
			if !written_since(&credential.id) {
				credentials.insert(credential.id.clone(), credential.clone());
			}
		}

		written.retain(|_, at| *at > since);
	}
}

/// Owns the user's credentials and keeps them in sync with the service.
///
/// Every mutation goes to the service first; the local map only changes after the call
/// succeeded, and subscribers are notified with the full snapshot afterwards.
pub struct CredentialStore {
	transport: Arc<dyn AggregationTransport>,
	tokens: Arc<AccessTokenCoordinator>,
	scope: TokenScope,
	entries: RwLock<Entries>,
	writer: AsyncMutex<()>,
	fetches: Singleflight<(), Vec<Credential>>,
	observers: ObserverRegistry<[Credential]>,
}
impl CredentialStore {
	/// Creates an empty store that authenticates through `tokens` for `scope`.
	pub fn new(
		transport: Arc<dyn AggregationTransport>,
		tokens: Arc<AccessTokenCoordinator>,
		scope: TokenScope,
	) -> Self {
		Self {
			transport,
			tokens,
			scope,
			entries: Default::default(),
			writer: AsyncMutex::new(()),
			fetches: Default::default(),
			observers: Default::default(),
		}
	}

	/// Returns the cached credential for `id`.
	pub fn credential(&self, id: &CredentialId) -> Option<Credential> {
		self.entries.read().credentials.get(id).cloned()
	}

	/// Returns every cached credential ordered by identifier.
	pub fn credentials(&self) -> Vec<Credential> {
		self.entries.read().credentials.values().cloned().collect()
	}

	/// Registers `callback` for the snapshot taken after every change.
	pub fn subscribe(
		&self,
		callback: impl 'static + Fn(&[Credential]) + Send + Sync,
	) -> Subscription {
		self.observers.subscribe(callback)
	}

	/// Fetches every credential and merges the listing into the cached map.
	///
	/// Concurrent callers share one remote call and receive the same result. Local writes
	/// applied while the listing was in flight are kept over the listed state.
	pub async fn list_all(&self) -> Result<Vec<Credential>> {
		const KIND: FlowKind = FlowKind::ListCredentials;

		let span = FlowSpan::new(KIND, "list_all");

		span.instrument(self.fetches.run((), || async move {
			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let since = self.entries.read().revision;
			let result = self
				.tokens
				.authorized(&self.scope, |token| {
					let transport = self.transport.clone();

					async move { transport.list_credentials(&token).await }
				})
				.await;

			if let Ok(credentials) = &result {
				self.apply(|entries| entries.merge(credentials, since)).await;
			}

			obs::record_result(KIND, &result);

			result
		}))
		.await
	}

	/// Creates a credential for `provider` with the filled-in `fields`.
	pub async fn create(&self, provider: &ProviderName, fields: &FieldValues) -> Result<Credential> {
		let credential = self
			.mutate("create", |transport, token| async move {
				transport.create_credential(&token, provider, fields).await
			})
			.await?;

		self.apply(|entries| {
			entries.touch(&credential.id);
			entries.credentials.insert(credential.id.clone(), credential.clone());
		})
		.await;

		Ok(credential)
	}

	/// Requests a data refresh for `ids`.
	pub async fn refresh(&self, ids: &[CredentialId]) -> Result<()> {
		self.mutate("refresh", |transport, token| async move {
			transport.refresh_credentials(&token, ids).await
		})
		.await?;
		self.apply(|entries| {
			for id in ids {
				if let Some(credential) = entries.touch(id) {
					credential.status = CredentialStatus::Created;
					credential.status_message = None;
					credential.supplemental_information.clear();
					credential.third_party_app_authentication = None;
				}
			}
		})
		.await;

		Ok(())
	}

	/// Submits supplemental information for `id`.
	pub async fn supplement_information(
		&self,
		id: &CredentialId,
		fields: &FieldValues,
	) -> Result<()> {
		self.mutate("supplement_information", |transport, token| async move {
			transport.supplement_information(&token, id, fields).await
		})
		.await?;
		self.apply(|entries| {
			if let Some(credential) = entries.touch(id) {
				credential.status = CredentialStatus::Authenticating;
				credential.supplemental_information.clear();
			}
		})
		.await;

		Ok(())
	}

	/// Declines the pending supplemental-information request of `id`.
	pub async fn cancel_supplement_information(&self, id: &CredentialId) -> Result<()> {
		self.mutate("cancel_supplement_information", |transport, token| async move {
			transport.cancel_supplement_information(&token, id).await
		})
		.await?;
		self.apply(|entries| {
			if let Some(credential) = entries.touch(id) {
				credential.supplemental_information.clear();
			}
		})
		.await;

		Ok(())
	}

	/// Deletes `id` remotely and drops it from the cache.
	pub async fn delete(&self, id: &CredentialId) -> Result<()> {
		self.mutate("delete", |transport, token| async move {
			transport.delete_credential(&token, id).await
		})
		.await?;
		self.apply(|entries| {
			entries.touch(id);
			entries.credentials.remove(id);
		})
		.await;

		Ok(())
	}

	async fn mutate<T, F, Fut>(&self, stage: &'static str, mut call: F) -> Result<T>
	where
		F: FnMut(Arc<dyn AggregationTransport>, AccessToken) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		const KIND: FlowKind = FlowKind::MutateCredential;

		let span = FlowSpan::new(KIND, stage);

		span.instrument(async move {
			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = self
				.tokens
				.authorized(&self.scope, |token| call(self.transport.clone(), token))
				.await;

			obs::record_result(KIND, &result);

			result
		})
		.await
	}

	async fn apply(&self, change: impl FnOnce(&mut Entries)) {
		let _writer = self.writer.lock().await;
		let snapshot = {
			let mut entries = self.entries.write();

			change(&mut entries);

			entries.credentials.values().cloned().collect::<Vec<_>>()
		};

		self.observers.notify(&snapshot);
	}
}
impl Debug for CredentialStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialStore")
			.field("scope", &self.scope)
			.field("credentials", &self.entries.read().credentials.len())
			.field("observers", &self.observers.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration as StdDuration,
	};
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::TransportError,
		model::CredentialKind,
		transport::{MemoryTransport, RemoteCall},
	};

	fn store() -> (CredentialStore, Arc<MemoryTransport>) {
		let transport = Arc::new(MemoryTransport::default());
		let remote: Arc<dyn AggregationTransport> = transport.clone();
		let tokens = Arc::new(AccessTokenCoordinator::new(remote.clone(), 1));

		(CredentialStore::new(remote, tokens, test_scope()), transport)
	}

	fn provider() -> ProviderName {
		ProviderName::new("nordea-bankid").expect("Provider fixture should be valid.")
	}

	#[tokio::test]
	async fn concurrent_listings_share_one_remote_call() {
		let (store, transport) = store();

		transport.set_latency(RemoteCall::ListCredentials, StdDuration::from_millis(20));
		transport.insert_credential(Credential::new(
			CredentialId::new("credential-a").expect("Credential fixture should be valid."),
			provider(),
			CredentialKind::MobileId,
		));

		let (first, second, third) =
			tokio::join!(store.list_all(), store.list_all(), store.list_all());

		assert_eq!(first.expect("First listing should succeed.").len(), 1);
		assert_eq!(second.expect("Second listing should succeed.").len(), 1);
		assert_eq!(third.expect("Third listing should succeed.").len(), 1);
		assert_eq!(transport.calls(RemoteCall::ListCredentials), 1);
		assert_eq!(store.credentials().len(), 1);
	}

	#[test]
	fn listings_keep_writes_made_while_they_were_in_flight() {
		let credential = |id: &str| {
			Credential::new(
				CredentialId::new(id).expect("Credential fixture should be valid."),
				provider(),
				CredentialKind::MobileId,
			)
		};
		let kept = credential("kept");
		let deleted = credential("deleted");
		let created = credential("created");
		let vanished = credential("vanished");
		let mut entries = Entries::default();

		for existing in [&kept, &deleted, &vanished] {
			entries.credentials.insert(existing.id.clone(), existing.clone());
		}

		let since = entries.revision;

		entries.touch(&created.id);
		entries.credentials.insert(created.id.clone(), created.clone());
		entries.touch(&deleted.id);
		entries.credentials.remove(&deleted.id);
		// Taken before the two writes above reached the service.
		entries.merge(&[kept.clone(), deleted.clone()], since);

		assert_eq!(
			entries.credentials.keys().cloned().collect::<Vec<_>>(),
			vec![created.id.clone(), kept.id.clone()]
		);
		assert_eq!(entries.written.len(), 2);

		let since = entries.revision;

		entries.merge(&[kept.clone()], since);

		assert_eq!(entries.credentials.keys().cloned().collect::<Vec<_>>(), vec![kept.id]);
		assert!(entries.written.is_empty());
	}

	#[tokio::test]
	async fn mutations_update_the_map_and_notify() {
		let (store, _transport) = store();
		let notifications = Arc::new(AtomicUsize::new(0));
		let _subscription = {
			let notifications = notifications.clone();

			store.subscribe(move |_| {
				notifications.fetch_add(1, Ordering::SeqCst);
			})
		};
		let created = store
			.create(&provider(), &FieldValues::new())
			.await
			.expect("Creating a credential should succeed.");

		assert_eq!(store.credential(&created.id), Some(created.clone()));

		store.delete(&created.id).await.expect("Deleting a credential should succeed.");

		assert_eq!(store.credential(&created.id), None);
		assert_eq!(notifications.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn failed_mutations_leave_the_map_untouched() {
		let (store, transport) = store();

		transport.fail_next(RemoteCall::CreateCredential, TransportError::Timeout);

		let err = store
			.create(&provider(), &FieldValues::new())
			.await
			.expect_err("Injected timeout should surface.");

		assert!(matches!(err, Error::Transport(TransportError::Timeout)));
		assert!(store.credentials().is_empty());
	}

	#[tokio::test]
	async fn dropped_subscriptions_stop_receiving_snapshots() {
		let (store, _transport) = store();
		let notifications = Arc::new(AtomicUsize::new(0));
		let subscription = {
			let notifications = notifications.clone();

			store.subscribe(move |_| {
				notifications.fetch_add(1, Ordering::SeqCst);
			})
		};

		store.list_all().await.expect("Listing should succeed.");
		drop(subscription);
		store.list_all().await.expect("Listing should succeed.");

		assert_eq!(notifications.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn supplemental_information_reaches_the_service() {
		let (store, transport) = store();
		let created = store
			.create(&provider(), &FieldValues::new())
			.await
			.expect("Creating a credential should succeed.");
		let fields = FieldValues::from([("otp".to_owned(), "123456".to_owned())]);

		store
			.supplement_information(&created.id, &fields)
			.await
			.expect("Supplementing should succeed.");
		store
			.cancel_supplement_information(&created.id)
			.await
			.expect("Cancelling should succeed.");

		assert_eq!(transport.supplements(&created.id), vec![fields]);
		assert_eq!(transport.cancelled_supplements(), vec![created.id]);
	}
}
