//! Scriptable in-process [`AggregationTransport`] for local development and tests.
//!
//! The transport keeps a provider catalog and a credential table in memory. Credential status
//! changes are scripted per credential: every `list_credentials` call applies the next
//! [`StatusStep`] of each script, so a test decides exactly what successive polls observe.

// std
use std::{collections::HashSet, time::Duration as StdDuration};
// crates.io
use time::{Duration, macros};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	model::{
		AccessToken, Capabilities, Credential, CredentialId, CredentialKind, CredentialStatus,
		FieldSpecification, Locale, Market, Provider, ProviderName, ThirdPartyAppAuthentication,
	},
	transport::{AggregationTransport, FieldValues, TransportFuture},
};

/// Remote operations counted and scripted by [`MemoryTransport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteCall {
	/// `create_anonymous_user`.
	CreateAnonymousUser,
	/// `list_providers`.
	ListProviders,
	/// `list_provider_markets`.
	ListProviderMarkets,
	/// `create_credential`.
	CreateCredential,
	/// `list_credentials`.
	ListCredentials,
	/// `refresh_credentials`.
	RefreshCredentials,
	/// `supplement_information`.
	SupplementInformation,
	/// `cancel_supplement_information`.
	CancelSupplementInformation,
	/// `delete_credential`.
	DeleteCredential,
}

/// One scripted status a credential moves to on the next poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusStep {
	/// Status to report.
	pub status: CredentialStatus,
	/// Status message to report.
	pub message: Option<String>,
	/// Requested fields while awaiting supplemental information.
	pub supplemental_information: Vec<FieldSpecification>,
	/// Hand-off data while awaiting third-party app authentication.
	pub third_party_app_authentication: Option<ThirdPartyAppAuthentication>,
}
impl StatusStep {
	/// Creates a step reporting `status` without a message.
	pub fn new(status: CredentialStatus) -> Self {
		Self {
			status,
			message: None,
			supplemental_information: Vec::new(),
			third_party_app_authentication: None,
		}
	}

	/// Attaches a status message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// Attaches requested supplemental fields.
	pub fn with_supplemental_information(
		mut self,
		fields: impl IntoIterator<Item = FieldSpecification>,
	) -> Self {
		self.supplemental_information = fields.into_iter().collect();

		self
	}

	/// Attaches third-party app hand-off data.
	pub fn with_third_party_app_authentication(
		mut self,
		authentication: ThirdPartyAppAuthentication,
	) -> Self {
		self.third_party_app_authentication = Some(authentication);

		self
	}
}
impl From<CredentialStatus> for StatusStep {
	fn from(status: CredentialStatus) -> Self {
		Self::new(status)
	}
}

#[derive(Debug)]
struct MemoryState {
	providers: Vec<Provider>,
	markets: Vec<Market>,
	credentials: BTreeMap<CredentialId, Credential>,
	scripts: HashMap<CredentialId, VecDeque<StatusStep>>,
	provider_scripts: HashMap<ProviderName, Vec<StatusStep>>,
	failures: HashMap<RemoteCall, VecDeque<Error>>,
	latency: HashMap<RemoteCall, StdDuration>,
	calls: HashMap<RemoteCall, usize>,
	valid_tokens: HashSet<String>,
	issued_tokens: u64,
	created_credentials: u64,
	supplements: Vec<(CredentialId, FieldValues)>,
	cancelled_supplements: Vec<CredentialId>,
	deferred_refresh: bool,
	clock: OffsetDateTime,
}
impl Default for MemoryState {
	fn default() -> Self {
		Self {
			providers: Vec::new(),
			markets: Vec::new(),
			credentials: BTreeMap::new(),
			scripts: HashMap::new(),
			provider_scripts: HashMap::new(),
			failures: HashMap::new(),
			latency: HashMap::new(),
			calls: HashMap::new(),
			valid_tokens: HashSet::new(),
			issued_tokens: 0,
			created_credentials: 0,
			supplements: Vec::new(),
			cancelled_supplements: Vec::new(),
			deferred_refresh: false,
			clock: macros::datetime!(2024-01-01 00:00 UTC),
		}
	}
}
impl MemoryState {
	fn tick(&mut self) -> OffsetDateTime {
		self.clock += Duration::seconds(1);

		self.clock
	}

	fn advance_scripts(&mut self) {
		let ids = self.scripts.keys().cloned().collect::<Vec<_>>();

		for id in ids {
			let Some(step) = self.scripts.get_mut(&id).and_then(VecDeque::pop_front) else {
				continue;
			};

			self.apply(&id, step);
		}
	}

	fn apply(&mut self, id: &CredentialId, step: StatusStep) {
		let now = self.tick();
		let Some(credential) = self.credentials.get_mut(id) else {
			return;
		};

		if credential.status == step.status && credential.status_message == step.message {
			return;
		}

		credential.status = step.status;
		credential.status_message = step.message;
		credential.status_updated = Some(now);
		credential.supplemental_information = step.supplemental_information;
		credential.third_party_app_authentication = step.third_party_app_authentication;

		if step.status == CredentialStatus::Updated {
			credential.updated = Some(now);
		}
	}

	fn not_found(id: &CredentialId) -> Error {
		TransportError::Status { code: Some(404), message: format!("credential {id} not found") }
			.into()
	}
}

/// In-process aggregation service double with call counters and failure injection.
#[derive(Debug, Default)]
pub struct MemoryTransport(Mutex<MemoryState>);
impl MemoryTransport {
	/// Replaces the provider catalog.
	pub fn set_providers(&self, providers: impl IntoIterator<Item = Provider>) {
		self.0.lock().providers = providers.into_iter().collect();
	}

	/// Replaces the market list.
	pub fn set_markets(&self, markets: impl IntoIterator<Item = Market>) {
		self.0.lock().markets = markets.into_iter().collect();
	}

	/// Inserts (or replaces) a credential as if it had been created earlier.
	pub fn insert_credential(&self, credential: Credential) {
		self.0.lock().credentials.insert(credential.id.clone(), credential);
	}

	/// Queues status steps for an existing credential; each poll applies one step.
	pub fn script(
		&self,
		id: &CredentialId,
		steps: impl IntoIterator<Item = impl Into<StatusStep>>,
	) {
		self.0
			.lock()
			.scripts
			.entry(id.clone())
			.or_default()
			.extend(steps.into_iter().map(Into::into));
	}

	/// Queues status steps for the next credential created for `provider`.
	pub fn script_provider(
		&self,
		provider: &ProviderName,
		steps: impl IntoIterator<Item = impl Into<StatusStep>>,
	) {
		self.0
			.lock()
			.provider_scripts
			.insert(provider.clone(), steps.into_iter().map(Into::into).collect());
	}

	/// Accepts refreshes without resetting the credential status.
	///
	/// Statuses then only move through scripted steps, like a service that starts the refresh
	/// some time after acknowledging it.
	pub fn set_deferred_refresh(&self, deferred: bool) {
		self.0.lock().deferred_refresh = deferred;
	}

	/// Makes the next `call` fail with `error` (queued errors are consumed in order).
	pub fn fail_next(&self, call: RemoteCall, error: impl Into<Error>) {
		self.0.lock().failures.entry(call).or_default().push_back(error.into());
	}

	/// Delays every `call` by `latency` before it is served.
	pub fn set_latency(&self, call: RemoteCall, latency: StdDuration) {
		self.0.lock().latency.insert(call, latency);
	}

	/// Invalidates every issued token so the next authenticated call is rejected.
	pub fn revoke_tokens(&self) {
		self.0.lock().valid_tokens.clear();
	}

	/// Number of times `call` was started.
	pub fn calls(&self, call: RemoteCall) -> usize {
		self.0.lock().calls.get(&call).copied().unwrap_or_default()
	}

	/// Supplemental information submitted for `id`, oldest first.
	pub fn supplements(&self, id: &CredentialId) -> Vec<FieldValues> {
		self.0
			.lock()
			.supplements
			.iter()
			.filter(|(credential, _)| credential == id)
			.map(|(_, fields)| fields.clone())
			.collect()
	}

	/// Credentials whose supplemental information request was cancelled.
	pub fn cancelled_supplements(&self) -> Vec<CredentialId> {
		self.0.lock().cancelled_supplements.clone()
	}

	/// Snapshot of a credential as the service currently sees it.
	pub fn credential(&self, id: &CredentialId) -> Option<Credential> {
		self.0.lock().credentials.get(id).cloned()
	}

	async fn enter(&self, call: RemoteCall, token: Option<&AccessToken>) -> Result<()> {
		let latency = {
			let mut state = self.0.lock();

			*state.calls.entry(call).or_default() += 1;

			state.latency.get(&call).copied()
		};

		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}

		let mut state = self.0.lock();

		if let Some(error) = state.failures.get_mut(&call).and_then(VecDeque::pop_front) {
			return Err(error);
		}
		if token.is_some_and(|token| !state.valid_tokens.contains(token.expose())) {
			return Err(Error::AuthenticationRejected { reason: "access token is invalid".into() });
		}

		Ok(())
	}
}
impl AggregationTransport for MemoryTransport {
	fn create_anonymous_user<'a>(
		&'a self,
		_market: &'a Market,
		_locale: &'a Locale,
	) -> TransportFuture<'a, AccessToken> {
		Box::pin(async move {
			self.enter(RemoteCall::CreateAnonymousUser, None).await?;

			let mut state = self.0.lock();

			state.issued_tokens += 1;

			let token = format!("token-{}", state.issued_tokens);

			state.valid_tokens.insert(token.clone());

			Ok(AccessToken::new(token))
		})
	}

	fn list_providers<'a>(
		&'a self,
		token: &'a AccessToken,
		market: &'a Market,
		capabilities: Capabilities,
		include_test_providers: bool,
	) -> TransportFuture<'a, Vec<Provider>> {
		Box::pin(async move {
			self.enter(RemoteCall::ListProviders, Some(token)).await?;

			let providers = self
				.0
				.lock()
				.providers
				.iter()
				.filter(|provider| &provider.market == market)
				.filter(|provider| {
					capabilities.is_empty() || provider.capabilities.intersects(capabilities)
				})
				.filter(|provider| include_test_providers || !provider.is_test())
				.cloned()
				.collect();

			Ok(providers)
		})
	}

	fn list_provider_markets<'a>(
		&'a self,
		token: &'a AccessToken,
	) -> TransportFuture<'a, Vec<Market>> {
		Box::pin(async move {
			self.enter(RemoteCall::ListProviderMarkets, Some(token)).await?;

			Ok(self.0.lock().markets.clone())
		})
	}

	fn create_credential<'a>(
		&'a self,
		token: &'a AccessToken,
		provider: &'a ProviderName,
		fields: &'a FieldValues,
	) -> TransportFuture<'a, Credential> {
		Box::pin(async move {
			self.enter(RemoteCall::CreateCredential, Some(token)).await?;

			let mut state = self.0.lock();
			let kind = state
				.providers
				.iter()
				.find(|candidate| &candidate.name == provider)
				.map(|candidate| candidate.credential_kind)
				.unwrap_or(CredentialKind::Unknown);

			state.created_credentials += 1;

			let id = CredentialId::new(format!("credential-{}", state.created_credentials))
				.map_err(crate::error::ConfigError::from)?;
			let mut credential = Credential::new(id.clone(), provider.clone(), kind);

			credential.fields = fields.clone();
			credential.status_updated = Some(state.tick());

			if let Some(steps) = state.provider_scripts.remove(provider) {
				state.scripts.insert(id.clone(), steps.into());
			}

			state.credentials.insert(id, credential.clone());

			Ok(credential)
		})
	}

	fn list_credentials<'a>(
		&'a self,
		token: &'a AccessToken,
	) -> TransportFuture<'a, Vec<Credential>> {
		Box::pin(async move {
			self.enter(RemoteCall::ListCredentials, Some(token)).await?;

			let mut state = self.0.lock();

			state.advance_scripts();

			Ok(state.credentials.values().cloned().collect())
		})
	}

	fn refresh_credentials<'a>(
		&'a self,
		token: &'a AccessToken,
		ids: &'a [CredentialId],
	) -> TransportFuture<'a, ()> {
		Box::pin(async move {
			self.enter(RemoteCall::RefreshCredentials, Some(token)).await?;

			let mut state = self.0.lock();

			if let Some(missing) = ids.iter().find(|id| !state.credentials.contains_key(*id)) {
				return Err(MemoryState::not_found(missing));
			}

			if !state.deferred_refresh {
				for id in ids {
					state.apply(id, StatusStep::new(CredentialStatus::Created));
				}
			}

			Ok(())
		})
	}

	fn supplement_information<'a>(
		&'a self,
		token: &'a AccessToken,
		id: &'a CredentialId,
		fields: &'a FieldValues,
	) -> TransportFuture<'a, ()> {
		Box::pin(async move {
			self.enter(RemoteCall::SupplementInformation, Some(token)).await?;

			let mut state = self.0.lock();

			if !state.credentials.contains_key(id) {
				return Err(MemoryState::not_found(id));
			}

			state.supplements.push((id.clone(), fields.clone()));

			Ok(())
		})
	}

	fn cancel_supplement_information<'a>(
		&'a self,
		token: &'a AccessToken,
		id: &'a CredentialId,
	) -> TransportFuture<'a, ()> {
		Box::pin(async move {
			self.enter(RemoteCall::CancelSupplementInformation, Some(token)).await?;

			let mut state = self.0.lock();

			if !state.credentials.contains_key(id) {
				return Err(MemoryState::not_found(id));
			}

			state.cancelled_supplements.push(id.clone());

			Ok(())
		})
	}

	fn delete_credential<'a>(
		&'a self,
		token: &'a AccessToken,
		id: &'a CredentialId,
	) -> TransportFuture<'a, ()> {
		Box::pin(async move {
			self.enter(RemoteCall::DeleteCredential, Some(token)).await?;

			let mut state = self.0.lock();

			state.scripts.remove(id);
			state.credentials.remove(id).map(|_| ()).ok_or_else(|| MemoryState::not_found(id))
		})
	}
}
