//! Access-token acquisition with per-scope singleflight and bounded re-authentication.
//!
//! [`AccessTokenCoordinator::acquire`] answers from the cache when it can. Otherwise every
//! concurrent caller for the same [`TokenScope`] joins one `create_anonymous_user` call and
//! receives the same token or the same error. A rejected anonymous-user request is retried at
//! most `max_auth_retries` times. [`AccessTokenCoordinator::authorized`] applies the same bound
//! to calls made with a token: a rejection discards the token, re-acquires, and replays the call.

// self
use crate::{
	_prelude::*,
	flight::Singleflight,
	model::{AccessToken, TokenScope},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	transport::AggregationTransport,
};

/// Caches access tokens per market + locale and coalesces their acquisition.
pub struct AccessTokenCoordinator {
	transport: Arc<dyn AggregationTransport>,
	max_auth_retries: u8,
	tokens: RwLock<HashMap<TokenScope, AccessToken>>,
	flights: Singleflight<TokenScope, AccessToken>,
}
impl AccessTokenCoordinator {
	/// Creates a coordinator that re-acquires a rejected token at most `max_auth_retries` times.
	pub fn new(transport: Arc<dyn AggregationTransport>, max_auth_retries: u8) -> Self {
		Self {
			transport,
			max_auth_retries,
			tokens: Default::default(),
			flights: Default::default(),
		}
	}

	/// Returns the cached token for `scope` without contacting the service.
	pub fn cached(&self, scope: &TokenScope) -> Option<AccessToken> {
		self.tokens.read().get(scope).cloned()
	}

	/// Returns `true` while an acquisition for `scope` is running.
	pub fn is_acquiring(&self, scope: &TokenScope) -> bool {
		self.flights.in_flight(scope)
	}

	/// Returns a token for `scope`, joining or starting a single acquisition when uncached.
	pub async fn acquire(&self, scope: &TokenScope) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::AcquireToken;

		if let Some(token) = self.cached(scope) {
			return Ok(token);
		}

		let span = FlowSpan::new(KIND, "acquire");

		span.instrument(self.acquire_coalesced(scope)).await
	}

	async fn acquire_coalesced(&self, scope: &TokenScope) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::AcquireToken;

		self.flights
			.run(scope.clone(), || async move {
				// A flight that settled after the caller's cache check already stored a token.
				if let Some(token) = self.cached(scope) {
					return Ok(token);
				}

				obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

				let result = self.create_anonymous_user(scope).await;

				match &result {
					Ok(token) => {
						self.tokens.write().insert(scope.clone(), token.clone());
						obs::record_flow_outcome(KIND, FlowOutcome::Success);
					},
					Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
				}

				result
			})
			.await
	}

	/// Discards the cached token for `scope` if it is still `rejected`.
	///
	/// A token cached by a concurrent re-acquisition is kept.
	pub fn invalidate(&self, scope: &TokenScope, rejected: &AccessToken) {
		let mut tokens = self.tokens.write();

		if tokens.get(scope) == Some(rejected) {
			tokens.remove(scope);
		}
	}

	/// Drops every cached token.
	pub fn clear(&self) {
		self.tokens.write().clear();
	}

	/// Runs `call` with a token for `scope`, re-acquiring after a rejection.
	///
	/// The call runs at most `1 + max_auth_retries` times; the last rejection is returned.
	pub async fn authorized<T, F, Fut>(&self, scope: &TokenScope, mut call: F) -> Result<T>
	where
		F: FnMut(AccessToken) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut retries = 0;

		loop {
			let token = self.acquire(scope).await?;

			match call(token.clone()).await {
				Err(e) if e.is_authentication_rejected() && retries < self.max_auth_retries => {
					obs::record_token_rejected(scope);
					self.invalidate(scope, &token);

					retries += 1;
				},
				result => return result,
			}
		}
	}

	async fn create_anonymous_user(&self, scope: &TokenScope) -> Result<AccessToken> {
		let mut retries = 0;

		loop {
			match self.transport.create_anonymous_user(&scope.market, &scope.locale).await {
				Err(e) if e.is_authentication_rejected() && retries < self.max_auth_retries => {
					obs::record_token_rejected(scope);

					retries += 1;
				},
				result => return result,
			}
		}
	}
}
impl Debug for AccessTokenCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessTokenCoordinator")
			.field("max_auth_retries", &self.max_auth_retries)
			.field("cached_scopes", &self.tokens.read().len())
			.finish()
	}
}
