//! Provider catalog cache keyed by fetch attributes.

// self
use crate::{
	_prelude::*,
	flight::Singleflight,
	model::{AccessType, Capabilities, Market, Provider, TokenScope},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	observer::{ObserverRegistry, Subscription},
	token::AccessTokenCoordinator,
	transport::AggregationTransport,
};

/// Attributes of one provider catalog fetch; equal queries share cache entries and flights.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderQuery {
	/// Market to list providers for.
	pub market: Market,
	/// Capability filter; empty means every provider.
	pub capabilities: Capabilities,
	/// Access-type filter; empty means every access type.
	pub access_types: BTreeSet<AccessType>,
	/// Whether test providers are listed.
	pub include_test_providers: bool,
}
impl ProviderQuery {
	/// Creates an unfiltered query for `market`.
	pub fn new(market: Market) -> Self {
		Self {
			market,
			capabilities: Capabilities::empty(),
			access_types: BTreeSet::new(),
			include_test_providers: false,
		}
	}

	/// Restricts the query to providers offering any of `capabilities`.
	pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
		self.capabilities = capabilities;

		self
	}

	/// Restricts the query to the listed access types.
	pub fn with_access_types(mut self, access_types: impl IntoIterator<Item = AccessType>) -> Self {
		self.access_types = access_types.into_iter().collect();

		self
	}

	/// Lists test providers too.
	pub fn include_test_providers(mut self) -> Self {
		self.include_test_providers = true;

		self
	}

	fn admits(&self, provider: &Provider) -> bool {
		self.access_types.is_empty() || self.access_types.contains(&provider.access_type)
	}
}

/// Caches provider listings and markets, coalescing identical in-flight fetches.
///
/// Failures reach every caller that joined the fetch and are never cached.
pub struct ProviderCatalogStore {
	transport: Arc<dyn AggregationTransport>,
	tokens: Arc<AccessTokenCoordinator>,
	scope: TokenScope,
	providers: RwLock<HashMap<ProviderQuery, Vec<Provider>>>,
	markets: RwLock<Option<Vec<Market>>>,
	writer: AsyncMutex<()>,
	provider_fetches: Singleflight<ProviderQuery, Vec<Provider>>,
	market_fetches: Singleflight<(), Vec<Market>>,
	observers: ObserverRegistry<ProviderQuery>,
}
impl ProviderCatalogStore {
	/// Creates an empty catalog that authenticates through `tokens` for `scope`.
	pub fn new(
		transport: Arc<dyn AggregationTransport>,
		tokens: Arc<AccessTokenCoordinator>,
		scope: TokenScope,
	) -> Self {
		Self {
			transport,
			tokens,
			scope,
			providers: Default::default(),
			markets: Default::default(),
			writer: AsyncMutex::new(()),
			provider_fetches: Default::default(),
			market_fetches: Default::default(),
			observers: Default::default(),
		}
	}

	/// Returns the cached providers for `query` without contacting the service.
	pub fn cached(&self, query: &ProviderQuery) -> Option<Vec<Provider>> {
		self.providers.read().get(query).cloned()
	}

	/// Registers `callback`; it receives the query whose providers changed.
	pub fn subscribe(
		&self,
		callback: impl 'static + Fn(&ProviderQuery) + Send + Sync,
	) -> Subscription {
		self.observers.subscribe(callback)
	}

	/// Returns the providers matching `query`, fetching them on a cache miss.
	pub async fn providers(&self, query: &ProviderQuery) -> Result<Vec<Provider>> {
		const KIND: FlowKind = FlowKind::ListProviders;

		if let Some(providers) = self.cached(query) {
			return Ok(providers);
		}

		let span = FlowSpan::new(KIND, "providers");

		span.instrument(self.provider_fetches.run(query.clone(), || async move {
			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result: Result<Vec<Provider>> = self
				.tokens
				.authorized(&self.scope, |token| {
					let transport = self.transport.clone();

					async move {
						transport
							.list_providers(
								&token,
								&query.market,
								query.capabilities,
								query.include_test_providers,
							)
							.await
					}
				})
				.await
				.map(|providers| {
					providers.into_iter().filter(|provider| query.admits(provider)).collect()
				});

			if let Ok(providers) = &result {
				let _writer = self.writer.lock().await;
				let previous = self.providers.write().insert(query.clone(), providers.clone());

				if previous.as_ref() != Some(providers) {
					self.observers.notify(query);
				}
			}

			obs::record_result(KIND, &result);

			result
		}))
		.await
	}

	/// Returns every market that has providers, fetching it once.
	pub async fn markets(&self) -> Result<Vec<Market>> {
		const KIND: FlowKind = FlowKind::ListMarkets;

		if let Some(markets) = self.markets.read().clone() {
			return Ok(markets);
		}

		let span = FlowSpan::new(KIND, "markets");

		span.instrument(self.market_fetches.run((), || async move {
			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = self
				.tokens
				.authorized(&self.scope, |token| {
					let transport = self.transport.clone();

					async move { transport.list_provider_markets(&token).await }
				})
				.await;

			if let Ok(markets) = &result {
				let _writer = self.writer.lock().await;

				*self.markets.write() = Some(markets.clone());
			}

			obs::record_result(KIND, &result);

			result
		}))
		.await
	}

	/// Drops the cached providers for `query`; the next read fetches again.
	pub fn invalidate(&self, query: &ProviderQuery) {
		self.providers.write().remove(query);
	}

	/// Drops every cached listing and the market list.
	pub fn clear(&self) {
		self.providers.write().clear();
		self.markets.write().take();
	}
}
impl Debug for ProviderCatalogStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderCatalogStore")
			.field("scope", &self.scope)
			.field("cached_queries", &self.providers.read().len())
			.field("observers", &self.observers.len())
			.finish()
	}
}
