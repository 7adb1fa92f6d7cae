//! Credential flows and the [`Link`] context that owns their collaborators.

pub mod add;
pub mod common;
pub mod refresh;
pub mod state;
pub mod supplement;
pub mod third_party;

pub use add::AddCredentialTask;
pub use common::{CancelHandle, CredentialProgress};
pub use refresh::{RefreshCredentialsTask, RefreshResults};
pub use state::{CompletionPredicate, Stage, Transition};
pub use supplement::SupplementInformationTask;
pub use third_party::{AppLauncher, LaunchOutcome, ThirdPartyAppAuthenticationTask};

// self
use crate::{
	_prelude::*,
	config::LinkConfig,
	model::{Credential, CredentialId, ProviderName},
	store::{CredentialStore, ProviderCatalogStore},
	token::AccessTokenCoordinator,
	transport::{AggregationTransport, FieldValues},
};

/// Entry point that wires the token coordinator, both stores, and the flow tasks together.
///
/// Every collaborator is created once per `Link` and shared with the tasks it starts, so all
/// flows of one link see the same credential cache and coalesce onto the same remote calls.
#[derive(Clone)]
pub struct Link {
	config: LinkConfig,
	tokens: Arc<AccessTokenCoordinator>,
	credentials: Arc<CredentialStore>,
	catalog: Arc<ProviderCatalogStore>,
}
impl Link {
	/// Creates a link talking to `transport` with the scope and polling policy of `config`.
	///
	/// Fails when `config` does not validate, e.g. on a zero polling interval.
	pub fn new(transport: Arc<dyn AggregationTransport>, config: LinkConfig) -> Result<Self> {
		config.validate()?;

		let tokens =
			Arc::new(AccessTokenCoordinator::new(transport.clone(), config.max_auth_retries));
		let credentials = Arc::new(CredentialStore::new(
			transport.clone(),
			tokens.clone(),
			config.scope.clone(),
		));
		let catalog =
			Arc::new(ProviderCatalogStore::new(transport, tokens.clone(), config.scope.clone()));

		Ok(Self { config, tokens, credentials, catalog })
	}

	/// Configuration the link was built with.
	pub fn config(&self) -> &LinkConfig {
		&self.config
	}

	/// Shared access-token coordinator.
	pub fn tokens(&self) -> &Arc<AccessTokenCoordinator> {
		&self.tokens
	}

	/// Shared credential store.
	pub fn credentials(&self) -> &Arc<CredentialStore> {
		&self.credentials
	}

	/// Shared provider catalog.
	pub fn catalog(&self) -> &Arc<ProviderCatalogStore> {
		&self.catalog
	}

	/// Starts an [`AddCredentialTask`] for `provider`; must be called inside a Tokio runtime.
	pub fn add_credential(
		&self,
		provider: ProviderName,
		fields: FieldValues,
		predicate: CompletionPredicate,
		on_progress: impl 'static + Fn(CredentialProgress) + Send + Sync,
		on_complete: impl 'static + FnOnce(Result<Credential>) + Send,
	) -> CancelHandle {
		let polling = self.config.polling.clone();

		AddCredentialTask::new(self.credentials.clone(), polling, provider, fields)
			.with_completion_predicate(predicate)
			.start(on_progress, on_complete)
	}

	/// Starts a [`RefreshCredentialsTask`] for `ids`; must be called inside a Tokio runtime.
	pub fn refresh_credentials(
		&self,
		ids: impl IntoIterator<Item = CredentialId>,
		predicate: CompletionPredicate,
		on_progress: impl 'static + Fn(CredentialId, CredentialProgress) + Send + Sync,
		on_complete: impl 'static + FnOnce(Result<RefreshResults>) + Send,
	) -> CancelHandle {
		RefreshCredentialsTask::new(self.credentials.clone(), self.config.polling.clone(), ids)
			.with_completion_predicate(predicate)
			.start(on_progress, on_complete)
	}
}
impl Debug for Link {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Link")
			.field("config", &self.config)
			.field("credentials", &self.credentials)
			.field("catalog", &self.catalog)
			.finish()
	}
}
