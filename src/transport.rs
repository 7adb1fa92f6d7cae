//! Remote surface of the aggregation service.
//!
//! [`AggregationTransport`] is the crate's only dependency on a wire stack. Implementations
//! own the per-call timeout (reported as [`TransportError::Timeout`]) and map rejected tokens
//! to [`Error::AuthenticationRejected`] so the token coordinator can re-acquire once.
//!
//! [`TransportError::Timeout`]: crate::error::TransportError::Timeout

pub mod memory;

pub use memory::{MemoryTransport, RemoteCall, StatusStep};

// self
use crate::{
	_prelude::*,
	model::{
		AccessToken, Capabilities, Credential, CredentialId, Locale, Market, Provider,
		ProviderName,
	},
};

/// Boxed future returned by every [`AggregationTransport`] call.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Field name → value pairs submitted with a form.
pub type FieldValues = BTreeMap<String, String>;

/// Remote operations consumed from the aggregation service.
pub trait AggregationTransport
where
	Self: Send + Sync,
{
	/// Creates an anonymous user for the market + locale and returns its access token.
	fn create_anonymous_user<'a>(
		&'a self,
		market: &'a Market,
		locale: &'a Locale,
	) -> TransportFuture<'a, AccessToken>;

	/// Lists providers of a market, filtered by capability (empty = all).
	fn list_providers<'a>(
		&'a self,
		token: &'a AccessToken,
		market: &'a Market,
		capabilities: Capabilities,
		include_test_providers: bool,
	) -> TransportFuture<'a, Vec<Provider>>;

	/// Lists markets that have at least one provider.
	fn list_provider_markets<'a>(&'a self, token: &'a AccessToken)
	-> TransportFuture<'a, Vec<Market>>;

	/// Creates a credential for a provider; the service answers once it accepted the request.
	fn create_credential<'a>(
		&'a self,
		token: &'a AccessToken,
		provider: &'a ProviderName,
		fields: &'a FieldValues,
	) -> TransportFuture<'a, Credential>;

	/// Lists every credential of the user.
	fn list_credentials<'a>(&'a self, token: &'a AccessToken)
	-> TransportFuture<'a, Vec<Credential>>;

	/// Requests a data refresh for the provided credentials.
	fn refresh_credentials<'a>(
		&'a self,
		token: &'a AccessToken,
		ids: &'a [CredentialId],
	) -> TransportFuture<'a, ()>;

	/// Submits supplemental information for a credential.
	fn supplement_information<'a>(
		&'a self,
		token: &'a AccessToken,
		id: &'a CredentialId,
		fields: &'a FieldValues,
	) -> TransportFuture<'a, ()>;

	/// Declines to provide supplemental information for a credential.
	fn cancel_supplement_information<'a>(
		&'a self,
		token: &'a AccessToken,
		id: &'a CredentialId,
	) -> TransportFuture<'a, ()>;

	/// Deletes a credential.
	fn delete_credential<'a>(
		&'a self,
		token: &'a AccessToken,
		id: &'a CredentialId,
	) -> TransportFuture<'a, ()>;
}
