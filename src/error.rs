//! Link-level error types shared across stores, pollers, and flows.
//!
//! Every variant is cheap to clone so a single failure can be handed to all callers that were
//! coalesced onto the same remote call.

// self
use crate::{
	_prelude::*,
	model::{CredentialId, CredentialStatus, IdentifierError},
};

/// Link-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (network, timeout, unexpected response).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The credential ended in an error status.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Third-party app hand-off could not be completed.
	#[error(transparent)]
	ThirdPartyApp(#[from] ThirdPartyAppError),

	/// The service rejected the access token or anonymous-user request.
	#[error("Authentication was rejected: {reason}.")]
	AuthenticationRejected {
		/// Service-supplied reason string.
		reason: String,
	},
	/// A credential reached a status that is not valid for the running operation.
	#[error("Credential `{credential}` entered the unexpected status {status}.")]
	UnexpectedStatus {
		/// Credential that misbehaved.
		credential: CredentialId,
		/// Status that was observed.
		status: CredentialStatus,
	},
	/// A poll result did not contain a credential the operation is tracking.
	#[error("Credential `{id}` is unknown to the service.")]
	UnknownCredential {
		/// Identifier that was missing.
		id: CredentialId,
	},
	/// The operation was cancelled by the caller.
	#[error("Operation was cancelled.")]
	Cancelled,
}
impl Error {
	/// Returns `true` when the error was caused by a rejected access token.
	pub fn is_authentication_rejected(&self) -> bool {
		matches!(self, Self::AuthenticationRejected { .. })
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// Configuration document could not be decoded.
	#[error("Configuration is invalid at `{path}`.")]
	Decode {
		/// Path of the offending field.
		path: String,
		/// Underlying decoding failure.
		#[source]
		source: Arc<serde_json::Error>,
	},
	/// Polling must wait a positive amount of time between requests.
	#[error("Polling interval must be positive.")]
	NonPositiveInterval,
	/// An identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Decode { path, source: Arc::new(e.into_inner()) }
	}
}

/// Transport-level failures (network, timeout, malformed response).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying client reported a network failure.
	#[error("Network error occurred while calling the aggregation service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// The per-call timeout configured on the transport elapsed.
	#[error("Request to the aggregation service timed out.")]
	Timeout,
	/// Service answered with an unexpected status.
	#[error("Aggregation service returned an unexpected response: {message}.")]
	Status {
		/// Status code, when available.
		code: Option<u16>,
		/// Service-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::network(e)
	}
}

/// Terminal credential error statuses surfaced by flow tasks.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// Temporary service-side problem; restarting the flow later may succeed.
	#[error("Temporary credential error: {message}.")]
	Temporary {
		/// Status message reported with the credential.
		message: String,
	},
	/// The bank rejected the supplied authentication.
	#[error("Credential authentication failed: {message}.")]
	Authentication {
		/// Status message reported with the credential.
		message: String,
	},
	/// The credential cannot be used without user intervention.
	#[error("Permanent credential error: {message}.")]
	Permanent {
		/// Status message reported with the credential.
		message: String,
	},
}

/// Failures raised while handing authentication off to a third-party app.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ThirdPartyAppError {
	/// The credential did not carry a deep link to open.
	#[error("Third-party app authentication is missing a deep link.")]
	MissingDeepLink,
	/// The app is not installed; the download prompt should be shown.
	#[error("Authentication app is not installed: {title}.")]
	AppNotInstalled {
		/// Download prompt title.
		title: String,
		/// Download prompt message.
		message: String,
		/// App-store link, when the service supplied one.
		download_url: Option<Url>,
	},
	/// The platform failed to open the deep link.
	#[error("Opening the authentication app failed: {reason}.")]
	LaunchFailed {
		/// Platform-supplied reason.
		reason: String,
	},
}
