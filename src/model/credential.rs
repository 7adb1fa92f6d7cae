//! Credential snapshots and their lifecycle statuses.

// self
use crate::{
	_prelude::*,
	model::{CredentialId, FieldSpecification, ProviderName},
};

/// Authentication mechanism a credential (or provider) uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
	/// Mechanism not reported by the service.
	#[default]
	Unknown,
	/// Username and password.
	Password,
	/// Mobile identification app (for example BankID).
	MobileId,
	/// Hardware code generator.
	Keyfob,
	/// Fraud-report credential.
	Fraud,
	/// Authentication approved inside a third-party app.
	ThirdPartyApp,
}

/// Lifecycle status reported for a credential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
	/// Status not recognized by this client.
	#[default]
	Unknown,
	/// The service accepted the create/refresh request.
	Created,
	/// The service is authenticating against the bank.
	Authenticating,
	/// The bank asks for additional user input.
	AwaitingSupplementalInformation,
	/// The user must approve the login in an external app.
	AwaitingThirdPartyAppAuthentication,
	/// Authentication succeeded; data is being imported.
	Updating,
	/// Data import finished.
	Updated,
	/// Temporary service-side failure.
	TemporaryError,
	/// The bank rejected the authentication.
	AuthenticationError,
	/// Unrecoverable failure.
	PermanentError,
	/// The bank session expired.
	SessionExpired,
	/// The credential was disabled.
	Disabled,
	/// The credential was deleted.
	Deleted,
}
impl CredentialStatus {
	/// Returns a stable label suitable for logs and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unknown => "unknown",
			Self::Created => "created",
			Self::Authenticating => "authenticating",
			Self::AwaitingSupplementalInformation => "awaiting_supplemental_information",
			Self::AwaitingThirdPartyAppAuthentication => "awaiting_third_party_app_authentication",
			Self::Updating => "updating",
			Self::Updated => "updated",
			Self::TemporaryError => "temporary_error",
			Self::AuthenticationError => "authentication_error",
			Self::PermanentError => "permanent_error",
			Self::SessionExpired => "session_expired",
			Self::Disabled => "disabled",
			Self::Deleted => "deleted",
		}
	}

	/// Returns `true` once no further status transitions are expected from polling.
	pub const fn is_terminal(self) -> bool {
		matches!(
			self,
			Self::Updated
				| Self::TemporaryError
				| Self::AuthenticationError
				| Self::PermanentError
				| Self::SessionExpired
				| Self::Disabled
				| Self::Deleted
		)
	}

	/// Returns `true` while the credential waits for the user.
	pub const fn is_awaiting_user(self) -> bool {
		matches!(
			self,
			Self::AwaitingSupplementalInformation | Self::AwaitingThirdPartyAppAuthentication
		)
	}
}
impl Display for CredentialStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Deep-link hand-off data attached while awaiting third-party app authentication.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirdPartyAppAuthentication {
	/// Deep link that opens the authentication app.
	pub deep_link: Option<Url>,
	/// Title of the prompt shown when the app must be downloaded.
	pub download_title: String,
	/// Message of the prompt shown when the app must be downloaded.
	pub download_message: String,
	/// App-store link for the authentication app.
	pub download_url: Option<Url>,
	/// Title of the prompt shown when the app must be upgraded.
	pub upgrade_title: String,
	/// Message of the prompt shown when the app must be upgraded.
	pub upgrade_message: String,
}

/// Immutable snapshot of a linked credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Service-assigned identifier.
	pub id: CredentialId,
	/// Provider the credential links to.
	pub provider: ProviderName,
	/// Authentication mechanism.
	pub kind: CredentialKind,
	/// Current lifecycle status.
	pub status: CredentialStatus,
	/// Message attached to the current status.
	pub status_message: Option<String>,
	/// Instant the status last changed.
	pub status_updated: Option<OffsetDateTime>,
	/// Instant of the last successful data import.
	pub updated: Option<OffsetDateTime>,
	/// Field values the credential was created with (secrets are never echoed back).
	pub fields: BTreeMap<String, String>,
	/// Fields requested while awaiting supplemental information.
	pub supplemental_information: Vec<FieldSpecification>,
	/// Hand-off data while awaiting third-party app authentication.
	pub third_party_app_authentication: Option<ThirdPartyAppAuthentication>,
	/// Instant the bank session expires.
	pub session_expiry: Option<OffsetDateTime>,
}
impl Credential {
	/// Creates a snapshot in the [`CredentialStatus::Created`] status.
	pub fn new(id: CredentialId, provider: ProviderName, kind: CredentialKind) -> Self {
		Self {
			id,
			provider,
			kind,
			status: CredentialStatus::Created,
			status_message: None,
			status_updated: None,
			updated: None,
			fields: BTreeMap::new(),
			supplemental_information: Vec::new(),
			third_party_app_authentication: None,
			session_expiry: None,
		}
	}

	/// Returns the status message or an empty string.
	pub fn message(&self) -> &str {
		self.status_message.as_deref().unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn terminal_and_awaiting_sets_are_disjoint() {
		let all = [
			CredentialStatus::Unknown,
			CredentialStatus::Created,
			CredentialStatus::Authenticating,
			CredentialStatus::AwaitingSupplementalInformation,
			CredentialStatus::AwaitingThirdPartyAppAuthentication,
			CredentialStatus::Updating,
			CredentialStatus::Updated,
			CredentialStatus::TemporaryError,
			CredentialStatus::AuthenticationError,
			CredentialStatus::PermanentError,
			CredentialStatus::SessionExpired,
			CredentialStatus::Disabled,
			CredentialStatus::Deleted,
		];

		for status in all {
			assert!(!(status.is_terminal() && status.is_awaiting_user()), "{status} overlaps.");
		}

		assert!(CredentialStatus::Updated.is_terminal());
		assert!(!CredentialStatus::Updating.is_terminal());
	}

	#[test]
	fn statuses_serialize_as_snake_case() {
		let payload = serde_json::to_string(&CredentialStatus::AwaitingSupplementalInformation)
			.expect("Status should serialize to JSON.");

		assert_eq!(payload, "\"awaiting_supplemental_information\"");
	}
}
