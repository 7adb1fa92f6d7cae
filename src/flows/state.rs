//! Pure status-to-progress mapping shared by the add and refresh flows.
//!
//! ```text
//! Created -> Authenticating -> (AwaitingSupplementalInformation | AwaitingThirdPartyAppAuthentication)*
//!         -> Updating -> Updated
//! ```
//!
//! `TemporaryError`, `AuthenticationError` and `PermanentError` end a flow with a
//! [`CredentialError`]. `SessionExpired`, `Disabled`, `Deleted` and `Unknown` are not part of a
//! create or refresh and end it with [`Error::UnexpectedStatus`].

// self
use crate::{
	_prelude::*,
	error::{CredentialError, ThirdPartyAppError},
	model::{Credential, CredentialStatus, ThirdPartyAppAuthentication},
};

/// Status at which a flow reports completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPredicate {
	/// Complete as soon as the service starts importing data.
	Updating,
	/// Complete once the data import finished.
	#[default]
	Updated,
}
impl CompletionPredicate {
	/// Returns `true` when `status` satisfies the predicate.
	pub const fn is_satisfied_by(self, status: CredentialStatus) -> bool {
		match self {
			Self::Updating =>
				matches!(status, CredentialStatus::Updating | CredentialStatus::Updated),
			Self::Updated => matches!(status, CredentialStatus::Updated),
		}
	}
}

/// Progress stage that needs no user interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
	/// The service accepted the request.
	Created,
	/// The service is authenticating against the bank.
	Authenticating,
	/// Data is being imported; carries the service's status message.
	Updating(String),
	/// Data import finished.
	Updated,
}

/// What a flow does with one observed status change.
#[derive(Clone, Debug)]
pub enum Transition {
	/// Report `stage`; finish successfully afterwards when `complete` is set.
	Progress {
		/// Stage to report.
		stage: Stage,
		/// Whether the completion predicate is satisfied.
		complete: bool,
	},
	/// Hand supplemental information off to the user and wait.
	SupplementalInformation,
	/// Hand third-party app authentication off to the user and wait.
	ThirdPartyAppAuthentication(ThirdPartyAppAuthentication),
	/// End the flow with an error.
	Failed(Error),
}

/// Maps one observed credential to the flow's next step.
pub fn transition(predicate: CompletionPredicate, credential: &Credential) -> Transition {
	let progress = |stage| Transition::Progress {
		stage,
		complete: predicate.is_satisfied_by(credential.status),
	};

	match credential.status {
		CredentialStatus::Created => progress(Stage::Created),
		CredentialStatus::Authenticating => progress(Stage::Authenticating),
		CredentialStatus::Updating => progress(Stage::Updating(credential.message().to_owned())),
		CredentialStatus::Updated => progress(Stage::Updated),
		CredentialStatus::AwaitingSupplementalInformation => Transition::SupplementalInformation,
		CredentialStatus::AwaitingThirdPartyAppAuthentication =>
			match &credential.third_party_app_authentication {
				Some(authentication) =>
					Transition::ThirdPartyAppAuthentication(authentication.clone()),
				None => Transition::Failed(ThirdPartyAppError::MissingDeepLink.into()),
			},
		CredentialStatus::TemporaryError => Transition::Failed(
			CredentialError::Temporary { message: credential.message().to_owned() }.into(),
		),
		CredentialStatus::AuthenticationError => Transition::Failed(
			CredentialError::Authentication { message: credential.message().to_owned() }.into(),
		),
		CredentialStatus::PermanentError => Transition::Failed(
			CredentialError::Permanent { message: credential.message().to_owned() }.into(),
		),
		status @ (CredentialStatus::SessionExpired
		| CredentialStatus::Disabled
		| CredentialStatus::Deleted
		| CredentialStatus::Unknown) =>
			Transition::Failed(Error::UnexpectedStatus { credential: credential.id.clone(), status }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::model::{CredentialId, CredentialKind, ProviderName};

	fn credential(status: CredentialStatus) -> Credential {
		let mut credential = Credential::new(
			CredentialId::new("credential-1").expect("Credential fixture should be valid."),
			ProviderName::new("seb-bankid").expect("Provider fixture should be valid."),
			CredentialKind::MobileId,
		);

		credential.status = status;

		credential
	}

	fn completes(predicate: CompletionPredicate, status: CredentialStatus) -> bool {
		matches!(
			transition(predicate, &credential(status)),
			Transition::Progress { complete: true, .. }
		)
	}

	#[test]
	fn predicates_only_move_the_completion_point() {
		assert!(!completes(CompletionPredicate::Updating, CredentialStatus::Authenticating));
		assert!(completes(CompletionPredicate::Updating, CredentialStatus::Updating));
		assert!(completes(CompletionPredicate::Updating, CredentialStatus::Updated));
		assert!(!completes(CompletionPredicate::Updated, CredentialStatus::Updating));
		assert!(completes(CompletionPredicate::Updated, CredentialStatus::Updated));
	}

	#[test]
	fn updating_carries_the_status_message() {
		let mut updating = credential(CredentialStatus::Updating);

		updating.status_message = Some("Fetching accounts".into());

		assert!(matches!(
			transition(CompletionPredicate::Updated, &updating),
			Transition::Progress { stage: Stage::Updating(message), complete: false }
				if message == "Fetching accounts"
		));
	}

	#[test]
	fn error_statuses_fail_with_their_message() {
		let mut rejected = credential(CredentialStatus::AuthenticationError);

		rejected.status_message = Some("Wrong password".into());

		assert!(matches!(
			transition(CompletionPredicate::Updated, &rejected),
			Transition::Failed(Error::Credential(CredentialError::Authentication { message }))
				if message == "Wrong password"
		));
	}

	#[test]
	fn out_of_band_statuses_are_unexpected() {
		for status in [
			CredentialStatus::SessionExpired,
			CredentialStatus::Disabled,
			CredentialStatus::Deleted,
			CredentialStatus::Unknown,
		] {
			assert!(matches!(
				transition(CompletionPredicate::Updated, &credential(status)),
				Transition::Failed(Error::UnexpectedStatus { status: observed, .. })
					if observed == status
			));
		}
	}

	#[test]
	fn hand_offs_require_their_payload() {
		assert!(matches!(
			transition(
				CompletionPredicate::Updated,
				&credential(CredentialStatus::AwaitingSupplementalInformation)
			),
			Transition::SupplementalInformation
		));
		assert!(matches!(
			transition(
				CompletionPredicate::Updated,
				&credential(CredentialStatus::AwaitingThirdPartyAppAuthentication)
			),
			Transition::Failed(Error::ThirdPartyApp(ThirdPartyAppError::MissingDeepLink))
		));
	}
}
