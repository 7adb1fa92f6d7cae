//! Third-party app authentication hand-off.

// self
use crate::{
	_prelude::*,
	error::ThirdPartyAppError,
	flows::common::{HandoffOutcome, HandoffReceiver, HandoffSender},
	model::{Credential, ThirdPartyAppAuthentication},
};

/// Result of asking the platform to open a deep link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchOutcome {
	/// The app opened.
	Opened,
	/// No installed app handles the link.
	NotInstalled,
	/// The platform refused to open the link.
	Failed(String),
}

/// Platform hook that opens deep links.
pub trait AppLauncher
where
	Self: Send + Sync,
{
	/// Opens `deep_link` in the app registered for it.
	fn open(&self, deep_link: &Url) -> LaunchOutcome;
}

/// Lets the user approve a login in an external authentication app.
///
/// Opening the app resumes polling while the user approves; cancelling (or dropping every clone
/// of the task) ends the flow with [`Error::Cancelled`].
#[derive(Clone, Debug)]
pub struct ThirdPartyAppAuthenticationTask {
	credential: Credential,
	authentication: ThirdPartyAppAuthentication,
	handoff: HandoffSender,
}
impl ThirdPartyAppAuthenticationTask {
	pub(crate) fn new(
		credential: Credential,
		authentication: ThirdPartyAppAuthentication,
	) -> (Self, HandoffReceiver) {
		let (handoff, receiver) = HandoffSender::channel();

		(Self { credential, authentication, handoff }, receiver)
	}

	/// Credential snapshot waiting for the app.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Hand-off data supplied by the service.
	pub fn authentication(&self) -> &ThirdPartyAppAuthentication {
		&self.authentication
	}

	/// Returns `true` once the app was opened or the task cancelled.
	pub fn is_resolved(&self) -> bool {
		self.handoff.is_resolved()
	}

	/// Opens the authentication app and resumes the flow.
	///
	/// When the app is missing the error carries the download prompt; the task stays open so the
	/// user can install the app and try again.
	pub fn open(&self, launcher: &dyn AppLauncher) -> Result<()> {
		let deep_link =
			self.authentication.deep_link.as_ref().ok_or(ThirdPartyAppError::MissingDeepLink)?;

		match launcher.open(deep_link) {
			LaunchOutcome::Opened => {
				self.handoff.resolve(HandoffOutcome::Resumed);

				Ok(())
			},
			LaunchOutcome::NotInstalled => Err(ThirdPartyAppError::AppNotInstalled {
				title: self.authentication.download_title.clone(),
				message: self.authentication.download_message.clone(),
				download_url: self.authentication.download_url.clone(),
			}
			.into()),
			LaunchOutcome::Failed(reason) => Err(ThirdPartyAppError::LaunchFailed { reason }.into()),
		}
	}

	/// Abandons the hand-off and ends the flow as cancelled.
	pub fn cancel(&self) {
		self.handoff.resolve(HandoffOutcome::Cancelled);
	}
}
