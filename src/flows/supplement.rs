//! Supplemental-information hand-off.

// self
use crate::{
	_prelude::*,
	flows::common::{HandoffOutcome, HandoffReceiver, HandoffSender},
	model::{Credential, FieldSpecification},
	store::CredentialStore,
	transport::FieldValues,
};

/// Collects the extra fields a bank asked for while a flow is paused.
///
/// Submitting resumes the flow; cancelling (or dropping every clone of the task without
/// answering) ends it with [`Error::Cancelled`].
#[derive(Clone, Debug)]
pub struct SupplementInformationTask {
	credential: Credential,
	store: Arc<CredentialStore>,
	handoff: HandoffSender,
}
impl SupplementInformationTask {
	pub(crate) fn new(store: Arc<CredentialStore>, credential: Credential) -> (Self, HandoffReceiver) {
		let (handoff, receiver) = HandoffSender::channel();

		(Self { credential, store, handoff }, receiver)
	}

	/// Credential snapshot that requested the information.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Fields the bank asked for.
	pub fn fields(&self) -> &[FieldSpecification] {
		&self.credential.supplemental_information
	}

	/// Returns `true` once the task was submitted or cancelled.
	pub fn is_resolved(&self) -> bool {
		self.handoff.is_resolved()
	}

	/// Sends `fields` to the service and resumes the flow.
	///
	/// A failed submission leaves the task open so it can be retried.
	pub async fn submit(&self, fields: FieldValues) -> Result<()> {
		self.store.supplement_information(&self.credential.id, &fields).await?;
		self.handoff.resolve(HandoffOutcome::Resumed);

		Ok(())
	}

	/// Declines the request and ends the flow as cancelled.
	pub async fn cancel(&self) -> Result<()> {
		self.store.cancel_supplement_information(&self.credential.id).await?;
		self.handoff.resolve(HandoffOutcome::Cancelled);

		Ok(())
	}
}
