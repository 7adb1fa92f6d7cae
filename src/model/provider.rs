//! Provider catalog entries: one connection method of one financial institution.

// self
use crate::{
	_prelude::*,
	model::{CredentialKind, FinancialInstitutionId, Market, ProviderName},
};

bitflags::bitflags! {
	/// Capabilities a provider supports.
	#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
	#[serde(transparent)]
	pub struct Capabilities: u32 {
		/// Money transfers.
		const TRANSFERS = 1 << 0;
		/// Savings accounts.
		const SAVINGS_ACCOUNTS = 1 << 1;
		/// Checking accounts.
		const CHECKING_ACCOUNTS = 1 << 2;
		/// Credit-card accounts.
		const CREDIT_CARDS = 1 << 3;
		/// Investment accounts.
		const INVESTMENTS = 1 << 4;
		/// Loan accounts.
		const LOANS = 1 << 5;
		/// Mortgage accounts.
		const MORTGAGES = 1 << 6;
		/// Payment initiation.
		const PAYMENTS = 1 << 7;
		/// Account-holder identity data.
		const IDENTITY_DATA = 1 << 8;
		/// E-invoices.
		const EINVOICES = 1 << 9;
		/// Portfolio holdings.
		const PORTFOLIOS = 1 << 10;
	}
}

/// How the service obtains data from the institution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
	/// Regulated open-banking API.
	OpenBanking,
	/// Any other integration.
	Other,
	/// Not reported by the service.
	#[default]
	Unknown,
}

/// Kind of institution a provider connects to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// Not reported by the service.
	#[default]
	Unknown,
	/// Bank.
	Bank,
	/// Credit-card issuer.
	CreditCard,
	/// Broker.
	Broker,
	/// Other institution.
	Other,
	/// Test provider; hidden unless explicitly requested.
	Test,
	/// Fraud-report provider.
	Fraud,
}

/// Availability of a provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
	/// Not reported by the service.
	#[default]
	Unknown,
	/// Usable.
	Enabled,
	/// Not usable.
	Disabled,
	/// Briefly unavailable.
	TemporarilyDisabled,
	/// Replaced by another provider.
	Obsolete,
}

/// Institution a provider belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FinancialInstitution {
	/// Identifier shared by all providers of the institution.
	pub id: FinancialInstitutionId,
	/// Display name of the institution.
	pub name: String,
}

/// Description of one input field the user must fill in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpecification {
	/// Field key sent back to the service.
	pub name: String,
	/// Human-readable label.
	pub description: String,
	/// Placeholder hint.
	pub hint: String,
	/// Whether input must be masked.
	pub masked: bool,
	/// Minimum accepted length.
	pub min_length: Option<usize>,
	/// Maximum accepted length.
	pub max_length: Option<usize>,
	/// Regular expression the value must match.
	pub pattern: Option<String>,
	/// Message shown when the pattern does not match.
	pub pattern_error: Option<String>,
	/// Whether the value can no longer be changed once set.
	pub immutable: bool,
	/// Whether the field may be left empty.
	pub optional: bool,
	/// Prefilled value.
	pub value: Option<String>,
}

/// Immutable catalog entry describing one connection method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
	/// Unique provider name.
	pub name: ProviderName,
	/// Display name shown to users.
	pub display_name: String,
	/// Institution kind.
	pub kind: ProviderKind,
	/// Availability.
	pub status: ProviderStatus,
	/// Authentication mechanism credentials for this provider use.
	pub credential_kind: CredentialKind,
	/// Supported capabilities.
	pub capabilities: Capabilities,
	/// Data access mechanism.
	pub access_type: AccessType,
	/// Market the provider belongs to.
	pub market: Market,
	/// Owning institution.
	pub financial_institution: FinancialInstitution,
	/// Name used to group providers across institutions (for example a bank family).
	pub group_display_name: String,
	/// Popularity flag, passed through unchanged from the service.
	pub is_popular: bool,
	/// Fields required to create a credential.
	pub fields: Vec<FieldSpecification>,
}
impl Provider {
	/// Key used to group this provider at the top level of the catalog tree.
	pub fn group_key(&self) -> &str {
		if self.group_display_name.is_empty() {
			self.financial_institution.id.as_ref()
		} else {
			self.group_display_name.as_str()
		}
	}

	/// Returns `true` for test providers.
	pub fn is_test(&self) -> bool {
		matches!(self.kind, ProviderKind::Test)
	}
}
