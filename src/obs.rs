//! Optional observability helpers for link operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `aggregator_link.flow` with
//!   the `flow` (operation) and `stage` (call site) fields, plus debug events for credential
//!   status changes and rejected tokens.
//! - Enable `metrics` to increment the `aggregator_link_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and
//!   `aggregator_link_token_rejected_total` for every re-authentication.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Anonymous-user token acquisition.
	AcquireToken,
	/// Provider catalog fetch.
	ListProviders,
	/// Provider market fetch.
	ListMarkets,
	/// Credential list fetch.
	ListCredentials,
	/// Credential mutation (create, refresh, supplement, delete).
	MutateCredential,
	/// Add-credential flow task.
	AddCredential,
	/// Refresh-credentials flow task.
	RefreshCredentials,
	/// Provider classification.
	Classify,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AcquireToken => "acquire_token",
			FlowKind::ListProviders => "list_providers",
			FlowKind::ListMarkets => "list_markets",
			FlowKind::ListCredentials => "list_credentials",
			FlowKind::MutateCredential => "mutate_credential",
			FlowKind::AddCredential => "add_credential",
			FlowKind::RefreshCredentials => "refresh_credentials",
			FlowKind::Classify => "classify",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// The caller cancelled the operation.
	Cancelled,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Cancelled => "cancelled",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the final outcome of `result` for `kind`.
pub(crate) fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	let outcome = match result {
		Ok(_) => FlowOutcome::Success,
		Err(Error::Cancelled) => FlowOutcome::Cancelled,
		Err(_) => FlowOutcome::Failure,
	};

	record_flow_outcome(kind, outcome);
}
