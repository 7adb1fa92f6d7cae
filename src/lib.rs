//! Client-side orchestration for linking bank credentials to a financial-data aggregation
//! service: coalesced token and catalog fetches, backoff-driven credential polling and a
//! deterministic provider classifier.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod classify;
pub mod config;
pub mod error;
pub mod flows;
pub mod model;
pub mod obs;
pub mod observer;
pub mod poll;
pub mod store;
pub mod token;
pub mod transport;

mod flight;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixture builders for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::{LinkConfig, PollingConfig},
		flows::Link,
		model::{
			AccessType, Capabilities, CredentialKind, FinancialInstitution,
			FinancialInstitutionId, Locale, Market, Provider, ProviderKind, ProviderName,
			ProviderStatus, TokenScope,
		},
		poll::BackoffPolicy,
		transport::{AggregationTransport, MemoryTransport},
	};

	/// Token scope used across fixtures.
	pub fn test_scope() -> TokenScope {
		TokenScope::new(
			Market::new("SE").expect("Market fixture should be valid."),
			Locale::new("sv_SE").expect("Locale fixture should be valid."),
		)
	}

	/// Builds a provider fixture with the attributes the classifier and stores care about.
	pub fn test_provider(
		name: &str,
		group: &str,
		institution: &str,
		access_type: AccessType,
		credential_kind: CredentialKind,
	) -> Provider {
		Provider {
			name: ProviderName::new(name).expect("Provider name fixture should be valid."),
			display_name: name.to_owned(),
			kind: ProviderKind::Bank,
			status: ProviderStatus::Enabled,
			credential_kind,
			capabilities: Capabilities::CHECKING_ACCOUNTS | Capabilities::TRANSFERS,
			access_type,
			market: Market::new("SE").expect("Market fixture should be valid."),
			financial_institution: FinancialInstitution {
				id: FinancialInstitutionId::new(institution)
					.expect("Institution fixture should be valid."),
				name: institution.to_owned(),
			},
			group_display_name: group.to_owned(),
			is_popular: false,
			fields: Vec::new(),
		}
	}

	/// Configuration with a fixed polling interval, suited to paused-clock tests.
	pub fn test_config() -> LinkConfig {
		LinkConfig::new(test_scope())
			.with_polling(PollingConfig::default().with_backoff(BackoffPolicy::None))
	}

	/// Builds a [`Link`] over a fresh [`MemoryTransport`].
	pub fn build_test_link() -> (Link, Arc<MemoryTransport>) {
		let transport = Arc::new(MemoryTransport::default());
		let remote: Arc<dyn AggregationTransport> = transport.clone();

		(Link::new(remote, test_config()).expect("Test config should be valid."), transport)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::{Mutex as AsyncMutex, OnceCell};
	pub use parking_lot::{Mutex, ReentrantMutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
