//! Deterministic grouping of a flat provider list into a navigable tree.
//!
//! Providers are partitioned by group display name (or institution id when the name is empty),
//! then by financial institution, then by access type. A level with a single member collapses
//! into the level below it, so the tree never contains one-entry groups. Every level is sorted:
//! groups by key, institutions by id, access types by [`AccessType`] order, and providers inside
//! a credential-kind list by credential kind and then name.

// self
use crate::{
	_prelude::*,
	model::{AccessType, FinancialInstitution, FinancialInstitutionId, Provider},
	obs::{FlowKind, FlowSpan},
};

/// Top-level node of the classification tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinancialInstitutionGroup {
	/// The group contains exactly one provider.
	Provider(Provider),
	/// One institution and one access type; pick a credential kind.
	CredentialKinds(Vec<Provider>),
	/// One institution with several access types.
	AccessTypes(Vec<AccessTypeGroup>),
	/// Several institutions share the group.
	FinancialInstitutions(Vec<FinancialInstitutionNode>),
}
impl FinancialInstitutionGroup {
	/// Name to show for the group.
	pub fn display_name(&self) -> &str {
		self.first().map(group_display_name).unwrap_or_default()
	}

	/// Institution of the group; the first one when several share the group.
	pub fn financial_institution(&self) -> Option<&FinancialInstitution> {
		self.first().map(|provider| &provider.financial_institution)
	}

	/// Every provider below this node in tree order.
	pub fn providers(&self) -> Vec<&Provider> {
		match self {
			Self::Provider(provider) => vec![provider],
			Self::CredentialKinds(providers) => providers.iter().collect(),
			Self::AccessTypes(groups) =>
				groups.iter().flat_map(AccessTypeGroup::providers).collect(),
			Self::FinancialInstitutions(nodes) =>
				nodes.iter().flat_map(FinancialInstitutionNode::providers).collect(),
		}
	}

	fn first(&self) -> Option<&Provider> {
		match self {
			Self::Provider(provider) => Some(provider),
			Self::CredentialKinds(providers) => providers.first(),
			Self::AccessTypes(groups) => groups.first().and_then(AccessTypeGroup::first),
			Self::FinancialInstitutions(nodes) =>
				nodes.first().and_then(FinancialInstitutionNode::first),
		}
	}
}

/// Institution entry below a shared group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinancialInstitutionNode {
	/// The institution has exactly one provider.
	Provider(Provider),
	/// One access type; pick a credential kind.
	CredentialKinds(Vec<Provider>),
	/// Several access types.
	AccessTypes(Vec<AccessTypeGroup>),
}
impl FinancialInstitutionNode {
	/// Name of the institution.
	pub fn display_name(&self) -> &str {
		self.first()
			.map(|provider| provider.financial_institution.name.as_str())
			.unwrap_or_default()
	}

	/// The institution this node stands for.
	pub fn financial_institution(&self) -> Option<&FinancialInstitution> {
		self.first().map(|provider| &provider.financial_institution)
	}

	/// Every provider below this node in tree order.
	pub fn providers(&self) -> Vec<&Provider> {
		match self {
			Self::Provider(provider) => vec![provider],
			Self::CredentialKinds(providers) => providers.iter().collect(),
			Self::AccessTypes(groups) =>
				groups.iter().flat_map(AccessTypeGroup::providers).collect(),
		}
	}

	fn first(&self) -> Option<&Provider> {
		match self {
			Self::Provider(provider) => Some(provider),
			Self::CredentialKinds(providers) => providers.first(),
			Self::AccessTypes(groups) => groups.first().and_then(AccessTypeGroup::first),
		}
	}
}

/// Access-type entry below one institution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessTypeGroup {
	/// The access type has exactly one provider.
	Provider(Provider),
	/// Several credential kinds share the access type.
	CredentialKinds(Vec<Provider>),
}
impl AccessTypeGroup {
	/// Access type shared by the entry.
	pub fn access_type(&self) -> AccessType {
		self.first().map(|provider| provider.access_type).unwrap_or_default()
	}

	/// Every provider of the entry.
	pub fn providers(&self) -> Vec<&Provider> {
		match self {
			Self::Provider(provider) => vec![provider],
			Self::CredentialKinds(providers) => providers.iter().collect(),
		}
	}

	fn first(&self) -> Option<&Provider> {
		match self {
			Self::Provider(provider) => Some(provider),
			Self::CredentialKinds(providers) => providers.first(),
		}
	}
}

/// Classifies `providers` into a sorted tree that partitions its input.
pub fn classify(providers: &[Provider]) -> Vec<FinancialInstitutionGroup> {
	let _span = FlowSpan::new(FlowKind::Classify, "classify").entered();
	let mut groups = BTreeMap::<&str, Vec<Provider>>::new();

	for provider in providers {
		groups.entry(provider.group_key()).or_default().push(provider.clone());
	}

	groups.into_values().map(classify_group).collect()
}

fn classify_group(mut providers: Vec<Provider>) -> FinancialInstitutionGroup {
	if let Some(provider) = take_single(&mut providers) {
		return FinancialInstitutionGroup::Provider(provider);
	}

	let mut institutions = partition_by_institution(providers);

	if let Some(providers) = take_single(&mut institutions) {
		return match classify_access_types(providers) {
			AccessTypes::Single(providers) => FinancialInstitutionGroup::CredentialKinds(providers),
			AccessTypes::Several(groups) => FinancialInstitutionGroup::AccessTypes(groups),
		};
	}

	FinancialInstitutionGroup::FinancialInstitutions(
		institutions.into_iter().map(classify_institution).collect(),
	)
}

fn classify_institution(mut providers: Vec<Provider>) -> FinancialInstitutionNode {
	if let Some(provider) = take_single(&mut providers) {
		return FinancialInstitutionNode::Provider(provider);
	}

	match classify_access_types(providers) {
		AccessTypes::Single(providers) => FinancialInstitutionNode::CredentialKinds(providers),
		AccessTypes::Several(groups) => FinancialInstitutionNode::AccessTypes(groups),
	}
}

enum AccessTypes {
	Single(Vec<Provider>),
	Several(Vec<AccessTypeGroup>),
}

fn classify_access_types(providers: Vec<Provider>) -> AccessTypes {
	let mut access_types = BTreeMap::<AccessType, Vec<Provider>>::new();

	for provider in providers {
		access_types.entry(provider.access_type).or_default().push(provider);
	}

	if access_types.len() == 1 {
		return AccessTypes::Single(
			access_types.into_values().flat_map(sort_credential_kinds).collect(),
		);
	}

	AccessTypes::Several(
		access_types
			.into_values()
			.map(|mut providers| match take_single(&mut providers) {
				Some(provider) => AccessTypeGroup::Provider(provider),
				None => AccessTypeGroup::CredentialKinds(sort_credential_kinds(providers)),
			})
			.collect(),
	)
}

fn partition_by_institution(providers: Vec<Provider>) -> Vec<Vec<Provider>> {
	let mut institutions = BTreeMap::<FinancialInstitutionId, Vec<Provider>>::new();

	for provider in providers {
		institutions.entry(provider.financial_institution.id.clone()).or_default().push(provider);
	}

	institutions.into_values().collect()
}

fn take_single<T>(items: &mut Vec<T>) -> Option<T> {
	if items.len() == 1 { items.pop() } else { None }
}

fn sort_credential_kinds(mut providers: Vec<Provider>) -> Vec<Provider> {
	providers.sort_by(|a, b| (a.credential_kind, &a.name).cmp(&(b.credential_kind, &b.name)));

	providers
}

fn group_display_name(provider: &Provider) -> &str {
	if provider.group_display_name.is_empty() {
		provider.financial_institution.name.as_str()
	} else {
		provider.group_display_name.as_str()
	}
}
