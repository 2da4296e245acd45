//! Relationship Deriver
//!
//! Splits resolved bought groups into "buys from" and "is hosted by". Every
//! group lands in the bought map; only HOSTING groups feed the hosting maps,
//! which downstream consumers use for property inheritance.

use std::collections::{BTreeMap, BTreeSet};

use crate::commodities::{Cardinality, ResolvedBoughtGroup};
use crate::error::{EntryScope, ErrorKind, SupplyChainResult};
use crate::vocabulary::{CommodityType, EntityType, Relationship};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedRelationships {
    pub bought: BTreeMap<EntityType, BTreeSet<CommodityType>>,
    /// Relationship label of every provider, hosting or not.
    pub provider_relationships: BTreeMap<EntityType, Relationship>,
    pub provider_cardinality: BTreeMap<EntityType, Cardinality>,
    pub hosted_by_type: BTreeMap<EntityType, Relationship>,
    pub hosted_by_comms: BTreeMap<EntityType, BTreeSet<CommodityType>>,
}

/// Fails when `provider` already carries a label other than `declared`.
pub fn check_relationship(
    labels: &BTreeMap<EntityType, Relationship>,
    provider: EntityType,
    declared: Relationship,
) -> Result<(), ErrorKind> {
    match labels.get(&provider) {
        Some(existing) if *existing != declared => Err(ErrorKind::ConflictingHostRelationship {
            provider,
            existing: *existing,
            declared,
        }),
        _ => Ok(()),
    }
}

pub fn derive(
    scope: &EntryScope<'_>,
    groups: &[ResolvedBoughtGroup],
) -> SupplyChainResult<DerivedRelationships> {
    let mut derived = DerivedRelationships::default();

    for (i, group) in groups.iter().enumerate() {
        check_relationship(&derived.provider_relationships, group.provider, group.relationship)
            .map_err(|kind| scope.error(format!("commodityBought[{}].key.providerType", i), kind))?;
        derived
            .provider_relationships
            .insert(group.provider, group.relationship);

        derived
            .bought
            .entry(group.provider)
            .or_default()
            .extend(group.commodities.iter().copied());

        if let Some(cardinality) = group.cardinality {
            derived
                .provider_cardinality
                .entry(group.provider)
                .or_insert(cardinality);
        }

        if group.relationship.is_hosting() {
            derived.hosted_by_type.insert(group.provider, group.relationship);
            derived
                .hosted_by_comms
                .entry(group.provider)
                .or_default()
                .extend(group.commodities.iter().copied());
        }
    }

    Ok(derived)
}
