//! Commodity Resolver
//!
//! Turns the raw sold and bought lists of one entry into typed sets. Pure:
//! nothing outside the returned value is touched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{EntryScope, ErrorKind, SupplyChainResult};
use crate::templates::{BoughtGroup, TemplateCommodity, TemplateEntry};
use crate::vocabulary::{CommodityType, EntityType, Relationship, Vocabulary};

/// Declared provider multiplicity. Recorded, never enforced here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cardinality {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBoughtGroup {
    pub provider: EntityType,
    pub relationship: Relationship,
    pub commodities: BTreeSet<CommodityType>,
    pub cardinality: Option<Cardinality>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCommodities {
    pub sold: BTreeSet<CommodityType>,
    /// Sold commodities declared with a key.
    pub keyed_sold: BTreeSet<CommodityType>,
    pub bought: Vec<ResolvedBoughtGroup>,
}

pub struct CommodityResolver<'v> {
    vocabulary: &'v dyn Vocabulary,
}

impl<'v> CommodityResolver<'v> {
    pub fn new(vocabulary: &'v dyn Vocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn resolve(
        &self,
        scope: &EntryScope<'_>,
        entry: &TemplateEntry,
    ) -> SupplyChainResult<ResolvedCommodities> {
        if entry.commodity_sold.is_empty() {
            return Err(scope.error("commoditySold", ErrorKind::MissingSoldCommodities));
        }

        let mut resolved = ResolvedCommodities::default();
        for (i, sold) in entry.commodity_sold.iter().enumerate() {
            let field = format!("commoditySold[{}].commodityType", i);
            let comm = self.resolve_template_commodity(scope, &field, sold)?;
            if sold.key.is_some() {
                resolved.keyed_sold.insert(comm);
            }
            resolved.sold.insert(comm);
        }

        for (i, group) in entry.commodity_bought.iter().enumerate() {
            resolved.bought.push(self.resolve_group(scope, i, group)?);
        }

        Ok(resolved)
    }

    /// Resolve one commodity name. `None` means the entry named no type at all.
    pub fn resolve_name(
        &self,
        scope: &EntryScope<'_>,
        field: &str,
        name: Option<&str>,
    ) -> SupplyChainResult<CommodityType> {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => return Err(scope.error(field, ErrorKind::MissingCommodityType)),
        };
        self.vocabulary
            .commodity_type(name)
            .ok_or_else(|| scope.error(field, ErrorKind::UnknownCommodityType(name.to_string())))
    }

    pub fn resolve_entity(
        &self,
        scope: &EntryScope<'_>,
        field: &str,
        name: &str,
    ) -> SupplyChainResult<EntityType> {
        self.vocabulary
            .entity_type(name)
            .ok_or_else(|| scope.error(field, ErrorKind::UnknownEntityType(name.to_string())))
    }

    fn resolve_template_commodity(
        &self,
        scope: &EntryScope<'_>,
        field: &str,
        comm: &TemplateCommodity,
    ) -> SupplyChainResult<CommodityType> {
        self.resolve_name(scope, field, comm.commodity_type.as_deref())
    }

    fn resolve_group(
        &self,
        scope: &EntryScope<'_>,
        index: usize,
        group: &BoughtGroup,
    ) -> SupplyChainResult<ResolvedBoughtGroup> {
        let prefix = format!("commodityBought[{}]", index);

        let provider_ref = group
            .key
            .as_ref()
            .ok_or_else(|| scope.error(format!("{}.key", prefix), ErrorKind::MissingProvider))?;

        let class_field = format!("{}.key.templateClass", prefix);
        let provider = match provider_ref.template_class.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => self.resolve_entity(scope, &class_field, name)?,
            _ => return Err(scope.error(class_field, ErrorKind::MissingProvider)),
        };

        let rel_field = format!("{}.key.providerType", prefix);
        let relationship = match provider_ref.provider_type.as_deref() {
            None => return Err(scope.error(rel_field, ErrorKind::MissingRelationship(provider))),
            Some(label) => label
                .parse::<Relationship>()
                .map_err(|e| scope.error(&rel_field, ErrorKind::UnknownRelationship(e.0)))?,
        };

        let cardinality = match (provider_ref.cardinality_min, provider_ref.cardinality_max) {
            (None, None) => None,
            (Some(min), Some(max)) if min > max => {
                return Err(scope.error(
                    format!("{}.key.cardinalityMin", prefix),
                    ErrorKind::InvalidCardinality { min, max },
                ))
            }
            (min, max) => Some(Cardinality { min, max }),
        };

        let mut commodities = BTreeSet::new();
        for (i, comm) in group.value.iter().enumerate() {
            let field = format!("{}.value[{}].commodityType", prefix, i);
            commodities.insert(self.resolve_template_commodity(scope, &field, comm)?);
        }

        Ok(ResolvedBoughtGroup {
            provider,
            relationship,
            commodities,
            cardinality,
        })
    }
}
