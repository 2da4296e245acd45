//! External Link Validator - Ordered Rules
//!
//! Each rule checks one section of a link declaration and fills in its part
//! of the validated link. Rules run in a fixed order and the first failure
//! rejects the whole template entry: a half-wired link would silently break
//! property propagation downstream.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::commodities::CommodityResolver;
use crate::error::{EntryScope, ErrorKind, SupplyChainResult};
use crate::relationships::check_relationship;
use crate::templates::{ExternalLinkDecl, ExternalLinkEntry, PropertyHandler};
use crate::vocabulary::{CommodityType, EntityType, Relationship};

/// A fully validated cross-entity link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLink {
    pub key: Option<EntityType>,
    pub buyer: EntityType,
    pub seller: EntityType,
    pub relationship: Option<Relationship>,
    /// Commodity key the link matches on, as declared.
    pub link_key: Option<String>,
    pub has_external_entity: bool,
    pub commodities: BTreeSet<CommodityType>,
    pub probe_properties: BTreeSet<String>,
    pub propagations: Vec<PropertyPropagation>,
}

impl ExternalLink {
    fn new(
        key: Option<EntityType>,
        buyer: EntityType,
        seller: EntityType,
        relationship: Option<Relationship>,
        decl: &ExternalLinkDecl,
    ) -> Self {
        Self {
            key,
            buyer,
            seller,
            relationship,
            link_key: decl.key.clone(),
            has_external_entity: decl.has_external_entity.unwrap_or(false),
            commodities: BTreeSet::new(),
            probe_properties: BTreeSet::new(),
            propagations: vec![],
        }
    }

    /// The label this link declares for its seller, when `node` is the buyer.
    pub fn declared_label(&self, node: EntityType) -> Option<Relationship> {
        if self.buyer == node {
            self.relationship
        } else {
            None
        }
    }

    /// True when `node` buys from the seller through a HOSTING link.
    pub fn hosts(&self, node: EntityType) -> bool {
        self.buyer == node && self.relationship.map_or(false, |r| r.is_hosting())
    }
}

/// How an attribute of an external entity is carried over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPropagation {
    pub entity: EntityType,
    pub attribute: Option<String>,
    pub use_topo_ext: bool,
    /// The handler chain, outermost first.
    pub handlers: Vec<HandlerStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerStep {
    pub method_name: String,
    pub entity_type: EntityType,
    pub directly_apply: bool,
}

/// Everything a rule may consult. Upstream results are read-only here.
pub struct LinkContext<'a> {
    pub scope: EntryScope<'a>,
    pub node: EntityType,
    pub resolver: &'a CommodityResolver<'a>,
    /// Provider labels already declared by the entry: bought groups first,
    /// then every link validated before the current one.
    pub labels: &'a BTreeMap<EntityType, Relationship>,
}

impl<'a> LinkContext<'a> {
    fn entity(&self, field: &str, name: Option<&str>) -> SupplyChainResult<EntityType> {
        let name = name.map(str::trim).unwrap_or_default();
        self.resolver.resolve_entity(&self.scope, field, name)
    }
}

/// One validation step over a link declaration.
pub trait LinkRule {
    fn name(&self) -> &'static str;
    fn apply(
        &self,
        ctx: &LinkContext<'_>,
        prefix: &str,
        decl: &ExternalLinkDecl,
        link: &mut ExternalLink,
    ) -> SupplyChainResult<()>;
}

// --- Concrete Rules ---

pub struct ScopeRule;

impl LinkRule for ScopeRule {
    fn name(&self) -> &'static str { "scope" }

    fn apply(
        &self,
        ctx: &LinkContext<'_>,
        prefix: &str,
        _decl: &ExternalLinkDecl,
        link: &mut ExternalLink,
    ) -> SupplyChainResult<()> {
        if ctx.node == link.buyer || ctx.node == link.seller {
            return Ok(());
        }
        Err(ctx.scope.error(
            format!("{}.buyerRef", prefix),
            ErrorKind::InvalidExternalLinkScope {
                node: ctx.node,
                buyer: link.buyer,
                seller: link.seller,
            },
        ))
    }
}

pub struct CommodityDefsRule;

impl LinkRule for CommodityDefsRule {
    fn name(&self) -> &'static str { "commodity_defs" }

    fn apply(
        &self,
        ctx: &LinkContext<'_>,
        prefix: &str,
        decl: &ExternalLinkDecl,
        link: &mut ExternalLink,
    ) -> SupplyChainResult<()> {
        if decl.commodity_defs.is_empty() {
            return Err(ctx.scope.error(
                format!("{}.commodityDefs", prefix),
                ErrorKind::MissingCommodityDefs,
            ));
        }
        for (i, def) in decl.commodity_defs.iter().enumerate() {
            let field = format!("{}.commodityDefs[{}].type", prefix, i);
            let comm = ctx
                .resolver
                .resolve_name(&ctx.scope, &field, def.commodity_type.as_deref())?;
            link.commodities.insert(comm);
        }
        Ok(())
    }
}

pub struct ProbePropertiesRule;

impl LinkRule for ProbePropertiesRule {
    fn name(&self) -> &'static str { "probe_properties" }

    fn apply(
        &self,
        ctx: &LinkContext<'_>,
        prefix: &str,
        decl: &ExternalLinkDecl,
        link: &mut ExternalLink,
    ) -> SupplyChainResult<()> {
        let field = format!("{}.probeEntityPropertyDef", prefix);
        if decl.probe_entity_property_def.is_empty() {
            return Err(ctx.scope.error(
                field,
                ErrorKind::MissingProbeProperties("no definitions".to_string()),
            ));
        }
        for (i, def) in decl.probe_entity_property_def.iter().enumerate() {
            match def.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => {
                    link.probe_properties.insert(name.to_string());
                }
                _ => {
                    return Err(ctx.scope.error(
                        format!("{}[{}].name", field, i),
                        ErrorKind::MissingProbeProperties("definition without a name".to_string()),
                    ))
                }
            }
        }
        Ok(())
    }
}

pub struct ExternalPropertiesRule;

impl ExternalPropertiesRule {
    fn handler_chain(
        ctx: &LinkContext<'_>,
        field: &str,
        handler: Option<&PropertyHandler>,
    ) -> SupplyChainResult<Vec<HandlerStep>> {
        let mut steps = vec![];
        let mut current = match handler {
            Some(h) => h,
            None => {
                return Err(ctx.scope.error(
                    field,
                    ErrorKind::IncompletePropertyHandler("no property handler".to_string()),
                ))
            }
        };
        let mut path = field.to_string();

        loop {
            let method_name = match current.method_name.as_deref().map(str::trim) {
                Some(m) if !m.is_empty() => m.to_string(),
                _ => {
                    return Err(ctx.scope.error(
                        format!("{}.methodName", path),
                        ErrorKind::IncompletePropertyHandler("no method name".to_string()),
                    ))
                }
            };
            let type_field = format!("{}.entityType", path);
            let entity_type = match current.entity_type.as_deref() {
                Some(name) => ctx.entity(&type_field, Some(name))?,
                None => {
                    return Err(ctx.scope.error(
                        type_field,
                        ErrorKind::IncompletePropertyHandler("no entity type".to_string()),
                    ))
                }
            };
            steps.push(HandlerStep {
                method_name,
                entity_type,
                directly_apply: current.directly_apply,
            });

            match current.next_handler.as_deref() {
                Some(next) => {
                    current = next;
                    path.push_str(".nextHandler");
                }
                None => return Ok(steps),
            }
        }
    }
}

impl LinkRule for ExternalPropertiesRule {
    fn name(&self) -> &'static str { "external_properties" }

    fn apply(
        &self,
        ctx: &LinkContext<'_>,
        prefix: &str,
        decl: &ExternalLinkDecl,
        link: &mut ExternalLink,
    ) -> SupplyChainResult<()> {
        let field = format!("{}.externalEntityPropertyDefs", prefix);
        if decl.external_entity_property_defs.is_empty() {
            return Err(ctx.scope.error(field, ErrorKind::MissingExternalPropertyDefs));
        }
        for (i, def) in decl.external_entity_property_defs.iter().enumerate() {
            let entry_field = format!("{}[{}]", field, i);
            let entity_field = format!("{}.entity", entry_field);
            let entity = match def.entity.as_deref() {
                Some(name) => ctx.entity(&entity_field, Some(name))?,
                None => {
                    return Err(ctx.scope.error(
                        entity_field,
                        ErrorKind::IncompletePropertyHandler("no target entity".to_string()),
                    ))
                }
            };
            let handlers = Self::handler_chain(
                ctx,
                &format!("{}.propertyHandler", entry_field),
                def.property_handler.as_ref(),
            )?;
            link.propagations.push(PropertyPropagation {
                entity,
                attribute: def.attribute.clone(),
                use_topo_ext: def.use_topo_ext,
                handlers,
            });
        }
        Ok(())
    }
}

/// A link's label must agree with every label already declared for its seller.
pub struct HostingConsistencyRule;

impl LinkRule for HostingConsistencyRule {
    fn name(&self) -> &'static str { "hosting_consistency" }

    fn apply(
        &self,
        ctx: &LinkContext<'_>,
        prefix: &str,
        _decl: &ExternalLinkDecl,
        link: &mut ExternalLink,
    ) -> SupplyChainResult<()> {
        match link.declared_label(ctx.node) {
            Some(relationship) => {
                check_relationship(ctx.labels, link.seller, relationship)
                    .map_err(|kind| ctx.scope.error(format!("{}.relationship", prefix), kind))
            }
            _ => Ok(()),
        }
    }
}

/// Runs the link rules in order, stopping at the first failure.
pub struct LinkValidator {
    rules: Vec<Box<dyn LinkRule>>,
}

impl LinkValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ScopeRule),
                Box::new(CommodityDefsRule),
                Box::new(ProbePropertiesRule),
                Box::new(ExternalPropertiesRule),
                Box::new(HostingConsistencyRule),
            ],
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate_all(
        &self,
        ctx: &LinkContext<'_>,
        entries: &[ExternalLinkEntry],
    ) -> SupplyChainResult<Vec<ExternalLink>> {
        let mut labels = ctx.labels.clone();
        let mut links = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let current = LinkContext {
                scope: ctx.scope,
                node: ctx.node,
                resolver: ctx.resolver,
                labels: &labels,
            };
            let link = self.validate(&current, i, entry)?;
            if let Some(relationship) = link.declared_label(ctx.node) {
                labels.insert(link.seller, relationship);
            }
            links.push(link);
        }
        Ok(links)
    }

    pub fn validate(
        &self,
        ctx: &LinkContext<'_>,
        index: usize,
        entry: &ExternalLinkEntry,
    ) -> SupplyChainResult<ExternalLink> {
        let prefix = format!("externalLink[{}].value", index);
        let decl = &entry.value;

        // References resolve before any rule sees the link.
        let seller = ctx.entity(&format!("{}.sellerRef", prefix), decl.seller_ref.as_deref())?;
        let buyer = ctx.entity(&format!("{}.buyerRef", prefix), decl.buyer_ref.as_deref())?;
        let key = match entry.key.as_deref() {
            Some(name) => Some(ctx.entity(&format!("externalLink[{}].key", index), Some(name))?),
            None => None,
        };
        let relationship = match decl.relationship.as_deref() {
            Some(label) => Some(label.parse::<Relationship>().map_err(|e| {
                ctx.scope.error(
                    format!("{}.relationship", prefix),
                    ErrorKind::UnknownRelationship(e.0),
                )
            })?),
            None => None,
        };

        let mut link = ExternalLink::new(key, buyer, seller, relationship, decl);
        for rule in &self.rules {
            rule.apply(ctx, &prefix, decl, &mut link)?;
        }
        Ok(link)
    }
}

impl Default for LinkValidator {
    fn default() -> Self {
        Self::new()
    }
}
