//! Graph Assembler and the sealed SupplyChain
//!
//! Entries for the same entity type merge additively. Each node field has its
//! own merge function so conflict detection stays in one place.

use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::commodities::{Cardinality, ResolvedCommodities};
use crate::error::{EntryScope, ErrorKind, SupplyChainResult};
use crate::hashing::compute_fingerprint;
use crate::relationships::DerivedRelationships;
use crate::validation::ExternalLink;
use crate::vocabulary::{CommodityType, EntityType, Relationship, TemplateKind};

pub type CommodityMap = BTreeMap<EntityType, BTreeSet<CommodityType>>;
pub type RelationshipMap = BTreeMap<EntityType, Relationship>;

/// Precedence metadata of one contributing entry. Never affects topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    pub kind: Option<TemplateKind>,
    pub priority: Option<i32>,
}

/// One assembled entity in the supply chain.
///
/// `hosted_by_provider_comms` and `hosted_by_provider_props` are keyed by every
/// link seller, so they may hold providers absent from `hosted_by_provider_type`
/// (non-HOSTING links, or links where this node is the seller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub entity_type: EntityType,
    pub supported_sold_comms: BTreeSet<CommodityType>,
    pub keyed_sold_comms: BTreeSet<CommodityType>,
    pub supported_bought_comms: CommodityMap,
    pub provider_relationships: RelationshipMap,
    pub provider_cardinality: BTreeMap<EntityType, Cardinality>,
    /// Labels declared by links where this node is the buyer.
    pub link_relationships: RelationshipMap,
    pub hosted_by_provider_type: RelationshipMap,
    pub hosted_by_provider_comms: CommodityMap,
    pub hosted_by_provider_props: BTreeMap<EntityType, BTreeSet<String>>,
    pub external_links: Vec<ExternalLink>,
    pub templates: Vec<TemplateMeta>,
}

impl Node {
    /// Build a node from one entry's validated stages. External links feed
    /// the hosting maps keyed by their seller.
    pub fn from_parts(
        entity_type: EntityType,
        commodities: ResolvedCommodities,
        derived: DerivedRelationships,
        external_links: Vec<ExternalLink>,
        meta: TemplateMeta,
    ) -> Self {
        let mut node = Self {
            entity_type,
            supported_sold_comms: commodities.sold,
            keyed_sold_comms: commodities.keyed_sold,
            supported_bought_comms: derived.bought,
            provider_relationships: derived.provider_relationships,
            provider_cardinality: derived.provider_cardinality,
            link_relationships: BTreeMap::new(),
            hosted_by_provider_type: derived.hosted_by_type,
            hosted_by_provider_comms: derived.hosted_by_comms,
            hosted_by_provider_props: BTreeMap::new(),
            external_links: vec![],
            templates: vec![meta],
        };

        for link in &external_links {
            if let Some(relationship) = link.declared_label(entity_type) {
                node.link_relationships.insert(link.seller, relationship);
            }
            if link.hosts(entity_type) {
                node.hosted_by_provider_type
                    .insert(link.seller, Relationship::Hosting);
            }
            node.hosted_by_provider_comms
                .entry(link.seller)
                .or_default()
                .extend(link.commodities.iter().copied());
            node.hosted_by_provider_props
                .entry(link.seller)
                .or_default()
                .extend(link.probe_properties.iter().cloned());
        }
        node.external_links = external_links;
        node
    }

    /// Fold a later entry for the same entity type into this node. Fails
    /// without touching `self` if any provider would carry two labels.
    pub fn merge(&mut self, other: Node) -> Result<(), ErrorKind> {
        find_relationship_conflict(self.entity_type, &self.declared_labels(), &other.declared_labels())?;

        merge_set(&mut self.supported_sold_comms, other.supported_sold_comms);
        merge_set(&mut self.keyed_sold_comms, other.keyed_sold_comms);
        merge_set_map(&mut self.supported_bought_comms, other.supported_bought_comms);
        merge_relationships(&mut self.provider_relationships, other.provider_relationships);
        for (provider, cardinality) in other.provider_cardinality {
            self.provider_cardinality.entry(provider).or_insert(cardinality);
        }
        merge_relationships(&mut self.link_relationships, other.link_relationships);
        merge_relationships(&mut self.hosted_by_provider_type, other.hosted_by_provider_type);
        merge_set_map(&mut self.hosted_by_provider_comms, other.hosted_by_provider_comms);
        merge_set_map(&mut self.hosted_by_provider_props, other.hosted_by_provider_props);
        self.external_links.extend(other.external_links);
        self.templates.extend(other.templates);
        Ok(())
    }

    /// Every provider label this node declares, from bought groups and links.
    fn declared_labels(&self) -> RelationshipMap {
        let mut labels = self.provider_relationships.clone();
        for (provider, relationship) in self.link_relationships.iter().chain(&self.hosted_by_provider_type) {
            labels.entry(*provider).or_insert(*relationship);
        }
        labels
    }

    pub fn is_hosted_by(&self, provider: EntityType) -> bool {
        self.hosted_by_provider_type.contains_key(&provider)
    }

    pub fn hosting_providers(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.hosted_by_provider_type.keys().copied()
    }
}

fn find_relationship_conflict(
    node: EntityType,
    existing: &RelationshipMap,
    incoming: &RelationshipMap,
) -> Result<(), ErrorKind> {
    for (provider, declared) in incoming {
        if let Some(current) = existing.get(provider) {
            if current != declared {
                return Err(ErrorKind::ConflictingNodeDefinition {
                    node,
                    provider: *provider,
                    existing: *current,
                    declared: *declared,
                });
            }
        }
    }
    Ok(())
}

fn merge_set<T: Ord>(into: &mut BTreeSet<T>, from: BTreeSet<T>) {
    into.extend(from);
}

fn merge_set_map<T: Ord>(into: &mut BTreeMap<EntityType, BTreeSet<T>>, from: BTreeMap<EntityType, BTreeSet<T>>) {
    for (provider, values) in from {
        merge_set(into.entry(provider).or_default(), values);
    }
}

/// Callers check conflicts first; agreeing labels make this a plain union.
fn merge_relationships(into: &mut RelationshipMap, from: RelationshipMap) {
    for (provider, relationship) in from {
        into.entry(provider).or_insert(relationship);
    }
}

/// Running node map during construction.
#[derive(Debug, Default)]
pub struct GraphAssembler {
    node_map: BTreeMap<EntityType, Node>,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, scope: &EntryScope<'_>, node: Node) -> SupplyChainResult<()> {
        match self.node_map.entry(node.entity_type) {
            Entry::Occupied(mut slot) => {
                debug!(entity_type = %node.entity_type, entry = scope.entry, "merging template entry into existing node");
                slot.get_mut()
                    .merge(node)
                    .map_err(|kind| scope.error("templateClass", kind))
            }
            Entry::Vacant(slot) => {
                debug!(entity_type = %node.entity_type, entry = scope.entry, "inserting node");
                slot.insert(node);
                Ok(())
            }
        }
    }

    pub fn seal(self) -> SupplyChain {
        SupplyChain {
            node_map: self.node_map,
        }
    }
}

/// The validated topology. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyChain {
    node_map: BTreeMap<EntityType, Node>,
}

impl SupplyChain {
    pub fn node(&self, entity_type: EntityType) -> Option<&Node> {
        self.node_map.get(&entity_type)
    }

    pub fn contains(&self, entity_type: EntityType) -> bool {
        self.node_map.contains_key(&entity_type)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_map.values()
    }

    pub fn entity_types(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.node_map.keys().copied()
    }

    pub fn node_map(&self) -> &BTreeMap<EntityType, Node> {
        &self.node_map
    }

    pub fn into_node_map(self) -> BTreeMap<EntityType, Node> {
        self.node_map
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// SHA-256 over the canonical JSON node map.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        compute_fingerprint(&self.node_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(entity_type: EntityType, sold: &[CommodityType]) -> Node {
        Node::from_parts(
            entity_type,
            ResolvedCommodities {
                sold: sold.iter().copied().collect(),
                ..Default::default()
            },
            DerivedRelationships::default(),
            vec![],
            TemplateMeta { kind: Some(TemplateKind::Base), priority: None },
        )
    }

    fn hosted(mut n: Node, provider: EntityType, relationship: Relationship) -> Node {
        n.provider_relationships.insert(provider, relationship);
        if relationship.is_hosting() {
            n.hosted_by_provider_type.insert(provider, relationship);
        }
        n
    }

    fn scope() -> EntryScope<'static> {
        EntryScope::new(1, "APPLICATION_COMPONENT")
    }

    #[test]
    fn test_merge_unions_fields() {
        let mut a = hosted(
            node(EntityType::ApplicationComponent, &[CommodityType::Transaction]),
            EntityType::VirtualMachine,
            Relationship::Hosting,
        );
        let b = hosted(
            node(EntityType::ApplicationComponent, &[CommodityType::Heap]),
            EntityType::VirtualMachine,
            Relationship::Hosting,
        );
        a.merge(b).unwrap();

        let expected: BTreeSet<_> = [CommodityType::Transaction, CommodityType::Heap].into();
        assert_eq!(a.supported_sold_comms, expected);
        assert_eq!(a.hosted_by_provider_type.len(), 1);
        assert_eq!(a.templates.len(), 2);
    }

    #[test]
    fn test_merge_conflict_leaves_node_untouched() {
        let mut a = hosted(
            node(EntityType::ApplicationComponent, &[CommodityType::Transaction]),
            EntityType::VirtualMachine,
            Relationship::Hosting,
        );
        let before = a.clone();
        let b = hosted(
            node(EntityType::ApplicationComponent, &[CommodityType::Heap]),
            EntityType::VirtualMachine,
            Relationship::LayeredOver,
        );
        let err = a.merge(b).unwrap_err();
        assert!(matches!(err, ErrorKind::ConflictingNodeDefinition { .. }));
        assert_eq!(a, before);
    }

    #[test]
    fn test_assembler_inserts_and_merges() {
        let mut assembler = GraphAssembler::new();
        assembler
            .fold(&scope(), node(EntityType::ApplicationComponent, &[CommodityType::Transaction]))
            .unwrap();
        assembler
            .fold(&scope(), node(EntityType::VirtualMachine, &[CommodityType::Vcpu]))
            .unwrap();
        assembler
            .fold(&scope(), node(EntityType::ApplicationComponent, &[CommodityType::Threads]))
            .unwrap();

        let chain = assembler.seal();
        assert_eq!(chain.len(), 2);
        let app = chain.node(EntityType::ApplicationComponent).unwrap();
        assert_eq!(app.supported_sold_comms.len(), 2);
    }

    #[test]
    fn test_assembler_conflict_reports_scope() {
        let mut assembler = GraphAssembler::new();
        let first = hosted(
            node(EntityType::ApplicationComponent, &[CommodityType::Transaction]),
            EntityType::Container,
            Relationship::LayeredOver,
        );
        let second = hosted(
            node(EntityType::ApplicationComponent, &[CommodityType::Transaction]),
            EntityType::Container,
            Relationship::Hosting,
        );
        assembler.fold(&scope(), first).unwrap();
        let err = assembler.fold(&scope(), second).unwrap_err();
        assert_eq!(err.entry, 1);
        assert_eq!(err.field, "templateClass");
        assert_eq!(err.kind().name(), "ConflictingNodeDefinition");
    }

    #[test]
    fn test_merge_compares_link_labels() {
        let mut a = hosted(
            node(EntityType::Service, &[CommodityType::Transaction]),
            EntityType::VirtualMachine,
            Relationship::Hosting,
        );
        let mut b = node(EntityType::Service, &[CommodityType::Transaction]);
        b.link_relationships
            .insert(EntityType::VirtualMachine, Relationship::LayeredOver);
        let err = a.merge(b).unwrap_err();
        assert_eq!(
            err,
            ErrorKind::ConflictingNodeDefinition {
                node: EntityType::Service,
                provider: EntityType::VirtualMachine,
                existing: Relationship::Hosting,
                declared: Relationship::LayeredOver,
            }
        );
    }
}
