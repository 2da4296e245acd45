//! Compilation errors.
//!
//! Every failure carries the entry being processed, the field path and the
//! taxonomy kind. Compilation stops at the first one.

use thiserror::Error;

use crate::vocabulary::{EntityType, Relationship};

pub type SupplyChainResult<T> = Result<T, SupplyChainError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unknown entity type `{0}`")]
    UnknownEntityType(String),

    #[error("unknown commodity type `{0}`")]
    UnknownCommodityType(String),

    #[error("unknown relationship `{0}`")]
    UnknownRelationship(String),

    #[error("unknown template type `{0}`")]
    UnknownTemplateType(String),

    #[error("no sold commodity declared")]
    MissingSoldCommodities,

    #[error("commodity entry has no commodity type")]
    MissingCommodityType,

    #[error("bought commodity group has no provider entity type")]
    MissingProvider,

    #[error("bought commodity group for {0} has no relationship")]
    MissingRelationship(EntityType),

    #[error("invalid provider cardinality {min}..{max}")]
    InvalidCardinality { min: i32, max: i32 },

    #[error("external link has no commodity definitions")]
    MissingCommodityDefs,

    #[error("external link has no probe property definitions: {0}")]
    MissingProbeProperties(String),

    #[error("external link has no external property definitions")]
    MissingExternalPropertyDefs,

    #[error("incomplete property handler: {0}")]
    IncompletePropertyHandler(String),

    #[error("external link {buyer} -> {seller} does not involve {node}")]
    InvalidExternalLinkScope {
        node: EntityType,
        buyer: EntityType,
        seller: EntityType,
    },

    #[error("provider {provider} declared as both {existing} and {declared}")]
    ConflictingHostRelationship {
        provider: EntityType,
        existing: Relationship,
        declared: Relationship,
    },

    #[error("merging node {node}: provider {provider} declared as both {existing} and {declared}")]
    ConflictingNodeDefinition {
        node: EntityType,
        provider: EntityType,
        existing: Relationship,
        declared: Relationship,
    },
}

impl ErrorKind {
    /// Stable taxonomy name, e.g. `UnknownEntityType`.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnknownEntityType(_) => "UnknownEntityType",
            ErrorKind::UnknownCommodityType(_) => "UnknownCommodityType",
            ErrorKind::UnknownRelationship(_) => "UnknownRelationship",
            ErrorKind::UnknownTemplateType(_) => "UnknownTemplateType",
            ErrorKind::MissingSoldCommodities => "MissingSoldCommodities",
            ErrorKind::MissingCommodityType => "MissingCommodityType",
            ErrorKind::MissingProvider => "MissingProvider",
            ErrorKind::MissingRelationship(_) => "MissingRelationship",
            ErrorKind::InvalidCardinality { .. } => "InvalidCardinality",
            ErrorKind::MissingCommodityDefs => "MissingCommodityDefs",
            ErrorKind::MissingProbeProperties(_) => "MissingProbeProperties",
            ErrorKind::MissingExternalPropertyDefs => "MissingExternalPropertyDefs",
            ErrorKind::IncompletePropertyHandler(_) => "IncompletePropertyHandler",
            ErrorKind::InvalidExternalLinkScope { .. } => "InvalidExternalLinkScope",
            ErrorKind::ConflictingHostRelationship { .. } => "ConflictingHostRelationship",
            ErrorKind::ConflictingNodeDefinition { .. } => "ConflictingNodeDefinition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template entry #{entry} ({template}), field `{field}`: {kind}")]
pub struct SupplyChainError {
    /// Position of the offending entry in the document.
    pub entry: usize,
    /// The entry's `templateClass` as written.
    pub template: String,
    pub field: String,
    #[source]
    pub kind: ErrorKind,
}

impl SupplyChainError {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

/// Where in the document a stage is working. Stages raise kinds against a
/// field path; the scope turns that into a full error.
#[derive(Debug, Clone, Copy)]
pub struct EntryScope<'a> {
    pub entry: usize,
    pub template: &'a str,
}

impl<'a> EntryScope<'a> {
    pub fn new(entry: usize, template: &'a str) -> Self {
        Self { entry, template }
    }

    pub fn error(&self, field: impl Into<String>, kind: ErrorKind) -> SupplyChainError {
        SupplyChainError {
            entry: self.entry,
            template: self.template.to_string(),
            field: field.into(),
            kind,
        }
    }
}
