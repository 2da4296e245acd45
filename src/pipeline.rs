//! Compilation Pipeline - Single Entry Point
//!
//! Entries are folded strictly in document order:
//! Resolve -> Derive -> ValidateLinks -> Assemble, then Seal.
//! The first failure aborts; no partial supply chain ever escapes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commodities::CommodityResolver;
use crate::error::{EntryScope, ErrorKind, SupplyChainError, SupplyChainResult};
use crate::graph::{GraphAssembler, Node, SupplyChain, TemplateMeta};
use crate::hashing::compute_source_hash;
use crate::relationships;
use crate::templates::{SupplyChainConfig, TemplateEntry};
use crate::validation::{LinkContext, LinkValidator};
use crate::vocabulary::{SdkVocabulary, TemplateKind, Vocabulary};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Supply chain invalid: {0}")]
    Invalid(#[from] SupplyChainError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A sealed supply chain plus the identity of the build that produced it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSupplyChain {
    pub id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub source_hash: String,
    pub fingerprint: String,
    pub entry_count: usize,
    pub supply_chain: SupplyChain,
}

/// The compiler - holds the vocabulary every name is checked against
pub struct SupplyChainCompiler {
    vocabulary: Box<dyn Vocabulary + Send + Sync>,
    links: LinkValidator,
}

impl SupplyChainCompiler {
    pub fn new() -> Self {
        Self::with_vocabulary(SdkVocabulary)
    }

    pub fn with_vocabulary(vocabulary: impl Vocabulary + Send + Sync + 'static) -> Self {
        Self {
            vocabulary: Box::new(vocabulary),
            links: LinkValidator::new(),
        }
    }

    /// Compile a template document into a sealed supply chain.
    pub fn compile(&self, config: &SupplyChainConfig) -> SupplyChainResult<SupplyChain> {
        let resolver = CommodityResolver::new(self.vocabulary.as_ref());
        let mut assembler = GraphAssembler::new();

        for (index, entry) in config.entries().iter().enumerate() {
            let scope = EntryScope::new(index, &entry.template_class);
            let folded = self
                .compile_entry(&resolver, &scope, entry)
                .and_then(|node| assembler.fold(&scope, node));
            if let Err(err) = folded {
                warn!(entry = index, template = %entry.template_class, kind = err.kind().name(), "template entry rejected: {}", err);
                return Err(err);
            }
        }

        let chain = assembler.seal();
        info!(nodes = chain.len(), entries = config.entries().len(), "supply chain sealed");
        Ok(chain)
    }

    /// Compile and wrap the result in a build manifest.
    pub fn compile_manifest(
        &self,
        config: &SupplyChainConfig,
    ) -> Result<CompiledSupplyChain, PipelineError> {
        let supply_chain = self.compile(config)?;
        let source_hash = compute_source_hash(config, ENGINE_VERSION)?;
        let fingerprint = supply_chain.fingerprint()?;

        Ok(CompiledSupplyChain {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            source_hash,
            fingerprint,
            entry_count: config.entries().len(),
            supply_chain,
        })
    }

    fn compile_entry(
        &self,
        resolver: &CommodityResolver<'_>,
        scope: &EntryScope<'_>,
        entry: &TemplateEntry,
    ) -> SupplyChainResult<Node> {
        let entity_type = resolver.resolve_entity(scope, "templateClass", entry.template_class.trim())?;

        let kind = match entry.template_type.as_deref() {
            Some(label) => Some(label.parse::<TemplateKind>().map_err(|e| {
                scope.error("templateType", ErrorKind::UnknownTemplateType(e.0))
            })?),
            None => None,
        };

        let commodities = resolver.resolve(scope, entry)?;
        let derived = relationships::derive(scope, &commodities.bought)?;

        let ctx = LinkContext {
            scope: *scope,
            node: entity_type,
            resolver,
            labels: &derived.provider_relationships,
        };
        let links = self.links.validate_all(&ctx, &entry.external_link)?;

        debug!(
            entity_type = %entity_type,
            sold = commodities.sold.len(),
            providers = derived.bought.len(),
            links = links.len(),
            "template entry validated"
        );

        Ok(Node::from_parts(
            entity_type,
            commodities,
            derived,
            links,
            TemplateMeta {
                kind,
                priority: entry.template_priority,
            },
        ))
    }
}

impl Default for SupplyChainCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile against the full SDK vocabulary.
pub fn compile(config: &SupplyChainConfig) -> SupplyChainResult<SupplyChain> {
    SupplyChainCompiler::new().compile(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateCommodity;
    use crate::vocabulary::{CommodityType, EntityType};

    fn entry(class: &str, sold: &[&str]) -> TemplateEntry {
        let mut e = TemplateEntry::new(class);
        e.commodity_sold = sold.iter().map(|c| TemplateCommodity::of(*c)).collect();
        e
    }

    /// Knows only virtual machines and CPU commodities.
    struct VmOnly;

    impl Vocabulary for VmOnly {
        fn entity_type(&self, name: &str) -> Option<EntityType> {
            (name == "VIRTUAL_MACHINE").then_some(EntityType::VirtualMachine)
        }

        fn commodity_type(&self, name: &str) -> Option<CommodityType> {
            (name == "VCPU").then_some(CommodityType::Vcpu)
        }
    }

    #[test]
    fn test_empty_document_seals_empty_chain() {
        let chain = compile(&SupplyChainConfig::default()).unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_template_metadata_recorded() {
        let mut e = entry("SERVICE", &["TRANSACTION"]);
        e.template_type = Some("EXTENSION".into());
        e.template_priority = Some(-1);
        let chain = compile(&SupplyChainConfig::new(vec![e])).unwrap();
        let node = chain.node(EntityType::Service).unwrap();
        assert_eq!(
            node.templates,
            vec![TemplateMeta { kind: Some(TemplateKind::Extension), priority: Some(-1) }]
        );
    }

    #[test]
    fn test_unknown_template_type_rejected() {
        let mut e = entry("SERVICE", &["TRANSACTION"]);
        e.template_type = Some("OVERLAY".into());
        let err = compile(&SupplyChainConfig::new(vec![e])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownTemplateType("OVERLAY".into()));
        assert_eq!(err.field, "templateType");
    }

    #[test]
    fn test_custom_vocabulary_consulted() {
        let compiler = SupplyChainCompiler::with_vocabulary(VmOnly);
        let ok = SupplyChainConfig::new(vec![entry("VIRTUAL_MACHINE", &["VCPU"])]);
        assert!(compiler.compile(&ok).is_ok());

        let rejected = SupplyChainConfig::new(vec![entry("VIRTUAL_MACHINE", &["VMEM"])]);
        let err = compiler.compile(&rejected).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownCommodityType("VMEM".into()));
    }

    #[test]
    fn test_failure_names_offending_entry() {
        let config = SupplyChainConfig::new(vec![
            entry("VIRTUAL_MACHINE", &["VCPU"]),
            entry("SERVICE_ENTITY", &["TRANSACTION"]),
        ]);
        let err = compile(&config).unwrap_err();
        assert_eq!(err.entry, 1);
        assert_eq!(err.template, "SERVICE_ENTITY");
        assert_eq!(err.field, "templateClass");
    }

    #[test]
    fn test_manifest_carries_fingerprint() {
        let config = SupplyChainConfig::new(vec![entry("VIRTUAL_MACHINE", &["VCPU", "VMEM"])]);
        let compiler = SupplyChainCompiler::new();
        let m1 = compiler.compile_manifest(&config).unwrap();
        let m2 = compiler.compile_manifest(&config).unwrap();

        assert_ne!(m1.id, m2.id);
        assert_eq!(m1.fingerprint, m2.fingerprint);
        assert_eq!(m1.source_hash, m2.source_hash);
        assert_eq!(m1.entry_count, 1);
        assert_eq!(m1.engine_version, ENGINE_VERSION);
    }

    #[test]
    fn test_manifest_rejects_invalid_document() {
        let config = SupplyChainConfig::new(vec![entry("SERVICE", &[])]);
        let err = SupplyChainCompiler::new().compile_manifest(&config).unwrap_err();
        assert!(err.to_string().contains("Supply chain invalid"));
    }
}
