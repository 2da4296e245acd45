//! Template Entries - Declarative Supply Chain Records
//!
//! These are the records as written in a template document. Names are kept as
//! raw strings and every section is optional at this level: presence and
//! membership are checked by the compiler, not by the decoder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML decode error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A whole template document: an ordered list of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyChainConfig {
    #[serde(default)]
    pub supply_chain_node: Vec<TemplateEntry>,
}

impl SupplyChainConfig {
    pub fn new(entries: Vec<TemplateEntry>) -> Self {
        Self { supply_chain_node: entries }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entries(&self) -> &[TemplateEntry] {
        &self.supply_chain_node
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub template_class: String,
    #[serde(default)]
    pub template_type: Option<String>,
    #[serde(default)]
    pub template_priority: Option<i32>,
    #[serde(default)]
    pub commodity_sold: Vec<TemplateCommodity>,
    #[serde(default)]
    pub commodity_bought: Vec<BoughtGroup>,
    #[serde(default)]
    pub external_link: Vec<ExternalLinkEntry>,
}

impl TemplateEntry {
    pub fn new(template_class: impl Into<String>) -> Self {
        Self {
            template_class: template_class.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCommodity {
    #[serde(default)]
    pub commodity_type: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl TemplateCommodity {
    pub fn of(commodity_type: impl Into<String>) -> Self {
        Self {
            commodity_type: Some(commodity_type.into()),
            ..Default::default()
        }
    }
}

/// Commodities bought from one provider type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoughtGroup {
    #[serde(default)]
    pub key: Option<ProviderRef>,
    #[serde(default)]
    pub value: Vec<TemplateCommodity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    #[serde(default)]
    pub template_class: Option<String>,
    /// Relationship label, e.g. HOSTING or LAYERED_OVER.
    #[serde(default)]
    pub provider_type: Option<String>,
    #[serde(default)]
    pub cardinality_min: Option<i32>,
    #[serde(default)]
    pub cardinality_max: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalLinkEntry {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: ExternalLinkDecl,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLinkDecl {
    #[serde(default)]
    pub buyer_ref: Option<String>,
    #[serde(default)]
    pub seller_ref: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub commodity_defs: Vec<CommodityDef>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub has_external_entity: Option<bool>,
    #[serde(default)]
    pub probe_entity_property_def: Vec<ProbePropertyDef>,
    #[serde(default)]
    pub external_entity_property_defs: Vec<ExternalPropertyDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityDef {
    #[serde(default, rename = "type")]
    pub commodity_type: Option<String>,
    #[serde(default)]
    pub has_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbePropertyDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPropertyDef {
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub use_topo_ext: bool,
    #[serde(default)]
    pub property_handler: Option<PropertyHandler>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyHandler {
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub directly_apply: bool,
    #[serde(default)]
    pub next_handler: Option<Box<PropertyHandler>>,
}
