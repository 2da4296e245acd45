//! Supply Chain Core - Topology Template Compiler
//!
//! # The Five Laws (Non-Negotiable)
//! 1. The Vocabulary Is Closed
//! 2. Templates Are Contracts
//! 3. First Violation Wins
//! 4. Sealed Chains Are Immutable
//! 5. Deterministic Output

pub mod vocabulary;
pub mod templates;
pub mod error;
pub mod commodities;
pub mod relationships;
pub mod validation;
pub mod graph;
pub mod hashing;
pub mod pipeline;

pub use vocabulary::{CommodityType, EntityType, Relationship, SdkVocabulary, TemplateKind, Vocabulary};
pub use templates::{SupplyChainConfig, TemplateEntry, ConfigError};
pub use error::{ErrorKind, SupplyChainError, SupplyChainResult};
pub use graph::{Node, SupplyChain};
pub use validation::ExternalLink;
pub use hashing::{canonical_json, compute_fingerprint};
pub use pipeline::{compile, CompiledSupplyChain, PipelineError, SupplyChainCompiler};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
