//! Ownership graph domain module
//!
//! Builds a deduplicated graph of companies and funds from holdings listed
//! in reports and owners found on the web.
//!
//! ## Architecture
//!
//! ```text
//! IngestionService ──► PortfolioIngestor (recursive, visited set)
//!        │                 │
//!        │                 ├─► EntityResolver   name -> entity cascade
//!        │                 ├─► merge            attribute merge law
//!        │                 └─► LabelLifecycle   company -> fund
//!        │
//!        └───────────► InvestorDiscoverer (one level)
//!
//! all writes ──► OwnershipGraphRepository (idempotent upserts)
//! all I/O    ──► Collaborators (timeout + Lookup outcome)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ownergraph_core::domain::ownership::{Collaborators, IngestionService};
//!
//! let service = IngestionService::new(repository, Collaborators::new(documents, web));
//! let result = service.ingest("556043-4200", "Investor AB").await?;
//! println!("{} holdings", result.portfolio.len());
//! ```

mod collaborator;
mod entity;
mod event;
mod identifier;
mod investors;
mod lifecycle;
mod merge;
mod portfolio;
mod registry;
mod relationship;
mod repository;
mod resolver;
mod service;
mod traversal;

pub use collaborator::{
    Collaborators, DEFAULT_COLLABORATOR_TIMEOUT, DocumentSource, HoldingCandidate,
    InvestorCandidate, Lookup, PortfolioDocument, WebIntelligence, guarded,
};
pub use entity::{DEFAULT_COUNTRY_CODE, Entity, EntityRole, PortfolioItem, RoleLabels};
pub use event::IngestionEvent;
pub use identifier::{
    OrgNumber, extract_identifier_from_text, is_valid_identifier, normalize_identifier,
};
pub use investors::{InvestorDiscoverer, InvestorDiscovery};
pub use lifecycle::{LabelLifecycle, Promotion, PromotionTrigger};
pub use merge::{AttributeBag, combine, merge, normalize_website};
pub use portfolio::{DEFAULT_MAX_CANDIDATES, PortfolioIngestor};
pub use registry::EntityRegistry;
pub use relationship::{OwnershipEdge, RelationType, sanitize_share};
pub use repository::{
    Holding, MAX_NETWORK_DEPTH, MAX_NETWORK_NODES, MatchStrategy, NameQuery, NetworkNode,
    OwnershipGraphRepository, OwnershipGraphStats, OwnershipNetwork,
};
pub use resolver::{
    EntityResolver, MatchedBy, Resolution, name_key, normalize_name, strip_legal_suffix,
};
pub use service::{
    DeclaredHolding, IngestRequest, IngestionResult, IngestionService, IngestionSettings,
};
pub use traversal::TraversalContext;
