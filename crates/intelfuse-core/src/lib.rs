//! # Intelfuse Core
//!
//! Resilience and correlation core for multi-source intelligence
//! aggregation.
//!
//! ## Overview
//!
//! This crate provides the foundational components for Intelfuse:
//!
//! - **Query model** with validated parameters and subject-kind inference
//! - **Source adapter contract** hiding each upstream behind one trait
//! - **Adapter gateway** owning rate limits, timeouts, retries, caching,
//!   and single-flight coalescing
//! - **Entity resolver** with a tiered match cascade
//! - **Source selector** ranking sources by domain affinity
//! - **Correlator** fanning out, corroborating, conflicting, and
//!   triangulating into a confidence-banded aggregate
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | Source adapter trait and the uniform result contract |
//! | [`adapters`] | Built-in deterministic source adapters |
//! | [`confidence`] | Six-band analytic confidence ladder |
//! | [`correlator`] | Fan-out, claim correlation, confidence scoring |
//! | [`domain`] | Shared domain types (timestamps) |
//! | [`error`] | Core error types |
//! | [`gateway`] | Resilient adapter gateway |
//! | [`query`] | Validated query parameters |
//! | [`ratelimit`] | Per-source call policies and rate budgets |
//! | [`resolver`] | Tiered entity resolution |
//! | [`retry`] | Backoff and retry policies |
//! | [`selector`] | Affinity-based source selection |
//! | [`service`] | Upward-facing service facade |
//! | [`source`] | Source identifiers and quality tiers |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use intelfuse_core::{IntelService, QueryParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = IntelService::builtin();
//!     let query = QueryParams::topic("grain exports")?;
//!
//!     let result = service.aggregate(&query).await?;
//!     for finding in &result.findings {
//!         println!("{}: {:?} ({})", finding.fact_type, finding.values, finding.band);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Per-source failures never abort an aggregate; they are contained and
//! reported in `sources_skipped`. Only structurally unanswerable queries
//! surface as [`CoreError`]: no available sources, or an entity the
//! resolver cascade cannot place.

pub mod adapter;
pub mod adapters;
pub mod confidence;
pub mod correlator;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod query;
pub mod ratelimit;
pub mod resolver;
pub mod retry;
pub mod selector;
pub mod service;
pub mod source;

// Re-export commonly used types at crate root for convenience

// Adapter contract and results
pub use adapter::{
    FailureKind, FetchStatus, RawResponse, SourceAdapter, SourceFailure, SourceResult,
};

// Confidence ladder
pub use confidence::ConfidenceBand;

// Correlation
pub use correlator::{
    AggregatedFinding, AggregatedResult, ClaimTolerance, Correlator, CorrelatorConfig,
    ReportedValue, SkippedSource,
};

// Domain types
pub use domain::UtcDateTime;

// Error types
pub use error::{CoreError, ValidationError};

// Gateway
pub use gateway::{AdapterGateway, GatewayConfig, SourceStatus};

// Query model
pub use query::{QueryKind, QueryParams, TimeWindow};

// Rate limiting
pub use ratelimit::{SourcePolicy, SourceRateLimiter};

// Entity resolution
pub use resolver::{EntityMatch, EntityRecord, EntityResolver, ResolutionTier, ResolverConfig};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Source selection
pub use selector::{SourceCandidate, SourceSelector};

// Service facade
pub use service::IntelService;

// Source identifiers
pub use source::{QualityTier, SourceId};

// Cache (re-exported from intelfuse-cache)
pub use intelfuse_cache::{CacheConfig, CacheError, CacheKey, CacheStatus, TieredCache};
