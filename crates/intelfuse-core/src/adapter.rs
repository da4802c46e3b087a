//! Source adapter contract and the uniform result types the gateway
//! produces from it.
//!
//! Each external data source is hidden behind [`SourceAdapter`]: one
//! `fetch` call returning either a raw payload, a valid empty result, or
//! a classified failure. Everything else (rate limiting, retries,
//! timeouts, caching, coalescing) lives in the gateway.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{QualityTier, QueryParams, SourceId, UtcDateTime};

/// Classification of an adapter call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Upstream signalled rate limiting. Transient.
    RateLimited,
    /// The individual call deadline elapsed. Transient.
    Timeout,
    /// Missing or rejected credentials. Permanent.
    Auth,
    /// Upstream responded with something we could not interpret. Permanent.
    Parse,
    /// Upstream fault (5xx-style). Transient.
    Upstream,
}

impl FailureKind {
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Upstream)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::Parse => "parse",
            Self::Upstream => "upstream",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured adapter failure carried through retry classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    kind: FailureKind,
    message: String,
}

impl SourceFailure {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Auth,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Parse,
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Upstream,
            message: message.into(),
        }
    }

    pub fn not_configured(source: SourceId) -> Self {
        Self {
            kind: FailureKind::Auth,
            message: format!("source '{source}' is not configured"),
        }
    }

    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.kind.is_transient()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FailureKind::RateLimited => "source.rate_limited",
            FailureKind::Timeout => "source.timeout",
            FailureKind::Auth => "source.auth",
            FailureKind::Parse => "source.parse",
            FailureKind::Upstream => "source.upstream",
        }
    }
}

impl Display for SourceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceFailure {}

/// Raw adapter response before gateway classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Data(Value),
    /// Valid empty result. Not an error; triggers triangulation upstream.
    Empty,
}

/// Terminal status of one gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchStatus {
    Success,
    NoData,
    /// The local rate budget was exhausted before any upstream call
    /// could be made.
    RateLimited,
    Error(SourceFailure),
}

impl FetchStatus {
    /// Short reason string used in skip reports.
    pub fn reason(&self) -> String {
        match self {
            Self::Success => String::from("success"),
            Self::NoData => String::from("no_data"),
            Self::RateLimited => String::from("rate_limited"),
            Self::Error(failure) => failure.kind().as_str().to_owned(),
        }
    }
}

/// Uniform per-call result produced by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    pub source: SourceId,
    pub status: FetchStatus,
    pub payload: Value,
    pub quality: QualityTier,
    pub fetched_at: UtcDateTime,
    pub from_cache: bool,
    pub stale: bool,
}

impl SourceResult {
    pub fn success(source: SourceId, quality: QualityTier, payload: Value) -> Self {
        Self {
            source,
            status: FetchStatus::Success,
            payload,
            quality,
            fetched_at: UtcDateTime::now(),
            from_cache: false,
            stale: false,
        }
    }

    pub fn no_data(source: SourceId, quality: QualityTier) -> Self {
        Self {
            source,
            status: FetchStatus::NoData,
            payload: Value::Null,
            quality,
            fetched_at: UtcDateTime::now(),
            from_cache: false,
            stale: false,
        }
    }

    pub fn rate_limited(source: SourceId, quality: QualityTier) -> Self {
        Self {
            source,
            status: FetchStatus::RateLimited,
            payload: Value::Null,
            quality,
            fetched_at: UtcDateTime::now(),
            from_cache: false,
            stale: false,
        }
    }

    pub fn failure(source: SourceId, quality: QualityTier, failure: SourceFailure) -> Self {
        Self {
            source,
            status: FetchStatus::Error(failure),
            payload: Value::Null,
            quality,
            fetched_at: UtcDateTime::now(),
            from_cache: false,
            stale: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Success)
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.status, FetchStatus::NoData)
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Contract every source implementation satisfies.
///
/// Implementations must be `Send + Sync`; instances are shared across
/// concurrent fan-out tasks. A runtime registry in the gateway maps
/// [`SourceId`] to instances.
pub trait SourceAdapter: Send + Sync {
    /// Unique source identifier.
    fn id(&self) -> SourceId;

    /// Quality tier of this source's payloads.
    fn quality(&self) -> QualityTier;

    /// Whether credentials/configuration for this source are present.
    fn configured(&self) -> bool {
        true
    }

    /// Fetch raw data for the query. The gateway wraps this with rate
    /// limiting, a call deadline, retries, and caching.
    fn fetch<'a>(
        &'a self,
        params: &'a QueryParams,
    ) -> BoxFuture<'a, Result<RawResponse, SourceFailure>>;

    /// Cheap liveness probe.
    fn health_check<'a>(&'a self) -> BoxFuture<'a, bool>;
}
