use thiserror::Error;

/// Validation and contract errors exposed by `intelfuse-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("query subject cannot be empty")]
    EmptySubject,
    #[error("query subject length {len} exceeds max {max}")]
    SubjectTooLong { len: usize, max: usize },

    #[error("time window start must not be after end")]
    InvalidTimeWindow,

    #[error("invalid source '{value}', expected one of gdelt, acled, opensanctions, wikidata, aishub")]
    InvalidSource { value: String },
    #[error("source '{value}' appears in both include and exclude sets")]
    ConflictingSourceFilter { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    InvalidTimestamp { value: String },

    #[error("tolerance must be non-negative: {value}")]
    NegativeTolerance { value: f64 },
}

/// Top-level error type for core operations.
///
/// Raw upstream error text never crosses this boundary; per-source
/// failures are contained in `AggregatedResult::sources_skipped` and only
/// structurally unanswerable queries surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] intelfuse_cache::CacheError),

    #[error("no available sources for query '{query}'")]
    NoAvailableSources { query: String },

    #[error("entity '{query}' could not be resolved; try: {}", suggestions.join(", "))]
    EntityUnresolved {
        query: String,
        suggestions: Vec<String>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
