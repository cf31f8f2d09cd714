//! Error types for the store, provider, and crawl seams.
//!
//! Library code returns these typed errors; the CLI wraps them in
//! `anyhow` with context.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single graph store operation. Never retried by the adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("sparql endpoint: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sparql endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("malformed store response: {0}")]
    Protocol(String),

    #[error("invalid value for {property}: {reason}")]
    InvalidValue { property: String, reason: String },
}

/// Failure reported by a provider client.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: malformed listing: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("invalid exclude pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("unknown folder '{0}'")]
    UnknownFolder(String),

    #[error("unknown album '{0}'")]
    UnknownAlbum(String),

    /// Network, authorization, or rate-limit failures of remote clients.
    #[error("{0}")]
    Api(String),
}

/// Errors surfaced by the crawl orchestrator.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// No listing could be obtained; the account's crawl is aborted.
    #[error("enumeration failed: {0}")]
    Enumeration(#[source] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// One entity could not be mirrored. Recorded and logged; the crawl
    /// goes on.
    #[error("entity '{id}': {source}")]
    Entity {
        id: String,
        #[source]
        source: Box<CrawlError>,
    },

    #[error("crawl cancelled")]
    Cancelled,
}
