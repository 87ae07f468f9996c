use thiserror::Error;

/// Transport-level failure for a single GET.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

/// Failure of a whole `scrape` call.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("not a {site} URL: {url}")]
    InvalidSource { url: String, site: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("sync state I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sync state encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("card store: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("record rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("import failed: {0}")]
    Import(#[from] ImportError),
    #[error("invalid range {start}..{end}: {reason}")]
    Range {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        reason: String,
    },
}

/// Why a block produced no record. Logged and dropped, never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseSkip {
    #[error("block has no question text element")]
    NoQuestionMarker,
    #[error("question text is empty")]
    EmptyQuestion,
}
