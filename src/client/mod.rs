//! Client side of the desk: an HTTP client for the REST endpoints and the
//! session store that remembers who is logged in between runs.

use thiserror::Error;

pub mod api;
pub mod session;
pub mod storage;

pub use api::{ApiClient, ScanReply};
pub use session::{SessionContext, SessionUser};
pub use storage::FileStorage;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("not logged in")]
    Unauthenticated,
}
