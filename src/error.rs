use thiserror::Error;

use crate::catalog::Category;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "client")]
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("{} {name} is not yet unlocked by the player {player}", .category.display_name())]
    ItemNotUnlocked {
        category: Category,
        name: String,
        player: String,
    },

    #[error("{name} is not a valid {} name", .category.display_name().to_lowercase())]
    IllegalName { category: Category, name: String },

    #[error("player document has no {expected} at `{field}`")]
    DocumentShape {
        field: String,
        expected: &'static str,
    },

    #[error("{0} not found in environment variables")]
    TokenNotFound(String),
}

impl Error {
    pub(crate) fn shape(field: impl Into<String>, expected: &'static str) -> Self {
        Error::DocumentShape {
            field: field.into(),
            expected,
        }
    }
}

/// Failure to obtain a player document from the server.
#[cfg(feature = "client")]
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The server answered outside of 200..400. `reason` and `message` come
    /// from the provider's error body.
    #[error("server responded with {status}: {reason} ({message})")]
    Status {
        status: reqwest::StatusCode,
        reason: String,
        message: String,
    },

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("base URL cannot carry path segments: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response body: {0}")]
    Json(#[from] serde_json::Error),
}
