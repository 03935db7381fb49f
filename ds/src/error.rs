use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// The errors that can happen while acquiring a tool. Most functions in this crate return an
/// [`anyhow::Result`], so callers who care about the kind of failure should use
/// [`anyhow::Error::downcast_ref`] to get at one of these.
#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum GetError {
    #[error("template error: {0}")]
    Template(String),

    #[error("network error requesting {url}: {source}")]
    Network {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code requesting {url}: {status}")]
    UnexpectedStatus { url: Url, status: StatusCode },

    #[error("failed to decode the response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("{name:?} not found")]
    ToolNotFound { name: String },

    #[error("no download URL found for {tool} version {version} (looked for an asset named {asset:?})")]
    AssetNotFound {
        tool: String,
        version: String,
        asset: String,
    },

    #[error("could not determine the home directory ($HOME is not set)")]
    HomeNotSet,

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GetError {
    pub(crate) fn template(msg: impl Into<String>) -> Self {
        GetError::Template(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GetError::Io {
            path: path.into(),
            source,
        }
    }

    /// The HTTP status code for an `UnexpectedStatus` error.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GetError::UnexpectedStatus { status, .. } => Some(*status),
            GetError::Template(_)
            | GetError::Network { .. }
            | GetError::Decode { .. }
            | GetError::ToolNotFound { .. }
            | GetError::AssetNotFound { .. }
            | GetError::HomeNotSet
            | GetError::Io { .. } => None,
        }
    }
}

/// Errors found when building a [`ToolCatalog`](crate::ToolCatalog). These are configuration
/// defects, not something that can go wrong at install time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("the tool name {0:?} is registered more than once (names are case-insensitive)")]
    DuplicateName(String),

    #[error("the tool {0:?} has no asset name template")]
    MissingTemplate(String),

    #[error("the asset name template for {name:?} is invalid: {message}")]
    InvalidTemplate { name: String, message: String },
}
