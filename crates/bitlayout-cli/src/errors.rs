//! Error types for request handling and type resolution.

use bitlayout::errors::WireError;

/// The type source could not produce a type for a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no module for scope {0}")]
    ScopeNotFound(String),
    #[error("no type or value named {name:?} in {scope}")]
    NameNotFound { scope: String, name: String },
    /// The type source returned a description that is not a valid type tree.
    #[error("invalid type description for {name:?}: {source}")]
    InvalidType { name: String, source: WireError },
}

/// Errors surfaced by the driver. Within a batch they only ever fail the
/// record that raised them.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("no layout found in input")]
    NoLayout,
}
