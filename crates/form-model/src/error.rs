use thiserror::Error;

/// Errors raised by the form model API.
#[derive(Debug, Error)]
pub enum FormModelError {
    #[error("unknown form field '{0}'")]
    UnknownField(String),
    #[error("failed to read form config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse form config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a configured expression cannot be used.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("malformed expression: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("unknown dialog '{0}'")]
    UnknownDialog(String),
    #[error("function '{0}' calls itself")]
    RecursiveFunction(String),
}

/// Failures while encoding or decoding a [`crate::FormSnapshot`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
