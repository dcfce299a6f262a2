use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// I/O errors from the terminal or log files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Terminal initialization or rendering errors.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Invalid path or URL provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Configuration that parsed but cannot be used.
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Nav(#[from] NavError),
}

/// Failures reported by the remote content server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server rejected the session (401/403).
    #[error("Authentication required (HTTP {0})")]
    AuthRequired(u16),

    /// Any other non-success status, with the response body as detail.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The response body was not what we expected.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ApiError::AuthRequired(status),
            _ => ApiError::Http {
                status,
                message: body.trim().to_string(),
            },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::AuthRequired(_))
    }
}

/// Navigation engine errors. None of them are fatal; callers log and carry on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("Row index {index} is out of range ({len} rows)")]
    OutOfRange { index: usize, len: usize },

    #[error("No row for path {0}")]
    NotFound(String),

    #[error("Path must start with '/': {0:?}")]
    MalformedPath(String),

    #[error("Nothing is selected")]
    NoSelection,

    #[error("{0} is not a file")]
    NotAFile(String),
}
