//! Centralized error types for dvxr.
//!
//! Uses `thiserror` for the error definitions. The first group of variants is
//! the failure taxonomy the orchestrator reacts to; the rest is plumbing from
//! the HTTP, JSON, URL, and config layers.

/// Core error type used across all dvxr crates.
#[derive(Debug, thiserror::Error)]
pub enum DvError {
    // === Orchestration failures ===
    #[error("Authorization failed: {message}")]
    AuthFailure { message: String },

    #[error("Computer listing failed: {message}")]
    DirectoryFailure { message: String },

    #[error("Connection negotiation failed: {message}")]
    NegotiationFailure { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("No stream arrived within {seconds}s")]
    StreamTimeout { seconds: u64 },

    #[error("XR session unavailable: {message}")]
    Xr { message: String },

    // === Precondition errors ===
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No computer selected")]
    NoComputerSelected,

    #[error("Computer {id} is no longer available")]
    ComputerNotFound { id: String },

    #[error("Superseded by a newer attempt")]
    Superseded,

    // === Plumbing ===
    /// The HTTP response had a non-2xx status code.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl DvError {
    /// Error code string for logs and user-facing notices.
    pub fn error_code(&self) -> &str {
        match self {
            Self::AuthFailure { .. } => "AUTH_FAILURE",
            Self::DirectoryFailure { .. } => "DIRECTORY_FAILURE",
            Self::NegotiationFailure { .. } => "NEGOTIATION_FAILURE",
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::StreamTimeout { .. } => "STREAM_TIMEOUT",
            Self::Xr { .. } => "XR_UNAVAILABLE",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::NoComputerSelected => "NO_COMPUTER_SELECTED",
            Self::ComputerNotFound { .. } => "COMPUTER_NOT_FOUND",
            Self::Superseded => "SUPERSEDED",
            Self::Api { .. } => "API_ERROR",
            Self::Http(_) => "HTTP_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Url(_) => "INVALID_URL",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the user can fix this by trying the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure { .. }
                | Self::DirectoryFailure { .. }
                | Self::NegotiationFailure { .. }
                | Self::Transport { .. }
                | Self::StreamTimeout { .. }
                | Self::Api { .. }
                | Self::Http(_)
        )
    }

    pub fn auth(err: impl std::fmt::Display) -> Self {
        Self::AuthFailure { message: err.to_string() }
    }

    pub fn directory(err: impl std::fmt::Display) -> Self {
        Self::DirectoryFailure { message: err.to_string() }
    }

    pub fn negotiation(err: impl std::fmt::Display) -> Self {
        Self::NegotiationFailure { message: err.to_string() }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport { message: err.to_string() }
    }
}

/// Convenience type alias for Results using DvError.
pub type DvResult<T> = Result<T, DvError>;
