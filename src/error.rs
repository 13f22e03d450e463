use thiserror::Error;

/// Failure kinds shared by the gallery client and server.
///
/// Every variant is recoverable: the caller either fixes its input, retries,
/// or refreshes its local snapshot.
#[derive(Debug, Error)]
pub enum GalleryError {
    /// Malformed local input, such as an empty person name or an ambiguous
    /// assignment request.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The local snapshot no longer matches the server.
    #[error("gallery state out of sync: {0}")]
    Consistency(String),

    #[error("invalid photo geometry: {0}")]
    Geometry(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GalleryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {}", entity, id))
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency(message.into())
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Whether the local snapshot should be reloaded from the server.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }

    /// The detail text without the kind prefix `Display` adds. This is what
    /// crosses the wire, so the receiving side can rebuild the same error.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(m)
            | Self::NotFound(m)
            | Self::Consistency(m)
            | Self::Geometry(m)
            | Self::Transport(m) => m.clone(),
            Self::Internal(e) => e.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Consistency(_) => "consistency",
            Self::Geometry(_) => "geometry",
            Self::Transport(_) => "transport",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for GalleryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;
