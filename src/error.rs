pub type MediaResult<T> = Result<T, MediaError>;

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MediaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn capability(msg: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Message without the category prefix, suitable for an HTTP error body.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(m)
            | Self::CapabilityUnavailable(m)
            | Self::Provider(m)
            | Self::Encode(m)
            | Self::NotFound(m) => m.clone(),
            Self::Other(e) => format!("{e:#}"),
        }
    }
}
