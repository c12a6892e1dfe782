#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Required input is missing before a stage can start.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The uploaded bytes could not be decoded as an image.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// A copy or image generation call failed or was rejected.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The action is not available in the current workflow stage.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The message shown to the user, without the category prefix.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Decode(m)
            | Self::Generation(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }
}
