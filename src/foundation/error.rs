/// Convenience result type used across canvas-reel.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy for every capture stage.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// The page never reached its readiness condition.
    #[error("navigation timeout: {0}")]
    NavigationTimeout(String),

    /// A required element did not appear during an interaction step.
    #[error("interaction timeout: {0}")]
    InteractionTimeout(String),

    /// No drawable surface matched the selection policy.
    #[error("no suitable surface: {0}")]
    NoSuitableSurface(String),

    /// Too many consecutive ticks failed to produce an image.
    #[error("capture failure after {consecutive} consecutive failed ticks: {last_error}")]
    CaptureFailure {
        /// Length of the failing streak that triggered the abort.
        consecutive: u32,
        /// Message reported by the last failed tick.
        last_error: String,
    },

    /// Sampling stopped without a single successful frame.
    #[error("empty capture: no frames captured before {0}")]
    EmptyCapture(String),

    /// One frame could not be persisted.
    #[error("write failure for frame {index}: {reason}")]
    WriteFailure {
        /// Sequence index of the frame.
        index: u64,
        /// Underlying cause.
        reason: String,
    },

    /// Every encoder strategy failed.
    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    /// Invalid user-provided configuration or data.
    #[error("validation error: {0}")]
    Validation(String),

    /// The rendering engine rejected a command.
    #[error("engine error: {0}")]
    Engine(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::NavigationTimeout`] value.
    pub fn navigation_timeout(msg: impl Into<String>) -> Self {
        Self::NavigationTimeout(msg.into())
    }

    /// Build a [`ReelError::InteractionTimeout`] value.
    pub fn interaction_timeout(msg: impl Into<String>) -> Self {
        Self::InteractionTimeout(msg.into())
    }

    /// Build a [`ReelError::NoSuitableSurface`] value.
    pub fn no_suitable_surface(msg: impl Into<String>) -> Self {
        Self::NoSuitableSurface(msg.into())
    }

    /// Build a [`ReelError::EncodingFailure`] value.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingFailure(msg.into())
    }

    /// Build a [`ReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Engine`] value.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Build a [`ReelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Short name of the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::NavigationTimeout(_) | Self::InteractionTimeout(_) => "navigate",
            Self::NoSuitableSurface(_) => "locate",
            Self::CaptureFailure { .. } | Self::EmptyCapture(_) => "sample",
            Self::WriteFailure { .. } => "write",
            Self::EncodingFailure(_) => "encode",
            Self::Validation(_) => "config",
            Self::Engine(_) => "engine",
            Self::Serde(_) | Self::Other(_) => "io",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
