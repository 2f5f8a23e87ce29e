/// Result alias that carries the custom [`ShowreelError`] type.
pub type Result<T> = std::result::Result<T, ShowreelError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ShowreelError {
    /// A capability the engine cannot run without is absent from the host
    /// environment. The engine disables itself instead of propagating this
    /// into the visible experience.
    #[error("required capability missing: {0}")]
    MissingCapability(&'static str),
    /// A visual target the caller expected on the stage is absent. Scene
    /// factories swallow this and degrade to empty segments; it only
    /// escapes when the primary presentation surface itself is missing.
    #[error("visual target not found: {0}")]
    MissingTarget(String),
    /// An error raised from inside a scene hook during playback. Caught at
    /// the frame loop, logged, never fatal.
    #[error("animation fault: {0}")]
    Fault(String),
    /// Wrapper around standard IO errors (config preset loading).
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around preset parse errors.
    #[error("{0}")]
    Preset(#[from] serde_json::Error),
}

impl ShowreelError {
    /// Creates a fault error that simply wraps the provided message.
    pub fn fault<T: Into<String>>(msg: T) -> Self {
        Self::Fault(msg.into())
    }
}

impl From<String> for ShowreelError {
    fn from(value: String) -> Self {
        Self::Fault(value)
    }
}
