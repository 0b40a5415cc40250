pub type PackshotResult<T> = Result<T, PackshotError>;

#[derive(thiserror::Error, Debug)]
pub enum PackshotError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Image fetch/decode failure. Recoverable: the affected layer renders as
    /// placeholder/blank, sibling layers are unaffected.
    #[error("resource load error: {0}")]
    ResourceLoad(String),

    /// Degenerate geometry (collinear control points, cone edge cases).
    /// Recoverable: the affected node is skipped, the frame still completes.
    #[error("render computation error: {0}")]
    RenderComputation(String),

    /// Programmer error (render before load, unknown renderer tag). Not caught
    /// by the pipeline; propagates to the top-level handler.
    #[error("contract violation: {0}")]
    Contract(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PackshotError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resource_load(msg: impl Into<String>) -> Self {
        Self::ResourceLoad(msg.into())
    }

    pub fn render_computation(msg: impl Into<String>) -> Self {
        Self::RenderComputation(msg.into())
    }

    pub fn contract(msg: impl Into<String>) -> Self {
        Self::Contract(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether the compositing pass may catch this error, log it, and carry on
    /// with the remaining nodes/layers.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ResourceLoad(_) | Self::RenderComputation(_))
    }
}
