// Error taxonomy for the render pipeline.
//
// Every variant here corresponds to one of the caller-visible failure modes
// the orchestrator can raise. `code()` gives callers a stable string to
// match on without depending on Display text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to download source bytes: {0}")]
    DownloadFailed(String),

    #[error("failed to decode source: {0}")]
    DecodeFailed(String),

    #[error("unsupported source kind: {0}")]
    UnsupportedSource(String),

    #[error("codec driver used before initialization")]
    CodecNotInitialized,

    #[error("codec run failed: {0}")]
    CodecRunFailed(String),

    #[error("task submitted after pool shutdown")]
    PoolShutdown,

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Stable `animated-renderer.{kind}` code for the error's taxonomy slot.
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::DownloadFailed(_) => "animated-renderer.download-failed",
            RenderError::DecodeFailed(_) => "animated-renderer.decode-failed",
            RenderError::UnsupportedSource(_) => "animated-renderer.unsupported-source",
            RenderError::CodecNotInitialized => "animated-renderer.codec-not-initialized",
            RenderError::CodecRunFailed(_) => "animated-renderer.codec-run-failed",
            RenderError::PoolShutdown => "animated-renderer.pool-shutdown",
            RenderError::InvalidJob(_) => "animated-renderer.invalid-job",
            RenderError::Io(_) => "animated-renderer.io",
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
