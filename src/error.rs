//! Failure taxonomy of a comparison run.
//!
//! Library-side code (`ffmpeg-io`) reports `anyhow` errors; the controller sorts
//! them into these classes at the point where it knows which stage failed.

/// Fatal errors of a pipeline run. Cancellation is not an error.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Source or sink cannot be created, or the derived output layout is invalid.
    /// Raised before any frame is processed.
    #[error("failed to open stream: {0:#}")]
    StreamOpen(anyhow::Error),

    #[error("transform failed on frame {frame}: {cause:#}")]
    Transform { frame: u64, cause: anyhow::Error },

    #[error("{target} expects {expected:?}, got frame of {actual:?}")]
    Shape {
        target: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("failed to read frame {frame}: {cause:#}")]
    Read { frame: u64, cause: anyhow::Error },

    #[error("failed to composite frame {frame}: {cause:#}")]
    Compose { frame: u64, cause: anyhow::Error },

    #[error("failed to write frame {frame} to {target}: {cause:#}")]
    Write {
        frame: u64,
        target: &'static str,
        cause: anyhow::Error,
    },

    #[error("failed to finalize {target}: {cause:#}")]
    Close {
        target: &'static str,
        cause: anyhow::Error,
    },
}

impl PipelineError {
    pub fn stream_open(msg: impl std::fmt::Display) -> Self {
        PipelineError::StreamOpen(anyhow::anyhow!("{}", msg))
    }

    #[cfg(test)]
    pub fn is_stream_open(&self) -> bool {
        matches!(self, PipelineError::StreamOpen(_))
    }
}
