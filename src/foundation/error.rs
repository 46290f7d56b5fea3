use std::path::PathBuf;

pub type ComposeResult<T> = Result<T, ComposeError>;

#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    #[error("invalid parameter shape: {0}")]
    InvalidParameterShape(String),

    #[error("transitions require at least two clips, got {clips}")]
    InsufficientClips { clips: usize },

    #[error("fetch failed for clip {index} ('{source_url}'): {reason}")]
    FetchFailed {
        index: usize,
        source_url: String,
        reason: String,
    },

    #[error("probe failed for clip {index} ('{}'): {reason}", path.display())]
    ProbeFailed {
        index: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("transcode failed for job '{job_id}': {reason}")]
    TranscodeFailed { job_id: String, reason: String },

    #[error("output file '{}' is missing or empty after transcode", path.display())]
    OutputMissing { path: PathBuf },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ComposeError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::InvalidParameterShape(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for errors raised by the engine stage, including the post-run output check.
    pub fn is_transcode_failure(&self) -> bool {
        matches!(
            self,
            Self::TranscodeFailed { .. } | Self::OutputMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ComposeError::shape("x")
                .to_string()
                .contains("invalid parameter shape:")
        );
        assert!(
            ComposeError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            ComposeError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn stage_errors_carry_clip_index() {
        let err = ComposeError::ProbeFailed {
            index: 2,
            path: PathBuf::from("/tmp/job_input_2.mp4"),
            reason: "ffprobe exited with status 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("clip 2"));
        assert!(msg.contains("job_input_2.mp4"));
    }

    #[test]
    fn output_missing_counts_as_transcode_failure() {
        let err = ComposeError::OutputMissing {
            path: PathBuf::from("out.mp4"),
        };
        assert!(err.is_transcode_failure());
        assert!(!ComposeError::InsufficientClips { clips: 1 }.is_transcode_failure());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ComposeError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
