use std::path::{Path, PathBuf};

use crate::{
    compile::CompositionPlan,
    error::{ComposeError, ComposeResult},
};

/// What the media engine is asked to do for one request.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPlan {
    /// Copy the single input's streams into the output container.
    StreamCopy,
    /// Concat demuxer over all inputs in order, no re-encode.
    Concat,
    /// Normalize, pad and cross-fade (re-encodes).
    Blend(CompositionPlan),
}

impl JobPlan {
    /// Plan used when no transitions are requested.
    ///
    /// Inputs are expected to share codecs and stream parameters; that is not checked here.
    pub fn fast_path(clips: usize) -> ComposeResult<JobPlan> {
        match clips {
            0 => Err(ComposeError::validation("at least one clip is required")),
            1 => Ok(JobPlan::StreamCopy),
            _ => Ok(JobPlan::Concat),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobPlan::StreamCopy => "stream_copy",
            JobPlan::Concat => "concat",
            JobPlan::Blend(_) => "blend",
        }
    }

    pub fn reencodes(&self) -> bool {
        matches!(self, JobPlan::Blend(_))
    }
}

/// Contents of a concat-demuxer list file for `inputs`.
pub fn concat_list(inputs: &[PathBuf]) -> ComposeResult<String> {
    let mut out = String::new();
    for input in inputs {
        let abs = absolute(input)?;
        let escaped = abs.to_string_lossy().replace('\'', r"'\''");
        out.push_str("file '");
        out.push_str(&escaped);
        out.push_str("'\n");
    }
    Ok(out)
}

fn absolute(path: &Path) -> ComposeResult<PathBuf> {
    use anyhow::Context as _;
    Ok(std::path::absolute(path)
        .with_context(|| format!("failed to resolve absolute path for '{}'", path.display()))?)
}
