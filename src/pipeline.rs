use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    compile::compile_plan,
    engine::{FfmpegEngine, MediaEngine, TranscodeJob},
    error::{ComposeError, ComposeResult},
    fetch::{ClipFetcher, StagingFetcher},
    model::{ClipInput, MediaInfo, TransitionSpec},
    options::{ComposeOptions, ComposerConfig},
    plan::JobPlan,
};

/// Runs composition requests against a media engine and a clip fetcher.
///
/// Requests share nothing but the configuration; every staged file belongs to one request and
/// is removed when that request finishes, whether it succeeded or not.
pub struct Composer<E = FfmpegEngine, F = StagingFetcher> {
    cfg: ComposerConfig,
    engine: E,
    fetcher: F,
}

impl Composer {
    /// Composer driving the system `ffmpeg`/`ffprobe` and fetching over HTTP or the filesystem.
    pub fn with_system_tools(cfg: ComposerConfig) -> ComposeResult<Self> {
        let engine = FfmpegEngine::new(&cfg);
        Self::new(cfg, engine, StagingFetcher::new())
    }
}

impl<E: MediaEngine, F: ClipFetcher> Composer<E, F> {
    pub fn new(cfg: ComposerConfig, engine: E, fetcher: F) -> ComposeResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            engine,
            fetcher,
        })
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.cfg
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Fetch, plan, transcode and verify; returns the output path inside the staging dir.
    #[tracing::instrument(skip(self, sources, options), fields(clips = sources.len()))]
    pub fn compose(
        &self,
        sources: &[String],
        job_id: &str,
        options: &ComposeOptions,
    ) -> ComposeResult<PathBuf> {
        tracing::info!(
            use_transitions = options.use_transitions,
            transitions = ?options.transitions,
            durations = ?options.transition_durations,
            width = options.width,
            height = options.height,
            fps = options.fps,
            "received compose request"
        );

        check_job_id(job_id)?;
        let transitions = check_request(sources.len(), options)?;

        std::fs::create_dir_all(&self.cfg.staging_dir).with_context(|| {
            format!(
                "failed to create staging dir '{}'",
                self.cfg.staging_dir.display()
            )
        })?;

        let mut staged = StagedFiles::default();
        let inputs = self.fetch_all(sources, job_id, &mut staged)?;
        let plan = self.plan_staged(&inputs, options, transitions)?;

        let output = self.cfg.output_path(job_id);
        staged.output = Some(output.clone());
        tracing::info!(plan = plan.name(), output = %output.display(), "running media engine");

        let job = TranscodeJob {
            inputs,
            plan,
            output: output.clone(),
        };
        self.engine
            .transcode(&job)
            .map_err(|e| ComposeError::TranscodeFailed {
                job_id: job_id.to_string(),
                reason: format!("{e:#}"),
            })?;
        verify_output(&output)?;

        staged.output = None;
        tracing::info!(output = %output.display(), "composition finished");
        Ok(output)
    }

    /// Build the plan for already-local `inputs` without running the engine.
    ///
    /// Inputs are probed only when transitions are requested.
    pub fn plan(&self, inputs: &[PathBuf], options: &ComposeOptions) -> ComposeResult<JobPlan> {
        let transitions = check_request(inputs.len(), options)?;
        self.plan_staged(inputs, options, transitions)
    }

    fn plan_staged(
        &self,
        inputs: &[PathBuf],
        options: &ComposeOptions,
        transitions: Option<Vec<TransitionSpec>>,
    ) -> ComposeResult<JobPlan> {
        let Some(transitions) = transitions else {
            return JobPlan::fast_path(inputs.len());
        };

        let clips = self.probe_all(inputs)?;
        let plan = compile_plan(
            &clips,
            &transitions,
            options.profile(),
            &options.pad_color,
            options.preserve_clip_starts,
        )?;
        tracing::debug!(
            expected_sec = plan.duration_sec(),
            lead_in = ?plan.lead_in(),
            "planned transitions"
        );
        Ok(JobPlan::Blend(plan))
    }

    fn fetch_all(
        &self,
        sources: &[String],
        job_id: &str,
        staged: &mut StagedFiles,
    ) -> ComposeResult<Vec<PathBuf>> {
        let results: Vec<anyhow::Result<PathBuf>> = sources
            .par_iter()
            .enumerate()
            .map(|(i, src)| self.fetcher.fetch(src, &self.cfg.input_stem(job_id, i)))
            .collect();

        let mut inputs = Vec::with_capacity(sources.len());
        let mut first_err = None;
        for (index, (source, res)) in sources.iter().zip(results).enumerate() {
            match res {
                Ok(path) => {
                    staged.inputs.push(path.clone());
                    inputs.push(path);
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    tracing::error!(index, source = %source, error = %reason, "fetch failed");
                    if first_err.is_none() {
                        first_err = Some(ComposeError::FetchFailed {
                            index,
                            source_url: source.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(inputs),
        }
    }

    /// Probe every input; the lowest failing index is reported.
    fn probe_all(&self, inputs: &[PathBuf]) -> ComposeResult<Vec<ClipInput>> {
        let results: Vec<anyhow::Result<MediaInfo>> = inputs
            .par_iter()
            .map(|path| self.engine.probe(path))
            .collect();

        inputs
            .iter()
            .zip(results)
            .enumerate()
            .map(|(index, (path, res))| {
                res.map(|info| ClipInput::new(path, info)).map_err(|e| {
                    let reason = format!("{e:#}");
                    tracing::error!(index, path = %path.display(), error = %reason, "probe failed");
                    ComposeError::ProbeFailed {
                        index,
                        path: path.clone(),
                        reason,
                    }
                })
            })
            .collect()
    }
}

/// Reject malformed requests before touching the filesystem.
///
/// Returns the per-join transitions when the request asks for them.
fn check_request(
    clips: usize,
    options: &ComposeOptions,
) -> ComposeResult<Option<Vec<TransitionSpec>>> {
    options.validate()?;
    if clips == 0 {
        return Err(ComposeError::validation("at least one clip is required"));
    }
    if !options.use_transitions {
        return Ok(None);
    }
    if clips < 2 {
        return Err(ComposeError::InsufficientClips { clips });
    }
    TransitionSpec::for_joins(
        &options.transitions,
        &options.transition_durations,
        clips - 1,
    )
    .map(Some)
}

fn check_job_id(job_id: &str) -> ComposeResult<()> {
    if job_id.is_empty() || job_id.contains(['/', '\\']) || job_id == "." || job_id == ".." {
        return Err(ComposeError::validation(format!(
            "job id '{job_id}' must be a non-empty file name component"
        )));
    }
    Ok(())
}

fn verify_output(path: &Path) -> ComposeResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ComposeError::OutputMissing {
            path: path.to_path_buf(),
        }),
    }
}

/// Files owned by one request; removed on drop.
#[derive(Debug, Default)]
struct StagedFiles {
    inputs: Vec<PathBuf>,
    /// Set while the output is not yet known to be good.
    output: Option<PathBuf>,
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in self.inputs.iter().chain(self.output.iter()) {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed staged file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove staged file"
                ),
            }
        }
    }
}
