use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context as _, bail};

use crate::{
    model::MediaInfo,
    options::{ComposerConfig, EncodeSettings},
    plan::{JobPlan, concat_list},
};

/// One engine invocation: inputs in clip order, a plan, and where to write.
#[derive(Clone, Debug)]
pub struct TranscodeJob {
    pub inputs: Vec<PathBuf>,
    pub plan: JobPlan,
    pub output: PathBuf,
}

/// The two capabilities the composer needs from a media toolchain.
pub trait MediaEngine: Send + Sync {
    fn probe(&self, path: &Path) -> anyhow::Result<MediaInfo>;

    /// Execute `job`, leaving the result at `job.output`.
    fn transcode(&self, job: &TranscodeJob) -> anyhow::Result<()>;
}

/// [`MediaEngine`] backed by the system `ffprobe` and `ffmpeg` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegEngine {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    encode: EncodeSettings,
}

impl FfmpegEngine {
    pub fn new(cfg: &ComposerConfig) -> Self {
        Self {
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
            ffprobe_bin: cfg.ffprobe_bin.clone(),
            encode: cfg.encode.clone(),
        }
    }

    /// `ffmpeg` arguments for `job`.
    ///
    /// `concat_list_path` is required for [`JobPlan::Concat`] and ignored otherwise.
    pub fn command_args(
        &self,
        job: &TranscodeJob,
        concat_list_path: Option<&Path>,
    ) -> anyhow::Result<Vec<OsString>> {
        let mut args: Vec<OsString> = ["-y", "-loglevel", "error"]
            .into_iter()
            .map(OsString::from)
            .collect();

        match &job.plan {
            JobPlan::StreamCopy => {
                let [input] = job.inputs.as_slice() else {
                    bail!("stream copy expects exactly one input, got {}", job.inputs.len());
                };
                args.push("-i".into());
                args.push(input.into());
                args.extend(["-c", "copy"].map(OsString::from));
            }
            JobPlan::Concat => {
                let list = concat_list_path.context("concat plan requires a list file path")?;
                args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
                args.push(list.into());
                args.extend(["-c", "copy"].map(OsString::from));
            }
            JobPlan::Blend(plan) => {
                for input in &job.inputs {
                    args.push("-i".into());
                    args.push(input.into());
                }
                let (video, audio) = plan
                    .output_labels()
                    .context("composition plan has no output mapping")?;
                args.push("-filter_complex".into());
                args.push(plan.filter_graph().into());
                args.extend(
                    [
                        "-map".to_string(),
                        format!("[{video}]"),
                        "-map".to_string(),
                        format!("[{audio}]"),
                        "-c:v".to_string(),
                        self.encode.video_codec.clone(),
                        "-preset".to_string(),
                        self.encode.preset.clone(),
                        "-crf".to_string(),
                        self.encode.crf.to_string(),
                        "-c:a".to_string(),
                        self.encode.audio_codec.clone(),
                        "-movflags".to_string(),
                        "+faststart".to_string(),
                    ]
                    .map(OsString::from),
                );
            }
        }

        args.push(job.output.clone().into());
        Ok(args)
    }

    fn run_ffmpeg(&self, args: &[OsString]) -> anyhow::Result<()> {
        tracing::debug!(bin = %self.ffmpeg_bin, ?args, "spawning ffmpeg");
        let out = Command::new(&self.ffmpeg_bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| {
                format!(
                    "failed to spawn {} (is it installed and on PATH?)",
                    self.ffmpeg_bin
                )
            })?;

        if !out.status.success() {
            bail!(
                "{} exited with status {}: {}",
                self.ffmpeg_bin,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe(&self, path: &Path) -> anyhow::Result<MediaInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            #[serde(default)]
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let out = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .with_context(|| format!("failed to run {}", self.ffprobe_bin))?;
        if !out.status.success() {
            bail!(
                "{} exited with status {}: {}",
                self.ffprobe_bin,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        let parsed: ProbeOut =
            serde_json::from_slice(&out.stdout).context("ffprobe json parse failed")?;
        let raw = parsed
            .format
            .and_then(|f| f.duration)
            .context("ffprobe reported no container duration")?;
        let duration_sec: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("unparsable duration '{raw}'"))?;
        if !duration_sec.is_finite() || duration_sec <= 0.0 {
            bail!("duration must be positive, got {duration_sec}");
        }
        let has_audio = parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        Ok(MediaInfo {
            duration_sec,
            has_audio,
        })
    }

    fn transcode(&self, job: &TranscodeJob) -> anyhow::Result<()> {
        ensure_parent_dir(&job.output)?;

        if !matches!(job.plan, JobPlan::Concat) {
            return self.run_ffmpeg(&self.command_args(job, None)?);
        }

        let list_path = concat_list_path(&job.output);
        std::fs::write(&list_path, concat_list(&job.inputs)?)
            .with_context(|| format!("failed to write concat list '{}'", list_path.display()))?;
        let result = self
            .command_args(job, Some(&list_path))
            .and_then(|args| self.run_ffmpeg(&args));
        if let Err(e) = std::fs::remove_file(&list_path) {
            tracing::warn!(
                path = %list_path.display(),
                error = %e,
                "failed to remove concat list"
            );
        }
        result
    }
}

/// `<output stem>_concat_list.txt` next to the output.
pub fn concat_list_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{stem}_concat_list.txt"))
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `bin -version` runs successfully.
pub fn is_tool_on_path(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compile::compile_plan,
        model::{ClipInput, NormalizationProfile, TransitionSpec},
    };

    fn engine() -> FfmpegEngine {
        FfmpegEngine::new(&ComposerConfig::new("/tmp/staging"))
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn stream_copy_args() {
        let job = TranscodeJob {
            inputs: vec![PathBuf::from("in.mp4")],
            plan: JobPlan::StreamCopy,
            output: PathBuf::from("out.mp4"),
        };
        assert_eq!(
            strings(engine().command_args(&job, None).unwrap()),
            ["-y", "-loglevel", "error", "-i", "in.mp4", "-c", "copy", "out.mp4"]
        );
    }

    #[test]
    fn stream_copy_rejects_many_inputs() {
        let job = TranscodeJob {
            inputs: vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
            plan: JobPlan::StreamCopy,
            output: PathBuf::from("out.mp4"),
        };
        assert!(engine().command_args(&job, None).is_err());
    }

    #[test]
    fn concat_args_use_demuxer() {
        let job = TranscodeJob {
            inputs: vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
            plan: JobPlan::Concat,
            output: PathBuf::from("/s/job.mp4"),
        };
        let list = concat_list_path(&job.output);
        assert_eq!(list, PathBuf::from("/s/job_concat_list.txt"));
        assert_eq!(
            strings(engine().command_args(&job, Some(&list)).unwrap()),
            [
                "-y",
                "-loglevel",
                "error",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                "/s/job_concat_list.txt",
                "-c",
                "copy",
                "/s/job.mp4"
            ]
        );
        assert!(engine().command_args(&job, None).is_err());
    }

    #[test]
    fn blend_args_map_final_labels_and_encode() {
        let clips = [
            ClipInput {
                path: PathBuf::from("a.mp4"),
                duration_sec: 5.0,
                has_audio: true,
            },
            ClipInput {
                path: PathBuf::from("b.mp4"),
                duration_sec: 4.0,
                has_audio: false,
            },
        ];
        let plan = compile_plan(
            &clips,
            &[TransitionSpec {
                name: "fade".to_string(),
                duration_sec: 1.0,
            }],
            NormalizationProfile {
                width: 640,
                height: 360,
                fps: 24,
            },
            "black",
            true,
        )
        .unwrap();
        let graph = plan.filter_graph();
        let job = TranscodeJob {
            inputs: clips.iter().map(|c| c.path.clone()).collect(),
            plan: JobPlan::Blend(plan),
            output: PathBuf::from("out.mp4"),
        };

        let args = strings(engine().command_args(&job, None).unwrap());
        let fc = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[fc + 1], graph);
        assert_eq!(
            &args[fc + 2..],
            [
                "-map",
                "[v1o]",
                "-map",
                "[a1o]",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "18",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
                "out.mp4"
            ]
        );
        assert_eq!(&args[3..7], ["-i", "a.mp4", "-i", "b.mp4"]);
    }

    #[test]
    fn missing_binary_is_reported() {
        let cfg = ComposerConfig::new("/tmp").with_binaries(
            "clipjoin-no-such-ffmpeg",
            "clipjoin-no-such-ffprobe",
        );
        let engine = FfmpegEngine::new(&cfg);
        assert!(engine.probe(Path::new("whatever.mp4")).is_err());
        assert!(!is_tool_on_path("clipjoin-no-such-ffmpeg"));
    }
}
