use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clipjoin", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, combine and write the clips listed in a request (requires `ffmpeg` on PATH).
    Compose(ComposeArgs),
    /// Print the `ffmpeg` invocation for a request whose `video_url`s are local paths.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Request JSON (`video_urls`, `use_transitions`, `transitions`, ...).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory for fetched inputs and the output file.
    #[arg(long, env = "CLIPJOIN_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Job id used to name staged files. Defaults to the request `id`.
    #[arg(long)]
    job_id: Option<String>,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Request JSON (`video_urls`, `use_transitions`, `transitions`, ...).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path shown in the printed command.
    #[arg(long, default_value = "out.mp4")]
    out: PathBuf,

    /// Print the plan as JSON instead of the command line.
    #[arg(long)]
    json: bool,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn read_request_json(path: &Path) -> anyhow::Result<clipjoin::CombineRequest> {
    let bytes =
        std::fs::read(path).with_context(|| format!("open request '{}'", path.display()))?;
    clipjoin::CombineRequest::from_json_slice(&bytes)
        .with_context(|| format!("parse request '{}'", path.display()))
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let req = read_request_json(&args.in_path)?;

    let staging_dir = args.staging_dir.unwrap_or_else(std::env::temp_dir);
    let cfg = clipjoin::ComposerConfig::new(staging_dir).with_binaries(args.ffmpeg, args.ffprobe);
    let composer = clipjoin::Composer::with_system_tools(cfg)?;

    let job_id = args
        .job_id
        .or_else(|| req.id.clone())
        .unwrap_or_else(|| format!("clipjoin-{}", std::process::id()));

    let out = composer.compose(&req.sources(), &job_id, &req.options())?;
    println!("{}", out.display());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let req = read_request_json(&args.in_path)?;

    let cfg = clipjoin::ComposerConfig::new(std::env::temp_dir())
        .with_binaries(args.ffmpeg, args.ffprobe);
    let composer = clipjoin::Composer::with_system_tools(cfg)?;

    let inputs: Vec<PathBuf> = req
        .sources()
        .into_iter()
        .map(|s| PathBuf::from(s.strip_prefix("file://").unwrap_or(&s)))
        .collect();
    let plan = composer.plan(&inputs, &req.options())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let job = clipjoin::TranscodeJob {
        inputs,
        plan,
        output: args.out.clone(),
    };
    let list = clipjoin::engine::concat_list_path(&args.out);
    let argv = composer.engine().command_args(&job, Some(&list))?;
    println!("ffmpeg {}", shell_words(&argv));
    Ok(())
}

fn shell_words(args: &[OsString]) -> String {
    args.iter()
        .map(|a| {
            let s = a.to_string_lossy();
            if !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./:+=,@".contains(c))
            {
                s.into_owned()
            } else {
                format!("'{}'", s.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
