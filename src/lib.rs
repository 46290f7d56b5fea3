//! Join an ordered list of video clips into one MP4.
//!
//! Without transitions the clips are stream-copied or losslessly concatenated. With transitions
//! every clip is normalized to one profile and consecutive clips are blended with `xfade` /
//! `acrossfade`, optionally prepending a lead-in so the blend does not swallow a clip's opening.
//!
//! - Describe the request with [`ComposeOptions`] (or parse a [`CombineRequest`])
//! - Plan it with [`Composer::plan`] or run it end to end with [`Composer::compose`]
//! - The timing core ([`LeadInSchedule`], [`compute_timeline`], [`compile_plan`]) is pure and
//!   usable on its own
#![forbid(unsafe_code)]

mod foundation;

pub mod compile;
pub mod engine;
pub mod fetch;
pub mod model;
pub mod options;
pub mod params;
pub mod pipeline;
pub mod plan;
pub mod timeline;

pub use foundation::error;

pub use compile::{CompositionPlan, FilterOp, compile_plan};
pub use engine::{FfmpegEngine, MediaEngine, TranscodeJob};
pub use error::{ComposeError, ComposeResult};
pub use fetch::{ClipFetcher, StagingFetcher};
pub use model::{ClipInput, MediaInfo, NormalizationProfile, TransitionSpec};
pub use options::{CombineRequest, ComposeOptions, ComposerConfig, EncodeSettings, VideoSource};
pub use params::OneOrMany;
pub use pipeline::Composer;
pub use plan::JobPlan;
pub use timeline::{JoinTiming, LeadInSchedule, Timeline, compute_timeline};
