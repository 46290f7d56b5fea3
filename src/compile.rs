use crate::{
    error::{ComposeError, ComposeResult},
    model::{ClipInput, NormalizationProfile, TransitionSpec},
    timeline::{LeadInSchedule, Timeline, compute_timeline},
};

pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// One step of a [`CompositionPlan`].
///
/// Clip ops are labelled `v{clip}` / `a{clip}`; join ops name their inputs and output explicitly.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterOp {
    NormalizeVideo {
        clip: usize,
    },
    PadVideo {
        clip: usize,
        seconds: f64,
    },
    NormalizeAudio {
        clip: usize,
    },
    DelayAudio {
        clip: usize,
        seconds: f64,
    },
    SynthesizeSilence {
        clip: usize,
        seconds: f64,
    },
    CrossfadeVideo {
        left: String,
        right: String,
        output: String,
        transition: String,
        duration: f64,
        offset: f64,
    },
    CrossfadeAudio {
        left: String,
        right: String,
        output: String,
        duration: f64,
    },
    MapOutputs {
        video: String,
        audio: String,
    },
}

/// Ordered normalize/pad/blend graph for the transition path.
///
/// Built by [`compile_plan`]; rendered for `ffmpeg -filter_complex` by
/// [`CompositionPlan::filter_graph`].
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompositionPlan {
    profile: NormalizationProfile,
    pad_color: String,
    lead_in: Vec<f64>,
    timeline: Timeline,
    ops: Vec<FilterOp>,
}

pub fn video_label(clip: usize) -> String {
    format!("v{clip}")
}

pub fn audio_label(clip: usize) -> String {
    format!("a{clip}")
}

pub fn compile_plan(
    clips: &[ClipInput],
    transitions: &[TransitionSpec],
    profile: NormalizationProfile,
    pad_color: &str,
    preserve_starts: bool,
) -> ComposeResult<CompositionPlan> {
    if clips.is_empty() {
        return Err(ComposeError::validation("cannot compile a plan with no clips"));
    }
    if transitions.len() + 1 != clips.len() {
        return Err(ComposeError::validation(format!(
            "expected {} transitions for {} clips, got {}",
            clips.len() - 1,
            clips.len(),
            transitions.len()
        )));
    }

    let durations: Vec<f64> = clips.iter().map(|c| c.duration_sec).collect();
    let blend_durations: Vec<f64> = transitions.iter().map(|t| t.duration_sec).collect();
    let schedule = LeadInSchedule::new(&blend_durations, preserve_starts);
    let timeline = compute_timeline(&durations, &blend_durations, &schedule)?;

    let mut ops = Vec::with_capacity(clips.len() * 4 + transitions.len() * 2 + 1);
    for (i, clip) in clips.iter().enumerate() {
        let prepad = schedule.prepad(i);

        ops.push(FilterOp::NormalizeVideo { clip: i });
        if prepad > 0.0 {
            ops.push(FilterOp::PadVideo {
                clip: i,
                seconds: prepad,
            });
        }

        if clip.has_audio {
            ops.push(FilterOp::NormalizeAudio { clip: i });
            if prepad > 0.0 {
                ops.push(FilterOp::DelayAudio {
                    clip: i,
                    seconds: prepad,
                });
            }
        } else {
            ops.push(FilterOp::SynthesizeSilence {
                clip: i,
                seconds: clip.duration_sec + prepad,
            });
        }
    }

    let mut current_v = video_label(0);
    let mut current_a = audio_label(0);
    for (join, spec) in timeline.joins.iter().zip(transitions) {
        let k = join.join;
        let out_v = format!("v{k}o");
        let out_a = format!("a{k}o");

        ops.push(FilterOp::CrossfadeVideo {
            left: current_v,
            right: video_label(k),
            output: out_v.clone(),
            transition: spec.name.clone(),
            duration: join.duration_sec,
            offset: join.offset_sec,
        });
        ops.push(FilterOp::CrossfadeAudio {
            left: current_a,
            right: audio_label(k),
            output: out_a.clone(),
            duration: join.duration_sec,
        });

        current_v = out_v;
        current_a = out_a;
    }

    ops.push(FilterOp::MapOutputs {
        video: current_v,
        audio: current_a,
    });

    tracing::debug!(
        clips = clips.len(),
        ops = ops.len(),
        total_sec = timeline.total_sec,
        "compiled composition plan"
    );

    Ok(CompositionPlan {
        profile,
        pad_color: pad_color.to_string(),
        lead_in: schedule.as_slice().to_vec(),
        timeline,
        ops,
    })
}

/// Shortest round-trip decimal (`1.0`, `1.5`) without exponent notation.
///
/// ffmpeg duration options reject `5e-5`, which `{:?}` produces below `1e-4`.
fn seconds_arg(v: f64) -> String {
    let short = format!("{v:?}");
    if !short.contains(['e', 'E']) {
        return short;
    }
    let fixed = format!("{v:.9}");
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

struct GraphNode {
    inputs: Vec<String>,
    filters: Vec<String>,
    output: String,
}

impl GraphNode {
    fn render(&self) -> String {
        let mut s = String::new();
        for input in &self.inputs {
            s.push('[');
            s.push_str(input);
            s.push(']');
        }
        s.push_str(&self.filters.join(","));
        s.push('[');
        s.push_str(&self.output);
        s.push(']');
        s
    }
}

/// Append `filter` to the chain producing `label`, or start a chain reading it.
fn extend_chain(nodes: &mut Vec<GraphNode>, label: String, filter: String) {
    if let Some(last) = nodes.last_mut()
        && last.output == label
    {
        last.filters.push(filter);
        return;
    }
    nodes.push(GraphNode {
        inputs: vec![label.clone()],
        filters: vec![filter],
        output: label,
    });
}

impl CompositionPlan {
    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn profile(&self) -> NormalizationProfile {
        self.profile
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn lead_in(&self) -> &[f64] {
        &self.lead_in
    }

    /// Expected output duration in seconds.
    pub fn duration_sec(&self) -> f64 {
        self.timeline.total_sec
    }

    /// Final `(video, audio)` labels to pass to `-map`.
    pub fn output_labels(&self) -> Option<(&str, &str)> {
        self.ops.iter().rev().find_map(|op| match op {
            FilterOp::MapOutputs { video, audio } => Some((video.as_str(), audio.as_str())),
            _ => None,
        })
    }

    /// Render the `-filter_complex` argument.
    pub fn filter_graph(&self) -> String {
        let NormalizationProfile { width, height, fps } = self.profile;
        let mut nodes = Vec::<GraphNode>::with_capacity(self.ops.len());

        for op in &self.ops {
            match op {
                FilterOp::NormalizeVideo { clip } => nodes.push(GraphNode {
                    inputs: vec![format!("{clip}:v")],
                    filters: vec![
                        "setpts=PTS-STARTPTS".to_string(),
                        format!("fps={fps}"),
                        format!("scale={width}:{height}:force_original_aspect_ratio=decrease"),
                        format!("pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"),
                        "setsar=1".to_string(),
                        "format=yuv420p".to_string(),
                    ],
                    output: video_label(*clip),
                }),
                FilterOp::PadVideo { clip, seconds } => extend_chain(
                    &mut nodes,
                    video_label(*clip),
                    format!(
                        "tpad=start_duration={}:color={}",
                        seconds_arg(*seconds),
                        self.pad_color
                    ),
                ),
                FilterOp::NormalizeAudio { clip } => nodes.push(GraphNode {
                    inputs: vec![format!("{clip}:a")],
                    filters: vec![
                        "asetpts=PTS-STARTPTS".to_string(),
                        "aformat=channel_layouts=stereo".to_string(),
                        format!("aresample={AUDIO_SAMPLE_RATE}"),
                    ],
                    output: audio_label(*clip),
                }),
                FilterOp::DelayAudio { clip, seconds } => {
                    // adelay takes one value per channel.
                    let ms = (seconds * 1000.0).round() as u64;
                    extend_chain(&mut nodes, audio_label(*clip), format!("adelay={ms}|{ms}"));
                }
                FilterOp::SynthesizeSilence { clip, seconds } => nodes.push(GraphNode {
                    inputs: Vec::new(),
                    filters: vec![
                        format!(
                            "anullsrc=channel_layout=stereo:sample_rate={AUDIO_SAMPLE_RATE}"
                        ),
                        format!("atrim=0:{seconds:.6}"),
                        "asetpts=N/SR/TB".to_string(),
                    ],
                    output: audio_label(*clip),
                }),
                FilterOp::CrossfadeVideo {
                    left,
                    right,
                    output,
                    transition,
                    duration,
                    offset,
                } => nodes.push(GraphNode {
                    inputs: vec![left.clone(), right.clone()],
                    filters: vec![format!(
                        "xfade=transition={transition}:duration={}:offset={offset:.6}",
                        seconds_arg(*duration)
                    )],
                    output: output.clone(),
                }),
                FilterOp::CrossfadeAudio {
                    left,
                    right,
                    output,
                    duration,
                } => nodes.push(GraphNode {
                    inputs: vec![left.clone(), right.clone()],
                    filters: vec![format!("acrossfade=d={}", seconds_arg(*duration))],
                    output: output.clone(),
                }),
                FilterOp::MapOutputs { .. } => {}
            }
        }

        nodes
            .iter()
            .map(GraphNode::render)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn clip(i: usize, duration_sec: f64, has_audio: bool) -> ClipInput {
        ClipInput {
            path: PathBuf::from(format!("in_{i}.mp4")),
            duration_sec,
            has_audio,
        }
    }

    fn transitions(spec: &[(&str, f64)]) -> Vec<TransitionSpec> {
        spec.iter()
            .map(|(name, d)| TransitionSpec {
                name: name.to_string(),
                duration_sec: *d,
            })
            .collect()
    }

    const PROFILE: NormalizationProfile = NormalizationProfile {
        width: 1280,
        height: 720,
        fps: 30,
    };

    #[test]
    fn two_clip_graph_text_is_stable() {
        let plan = compile_plan(
            &[clip(0, 5.0, true), clip(1, 4.0, true)],
            &transitions(&[("fade", 1.0)]),
            PROFILE,
            "black",
            true,
        )
        .unwrap();

        let expected = [
            "[0:v]setpts=PTS-STARTPTS,fps=30,scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1,format=yuv420p[v0]",
            "[0:a]asetpts=PTS-STARTPTS,aformat=channel_layouts=stereo,aresample=48000[a0]",
            "[1:v]setpts=PTS-STARTPTS,fps=30,scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,setsar=1,format=yuv420p,tpad=start_duration=1.0:color=black[v1]",
            "[1:a]asetpts=PTS-STARTPTS,aformat=channel_layouts=stereo,aresample=48000,adelay=1000|1000[a1]",
            "[v0][v1]xfade=transition=fade:duration=1.0:offset=4.000000[v1o]",
            "[a0][a1]acrossfade=d=1.0[a1o]",
        ]
        .join("; ");
        assert_eq!(plan.filter_graph(), expected);
        assert_eq!(plan.output_labels(), Some(("v1o", "a1o")));
    }

    #[test]
    fn offsets_follow_padded_timeline() {
        let plan = compile_plan(
            &[clip(0, 5.0, true), clip(1, 4.0, true), clip(2, 6.0, true)],
            &transitions(&[("fade", 1.0), ("wipeleft", 1.5)]),
            PROFILE,
            "black",
            true,
        )
        .unwrap();

        let offsets: Vec<f64> = plan
            .ops()
            .iter()
            .filter_map(|op| match op {
                FilterOp::CrossfadeVideo { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![4.0, 7.5]);
        assert_eq!(plan.duration_sec(), 15.0);
        assert_eq!(plan.lead_in(), &[0.0, 1.0, 1.5]);
        assert!(plan.filter_graph().contains(
            "[v1o][v2]xfade=transition=wipeleft:duration=1.5:offset=7.500000[v2o]"
        ));
    }

    #[test]
    fn silence_is_synthesized_only_for_silent_clips() {
        let clips = [clip(0, 5.0, true), clip(1, 4.0, false), clip(2, 6.0, false)];
        let specs = transitions(&[("fade", 1.0), ("fade", 1.5)]);

        for preserve in [true, false] {
            let plan = compile_plan(&clips, &specs, PROFILE, "black", preserve).unwrap();
            let silences: Vec<(usize, f64)> = plan
                .ops()
                .iter()
                .filter_map(|op| match op {
                    FilterOp::SynthesizeSilence { clip, seconds } => Some((*clip, *seconds)),
                    _ => None,
                })
                .collect();

            if preserve {
                assert_eq!(silences, vec![(1, 5.0), (2, 7.5)]);
            } else {
                assert_eq!(silences, vec![(1, 4.0), (2, 6.0)]);
            }
            assert!(!plan.ops().iter().any(|op| matches!(
                op,
                FilterOp::NormalizeAudio { clip: 1 } | FilterOp::NormalizeAudio { clip: 2 }
            )));
        }

        let plan = compile_plan(&clips, &specs, PROFILE, "black", true).unwrap();
        assert!(plan.filter_graph().contains(
            "anullsrc=channel_layout=stereo:sample_rate=48000,atrim=0:5.000000,asetpts=N/SR/TB[a1]"
        ));
    }

    #[test]
    fn no_lead_in_means_no_padding_ops() {
        let plan = compile_plan(
            &[clip(0, 5.0, true), clip(1, 4.0, true)],
            &transitions(&[("fade", 1.0)]),
            PROFILE,
            "black",
            false,
        )
        .unwrap();
        assert!(!plan.ops().iter().any(|op| matches!(
            op,
            FilterOp::PadVideo { .. } | FilterOp::DelayAudio { .. }
        )));
        assert!(!plan.filter_graph().contains("tpad"));
    }

    #[test]
    fn single_clip_maps_its_own_labels() {
        let plan = compile_plan(&[clip(0, 3.0, false)], &[], PROFILE, "black", true).unwrap();
        assert_eq!(plan.output_labels(), Some(("v0", "a0")));
        assert_eq!(plan.duration_sec(), 3.0);
    }

    #[test]
    fn pad_color_is_passed_through() {
        let plan = compile_plan(
            &[clip(0, 2.0, true), clip(1, 2.0, true)],
            &transitions(&[("circleopen", 0.5)]),
            PROFILE,
            "0x112233",
            true,
        )
        .unwrap();
        assert!(plan.filter_graph().contains("tpad=start_duration=0.5:color=0x112233[v1]"));
        assert!(plan.filter_graph().contains("adelay=500|500[a1]"));
    }

    #[test]
    fn tiny_durations_render_without_exponent() {
        assert_eq!(seconds_arg(1.0), "1.0");
        assert_eq!(seconds_arg(1.5), "1.5");
        assert_eq!(seconds_arg(0.00005), "0.00005");
        assert_eq!(seconds_arg(1e-12), "0.0");

        let plan = compile_plan(
            &[clip(0, 5.0, true), clip(1, 4.0, true)],
            &transitions(&[("fade", 0.00005)]),
            PROFILE,
            "black",
            true,
        )
        .unwrap();
        let graph = plan.filter_graph();
        assert!(!graph.contains("e-"), "{graph}");
        assert!(graph.contains("tpad=start_duration=0.00005:color=black[v1]"));
        assert!(graph.contains("xfade=transition=fade:duration=0.00005:offset=4.999950[v1o]"));
        assert!(graph.contains("acrossfade=d=0.00005[a1o]"));
    }

    #[test]
    fn compile_is_deterministic() {
        let clips = [clip(0, 5.0, true), clip(1, 4.0, false), clip(2, 6.0, true)];
        let specs = transitions(&[("fade", 1.0), ("wipeleft", 1.5)]);
        let a = compile_plan(&clips, &specs, PROFILE, "black", true).unwrap();
        let b = compile_plan(&clips, &specs, PROFILE, "black", true).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.filter_graph(), b.filter_graph());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn transition_count_must_match_joins() {
        let err = compile_plan(
            &[clip(0, 5.0, true), clip(1, 4.0, true)],
            &[],
            PROFILE,
            "black",
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
    }
}
