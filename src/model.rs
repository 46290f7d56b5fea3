use std::path::PathBuf;

use crate::{
    error::{ComposeError, ComposeResult},
    params::OneOrMany,
};

/// Result of probing one media file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaInfo {
    pub duration_sec: f64,
    pub has_audio: bool,
}

/// One staged, probed clip.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipInput {
    pub path: PathBuf,
    pub duration_sec: f64,
    pub has_audio: bool,
}

impl ClipInput {
    pub fn new(path: impl Into<PathBuf>, info: MediaInfo) -> Self {
        Self {
            path: path.into(),
            duration_sec: info.duration_sec,
            has_audio: info.has_audio,
        }
    }
}

/// Blend applied at one join.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TransitionSpec {
    /// `xfade` transition name, passed through verbatim (`fade`, `wipeleft`, ...).
    pub name: String,
    pub duration_sec: f64,
}

impl TransitionSpec {
    /// Normalize scalar-or-list names and durations to exactly `joins` specs.
    pub fn for_joins(
        names: &OneOrMany<String>,
        durations: &OneOrMany<f64>,
        joins: usize,
    ) -> ComposeResult<Vec<TransitionSpec>> {
        let names = names.normalize(joins)?;
        let durations = durations.normalize(joins)?;

        names
            .into_iter()
            .zip(durations)
            .enumerate()
            .map(|(k, (name, duration_sec))| {
                if name.trim().is_empty() {
                    return Err(ComposeError::validation(format!(
                        "transition name for join {} must be non-empty",
                        k + 1
                    )));
                }
                if !duration_sec.is_finite() || duration_sec < 0.0 {
                    return Err(ComposeError::validation(format!(
                        "transition duration for join {} must be finite and >= 0, got {}",
                        k + 1,
                        duration_sec
                    )));
                }
                Ok(TransitionSpec { name, duration_sec })
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct NormalizationProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_count_matches_for_any_shape() {
        let shapes: [(OneOrMany<String>, OneOrMany<f64>); 3] = [
            (OneOrMany::One("fade".to_string()), OneOrMany::One(1.0)),
            (
                OneOrMany::Many(vec!["fade".to_string()]),
                OneOrMany::Many(vec![0.5, 1.0, 2.0, 3.0]),
            ),
            (
                OneOrMany::Many(vec![
                    "fade".to_string(),
                    "wipeleft".to_string(),
                    "circleopen".to_string(),
                ]),
                OneOrMany::One(0.75),
            ),
        ];

        for clips in 2..6 {
            let joins = clips - 1;
            for (names, durations) in &shapes {
                let specs = TransitionSpec::for_joins(names, durations, joins).unwrap();
                assert_eq!(specs.len(), joins);
            }
        }
    }

    #[test]
    fn negative_duration_is_rejected() {
        let names = OneOrMany::One("fade".to_string());
        let err = TransitionSpec::for_joins(&names, &OneOrMany::One(-1.0), 2).unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
    }

    #[test]
    fn zero_duration_is_allowed() {
        let names = OneOrMany::One("fade".to_string());
        let specs = TransitionSpec::for_joins(&names, &OneOrMany::One(0.0), 1).unwrap();
        assert_eq!(specs[0].duration_sec, 0.0);
    }
}
