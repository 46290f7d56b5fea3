use crate::error::{ComposeError, ComposeResult};

/// Seconds of padding prepended to each clip before blending.
///
/// With lead-in preservation every clip after the first is padded by the duration of the
/// transition that blends it in, so the blend consumes padding instead of the clip's opening.
#[derive(Clone, Debug, PartialEq)]
pub struct LeadInSchedule {
    prepad: Vec<f64>,
}

impl LeadInSchedule {
    /// Build the schedule for `transition_durations.len() + 1` clips.
    pub fn new(transition_durations: &[f64], preserve_starts: bool) -> Self {
        let mut prepad = Vec::with_capacity(transition_durations.len() + 1);
        prepad.push(0.0);
        if preserve_starts {
            prepad.extend_from_slice(transition_durations);
        } else {
            prepad.resize(transition_durations.len() + 1, 0.0);
        }
        Self { prepad }
    }

    pub fn prepad(&self, clip: usize) -> f64 {
        self.prepad.get(clip).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.prepad
    }

    pub fn len(&self) -> usize {
        self.prepad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prepad.is_empty()
    }
}

/// Timing of the blend at one join.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct JoinTiming {
    /// Index of the incoming clip (`1..clips`).
    pub join: usize,
    pub duration_sec: f64,
    /// Start of the blend within the already-composed output.
    pub offset_sec: f64,
    /// Composed length once the incoming clip has been blended in.
    pub length_after_sec: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Timeline {
    pub joins: Vec<JoinTiming>,
    pub total_sec: f64,
}

/// Walk the joins in order, tracking the composed length.
///
/// `offset_k = max(len - d[k-1], 0)`, then `len += prepad[k] + durations[k] - d[k-1]`. The
/// running length already includes every earlier lead-in, so offsets stay correct once
/// padding shifts later clips.
pub fn compute_timeline(
    durations: &[f64],
    transition_durations: &[f64],
    schedule: &LeadInSchedule,
) -> ComposeResult<Timeline> {
    let Some(&first) = durations.first() else {
        return Err(ComposeError::validation(
            "timeline needs at least one clip duration",
        ));
    };
    if transition_durations.len() + 1 != durations.len() {
        return Err(ComposeError::validation(format!(
            "expected {} transition durations for {} clips, got {}",
            durations.len() - 1,
            durations.len(),
            transition_durations.len()
        )));
    }
    if schedule.len() != durations.len() {
        return Err(ComposeError::validation(format!(
            "lead-in schedule covers {} clips, expected {}",
            schedule.len(),
            durations.len()
        )));
    }

    let mut current_len = first;
    let mut joins = Vec::with_capacity(transition_durations.len());
    for (k, (&clip_dur, &d)) in durations[1..].iter().zip(transition_durations).enumerate() {
        let k = k + 1;
        let offset_sec = (current_len - d).max(0.0);
        current_len += schedule.prepad(k) + clip_dur - d;
        joins.push(JoinTiming {
            join: k,
            duration_sec: d,
            offset_sec,
            length_after_sec: current_len,
        });
    }

    Ok(Timeline {
        joins,
        total_sec: current_len,
    })
}
