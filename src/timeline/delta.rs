/// Pairwise durations between consecutive present milestones.
///
/// Absent slots are bridged: a delta always spans the nearest present
/// neighbors in table order, so a missing milestone never produces a zero
/// or placeholder interval. Whether a gap should instead be reported as a
/// failure is left to the caller; this module always bridges.
use chrono::{DateTime, TimeDelta, Utc};

/// Interval between two present milestones, identified by table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDelta {
    pub from: usize,
    pub to: usize,
    pub duration: TimeDelta,
}

/// Walk the slots in order, emitting `time[next] - time[last present]`.
///
/// Out-of-order logs can produce negative durations; they are reported as is.
pub fn compute_deltas(slots: &[Option<DateTime<Utc>>]) -> Vec<SlotDelta> {
    let mut deltas = Vec::new();
    let mut last: Option<(usize, DateTime<Utc>)> = None;

    for (index, slot) in slots.iter().enumerate() {
        let Some(time) = *slot else {
            continue;
        };
        if let Some((from, previous)) = last {
            deltas.push(SlotDelta {
                from,
                to: index,
                duration: time - previous,
            });
        }
        last = Some((index, time));
    }

    deltas
}
