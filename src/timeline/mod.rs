//! Lifecycle timeline reconstruction from free-text logs.
//!
//! Pipeline: [`extract`] finds the first line for each milestone,
//! [`timestamp`] turns its year-less stamp into an absolute time, and
//! [`delta`] computes intervals between consecutive present milestones.
//! A milestone that is missing or carries a bad timestamp leaves its slot
//! empty; neither stops the run.

pub mod delta;
pub mod extract;
pub mod patterns;
pub mod timestamp;

use crate::metrics::{duration, MetricEnvelope};
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use patterns::PatternSet;
use timestamp::TimestampParseError;

/// A milestone found in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Position in the milestone table.
    pub pattern_index: usize,
    /// 1-based month.
    pub month: u32,
    /// Captured `DD HH:MM:SS.ffffff` text.
    pub raw_fragment: String,
    pub normalized_time: DateTime<Utc>,
}

/// A matched line whose timestamp could not be normalized.
#[derive(Debug, Clone)]
pub struct EventError {
    pub pattern_index: usize,
    pub label: String,
    pub error: TimestampParseError,
}

/// Interval ending at a milestone, labeled by that milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledDelta {
    pub label: String,
    pub slug: String,
    pub from: usize,
    pub to: usize,
    pub start_time: DateTime<Utc>,
    pub duration: TimeDelta,
}

/// Result of one extraction run.
#[derive(Debug, Clone)]
pub struct Timeline {
    /// One slot per milestone, in table order.
    pub events: Vec<Option<LogEvent>>,
    pub errors: Vec<EventError>,
    pub deltas: Vec<LabeledDelta>,
}

/// Run the full pipeline over `corpus`, interpreting stamps in `reference_year`.
pub fn build(corpus: &str, patterns: &PatternSet, reference_year: i32) -> Timeline {
    let mut errors = Vec::new();
    let events: Vec<Option<LogEvent>> = extract::extract(corpus, patterns)
        .into_iter()
        .enumerate()
        .map(|(pattern_index, raw)| {
            let raw = raw?;
            match timestamp::normalize(&raw.month, &raw.fragment, reference_year) {
                Ok(normalized_time) => Some(LogEvent {
                    pattern_index,
                    month: normalized_time.month(),
                    raw_fragment: raw.fragment,
                    normalized_time,
                }),
                Err(error) => {
                    let label = patterns
                        .get(pattern_index)
                        .map(|m| m.label().to_string())
                        .unwrap_or_default();
                    errors.push(EventError {
                        pattern_index,
                        label,
                        error,
                    });
                    None
                }
            }
        })
        .collect();

    let times: Vec<Option<DateTime<Utc>>> = events
        .iter()
        .map(|e| e.as_ref().map(|e| e.normalized_time))
        .collect();

    let deltas = delta::compute_deltas(&times)
        .into_iter()
        .filter_map(|d| {
            let milestone = patterns.get(d.to)?;
            let start_time = times[d.from]?;
            Some(LabeledDelta {
                label: milestone.label().to_string(),
                slug: milestone.slug(),
                from: d.from,
                to: d.to,
                start_time,
                duration: d.duration,
            })
        })
        .collect();

    Timeline {
        events,
        errors,
        deltas,
    }
}

impl LabeledDelta {
    /// True when one or more absent milestones lie between `from` and `to`.
    pub fn bridges_gap(&self) -> bool {
        self.to - self.from > 1
    }
}

impl Timeline {
    /// Table indices of milestones with no usable event.
    pub fn absent(&self) -> impl Iterator<Item = usize> + '_ {
        self.events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_none())
            .map(|(i, _)| i)
    }

    /// Human-readable report, one `<label>: <duration>` line per delta.
    pub fn report_lines(&self) -> Vec<String> {
        self.deltas
            .iter()
            .map(|d| format!("{}: {}", d.label, duration::encode(d.duration)))
            .collect()
    }

    /// Each delta as a `TestDuration` record named `<prefix>.<milestone slug>`.
    pub fn to_metrics(&self, prefix: &str) -> Vec<MetricEnvelope> {
        self.deltas
            .iter()
            .map(|d| {
                let name = if prefix.is_empty() {
                    d.slug.clone()
                } else {
                    format!("{prefix}.{}", d.slug)
                };
                MetricEnvelope::test_duration(name, d.start_time, d.duration)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const KUBELET_LOG: &str = "\
I0115 10:00:00.000000    2211 config.go:405] Receiving a new pod \"pause(abc)\"
I0115 10:00:00.250000    2211 kubelet_pods.go:1337] Generating status for \"pause\"
some unrelated journal line
I0115 10:00:01.000000    2211 desired_state_of_world_populator.go:302] Added volume \"default-token\"
I0115 10:00:01.500000    2211 mount_linux.go:143] Mounting cmd (systemd-run)
I0115 10:00:02.000000    2211 kuberuntime_manager.go:385] No sandbox for pod \"pause\" can be found
I0115 10:00:03.000000    2211 kuberuntime_manager.go:654] Creating sandbox for pod \"pause\"
I0115 10:00:04.000000    2211 kuberuntime_manager.go:724] Creating container &Container{Name:write-pod}
I0115 10:00:04.500000    2211 server.go:435] Event(v1.ObjectReference{}): type: 'Normal' reason: 'Created' Created container
I0115 10:00:05.000000    2211 server.go:435] Event(v1.ObjectReference{}): type: 'Normal' reason: 'Started' Started container
I0115 10:00:05.500000    2211 status_manager.go:146] Status for pod \"pause\" updated successfully: (2, {Running [] []})
";

    const CONTROLLER_LOG: &str =
        "I0115 09:59:59.900000       1 factory.go:1147] Attempting to bind pause to node-1\n";

    fn corpus() -> String {
        // Kubelet output first: matching is search-based, not positional.
        format!("{KUBELET_LOG}{CONTROLLER_LOG}")
    }

    #[test]
    fn test_build_full_startup_timeline() {
        let timeline = build(&corpus(), PatternSet::pod_startup(), 2026);
        assert_eq!(timeline.events.len(), PatternSet::pod_startup().len());
        assert_eq!(timeline.absent().count(), 0);
        assert!(timeline.errors.is_empty());
        assert_eq!(timeline.deltas.len(), 10);
        assert!(timeline.deltas.iter().all(|d| d.duration >= TimeDelta::zero()));
        assert_eq!(timeline.deltas[0].label, "Schedule pod to node");
        assert_eq!(timeline.deltas[0].duration, TimeDelta::milliseconds(100));
        assert_eq!(timeline.deltas[9].label, "Pod running");

        let first = timeline.events[0].as_ref().unwrap();
        assert_eq!(first.month, 1);
        assert_eq!(first.raw_fragment, "15 09:59:59.900000");
    }

    #[test]
    fn test_report_lines_format() {
        let timeline = build(&corpus(), PatternSet::pod_startup(), 2026);
        let lines = timeline.report_lines();
        assert_eq!(lines[0], "Schedule pod to node: 100ms");
        assert_eq!(lines[1], "Node marks pod pending: 250ms");
        assert_eq!(lines[9], "Pod running: 500ms");
    }

    #[test]
    fn test_missing_milestone_is_bridged() {
        let without_mount: String = corpus()
            .lines()
            .filter(|l| !l.contains("mount_linux.go"))
            .map(|l| format!("{l}\n"))
            .collect();
        let timeline = build(&without_mount, PatternSet::pod_startup(), 2026);
        assert_eq!(timeline.absent().collect::<Vec<_>>(), vec![4]);
        assert_eq!(timeline.deltas.len(), 9);

        let bridged = timeline.deltas.iter().find(|d| d.from == 3).unwrap();
        assert_eq!(bridged.to, 5);
        assert!(bridged.bridges_gap());
        assert_eq!(bridged.label, "First mount completed");
        assert_eq!(bridged.duration, TimeDelta::seconds(1));
    }

    #[test]
    fn test_bad_timestamp_recorded_and_routed_around() {
        let corpus = corpus().replace("I0115 10:00:03.000000", "I1315 10:00:03.000000");
        let timeline = build(&corpus, PatternSet::pod_startup(), 2026);
        assert_eq!(timeline.errors.len(), 1);
        assert_eq!(timeline.errors[0].pattern_index, 6);
        assert!(matches!(
            timeline.errors[0].error,
            TimestampParseError::MonthOutOfRange { month: 13 }
        ));
        assert!(timeline.events[6].is_none());
        assert_eq!(timeline.deltas.len(), 9);
    }

    #[test]
    fn test_empty_corpus_yields_nothing() {
        let timeline = build("", PatternSet::pod_startup(), 2026);
        assert!(timeline.events.iter().all(Option::is_none));
        assert!(timeline.deltas.is_empty());
        assert!(timeline.report_lines().is_empty());
        assert!(timeline.to_metrics("pod-startup").is_empty());
    }

    #[test]
    fn test_to_metrics_names_and_start_times() {
        let timeline = build(&corpus(), PatternSet::pod_startup(), 2026);
        let metrics = timeline.to_metrics("pod-startup");
        assert_eq!(metrics.len(), 10);
        assert_eq!(metrics[0].name(), "pod-startup.schedule-pod-to-node");
        let td = metrics[0].test_duration_payload().unwrap();
        let bind = Utc.with_ymd_and_hms(2026, 1, 15, 9, 59, 59).unwrap() + TimeDelta::milliseconds(900);
        assert_eq!(td.start_time, bind);
        assert_eq!(td.duration, TimeDelta::milliseconds(100));

        let unprefixed = timeline.to_metrics("");
        assert_eq!(unprefixed[9].name(), "pod-running");
    }
}
