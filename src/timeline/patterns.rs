/// Ordered milestone table: one `(pattern, label)` record per lifecycle event.
///
/// Every pattern has exactly two capture groups: the two-digit month and the
/// `DD HH:MM:SS.ffffff` remainder of a glog timestamp. The label of a
/// milestone names the interval that ends at it, so a delta between two
/// present milestones takes the label of the later one.
use regex::Regex;
use std::sync::LazyLock;

/// Capture groups every milestone pattern must expose (excluding group 0).
pub const CAPTURE_GROUPS: usize = 2;

/// Prefix of a glog line up to the source location: `I0115 10:00:00.000000    1234 `.
macro_rules! glog_line {
    ($location:literal) => {
        concat!(
            r"(?m)^I(\d\d)(\d+[ \t]+\d+:\d+:\d+\.\d+)[ \t]+\d+[ \t]+",
            $location
        )
    };
}

/// Scheduler and kubelet milestones for a single pod, from bind to running.
const POD_STARTUP_TABLE: &[(&str, &str)] = &[
    (
        glog_line!(r"factory\.go:1147\][ \t].*$"),
        "Scheduler attempts to bind pod",
    ),
    (
        glog_line!(r"config\.go:405\][ \t].*$"),
        "Schedule pod to node",
    ),
    (
        glog_line!(r"kubelet_pods\.go:1337\][ \t].*$"),
        "Node marks pod pending",
    ),
    (
        glog_line!(r"desired_state_of_world_populator\.go:302\][ \t].*$"),
        "Time to start first volume mount",
    ),
    (
        glog_line!(r"mount_linux\.go:143\][ \t].*$"),
        "Mount command occurs",
    ),
    (
        glog_line!(r"kuberuntime_manager\.go:385\][ \t].*$"),
        "First mount completed",
    ),
    (
        glog_line!(r"kuberuntime_manager\.go:654\][ \t].*$"),
        "Time to create podsandbox",
    ),
    (
        glog_line!(r"kuberuntime_manager\.go:724\][ \t].*$"),
        "Time between podsandbox and container creating",
    ),
    (
        glog_line!(r"server\.go:435\][ \t].*[ \t]Created[ \t]container$"),
        "Container created",
    ),
    (
        glog_line!(r"server\.go:435\][ \t].*[ \t]Started[ \t]container$"),
        "Container started",
    ),
    (
        glog_line!(r"status_manager\.go:146\][ \t].*\(2,[ \t]\{Running.*$"),
        "Pod running",
    ),
];

static POD_STARTUP: LazyLock<PatternSet> = LazyLock::new(|| {
    PatternSet::new(POD_STARTUP_TABLE.iter().copied()).expect("built-in milestone table is valid")
});

/// A milestone table could not be built.
#[derive(Debug)]
pub enum PatternError {
    Regex { index: usize, source: regex::Error },
    CaptureGroups { index: usize, found: usize },
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Regex { index, source } => {
                write!(f, "milestone {index}: invalid pattern: {source}")
            }
            PatternError::CaptureGroups { index, found } => write!(
                f,
                "milestone {index}: expected {CAPTURE_GROUPS} capture groups, found {found}"
            ),
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatternError::Regex { source, .. } => Some(source),
            PatternError::CaptureGroups { .. } => None,
        }
    }
}

/// One lifecycle event and how to recognize it.
#[derive(Debug, Clone)]
pub struct Milestone {
    pattern: Regex,
    label: String,
}

impl Milestone {
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Label reduced to a lowercase, dash-separated metric name component.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.label.len());
        for c in self.label.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        slug
    }
}

/// Ordered milestone table. Order is the presumed causal order of events.
#[derive(Debug, Clone)]
pub struct PatternSet {
    milestones: Vec<Milestone>,
}

impl PatternSet {
    /// Compile a table from `(pattern, label)` pairs, keeping their order.
    pub fn new<'a, I>(entries: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut milestones = Vec::new();
        for (index, (pattern, label)) in entries.into_iter().enumerate() {
            let pattern = Regex::new(pattern).map_err(|e| PatternError::Regex { index, source: e })?;
            let found = pattern.captures_len() - 1;
            if found != CAPTURE_GROUPS {
                return Err(PatternError::CaptureGroups { index, found });
            }
            milestones.push(Milestone {
                pattern,
                label: label.to_string(),
            });
        }
        Ok(Self { milestones })
    }

    /// The built-in pod startup table.
    pub fn pod_startup() -> &'static PatternSet {
        &POD_STARTUP
    }

    pub fn len(&self) -> usize {
        self.milestones.len()
    }

    pub fn get(&self, index: usize) -> Option<&Milestone> {
        self.milestones.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Milestone> {
        self.milestones.iter()
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a Milestone;
    type IntoIter = std::slice::Iter<'a, Milestone>;

    fn into_iter(self) -> Self::IntoIter {
        self.milestones.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_startup_table_compiles_in_order() {
        let set = PatternSet::pod_startup();
        assert_eq!(set.len(), POD_STARTUP_TABLE.len());
        assert_eq!(set.get(0).unwrap().label(), "Scheduler attempts to bind pod");
        assert_eq!(set.get(set.len() - 1).unwrap().label(), "Pod running");
    }

    #[test]
    fn test_every_milestone_has_a_label() {
        for m in PatternSet::pod_startup() {
            assert!(!m.label().is_empty());
        }
    }

    #[test]
    fn test_every_milestone_captures_month_and_fragment() {
        for m in PatternSet::pod_startup() {
            assert_eq!(m.pattern().captures_len() - 1, CAPTURE_GROUPS);
        }
    }

    #[test]
    fn test_kubelet_lines_match_expected_milestones() {
        let set = PatternSet::pod_startup();
        let cases = [
            (0, "I0115 10:00:00.000001    1234 factory.go:1147] Attempting to bind pause to node-1"),
            (1, "I0115 10:00:00.100000    2211 config.go:405] Receiving a new pod \"pause(abc)\""),
            (8, "I0115 10:00:03.000000    2211 server.go:435] Event(...): type: 'Normal' reason: 'Created' Created container"),
            (9, "I0115 10:00:03.500000    2211 server.go:435] Event(...): type: 'Normal' reason: 'Started' Started container"),
            (10, "I0115 10:00:04.000000    2211 status_manager.go:146] Status for pod \"pause\" updated successfully: (2, {Running [..]})"),
        ];
        for (index, line) in cases {
            let caps = set.get(index).unwrap().pattern().captures(line);
            let caps = caps.unwrap_or_else(|| panic!("milestone {index} should match {line}"));
            assert_eq!(&caps[1], "01");
            assert!(caps[2].starts_with("15 10:00:0"));
        }
    }

    #[test]
    fn test_created_and_started_do_not_cross_match() {
        let set = PatternSet::pod_startup();
        let started = "I0115 10:00:03.500000 2211 server.go:435] Event: Started container";
        assert!(!set.get(8).unwrap().pattern().is_match(started));
        assert!(set.get(9).unwrap().pattern().is_match(started));
    }

    #[test]
    fn test_new_rejects_wrong_capture_count() {
        let err = PatternSet::new([(r"^I(\d\d)", "only month")]).unwrap_err();
        assert!(matches!(err, PatternError::CaptureGroups { index: 0, found: 1 }));

        let err = PatternSet::new([
            (r"^I(\d\d)(\d+ \S+)", "ok"),
            (r"^I(\d\d)(\d+)(x)", "three"),
        ])
        .unwrap_err();
        assert!(matches!(err, PatternError::CaptureGroups { index: 1, found: 3 }));
    }

    #[test]
    fn test_new_rejects_invalid_regex() {
        let err = PatternSet::new([(r"(unclosed", "bad")]).unwrap_err();
        assert!(matches!(err, PatternError::Regex { index: 0, .. }));
        assert!(err.to_string().contains("milestone 0"));
    }

    #[test]
    fn test_label_stays_attached_to_its_pattern() {
        let set = PatternSet::new([
            (r"(?m)^A(\d\d)(.+)$", "alpha"),
            (r"(?m)^B(\d\d)(.+)$", "beta"),
        ])
        .unwrap();
        let beta = set.iter().find(|m| m.pattern().is_match("B01x")).unwrap();
        assert_eq!(beta.label(), "beta");
    }

    #[test]
    fn test_slug() {
        let set = PatternSet::pod_startup();
        assert_eq!(set.get(2).unwrap().slug(), "node-marks-pod-pending");
        assert_eq!(
            set.get(7).unwrap().slug(),
            "time-between-podsandbox-and-container-creating"
        );
    }
}
