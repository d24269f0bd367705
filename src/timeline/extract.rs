/// First-match milestone extraction over a combined log corpus.
use super::patterns::PatternSet;

/// Text captured for one milestone: the month digits and the year-less remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    pub month: String,
    pub fragment: String,
}

/// Search the corpus once per milestone, in table order.
///
/// Only the first occurrence of each pattern counts. The result has one
/// slot per milestone; `None` marks a milestone with no match.
pub fn extract(corpus: &str, patterns: &PatternSet) -> Vec<Option<RawMatch>> {
    patterns
        .iter()
        .enumerate()
        .map(|(index, milestone)| {
            let found = milestone.pattern().captures(corpus).and_then(|caps| {
                Some(RawMatch {
                    month: caps.get(1)?.as_str().to_string(),
                    fragment: caps.get(2)?.as_str().to_string(),
                })
            });
            if found.is_none() {
                tracing::debug!(index, label = milestone.label(), "no log line matched milestone");
            }
            found
        })
        .collect()
}
