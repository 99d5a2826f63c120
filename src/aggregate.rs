use std::collections::HashMap;

use crate::models::{TagPerformance, TagScore};

/// Mean score below which a tag counts as a weak point.
pub const MASTERY_THRESHOLD: f64 = 6.0;

/// Count and mean score per tag name. Tag names are compared exactly.
pub fn aggregate_by_tag(scores: &[TagScore]) -> Vec<TagPerformance> {
    let mut map: HashMap<&str, (usize, f64)> = HashMap::new();

    for observation in scores {
        let entry = map.entry(observation.tag.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += observation.score;
    }

    let mut performances: Vec<TagPerformance> = map
        .into_iter()
        .map(|(tag, (count, total))| TagPerformance {
            tag: tag.to_string(),
            total_assessments: count,
            mean_score: if count == 0 { 0.0 } else { total / count as f64 },
        })
        .collect();

    performances.sort_by(|a, b| a.tag.cmp(&b.tag));
    performances
}

pub fn weak_points(performances: &[TagPerformance]) -> Vec<TagPerformance> {
    performances
        .iter()
        .filter(|performance| performance.mean_score < MASTERY_THRESHOLD)
        .cloned()
        .collect()
}
