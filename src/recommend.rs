use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Result;
use crate::models::{SuggestedMaterial, TagPerformance};
use crate::store::AnalysisStore;

/// Study material from topics tagged with any weak tag, deduplicated on
/// (topic title, material name, URL).
pub async fn suggest_materials<S: AnalysisStore>(
    store: &S,
    weak_points: &[TagPerformance],
) -> Result<Vec<SuggestedMaterial>> {
    let weak_tags: BTreeSet<String> = weak_points.iter().map(|p| p.tag.clone()).collect();
    if weak_tags.is_empty() {
        return Ok(Vec::new());
    }

    let topics = store.topics_by_any_tag(&weak_tags).await?;
    let mut suggestions = BTreeSet::new();

    for topic in &topics {
        for material in &topic.materials {
            suggestions.insert(SuggestedMaterial {
                topic_title: topic.title.clone(),
                material_name: material.name.clone(),
                material_url: material.url.clone(),
            });
        }
    }

    debug!(
        weak_tags = weak_tags.len(),
        topics = topics.len(),
        suggestions = suggestions.len(),
        "matched study material"
    );

    Ok(suggestions.into_iter().collect())
}
