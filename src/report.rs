use std::fmt::Write;

use crate::aggregate::MASTERY_THRESHOLD;
use crate::models::{PerformanceReport, Population, TagPerformance};

/// Tags ordered weakest first, ties broken by name.
pub fn weakest_first(performances: &[TagPerformance]) -> Vec<&TagPerformance> {
    let mut ordered: Vec<&TagPerformance> = performances.iter().collect();
    ordered.sort_by(|a, b| {
        a.mean_score
            .partial_cmp(&b.mean_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.tag.cmp(&b.tag))
    });
    ordered
}

pub fn render_markdown(population: Population, report: &PerformanceReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Performance Analysis Report");
    let _ = writeln!(output, "Generated for {population}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance by Tag");

    if report.overall.is_empty() {
        let _ = writeln!(output, "No graded attempts for this population.");
    } else {
        for performance in weakest_first(&report.overall) {
            let _ = writeln!(
                output,
                "- {}: mean {:.2} across {} assessments",
                performance.tag, performance.mean_score, performance.total_assessments
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weak Points (mean below {MASTERY_THRESHOLD:.1})");

    if report.weak_points.is_empty() {
        let _ = writeln!(output, "No tags below the mastery threshold.");
    } else {
        for performance in weakest_first(&report.weak_points) {
            let _ = writeln!(
                output,
                "- {} (mean {:.2})",
                performance.tag, performance.mean_score
            );
        }
    }

    if !matches!(population, Population::Subject(_)) {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Suggested Study Material");

        if report.study_suggestions.is_empty() {
            let _ = writeln!(output, "No study material to suggest.");
        } else {
            for suggestion in &report.study_suggestions {
                let _ = writeln!(
                    output,
                    "- [{}]({}) from {}",
                    suggestion.material_name, suggestion.material_url, suggestion.topic_title
                );
            }
        }
    }

    output
}

pub fn render_json(report: &PerformanceReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SuggestedMaterial;

    fn performance(tag: &str, total_assessments: usize, mean_score: f64) -> TagPerformance {
        TagPerformance {
            tag: tag.to_string(),
            total_assessments,
            mean_score,
        }
    }

    fn sample_report() -> PerformanceReport {
        PerformanceReport {
            overall: vec![performance("derivatives", 3, 4.5), performance("limits", 2, 8.0)],
            weak_points: vec![performance("derivatives", 3, 4.5)],
            study_suggestions: vec![SuggestedMaterial {
                topic_title: "Differentiation rules".to_string(),
                material_name: "Cheat sheet".to_string(),
                material_url: "https://lms.example/cheat".to_string(),
            }],
        }
    }

    #[test]
    fn orders_weakest_tags_first() {
        let performances = vec![
            performance("b", 1, 7.0),
            performance("a", 1, 7.0),
            performance("c", 1, 2.0),
        ];
        let tags: Vec<&str> = weakest_first(&performances)
            .iter()
            .map(|p| p.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["c", "a", "b"]);
    }

    #[test]
    fn markdown_lists_every_section() {
        let output = render_markdown(Population::Student(1), &sample_report());
        assert!(output.contains("Generated for student 1"));
        assert!(output.contains("- derivatives: mean 4.50 across 3 assessments"));
        assert!(output.contains("## Weak Points (mean below 6.0)"));
        assert!(output
            .contains("- [Cheat sheet](https://lms.example/cheat) from Differentiation rules"));
    }

    #[test]
    fn subject_markdown_has_no_suggestion_section() {
        let output = render_markdown(Population::Subject(3), &sample_report());
        assert!(!output.contains("Suggested Study Material"));
    }

    #[test]
    fn empty_report_renders_placeholders() {
        let output = render_markdown(Population::Class(2), &PerformanceReport::default());
        assert!(output.contains("No graded attempts for this population."));
        assert!(output.contains("No tags below the mastery threshold."));
        assert!(output.contains("No study material to suggest."));
    }

    #[test]
    fn json_uses_report_field_names() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["weak_points"][0]["tag"], "derivatives");
        assert_eq!(value["overall"][1]["total_assessments"], 2);
        assert_eq!(value["study_suggestions"][0]["material_url"], "https://lms.example/cheat");
    }
}
