use tracing::{info, instrument};

use crate::aggregate::{aggregate_by_tag, weak_points};
use crate::collector::collect_attempts;
use crate::error::Result;
use crate::extract::extract_all;
use crate::models::{PerformanceReport, Population};
use crate::recommend::suggest_materials;
use crate::store::AnalysisStore;

/// Tag-driven performance reports for a student, a class or a subject.
pub struct PerformanceAnalyzer<S> {
    store: S,
}

impl<S: AnalysisStore> PerformanceAnalyzer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn generate_student_report(&self, student_id: i64) -> Result<PerformanceReport> {
        self.generate(Population::Student(student_id), true).await
    }

    pub async fn generate_class_report(&self, class_id: i64) -> Result<PerformanceReport> {
        self.generate(Population::Class(class_id), true).await
    }

    /// Subject reports carry no study suggestions.
    pub async fn generate_subject_report(&self, subject_id: i64) -> Result<PerformanceReport> {
        self.generate(Population::Subject(subject_id), false).await
    }

    pub async fn generate_report(&self, population: Population) -> Result<PerformanceReport> {
        match population {
            Population::Student(id) => self.generate_student_report(id).await,
            Population::Class(id) => self.generate_class_report(id).await,
            Population::Subject(id) => self.generate_subject_report(id).await,
        }
    }

    #[instrument(skip_all, fields(%population))]
    async fn generate(
        &self,
        population: Population,
        with_suggestions: bool,
    ) -> Result<PerformanceReport> {
        let attempts = collect_attempts(&self.store, population).await?;
        let observations = extract_all(&attempts);
        let overall = aggregate_by_tag(&observations);
        let weak_points = weak_points(&overall);

        let study_suggestions = if with_suggestions {
            suggest_materials(&self.store, &weak_points).await?
        } else {
            Vec::new()
        };

        info!(
            attempts = attempts.len(),
            observations = observations.len(),
            tags = overall.len(),
            weak = weak_points.len(),
            suggestions = study_suggestions.len(),
            "performance report generated"
        );

        Ok(PerformanceReport {
            overall,
            weak_points,
            study_suggestions,
        })
    }
}
