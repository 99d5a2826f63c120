use std::collections::BTreeSet;

use crate::models::{Attempt, Class, Enrollment, Student, Subject, Topic};

/// Read-only queries the analysis pipeline issues against the LMS records.
#[allow(async_fn_in_trait)]
pub trait AnalysisStore {
    async fn find_student(&self, student_id: i64) -> Result<Option<Student>, sqlx::Error>;

    async fn find_class(&self, class_id: i64) -> Result<Option<Class>, sqlx::Error>;

    async fn find_subject(&self, subject_id: i64) -> Result<Option<Subject>, sqlx::Error>;

    async fn text_attempts_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<Attempt>, sqlx::Error>;

    async fn file_attempts_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<Attempt>, sqlx::Error>;

    async fn quiz_attempts_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<Attempt>, sqlx::Error>;

    async fn enrollments_by_class(&self, class_id: i64) -> Result<Vec<Enrollment>, sqlx::Error>;

    async fn classes_by_subject(&self, subject_id: i64) -> Result<Vec<Class>, sqlx::Error>;

    /// Topics carrying at least one of `tag_names`, with their study material.
    async fn topics_by_any_tag(
        &self,
        tag_names: &BTreeSet<String>,
    ) -> Result<Vec<Topic>, sqlx::Error>;
}
