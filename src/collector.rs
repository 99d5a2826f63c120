use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::models::{Attempt, Population};
use crate::store::AnalysisStore;

/// Graded attempts of every student in `population`.
pub async fn collect_attempts<S: AnalysisStore>(
    store: &S,
    population: Population,
) -> Result<Vec<Attempt>> {
    let student_ids = resolve_students(store, population).await?;
    let mut attempts = Vec::new();

    for student_id in &student_ids {
        attempts.extend(student_attempts(store, *student_id).await?);
    }

    let total = attempts.len();
    attempts.retain(Attempt::is_graded);
    debug!(
        %population,
        students = student_ids.len(),
        total,
        graded = attempts.len(),
        "collected attempts"
    );

    Ok(attempts)
}

async fn resolve_students<S: AnalysisStore>(
    store: &S,
    population: Population,
) -> Result<BTreeSet<i64>> {
    match population {
        Population::Student(student_id) => {
            store
                .find_student(student_id)
                .await?
                .ok_or_else(|| AnalysisError::not_found("student", student_id))?;
            Ok(BTreeSet::from([student_id]))
        }
        Population::Class(class_id) => {
            store
                .find_class(class_id)
                .await?
                .ok_or_else(|| AnalysisError::not_found("class", class_id))?;
            class_students(store, class_id).await
        }
        Population::Subject(subject_id) => {
            store
                .find_subject(subject_id)
                .await?
                .ok_or_else(|| AnalysisError::not_found("subject", subject_id))?;

            let mut students = BTreeSet::new();
            for class in store.classes_by_subject(subject_id).await? {
                students.extend(class_students(store, class.id).await?);
            }
            Ok(students)
        }
    }
}

async fn class_students<S: AnalysisStore>(store: &S, class_id: i64) -> Result<BTreeSet<i64>> {
    Ok(store
        .enrollments_by_class(class_id)
        .await?
        .into_iter()
        .map(|enrollment| enrollment.student_id)
        .collect())
}

async fn student_attempts<S: AnalysisStore>(store: &S, student_id: i64) -> Result<Vec<Attempt>> {
    let mut attempts = store.text_attempts_by_student(student_id).await?;
    attempts.extend(store.file_attempts_by_student(student_id).await?);
    attempts.extend(store.quiz_attempts_by_student(student_id).await?);
    Ok(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{
        file_attempt, quiz_attempt, quiz_question, text_attempt, MemoryStore,
    };

    fn attempt_ids(attempts: &[Attempt]) -> BTreeSet<i64> {
        attempts.iter().map(|attempt| attempt.id).collect()
    }

    #[tokio::test]
    async fn student_scope_drops_ungraded_attempts() {
        let store = MemoryStore::default()
            .with_student(1)
            .with_attempt(text_attempt(1, 1, None, &["calc"]))
            .with_attempt(text_attempt(2, 1, Some(8.0), &["calc"]))
            .with_attempt(file_attempt(3, 1, None, &["calc"]));

        let attempts = collect_attempts(&store, Population::Student(1)).await.unwrap();
        assert_eq!(attempt_ids(&attempts), BTreeSet::from([2]));
    }

    #[tokio::test]
    async fn student_scope_gathers_every_attempt_kind() {
        let store = MemoryStore::default()
            .with_student(1)
            .with_student(2)
            .with_attempt(text_attempt(1, 1, Some(5.0), &["a"]))
            .with_attempt(file_attempt(2, 1, Some(6.0), &["b"]))
            .with_attempt(quiz_attempt(3, 1, vec![quiz_question(1, Some(42), &["c"])], vec![42]))
            .with_attempt(text_attempt(4, 2, Some(9.0), &["a"]));

        let attempts = collect_attempts(&store, Population::Student(1)).await.unwrap();
        assert_eq!(attempt_ids(&attempts), BTreeSet::from([1, 2, 3]));
    }

    #[tokio::test]
    async fn class_scope_unions_enrolled_students() {
        let store = MemoryStore::default()
            .with_subject(1)
            .with_class(10, 1, &[1, 2])
            .with_attempt(text_attempt(1, 1, Some(5.0), &["a"]))
            .with_attempt(text_attempt(2, 2, Some(7.0), &["a"]))
            .with_attempt(text_attempt(3, 3, Some(9.0), &["a"]));

        let attempts = collect_attempts(&store, Population::Class(10)).await.unwrap();
        assert_eq!(attempt_ids(&attempts), BTreeSet::from([1, 2]));
    }

    #[tokio::test]
    async fn subject_scope_counts_shared_students_once() {
        let store = MemoryStore::default()
            .with_subject(1)
            .with_subject(2)
            .with_class(10, 1, &[1, 2])
            .with_class(11, 1, &[2, 3])
            .with_class(12, 2, &[4])
            .with_attempt(text_attempt(1, 1, Some(5.0), &["a"]))
            .with_attempt(text_attempt(2, 2, Some(7.0), &["a"]))
            .with_attempt(text_attempt(3, 3, Some(9.0), &["a"]))
            .with_attempt(text_attempt(4, 4, Some(9.0), &["a"]));

        let attempts = collect_attempts(&store, Population::Subject(1)).await.unwrap();
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempt_ids(&attempts), BTreeSet::from([1, 2, 3]));
    }

    #[tokio::test]
    async fn unknown_population_is_not_found() {
        let store = MemoryStore::default().with_student(1);

        for population in [
            Population::Student(99),
            Population::Class(99),
            Population::Subject(99),
        ] {
            let err = collect_attempts(&store, population).await.unwrap_err();
            assert!(err.is_not_found(), "{population}: {err}");
        }
    }

    #[tokio::test]
    async fn empty_class_yields_no_attempts() {
        let store = MemoryStore::default().with_subject(1).with_class(10, 1, &[]);

        let attempts = collect_attempts(&store, Population::Class(10)).await.unwrap();
        assert!(attempts.is_empty());
    }
}
