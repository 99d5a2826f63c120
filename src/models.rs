use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: i64,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Class {
    pub id: i64,
    pub subject_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub id: i64,
    pub class_id: i64,
    pub student_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alternative {
    pub id: i64,
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub enunciation: String,
    pub alternatives: Vec<Alternative>,
    pub tags: Vec<String>,
}

impl Question {
    pub fn correct_alternative(&self) -> Option<&Alternative> {
        self.alternatives.iter().find(|alternative| alternative.correct)
    }
}

/// Text and file activities: graded as a whole and tagged at activity level.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedActivity {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizActivity {
    pub id: i64,
    pub title: String,
    /// Activity-level tags. Analysis reads question tags instead.
    pub tags: Vec<String>,
    pub questions: Vec<Question>,
}

impl QuizActivity {
    /// Percentage-correct grade on the 0..=10 scale, as stored on submission.
    ///
    /// Questions without a correct alternative are not answerable and are left
    /// out of the denominator.
    pub fn grade_selection(&self, selected_answer_ids: &[i64]) -> f64 {
        let mut answerable = 0usize;
        let mut correct = 0usize;

        for question in &self.questions {
            if let Some(alternative) = question.correct_alternative() {
                answerable += 1;
                if selected_answer_ids.contains(&alternative.id) {
                    correct += 1;
                }
            }
        }

        if answerable == 0 {
            0.0
        } else {
            correct as f64 / answerable as f64 * 10.0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Activity {
    Text(TaggedActivity),
    File(TaggedActivity),
    Quiz(QuizActivity),
}

impl Activity {
    pub fn id(&self) -> i64 {
        match self {
            Activity::Text(activity) | Activity::File(activity) => activity.id,
            Activity::Quiz(activity) => activity.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Activity::Text(activity) | Activity::File(activity) => &activity.title,
            Activity::Quiz(activity) => &activity.title,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum AttemptDetail {
    Text {
        activity: TaggedActivity,
        answer: String,
    },
    File {
        activity: TaggedActivity,
        file_path: String,
    },
    Quiz {
        activity: QuizActivity,
        selected_answer_ids: Vec<i64>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub id: i64,
    pub student_id: i64,
    pub submitted_at: DateTime<Utc>,
    /// `None` until a grader scores the submission.
    pub grade: Option<f64>,
    pub detail: AttemptDetail,
}

impl Attempt {
    pub fn is_graded(&self) -> bool {
        self.grade.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudyMaterial {
    pub id: i64,
    pub topic_id: i64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub materials: Vec<StudyMaterial>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    Student(i64),
    Class(i64),
    Subject(i64),
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Population::Student(id) => write!(f, "student {id}"),
            Population::Class(id) => write!(f, "class {id}"),
            Population::Subject(id) => write!(f, "subject {id}"),
        }
    }
}

/// One (tag, score) observation. Lives only for the duration of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct TagScore {
    pub tag: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagPerformance {
    pub tag: String,
    pub total_assessments: usize,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SuggestedMaterial {
    pub topic_title: String,
    pub material_name: String,
    pub material_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub overall: Vec<TagPerformance>,
    pub weak_points: Vec<TagPerformance>,
    pub study_suggestions: Vec<SuggestedMaterial>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64, correct_id: Option<i64>) -> Question {
        let mut alternatives = vec![Alternative {
            id: id * 100,
            text: "wrong".to_string(),
            correct: false,
        }];
        if let Some(correct_id) = correct_id {
            alternatives.push(Alternative {
                id: correct_id,
                text: "right".to_string(),
                correct: true,
            });
        }
        Question {
            id,
            enunciation: format!("question {id}"),
            alternatives,
            tags: vec!["calc".to_string()],
        }
    }

    #[test]
    fn quiz_grade_is_percentage_correct_on_ten_point_scale() {
        let quiz = QuizActivity {
            id: 1,
            title: "Limits quiz".to_string(),
            tags: Vec::new(),
            questions: vec![question(1, Some(11)), question(2, Some(21)), question(3, None)],
        };

        assert_eq!(quiz.grade_selection(&[11, 21]), 10.0);
        assert_eq!(quiz.grade_selection(&[11, 200]), 5.0);
        assert_eq!(quiz.grade_selection(&[]), 0.0);
    }

    #[test]
    fn quiz_without_answerable_questions_grades_zero() {
        let quiz = QuizActivity {
            id: 1,
            title: "Broken quiz".to_string(),
            tags: Vec::new(),
            questions: vec![question(1, None)],
        };

        assert_eq!(quiz.grade_selection(&[100]), 0.0);
    }

    #[test]
    fn population_labels_name_the_scope() {
        assert_eq!(Population::Student(4).to_string(), "student 4");
        assert_eq!(Population::Class(9).to_string(), "class 9");
        assert_eq!(Population::Subject(2).to_string(), "subject 2");
    }
}
