use std::collections::{BTreeSet, HashMap};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Activity, Alternative, Attempt, AttemptDetail, Class, Enrollment, Question, QuizActivity,
    Student, StudyMaterial, Subject, TaggedActivity, Topic,
};
use crate::store::AnalysisStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    File,
    Quiz,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Text => "text",
            Kind::File => "file",
            Kind::Quiz => "quiz",
        }
    }
}

/// Row mapping for the attempt kinds graded as a whole: which `kind` to
/// select, which submission column to read, and how to build the detail.
struct TaggedKind {
    kind: Kind,
    submission_column: &'static str,
    detail: fn(TaggedActivity, String) -> AttemptDetail,
}

fn text_detail(activity: TaggedActivity, answer: String) -> AttemptDetail {
    AttemptDetail::Text { activity, answer }
}

fn file_detail(activity: TaggedActivity, file_path: String) -> AttemptDetail {
    AttemptDetail::File {
        activity,
        file_path,
    }
}

const TEXT_ATTEMPTS: TaggedKind = TaggedKind {
    kind: Kind::Text,
    submission_column: "answer_text",
    detail: text_detail,
};

const FILE_ATTEMPTS: TaggedKind = TaggedKind {
    kind: Kind::File,
    submission_column: "file_path",
    detail: file_detail,
};

/// Quiz attempt columns, before the quiz itself is attached.
#[derive(Debug, Clone)]
struct QuizAttemptRow {
    id: i64,
    student_id: i64,
    activity_id: i64,
    submitted_at: DateTime<Utc>,
    grade: Option<f64>,
}

/// Attaches the loaded quiz to an attempt row. Attempts whose quiz could not
/// be loaded are dropped with a warning.
fn assemble_quiz_attempt(
    row: QuizAttemptRow,
    quizzes: &HashMap<i64, QuizActivity>,
    selected_answer_ids: Vec<i64>,
) -> Option<Attempt> {
    let Some(activity) = quizzes.get(&row.activity_id) else {
        warn!(
            attempt_id = row.id,
            activity_id = row.activity_id,
            "quiz activity missing for attempt, skipping"
        );
        return None;
    };

    Some(Attempt {
        id: row.id,
        student_id: row.student_id,
        submitted_at: row.submitted_at,
        grade: row.grade,
        detail: AttemptDetail::Quiz {
            activity: activity.clone(),
            selected_answer_ids,
        },
    })
}

/// Postgres-backed [`AnalysisStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn tagged_attempts(
        &self,
        student_id: i64,
        mapping: &TaggedKind,
    ) -> Result<Vec<Attempt>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.student_id, a.submitted_at, a.grade, a.answer_text, a.file_path,
                   a.activity_id, act.title AS activity_title
            FROM lms.attempts a
            JOIN lms.activities act ON act.id = a.activity_id
            WHERE a.student_id = $1 AND a.kind = $2
            ORDER BY a.submitted_at
            "#,
        )
        .bind(student_id)
        .bind(mapping.kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let activity_ids = distinct_ids(rows.iter().map(|row| row.get("activity_id")));
        let tags = self.activity_tags(&activity_ids).await?;
        let mut attempts = Vec::with_capacity(rows.len());

        for row in rows {
            let activity_id: i64 = row.get("activity_id");
            let activity = TaggedActivity {
                id: activity_id,
                title: row.get("activity_title"),
                tags: tags.get(&activity_id).cloned().unwrap_or_default(),
            };
            let submission = row
                .get::<Option<String>, _>(mapping.submission_column)
                .unwrap_or_default();

            attempts.push(Attempt {
                id: row.get("id"),
                student_id: row.get("student_id"),
                submitted_at: row.get("submitted_at"),
                grade: row.get("grade"),
                detail: (mapping.detail)(activity, submission),
            });
        }

        Ok(attempts)
    }

    async fn activity_tags(
        &self,
        activity_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<String>>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT atg.activity_id AS owner_id, t.name
            FROM lms.activity_tags atg
            JOIN lms.tags t ON t.id = atg.tag_id
            WHERE atg.activity_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(activity_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_names(rows))
    }

    async fn question_tags(
        &self,
        question_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<String>>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT qt.question_id AS owner_id, t.name
            FROM lms.question_tags qt
            JOIN lms.tags t ON t.id = qt.tag_id
            WHERE qt.question_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(question_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_names(rows))
    }

    async fn quiz_activities(
        &self,
        activity_ids: &[i64],
    ) -> Result<HashMap<i64, QuizActivity>, sqlx::Error> {
        let activity_rows = sqlx::query("SELECT id, title FROM lms.activities WHERE id = ANY($1)")
            .bind(activity_ids)
            .fetch_all(&self.pool)
            .await?;
        let mut activity_tags = self.activity_tags(activity_ids).await?;

        let question_rows = sqlx::query(
            r#"
            SELECT id, activity_id, enunciation
            FROM lms.questions
            WHERE activity_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(activity_ids)
        .fetch_all(&self.pool)
        .await?;
        let question_ids: Vec<i64> = question_rows.iter().map(|row| row.get("id")).collect();
        let mut question_tags = self.question_tags(&question_ids).await?;

        let alternative_rows = sqlx::query(
            r#"
            SELECT id, question_id, text, correct
            FROM lms.alternatives
            WHERE question_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut alternatives: HashMap<i64, Vec<Alternative>> = HashMap::new();
        for row in alternative_rows {
            alternatives
                .entry(row.get("question_id"))
                .or_default()
                .push(Alternative {
                    id: row.get("id"),
                    text: row.get("text"),
                    correct: row.get("correct"),
                });
        }

        let mut questions: HashMap<i64, Vec<Question>> = HashMap::new();
        for row in question_rows {
            let question_id: i64 = row.get("id");
            questions
                .entry(row.get("activity_id"))
                .or_default()
                .push(Question {
                    id: question_id,
                    enunciation: row.get("enunciation"),
                    alternatives: alternatives.remove(&question_id).unwrap_or_default(),
                    tags: question_tags.remove(&question_id).unwrap_or_default(),
                });
        }

        Ok(activity_rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let activity = QuizActivity {
                    id,
                    title: row.get("title"),
                    tags: activity_tags.remove(&id).unwrap_or_default(),
                    questions: questions.remove(&id).unwrap_or_default(),
                };
                (id, activity)
            })
            .collect())
    }
}

impl AnalysisStore for PgStore {
    async fn find_student(&self, student_id: i64) -> Result<Option<Student>, sqlx::Error> {
        let row = sqlx::query("SELECT id, full_name, email FROM lms.students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Student {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
        }))
    }

    async fn find_class(&self, class_id: i64) -> Result<Option<Class>, sqlx::Error> {
        let row = sqlx::query("SELECT id, subject_id, name FROM lms.classes WHERE id = $1")
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Class {
            id: row.get("id"),
            subject_id: row.get("subject_id"),
            name: row.get("name"),
        }))
    }

    async fn find_subject(&self, subject_id: i64) -> Result<Option<Subject>, sqlx::Error> {
        let row = sqlx::query("SELECT id, code, name FROM lms.subjects WHERE id = $1")
            .bind(subject_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Subject {
            id: row.get("id"),
            code: row.get("code"),
            name: row.get("name"),
        }))
    }

    async fn text_attempts_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<Attempt>, sqlx::Error> {
        self.tagged_attempts(student_id, &TEXT_ATTEMPTS).await
    }

    async fn file_attempts_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<Attempt>, sqlx::Error> {
        self.tagged_attempts(student_id, &FILE_ATTEMPTS).await
    }

    async fn quiz_attempts_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<Attempt>, sqlx::Error> {
        let rows: Vec<QuizAttemptRow> = sqlx::query(
            r#"
            SELECT id, student_id, activity_id, submitted_at, grade
            FROM lms.attempts
            WHERE student_id = $1 AND kind = $2
            ORDER BY submitted_at
            "#,
        )
        .bind(student_id)
        .bind(Kind::Quiz.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| QuizAttemptRow {
            id: row.get("id"),
            student_id: row.get("student_id"),
            activity_id: row.get("activity_id"),
            submitted_at: row.get("submitted_at"),
            grade: row.get("grade"),
        })
        .collect();

        let activity_ids = distinct_ids(rows.iter().map(|row| row.activity_id));
        let quizzes = self.quiz_activities(&activity_ids).await?;

        let attempt_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let answer_rows = sqlx::query(
            r#"
            SELECT attempt_id, alternative_id
            FROM lms.attempt_answers
            WHERE attempt_id = ANY($1)
            "#,
        )
        .bind(&attempt_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut selected: HashMap<i64, Vec<i64>> = HashMap::new();
        for row in answer_rows {
            selected
                .entry(row.get("attempt_id"))
                .or_default()
                .push(row.get("alternative_id"));
        }

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let selected_answer_ids = selected.remove(&row.id).unwrap_or_default();
                assemble_quiz_attempt(row, &quizzes, selected_answer_ids)
            })
            .collect())
    }

    async fn enrollments_by_class(&self, class_id: i64) -> Result<Vec<Enrollment>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT id, class_id, student_id FROM lms.enrollments WHERE class_id = $1")
                .bind(class_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|row| Enrollment {
                id: row.get("id"),
                class_id: row.get("class_id"),
                student_id: row.get("student_id"),
            })
            .collect())
    }

    async fn classes_by_subject(&self, subject_id: i64) -> Result<Vec<Class>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, subject_id, name FROM lms.classes WHERE subject_id = $1")
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Class {
                id: row.get("id"),
                subject_id: row.get("subject_id"),
                name: row.get("name"),
            })
            .collect())
    }

    async fn topics_by_any_tag(
        &self,
        tag_names: &BTreeSet<String>,
    ) -> Result<Vec<Topic>, sqlx::Error> {
        let names: Vec<String> = tag_names.iter().cloned().collect();
        let topic_rows = sqlx::query(
            r#"
            SELECT DISTINCT tp.id, tp.title
            FROM lms.topics tp
            JOIN lms.topic_tags tt ON tt.topic_id = tp.id
            JOIN lms.tags t ON t.id = tt.tag_id
            WHERE t.name = ANY($1)
            "#,
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await?;

        let topic_ids: Vec<i64> = topic_rows.iter().map(|row| row.get("id")).collect();
        let material_rows = sqlx::query(
            r#"
            SELECT id, topic_id, name, url
            FROM lms.study_materials
            WHERE topic_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&topic_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut materials: HashMap<i64, Vec<StudyMaterial>> = HashMap::new();
        for row in material_rows {
            let topic_id: i64 = row.get("topic_id");
            materials.entry(topic_id).or_default().push(StudyMaterial {
                id: row.get("id"),
                topic_id,
                name: row.get("name"),
                url: row.get("url"),
            });
        }

        Ok(topic_rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                Topic {
                    id,
                    title: row.get("title"),
                    materials: materials.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }
}

fn distinct_ids(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

fn group_names(rows: Vec<sqlx::postgres::PgRow>) -> HashMap<i64, Vec<String>> {
    let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
    for row in rows {
        grouped
            .entry(row.get("owner_id"))
            .or_default()
            .push(row.get("name"));
    }
    grouped
}

async fn upsert_tag(conn: &mut PgConnection, name: &str) -> sqlx::Result<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO lms.tags (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.get("id"))
}

/// Registers one study material under `topic_title`, creating the topic and
/// its tag links as needed. Returns false when `source_key` was already
/// imported.
async fn register_material<T: AsRef<str>>(
    conn: &mut PgConnection,
    topic_title: &str,
    tags: &[T],
    name: &str,
    url: &str,
    source_key: &str,
) -> sqlx::Result<bool> {
    let topic_id: i64 = sqlx::query(
        r#"
        INSERT INTO lms.topics (title)
        VALUES ($1)
        ON CONFLICT (title) DO UPDATE SET title = EXCLUDED.title
        RETURNING id
        "#,
    )
    .bind(topic_title)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    for tag in tags {
        let tag_id = upsert_tag(conn, tag.as_ref()).await?;
        sqlx::query(
            r#"
            INSERT INTO lms.topic_tags (topic_id, tag_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(topic_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO lms.study_materials (topic_id, name, url, source_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(topic_id)
    .bind(name)
    .bind(url)
    .bind(source_key)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, serde::Deserialize)]
struct MaterialCsvRow {
    topic_title: String,
    tags: String,
    material_name: String,
    url: String,
    source_key: Option<String>,
}

#[derive(Debug, PartialEq)]
struct NewMaterial {
    topic_title: String,
    tags: Vec<String>,
    name: String,
    url: String,
    source_key: String,
}

/// Splits the `;`-separated tag list and fills in a generated source key when
/// the row has none.
fn material_row(row: MaterialCsvRow) -> NewMaterial {
    let tags = row
        .tags
        .split(';')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();
    let source_key = row
        .source_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

    NewMaterial {
        topic_title: row.topic_title,
        tags,
        name: row.material_name,
        url: row.url,
        source_key,
    }
}

pub async fn import_materials_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut conn = pool.acquire().await?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<MaterialCsvRow>() {
        let material = material_row(result?);

        let created = register_material(
            &mut conn,
            &material.topic_title,
            &material.tags,
            &material.name,
            &material.url,
            &material.source_key,
        )
        .await?;

        if created {
            inserted += 1;
        } else {
            debug!(source_key = %material.source_key, "material already imported");
        }
    }

    Ok(inserted)
}

/// Inserts `activity` with its tags (and questions, for quizzes). Returns the
/// activity with database ids filled in.
async fn insert_activity(conn: &mut PgConnection, activity: Activity) -> sqlx::Result<Activity> {
    let kind = match &activity {
        Activity::Text(_) => Kind::Text,
        Activity::File(_) => Kind::File,
        Activity::Quiz(_) => Kind::Quiz,
    };
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO lms.activities (kind, title)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(kind.as_str())
    .bind(activity.title())
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    let tags = match &activity {
        Activity::Text(a) | Activity::File(a) => a.tags.clone(),
        Activity::Quiz(a) => a.tags.clone(),
    };
    for tag in &tags {
        let tag_id = upsert_tag(conn, tag).await?;
        sqlx::query("INSERT INTO lms.activity_tags (activity_id, tag_id) VALUES ($1, $2)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(match activity {
        Activity::Text(a) => Activity::Text(TaggedActivity { id, ..a }),
        Activity::File(a) => Activity::File(TaggedActivity { id, ..a }),
        Activity::Quiz(quiz) => {
            let mut questions = Vec::with_capacity(quiz.questions.len());
            for question in quiz.questions {
                questions.push(insert_question(conn, id, question).await?);
            }
            Activity::Quiz(QuizActivity {
                id,
                questions,
                ..quiz
            })
        }
    })
}

async fn insert_question(
    conn: &mut PgConnection,
    activity_id: i64,
    question: Question,
) -> sqlx::Result<Question> {
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO lms.questions (activity_id, enunciation)
        VALUES ($1, $2)
        RETURNING id
        "#,
    )
    .bind(activity_id)
    .bind(&question.enunciation)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    for tag in &question.tags {
        let tag_id = upsert_tag(conn, tag).await?;
        sqlx::query("INSERT INTO lms.question_tags (question_id, tag_id) VALUES ($1, $2)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *conn)
            .await?;
    }

    let mut alternatives = Vec::with_capacity(question.alternatives.len());
    for alternative in question.alternatives {
        let alternative_id: i64 = sqlx::query(
            r#"
            INSERT INTO lms.alternatives (question_id, text, correct)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(&alternative.text)
        .bind(alternative.correct)
        .fetch_one(&mut *conn)
        .await?
        .get("id");
        alternatives.push(Alternative {
            id: alternative_id,
            ..alternative
        });
    }

    Ok(Question {
        id,
        alternatives,
        ..question
    })
}

/// Writes one submission. Quiz attempts select one alternative per question by
/// position and are stored with their percentage-correct grade.
async fn insert_attempt(
    conn: &mut PgConnection,
    student_id: i64,
    activity: &Activity,
    grade: Option<f64>,
    picks: &[usize],
    days_ago: i64,
) -> sqlx::Result<()> {
    let submitted_at = Utc::now() - Duration::days(days_ago);
    let (kind, grade, selected, answer_text, file_path) = match activity {
        Activity::Text(_) => (Kind::Text, grade, Vec::new(), Some("Submitted essay"), None),
        Activity::File(a) => (
            Kind::File,
            grade,
            Vec::new(),
            None,
            Some(format!("uploads/{student_id}/{}.pdf", a.id)),
        ),
        Activity::Quiz(quiz) => {
            let selected: Vec<i64> = quiz
                .questions
                .iter()
                .zip(picks)
                .filter_map(|(question, pick)| question.alternatives.get(*pick))
                .map(|alternative| alternative.id)
                .collect();
            let grade = quiz.grade_selection(&selected);
            (Kind::Quiz, Some(grade), selected, None, None)
        }
    };

    let attempt_id: i64 = sqlx::query(
        r#"
        INSERT INTO lms.attempts
        (kind, student_id, activity_id, submitted_at, grade, answer_text, file_path)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(kind.as_str())
    .bind(student_id)
    .bind(activity.id())
    .bind(submitted_at)
    .bind(grade)
    .bind(answer_text)
    .bind(file_path)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    for alternative_id in selected {
        sqlx::query(
            "INSERT INTO lms.attempt_answers (attempt_id, alternative_id) VALUES ($1, $2)",
        )
        .bind(attempt_id)
        .bind(alternative_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn seed_question(enunciation: &str, alternatives: &[(&str, bool)], tags: &[&str]) -> Question {
    Question {
        id: 0,
        enunciation: enunciation.to_string(),
        alternatives: alternatives
            .iter()
            .map(|(text, correct)| Alternative {
                id: 0,
                text: text.to_string(),
                correct: *correct,
            })
            .collect(),
        tags: names(tags),
    }
}

const SEED_SUBJECT_CODE: &str = "MAT101";

/// Loads a small calculus course. Returns false if it was already seeded.
pub async fn seed(pool: &PgPool) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query("SELECT id FROM lms.subjects WHERE code = $1")
        .bind(SEED_SUBJECT_CODE)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        info!(code = SEED_SUBJECT_CODE, "seed subject already present");
        return Ok(false);
    }

    let subject_id: i64 =
        sqlx::query("INSERT INTO lms.subjects (code, name) VALUES ($1, $2) RETURNING id")
            .bind(SEED_SUBJECT_CODE)
            .bind("Calculus I")
            .fetch_one(&mut *tx)
            .await?
            .get("id");

    let mut student_ids = Vec::new();
    for (name, email) in [
        ("Ana Souza", "ana.souza@lms.example"),
        ("Bruno Lima", "bruno.lima@lms.example"),
        ("Carla Mendes", "carla.mendes@lms.example"),
    ] {
        let id: i64 = sqlx::query(
            r#"
            INSERT INTO lms.students (full_name, email)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_one(&mut *tx)
        .await?
        .get("id");
        student_ids.push(id);
    }
    let [ana, bruno, carla] = student_ids[..] else {
        anyhow::bail!("expected three seed students");
    };

    for (class_name, members) in [
        ("Calculus I - Morning", [ana, bruno]),
        ("Calculus I - Evening", [bruno, carla]),
    ] {
        let class_id: i64 =
            sqlx::query("INSERT INTO lms.classes (subject_id, name) VALUES ($1, $2) RETURNING id")
                .bind(subject_id)
                .bind(class_name)
                .fetch_one(&mut *tx)
                .await?
                .get("id");

        for student_id in members {
            sqlx::query("INSERT INTO lms.enrollments (class_id, student_id) VALUES ($1, $2)")
                .bind(class_id)
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let essay = insert_activity(
        &mut tx,
        Activity::Text(TaggedActivity {
            id: 0,
            title: "Limits essay".to_string(),
            tags: names(&["limits", "proofs"]),
        }),
    )
    .await?;
    let worksheet = insert_activity(
        &mut tx,
        Activity::File(TaggedActivity {
            id: 0,
            title: "Derivatives worksheet".to_string(),
            tags: names(&["derivatives"]),
        }),
    )
    .await?;
    let quiz = insert_activity(
        &mut tx,
        Activity::Quiz(QuizActivity {
            id: 0,
            title: "Derivatives quiz".to_string(),
            tags: names(&["derivatives"]),
            questions: vec![
                seed_question(
                    "What is d/dx of x^2?",
                    &[("2x", true), ("x", false), ("x^2", false)],
                    &["derivatives", "power-rule"],
                ),
                seed_question(
                    "What is d/dx of sin x?",
                    &[("cos x", true), ("-cos x", false)],
                    &["derivatives", "trigonometry"],
                ),
                seed_question(
                    "What is the limit of sin x / x as x approaches 0?",
                    &[("1", true), ("0", false)],
                    &["limits"],
                ),
            ],
        }),
    )
    .await?;

    insert_attempt(&mut tx, ana, &essay, Some(7.5), &[], 12).await?;
    insert_attempt(&mut tx, ana, &worksheet, Some(5.0), &[], 9).await?;
    insert_attempt(&mut tx, ana, &quiz, None, &[0, 0, 0], 3).await?;
    insert_attempt(&mut tx, bruno, &essay, Some(4.0), &[], 11).await?;
    insert_attempt(&mut tx, bruno, &worksheet, None, &[], 8).await?;
    insert_attempt(&mut tx, bruno, &quiz, None, &[1, 0, 1], 2).await?;
    insert_attempt(&mut tx, carla, &essay, Some(5.5), &[], 10).await?;
    insert_attempt(&mut tx, carla, &quiz, None, &[0, 1, 1], 1).await?;

    for (topic, tags, material, url) in [
        (
            "Limits and continuity",
            &["limits"][..],
            "Limits lecture notes",
            "https://lms.example/materials/limits-notes",
        ),
        (
            "Limits and continuity",
            &["limits", "proofs"][..],
            "Epsilon-delta walkthrough",
            "https://lms.example/materials/epsilon-delta",
        ),
        (
            "Differentiation rules",
            &["derivatives", "power-rule"][..],
            "Differentiation rules cheat sheet",
            "https://lms.example/materials/derivative-rules",
        ),
        (
            "Trigonometric derivatives",
            &["trigonometry"][..],
            "Derivatives of trig functions video",
            "https://lms.example/materials/trig-derivatives",
        ),
    ] {
        let source_key = format!("seed-{url}");
        register_material(&mut tx, topic, tags, material, url, &source_key).await?;
    }

    tx.commit().await?;
    info!(subject_id, students = student_ids.len(), "seed data inserted");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_materials(data: &str) -> Vec<NewMaterial> {
        csv::Reader::from_reader(data.as_bytes())
            .deserialize::<MaterialCsvRow>()
            .map(|row| material_row(row.unwrap()))
            .collect()
    }

    fn sample_quiz(id: i64) -> QuizActivity {
        QuizActivity {
            id,
            title: "Derivatives quiz".to_string(),
            tags: Vec::new(),
            questions: Vec::new(),
        }
    }

    fn quiz_row(id: i64, activity_id: i64) -> QuizAttemptRow {
        QuizAttemptRow {
            id,
            student_id: 3,
            activity_id,
            submitted_at: Utc::now(),
            grade: Some(5.0),
        }
    }

    #[test]
    fn csv_tags_are_split_trimmed_and_blank_parts_dropped() {
        let materials = read_materials(
            "topic_title,tags,material_name,url,source_key\n\
             Limits,limits; proofs;;,Notes,https://lms.example/notes,mat-1\n",
        );

        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].tags, vec!["limits", "proofs"]);
        assert_eq!(materials[0].source_key, "mat-1");
        assert_eq!(materials[0].topic_title, "Limits");
    }

    #[test]
    fn blank_source_key_gets_generated_import_key() {
        let materials = read_materials(
            "topic_title,tags,material_name,url,source_key\n\
             Limits,limits,Notes,https://lms.example/a,\n\
             Limits,limits,Video,https://lms.example/b,   \n",
        );

        assert_eq!(materials.len(), 2);
        for material in &materials {
            assert!(material.source_key.starts_with("import-"), "{material:?}");
        }
        assert_ne!(materials[0].source_key, materials[1].source_key);
    }

    #[test]
    fn row_without_tags_registers_no_tags() {
        let materials = read_materials(
            "topic_title,tags,material_name,url,source_key\n\
             Limits,,Notes,https://lms.example/a,mat-2\n",
        );

        assert!(materials[0].tags.is_empty());
    }

    #[test]
    fn tagged_kinds_build_their_own_detail() {
        let activity = TaggedActivity {
            id: 1,
            title: "Worksheet".to_string(),
            tags: Vec::new(),
        };

        assert_eq!(FILE_ATTEMPTS.kind, Kind::File);
        assert_eq!(FILE_ATTEMPTS.submission_column, "file_path");
        assert!(matches!(
            (FILE_ATTEMPTS.detail)(activity.clone(), "uploads/1.pdf".to_string()),
            AttemptDetail::File { file_path, .. } if file_path == "uploads/1.pdf"
        ));

        assert_eq!(TEXT_ATTEMPTS.kind, Kind::Text);
        assert_eq!(TEXT_ATTEMPTS.submission_column, "answer_text");
        assert!(matches!(
            (TEXT_ATTEMPTS.detail)(activity, "essay".to_string()),
            AttemptDetail::Text { answer, .. } if answer == "essay"
        ));
    }

    #[test]
    fn quiz_attempt_without_loaded_activity_is_dropped() {
        let quizzes = HashMap::from([(10, sample_quiz(10))]);

        assert!(assemble_quiz_attempt(quiz_row(1, 99), &quizzes, vec![4]).is_none());

        let attempt = assemble_quiz_attempt(quiz_row(2, 10), &quizzes, vec![4, 5]).unwrap();
        assert_eq!(attempt.id, 2);
        assert_eq!(attempt.grade, Some(5.0));
        assert!(matches!(
            attempt.detail,
            AttemptDetail::Quiz { activity, selected_answer_ids }
                if activity.id == 10 && selected_answer_ids == vec![4, 5]
        ));
    }
}
