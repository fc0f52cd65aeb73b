use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::engine::{GradeQuery, GradeSource};
use crate::models::{EvaluationType, GradeRecord, StudentRef, SubjectRef, Trimester};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const GRADE_COLUMNS: &str = "g.id, g.student_id, g.subject_id, g.teacher_id, g.value, g.max_value, \
     g.coefficient, g.evaluation_type, g.trimester, g.academic_year, g.evaluation_date, g.title, \
     s.id AS subject_ref_id, s.name AS subject_name, s.code AS subject_code, \
     s.coefficient AS subject_coefficient";

fn grade_from_row(row: &PgRow) -> anyhow::Result<GradeRecord> {
    let id: Uuid = row.try_get("id")?;
    let subject = match row.try_get::<Option<Uuid>, _>("subject_ref_id")? {
        Some(subject_id) => Some(SubjectRef {
            id: subject_id,
            name: row.try_get("subject_name")?,
            code: row.try_get("subject_code")?,
            coefficient: row.try_get("subject_coefficient")?,
        }),
        None => None,
    };
    let evaluation_type: String = row.try_get("evaluation_type")?;
    let trimester: String = row.try_get("trimester")?;

    Ok(GradeRecord {
        id,
        student_id: row.try_get("student_id")?,
        subject_id: row.try_get("subject_id")?,
        teacher_id: row.try_get("teacher_id")?,
        subject,
        value: row.try_get("value")?,
        max_value: row.try_get("max_value")?,
        coefficient: row.try_get("coefficient")?,
        evaluation_type: evaluation_type
            .parse()
            .map_err(|err: String| anyhow!(err))
            .with_context(|| format!("grade {id}"))?,
        trimester: trimester
            .parse()
            .map_err(|err: String| anyhow!(err))
            .with_context(|| format!("grade {id}"))?,
        academic_year: row.try_get("academic_year")?,
        evaluation_date: row.try_get("evaluation_date")?,
        title: row.try_get("title")?,
    })
}

fn student_from_row(row: &PgRow) -> anyhow::Result<StudentRef> {
    Ok(StudentRef {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
    })
}

#[derive(Clone)]
pub struct PgGradeSource {
    pool: PgPool,
}

impl PgGradeSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl GradeSource for PgGradeSource {
    async fn fetch_student_grades(&self, query: &GradeQuery) -> anyhow::Result<Vec<GradeRecord>> {
        let sql = format!(
            "SELECT {GRADE_COLUMNS} \
             FROM school_performance.grades g \
             LEFT JOIN school_performance.subjects s ON s.id = g.subject_id \
             WHERE g.student_id = $1 \
             AND ($2::text IS NULL OR g.trimester = $2) \
             AND ($3::text IS NULL OR g.academic_year = $3) \
             AND ($4::uuid IS NULL OR g.subject_id = $4)"
        );

        let rows = sqlx::query(&sql)
            .bind(query.student_id)
            .bind(query.trimester.map(Trimester::code))
            .bind(query.academic_year.as_deref())
            .bind(query.subject_id)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch student grades")?;

        rows.iter().map(grade_from_row).collect()
    }

    async fn fetch_class_grades(
        &self,
        class_id: Uuid,
        trimester: Trimester,
        academic_year: &str,
    ) -> anyhow::Result<Vec<GradeRecord>> {
        let sql = format!(
            "SELECT {GRADE_COLUMNS} \
             FROM school_performance.grades g \
             JOIN school_performance.students st ON st.id = g.student_id \
             LEFT JOIN school_performance.subjects s ON s.id = g.subject_id \
             WHERE st.class_id = $1 AND g.trimester = $2 AND g.academic_year = $3"
        );

        let rows = sqlx::query(&sql)
            .bind(class_id)
            .bind(trimester.code())
            .bind(academic_year)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch class grades")?;

        rows.iter().map(grade_from_row).collect()
    }

    async fn fetch_roster(&self, class_id: Uuid) -> anyhow::Result<Vec<StudentRef>> {
        let rows = sqlx::query(
            "SELECT id, first_name, last_name FROM school_performance.students \
             WHERE class_id = $1 ORDER BY created_at, id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch class roster")?;

        rows.iter().map(student_from_row).collect()
    }

    async fn fetch_student(&self, student_id: Uuid) -> anyhow::Result<Option<StudentRef>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name FROM school_performance.students WHERE id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(student_from_row).transpose()
    }
}

async fn upsert_class(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO school_performance.classes (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_student(
    pool: &PgPool,
    first_name: &str,
    last_name: &str,
    email: &str,
    class_id: Uuid,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO school_performance.students (id, first_name, last_name, email, class_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE
        SET first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            class_id = EXCLUDED.class_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(class_id)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_subject(
    pool: &PgPool,
    code: &str,
    name: &str,
    coefficient: Option<f64>,
) -> anyhow::Result<Uuid> {
    let id = sqlx::query(
        r#"
        INSERT INTO school_performance.subjects (id, name, code, coefficient)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (code) DO UPDATE
        SET name = EXCLUDED.name, coefficient = EXCLUDED.coefficient
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(code)
    .bind(coefficient)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

struct NewGrade<'a> {
    student_id: Uuid,
    subject_id: Uuid,
    teacher_id: Option<Uuid>,
    evaluation_type: EvaluationType,
    value: f64,
    max_value: f64,
    coefficient: Option<f64>,
    trimester: Trimester,
    academic_year: &'a str,
    evaluation_date: NaiveDate,
    title: Option<&'a str>,
    source_key: &'a str,
}

async fn insert_grade(pool: &PgPool, grade: NewGrade<'_>) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_performance.grades
        (id, student_id, subject_id, teacher_id, evaluation_type, value, max_value,
         coefficient, trimester, academic_year, evaluation_date, title, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(grade.student_id)
    .bind(grade.subject_id)
    .bind(grade.teacher_id)
    .bind(grade.evaluation_type.as_str())
    .bind(grade.value)
    .bind(grade.max_value)
    .bind(grade.coefficient)
    .bind(grade.trimester.code())
    .bind(grade.academic_year)
    .bind(grade.evaluation_date)
    .bind(grade.title)
    .bind(grade.source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let class_id = upsert_class(pool, "6eme A").await?;

    let math = upsert_subject(pool, "MATH101", "Mathematics", Some(3.0)).await?;
    let french = upsert_subject(pool, "FREN101", "French", Some(2.0)).await?;

    let avery = upsert_student(pool, "Avery", "Lee", "avery.lee@ecole.test", class_id).await?;
    let jules = upsert_student(pool, "Jules", "Roux", "jules.roux@ecole.test", class_id).await?;
    let kiara = upsert_student(pool, "Kiara", "Patel", "kiara.patel@ecole.test", class_id).await?;

    let year = "2024-2025";
    let grades = vec![
        (
            "seed-001",
            avery,
            math,
            EvaluationType::Homework,
            16.0,
            20.0,
            Some(1.0),
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 10, 7).context("invalid date")?,
        ),
        (
            "seed-002",
            avery,
            math,
            EvaluationType::Exam,
            12.0,
            20.0,
            Some(2.0),
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 11, 18).context("invalid date")?,
        ),
        (
            "seed-003",
            avery,
            french,
            EvaluationType::Oral,
            10.0,
            20.0,
            None,
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 11, 4).context("invalid date")?,
        ),
        (
            "seed-004",
            avery,
            math,
            EvaluationType::Exam,
            15.0,
            20.0,
            Some(2.0),
            Trimester::Second,
            NaiveDate::from_ymd_opt(2025, 2, 10).context("invalid date")?,
        ),
        (
            "seed-005",
            avery,
            french,
            EvaluationType::Quiz,
            7.0,
            10.0,
            None,
            Trimester::Second,
            NaiveDate::from_ymd_opt(2025, 1, 20).context("invalid date")?,
        ),
        (
            "seed-006",
            jules,
            math,
            EvaluationType::Exam,
            8.0,
            20.0,
            Some(2.0),
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 11, 18).context("invalid date")?,
        ),
        (
            "seed-007",
            jules,
            french,
            EvaluationType::Project,
            9.5,
            20.0,
            Some(1.5),
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 12, 2).context("invalid date")?,
        ),
        (
            "seed-008",
            kiara,
            math,
            EvaluationType::Exam,
            23.0,
            40.0,
            Some(2.0),
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 11, 18).context("invalid date")?,
        ),
        (
            "seed-009",
            kiara,
            french,
            EvaluationType::ContinuousAssessment,
            11.0,
            20.0,
            None,
            Trimester::First,
            NaiveDate::from_ymd_opt(2024, 10, 21).context("invalid date")?,
        ),
    ];

    for (key, student, subject, kind, value, max_value, coefficient, trimester, date) in grades {
        insert_grade(
            pool,
            NewGrade {
                student_id: student,
                subject_id: subject,
                teacher_id: None,
                evaluation_type: kind,
                value,
                max_value,
                coefficient,
                trimester,
                academic_year: year,
                evaluation_date: date,
                title: None,
                source_key: key,
            },
        )
        .await?;
    }

    Ok(class_id)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        first_name: String,
        last_name: String,
        email: String,
        class_name: String,
        subject_code: String,
        subject_name: String,
        subject_coefficient: Option<f64>,
        teacher_id: Option<Uuid>,
        evaluation_type: String,
        value: f64,
        max_value: Option<f64>,
        coefficient: Option<f64>,
        trimester: String,
        academic_year: String,
        evaluation_date: NaiveDate,
        title: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let evaluation_type: EvaluationType = row
            .evaluation_type
            .parse()
            .map_err(|err: String| anyhow!(err))
            .with_context(|| format!("CSV row {}", line + 1))?;
        let trimester: Trimester = row
            .trimester
            .parse()
            .map_err(|err: String| anyhow!(err))
            .with_context(|| format!("CSV row {}", line + 1))?;

        let class_id = upsert_class(pool, &row.class_name).await?;
        let student_id =
            upsert_student(pool, &row.first_name, &row.last_name, &row.email, class_id).await?;
        let subject_id = upsert_subject(
            pool,
            &row.subject_code,
            &row.subject_name,
            row.subject_coefficient,
        )
        .await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let added = insert_grade(
            pool,
            NewGrade {
                student_id,
                subject_id,
                teacher_id: row.teacher_id,
                evaluation_type,
                value: row.value,
                max_value: row.max_value.unwrap_or(20.0),
                coefficient: row.coefficient,
                trimester,
                academic_year: &row.academic_year,
                evaluation_date: row.evaluation_date,
                title: row.title.as_deref(),
                source_key: &source_key,
            },
        )
        .await?;

        if added {
            inserted += 1;
        }
    }

    Ok(inserted)
}
