use anyhow::Context;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::grading;
use crate::models::{
    ComponentMap, CourseMarksEntry, MarksRecord, ProgramGradeSnapshot, ProgramRecord,
    ProgramSemester, RosterEntry, SemesterCourse, SemesterGradeRecord, StudentIdentity,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn object_map(value: Value) -> ComponentMap {
    match value {
        Value::Object(map) => map,
        _ => ComponentMap::new(),
    }
}

fn optional_object_map(value: Option<Value>) -> Option<ComponentMap> {
    match value {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub async fn resolve_student(pool: &PgPool, email: &str) -> EngineResult<StudentIdentity> {
    let row = sqlx::query(
        "SELECT id, full_name, email FROM academic_records.students WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::not_found("student not found"))?;

    Ok(StudentIdentity {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
    })
}

/// The program a student is enrolled in, per their student-detail record.
pub async fn fetch_student_program(pool: &PgPool, student_id: Uuid) -> EngineResult<Uuid> {
    let row = sqlx::query(
        "SELECT program_id FROM academic_records.student_details WHERE student_id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::not_found("student detail not found"))?;

    Ok(row.get("program_id"))
}

pub async fn resolve_program(pool: &PgPool, program_code: &str) -> EngineResult<ProgramRecord> {
    let row = sqlx::query(
        "SELECT id, program_code FROM academic_records.programs WHERE program_code = $1",
    )
    .bind(program_code)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::not_found("program not found"))?;

    Ok(ProgramRecord {
        id: row.get("id"),
        program_code: row.get("program_code"),
    })
}

pub async fn resolve_course(pool: &PgPool, course_code: &str) -> EngineResult<SemesterCourse> {
    let row = sqlx::query(
        "SELECT id, semester_id, course_code, course_name, credits, weightage \
         FROM academic_records.semester_courses WHERE course_code = $1",
    )
    .bind(course_code)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::not_found("course not found"))?;

    Ok(course_from_row(&row))
}

pub async fn resolve_semester(
    pool: &PgPool,
    program_id: Uuid,
    semester_name: &str,
) -> EngineResult<ProgramSemester> {
    let row = sqlx::query(
        "SELECT id, semester_name, semester_sequence \
         FROM academic_records.program_semesters \
         WHERE program_id = $1 AND semester_name = $2",
    )
    .bind(program_id)
    .bind(semester_name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| EngineError::not_found("semester not found"))?;

    Ok(semester_from_row(&row))
}

fn semester_from_row(row: &sqlx::postgres::PgRow) -> ProgramSemester {
    ProgramSemester {
        id: row.get("id"),
        semester_name: row.get("semester_name"),
        semester_sequence: row.get("semester_sequence"),
    }
}

fn course_from_row(row: &sqlx::postgres::PgRow) -> SemesterCourse {
    SemesterCourse {
        id: row.get("id"),
        semester_id: row.get("semester_id"),
        course_code: row.get("course_code"),
        course_name: row.get("course_name"),
        credits: row.get("credits"),
        weightage: optional_object_map(row.get("weightage")),
    }
}

fn marks_from_row(row: &sqlx::postgres::PgRow) -> MarksRecord {
    MarksRecord {
        id: row.get("id"),
        course_id: row.get("course_id"),
        student_id: row.get("student_id"),
        marks: object_map(row.get("marks")),
    }
}

/// Program semesters in chronological order.
pub async fn fetch_program_semesters(
    pool: &PgPool,
    program_id: Uuid,
) -> EngineResult<Vec<ProgramSemester>> {
    let rows = sqlx::query(
        "SELECT id, semester_name, semester_sequence \
         FROM academic_records.program_semesters \
         WHERE program_id = $1 ORDER BY semester_sequence ASC",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(semester_from_row).collect())
}

pub async fn fetch_semester_courses(
    pool: &PgPool,
    semester_ids: &[Uuid],
) -> EngineResult<Vec<SemesterCourse>> {
    let rows = sqlx::query(
        "SELECT id, semester_id, course_code, course_name, credits, weightage \
         FROM academic_records.semester_courses \
         WHERE semester_id = ANY($1) ORDER BY course_code ASC",
    )
    .bind(semester_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(course_from_row).collect())
}

/// One student's marks rows restricted to a set of courses.
pub async fn fetch_student_marks(
    pool: &PgPool,
    student_id: Uuid,
    course_ids: &[Uuid],
) -> EngineResult<Vec<MarksRecord>> {
    let rows = sqlx::query(
        "SELECT id, course_id, student_id, marks \
         FROM academic_records.course_student_marks \
         WHERE student_id = $1 AND course_id = ANY($2)",
    )
    .bind(student_id)
    .bind(course_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(marks_from_row).collect())
}

pub async fn fetch_course_marks(pool: &PgPool, course_id: Uuid) -> EngineResult<Vec<MarksRecord>> {
    let rows = sqlx::query(
        "SELECT id, course_id, student_id, marks \
         FROM academic_records.course_student_marks WHERE course_id = $1",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(marks_from_row).collect())
}

pub async fn fetch_marks_for_courses(
    pool: &PgPool,
    course_ids: &[Uuid],
) -> EngineResult<Vec<MarksRecord>> {
    let rows = sqlx::query(
        "SELECT id, course_id, student_id, marks \
         FROM academic_records.course_student_marks WHERE course_id = ANY($1)",
    )
    .bind(course_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(marks_from_row).collect())
}

/// Marks rows for one course joined with student identity.
pub async fn fetch_course_marks_with_students(
    pool: &PgPool,
    course_id: Uuid,
) -> EngineResult<Vec<CourseMarksEntry>> {
    let rows = sqlx::query(
        "SELECT m.id AS marks_id, m.student_id, st.full_name, st.email, m.marks \
         FROM academic_records.course_student_marks m \
         JOIN academic_records.students st ON st.id = m.student_id \
         WHERE m.course_id = $1 ORDER BY st.full_name ASC",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| CourseMarksEntry {
            marks_id: row.get("marks_id"),
            student_id: row.get("student_id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            marks: object_map(row.get("marks")),
        })
        .collect())
}

/// Every student enrolled in a program, in roll number order.
pub async fn fetch_program_roster(
    pool: &PgPool,
    program_id: Uuid,
) -> EngineResult<Vec<RosterEntry>> {
    let rows = sqlx::query(
        "SELECT d.student_id, st.full_name, st.email, d.roll_no \
         FROM academic_records.student_details d \
         JOIN academic_records.students st ON st.id = d.student_id \
         WHERE d.program_id = $1 ORDER BY d.roll_no ASC",
    )
    .bind(program_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RosterEntry {
            student_id: row.get("student_id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            roll_no: row.get("roll_no"),
        })
        .collect())
}

/// One student's semester grade rows restricted to a set of semesters.
pub async fn fetch_semester_grades(
    pool: &PgPool,
    student_id: Uuid,
    semester_ids: &[Uuid],
) -> EngineResult<Vec<SemesterGradeRecord>> {
    let rows = sqlx::query(
        "SELECT semester_id, sgpa, grade_points, max_grade_points \
         FROM academic_records.semester_grades \
         WHERE student_id = $1 AND semester_id = ANY($2)",
    )
    .bind(student_id)
    .bind(semester_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| SemesterGradeRecord {
            semester_id: row.get("semester_id"),
            sgpa: row.get("sgpa"),
            grade_points: row.get("grade_points"),
            max_grade_points: row.get("max_grade_points"),
        })
        .collect())
}

/// Course-definition write path. Weightage is validated on both creation and
/// update, before anything touches the database.
pub async fn upsert_course(
    pool: &PgPool,
    semester_id: Uuid,
    course_code: &str,
    course_name: &str,
    credits: i32,
    weightage: Option<&Value>,
) -> EngineResult<Uuid> {
    grading::validate_weightage(weightage)?;

    let course_id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_records.semester_courses
        (id, semester_id, course_code, course_name, credits, weightage)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (semester_id, course_code) DO UPDATE
        SET course_name = EXCLUDED.course_name,
            credits = EXCLUDED.credits,
            weightage = EXCLUDED.weightage
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(semester_id)
    .bind(course_code)
    .bind(course_name)
    .bind(credits)
    .bind(weightage.cloned())
    .fetch_one(pool)
    .await?
    .get("id");

    tracing::debug!(course = course_code, %course_id, "course definition stored");
    Ok(course_id)
}

/// Marks-storage write path, keyed uniquely per (course, student). A
/// re-grade merges the supplied component keys over the stored map and
/// leaves unsupplied components untouched.
pub async fn record_marks(
    pool: &PgPool,
    course_id: Uuid,
    student_id: Uuid,
    components: &ComponentMap,
) -> EngineResult<Uuid> {
    let marks_id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_records.course_student_marks (id, course_id, student_id, marks)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (course_id, student_id) DO UPDATE
        SET marks = course_student_marks.marks || EXCLUDED.marks
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(course_id)
    .bind(student_id)
    .bind(Value::Object(components.clone()))
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(marks_id)
}

/// Atomic full-overwrite upsert of the engine's output row. The unique
/// (program_id, student_id) constraint makes concurrent recomputation safe:
/// last writer wins, no duplicates, no merge.
pub async fn upsert_program_grade(
    pool: &PgPool,
    snapshot: &ProgramGradeSnapshot,
) -> EngineResult<()> {
    sqlx::query(
        r#"
        INSERT INTO academic_records.program_grades
        (id, program_id, student_id, semester_grades, grade_points, max_grade_points, cgpa, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (program_id, student_id) DO UPDATE
        SET semester_grades = EXCLUDED.semester_grades,
            grade_points = EXCLUDED.grade_points,
            max_grade_points = EXCLUDED.max_grade_points,
            cgpa = EXCLUDED.cgpa,
            computed_at = EXCLUDED.computed_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(snapshot.program_id)
    .bind(snapshot.student_id)
    .bind(Value::Object(snapshot.semester_grades.clone()))
    .bind(snapshot.grade_points)
    .bind(snapshot.max_grade_points)
    .bind(snapshot.cgpa)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    tracing::debug!(
        program_id = %snapshot.program_id,
        student_id = %snapshot.student_id,
        "program grade upserted"
    );
    Ok(())
}

/// Merge per-component marks from a CSV file into the marks store. Columns:
/// course_code, email, component, score.
pub async fn import_marks_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        course_code: String,
        email: String,
        component: String,
        score: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut merged = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let course = resolve_course(pool, &row.course_code)
            .await
            .with_context(|| format!("course {} from CSV", row.course_code))?;
        let student = resolve_student(pool, &row.email)
            .await
            .with_context(|| format!("student {} from CSV", row.email))?;

        let mut components = ComponentMap::new();
        components.insert(row.component, serde_json::json!(row.score));
        record_marks(pool, course.id, student.id, &components).await?;
        merged += 1;
    }

    Ok(merged)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let program_id: Uuid = sqlx::query(
        r#"
        INSERT INTO academic_records.programs (id, institution, program_code, program_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (institution, program_code) DO UPDATE
        SET program_name = EXCLUDED.program_name
        RETURNING id
        "#,
    )
    .bind(Uuid::parse_str("7b2f0c6e-5a1d-4f3b-9c8e-2d4a6b8c0e1f")?)
    .bind("Aurora Institute of Technology")
    .bind("BTECH-CSE")
    .bind("B.Tech Computer Science & Engineering")
    .fetch_one(pool)
    .await?
    .get("id");

    let mut semester_ids = Vec::new();
    for (name, sequence) in [("Semester 1", 1i32), ("Semester 2", 2i32)] {
        let semester_id: Uuid = sqlx::query(
            r#"
            INSERT INTO academic_records.program_semesters
            (id, program_id, semester_name, semester_sequence)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (program_id, semester_sequence) DO UPDATE
            SET semester_name = EXCLUDED.semester_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(program_id)
        .bind(name)
        .bind(sequence)
        .fetch_one(pool)
        .await?
        .get("id");
        semester_ids.push(semester_id);
    }

    let courses = [
        (
            semester_ids[0],
            "CS101",
            "Programming Fundamentals",
            4,
            serde_json::json!({"internal": 30, "mid_term": 20, "end_term": 50}),
        ),
        (
            semester_ids[0],
            "MA101",
            "Discrete Mathematics",
            4,
            serde_json::json!({"assignments": 40, "end_term": 60}),
        ),
        (
            semester_ids[1],
            "CS201",
            "Data Structures",
            4,
            serde_json::json!({"internal": 30, "mid_term": 20, "end_term": 50}),
        ),
    ];

    let mut course_ids = Vec::new();
    for (semester_id, code, name, credits, weightage) in courses {
        let course_id =
            upsert_course(pool, semester_id, code, name, credits, Some(&weightage)).await?;
        course_ids.push(course_id);
    }

    let students = [
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Ananya Sharma",
            "ananya.sharma@aurora.edu",
            "AUR2024001",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Rohan Verma",
            "rohan.verma@aurora.edu",
            "AUR2024002",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Meera Iyer",
            "meera.iyer@aurora.edu",
            "AUR2024003",
        ),
    ];

    let mut student_ids = Vec::new();
    for (id, full_name, email, roll_no) in students {
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO academic_records.students (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO academic_records.student_details (student_id, program_id, roll_no)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_id) DO UPDATE
            SET program_id = EXCLUDED.program_id, roll_no = EXCLUDED.roll_no
            "#,
        )
        .bind(student_id)
        .bind(program_id)
        .bind(roll_no)
        .execute(pool)
        .await?;

        student_ids.push(student_id);
    }

    let marks = [
        (
            course_ids[0],
            student_ids[0],
            serde_json::json!({"internal": 28, "mid_term": 17, "end_term": 45}),
        ),
        (
            course_ids[1],
            student_ids[0],
            serde_json::json!({"assignments": 36, "end_term": 52}),
        ),
        (
            course_ids[2],
            student_ids[0],
            serde_json::json!({"internal": 25, "mid_term": 15, "end_term": 40}),
        ),
        (
            course_ids[0],
            student_ids[1],
            serde_json::json!({"internal": 20, "mid_term": 12, "end_term": 30}),
        ),
    ];

    for (course_id, student_id, components) in marks {
        let map = components.as_object().cloned().context("marks literal")?;
        record_marks(pool, course_id, student_id, &map).await?;
    }

    // Semester grade rows arrive from an external grading process; these
    // stand in for it. max_grade_points is total credits x 10.
    let semester_grades = [
        (student_ids[0], semester_ids[0], 8.75, 70.0, 80.0),
        (student_ids[0], semester_ids[1], 8.0, 32.0, 40.0),
        (student_ids[1], semester_ids[0], 6.5, 52.0, 80.0),
    ];

    let mut grade_row_ids = Vec::new();
    for (student_id, semester_id, sgpa, grade_points, max_grade_points) in semester_grades {
        let grade_id: Uuid = sqlx::query(
            r#"
            INSERT INTO academic_records.semester_grades
            (id, student_id, semester_id, sgpa, grade_points, max_grade_points)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, semester_id) DO UPDATE
            SET sgpa = EXCLUDED.sgpa,
                grade_points = EXCLUDED.grade_points,
                max_grade_points = EXCLUDED.max_grade_points
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(semester_id)
        .bind(sgpa)
        .bind(grade_points)
        .bind(max_grade_points)
        .fetch_one(pool)
        .await?
        .get("id");
        grade_row_ids.push(grade_id);
    }

    // A failed course entry, written here only for external backlog counting.
    sqlx::query(
        r#"
        INSERT INTO academic_records.course_grades (id, student_id, sem_refer_id, status)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::parse_str("a1b2c3d4-0001-4e5f-8a9b-0c1d2e3f4a5b")?)
    .bind(student_ids[1])
    .bind(grade_row_ids[2])
    .bind("failed")
    .execute(pool)
    .await?;

    tracing::info!(%program_id, "seed data inserted");
    Ok(())
}
