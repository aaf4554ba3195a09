//! Program-level CGPA rollup.
//!
//! Semester grade rows are trusted external inputs (sgpa plus credit-weighted
//! point totals per semester); this module only rolls them up and persists one
//! snapshot per (program, student). It never derives semester grades from raw
//! course marks.

use std::collections::HashMap;

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentMap, ProgramGradeSnapshot, ProgramSemester, SemesterGradeRecord};

/// Round to two decimals, the precision CGPA is stored and displayed at.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A rollup over zero semesters is refused. The display report tolerates an
/// empty program; the persisted snapshot does not.
fn ensure_program_has_semesters(semesters: &[ProgramSemester]) -> EngineResult<()> {
    if semesters.is_empty() {
        return Err(EngineError::not_found("no semesters found for this program"));
    }
    Ok(())
}

/// Fold semester grade rows into one program-level snapshot.
///
/// `max_grade_points` arrives as total credits x 10 per semester, so the
/// denominator is scaled back by /10 to land CGPA on the same 0-10 scale as
/// per-course grade points. Rows whose semester does not resolve within the
/// program are left out of the display map but still count toward the totals.
pub fn build_snapshot(
    program_id: Uuid,
    student_id: Uuid,
    semesters: &[ProgramSemester],
    grades: &[SemesterGradeRecord],
) -> ProgramGradeSnapshot {
    let names: HashMap<Uuid, &str> = semesters
        .iter()
        .map(|semester| (semester.id, semester.semester_name.as_str()))
        .collect();

    let mut semester_grades = ComponentMap::new();
    let mut grade_points = 0.0;
    let mut max_grade_points = 0.0;

    for grade in grades {
        if let Some(name) = names.get(&grade.semester_id) {
            semester_grades.insert((*name).to_string(), json!(grade.sgpa));
        }
        grade_points += grade.grade_points;
        max_grade_points += grade.max_grade_points;
    }

    let cgpa = if max_grade_points > 0.0 {
        round2(grade_points / (max_grade_points / 10.0))
    } else {
        0.0
    };

    ProgramGradeSnapshot {
        program_id,
        student_id,
        semester_grades,
        grade_points,
        max_grade_points,
        cgpa,
    }
}

/// Recompute and persist the CGPA snapshot for one (program, student) pair.
///
/// The write is a full-overwrite upsert keyed by the (program_id, student_id)
/// unique constraint: recomputation is idempotent and concurrent runs resolve
/// to last writer wins at the storage layer. A program with no semesters is an
/// error here, unlike the display report which tolerates it.
pub async fn recompute_program_grade(
    pool: &PgPool,
    email: &str,
    program_code: &str,
) -> EngineResult<ProgramGradeSnapshot> {
    let student = db::resolve_student(pool, email).await?;
    let program = db::resolve_program(pool, program_code).await?;

    let semesters = db::fetch_program_semesters(pool, program.id).await?;
    ensure_program_has_semesters(&semesters)?;

    let semester_ids: Vec<Uuid> = semesters.iter().map(|semester| semester.id).collect();
    let grades = db::fetch_semester_grades(pool, student.id, &semester_ids).await?;

    let snapshot = build_snapshot(program.id, student.id, &semesters, &grades);
    db::upsert_program_grade(pool, &snapshot).await?;

    tracing::info!(
        student = %student.email,
        program = %program.program_code,
        cgpa = snapshot.cgpa,
        "program grade recomputed"
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_semester(name: &str, sequence: i32) -> ProgramSemester {
        ProgramSemester {
            id: Uuid::new_v4(),
            semester_name: name.to_string(),
            semester_sequence: sequence,
        }
    }

    fn sample_grade(semester_id: Uuid, sgpa: f64, points: f64, max: f64) -> SemesterGradeRecord {
        SemesterGradeRecord {
            semester_id,
            sgpa,
            grade_points: points,
            max_grade_points: max,
        }
    }

    #[test]
    fn cgpa_is_points_over_credit_equivalent() {
        let semesters = vec![sample_semester("Semester 1", 1), sample_semester("Semester 2", 2)];
        let grades = vec![
            sample_grade(semesters[0].id, 9.0, 36.0, 40.0),
            sample_grade(semesters[1].id, 9.0, 45.0, 50.0),
        ];

        let snapshot = build_snapshot(Uuid::new_v4(), Uuid::new_v4(), &semesters, &grades);
        assert_eq!(snapshot.grade_points, 81.0);
        assert_eq!(snapshot.max_grade_points, 90.0);
        assert_eq!(snapshot.cgpa, 9.0);
        assert_eq!(snapshot.semester_grades.len(), 2);
        assert_eq!(
            snapshot.semester_grades.get("Semester 1").and_then(|v| v.as_f64()),
            Some(9.0)
        );
    }

    #[test]
    fn cgpa_rounds_to_two_decimals() {
        let semesters = vec![sample_semester("Semester 1", 1)];
        let grades = vec![sample_grade(semesters[0].id, 8.33, 25.0, 30.0)];

        let snapshot = build_snapshot(Uuid::new_v4(), Uuid::new_v4(), &semesters, &grades);
        // 25 / 3 = 8.333... rounds to 8.33
        assert_eq!(snapshot.cgpa, 8.33);
    }

    #[test]
    fn zero_max_points_guard_yields_zero_cgpa() {
        let semesters = vec![sample_semester("Semester 1", 1)];
        let snapshot = build_snapshot(Uuid::new_v4(), Uuid::new_v4(), &semesters, &[]);

        assert_eq!(snapshot.cgpa, 0.0);
        assert_eq!(snapshot.grade_points, 0.0);
        assert_eq!(snapshot.max_grade_points, 0.0);
        assert!(snapshot.semester_grades.is_empty());
    }

    #[test]
    fn unresolved_semester_rows_count_toward_totals_only() {
        let semesters = vec![sample_semester("Semester 1", 1)];
        let grades = vec![
            sample_grade(semesters[0].id, 9.0, 36.0, 40.0),
            sample_grade(Uuid::new_v4(), 7.5, 30.0, 40.0),
        ];

        let snapshot = build_snapshot(Uuid::new_v4(), Uuid::new_v4(), &semesters, &grades);
        assert_eq!(snapshot.semester_grades.len(), 1);
        assert_eq!(snapshot.grade_points, 66.0);
        assert_eq!(snapshot.max_grade_points, 80.0);
    }

    #[test]
    fn refuses_rollup_over_zero_semesters() {
        let err = ensure_program_has_semesters(&[]).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert_eq!(
            err.to_string(),
            "not found: no semesters found for this program"
        );

        let semesters = vec![sample_semester("Semester 1", 1)];
        assert!(ensure_program_has_semesters(&semesters).is_ok());
    }

    #[test]
    fn recomputation_is_value_idempotent() {
        let program_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        let semesters = vec![sample_semester("Semester 1", 1), sample_semester("Semester 2", 2)];
        let grades = vec![
            sample_grade(semesters[0].id, 9.0, 36.0, 40.0),
            sample_grade(semesters[1].id, 9.0, 45.0, 50.0),
        ];

        let first = build_snapshot(program_id, student_id, &semesters, &grades);
        let second = build_snapshot(program_id, student_id, &semesters, &grades);
        assert_eq!(first, second);
    }
}
