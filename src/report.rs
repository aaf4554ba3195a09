//! Student and cross-student report builders.
//!
//! Every builder is roster-driven: students or courses with no data surface
//! as explicit nulls, never as dropped rows. Fetches run sequentially with no
//! transactional snapshot, so a report may observe a mix of before/after
//! state if the underlying records mutate mid-build.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::EngineResult;
use crate::grading;
use crate::models::{
    CourseHeader, CourseMarksEntry, CourseReportLine, MarksRecord, ProgramSemester,
    RosterEntry, RosterMarksEntry, SemesterCourse, SemesterSection, SemesterSummary,
    StudentCourseCell, StudentGradeReport, StudentIdentity, StudentSummaryRow,
};

/// Join prefetched rows into the per-semester report shape. Semesters arrive
/// already ordered by sequence; courses keep their fetch order within each
/// semester.
pub fn assemble_semester_report(
    student: StudentIdentity,
    semesters: Vec<ProgramSemester>,
    courses: Vec<SemesterCourse>,
    marks: Vec<MarksRecord>,
) -> StudentGradeReport {
    let marks_by_course: HashMap<Uuid, MarksRecord> = marks
        .into_iter()
        .map(|record| (record.course_id, record))
        .collect();

    let mut courses_by_semester: HashMap<Uuid, Vec<SemesterCourse>> = HashMap::new();
    for course in courses {
        courses_by_semester
            .entry(course.semester_id)
            .or_default()
            .push(course);
    }

    let sections = semesters
        .into_iter()
        .map(|semester| {
            let lines = courses_by_semester
                .remove(&semester.id)
                .unwrap_or_default()
                .into_iter()
                .map(|course| {
                    let record = marks_by_course.get(&course.id);
                    let aggregate = grading::aggregate_marks(record.map(|r| &r.marks));
                    CourseReportLine {
                        course_id: course.id,
                        course_code: course.course_code,
                        course_name: course.course_name,
                        credits: course.credits,
                        weightage: course.weightage,
                        marks_id: record.map(|r| r.id),
                        marks: record.map(|r| r.marks.clone()),
                        total_marks: aggregate.total_marks,
                        grade_point: aggregate.grade_point,
                    }
                })
                .collect();

            SemesterSection {
                semester_id: semester.id,
                semester_name: semester.semester_name,
                semester_sequence: semester.semester_sequence,
                courses: lines,
            }
        })
        .collect();

    StudentGradeReport {
        student,
        semesters: sections,
    }
}

/// Full grade report for one student across every semester of their enrolled
/// program. A program with zero semesters yields an empty-semester report,
/// not an error.
pub async fn student_semester_report(
    pool: &PgPool,
    email: &str,
) -> EngineResult<StudentGradeReport> {
    let student = db::resolve_student(pool, email).await?;
    let program_id = db::fetch_student_program(pool, student.id).await?;

    let semesters = db::fetch_program_semesters(pool, program_id).await?;
    let semester_ids: Vec<Uuid> = semesters.iter().map(|semester| semester.id).collect();
    let courses = db::fetch_semester_courses(pool, &semester_ids).await?;
    let course_ids: Vec<Uuid> = courses.iter().map(|course| course.id).collect();
    let marks = db::fetch_student_marks(pool, student.id, &course_ids).await?;

    tracing::debug!(
        student = %student.email,
        semesters = semesters.len(),
        courses = courses.len(),
        marks = marks.len(),
        "assembling semester report"
    );

    Ok(assemble_semester_report(student, semesters, courses, marks))
}

/// Every marks row for one course joined with student identity. Students
/// without a marks row do not appear; see `course_marks_roster` for the
/// roster-complete variant.
pub async fn course_marks_listing(
    pool: &PgPool,
    course_code: &str,
) -> EngineResult<Vec<CourseMarksEntry>> {
    let course = db::resolve_course(pool, course_code).await?;
    db::fetch_course_marks_with_students(pool, course.id).await
}

/// Left-join a program roster against one course's marks rows. The roster
/// drives completeness: every enrolled student produces exactly one entry.
pub fn roster_marks_join(
    roster: Vec<RosterEntry>,
    marks: Vec<MarksRecord>,
) -> Vec<RosterMarksEntry> {
    let mut marks_by_student: HashMap<Uuid, MarksRecord> = marks
        .into_iter()
        .map(|record| (record.student_id, record))
        .collect();

    roster
        .into_iter()
        .map(|entry| {
            let record = marks_by_student.remove(&entry.student_id);
            RosterMarksEntry {
                student_id: entry.student_id,
                full_name: entry.full_name,
                email: entry.email,
                roll_no: entry.roll_no,
                marks_id: record.as_ref().map(|r| r.id),
                marks: record.map(|r| r.marks),
            }
        })
        .collect()
}

/// Roster-complete marks listing for one course within one program: students
/// with no submitted marks appear with null marks fields.
pub async fn course_marks_roster(
    pool: &PgPool,
    course_code: &str,
    program_code: &str,
) -> EngineResult<Vec<RosterMarksEntry>> {
    let course = db::resolve_course(pool, course_code).await?;
    let program = db::resolve_program(pool, program_code).await?;

    let roster = db::fetch_program_roster(pool, program.id).await?;
    let marks = db::fetch_course_marks(pool, course.id).await?;

    Ok(roster_marks_join(roster, marks))
}

/// Join one semester's courses against the full program roster, aggregating
/// each (student, course) cell.
pub fn assemble_semester_summary(
    semester: ProgramSemester,
    courses: Vec<SemesterCourse>,
    roster: Vec<RosterEntry>,
    marks: Vec<MarksRecord>,
) -> SemesterSummary {
    let mut marks_by_cell: HashMap<(Uuid, Uuid), MarksRecord> = marks
        .into_iter()
        .map(|record| ((record.student_id, record.course_id), record))
        .collect();

    let students = roster
        .into_iter()
        .map(|entry| {
            let cells = courses
                .iter()
                .map(|course| {
                    let record = marks_by_cell.remove(&(entry.student_id, course.id));
                    let aggregate = grading::aggregate_marks(record.as_ref().map(|r| &r.marks));
                    StudentCourseCell {
                        course_id: course.id,
                        marks_id: record.as_ref().map(|r| r.id),
                        marks: record.map(|r| r.marks),
                        total_marks: aggregate.total_marks,
                        grade_point: aggregate.grade_point,
                    }
                })
                .collect();

            StudentSummaryRow {
                student_id: entry.student_id,
                full_name: entry.full_name,
                email: entry.email,
                roll_no: entry.roll_no,
                courses: cells,
            }
        })
        .collect();

    let headers = courses
        .into_iter()
        .map(|course| CourseHeader {
            course_id: course.id,
            course_code: course.course_code,
            course_name: course.course_name,
            credits: course.credits,
        })
        .collect();

    SemesterSummary {
        semester_id: semester.id,
        semester_name: semester.semester_name,
        semester_sequence: semester.semester_sequence,
        courses: headers,
        students,
    }
}

/// Cross-student summary for one program semester.
pub async fn semester_summary(
    pool: &PgPool,
    program_code: &str,
    semester_name: &str,
) -> EngineResult<SemesterSummary> {
    let program = db::resolve_program(pool, program_code).await?;
    let semester = db::resolve_semester(pool, program.id, semester_name).await?;

    let courses = db::fetch_semester_courses(pool, &[semester.id]).await?;
    let roster = db::fetch_program_roster(pool, program.id).await?;
    let course_ids: Vec<Uuid> = courses.iter().map(|course| course.id).collect();
    let marks = db::fetch_marks_for_courses(pool, &course_ids).await?;

    Ok(assemble_semester_summary(semester, courses, roster, marks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::models::ComponentMap;

    fn component_map(value: serde_json::Value) -> ComponentMap {
        value.as_object().cloned().expect("object literal")
    }

    fn sample_student() -> StudentIdentity {
        StudentIdentity {
            id: Uuid::new_v4(),
            full_name: "Avery Lee".to_string(),
            email: "avery.lee@example.edu".to_string(),
        }
    }

    fn sample_semester(name: &str, sequence: i32) -> ProgramSemester {
        ProgramSemester {
            id: Uuid::new_v4(),
            semester_name: name.to_string(),
            semester_sequence: sequence,
        }
    }

    fn sample_course(semester_id: Uuid, code: &str) -> SemesterCourse {
        SemesterCourse {
            id: Uuid::new_v4(),
            semester_id,
            course_code: code.to_string(),
            course_name: format!("Course {code}"),
            credits: 4,
            weightage: Some(component_map(json!({"mid": 40, "final": 60}))),
        }
    }

    fn sample_marks(course_id: Uuid, student_id: Uuid, marks: serde_json::Value) -> MarksRecord {
        MarksRecord {
            id: Uuid::new_v4(),
            course_id,
            student_id,
            marks: component_map(marks),
        }
    }

    fn sample_roster_entry(name: &str, roll_no: &str) -> RosterEntry {
        RosterEntry {
            student_id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: format!("{roll_no}@example.edu"),
            roll_no: roll_no.to_string(),
        }
    }

    #[test]
    fn semesters_keep_sequence_order_with_marks_attached() {
        let student = sample_student();
        let semesters = vec![
            sample_semester("Semester 1", 1),
            sample_semester("Semester 2", 2),
        ];
        let courses = vec![
            sample_course(semesters[0].id, "CS101"),
            sample_course(semesters[1].id, "CS201"),
        ];
        let marks = vec![sample_marks(
            courses[0].id,
            student.id,
            json!({"mid": 40, "final": 45}),
        )];

        let report = assemble_semester_report(student, semesters, courses, marks);

        assert_eq!(report.semesters.len(), 2);
        assert_eq!(report.semesters[0].semester_sequence, 1);
        assert_eq!(report.semesters[1].semester_sequence, 2);

        let graded = &report.semesters[0].courses[0];
        assert_eq!(graded.total_marks, 85.0);
        assert_eq!(graded.grade_point, Some(9));
        assert!(graded.marks_id.is_some());

        let ungraded = &report.semesters[1].courses[0];
        assert_eq!(ungraded.total_marks, 0.0);
        assert_eq!(ungraded.grade_point, None);
        assert!(ungraded.marks.is_none());
        assert!(ungraded.marks_id.is_none());
    }

    #[test]
    fn program_without_semesters_still_reports() {
        let report = assemble_semester_report(sample_student(), vec![], vec![], vec![]);
        assert!(report.semesters.is_empty());
    }

    #[test]
    fn roster_join_keeps_students_without_marks() {
        let roster = vec![
            sample_roster_entry("Avery Lee", "r001"),
            sample_roster_entry("Jules Moreno", "r002"),
            sample_roster_entry("Kiara Patel", "r003"),
        ];
        let course_id = Uuid::new_v4();
        let marks = vec![sample_marks(
            course_id,
            roster[1].student_id,
            json!({"mid": 33}),
        )];

        let entries = roster_marks_join(roster, marks);

        assert_eq!(entries.len(), 3);
        let without_marks: Vec<_> = entries
            .iter()
            .filter(|entry| entry.marks_id.is_none() && entry.marks.is_none())
            .collect();
        assert_eq!(without_marks.len(), 2);
        assert!(entries[1].marks_id.is_some());
    }

    #[test]
    fn summary_covers_every_roster_course_pair() {
        let semester = sample_semester("Semester 1", 1);
        let courses = vec![
            sample_course(semester.id, "CS101"),
            sample_course(semester.id, "MA101"),
        ];
        let roster = vec![
            sample_roster_entry("Avery Lee", "r001"),
            sample_roster_entry("Jules Moreno", "r002"),
        ];
        let marks = vec![sample_marks(
            courses[0].id,
            roster[0].student_id,
            json!({"mid": 40, "final": 52}),
        )];

        let summary = assemble_semester_summary(semester, courses, roster, marks);

        assert_eq!(summary.courses.len(), 2);
        assert_eq!(summary.students.len(), 2);
        for row in &summary.students {
            assert_eq!(row.courses.len(), 2);
        }

        let graded = &summary.students[0].courses[0];
        assert_eq!(graded.total_marks, 92.0);
        assert_eq!(graded.grade_point, Some(10));

        let ungraded = &summary.students[1].courses[0];
        assert_eq!(ungraded.total_marks, 0.0);
        assert_eq!(ungraded.grade_point, None);
        assert!(ungraded.marks.is_none());
    }
}
