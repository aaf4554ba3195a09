use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Open-ended component name -> value map used for both marks and weightage.
/// Component names are data-driven per course, not a fixed schema.
pub type ComponentMap = Map<String, Value>;

#[derive(Debug, Clone, Serialize)]
pub struct StudentIdentity {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ProgramRecord {
    pub id: Uuid,
    pub program_code: String,
}

#[derive(Debug, Clone)]
pub struct ProgramSemester {
    pub id: Uuid,
    pub semester_name: String,
    pub semester_sequence: i32,
}

#[derive(Debug, Clone)]
pub struct SemesterCourse {
    pub id: Uuid,
    pub semester_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub weightage: Option<ComponentMap>,
}

/// One row of `course_student_marks`: a student's raw per-component scores
/// for one course.
#[derive(Debug, Clone)]
pub struct MarksRecord {
    pub id: Uuid,
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub marks: ComponentMap,
}

/// Trusted external input per (student, semester): sgpa plus credit-weighted
/// point totals. Never derived from `MarksRecord` by this engine.
#[derive(Debug, Clone)]
pub struct SemesterGradeRecord {
    pub semester_id: Uuid,
    pub sgpa: f64,
    pub grade_points: f64,
    pub max_grade_points: f64,
}

/// One roster line: a student enrolled in a program.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub roll_no: String,
}

/// Result of aggregating one marks map. `grade_point` is `None` exactly when
/// no marks row exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarksAggregate {
    pub total_marks: f64,
    pub grade_point: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseReportLine {
    pub course_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
    pub weightage: Option<ComponentMap>,
    pub marks_id: Option<Uuid>,
    pub marks: Option<ComponentMap>,
    pub total_marks: f64,
    pub grade_point: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemesterSection {
    pub semester_id: Uuid,
    pub semester_name: String,
    pub semester_sequence: i32,
    pub courses: Vec<CourseReportLine>,
}

/// Full grade report for one student, semesters in chronological
/// (sequence) order.
#[derive(Debug, Clone, Serialize)]
pub struct StudentGradeReport {
    pub student: StudentIdentity,
    pub semesters: Vec<SemesterSection>,
}

/// A marks row joined with minimal student identity (course listing).
#[derive(Debug, Clone, Serialize)]
pub struct CourseMarksEntry {
    pub marks_id: Uuid,
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub marks: ComponentMap,
}

/// Roster-complete course listing row: every enrolled student appears,
/// with nulls when no marks row exists yet.
#[derive(Debug, Clone, Serialize)]
pub struct RosterMarksEntry {
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub roll_no: String,
    pub marks_id: Option<Uuid>,
    pub marks: Option<ComponentMap>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseHeader {
    pub course_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub credits: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentCourseCell {
    pub course_id: Uuid,
    pub marks_id: Option<Uuid>,
    pub marks: Option<ComponentMap>,
    pub total_marks: f64,
    pub grade_point: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummaryRow {
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub roll_no: String,
    pub courses: Vec<StudentCourseCell>,
}

/// Cross-student summary for one program semester: full roster x every
/// course in the semester.
#[derive(Debug, Clone, Serialize)]
pub struct SemesterSummary {
    pub semester_id: Uuid,
    pub semester_name: String,
    pub semester_sequence: i32,
    pub courses: Vec<CourseHeader>,
    pub students: Vec<StudentSummaryRow>,
}

/// The engine's owned output: one row per (program, student), fully
/// replaced on every recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramGradeSnapshot {
    pub program_id: Uuid,
    pub student_id: Uuid,
    /// semester_name -> sgpa, denormalized for display.
    pub semester_grades: ComponentMap,
    pub grade_points: f64,
    pub max_grade_points: f64,
    pub cgpa: f64,
}
