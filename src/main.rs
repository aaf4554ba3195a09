use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod cgpa;
mod db;
mod error;
mod grading;
mod models;
mod report;

#[derive(Parser)]
#[command(name = "grade-rollup")]
#[command(about = "Grade and marks aggregation engine for academic records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Merge per-component marks from a CSV file
    ImportMarks {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Create or update a course definition (validates weightage)
    UpsertCourse {
        #[arg(long)]
        semester_id: Uuid,
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        credits: i32,
        /// JSON object of component -> percentage, e.g. '{"mid":40,"final":60}'
        #[arg(long)]
        weightage: Option<String>,
    },
    /// Full per-semester grade report for one student
    Report {
        #[arg(long)]
        email: String,
    },
    /// Marks for one course; add --program for a roster-complete listing
    CourseMarks {
        #[arg(long)]
        course: String,
        #[arg(long)]
        program: Option<String>,
    },
    /// Roster-complete marks summary for one program semester
    SemesterSummary {
        #[arg(long)]
        program: String,
        #[arg(long)]
        semester: String,
    },
    /// Recompute and persist a student's program CGPA
    ComputeCgpa {
        #[arg(long)]
        email: String,
        #[arg(long)]
        program: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportMarks { csv } => {
            let merged = db::import_marks_csv(&pool, &csv).await?;
            println!("Merged {merged} component scores from {}.", csv.display());
        }
        Commands::UpsertCourse {
            semester_id,
            code,
            name,
            credits,
            weightage,
        } => {
            let weightage = weightage
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .context("weightage must be valid JSON")?;
            let course_id =
                db::upsert_course(&pool, semester_id, &code, &name, credits, weightage.as_ref())
                    .await?;
            println!("Course {code} stored as {course_id}.");
        }
        Commands::Report { email } => {
            let report = report::student_semester_report(&pool, &email).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CourseMarks { course, program } => match program {
            Some(program) => {
                let entries = report::course_marks_roster(&pool, &course, &program).await?;
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            None => {
                let entries = report::course_marks_listing(&pool, &course).await?;
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
        },
        Commands::SemesterSummary { program, semester } => {
            let summary = report::semester_summary(&pool, &program, &semester).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::ComputeCgpa { email, program } => {
            let snapshot = cgpa::recompute_program_grade(&pool, &email, &program).await?;
            println!(
                "CGPA {:.2} for {email} in {program} ({:.1}/{:.1} grade points, {} graded semesters)",
                snapshot.cgpa,
                snapshot.grade_points,
                snapshot.max_grade_points,
                snapshot.semester_grades.len()
            );
        }
    }

    Ok(())
}
