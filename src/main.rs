use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod average;
mod breakdown;
mod config;
mod db;
mod engine;
mod error;
mod logging;
mod models;
mod normalize;
mod progression;
mod ranking;
mod report;
mod risk;
mod stats;

use config::{AlertThresholds, DbConfig};
use engine::{GradeQuery, PerformanceEngine};
use models::Trimester;

#[derive(Parser)]
#[command(name = "grade-performance")]
#[command(
    about = "Academic performance calculations over school grade records",
    long_about = None
)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[arg(long, env = "DB_MAX_CONNECTIONS", global = true, default_value_t = 5)]
    max_connections: u32,
    #[arg(
        long,
        env = "ALERT_DANGER_BELOW",
        global = true,
        default_value_t = 10.0
    )]
    danger_below: f64,
    #[arg(
        long,
        env = "ALERT_WARNING_BELOW",
        global = true,
        default_value_t = 12.0
    )]
    warning_below: f64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ClassPeriod {
    #[arg(long)]
    class: Uuid,
    #[arg(long)]
    trimester: Trimester,
    #[arg(long)]
    year: String,
    /// Print JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample class with grades
    Seed,
    /// Import grades from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// General and subject averages for one student
    Average {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        trimester: Option<Trimester>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        subject: Option<Uuid>,
        #[arg(long)]
        json: bool,
    },
    /// Rank a class by general average
    Ranking {
        #[command(flatten)]
        period: ClassPeriod,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Descriptive statistics for a class
    Stats {
        #[command(flatten)]
        period: ClassPeriod,
    },
    /// Students below the risk thresholds
    Alerts {
        #[command(flatten)]
        period: ClassPeriod,
    },
    /// Compare a student's average between two trimesters
    Progression {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        from: Trimester,
        #[arg(long)]
        to: Trimester,
        #[arg(long)]
        year: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a report card
    ReportCard {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        trimester: Trimester,
        #[arg(long)]
        year: String,
        /// Write the markdown report card to this file
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Statistics of several classes side by side
    Compare {
        #[arg(long = "class", required = true)]
        classes: Vec<Uuid>,
        #[arg(long)]
        trimester: Trimester,
        #[arg(long)]
        year: String,
        #[arg(long)]
        json: bool,
    },
    /// Grade bands and evaluation-type averages for one student
    Distribution {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        trimester: Option<Trimester>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let db_config = DbConfig::new(cli.database_url, cli.max_connections)?;
    let thresholds = AlertThresholds::new(cli.danger_below, cli.warning_below)?;

    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&db_config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let engine = PerformanceEngine::new(db::PgGradeSource::new(pool.clone()), thresholds);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let class_id = db::seed(&pool).await?;
            println!("Seed data inserted for class {class_id}.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} grades from {}.", csv.display());
        }
        Commands::Average {
            student,
            trimester,
            year,
            subject,
            json,
        } => {
            let query = GradeQuery {
                student_id: student,
                trimester,
                academic_year: year,
                subject_id: subject,
            };
            let performance = engine.compute_student_average(&query).await?;
            if json {
                return print_json(&performance);
            }

            if performance.subjects.is_empty() {
                println!("No grades found for this student and period.");
                return Ok(());
            }
            for subject in &performance.subjects {
                println!(
                    "- {} ({}) coefficient {}: {:.2}/20 across {} grades",
                    subject.name,
                    subject.code,
                    subject.coefficient,
                    subject.average,
                    subject.grades.len()
                );
            }
            println!("General average: {:.2}/20", performance.general_average);
            if performance.exclusions.total() > 0 {
                println!("Excluded grades: {}", performance.exclusions.total());
            }
        }
        Commands::Ranking { period, limit } => {
            let ranking = match limit {
                Some(limit) => {
                    engine
                        .top_students(period.class, period.trimester, &period.year, limit)
                        .await?
                }
                None => {
                    engine
                        .compute_class_ranking(period.class, period.trimester, &period.year)
                        .await?
                }
            };
            if period.json {
                return print_json(&ranking);
            }

            if ranking.is_empty() {
                println!("No students found in this class.");
                return Ok(());
            }
            for entry in &ranking {
                println!(
                    "{:>3}. {} {} {:.2}/20",
                    entry.rank, entry.first_name, entry.last_name, entry.general_average
                );
            }
        }
        Commands::Stats { period } => {
            let stats = engine
                .compute_class_statistics(period.class, period.trimester, &period.year)
                .await?;
            if period.json {
                return print_json(&stats);
            }

            println!("Average: {:.2}", stats.average);
            println!("Median: {:.2}", stats.median);
            println!("Min: {:.2}  Max: {:.2}", stats.min, stats.max);
            println!("Standard deviation: {:.2}", stats.standard_deviation);
            println!("Pass rate: {:.2}%", stats.pass_rate);
        }
        Commands::Alerts { period } => {
            let alerts = engine
                .detect_alerts(period.class, period.trimester, &period.year)
                .await?;
            if period.json {
                return print_json(&alerts);
            }

            if alerts.is_empty() {
                println!("No students at risk for this period.");
                return Ok(());
            }
            for alert in &alerts {
                let name = format!("{} {}", alert.first_name, alert.last_name);
                println!(
                    "- [{:?}/{:?}] {name}: {}",
                    alert.severity, alert.priority, alert.message
                );
            }
        }
        Commands::Progression {
            student,
            from,
            to,
            year,
            json,
        } => {
            let progression = engine.compute_progression(student, from, to, &year).await?;
            if json {
                return print_json(&progression);
            }

            println!(
                "{from} {:.2} -> {to} {:.2}: {:+.2} ({:?})",
                progression.previous_average,
                progression.current_average,
                progression.progression,
                progression.trend
            );
        }
        Commands::ReportCard {
            student,
            trimester,
            year,
            out,
            json,
        } => {
            let card = engine
                .generate_report_card(student, trimester, &year)
                .await?;
            if json {
                return print_json(&card);
            }

            let student_ref = engine
                .student(student)
                .await?
                .with_context(|| format!("student {student} not found"))?;
            let markdown = report::render_markdown(&card, &student_ref);
            match out {
                Some(path) => {
                    std::fs::write(&path, markdown)?;
                    println!("Report card written to {}.", path.display());
                }
                None => print!("{markdown}"),
            }
        }
        Commands::Compare {
            classes,
            trimester,
            year,
            json,
        } => {
            let comparison = engine.compare_classes(&classes, trimester, &year).await?;
            if json {
                return print_json(&comparison);
            }

            for entry in &comparison {
                println!(
                    "- {}: average {:.2}, median {:.2}, pass rate {:.2}%",
                    entry.class_id, entry.stats.average, entry.stats.median, entry.stats.pass_rate
                );
            }
        }
        Commands::Distribution {
            student,
            trimester,
            year,
            json,
        } => {
            let query = GradeQuery {
                student_id: student,
                trimester,
                academic_year: year,
                subject_id: None,
            };
            let (bands, by_type) = engine.grade_breakdown(&query).await?;
            if json {
                return print_json(&serde_json::json!({
                    "distribution": bands,
                    "by_evaluation_type": by_type,
                }));
            }

            println!("Grade distribution:");
            for band in &bands {
                println!("- {}: {}", band.label, band.count);
            }
            println!("By evaluation type:");
            for summary in &by_type {
                println!(
                    "- {}: {} grades, average {:.2}",
                    summary.evaluation_type, summary.count, summary.average
                );
            }
        }
    }

    Ok(())
}
