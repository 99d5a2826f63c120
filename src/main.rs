use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::analysis::PerformanceAnalyzer;
use crate::db::PgStore;
use crate::models::{PerformanceReport, Population};

mod aggregate;
mod analysis;
mod collector;
mod db;
mod error;
mod extract;
mod models;
mod recommend;
mod report;
mod store;

#[derive(Parser)]
#[command(name = "performance-analysis")]
#[command(about = "Tag-driven performance analysis for LMS students, classes and subjects")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("population")
        .args(["student", "class", "subject"])
        .required(true)
        .multiple(false)
))]
struct Scope {
    #[arg(long)]
    student: Option<i64>,
    #[arg(long)]
    class: Option<i64>,
    #[arg(long)]
    subject: Option<i64>,
}

impl Scope {
    fn population(&self) -> anyhow::Result<Population> {
        match (self.student, self.class, self.subject) {
            (Some(id), None, None) => Ok(Population::Student(id)),
            (None, Some(id), None) => Ok(Population::Class(id)),
            (None, None, Some(id)) => Ok(Population::Subject(id)),
            _ => anyhow::bail!("exactly one of --student, --class or --subject is required"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

impl Format {
    fn default_out(self) -> PathBuf {
        match self {
            Format::Markdown => PathBuf::from("performance-report.md"),
            Format::Json => PathBuf::from("performance-report.json"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo course with graded attempts
    Seed,
    /// Register study materials from a CSV file
    ImportMaterials {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print per-tag performance, weakest first
    Summary {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a full performance report
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, value_enum, default_value_t = Format::Markdown)]
        format: Format,
        /// Output path; defaults to performance-report.md or .json by format
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

async fn generate(pool: PgPool, population: Population) -> anyhow::Result<PerformanceReport> {
    let analyzer = PerformanceAnalyzer::new(PgStore::new(pool));
    match analyzer.generate_report(population).await {
        Ok(report) => Ok(report),
        Err(err) if err.is_not_found() => {
            anyhow::bail!("{err}; check the id given to --student, --class or --subject")
        }
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "performance_analysis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the LMS Postgres instance")?;
    let max_connections = match std::env::var("PERFORMANCE_DB_MAX_CONNECTIONS") {
        Ok(value) => value
            .parse()
            .context("PERFORMANCE_DB_MAX_CONNECTIONS must be a positive integer")?,
        Err(_) => 5,
    };

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            if db::seed(&pool).await? {
                println!("Seed data inserted.");
            } else {
                println!("Seed data already present.");
            }
        }
        Commands::ImportMaterials { csv } => {
            let inserted = db::import_materials_csv(&pool, &csv).await?;
            println!("Inserted {inserted} study materials from {}.", csv.display());
        }
        Commands::Summary { scope, limit } => {
            let population = scope.population()?;
            let report = generate(pool, population).await?;

            if report.overall.is_empty() {
                println!("No graded attempts for {population}.");
                return Ok(());
            }

            println!("Tag performance for {population}, weakest first:");
            for performance in report::weakest_first(&report.overall).into_iter().take(limit) {
                println!(
                    "- {} mean {:.2} across {} assessments",
                    performance.tag, performance.mean_score, performance.total_assessments
                );
            }
        }
        Commands::Report { scope, format, out } => {
            let population = scope.population()?;
            let report = generate(pool, population).await?;

            let rendered = match format {
                Format::Markdown => report::render_markdown(population, &report),
                Format::Json => report::render_json(&report)?,
            };
            let out = out.unwrap_or_else(|| format.default_out());
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_args(args: &[&str]) -> (Format, Option<PathBuf>) {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Report { format, out, .. } => (format, out),
            _ => panic!("expected the report command"),
        }
    }

    #[test]
    fn json_report_defaults_to_json_file() {
        let (format, out) = report_args(&[
            "performance-analysis",
            "report",
            "--student",
            "1",
            "--format",
            "json",
        ]);
        assert_eq!(format, Format::Json);
        assert_eq!(out, None);
        assert_eq!(format.default_out(), PathBuf::from("performance-report.json"));
    }

    #[test]
    fn markdown_is_the_default_format() {
        let (format, _) = report_args(&["performance-analysis", "report", "--class", "2"]);
        assert_eq!(format, Format::Markdown);
        assert_eq!(format.default_out(), PathBuf::from("performance-report.md"));
    }

    #[test]
    fn explicit_out_path_is_kept() {
        let (_, out) = report_args(&[
            "performance-analysis",
            "report",
            "--subject",
            "3",
            "--format",
            "json",
            "--out",
            "weekly.json",
        ]);
        assert_eq!(out, Some(PathBuf::from("weekly.json")));
    }

    #[test]
    fn scope_flags_are_mutually_exclusive() {
        let both = ["performance-analysis", "summary", "--student", "1", "--class", "2"];
        assert!(Cli::try_parse_from(both).is_err());
        assert!(Cli::try_parse_from(["performance-analysis", "summary"]).is_err());
    }
}
