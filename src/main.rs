use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{error, info};

use exam_schedule::config::Settings;
use exam_schedule::db::{self, SqliteStore};
use exam_schedule::error::ImportError;
use exam_schedule::extract::extractor_for;
use exam_schedule::materialize::{materialize, ImportSummary};
use exam_schedule::model::format_crns;
use exam_schedule::parser::{self, detect, normalize, ParsedSchedule};

#[derive(Parser)]
#[command(name = "exam_schedule", about = "Registrar final-exam schedule parser")]
struct Cli {
    /// SQLite database path (overrides exams.toml and EXAMS_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse schedule documents and store their exams under a term
    Import {
        /// Term code, e.g. 202508 (default: EXAMS_TERM)
        #[arg(short, long)]
        term: Option<String>,
        /// Text or PDF files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Parse one document and print its entries without touching the database
    Parse { file: PathBuf },
    /// Print the layout detected for one document
    Detect { file: PathBuf },
    /// Link orphan exams to courses imported since
    Relink {
        #[arg(short, long)]
        term: Option<String>,
    },
    /// Show database statistics
    Stats,
}

fn main() -> Result<()> {
    let settings = Settings::load().context("loading settings")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_filter.as_str().into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(|| settings.db_path.clone());

    let result = match cli.command {
        Commands::Import { term, files } => {
            let term = term_or_default(term, &settings)?;
            let conn = open_db(&db_path)?;
            println!("Parsing {} documents...", files.len());
            let parsed = parse_documents(&files);
            let totals = import_documents(&conn, &term, parsed)?;
            totals.print();
            if totals.failed > 0 {
                bail!("{} of {} documents failed", totals.failed, files.len());
            }
            Ok(())
        }
        Commands::Parse { file } => {
            let text = read_text(&file).with_context(|| format!("reading {}", file.display()))?;
            let parsed = parser::parse_schedule(&text);
            print_entries(&parsed);
            Ok(())
        }
        Commands::Detect { file } => {
            let text = read_text(&file).with_context(|| format!("reading {}", file.display()))?;
            println!("{}", detect::detect_layout(&normalize::normalize(&text)));
            Ok(())
        }
        Commands::Relink { term } => {
            let term = term_or_default(term, &settings)?;
            let conn = open_db(&db_path)?;
            let linked = db::relink_orphans(&conn, &term)?;
            println!("Linked {} orphan exams in term {}.", linked, term);
            Ok(())
        }
        Commands::Stats => {
            let conn = open_db(&db_path)?;
            let s = db::get_stats(&conn)?;
            println!("Terms:   {}", s.terms);
            println!("Rooms:   {}", s.rooms);
            println!("Courses: {}", s.courses);
            println!("Exams:   {}", s.exams);
            println!("Linked:  {}", s.linked);
            println!("Orphan:  {}", s.orphan);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn term_or_default(term: Option<String>, settings: &Settings) -> Result<String> {
    match term.or_else(|| settings.term.clone()) {
        Some(t) => Ok(t),
        None => bail!("no term given: pass --term or set EXAMS_TERM"),
    }
}

fn open_db(path: &Path) -> Result<Connection> {
    let conn = db::connect(path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

fn read_text(path: &Path) -> Result<String, ImportError> {
    let name = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| ImportError::Extraction {
        source_name: name.clone(),
        message: e.to_string(),
    })?;
    extractor_for(path).extract(&bytes, &name)
}

// ── Import ──

struct ImportTotals {
    documents: usize,
    failed: usize,
    entries: usize,
    created: usize,
    updated: usize,
    orphan: usize,
    errors: usize,
}

impl ImportTotals {
    fn add(&mut self, s: &ImportSummary) {
        self.documents += 1;
        self.entries += s.total;
        self.created += s.created;
        self.updated += s.updated;
        self.orphan += s.orphan;
        self.errors += s.errors.len();
    }

    fn print(&self) {
        println!(
            "Imported {} documents: {} entries ({} created, {} updated, {} orphan, {} errors).",
            self.documents, self.entries, self.created, self.updated, self.orphan, self.errors,
        );
        if self.failed > 0 {
            println!("{} documents could not be read.", self.failed);
        }
    }
}

/// Extract and parse every file in parallel; parsing touches no shared state.
fn parse_documents(files: &[PathBuf]) -> Vec<(&Path, Result<ParsedSchedule, ImportError>)> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let results = files
        .par_iter()
        .map(|path| {
            let parsed = read_text(path).map(|text| parser::parse_schedule(&text));
            pb.inc(1);
            (path.as_path(), parsed)
        })
        .collect();

    pb.finish_and_clear();
    results
}

/// Materialize parsed documents one at a time, one transaction each.
fn import_documents(
    conn: &Connection,
    term: &str,
    parsed: Vec<(&Path, Result<ParsedSchedule, ImportError>)>,
) -> Result<ImportTotals> {
    let mut totals = ImportTotals {
        documents: 0,
        failed: 0,
        entries: 0,
        created: 0,
        updated: 0,
        orphan: 0,
        errors: 0,
    };

    for (path, result) in parsed {
        let schedule = match result {
            Ok(schedule) => schedule,
            Err(e) => {
                error!(file = %path.display(), error = %e, "skipping document");
                totals.failed += 1;
                continue;
            }
        };

        let tx = conn.unchecked_transaction()?;
        let summary = materialize(&mut SqliteStore::new(&tx), term, &schedule)
            .with_context(|| format!("importing {}", path.display()))?;
        tx.commit()?;

        info!(file = %path.display(), entries = summary.total, "document imported");
        let report = serde_json::json!({
            "file": path.display().to_string(),
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        totals.add(&summary);
    }

    Ok(totals)
}

// ── Dry run ──

fn print_entries(parsed: &ParsedSchedule) {
    println!(
        "Layout: {} (parsed as {}){}{}",
        parsed.detected,
        parsed.chosen,
        if parsed.ambiguous { " [ambiguous]" } else { "" },
        if parsed.needs_review { " [needs review]" } else { "" },
    );
    if parsed.entries.is_empty() {
        println!("No entries parsed.");
        return;
    }

    println!(
        "{:>5} | {:<10} | {:<19} | {:<28} | {}",
        "CRN", "Date", "Time", "Location", "Combined"
    );
    println!("{}", "-".repeat(90));

    for e in &parsed.entries {
        let location = e.location.as_ref().map(|l| l.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:>5} | {:<10} | {:<19} | {:<28} | {}",
            e.crn,
            e.date.to_string(),
            e.time.to_string(),
            truncate(&location, 28),
            format_crns(&e.combined),
        );
    }

    println!("\n{} entries", parsed.entries.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
