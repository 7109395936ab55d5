mod browser;
mod db;
mod error;
mod extract;
mod normalize;
mod pipeline;
mod record;
mod service;
mod settings;
mod sink;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use crate::browser::{Browser, HttpNavigator};
use crate::error::ServiceError;
use crate::extract::PageExtractor;
use crate::pipeline::Pipeline;
use crate::record::CompanyRecord;
use crate::service::CompanyService;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "ebitda_tracker", about = "Spanish company EBITDA scraper and store")]
struct Cli {
    /// SQLite database file (overrides EBITDA_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and the companies table
    Init,
    /// Scrape the ranking and write qualifying companies to CSV
    Scrape {
        /// Ranking page to start from
        #[arg(long)]
        url: Option<String>,
        /// CSV destination
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load a scraped CSV into the database (existing CIFs are kept)
    Load {
        /// CSV to read (default: the scrape output path)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Scrape, write the CSV, then load it
    Run {
        #[arg(long)]
        url: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query and edit stored companies
    Companies {
        #[command(subcommand)]
        action: CompanyCommand,
    },
    /// Show totals for stored companies
    Stats,
}

#[derive(Subcommand)]
enum CompanyCommand {
    /// List every company
    List,
    /// Show one company by CIF
    Get { cif: String },
    /// Add a company
    Create {
        #[arg(long)]
        cif: String,
        #[command(flatten)]
        fields: CompanyFields,
    },
    /// Replace a company's fields
    Update {
        cif: String,
        #[command(flatten)]
        fields: CompanyFields,
    },
    /// Remove a company
    Delete { cif: String },
}

#[derive(Args)]
struct CompanyFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    ebitda_source: Option<String>,
    #[arg(long)]
    cif_source: Option<String>,
    #[arg(long)]
    ebitda: Option<f64>,
}

impl CompanyFields {
    fn into_record(self, cif: String) -> CompanyRecord {
        CompanyRecord {
            company_name: self.name,
            ebitda_source: self.ebitda_source,
            cif_source: self.cif_source,
            cif,
            ebitda: self.ebitda,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(path) = cli.database {
        settings.database_path = path;
    }

    let code = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.database_path)?;
            db::init_schema(&conn)?;
            println!("Database ready at {}", settings.database_path.display());
            ExitCode::SUCCESS
        }
        Commands::Scrape { url, output } => {
            let output = output.unwrap_or_else(|| settings.output_path.clone());
            scrape(&settings, url.as_deref(), &output).await?;
            ExitCode::SUCCESS
        }
        Commands::Load { input } => {
            let input = input.unwrap_or_else(|| settings.output_path.clone());
            load(&settings, &input)?;
            ExitCode::SUCCESS
        }
        Commands::Run { url, output } => {
            let output = output.unwrap_or_else(|| settings.output_path.clone());
            scrape(&settings, url.as_deref(), &output).await?;
            load(&settings, &output)?;
            ExitCode::SUCCESS
        }
        Commands::Companies { action } => {
            let conn = db::connect(&settings.database_path)?;
            db::init_schema(&conn)?;
            match companies(&conn, action) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error {}: {}", e.status(), e);
                    ExitCode::from(if e.status() == 404 { 4 } else { 2 })
                }
            }
        }
        Commands::Stats => {
            let conn = db::connect(&settings.database_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Companies:    {}", s.companies);
            println!("Total EBITDA: {:.2}", s.total_ebitda);
            match s.mean_ebitda {
                Some(m) => println!("Mean EBITDA:  {:.2}", m),
                None => println!("Mean EBITDA:  -"),
            }
            ExitCode::SUCCESS
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(code)
}

async fn scrape(settings: &Settings, url: Option<&str>, output: &Path) -> anyhow::Result<()> {
    let listing_url = url.unwrap_or(&settings.listing_url);
    let browser = Browser::from_settings(HttpNavigator::new(settings)?, settings);
    let pipeline = Pipeline::new(PageExtractor::new(browser, &settings.cif_lookup_base)?);

    println!("Scraping ranking at {}...", listing_url);
    let out = pipeline.run(listing_url).await;
    println!(
        "Scraped {} companies ({} with EBITDA, {} with CIF); {} above threshold.",
        out.summary.listed, out.summary.with_ebitda, out.summary.with_cif, out.summary.kept
    );

    sink::write(&out.records, output)?;
    println!("Data saved to {}.", output.display());
    Ok(())
}

fn load(settings: &Settings, input: &Path) -> anyhow::Result<()> {
    let records = sink::read(input)?;
    let conn = db::connect(&settings.database_path)?;
    db::init_schema(&conn)?;
    let inserted = db::load_records(&conn, &records)?;
    println!(
        "Inserted {} new companies ({} rows in {}).",
        inserted,
        records.len(),
        input.display()
    );
    Ok(())
}

fn companies(conn: &rusqlite::Connection, action: CompanyCommand) -> Result<(), ServiceError> {
    let svc = CompanyService::new(conn);
    match action {
        CompanyCommand::List => print_json(&svc.list()?),
        CompanyCommand::Get { cif } => print_json(&svc.get(&cif)?),
        CompanyCommand::Create { cif, fields } => print_json(&svc.create(fields.into_record(cif))?),
        CompanyCommand::Update { cif, fields } => {
            let company = fields.into_record(cif.clone());
            print_json(&svc.update(&cif, company)?)
        }
        CompanyCommand::Delete { cif } => {
            svc.delete(&cif)?;
            println!("Company with CIF {} deleted successfully", cif);
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Cannot render JSON: {}", e),
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
