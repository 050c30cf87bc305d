mod cache;
mod csv;
mod db;
mod dom;
mod error;
mod export;
mod extract;
mod import;
mod lens;
mod normalize;
mod overrides;
mod pipeline;
mod query;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::lens::Maker;
use crate::query::LensQuery;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "lensdb", about = "Mirrorless lens spec scraper (Micro Four Thirds / Leica L)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape makers, replace the lens table and export it
    Run {
        /// Makers to scrape (default: all, in fixed order)
        #[arg(short, long = "maker", value_enum)]
        makers: Vec<Maker>,
        /// Ignore cached detail pages
        #[arg(long)]
        refresh: bool,
        /// Also dump each maker's raw spec tables as CSV here
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },
    /// Re-export the stored lenses
    Export {
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Stored lenses table
    List {
        /// Filter such as IsPrime or MaxWeight=300; repeat to combine
        #[arg(short = 'w', long = "where")]
        queries: Vec<LensQuery>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Lens counts per maker and mount
    Stats,
    /// Drop every cached page
    ClearCache,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Run { makers, refresh, raw_dir } => {
            let makers = if makers.is_empty() { Maker::ALL.to_vec() } else { makers };
            let summary = pipeline::run(&conn, &settings, &makers, refresh, raw_dir.as_deref())?;
            for (maker, count) in &summary.per_maker {
                println!("{:<10} {:>4}", maker.label(), count);
            }
            if summary.curated > 0 {
                println!("{:<10} {:>4}", "curated", summary.curated);
            }
            println!(
                "Stored {} lenses ({} pages fetched, {} from cache).",
                summary.stored, summary.fetched, summary.cache_hits
            );
            println!(
                "Exported to {} and {}",
                settings.json_path.display(),
                settings.csv_path.display()
            );
            Ok(())
        }
        Commands::Export { json, csv } => {
            let json = json.unwrap_or_else(|| settings.json_path.clone());
            let csv = csv.unwrap_or_else(|| settings.csv_path.clone());
            let count = pipeline::export_store(&conn, &json, &csv)?;
            println!("Exported {} lenses to {} and {}", count, json.display(), csv.display());
            Ok(())
        }
        Commands::List { queries, limit } => {
            let lenses = db::fetch_lenses(&conn)?;
            let found = query::apply(&lenses, &queries);
            if found.is_empty() {
                println!("No lenses found.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<9} | {:<40} | {:>9} | {:>9} | {:>6} | {:>7} | {:<4}",
                "id", "Maker", "Name", "Focal", "F", "Weight", "Price", "Mount"
            );
            println!("{}", "-".repeat(110));
            for l in found.iter().take(limit) {
                let focal = if l.is_prime() {
                    format!("{}mm", l.wide_focal_length)
                } else {
                    format!("{}-{}mm", l.wide_focal_length, l.telephoto_focal_length)
                };
                let f = if l.wide_f_number == l.telephoto_f_number {
                    format!("F{}", l.wide_f_number)
                } else {
                    format!("F{}-{}", l.wide_f_number, l.telephoto_f_number)
                };
                let price = if l.price < 0 { "-".to_string() } else { l.price.to_string() };
                let mount = match l.mount {
                    lens::Mount::MicroFourThirds => "MFT",
                    lens::Mount::LeicaL => "L",
                };
                println!(
                    "{:>4} | {:<9} | {:<40} | {:>9} | {:>9} | {:>5}g | {:>7} | {:<4}",
                    l.id, l.maker, truncate(&l.name, 40), focal, f, l.weight, price, mount
                );
            }
            println!("\n{} of {} lenses match", found.len(), lenses.len());
            Ok(())
        }
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            println!("Lenses:       {}", s.lenses);
            println!("Cached pages: {}", s.cached_pages);
            for (maker, mount, count) in &s.per_maker {
                println!("  {:<10} {:<12} {:>4}", maker, mount, count);
            }
            Ok(())
        }
        Commands::ClearCache => {
            let removed = db::clear_cache(&conn)?;
            println!("Removed {} cached pages.", removed);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
