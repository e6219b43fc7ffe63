use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use country_features::app::ports::Dataset;
use country_features::config::PipelineConfig;
use country_features::constants::{FIELD_STATS_CSV, LIFE_EXPECTANCY_BOTH, POPULATION_DENSITY};
use country_features::infra::http_client::ReqwestHttp;
use country_features::infra::tracing_sink::TracingSink;
use country_features::logging;
use country_features::pipeline::stats::{table_correlation, table_field_stats, STATS_HEADERS};
use country_features::pipeline::storage::reports::ReportWriter;
use country_features::pipeline::{Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "country_features")]
#[command(about = "Country demographics, GDP and population feature pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to $PIPELINE_CONFIG or pipeline.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl (or reuse) demographics, load GDP and population, clean, and build X.npy
    Run {
        /// GDP per capita CSV (overrides the config)
        #[arg(long)]
        gdp_csv: Option<PathBuf>,
        /// Population CSV (overrides the config)
        #[arg(long)]
        pop_csv: Option<PathBuf>,
        /// Ignore the cached demographics_data.csv
        #[arg(long)]
        force_crawl: bool,
    },
    /// Scrape the demographics pages
    Crawl {
        /// Reload the previously crawled table instead of scraping
        #[arg(long)]
        reload: bool,
        /// Log the columns and shape of the table
        #[arg(long)]
        metadata: bool,
        /// Write mean, std, min, max, median and missing counts per field to stats.csv
        #[arg(long)]
        stats: bool,
        /// Log the Pearson correlation between LifeExpectancy_Both and PopulationDensity
        #[arg(long)]
        corr: bool,
    },
    /// Load the GDP and population files, writing previews and describe tables
    Load {
        #[arg(long)]
        gdp_csv: Option<PathBuf>,
        #[arg(long)]
        pop_csv: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = logging::init_logging(&config.log_dir);

    let sink = TracingSink;
    let pipeline = Pipeline::new(&config, &sink);

    match cli.command {
        Commands::Run {
            gdp_csv,
            pop_csv,
            force_crawl,
        } => {
            println!("🚀 Running full pipeline...");
            let mut opts = RunOptions::from_config(&config);
            opts.force_crawl = force_crawl;
            if let Some(p) = gdp_csv {
                opts.gdp_csv = p;
            }
            if let Some(p) = pop_csv {
                opts.pop_csv = p;
            }

            match pipeline.run(&opts, ReqwestHttp::new()?) {
                Ok(run) => {
                    let (rows, cols) = run.summary.matrix_shape;
                    println!("\n📊 Pipeline Results:");
                    println!("   Joined countries: {}", run.summary.joined_countries);
                    println!("   Lost in join: {}", run.summary.lost_countries);
                    println!("   Feature matrix: ({rows}, {cols})");
                    println!("   SHA-256: {}", run.summary.matrix_sha256);
                    println!("   Output dir: {}", pipeline.paths().dir.display());
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Crawl {
            reload,
            metadata,
            stats,
            corr,
        } => {
            let table = if reload {
                pipeline.reload_demographics()?
            } else {
                println!("🕷️  Crawling demographics from {}...", config.base_url);
                pipeline.crawl_demographics(ReqwestHttp::new()?)?
            };

            if metadata {
                pipeline.log_metadata(Dataset::Demographics, &table);
            }

            if stats {
                let field_stats = table_field_stats(&table)?;
                let out = ReportWriter::new(pipeline.paths(), &sink);
                let path = out.write_rows(FIELD_STATS_CSV, &STATS_HEADERS, &field_stats)?;
                info!("Summary statistics per field written to {}", path.display());
                for s in &field_stats {
                    info!(
                        field = %s.field,
                        mean = ?s.mean,
                        std = ?s.std,
                        min = ?s.min,
                        max = ?s.max,
                        median = ?s.median,
                        missing = s.missing,
                        "Field statistics"
                    );
                }
            }

            if corr {
                match table_correlation(&table, LIFE_EXPECTANCY_BOTH, POPULATION_DENSITY)? {
                    Some(r) => info!(
                        "Pearson correlation between {} and {}: {:.4}",
                        LIFE_EXPECTANCY_BOTH, POPULATION_DENSITY, r
                    ),
                    None => warn!("Could not compute correlation: not enough paired values"),
                }
            }
        }
        Commands::Load { gdp_csv, pop_csv } => {
            let mut opts = RunOptions::from_config(&config);
            if let Some(p) = gdp_csv {
                opts.gdp_csv = p;
            }
            if let Some(p) = pop_csv {
                opts.pop_csv = p;
            }
            let (gdp, pop) = pipeline.load_inputs(&opts)?;
            info!("GDP rows: {}, population rows: {}", gdp.len(), pop.len());
        }
    }

    Ok(())
}
