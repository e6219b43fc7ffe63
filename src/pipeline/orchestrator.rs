//! Pipeline driver: acquire demographics, load inputs, clean, build features.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::apis::worldometers::WorldometersCrawler;
use crate::app::ports::{Dataset, EventSink, HttpClientPort, PipelineEvent};
use crate::config::{OutputPaths, PipelineConfig};
use crate::constants::{COUNTRY, DEMOGRAPHICS_AFTER_SORT_CSV, DEMOGRAPHICS_BEFORE_SORT_CSV, DEMOGRAPHICS_RAW_CSV};
use crate::error::Result;
use crate::pipeline::ingestion::{load_demographics, load_gdp, load_population};
use crate::pipeline::processing::clean::{clean_demographics, clean_gdp, clean_population, CleanReport};
use crate::pipeline::processing::features::{build_and_persist, FeatureSet};
use crate::pipeline::storage::reports::ReportWriter;
use crate::types::{GdpRow, PopulationRow, RawTable};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub gdp_csv: PathBuf,
    pub pop_csv: PathBuf,
    /// Scrape even when a cached demographics table exists.
    pub force_crawl: bool,
}

impl RunOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            gdp_csv: config.gdp_path(),
            pop_csv: config.pop_path(),
            force_crawl: false,
        }
    }
}

/// Audit record written to `run_summary.json` after a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub demographics: CleanReport,
    pub gdp: CleanReport,
    pub population: CleanReport,
    pub joined_countries: usize,
    pub lost_countries: usize,
    pub matrix_shape: (usize, usize),
    pub matrix_sha256: String,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub features: FeatureSet,
    pub summary: RunSummary,
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    paths: OutputPaths,
    sink: &'a dyn EventSink,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, sink: &'a dyn EventSink) -> Self {
        Self {
            config,
            paths: config.output_paths(),
            sink,
        }
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    fn reports(&self) -> Result<ReportWriter<'_>> {
        self.paths.ensure_dir()?;
        Ok(ReportWriter::new(&self.paths, self.sink))
    }

    /// Scrapes the demographics pages and saves the raw table with previews.
    pub fn crawl_demographics<H: HttpClientPort>(&self, http: H) -> Result<RawTable> {
        let out = self.reports()?;
        let crawler = WorldometersCrawler::new(http, self.config.base_url.clone());
        let table = crawler.crawl(self.sink)?;

        out.write_table(DEMOGRAPHICS_RAW_CSV, &table)?;
        out.write_previews(
            &table,
            self.config.demographics_preview_rows,
            COUNTRY,
            DEMOGRAPHICS_BEFORE_SORT_CSV,
            DEMOGRAPHICS_AFTER_SORT_CSV,
        )?;
        Ok(table)
    }

    /// Reloads the cached raw demographics table.
    pub fn reload_demographics(&self) -> Result<RawTable> {
        let out = self.reports()?;
        load_demographics(&self.paths.demographics_raw(), &out)
    }

    /// Scrapes when forced or when no cached table exists, otherwise reloads.
    pub fn demographics<H: HttpClientPort>(&self, http: H, force_crawl: bool) -> Result<RawTable> {
        if force_crawl || !self.paths.demographics_raw().exists() {
            self.crawl_demographics(http)
        } else {
            self.reload_demographics()
        }
    }

    /// Loads GDP and population, writing previews and describe tables.
    pub fn load_inputs(&self, opts: &RunOptions) -> Result<(Vec<GdpRow>, Vec<PopulationRow>)> {
        let out = self.reports()?;
        let gdp = load_gdp(&opts.gdp_csv, self.config.preview_rows, &out)?;
        let pop = load_population(&opts.pop_csv, self.config.preview_rows, &out)?;
        Ok((gdp, pop))
    }

    /// Runs every stage in order. Schema and validation failures abort
    /// before the feature matrix is written.
    #[instrument(skip_all, fields(force_crawl = opts.force_crawl))]
    pub fn run<H: HttpClientPort>(&self, opts: &RunOptions, http: H) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting pipeline");

        // 1. Crawl (or reuse the cached table)
        let demo_raw = self.demographics(http, opts.force_crawl)?;

        // 2. Load the provided files
        let (gdp_rows, pop_rows) = self.load_inputs(opts)?;

        // 3. Clean
        let out = self.reports()?;
        let demo = clean_demographics(&demo_raw, &out)?;
        let gdp = clean_gdp(&gdp_rows, &out)?;
        let pop = clean_population(&pop_rows, &out)?;

        // 4. Features
        let (features, matrix_bytes) = build_and_persist(&demo.table, &gdp.table, &pop.table, &out)?;
        info!(
            rows = features.merged.len(),
            "Table after feature engineering: {} rows, {} lost",
            features.merged.len(),
            features.lost.len()
        );

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            demographics: demo.report,
            gdp: gdp.report,
            population: pop.report,
            joined_countries: features.merged.len(),
            lost_countries: features.lost.len(),
            matrix_shape: features.matrix.shape(),
            matrix_sha256: hex::encode(Sha256::digest(&matrix_bytes)),
        };
        let summary_path = self.paths.run_summary();
        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
        self.sink.emit(PipelineEvent::ReportWritten {
            path: summary_path,
            rows: 1,
        });

        info!(%run_id, sha256 = %summary.matrix_sha256, "Pipeline completed");
        Ok(PipelineRun { features, summary })
    }

    /// Logs the columns and shape of a raw table.
    pub fn log_metadata(&self, dataset: Dataset, table: &RawTable) {
        self.sink.emit(PipelineEvent::TableLoaded {
            dataset,
            rows: table.len(),
            columns: table.headers.clone(),
        });
    }
}
