use tracing::{debug, info, warn};

use crate::app::ports::{EventSink, PipelineEvent};

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::TableLoaded { dataset, rows, columns } => {
                info!(%dataset, rows, cols = columns.len(), "{} columns: {:?}", dataset, columns);
            }
            PipelineEvent::CoercionFailures { dataset, column, missing, invalid } => {
                info!(%dataset, %column, missing, invalid, "Non-numeric values in {}: {}", column, missing);
            }
            PipelineEvent::NamesCorrected { dataset, count } => {
                info!(%dataset, count, "Country name mismatches corrected: {}", count);
            }
            PipelineEvent::RowsDropped { dataset, reason, count } => {
                info!(%dataset, count, "Dropped {} rows ({})", count, reason);
            }
            PipelineEvent::OutliersFlagged { dataset, column, count } => {
                info!(%dataset, column, count, "Tukey outliers in {}: {} (not dropped)", column, count);
            }
            PipelineEvent::Cleaned { dataset, kept } => {
                info!(%dataset, kept, "Cleaned {} dataset: {} countries kept", dataset, kept);
            }
            PipelineEvent::JoinCompleted { retained, lost } => {
                info!(retained, lost, "Inner join retained {} countries, lost {}", retained, lost);
            }
            PipelineEvent::ReportWritten { path, rows } => {
                debug!(path = %path.display(), rows, "Saved report");
            }
            PipelineEvent::MatrixWritten { path, rows, cols } => {
                info!(path = %path.display(), rows, cols, "Saved feature matrix shape=({}, {})", rows, cols);
            }
            PipelineEvent::CountryLinksFound { count } => {
                info!(count, "Found {} country pages", count);
            }
            PipelineEvent::CountryFetchFailed { country, error } => {
                warn!(%country, %error, "Failed {} : {}", country, error);
            }
        }
    }
}
