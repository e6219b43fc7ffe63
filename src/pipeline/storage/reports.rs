use serde::Serialize;
use std::path::PathBuf;

use crate::app::ports::{EventSink, PipelineEvent};
use crate::config::OutputPaths;
use crate::error::Result;
use crate::types::RawTable;

/// Writes side-reports under the output directory and forwards stage events
/// to the injected sink.
pub struct ReportWriter<'a> {
    paths: &'a OutputPaths,
    sink: &'a dyn EventSink,
}

impl<'a> ReportWriter<'a> {
    pub fn new(paths: &'a OutputPaths, sink: &'a dyn EventSink) -> Self {
        Self { paths, sink }
    }

    pub fn paths(&self) -> &OutputPaths {
        self.paths
    }

    pub fn emit(&self, event: PipelineEvent) {
        self.sink.emit(event);
    }

    /// Serializes `rows` under an explicit header, so empty reports still
    /// carry their column names.
    pub fn write_rows<T: Serialize>(&self, name: &str, headers: &[&str], rows: &[T]) -> Result<PathBuf> {
        let path = self.paths.file(name);
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        wtr.write_record(headers)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        self.announce(path, rows.len())
    }

    pub fn write_table(&self, name: &str, table: &RawTable) -> Result<PathBuf> {
        let path = self.paths.file(name);
        table.write_csv(&path)?;
        self.announce(path, table.len())
    }

    /// First `n` rows before and after sorting by `sort_by`.
    pub fn write_previews(
        &self,
        table: &RawTable,
        n: usize,
        sort_by: &str,
        before: &str,
        after: &str,
    ) -> Result<()> {
        self.write_table(before, &table.head(n, None))?;
        self.write_table(after, &table.head(n, Some(sort_by)))?;
        Ok(())
    }

    fn announce(&self, path: PathBuf, rows: usize) -> Result<PathBuf> {
        self.emit(PipelineEvent::ReportWritten {
            path: path.clone(),
            rows,
        });
        Ok(path)
    }
}
