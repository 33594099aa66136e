//! Reporting for run metrics: one structured log event, plus an optional
//! CSV history.

use anyhow::Result;
use tracing::{debug, info};

use crate::metrics::ProcessingMetrics;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs the metrics as a single JSON payload so degraded runs are visible
/// in the log stream without failing the process.
pub fn log_metrics(metrics: &ProcessingMetrics, published: usize) -> Result<()> {
    info!(
        published,
        degraded = metrics.degraded(),
        reuse_pct = metrics.reuse_pct(),
        metrics = %serde_json::to_string(metrics)?,
        "Translation metrics"
    );
    Ok(())
}

/// Appends a [`ProcessingMetrics`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, metrics: &ProcessingMetrics) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending metrics CSV record");

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(metrics)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_log_metrics_does_not_panic() {
        log_metrics(&ProcessingMetrics::new("mock"), 1).unwrap();
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let path = temp_path("gtfs_rt_translator_test_header.csv");
        let _ = fs::remove_file(&path);

        let metrics = ProcessingMetrics::new("mock");
        append_record(&path, &metrics).unwrap();
        append_record(&path, &metrics).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("units_reused")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }
}
