//! Metrics JSON emit and parse.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::{MetricsResult, MetricsSnapshot};

/// Write the metrics document to `path`, pretty-printed.
pub fn write_metrics_json(path: &Path, snapshot: &MetricsSnapshot) -> MetricsResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), snapshot)?;
    Ok(())
}

/// Parse a metrics document produced by [`write_metrics_json`].
pub fn read_metrics_json(path: &Path) -> MetricsResult<MetricsSnapshot> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
