//! Trace CSV emit and parse.
//!
//! Format: header `tick,agent_id,x,y,active_agents,messages_sent`, then one
//! row per (tick, agent) in recording order.  [`TraceCsvWriter`] streams
//! rows tick by tick; [`write_trace_csv`] is the one-shot convenience over
//! a finished trace.

use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use sg_core::AgentId;

use crate::{MetricsError, MetricsResult, TickTrace, TraceRow};

const HEADER: [&str; 6] = ["tick", "agent_id", "x", "y", "active_agents", "messages_sent"];

/// Incremental trace writer: appends each tick's rows as they arrive
/// instead of buffering the whole run.
pub struct TraceCsvWriter {
    writer: csv::Writer<File>,
    finished: bool,
}

impl TraceCsvWriter {
    /// Create (or truncate) `path` and write the header row.
    pub fn create(path: &Path) -> MetricsResult<Self> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(HEADER)?;
        Ok(TraceCsvWriter { writer, finished: false })
    }

    /// Append one tick's rows, one per agent.
    pub fn append(&mut self, trace: &TickTrace) -> MetricsResult<()> {
        for row in trace.rows() {
            self.writer.write_record(&[
                row.tick.to_string(),
                row.agent_id.to_string(),
                row.x.to_string(),
                row.y.to_string(),
                row.active_agents.to_string(),
                row.messages_sent.to_string(),
            ])?;
        }
        Ok(())
    }

    /// Flush the underlying file.  Idempotent.
    pub fn finish(&mut self) -> MetricsResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.flush().map_err(MetricsError::Io)
    }
}

/// Write a finished trace to `path` in one go.
pub fn write_trace_csv(path: &Path, traces: &[TickTrace]) -> MetricsResult<()> {
    let mut writer = TraceCsvWriter::create(path)?;
    for trace in traces {
        writer.append(trace)?;
    }
    writer.finish()
}

/// Parse a trace file produced by [`write_trace_csv`] into flat rows.
pub fn read_trace_csv(path: &Path) -> MetricsResult<Vec<TraceRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != HEADER.len() {
            return Err(MetricsError::MalformedRow(format!(
                "expected {} fields, got {}",
                HEADER.len(),
                record.len()
            )));
        }
        rows.push(TraceRow {
            tick: parse_field(&record, 0)?,
            agent_id: parse_agent_id(&record[1])?,
            x: parse_field(&record, 2)?,
            y: parse_field(&record, 3)?,
            active_agents: parse_field(&record, 4)?,
            messages_sent: parse_field(&record, 5)?,
        });
    }
    Ok(rows)
}

fn parse_field<T: FromStr>(record: &csv::StringRecord, index: usize) -> MetricsResult<T> {
    record[index]
        .parse()
        .map_err(|_| MetricsError::MalformedRow(format!("field {index}: {:?}", &record[index])))
}

fn parse_agent_id(s: &str) -> MetricsResult<AgentId> {
    uuid::Uuid::parse_str(s)
        .map(AgentId)
        .map_err(|_| MetricsError::MalformedRow(format!("agent id: {s:?}")))
}
