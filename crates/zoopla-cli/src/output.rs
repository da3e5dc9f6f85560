//! JSON and CSV writers for extracted records.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use zoopla_core::models::Record;
use zoopla_core::OutputFormat;

pub fn write_records(format: OutputFormat, records: &[Record], path: &Path) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(records, path),
        OutputFormat::Csv => write_csv(records, path),
    }
}

/// Write `records` as a pretty-printed JSON array. Non-ASCII text is kept as-is.
pub fn write_json(records: &[Record], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    std::io::Write::flush(&mut writer)?;

    tracing::info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Write `records` as CSV. The header is the sorted union of every record's
/// keys; missing and null cells are empty.
pub fn write_csv(records: &[Record], path: &Path) -> Result<()> {
    if records.is_empty() {
        tracing::warn!("No records to write to {}", path.display());
        return Ok(());
    }

    let mut rows: Vec<Map<String, Value>> = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::to_value(record).context("Failed to serialize record")? {
            Value::Object(fields) => rows.push(fields),
            other => anyhow::bail!("Record did not serialize to an object: {other}"),
        }
    }

    write_rows(&rows, path)?;

    tracing::info!("Wrote {} record(s) to {}", rows.len(), path.display());
    Ok(())
}

fn write_rows(rows: &[Map<String, Value>], path: &Path) -> Result<()> {
    let header: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    writer.write_record(&header)?;

    for row in rows {
        let cells = header.iter().map(|key| cell(row.get(*key)));
        writer.write_record(cells)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
