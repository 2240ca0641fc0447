use crate::errors::Result;
use crate::replacer::ChangeEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Defines the possible output formats for a change report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// A simple, human-readable text format.
    Text,
    /// JSON format, suitable for machine processing.
    Json,
    /// Comma-Separated Values format.
    Csv,
}

/// One substitution as recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub file: PathBuf,
    pub name: String,
    pub value: String,
}

/// Collects change events from every worker of a run.
#[derive(Debug, Default)]
pub struct ChangeReport {
    records: Mutex<Vec<ChangeRecord>>,
}

impl ChangeReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event. Safe to call from several workers at once.
    pub fn record(&self, event: ChangeEvent<'_>) {
        let record = ChangeRecord {
            file: event.path.to_path_buf(),
            name: event.binding.name().to_string(),
            value: event.binding.value().to_string(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// The recorded changes, sorted by file and then binding name.
    pub fn records(&self) -> Vec<ChangeRecord> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        records.sort_by(|a, b| a.file.cmp(&b.file).then_with(|| a.name.cmp(&b.name)));
        records
    }
}

/// Handles rendering a [`ChangeReport`] in a chosen [`ReportFormat`].
pub struct ReportWriter {
    format: ReportFormat,
    include_summary: bool,
    tool_name: String,
    tool_version: String,
}

impl ReportWriter {
    /// # Arguments
    ///
    /// * `format` - The `ReportFormat` to use.
    /// * `include_summary` - Whether to append a summary (text format only).
    pub fn new(format: ReportFormat, include_summary: bool) -> Self {
        Self {
            format,
            include_summary,
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn write_output<W: Write>(&self, writer: &mut W, report: &ChangeReport) -> Result<()> {
        let records = report.records();
        let output = match self.format {
            ReportFormat::Text => self.format_text(&records),
            ReportFormat::Json => self.format_json(&records)?,
            ReportFormat::Csv => self.format_csv(&records)?,
        };

        writer.write_all(output.as_bytes())?;

        if self.include_summary && self.format == ReportFormat::Text {
            writer.write_all(format_summary(&records).as_bytes())?;
        }
        Ok(())
    }

    fn format_text(&self, records: &[ChangeRecord]) -> String {
        records
            .iter()
            .map(|r| format!("Changed | {} | {} for {}\n", r.file.display(), r.name, r.value))
            .collect()
    }

    fn format_json(&self, records: &[ChangeRecord]) -> Result<String> {
        #[derive(Serialize)]
        struct JsonOutput<'a> {
            tool: ToolInfo<'a>,
            generated_at: DateTime<Utc>,
            files_changed: usize,
            total_changes: usize,
            changes: &'a [ChangeRecord],
        }

        #[derive(Serialize)]
        struct ToolInfo<'a> {
            name: &'a str,
            version: &'a str,
        }

        let output = JsonOutput {
            tool: ToolInfo {
                name: &self.tool_name,
                version: &self.tool_version,
            },
            generated_at: Utc::now(),
            files_changed: count_files(records),
            total_changes: records.len(),
            changes: records,
        };

        Ok(serde_json::to_string_pretty(&output)?)
    }

    fn format_csv(&self, records: &[ChangeRecord]) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(["File", "Name", "Value"])?;
        for r in records {
            wtr.write_record([r.file.display().to_string().as_str(), r.name.as_str(), r.value.as_str()])?;
        }

        let data = wtr
            .into_inner()
            .map_err(|e| format!("CSV writer error: {e}"))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

fn count_files(records: &[ChangeRecord]) -> usize {
    records.iter().map(|r| &r.file).collect::<HashSet<_>>().len()
}

/// Counts per file and per binding.
fn format_summary(records: &[ChangeRecord]) -> String {
    let mut per_binding: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *per_binding.entry(r.name.as_str()).or_insert(0) += 1;
    }

    let mut summary = format!("\n{} Summary {}\n", "=".repeat(20), "=".repeat(20));
    summary.push_str(&format!("Total substitutions: {}\n", records.len()));
    summary.push_str(&format!("Files changed: {}\n\n", count_files(records)));
    summary.push_str("Per binding:\n");
    for (name, count) in per_binding {
        summary.push_str(&format!("  {name} - {count}\n"));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use std::path::Path;

    fn sample_report() -> ChangeReport {
        let env = Binding::new("Env", "prod").unwrap();
        let port = Binding::new("Port", "8080").unwrap();
        let report = ChangeReport::new();
        report.record(ChangeEvent { path: Path::new("b/app.config"), binding: &env });
        report.record(ChangeEvent { path: Path::new("a/web.config"), binding: &port });
        report.record(ChangeEvent { path: Path::new("a/web.config"), binding: &env });
        report
    }

    #[test]
    fn test_records_are_sorted() {
        let records = sample_report().records();
        assert_eq!(records[0].file, Path::new("a/web.config"));
        assert_eq!(records[0].name, "Env");
        assert_eq!(records[2].file, Path::new("b/app.config"));
    }

    #[test]
    fn test_json_format() {
        let writer = ReportWriter::new(ReportFormat::Json, false);
        let mut out = Vec::new();
        writer.write_output(&mut out, &sample_report()).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["total_changes"], 3);
        assert_eq!(parsed["files_changed"], 2);
        assert_eq!(parsed["changes"][0]["value"], "prod");
    }

    #[test]
    fn test_csv_format() {
        let writer = ReportWriter::new(ReportFormat::Csv, false);
        let mut out = Vec::new();
        writer.write_output(&mut out, &sample_report()).unwrap();

        let mut rdr = csv::Reader::from_reader(out.as_slice());
        assert_eq!(rdr.headers().unwrap().get(0), Some("File"));
        let records: Vec<_> = rdr
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_record_survives_poisoned_lock() {
        let report = sample_report();
        let worker = std::thread::scope(|s| {
            s.spawn(|| {
                let _records = report.records.lock().unwrap();
                panic!("worker died while recording");
            })
            .join()
        });
        assert!(worker.is_err());
        assert!(report.records.is_poisoned());

        let env = Binding::new("Env", "prod").unwrap();
        report.record(ChangeEvent { path: Path::new("c/db.config"), binding: &env });
        let records = report.records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[3].file, Path::new("c/db.config"));
    }

    #[test]
    fn test_text_format_with_summary() {
        let writer = ReportWriter::new(ReportFormat::Text, true);
        let mut out = Vec::new();
        writer.write_output(&mut out, &sample_report()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Changed | a/web.config | Port for 8080"));
        assert!(text.contains("Total substitutions: 3"));
        assert!(text.contains("  Env - 2"));
    }
}
