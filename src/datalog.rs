//! Rotating per-device data logger: append, tail, and range export.
//!
//! Files are opened per append; the only shared mutable state is the
//! active-file map, guarded by one mutex so concurrent engines can never
//! interleave writes or race the size check.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::types::{LogFormat, LogSettings};
use crate::monitor::record::StatusRecord;

/// A record as read back from disk. CSV rows come back with string values;
/// JSONL rows keep their native types.
pub type LoggedRecord = serde_json::Map<String, serde_json::Value>;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct DataLogger {
    directory: PathBuf,
    format: LogFormat,
    rotation: bool,
    max_size_bytes: u64,
    state: Mutex<WriterState>,
}

#[derive(Default)]
struct WriterState {
    /// Per-device override once a size rotation has happened in the
    /// current period.
    active: HashMap<String, ActiveLog>,
}

struct ActiveLog {
    period: String,
    path: PathBuf,
}

impl DataLogger {
    /// Failure to create the log directory is the one fatal startup error.
    pub fn new(settings: &LogSettings) -> Result<Self> {
        let directory = PathBuf::from(&settings.directory);
        std::fs::create_dir_all(&directory)
            .with_context(|| format!("Failed to create log directory {:?}", directory))?;

        Ok(Self {
            directory,
            format: settings.format,
            rotation: settings.rotation,
            max_size_bytes: settings.max_size_mb * 1024 * 1024,
            state: Mutex::new(WriterState::default()),
        })
    }

    #[cfg(test)]
    fn set_max_size_bytes(&mut self, bytes: u64) {
        self.max_size_bytes = bytes;
    }

    /// Append one record to the device's active log file.
    pub async fn append(&self, device: &str, record: &StatusRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let path = self.select_target(&mut state, device, Local::now());

        match self.format {
            LogFormat::Csv => self.append_csv(&path, record),
            LogFormat::Jsonl => self.append_jsonl(&path, record),
        }
        .with_context(|| format!("Failed to append record to {:?}", path))
    }

    /// Pick the file the next append goes to, rotating when the current
    /// target has outgrown the ceiling or the period has changed.
    fn select_target(
        &self,
        state: &mut WriterState,
        device: &str,
        now: DateTime<Local>,
    ) -> PathBuf {
        let ext = self.format.extension();
        let period = if self.rotation {
            now.format("%Y%m%d").to_string()
        } else {
            String::new()
        };
        let stem = if self.rotation {
            format!("{}_{}", device, period)
        } else {
            device.to_string()
        };
        let base = self.directory.join(format!("{}.{}", stem, ext));

        let candidate = match state.active.get(device) {
            Some(active) if active.period == period => active.path.clone(),
            _ => {
                state.active.remove(device);
                base
            }
        };

        if file_size(&candidate) <= self.max_size_bytes {
            return candidate;
        }

        // Size ceiling crossed: start a fresh uniquely-suffixed file and
        // keep appending there for the rest of the period.
        let stamp = now.format("%H%M%S");
        let mut rotated = self.directory.join(format!("{}_{}.{}", stem, stamp, ext));
        let mut n = 1;
        while rotated.exists() {
            rotated = self.directory.join(format!("{}_{}_{}.{}", stem, stamp, n, ext));
            n += 1;
        }

        debug!(
            "Rotating log for {}: {:?} exceeded {} bytes, switching to {:?}",
            device, candidate, self.max_size_bytes, rotated
        );
        state.active.insert(
            device.to_string(),
            ActiveLog { period, path: rotated.clone() },
        );
        rotated
    }

    fn append_csv(&self, path: &Path, record: &StatusRecord) -> Result<()> {
        let columns = record.columns();

        let header = match read_csv_header(path)? {
            Some(header) => header,
            None => {
                let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{}", join_csv(&names))?;
                names
            }
        };

        for (name, _) in &columns {
            if !header.contains(name) {
                warn!(
                    "Field '{}' not in header of {:?}; value dropped for this row",
                    name, path
                );
            }
        }

        let row: Vec<String> = header
            .iter()
            .map(|column| {
                columns
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect();

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", join_csv(&row))?;
        Ok(())
    }

    fn append_jsonl(&self, path: &Path, record: &StatusRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// The most recent records for one device, in chronological order,
    /// read from the most recently modified of its log files.
    pub async fn latest_records(&self, device: &str, count: usize) -> Result<Vec<LoggedRecord>> {
        let _state = self.state.lock().await;

        let mut files = self.device_files(device)?;
        files.sort_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });

        let Some(path) = files.last() else {
            return Ok(Vec::new());
        };

        let mut records = read_records(path, self.format)?;
        if records.len() > count {
            records.drain(..records.len() - count);
        }
        Ok(records)
    }

    /// Export every record for a device whose timestamp lies inclusively
    /// within the given bounds, into `destination` in the format implied
    /// by its extension. Returns the number of records written.
    pub async fn export(
        &self,
        device: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        destination: &Path,
    ) -> Result<usize> {
        let _state = self.state.lock().await;

        let dest_format = match destination.extension().and_then(|e| e.to_str()) {
            Some("csv") => LogFormat::Csv,
            Some("jsonl") | Some("json") => LogFormat::Jsonl,
            other => bail!(
                "cannot infer export format from destination suffix {:?}",
                other.unwrap_or("")
            ),
        };

        let mut files = self.device_files(device)?;
        files.sort();

        let mut selected = Vec::new();
        for path in &files {
            for record in read_records(path, self.format)? {
                if in_range(&record, start, end) {
                    selected.push(record);
                }
            }
        }

        match dest_format {
            LogFormat::Csv => write_csv(destination, &selected)?,
            LogFormat::Jsonl => write_jsonl(destination, &selected)?,
        }

        Ok(selected.len())
    }

    /// All log files belonging to one device, unordered.
    fn device_files(&self, device: &str) -> Result<Vec<PathBuf>> {
        let pattern = self
            .directory
            .join(format!("{}*.{}", device, self.format.extension()));
        let pattern = pattern.to_string_lossy().to_string();

        let mut files = Vec::new();
        for entry in glob::glob(&pattern).context("Invalid log file pattern")? {
            let path = entry.context("Failed to read log directory entry")?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            // "ups1" must not pick up "ups10"'s files
            if stem == device || stem.starts_with(&format!("{}_", device)) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// First line of an existing, non-empty CSV file. Reads only the header,
/// not the whole file.
fn read_csv_header(path: &Path) -> Result<Option<Vec<String>>> {
    use std::io::BufRead;

    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    let mut line = String::new();
    std::io::BufReader::new(file).read_line(&mut line)?;
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(split_csv_line(line)))
}

fn in_range(
    record: &LoggedRecord,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    let timestamp = record
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok());
    let Some(timestamp) = timestamp else {
        debug!("Record without parseable timestamp skipped during export");
        return false;
    };
    if let Some(start) = start {
        if timestamp < start {
            return false;
        }
    }
    if let Some(end) = end {
        if timestamp > end {
            return false;
        }
    }
    true
}

fn read_records(path: &Path, format: LogFormat) -> Result<Vec<LoggedRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {:?}", path))?;

    match format {
        LogFormat::Csv => {
            let mut lines = content.lines();
            let Some(header) = lines.next() else {
                return Ok(Vec::new());
            };
            let header = split_csv_line(header);

            let mut records = Vec::new();
            for line in lines {
                if line.is_empty() {
                    continue;
                }
                let values = split_csv_line(line);
                let mut record = LoggedRecord::new();
                for (column, value) in header.iter().zip(values) {
                    if !value.is_empty() {
                        record.insert(column.clone(), serde_json::Value::String(value));
                    }
                }
                records.push(record);
            }
            Ok(records)
        }
        LogFormat::Jsonl => {
            let mut records = Vec::new();
            for line in content.lines() {
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(line) {
                    Ok(serde_json::Value::Object(map)) => records.push(map),
                    Ok(_) | Err(_) => warn!("Skipping malformed record in {:?}", path),
                }
            }
            Ok(records)
        }
    }
}

fn write_csv(destination: &Path, records: &[LoggedRecord]) -> Result<()> {
    // Header is the union of keys in first-seen order
    let mut header: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !header.iter().any(|h| h == key) {
                header.push(key.clone());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&join_csv(&header));
    out.push('\n');
    for record in records {
        let row: Vec<String> = header
            .iter()
            .map(|column| record.get(column).map(value_text).unwrap_or_default())
            .collect();
        out.push_str(&join_csv(&row));
        out.push('\n');
    }

    std::fs::write(destination, out)
        .with_context(|| format!("Failed to write export file {:?}", destination))
}

fn write_jsonl(destination: &Path, records: &[LoggedRecord]) -> Result<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    std::fs::write(destination, out)
        .with_context(|| format!("Failed to write export file {:?}", destination))
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_csv(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' if current.is_empty() => quoted = true,
            ',' if !quoted => {
                fields.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    use crate::snmp::decode::FieldValue;

    fn settings(dir: &TempDir, format: LogFormat) -> LogSettings {
        LogSettings {
            directory: dir.path().to_string_lossy().to_string(),
            format,
            rotation: true,
            max_size_mb: 100,
        }
    }

    fn online_record(charge: f64) -> StatusRecord {
        let mut fields = BTreeMap::new();
        fields.insert("charge_remaining".to_string(), FieldValue::Float(charge));
        fields.insert("output_voltage".to_string(), FieldValue::Float(230.0));
        fields.insert("battery_status".to_string(), FieldValue::Text("batteryNormal".to_string()));
        fields.insert("battery_status_code".to_string(), FieldValue::Int(2));
        StatusRecord::online("10F_UPS", "172.21.2.13", fields)
    }

    #[tokio::test]
    async fn csv_append_then_tail_round_trips() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Csv)).unwrap();

        let record = online_record(95.0);
        logger.append("10F_UPS", &record).await.unwrap();

        let latest = logger.latest_records("10F_UPS", 1).await.unwrap();
        assert_eq!(latest.len(), 1);
        let read = &latest[0];
        assert_eq!(read["device_name"].as_str(), Some("10F_UPS"));
        assert_eq!(read["status"].as_str(), Some("online"));
        assert_eq!(read["timestamp"].as_str(), Some(record.timestamp.as_str()));
        assert_eq!(read["charge_remaining"].as_str(), Some("95"));
        assert_eq!(read["battery_status"].as_str(), Some("batteryNormal"));
        assert!(read.get("error").is_none());
    }

    #[tokio::test]
    async fn jsonl_append_then_tail_round_trips() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();

        let record = online_record(95.0);
        logger.append("10F_UPS", &record).await.unwrap();

        let latest = logger.latest_records("10F_UPS", 1).await.unwrap();
        assert_eq!(latest.len(), 1);
        let read = &latest[0];
        assert_eq!(read["status"].as_str(), Some("online"));
        assert_eq!(read["charge_remaining"].as_f64(), Some(95.0));
        assert_eq!(read["battery_status_code"].as_i64(), Some(2));
    }

    #[tokio::test]
    async fn tail_returns_most_recent_in_chronological_order() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();

        for charge in [91.0, 92.0, 93.0, 94.0, 95.0] {
            logger.append("10F_UPS", &online_record(charge)).await.unwrap();
        }

        let latest = logger.latest_records("10F_UPS", 3).await.unwrap();
        let charges: Vec<f64> = latest
            .iter()
            .map(|r| r["charge_remaining"].as_f64().unwrap())
            .collect();
        assert_eq!(charges, vec![93.0, 94.0, 95.0]);
    }

    #[tokio::test]
    async fn size_ceiling_rotates_to_a_new_file() {
        let dir = TempDir::new().unwrap();
        let mut logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();
        logger.set_max_size_bytes(1024);

        for _ in 0..20 {
            logger.append("10F_UPS", &online_record(95.0)).await.unwrap();
        }

        let files: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert!(
            files.len() >= 2,
            "expected rotation to create a second file, got {:?}",
            files
        );

        // Every file but the rotation target stopped growing at the ceiling
        // (plus the one record that pushed it over).
        let oversized = files
            .iter()
            .filter(|p| file_size(p) > 1024 + 400)
            .count();
        assert_eq!(oversized, 0, "rotation left an oversized file: {:?}", files);
    }

    #[tokio::test]
    async fn rotated_file_stays_the_append_target() {
        let dir = TempDir::new().unwrap();
        let mut logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();
        logger.set_max_size_bytes(300);

        // Two appends overflow the base file, the third rotates
        for _ in 0..3 {
            logger.append("10F_UPS", &online_record(95.0)).await.unwrap();
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        assert_eq!(files.len(), 2);

        let rotated = files
            .iter()
            .max_by_key(|p| std::fs::metadata(p).unwrap().modified().unwrap())
            .unwrap()
            .clone();
        let before = file_size(&rotated);

        logger.append("10F_UPS", &online_record(95.0)).await.unwrap();
        assert!(
            file_size(&rotated) > before,
            "subsequent append did not target the rotated file"
        );
    }

    #[tokio::test]
    async fn mixed_status_rows_share_one_csv_header() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Csv)).unwrap();

        logger.append("10F_UPS", &online_record(95.0)).await.unwrap();
        logger
            .append(
                "10F_UPS",
                &StatusRecord::offline("10F_UPS", "172.21.2.13", "no response"),
            )
            .await
            .unwrap();

        let latest = logger.latest_records("10F_UPS", 2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0]["status"].as_str(), Some("online"));
        assert_eq!(latest[1]["status"].as_str(), Some("offline"));
        assert_eq!(latest[1]["error"].as_str(), Some("no response"));
        assert!(latest[1].get("charge_remaining").is_none());
    }

    #[tokio::test]
    async fn export_filters_by_inclusive_time_range() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();

        let mut early = online_record(90.0);
        early.timestamp = "2026-08-01T10:00:00".to_string();
        let mut middle = online_record(92.0);
        middle.timestamp = "2026-08-02T10:00:00".to_string();
        let mut late = online_record(94.0);
        late.timestamp = "2026-08-03T10:00:00".to_string();

        for record in [&early, &middle, &late] {
            logger.append("10F_UPS", record).await.unwrap();
        }

        let dest = dir.path().join("export.jsonl");
        let start = NaiveDateTime::parse_from_str("2026-08-02T10:00:00", TIMESTAMP_FORMAT).unwrap();
        let end = NaiveDateTime::parse_from_str("2026-08-03T09:59:59", TIMESTAMP_FORMAT).unwrap();
        let written = logger
            .export("10F_UPS", Some(start), Some(end), &dest)
            .await
            .unwrap();

        assert_eq!(written, 1);
        let content = std::fs::read_to_string(&dest).unwrap();
        assert!(content.contains("2026-08-02T10:00:00"));
        assert!(!content.contains("2026-08-01T10:00:00"));
        assert!(!content.contains("2026-08-03T10:00:00"));
    }

    #[tokio::test]
    async fn export_format_follows_destination_suffix() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();
        logger.append("10F_UPS", &online_record(95.0)).await.unwrap();

        let dest = dir.path().join("export.csv");
        let written = logger.export("10F_UPS", None, None, &dest).await.unwrap();
        assert_eq!(written, 1);

        let content = std::fs::read_to_string(&dest).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("timestamp"));
        assert!(header.contains("charge_remaining"));
        assert_eq!(lines.count(), 1);
    }

    #[tokio::test]
    async fn export_with_unknown_suffix_fails() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();
        let dest = dir.path().join("export.xml");
        assert!(logger.export("10F_UPS", None, None, &dest).await.is_err());
    }

    #[tokio::test]
    async fn device_files_ignore_prefix_collisions() {
        let dir = TempDir::new().unwrap();
        let logger = DataLogger::new(&settings(&dir, LogFormat::Jsonl)).unwrap();

        logger.append("ups1", &online_record(90.0)).await.unwrap();
        logger.append("ups10", &online_record(95.0)).await.unwrap();

        let latest = logger.latest_records("ups1", 10).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0]["charge_remaining"].as_f64(), Some(90.0));
    }

    #[test]
    fn csv_escaping_round_trips_awkward_values() {
        let fields = vec![
            "plain".to_string(),
            "with,comma".to_string(),
            "with \"quotes\"".to_string(),
        ];
        let line = join_csv(&fields);
        assert_eq!(split_csv_line(&line), fields);
    }
}
