use std::{
    fs::OpenOptions,
    io::Write as _,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, warn};

use crate::{
    config::HistoryConfig, errors::HistoryError, export::CsvExporter, table::RenderedTable,
};

pub const HISTORY_HEADER: &str = "timestamp,interface,rx_speed,tx_speed,rx_total,tx_total";

/// One interface at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySample {
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub interface: String,
    pub rx_speed: String,
    pub tx_speed: String,
    pub rx_total: String,
    pub tx_total: String,
}

impl HistorySample {
    /// One sample per table row, all sharing the same timestamp
    pub fn from_table(
        table: &RenderedTable,
        at: OffsetDateTime,
    ) -> Result<Vec<Self>, HistoryError> {
        let timestamp = format_timestamp(at)?;

        Ok(table
            .rows()
            .iter()
            .map(|row| {
                let [interface, rx_speed, tx_speed, rx_total, tx_total, _] = row.cells.clone();
                Self {
                    timestamp: timestamp.clone(),
                    interface,
                    rx_speed,
                    tx_speed,
                    rx_total,
                    tx_total,
                }
            })
            .collect())
    }

    fn cells(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.interface,
            &self.rx_speed,
            &self.tx_speed,
            &self.rx_total,
            &self.tx_total,
        ]
    }

    fn from_cells(cells: Vec<String>) -> Option<Self> {
        let [timestamp, interface, rx_speed, tx_speed, rx_total, tx_total]: [String; 6] =
            cells.try_into().ok()?;
        Some(Self {
            timestamp,
            interface,
            rx_speed,
            tx_speed,
            rx_total,
            tx_total,
        })
    }
}

pub fn format_timestamp(at: OffsetDateTime) -> Result<String, HistoryError> {
    Ok(at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))?)
}

/// Append-only sample file
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    exporter: CsvExporter,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            exporter: CsvExporter::strict(directory),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, samples: &[HistorySample]) -> Result<(), HistoryError> {
        if samples.is_empty() {
            return Ok(());
        }

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| HistoryError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let write_error = |source| HistoryError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_error)?;
        let is_new = file.metadata().map_err(write_error)?.len() == 0;

        let mut lines = String::new();
        if is_new {
            lines.push_str(HISTORY_HEADER);
            lines.push('\n');
        }
        for sample in samples {
            lines.push_str(&self.exporter.format_row(&sample.cells()));
            lines.push('\n');
        }

        file.write_all(lines.as_bytes()).map_err(write_error)
    }

    /// Samples with `start <= timestamp <= end`, oldest first.
    ///
    /// Bounds compare as text, so a date-only `end` such as `2024-05-01`
    /// stops before any sample taken on that day.
    pub async fn query(&self, start: &str, end: &str) -> Result<Vec<HistorySample>, HistoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut samples: Vec<HistorySample> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.is_empty() && *line != HISTORY_HEADER)
            .filter_map(|(index, line)| {
                let sample = HistorySample::from_cells(parse_line(line));
                if sample.is_none() {
                    warn!("Skipping malformed history line {}", index + 1);
                }
                sample
            })
            .filter(|sample| start <= sample.timestamp.as_str() && sample.timestamp.as_str() <= end)
            .collect();

        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(samples)
    }
}

/// Split a strictly quoted line back into its fields
fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Saves a snapshot of the table at most once per `save_interval`
#[derive(Debug)]
pub struct HistoryRecorder {
    store: HistoryStore,
    save_interval: Duration,
    last_save: Option<Instant>,
}

impl HistoryRecorder {
    pub fn new(config: &HistoryConfig) -> Self {
        Self::with_store(HistoryStore::new(&config.path), config.save_interval)
    }

    pub fn with_store(store: HistoryStore, save_interval: Duration) -> Self {
        Self {
            store,
            save_interval,
            last_save: None,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Number of samples written, 0 while the interval has not elapsed
    pub fn record(
        &mut self,
        table: &RenderedTable,
        now: OffsetDateTime,
        at: Instant,
    ) -> Result<usize, HistoryError> {
        if let Some(last) = self.last_save {
            if at.saturating_duration_since(last) < self.save_interval {
                return Ok(0);
            }
        }

        let samples = HistorySample::from_table(table, now)?;
        self.store.append(&samples)?;
        self.last_save = Some(at);
        debug!(
            "Saved {} history samples to {}",
            samples.len(),
            self.store.path().display()
        );
        Ok(samples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::COLUMN_COUNT;
    use tempfile::tempdir;
    use time::macros::datetime;

    fn table(ifaces: &[&str]) -> RenderedTable {
        let rows: Vec<[String; COLUMN_COUNT]> = ifaces
            .iter()
            .map(|iface| [*iface, "10 Mbps", "2 Mbps", "500 MB", "100 MB", "12:00:00"].map(String::from))
            .collect();
        let mut table = RenderedTable::new();
        table.apply(1, rows, datetime!(2024-05-01 12:00:00 UTC));
        table
    }

    fn sample(timestamp: &str, interface: &str) -> HistorySample {
        HistorySample {
            timestamp: timestamp.to_string(),
            interface: interface.to_string(),
            rx_speed: "1 bps".to_string(),
            tx_speed: "2 bps".to_string(),
            rx_total: "3.00 B".to_string(),
            tx_total: "4.00 B".to_string(),
        }
    }

    #[test]
    fn test_record_is_throttled() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));
        let mut recorder = HistoryRecorder::with_store(store, Duration::from_secs(60));
        let table = table(&["ether1", "ether2"]);
        let t0 = Instant::now();

        let saved = recorder
            .record(&table, datetime!(2024-05-01 12:00:00 UTC), t0)
            .unwrap();
        assert_eq!(saved, 2);

        let saved = recorder
            .record(&table, datetime!(2024-05-01 12:00:30 UTC), t0 + Duration::from_secs(30))
            .unwrap();
        assert_eq!(saved, 0);

        let saved = recorder
            .record(&table, datetime!(2024-05-01 12:01:00 UTC), t0 + Duration::from_secs(60))
            .unwrap();
        assert_eq!(saved, 2);

        let content = std::fs::read_to_string(recorder.store().path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], HISTORY_HEADER);
        assert_eq!(
            lines[1],
            r#""2024-05-01 12:00:00","ether1","10 Mbps","2 Mbps","500 MB","100 MB""#
        );
        assert!(lines[4].starts_with(r#""2024-05-01 12:01:00","ether2""#));
    }

    #[tokio::test]
    async fn test_query_filters_by_range() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("history.csv"));

        store
            .append(&[
                sample("2024-04-30 23:59:00", "ether1"),
                sample("2024-05-01 08:00:00", "ether1"),
                sample("2024-05-01 08:00:00", "ether2"),
            ])
            .unwrap();
        store
            .append(&[
                sample("2024-05-02 09:30:00", "ether1"),
                sample("2024-05-03 00:00:01", "ether1"),
            ])
            .unwrap();

        let samples = store
            .query("2024-05-01 00:00:00", "2024-05-02 23:59:59")
            .await
            .unwrap();
        let found: Vec<(&str, &str)> = samples
            .iter()
            .map(|s| (s.timestamp.as_str(), s.interface.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("2024-05-01 08:00:00", "ether1"),
                ("2024-05-01 08:00:00", "ether2"),
                ("2024-05-02 09:30:00", "ether1"),
            ]
        );

        // Both bounds are inclusive
        let samples = store
            .query("2024-04-30 23:59:00", "2024-04-30 23:59:00")
            .await
            .unwrap();
        assert_eq!(samples.len(), 1);

        assert!(store.query("2025-01-01", "2025-12-31").await.unwrap().is_empty());

        // Header written once, whatever the number of appends
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches(HISTORY_HEADER).count(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("absent.csv"));
        assert!(store.query("2024-01-01", "2024-12-31").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quoted_fields_survive() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.csv"));
        let odd = sample("2024-05-01 10:00:00", "wan \"main\", backup");
        store.append(std::slice::from_ref(&odd)).unwrap();

        let samples = store.query("2024-05-01", "2024-05-02").await.unwrap();
        assert_eq!(samples, vec![odd]);
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line(r#""a","b,c","d""e","""#),
            vec!["a", "b,c", "d\"e", ""]
        );
    }
}
