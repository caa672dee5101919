use std::path::{Path, PathBuf};

use time::{macros::format_description, OffsetDateTime, UtcOffset};
use tracing::info;

use crate::{
    config::{ExportConfig, QuoteMode},
    errors::ExportError,
    table::{RenderedTable, HEADER},
};

pub const FILE_PREFIX: &str = "mikrotik_report_";
pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Serializes the rendered table into report files
#[derive(Debug, Clone)]
pub struct CsvExporter {
    quote_mode: QuoteMode,
    directory: PathBuf,
}

impl CsvExporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            quote_mode: config.quote_mode,
            directory: PathBuf::from(&config.directory),
        }
    }

    /// Exporter for files that are read back, always strict quoting
    pub fn strict(directory: impl Into<PathBuf>) -> Self {
        Self {
            quote_mode: QuoteMode::Strict,
            directory: directory.into(),
        }
    }

    /// One quoted line without the trailing newline
    pub fn format_row<S: AsRef<str>>(&self, cells: &[S]) -> String {
        cells
            .iter()
            .map(|cell| quote(cell.as_ref(), self.quote_mode))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Header line followed by one line per row, each terminated by `\n`
    pub fn to_csv(&self, table: &RenderedTable) -> String {
        let mut csv = HEADER.join(",");
        csv.push('\n');

        for row in table.rows() {
            csv.push_str(&self.format_row(&row.cells));
            csv.push('\n');
        }

        csv
    }

    /// Write the table into the configured directory
    pub fn write(
        &self,
        table: &RenderedTable,
        now: OffsetDateTime,
    ) -> Result<PathBuf, ExportError> {
        self.write_to_dir(&self.directory, table, now)
    }

    pub fn write_to_dir(
        &self,
        dir: &Path,
        table: &RenderedTable,
        now: OffsetDateTime,
    ) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(report_file_name(now)?);
        std::fs::write(&path, self.to_csv(table)).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        info!("Exported {} rows to {}", table.len(), path.display());
        Ok(path)
    }
}

/// `mikrotik_report_<YYYY-MM-DDTHH:MM>.csv`, always in UTC
pub fn report_file_name(now: OffsetDateTime) -> Result<String, ExportError> {
    let stamp = now
        .to_offset(UtcOffset::UTC)
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))?;
    Ok(format!("{FILE_PREFIX}{stamp}.csv"))
}

/// Line breaks become spaces so every row stays on one line
fn quote(value: &str, mode: QuoteMode) -> String {
    let value = value.replace("\r\n", " ").replace(['\r', '\n'], " ");
    match mode {
        QuoteMode::Strict => format!("\"{}\"", value.replace('"', "\"\"")),
        QuoteMode::Compatible => format!("\"{}\"", value),
    }
}
