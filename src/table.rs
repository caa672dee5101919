use std::fmt::Write as _;

use serde::Serialize;
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};

use crate::model::COLUMN_COUNT;

/// Column labels, in display and export order: interface, download speed,
/// upload speed, total RX, total TX, time.
pub const HEADER: [&str; COLUMN_COUNT] = [
    "الواجهة",
    "سرعة التنزيل",
    "سرعة الرفع",
    "إجمالي RX",
    "إجمالي TX",
    "الوقت",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TableRow {
    pub cells: [String; COLUMN_COUNT],
}

impl From<[String; COLUMN_COUNT]> for TableRow {
    fn from(cells: [String; COLUMN_COUNT]) -> Self {
        Self { cells }
    }
}

/// Latest applied stats. This is what gets shown and exported; it is only
/// replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct RenderedTable {
    rows: Vec<TableRow>,
    last_updated: Option<OffsetDateTime>,
    applied_sequence: u64,
    last_error: Option<String>,
}

impl RenderedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all rows with the result of request `sequence`.
    ///
    /// Returns `false` and leaves the table alone when a newer request has
    /// already been applied.
    pub fn apply(
        &mut self,
        sequence: u64,
        rows: Vec<[String; COLUMN_COUNT]>,
        at: OffsetDateTime,
    ) -> bool {
        if sequence <= self.applied_sequence {
            return false;
        }

        self.rows = rows.into_iter().map(TableRow::from).collect();
        self.last_updated = Some(at);
        self.applied_sequence = sequence;
        self.last_error = None;
        true
    }

    /// Remember why request `sequence` was not applied. Rows stay as they are.
    pub fn record_error(&mut self, sequence: u64, message: impl Into<String>) {
        if sequence > self.applied_sequence {
            self.last_error = Some(message.into());
        }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        self.last_updated
    }

    pub fn applied_sequence(&self) -> u64 {
        self.applied_sequence
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// "Last updated" indicator, wall clock time only
    pub fn last_updated_label(&self) -> String {
        self.last_updated
            .and_then(|at| {
                at.format(format_description!("[hour]:[minute]:[second]"))
                    .ok()
            })
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            header: HEADER,
            rows: self.rows.clone(),
            last_updated: self.last_updated.and_then(|at| at.format(&Rfc3339).ok()),
            applied_sequence: self.applied_sequence,
            error: self.last_error.clone(),
        }
    }

    /// Plain text rendering for the console
    pub fn render_text(&self) -> String {
        let mut widths = HEADER.map(|h| h.chars().count());
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row.cells.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_line(&mut out, HEADER.iter().copied(), &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, rule.iter().map(String::as_str), &widths);
        for row in &self.rows {
            push_line(&mut out, row.cells.iter().map(String::as_str), &widths);
        }

        let _ = writeln!(out, "Last updated: {}", self.last_updated_label());
        if let Some(error) = &self.last_error {
            let _ = writeln!(out, "Last error: {}", error);
        }
        out
    }
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Serializable copy of the table for the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub header: [&'static str; COLUMN_COUNT],
    pub rows: Vec<TableRow>,
    pub last_updated: Option<String>,
    pub applied_sequence: u64,
    pub error: Option<String>,
}
