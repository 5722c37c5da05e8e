//! Trade journal: one CSV row per confirmed fill, append-only.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dcabot_core::domain::{Action, Fill, Position};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("journal CSV on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// A journal row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub symbol: String,
    pub side: String,
    /// Exit reason for sells, empty for buys.
    pub reason: String,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub notional: f64,
    /// DCA level after the fill (0 once flat).
    pub dca_level: u32,
    /// Average entry price after the fill (0 once flat).
    pub entry_price: f64,
}

impl JournalEntry {
    pub fn new(mode: &str, symbol: &str, action: &Action, fill: &Fill, after: &Position) -> Self {
        let (side, reason) = match action {
            Action::Sell { reason, .. } => ("SELL", reason.to_string()),
            Action::Buy { .. } => ("BUY", String::new()),
            Action::NoOp => ("", String::new()),
        };
        Self {
            timestamp: fill.timestamp,
            mode: mode.to_string(),
            symbol: symbol.to_string(),
            side: side.to_string(),
            reason,
            quantity: fill.quantity,
            price: fill.price,
            fee: fill.fee,
            notional: fill.notional(),
            dca_level: after.dca_level,
            entry_price: after.entry_price,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> JournalError {
        JournalError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> JournalError {
        JournalError::Csv {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Append a row, writing the header first when the file is new or empty.
    pub fn append(&self, entry: &JournalEntry) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let needs_header = fs::metadata(&self.path).map_or(true, |m| m.len() == 0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(entry).map_err(|e| self.csv_err(e))?;
        writer.flush().map_err(|e| self.io_err(e))
    }

    /// All rows in file order; a missing file has none.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_err(e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<JournalEntry>, _>>()
            .map_err(|e| self.csv_err(e))
    }
}
