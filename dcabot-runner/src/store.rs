//! PositionStore: the position book on disk.
//!
//! The whole book is rewritten after every cycle. Writes go to a sibling
//! temp file that is then renamed over the target, so a crash mid-write
//! leaves the previous book intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use dcabot_core::persistence::PositionBook;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("position store I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("position store {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Load the book; a missing or empty file is an empty book.
    pub fn load(&self) -> Result<PositionBook, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PositionBook::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(PositionBook::new());
        }
        PositionBook::from_json(&content).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, book: &PositionBook) -> Result<(), StoreError> {
        let json = book.to_json().map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}
