//! Network dump
//!
//! Appends every transmitted and received line, timestamped, to a side file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{QueryError, Result};

/// Direction of a dumped line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Sent => " ==> ",
            Direction::Received => " <== ",
        }
    }
}

/// Writer for the dump file
pub struct NetDump {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl NetDump {
    pub const CLOSED_MARKER: &'static str = "=== CLOSED ===";

    /// Create (or truncate) the dump file
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Err(QueryError::Config(format!(
                "network dump path is a directory: {}",
                path.display()
            )));
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line as `<timestamp><arrow><line>\n`
    pub fn write(&mut self, direction: Direction, line: &str) -> std::io::Result<()> {
        let stamp = Local::now().to_rfc3339();
        let line = line.trim_end_matches('\n');
        writeln!(self.writer, "{}{}{}", stamp, direction.arrow(), line)?;
        self.writer.flush()
    }

    /// Write the closing marker and flush
    pub fn close(mut self) {
        let _ = writeln!(self.writer, "{}", Self::CLOSED_MARKER);
        let _ = self.writer.flush();
    }
}
