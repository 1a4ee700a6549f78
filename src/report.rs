// qr-labels: what a generation run wrote

use crate::error::AppError;
use crate::format::LabelFormat;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// One PDF written by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    pub format: LabelFormat,
    pub path: PathBuf,
    pub labels: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// RFC 3339 local time the run started
    pub generated_at: String,
    pub outputs: Vec<OutputFile>,
    /// Formats that received no rows, so no file
    pub skipped: Vec<LabelFormat>,
}

impl GenerationSummary {
    pub fn new() -> Self {
        Self {
            generated_at: Local::now().to_rfc3339(),
            outputs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn total_labels(&self) -> usize {
        self.outputs.iter().map(|o| o.labels).sum()
    }

    pub fn output(&self, format: LabelFormat) -> Option<&OutputFile> {
        self.outputs.iter().find(|o| o.format == format)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), AppError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| AppError::IoError(e.into()))
    }
}

impl Default for GenerationSummary {
    fn default() -> Self {
        Self::new()
    }
}
