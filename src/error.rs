// qr-labels: error taxonomy shared by the library and the CLI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// A mandatory column is absent or holds a blank value.
    #[error("Invalid inventory file: {0}")]
    Schema(String),
    #[error("Inventory file contains no rows")]
    EmptyBatch,
    #[error("Model '{0}' has no label format assigned")]
    UnassignedModel(String),
    /// A row handed to the renderer lacks a column the label needs.
    #[error("Row {row} has no '{column}' column")]
    MissingField { row: usize, column: String },
    #[error("Failed to read inventory file: {0}")]
    CsvError(String),
    #[error("Failed to build ticket URL: {0}")]
    UrlError(String),
    #[error("Failed to generate QR code: {0}")]
    QrError(String),
    #[error("Failed to create PDF: {0}")]
    PdfError(String),
    #[error("Failed to load asset: {0}")]
    AssetError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::CsvError(e.to_string())
    }
}
