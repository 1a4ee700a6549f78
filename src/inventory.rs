// qr-labels: semicolon-delimited inventory exports

use crate::error::AppError;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// Column Names
// ============================================================================

pub const MODEL_COLUMN: &str = "Modèle";
pub const ASSET_CODE_COLUMN: &str = "Code matériel";
pub const CATEGORY_COLUMN: &str = "Catégorie";
pub const SERIAL_NUMBER_COLUMN: &str = "Numéro de Série";
pub const SIGNAGE_COLUMN: &str = "Numéro de Signalétique";
pub const LOCATION_COLUMN: &str = "Localisation";

/// Mandatory columns of an equipment export
pub const EQUIPMENT_COLUMNS: [&str; 4] = [
    MODEL_COLUMN,
    ASSET_CODE_COLUMN,
    CATEGORY_COLUMN,
    SERIAL_NUMBER_COLUMN,
];

/// Mandatory columns of a meeting-room export
pub const ROOM_COLUMNS: [&str; 2] = [SIGNAGE_COLUMN, LOCATION_COLUMN];

/// Model name standing in for every row of a meeting-room batch,
/// also the default ticket category.
pub const MEETING_ROOM: &str = "Salle de Réunion";

const DELIMITER: u8 = b';';

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Equipment,
    Room,
}

impl BatchKind {
    pub fn mandatory_columns(self) -> &'static [&'static str] {
        match self {
            BatchKind::Equipment => &EQUIPMENT_COLUMNS,
            BatchKind::Room => &ROOM_COLUMNS,
        }
    }

    pub fn is_equipment(self) -> bool {
        self == BatchKind::Equipment
    }
}

/// One inventory record: column name to value, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column`, replacing an existing value in place.
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: &str) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.fields.push((column.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`Row::get`], but a missing column is a rendering error for row `index`.
    pub fn require(&self, column: &str, index: usize) -> Result<&str, AppError> {
        self.get(column).ok_or_else(|| AppError::MissingField {
            row: index + 1,
            column: column.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Model this row is grouped under: its `Modèle` value, or the
    /// meeting-room sentinel for room batches.
    pub fn model(&self, kind: BatchKind) -> Option<&str> {
        match kind {
            BatchKind::Equipment => self.get(MODEL_COLUMN),
            BatchKind::Room => Some(MEETING_ROOM),
        }
    }

    /// Bold last line of a caption identifying the labelled item.
    pub fn identity_line(&self, kind: BatchKind, index: usize) -> Result<String, AppError> {
        match kind {
            BatchKind::Equipment => Ok(format!(
                "{} {}",
                self.require(MODEL_COLUMN, index)?,
                self.require(ASSET_CODE_COLUMN, index)?
            )),
            BatchKind::Room => Ok(format!(
                "{} {} {}",
                MEETING_ROOM,
                self.require(SIGNAGE_COLUMN, index)?,
                self.require(LOCATION_COLUMN, index)?
            )),
        }
    }
}

/// A validated inventory file.
#[derive(Debug, Clone)]
pub struct Batch {
    pub kind: BatchKind,
    pub rows: Vec<Row>,
}

impl Batch {
    /// Distinct models with their instance counts, sorted by name.
    pub fn model_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            if let Some(model) = row.model(self.kind) {
                *counts.entry(model.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn distinct_models(&self) -> Vec<String> {
        self.model_counts().into_keys().collect()
    }

    /// Copy of the batch without the rows of `models`. Naming a model the
    /// batch does not contain, or leaving no rows, is a configuration error.
    pub fn without_models<S: AsRef<str>>(&self, models: &[S]) -> Result<Batch, AppError> {
        let known = self.model_counts();
        if let Some(unknown) = models
            .iter()
            .map(AsRef::as_ref)
            .find(|model| !known.contains_key(*model))
        {
            return Err(AppError::ConfigError(format!(
                "model '{}' is not in the inventory",
                unknown
            )));
        }

        let skipped = |row: &Row| {
            row.model(self.kind)
                .is_some_and(|model| models.iter().any(|s| s.as_ref() == model))
        };
        let rows: Vec<Row> = self.rows.iter().filter(|row| !skipped(row)).cloned().collect();
        if rows.is_empty() {
            return Err(AppError::ConfigError(
                "every model was skipped, nothing to print".to_string(),
            ));
        }

        debug!("skipped {} of {} rows", self.rows.len() - rows.len(), self.rows.len());
        Ok(Batch {
            kind: self.kind,
            rows,
        })
    }
}

// ============================================================================
// Loading and Validation
// ============================================================================

pub fn load_batch(path: &Path) -> Result<Batch, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::CsvError(format!("{}: {}", path.display(), e)))?;
    let batch = parse_batch(&content)?;
    info!(
        "Loaded {} {} rows from {}",
        batch.rows.len(),
        if batch.kind.is_equipment() { "equipment" } else { "room" },
        path.display()
    );
    Ok(batch)
}

/// Parse and validate a whole export. Any blank mandatory value rejects the file.
pub fn parse_batch(content: &str) -> Result<Batch, AppError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let kind = detect_kind(&headers)?;
    let columns: Vec<(usize, &str)> = kind
        .mandatory_columns()
        .iter()
        .filter_map(|name| headers.iter().position(|h| h == name).map(|idx| (idx, *name)))
        .collect();
    debug!("Detected {:?} batch, columns {:?}", kind, columns);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = index + 2;
        let mut row = Row::new();
        for &(idx, name) in &columns {
            let value = record.get(idx).unwrap_or("").trim();
            if value.is_empty() {
                return Err(AppError::Schema(format!(
                    "column '{}' contains a blank value (line {})",
                    name, line
                )));
            }
            row.set(name, value);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(AppError::EmptyBatch);
    }

    Ok(Batch { kind, rows })
}

fn detect_kind(headers: &[String]) -> Result<BatchKind, AppError> {
    let has_all = |cols: &[&str]| cols.iter().all(|c| headers.iter().any(|h| h == c));

    if has_all(&EQUIPMENT_COLUMNS) {
        Ok(BatchKind::Equipment)
    } else if has_all(&ROOM_COLUMNS) {
        Ok(BatchKind::Room)
    } else {
        Err(AppError::Schema(format!(
            "expected either {:?} for equipment or {:?} for meeting rooms",
            EQUIPMENT_COLUMNS, ROOM_COLUMNS
        )))
    }
}
