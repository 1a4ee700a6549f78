// qr-labels: split a batch into per-format jobs and render them

use crate::config::{RenderAssets, RenderSettings};
use crate::error::AppError;
use crate::format::LabelFormat;
use crate::inventory::{Batch, Row, MEETING_ROOM, MODEL_COLUMN};
use crate::layout::LayoutEngine;
use crate::progress::GenerationProgress;
use crate::report::{GenerationSummary, OutputFile};
use printpdf::PdfDocumentReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

// ============================================================================
// Model Assignment
// ============================================================================

/// Which sheet each model's labels are printed on. Room batches use the
/// single model [`MEETING_ROOM`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelAssignment {
    formats: BTreeMap<String, LabelFormat>,
}

impl ModelAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every model in `models` on the same sheet.
    pub fn uniform<I, S>(models: I, format: LabelFormat) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut assignment = Self::new();
        for model in models {
            assignment.assign(model, format);
        }
        assignment
    }

    pub fn for_rooms(format: LabelFormat) -> Self {
        Self::uniform([MEETING_ROOM], format)
    }

    pub fn assign(&mut self, model: impl Into<String>, format: LabelFormat) {
        self.formats.insert(model.into(), format);
    }

    pub fn format_for(&self, model: &str) -> Option<LabelFormat> {
        self.formats.get(model).copied()
    }

    pub fn models_for(&self, format: LabelFormat) -> Vec<&str> {
        self.formats
            .iter()
            .filter(|(_, f)| **f == format)
            .map(|(model, _)| model.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Read a `{ "<model>": "<format>" }` JSON object.
    pub fn from_json_str(content: &str) -> Result<Self, AppError> {
        serde_json::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Invalid assignment JSON: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Fails on the first model of `batch` (by name) with no format.
    pub fn ensure_complete(&self, batch: &Batch) -> Result<(), AppError> {
        for model in batch.distinct_models() {
            if self.format_for(&model).is_none() {
                return Err(AppError::UnassignedModel(model));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// The rows printed on one format's sheets, in print order.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub format: LabelFormat,
    pub rows: Vec<Row>,
}

/// One job per format, in [`LabelFormat::ALL`] order, possibly empty.
/// Every row lands in exactly one job. Equipment rows are stable-sorted
/// by model.
pub fn partition(batch: &Batch, assignment: &ModelAssignment) -> Result<Vec<RenderJob>, AppError> {
    assignment.ensure_complete(batch)?;

    let mut rows_by_format: BTreeMap<LabelFormat, Vec<Row>> = BTreeMap::new();
    for row in &batch.rows {
        if let Some(format) = row.model(batch.kind).and_then(|m| assignment.format_for(m)) {
            rows_by_format.entry(format).or_default().push(row.clone());
        }
    }

    Ok(LabelFormat::ALL
        .into_iter()
        .map(|format| {
            let mut rows = rows_by_format.remove(&format).unwrap_or_default();
            if batch.kind.is_equipment() {
                rows.sort_by(|a, b| a.get(MODEL_COLUMN).cmp(&b.get(MODEL_COLUMN)));
            }
            RenderJob { format, rows }
        })
        .collect())
}

// ============================================================================
// Generation
// ============================================================================

/// Render every non-empty job, one after the other, and write one PDF per
/// format into `settings.output_dir`. Formats without rows get no file.
///
/// A failing row aborts the run. Documents are persisted atomically, so the
/// failing format never leaves a file behind.
pub fn run_generation(
    batch: &Batch,
    assignment: &ModelAssignment,
    settings: &RenderSettings,
    assets: &RenderAssets,
    progress: &dyn GenerationProgress,
) -> Result<GenerationSummary, AppError> {
    let jobs = partition(batch, assignment)?;
    std::fs::create_dir_all(&settings.output_dir)?;

    let mut summary = GenerationSummary::new();

    for job in jobs {
        if job.rows.is_empty() {
            debug!("{}: no rows assigned, skipping", job.format);
            summary.skipped.push(job.format);
            continue;
        }

        info!("{}: rendering {} labels", job.format, job.rows.len());
        progress.on_job_start(job.format, job.rows.len());

        let engine = LayoutEngine {
            format: job.format,
            geometry: settings.formats.get(job.format),
            assets,
            endpoint: &settings.endpoint,
            caption: &settings.caption,
        };
        let sheet = engine.render(batch.kind, &job.rows, progress)?;

        let path = settings.output_dir.join(job.format.file_name());
        save_atomically(sheet.doc, &path)?;
        progress.on_job_complete(job.format, &path);
        info!("{}: wrote {}", job.format, path.display());

        summary.outputs.push(OutputFile {
            format: job.format,
            path,
            labels: sheet.labels,
            pages: sheet.pages,
        });
    }

    Ok(summary)
}

/// Save into a temporary file beside `path`, then rename over it.
fn save_atomically(doc: PdfDocumentReference, path: &Path) -> Result<(), AppError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = output_temp_file(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        doc.save(&mut writer)
            .map_err(|e| AppError::PdfError(e.to_string()))?;
        writer.flush()?;
    }
    temp.persist(path).map_err(|e| AppError::IoError(e.error))?;
    Ok(())
}

/// Temporary files are private by default. Outputs get the mode a plain
/// create would give them (0666 less the umask).
fn output_temp_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".qr-labels-").suffix(".pdf.tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{parse_batch, BatchKind, ASSET_CODE_COLUMN};
    use crate::progress::{NoopProgress, ProgressEvent};
    use std::sync::Mutex;

    const EQUIPMENT_CSV: &str = "\
Modèle;Code matériel;Catégorie;Numéro de Série
Latitude 5440;PC-001;Ordinateur;SN1
LaserJet M404;IMP-001;Imprimante;SN2
Latitude 5440;PC-002;Ordinateur;SN3
EliteDisplay E24;ECR-001;Écran;SN4
LaserJet M404;IMP-002;Imprimante;SN5
";

    fn codes(job: &RenderJob) -> Vec<&str> {
        job.rows
            .iter()
            .filter_map(|r| r.get(ASSET_CODE_COLUMN))
            .collect()
    }

    fn equipment_assignment() -> ModelAssignment {
        let mut assignment = ModelAssignment::new();
        assignment.assign("Latitude 5440", LabelFormat::SmallSquare);
        assignment.assign("EliteDisplay E24", LabelFormat::SmallSquare);
        assignment.assign("LaserJet M404", LabelFormat::LargeVertical);
        assignment
    }

    #[test]
    fn partition_keeps_every_row_once() {
        let batch = parse_batch(EQUIPMENT_CSV).unwrap();
        let jobs = partition(&batch, &equipment_assignment()).unwrap();
        assert_eq!(jobs.len(), 3);

        let total: usize = jobs.iter().map(|j| j.rows.len()).sum();
        assert_eq!(total, batch.rows.len());

        let mut models: Vec<&str> = jobs
            .iter()
            .flat_map(|j| j.rows.iter())
            .filter_map(|r| r.get(MODEL_COLUMN))
            .collect();
        models.sort();
        let mut expected: Vec<&str> = batch.rows.iter().filter_map(|r| r.get(MODEL_COLUMN)).collect();
        expected.sort();
        assert_eq!(models, expected);
    }

    #[test]
    fn partition_sorts_equipment_by_model_stably() {
        let batch = parse_batch(EQUIPMENT_CSV).unwrap();
        let jobs = partition(&batch, &equipment_assignment()).unwrap();
        assert_eq!(jobs[0].format, LabelFormat::LargeVertical);
        assert_eq!(codes(&jobs[0]), vec!["IMP-001", "IMP-002"]);
        assert!(jobs[1].rows.is_empty());
        assert_eq!(codes(&jobs[2]), vec!["ECR-001", "PC-001", "PC-002"]);
    }

    #[test]
    fn unassigned_model_is_rejected() {
        let batch = parse_batch(EQUIPMENT_CSV).unwrap();
        let mut assignment = ModelAssignment::new();
        assignment.assign("Latitude 5440", LabelFormat::SmallSquare);
        assert!(matches!(
            partition(&batch, &assignment),
            Err(AppError::UnassignedModel(_))
        ));
    }

    #[test]
    fn room_batch_goes_to_one_format() {
        let batch = parse_batch(
            "Numéro de Signalétique;Localisation\nA12;3F\nB07;RDC\n",
        )
        .unwrap();
        let jobs = partition(&batch, &ModelAssignment::for_rooms(LabelFormat::MediumHorizontal)).unwrap();
        let sizes: Vec<usize> = jobs.iter().map(|j| j.rows.len()).collect();
        assert_eq!(sizes, vec![0, 2, 0]);
    }

    #[test]
    fn assignment_reads_json_with_cli_names() {
        let assignment = ModelAssignment::from_json_str(
            r#"{"Latitude 5440": "small-square", "LaserJet M404": "large-vertical"}"#,
        )
        .unwrap();
        assert_eq!(assignment.len(), 2);
        assert_eq!(assignment.format_for("Latitude 5440"), Some(LabelFormat::SmallSquare));
        assert_eq!(assignment.models_for(LabelFormat::LargeVertical), vec!["LaserJet M404"]);
        assert!(ModelAssignment::from_json_str(r#"{"X": "huge"}"#).is_err());
    }

    #[test]
    fn generation_writes_only_formats_with_rows() {
        let dir = tempfile::tempdir().unwrap();
        let batch = parse_batch(EQUIPMENT_CSV).unwrap();
        let settings = RenderSettings::new(dir.path().join("out"));
        let summary = run_generation(
            &batch,
            &equipment_assignment(),
            &settings,
            &RenderAssets::default(),
            &NoopProgress,
        )
        .unwrap();

        assert_eq!(summary.skipped, vec![LabelFormat::MediumHorizontal]);
        assert_eq!(summary.total_labels(), 5);
        assert!(settings.output_dir.join("largeVerticalQRs.pdf").exists());
        assert!(settings.output_dir.join("smallSquareQRs.pdf").exists());
        assert!(!settings.output_dir.join("mediumHoriQRs.pdf").exists());

        let small = summary.output(LabelFormat::SmallSquare).unwrap();
        assert_eq!((small.labels, small.pages), (3, 1));
        let bytes = std::fs::read(&small.path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl GenerationProgress for Recorder {
        fn on_job_start(&self, format: LabelFormat, labels: usize) {
            if let Ok(mut events) = self.0.lock() {
                events.push(ProgressEvent::JobStarted { format, labels });
            }
        }

        fn on_job_complete(&self, format: LabelFormat, path: &Path) {
            if let Ok(mut events) = self.0.lock() {
                events.push(ProgressEvent::JobCompleted {
                    format,
                    path: path.to_path_buf(),
                });
            }
        }
    }

    #[test]
    fn jobs_run_in_format_order() {
        let dir = tempfile::tempdir().unwrap();
        let batch = parse_batch(EQUIPMENT_CSV).unwrap();
        let settings = RenderSettings::new(dir.path());
        let recorder = Recorder(Mutex::new(Vec::new()));
        run_generation(
            &batch,
            &equipment_assignment(),
            &settings,
            &RenderAssets::default(),
            &recorder,
        )
        .unwrap();

        let events = recorder.0.into_inner().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            ProgressEvent::JobStarted {
                format: LabelFormat::LargeVertical,
                labels: 2
            }
        );
        assert_eq!(
            events[3],
            ProgressEvent::JobCompleted {
                format: LabelFormat::SmallSquare,
                path: dir.path().join("smallSquareQRs.pdf")
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn saved_sheet_has_default_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let batch = parse_batch(EQUIPMENT_CSV).unwrap();
        let settings = RenderSettings::new(dir.path());
        let summary = run_generation(
            &batch,
            &equipment_assignment(),
            &settings,
            &RenderAssets::default(),
            &NoopProgress,
        )
        .unwrap();

        // Whatever the umask, a plain create in the same directory is the reference.
        let reference = dir.path().join("reference.pdf");
        std::fs::File::create(&reference).unwrap();
        let expected = std::fs::metadata(&reference).unwrap().permissions().mode() & 0o777;

        for output in &summary.outputs {
            let mode = std::fs::metadata(&output.path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, expected, "{}", output.path.display());
        }
    }

    #[test]
    fn failed_job_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let batch = Batch {
            kind: BatchKind::Equipment,
            rows: vec![Row::new().with(MODEL_COLUMN, "Latitude 5440")],
        };
        let settings = RenderSettings::new(dir.path());
        let result = run_generation(
            &batch,
            &ModelAssignment::uniform(["Latitude 5440"], LabelFormat::SmallSquare),
            &settings,
            &RenderAssets::default(),
            &NoopProgress,
        );
        assert!(matches!(result, Err(AppError::MissingField { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
