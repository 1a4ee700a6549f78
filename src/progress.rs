//! Progress events emitted while sheets are rendered.
//!
//! Rendering is synchronous. A front end that must stay responsive runs
//! [`crate::session::run_generation`] on a worker thread with a
//! [`ChannelProgress`] and drains the receiving end on its own thread.

use crate::format::LabelFormat;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

/// Called by the generation session as it works through each job.
///
/// All methods have default no-op implementations so callers only
/// override what they care about.
pub trait GenerationProgress: Send {
    /// Called before the first label of a job.
    ///
    /// # Arguments
    /// * `format`: sheet being rendered
    /// * `labels`: rows assigned to it
    fn on_job_start(&self, format: LabelFormat, labels: usize) {
        let _ = (format, labels);
    }

    /// Called once per label, as soon as its ticket URL is built.
    ///
    /// # Arguments
    /// * `percent`: `100 * index / total` rounded half to even, 0 for the first label
    /// * `status`: the ticket URL just encoded
    fn on_row(&self, format: LabelFormat, percent: u8, status: &str) {
        let _ = (format, percent, status);
    }

    /// Called once the job's document is on disk. Reports 100%.
    fn on_job_complete(&self, format: LabelFormat, path: &std::path::Path) {
        let _ = (format, path);
    }
}

/// Discards every event.
pub struct NoopProgress;

impl GenerationProgress for NoopProgress {}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    JobStarted { format: LabelFormat, labels: usize },
    Row { format: LabelFormat, percent: u8, status: String },
    JobCompleted { format: LabelFormat, path: PathBuf },
}

/// Forwards events over a channel. A dropped receiver is ignored.
pub struct ChannelProgress {
    tx: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl GenerationProgress for ChannelProgress {
    fn on_job_start(&self, format: LabelFormat, labels: usize) {
        let _ = self.tx.send(ProgressEvent::JobStarted { format, labels });
    }

    fn on_row(&self, format: LabelFormat, percent: u8, status: &str) {
        let _ = self.tx.send(ProgressEvent::Row {
            format,
            percent,
            status: status.to_string(),
        });
    }

    fn on_job_complete(&self, format: LabelFormat, path: &std::path::Path) {
        let _ = self.tx.send(ProgressEvent::JobCompleted {
            format,
            path: path.to_path_buf(),
        });
    }
}

/// Percentage of a job done before label `index` (0-based) of `total`.
/// Ties round to the even neighbour, so 1 of 8 reports 12.
pub fn percent_done(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = 100 * index.min(total);
    let (quotient, remainder) = (scaled / total, scaled % total);
    let rounded = match (2 * remainder).cmp(&total) {
        Ordering::Greater => quotient + 1,
        Ordering::Equal => quotient + quotient % 2,
        Ordering::Less => quotient,
    };
    rounded as u8
}
