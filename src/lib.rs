//! QR-code sticker sheets for inventory equipment and meeting rooms.
//!
//! A semicolon-delimited inventory export is validated ([`inventory`]), each
//! distinct model is assigned to a sticker sheet ([`session::ModelAssignment`]),
//! and one A4 PDF per sheet format is rendered. Every label carries a QR code
//! linking to a prefilled ticket form ([`ticket_url`], [`qr`]) and a caption
//! auto-fitted to the label ([`caption`]).
//!
//! ```no_run
//! use qr_labels::{
//!     load_batch, run_generation, LabelFormat, ModelAssignment, NoopProgress, RenderAssets,
//!     RenderSettings,
//! };
//! use std::path::Path;
//!
//! let batch = load_batch(Path::new("inventaire.csv"))?;
//! let assignment = ModelAssignment::uniform(batch.distinct_models(), LabelFormat::SmallSquare);
//! let settings = RenderSettings::new("stickers");
//! let summary = run_generation(&batch, &assignment, &settings, &RenderAssets::default(), &NoopProgress)?;
//! println!("{} labels", summary.total_labels());
//! # Ok::<(), qr_labels::AppError>(())
//! ```

pub mod caption;
pub mod config;
pub mod error;
pub mod fonts;
pub mod format;
pub mod inventory;
pub mod layout;
pub mod progress;
pub mod qr;
pub mod report;
pub mod session;
pub mod ticket_url;

pub use config::{AssetPaths, FormatTable, RenderAssets, RenderSettings};
pub use error::AppError;
pub use format::{LabelFormat, SheetGeometry};
pub use inventory::{load_batch, parse_batch, Batch, BatchKind, Row};
pub use progress::{ChannelProgress, GenerationProgress, NoopProgress, ProgressEvent};
pub use report::{GenerationSummary, OutputFile};
pub use session::{partition, run_generation, ModelAssignment, RenderJob};
