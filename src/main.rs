// qr-labels: Generate QR-code sticker sheets from inventory exports

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use qr_labels::inventory::MEETING_ROOM;
use qr_labels::{
    load_batch, run_generation, AppError, AssetPaths, Batch, ChannelProgress, FormatTable,
    GenerationSummary, LabelFormat, ModelAssignment, ProgressEvent, RenderAssets, RenderSettings,
};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Data Structures
// ============================================================================

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate QR-code sticker sheets for equipment and meeting rooms")]
struct Cli {
    /// Log debug details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an inventory export and list its models
    Models {
        /// Semicolon-delimited inventory file
        csv: PathBuf,
    },

    /// Render one PDF per sticker sheet format
    Generate(GenerateArgs),

    /// Print the sheet geometry as TOML
    Geometry {
        /// Geometry file to validate and print instead of the built-in table
        #[arg(long)]
        from: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Semicolon-delimited inventory file
    csv: PathBuf,

    /// Directory the PDFs are written to (created if missing)
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Put a model on a sheet format, e.g. "Latitude 5440=small-square" (repeatable)
    #[arg(short, long = "assign", value_name = "MODEL=FORMAT")]
    assign: Vec<String>,

    /// Leave a model's rows out of this run (repeatable)
    #[arg(long, value_name = "MODEL")]
    skip: Vec<String>,

    /// JSON object mapping models to sheet formats
    #[arg(long)]
    assignments: Option<PathBuf>,

    /// Format for every model not assigned otherwise (meeting rooms: the only format)
    #[arg(short, long, value_enum)]
    default_format: Option<LabelFormat>,

    /// Text printed above each identity line
    #[arg(short, long)]
    caption: Option<String>,

    /// Ticket form the QR codes link to
    #[arg(long)]
    endpoint: Option<String>,

    /// TOML file overriding sheet geometry
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// Logo image drawn next to each QR code
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Logo image embedded in small square QR codes
    #[arg(long)]
    qr_logo: Option<PathBuf>,

    /// Caption font, regular weight (TTF/OTF, requires --font-bold)
    #[arg(long)]
    font_regular: Option<PathBuf>,

    /// Caption font, bold weight (TTF/OTF, requires --font-regular)
    #[arg(long)]
    font_bold: Option<PathBuf>,

    /// Write a JSON summary of the generated files
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Models { csv } => list_models(&csv),
        Command::Generate(args) => generate(args),
        Command::Geometry { from } => print_geometry(from),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn list_models(csv: &std::path::Path) -> Result<(), AppError> {
    let batch = load_batch(csv)?;
    let kind = if batch.kind.is_equipment() {
        "equipment"
    } else {
        "meeting rooms"
    };

    println!("✓ Valid: {}", csv.display());
    println!("  Batch: {} ({} rows)", kind, batch.rows.len());
    for (model, count) in batch.model_counts() {
        println!("  {:>5}  {}", count, model);
    }
    Ok(())
}

fn print_geometry(from: Option<PathBuf>) -> Result<(), AppError> {
    let table = match from {
        Some(path) => FormatTable::load(&path)?,
        None => FormatTable::default(),
    };
    print!("{}", table.to_toml()?);
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<(), AppError> {
    let mut batch = load_batch(&args.csv)?;
    if !args.skip.is_empty() {
        let skipped: Vec<&str> = args.skip.iter().map(|model| model.trim()).collect();
        batch = batch.without_models(&skipped)?;
        info!("skipping {}", skipped.join(", "));
    }
    let assignment = build_assignment(&args, &batch)?;

    let mut settings = RenderSettings::new(&args.output_dir);
    if let Some(caption) = &args.caption {
        settings.caption = caption.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(path) = &args.geometry {
        settings.formats = FormatTable::load(path)?;
    }

    let assets = RenderAssets::load(&AssetPaths {
        logo: args.logo.clone(),
        qr_logo: args.qr_logo.clone(),
        font_regular: args.font_regular.clone(),
        font_bold: args.font_bold.clone(),
    })?;

    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        new_progress_bar()
    };

    // Rendering runs on a worker thread; this one only drains progress events.
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let progress = ChannelProgress::new(tx);
        run_generation(&batch, &assignment, &settings, &assets, &progress)
    });

    for event in rx {
        match event {
            ProgressEvent::JobStarted { format, labels } => {
                bar.set_prefix(format.to_string());
                bar.set_position(0);
                bar.set_message(format!("{} labels", labels));
            }
            ProgressEvent::Row { percent, status, .. } => {
                bar.set_position(percent as u64);
                bar.set_message(status);
            }
            ProgressEvent::JobCompleted { format, .. } => {
                bar.set_position(100);
                debug!("{} done", format);
            }
        }
    }
    bar.finish_and_clear();

    let summary = worker
        .join()
        .map_err(|_| AppError::PdfError("rendering thread panicked".to_string()))??;

    print_summary(&summary);

    if let Some(path) = &args.summary {
        summary.write_json(path)?;
        println!("  Summary: {}", path.display());
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos:>3}%  {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    bar.set_style(style);
    bar
}

/// Assignment file first, then `--assign` pairs, then `--default-format`
/// for whatever is left.
fn build_assignment(args: &GenerateArgs, batch: &Batch) -> Result<ModelAssignment, AppError> {
    let mut assignment = match &args.assignments {
        Some(path) => ModelAssignment::load(path)?,
        None => ModelAssignment::new(),
    };

    for pair in &args.assign {
        let (model, format) = parse_assign(pair)?;
        assignment.assign(model, format);
    }

    if let Some(format) = args.default_format {
        for model in batch.distinct_models() {
            if assignment.format_for(&model).is_none() {
                assignment.assign(model, format);
            }
        }
    }

    if !batch.kind.is_equipment() && assignment.format_for(MEETING_ROOM).is_none() {
        return Err(AppError::ConfigError(
            "meeting-room exports need --default-format".to_string(),
        ));
    }

    Ok(assignment)
}

fn parse_assign(pair: &str) -> Result<(String, LabelFormat), AppError> {
    let (model, format) = pair
        .rsplit_once('=')
        .ok_or_else(|| AppError::ConfigError(format!("expected MODEL=FORMAT, got '{}'", pair)))?;
    let format = LabelFormat::parse(format).ok_or_else(|| {
        AppError::ConfigError(format!(
            "unknown format '{}' (expected large-vertical, medium-horizontal or small-square)",
            format
        ))
    })?;
    Ok((model.trim().to_string(), format))
}

fn print_summary(summary: &GenerationSummary) {
    for output in &summary.outputs {
        println!("✓ Generated: {}", output.path.display());
        println!("  Format: {}", output.format.description());
        println!("  Labels: {} on {} page(s)", output.labels, output.pages);
    }
    for format in &summary.skipped {
        println!("  Skipped: {} (no models assigned)", format);
    }
}
