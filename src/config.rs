// qr-labels: run settings, sheet geometry files and bundled assets

use crate::caption::MIN_FONT_SIZE;
use crate::error::AppError;
use crate::fonts::CaptionFonts;
use crate::format::{LabelFormat, SheetGeometry};
use crate::qr::prepare_embedded_logo;
use crate::ticket_url::DEFAULT_TICKET_ENDPOINT;
use ::image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Caption printed above the identity line when none is given
pub const DEFAULT_CAPTION: &str = "Un problème ? Scannez ce QR code pour ouvrir un ticket";

// ============================================================================
// Geometry Table
// ============================================================================

/// Geometry for every format. Sections missing from a geometry file keep
/// their factory values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatTable {
    pub large_vertical: SheetGeometry,
    pub medium_horizontal: SheetGeometry,
    pub small_square: SheetGeometry,
}

#[derive(Debug, Default, Deserialize)]
struct FormatTableFile {
    large_vertical: Option<SheetGeometry>,
    medium_horizontal: Option<SheetGeometry>,
    small_square: Option<SheetGeometry>,
}

impl Default for FormatTable {
    fn default() -> Self {
        Self {
            large_vertical: LabelFormat::LargeVertical.default_geometry(),
            medium_horizontal: LabelFormat::MediumHorizontal.default_geometry(),
            small_square: LabelFormat::SmallSquare.default_geometry(),
        }
    }
}

impl FormatTable {
    pub fn get(&self, format: LabelFormat) -> &SheetGeometry {
        match format {
            LabelFormat::LargeVertical => &self.large_vertical,
            LabelFormat::MediumHorizontal => &self.medium_horizontal,
            LabelFormat::SmallSquare => &self.small_square,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        let file: FormatTableFile =
            toml::from_str(content).map_err(|e| AppError::ConfigError(e.to_string()))?;
        let defaults = Self::default();
        let table = Self {
            large_vertical: file.large_vertical.unwrap_or(defaults.large_vertical),
            medium_horizontal: file.medium_horizontal.unwrap_or(defaults.medium_horizontal),
            small_square: file.small_square.unwrap_or(defaults.small_square),
        };
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_toml_str(&content)
            .map_err(|e| AppError::ConfigError(format!("{}: {}", path.display(), e)))?;
        info!("Loaded sheet geometry from {}", path.display());
        Ok(table)
    }

    pub fn to_toml(&self) -> Result<String, AppError> {
        toml::to_string_pretty(self).map_err(|e| AppError::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for format in LabelFormat::ALL {
            let g = self.get(format);
            let invalid = |what: &str| {
                Err(AppError::ConfigError(format!("{}: {}", format, what)))
            };
            if g.columns == 0 || g.rows == 0 {
                return invalid("grid needs at least one column and one row");
            }
            if g.qr.size_mm <= 0.0 {
                return invalid("QR code size must be positive");
            }
            if g.caption.max_lines == 0 {
                return invalid("caption needs at least one line");
            }
            if g.caption.max_width_mm <= 0.0 {
                return invalid("caption width must be positive");
            }
            if g.caption.max_font_size < MIN_FONT_SIZE {
                return invalid("caption font size is below the 4pt minimum");
            }
            if let Some(logo) = g.logo {
                if logo.width_mm <= 0.0 || logo.height_mm <= 0.0 {
                    return invalid("logo size must be positive");
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Run Settings
// ============================================================================

pub struct RenderSettings {
    pub output_dir: PathBuf,
    /// Free text wrapped above each identity line
    pub caption: String,
    /// Ticket form the QR codes link to
    pub endpoint: String,
    pub formats: FormatTable,
}

impl RenderSettings {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            caption: DEFAULT_CAPTION.to_string(),
            endpoint: DEFAULT_TICKET_ENDPOINT.to_string(),
            formats: FormatTable::default(),
        }
    }
}

// ============================================================================
// Assets
// ============================================================================

/// Asset files given on the command line. Each one is optional.
#[derive(Debug, Clone, Default)]
pub struct AssetPaths {
    /// Full-colour logo drawn on the sheet next to each code
    pub logo: Option<PathBuf>,
    /// Logo with transparency, embedded in the centre of codes
    pub qr_logo: Option<PathBuf>,
    pub font_regular: Option<PathBuf>,
    pub font_bold: Option<PathBuf>,
}

/// Fonts and images shared by every label of a run.
pub struct RenderAssets {
    pub fonts: CaptionFonts,
    pub page_logo: Option<RgbImage>,
    /// Already scaled for embedding
    pub qr_logo: Option<RgbaImage>,
}

impl Default for RenderAssets {
    fn default() -> Self {
        Self {
            fonts: CaptionFonts::builtin(),
            page_logo: None,
            qr_logo: None,
        }
    }
}

impl RenderAssets {
    /// Load everything up front. Any configured file that cannot be read is fatal.
    pub fn load(paths: &AssetPaths) -> Result<Self, AppError> {
        let fonts = match (&paths.font_regular, &paths.font_bold) {
            (Some(regular), Some(bold)) => CaptionFonts::load(regular, bold)?,
            (None, None) => {
                debug!("No caption fonts given, using Helvetica");
                CaptionFonts::builtin()
            }
            _ => {
                return Err(AppError::ConfigError(
                    "--font-regular and --font-bold must be given together".to_string(),
                ))
            }
        };

        let page_logo = paths
            .logo
            .as_deref()
            .map(load_image)
            .transpose()?
            .map(|img| flatten_on_white(&img));

        let qr_logo = paths
            .qr_logo
            .as_deref()
            .map(load_image)
            .transpose()?
            .map(|img| prepare_embedded_logo(&img));

        Ok(Self {
            fonts,
            page_logo,
            qr_logo,
        })
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, AppError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::AssetError(format!("{}: {}", path.display(), e)))?;
    let img = ::image::load_from_memory(&bytes)
        .map_err(|e| AppError::AssetError(format!("{}: failed to decode image: {}", path.display(), e)))?;
    debug!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(img)
}

/// Composite an image with transparency against a white background.
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba_image = img.to_rgba8();
    let (width_px, height_px) = rgba_image.dimensions();

    let mut rgb_image = RgbImage::new(width_px, height_px);
    for (x, y, pixel) in rgba_image.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let bg = 255.0;
        let out_r = (r as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_g = (g as f32 * alpha + bg * (1.0 - alpha)) as u8;
        let out_b = (b as f32 * alpha + bg * (1.0 - alpha)) as u8;
        rgb_image.put_pixel(x, y, ::image::Rgb([out_r, out_g, out_b]));
    }
    rgb_image
}
