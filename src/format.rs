// qr-labels: sticker sheet formats and their geometry

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A4 dimensions in mm
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;

/// Width and height of the page logo at scale 1.0
pub const LOGO_WIDTH_MM: f32 = 62.0;
pub const LOGO_HEIGHT_MM: f32 = 24.0;

pub const MM_PER_PT: f32 = 25.4 / 72.0;

pub fn pt_to_mm(pt: f32) -> f32 {
    pt * MM_PER_PT
}

pub fn mm_to_pt(mm: f32) -> f32 {
    mm / MM_PER_PT
}

// ============================================================================
// Label Formats
// ============================================================================

/// The three supported sticker sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LabelFormat {
    /// Avery Zweckform 3483: logo, large QR code, caption below
    LargeVertical,
    /// Avery Zweckform 3424: logo and caption left, QR code right
    MediumHorizontal,
    /// Avery Zweckform 3661: QR code with embedded logo, caption below
    SmallSquare,
}

impl LabelFormat {
    pub const ALL: [LabelFormat; 3] = [
        LabelFormat::LargeVertical,
        LabelFormat::MediumHorizontal,
        LabelFormat::SmallSquare,
    ];

    pub fn description(self) -> &'static str {
        match self {
            LabelFormat::LargeVertical => "Grand Vertical (largeur, hauteur) = (10.4 cm, 14.7 cm)",
            LabelFormat::MediumHorizontal => "Moyen Horizontal (largeur, hauteur) = (10.4 cm, 4.8 cm)",
            LabelFormat::SmallSquare => "Petit Carré (largeur, hauteur) = (6.9 cm, 6.7 cm)",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            LabelFormat::LargeVertical => "largeVerticalQRs.pdf",
            LabelFormat::MediumHorizontal => "mediumHoriQRs.pdf",
            LabelFormat::SmallSquare => "smallSquareQRs.pdf",
        }
    }

    pub fn cli_name(self) -> &'static str {
        match self {
            LabelFormat::LargeVertical => "large-vertical",
            LabelFormat::MediumHorizontal => "medium-horizontal",
            LabelFormat::SmallSquare => "small-square",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.cli_name() == name.trim())
    }

    /// Factory geometry matching the physical sheet.
    pub fn default_geometry(self) -> SheetGeometry {
        match self {
            LabelFormat::LargeVertical => SheetGeometry {
                start_x_mm: 15.0,
                start_from_top_mm: 33.0,
                columns: 2,
                rows: 2,
                column_pitch_mm: 104.0,
                row_pitch_mm: 149.0,
                logo: Some(LogoPlacement {
                    dx_mm: 0.0,
                    dy_mm: 0.0,
                    width_mm: 1.25 * LOGO_WIDTH_MM,
                    height_mm: 1.25 * LOGO_HEIGHT_MM,
                }),
                qr: QrPlacement {
                    dx_mm: -12.0,
                    dy_mm: -100.0,
                    size_mm: 100.0,
                    embed_logo: false,
                },
                caption: CaptionPlacement {
                    dx_mm: 38.0,
                    dy_mm: -100.0,
                    max_width_mm: 90.0,
                    max_font_size: 16.0,
                    max_lines: 2,
                },
            },
            LabelFormat::MediumHorizontal => SheetGeometry {
                start_x_mm: 3.0,
                start_from_top_mm: 26.0,
                columns: 2,
                rows: 6,
                column_pitch_mm: 105.0,
                row_pitch_mm: 49.0,
                logo: Some(LogoPlacement {
                    dx_mm: 0.0,
                    dy_mm: 0.0,
                    width_mm: 0.9 * LOGO_WIDTH_MM,
                    height_mm: 0.9 * LOGO_HEIGHT_MM,
                }),
                qr: QrPlacement {
                    dx_mm: 55.0,
                    dy_mm: -19.87,
                    size_mm: 44.0,
                    embed_logo: false,
                },
                caption: CaptionPlacement {
                    dx_mm: 27.0,
                    // One line of the largest caption size below the logo
                    dy_mm: -pt_to_mm(12.0),
                    max_width_mm: LOGO_WIDTH_MM - 10.0,
                    max_font_size: 12.0,
                    max_lines: 3,
                },
            },
            LabelFormat::SmallSquare => SheetGeometry {
                start_x_mm: 2.5,
                start_from_top_mm: 68.0,
                columns: 3,
                rows: 4,
                column_pitch_mm: 72.5,
                row_pitch_mm: 70.0,
                logo: None,
                qr: QrPlacement {
                    dx_mm: 0.0,
                    dy_mm: 0.0,
                    size_mm: 60.0,
                    embed_logo: true,
                },
                caption: CaptionPlacement {
                    dx_mm: 30.0,
                    dy_mm: 0.0,
                    max_width_mm: 60.0,
                    max_font_size: 10.0,
                    max_lines: 2,
                },
            },
        }
    }
}

impl fmt::Display for LabelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Where each label goes on a sheet and where its parts sit relative to
/// the label's anchor. All lengths in mm, PDF orientation (y grows upward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetGeometry {
    /// Anchor of the first label, from the left page edge
    pub start_x_mm: f32,
    /// Anchor of the first label, down from the top page edge
    pub start_from_top_mm: f32,
    pub columns: u32,
    pub rows: u32,
    pub column_pitch_mm: f32,
    pub row_pitch_mm: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoPlacement>,
    pub qr: QrPlacement,
    pub caption: CaptionPlacement,
}

/// Bottom-left corner offset and size of the page logo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogoPlacement {
    pub dx_mm: f32,
    pub dy_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Bottom-left corner offset and side of the QR code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QrPlacement {
    pub dx_mm: f32,
    pub dy_mm: f32,
    pub size_mm: f32,
    #[serde(default)]
    pub embed_logo: bool,
}

/// Caption centre line and first baseline offset, plus fitting limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptionPlacement {
    pub dx_mm: f32,
    pub dy_mm: f32,
    pub max_width_mm: f32,
    pub max_font_size: f32,
    pub max_lines: usize,
}

impl SheetGeometry {
    pub fn labels_per_page(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    /// Anchor of label slot `slot` (0-based, row-major) on a page `page_height_mm` tall.
    pub fn anchor(&self, slot: usize, page_height_mm: f32) -> (f32, f32) {
        let columns = self.columns.max(1) as usize;
        let column = (slot % columns) as f32;
        let row = (slot / columns) as f32;
        (
            self.start_x_mm + column * self.column_pitch_mm,
            page_height_mm - self.start_from_top_mm - row * self.row_pitch_mm,
        )
    }
}
