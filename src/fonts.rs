// qr-labels: caption font faces and text measurement

use crate::error::AppError;
use ab_glyph::{Font, FontVec};
use printpdf::{BuiltinFont, IndirectFontRef, PdfDocumentReference};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Width used for characters missing from a builtin width table
const FALLBACK_ADVANCE: u16 = 556;

/// Helvetica advance widths (1/1000 em) for ASCII 0x20..=0x7E
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica-Bold advance widths (1/1000 em) for ASCII 0x20..=0x7E
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

// ============================================================================
// Measurement
// ============================================================================

pub trait TextMeasure {
    /// Rendered width of `text` in points at `size` points.
    fn text_width(&self, text: &str, size: f32) -> f32;
}

/// One weight of the caption typeface.
pub enum FontFace {
    /// PDF base-14 font, measured from its standard width table.
    Builtin {
        font: BuiltinFont,
        widths: &'static [u16; 95],
    },
    /// TrueType/OpenType font embedded in every document.
    Embedded { data: Vec<u8>, font: FontVec },
}

impl FontFace {
    pub fn helvetica() -> Self {
        FontFace::Builtin {
            font: BuiltinFont::Helvetica,
            widths: &HELVETICA_WIDTHS,
        }
    }

    pub fn helvetica_bold() -> Self {
        FontFace::Builtin {
            font: BuiltinFont::HelveticaBold,
            widths: &HELVETICA_BOLD_WIDTHS,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, AppError> {
        let font = FontVec::try_from_vec(data.clone())
            .map_err(|e| AppError::AssetError(format!("invalid font data: {}", e)))?;
        Ok(FontFace::Embedded { data, font })
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let data = std::fs::read(path)
            .map_err(|e| AppError::AssetError(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded font {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data)
            .map_err(|e| AppError::AssetError(format!("{}: {}", path.display(), e)))
    }

    fn register(&self, doc: &PdfDocumentReference) -> Result<IndirectFontRef, AppError> {
        let font = match self {
            FontFace::Builtin { font, .. } => doc.add_builtin_font(*font),
            FontFace::Embedded { data, .. } => doc.add_external_font(Cursor::new(data.as_slice())),
        };
        font.map_err(|e| AppError::PdfError(e.to_string()))
    }
}

impl TextMeasure for FontFace {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        match self {
            FontFace::Builtin { widths, .. } => {
                let units: u32 = text.chars().map(|c| builtin_advance(widths, c) as u32).sum();
                units as f32 * size / 1000.0
            }
            FontFace::Embedded { font, .. } => {
                let units_per_em = font.units_per_em().unwrap_or(1000.0);
                let units: f32 = text
                    .chars()
                    .map(|c| font.h_advance_unscaled(font.glyph_id(c)))
                    .sum();
                units * size / units_per_em
            }
        }
    }
}

fn builtin_advance(widths: &[u16; 95], c: char) -> u16 {
    let c = strip_accent(c);
    match c as u32 {
        code @ 0x20..=0x7E => widths[(code - 0x20) as usize],
        _ => FALLBACK_ADVANCE,
    }
}

/// Accented Latin-1 letters share the advance of their base letter.
fn strip_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ÿ' | 'ý' => 'y',
        '\u{a0}' => ' ',
        other => other,
    }
}

// ============================================================================
// Caption Fonts
// ============================================================================

/// Regular weight for caption body lines, bold for the identity line.
pub struct CaptionFonts {
    pub regular: FontFace,
    pub bold: FontFace,
}

/// Fonts registered with one PDF document.
pub struct PdfFonts {
    pub regular: IndirectFontRef,
    pub bold: IndirectFontRef,
}

impl CaptionFonts {
    pub fn builtin() -> Self {
        Self {
            regular: FontFace::helvetica(),
            bold: FontFace::helvetica_bold(),
        }
    }

    pub fn load(regular: &Path, bold: &Path) -> Result<Self, AppError> {
        Ok(Self {
            regular: FontFace::load(regular)?,
            bold: FontFace::load(bold)?,
        })
    }

    pub fn register(&self, doc: &PdfDocumentReference) -> Result<PdfFonts, AppError> {
        Ok(PdfFonts {
            regular: self.regular.register(doc)?,
            bold: self.bold.register(doc)?,
        })
    }
}

impl Default for CaptionFonts {
    fn default() -> Self {
        Self::builtin()
    }
}
