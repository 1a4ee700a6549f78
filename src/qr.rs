// qr-labels: styled QR codes

use crate::error::AppError;
use ::image::imageops::{self, FilterType};
use ::image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};

/// Pixels per QR module when a code is rasterized
pub const MODULE_PX: u32 = 10;

/// Light modules around the symbol
pub const QUIET_ZONE_MODULES: u32 = 4;

/// Module colour, RGB (1, 158, 227)
pub const FRONT_COLOR: [u8; 3] = [1, 158, 227];
const BACK_COLOR: [u8; 3] = [255, 255, 255];

/// Embedded logos are shrunk to this fraction of their bitmap size
pub const EMBEDDED_LOGO_RATIO: f32 = 0.3;

// ============================================================================
// Logo Preparation
// ============================================================================

/// Scale a logo for embedding in QR codes. Done once per run, not per code.
pub fn prepare_embedded_logo(logo: &DynamicImage) -> RgbaImage {
    let rgba = logo.to_rgba8();
    let width = ((rgba.width() as f32 * EMBEDDED_LOGO_RATIO) as u32).max(1);
    let height = ((rgba.height() as f32 * EMBEDDED_LOGO_RATIO) as u32).max(1);
    imageops::resize(&rgba, width, height, FilterType::Lanczos3)
}

// ============================================================================
// Styled Codes
// ============================================================================

/// Rounded corners of a run of modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Corners {
    pub top_left: bool,
    pub top_right: bool,
    pub bottom_right: bool,
    pub bottom_left: bool,
}

/// Horizontal run of dark modules. Coordinates are in modules from the
/// top-left corner of the quiet zone, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRun {
    pub x: u32,
    pub y: u32,
    pub len: u32,
    pub corners: Corners,
}

/// The embedded logo and the modules under it, as pixels at [`MODULE_PX`]
/// per module. `x_px`/`y_px` is its top-left corner in the same raster.
#[derive(Debug, Clone)]
pub struct LogoPatch {
    pub x_px: u32,
    pub y_px: u32,
    pub image: RgbImage,
}

/// An error-correction level L QR code with rounded modules, blue on white.
///
/// Modules are kept as runs so they can be drawn as paths; only the logo,
/// when there is one, needs pixels.
#[derive(Debug, Clone)]
pub struct StyledQr {
    /// Side length in modules, quiet zone included
    pub side: u32,
    pub runs: Vec<ModuleRun>,
    pub logo: Option<LogoPatch>,
}

impl StyledQr {
    /// Encode `url`. With `logo`, the image is alpha-composited over the
    /// centre of the code. The overlay is not re-validated for
    /// scannability; level L leaves little margin, so embedded logos must
    /// stay small.
    pub fn new(url: &str, logo: Option<&RgbaImage>) -> Result<Self, AppError> {
        let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)
            .map_err(|e| AppError::QrError(e.to_string()))?;

        let modules = code.width() as i64;
        let is_dark = |x: i64, y: i64| -> bool {
            x >= 0
                && y >= 0
                && x < modules
                && y < modules
                && code[(x as usize, y as usize)] == Color::Dark
        };

        let mut runs = Vec::new();
        for y in 0..modules {
            let mut x = 0;
            while x < modules {
                if !is_dark(x, y) {
                    x += 1;
                    continue;
                }
                let start = x;
                while is_dark(x, y) {
                    x += 1;
                }
                let last = x - 1;
                // A corner is rounded when neither side it touches continues the shape.
                runs.push(ModuleRun {
                    x: start as u32 + QUIET_ZONE_MODULES,
                    y: y as u32 + QUIET_ZONE_MODULES,
                    len: (x - start) as u32,
                    corners: Corners {
                        top_left: !is_dark(start, y - 1),
                        top_right: !is_dark(last, y - 1),
                        bottom_right: !is_dark(last, y + 1),
                        bottom_left: !is_dark(start, y + 1),
                    },
                });
            }
        }

        let mut qr = Self {
            side: modules as u32 + 2 * QUIET_ZONE_MODULES,
            runs,
            logo: None,
        };
        if let Some(logo) = logo {
            qr.logo = qr.logo_patch(logo);
        }
        Ok(qr)
    }

    pub fn side_px(&self) -> u32 {
        self.side * MODULE_PX
    }

    /// Draw the whole code at [`MODULE_PX`] pixels per module, logo included.
    pub fn rasterize(&self) -> RgbImage {
        let mut canvas = self.modules_canvas();
        if let Some(patch) = &self.logo {
            imageops::replace(&mut canvas, &patch.image, patch.x_px as i64, patch.y_px as i64);
        }
        canvas
    }

    fn modules_canvas(&self) -> RgbImage {
        let side = self.side_px();
        let mut canvas = RgbImage::from_pixel(side, side, Rgb(BACK_COLOR));
        for run in &self.runs {
            fill_run(&mut canvas, run);
        }
        canvas
    }

    /// Composite `logo` at the centre and cut out the part of the canvas it
    /// covers. Returns `None` when nothing of the logo lands on the code.
    fn logo_patch(&self, logo: &RgbaImage) -> Option<LogoPatch> {
        let side = self.side_px() as i64;
        let (w, h) = (logo.width() as i64, logo.height() as i64);
        let x = (side - w) / 2;
        let y = (side - h) / 2;
        let (x0, y0) = (x.max(0), y.max(0));
        let (x1, y1) = ((x + w).min(side), (y + h).min(side));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let mut canvas = DynamicImage::ImageRgb8(self.modules_canvas()).to_rgba8();
        imageops::overlay(&mut canvas, logo, x, y);
        let patch = imageops::crop_imm(
            &canvas,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )
        .to_image();

        Some(LogoPatch {
            x_px: x0 as u32,
            y_px: y0 as u32,
            image: DynamicImage::ImageRgba8(patch).to_rgb8(),
        })
    }
}

fn fill_run(canvas: &mut RgbImage, run: &ModuleRun) {
    for i in 0..run.len {
        let first = i == 0;
        let last = i + 1 == run.len;
        let corners = Corners {
            top_left: first && run.corners.top_left,
            top_right: last && run.corners.top_right,
            bottom_right: last && run.corners.bottom_right,
            bottom_left: first && run.corners.bottom_left,
        };
        fill_module(canvas, (run.x + i) * MODULE_PX, run.y * MODULE_PX, &corners);
    }
}

fn fill_module(canvas: &mut RgbImage, x0: u32, y0: u32, rounded: &Corners) {
    let half = MODULE_PX as f32 / 2.0;

    for dy in 0..MODULE_PX {
        for dx in 0..MODULE_PX {
            let left = (dx as f32) < half;
            let top = (dy as f32) < half;
            let corner_rounded = match (top, left) {
                (true, true) => rounded.top_left,
                (true, false) => rounded.top_right,
                (false, true) => rounded.bottom_left,
                (false, false) => rounded.bottom_right,
            };
            if corner_rounded {
                let cx = dx as f32 + 0.5 - half;
                let cy = dy as f32 + 0.5 - half;
                if cx * cx + cy * cy > half * half {
                    continue;
                }
            }
            canvas.put_pixel(x0 + dx, y0 + dy, Rgb(FRONT_COLOR));
        }
    }
}
