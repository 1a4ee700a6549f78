// qr-labels: place labels on sticker sheets

use crate::caption::{fit_caption, CaptionBox, FittedCaption, WrapCache};
use crate::config::RenderAssets;
use crate::error::AppError;
use crate::fonts::{PdfFonts, TextMeasure};
use crate::format::{mm_to_pt, pt_to_mm, LabelFormat, SheetGeometry, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use crate::inventory::{BatchKind, Row};
use crate::progress::{percent_done, GenerationProgress};
use crate::qr::{ModuleRun, StyledQr, FRONT_COLOR};
use crate::ticket_url::build_url;
use ::image::RgbImage;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::*;
use tracing::{debug, info};

// ============================================================================
// Cursor
// ============================================================================

/// Pen position of the next label on the current sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub x_mm: f32,
    pub y_mm: f32,
    /// Labels already placed on the current page
    pub count: usize,
    /// 0-based page index
    pub page: usize,
}

impl Cursor {
    pub fn start(geometry: &SheetGeometry) -> Self {
        let (x_mm, y_mm) = geometry.anchor(0, PAGE_HEIGHT_MM);
        Self {
            x_mm,
            y_mm,
            count: 0,
            page: 0,
        }
    }

    /// Move past the label just placed. Returns true when that label filled
    /// the page and the cursor went back to the start anchor of a new one.
    pub fn advance(&mut self, geometry: &SheetGeometry) -> bool {
        self.count += 1;
        let page_full = self.count >= geometry.labels_per_page();
        if page_full {
            self.count = 0;
            self.page += 1;
        }
        let (x_mm, y_mm) = geometry.anchor(self.count, PAGE_HEIGHT_MM);
        self.x_mm = x_mm;
        self.y_mm = y_mm;
        page_full
    }
}

// ============================================================================
// Layout Engine
// ============================================================================

/// A finished document, not yet written anywhere.
pub struct RenderedSheet {
    pub doc: PdfDocumentReference,
    pub pages: usize,
    pub labels: usize,
}

/// Renders one job's rows onto one format's sheets.
pub struct LayoutEngine<'a> {
    pub format: LabelFormat,
    pub geometry: &'a SheetGeometry,
    pub assets: &'a RenderAssets,
    pub endpoint: &'a str,
    pub caption: &'a str,
}

impl<'a> LayoutEngine<'a> {
    /// Lay out every row in order. The first failing row aborts the job;
    /// nothing is returned for a partial document.
    pub fn render(
        &self,
        kind: BatchKind,
        rows: &[Row],
        progress: &dyn GenerationProgress,
    ) -> Result<RenderedSheet, AppError> {
        let doc = PdfDocument::empty(self.format.file_name());
        let fonts = self.assets.fonts.register(&doc)?;
        let mut wrap_cache = WrapCache::new();
        let mut cursor = Cursor::start(self.geometry);
        let mut page: Option<PdfLayerReference> = None;
        let mut pages = 0;

        for (index, row) in rows.iter().enumerate() {
            // Pages are opened on demand so a full last page leaves no blank one behind.
            let layer = match &page {
                Some(layer) => layer.clone(),
                None => {
                    let (page_index, layer_index) =
                        doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
                    pages += 1;
                    let layer = doc.get_page(page_index).get_layer(layer_index);
                    page = Some(layer.clone());
                    layer
                }
            };

            self.draw_label(&layer, &fonts, &mut wrap_cache, kind, row, index, rows.len(), &cursor, progress)?;

            if cursor.advance(self.geometry) {
                debug!("{}: page {} full", self.format, pages);
                page = None;
            }
        }

        info!(
            "{}: laid out {} labels on {} pages",
            self.format,
            rows.len(),
            pages
        );

        Ok(RenderedSheet {
            doc,
            pages,
            labels: rows.len(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_label(
        &self,
        layer: &PdfLayerReference,
        fonts: &PdfFonts,
        wrap_cache: &mut WrapCache,
        kind: BatchKind,
        row: &Row,
        index: usize,
        total: usize,
        cursor: &Cursor,
        progress: &dyn GenerationProgress,
    ) -> Result<(), AppError> {
        let g = self.geometry;
        let (x, y) = (cursor.x_mm, cursor.y_mm);

        if let (Some(placement), Some(logo)) = (g.logo, self.assets.page_logo.as_ref()) {
            place_image(
                layer,
                logo,
                x + placement.dx_mm,
                y + placement.dy_mm,
                placement.width_mm,
                placement.height_mm,
                true,
            );
        }

        let url = build_url(self.endpoint, row)?;
        progress.on_row(self.format, percent_done(index, total), &url);
        debug!("{} #{}: {}", self.format, index + 1, url);

        let embedded = if g.qr.embed_logo {
            self.assets.qr_logo.as_ref()
        } else {
            None
        };
        let qr = StyledQr::new(&url, embedded)?;
        draw_qr(layer, &qr, x + g.qr.dx_mm, y + g.qr.dy_mm, g.qr.size_mm);

        let identity = row.identity_line(kind, index)?;
        let bounds = CaptionBox {
            max_lines: g.caption.max_lines,
            max_width: mm_to_pt(g.caption.max_width_mm),
            max_font_size: g.caption.max_font_size,
        };
        let fitted = fit_caption(
            self.caption,
            &identity,
            bounds,
            &self.assets.fonts.regular,
            wrap_cache,
        );
        self.draw_caption(
            layer,
            fonts,
            &fitted,
            x + g.caption.dx_mm,
            y + g.caption.dy_mm,
        );

        Ok(())
    }

    /// Draw body lines then the bold identity line, centred on `center_x`,
    /// one font size apart going down from `baseline_y`.
    fn draw_caption(
        &self,
        layer: &PdfLayerReference,
        fonts: &PdfFonts,
        caption: &FittedCaption,
        center_x: f32,
        baseline_y: f32,
    ) {
        let size = caption.font_size;
        let line_step = pt_to_mm(size);
        let mut y = baseline_y;

        for line in &caption.body {
            draw_centred(layer, line, size, center_x, y, &fonts.regular, &self.assets.fonts.regular);
            y -= line_step;
        }
        draw_centred(
            layer,
            &caption.identity,
            size,
            center_x,
            y,
            &fonts.bold,
            &self.assets.fonts.bold,
        );
    }
}

fn draw_centred(
    layer: &PdfLayerReference,
    text: &str,
    size: f32,
    center_x: f32,
    y: f32,
    font: &IndirectFontRef,
    measure: &dyn TextMeasure,
) {
    let width_mm = pt_to_mm(measure.text_width(text, size));
    layer.use_text(text, size, Mm(center_x - width_mm / 2.0), Mm(y), font);
}

/// Draw `qr` as filled paths with its bottom-left corner at (x, y). Only an
/// embedded logo goes in as an image.
fn draw_qr(layer: &PdfLayerReference, qr: &StyledQr, x: f32, y: f32, size_mm: f32) {
    let module_pt = mm_to_pt(size_mm) / qr.side as f32;

    layer.save_graphics_state();
    // One unit per module, y growing down from the top of the quiet zone.
    layer.set_ctm(CurTransMat::Raw([
        module_pt,
        0.0,
        0.0,
        -module_pt,
        mm_to_pt(x),
        mm_to_pt(y + size_mm),
    ]));
    layer.set_fill_color(Color::Rgb(Rgb::new(1.0, 1.0, 1.0, None)));
    layer.add_polygon(Polygon {
        rings: vec![vec![
            (module_point(0, 0), false),
            (module_point(qr.side * 100, 0), false),
            (module_point(qr.side * 100, qr.side * 100), false),
            (module_point(0, qr.side * 100), false),
        ]],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });

    let [r, g, b] = FRONT_COLOR;
    layer.set_fill_color(Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    )));
    layer.add_polygon(Polygon {
        rings: qr.runs.iter().map(run_outline).collect(),
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
    layer.restore_graphics_state();

    if let Some(patch) = &qr.logo {
        let mm_per_px = size_mm / qr.side_px() as f32;
        let (w, h) = patch.image.dimensions();
        place_image(
            layer,
            &patch.image,
            x + patch.x_px as f32 * mm_per_px,
            y + size_mm - (patch.y_px + h) as f32 * mm_per_px,
            w as f32 * mm_per_px,
            h as f32 * mm_per_px,
            true,
        );
    }
}

/// Quarter-circle corner radius and Bézier handle length, in hundredths of
/// a module.
const CORNER_RADIUS: u32 = 50;
const CORNER_HANDLE: u32 = 28;

/// A point given in hundredths of a module, so coordinates print short.
fn module_point(x: u32, y: u32) -> Point {
    Point {
        x: Pt(x as f32 / 100.0),
        y: Pt(y as f32 / 100.0),
    }
}

/// Outline of one run, clockwise from its top-left corner. The flag on each
/// point follows printpdf: a curve starts at a flagged point whose next point
/// is also flagged, and takes the two points after that as handle and end.
fn run_outline(run: &ModuleRun) -> Vec<(Point, bool)> {
    let (r, k) = (CORNER_RADIUS, CORNER_HANDLE);
    let x0 = run.x * 100;
    let y0 = run.y * 100;
    let x1 = (run.x + run.len) * 100;
    let y1 = y0 + 100;
    let c = run.corners;

    let mut ring = Outline::default();
    if c.top_left {
        ring.line_to(x0 + r, y0);
    } else {
        ring.line_to(x0, y0);
    }
    if c.top_right {
        ring.line_to(x1 - r, y0);
        ring.curve_to((x1 - r + k, y0), (x1, y0 + r - k), (x1, y0 + r));
    } else {
        ring.line_to(x1, y0);
    }
    if c.bottom_right {
        ring.line_to(x1, y1 - r);
        ring.curve_to((x1, y1 - r + k), (x1 - r + k, y1), (x1 - r, y1));
    } else {
        ring.line_to(x1, y1);
    }
    if c.bottom_left {
        ring.line_to(x0 + r, y1);
        ring.curve_to((x0 + r - k, y1), (x0, y1 - r + k), (x0, y1 - r));
    } else {
        ring.line_to(x0, y1);
    }
    if c.top_left {
        ring.line_to(x0, y0 + r);
        ring.curve_to((x0, y0 + r - k), (x0 + r - k, y0), (x0 + r, y0));
    }
    ring.points
}

#[derive(Default)]
struct Outline {
    points: Vec<(Point, bool)>,
    last: Option<(u32, u32)>,
}

impl Outline {
    fn line_to(&mut self, x: u32, y: u32) {
        if self.last != Some((x, y)) {
            self.points.push((module_point(x, y), false));
            self.last = Some((x, y));
        }
    }

    fn curve_to(&mut self, handle_1: (u32, u32), handle_2: (u32, u32), end: (u32, u32)) {
        if let Some(start) = self.points.last_mut() {
            start.1 = true;
        }
        self.points.push((module_point(handle_1.0, handle_1.1), true));
        self.points.push((module_point(handle_2.0, handle_2.1), false));
        self.points.push((module_point(end.0, end.1), false));
        self.last = Some(end);
    }
}

/// Draw `image` with its bottom-left corner at (x, y), stretched to
/// `width_mm` by `height_mm`.
fn place_image(
    layer: &PdfLayerReference,
    image: &RgbImage,
    x: f32,
    y: f32,
    width_mm: f32,
    height_mm: f32,
    interpolate: bool,
) {
    let (width_px, height_px) = image.dimensions();
    if width_px == 0 || height_px == 0 {
        return;
    }

    let pdf_image = Image::from(ImageXObject {
        width: Px(width_px as usize),
        height: Px(height_px as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate,
        image_data: image.as_raw().clone(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    // DPI = pixels / (mm / 25.4) sets the width; height follows the bitmap's
    // aspect ratio unless scaled.
    let dpi = (width_px as f32) / (width_mm / 25.4);
    let natural_height_mm = height_px as f32 / dpi * 25.4;

    pdf_image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(y)),
            dpi: Some(dpi),
            scale_y: Some(height_mm / natural_height_mm),
            ..Default::default()
        },
    );
}
