use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, Rgba, RgbaImage};
use log::debug;
use rayon::prelude::*;

use crate::collage_types::{CollageError, CollageResult, OutputFormat, RenderSettings};
use crate::image_enhancer;

/// Cell geometry derived from canvas size, grid shape and spacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollageLayout {
    pub rows: u32,
    pub cols: u32,
    pub spacing: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl CollageLayout {
    /// Derives the uniform cell size:
    /// cell = (canvas - spacing * (count + 1)) / count, floored.
    /// Fails when the grid cannot fit on the canvas at the requested
    /// spacing, before any pixel work happens.
    pub fn calculate(settings: &RenderSettings) -> CollageResult<Self> {
        if settings.rows == 0 || settings.cols == 0 {
            return Err(CollageError::InvalidLayout(format!(
                "grid needs at least one row and one column, got {}x{}",
                settings.rows, settings.cols
            )));
        }

        let rows = settings.rows as i64;
        let cols = settings.cols as i64;
        let spacing = settings.spacing as i64;

        // spacing * (count + 1) can exceed i64 for extreme u32 inputs.
        let cell_width = spacing
            .checked_mul(cols + 1)
            .map(|gaps| (settings.canvas_width as i64 - gaps) / cols);
        let cell_height = spacing
            .checked_mul(rows + 1)
            .map(|gaps| (settings.canvas_height as i64 - gaps) / rows);
        let (cell_width, cell_height) = match (cell_width, cell_height) {
            (Some(width), Some(height)) => (width, height),
            _ => {
                return Err(CollageError::InvalidLayout(format!(
                    "{}x{} grid with spacing {} cannot fit on a {}x{} canvas",
                    settings.rows,
                    settings.cols,
                    settings.spacing,
                    settings.canvas_width,
                    settings.canvas_height
                )))
            }
        };

        if cell_width <= 0 || cell_height <= 0 {
            return Err(CollageError::InvalidLayout(format!(
                "{}x{} grid with spacing {} leaves {}x{}px cells on a {}x{} canvas",
                settings.rows,
                settings.cols,
                settings.spacing,
                cell_width,
                cell_height,
                settings.canvas_width,
                settings.canvas_height
            )));
        }

        Ok(CollageLayout {
            rows: settings.rows,
            cols: settings.cols,
            spacing: settings.spacing,
            cell_width: cell_width as u32,
            cell_height: cell_height as u32,
        })
    }

    /// Source image for a cell: (row * cols + col) mod N. Cycles when there
    /// are fewer images than cells, so every cell is filled.
    pub fn source_index(&self, row: u32, col: u32, source_count: usize) -> usize {
        ((row as u64 * self.cols as u64 + col as u64) % source_count as u64) as usize
    }

    /// Top-left canvas position of a cell.
    pub fn cell_offset(&self, row: u32, col: u32) -> (i64, i64) {
        let x = col as i64 * (self.cell_width as i64 + self.spacing as i64) + self.spacing as i64;
        let y = row as i64 * (self.cell_height as i64 + self.spacing as i64) + self.spacing as i64;
        (x, y)
    }

    pub fn cell_count(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }
}

/// Scale-and-crop window that makes a source exactly cover a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FitWindow {
    scale_width: u32,
    scale_height: u32,
    crop_x: u32,
    crop_y: u32,
}

/// Sources wider than the cell scale to the cell height and crop centered
/// horizontally. Sources taller than (or matching) the cell scale to the
/// cell width and crop anchored to the BOTTOM of the scaled image. The
/// asymmetry is intentional and must stay: it biases vertical crops toward
/// the lower part of the frame.
fn fit_window(
    source_width: u32,
    source_height: u32,
    cell_width: u32,
    cell_height: u32,
) -> FitWindow {
    let aspect = source_width as f64 / source_height as f64;
    let cell_aspect = cell_width as f64 / cell_height as f64;

    if aspect > cell_aspect {
        let scale_width = (cell_height as f64 * aspect).round() as u32;
        FitWindow {
            scale_width,
            scale_height: cell_height,
            crop_x: (scale_width - cell_width) / 2,
            crop_y: 0,
        }
    } else {
        let scale_height = (cell_width as f64 / aspect).round() as u32;
        FitWindow {
            scale_width: cell_width,
            scale_height,
            crop_x: 0,
            crop_y: scale_height - cell_height,
        }
    }
}

/// Scales and crops a source to exactly cell_width x cell_height without
/// distortion or letterboxing.
fn fit_to_cell(source: &DynamicImage, cell_width: u32, cell_height: u32) -> DynamicImage {
    let window = fit_window(source.width(), source.height(), cell_width, cell_height);
    source
        .resize_exact(
            window.scale_width,
            window.scale_height,
            FilterType::Lanczos3,
        )
        .crop_imm(window.crop_x, window.crop_y, cell_width, cell_height)
}

/// Binary opacity mask: 255 inside the circle inscribed in a size x size
/// square, 0 outside. No partial alpha at the boundary.
fn circle_mask(size: u32) -> GrayImage {
    let radius = size as f64 / 2.0;
    ImageBuffer::from_fn(size, size, |x, y| {
        let dx = x as f64 + 0.5 - radius;
        let dy = y as f64 + 0.5 - radius;
        if dx * dx + dy * dy <= radius * radius {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Truncates the image to a top-left anchored square of side min(w, h) and
/// masks it to the inscribed circle on a transparent canvas. Circular cells
/// come out smaller than rectangular ones whenever the cell is not square;
/// that quirk is preserved deliberately.
fn crop_to_circle(image: &DynamicImage) -> RgbaImage {
    let size = image.width().min(image.height());
    let square = image.crop_imm(0, 0, size, size).to_rgba8();
    let mask = circle_mask(size);

    let mut circular: RgbaImage = ImageBuffer::from_pixel(size, size, Rgba([0, 0, 0, 0]));
    for (x, y, pixel) in square.enumerate_pixels() {
        if mask.get_pixel(x, y).0[0] == 255 {
            circular.put_pixel(x, y, Rgba([pixel.0[0], pixel.0[1], pixel.0[2], 255]));
        }
    }

    circular
}

/// Drops any alpha a decoded source carries so pastes are opaque.
fn flatten(image: &DynamicImage) -> RgbaImage {
    DynamicImage::ImageRgb8(image.to_rgb8()).to_rgba8()
}

/// Composes the collage: background resized to the full canvas and
/// enhanced, then one source per cell in row-major order, each fitted,
/// optionally circle-masked, enhanced, and pasted at its cell offset.
///
/// Pure function of its inputs; a failed render returns an error and no
/// partial canvas. Cell preparation runs on the rayon pool (cells are
/// independent), compositing stays serial in row-major order.
pub fn render_collage(
    sources: &[DynamicImage],
    background: &DynamicImage,
    settings: &RenderSettings,
) -> CollageResult<RgbImage> {
    settings.validate()?;
    if sources.is_empty() {
        return Err(CollageError::NoSourceImages);
    }
    let layout = CollageLayout::calculate(settings)?;

    debug!(
        "rendering {}x{} collage: {}x{} grid, {}x{}px cells, {} sources",
        settings.canvas_width,
        settings.canvas_height,
        layout.rows,
        layout.cols,
        layout.cell_width,
        layout.cell_height,
        sources.len()
    );

    // Background commits to the canvas before any cell does.
    let backdrop = background.resize_exact(
        settings.canvas_width,
        settings.canvas_height,
        FilterType::Lanczos3,
    );
    let backdrop = enhance_with(&backdrop, settings)?;

    let mut canvas: RgbaImage = ImageBuffer::from_pixel(
        settings.canvas_width,
        settings.canvas_height,
        Rgba([255, 255, 255, 255]),
    );
    imageops::overlay(&mut canvas, &flatten(&backdrop), 0, 0);

    let cells: Vec<CollageResult<(i64, i64, RgbaImage)>> = (0..layout.cell_count())
        .into_par_iter()
        .map(|idx| {
            let row = (idx / layout.cols as u64) as u32;
            let col = (idx % layout.cols as u64) as u32;
            let source = &sources[layout.source_index(row, col, sources.len())];

            let fitted = fit_to_cell(source, layout.cell_width, layout.cell_height);
            let cell = if settings.circular_crop {
                crop_to_circle(&fitted)
            } else {
                flatten(&fitted)
            };
            let cell = enhance_with(&DynamicImage::ImageRgba8(cell), settings)?.to_rgba8();

            let (x, y) = layout.cell_offset(row, col);
            Ok((x, y, cell))
        })
        .collect();

    for cell in cells {
        let (x, y, cell_image) = cell?;
        imageops::overlay(&mut canvas, &cell_image, x, y);
    }

    Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

fn enhance_with(image: &DynamicImage, settings: &RenderSettings) -> CollageResult<DynamicImage> {
    image_enhancer::enhance(
        image,
        settings.brightness,
        settings.contrast,
        settings.saturation,
        settings.sharpness,
    )
}

/// Encodes the finished canvas for transmission or persistence.
pub fn encode_collage(canvas: &RgbImage, format: OutputFormat) -> CollageResult<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    canvas.write_to(&mut buffer, format.image_format())?;
    Ok(buffer.into_inner())
}
