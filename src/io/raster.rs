//! Raster load and save for model layers
//!
//! Input layers are 8-bit single-channel images; the gray level is the
//! model pixel value. Output images render model pixels through a colour
//! table into RGBA and are written as single-frame GIFs.

use std::path::Path;

use image::{Frame, Rgba, RgbaImage};
use ndarray::Array2;

use crate::io::error::{Result, SimError};
use crate::spatial::grid::{Pixel, PixelGrid};

/// Load an 8-bit raster into a pixel grid
///
/// Any format the image crate decodes is accepted; multi-channel images
/// are collapsed to luma first.
///
/// # Errors
///
/// Returns a raster-load error when the file cannot be opened or decoded.
pub fn load_grid(path: &Path) -> Result<PixelGrid> {
    let img = image::open(path).map_err(|e| SimError::RasterLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    let luma = img.into_luma8();
    let (width, height) = luma.dimensions();

    let mut data = Array2::<Pixel>::zeros((height as usize, width as usize));
    for (x, y, pixel) in luma.enumerate_pixels() {
        if let Some(cell) = data.get_mut([y as usize, x as usize]) {
            *cell = pixel.0[0];
        }
    }
    Ok(PixelGrid::from_array(data))
}

/// RGB colour table indexed by model pixel value
///
/// Values without an explicit entry fall back to a gray ramp so every
/// pixel renders.
#[derive(Debug, Clone)]
pub struct ColorTable {
    entries: Vec<Option<[u8; 3]>>,
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorTable {
    /// Create an empty table (pure gray ramp)
    pub fn new() -> Self {
        Self {
            entries: vec![None; 256],
        }
    }

    /// Assign a colour to one pixel value
    pub fn set(&mut self, value: Pixel, color: [u8; 3]) {
        if let Some(entry) = self.entries.get_mut(value as usize) {
            *entry = Some(color);
        }
    }

    /// Assign a colour to an inclusive range of pixel values
    pub fn set_range(&mut self, lower: Pixel, upper: Pixel, color: [u8; 3]) {
        for value in lower..=upper {
            self.set(value, color);
        }
    }

    /// Resolve a pixel value to RGB
    pub fn color(&self, value: Pixel) -> [u8; 3] {
        self.entries
            .get(value as usize)
            .copied()
            .flatten()
            .unwrap_or([value, value, value])
    }
}

// 3x5 digit glyphs for the in-image date stamp, one bit per pixel,
// rows top to bottom.
const DIGIT_GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b111, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b010, 0b010, 0b010], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
];

/// Stamp a year into the bottom-right corner of a grid
///
/// Digits are drawn with the given colour-index value in 3x5 glyphs with a
/// one-pixel gutter, mirroring the date annotation the output images carry.
pub fn stamp_date(grid: &mut PixelGrid, year: u32, color_index: Pixel) {
    let digits: Vec<usize> = year
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let glyph_width = 4;
    let total_width = digits.len() * glyph_width;
    let (nrows, ncols) = grid.dim();
    if nrows < 7 || ncols < total_width + 2 {
        return;
    }

    let top = nrows - 7;
    let left = ncols - total_width - 2;
    for (d, &digit) in digits.iter().enumerate() {
        let Some(glyph) = DIGIT_GLYPHS.get(digit) else {
            continue;
        };
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    grid.set(top + row, left + d * glyph_width + col, color_index);
                }
            }
        }
    }
}

/// Write a grid as a single-frame GIF through a colour table
///
/// # Errors
///
/// Returns an error when the output directory cannot be created or the
/// GIF encoder fails.
pub fn write_grid_gif(grid: &PixelGrid, colors: &ColorTable, path: &Path) -> Result<()> {
    let (nrows, ncols) = grid.dim();
    let mut img = RgbaImage::new(ncols as u32, nrows as u32);
    for ((i, j), value) in grid.indexed_iter() {
        let [r, g, b] = colors.color(value);
        img.put_pixel(j as u32, i as u32, Rgba([r, g, b, 255]));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SimError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    let file = std::fs::File::create(path).map_err(|e| SimError::FileSystem {
        path: path.to_path_buf(),
        operation: "create file",
        source: e,
    })?;

    let mut encoder = image::codecs::gif::GifEncoder::new(file);
    encoder
        .encode_frames(std::iter::once(Frame::new(img)))
        .map_err(|e| SimError::ImageExport {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
