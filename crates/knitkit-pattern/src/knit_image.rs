//! Color-indexed knitting images
//!
//! A [`KnitImage`] is an immutable grid of color indices. Source rasters are
//! reduced to luminance and quantized into `num_colors` equal bands; every
//! transformation returns a new image.

use image::{DynamicImage, GrayImage};
use knitkit_core::{ConfigurationError, MAX_COLORS};
use std::path::Path;

/// Immutable `width × height` grid of color indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnitImage {
    width: u32,
    height: u32,
    num_colors: u8,
    pixels: Vec<u8>,
}

impl KnitImage {
    /// Create an image from row-major color indices
    pub fn from_indices(
        width: u32,
        height: u32,
        num_colors: u8,
        pixels: Vec<u8>,
    ) -> Result<Self, ConfigurationError> {
        validate_color_count(num_colors)?;
        validate_dimensions(width, height, pixels.len())?;

        if let Some(index) = pixels.iter().position(|&color| color >= num_colors) {
            return Err(ConfigurationError::ColorOutOfRange {
                x: index as u32 % width,
                y: index as u32 / width,
                color: pixels[index],
                num_colors,
            });
        }

        Ok(Self {
            width,
            height,
            num_colors,
            pixels,
        })
    }

    /// Quantize row-major 8-bit luminance into `num_colors` bands
    pub fn from_luma(
        width: u32,
        height: u32,
        num_colors: u8,
        luma: &[u8],
    ) -> Result<Self, ConfigurationError> {
        validate_color_count(num_colors)?;
        validate_dimensions(width, height, luma.len())?;

        let pixels = luma
            .iter()
            .map(|&intensity| Self::color_band(intensity, num_colors))
            .collect();

        Ok(Self {
            width,
            height,
            num_colors,
            pixels,
        })
    }

    /// Quantize a grayscale raster
    pub fn from_gray(gray: &GrayImage, num_colors: u8) -> Result<Self, ConfigurationError> {
        Self::from_luma(gray.width(), gray.height(), num_colors, gray.as_raw())
    }

    /// Quantize any raster through its luminance
    pub fn from_dynamic(img: &DynamicImage, num_colors: u8) -> Result<Self, ConfigurationError> {
        Self::from_gray(&img.to_luma8(), num_colors)
    }

    /// Load and quantize an image file
    pub fn open<P: AsRef<Path>>(path: P, num_colors: u8) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| ConfigurationError::InvalidImage {
            reason: format!("failed to load {}: {}", path.display(), e),
        })?;

        let knit_image = Self::from_dynamic(&img, num_colors)?;
        tracing::debug!(
            "Loaded {} as {}x{} image with {} colors",
            path.display(),
            knit_image.width,
            knit_image.height,
            num_colors
        );
        Ok(knit_image)
    }

    /// Color band of an 8-bit intensity
    ///
    /// Bands are `256 / num_colors` wide; the result is always below `num_colors`.
    pub fn color_band(intensity: u8, num_colors: u8) -> u8 {
        (intensity as u32 * num_colors as u32 / 256) as u8
    }

    /// Width in stitches
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in rows
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the palette
    pub fn num_colors(&self) -> u8 {
        self.num_colors
    }

    /// Color index at a pixel
    pub fn color_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    /// One row of color indices
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y * self.width) as usize;
        Some(&self.pixels[start..start + self.width as usize])
    }

    /// Colors present in a row, ascending
    pub fn colors_in_row(&self, y: u32) -> Vec<u8> {
        let mut present = [false; MAX_COLORS as usize];
        if let Some(row) = self.row(y) {
            for &color in row {
                present[color as usize] = true;
            }
        }

        (0..self.num_colors)
            .filter(|&color| present[color as usize])
            .collect()
    }

    /// Nearest-neighbour rescale to a new width, keeping the aspect ratio
    pub fn resized_to_width(&self, width: u32) -> Result<Self, ConfigurationError> {
        if width == 0 {
            return Err(ConfigurationError::InvalidImage {
                reason: "target width is zero".to_string(),
            });
        }

        let height = ((self.height as u64 * width as u64 + self.width as u64 / 2)
            / self.width as u64)
            .max(1) as u32;

        let grid = GrayImage::from_raw(self.width, self.height, self.pixels.clone()).ok_or_else(
            || ConfigurationError::InvalidImage {
                reason: "pixel buffer does not match dimensions".to_string(),
            },
        )?;
        let resized =
            image::imageops::resize(&grid, width, height, image::imageops::FilterType::Nearest);

        Ok(Self {
            width,
            height,
            num_colors: self.num_colors,
            pixels: resized.into_raw(),
        })
    }

    /// Swap the palette order, color `c` becoming `num_colors - 1 - c`
    pub fn inverted(&self) -> Self {
        let top = self.num_colors - 1;
        Self {
            pixels: self.pixels.iter().map(|&color| top - color).collect(),
            ..self.clone()
        }
    }

    /// Tile the image `horizontal` times across and `vertical` times down
    pub fn repeated(&self, horizontal: u32, vertical: u32) -> Result<Self, ConfigurationError> {
        if horizontal == 0 || vertical == 0 {
            return Err(ConfigurationError::InvalidImage {
                reason: format!("invalid repeat count {}x{}", horizontal, vertical),
            });
        }

        let width = self.width * horizontal;
        let height = self.height * vertical;
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for _ in 0..vertical {
            for y in 0..self.height {
                let start = (y * self.width) as usize;
                let row = &self.pixels[start..start + self.width as usize];
                for _ in 0..horizontal {
                    pixels.extend_from_slice(row);
                }
            }
        }

        Ok(Self {
            width,
            height,
            num_colors: self.num_colors,
            pixels,
        })
    }
}

fn validate_color_count(num_colors: u8) -> Result<(), ConfigurationError> {
    if num_colors == 0 || num_colors > MAX_COLORS {
        return Err(ConfigurationError::InvalidColorCount { num_colors });
    }
    Ok(())
}

fn validate_dimensions(width: u32, height: u32, len: usize) -> Result<(), ConfigurationError> {
    if width == 0 || height == 0 {
        return Err(ConfigurationError::InvalidImage {
            reason: format!("empty image {}x{}", width, height),
        });
    }
    if (width as usize) * (height as usize) != len {
        return Err(ConfigurationError::InvalidImage {
            reason: format!(
                "{} pixels supplied for a {}x{} image",
                len, width, height
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_band_edges() {
        assert_eq!(KnitImage::color_band(0, 2), 0);
        assert_eq!(KnitImage::color_band(127, 2), 0);
        assert_eq!(KnitImage::color_band(128, 2), 1);
        assert_eq!(KnitImage::color_band(255, 2), 1);
        assert_eq!(KnitImage::color_band(255, 6), 5);
        assert_eq!(KnitImage::color_band(255, 1), 0);
    }

    #[test]
    fn test_from_indices_validates() {
        assert!(matches!(
            KnitImage::from_indices(2, 1, 7, vec![0, 0]),
            Err(ConfigurationError::InvalidColorCount { num_colors: 7 })
        ));
        assert!(matches!(
            KnitImage::from_indices(0, 1, 2, vec![]),
            Err(ConfigurationError::InvalidImage { .. })
        ));
        assert!(matches!(
            KnitImage::from_indices(2, 2, 2, vec![0, 1, 1]),
            Err(ConfigurationError::InvalidImage { .. })
        ));
        assert_eq!(
            KnitImage::from_indices(2, 2, 2, vec![0, 1, 2, 0]).unwrap_err(),
            ConfigurationError::ColorOutOfRange {
                x: 0,
                y: 1,
                color: 2,
                num_colors: 2
            }
        );
    }

    #[test]
    fn test_rows_and_present_colors() {
        let image = KnitImage::from_indices(3, 2, 3, vec![2, 0, 2, 1, 1, 1]).unwrap();
        assert_eq!(image.row(0), Some(&[2, 0, 2][..]));
        assert_eq!(image.row(2), None);
        assert_eq!(image.color_at(1, 1), Some(1));
        assert_eq!(image.color_at(3, 0), None);
        assert_eq!(image.colors_in_row(0), vec![0, 2]);
        assert_eq!(image.colors_in_row(1), vec![1]);
    }

    #[test]
    fn test_from_gray() {
        let gray = GrayImage::from_raw(2, 1, vec![10, 250]).unwrap();
        let image = KnitImage::from_gray(&gray, 2).unwrap();
        assert_eq!(image.row(0), Some(&[0, 1][..]));
    }

    #[test]
    fn test_resized_to_width_keeps_aspect() {
        let image = KnitImage::from_indices(2, 2, 2, vec![0, 1, 1, 0]).unwrap();
        let resized = image.resized_to_width(4).unwrap();
        assert_eq!((resized.width(), resized.height()), (4, 4));
        assert_eq!(resized.row(0), Some(&[0, 0, 1, 1][..]));
        assert_eq!(resized.row(3), Some(&[1, 1, 0, 0][..]));
        assert!(image.resized_to_width(0).is_err());
    }

    #[test]
    fn test_inverted_and_repeated() {
        let image = KnitImage::from_indices(2, 1, 3, vec![0, 2]).unwrap();
        assert_eq!(image.inverted().row(0), Some(&[2, 0][..]));

        let tiled = image.repeated(2, 3).unwrap();
        assert_eq!((tiled.width(), tiled.height()), (4, 3));
        assert_eq!(tiled.row(2), Some(&[0, 2, 0, 2][..]));
        assert!(image.repeated(0, 1).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = KnitImage::open("/nonexistent/pattern.png", 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidImage { .. }));
    }
}
