//! Per-pass needle encoding
//!
//! A [`LineEncoder`] pairs a [`KnitImage`] with a placed [`NeedleRange`] and
//! yields one [`EncodedLine`] per (row, color) pass, row-major then
//! color-major. Only colors present in a row produce a pass.

use crate::knit_image::KnitImage;
use knitkit_core::{ConfigurationError, NeedleRange, LINE_BYTES};

/// Needle activation bits for one pass
///
/// Bit `n` belongs to bed needle `knit_start + n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedLine {
    row: u32,
    color: u8,
    knit_start: u8,
    bits: Vec<bool>,
}

impl EncodedLine {
    /// Image row this pass belongs to
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Color index of this pass
    pub fn color(&self) -> u8 {
        self.color
    }

    /// First needle of the knit window
    pub fn knit_start(&self) -> u8 {
        self.knit_start
    }

    /// Activation bits across the knit window
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Check bit `n` of the knit window
    pub fn is_set(&self, n: usize) -> bool {
        self.bits.get(n).copied().unwrap_or(false)
    }

    /// Number of active needles
    pub fn active_count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    /// Pack into the full-bed wire layout, needle `k` at byte `k / 8`, bit `k % 8`
    pub fn to_wire_bytes(&self) -> [u8; LINE_BYTES] {
        let mut bytes = [0u8; LINE_BYTES];
        for (n, _) in self.bits.iter().enumerate().filter(|(_, &bit)| bit) {
            let needle = self.knit_start as usize + n;
            bytes[needle / 8] |= 1 << (needle % 8);
        }
        bytes
    }

    /// Text rendering, `#` for an active needle and `-` otherwise
    pub fn render(&self) -> String {
        self.bits
            .iter()
            .map(|&bit| if bit { '#' } else { '-' })
            .collect()
    }
}

/// Encoder for a placed image
#[derive(Debug, Clone)]
pub struct LineEncoder {
    image: KnitImage,
    range: NeedleRange,
}

impl LineEncoder {
    /// Pair an image with a needle range placed for its width
    pub fn new(image: KnitImage, range: NeedleRange) -> Result<Self, ConfigurationError> {
        match range.placed_width() {
            Some(width) if width == image.width() => {}
            placed => {
                return Err(ConfigurationError::StalePlacement {
                    placed_width: placed.unwrap_or(0),
                    image_width: image.width(),
                })
            }
        }

        tracing::debug!(
            "Encoding {}x{} image with {} colors on {}",
            image.width(),
            image.height(),
            image.num_colors(),
            range
        );
        Ok(Self { image, range })
    }

    /// The encoded image
    pub fn image(&self) -> &KnitImage {
        &self.image
    }

    /// The placed needle range
    pub fn range(&self) -> &NeedleRange {
        &self.range
    }

    /// Number of image rows
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// First pass of a row
    pub fn first_pass(&self, row: u32) -> Option<(u32, u8)> {
        self.image
            .colors_in_row(row)
            .first()
            .map(|&color| (row, color))
    }

    /// Pass following `(row, color)`, or `None` after the last pass
    pub fn next_pass(&self, row: u32, color: u8) -> Option<(u32, u8)> {
        if let Some(&next) = self
            .image
            .colors_in_row(row)
            .iter()
            .find(|&&present| present > color)
        {
            return Some((row, next));
        }
        self.first_pass(row + 1)
    }

    /// Check whether `(row, color)` is the final pass of the image
    pub fn is_final(&self, row: u32, color: u8) -> bool {
        self.next_pass(row, color).is_none()
    }

    /// Encode one pass
    pub fn encode(&self, row: u32, color: u8) -> Option<EncodedLine> {
        let pixels = self.image.row(row)?;
        let knit_start = self.range.knit_start();
        let img_start = self.range.img_start();

        let bits = (0..self.range.knit_width() as i32)
            .map(|n| {
                let needle = knit_start as i32 + n;
                self.range.in_image(needle) && pixels[(needle - img_start) as usize] == color
            })
            .collect();

        Some(EncodedLine {
            row,
            color,
            knit_start,
            bits,
        })
    }

    /// All passes from the first row
    pub fn passes(&self) -> Passes<'_> {
        self.passes_from(0)
    }

    /// All passes starting at `row`
    pub fn passes_from(&self, row: u32) -> Passes<'_> {
        Passes {
            encoder: self,
            next: self.first_pass(row),
        }
    }

    /// Number of passes in the whole image
    pub fn pass_count(&self) -> usize {
        (0..self.image.height())
            .map(|row| self.image.colors_in_row(row).len())
            .sum()
    }
}

/// Lazy iterator over `(row, color, line)` passes
pub struct Passes<'a> {
    encoder: &'a LineEncoder,
    next: Option<(u32, u8)>,
}

impl Iterator for Passes<'_> {
    type Item = (u32, u8, EncodedLine);

    fn next(&mut self) -> Option<Self::Item> {
        let (row, color) = self.next?;
        self.next = self.encoder.next_pass(row, color);
        let line = self.encoder.encode(row, color)?;
        Some((row, color, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knitkit_core::Alignment;

    fn two_color_stripes() -> KnitImage {
        // Row 0: 0 1 0 1, row 1: all 1
        KnitImage::from_indices(4, 2, 2, vec![0, 1, 0, 1, 1, 1, 1, 1]).unwrap()
    }

    fn placed(image: &KnitImage, start: i32, stop: i32, alignment: Alignment) -> NeedleRange {
        NeedleRange::new(start, stop)
            .unwrap()
            .placed(image.width(), alignment)
            .unwrap()
    }

    #[test]
    fn test_rejects_stale_placement() {
        let image = two_color_stripes();
        let unplaced = NeedleRange::new(0, 9).unwrap();
        assert!(matches!(
            LineEncoder::new(image.clone(), unplaced),
            Err(ConfigurationError::StalePlacement { placed_width: 0, .. })
        ));

        let wrong = NeedleRange::new(0, 9).unwrap().placed(6, Alignment::Left).unwrap();
        assert_eq!(
            LineEncoder::new(image, wrong).unwrap_err(),
            ConfigurationError::StalePlacement {
                placed_width: 6,
                image_width: 4
            }
        );
    }

    #[test]
    fn test_pass_order_skips_absent_colors() {
        let image = two_color_stripes();
        let range = placed(&image, 0, 9, Alignment::Left);
        let encoder = LineEncoder::new(image, range).unwrap();

        let order: Vec<(u32, u8)> = encoder.passes().map(|(row, color, _)| (row, color)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 1)]);
        assert_eq!(encoder.pass_count(), 3);
        assert!(encoder.is_final(1, 1));
        assert!(!encoder.is_final(0, 1));
    }

    #[test]
    fn test_bits_follow_placement() {
        let image = two_color_stripes();
        let range = placed(&image, 10, 17, Alignment::Right);
        let encoder = LineEncoder::new(image, range).unwrap();

        let line = encoder.encode(0, 1).unwrap();
        assert_eq!(line.bits().len(), 8);
        assert_eq!(line.render(), "-----#-#");
        assert_eq!(line.active_count(), 2);

        let line = encoder.encode(0, 0).unwrap();
        assert_eq!(line.render(), "----#-#-");
        assert!(encoder.encode(2, 0).is_none());
    }

    #[test]
    fn test_wire_bytes_are_lsb_first() {
        let image = KnitImage::from_indices(2, 1, 2, vec![1, 1]).unwrap();
        let range = placed(&image, 7, 9, Alignment::Left);
        let encoder = LineEncoder::new(image, range).unwrap();

        let bytes = encoder.encode(0, 1).unwrap().to_wire_bytes();
        assert_eq!(bytes[0], 0b1000_0000);
        assert_eq!(bytes[1], 0b0000_0001);
        assert!(bytes[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_passes_are_restartable() {
        let image = two_color_stripes();
        let range = placed(&image, 0, 9, Alignment::Center);
        let encoder = LineEncoder::new(image, range).unwrap();

        let first: Vec<_> = encoder.passes().collect();
        let second: Vec<_> = encoder.passes().collect();
        assert_eq!(first, second);

        let from_row_one: Vec<_> = encoder.passes_from(1).map(|(row, _, _)| row).collect();
        assert_eq!(from_row_one, vec![1]);
    }
}
