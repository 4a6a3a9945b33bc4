//! Bi-level bitmaps and region composition.

use crate::decode::CombinationOperator;

/// A bi-level bitmap, one bit per pixel.
///
/// Pixels are packed MSB-first into bytes, with each row starting on a byte
/// boundary. A set bit is a black pixel (6.2.2: "1 denotes a black pixel").
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bitmap {
    width: u32,
    height: u32,
    /// Row length in bytes.
    stride: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// Create an all-white bitmap.
    pub(crate) fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize).div_ceil(8);

        Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    /// Create a bitmap with every pixel set to the given value.
    pub(crate) fn new_filled(width: u32, height: u32, black: bool) -> Self {
        let mut bitmap = Self::new(width, height);

        if black {
            bitmap.fill(true);
        }

        bitmap
    }

    #[inline(always)]
    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    #[inline(always)]
    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    #[inline(always)]
    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The row of pixels at the given y coordinate.
    #[inline(always)]
    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    #[inline(always)]
    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Get a pixel value. Out-of-bounds reads yield white.
    #[inline(always)]
    pub(crate) fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }

        let byte = self.data[y as usize * self.stride + (x / 8) as usize];
        byte & (0x80 >> (x % 8)) != 0
    }

    /// Get a pixel value as 0 or 1, treating out-of-bounds as white.
    ///
    /// Template pixels near the bitmap edge reference coordinates outside the
    /// bitmap; 6.2.5.2: "When the template ... extends beyond the bounds of
    /// the bitmap, the value of each such pixel shall be taken to be 0."
    #[inline(always)]
    pub(crate) fn pixel(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 {
            return 0;
        }

        self.get(x as u32, y as u32) as u32
    }

    /// Set a pixel value. Out-of-bounds writes are ignored.
    #[inline(always)]
    pub(crate) fn set(&mut self, x: u32, y: u32, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }

        let byte = &mut self.data[y as usize * self.stride + (x / 8) as usize];
        let mask = 0x80 >> (x % 8);

        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    /// Set every pixel to the given value.
    pub(crate) fn fill(&mut self, black: bool) {
        let fill = if black { 0xff } else { 0x00 };
        self.data.fill(fill);

        if black {
            self.mask_padding();
        }
    }

    /// Clear the padding bits beyond the row width so that whole-byte
    /// comparisons and row exports stay deterministic.
    fn mask_padding(&mut self) {
        let excess = (self.stride * 8) as u32 - self.width;

        if excess == 0 {
            return;
        }

        let mask = 0xff_u8 << excess;
        let last = self.stride - 1;

        for y in 0..self.height as usize {
            self.data[y * self.stride + last] &= mask;
        }
    }

    /// Draw another bitmap onto this one at the given offset, applying the
    /// combination operator per pixel (6.2.2, Table 12).
    ///
    /// Parts of `other` that fall outside this bitmap are clipped.
    pub(crate) fn combine(&mut self, other: &Self, x: i32, y: i32, op: CombinationOperator) {
        for src_y in 0..other.height {
            let dst_y = y + src_y as i32;

            if dst_y < 0 || dst_y >= self.height as i32 {
                continue;
            }

            for src_x in 0..other.width {
                let dst_x = x + src_x as i32;

                if dst_x < 0 || dst_x >= self.width as i32 {
                    continue;
                }

                let src = other.get(src_x, src_y);
                let dst = self.get(dst_x as u32, dst_y as u32);

                let new = match op {
                    CombinationOperator::Or => dst | src,
                    CombinationOperator::And => dst & src,
                    CombinationOperator::Xor => dst ^ src,
                    CombinationOperator::Xnor => !(dst ^ src),
                    CombinationOperator::Replace => src,
                };

                self.set(dst_x as u32, dst_y as u32, new);
            }
        }
    }
}

/// A decoded region together with its placement on the page (7.4.1).
#[derive(Debug, Clone)]
pub(crate) struct Region {
    pub(crate) bitmap: Bitmap,
    /// The x location of the region on the page.
    pub(crate) x: u32,
    /// The y location of the region on the page.
    pub(crate) y: u32,
    /// The external combination operator.
    pub(crate) op: CombinationOperator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_are_packed_msb_first() {
        let mut bitmap = Bitmap::new(10, 2);
        bitmap.set(0, 0, true);
        bitmap.set(9, 1, true);

        assert_eq!(bitmap.row(0), &[0b1000_0000, 0b0000_0000]);
        assert_eq!(bitmap.row(1), &[0b0000_0000, 0b0100_0000]);
        assert!(bitmap.get(0, 0));
        assert!(bitmap.get(9, 1));
        assert!(!bitmap.get(1, 0));
    }

    #[test]
    fn out_of_bounds_reads_are_white() {
        let bitmap = Bitmap::new_filled(4, 4, true);

        assert_eq!(bitmap.pixel(-1, 0), 0);
        assert_eq!(bitmap.pixel(0, -1), 0);
        assert_eq!(bitmap.pixel(4, 0), 0);
        assert_eq!(bitmap.pixel(0, 4), 0);
        assert_eq!(bitmap.pixel(3, 3), 1);
    }

    #[test]
    fn filled_bitmap_masks_padding_bits() {
        let bitmap = Bitmap::new_filled(3, 1, true);
        assert_eq!(bitmap.row(0), &[0b1110_0000]);
    }

    #[test]
    fn combine_clips_and_applies_operator() {
        let mut page = Bitmap::new(4, 4);
        let mut region = Bitmap::new_filled(3, 3, true);
        region.set(1, 1, false);

        // Partially off the top-left corner.
        page.combine(&region, -1, -1, CombinationOperator::Or);

        assert!(!page.get(0, 0));
        assert!(page.get(1, 0));
        assert!(page.get(0, 1));
        assert!(page.get(1, 1));
        assert!(!page.get(2, 2));

        // XNOR inverts where the source is white.
        let blank = Bitmap::new(4, 4);
        page.combine(&blank, 0, 0, CombinationOperator::Xnor);
        assert!(page.get(0, 0));
        assert!(!page.get(1, 0));
    }
}
