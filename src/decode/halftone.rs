//! Halftone region segment parsing and decoding (7.4.5, 6.6).

use super::pattern::PatternDictionary;
use super::{
    CombinationOperator, RegionSegmentInfo, Template, parse_region_segment_info,
};
use crate::bitmap::{Bitmap, Region};
use crate::error::{DecodeError, ParseError, RegionError, Result};
use crate::gray_scale::{GrayScaleParams, decode_gray_scale_image};
use crate::reader::Reader;

/// Decode a halftone region segment (7.4.5, 6.6).
pub(crate) fn decode(
    reader: &mut Reader<'_>,
    pattern_dict: &PatternDictionary,
) -> Result<Region> {
    let header = parse(reader)?;
    let data = reader.tail().ok_or(ParseError::UnexpectedEof)?;

    // "1) Fill a bitmap HTREG, of the size given by ... HBW and HBH, with the
    // HDEFPIXEL value." (6.6.5)
    let mut bitmap = Bitmap::new_filled(
        header.region_info.width,
        header.region_info.height,
        header.flags.default_pixel,
    );

    // "2) If HENABLESKIP equals 1, compute a bitmap HSKIP as described in
    // 6.6.5.1."
    let skip = if header.flags.enable_skip {
        Some(compute_skip_bitmap(&header, pattern_dict, &bitmap))
    } else {
        None
    };

    // "3) Set HBPP to ceil(log2(HNUMPATS))."
    let bits_per_pixel = (pattern_dict.patterns.len() as u32)
        .saturating_sub(1)
        .checked_ilog2()
        .map_or(1, |n| n + 1);

    // "4) Decode an image GI of size HGW by HGH with HBPP bits per pixel
    // using the gray-scale image decoding procedure as described in
    // Annex C."
    let grid = &header.grid;
    let gray_params = GrayScaleParams {
        use_mmr: header.flags.mmr,
        bits_per_pixel,
        width: grid.width,
        height: grid.height,
        template: header.flags.template,
        skip: skip.as_ref(),
    };
    let gray_image = decode_gray_scale_image(data, &gray_params)?;

    // "5) Place sequentially the patterns corresponding to the values in GI
    // into HTREG by the procedure described in 6.6.5.2."
    render_patterns(&mut bitmap, &gray_image, &header, pattern_dict)?;

    Ok(Region {
        bitmap,
        x: header.region_info.x_location,
        y: header.region_info.y_location,
        op: header.region_info.combination_operator,
    })
}

/// The halftone grid position, size and vector (7.4.5.1.2, 7.4.5.1.3).
#[derive(Debug, Clone)]
struct HalftoneGrid {
    /// HGW.
    width: u32,
    /// HGH.
    height: u32,
    /// HGX.
    x_offset: i32,
    /// HGY.
    y_offset: i32,
    /// HRX, "256 times the horizontal coordinate of the halftone grid
    /// vector".
    x_vector: u16,
    /// HRY.
    y_vector: u16,
}

/// Parsed halftone region segment flags (7.4.5.1.1).
#[derive(Debug, Clone)]
struct HalftoneRegionFlags {
    mmr: bool,
    template: Template,
    enable_skip: bool,
    combination_operator: CombinationOperator,
    default_pixel: bool,
}

/// Parsed halftone region segment header (7.4.5.1).
#[derive(Debug, Clone)]
struct HalftoneRegionHeader {
    region_info: RegionSegmentInfo,
    flags: HalftoneRegionFlags,
    grid: HalftoneGrid,
}

/// Parse a halftone region segment header (7.4.5.1).
fn parse(reader: &mut Reader<'_>) -> Result<HalftoneRegionHeader> {
    let region_info = parse_region_segment_info(reader)?;

    let flags_byte = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let flags = HalftoneRegionFlags {
        mmr: flags_byte & 0x01 != 0,
        template: Template::from_value((flags_byte >> 1) & 0x03)?,
        enable_skip: flags_byte & 0x08 != 0,
        combination_operator: CombinationOperator::from_value((flags_byte >> 4) & 0x07)?,
        default_pixel: flags_byte & 0x80 != 0,
    };

    let grid = HalftoneGrid {
        width: reader.read_u32().ok_or(ParseError::UnexpectedEof)?,
        height: reader.read_u32().ok_or(ParseError::UnexpectedEof)?,
        x_offset: reader.read_i32().ok_or(ParseError::UnexpectedEof)?,
        y_offset: reader.read_i32().ok_or(ParseError::UnexpectedEof)?,
        x_vector: reader.read_u16().ok_or(ParseError::UnexpectedEof)?,
        y_vector: reader.read_u16().ok_or(ParseError::UnexpectedEof)?,
    };

    Ok(HalftoneRegionHeader {
        region_info,
        flags,
        grid,
    })
}

/// Walks the halftone grid cell locations (6.6.5.2).
///
/// Coordinates carry eight fractional bits: a cell (m_g, n_g) sits at
/// x = HGX + m_g x HRY + n_g x HRX and y = HGY + m_g x HRX - n_g x HRY.
struct GridCoords {
    x: i64,
    y: i64,
    row_x: i64,
    row_y: i64,
    hrx: i64,
    hry: i64,
}

impl GridCoords {
    fn new(grid: &HalftoneGrid) -> Self {
        Self {
            x: grid.x_offset as i64,
            y: grid.y_offset as i64,
            row_x: grid.x_offset as i64,
            row_y: grid.y_offset as i64,
            hrx: grid.x_vector as i64,
            hry: grid.y_vector as i64,
        }
    }

    #[inline]
    fn get(&self) -> (i32, i32) {
        ((self.x >> 8) as i32, (self.y >> 8) as i32)
    }

    #[inline]
    fn advance_col(&mut self) {
        self.x += self.hrx;
        self.y -= self.hry;
    }

    #[inline]
    fn advance_row(&mut self) {
        self.row_x += self.hry;
        self.row_y += self.hrx;
        self.x = self.row_x;
        self.y = self.row_y;
    }
}

/// Compute the HSKIP bitmap (6.6.5.1).
///
/// A grid cell is skipped when the pattern placed there would fall entirely
/// outside the region.
fn compute_skip_bitmap(
    header: &HalftoneRegionHeader,
    pattern_dict: &PatternDictionary,
    region: &Bitmap,
) -> Bitmap {
    let grid = &header.grid;
    let pattern_width = pattern_dict.pattern_width as i32;
    let pattern_height = pattern_dict.pattern_height as i32;
    let region_width = region.width() as i32;
    let region_height = region.height() as i32;

    let mut hskip = Bitmap::new(grid.width, grid.height);
    let mut coords = GridCoords::new(grid);

    for m_g in 0..grid.height {
        for n_g in 0..grid.width {
            let (x, y) = coords.get();

            let skip = x + pattern_width <= 0
                || x >= region_width
                || y + pattern_height <= 0
                || y >= region_height;

            if skip {
                hskip.set(n_g, m_g, true);
            }

            coords.advance_col();
        }
        coords.advance_row();
    }

    hskip
}

/// Draw the pattern for each gray-scale value into the region (6.6.5.2).
fn render_patterns(
    region: &mut Bitmap,
    gray_image: &[u32],
    header: &HalftoneRegionHeader,
    pattern_dict: &PatternDictionary,
) -> Result<()> {
    let grid = &header.grid;
    let mut coords = GridCoords::new(grid);

    let expected = (grid.width as usize)
        .checked_mul(grid.height as usize)
        .ok_or(DecodeError::Overflow)?;
    debug_assert_eq!(gray_image.len(), expected);

    let mut index = 0;
    for _ in 0..grid.height {
        for _ in 0..grid.width {
            let (x, y) = coords.get();

            let pattern = pattern_dict
                .patterns
                .get(gray_image[index] as usize)
                .ok_or(RegionError::GrayScaleOutOfRange)?;
            index += 1;

            region.combine(pattern, x, y, header.flags.combination_operator);

            coords.advance_col();
        }
        coords.advance_row();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() {
        let data = [
            0x00, 0x00, 0x00, 0x20, // width
            0x00, 0x00, 0x00, 0x10, // height
            0x00, 0x00, 0x00, 0x00, // x
            0x00, 0x00, 0x00, 0x00, // y
            0x00, // external combination operator: OR
            0b0001_1011, // flags: MMR = 1, template 1, skip, AND
            0x00, 0x00, 0x00, 0x08, // HGW
            0x00, 0x00, 0x00, 0x04, // HGH
            0xff, 0xff, 0xff, 0xfe, // HGX = -2
            0x00, 0x00, 0x00, 0x01, // HGY = 1
            0x01, 0x00, // HRX = 256
            0x00, 0x00, // HRY = 0
        ];
        let mut reader = Reader::new(&data);
        let header = parse(&mut reader).unwrap();

        assert!(header.flags.mmr);
        assert_eq!(header.flags.template, Template::Template1);
        assert!(header.flags.enable_skip);
        assert_eq!(
            header.flags.combination_operator,
            CombinationOperator::And
        );
        assert!(!header.flags.default_pixel);
        assert_eq!(header.grid.width, 8);
        assert_eq!(header.grid.height, 4);
        assert_eq!(header.grid.x_offset, -2);
        assert_eq!(header.grid.y_offset, 1);
        assert_eq!(header.grid.x_vector, 256);
        assert_eq!(header.grid.y_vector, 0);
    }

    #[test]
    fn grid_walk_follows_the_vector() {
        // HRX = 1.0 and HRY = 0.5, with eight fractional bits.
        let grid = HalftoneGrid {
            width: 3,
            height: 2,
            x_offset: 0,
            y_offset: 0,
            x_vector: 256,
            y_vector: 128,
        };

        let mut coords = GridCoords::new(&grid);
        assert_eq!(coords.get(), (0, 0));

        coords.advance_col();
        assert_eq!(coords.get(), (1, -1));

        coords.advance_col();
        assert_eq!(coords.get(), (2, -1));

        // The next row starts at (HGX + HRY, HGY + HRX).
        coords.advance_row();
        assert_eq!(coords.get(), (0, 1));
    }
}
