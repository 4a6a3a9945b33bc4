//! Region decoding procedures and shared region types.

pub(crate) mod generic;
pub(crate) mod halftone;
pub(crate) mod pattern;
pub(crate) mod refinement;
pub(crate) mod symbol;
pub(crate) mod text;

use crate::error::{FormatError, ParseError, RegionError, Result, bail, err};
use crate::reader::Reader;

/// "These operators describe how the segment's bitmap is to be combined with
/// the page bitmap." (7.4.1.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CombinationOperator {
    Or,
    And,
    Xor,
    Xnor,
    Replace,
}

impl CombinationOperator {
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Or),
            1 => Ok(Self::And),
            2 => Ok(Self::Xor),
            3 => Ok(Self::Xnor),
            4 => Ok(Self::Replace),
            _ => err!(RegionError::InvalidCombinationOperator),
        }
    }
}

/// The generic region template (GBTEMPLATE, 6.2.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Template {
    Template0,
    Template1,
    Template2,
    Template3,
}

impl Template {
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Template0),
            1 => Ok(Self::Template1),
            2 => Ok(Self::Template2),
            3 => Ok(Self::Template3),
            _ => err!(RegionError::InvalidTemplate),
        }
    }

    /// The number of context bits formed by this template (Figure 8).
    pub(crate) fn context_size(self) -> u32 {
        match self {
            Self::Template0 => 16,
            Self::Template1 => 13,
            Self::Template2 => 10,
            Self::Template3 => 10,
        }
    }

    /// The number of adaptive pixels the template carries (6.2.5.3).
    pub(crate) fn at_pixel_count(self) -> usize {
        match self {
            Self::Template0 => 4,
            _ => 1,
        }
    }
}

/// The refinement template (GRTEMPLATE, 6.3.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefinementTemplate {
    Template0,
    Template1,
}

impl RefinementTemplate {
    pub(crate) fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Template0),
            1 => Ok(Self::Template1),
            _ => err!(RegionError::InvalidTemplate),
        }
    }

    /// The number of context bits formed by this template (Figure 12).
    pub(crate) fn context_size(self) -> u32 {
        match self {
            Self::Template0 => 13,
            Self::Template1 => 10,
        }
    }
}

/// An adaptive template pixel location (AT pixel, 6.2.5.3).
///
/// Offsets are relative to the pixel being decoded and are signed 8-bit
/// values, "so the field may take on values between -128 and 127".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AtPixel {
    pub(crate) x: i8,
    pub(crate) y: i8,
}

/// Parse the AT pixel positions of a generic region (7.4.6.3).
///
/// "The adaptive template pixels shall only reference pixels in previous
/// rows, or earlier pixels in the same row": y > 0, or y = 0 with x < 0,
/// is invalid.
pub(crate) fn parse_at_pixels(reader: &mut Reader<'_>, count: usize) -> Result<Vec<AtPixel>> {
    let mut pixels = Vec::with_capacity(count);

    for _ in 0..count {
        let x = reader.read_byte().ok_or(ParseError::UnexpectedEof)? as i8;
        let y = reader.read_byte().ok_or(ParseError::UnexpectedEof)? as i8;

        if y > 0 || (y == 0 && x >= 0) {
            bail!(RegionError::InvalidAtPixel);
        }

        pixels.push(AtPixel { x, y });
    }

    Ok(pixels)
}

/// Parse the two AT pixel positions of a refinement template (7.4.7.3).
///
/// Refinement AT pixels reference the reference bitmap and carry no
/// causality restriction.
pub(crate) fn parse_refinement_at_pixels(reader: &mut Reader<'_>) -> Result<[AtPixel; 2]> {
    let mut pixels = [AtPixel { x: 0, y: 0 }; 2];

    for pixel in &mut pixels {
        pixel.x = reader.read_byte().ok_or(ParseError::UnexpectedEof)? as i8;
        pixel.y = reader.read_byte().ok_or(ParseError::UnexpectedEof)? as i8;
    }

    Ok(pixels)
}

/// Parsed region segment information field (7.4.1, Figure 30).
#[derive(Debug, Clone)]
pub(crate) struct RegionSegmentInfo {
    /// "This four-byte field gives the width in pixels of the bitmap encoded
    /// in this segment." (7.4.1.1)
    pub(crate) width: u32,
    /// The height in pixels of the encoded bitmap (7.4.1.2).
    pub(crate) height: u32,
    /// Horizontal offset of the bitmap relative to the page (7.4.1.3).
    pub(crate) x_location: u32,
    /// Vertical offset of the bitmap relative to the page (7.4.1.4).
    pub(crate) y_location: u32,
    /// "Bits 0-2: External combination operator." (7.4.1.5)
    pub(crate) combination_operator: CombinationOperator,
}

/// Parse the region segment information field (7.4.1).
pub(crate) fn parse_region_segment_info(reader: &mut Reader<'_>) -> Result<RegionSegmentInfo> {
    let width = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let height = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let x_location = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let y_location = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

    // "Bits 0-2: External combination operator."
    let combination_operator = CombinationOperator::from_value(flags & 0x07)?;

    // "Bits 3-7: Reserved; must be 0."
    if flags & 0xf8 != 0 {
        bail!(FormatError::ReservedBits);
    }

    Ok(RegionSegmentInfo {
        width,
        height,
        x_location,
        y_location,
        combination_operator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_info_parses_all_fields() {
        let data = [
            0x00, 0x00, 0x00, 0x40, // width = 64
            0x00, 0x00, 0x00, 0x38, // height = 56
            0x00, 0x00, 0x00, 0x10, // x = 16
            0x00, 0x00, 0x00, 0x20, // y = 32
            0x02, // XOR
        ];
        let mut reader = Reader::new(&data);
        let info = parse_region_segment_info(&mut reader).unwrap();

        assert_eq!(info.width, 64);
        assert_eq!(info.height, 56);
        assert_eq!(info.x_location, 16);
        assert_eq!(info.y_location, 32);
        assert_eq!(info.combination_operator, CombinationOperator::Xor);
    }

    #[test]
    fn at_pixels_must_be_causal() {
        // (0, 0) references the pixel being decoded.
        let mut reader = Reader::new(&[0x00, 0x00]);
        assert!(parse_at_pixels(&mut reader, 1).is_err());

        // (-1, 0) is an earlier pixel in the same row.
        let mut reader = Reader::new(&[0xff, 0x00]);
        let pixels = parse_at_pixels(&mut reader, 1).unwrap();
        assert_eq!(pixels[0], AtPixel { x: -1, y: 0 });

        // (3, -1) is the nominal A1 location.
        let mut reader = Reader::new(&[0x03, 0xff]);
        let pixels = parse_at_pixels(&mut reader, 1).unwrap();
        assert_eq!(pixels[0], AtPixel { x: 3, y: -1 });
    }
}
