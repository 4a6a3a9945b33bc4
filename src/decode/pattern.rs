//! Pattern dictionary segment parsing and decoding (7.4.4, 6.7).

use super::{AtPixel, Template, generic};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::bitmap::Bitmap;
use crate::error::{DecodeError, ParseError, Result};
use crate::reader::Reader;

/// A decoded pattern dictionary.
#[derive(Debug, Clone)]
pub(crate) struct PatternDictionary {
    pub(crate) patterns: Vec<Bitmap>,
    /// HDPW.
    pub(crate) pattern_width: u32,
    /// HDPH.
    pub(crate) pattern_height: u32,
}

/// Decode a pattern dictionary segment (7.4.4, 6.7).
pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<PatternDictionary> {
    let header = parse(reader)?;

    let pattern_width = header.pattern_width as u32;
    let pattern_height = header.pattern_height as u32;
    let num_patterns = header
        .gray_max
        .checked_add(1)
        .ok_or(DecodeError::Overflow)?;

    // "1) Create a bitmap B_HDC. The height of this bitmap is HDPH. The
    // width of the bitmap is (GRAYMAX + 1) x HDPW. This bitmap contains all
    // the patterns concatenated left to right." (6.7.5)
    let collective_width = num_patterns
        .checked_mul(pattern_width)
        .ok_or(DecodeError::Overflow)?;

    let encoded_data = reader.tail().ok_or(ParseError::UnexpectedEof)?;
    let mut collective = Bitmap::new(collective_width, pattern_height);

    // "2) Decode the collective bitmap using a generic region decoding
    // procedure", with the parameters of Table 24.
    if header.mmr {
        generic::decode_mmr(&mut collective, encoded_data)?;
    } else {
        // Table 24 fixes A1 to (-HDPW, 0); the remaining template 0 pixels
        // keep their nominal locations. HDPW can exceed the AT pixel range,
        // in which case the offset saturates.
        let a1 = AtPixel {
            x: (-(pattern_width as i32)).max(i8::MIN as i32) as i8,
            y: 0,
        };

        let at_pixels: &[AtPixel] = match header.template {
            Template::Template0 => &[
                a1,
                AtPixel { x: -3, y: -1 },
                AtPixel { x: 2, y: -2 },
                AtPixel { x: -2, y: -2 },
            ],
            _ => &[a1],
        };

        let mut decoder = ArithmeticDecoder::new(encoded_data);
        let mut contexts = vec![Context::default(); 1 << header.template.context_size()];

        generic::decode_bitmap(
            &mut collective,
            &mut decoder,
            &mut contexts,
            header.template,
            false,
            at_pixels,
            None,
        )?;
    }

    // "4) While GRAY <= GRAYMAX: ... Let the subimage of B_HDC consisting of
    // HDPH rows and columns HDPW x GRAY through HDPW x (GRAY + 1) - 1 be
    // denoted B_P." (6.7.5)
    let mut patterns = Vec::with_capacity(num_patterns as usize);

    for gray in 0..num_patterns {
        let start_x = gray * pattern_width;
        let mut pattern = Bitmap::new(pattern_width, pattern_height);

        for y in 0..pattern_height {
            for x in 0..pattern_width {
                pattern.set(x, y, collective.get(start_x + x, y));
            }
        }

        patterns.push(pattern);
    }

    Ok(PatternDictionary {
        patterns,
        pattern_width,
        pattern_height,
    })
}

/// Parsed pattern dictionary segment header (7.4.4.1).
#[derive(Debug, Clone)]
struct PatternDictionaryHeader {
    mmr: bool,
    template: Template,
    /// HDPW, "value range 1 to 255".
    pattern_width: u8,
    /// HDPH.
    pattern_height: u8,
    /// GRAYMAX.
    gray_max: u32,
}

/// Parse a pattern dictionary segment header (7.4.4.1).
fn parse(reader: &mut Reader<'_>) -> Result<PatternDictionaryHeader> {
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let mmr = flags & 0x01 != 0;
    let template = Template::from_value((flags >> 1) & 0x03)?;

    let pattern_width = reader
        .read_nonzero_byte()
        .ok_or(ParseError::UnexpectedEof)?;
    let pattern_height = reader
        .read_nonzero_byte()
        .ok_or(ParseError::UnexpectedEof)?;
    let gray_max = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    Ok(PatternDictionaryHeader {
        mmr,
        template,
        pattern_width,
        pattern_height,
        gray_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields() {
        let data = [
            0x04, // flags: MMR = 0, HDTEMPLATE = 2
            0x05, // HDPW
            0x03, // HDPH
            0x00, 0x00, 0x00, 0x07, // GRAYMAX
        ];
        let mut reader = Reader::new(&data);
        let header = parse(&mut reader).unwrap();

        assert!(!header.mmr);
        assert_eq!(header.template, Template::Template2);
        assert_eq!(header.pattern_width, 5);
        assert_eq!(header.pattern_height, 3);
        assert_eq!(header.gray_max, 7);
    }

    #[test]
    fn zero_pattern_size_is_rejected() {
        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00];
        let mut reader = Reader::new(&data);
        assert!(parse(&mut reader).is_err());
    }
}
