//! Generic region segment parsing and decoding (7.4.6, 6.2).

use log::warn;

use super::{AtPixel, RegionSegmentInfo, Template, parse_at_pixels, parse_region_segment_info};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::bitmap::{Bitmap, Region};
use crate::error::{ParseError, RegionError, Result};
use crate::reader::Reader;

/// Parsed generic region segment header (7.4.6.1).
#[derive(Debug, Clone)]
struct GenericRegionHeader {
    region_info: RegionSegmentInfo,
    mmr: bool,
    template: Template,
    tpgdon: bool,
    at_pixels: Vec<AtPixel>,
}

/// Decode a generic region segment (7.4.6).
pub(crate) fn decode(reader: &mut Reader<'_>, had_unknown_length: bool) -> Result<Region> {
    let mut header = parse(reader)?;
    let mut encoded_data = reader.tail().ok_or(ParseError::UnexpectedEof)?;

    // "As a special case, as noted in 7.2.7, an immediate generic region
    // segment may have an unknown length. In this case, it also indicates the
    // height of the generic region (i.e. the number of rows that have been
    // decoded in this segment ...)." (7.4.6.4)
    if had_unknown_length {
        let marker: [u8; 2] = if header.mmr { [0x00, 0x00] } else { [0xff, 0xac] };

        // The data part ends with the two-byte terminator and the four-byte
        // row count. Streams cut off before the row count keep the declared
        // height.
        match encoded_data.len().checked_sub(6) {
            Some(pos) if encoded_data[pos..pos + 2] == marker => {
                let (head, tail) = encoded_data.split_at(pos + 2);
                let row_count = u32::from_be_bytes(tail.try_into().unwrap());

                if row_count > header.region_info.height {
                    warn!(
                        "unknown-length region declares {row_count} rows but the region is only {} rows tall",
                        header.region_info.height
                    );
                } else {
                    header.region_info.height = row_count;
                }

                encoded_data = head;
            }
            _ => warn!("unknown-length region is missing its row count"),
        }
    }

    let mut bitmap = Bitmap::new(header.region_info.width, header.region_info.height);

    if header.mmr {
        // "6.2.6 Decoding using MMR coding"
        decode_mmr(&mut bitmap, encoded_data)?;
    } else {
        // "6.2.5 Decoding using a template and arithmetic coding"
        let mut decoder = ArithmeticDecoder::new(encoded_data);
        let mut contexts = vec![Context::default(); 1 << header.template.context_size()];

        decode_bitmap(
            &mut bitmap,
            &mut decoder,
            &mut contexts,
            header.template,
            header.tpgdon,
            &header.at_pixels,
            None,
        )?;
    }

    Ok(Region {
        bitmap,
        x: header.region_info.x_location,
        y: header.region_info.y_location,
        op: header.region_info.combination_operator,
    })
}

/// Parse a generic region segment header (7.4.6.1).
fn parse(reader: &mut Reader<'_>) -> Result<GenericRegionHeader> {
    let region_info = parse_region_segment_info(reader)?;

    // 7.4.6.2: generic region segment flags.
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let mmr = flags & 0x01 != 0;
    let template = Template::from_value((flags >> 1) & 0x03)?;
    let tpgdon = flags & 0x08 != 0;

    let at_pixels = if mmr {
        Vec::new()
    } else {
        parse_at_pixels(reader, template.at_pixel_count())?
    };

    Ok(GenericRegionHeader {
        region_info,
        mmr,
        template,
        tpgdon,
        at_pixels,
    })
}

/// Decode a bitmap using MMR coding (6.2.6).
pub(crate) fn decode_mmr(bitmap: &mut Bitmap, data: &[u8]) -> Result<usize> {
    /// A sink that writes decoded pixels into a packed bitmap.
    struct BitmapSink<'a> {
        bitmap: &'a mut Bitmap,
        x: u32,
        y: u32,
    }

    impl hayro_ccitt::Decoder for BitmapSink<'_> {
        fn push_pixel(&mut self, white: bool) {
            // With `invert_black` set, `white` already carries the JBIG2
            // sense of the pixel (1 = black). Writes past the row width are
            // dropped but still counted, so runs stay in sync.
            self.bitmap.set(self.x, self.y, white);
            self.x += 1;
        }

        fn push_pixel_chunk(&mut self, white: bool, chunk_count: u32) {
            for _ in 0..chunk_count * 8 {
                self.push_pixel(white);
            }
        }

        fn next_line(&mut self) {
            self.x = 0;
            self.y += 1;
        }
    }

    let settings = hayro_ccitt::DecodeSettings {
        columns: bitmap.width(),
        rows: bitmap.height(),
        // "If the number of bytes contained in the encoded bitmap is known in
        // advance, then it is permissible for the data stream not to contain
        // an EOFB" (6.2.6). It may still contain one.
        end_of_block: true,
        end_of_line: false,
        rows_are_byte_aligned: false,
        encoding: hayro_ccitt::EncodingMode::Group4,
        // "Pixels decoded by the MMR decoder having the value 'black' shall
        // be treated as having the value 1." (6.2.6)
        invert_black: true,
    };

    let mut sink = BitmapSink { bitmap, x: 0, y: 0 };
    let mut ctx = hayro_ccitt::DecoderContext::new(settings);

    hayro_ccitt::decode(data, &mut sink, &mut ctx).map_err(|_| RegionError::InvalidDimension.into())
}

/// Decode a bitmap using a template and arithmetic coding (6.2.5.7).
///
/// The decoder and context storage are passed in so that callers decoding a
/// sequence of bitmaps (symbol dictionaries, gray-scale bitplanes) share
/// adaptive state across invocations.
///
/// If a skip bitmap is present, pixels where it is set are not decoded and
/// stay 0 (6.2.5.7 step 3c).
pub(crate) fn decode_bitmap(
    bitmap: &mut Bitmap,
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    template: Template,
    tpgdon: bool,
    at_pixels: &[AtPixel],
    skip: Option<&Bitmap>,
) -> Result<()> {
    // "1) Set: LTP = 0" (6.2.5.7)
    let mut ltp = false;

    for y in 0..bitmap.height() {
        // "b) If TPGDON is 1, then decode a bit using the arithmetic entropy
        // coder" with the per-template SLTP context of Figures 8 to 11.
        if tpgdon {
            let sltp_context: u32 = match template {
                Template::Template0 => 0b1001101100100101,
                Template::Template1 => 0b0011110010101,
                Template::Template2 => 0b0011100101,
                Template::Template3 => 0b0110010101,
            };

            let sltp = decoder.decode(&mut contexts[sltp_context as usize]);
            ltp ^= sltp != 0;
        }

        if ltp {
            // "c) If LTP = 1 then set every pixel of the current row of GBREG
            // equal to the corresponding pixel of the row immediately above."
            if y > 0 {
                for x in 0..bitmap.width() {
                    let above = bitmap.get(x, y - 1);
                    bitmap.set(x, y, above);
                }
            }
        } else {
            // "d) If LTP = 0 then, from left to right, decode each pixel of
            // the current row of GBREG."
            for x in 0..bitmap.width() {
                if skip.is_some_and(|s| s.get(x, y)) {
                    continue;
                }

                let context = gather_context(bitmap, x, y, template, at_pixels);
                let pixel = decoder.decode(&mut contexts[context as usize]);
                bitmap.set(x, y, pixel != 0);
            }
        }
    }

    Ok(())
}

/// Gather the template context for the pixel at (x, y) (6.2.5.3, 6.2.5.4).
pub(crate) fn gather_context(
    bitmap: &Bitmap,
    x: u32,
    y: u32,
    template: Template,
    at_pixels: &[AtPixel],
) -> u32 {
    let x = x as i32;
    let y = y as i32;

    let at = |index: usize| {
        let at = at_pixels[index];
        bitmap.pixel(x + at.x as i32, y + at.y as i32)
    };

    let mut context = 0_u32;
    let mut push = |value: u32| context = (context << 1) | value;

    match template {
        // Figure 3a, 16 pixels.
        Template::Template0 => {
            push(at(3));
            push(bitmap.pixel(x - 1, y - 2));
            push(bitmap.pixel(x, y - 2));
            push(bitmap.pixel(x + 1, y - 2));
            push(at(2));

            push(at(1));
            push(bitmap.pixel(x - 2, y - 1));
            push(bitmap.pixel(x - 1, y - 1));
            push(bitmap.pixel(x, y - 1));
            push(bitmap.pixel(x + 1, y - 1));
            push(bitmap.pixel(x + 2, y - 1));
            push(at(0));

            push(bitmap.pixel(x - 4, y));
            push(bitmap.pixel(x - 3, y));
            push(bitmap.pixel(x - 2, y));
            push(bitmap.pixel(x - 1, y));
        }
        // Figure 4, 13 pixels.
        Template::Template1 => {
            push(bitmap.pixel(x - 1, y - 2));
            push(bitmap.pixel(x, y - 2));
            push(bitmap.pixel(x + 1, y - 2));
            push(bitmap.pixel(x + 2, y - 2));

            push(bitmap.pixel(x - 2, y - 1));
            push(bitmap.pixel(x - 1, y - 1));
            push(bitmap.pixel(x, y - 1));
            push(bitmap.pixel(x + 1, y - 1));
            push(bitmap.pixel(x + 2, y - 1));
            push(at(0));

            push(bitmap.pixel(x - 3, y));
            push(bitmap.pixel(x - 2, y));
            push(bitmap.pixel(x - 1, y));
        }
        // Figure 5, 10 pixels.
        Template::Template2 => {
            push(bitmap.pixel(x - 1, y - 2));
            push(bitmap.pixel(x, y - 2));
            push(bitmap.pixel(x + 1, y - 2));

            push(bitmap.pixel(x - 2, y - 1));
            push(bitmap.pixel(x - 1, y - 1));
            push(bitmap.pixel(x, y - 1));
            push(bitmap.pixel(x + 1, y - 1));
            push(at(0));

            push(bitmap.pixel(x - 2, y));
            push(bitmap.pixel(x - 1, y));
        }
        // Figure 6, 10 pixels.
        Template::Template3 => {
            push(bitmap.pixel(x - 3, y - 1));
            push(bitmap.pixel(x - 2, y - 1));
            push(bitmap.pixel(x - 1, y - 1));
            push(bitmap.pixel(x, y - 1));
            push(bitmap.pixel(x + 1, y - 1));
            push(at(0));

            push(bitmap.pixel(x - 4, y));
            push(bitmap.pixel(x - 3, y));
            push(bitmap.pixel(x - 2, y));
            push(bitmap.pixel(x - 1, y));
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The nominal AT pixel locations for each template (Figures 3a, 4, 5, 6).
    fn nominal_at_pixels(template: Template) -> Vec<AtPixel> {
        match template {
            Template::Template0 => vec![
                AtPixel { x: 3, y: -1 },
                AtPixel { x: -3, y: -1 },
                AtPixel { x: 2, y: -2 },
                AtPixel { x: -2, y: -2 },
            ],
            _ => vec![AtPixel { x: 3, y: -1 }],
        }
    }

    #[test]
    fn template_0_context_packing() {
        // A 5x3 bitmap with a known pattern:
        //   1 0 1 1 0
        //   0 1 1 0 1
        //   1 1 . . .   (decoding the pixel at (2, 2))
        let mut bitmap = Bitmap::new(5, 3);
        for &(x, y) in &[(0, 0), (2, 0), (3, 0), (1, 1), (2, 1), (4, 1), (0, 2), (1, 2)] {
            bitmap.set(x, y, true);
        }

        let at = nominal_at_pixels(Template::Template0);
        let context = gather_context(&bitmap, 2, 2, Template::Template0, &at);

        // In template order: A4 = (0, 0) -> 1, (1, 0) -> 0, (2, 0) -> 1,
        // (3, 0) -> 1, A3 = (4, 0) -> 0, A2 = (-1, 1) -> 0, (0, 1) -> 0,
        // (1, 1) -> 1, (2, 1) -> 1, (3, 1) -> 0, (4, 1) -> 1,
        // A1 = (5, 1) -> 0, (-2, 2) -> 0, (-1, 2) -> 0, (0, 2) -> 1,
        // (1, 2) -> 1.
        assert_eq!(context, 0b1011_0001_1010_0011);
    }

    #[test]
    fn out_of_bounds_template_pixels_are_zero() {
        let bitmap = Bitmap::new(4, 4);
        let at = nominal_at_pixels(Template::Template3);

        assert_eq!(gather_context(&bitmap, 0, 0, Template::Template3, &at), 0);
    }

    #[test]
    fn mmr_flag_skips_at_pixels() {
        let data = [
            0x00, 0x00, 0x00, 0x08, // width
            0x00, 0x00, 0x00, 0x08, // height
            0x00, 0x00, 0x00, 0x00, // x
            0x00, 0x00, 0x00, 0x00, // y
            0x00, // external combination operator: OR
            0x01, // flags: MMR = 1
        ];
        let mut reader = Reader::new(&data);
        let header = parse(&mut reader).unwrap();

        assert!(header.mmr);
        assert!(header.at_pixels.is_empty());
        assert!(reader.at_end());
    }
}
