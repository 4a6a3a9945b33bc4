//! Generic refinement region segment parsing and decoding (7.4.7, 6.3).

use super::{
    AtPixel, RefinementTemplate, RegionSegmentInfo, parse_refinement_at_pixels,
    parse_region_segment_info,
};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::bitmap::{Bitmap, Region};
use crate::error::{DecodeError, ParseError, RegionError, Result, bail};
use crate::reader::Reader;

/// Decode a generic refinement region segment against a reference bitmap.
///
/// The reference is the page bitmap, or a previously decoded intermediate
/// region; `(reference_x, reference_y)` is its location on the page
/// (7.4.7.2).
pub(crate) fn decode(
    reader: &mut Reader<'_>,
    reference: &Bitmap,
    reference_x: u32,
    reference_y: u32,
) -> Result<Region> {
    let header = parse(reader)?;

    if header.region_info.width > reference.width()
        || header.region_info.height > reference.height()
    {
        bail!(RegionError::InvalidDimension);
    }

    // The offset between the refinement coordinates and the reference.
    let dx = i32::try_from(reference_x)
        .ok()
        .and_then(|r| i32::try_from(header.region_info.x_location).ok().map(|h| r - h))
        .ok_or(DecodeError::Overflow)?;
    let dy = i32::try_from(reference_y)
        .ok()
        .and_then(|r| i32::try_from(header.region_info.y_location).ok().map(|h| r - h))
        .ok_or(DecodeError::Overflow)?;

    let encoded_data = reader.tail().ok_or(ParseError::UnexpectedEof)?;
    let mut decoder = ArithmeticDecoder::new(encoded_data);
    let mut contexts = vec![Context::default(); 1 << header.template.context_size()];

    let mut bitmap = Bitmap::new(header.region_info.width, header.region_info.height);

    decode_bitmap(
        &mut bitmap,
        &mut decoder,
        &mut contexts,
        reference,
        dx,
        dy,
        header.template,
        &header.at_pixels,
        header.tpgron,
    )?;

    Ok(Region {
        bitmap,
        x: header.region_info.x_location,
        y: header.region_info.y_location,
        op: header.region_info.combination_operator,
    })
}

/// Parsed generic refinement region segment header (7.4.7.1).
#[derive(Debug, Clone)]
struct RefinementRegionHeader {
    region_info: RegionSegmentInfo,
    template: RefinementTemplate,
    tpgron: bool,
    at_pixels: [AtPixel; 2],
}

/// Parse a generic refinement region segment header (7.4.7.1).
fn parse(reader: &mut Reader<'_>) -> Result<RefinementRegionHeader> {
    let region_info = parse_region_segment_info(reader)?;

    // 7.4.7.2: generic refinement region segment flags.
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let template = RefinementTemplate::from_value(flags & 0x01)?;
    let tpgron = flags & 0x02 != 0;

    // "If GRTEMPLATE is 1, this field is not present." (7.4.7.3)
    let at_pixels = if template == RefinementTemplate::Template0 {
        parse_refinement_at_pixels(reader)?
    } else {
        [AtPixel { x: 0, y: 0 }; 2]
    };

    Ok(RefinementRegionHeader {
        region_info,
        template,
        tpgron,
        at_pixels,
    })
}

/// Decode a refinement bitmap (6.3.5.6).
///
/// `(dx, dy)` is the offset of the reference bitmap relative to the bitmap
/// being decoded: the reference pixel for (x, y) is (x - dx, y - dy).
pub(crate) fn decode_bitmap(
    bitmap: &mut Bitmap,
    decoder: &mut ArithmeticDecoder<'_>,
    contexts: &mut [Context],
    reference: &Bitmap,
    dx: i32,
    dy: i32,
    template: RefinementTemplate,
    at_pixels: &[AtPixel],
    tpgron: bool,
) -> Result<()> {
    // "1) Set LTP = 0." (6.3.5.6)
    let mut ltp = false;

    for y in 0..bitmap.height() {
        // "b) If TPGRON is 1, then decode a bit using the arithmetic entropy
        // coder" with the SLTP contexts of Figures 14 and 15.
        if tpgron {
            let sltp_context: u32 = match template {
                RefinementTemplate::Template0 => 0b0000000010000,
                RefinementTemplate::Template1 => 0b0000001000,
            };

            let sltp = decoder.decode(&mut contexts[sltp_context as usize]);
            ltp ^= sltp != 0;
        }

        for x in 0..bitmap.width() {
            let ref_x = x as i32 - dx;
            let ref_y = y as i32 - dy;

            // "i) Set TPGRPIX equal to 1 if ... a 3 × 3 pixel array in the
            // reference bitmap, centred at the location corresponding to the
            // current pixel, contains pixels all of the same value."
            if ltp {
                let center = reference.pixel(ref_x, ref_y);
                let uniform = (-1..=1).all(|oy| {
                    (-1..=1).all(|ox| reference.pixel(ref_x + ox, ref_y + oy) == center)
                });

                if uniform {
                    // "ii) ... implicitly decode the current pixel by setting
                    // it equal to its predicted value."
                    bitmap.set(x, y, center != 0);
                    continue;
                }
            }

            let context = gather_context(bitmap, reference, x, y, dx, dy, template, at_pixels);
            let pixel = decoder.decode(&mut contexts[context as usize]);
            bitmap.set(x, y, pixel != 0);
        }
    }

    Ok(())
}

/// Gather the refinement template context for the pixel at (x, y) (6.3.5.3).
fn gather_context(
    bitmap: &Bitmap,
    reference: &Bitmap,
    x: u32,
    y: u32,
    dx: i32,
    dy: i32,
    template: RefinementTemplate,
    at_pixels: &[AtPixel],
) -> u32 {
    let x = x as i32;
    let y = y as i32;
    let ref_x = x - dx;
    let ref_y = y - dy;

    let mut context = 0_u32;
    let mut push = |value: u32| context = (context << 1) | value;

    match template {
        // Figure 12, 13 pixels with 2 AT pixels.
        RefinementTemplate::Template0 => {
            let at1 = at_pixels[0];
            let at2 = at_pixels[1];

            // Pixels from the bitmap being decoded.
            push(bitmap.pixel(x + at1.x as i32, y + at1.y as i32));
            push(bitmap.pixel(x, y - 1));
            push(bitmap.pixel(x + 1, y - 1));
            push(bitmap.pixel(x - 1, y));

            // Pixels from the reference bitmap.
            push(reference.pixel(ref_x + at2.x as i32, ref_y + at2.y as i32));
            push(reference.pixel(ref_x, ref_y - 1));
            push(reference.pixel(ref_x + 1, ref_y - 1));
            push(reference.pixel(ref_x - 1, ref_y));
            push(reference.pixel(ref_x, ref_y));
            push(reference.pixel(ref_x + 1, ref_y));
            push(reference.pixel(ref_x - 1, ref_y + 1));
            push(reference.pixel(ref_x, ref_y + 1));
            push(reference.pixel(ref_x + 1, ref_y + 1));
        }
        // Figure 13, 10 pixels.
        RefinementTemplate::Template1 => {
            push(bitmap.pixel(x - 1, y - 1));
            push(bitmap.pixel(x, y - 1));
            push(bitmap.pixel(x + 1, y - 1));
            push(bitmap.pixel(x - 1, y));

            push(reference.pixel(ref_x, ref_y - 1));
            push(reference.pixel(ref_x - 1, ref_y));
            push(reference.pixel(ref_x, ref_y));
            push(reference.pixel(ref_x + 1, ref_y));
            push(reference.pixel(ref_x, ref_y + 1));
            push(reference.pixel(ref_x + 1, ref_y + 1));
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_1_context_packing() {
        // Reference is all black; the bitmap being decoded is still empty.
        let reference = Bitmap::new_filled(4, 4, true);
        let bitmap = Bitmap::new(4, 4);

        let context = gather_context(
            &bitmap,
            &reference,
            1,
            1,
            0,
            0,
            RefinementTemplate::Template1,
            &[],
        );

        // The four bits from the decoded bitmap are 0, the six reference
        // bits are 1.
        assert_eq!(context, 0b0000_111111);
    }

    #[test]
    fn template_1_has_no_at_pixels() {
        let data = [
            0x00, 0x00, 0x00, 0x04, // width
            0x00, 0x00, 0x00, 0x04, // height
            0x00, 0x00, 0x00, 0x00, // x
            0x00, 0x00, 0x00, 0x00, // y
            0x00, // external combination operator: OR
            0x03, // flags: GRTEMPLATE = 1, TPGRON = 1
        ];
        let mut reader = Reader::new(&data);
        let header = parse(&mut reader).unwrap();

        assert_eq!(header.template, RefinementTemplate::Template1);
        assert!(header.tpgron);
        assert!(reader.at_end());
    }
}
