//! Gray-scale image decoding procedure (Annex C).

use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::bitmap::Bitmap;
use crate::decode::generic;
use crate::decode::{AtPixel, Template};
use crate::error::Result;

/// Input parameters to the gray-scale image decoding procedure (Table C.1).
#[derive(Debug, Clone)]
pub(crate) struct GrayScaleParams<'a> {
    /// GSMMR.
    pub(crate) use_mmr: bool,
    /// GSBPP: the number of bits per gray-scale value.
    pub(crate) bits_per_pixel: u32,
    /// GSW.
    pub(crate) width: u32,
    /// GSH.
    pub(crate) height: u32,
    /// GSTEMPLATE: the template used to code the bitplanes.
    pub(crate) template: Template,
    /// GSKIP: pixels where this is set are not decoded. `None` if
    /// GSUSESKIP = 0.
    pub(crate) skip: Option<&'a Bitmap>,
}

/// The gray-scale image decoding procedure (C.5).
///
/// Returns GSVALS: the gray-scale values in row-major order, GSW x GSH
/// entries.
pub(crate) fn decode_gray_scale_image(
    data: &[u8],
    params: &GrayScaleParams<'_>,
) -> Result<Vec<u32>> {
    if params.use_mmr {
        decode_mmr(data, params)
    } else {
        decode_arithmetic(data, params)
    }
}

/// Decode the bitplanes with MMR (Table C.4: "MMR = GSMMR").
///
/// Each bitplane is a separately terminated MMR-coded bitmap; the planes
/// follow each other in the data.
fn decode_mmr(data: &[u8], params: &GrayScaleParams<'_>) -> Result<Vec<u32>> {
    let mut offset = 0;

    decode_bitplanes(params, |_| {
        // Table C.4: "GBW = GSW, GBH = GSH".
        let mut bitplane = Bitmap::new(params.width, params.height);
        offset += generic::decode_mmr(&mut bitplane, &data[offset.min(data.len())..])?;
        Ok(bitplane)
    })
}

/// Decode the bitplanes with arithmetic coding (Table C.4).
///
/// A single arithmetic decoder and context set is shared by all bitplanes.
fn decode_arithmetic(data: &[u8], params: &GrayScaleParams<'_>) -> Result<Vec<u32>> {
    // Table C.4: the adaptive template pixel positions.
    let at_pixels: &[AtPixel] = match params.template {
        Template::Template0 => &[
            AtPixel { x: 3, y: -1 },
            AtPixel { x: -3, y: -1 },
            AtPixel { x: 2, y: -2 },
            AtPixel { x: -2, y: -2 },
        ],
        Template::Template1 => &[AtPixel { x: 3, y: -1 }],
        Template::Template2 | Template::Template3 => &[AtPixel { x: 2, y: -1 }],
    };

    let mut decoder = ArithmeticDecoder::new(data);
    let mut contexts = vec![Context::default(); 1 << params.template.context_size()];

    decode_bitplanes(params, |_| {
        // Table C.4: "TPGDON = 0, USESKIP = GSUSESKIP, SKIP = GSKIP".
        let mut bitplane = Bitmap::new(params.width, params.height);

        generic::decode_bitmap(
            &mut bitplane,
            &mut decoder,
            &mut contexts,
            params.template,
            false,
            at_pixels,
            params.skip,
        )?;

        Ok(bitplane)
    })
}

/// Decode the bitplanes from most significant to least significant, undo the
/// Gray coding and sum up the gray-scale values (C.5 steps 1 to 4).
fn decode_bitplanes<F>(params: &GrayScaleParams<'_>, mut decode_next: F) -> Result<Vec<u32>>
where
    F: FnMut(u32) -> Result<Bitmap>,
{
    let width = params.width;
    let height = params.height;
    let bits_per_pixel = params.bits_per_pixel;

    let mut values = vec![0_u32; (width as usize) * (height as usize)];

    // "1) Decode GSPLANES[GSBPP - 1] ..."; the most significant plane
    // contributes its bits directly.
    let mut prev_plane = decode_next(bits_per_pixel - 1)?;

    for y in 0..height {
        for x in 0..width {
            if prev_plane.get(x, y) {
                values[(y * width + x) as usize] |= 1 << (bits_per_pixel - 1);
            }
        }
    }

    // "2) Set J = GSBPP - 2. 3) While J >= 0 ..."
    for j in (0..bits_per_pixel - 1).rev() {
        let mut plane = decode_next(j)?;

        // "b) ... GSPLANES[J][x, y] = GSPLANES[J + 1][x, y] XOR
        // GSPLANES[J][x, y]": the planes are Gray coded, so each one is
        // XORed with the plane above it. Whole bytes at a time; padding
        // bits are zero in both planes.
        for y in 0..height {
            for (dst, src) in plane.row_mut(y).iter_mut().zip(prev_plane.row(y)) {
                *dst ^= src;
            }
        }

        // "4) GSVALS[x, y] = sum of GSPLANES[J][x, y] * 2^J"
        for y in 0..height {
            for x in 0..width {
                if plane.get(x, y) {
                    values[(y * width + x) as usize] |= 1 << j;
                }
            }
        }

        prev_plane = plane;
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitplanes_are_gray_decoded() {
        let params = GrayScaleParams {
            use_mmr: false,
            bits_per_pixel: 2,
            width: 2,
            height: 1,
            template: Template::Template0,
            skip: None,
        };

        // MSB plane: [1, 0]. LSB plane as decoded: [0, 1]. After undoing the
        // Gray coding the LSB plane is [1, 1], so the values are 3 and 1.
        // The planes are popped most significant first.
        let mut planes = vec![
            {
                let mut p = Bitmap::new(2, 1);
                p.set(1, 0, true);
                p
            },
            {
                let mut p = Bitmap::new(2, 1);
                p.set(0, 0, true);
                p
            },
        ];

        let values = decode_bitplanes(&params, |_| Ok(planes.pop().unwrap())).unwrap();
        assert_eq!(values, vec![0b11, 0b01]);
        assert!(planes.is_empty());
    }
}
