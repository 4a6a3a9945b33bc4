//! Page information parsing and page bitmap assembly (7.4.8).

use crate::bitmap::{Bitmap, Region};
use crate::decode::CombinationOperator;
use crate::error::{FormatError, ParseError, Result, err};
use crate::reader::Reader;

/// Parsed page information segment (7.4.8).
#[derive(Debug, Clone)]
pub(crate) struct PageInformation {
    /// "This is a four-byte value containing the width in pixels of the
    /// page's bitmap." (7.4.8.1)
    pub(crate) width: u32,
    /// The height in pixels of the page's bitmap; 0xFFFFFFFF if unknown
    /// (7.4.8.2).
    pub(crate) height: u32,
    /// Horizontal resolution in pixels/metre; `None` if unknown (7.4.8.3).
    pub(crate) x_resolution: Option<u32>,
    /// Vertical resolution in pixels/metre; `None` if unknown (7.4.8.4).
    pub(crate) y_resolution: Option<u32>,
    pub(crate) flags: PageFlags,
    pub(crate) striping: PageStriping,
}

/// Page segment flags (7.4.8.5).
#[derive(Debug, Clone)]
pub(crate) struct PageFlags {
    /// Bit 0: "Page is eventually lossless."
    pub(crate) is_lossless: bool,
    /// Bit 1: "Page might contain refinements."
    pub(crate) might_contain_refinements: bool,
    /// Bit 2: "Page default pixel value. This bit contains the initial value
    /// for every pixel in the page, before any region segments are decoded
    /// or drawn."
    pub(crate) default_pixel: bool,
    /// Bits 3-4: "Page default combination operator."
    pub(crate) default_combination_operator: CombinationOperator,
    /// Bit 5: "Page requires auxiliary buffers."
    pub(crate) requires_auxiliary_buffers: bool,
    /// Bit 6: "Page combination operator overridden. ... If this bit is 1,
    /// then direct region segments associated with this page may use any
    /// combination operators."
    pub(crate) combination_operator_overridden: bool,
}

/// Page striping information (7.4.8.6).
#[derive(Debug, Clone)]
pub(crate) struct PageStriping {
    /// Bit 15: "Page is striped." Must be 1 if the page height is unknown.
    pub(crate) is_striped: bool,
    /// Bits 0-14: "Maximum stripe size."
    pub(crate) max_stripe_size: u16,
}

/// Parse a page information segment (7.4.8).
pub(crate) fn parse_page_information(reader: &mut Reader<'_>) -> Result<PageInformation> {
    let width = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let height = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    // "If this value is unknown, then this field must contain 0x00000000."
    let x_resolution = match reader.read_u32().ok_or(ParseError::UnexpectedEof)? {
        0 => None,
        res => Some(res),
    };
    let y_resolution = match reader.read_u32().ok_or(ParseError::UnexpectedEof)? {
        0 => None,
        res => Some(res),
    };

    let flags_byte = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

    // The page operator field only spans two bits, so Replace cannot appear.
    let default_combination_operator = CombinationOperator::from_value((flags_byte >> 3) & 0x03)?;

    let flags = PageFlags {
        is_lossless: flags_byte & 0x01 != 0,
        might_contain_refinements: flags_byte & 0x02 != 0,
        default_pixel: flags_byte & 0x04 != 0,
        default_combination_operator,
        requires_auxiliary_buffers: flags_byte & 0x20 != 0,
        combination_operator_overridden: flags_byte & 0x40 != 0,
    };

    let striping_raw = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;
    let striping = PageStriping {
        is_striped: striping_raw & 0x8000 != 0,
        max_stripe_size: striping_raw & 0x7fff,
    };

    Ok(PageInformation {
        width,
        height,
        x_resolution,
        y_resolution,
        flags,
        striping,
    })
}

/// The page bitmap under construction.
///
/// Regions are drawn into the buffer as their segments are decoded; rows
/// below `emitted_rows` have already been handed out as stripes.
pub(crate) struct Page {
    pub(crate) info: PageInformation,
    pub(crate) buffer: Bitmap,
    /// The number of leading rows already emitted as stripes.
    pub(crate) emitted_rows: u32,
}

impl Page {
    /// Allocate the page buffer per 7.4.8.2.
    ///
    /// "A page's bitmap height may be declared in its page information
    /// segment to be unknown (by specifying a height of 0xFFFFFFFF). In this
    /// case, the page must be striped"; `fallback_height` is then the height
    /// recovered from the end of stripe segments.
    pub(crate) fn new(info: PageInformation, fallback_height: Option<u32>) -> Result<Self> {
        let height = if info.height == 0xffff_ffff {
            if !info.striping.is_striped {
                return err!(FormatError::UnknownPageHeight);
            }
            fallback_height.ok_or(FormatError::UnknownPageHeight)?
        } else {
            info.height
        };

        let buffer = Bitmap::new_filled(info.width, height, info.flags.default_pixel);

        Ok(Self {
            info,
            buffer,
            emitted_rows: 0,
        })
    }

    /// Draw a decoded region onto the page bitmap.
    ///
    /// "If this bit is 0, then every direct region segment associated with
    /// this page must use the page's default combination operator."
    /// (7.4.8.5)
    pub(crate) fn draw(&mut self, region: &Region) {
        let op = if self.info.flags.combination_operator_overridden {
            region.op
        } else {
            self.info.flags.default_combination_operator
        };

        let x = i32::try_from(region.x).unwrap_or(i32::MAX);
        let y = i32::try_from(region.y).unwrap_or(i32::MAX);

        self.buffer.combine(&region.bitmap, x, y, op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_bytes(height: u32, flags: u8, striping: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(16_u32.to_be_bytes()); // width
        data.extend(height.to_be_bytes());
        data.extend(0_u32.to_be_bytes()); // x resolution unknown
        data.extend(2834_u32.to_be_bytes()); // y resolution
        data.push(flags);
        data.extend(striping.to_be_bytes());
        data
    }

    #[test]
    fn page_information_fields() {
        let data = info_bytes(32, 0b0100_1101, 0x8010);
        let mut reader = Reader::new(&data);
        let info = parse_page_information(&mut reader).unwrap();

        assert_eq!(info.width, 16);
        assert_eq!(info.height, 32);
        assert_eq!(info.x_resolution, None);
        assert_eq!(info.y_resolution, Some(2834));
        assert!(info.flags.is_lossless);
        assert!(!info.flags.might_contain_refinements);
        assert!(info.flags.default_pixel);
        assert_eq!(
            info.flags.default_combination_operator,
            CombinationOperator::And
        );
        assert!(info.flags.combination_operator_overridden);
        assert!(info.striping.is_striped);
        assert_eq!(info.striping.max_stripe_size, 16);
        assert!(reader.at_end());
    }

    #[test]
    fn unknown_height_needs_stripes() {
        let data = info_bytes(0xffff_ffff, 0x00, 0x8000);
        let mut reader = Reader::new(&data);
        let info = parse_page_information(&mut reader).unwrap();

        assert!(Page::new(info.clone(), None).is_err());

        let page = Page::new(info, Some(24)).unwrap();
        assert_eq!(page.buffer.height(), 24);
    }

    #[test]
    fn default_operator_applies_unless_overridden() {
        let data = info_bytes(8, 0b0000_1000, 0x0000); // default operator AND
        let mut reader = Reader::new(&data);
        let info = parse_page_information(&mut reader).unwrap();

        let mut page = Page::new(info, None).unwrap();
        let region = Region {
            bitmap: Bitmap::new_filled(4, 4, true),
            x: 0,
            y: 0,
            op: CombinationOperator::Or,
        };

        // The page is white and the operator is forced to AND, so the
        // region's OR request has no effect.
        page.draw(&region);
        assert!(!page.buffer.get(0, 0));
    }
}
