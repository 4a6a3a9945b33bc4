//! Segment header parsing (7.2).

use crate::error::{ParseError, Result, SegmentError, bail, err};
use crate::reader::Reader;

/// "The segment type is a number between 0 and 63, inclusive. Not all values
/// are allowed." (7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentType {
    /// Symbol dictionary (type 0, 7.4.2).
    SymbolDictionary,
    /// Intermediate text region (type 4, 7.4.3).
    IntermediateTextRegion,
    /// Immediate text region (type 6, 7.4.3).
    ImmediateTextRegion,
    /// Immediate lossless text region (type 7, 7.4.3).
    ImmediateLosslessTextRegion,
    /// Pattern dictionary (type 16, 7.4.4).
    PatternDictionary,
    /// Intermediate halftone region (type 20, 7.4.5).
    IntermediateHalftoneRegion,
    /// Immediate halftone region (type 22, 7.4.5).
    ImmediateHalftoneRegion,
    /// Immediate lossless halftone region (type 23, 7.4.5).
    ImmediateLosslessHalftoneRegion,
    /// Intermediate generic region (type 36, 7.4.6).
    IntermediateGenericRegion,
    /// Immediate generic region (type 38, 7.4.6).
    ImmediateGenericRegion,
    /// Immediate lossless generic region (type 39, 7.4.6).
    ImmediateLosslessGenericRegion,
    /// Intermediate generic refinement region (type 40, 7.4.7).
    IntermediateGenericRefinementRegion,
    /// Immediate generic refinement region (type 42, 7.4.7).
    ImmediateGenericRefinementRegion,
    /// Immediate lossless generic refinement region (type 43, 7.4.7).
    ImmediateLosslessGenericRefinementRegion,
    /// Page information (type 48, 7.4.8).
    PageInformation,
    /// End of page (type 49, 7.4.9).
    EndOfPage,
    /// End of stripe (type 50, 7.4.10).
    EndOfStripe,
    /// End of file (type 51, 7.4.11).
    EndOfFile,
    /// Profiles (type 52, 7.4.12).
    Profiles,
    /// Tables (type 53, 7.4.13).
    Tables,
    /// Colour palette (type 54, 7.4.16).
    ColourPalette,
    /// Extension (type 62, 7.4.14).
    Extension,
}

impl SegmentType {
    /// "All other segment types are reserved and must not be used." (7.3)
    fn from_type_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::SymbolDictionary),
            4 => Ok(Self::IntermediateTextRegion),
            6 => Ok(Self::ImmediateTextRegion),
            7 => Ok(Self::ImmediateLosslessTextRegion),
            16 => Ok(Self::PatternDictionary),
            20 => Ok(Self::IntermediateHalftoneRegion),
            22 => Ok(Self::ImmediateHalftoneRegion),
            23 => Ok(Self::ImmediateLosslessHalftoneRegion),
            36 => Ok(Self::IntermediateGenericRegion),
            38 => Ok(Self::ImmediateGenericRegion),
            39 => Ok(Self::ImmediateLosslessGenericRegion),
            40 => Ok(Self::IntermediateGenericRefinementRegion),
            42 => Ok(Self::ImmediateGenericRefinementRegion),
            43 => Ok(Self::ImmediateLosslessGenericRefinementRegion),
            48 => Ok(Self::PageInformation),
            49 => Ok(Self::EndOfPage),
            50 => Ok(Self::EndOfStripe),
            51 => Ok(Self::EndOfFile),
            52 => Ok(Self::Profiles),
            53 => Ok(Self::Tables),
            54 => Ok(Self::ColourPalette),
            62 => Ok(Self::Extension),
            _ => err!(SegmentError::UnknownType),
        }
    }
}

/// A parsed segment header (7.2.1).
#[derive(Debug, Clone)]
pub(crate) struct SegmentHeader {
    /// "The valid range of segment numbers is 0 through 4294967295." (7.2.2)
    pub(crate) segment_number: u32,
    /// "Bits 0-5: Segment type." (7.2.3)
    pub(crate) segment_type: SegmentType,
    /// "This field contains the segment numbers of the segments that this
    /// segment refers to, if any." (7.2.5)
    pub(crate) referred_to_segments: Vec<u32>,
    /// "This field encodes the number of the page to which this segment
    /// belongs. ... a value of zero ... indicates that this segment is not
    /// associated with any page." (7.2.6)
    pub(crate) page_association: u32,
    /// "This 4-byte field contains the length of the segment's segment data
    /// part, in bytes." (7.2.7)
    ///
    /// `None` if the length was 0xFFFFFFFF, meaning unknown; only valid for
    /// immediate generic region segments.
    pub(crate) data_length: Option<u32>,
}

/// A parsed segment: its header and its data part.
#[derive(Debug)]
pub(crate) struct Segment<'a> {
    pub(crate) header: SegmentHeader,
    pub(crate) data: &'a [u8],
}

/// Parse a segment header (7.2).
pub(crate) fn parse_segment_header(reader: &mut Reader<'_>) -> Result<SegmentHeader> {
    // 7.2.2: segment number.
    let segment_number = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    // 7.2.3: segment header flags. Bit 6 is the page association field size,
    // bit 7 the deferred non-retain flag, which this decoder has no use for.
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let segment_type = SegmentType::from_type_value(flags & 0x3f)?;
    let page_association_long = flags & 0x40 != 0;

    // 7.2.4: referred-to segment count and retention flags. "The three most
    // significant bits of the first byte in this field determine the length
    // of the field. If the value of this three-bit subfield is between 0 and
    // 4, then the field is one byte long. If the value of this three-bit
    // subfield is 7, then the field is at least five bytes long. This
    // three-bit subfield must not contain values of 5 and 6."
    let count_byte = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let short_count = count_byte >> 5;

    let referred_to_count = match short_count {
        0..=4 => short_count as u32,
        5 | 6 => bail!(SegmentError::InvalidReferredCount),
        _ => {
            // Long form: "Bits 0-28: Count of referred-to segments", then
            // one retention bit per referred-to segment plus one for this
            // segment, padded to whole bytes.
            let rest = reader.read_bytes(3).ok_or(ParseError::UnexpectedEof)?;
            let count = u32::from_be_bytes([count_byte & 0x1f, rest[0], rest[1], rest[2]]);

            let retention_bytes = (count as usize + 1).div_ceil(8);
            reader
                .skip_bytes(retention_bytes)
                .ok_or(ParseError::UnexpectedEof)?;

            count
        }
    };

    // 7.2.5: "When the current segment's number is 256 or less, then each
    // referred-to segment number is one byte long. Otherwise, when the
    // current segment's number is 65536 or less, each referred-to segment
    // number is two bytes long. Otherwise, each referred-to segment number
    // is four bytes long."
    let mut referred_to_segments = Vec::with_capacity(referred_to_count.min(64) as usize);
    for _ in 0..referred_to_count {
        let referred = if segment_number <= 256 {
            reader.read_byte().ok_or(ParseError::UnexpectedEof)? as u32
        } else if segment_number <= 65536 {
            reader.read_u16().ok_or(ParseError::UnexpectedEof)? as u32
        } else {
            reader.read_u32().ok_or(ParseError::UnexpectedEof)?
        };

        // A segment may only refer to segments with lower numbers (7.2.5).
        if referred >= segment_number {
            bail!(SegmentError::InvalidReference);
        }

        referred_to_segments.push(referred);
    }

    // 7.2.6: segment page association.
    let page_association = if page_association_long {
        reader.read_u32().ok_or(ParseError::UnexpectedEof)?
    } else {
        reader.read_byte().ok_or(ParseError::UnexpectedEof)? as u32
    };

    // 7.2.7: segment data length. "If the segment's type is 'Immediate
    // generic region', then the length field may contain the value
    // 0xFFFFFFFF. This value is intended to mean that the length of the
    // segment's data part is unknown at the time that the segment header is
    // written."
    let data_length = match reader.read_u32().ok_or(ParseError::UnexpectedEof)? {
        0xffff_ffff => None,
        len => Some(len),
    };

    Ok(SegmentHeader {
        segment_number,
        segment_type,
        referred_to_segments,
        page_association,
        data_length,
    })
}

/// Parse a complete segment, header and data part.
pub(crate) fn parse_segment<'a>(reader: &mut Reader<'a>) -> Result<Segment<'a>> {
    let header = parse_segment_header(reader)?;
    read_segment_data(reader, header)
}

/// Read the data part for a previously parsed header.
pub(crate) fn read_segment_data<'a>(
    reader: &mut Reader<'a>,
    header: SegmentHeader,
) -> Result<Segment<'a>> {
    let data = match header.data_length {
        Some(len) => reader
            .read_bytes(len as usize)
            .ok_or(ParseError::UnexpectedEof)?,
        None => {
            if header.segment_type != SegmentType::ImmediateGenericRegion
                && header.segment_type != SegmentType::ImmediateLosslessGenericRegion
            {
                bail!(SegmentError::MissingEndMarker);
            }

            let len = scan_unknown_length_region(reader)?;
            reader.read_bytes(len).ok_or(ParseError::UnexpectedEof)?
        }
    };

    Ok(Segment { header, data })
}

/// Find the size of an immediate generic region data part with unknown
/// length.
///
/// "In order for the decoder to correctly decode the segment, it needs to
/// read the four-byte row count field, which is stored in the last four
/// bytes of the segment's data part. These four bytes can be detected
/// without knowing the length of the data part in advance: if MMR is 1,
/// they are preceded by the two-byte sequence 0x00 0x00; if MMR is 0, they
/// are preceded by the two-byte sequence 0xFF 0xAC." (7.2.7)
fn scan_unknown_length_region(reader: &Reader<'_>) -> Result<usize> {
    let mut scan = reader.clone();
    let start = scan.byte_pos();

    // The MMR bit and template live in the generic region flags, the
    // eighteenth byte of the data part (after the region segment information
    // field).
    scan.skip_bytes(17).ok_or(ParseError::UnexpectedEof)?;
    let flags = scan.read_byte().ok_or(ParseError::UnexpectedEof)?;
    let mmr = flags & 0x01 != 0;

    // The AT pixel bytes that follow the flags can contain the marker
    // sequence themselves, so the scan starts after them.
    let at_pixel_bytes = match (mmr, (flags >> 1) & 0x03) {
        (true, _) => 0,
        (false, 0) => 8,
        (false, _) => 2,
    };
    scan.skip_bytes(at_pixel_bytes)
        .ok_or(ParseError::UnexpectedEof)?;

    let end_marker: [u8; 2] = if mmr { [0x00, 0x00] } else { [0xff, 0xac] };

    // The marker is followed by the four-byte row count. Streams cut off
    // before the row count are handled leniently during region decoding,
    // so the data part simply extends to the end of the stream there.
    while let Some(bytes) = scan.peek_bytes(2) {
        if bytes[..2] == end_marker {
            let remaining = reader.tail().map_or(0, |tail| tail.len());
            return Ok((scan.byte_pos() - start + 6).min(remaining));
        }
        scan.skip_bytes(1).ok_or(ParseError::UnexpectedEof)?;
    }

    err!(SegmentError::MissingEndMarker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_header_short_form() {
        // 7.2.8 EXAMPLE 1, with a data length field appended.
        let data = [
            0x00, 0x00, 0x00, 0x20, // segment number 32
            0x86, // flags: type 6, 1-byte page association
            0x6b, // refers to 3 segments
            0x02, 0x1e, 0x05, // referred segments 2, 30, 5
            0x04, // page association 4
            0x00, 0x00, 0x00, 0x10, // data length 16
        ];

        let mut reader = Reader::new(&data);
        let header = parse_segment_header(&mut reader).unwrap();

        assert_eq!(header.segment_number, 32);
        assert_eq!(header.segment_type, SegmentType::ImmediateTextRegion);
        assert_eq!(header.referred_to_segments, vec![2, 30, 5]);
        assert_eq!(header.page_association, 4);
        assert_eq!(header.data_length, Some(16));
        assert!(reader.at_end());
    }

    #[test]
    fn segment_header_long_form() {
        // 7.2.8 EXAMPLE 2, with a data length field appended. The referred
        // segment numbers are two bytes each since the segment number is
        // between 256 and 65536.
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x02, 0x34, // segment number 564
            0x40,                   // flags: type 0, 4-byte page association
            0xe0, 0x00, 0x00, 0x09, // long form: 9 referred segments
            0x02, 0xfd,             // retention flags
            0x01, 0x00,             // referred segment 256
            0x00, 0x02,             // referred segment 2
            0x00, 0x1e,             // referred segment 30
            0x00, 0x05,             // referred segment 5
            0x02, 0x00,             // referred segment 512
            0x02, 0x01,             // referred segment 513
            0x02, 0x02,             // referred segment 514
            0x02, 0x03,             // referred segment 515
            0x02, 0x04,             // referred segment 516
            0x00, 0x00, 0x04, 0x01, // page association 1025
            0x00, 0x00, 0x00, 0x20, // data length 32
        ];

        let mut reader = Reader::new(&data);
        let header = parse_segment_header(&mut reader).unwrap();

        assert_eq!(header.segment_number, 564);
        assert_eq!(header.segment_type, SegmentType::SymbolDictionary);
        assert_eq!(
            header.referred_to_segments,
            vec![256, 2, 30, 5, 512, 513, 514, 515, 516]
        );
        assert_eq!(header.page_association, 1025);
        assert_eq!(header.data_length, Some(32));
        assert!(reader.at_end());
    }

    #[test]
    fn reserved_referred_counts_are_rejected() {
        let data = [
            0x00, 0x00, 0x00, 0x01, // segment number
            0x00, // flags: type 0
            0xa0, // referred count subfield = 5 (reserved)
        ];
        let mut reader = Reader::new(&data);
        assert!(parse_segment_header(&mut reader).is_err());
    }

    #[test]
    fn unknown_length_region_scan() {
        // An immediate generic region with data length 0xFFFFFFFF. The data
        // part is 17 bytes region info, arithmetic flags, a payload, the
        // 0xFF 0xAC terminator and a row count.
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x01, // segment number
            0x26,                   // flags: type 38, 1-byte page association
            0x00,                   // no referred segments
            0x01,                   // page association
            0xff, 0xff, 0xff, 0xff, // data length unknown
            // Data part.
            0x00, 0x00, 0x00, 0x08, // region width
            0x00, 0x00, 0x00, 0x08, // region height
            0x00, 0x00, 0x00, 0x00, // region x
            0x00, 0x00, 0x00, 0x00, // region y
            0x00,                   // region flags
            0x00,                   // generic flags: arithmetic, template 0
            0x03, 0xff, 0xf7, 0xff, 0xf7, 0xff, 0xf7, 0xff, // AT pixels
            0x12, 0x34,             // coded data
            0xff, 0xac,             // end marker
            0x00, 0x00, 0x00, 0x08, // row count
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment(&mut reader).unwrap();

        assert_eq!(segment.header.data_length, None);
        assert_eq!(segment.data.len(), 18 + 8 + 2 + 2 + 4);
        assert!(reader.at_end());
    }

    #[test]
    fn marker_bytes_in_at_pixels_are_not_a_terminator() {
        // The second AT pixel is (-1, -84), which encodes as 0xFF 0xAC. The
        // scan must not mistake it for the end of the data part.
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x01, // segment number
            0x26,                   // flags: type 38, 1-byte page association
            0x00,                   // no referred segments
            0x01,                   // page association
            0xff, 0xff, 0xff, 0xff, // data length unknown
            // Data part.
            0x00, 0x00, 0x00, 0x08, // region width
            0x00, 0x00, 0x00, 0x08, // region height
            0x00, 0x00, 0x00, 0x00, // region x
            0x00, 0x00, 0x00, 0x00, // region y
            0x00,                   // region flags
            0x00,                   // generic flags: arithmetic, template 0
            0x03, 0xff, 0xff, 0xac, 0xfd, 0xff, 0xfe, 0xfe, // AT pixels
            0x12, 0x34,             // coded data
            0xff, 0xac,             // end marker
            0x00, 0x00, 0x00, 0x08, // row count
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment(&mut reader).unwrap();

        assert_eq!(segment.data.len(), 18 + 8 + 2 + 2 + 4);
        assert!(reader.at_end());
    }

    #[test]
    fn truncated_row_count_reaches_the_end_of_the_stream() {
        // The stream ends at the marker, with no row count after it.
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x01, // segment number
            0x26,                   // flags: type 38, 1-byte page association
            0x00,                   // no referred segments
            0x01,                   // page association
            0xff, 0xff, 0xff, 0xff, // data length unknown
            // Data part.
            0x00, 0x00, 0x00, 0x08, // region width
            0x00, 0x00, 0x00, 0x08, // region height
            0x00, 0x00, 0x00, 0x00, // region x
            0x00, 0x00, 0x00, 0x00, // region y
            0x00,                   // region flags
            0x00,                   // generic flags: arithmetic, template 0
            0x03, 0xff, 0xfd, 0xff, 0xf7, 0xff, 0xf7, 0xff, // AT pixels
            0x12, 0x34,             // coded data
            0xff, 0xac,             // end marker
        ];

        let mut reader = Reader::new(&data);
        let segment = parse_segment(&mut reader).unwrap();

        assert_eq!(segment.data.len(), 18 + 8 + 2 + 2);
        assert!(reader.at_end());
    }
}
