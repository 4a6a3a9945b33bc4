//! Standalone file organizations (Annex D).

use crate::error::{FormatError, ParseError, Result, bail};
use crate::reader::Reader;
use crate::segment::{
    Segment, SegmentType, parse_segment, parse_segment_header, read_segment_data,
};

/// "This is an 8-byte sequence containing 0x97 0x4A 0x42 0x32 0x0D 0x0A 0x1A
/// 0x0A." (D.4.1)
pub(crate) const FILE_HEADER_ID: [u8; 8] = [0x97, 0x4a, 0x42, 0x32, 0x0d, 0x0a, 0x1a, 0x0a];

/// "There are two standalone file organizations possible for a JBIG2
/// bitstream." (Annex D)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOrganization {
    /// "This organization is intended for streaming applications, where the
    /// decoder is guaranteed to begin at the start of the bitstream and
    /// decode everything up to the end of the bitstream." (D.1)
    Sequential,
    /// "This organization is intended for random-access applications, where
    /// the decoder might want to process parts of the file in an arbitrary
    /// order." (D.2)
    RandomAccess,
}

/// Parsed file header (D.4).
#[derive(Debug, Clone)]
pub(crate) struct FileHeader {
    pub(crate) organization: FileOrganization,
    /// "This is a 4-byte field, and is not present if the 'unknown number of
    /// pages' bit was 1." (D.4.3)
    pub(crate) number_of_pages: Option<u32>,
}

/// A parsed standalone file.
#[derive(Debug)]
pub(crate) struct File<'a> {
    pub(crate) header: FileHeader,
    pub(crate) segments: Vec<Segment<'a>>,
}

/// Parse a standalone JBIG2 file.
pub(crate) fn parse_file(data: &[u8]) -> Result<File<'_>> {
    let mut reader = Reader::new(data);

    let header = parse_file_header(&mut reader)?;

    let mut segments = Vec::new();
    match header.organization {
        FileOrganization::Sequential => parse_segments_sequential(&mut reader, &mut segments)?,
        FileOrganization::RandomAccess => parse_segments_random_access(&mut reader, &mut segments)?,
    }

    // The segments must already be ordered by number (7.2.2), but files in
    // the wild are not always that disciplined.
    segments.sort_by_key(|segment| segment.header.segment_number);

    Ok(File { header, segments })
}

fn parse_file_header(reader: &mut Reader<'_>) -> Result<FileHeader> {
    let id = reader.read_bytes(8).ok_or(ParseError::UnexpectedEof)?;
    if id != FILE_HEADER_ID {
        bail!(FormatError::InvalidHeader);
    }

    // D.4.2: file header flags. "Bit 0: File organization type. If this bit
    // is 0, the file uses the random-access organization. If this bit is 1,
    // the file uses the sequential organization."
    let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

    let organization = if flags & 0x01 != 0 {
        FileOrganization::Sequential
    } else {
        FileOrganization::RandomAccess
    };

    let unknown_page_count = flags & 0x02 != 0;

    // "Bits 4-7: Reserved; must be 0." Bits 2 and 3 flag extended templates
    // and coloured regions, which do not affect parsing.
    if flags & 0xf0 != 0 {
        bail!(FormatError::ReservedBits);
    }

    let number_of_pages = if unknown_page_count {
        None
    } else {
        Some(reader.read_u32().ok_or(ParseError::UnexpectedEof)?)
    };

    Ok(FileHeader {
        organization,
        number_of_pages,
    })
}

/// Parse segments stored header-then-data, one after another (D.1).
///
/// This is also the shape of an embedded stream, which carries the segments
/// without any file header (D.3).
pub(crate) fn parse_segments_sequential<'a>(
    reader: &mut Reader<'a>,
    segments: &mut Vec<Segment<'a>>,
) -> Result<()> {
    while !reader.at_end() {
        let segment = parse_segment(reader)?;

        // "If a file contains an end of file segment, it must be the last
        // segment." (7.4.11)
        let is_eof = segment.header.segment_type == SegmentType::EndOfFile;
        segments.push(segment);

        if is_eof {
            break;
        }
    }

    Ok(())
}

/// Parse segments stored as all headers first, then all data parts (D.2).
fn parse_segments_random_access<'a>(
    reader: &mut Reader<'a>,
    segments: &mut Vec<Segment<'a>>,
) -> Result<()> {
    let mut headers = Vec::new();

    while !reader.at_end() {
        let header = parse_segment_header(reader)?;
        let is_eof = header.segment_type == SegmentType::EndOfFile;
        headers.push(header);

        if is_eof {
            break;
        }
    }

    for header in headers {
        segments.push(read_segment_data(reader, header)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_of_page_segment() -> [u8; 11] {
        [
            0x00, 0x00, 0x00, 0x00, // segment number 0
            0x31, // type 49: end of page
            0x00, // no referred segments
            0x01, // page association
            0x00, 0x00, 0x00, 0x00, // data length 0
        ]
    }

    #[test]
    fn sequential_file() {
        let mut data = FILE_HEADER_ID.to_vec();
        data.push(0x01); // sequential, known page count
        data.extend(1_u32.to_be_bytes());
        data.extend(end_of_page_segment());

        let file = parse_file(&data).unwrap();
        assert_eq!(file.header.organization, FileOrganization::Sequential);
        assert_eq!(file.header.number_of_pages, Some(1));
        assert_eq!(file.segments.len(), 1);
        assert_eq!(
            file.segments[0].header.segment_type,
            SegmentType::EndOfPage
        );
    }

    #[test]
    fn unknown_page_count_omits_the_field() {
        let mut data = FILE_HEADER_ID.to_vec();
        data.push(0x03); // sequential, unknown page count
        data.extend(end_of_page_segment());

        let file = parse_file(&data).unwrap();
        assert_eq!(file.header.number_of_pages, None);
        assert_eq!(file.segments.len(), 1);
    }

    #[test]
    fn bad_id_string_is_rejected() {
        let data = [0x00; 16];
        assert!(parse_file(&data).is_err());
    }

    #[test]
    fn reserved_flag_bits_are_rejected() {
        let mut data = FILE_HEADER_ID.to_vec();
        data.push(0x11);
        data.extend(1_u32.to_be_bytes());
        assert!(parse_file(&data).is_err());
    }
}
