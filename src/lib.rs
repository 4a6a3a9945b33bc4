/*!
A memory-safe, pure-Rust JBIG2 decoder.

`jbig2-decoder` decodes JBIG2 images as specified in ITU-T T.88 (also known
as ISO/IEC 14492). JBIG2 is a bi-level image compression standard commonly
used in PDF documents for compressing scanned text documents.

Both standalone files (Annex D) and embedded streams, such as the contents
of a PDF `JBIG2Decode` stream together with its `JBIG2Globals`, are
supported. Striped pages can be consumed incrementally with [`Decoder`].

# Example
```rust,no_run
let data = std::fs::read("image.jb2").unwrap();
let image = jbig2_decoder::decode(&data).unwrap();

println!("{}x{} image", image.width, image.height);
```

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![allow(missing_docs)]

mod arithmetic_decoder;
mod bitmap;
mod decode;
mod error;
mod file;
mod gray_scale;
mod huffman_table;
mod integer_decoder;
mod page;
mod reader;
mod segment;
mod symbol_id_decoder;

use std::rc::Rc;

use log::warn;

use bitmap::{Bitmap, Region};
use decode::pattern::PatternDictionary;
use decode::{generic, halftone, pattern, refinement, symbol, text};
use file::{FILE_HEADER_ID, parse_file, parse_segments_sequential};
use huffman_table::HuffmanTable;
use page::{Page, parse_page_information};
use reader::Reader;
use segment::{Segment, SegmentHeader, SegmentType};

pub use error::{DecodeError, Result};

use error::{FormatError, ParseError, SegmentError, bail};

/// A decoded JBIG2 image.
#[derive(Debug, Clone)]
pub struct Image {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
    /// The length of each row in bytes.
    pub stride: usize,
    /// The rows of the image, packed eight pixels per byte, most significant
    /// bit first. A set bit is a black pixel.
    pub data: Vec<u8>,
}

/// One stripe of a page, handed out by [`Decoder::next_stripe`].
///
/// Stripe rows use the inverse convention of [`Image`]: a set bit is a
/// white pixel, matching the usual rendering of 1-bit image data.
#[derive(Debug, Clone)]
pub struct Stripe {
    /// The Y coordinate of the first row of the stripe on the page.
    pub y: u32,
    /// The number of rows in the stripe.
    pub height: u32,
    /// The length of each row in bytes.
    pub stride: usize,
    /// The stripe rows, packed eight pixels per byte, most significant bit
    /// first. A set bit is a white pixel.
    pub data: Vec<u8>,
}

/// Decode a standalone JBIG2 file.
pub fn decode(data: &[u8]) -> Result<Image> {
    Decoder::new(data, None)?.into_image()
}

/// Decode an embedded JBIG2 stream, such as the contents of a PDF
/// `JBIG2Decode` stream.
///
/// `globals` holds the segments shared between streams (the PDF
/// `JBIG2Globals`), if any.
pub fn decode_embedded(data: &[u8], globals: Option<&[u8]>) -> Result<Image> {
    Decoder::new(data, globals)?.into_image()
}

/// The result of decoding a segment that later segments may refer to.
enum SegmentResult {
    /// The exported symbols of a symbol dictionary.
    Symbols(Vec<Rc<Bitmap>>),
    /// A pattern dictionary.
    Patterns(PatternDictionary),
    /// An intermediate region, kept as a reference for refinement.
    Region(Region),
    /// A custom Huffman table from a tables segment.
    Table(HuffmanTable),
}

/// An incremental JBIG2 decoder.
///
/// Decodes one page. Segments are processed in order; [`Self::next_stripe`]
/// returns each completed stripe of the page, so striped pages can be
/// consumed without waiting for the whole page to finish.
pub struct Decoder<'a> {
    segments: Vec<Segment<'a>>,
    next_segment: usize,
    /// Results of dictionary, table and intermediate region segments,
    /// keyed by segment number.
    results: Vec<(u32, SegmentResult)>,
    page: Option<Page>,
    /// The page height recovered from end of stripe segments, for pages
    /// that declare an unknown height.
    stripe_height: Option<u32>,
    finished: bool,
}

impl<'a> Decoder<'a> {
    /// Set up a decoder for a standalone file or an embedded stream.
    ///
    /// The input is taken as a standalone file if it starts with the file
    /// header ID string, and as a bare sequence of segments otherwise.
    /// Globals segments, if any, are processed before the stream's own
    /// segments.
    pub fn new(data: &'a [u8], globals: Option<&'a [u8]>) -> Result<Self> {
        let mut segments = Vec::new();

        if let Some(globals) = globals {
            let mut reader = Reader::new(globals);
            parse_segments_sequential(&mut reader, &mut segments)?;
        }

        if data.starts_with(&FILE_HEADER_ID) {
            segments.extend(parse_file(data)?.segments);
        } else {
            let mut reader = Reader::new(data);
            parse_segments_sequential(&mut reader, &mut segments)?;
        }

        let stripe_height = scan_for_stripe_height(&segments);

        Ok(Self {
            segments,
            next_segment: 0,
            results: Vec::new(),
            page: None,
            stripe_height,
            finished: false,
        })
    }

    /// Decode up to the next completed stripe of the page.
    ///
    /// Returns `None` once the page is complete. For pages that are not
    /// striped, the whole page arrives as a single stripe.
    pub fn next_stripe(&mut self) -> Result<Option<Stripe>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if self.next_segment >= self.segments.len() {
                self.finished = true;

                // 8.2 requires an end of page segment, but truncated
                // streams missing one are common enough to tolerate.
                if let Some(stripe) = self.emit_remaining() {
                    warn!("data ended without an end of page segment");
                    return Ok(Some(stripe));
                }

                return Ok(None);
            }

            let index = self.next_segment;
            self.next_segment += 1;

            if let Some(stripe) = self.process_segment(index)? {
                return Ok(Some(stripe));
            }
        }
    }

    /// Decode all remaining segments and return the finished page.
    fn into_image(mut self) -> Result<Image> {
        while self.next_stripe()?.is_some() {}

        let page = self.page.ok_or(FormatError::MissingPageInfo)?;
        let buffer = page.buffer;

        Ok(Image {
            width: buffer.width(),
            height: buffer.height(),
            stride: buffer.stride(),
            data: buffer.into_data(),
        })
    }

    fn process_segment(&mut self, index: usize) -> Result<Option<Stripe>> {
        let (header, data) = {
            let segment = &self.segments[index];
            (segment.header.clone(), segment.data)
        };
        let mut reader = Reader::new(data);

        match header.segment_type {
            SegmentType::PageInformation => {
                // Only the first page is assembled; anything after it is
                // another page's content.
                if self.page.is_some() {
                    warn!("ignoring segments after the first page");
                    self.finished = true;
                    return Ok(self.emit_remaining());
                }

                let info = parse_page_information(&mut reader)?;
                self.page = Some(Page::new(info, self.stripe_height)?);
            }
            SegmentType::ImmediateGenericRegion
            | SegmentType::ImmediateLosslessGenericRegion => {
                let region = generic::decode(&mut reader, header.data_length.is_none())?;
                self.page_mut()?.draw(&region);
            }
            SegmentType::IntermediateGenericRegion => {
                let region = generic::decode(&mut reader, header.data_length.is_none())?;
                self.store(header.segment_number, SegmentResult::Region(region));
            }
            SegmentType::SymbolDictionary => {
                // "1) Concatenate all the input symbol dictionaries to form
                // SDINSYMS." (6.5.5)
                let dictionary = {
                    let input_symbols = self.referred_symbols(&header);
                    let tables = self.referred_tables(&header);
                    symbol::decode(&mut reader, &input_symbols, &tables)?
                };
                self.store(
                    header.segment_number,
                    SegmentResult::Symbols(dictionary.symbols),
                );
            }
            SegmentType::ImmediateTextRegion | SegmentType::ImmediateLosslessTextRegion => {
                let region = {
                    let symbols = self.referred_symbols(&header);
                    let tables = self.referred_tables(&header);
                    text::decode(&mut reader, &symbols, &tables)?
                };
                self.page_mut()?.draw(&region);
            }
            SegmentType::IntermediateTextRegion => {
                let region = {
                    let symbols = self.referred_symbols(&header);
                    let tables = self.referred_tables(&header);
                    text::decode(&mut reader, &symbols, &tables)?
                };
                self.store(header.segment_number, SegmentResult::Region(region));
            }
            SegmentType::PatternDictionary => {
                let dictionary = pattern::decode(&mut reader)?;
                self.store(header.segment_number, SegmentResult::Patterns(dictionary));
            }
            SegmentType::ImmediateHalftoneRegion
            | SegmentType::ImmediateLosslessHalftoneRegion => {
                let region = {
                    let patterns = self.referred_patterns(&header)?;
                    halftone::decode(&mut reader, patterns)?
                };
                self.page_mut()?.draw(&region);
            }
            SegmentType::IntermediateHalftoneRegion => {
                let region = {
                    let patterns = self.referred_patterns(&header)?;
                    halftone::decode(&mut reader, patterns)?
                };
                self.store(header.segment_number, SegmentResult::Region(region));
            }
            SegmentType::ImmediateGenericRefinementRegion
            | SegmentType::ImmediateLosslessGenericRefinementRegion => {
                let region = self.decode_refinement(&mut reader, &header)?;
                self.page_mut()?.draw(&region);
            }
            SegmentType::IntermediateGenericRefinementRegion => {
                let region = self.decode_refinement(&mut reader, &header)?;
                self.store(header.segment_number, SegmentResult::Region(region));
            }
            SegmentType::Tables => {
                let table = HuffmanTable::read_custom(&mut reader)?;
                self.store(header.segment_number, SegmentResult::Table(table));
            }
            SegmentType::EndOfStripe => {
                // "The segment data of an end of stripe segment consists of
                // one four-byte value, specifying the Y coordinate of the
                // end row of the stripe." (7.4.10)
                let last_row = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
                let end = last_row.checked_add(1).ok_or(DecodeError::Overflow)?;
                return self.emit_rows(end);
            }
            SegmentType::EndOfPage | SegmentType::EndOfFile => {
                self.finished = true;
                return Ok(self.emit_remaining());
            }
            // Profiles, colour palettes and extensions carry nothing a
            // bi-level decoder needs.
            SegmentType::Profiles | SegmentType::ColourPalette | SegmentType::Extension => {}
        }

        Ok(None)
    }

    /// Decode a generic refinement region segment (7.4.7.5).
    ///
    /// "Determine the buffer associated with the region segment that this
    /// segment refers to. ... If there are no referred-to segments, then use
    /// the page bitmap as the reference buffer."
    fn decode_refinement(
        &self,
        reader: &mut Reader<'_>,
        header: &SegmentHeader,
    ) -> Result<Region> {
        let reference = header.referred_to_segments.iter().find_map(|&num| {
            match self.result(num) {
                Some(SegmentResult::Region(region)) => Some(region),
                _ => None,
            }
        });

        match reference {
            Some(region) => refinement::decode(reader, &region.bitmap, region.x, region.y),
            None => {
                let page = self.page.as_ref().ok_or(FormatError::MissingPageInfo)?;
                refinement::decode(reader, &page.buffer, 0, 0)
            }
        }
    }

    fn page_mut(&mut self) -> Result<&mut Page> {
        self.page
            .as_mut()
            .ok_or(FormatError::MissingPageInfo.into())
    }

    fn store(&mut self, segment_number: u32, result: SegmentResult) {
        self.results.push((segment_number, result));
    }

    fn result(&self, segment_number: u32) -> Option<&SegmentResult> {
        // Segments are processed in segment number order, so the results
        // stay sorted and a binary search suffices.
        self.results
            .binary_search_by_key(&segment_number, |(num, _)| *num)
            .ok()
            .map(|index| &self.results[index].1)
    }

    /// Gather the exported symbols of all referred symbol dictionaries, in
    /// referral order.
    fn referred_symbols(&self, header: &SegmentHeader) -> Vec<Rc<Bitmap>> {
        let mut symbols = Vec::new();

        for &num in &header.referred_to_segments {
            if let Some(SegmentResult::Symbols(exported)) = self.result(num) {
                symbols.extend(exported.iter().cloned());
            }
        }

        symbols
    }

    /// Gather the custom Huffman tables of all referred tables segments, in
    /// referral order.
    fn referred_tables(&self, header: &SegmentHeader) -> Vec<&HuffmanTable> {
        let mut tables = Vec::new();

        for &num in &header.referred_to_segments {
            if let Some(SegmentResult::Table(table)) = self.result(num) {
                tables.push(table);
            }
        }

        tables
    }

    fn referred_patterns(&self, header: &SegmentHeader) -> Result<&PatternDictionary> {
        header
            .referred_to_segments
            .iter()
            .find_map(|&num| match self.result(num) {
                Some(SegmentResult::Patterns(patterns)) => Some(patterns),
                _ => None,
            })
            .ok_or(SegmentError::MissingPatternDictionary.into())
    }

    /// Emit the page rows up to (but not including) `end` as a stripe.
    fn emit_rows(&mut self, end: u32) -> Result<Option<Stripe>> {
        let page = self.page.as_mut().ok_or(FormatError::MissingPageInfo)?;
        let end = end.min(page.buffer.height());

        if end <= page.emitted_rows {
            bail!(FormatError::UnexpectedStripe);
        }

        Ok(Some(take_stripe(page, end)))
    }

    /// Emit whatever rows of the page have not been handed out yet.
    fn emit_remaining(&mut self) -> Option<Stripe> {
        let page = self.page.as_mut()?;

        if page.emitted_rows >= page.buffer.height() {
            return None;
        }

        Some(take_stripe(page, page.buffer.height()))
    }
}

/// Build the stripe covering rows `page.emitted_rows..end`.
fn take_stripe(page: &mut Page, end: u32) -> Stripe {
    let start = page.emitted_rows;
    let stride = page.buffer.stride();

    let mut data = Vec::with_capacity(stride * (end - start) as usize);
    for y in start..end {
        // Stripes use the inverted convention: 1 is white.
        data.extend(page.buffer.row(y).iter().map(|&byte| !byte));
    }

    page.emitted_rows = end;

    Stripe {
        y: start,
        height: end - start,
        stride,
        data,
    }
}

/// Recover the page height from the end of stripe segments (7.4.10), for
/// pages that declare an unknown height.
fn scan_for_stripe_height(segments: &[Segment<'_>]) -> Option<u32> {
    let mut max_height: Option<u32> = None;

    for segment in segments {
        if segment.header.segment_type == SegmentType::EndOfStripe {
            let last_row = u32::from_be_bytes(segment.data.get(..4)?.try_into().ok()?);
            let height = last_row.checked_add(1)?;
            max_height = Some(max_height.map_or(height, |m| m.max(height)));
        }
    }

    max_height
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_information_segment(
        segment_number: u32,
        width: u32,
        height: u32,
        striping: u16,
    ) -> Vec<u8> {
        let mut segment = segment_number.to_be_bytes().to_vec();
        segment.push(0x30); // type 48: page information
        segment.push(0x00); // no referred segments
        segment.push(0x01); // page association
        segment.extend(19_u32.to_be_bytes()); // data length

        segment.extend(width.to_be_bytes());
        segment.extend(height.to_be_bytes());
        segment.extend(0_u32.to_be_bytes()); // x resolution
        segment.extend(0_u32.to_be_bytes()); // y resolution
        segment.push(0x00); // flags: default pixel white, operator OR
        segment.extend(striping.to_be_bytes());
        segment
    }

    fn generic_region_segment(segment_number: u32) -> Vec<u8> {
        // A 1x1 arithmetic-coded region at (0, 0). The coded data decodes
        // the single pixel as white.
        let mut segment = segment_number.to_be_bytes().to_vec();
        segment.push(0x26); // type 38: immediate generic region
        segment.push(0x00); // no referred segments
        segment.push(0x01); // page association
        segment.extend(28_u32.to_be_bytes()); // data length

        segment.extend(1_u32.to_be_bytes()); // region width
        segment.extend(1_u32.to_be_bytes()); // region height
        segment.extend(0_u32.to_be_bytes()); // region x
        segment.extend(0_u32.to_be_bytes()); // region y
        segment.push(0x00); // external combination operator: OR
        segment.push(0x00); // flags: arithmetic, template 0
        segment.extend([0x03, 0xff, 0xfd, 0xff, 0x02, 0xfe, 0xfe, 0xfe]); // AT
        segment.extend([0x00, 0x00]); // coded data
        segment
    }

    fn unknown_length_region_segment(segment_number: u32, with_row_count: bool) -> Vec<u8> {
        // A 1x1 arithmetic-coded region with an unknown data length. The
        // second AT pixel is (-1, -84), whose encoding matches the end
        // marker sequence.
        let mut segment = segment_number.to_be_bytes().to_vec();
        segment.push(0x26); // type 38: immediate generic region
        segment.push(0x00); // no referred segments
        segment.push(0x01); // page association
        segment.extend(0xffff_ffff_u32.to_be_bytes()); // data length unknown

        segment.extend(1_u32.to_be_bytes()); // region width
        segment.extend(1_u32.to_be_bytes()); // region height
        segment.extend(0_u32.to_be_bytes()); // region x
        segment.extend(0_u32.to_be_bytes()); // region y
        segment.push(0x00); // external combination operator: OR
        segment.push(0x00); // flags: arithmetic, template 0
        segment.extend([0x03, 0xff, 0xff, 0xac, 0x02, 0xfe, 0xfe, 0xfe]); // AT
        segment.extend([0x00, 0x00]); // coded data
        segment.extend([0xff, 0xac]); // end marker
        if with_row_count {
            segment.extend(1_u32.to_be_bytes());
        }
        segment
    }

    fn end_of_stripe_segment(segment_number: u32, last_row: u32) -> Vec<u8> {
        let mut segment = segment_number.to_be_bytes().to_vec();
        segment.push(0x32); // type 50: end of stripe
        segment.push(0x00);
        segment.push(0x01);
        segment.extend(4_u32.to_be_bytes());
        segment.extend(last_row.to_be_bytes());
        segment
    }

    fn end_of_page_segment(segment_number: u32) -> Vec<u8> {
        let mut segment = segment_number.to_be_bytes().to_vec();
        segment.push(0x31); // type 49: end of page
        segment.push(0x00);
        segment.push(0x01);
        segment.extend(0_u32.to_be_bytes());
        segment
    }

    #[test]
    fn embedded_stream_single_stripe() {
        let mut data = page_information_segment(0, 8, 8, 0x0000);
        data.extend(generic_region_segment(1));
        data.extend(end_of_page_segment(2));

        let mut decoder = Decoder::new(&data, None).unwrap();

        let stripe = decoder.next_stripe().unwrap().unwrap();
        assert_eq!(stripe.y, 0);
        assert_eq!(stripe.height, 8);
        assert_eq!(stripe.stride, 1);
        // The page is white, and stripes are inverted.
        assert_eq!(stripe.data, vec![0xff; 8]);

        assert!(decoder.next_stripe().unwrap().is_none());
    }

    #[test]
    fn end_of_stripe_splits_the_page() {
        let mut data = page_information_segment(0, 8, 4, 0x8004);
        data.extend(end_of_stripe_segment(1, 1));
        data.extend(end_of_page_segment(2));

        let mut decoder = Decoder::new(&data, None).unwrap();

        let first = decoder.next_stripe().unwrap().unwrap();
        assert_eq!((first.y, first.height), (0, 2));

        let second = decoder.next_stripe().unwrap().unwrap();
        assert_eq!((second.y, second.height), (2, 2));

        assert!(decoder.next_stripe().unwrap().is_none());
    }

    #[test]
    fn unknown_page_height_comes_from_stripes() {
        let mut data = page_information_segment(0, 8, 0xffff_ffff, 0x8008);
        data.extend(end_of_stripe_segment(1, 5));
        data.extend(end_of_page_segment(2));

        let image = decode_embedded(&data, None).unwrap();
        assert_eq!(image.height, 6);
    }

    #[test]
    fn standalone_file_with_header() {
        let mut data = FILE_HEADER_ID.to_vec();
        data.push(0x01); // sequential organization
        data.extend(1_u32.to_be_bytes()); // one page
        data.extend(page_information_segment(0, 8, 8, 0x0000));
        data.extend(generic_region_segment(1));
        data.extend(end_of_page_segment(2));

        let image = decode(&data).unwrap();
        assert_eq!(image.width, 8);
        assert_eq!(image.height, 8);
        assert_eq!(image.stride, 1);
        assert_eq!(image.data, vec![0x00; 8]);
    }

    #[test]
    fn unknown_length_region_with_marker_bytes_in_at_pixels() {
        let mut data = page_information_segment(0, 8, 8, 0x0000);
        data.extend(unknown_length_region_segment(1, true));
        data.extend(end_of_page_segment(2));

        let image = decode_embedded(&data, None).unwrap();
        assert_eq!(image.data, vec![0x00; 8]);
    }

    #[test]
    fn unknown_length_region_without_row_count() {
        // The stream ends at the region's end marker; the missing row count
        // is tolerated and the declared height stands.
        let mut data = page_information_segment(0, 8, 8, 0x0000);
        data.extend(unknown_length_region_segment(1, false));

        let image = decode_embedded(&data, None).unwrap();
        assert_eq!(image.height, 8);
    }

    #[test]
    fn region_before_page_information_fails() {
        let data = generic_region_segment(0);
        let mut decoder = Decoder::new(&data, None).unwrap();
        assert!(decoder.next_stripe().is_err());
    }

    #[test]
    fn missing_end_of_page_still_yields_the_page() {
        let mut data = page_information_segment(0, 8, 8, 0x0000);
        data.extend(generic_region_segment(1));

        let image = decode_embedded(&data, None).unwrap();
        assert_eq!(image.height, 8);
    }
}
