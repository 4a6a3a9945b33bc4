//! Text region segment parsing and decoding (7.4.3, 6.4).

use std::iter;
use std::rc::Rc;

use super::{
    AtPixel, CombinationOperator, RefinementTemplate, refinement, parse_refinement_at_pixels,
    parse_region_segment_info,
};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::bitmap::{Bitmap, Region};
use crate::error::{
    DecodeError, HuffmanError, ParseError, Result, SymbolError, bail,
};
use crate::huffman_table::{
    HuffmanTable, TABLE_B1, TABLE_B6, TABLE_B7, TABLE_B8, TABLE_B9, TABLE_B10, TABLE_B11,
    TABLE_B12, TABLE_B13, TABLE_B14, TABLE_B15, TableLine,
};
use crate::integer_decoder::IntegerDecoder;
use crate::reader::Reader;
use crate::symbol_id_decoder::SymbolIdDecoder;

/// Decode a text region segment (7.4.3).
pub(crate) fn decode(
    reader: &mut Reader<'_>,
    symbols: &[Rc<Bitmap>],
    referred_tables: &[&HuffmanTable],
) -> Result<Region> {
    let header = parse(reader, symbols.len() as u32)?;

    let params = TextParams {
        width: header.region_info.width,
        height: header.region_info.height,
        num_instances: header.num_instances,
        log_strip_size: header.flags.log_strip_size,
        default_pixel: header.flags.default_pixel,
        combination_operator: header.flags.combination_operator,
        transposed: header.flags.transposed,
        reference_corner: header.flags.reference_corner,
        delta_s_offset: header.flags.delta_s_offset,
        use_refinement: header.flags.use_refinement,
        refinement_template: header.flags.refinement_template,
        refinement_at_pixels: &header.refinement_at_pixels,
    };

    let bitmap = if header.flags.use_huffman {
        let huffman_flags = header
            .huffman_flags
            .as_ref()
            .ok_or(HuffmanError::InvalidSelection)?;
        let tables = select_huffman_tables(huffman_flags, referred_tables)?;
        let symbol_codes = header
            .symbol_id_table
            .as_ref()
            .ok_or(HuffmanError::MissingTables)?;

        let ctx = TextDecodeContext::Huffman {
            reader,
            tables,
            symbol_codes,
        };
        decode_with(ctx, symbols, &params)?
    } else {
        let data = reader.tail().ok_or(ParseError::UnexpectedEof)?;
        let mut decoder = ArithmeticDecoder::new(data);

        let code_len = symbol_code_length(symbols.len() as u32);
        let mut contexts = TextRegionContexts::new(code_len);
        let mut gr_contexts =
            vec![Context::default(); 1 << header.flags.refinement_template.context_size()];

        let ctx = TextDecodeContext::Arithmetic {
            decoder: &mut decoder,
            contexts: &mut contexts,
            gr_contexts: &mut gr_contexts,
        };
        decode_with(ctx, symbols, &params)?
    };

    Ok(Region {
        bitmap,
        x: header.region_info.x_location,
        y: header.region_info.y_location,
        op: header.region_info.combination_operator,
    })
}

/// SBSYMCODELEN: the bit length of a symbol ID (6.5.8.2.3, 7.4.3.1.1).
pub(crate) fn symbol_code_length(num_symbols: u32) -> u32 {
    32 - num_symbols.saturating_sub(1).leading_zeros()
}

/// The parameters of the text region decoding procedure (6.4.2, Table 9).
///
/// Filled in from a text region segment header, or with the fixed values of
/// Table 17 when invoked from refinement/aggregate symbol decoding.
pub(crate) struct TextParams<'a> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// SBNUMINSTANCES.
    pub(crate) num_instances: u32,
    /// log2(SBSTRIPS).
    pub(crate) log_strip_size: u8,
    /// SBDEFPIXEL.
    pub(crate) default_pixel: bool,
    /// SBCOMBOP, applied when drawing each symbol instance.
    pub(crate) combination_operator: CombinationOperator,
    /// TRANSPOSED.
    pub(crate) transposed: bool,
    /// REFCORNER.
    pub(crate) reference_corner: ReferenceCorner,
    /// SBDSOFFSET.
    pub(crate) delta_s_offset: i8,
    /// SBREFINE.
    pub(crate) use_refinement: bool,
    /// SBRTEMPLATE.
    pub(crate) refinement_template: RefinementTemplate,
    pub(crate) refinement_at_pixels: &'a [AtPixel],
}

impl TextParams<'_> {
    fn strip_size(&self) -> u32 {
        1 << self.log_strip_size
    }
}

/// Shared integer decoding contexts for a text region.
///
/// One decoder per procedure of 6.4.6 through 6.4.11; the symbol dictionary
/// keeps these alive across aggregate invocations so adaptive state carries
/// over.
pub(crate) struct TextRegionContexts {
    pub(crate) iadt: IntegerDecoder,
    pub(crate) iafs: IntegerDecoder,
    pub(crate) iads: IntegerDecoder,
    pub(crate) iait: IntegerDecoder,
    pub(crate) iaid: SymbolIdDecoder,
    pub(crate) iari: IntegerDecoder,
    pub(crate) iardw: IntegerDecoder,
    pub(crate) iardh: IntegerDecoder,
    pub(crate) iardx: IntegerDecoder,
    pub(crate) iardy: IntegerDecoder,
}

impl TextRegionContexts {
    pub(crate) fn new(symbol_code_length: u32) -> Self {
        Self {
            iadt: IntegerDecoder::new(),
            iafs: IntegerDecoder::new(),
            iads: IntegerDecoder::new(),
            iait: IntegerDecoder::new(),
            iaid: SymbolIdDecoder::new(symbol_code_length),
            iari: IntegerDecoder::new(),
            iardw: IntegerDecoder::new(),
            iardh: IntegerDecoder::new(),
            iardx: IntegerDecoder::new(),
            iardy: IntegerDecoder::new(),
        }
    }
}

/// The entropy coding backend of a text region decode.
pub(crate) enum TextDecodeContext<'a, 'b> {
    Huffman {
        reader: &'a mut Reader<'b>,
        tables: TextRegionHuffmanTables<'a>,
        symbol_codes: &'a HuffmanTable,
    },
    Arithmetic {
        decoder: &'a mut ArithmeticDecoder<'b>,
        contexts: &'a mut TextRegionContexts,
        gr_contexts: &'a mut [Context],
    },
}

impl TextDecodeContext<'_, '_> {
    /// Decode the strip delta T (6.4.6), scaled by SBSTRIPS.
    fn read_strip_delta_t(&mut self, strip_size: u32) -> Result<i32> {
        let value = match self {
            Self::Huffman { reader, tables, .. } => tables.delta_t.decode_no_oob(reader)?,
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iadt
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob)?,
        };

        value
            .checked_mul(strip_size as i32)
            .ok_or(DecodeError::Overflow)
    }

    /// Decode the first symbol instance S coordinate of a strip (6.4.7).
    fn read_first_s(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.first_s.decode_no_oob(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iafs
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    /// Decode a subsequent S coordinate delta (6.4.8). `None` ends the strip.
    fn read_delta_s(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.delta_s.decode(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => Ok(contexts.iads.decode(decoder)),
        }
    }

    /// Decode the T coordinate of an instance within its strip (6.4.9).
    fn read_symbol_t(&mut self, strip_size: u32, log_strip_size: u8) -> Result<i32> {
        if strip_size == 1 {
            return Ok(0);
        }

        match self {
            Self::Huffman { reader, .. } => reader
                .read_bits(log_strip_size)
                .map(|v| v as i32)
                .ok_or(ParseError::UnexpectedEof.into()),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iait
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    /// Decode a symbol ID (6.4.10).
    fn read_symbol_id(&mut self) -> Result<usize> {
        match self {
            Self::Huffman {
                reader,
                symbol_codes,
                ..
            } => symbol_codes.decode_no_oob(reader).map(|v| v as usize),
            Self::Arithmetic {
                decoder, contexts, ..
            } => Ok(contexts.iaid.decode(decoder) as usize),
        }
    }

    /// Decode the refinement indicator R_I (6.4.11).
    fn read_refinement_flag(&mut self) -> Result<bool> {
        match self {
            Self::Huffman { reader, .. } => Ok(reader
                .read_bit()
                .ok_or(ParseError::UnexpectedEof)?
                != 0),
            Self::Arithmetic {
                decoder, contexts, ..
            } => Ok(contexts
                .iari
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob)?
                != 0),
        }
    }

    fn read_refinement_delta_width(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.refinement_width.decode_no_oob(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iardw
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    fn read_refinement_delta_height(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.refinement_height.decode_no_oob(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iardh
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    fn read_refinement_x_offset(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.refinement_x.decode_no_oob(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iardx
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    fn read_refinement_y_offset(&mut self) -> Result<i32> {
        match self {
            Self::Huffman { reader, tables, .. } => tables.refinement_y.decode_no_oob(reader),
            Self::Arithmetic {
                decoder, contexts, ..
            } => contexts
                .iardy
                .decode(decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    /// Decode the refinement bitmap of an instance, steps 5) to 7) of 6.4.11.
    fn decode_refinement_bitmap(
        &mut self,
        refined: &mut Bitmap,
        reference: &Bitmap,
        dx: i32,
        dy: i32,
        template: RefinementTemplate,
        at_pixels: &[AtPixel],
    ) -> Result<()> {
        match self {
            Self::Huffman { reader, tables, .. } => {
                // "Decode the size in bytes using the SBHUFFRSIZE table",
                // then decode the embedded arithmetic data with fresh
                // contexts (6.4.11 step 5).
                let size = tables.refinement_size.decode_no_oob(reader)? as usize;
                reader.align();

                let data = reader.read_bytes(size).ok_or(ParseError::UnexpectedEof)?;
                let mut decoder = ArithmeticDecoder::new(data);
                let mut contexts = vec![Context::default(); 1 << template.context_size()];

                refinement::decode_bitmap(
                    refined,
                    &mut decoder,
                    &mut contexts,
                    reference,
                    dx,
                    dy,
                    template,
                    at_pixels,
                    false,
                )
            }
            Self::Arithmetic {
                decoder,
                gr_contexts,
                ..
            } => refinement::decode_bitmap(
                refined,
                decoder,
                gr_contexts,
                reference,
                dx,
                dy,
                template,
                at_pixels,
                false,
            ),
        }
    }
}

/// The text region decoding procedure (6.4.5).
pub(crate) fn decode_with(
    mut ctx: TextDecodeContext<'_, '_>,
    symbols: &[Rc<Bitmap>],
    params: &TextParams<'_>,
) -> Result<Bitmap> {
    let mut bitmap = Bitmap::new_filled(params.width, params.height, params.default_pixel);

    let strip_size = params.strip_size();

    // "1) ... Decode a value using the IADT integer arithmetic decoding
    // procedure ... Set: STRIPT = -STRIPT × SBSTRIPS" (6.4.5)
    let mut strip_t = ctx
        .read_strip_delta_t(strip_size)?
        .checked_neg()
        .ok_or(DecodeError::Overflow)?;
    let mut first_s: i32 = 0;
    let mut instance_count = 0;

    // "c) Repeat until all instances have been decoded:"
    while instance_count < params.num_instances {
        let delta_t = ctx.read_strip_delta_t(strip_size)?;
        strip_t = strip_t.checked_add(delta_t).ok_or(DecodeError::Overflow)?;

        let mut first_symbol_in_strip = true;
        let mut current_s = 0;

        loop {
            if instance_count > params.num_instances {
                bail!(SymbolError::TooManySymbols);
            }

            if first_symbol_in_strip {
                // "i) If the current symbol instance is the first symbol
                // instance in the strip, then decode the first symbol
                // instance's S coordinate" (6.4.5 3 c iii)
                let delta_first_s = ctx.read_first_s()?;
                first_s = first_s
                    .checked_add(delta_first_s)
                    .ok_or(DecodeError::Overflow)?;
                current_s = first_s;
                first_symbol_in_strip = false;
            } else {
                // "ii) ... If the result of this decoding is OOB then the
                // last symbol instance of the strip has been decoded."
                let Some(delta_s) = ctx.read_delta_s()? else {
                    break;
                };

                current_s = current_s
                    .checked_add(delta_s)
                    .and_then(|v| v.checked_add(params.delta_s_offset as i32))
                    .ok_or(DecodeError::Overflow)?;
            }

            let current_t = ctx.read_symbol_t(strip_size, params.log_strip_size)?;
            let symbol_t = strip_t
                .checked_add(current_t)
                .ok_or(DecodeError::Overflow)?;

            let symbol_id = ctx.read_symbol_id()?;
            let instance = decode_instance_bitmap(&mut ctx, symbols, params, symbol_id)?;

            let instance: &Bitmap = match &instance {
                InstanceBitmap::Symbol(index) => {
                    symbols.get(*index).ok_or(SymbolError::OutOfRange)?
                }
                InstanceBitmap::Refined(bitmap) => bitmap,
            };
            let symbol_width = instance.width() as i32;
            let symbol_height = instance.height() as i32;

            // 6.4.5 3 c) vi) to x): advance S to the far edge first when the
            // reference corner is on the trailing side.
            let advance = if params.transposed {
                symbol_height
            } else {
                symbol_width
            };

            let corner = params.reference_corner;
            let advance_before = if params.transposed {
                corner == ReferenceCorner::BottomLeft || corner == ReferenceCorner::BottomRight
            } else {
                corner == ReferenceCorner::TopRight || corner == ReferenceCorner::BottomRight
            };

            if advance_before {
                current_s = current_s
                    .checked_add(advance - 1)
                    .ok_or(DecodeError::Overflow)?;
            }

            let (x, y) = placement(corner, params.transposed, current_s, symbol_t, symbol_width, symbol_height);
            bitmap.combine(instance, x, y, params.combination_operator);

            if !advance_before {
                current_s = current_s
                    .checked_add(advance - 1)
                    .ok_or(DecodeError::Overflow)?;
            }

            instance_count += 1;
        }
    }

    Ok(bitmap)
}

/// The top-left placement of a symbol instance given its reference corner
/// (6.4.5 3 c viii).
fn placement(
    corner: ReferenceCorner,
    transposed: bool,
    s: i32,
    t: i32,
    width: i32,
    height: i32,
) -> (i32, i32) {
    if !transposed {
        match corner {
            ReferenceCorner::TopLeft => (s, t),
            ReferenceCorner::TopRight => (s - width + 1, t),
            ReferenceCorner::BottomLeft => (s, t - height + 1),
            ReferenceCorner::BottomRight => (s - width + 1, t - height + 1),
        }
    } else {
        match corner {
            ReferenceCorner::TopLeft => (t, s),
            ReferenceCorner::TopRight => (t - width + 1, s),
            ReferenceCorner::BottomLeft => (t, s - height + 1),
            ReferenceCorner::BottomRight => (t - width + 1, s - height + 1),
        }
    }
}

/// The bitmap drawn for one symbol instance.
enum InstanceBitmap {
    /// The symbol itself (R_I = 0).
    Symbol(usize),
    /// A refinement of the symbol (R_I = 1).
    Refined(Bitmap),
}

/// Determine the bitmap of a symbol instance (6.4.11).
fn decode_instance_bitmap(
    ctx: &mut TextDecodeContext<'_, '_>,
    symbols: &[Rc<Bitmap>],
    params: &TextParams<'_>,
    symbol_id: usize,
) -> Result<InstanceBitmap> {
    if !params.use_refinement || !ctx.read_refinement_flag()? {
        return Ok(InstanceBitmap::Symbol(symbol_id));
    }

    let reference = symbols.get(symbol_id).ok_or(SymbolError::OutOfRange)?;

    let rdw = ctx.read_refinement_delta_width()?;
    let rdh = ctx.read_refinement_delta_height()?;
    let rdx = ctx.read_refinement_x_offset()?;
    let rdy = ctx.read_refinement_y_offset()?;

    // 6.4.11 step 4: the refined bitmap's size and the reference offset.
    let width = u32::try_from((reference.width() as i32).checked_add(rdw).ok_or(DecodeError::Overflow)?)
        .map_err(|_| DecodeError::Overflow)?;
    let height = u32::try_from((reference.height() as i32).checked_add(rdh).ok_or(DecodeError::Overflow)?)
        .map_err(|_| DecodeError::Overflow)?;
    let dx = rdw
        .div_euclid(2)
        .checked_add(rdx)
        .ok_or(DecodeError::Overflow)?;
    let dy = rdh
        .div_euclid(2)
        .checked_add(rdy)
        .ok_or(DecodeError::Overflow)?;

    let mut refined = Bitmap::new(width, height);

    ctx.decode_refinement_bitmap(
        &mut refined,
        reference,
        dx,
        dy,
        params.refinement_template,
        params.refinement_at_pixels,
    )?;

    Ok(InstanceBitmap::Refined(refined))
}

/// The Huffman tables of a text region, selected per 7.4.3.1.6.
pub(crate) struct TextRegionHuffmanTables<'a> {
    first_s: &'a HuffmanTable,
    delta_s: &'a HuffmanTable,
    delta_t: &'a HuffmanTable,
    refinement_width: &'a HuffmanTable,
    refinement_height: &'a HuffmanTable,
    refinement_x: &'a HuffmanTable,
    refinement_y: &'a HuffmanTable,
    refinement_size: &'a HuffmanTable,
}

/// Select the text region Huffman tables (7.4.3.1.6).
///
/// Custom selections consume referred tables in the order the fields are
/// listed in the standard.
fn select_huffman_tables<'a>(
    flags: &TextRegionHuffmanFlags,
    referred_tables: &[&'a HuffmanTable],
) -> Result<TextRegionHuffmanTables<'a>> {
    let mut custom_index = 0;
    let mut next_custom = || -> Result<&'a HuffmanTable> {
        let table = referred_tables
            .get(custom_index)
            .ok_or(HuffmanError::MissingTables)?;
        custom_index += 1;
        Ok(table)
    };

    let first_s = match flags.first_s_table {
        0 => &*TABLE_B6,
        1 => &*TABLE_B7,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let delta_s = match flags.delta_s_table {
        0 => &*TABLE_B8,
        1 => &*TABLE_B9,
        2 => &*TABLE_B10,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let delta_t = match flags.delta_t_table {
        0 => &*TABLE_B11,
        1 => &*TABLE_B12,
        2 => &*TABLE_B13,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let refinement_width = match flags.refinement_width_table {
        0 => &*TABLE_B14,
        1 => &*TABLE_B15,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let refinement_height = match flags.refinement_height_table {
        0 => &*TABLE_B14,
        1 => &*TABLE_B15,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let refinement_x = match flags.refinement_x_table {
        0 => &*TABLE_B14,
        1 => &*TABLE_B15,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let refinement_y = match flags.refinement_y_table {
        0 => &*TABLE_B14,
        1 => &*TABLE_B15,
        3 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    let refinement_size = match flags.refinement_size_table {
        0 => &*TABLE_B1,
        1 => next_custom()?,
        _ => bail!(HuffmanError::InvalidSelection),
    };

    Ok(TextRegionHuffmanTables {
        first_s,
        delta_s,
        delta_t,
        refinement_width,
        refinement_height,
        refinement_x,
        refinement_y,
        refinement_size,
    })
}

/// Decode the symbol ID code table (7.4.3.1.7).
///
/// Thirty-five runcode prefix lengths are read as fixed 4-bit values, then
/// the runcodes themselves assign a prefix length to every symbol.
fn decode_symbol_id_table(reader: &mut Reader<'_>, num_symbols: u32) -> Result<HuffmanTable> {
    let mut runcode_lines = Vec::with_capacity(35);
    for runcode in 0..35 {
        let preflen = reader.read_bits(4).ok_or(ParseError::UnexpectedEof)? as u8;
        runcode_lines.push(TableLine::new(runcode, preflen, 0));
    }

    let runcode_table = HuffmanTable::build(&runcode_lines);
    let mut code_lengths: Vec<u8> = Vec::with_capacity(num_symbols as usize);

    while code_lengths.len() < num_symbols as usize {
        let runcode = runcode_table.decode_no_oob(reader)?;

        match runcode {
            // Runcodes 0 to 31 assign that length directly.
            0..=31 => code_lengths.push(runcode as u8),
            // Runcode 32: repeat the previous length 3 to 6 times.
            32 => {
                let repeat = reader.read_bits(2).ok_or(ParseError::UnexpectedEof)? as usize + 3;
                let previous = *code_lengths.last().ok_or(HuffmanError::InvalidCode)?;
                code_lengths.extend(iter::repeat_n(previous, repeat));
            }
            // Runcode 33: repeat a zero length 3 to 10 times.
            33 => {
                let repeat = reader.read_bits(3).ok_or(ParseError::UnexpectedEof)? as usize + 3;
                code_lengths.extend(iter::repeat_n(0, repeat));
            }
            // Runcode 34: repeat a zero length 11 to 138 times.
            34 => {
                let repeat = reader.read_bits(7).ok_or(ParseError::UnexpectedEof)? as usize + 11;
                code_lengths.extend(iter::repeat_n(0, repeat));
            }
            _ => bail!(HuffmanError::InvalidCode),
        }
    }

    if code_lengths.len() != num_symbols as usize {
        bail!(HuffmanError::InvalidCode);
    }

    // "After decoding the symbol ID code lengths, skip over any remaining
    // bits in the last byte read." (7.4.3.1.7)
    reader.align();

    let lines: Vec<TableLine> = code_lengths
        .iter()
        .enumerate()
        .map(|(id, &preflen)| TableLine::new(id as i32, preflen, 0))
        .collect();

    Ok(HuffmanTable::build(&lines))
}

/// The reference corner of each symbol instance (7.4.3.1.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReferenceCorner {
    BottomLeft,
    TopLeft,
    BottomRight,
    TopRight,
}

impl ReferenceCorner {
    fn from_value(value: u8) -> Self {
        match value & 0x03 {
            0 => Self::BottomLeft,
            1 => Self::TopLeft,
            2 => Self::BottomRight,
            _ => Self::TopRight,
        }
    }
}

/// Parsed text region segment flags (7.4.3.1.1).
#[derive(Debug, Clone)]
struct TextRegionFlags {
    use_huffman: bool,
    use_refinement: bool,
    log_strip_size: u8,
    reference_corner: ReferenceCorner,
    transposed: bool,
    combination_operator: CombinationOperator,
    default_pixel: bool,
    delta_s_offset: i8,
    refinement_template: RefinementTemplate,
}

/// Text region segment Huffman flags (7.4.3.1.2).
#[derive(Debug, Clone)]
struct TextRegionHuffmanFlags {
    first_s_table: u8,
    delta_s_table: u8,
    delta_t_table: u8,
    refinement_width_table: u8,
    refinement_height_table: u8,
    refinement_y_table: u8,
    refinement_x_table: u8,
    refinement_size_table: u8,
}

/// Parsed text region segment header (7.4.3.1).
struct TextRegionHeader {
    region_info: super::RegionSegmentInfo,
    flags: TextRegionFlags,
    huffman_flags: Option<TextRegionHuffmanFlags>,
    refinement_at_pixels: Vec<AtPixel>,
    num_instances: u32,
    symbol_id_table: Option<HuffmanTable>,
}

/// Parse text region segment flags (7.4.3.1.1).
fn parse_flags(reader: &mut Reader<'_>) -> Result<TextRegionFlags> {
    let flags = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;

    let use_huffman = flags & 0x0001 != 0;
    let use_refinement = flags & 0x0002 != 0;
    let log_strip_size = ((flags >> 2) & 0x03) as u8;
    let reference_corner = ReferenceCorner::from_value(((flags >> 4) & 0x03) as u8);
    let transposed = flags & 0x0040 != 0;
    let combination_operator = CombinationOperator::from_value(((flags >> 7) & 0x03) as u8)?;
    let default_pixel = flags & 0x0200 != 0;

    // "Bits 10-14: SBDSOFFSET ... a signed value in the range -16 to 15."
    let raw_offset = ((flags >> 10) & 0x1f) as u8;
    let delta_s_offset = if raw_offset & 0x10 != 0 {
        (raw_offset | 0xe0) as i8
    } else {
        raw_offset as i8
    };

    let refinement_template = RefinementTemplate::from_value((flags >> 15) as u8)?;

    Ok(TextRegionFlags {
        use_huffman,
        use_refinement,
        log_strip_size,
        reference_corner,
        transposed,
        combination_operator,
        default_pixel,
        delta_s_offset,
        refinement_template,
    })
}

/// Parse text region Huffman flags (7.4.3.1.2).
fn parse_huffman_flags(reader: &mut Reader<'_>) -> Result<TextRegionHuffmanFlags> {
    let flags = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;

    Ok(TextRegionHuffmanFlags {
        first_s_table: (flags & 0x03) as u8,
        delta_s_table: ((flags >> 2) & 0x03) as u8,
        delta_t_table: ((flags >> 4) & 0x03) as u8,
        refinement_width_table: ((flags >> 6) & 0x03) as u8,
        refinement_height_table: ((flags >> 8) & 0x03) as u8,
        refinement_y_table: ((flags >> 10) & 0x03) as u8,
        refinement_x_table: ((flags >> 12) & 0x03) as u8,
        refinement_size_table: ((flags >> 14) & 0x01) as u8,
    })
}

/// Parse a text region segment header (7.4.3.1).
fn parse(reader: &mut Reader<'_>, num_symbols: u32) -> Result<TextRegionHeader> {
    let region_info = parse_region_segment_info(reader)?;
    let flags = parse_flags(reader)?;

    let huffman_flags = if flags.use_huffman {
        Some(parse_huffman_flags(reader)?)
    } else {
        None
    };

    let refinement_at_pixels =
        if flags.use_refinement && flags.refinement_template == RefinementTemplate::Template0 {
            parse_refinement_at_pixels(reader)?.to_vec()
        } else {
            Vec::new()
        };

    let num_instances = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    let symbol_id_table = if flags.use_huffman {
        Some(decode_symbol_id_table(reader, num_symbols)?)
    } else {
        None
    };

    Ok(TextRegionHeader {
        region_info,
        flags,
        huffman_flags,
        refinement_at_pixels,
        num_instances,
        symbol_id_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_code_length_is_at_least_zero() {
        assert_eq!(symbol_code_length(0), 0);
        assert_eq!(symbol_code_length(1), 0);
        assert_eq!(symbol_code_length(2), 1);
        assert_eq!(symbol_code_length(3), 2);
        assert_eq!(symbol_code_length(4), 2);
        assert_eq!(symbol_code_length(5), 3);
        assert_eq!(symbol_code_length(256), 8);
        assert_eq!(symbol_code_length(257), 9);
    }

    #[test]
    fn placement_by_reference_corner() {
        // A 4x2 symbol at S = 10, T = 20.
        assert_eq!(placement(ReferenceCorner::TopLeft, false, 10, 20, 4, 2), (10, 20));
        assert_eq!(placement(ReferenceCorner::TopRight, false, 10, 20, 4, 2), (7, 20));
        assert_eq!(placement(ReferenceCorner::BottomLeft, false, 10, 20, 4, 2), (10, 19));
        assert_eq!(
            placement(ReferenceCorner::BottomRight, false, 10, 20, 4, 2),
            (7, 19)
        );

        // Transposed regions swap the roles of S and T.
        assert_eq!(placement(ReferenceCorner::TopLeft, true, 10, 20, 4, 2), (20, 10));
        assert_eq!(placement(ReferenceCorner::BottomLeft, true, 10, 20, 4, 2), (20, 9));
    }

    #[test]
    fn delta_s_offset_is_sign_extended() {
        // SBDSOFFSET = 0b11111 in bits 10-14 means -1.
        let flags = 0b0_11111_0_00_0_00_00_0_0_u16;
        let bytes = flags.to_be_bytes();
        let mut reader = Reader::new(&bytes);
        let parsed = parse_flags(&mut reader).unwrap();

        assert_eq!(parsed.delta_s_offset, -1);

        // SBDSOFFSET = 0b01111 means 15.
        let flags = 0b0_01111_0_00_0_00_00_0_0_u16;
        let bytes = flags.to_be_bytes();
        let mut reader = Reader::new(&bytes);
        let parsed = parse_flags(&mut reader).unwrap();

        assert_eq!(parsed.delta_s_offset, 15);
    }

    #[test]
    fn runcode_symbol_id_table() {
        // 35 runcode prefix lengths of 4 bits each. Give runcodes 2 and 32
        // a length of 1 ("0" and "1" respectively); everything else 0.
        let mut bits: Vec<u8> = Vec::new();
        for runcode in 0..35_u8 {
            let len: u8 = match runcode {
                2 | 32 => 1,
                _ => 0,
            };
            bits.extend((0..4).rev().map(|i| (len >> i) & 1));
        }

        // Runcode 2 assigns length 2, then runcode 32 with extra bits 00
        // repeats the previous length three more times: four symbols, all
        // with code length 2.
        bits.extend([0]); // runcode 2
        bits.extend([1, 0, 0]); // runcode 32, repeat 3

        while bits.len() % 8 != 0 {
            bits.push(0);
        }
        let data: Vec<u8> = bits
            .chunks(8)
            .map(|chunk| chunk.iter().fold(0, |acc, &b| (acc << 1) | b))
            .collect();

        let mut reader = Reader::new(&data);
        let table = decode_symbol_id_table(&mut reader, 4).unwrap();

        // Four length-2 codes in symbol ID order: "00", "01", "10", "11".
        let mut reader = Reader::new(&[0b00_01_10_11]);
        for expected in 0..4 {
            assert_eq!(table.decode_no_oob(&mut reader).unwrap(), expected);
        }
    }
}
