//! Symbol dictionary segment parsing and decoding (7.4.2, 6.5).

use std::rc::Rc;

use super::generic;
use super::refinement;
use super::text::{
    ReferenceCorner, TextDecodeContext, TextParams, TextRegionContexts, decode_with,
    symbol_code_length,
};
use super::{
    AtPixel, CombinationOperator, RefinementTemplate, Template, parse_at_pixels,
    parse_refinement_at_pixels,
};
use crate::arithmetic_decoder::{ArithmeticDecoder, Context};
use crate::bitmap::Bitmap;
use crate::error::{
    DecodeError, HuffmanError, ParseError, RegionError, Result, SymbolError, bail,
};
use crate::huffman_table::{HuffmanTable, TABLE_B1, TABLE_B2, TABLE_B3, TABLE_B4, TABLE_B5, TABLE_B15};
use crate::integer_decoder::IntegerDecoder;
use crate::reader::Reader;

/// A decoded symbol dictionary segment.
///
/// Symbols are reference counted so that dictionaries and text regions can
/// share them without copying the bitmaps.
#[derive(Debug, Clone)]
pub(crate) struct SymbolDictionary {
    pub(crate) symbols: Vec<Rc<Bitmap>>,
}

/// Decode a symbol dictionary segment (7.4.2, 6.5).
pub(crate) fn decode(
    reader: &mut Reader<'_>,
    input_symbols: &[Rc<Bitmap>],
    referred_tables: &[&HuffmanTable],
) -> Result<SymbolDictionary> {
    let header = parse(reader)?;
    let data = reader.tail().ok_or(ParseError::UnexpectedEof)?;

    let mut ctx = if header.flags.use_huffman {
        DictContext::new_huffman(data, &header, referred_tables)?
    } else {
        DictContext::new_arithmetic(data, &header)
    };

    let mut new_symbols: Vec<Rc<Bitmap>> = Vec::with_capacity(header.num_new_symbols as usize);
    // Symbol widths of the current height class, kept for splitting the
    // collective bitmap (SDHUFF = 1, SDREFAGG = 0).
    let mut symbol_widths = Vec::new();

    // 6.5.5: decode the symbols one height class at a time.
    let mut height: u32 = 0;
    let mut decoded = 0;

    while decoded < header.num_new_symbols {
        let delta_height = ctx.read_delta_height()?;
        height = height
            .checked_add_signed(delta_height)
            .ok_or(RegionError::InvalidDimension)?;

        let mut width: u32 = 0;
        let mut total_width: u32 = 0;
        let first_symbol = decoded;
        symbol_widths.clear();

        // "If the result of this decoding is OOB then all the symbols in
        // this height class have been decoded." (6.5.5 step 4 c iv)
        while let Some(delta_width) = ctx.read_delta_width()? {
            if decoded >= header.num_new_symbols {
                bail!(SymbolError::TooManySymbols);
            }

            width = width
                .checked_add_signed(delta_width)
                .ok_or(RegionError::InvalidDimension)?;
            total_width = total_width
                .checked_add(width)
                .ok_or(RegionError::InvalidDimension)?;

            match (header.flags.use_huffman, header.flags.use_refagg) {
                (false, false) => {
                    // 6.5.8.1: direct-coded symbol bitmap.
                    let mut bitmap = Bitmap::new(width, height);

                    let DictContext::Arithmetic(state) = &mut ctx else {
                        unreachable!("checked by the match arm");
                    };
                    generic::decode_bitmap(
                        &mut bitmap,
                        &mut state.decoder,
                        &mut state.gb_contexts,
                        header.flags.template,
                        false,
                        &header.at_pixels,
                        None,
                    )?;

                    new_symbols.push(Rc::new(bitmap));
                }
                (true, false) => {
                    // The bitmaps come later from the collective bitmap;
                    // only the width is recorded here.
                    symbol_widths.push(width);
                }
                (_, true) => {
                    // 6.5.8.2: refinement/aggregate-coded symbol bitmap.
                    let bitmap = decode_refagg_symbol(
                        &mut ctx,
                        &header,
                        input_symbols,
                        &new_symbols,
                        width,
                        height,
                    )?;
                    new_symbols.push(Rc::new(bitmap));
                }
            }

            decoded += 1;
        }

        if header.flags.use_huffman && !header.flags.use_refagg {
            decode_collective_bitmap(
                &mut ctx,
                &mut new_symbols,
                &symbol_widths,
                total_width,
                height,
            )?;
            debug_assert_eq!(new_symbols.len(), first_symbol as usize + symbol_widths.len());
        }
    }

    let symbols = decode_exported_symbols(&mut ctx, &header, input_symbols, &new_symbols)?;

    Ok(SymbolDictionary { symbols })
}

/// Decode one symbol bitmap using refinement or aggregation (6.5.8.2).
fn decode_refagg_symbol(
    ctx: &mut DictContext<'_, '_>,
    header: &SymbolDictionaryHeader,
    input_symbols: &[Rc<Bitmap>],
    new_symbols: &[Rc<Bitmap>],
    width: u32,
    height: u32,
) -> Result<Bitmap> {
    // 6.5.8.2.1: the number of instances in the aggregation.
    let instances = ctx.read_aggregate_instances()?;

    if instances < 1 {
        bail!(SymbolError::OutOfRange);
    }

    let total_symbols = input_symbols.len() as u32 + header.num_new_symbols;
    let code_len = symbol_code_length(total_symbols);

    if instances == 1 {
        decode_single_refinement(ctx, header, input_symbols, new_symbols, width, height, code_len)
    } else {
        decode_aggregate(
            ctx,
            header,
            input_symbols,
            new_symbols,
            width,
            height,
            instances,
            code_len,
        )
    }
}

/// Decode a symbol bitmap when REFAGGNINST = 1 (6.5.8.2.2).
fn decode_single_refinement(
    ctx: &mut DictContext<'_, '_>,
    header: &SymbolDictionaryHeader,
    input_symbols: &[Rc<Bitmap>],
    new_symbols: &[Rc<Bitmap>],
    width: u32,
    height: u32,
    code_len: u32,
) -> Result<Bitmap> {
    let mut bitmap = Bitmap::new(width, height);

    match ctx {
        DictContext::Huffman(state) => {
            // "If SDHUFF is 1, decode the symbol's ID as a SBSYMCODELEN-bit
            // value"; the length is at least 1 in Huffman mode (6.5.8.2.3).
            let code_len = code_len.max(1);
            let id = state
                .reader
                .read_bits(code_len as u8)
                .ok_or(ParseError::UnexpectedEof)? as usize;

            let rdx = TABLE_B15.decode_no_oob(&mut state.reader)?;
            let rdy = TABLE_B15.decode_no_oob(&mut state.reader)?;

            let reference = resolve_symbol(input_symbols, new_symbols, id)?;

            // The refinement data is an embedded arithmetic-coded block with
            // an explicit byte size (6.5.8.2.2 steps 4 to 6).
            let size = TABLE_B1.decode_no_oob(&mut state.reader)? as usize;
            state.reader.align();
            let data = state
                .reader
                .read_bytes(size)
                .ok_or(ParseError::UnexpectedEof)?;

            let mut decoder = ArithmeticDecoder::new(data);
            let mut contexts =
                vec![Context::default(); 1 << header.flags.refinement_template.context_size()];

            refinement::decode_bitmap(
                &mut bitmap,
                &mut decoder,
                &mut contexts,
                reference,
                rdx,
                rdy,
                header.flags.refinement_template,
                &header.refinement_at_pixels,
                false,
            )?;
        }
        DictContext::Arithmetic(state) => {
            let contexts = state
                .text_contexts
                .get_or_insert_with(|| TextRegionContexts::new(code_len));

            let id = contexts.iaid.decode(&mut state.decoder) as usize;
            let rdx = contexts
                .iardx
                .decode(&mut state.decoder)
                .ok_or(SymbolError::UnexpectedOob)?;
            let rdy = contexts
                .iardy
                .decode(&mut state.decoder)
                .ok_or(SymbolError::UnexpectedOob)?;

            let reference = resolve_symbol(input_symbols, new_symbols, id)?;

            refinement::decode_bitmap(
                &mut bitmap,
                &mut state.decoder,
                &mut state.gr_contexts,
                reference,
                rdx,
                rdy,
                header.flags.refinement_template,
                &header.refinement_at_pixels,
                false,
            )?;
        }
    }

    Ok(bitmap)
}

/// Decode a symbol bitmap when REFAGGNINST > 1, via a text region decode
/// with the parameters of Table 17 (6.5.8.2).
fn decode_aggregate(
    ctx: &mut DictContext<'_, '_>,
    header: &SymbolDictionaryHeader,
    input_symbols: &[Rc<Bitmap>],
    new_symbols: &[Rc<Bitmap>],
    width: u32,
    height: u32,
    instances: i32,
    code_len: u32,
) -> Result<Bitmap> {
    // 6.5.8.2.4: SBSYMS is the input symbols followed by the symbols decoded
    // so far.
    let symbols: Vec<Rc<Bitmap>> = input_symbols
        .iter()
        .chain(new_symbols.iter())
        .cloned()
        .collect();

    let params = TextParams {
        width,
        height,
        num_instances: instances as u32,
        log_strip_size: 0,
        default_pixel: false,
        combination_operator: CombinationOperator::Or,
        transposed: false,
        reference_corner: ReferenceCorner::TopLeft,
        delta_s_offset: 0,
        use_refinement: true,
        refinement_template: header.flags.refinement_template,
        refinement_at_pixels: &header.refinement_at_pixels,
    };

    match ctx {
        DictContext::Huffman(_) => {
            // Table 17 fixes SBHUFF to 0, but a Huffman dictionary embeds
            // the aggregate text region data in a way this decoder does not
            // handle yet.
            bail!(DecodeError::Unsupported)
        }
        DictContext::Arithmetic(state) => {
            let contexts = state
                .text_contexts
                .get_or_insert_with(|| TextRegionContexts::new(code_len));

            decode_with(
                TextDecodeContext::Arithmetic {
                    decoder: &mut state.decoder,
                    contexts,
                    gr_contexts: &mut state.gr_contexts,
                },
                &symbols,
                &params,
            )
        }
    }
}

/// Look up a symbol by ID across the input symbols and the symbols decoded
/// so far (6.5.8.2.2 step 3).
fn resolve_symbol<'a>(
    input_symbols: &'a [Rc<Bitmap>],
    new_symbols: &'a [Rc<Bitmap>],
    id: usize,
) -> Result<&'a Bitmap> {
    if id < input_symbols.len() {
        Ok(&input_symbols[id])
    } else {
        new_symbols
            .get(id - input_symbols.len())
            .map(|s| s.as_ref())
            .ok_or(SymbolError::OutOfRange.into())
    }
}

/// Decode a height class collective bitmap and split it into symbols
/// (6.5.9, 6.5.5 step 4 d).
fn decode_collective_bitmap(
    ctx: &mut DictContext<'_, '_>,
    new_symbols: &mut Vec<Rc<Bitmap>>,
    symbol_widths: &[u32],
    total_width: u32,
    height: u32,
) -> Result<()> {
    let DictContext::Huffman(state) = ctx else {
        unreachable!("collective bitmaps only exist in Huffman mode");
    };

    // "1) Read the size in bytes using the Huffman table specified by
    // SDHUFFBMSIZESELECTION. Let BMSIZE be the value decoded."
    let bmsize = state.tables.bitmap_size.decode_no_oob(&mut state.reader)? as u32;

    // "2) Skip over any bits remaining in the last byte read."
    state.reader.align();

    let mut collective = Bitmap::new(total_width, height);

    if bmsize == 0 {
        // "3) If BMSIZE is zero, then the bitmap is stored uncompressed",
        // row by row with each row padded to a byte boundary.
        let row_bytes = total_width.div_ceil(8) as usize;

        for y in 0..height {
            let row = state
                .reader
                .read_bytes(row_bytes)
                .ok_or(ParseError::UnexpectedEof)?;
            collective.row_mut(y).copy_from_slice(row);
        }
    } else {
        // "4) Otherwise, decode the bitmap using a generic bitmap decoding
        // procedure", with MMR = 1 (Table 19).
        let data = state
            .reader
            .read_bytes(bmsize as usize)
            .ok_or(ParseError::UnexpectedEof)?;

        generic::decode_mmr(&mut collective, data)?;
    }

    // "B_HC contains the symbols concatenated left-to-right, with no
    // intervening gaps."
    let mut x_offset = 0;
    for &width in symbol_widths {
        let mut symbol = Bitmap::new(width, height);

        for y in 0..height {
            for x in 0..width {
                symbol.set(x, y, collective.get(x_offset + x, y));
            }
        }

        new_symbols.push(Rc::new(symbol));
        x_offset += width;
    }

    Ok(())
}

/// Determine the exported symbols via export run lengths (6.5.10).
fn decode_exported_symbols(
    ctx: &mut DictContext<'_, '_>,
    header: &SymbolDictionaryHeader,
    input_symbols: &[Rc<Bitmap>],
    new_symbols: &[Rc<Bitmap>],
) -> Result<Vec<Rc<Bitmap>>> {
    let total = input_symbols.len() + new_symbols.len();

    // "1) Set: EXINDEX = 0, CUREXFLAG = 0"
    let mut index = 0_usize;
    let mut exported_flag = false;
    let mut exported = Vec::with_capacity(header.num_exported_symbols as usize);

    // Alternating runs of not-exported and exported symbols, until every
    // symbol has been covered.
    while index < total {
        let run_length = ctx.read_export_run_length()?;

        if run_length < 0 {
            bail!(SymbolError::OutOfRange);
        }

        let end = index
            .checked_add(run_length as usize)
            .filter(|&e| e <= total)
            .ok_or(SymbolError::OutOfRange)?;

        if exported_flag {
            for i in index..end {
                let symbol = if i < input_symbols.len() {
                    input_symbols[i].clone()
                } else {
                    new_symbols[i - input_symbols.len()].clone()
                };
                exported.push(symbol);
            }
        }

        index = end;
        exported_flag = !exported_flag;
    }

    if exported.len() != header.num_exported_symbols as usize {
        bail!(SymbolError::NoSymbols);
    }

    Ok(exported)
}

/// Entropy decoding state for a symbol dictionary.
enum DictContext<'a, 'b> {
    Huffman(HuffmanState<'a, 'b>),
    Arithmetic(ArithmeticState<'b>),
}

struct HuffmanState<'a, 'b> {
    reader: Reader<'b>,
    tables: DictHuffmanTables<'a>,
}

struct DictHuffmanTables<'a> {
    delta_height: &'a HuffmanTable,
    delta_width: &'a HuffmanTable,
    bitmap_size: &'a HuffmanTable,
    aggregate_instances: &'a HuffmanTable,
}

struct ArithmeticState<'b> {
    decoder: ArithmeticDecoder<'b>,
    iadh: IntegerDecoder,
    iadw: IntegerDecoder,
    iaex: IntegerDecoder,
    iaai: IntegerDecoder,
    gb_contexts: Vec<Context>,
    gr_contexts: Vec<Context>,
    /// IAID and friends, shared across refinement/aggregate symbols.
    text_contexts: Option<TextRegionContexts>,
}

impl<'a, 'b> DictContext<'a, 'b> {
    fn new_huffman(
        data: &'b [u8],
        header: &SymbolDictionaryHeader,
        referred_tables: &[&'a HuffmanTable],
    ) -> Result<Self> {
        let mut custom_index = 0;
        let mut next_custom = || -> Result<&'a HuffmanTable> {
            let table = referred_tables
                .get(custom_index)
                .ok_or(HuffmanError::MissingTables)?;
            custom_index += 1;
            Ok(table)
        };

        // 7.4.2.1.1: table selections in the order DH, DW, BMSIZE, AGGINST.
        let delta_height = match header.flags.delta_height_table {
            TableSelection::Standard(0) => &*TABLE_B4,
            TableSelection::Standard(1) => &*TABLE_B5,
            TableSelection::Custom => next_custom()?,
            _ => bail!(HuffmanError::InvalidSelection),
        };

        let delta_width = match header.flags.delta_width_table {
            TableSelection::Standard(0) => &*TABLE_B2,
            TableSelection::Standard(1) => &*TABLE_B3,
            TableSelection::Custom => next_custom()?,
            _ => bail!(HuffmanError::InvalidSelection),
        };

        let bitmap_size = match header.flags.bitmap_size_table {
            TableSelection::Standard(_) => &*TABLE_B1,
            TableSelection::Custom => next_custom()?,
        };

        let aggregate_instances = match header.flags.aggregate_instance_table {
            TableSelection::Standard(_) => &*TABLE_B1,
            TableSelection::Custom => next_custom()?,
        };

        Ok(Self::Huffman(HuffmanState {
            reader: Reader::new(data),
            tables: DictHuffmanTables {
                delta_height,
                delta_width,
                bitmap_size,
                aggregate_instances,
            },
        }))
    }

    fn new_arithmetic(data: &'b [u8], header: &SymbolDictionaryHeader) -> Self {
        Self::Arithmetic(ArithmeticState {
            decoder: ArithmeticDecoder::new(data),
            iadh: IntegerDecoder::new(),
            iadw: IntegerDecoder::new(),
            iaex: IntegerDecoder::new(),
            iaai: IntegerDecoder::new(),
            gb_contexts: vec![Context::default(); 1 << header.flags.template.context_size()],
            gr_contexts: vec![
                Context::default();
                1 << header.flags.refinement_template.context_size()
            ],
            text_contexts: None,
        })
    }

    /// Decode a height class delta DH (6.5.6).
    fn read_delta_height(&mut self) -> Result<i32> {
        match self {
            Self::Huffman(state) => state.tables.delta_height.decode_no_oob(&mut state.reader),
            Self::Arithmetic(state) => state
                .iadh
                .decode(&mut state.decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    /// Decode a symbol width delta DW (6.5.7). `None` ends the height class.
    fn read_delta_width(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Huffman(state) => state.tables.delta_width.decode(&mut state.reader),
            Self::Arithmetic(state) => Ok(state.iadw.decode(&mut state.decoder)),
        }
    }

    /// Decode the number of instances in an aggregation (6.5.8.2.1).
    fn read_aggregate_instances(&mut self) -> Result<i32> {
        match self {
            Self::Huffman(state) => state
                .tables
                .aggregate_instances
                .decode_no_oob(&mut state.reader),
            Self::Arithmetic(state) => state
                .iaai
                .decode(&mut state.decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }

    /// Decode an export run length (6.5.10 step 2).
    fn read_export_run_length(&mut self) -> Result<i32> {
        match self {
            Self::Huffman(state) => TABLE_B1.decode_no_oob(&mut state.reader),
            Self::Arithmetic(state) => state
                .iaex
                .decode(&mut state.decoder)
                .ok_or(SymbolError::UnexpectedOob.into()),
        }
    }
}

/// A Huffman table choice from the segment flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableSelection {
    Standard(u8),
    Custom,
}

/// Parsed symbol dictionary flags (7.4.2.1.1).
#[derive(Debug, Clone)]
struct SymbolDictionaryFlags {
    use_huffman: bool,
    use_refagg: bool,
    delta_height_table: TableSelection,
    delta_width_table: TableSelection,
    bitmap_size_table: TableSelection,
    aggregate_instance_table: TableSelection,
    template: Template,
    refinement_template: RefinementTemplate,
}

/// Parsed symbol dictionary segment header (7.4.2.1).
struct SymbolDictionaryHeader {
    flags: SymbolDictionaryFlags,
    at_pixels: Vec<AtPixel>,
    refinement_at_pixels: Vec<AtPixel>,
    num_exported_symbols: u32,
    num_new_symbols: u32,
}

/// Parse a symbol dictionary segment header (7.4.2.1).
fn parse(reader: &mut Reader<'_>) -> Result<SymbolDictionaryHeader> {
    let flags_word = reader.read_u16().ok_or(ParseError::UnexpectedEof)?;

    let use_huffman = flags_word & 0x0001 != 0;
    let use_refagg = flags_word & 0x0002 != 0;

    let two_bit_selection = |value: u16| match value & 0x03 {
        3 => Ok(TableSelection::Custom),
        2 => Err(DecodeError::from(HuffmanError::InvalidSelection)),
        v => Ok(TableSelection::Standard(v as u8)),
    };

    let delta_height_table = two_bit_selection(flags_word >> 2)?;
    let delta_width_table = two_bit_selection(flags_word >> 4)?;

    let bitmap_size_table = if flags_word & 0x0040 != 0 {
        TableSelection::Custom
    } else {
        TableSelection::Standard(0)
    };
    let aggregate_instance_table = if flags_word & 0x0080 != 0 {
        TableSelection::Custom
    } else {
        TableSelection::Standard(0)
    };

    let template = Template::from_value(((flags_word >> 10) & 0x03) as u8)?;
    let refinement_template = RefinementTemplate::from_value(((flags_word >> 12) & 0x01) as u8)?;

    let flags = SymbolDictionaryFlags {
        use_huffman,
        use_refagg,
        delta_height_table,
        delta_width_table,
        bitmap_size_table,
        aggregate_instance_table,
        template,
        refinement_template,
    };

    // "If SDHUFF is 1, the adaptive template field is not present." (7.4.2.1.2)
    let at_pixels = if use_huffman {
        Vec::new()
    } else {
        parse_at_pixels(reader, template.at_pixel_count())?
    };

    // Present only for refinement/aggregate coding with template 0 (7.4.2.1.3).
    let refinement_at_pixels =
        if use_refagg && refinement_template == RefinementTemplate::Template0 {
            parse_refinement_at_pixels(reader)?.to_vec()
        } else {
            Vec::new()
        };

    let num_exported_symbols = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;
    let num_new_symbols = reader.read_u32().ok_or(ParseError::UnexpectedEof)?;

    Ok(SymbolDictionaryHeader {
        flags,
        at_pixels,
        refinement_at_pixels,
        num_exported_symbols,
        num_new_symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_word_bit_layout() {
        // SDHUFF = 0, SDREFAGG = 1, DH selection 1 (Table B.5), DW selection
        // 0 (Table B.2), template 2, refinement template 1.
        let flags_word: u16 = 0b0001_10_00_00_00_01_1_0;
        let mut data = flags_word.to_be_bytes().to_vec();
        // One generic AT pixel for template 2. No refinement AT pixels since
        // SDRTEMPLATE = 1.
        data.extend([0x03, 0xff]);
        data.extend([0x00, 0x00, 0x00, 0x02]); // SDNUMEXSYMS
        data.extend([0x00, 0x00, 0x00, 0x05]); // SDNUMNEWSYMS

        let mut reader = Reader::new(&data);
        let header = parse(&mut reader).unwrap();

        assert!(!header.flags.use_huffman);
        assert!(header.flags.use_refagg);
        assert_eq!(header.flags.delta_height_table, TableSelection::Standard(1));
        assert_eq!(header.flags.delta_width_table, TableSelection::Standard(0));
        assert_eq!(header.flags.template, Template::Template2);
        assert_eq!(
            header.flags.refinement_template,
            RefinementTemplate::Template1
        );
        assert_eq!(header.at_pixels.len(), 1);
        assert!(header.refinement_at_pixels.is_empty());
        assert_eq!(header.num_exported_symbols, 2);
        assert_eq!(header.num_new_symbols, 5);
        assert!(reader.at_end());
    }

    #[test]
    fn symbol_ids_resolve_across_both_symbol_lists() {
        let input = [Rc::new(Bitmap::new(1, 1)), Rc::new(Bitmap::new(2, 1))];
        let new = [Rc::new(Bitmap::new(3, 1))];

        assert_eq!(resolve_symbol(&input, &new, 0).unwrap().width(), 1);
        assert_eq!(resolve_symbol(&input, &new, 1).unwrap().width(), 2);
        assert_eq!(resolve_symbol(&input, &new, 2).unwrap().width(), 3);
        assert!(resolve_symbol(&input, &new, 3).is_err());
    }

    /// A Huffman entropy context whose export runs come from Table B.1.
    fn export_context(data: &[u8]) -> DictContext<'static, '_> {
        DictContext::Huffman(HuffmanState {
            reader: Reader::new(data),
            tables: DictHuffmanTables {
                delta_height: &*TABLE_B4,
                delta_width: &*TABLE_B2,
                bitmap_size: &*TABLE_B1,
                aggregate_instances: &*TABLE_B1,
            },
        })
    }

    fn export_header(num_exported: u32, num_new: u32) -> SymbolDictionaryHeader {
        SymbolDictionaryHeader {
            flags: SymbolDictionaryFlags {
                use_huffman: true,
                use_refagg: false,
                delta_height_table: TableSelection::Standard(0),
                delta_width_table: TableSelection::Standard(0),
                bitmap_size_table: TableSelection::Standard(0),
                aggregate_instance_table: TableSelection::Standard(0),
                template: Template::Template0,
                refinement_template: RefinementTemplate::Template0,
            },
            at_pixels: Vec::new(),
            refinement_at_pixels: Vec::new(),
            num_exported_symbols: num_exported,
            num_new_symbols: num_new,
        }
    }

    #[test]
    fn export_runs_can_reexport_imported_symbols() {
        // A dictionary with no new symbols that re-exports both of its
        // imported symbols. The runs are 0 (not exported) then 2 (exported),
        // coded with Table B.1 as 0 0000 and 0 0010.
        let input = [Rc::new(Bitmap::new(1, 1)), Rc::new(Bitmap::new(2, 1))];
        let mut ctx = export_context(&[0b0000_0000, 0b1000_0000]);

        let exported =
            decode_exported_symbols(&mut ctx, &export_header(2, 0), &input, &[]).unwrap();

        assert_eq!(exported.len(), 2);
        assert!(Rc::ptr_eq(&exported[0], &input[0]));
        assert_eq!(exported[1].width(), 2);
    }

    #[test]
    fn export_run_past_the_symbol_count_is_rejected() {
        // A first run of 5 over only 2 symbols.
        let input = [Rc::new(Bitmap::new(1, 1)), Rc::new(Bitmap::new(2, 1))];
        let mut ctx = export_context(&[0b0010_1000]);

        assert!(decode_exported_symbols(&mut ctx, &export_header(2, 0), &input, &[]).is_err());
    }

    #[test]
    fn exported_count_must_match_the_declared_count() {
        // Runs 1 (not exported) and 1 (exported) cover both symbols but
        // export only one of the declared two.
        let input = [Rc::new(Bitmap::new(1, 1)), Rc::new(Bitmap::new(2, 1))];
        let mut ctx = export_context(&[0b0000_1000, 0b0100_0000]);

        let result = decode_exported_symbols(&mut ctx, &export_header(2, 0), &input, &[]);
        assert!(result.is_err());
    }
}
