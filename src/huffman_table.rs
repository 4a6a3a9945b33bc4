//! Huffman-coded integer decoding (Annex B).
//!
//! Covers the fifteen standard tables of B.5, custom tables read from the
//! bitstream (B.2), and tables built from bare prefix lengths (used for the
//! symbol ID codes of a text region).

use std::sync::LazyLock;

use crate::error::{HuffmanError, ParseError, Result, bail};
use crate::reader::Reader;

/// A prefix code table.
///
/// Stored as a binary trie in a flat arena; node 0 is the root. Each decode
/// walks the trie one bit at a time until it hits a leaf (B.4).
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    /// Child indices for a 0-bit and a 1-bit. 0 means "no child" (the root
    /// can never be a child).
    Branch([usize; 2]),
    Leaf(Leaf),
}

#[derive(Debug, Clone, Copy)]
enum Leaf {
    Value {
        /// RANGELOW, or the upper bound for a lower range line.
        base: i32,
        /// RANGELEN, the number of offset bits following the prefix.
        range_len: u8,
        /// Lower range lines subtract the offset (B.4 step 5).
        lower: bool,
    },
    OutOfBand,
}

/// One line of a code table (Table B.1 layout).
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableLine {
    base: i32,
    preflen: u8,
    range_len: u8,
    lower: bool,
    oob: bool,
}

impl TableLine {
    pub(crate) const fn new(range_low: i32, preflen: u8, range_len: u8) -> Self {
        Self {
            base: range_low,
            preflen,
            range_len,
            lower: false,
            oob: false,
        }
    }

    /// A lower range line, covering -∞ up to `range_high`.
    pub(crate) const fn lower(range_high: i32, preflen: u8, range_len: u8) -> Self {
        Self {
            base: range_high,
            preflen,
            range_len,
            lower: true,
            oob: false,
        }
    }

    /// An upper range line, covering `range_low` to +∞.
    pub(crate) const fn upper(range_low: i32, preflen: u8, range_len: u8) -> Self {
        Self {
            base: range_low,
            preflen,
            range_len,
            lower: false,
            oob: false,
        }
    }

    pub(crate) const fn oob(preflen: u8) -> Self {
        Self {
            base: 0,
            preflen,
            range_len: 0,
            lower: false,
            oob: true,
        }
    }
}

impl HuffmanTable {
    /// Assign prefix codes to the given table lines and build the trie.
    ///
    /// This is the procedure of B.3: count prefix lengths into LENCOUNT,
    /// derive FIRSTCODE per length, then hand out codes in line order.
    /// "A line with PREFLEN equal to zero is not assigned a prefix code."
    pub(crate) fn build(lines: &[TableLine]) -> Self {
        let max_len = lines.iter().map(|l| l.preflen).max().unwrap_or(0) as usize;

        let mut len_count = vec![0_u32; max_len + 1];
        for line in lines {
            len_count[line.preflen as usize] += 1;
        }
        len_count[0] = 0;

        let mut table = Self {
            nodes: vec![Node::Branch([0, 0])],
        };

        let mut first_code = 0_u32;
        let mut prev_count = 0_u32;

        for cur_len in 1..=max_len {
            first_code = (first_code + prev_count) * 2;
            prev_count = len_count[cur_len];

            let mut cur_code = first_code;
            for line in lines {
                if line.preflen as usize == cur_len {
                    table.insert(cur_code, line);
                    cur_code += 1;
                }
            }
        }

        table
    }

    /// Insert one assigned code, MSB first.
    fn insert(&mut self, code: u32, line: &TableLine) {
        let mut node = 0;

        for i in (0..line.preflen).rev() {
            let bit = ((code >> i) & 1) as usize;

            let next = match &self.nodes[node] {
                Node::Branch(children) => children[bit],
                // Prefix codes from B.3 never share a path with a leaf.
                Node::Leaf(_) => unreachable!("prefix codes are prefix-free"),
            };

            node = if next == 0 {
                let new = self.nodes.len();
                self.nodes.push(Node::Branch([0, 0]));

                match &mut self.nodes[node] {
                    Node::Branch(children) => children[bit] = new,
                    Node::Leaf(_) => unreachable!(),
                }

                new
            } else {
                next
            };
        }

        self.nodes[node] = Node::Leaf(if line.oob {
            Leaf::OutOfBand
        } else {
            Leaf::Value {
                base: line.base,
                range_len: line.range_len,
                lower: line.lower,
            }
        });
    }

    /// Decode one value (B.4). Returns `None` for the out-of-band code.
    pub(crate) fn decode(&self, reader: &mut Reader<'_>) -> Result<Option<i32>> {
        let mut node = 0;

        loop {
            match &self.nodes[node] {
                Node::Branch(children) => {
                    let bit = reader.read_bit().ok_or(ParseError::UnexpectedEof)?;
                    let next = children[bit as usize];

                    if next == 0 {
                        bail!(HuffmanError::InvalidCode);
                    }

                    node = next;
                }
                Node::Leaf(Leaf::OutOfBand) => return Ok(None),
                Node::Leaf(Leaf::Value {
                    base,
                    range_len,
                    lower,
                }) => {
                    let offset = reader
                        .read_bits(*range_len)
                        .ok_or(ParseError::UnexpectedEof)? as i32;

                    return Ok(Some(if *lower {
                        base.wrapping_sub(offset)
                    } else {
                        base.wrapping_add(offset)
                    }));
                }
            }
        }
    }

    /// Decode one value where the out-of-band code is not allowed.
    pub(crate) fn decode_no_oob(&self, reader: &mut Reader<'_>) -> Result<i32> {
        match self.decode(reader)? {
            Some(value) => Ok(value),
            None => bail!(HuffmanError::UnexpectedOob),
        }
    }

    /// Read a custom code table from the bitstream (B.2).
    pub(crate) fn read_custom(reader: &mut Reader<'_>) -> Result<Self> {
        let flags = reader.read_byte().ok_or(ParseError::UnexpectedEof)?;

        // "Bit 0 contains the value of HTOOB." Bits 1-3 hold HTPS - 1 and
        // bits 4-6 hold HTRS - 1.
        let htoob = flags & 1 != 0;
        let htps = ((flags >> 1) & 0b111) + 1;
        let htrs = ((flags >> 4) & 0b111) + 1;

        let htlow = reader.read_i32().ok_or(ParseError::UnexpectedEof)?;
        let hthigh = reader.read_i32().ok_or(ParseError::UnexpectedEof)?;

        let mut lines = Vec::new();
        let mut cur_range_low = htlow;

        // "Repeat ... until CURRANGELOW >= HTHIGH": one line per range of
        // 2^RANGELEN values starting at CURRANGELOW.
        while cur_range_low < hthigh {
            let preflen = reader.read_bits(htps).ok_or(ParseError::UnexpectedEof)? as u8;
            let range_len = reader.read_bits(htrs).ok_or(ParseError::UnexpectedEof)? as u8;

            lines.push(TableLine::new(cur_range_low, preflen, range_len));

            let next = (cur_range_low as i64) + (1_i64 << range_len.min(32));
            cur_range_low = i32::try_from(next).map_err(|_| crate::error::DecodeError::Overflow)?;
        }

        // The lower and upper range lines carry only a prefix length; their
        // range length is 32.
        let lower_preflen = reader.read_bits(htps).ok_or(ParseError::UnexpectedEof)? as u8;
        lines.push(TableLine::lower(htlow - 1, lower_preflen, 32));

        let upper_preflen = reader.read_bits(htps).ok_or(ParseError::UnexpectedEof)? as u8;
        lines.push(TableLine::upper(hthigh, upper_preflen, 32));

        if htoob {
            let oob_preflen = reader.read_bits(htps).ok_or(ParseError::UnexpectedEof)? as u8;
            lines.push(TableLine::oob(oob_preflen));
        }

        Ok(Self::build(&lines))
    }
}

/// Table B.1 (HTOOB = 0).
pub(crate) static TABLE_B1: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(0, 1, 4),
        TableLine::new(16, 2, 8),
        TableLine::new(272, 3, 16),
        TableLine::upper(65808, 3, 32),
    ])
});

/// Table B.2 (HTOOB = 1).
pub(crate) static TABLE_B2: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(0, 1, 0),
        TableLine::new(1, 2, 0),
        TableLine::new(2, 3, 0),
        TableLine::new(3, 4, 3),
        TableLine::new(11, 5, 6),
        TableLine::upper(75, 6, 32),
        TableLine::oob(6),
    ])
});

/// Table B.3 (HTOOB = 1).
pub(crate) static TABLE_B3: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-256, 8, 8),
        TableLine::new(0, 1, 0),
        TableLine::new(1, 2, 0),
        TableLine::new(2, 3, 0),
        TableLine::new(3, 4, 3),
        TableLine::new(11, 5, 6),
        TableLine::lower(-257, 8, 32),
        TableLine::upper(75, 7, 32),
        TableLine::oob(6),
    ])
});

/// Table B.4 (HTOOB = 0).
pub(crate) static TABLE_B4: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(1, 1, 0),
        TableLine::new(2, 2, 0),
        TableLine::new(3, 3, 0),
        TableLine::new(4, 4, 3),
        TableLine::new(12, 5, 6),
        TableLine::upper(76, 5, 32),
    ])
});

/// Table B.5 (HTOOB = 0).
pub(crate) static TABLE_B5: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-255, 7, 8),
        TableLine::new(1, 1, 0),
        TableLine::new(2, 2, 0),
        TableLine::new(3, 3, 0),
        TableLine::new(4, 4, 3),
        TableLine::new(12, 5, 6),
        TableLine::lower(-256, 7, 32),
        TableLine::upper(76, 6, 32),
    ])
});

/// Table B.6 (HTOOB = 0).
pub(crate) static TABLE_B6: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-2048, 5, 10),
        TableLine::new(-1024, 4, 9),
        TableLine::new(-512, 4, 8),
        TableLine::new(-256, 4, 7),
        TableLine::new(-128, 5, 6),
        TableLine::new(-64, 5, 5),
        TableLine::new(-32, 4, 5),
        TableLine::new(0, 2, 7),
        TableLine::new(128, 3, 7),
        TableLine::new(256, 3, 8),
        TableLine::new(512, 4, 9),
        TableLine::new(1024, 4, 10),
        TableLine::lower(-2049, 6, 32),
        TableLine::upper(2048, 6, 32),
    ])
});

/// Table B.7 (HTOOB = 0).
pub(crate) static TABLE_B7: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-1024, 4, 9),
        TableLine::new(-512, 3, 8),
        TableLine::new(-256, 4, 7),
        TableLine::new(-128, 5, 6),
        TableLine::new(-64, 5, 5),
        TableLine::new(-32, 4, 5),
        TableLine::new(0, 4, 5),
        TableLine::new(32, 5, 5),
        TableLine::new(64, 5, 6),
        TableLine::new(128, 4, 7),
        TableLine::new(256, 3, 8),
        TableLine::new(512, 3, 9),
        TableLine::new(1024, 3, 10),
        TableLine::lower(-1025, 5, 32),
        TableLine::upper(2048, 5, 32),
    ])
});

/// Table B.8 (HTOOB = 1).
pub(crate) static TABLE_B8: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-15, 8, 3),
        TableLine::new(-7, 9, 1),
        TableLine::new(-5, 8, 1),
        TableLine::new(-3, 9, 0),
        TableLine::new(-2, 7, 0),
        TableLine::new(-1, 4, 0),
        TableLine::new(0, 2, 1),
        TableLine::new(2, 5, 0),
        TableLine::new(3, 6, 0),
        TableLine::new(4, 3, 4),
        TableLine::new(20, 6, 1),
        TableLine::new(22, 4, 4),
        TableLine::new(38, 4, 5),
        TableLine::new(70, 5, 6),
        TableLine::new(134, 5, 7),
        TableLine::new(262, 6, 7),
        TableLine::new(390, 7, 8),
        TableLine::new(646, 6, 10),
        TableLine::lower(-16, 9, 32),
        TableLine::upper(1670, 9, 32),
        TableLine::oob(2),
    ])
});

/// Table B.9 (HTOOB = 1).
pub(crate) static TABLE_B9: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-31, 8, 4),
        TableLine::new(-15, 9, 2),
        TableLine::new(-11, 8, 2),
        TableLine::new(-7, 9, 1),
        TableLine::new(-5, 7, 1),
        TableLine::new(-3, 4, 1),
        TableLine::new(-1, 3, 1),
        TableLine::new(1, 3, 1),
        TableLine::new(3, 5, 1),
        TableLine::new(5, 6, 1),
        TableLine::new(7, 3, 5),
        TableLine::new(39, 6, 2),
        TableLine::new(43, 4, 5),
        TableLine::new(75, 4, 6),
        TableLine::new(139, 5, 7),
        TableLine::new(267, 5, 8),
        TableLine::new(523, 6, 8),
        TableLine::new(779, 7, 9),
        TableLine::new(1291, 6, 11),
        TableLine::lower(-32, 9, 32),
        TableLine::upper(3339, 9, 32),
        TableLine::oob(2),
    ])
});

/// Table B.10 (HTOOB = 1).
pub(crate) static TABLE_B10: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-21, 7, 4),
        TableLine::new(-5, 8, 0),
        TableLine::new(-4, 7, 0),
        TableLine::new(-3, 5, 0),
        TableLine::new(-2, 2, 2),
        TableLine::new(2, 5, 0),
        TableLine::new(3, 6, 0),
        TableLine::new(4, 7, 0),
        TableLine::new(5, 8, 0),
        TableLine::new(6, 2, 6),
        TableLine::new(70, 5, 5),
        TableLine::new(102, 6, 5),
        TableLine::new(134, 6, 6),
        TableLine::new(198, 6, 7),
        TableLine::new(326, 6, 8),
        TableLine::new(582, 6, 9),
        TableLine::new(1094, 6, 10),
        TableLine::new(2118, 7, 11),
        TableLine::lower(-22, 8, 32),
        TableLine::upper(4166, 8, 32),
        TableLine::oob(2),
    ])
});

/// Table B.11 (HTOOB = 0).
pub(crate) static TABLE_B11: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(1, 1, 0),
        TableLine::new(2, 2, 1),
        TableLine::new(4, 4, 0),
        TableLine::new(5, 4, 1),
        TableLine::new(7, 5, 1),
        TableLine::new(9, 5, 2),
        TableLine::new(13, 6, 2),
        TableLine::new(17, 7, 2),
        TableLine::new(21, 7, 3),
        TableLine::new(29, 7, 4),
        TableLine::new(45, 7, 5),
        TableLine::new(77, 7, 6),
        TableLine::upper(141, 7, 32),
    ])
});

/// Table B.12 (HTOOB = 0).
pub(crate) static TABLE_B12: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(1, 1, 0),
        TableLine::new(2, 2, 0),
        TableLine::new(3, 3, 1),
        TableLine::new(5, 5, 0),
        TableLine::new(6, 5, 1),
        TableLine::new(8, 6, 1),
        TableLine::new(10, 7, 0),
        TableLine::new(11, 7, 1),
        TableLine::new(13, 7, 2),
        TableLine::new(17, 7, 3),
        TableLine::new(25, 7, 4),
        TableLine::new(41, 8, 5),
        TableLine::upper(73, 8, 32),
    ])
});

/// Table B.13 (HTOOB = 0).
pub(crate) static TABLE_B13: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(1, 1, 0),
        TableLine::new(2, 3, 0),
        TableLine::new(3, 4, 0),
        TableLine::new(4, 5, 0),
        TableLine::new(5, 4, 1),
        TableLine::new(7, 3, 3),
        TableLine::new(15, 6, 1),
        TableLine::new(17, 6, 2),
        TableLine::new(21, 6, 3),
        TableLine::new(29, 6, 4),
        TableLine::new(45, 6, 5),
        TableLine::new(77, 7, 6),
        TableLine::upper(141, 7, 32),
    ])
});

/// Table B.14 (HTOOB = 0).
pub(crate) static TABLE_B14: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-2, 3, 0),
        TableLine::new(-1, 3, 0),
        TableLine::new(0, 1, 0),
        TableLine::new(1, 3, 0),
        TableLine::new(2, 3, 0),
    ])
});

/// Table B.15 (HTOOB = 0).
pub(crate) static TABLE_B15: LazyLock<HuffmanTable> = LazyLock::new(|| {
    HuffmanTable::build(&[
        TableLine::new(-24, 7, 4),
        TableLine::new(-8, 6, 2),
        TableLine::new(-4, 5, 1),
        TableLine::new(-2, 4, 0),
        TableLine::new(-1, 3, 0),
        TableLine::new(0, 1, 0),
        TableLine::new(1, 3, 0),
        TableLine::new(2, 4, 0),
        TableLine::new(3, 5, 1),
        TableLine::new(5, 6, 2),
        TableLine::new(9, 7, 4),
        TableLine::lower(-25, 7, 32),
        TableLine::upper(25, 7, 32),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(table: &HuffmanTable, data: &[u8]) -> Option<i32> {
        let mut reader = Reader::new(data);
        table.decode(&mut reader).unwrap()
    }

    #[test]
    fn standard_table_b1() {
        // Codes per B.3: line 0 gets "0", line 1 "10", lines 2/3 "110"/"111".
        assert_eq!(decode_one(&TABLE_B1, &[0b0_0111_000]), Some(7));
        assert_eq!(decode_one(&TABLE_B1, &[0b10_000000, 0b01_000000]), Some(17));
        assert_eq!(
            decode_one(&TABLE_B1, &[0b111_00000, 0x00, 0x00, 0x00, 0b001_00000]),
            Some(65809)
        );
    }

    #[test]
    fn standard_table_b2_oob() {
        assert_eq!(decode_one(&TABLE_B2, &[0b0_0000000]), Some(0));
        assert_eq!(decode_one(&TABLE_B2, &[0b10_000000]), Some(1));
        // The upper range line and the OOB line both have prefix length 6;
        // the upper line comes first in table order, so OOB gets "111111".
        assert_eq!(decode_one(&TABLE_B2, &[0b111111_00]), None);
        assert_eq!(
            decode_one(&TABLE_B2, &[0b111110_00, 0x00, 0x00, 0x00, 0b000001_00]),
            Some(76)
        );
    }

    #[test]
    fn lower_range_line_subtracts_offset() {
        // Table B.3's lower line has code "11111111" and covers -∞...-257,
        // so an offset of 2 yields -257 - 2.
        let mut reader = Reader::new(&[0xff, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(TABLE_B3.decode(&mut reader).unwrap(), Some(-259));
    }

    #[test]
    fn custom_table_example() {
        // The example from B.2, which encodes a table equivalent to B.1.
        let data = [
            0x42, // HTOOB = 0, HTPS = 2, HTRS = 5
            0x00, 0x00, 0x00, 0x00, // HTLOW = 0
            0x00, 0x01, 0x01, 0x10, // HTHIGH = 65808
            0x49, 0x23, 0x81, 0x80, // four table lines
        ];
        let mut reader = Reader::new(&data);
        let table = HuffmanTable::read_custom(&mut reader).unwrap();

        assert_eq!(decode_one(&table, &[0b0_1111_000]), Some(15));
        assert_eq!(
            decode_one(&table, &[0b10_111111, 0b11_000000]),
            Some(271)
        );
        assert_eq!(
            decode_one(&table, &[0b110_00000, 0b00000000, 0b0_0000000]),
            Some(272)
        );
        assert_eq!(
            decode_one(&table, &[0b111_00000, 0x00, 0x00, 0x00, 0b00000_000]),
            Some(65808)
        );
    }

    #[test]
    fn unassigned_code_is_an_error() {
        // An incomplete code: only "00" and "01" are assigned, so a leading
        // 1-bit dead-ends.
        let table = HuffmanTable::build(&[TableLine::new(0, 2, 0), TableLine::new(1, 2, 0)]);

        let mut reader = Reader::new(&[0b1000_0000]);
        assert!(table.decode(&mut reader).is_err());
    }
}
