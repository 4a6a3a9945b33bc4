//! The MQ arithmetic decoder (Annex E).
//!
//! "The arithmetic decoding procedure receives an arithmetically coded bit
//! sequence and an associated sequence of context labels, and reconstructs the
//! original string of binary symbols." (E.1.1)
//!
//! This is the software-conventions variant of the decoder (Annex G), where
//! Chigh and Clow are held in a single 32-bit register.

/// The arithmetic decoder state (E.3.1, Table E.1).
pub(crate) struct ArithmeticDecoder<'a> {
    /// The underlying encoded data.
    data: &'a [u8],
    /// The C-register. "Chigh and Clow can be thought of as one 32-bit
    /// C-register" (E.3.1).
    c: u32,
    /// The A-register, holding the current interval size.
    a: u32,
    /// `BP`, the pointer into the compressed data.
    bp: usize,
    /// `CT`, the bit counter for renormalization shifts.
    ct: u32,
}

impl<'a> ArithmeticDecoder<'a> {
    /// Create a decoder and run INITDEC (E.3.5, Figure G.1).
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            c: 0,
            a: 0,
            bp: 0,
            ct: 0,
        };

        // Figure G.1: "C = (B XOR 0xFF) << 16", then BYTEIN, then
        // "C = C << 7; CT = CT - 7; A = 0x8000".
        decoder.c = ((decoder.byte_at(0) as u32) ^ 0xff) << 16;
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct = decoder.ct.wrapping_sub(7);
        decoder.a = 0x8000;

        decoder
    }

    /// Decode one binary decision with the given context (DECODE, Figure G.2).
    #[inline(always)]
    pub(crate) fn decode(&mut self, context: &mut Context) -> u32 {
        let qe = &QE_TABLE[context.index as usize];

        // Figure G.2: "A = A - Qe(I(CX))"
        self.a -= qe.value;

        if (self.c >> 16) < self.a {
            if self.a & 0x8000 != 0 {
                return context.mps;
            }

            // MPS_EXCHANGE (Figure E.16).
            let d = if self.a < qe.value {
                let d = 1 - context.mps;
                if qe.switch {
                    context.mps = 1 - context.mps;
                }
                context.index = qe.nlps;
                d
            } else {
                let d = context.mps;
                context.index = qe.nmps;
                d
            };

            self.renormalize();
            d
        } else {
            // Figure G.2: "Chigh = Chigh - A"
            self.c -= self.a << 16;

            // LPS_EXCHANGE (Figure E.17).
            let d = if self.a < qe.value {
                let d = context.mps;
                context.index = qe.nmps;
                d
            } else {
                let d = 1 - context.mps;
                if qe.switch {
                    context.mps = 1 - context.mps;
                }
                context.index = qe.nlps;
                d
            };
            self.a = qe.value;

            self.renormalize();
            d
        }
    }

    /// The RENORMD procedure (E.3.3, Figure E.18).
    #[inline(always)]
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }

            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;

            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// The BYTEIN procedure (E.3.4, Figure G.3).
    ///
    /// Reads one byte of compressed data, compensating for the stuff bit that
    /// follows any 0xFF byte.
    #[inline(always)]
    fn byte_in(&mut self) {
        if self.byte_at(self.bp) == 0xff {
            // "If B1 exceeds 0x8F, then B1 must be one of the marker codes."
            // The decoder then feeds 1-bits without advancing past the marker.
            if self.byte_at(self.bp + 1) > 0x8f {
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c = self
                    .c
                    .wrapping_add(0xfe00)
                    .wrapping_sub((self.byte_at(self.bp) as u32) << 9);
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.c = self
                .c
                .wrapping_add(0xff00)
                .wrapping_sub((self.byte_at(self.bp) as u32) << 8);
            self.ct = 8;
        }
    }

    /// Reads past the end of the data behave as if the stream were padded
    /// with 0xFF marker bytes, which makes the decoder produce a stable
    /// bit sequence instead of failing.
    #[inline(always)]
    fn byte_at(&self, pos: usize) -> u8 {
        self.data.get(pos).copied().unwrap_or(0xff)
    }
}

/// An adaptive context (E.2.4).
///
/// "Each context has associated with it an index, I(CX), which identifies a
/// particular probability estimate and its associated MPS value."
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Context {
    /// `I(CX)`, the index into the Qe table.
    pub(crate) index: u32,
    /// `MPS(CX)`, the sense of the more probable symbol.
    pub(crate) mps: u32,
}

/// One row of Table E.1.
struct QeEntry {
    /// The probability estimate for the LPS.
    value: u32,
    /// Next index after coding an MPS.
    nmps: u32,
    /// Next index after coding an LPS.
    nlps: u32,
    /// Whether MPS and LPS switch senses on an LPS.
    switch: bool,
}

const fn qe(value: u32, nmps: u32, nlps: u32, switch: bool) -> QeEntry {
    QeEntry {
        value,
        nmps,
        nlps,
        switch,
    }
}

/// "Table E.1 – Qe values and probability estimation process"
#[rustfmt::skip]
static QE_TABLE: [QeEntry; 47] = [
    qe(0x5601, 1, 1, true),
    qe(0x3401, 2, 6, false),
    qe(0x1801, 3, 9, false),
    qe(0x0ac1, 4, 12, false),
    qe(0x0521, 5, 29, false),
    qe(0x0221, 38, 33, false),
    qe(0x5601, 7, 6, true),
    qe(0x5401, 8, 14, false),
    qe(0x4801, 9, 14, false),
    qe(0x3801, 10, 14, false),
    qe(0x3001, 11, 17, false),
    qe(0x2401, 12, 18, false),
    qe(0x1c01, 13, 20, false),
    qe(0x1601, 29, 21, false),
    qe(0x5601, 15, 14, true),
    qe(0x5401, 16, 14, false),
    qe(0x5101, 17, 15, false),
    qe(0x4801, 18, 16, false),
    qe(0x3801, 19, 17, false),
    qe(0x3401, 20, 18, false),
    qe(0x3001, 21, 19, false),
    qe(0x2801, 22, 19, false),
    qe(0x2401, 23, 20, false),
    qe(0x2201, 24, 21, false),
    qe(0x1c01, 25, 22, false),
    qe(0x1801, 26, 23, false),
    qe(0x1601, 27, 24, false),
    qe(0x1401, 28, 25, false),
    qe(0x1201, 29, 26, false),
    qe(0x1101, 30, 27, false),
    qe(0x0ac1, 31, 28, false),
    qe(0x09c1, 32, 29, false),
    qe(0x08a1, 33, 30, false),
    qe(0x0521, 34, 31, false),
    qe(0x0441, 35, 32, false),
    qe(0x02a1, 36, 33, false),
    qe(0x0221, 37, 34, false),
    qe(0x0141, 38, 35, false),
    qe(0x0111, 39, 36, false),
    qe(0x0085, 40, 37, false),
    qe(0x0049, 41, 38, false),
    qe(0x0025, 42, 39, false),
    qe(0x0015, 43, 40, false),
    qe(0x0009, 44, 41, false),
    qe(0x0005, 45, 42, false),
    qe(0x0001, 45, 43, false),
    qe(0x5601, 46, 46, false),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_decisions_on_zero_data() {
        // Hand-traced through INITDEC and DECODE: with input bytes 0x00 0x00,
        // INITDEC leaves C = 0x7FFF8000, CT = 1, A = 0x8000. The first
        // decision takes the LPS path with conditional exchange (A < Qe), so
        // D = MPS = 0 and the index moves to NMPS(0) = 1.
        let mut decoder = ArithmeticDecoder::new(&[0x00, 0x00]);
        let mut context = Context::default();

        assert_eq!(decoder.decode(&mut context), 0);
        assert_eq!(context.index, 1);
        assert_eq!(context.mps, 0);

        // Second decision: LPS path without exchange (A >= Qe), so
        // D = 1 - MPS = 1 and the index moves to NLPS(1) = 6.
        assert_eq!(decoder.decode(&mut context), 1);
        assert_eq!(context.index, 6);
        assert_eq!(context.mps, 0);

        // Third decision: another unexchanged LPS, this time with SWITCH set,
        // so the MPS sense flips.
        assert_eq!(decoder.decode(&mut context), 1);
        assert_eq!(context.index, 6);
        assert_eq!(context.mps, 1);
    }

    #[test]
    fn empty_input_does_not_panic() {
        // Out-of-data reads pad with 0xFF marker bytes.
        let mut decoder = ArithmeticDecoder::new(&[]);
        let mut context = Context::default();

        for _ in 0..64 {
            let d = decoder.decode(&mut context);
            assert!(d <= 1);
        }
    }
}
