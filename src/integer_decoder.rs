//! Arithmetic integer decoding procedures (Annex A.2).

use crate::arithmetic_decoder::{ArithmeticDecoder, Context};

/// An arithmetic integer decoder (one of the IAx procedures).
///
/// "An invocation of an arithmetic integer decoding procedure involves
/// decoding a sequence of bits, where each bit is decoded using a context
/// formed by the bits decoded previously in this invocation." (A.1)
///
/// Each procedure (IADH, IADW, IAEX, ...) owns its own context storage; the
/// contexts are never shared between procedures.
pub(crate) struct IntegerDecoder {
    /// "Each arithmetic integer decoding procedure requires 512 bytes of
    /// storage for its context memory." (A.2)
    contexts: Vec<Context>,
}

impl IntegerDecoder {
    pub(crate) fn new() -> Self {
        Self {
            contexts: vec![Context::default(); 512],
        }
    }

    /// Decode a signed integer.
    ///
    /// Returns `None` for the out-of-band value:
    /// "The result of the integer arithmetic decoding procedure is equal to:
    /// V if S = 0, -V if S = 1 and V > 0, OOB if S = 1 and V = 0" (A.2)
    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> Option<i32> {
        // "1) Set: PREV = 1" (A.2)
        let mut prev: u32 = 1;

        let s = self.bit(decoder, &mut prev);

        // Figure A.1: the value class is selected by a unary prefix, then the
        // magnitude is read with a class-specific number of bits and offset.
        #[expect(
            clippy::same_functions_in_if_condition,
            reason = "each call mutates `prev`"
        )]
        let v = if self.bit(decoder, &mut prev) == 0 {
            self.bits(decoder, &mut prev, 2)
        } else if self.bit(decoder, &mut prev) == 0 {
            self.bits(decoder, &mut prev, 4) + 4
        } else if self.bit(decoder, &mut prev) == 0 {
            self.bits(decoder, &mut prev, 6) + 20
        } else if self.bit(decoder, &mut prev) == 0 {
            self.bits(decoder, &mut prev, 8) + 84
        } else if self.bit(decoder, &mut prev) == 0 {
            self.bits(decoder, &mut prev, 12) + 340
        } else {
            self.bits(decoder, &mut prev, 32).wrapping_add(4436)
        };

        if s == 0 {
            Some(v as i32)
        } else if v > 0 {
            Some(-(v as i32))
        } else {
            None
        }
    }

    /// Decode one bit and update PREV.
    ///
    /// "After each bit is decoded: If PREV < 256 set PREV = (PREV << 1) OR D.
    /// Otherwise set PREV = (((PREV << 1) OR D) AND 511) OR 256." (A.2)
    #[inline]
    fn bit(&mut self, decoder: &mut ArithmeticDecoder<'_>, prev: &mut u32) -> u32 {
        let d = decoder.decode(&mut self.contexts[(*prev & 0x1ff) as usize]);

        if *prev < 256 {
            *prev = (*prev << 1) | d;
        } else {
            *prev = (((*prev << 1) | d) & 511) | 256;
        }

        d
    }

    fn bits(&mut self, decoder: &mut ArithmeticDecoder<'_>, prev: &mut u32, n: usize) -> u32 {
        let mut value = 0_u32;
        for _ in 0..n {
            value = (value << 1) | self.bit(decoder, prev);
        }
        value
    }
}
