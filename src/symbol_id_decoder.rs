//! The IAID symbol ID decoding procedure (A.3).

use crate::arithmetic_decoder::{ArithmeticDecoder, Context};

/// Decodes symbol IDs as fixed-length binary values, one bit per decision.
pub(crate) struct SymbolIdDecoder {
    contexts: Vec<Context>,
    /// `SYMCODELEN`, the number of bits in a symbol ID.
    code_len: u32,
}

impl SymbolIdDecoder {
    pub(crate) fn new(code_len: u32) -> Self {
        // "The number of contexts required is 2^SYMCODELEN, which is less
        // than twice the maximum symbol ID." (A.3)
        Self {
            contexts: vec![Context::default(); 1_usize << code_len],
            code_len,
        }
    }

    #[inline(always)]
    pub(crate) fn decode(&mut self, decoder: &mut ArithmeticDecoder<'_>) -> u32 {
        // "1) Set: PREV = 1. 2) Decode each bit with CX equal to
        // 'IAID + PREV'. After each bit, set PREV = (PREV << 1) OR D." (A.3)
        let mask = (1_u32 << (self.code_len + 1)) - 1;
        let mut prev = 1_u32;

        for _ in 0..self.code_len {
            let d = decoder.decode(&mut self.contexts[(prev & mask) as usize]);
            prev = (prev << 1) | d;
        }

        // "3) Set PREV = PREV - 2^SYMCODELEN."
        prev - (1 << self.code_len)
    }
}
