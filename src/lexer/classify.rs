//! Vectorized byte classification.
//!
//! One forward pass over the padded input, one 32-byte tile at a time,
//! emitting one [`TileMasks`] record per tile. Classification is table
//! driven: each byte range is recognized by a 16-entry shuffle lookup keyed
//! by a cheap hash of the byte (a saturating subtract for the low structural
//! range, a two-bit shift for the high range, the raw low nibble for
//! everything else), followed by an equality compare with the original byte.
//!
//! The AVX2 path and the scalar fallback share the tables and the bit-level
//! post-processing, so they produce bitwise-identical masks; the fallback
//! simply emulates `pshufb` one byte at a time.

use crate::arena::MonoArena;
use crate::lexer::token::TileMasks;
use crate::source::PaddedSource;

/// Shuffle tables for one dialect configuration, built at compile time from
/// the dialect's switches. Each table holds two identical 16-byte halves so
/// it can be loaded straight into a 256-bit register.
#[derive(Clone, Copy)]
#[repr(C, align(32))]
pub struct ClassTables {
    /// Low structural range, keyed by `0x30 saturating-sub byte`:
    /// `= / . - , + * ) ( ' & % $ #` and `!`.
    pub sexpr_ops: [u8; 32],
    /// High structural range, keyed by `byte >> 2`:
    /// `@ [ ] \` `` ` `` `:` and `|`. (`^ \ < > ~` collide under this hash
    /// and are recognized by the scalar operator fallback instead.)
    pub extra_ops: [u8; 32],
    /// Whitespace, keyed by the low nibble.
    pub fragments: [u8; 32],
    /// ASCII digits, keyed by the low nibble.
    pub digits: [u8; 32],
    /// Lowercase letters `a`..`o` plus `p`.
    pub ident_low_a: [u8; 32],
    /// Lowercase letters `q`..`z`.
    pub ident_low_b: [u8; 32],
    /// Uppercase letters `A`..`O` plus `P`.
    pub ident_high_a: [u8; 32],
    /// Uppercase letters `Q`..`Z`, `_`, and `-` when the dialect allows it.
    pub ident_high_b: [u8; 32],
}

const fn duplicate(half: [u8; 16]) -> [u8; 32] {
    let mut table = [0u8; 32];
    let mut i = 0;
    while i < 16 {
        table[i] = half[i];
        table[i + 16] = half[i];
        i += 1;
    }
    table
}

const fn on(enabled: bool, byte: u8) -> u8 {
    if enabled {
        byte
    } else {
        0
    }
}

impl ClassTables {
    #[allow(clippy::too_many_arguments)]
    pub const fn build(
        hash: bool,
        comma: bool,
        brackets: bool,
        backtick: bool,
        colon: bool,
        at_sign: bool,
        dollar: bool,
        dash_in_identifiers: bool,
    ) -> ClassTables {
        ClassTables {
            sexpr_ops: duplicate([
                b'=',
                b'/',
                b'.',
                b'-',
                on(comma, b','),
                b'+',
                b'*',
                b')',
                b'(',
                b'\'',
                b'&',
                b'%',
                on(dollar, b'$'),
                on(hash, b'#'),
                0,
                b'!',
            ]),
            extra_ops: duplicate([
                on(at_sign, b'@'),
                0,
                0,
                0,
                0,
                0,
                on(brackets, b'['),
                on(brackets, b']'),
                on(backtick, b'`'),
                0,
                0,
                0,
                0,
                0,
                on(colon, b':'),
                b'|',
            ]),
            fragments: duplicate([
                b' ', 0, 0, 0, 0, 0, 0, 0, 0, b'\t', b'\n', 0, 0, b'\r', 0, 0,
            ]),
            digits: duplicate([
                b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', 0, 0, 0, 0, 0, 0,
            ]),
            ident_low_a: duplicate([
                b'p', b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l',
                b'm', b'n', b'o',
            ]),
            ident_low_b: duplicate([
                0, b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0, 0, 0, 0, 0,
            ]),
            ident_high_a: duplicate([
                b'P', b'A', b'B', b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'J', b'K', b'L',
                b'M', b'N', b'O',
            ]),
            ident_high_b: duplicate([
                0,
                b'Q',
                b'R',
                b'S',
                b'T',
                b'U',
                b'V',
                b'W',
                b'X',
                b'Y',
                b'Z',
                0,
                0,
                on(dash_in_identifiers, b'-'),
                0,
                b'_',
            ]),
        }
    }
}

const ODD_BITS: u32 = 0xAAAA_AAAA;

/// Positions of unescaped `"` bytes within one tile, considering only the
/// backslash runs visible in this tile.
///
/// Folds the backslash mask into a per-bit escape parity: a quote preceded
/// by an odd-length backslash run is escaped and cancels out of the result.
/// Cross-tile runs are handled by [`string_mask`], which adjusts the input
/// masks before calling this.
#[inline]
pub(crate) fn unescaped_quotes(backslash: u32, quotes: u32) -> u32 {
    let escape_check = backslash << 1;
    let odd_escape_check = escape_check | ODD_BITS;
    let escape_detection = odd_escape_check.wrapping_sub(backslash);
    let escape_and_non_escape = escape_detection ^ ODD_BITS;
    !(escape_and_non_escape ^ backslash) & quotes
}

/// Unescaped-quote mask for one tile, threading the odd-backslash-run carry
/// across tile boundaries.
///
/// The carry folds into the *backslash* mask, not the quote mask: when the
/// previous tile ended with an odd-length run and byte 0 continues it,
/// dropping that first backslash flips the run's parity, which is exactly
/// the effect of the odd prefix. When byte 0 is instead a quote, the odd
/// run escapes it, so it is cleared directly. The carry out is computed
/// from the adjusted mask so a run spanning the whole tile keeps its
/// accumulated parity.
#[inline]
pub(crate) fn string_mask(mut backslash: u32, mut quotes: u32, carry: &mut u32) -> u32 {
    if *carry != 0 {
        if backslash & 1 != 0 {
            backslash &= !1;
        } else {
            quotes &= !1;
        }
    }
    *carry = backslash.leading_ones() & 1;
    unescaped_quotes(backslash, quotes)
}

/// Scalar emulation of a 16-entry `pshufb` lookup: indices with the high
/// bit set select zero, otherwise the low nibble selects a table entry.
#[inline]
fn shuffle16(table: &[u8; 32], index: u8) -> u8 {
    if index & 0x80 != 0 {
        0
    } else {
        table[(index & 0x0F) as usize]
    }
}

fn classify_tile_scalar(bytes: &[u8], tables: &ClassTables, carry: &mut u32) -> TileMasks {
    let mut quotes_raw = 0u32;
    let mut backslash = 0u32;
    let mut structural = 0u32;
    let mut digit = 0u32;
    let mut ident = 0u32;
    let mut fragment = 0u32;
    let mut newline = 0u32;

    for (i, &b) in bytes.iter().enumerate().take(32) {
        let bit = 1u32 << i;
        if b == b'"' {
            quotes_raw |= bit;
        }
        if b == b'\\' {
            backslash |= bit;
        }
        if shuffle16(&tables.sexpr_ops, 0x30u8.saturating_sub(b)) == b
            || shuffle16(&tables.extra_ops, b >> 2) == b
        {
            structural |= bit;
        }
        let is_digit = shuffle16(&tables.digits, b) == b;
        if is_digit {
            digit |= bit;
        }
        if is_digit
            || shuffle16(&tables.ident_low_a, b) == b
            || shuffle16(&tables.ident_low_b, b) == b
            || shuffle16(&tables.ident_high_a, b) == b
            || shuffle16(&tables.ident_high_b, b) == b
        {
            ident |= bit;
        }
        if shuffle16(&tables.fragments, b) == b {
            fragment |= bit;
        }
        if b == b'\n' {
            newline |= bit;
        }
    }

    let string = string_mask(backslash, quotes_raw, carry);
    TileMasks {
        fragment,
        structural,
        digit,
        string,
        newline,
        ident,
    }
}

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::{string_mask, ClassTables};
    use crate::lexer::token::TileMasks;
    use core::arch::x86_64::*;

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn table(bytes: &[u8; 32]) -> __m256i {
        _mm256_loadu_si256(bytes.as_ptr().cast())
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn eq_mask(a: __m256i, b: __m256i) -> u32 {
        _mm256_movemask_epi8(_mm256_cmpeq_epi8(a, b)) as u32
    }

    /// Per-byte logical right shift by two. AVX2 has no 8-bit shift, so the
    /// even and odd bytes are shifted in 16-bit lanes and re-merged.
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn right_shift8_by2(v: __m256i) -> __m256i {
        let even = _mm256_and_si256(v, _mm256_set1_epi16(0x00FF));
        let odd = _mm256_srli_epi16(v, 8);
        let shifted_even = _mm256_srli_epi16(even, 2);
        let shifted_odd = _mm256_srli_epi16(odd, 2);
        _mm256_or_si256(shifted_even, _mm256_slli_epi16(shifted_odd, 8))
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn classify_tile(
        chunk: *const u8,
        tables: &ClassTables,
        carry: &mut u32,
    ) -> TileMasks {
        let bytes = _mm256_loadu_si256(chunk.cast());

        // String delimiters and escapes.
        let quotes_raw = eq_mask(bytes, _mm256_set1_epi8(b'"' as i8));
        let backslash = eq_mask(bytes, _mm256_set1_epi8(b'\\' as i8));

        // Low structural range.
        let hashed_low = _mm256_subs_epu8(_mm256_set1_epi8(0x30), bytes);
        let looked_low = _mm256_shuffle_epi8(table(&tables.sexpr_ops), hashed_low);
        let mut structural = eq_mask(looked_low, bytes);

        // High structural range.
        let hashed_high = right_shift8_by2(bytes);
        let looked_high = _mm256_shuffle_epi8(table(&tables.extra_ops), hashed_high);
        structural |= eq_mask(looked_high, bytes);

        // Digits.
        let looked_digits = _mm256_shuffle_epi8(table(&tables.digits), bytes);
        let digits_eq = _mm256_cmpeq_epi8(looked_digits, bytes);
        let digit = _mm256_movemask_epi8(digits_eq) as u32;

        // Identifiers: four letter lookups, OR-ed with digits. The lexer
        // matches digits before identifiers, which resolves the overlap.
        let low_a = _mm256_cmpeq_epi8(_mm256_shuffle_epi8(table(&tables.ident_low_a), bytes), bytes);
        let low_b = _mm256_cmpeq_epi8(_mm256_shuffle_epi8(table(&tables.ident_low_b), bytes), bytes);
        let high_a =
            _mm256_cmpeq_epi8(_mm256_shuffle_epi8(table(&tables.ident_high_a), bytes), bytes);
        let high_b =
            _mm256_cmpeq_epi8(_mm256_shuffle_epi8(table(&tables.ident_high_b), bytes), bytes);
        let letters = _mm256_or_si256(
            _mm256_or_si256(high_a, high_b),
            _mm256_or_si256(low_a, low_b),
        );
        let ident = _mm256_movemask_epi8(_mm256_or_si256(digits_eq, letters)) as u32;

        // Whitespace and newlines.
        let looked_frag = _mm256_shuffle_epi8(table(&tables.fragments), bytes);
        let fragment = eq_mask(looked_frag, bytes);
        let newline = eq_mask(bytes, _mm256_set1_epi8(b'\n' as i8));

        let string = string_mask(backslash, quotes_raw, carry);
        TileMasks {
            fragment,
            structural,
            digit,
            string,
            newline,
            ident,
        }
    }
}

/// The tile appended after the last input tile. Its sole newline bit lets
/// comment scanning terminate in the padding without a bounds check.
pub(crate) fn sentinel_tile() -> TileMasks {
    TileMasks {
        newline: 1,
        ..TileMasks::default()
    }
}

/// Classifies the whole padded buffer into `tiles`, one record per full
/// 32-byte tile, followed by the sentinel tile.
pub(crate) fn classify(source: &PaddedSource, tables: &ClassTables, tiles: &mut MonoArena<TileMasks>) {
    let text = source.padded();
    let mut carry = 0u32;

    #[cfg(target_arch = "x86_64")]
    if std::arch::is_x86_feature_detected!("avx2") {
        for chunk in text.chunks_exact(32) {
            // SAFETY: AVX2 support was just detected; `chunk` is 32 readable
            // bytes.
            let masks = unsafe { avx2::classify_tile(chunk.as_ptr(), tables, &mut carry) };
            tiles.push(masks);
        }
        tiles.push(sentinel_tile());
        return;
    }

    for chunk in text.chunks_exact(32) {
        tiles.push(classify_tile_scalar(chunk, tables, &mut carry));
    }
    tiles.push(sentinel_tile());
}
