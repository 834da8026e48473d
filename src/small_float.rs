//! The `SmallFloat` size-class codec.
//!
//! Every 32-bit size is quantized onto one of 256 logarithmic bin indices
//! using a tiny floating-point-like encoding: 5 exponent bits, 3 mantissa
//! bits, composed as `(exponent << MANTISSA_BITS) + mantissa` (or `|` for
//! the round-down variant — see [`round_down`]). This keeps per-size-class
//! fragmentation bounded (worst case ~12.5% with 3 mantissa bits) while
//! staying small enough for a two-level bitmap scan.

/// Number of mantissa bits in the `SmallFloat` encoding.
pub const MANTISSA_BITS: u32 = 3;
const MANTISSA_VALUE: u32 = 1 << MANTISSA_BITS;
const MANTISSA_MASK: u32 = MANTISSA_VALUE - 1;

/// Smallest bin index whose decoded size is `>= size`.
///
/// Used when choosing a free block to satisfy an allocation: the block must
/// be at least as large as requested.
#[must_use]
pub fn round_up(size: u32) -> u32 {
    if size < MANTISSA_VALUE {
        return size;
    }

    let highest_set_bit = 31 - size.leading_zeros();
    let mantissa_start_bit = highest_set_bit - MANTISSA_BITS;
    let exp = mantissa_start_bit + 1;
    let mut mantissa = (size >> mantissa_start_bit) & MANTISSA_MASK;

    let low_bits_mask = (1 << mantissa_start_bit) - 1;
    if size & low_bits_mask != 0 {
        mantissa += 1;
    }

    // `+` rather than `|`: lets a mantissa overflow (from the round-up
    // correction above) carry into the exponent field.
    (exp << MANTISSA_BITS) + mantissa
}

/// Largest bin index whose decoded size is `<= size`.
///
/// Used when inserting a free block into the index: a block of size `n`
/// belongs in the bin that can never overstate its true extent.
#[must_use]
pub fn round_down(size: u32) -> u32 {
    if size < MANTISSA_VALUE {
        return size;
    }

    let highest_set_bit = 31 - size.leading_zeros();
    let mantissa_start_bit = highest_set_bit - MANTISSA_BITS;
    let exp = mantissa_start_bit + 1;
    let mantissa = (size >> mantissa_start_bit) & MANTISSA_MASK;

    (exp << MANTISSA_BITS) | mantissa
}

/// Decode a bin index back to the size it represents.
#[must_use]
pub fn decode(bin_index: u32) -> u32 {
    let exponent = bin_index >> MANTISSA_BITS;
    let mantissa = bin_index & MANTISSA_MASK;
    if exponent == 0 {
        mantissa
    } else {
        (mantissa | MANTISSA_VALUE) << (exponent - 1)
    }
}
