//! Hash and KDF primitives.
//!
//! This module provides:
//! - [`sha384`] / [`sha256`] — plain digest wrappers returning fixed arrays
//! - [`counter_mode_kdf`] — NIST SP 800-108 KDF in counter mode
//!
//! # Counter-mode KDF
//!
//! The platform's KDF deviates from the SP 800-108 reference encoding: the
//! 4-byte block counter and the 4-byte output-bit-length are **little-endian**
//! (the standard writes them big-endian). Block `i` (1-indexed) MACs
//!
//! ```text
//! ctr_le(4) || label || 0x00 || output_bits_le(4)
//! ```
//!
//! with HMAC-SHA-256 as the PRF and an empty context. Blocks are concatenated
//! and truncated to the requested length.

use crate::error::SevError;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384};

/// SHA-384 digest length in bytes.
pub const SHA384_LEN: usize = 48;

/// SHA-256 digest length in bytes.
pub const SHA256_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Compute the SHA-384 digest of `data`.
#[must_use]
pub fn sha384(data: &[u8]) -> [u8; SHA384_LEN] {
    Sha384::digest(data).into()
}

/// Compute the SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    Sha256::digest(data).into()
}

/// SP 800-108 counter-mode KDF with HMAC-SHA-256 as the PRF.
///
/// Deterministic for identical inputs. Output of length `n` is a prefix of
/// the output of length `n + k` as long as both fall in the same 32-byte
/// block count or the shorter one ends on a block boundary.
///
/// # Errors
///
/// Returns [`SevError::InvalidKeyMaterialLength`] if `output_len` in bits
/// does not fit a 4-byte length field, and [`SevError::KeyDerivation`] if
/// the PRF rejects the key.
pub fn counter_mode_kdf(
    key: &[u8],
    label: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, SevError> {
    let output_bits = output_len
        .checked_mul(8)
        .and_then(|bits| u32::try_from(bits).ok())
        .ok_or(SevError::InvalidKeyMaterialLength {
            expected: (u32::MAX as usize) / 8,
            actual: output_len,
        })?;

    let block_count = output_len.div_ceil(SHA256_LEN);
    let mut output = Vec::with_capacity(block_count.saturating_mul(SHA256_LEN));

    for block in 1..=block_count {
        let counter = u32::try_from(block).map_err(|_| SevError::InvalidKeyMaterialLength {
            expected: (u32::MAX as usize) / 8,
            actual: output_len,
        })?;

        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| SevError::KeyDerivation(format!("HMAC-SHA-256 rejected the key: {e}")))?;
        mac.update(&counter.to_le_bytes());
        mac.update(label);
        mac.update(&[0x00]);
        mac.update(&output_bits.to_le_bytes());
        output.extend_from_slice(&mac.finalize().into_bytes());
    }

    output.truncate(output_len);
    Ok(output)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
