//! Versioned seed chain — the one-way ladder the platform walks to bind
//! secrets to firmware versions.
//!
//! A [`Seed`] is an immutable 48-byte value. Every operation returns a new
//! seed; nothing mutates in place. The chain is deliberately one-way:
//! lowering a version applies SHA-384 iterations, and no operation exists to
//! undo one. A seed recovered at version `v` can therefore never be turned
//! into the seed for a version newer than `v`.

use crate::error::SevError;
use crate::kdf::{sha384, SHA384_LEN};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Seed length in bytes (one SHA-384 digest).
pub const SEED_LEN: usize = SHA384_LEN;

/// Number of SHA-384 iterations from the freshest version down to version 0.
const MAX_VERSION: u8 = 0xff;

/// An opaque secret value at one point in the versioned one-way chain.
///
/// Zeroized on drop; `Debug` is masked.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(***)")
    }
}

impl Seed {
    /// Wrap exactly [`SEED_LEN`] bytes as a seed.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::InvalidKeyMaterialLength`] for any other length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SevError> {
        let raw: [u8; SEED_LEN] =
            bytes
                .try_into()
                .map_err(|_| SevError::InvalidKeyMaterialLength {
                    expected: SEED_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(raw))
    }

    /// Borrow the raw seed bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }

    /// Move a fresh seed down to `version` by applying `0xff - version`
    /// SHA-384 iterations.
    ///
    /// `set_version(0xff)` is the identity. Versions count down: the more
    /// iterations applied, the older the firmware version the seed stands
    /// for.
    #[must_use]
    pub fn set_version(&self, version: u8) -> Self {
        self.decrement(usize::from(MAX_VERSION.saturating_sub(version)))
    }

    /// Apply `steps` SHA-384 iterations, moving the seed toward older
    /// versions. This is the only direction the chain can move.
    #[must_use]
    pub fn decrement(&self, steps: usize) -> Self {
        let mut current = self.0;
        for _ in 0..steps {
            current = sha384(&current);
        }
        Self(current)
    }

    /// Move the chain to the next hierarchical stage:
    /// `sha384(8 zero bytes || seed)`.
    #[must_use]
    pub fn advance_stage(&self) -> Self {
        let mut input = [0u8; 8 + SEED_LEN];
        input[8..].copy_from_slice(&self.0);
        Self(sha384(&input))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn test_seed() -> Seed {
        let mut raw = [0u8; SEED_LEN];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = i as u8;
        }
        Seed::from_bytes(&raw).expect("valid length")
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let result = Seed::from_bytes(&[0u8; 47]);
        assert!(matches!(
            result,
            Err(SevError::InvalidKeyMaterialLength {
                expected: SEED_LEN,
                actual: 47
            })
        ));
    }

    #[test]
    fn set_version_max_is_identity() {
        let seed = test_seed();
        assert_eq!(seed.set_version(0xff), seed);
    }

    #[test]
    fn set_version_applies_exact_iteration_count() {
        let seed = test_seed();
        for version in [0x00u8, 0x7f, 0xfd, 0xfe] {
            let expected = seed.decrement(usize::from(0xffu8 - version));
            assert_eq!(seed.set_version(version), expected);
        }
    }

    #[test]
    fn set_version_0xfd_known_vector() {
        assert_eq!(
            test_seed().set_version(0xfd).as_bytes(),
            &hex!(
                "155a35aea9f91f3973f410645299f2eb6a3b9e4ba8496f77"
                "4e4c104953e59b207272a633dac32137ab4c43e3336eaf0e"
            )
        );
    }

    #[test]
    fn advance_stage_known_vector() {
        assert_eq!(
            test_seed().advance_stage().as_bytes(),
            &hex!(
                "6b180ef7abc019f496d28a7f7e41811ee3165d5f883791a0"
                "7adabfd2086a2d86c44e783c95e603383e7a821a0fd9bdf9"
            )
        );
    }

    #[test]
    fn advance_stage_differs_from_plain_hash() {
        // The 8-byte zero prefix separates stage advancement from version
        // decrement; the two must never collide.
        let seed = test_seed();
        assert_ne!(seed.advance_stage(), seed.decrement(1));
    }

    #[test]
    fn operations_do_not_mutate_the_input() {
        let seed = test_seed();
        let copy = seed.clone();
        let _ = seed.set_version(3);
        let _ = seed.decrement(5);
        let _ = seed.advance_stage();
        assert_eq!(seed, copy);
    }

    #[test]
    fn debug_output_is_masked() {
        assert_eq!(format!("{:?}", test_seed()), "Seed(***)");
    }
}
