//! Key derivation pipeline — reproduces the endorsement keys the security
//! processor derives on-die, from secret material recovered off-die.
//!
//! This module provides:
//! - [`derive_ecdsa_key`] — FIPS 186-4 B.4.1 "extra random bits" key generation
//! - [`derive_vcek`] — the five-stage versioned chip-endorsement-key pipeline
//! - [`derive_cek`] / [`derive_fuse_id`] — chip-endorsement key and identifier
//!   from the 256 secret fuse bits
//!
//! # Not constant-time, on purpose
//!
//! The scalar reduction in [`derive_ecdsa_key`] leaks timing information and
//! must never be used to derive confidential production keys. That is an
//! intentional simplification: the input here is an already-extracted secret,
//! and the output exists only to be compared against published certificates.

use crate::error::SevError;
use crate::kdf::{counter_mode_kdf, sha256, sha384};
use crate::seed::{Seed, SEED_LEN};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use p384::ecdsa::signature::Signer;
use p384::ecdsa::{DerSignature, SigningKey, VerifyingKey};
use p384::elliptic_curve::bigint::{Encoding, NonZero, U448};
use p384::elliptic_curve::Curve;
use p384::{NistP384, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Required input length for the extra-random-bits method:
/// P-384 group order bit length (384) + 64 extra bits.
pub const RANDOM_BITS_LEN: usize = 56;

/// KDF label for the versioned chip endorsement key.
pub const VCEK_LABEL: &[u8] = b"sev-versioned-chip-endorsement-key";

/// KDF label for the chip endorsement key.
pub const CEK_LABEL: &[u8] = b"sev-chip-endorsement-key";

/// Secret fuse buffer length in bytes (256 fuse bits).
pub const FUSE_LEN: usize = 32;

/// Fuse-derived identifier length: two 32-byte secp256k1 coordinates.
pub const FUSE_ID_LEN: usize = 64;

/// Recovered seed blob length: bootloader seed followed by TEE seed.
pub const SEED_PAIR_LEN: usize = 2 * SEED_LEN;

/// Number of fixed reserved sub-stages between the TEE and SNP stages.
const RESERVED_STAGES: usize = 4;

/// P-384 coordinate and scalar width.
const P384_SCALAR_LEN: usize = 48;

/// Offset of the 48-byte scalar inside the 56-byte big-endian working width.
const SCALAR_OFFSET: usize = RANDOM_BITS_LEN - P384_SCALAR_LEN;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Target firmware version coordinates for a VCEK derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcekVersions {
    /// Bootloader security patch level.
    pub bl: u8,
    /// TEE security patch level.
    pub tee: u8,
    /// SNP firmware security patch level.
    pub snp: u8,
    /// Microcode security patch level.
    pub ucode: u8,
}

impl VcekVersions {
    /// The hex resource key the vendor uses for this version combination:
    /// two lowercase hex digits per coordinate, `bl tee snp ucode` order.
    #[must_use]
    pub fn hex_key(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            self.bl, self.tee, self.snp, self.ucode
        )
    }
}

/// The secret material recovered from a glitched bootloader at one known
/// version: the bootloader-stage seed and the TEE-stage seed derived from it.
#[derive(Debug)]
pub struct RecoveredSeeds {
    bl: Seed,
    tee: Seed,
}

impl RecoveredSeeds {
    /// Split a `0x60`-byte dump into bootloader and TEE seeds.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::InvalidKeyMaterialLength`] if the blob is not
    /// exactly [`SEED_PAIR_LEN`] bytes.
    pub fn from_bytes(blob: &[u8]) -> Result<Self, SevError> {
        if blob.len() != SEED_PAIR_LEN {
            return Err(SevError::InvalidKeyMaterialLength {
                expected: SEED_PAIR_LEN,
                actual: blob.len(),
            });
        }
        Ok(Self {
            bl: Seed::from_bytes(&blob[..SEED_LEN])?,
            tee: Seed::from_bytes(&blob[SEED_LEN..])?,
        })
    }

    /// Build the pair from two already-split seeds.
    #[must_use]
    pub const fn new(bl: Seed, tee: Seed) -> Self {
        Self { bl, tee }
    }
}

/// A derived P-384 key pair: private scalar plus public curve point.
///
/// `Debug` is masked; the private scalar is only reachable through the
/// little-endian hex accessor used for the platform-convention dump format.
pub struct EcKeyPair {
    secret: SecretKey,
    public: VerifyingKey,
}

impl std::fmt::Debug for EcKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EcKeyPair(***)")
    }
}

impl EcKeyPair {
    /// The public half, usable with the trust-chain verifier.
    #[must_use]
    pub const fn public_key(&self) -> &VerifyingKey {
        &self.public
    }

    /// Sign `message` with ECDSA over SHA-384, returning a DER signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signer = SigningKey::from(&self.secret);
        let signature: DerSignature = signer.sign(message);
        signature.as_bytes().to_vec()
    }

    /// Private scalar as fixed-width little-endian hex (platform dump
    /// convention).
    #[must_use]
    pub fn private_scalar_le_hex(&self) -> String {
        let bytes = Zeroizing::new(self.secret.to_bytes());
        le_hex(bytes.as_slice())
    }

    /// Public X coordinate as fixed-width little-endian hex.
    #[must_use]
    pub fn public_x_le_hex(&self) -> String {
        let point = self.public.to_encoded_point(false);
        point.x().map_or_else(String::new, |x| le_hex(x.as_slice()))
    }

    /// Public Y coordinate as fixed-width little-endian hex.
    #[must_use]
    pub fn public_y_le_hex(&self) -> String {
        let point = self.public.to_encoded_point(false);
        point.y().map_or_else(String::new, |y| le_hex(y.as_slice()))
    }
}

/// Render big-endian bytes as little-endian hex.
fn le_hex(be: &[u8]) -> String {
    let mut reversed = be.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

// ---------------------------------------------------------------------------
// FIPS 186-4 B.4.1 "extra random bits"
// ---------------------------------------------------------------------------

/// Derive a P-384 ECDSA key pair from 448 bits of key material using the
/// FIPS 186-4 Appendix B.4.1 "extra random bits" method.
///
/// The input is read as a **little-endian** integer `c` (matching the
/// platform, which does not use the standard's big-endian convention), and
/// the private scalar is `d = (c mod (n - 1)) + 1` for the P-384 group
/// order `n`. The public point is `d * G`.
///
/// # Errors
///
/// Returns [`SevError::InvalidKeyMaterialLength`] unless `random_bits` is
/// exactly [`RANDOM_BITS_LEN`] bytes, and [`SevError::KeyDerivation`] if
/// the reduced scalar is rejected by the curve backend.
pub fn derive_ecdsa_key(random_bits: &[u8]) -> Result<EcKeyPair, SevError> {
    if random_bits.len() != RANDOM_BITS_LEN {
        return Err(SevError::InvalidKeyMaterialLength {
            expected: RANDOM_BITS_LEN,
            actual: random_bits.len(),
        });
    }

    let c = U448::from_le_slice(random_bits);

    // Widen the 384-bit group order to the 448-bit working width.
    let order_be = <NistP384 as Curve>::ORDER.to_be_bytes();
    let mut wide = [0u8; RANDOM_BITS_LEN];
    wide[8..].copy_from_slice(&order_be);
    let order = U448::from_be_slice(&wide);

    let order_minus_one = Option::from(NonZero::new(order.wrapping_sub(&U448::ONE)))
        .ok_or_else(|| SevError::KeyDerivation("curve order underflow".into()))?;

    // d = (c mod (n - 1)) + 1, so d is in [1, n - 1]. Not constant-time.
    let d = c.rem(&order_minus_one).wrapping_add(&U448::ONE);

    let d_be = Zeroizing::new(d.to_be_bytes());
    let scalar = &d_be[SCALAR_OFFSET..];
    let secret = SecretKey::from_slice(scalar)
        .map_err(|e| SevError::KeyDerivation(format!("reduced scalar rejected: {e}")))?;
    let public = *SigningKey::from(&secret).verifying_key();

    Ok(EcKeyPair { secret, public })
}

// ---------------------------------------------------------------------------
// VCEK pipeline
// ---------------------------------------------------------------------------

/// Derive the versioned chip endorsement key for `target` from seeds
/// recovered at `known_version`.
///
/// The chain runs through exactly five stages in fixed order: bootloader,
/// TEE, four reserved sub-stages (each pinned to version 0), SNP, and
/// microcode. Each stage lowers its seed to the target version and advances
/// to the next stage; the final seed is hashed once more, expanded through
/// the counter-mode KDF with [`VCEK_LABEL`], and turned into a key pair.
///
/// # Errors
///
/// Returns [`SevError::KeyDerivation`] if `target.bl` is newer than
/// `known_version` — the chain is one-way and cannot move a seed to a newer
/// bootloader version.
pub fn derive_vcek(
    seeds: &RecoveredSeeds,
    known_version: u8,
    target: VcekVersions,
) -> Result<EcKeyPair, SevError> {
    if target.bl > known_version {
        return Err(SevError::KeyDerivation(format!(
            "cannot derive bootloader version {:#04x} from a seed recovered at {known_version:#04x}: \
             the seed chain only moves toward older versions",
            target.bl
        )));
    }

    let tee_stage = if target.bl == known_version {
        seeds.tee.clone()
    } else {
        // One decrement step is consumed by the stage advance itself.
        let steps = usize::from(known_version)
            .saturating_sub(1)
            .saturating_sub(usize::from(target.bl));
        seeds.bl.decrement(steps).advance_stage()
    };

    let mut seed = tee_stage.set_version(target.tee).advance_stage();
    for _ in 0..RESERVED_STAGES {
        seed = seed.set_version(0).advance_stage();
    }
    seed = seed.set_version(target.snp).advance_stage();
    seed = seed.set_version(target.ucode);

    key_from_seed(&seed, VCEK_LABEL)
}

/// Hash a final-stage seed and expand it into an ECDSA key pair.
fn key_from_seed(seed: &Seed, label: &[u8]) -> Result<EcKeyPair, SevError> {
    let digest = Zeroizing::new(sha384(seed.as_bytes()));
    let random_bits = Zeroizing::new(counter_mode_kdf(&*digest, label, RANDOM_BITS_LEN)?);
    derive_ecdsa_key(&random_bits)
}

// ---------------------------------------------------------------------------
// CEK and fuse identifier
// ---------------------------------------------------------------------------

/// Derive the chip endorsement key from the 32 secret fuse bytes:
/// SHA-256 of the fuses, expanded through the counter-mode KDF with
/// [`CEK_LABEL`], then the extra-random-bits method.
///
/// # Errors
///
/// Returns [`SevError::InvalidKeyMaterialLength`] unless `secret_fuses` is
/// exactly [`FUSE_LEN`] bytes.
pub fn derive_cek(secret_fuses: &[u8]) -> Result<EcKeyPair, SevError> {
    if secret_fuses.len() != FUSE_LEN {
        return Err(SevError::InvalidKeyMaterialLength {
            expected: FUSE_LEN,
            actual: secret_fuses.len(),
        });
    }
    let digest = Zeroizing::new(sha256(secret_fuses));
    let random_bits = Zeroizing::new(counter_mode_kdf(&*digest, CEK_LABEL, RANDOM_BITS_LEN)?);
    derive_ecdsa_key(&random_bits)
}

/// Derive the public chip identifier from the secret fuses.
///
/// The fuses are the private key: read as a **big-endian** secp256k1 scalar
/// `d`, the identifier is the concatenation of the big-endian X and Y
/// coordinates of `d * G` (32 bytes each).
///
/// # Errors
///
/// Returns [`SevError::InvalidKeyMaterialLength`] for a wrong fuse length
/// and [`SevError::KeyDerivation`] if the fuse value is zero or not below
/// the secp256k1 group order.
pub fn derive_fuse_id(secret_fuses: &[u8]) -> Result<[u8; FUSE_ID_LEN], SevError> {
    if secret_fuses.len() != FUSE_LEN {
        return Err(SevError::InvalidKeyMaterialLength {
            expected: FUSE_LEN,
            actual: secret_fuses.len(),
        });
    }

    let secret = k256::SecretKey::from_slice(secret_fuses)
        .map_err(|e| SevError::KeyDerivation(format!("fuse value is not a valid scalar: {e}")))?;
    let point = secret.public_key().to_encoded_point(false);

    let mut id = [0u8; FUSE_ID_LEN];
    let x = point
        .x()
        .ok_or_else(|| SevError::KeyDerivation("fuse public point is the identity".into()))?;
    let y = point
        .y()
        .ok_or_else(|| SevError::KeyDerivation("fuse public point is the identity".into()))?;
    id[..FUSE_LEN].copy_from_slice(x);
    id[FUSE_LEN..].copy_from_slice(y);
    Ok(id)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
