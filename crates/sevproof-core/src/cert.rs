//! Binary certificate codec — vendor RSA records and the two EC encodings.
//!
//! This module provides:
//! - [`RsaCertRecord`] — the fixed-layout vendor RSA certificate record
//! - [`CekCertRecord`] — the raw fixed-offset chip-endorsement-key record
//! - [`VcekCertRecord`] — the DER X.509 wrapped versioned endorsement key
//! - [`EcCertificate`] — the uniform capability both EC encodings expose
//!
//! # RSA record layout (all header integers little-endian)
//!
//! ```text
//! 0x00  version        (u32, must be 1)
//! 0x04  key id         (16 bytes)
//! 0x14  certifying id  (16 bytes, equals key id iff self-signed root)
//! 0x24  key usage      (u32: 0 = root, 0x13 = signing key)
//! 0x28  reserved       (16 bytes)
//! 0x38  pubexp bits    (u32, 2048 or 4096)
//! 0x3c  modulus bits   (u32, 2048 or 4096)
//! 0x40  pubexp         (pubexp_bits/8 bytes LE, must equal 0x10001)
//!       modulus        (modulus_bits/8 bytes LE)
//!       [signature]    (modulus_bits/8 bytes, present iff the buffer is
//!                       long enough; stored LE, reinterpreted big-endian)
//! ```
//!
//! Records are concatenated in certificate files; parsing restricts each
//! record to its own byte span so the next record starts at [`RsaCertRecord::size`].

use crate::error::SevError;
use der::{Decode, Encode};
use p384::ecdsa::VerifyingKey;
use p384::elliptic_curve::generic_array::GenericArray;
use p384::EncodedPoint;
use rsa::{BigUint, RsaPublicKey};
use x509_cert::Certificate;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// RSA record header length in bytes.
pub const RSA_HEADER_LEN: usize = 0x40;

/// Fixed public exponent of every vendor RSA key.
pub const RSA_PUBLIC_EXPONENT: u32 = 0x0001_0001;

/// Total size of a raw CEK certificate record in bytes.
pub const CEK_RECORD_LEN: usize = 0x61c;

/// Byte range of the little-endian X coordinate field in a raw CEK record
/// (48-byte value padded to 0x48 bytes).
const CEK_X_RANGE: core::ops::Range<usize> = 0x14..0x5c;

/// Byte range of the little-endian Y coordinate field in a raw CEK record.
const CEK_Y_RANGE: core::ops::Range<usize> = 0x5c..0xa4;

/// End of the signed region of a raw CEK record.
const CEK_SIGNED_END: usize = 0x414;

/// Byte range of the little-endian signature field (4096-bit RSA).
const CEK_SIG_RANGE: core::ops::Range<usize> = 0x41c..0x61c;

/// P-384 coordinate width in bytes.
const P384_COORD_LEN: usize = 48;

// ---------------------------------------------------------------------------
// Key usage
// ---------------------------------------------------------------------------

/// Role a vendor RSA key plays in the chain of trust.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyUsage {
    /// Self-signed root key (wire value 0).
    Root,
    /// Endorsement signing key, certified by the root (wire value 0x13).
    Signing,
}

impl KeyUsage {
    fn from_wire(value: u32) -> Result<Self, SevError> {
        match value {
            0 => Ok(Self::Root),
            0x13 => Ok(Self::Signing),
            other => Err(SevError::MalformedCertificate(format!(
                "key usage {other:#x} is neither root (0) nor signing key (0x13)"
            ))),
        }
    }

    const fn to_wire(self) -> u32 {
        match self {
            Self::Root => 0,
            Self::Signing => 0x13,
        }
    }
}

// ---------------------------------------------------------------------------
// RSA certificate record
// ---------------------------------------------------------------------------

/// A parsed vendor RSA certificate record.
///
/// The modulus is kept in its on-wire little-endian order; the trailing
/// signature (when present) is stored big-endian, ready for verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaCertRecord {
    key_id: [u8; 16],
    certifying_id: [u8; 16],
    usage: KeyUsage,
    pubexp_bits: u32,
    modulus_bits: u32,
    modulus_le: Vec<u8>,
    signature: Option<Vec<u8>>,
}

impl RsaCertRecord {
    /// Parse one record from the front of `buf`.
    ///
    /// `buf` may extend past the record (concatenated files); the record is
    /// restricted to its own span and [`Self::size`] gives the offset of the
    /// next record. A trailing signature is present iff the buffer holds at
    /// least `modulus_bits / 8` bytes beyond the public key fields.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::MalformedCertificate`] for a short buffer, a
    /// version other than 1, an unknown key usage, a root record whose
    /// certifying id differs from its key id, or a public exponent other
    /// than 0x10001. Returns [`SevError::UnsupportedKeySize`] when either
    /// declared bit length is not 2048 or 4096.
    pub fn parse(buf: &[u8]) -> Result<Self, SevError> {
        if buf.len() < RSA_HEADER_LEN {
            return Err(SevError::MalformedCertificate(format!(
                "buffer too short for record header: {} bytes (minimum {RSA_HEADER_LEN})",
                buf.len()
            )));
        }

        let version = read_u32_le(buf, 0x00);
        if version != 1 {
            return Err(SevError::MalformedCertificate(format!(
                "unsupported record version {version} (expected 1)"
            )));
        }

        let mut key_id = [0u8; 16];
        key_id.copy_from_slice(&buf[0x04..0x14]);
        let mut certifying_id = [0u8; 16];
        certifying_id.copy_from_slice(&buf[0x14..0x24]);

        let usage = KeyUsage::from_wire(read_u32_le(buf, 0x24))?;
        if usage == KeyUsage::Root && key_id != certifying_id {
            return Err(SevError::MalformedCertificate(
                "root key record must be self-referencing (key id == certifying id)".into(),
            ));
        }

        let pubexp_bits = read_u32_le(buf, 0x38);
        let modulus_bits = read_u32_le(buf, 0x3c);
        let pubexp_len = field_len(pubexp_bits)?;
        let modulus_len = field_len(modulus_bits)?;

        let modulus_start = RSA_HEADER_LEN
            .checked_add(pubexp_len)
            .ok_or_else(|| SevError::MalformedCertificate("field length overflow".into()))?;
        let signature_start = modulus_start
            .checked_add(modulus_len)
            .ok_or_else(|| SevError::MalformedCertificate("field length overflow".into()))?;

        if buf.len() < signature_start {
            return Err(SevError::MalformedCertificate(format!(
                "buffer too short for public key: {} bytes (need {signature_start})",
                buf.len()
            )));
        }

        let pubexp_le = &buf[RSA_HEADER_LEN..modulus_start];
        if BigUint::from_bytes_le(pubexp_le) != BigUint::from(RSA_PUBLIC_EXPONENT) {
            return Err(SevError::MalformedCertificate(format!(
                "public exponent must be {RSA_PUBLIC_EXPONENT:#x}"
            )));
        }

        let modulus_le = buf[modulus_start..signature_start].to_vec();

        let record_end = signature_start
            .checked_add(modulus_len)
            .ok_or_else(|| SevError::MalformedCertificate("field length overflow".into()))?;
        let signature = if buf.len() < record_end {
            None
        } else {
            // Stored as a little-endian integer; verification wants big-endian.
            let mut sig = buf[signature_start..record_end].to_vec();
            sig.reverse();
            Some(sig)
        };

        Ok(Self {
            key_id,
            certifying_id,
            usage,
            pubexp_bits,
            modulus_bits,
            modulus_le,
            signature,
        })
    }

    /// Serialize the record back to its on-wire layout.
    ///
    /// `parse(r.to_bytes())` reproduces `r` exactly; reserved header bytes
    /// are written as zero.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signed_bytes();
        if let Some(sig) = &self.signature {
            let mut le = sig.clone();
            le.reverse();
            out.extend_from_slice(&le);
        }
        out
    }

    /// The byte region covered by this record's signature: header plus
    /// public key fields.
    #[must_use]
    pub fn signed_bytes(&self) -> Vec<u8> {
        let pubexp_len = (self.pubexp_bits as usize) / 8;
        let mut out = Vec::with_capacity(self.size());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&self.key_id);
        out.extend_from_slice(&self.certifying_id);
        out.extend_from_slice(&self.usage.to_wire().to_le_bytes());
        out.extend_from_slice(&[0u8; 0x10]);
        out.extend_from_slice(&self.pubexp_bits.to_le_bytes());
        out.extend_from_slice(&self.modulus_bits.to_le_bytes());

        let mut pubexp = RSA_PUBLIC_EXPONENT.to_le_bytes().to_vec();
        pubexp.resize(pubexp_len, 0);
        out.extend_from_slice(&pubexp);
        out.extend_from_slice(&self.modulus_le);
        out
    }

    /// Total record size in bytes, including the signature when present.
    #[must_use]
    pub fn size(&self) -> usize {
        let modulus_len = (self.modulus_bits as usize) / 8;
        let pubexp_len = (self.pubexp_bits as usize) / 8;
        let body = RSA_HEADER_LEN
            .saturating_add(pubexp_len)
            .saturating_add(modulus_len);
        if self.signature.is_some() {
            body.saturating_add(modulus_len)
        } else {
            body
        }
    }

    /// 16-byte identifier of the key this record certifies.
    #[must_use]
    pub const fn key_id(&self) -> &[u8; 16] {
        &self.key_id
    }

    /// 16-byte identifier of the key that signed this record.
    #[must_use]
    pub const fn certifying_id(&self) -> &[u8; 16] {
        &self.certifying_id
    }

    /// Role of this key in the chain.
    #[must_use]
    pub const fn usage(&self) -> KeyUsage {
        self.usage
    }

    /// Whether this record is a self-referencing root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.usage == KeyUsage::Root
    }

    /// Declared modulus size in bits.
    #[must_use]
    pub const fn modulus_bits(&self) -> u32 {
        self.modulus_bits
    }

    /// Big-endian trailing signature, if the record carries one.
    #[must_use]
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Construct the RSA public key this record describes.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::MalformedCertificate`] if the modulus is rejected
    /// by the RSA backend (e.g. even modulus).
    pub fn public_key(&self) -> Result<RsaPublicKey, SevError> {
        RsaPublicKey::new(
            BigUint::from_bytes_le(&self.modulus_le),
            BigUint::from(RSA_PUBLIC_EXPONENT),
        )
        .map_err(|e| SevError::MalformedCertificate(format!("invalid RSA modulus: {e}")))
    }
}

/// Validate a declared bit length and convert it to bytes.
fn field_len(bits: u32) -> Result<usize, SevError> {
    match bits {
        2048 | 4096 => Ok((bits as usize) / 8),
        other => Err(SevError::UnsupportedKeySize(other)),
    }
}

/// Read a little-endian u32 at `offset`. Caller guarantees bounds.
fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset.saturating_add(4)]);
    u32::from_le_bytes(raw)
}

// ---------------------------------------------------------------------------
// EC certificate capability
// ---------------------------------------------------------------------------

/// Uniform view over the two EC certificate encodings: a P-384 public key,
/// the byte region its issuer signed, and the issuer's signature.
pub trait EcCertificate {
    /// The P-384 public key the certificate endorses.
    fn public_key(&self) -> &VerifyingKey;
    /// The byte region covered by the issuer's signature.
    fn signed_bytes(&self) -> &[u8];
    /// The issuer's signature, big-endian, ready for RSA-PSS verification.
    fn signature_bytes(&self) -> &[u8];
}

// ---------------------------------------------------------------------------
// Raw CEK record
// ---------------------------------------------------------------------------

/// The raw fixed-offset chip-endorsement-key certificate record.
///
/// Coordinates live in 0x48-byte little-endian fields (the 48-byte P-384
/// value plus zero padding); the trailing 4096-bit signature is stored as a
/// little-endian integer and reversed on parse.
#[derive(Clone, Debug)]
pub struct CekCertRecord {
    public_key: VerifyingKey,
    signed_bytes: Vec<u8>,
    signature: Vec<u8>,
}

impl CekCertRecord {
    /// Parse a raw CEK record.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::MalformedCertificate`] if the buffer is not
    /// exactly [`CEK_RECORD_LEN`] bytes or the embedded coordinates do not
    /// form a point on P-384.
    pub fn parse(buf: &[u8]) -> Result<Self, SevError> {
        if buf.len() != CEK_RECORD_LEN {
            return Err(SevError::MalformedCertificate(format!(
                "CEK record must be {CEK_RECORD_LEN:#x} bytes, got {:#x}",
                buf.len()
            )));
        }

        let x = coordinate_from_le_field(&buf[CEK_X_RANGE])?;
        let y = coordinate_from_le_field(&buf[CEK_Y_RANGE])?;

        let point = EncodedPoint::from_affine_coordinates(
            GenericArray::from_slice(&x),
            GenericArray::from_slice(&y),
            false,
        );
        let public_key = VerifyingKey::from_encoded_point(&point).map_err(|e| {
            SevError::MalformedCertificate(format!("coordinates are not on P-384: {e}"))
        })?;

        let mut signature = buf[CEK_SIG_RANGE].to_vec();
        signature.reverse();

        Ok(Self {
            public_key,
            signed_bytes: buf[..CEK_SIGNED_END].to_vec(),
            signature,
        })
    }
}

impl EcCertificate for CekCertRecord {
    fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    fn signed_bytes(&self) -> &[u8] {
        &self.signed_bytes
    }

    fn signature_bytes(&self) -> &[u8] {
        &self.signature
    }
}

/// Convert a 0x48-byte little-endian padded field into a 48-byte big-endian
/// P-384 coordinate. The high 0x18 pad bytes must be zero.
fn coordinate_from_le_field(field: &[u8]) -> Result<[u8; P384_COORD_LEN], SevError> {
    let (value_le, padding) = field.split_at(P384_COORD_LEN);
    if padding.iter().any(|&b| b != 0) {
        return Err(SevError::MalformedCertificate(
            "coordinate exceeds the P-384 field width".into(),
        ));
    }
    let mut out = [0u8; P384_COORD_LEN];
    for (dst, src) in out.iter_mut().zip(value_le.iter().rev()) {
        *dst = *src;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Wrapped VCEK certificate
// ---------------------------------------------------------------------------

/// The DER X.509 wrapped versioned chip-endorsement-key certificate.
///
/// No offset arithmetic here: the container carries its own structure. The
/// to-be-signed bytes are the re-encoded TBS region (DER is canonical, so
/// this reproduces the original bytes), and the signature is the issuer's
/// RSA-PSS signature over them.
#[derive(Clone, Debug)]
pub struct VcekCertRecord {
    public_key: VerifyingKey,
    signed_bytes: Vec<u8>,
    signature: Vec<u8>,
}

impl VcekCertRecord {
    /// Parse a DER-encoded VCEK certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::MalformedCertificate`] if the DER is invalid or
    /// the subject public key is not an uncompressed P-384 point.
    pub fn parse(buf: &[u8]) -> Result<Self, SevError> {
        let cert = Certificate::from_der(buf)
            .map_err(|e| SevError::MalformedCertificate(format!("invalid DER certificate: {e}")))?;

        let spki_bytes = cert
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| {
                SevError::MalformedCertificate("subject public key has unused bits".into())
            })?;
        let public_key = VerifyingKey::from_sec1_bytes(spki_bytes).map_err(|e| {
            SevError::MalformedCertificate(format!("subject key is not a P-384 point: {e}"))
        })?;

        let signed_bytes = cert
            .tbs_certificate
            .to_der()
            .map_err(|e| SevError::MalformedCertificate(format!("TBS re-encoding failed: {e}")))?;

        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| SevError::MalformedCertificate("signature has unused bits".into()))?
            .to_vec();

        Ok(Self {
            public_key,
            signed_bytes,
            signature,
        })
    }
}

impl EcCertificate for VcekCertRecord {
    fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    fn signed_bytes(&self) -> &[u8] {
        &self.signed_bytes
    }

    fn signature_bytes(&self) -> &[u8] {
        &self.signature
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal valid 2048-bit record with an odd synthetic modulus.
    fn test_record_bytes(usage: u32, signed: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes());
        let key_id = [0x11u8; 16];
        buf.extend_from_slice(&key_id);
        buf.extend_from_slice(&key_id);
        buf.extend_from_slice(&usage.to_le_bytes());
        buf.extend_from_slice(&[0u8; 0x10]);
        buf.extend_from_slice(&2048u32.to_le_bytes());
        buf.extend_from_slice(&2048u32.to_le_bytes());
        let mut pubexp = vec![0u8; 256];
        pubexp[0] = 0x01;
        pubexp[2] = 0x01;
        buf.extend_from_slice(&pubexp);
        let mut modulus = vec![0xabu8; 256];
        modulus[0] = 0xa1; // odd
        buf.extend_from_slice(&modulus);
        if signed {
            buf.extend_from_slice(&vec![0x5cu8; 256]);
        }
        buf
    }

    #[test]
    fn parse_unsigned_record() {
        let bytes = test_record_bytes(0, false);
        let rec = RsaCertRecord::parse(&bytes).expect("parse should succeed");
        assert!(rec.is_root());
        assert_eq!(rec.modulus_bits(), 2048);
        assert!(rec.signature().is_none());
        assert_eq!(rec.size(), bytes.len());
    }

    #[test]
    fn parse_signed_record_reverses_signature() {
        let mut bytes = test_record_bytes(0, true);
        // Distinguishable endpoints in the signature field.
        let sig_start = bytes.len() - 256;
        bytes[sig_start] = 0x01;
        *bytes.last_mut().expect("non-empty") = 0xfe;

        let rec = RsaCertRecord::parse(&bytes).expect("parse should succeed");
        let sig = rec.signature().expect("signature should be present");
        assert_eq!(sig.len(), 256);
        // Little-endian storage becomes big-endian: last wire byte first.
        assert_eq!(sig[0], 0xfe);
        assert_eq!(sig[255], 0x01);
    }

    #[test]
    fn roundtrip_preserves_record() {
        for signed in [false, true] {
            let bytes = test_record_bytes(0, signed);
            let rec = RsaCertRecord::parse(&bytes).expect("parse should succeed");
            assert_eq!(rec.to_bytes(), bytes);
            let reparsed = RsaCertRecord::parse(&rec.to_bytes()).expect("reparse should succeed");
            assert_eq!(reparsed, rec);
        }
    }

    #[test]
    fn parse_rejects_short_header() {
        let result = RsaCertRecord::parse(&[0u8; 0x3f]);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn parse_rejects_bad_version() {
        let mut bytes = test_record_bytes(0, false);
        bytes[0] = 2;
        let result = RsaCertRecord::parse(&bytes);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn parse_rejects_unknown_usage() {
        let bytes = test_record_bytes(0x42, false);
        let result = RsaCertRecord::parse(&bytes);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn parse_rejects_root_with_foreign_certifier() {
        let mut bytes = test_record_bytes(0, false);
        bytes[0x14] ^= 0xff; // corrupt first certifying-id byte
        let result = RsaCertRecord::parse(&bytes);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn parse_rejects_3072_bit_modulus() {
        let mut bytes = test_record_bytes(0, false);
        bytes[0x3c..0x40].copy_from_slice(&3072u32.to_le_bytes());
        let result = RsaCertRecord::parse(&bytes);
        assert!(matches!(result, Err(SevError::UnsupportedKeySize(3072))));
    }

    #[test]
    fn parse_rejects_wrong_exponent() {
        let mut bytes = test_record_bytes(0, false);
        bytes[RSA_HEADER_LEN] = 0x03;
        let result = RsaCertRecord::parse(&bytes);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn parse_rejects_truncated_public_key() {
        let bytes = test_record_bytes(0, false);
        let result = RsaCertRecord::parse(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn trailing_bytes_shorter_than_signature_mean_unsigned() {
        let mut bytes = test_record_bytes(0, false);
        bytes.extend_from_slice(&[0u8; 255]); // one byte short of a signature
        let rec = RsaCertRecord::parse(&bytes).expect("parse should succeed");
        assert!(rec.signature().is_none());
    }

    #[test]
    fn cek_record_rejects_wrong_length() {
        let result = CekCertRecord::parse(&[0u8; CEK_RECORD_LEN - 1]);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn cek_record_rejects_off_curve_point() {
        // Arbitrary coordinates are overwhelmingly unlikely to be on P-384.
        let mut buf = vec![0u8; CEK_RECORD_LEN];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        // Zero the coordinate pad bytes so only the point check can fail.
        for range in [CEK_X_RANGE, CEK_Y_RANGE] {
            for b in &mut buf[range.start + P384_COORD_LEN..range.end] {
                *b = 0;
            }
        }
        let result = CekCertRecord::parse(&buf);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn cek_record_rejects_nonzero_coordinate_padding() {
        let mut buf = vec![0u8; CEK_RECORD_LEN];
        buf[CEK_X_RANGE.start + P384_COORD_LEN] = 1;
        let result = CekCertRecord::parse(&buf);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }

    #[test]
    fn vcek_rejects_garbage_der() {
        let result = VcekCertRecord::parse(&[0x30, 0x03, 0x01, 0x01, 0xff]);
        assert!(matches!(result, Err(SevError::MalformedCertificate(_))));
    }
}
