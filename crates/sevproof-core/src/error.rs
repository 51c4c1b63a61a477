//! Error types for `sevproof-core`.

use thiserror::Error;

/// Errors produced by certificate parsing, key derivation, and verification.
///
/// Verification predicates never produce an error for a mismatched
/// signature — a mismatch is a boolean `false`. Errors are reserved for
/// structurally invalid input and violated preconditions.
#[derive(Debug, Error)]
pub enum SevError {
    /// Structural or field-invariant violation while parsing a certificate.
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),

    /// RSA key size outside the supported set (2048 or 4096 bits).
    #[error("unsupported key size: {0} bits (expected 2048 or 4096)")]
    UnsupportedKeySize(u32),

    /// Derivation input length precondition violated.
    #[error("invalid key material length: {actual} bytes (expected {expected})")]
    InvalidKeyMaterialLength {
        /// Required input length in bytes.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Key derivation failed (scalar reduction, curve point construction).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Requested certificate is not locally present and not retrievable.
    ///
    /// Expected for version combinations the vendor never issued — callers
    /// must be able to tell this apart from a parse failure.
    #[error("certificate resource not found: {0}")]
    MissingCertificateResource(String),

    /// Signature bytes are structurally invalid (wrong length, bad DER).
    ///
    /// Not raised for a well-formed signature that merely fails to verify.
    #[error("malformed signature: {0}")]
    Signature(String),
}
