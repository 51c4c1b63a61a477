//! Chain-of-trust verification — from the vendor root key down to a derived
//! endorsement key.
//!
//! This module provides:
//! - [`verify_rsa_signed_blob`] / [`verify_ecdsa_signed_blob`] — the two
//!   signature predicates everything else is built on
//! - [`KnownAnchorRegistry`] — published trust-anchor digests by product line
//! - [`CertChain`] — a parsed signing-key + root-key certificate file
//! - [`ChainReport`] — per-stage verification outcomes
//!
//! Predicates return `Ok(false)` for a well-formed signature that does not
//! verify; `Err` is reserved for structurally invalid input. Chain
//! verification never short-circuits: every stage is evaluated so the report
//! names all failures at once.

use crate::cert::{EcCertificate, KeyUsage, RsaCertRecord};
use crate::error::SevError;
use crate::kdf::{sha384, SHA384_LEN};
use hex_literal::hex;
use rsa::pss::{Signature as PssSignature, VerifyingKey as PssVerifyingKey};
use rsa::signature::Verifier;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384};
use std::fmt;

// ---------------------------------------------------------------------------
// Signature predicates
// ---------------------------------------------------------------------------

/// Verify an RSA-PSS signature made by the key in `signer`.
///
/// The hash and salt length follow the key size: 2048-bit keys use SHA-256
/// with a 32-byte salt, 4096-bit keys SHA-384 with a 48-byte salt.
///
/// # Errors
///
/// Returns [`SevError::UnsupportedKeySize`] for any other key size and
/// [`SevError::Signature`] if `signature` has the wrong length for the key.
pub fn verify_rsa_signed_blob(
    signer: &RsaCertRecord,
    signed: &[u8],
    signature: &[u8],
) -> Result<bool, SevError> {
    let public_key = signer.public_key()?;
    let signature = PssSignature::try_from(signature)
        .map_err(|e| SevError::Signature(format!("invalid RSA-PSS signature: {e}")))?;

    let verified = match signer.modulus_bits() {
        2048 => PssVerifyingKey::<Sha256>::new(public_key)
            .verify(signed, &signature)
            .is_ok(),
        4096 => PssVerifyingKey::<Sha384>::new(public_key)
            .verify(signed, &signature)
            .is_ok(),
        other => return Err(SevError::UnsupportedKeySize(other)),
    };
    Ok(verified)
}

/// Verify a DER-encoded ECDSA P-384 signature over SHA-384.
///
/// # Errors
///
/// Returns [`SevError::Signature`] if `signature` is not valid DER.
pub fn verify_ecdsa_signed_blob(
    public_key: &p384::ecdsa::VerifyingKey,
    signed: &[u8],
    signature: &[u8],
) -> Result<bool, SevError> {
    let signature = p384::ecdsa::Signature::from_der(signature)
        .map_err(|e| SevError::Signature(format!("invalid DER ECDSA signature: {e}")))?;
    Ok(public_key.verify(signed, &signature).is_ok())
}

// ---------------------------------------------------------------------------
// Trust anchors
// ---------------------------------------------------------------------------

/// Published Milan certificate file digest.
const MILAN_ANCHOR: [u8; SHA384_LEN] = hex!(
    "41ed65c78aa2a42a70bbdda05ecd3c4f5a2c34eb07a79359"
    "600c6afb188b3b6b2235b3fc9d283cec38307596d0e68ea6"
);

/// Published Rome certificate file digest.
const ROME_ANCHOR: [u8; SHA384_LEN] = hex!(
    "7cc74c72fd2468c149f77fba5bcd8c5910cc4e06e1ac1b12"
    "d55afd549683dcf01681e6f2071b62311d71f78e38db0e2a"
);

/// Published Naples certificate file digest.
const NAPLES_ANCHOR: [u8; SHA384_LEN] = hex!(
    "3e1078f7ac88e2852235a655bccf061a66e12a64e1c9bc19"
    "4d6a76bf1ad969ede4a877da4e97ab4ee372736a7cbffa48"
);

/// SHA-384 digests of the vendor's published signing-key + root-key
/// certificate files, keyed by product line.
///
/// Matching a parsed chain against a known digest pins the whole chain to a
/// vendor publication in one comparison.
pub struct KnownAnchorRegistry {
    anchors: Vec<(String, [u8; SHA384_LEN])>,
}

impl KnownAnchorRegistry {
    /// The registry of vendor-published chains.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            anchors: vec![
                ("Milan".to_owned(), MILAN_ANCHOR),
                ("Rome".to_owned(), ROME_ANCHOR),
                ("Naples".to_owned(), NAPLES_ANCHOR),
            ],
        }
    }

    /// An empty registry, for callers pinning their own anchors.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            anchors: Vec::new(),
        }
    }

    /// Register an additional trusted chain digest.
    pub fn with_anchor(mut self, name: impl Into<String>, digest: [u8; SHA384_LEN]) -> Self {
        self.anchors.push((name.into(), digest));
        self
    }

    /// Look up the product line whose published chain matches `blob` exactly.
    #[must_use]
    pub fn lookup(&self, blob: &[u8]) -> Option<&str> {
        let digest = sha384(blob);
        self.anchors
            .iter()
            .find(|(_, anchor)| *anchor == digest)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for KnownAnchorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Chain verification
// ---------------------------------------------------------------------------

/// How to treat a root key record that carries no self-signature.
///
/// Some early product lines published their root without one; the root is
/// then trusted on anchor match alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootSignaturePolicy {
    /// The root record must carry a valid self-signature.
    RequireSelfSigned,
    /// An unsigned root is acceptable when the chain matches a known anchor.
    AllowUnsigned,
}

/// Outcome of one verification stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    /// The signature verified.
    Pass,
    /// The signature was absent or did not verify.
    Fail(String),
    /// The record carries no signature to check.
    Unsigned,
}

impl StageOutcome {
    /// Whether this outcome counts as verified under `policy`.
    #[must_use]
    pub fn is_acceptable(&self, policy: RootSignaturePolicy) -> bool {
        match self {
            Self::Pass => true,
            Self::Fail(_) => false,
            Self::Unsigned => policy == RootSignaturePolicy::AllowUnsigned,
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("pass"),
            Self::Fail(reason) => write!(f, "FAIL ({reason})"),
            Self::Unsigned => f.write_str("unsigned"),
        }
    }
}

/// A parsed vendor certificate file: the endorsement signing key followed by
/// the self-signed root key.
pub struct CertChain {
    signing: RsaCertRecord,
    root: RsaCertRecord,
    blob: Vec<u8>,
}

impl CertChain {
    /// Parse a concatenated signing-key + root-key certificate file.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::MalformedCertificate`] if either record fails to
    /// parse, the records are in the wrong role order, the signing key
    /// claims a certifier other than the root, or the two records declare
    /// different modulus sizes.
    pub fn parse(blob: &[u8]) -> Result<Self, SevError> {
        let signing = RsaCertRecord::parse(blob)?;
        if signing.usage() != KeyUsage::Signing {
            return Err(SevError::MalformedCertificate(
                "first record must be the endorsement signing key".into(),
            ));
        }

        let root = RsaCertRecord::parse(&blob[signing.size()..])?;
        if root.usage() != KeyUsage::Root {
            return Err(SevError::MalformedCertificate(
                "second record must be the root key".into(),
            ));
        }
        if signing.certifying_id() != root.key_id() {
            return Err(SevError::MalformedCertificate(
                "signing key is not certified by the root key in the same file".into(),
            ));
        }
        if signing.modulus_bits() != root.modulus_bits() {
            return Err(SevError::MalformedCertificate(format!(
                "signing key modulus size ({} bits) differs from root key modulus size ({} bits)",
                signing.modulus_bits(),
                root.modulus_bits()
            )));
        }

        // Anchor matching digests the file exactly as published, trailing
        // bytes included.
        Ok(Self {
            signing,
            root,
            blob: blob.to_vec(),
        })
    }

    /// The endorsement signing key record.
    #[must_use]
    pub const fn signing_key(&self) -> &RsaCertRecord {
        &self.signing
    }

    /// The root key record.
    #[must_use]
    pub const fn root_key(&self) -> &RsaCertRecord {
        &self.root
    }

    /// Verify the root self-signature and the root-over-signing-key
    /// signature, and match the file against `anchors`.
    ///
    /// Both stages are always evaluated; a root failure does not suppress
    /// the intermediate check.
    ///
    /// # Errors
    ///
    /// Returns an error only for structural problems (unsupported key size,
    /// malformed signature bytes); mismatches land in the report.
    pub fn verify(&self, anchors: &KnownAnchorRegistry) -> Result<ChainReport, SevError> {
        let root = record_stage(&self.root, &self.root)?;
        let intermediate = record_stage(&self.root, &self.signing)?;
        let micro_arch = anchors.lookup(&self.blob).map(str::to_owned);

        Ok(ChainReport {
            root,
            intermediate,
            micro_arch,
        })
    }

    /// Verify an endorsement-key certificate against the signing key.
    ///
    /// # Errors
    ///
    /// Propagates structural errors from [`verify_rsa_signed_blob`].
    pub fn verify_leaf(&self, leaf: &dyn EcCertificate) -> Result<bool, SevError> {
        verify_rsa_signed_blob(&self.signing, leaf.signed_bytes(), leaf.signature_bytes())
    }
}

/// One record-over-record verification stage.
fn record_stage(signer: &RsaCertRecord, subject: &RsaCertRecord) -> Result<StageOutcome, SevError> {
    let Some(signature) = subject.signature() else {
        return Ok(StageOutcome::Unsigned);
    };
    let outcome = if verify_rsa_signed_blob(signer, &subject.signed_bytes(), signature)? {
        StageOutcome::Pass
    } else {
        StageOutcome::Fail("signature does not verify".into())
    };
    Ok(outcome)
}

/// Per-stage outcomes of verifying a certificate file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Root key self-signature.
    pub root: StageOutcome,
    /// Root signature over the endorsement signing key.
    pub intermediate: StageOutcome,
    /// Product line whose published chain the file matches, if any.
    pub micro_arch: Option<String>,
}

impl ChainReport {
    /// Whether the chain is fully endorsed under `policy`: the file matches
    /// a known anchor, the root is acceptable, and the signing key verifies.
    #[must_use]
    pub fn is_endorsed(&self, policy: RootSignaturePolicy) -> bool {
        self.micro_arch.is_some()
            && self.root.is_acceptable(policy)
            && self.intermediate == StageOutcome::Pass
    }
}

impl fmt::Display for ChainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.micro_arch {
            Some(name) => writeln!(f, "chain matches published {name} certificates")?,
            None => writeln!(f, "chain does not match any published certificates")?,
        }
        writeln!(f, "root self-signature:        {}", self.root)?;
        write!(f, "signing key endorsement:    {}", self.intermediate)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
