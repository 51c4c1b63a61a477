//! Key-equivalence proof — demonstrating that a re-derived private key is
//! the counterpart of a vendor-certified public key.
//!
//! Two directions, same conclusion:
//! - [`prove_derived_key_matches_chain`] signs a fresh message with the
//!   derived private key and verifies it with the certificate's public key.
//! - [`verify_vendor_signature_against_chain`] checks an existing
//!   vendor-issued signature against the same public key.
//!
//! A successful proof means possession of the private half of a key the
//! vendor's chain of trust endorses.

use crate::chain::verify_ecdsa_signed_blob;
use crate::derive::EcKeyPair;
use crate::error::SevError;
use p384::ecdsa::VerifyingKey;

/// Sign `message` with `derived` and verify the signature against
/// `certified`, the public key taken from a vendor certificate.
///
/// Returns `Ok(true)` iff the derived private key corresponds to the
/// certified public key.
///
/// # Errors
///
/// Propagates structural errors from signature verification; a plain key
/// mismatch is `Ok(false)`.
pub fn prove_derived_key_matches_chain(
    derived: &EcKeyPair,
    message: &[u8],
    certified: &VerifyingKey,
) -> Result<bool, SevError> {
    let signature = derived.sign(message);
    verify_ecdsa_signed_blob(certified, message, &signature)
}

/// Verify a vendor-issued DER ECDSA signature over `message` against a
/// certified public key.
///
/// # Errors
///
/// Returns [`SevError::Signature`] if `signature` is not valid DER; a
/// mismatch is `Ok(false)`.
pub fn verify_vendor_signature_against_chain(
    message: &[u8],
    signature: &[u8],
    certified: &VerifyingKey,
) -> Result<bool, SevError> {
    verify_ecdsa_signed_blob(certified, message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::derive_ecdsa_key;

    #[test]
    fn matching_keys_prove_equivalence() {
        let pair = derive_ecdsa_key(&[0x42u8; 56]).expect("derivation succeeds");
        let proven = prove_derived_key_matches_chain(&pair, b"proof message", pair.public_key())
            .expect("well-formed signature");
        assert!(proven);
    }

    #[test]
    fn unrelated_keys_fail_the_proof() {
        let derived = derive_ecdsa_key(&[0x42u8; 56]).expect("derivation succeeds");
        let other = derive_ecdsa_key(&[0x43u8; 56]).expect("derivation succeeds");
        let proven =
            prove_derived_key_matches_chain(&derived, b"proof message", other.public_key())
                .expect("well-formed signature");
        assert!(!proven);
    }

    #[test]
    fn vendor_signature_verifies_against_its_own_key() {
        let pair = derive_ecdsa_key(&[0x42u8; 56]).expect("derivation succeeds");
        let sig = pair.sign(b"vendor payload");
        assert!(
            verify_vendor_signature_against_chain(b"vendor payload", &sig, pair.public_key())
                .expect("well-formed signature")
        );
    }
}
