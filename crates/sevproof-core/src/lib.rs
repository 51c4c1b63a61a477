//! `sevproof-core` — Secure-processor endorsement-key re-derivation and
//! chain-of-trust verification.
//!
//! This crate is the analysis core: zero network, zero async. Given secret
//! material recovered from a secure processor (versioned seeds or fuse
//! bits), it re-derives the chip endorsement keys the processor derives
//! on-die and proves the result against the vendor's published chain of
//! trust.
//!
//! Research tooling for material you are authorized to analyze. The key
//! generation here is intentionally not constant-time and must never be
//! used to provision production keys.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;

pub mod kdf;
pub mod seed;

pub mod derive;

pub mod cert;

pub mod chain;

pub mod proof;

pub mod source;

pub use cert::{CekCertRecord, EcCertificate, KeyUsage, RsaCertRecord, VcekCertRecord};
pub use chain::{
    verify_ecdsa_signed_blob, verify_rsa_signed_blob, CertChain, ChainReport, KnownAnchorRegistry,
    RootSignaturePolicy, StageOutcome,
};
pub use derive::{
    derive_cek, derive_ecdsa_key, derive_fuse_id, derive_vcek, EcKeyPair, RecoveredSeeds,
    VcekVersions, FUSE_ID_LEN, FUSE_LEN, RANDOM_BITS_LEN, SEED_PAIR_LEN,
};
pub use error::SevError;
pub use kdf::{counter_mode_kdf, sha256, sha384, SHA256_LEN, SHA384_LEN};
pub use proof::{prove_derived_key_matches_chain, verify_vendor_signature_against_chain};
pub use seed::{Seed, SEED_LEN};
pub use source::{CertificateId, CertificateSource, DirectoryStore};
