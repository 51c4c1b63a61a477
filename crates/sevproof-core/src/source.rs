//! Certificate retrieval — resolving an endorsement-key identity to the
//! vendor certificate bytes that publish it.
//!
//! The vendor key server addresses CEK certificates by the hex chip id and
//! VCEK certificates by the four version coordinates. [`CertificateSource`]
//! abstracts over where the bytes come from; [`DirectoryStore`] reads a
//! local mirror laid out with the vendor's file-name convention.

use crate::derive::VcekVersions;
use crate::error::SevError;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Identity of one endorsement-key certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateId {
    /// Chip endorsement key, addressed by the hex-encoded chip id.
    Cek {
        /// Lowercase hex chip identifier (the fuse-derived public point).
        chip_id_hex: String,
    },
    /// Versioned chip endorsement key, addressed by firmware versions.
    Vcek {
        /// Target version coordinates.
        versions: VcekVersions,
    },
}

impl CertificateId {
    /// File name under the vendor convention: the hex key plus `.cert`.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Cek { chip_id_hex } => format!("{chip_id_hex}.cert"),
            Self::Vcek { versions } => format!("{}.cert", versions.hex_key()),
        }
    }
}

/// A place certificate bytes can be fetched from.
pub trait CertificateSource {
    /// Fetch the raw certificate bytes for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SevError::MissingCertificateResource`] when the certificate
    /// does not exist at this source. The vendor never issued certificates
    /// for every version combination, so callers treat this as an expected
    /// outcome, distinct from a parse failure.
    fn fetch(&self, id: &CertificateId) -> Result<Vec<u8>, SevError>;
}

/// A local directory of certificates named by the vendor convention.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Serve certificates from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CertificateSource for DirectoryStore {
    fn fetch(&self, id: &CertificateId) -> Result<Vec<u8>, SevError> {
        let path = self.root.join(id.file_name());
        std::fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                SevError::MissingCertificateResource(path.display().to_string())
            } else {
                SevError::MissingCertificateResource(format!("{}: {e}", path.display()))
            }
        })
    }
}
