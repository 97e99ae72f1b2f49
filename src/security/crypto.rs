//! Digest and signature algorithm resolution from OIDs.

use der::asn1::ObjectIdentifier;

use crate::error::{CryptoAlgorithmError, ErrorList};

use super::asn1::SignerInfo;
use super::oids;

/// Digest algorithms the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    /// An unrecognized OID.
    Unknown,
}

impl DigestAlgorithm {
    /// Digest size in bytes; zero for unknown algorithms.
    pub fn digest_size(self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
            DigestAlgorithm::Unknown => 0,
        }
    }
}

/// Digest-encryption (signature) algorithm families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DigestEncryptionAlgorithm {
    Rsa,
    /// Recognized but not verifiable.
    Dsa,
    Ecdsa,
    /// An unrecognized OID.
    Unknown,
}

/// An encryption algorithm possibly bundled with a hash (the
/// `shaXXXWithRSA` combined OIDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionAndHashAlgorithm {
    /// The signature algorithm family.
    pub encryption: DigestEncryptionAlgorithm,
    /// The hash named by a combined OID, when one was.
    pub hash: Option<DigestAlgorithm>,
}

impl From<DigestEncryptionAlgorithm> for EncryptionAndHashAlgorithm {
    fn from(encryption: DigestEncryptionAlgorithm) -> Self {
        Self {
            encryption,
            hash: None,
        }
    }
}

/// The closed named-curve enumeration for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NamedCurve {
    Secp256k1,
    Secp256r1,
    Secp384r1,
    Secp521r1,
    BrainpoolP256r1,
    BrainpoolP384r1,
    BrainpoolP512r1,
    Sm2,
}

impl NamedCurve {
    /// Resolves a curve-parameters OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == oids::SECP256K1 {
            Some(NamedCurve::Secp256k1)
        } else if *oid == oids::SECP256R1 {
            Some(NamedCurve::Secp256r1)
        } else if *oid == oids::SECP384R1 {
            Some(NamedCurve::Secp384r1)
        } else if *oid == oids::SECP521R1 {
            Some(NamedCurve::Secp521r1)
        } else if *oid == oids::BRAINPOOL_P256R1 {
            Some(NamedCurve::BrainpoolP256r1)
        } else if *oid == oids::BRAINPOOL_P384R1 {
            Some(NamedCurve::BrainpoolP384r1)
        } else if *oid == oids::BRAINPOOL_P512R1 {
            Some(NamedCurve::BrainpoolP512r1)
        } else if *oid == oids::SM2 {
            Some(NamedCurve::Sm2)
        } else {
            None
        }
    }
}

/// Resolves a digest algorithm OID.
pub fn digest_algorithm_from_oid(oid: &ObjectIdentifier) -> DigestAlgorithm {
    if *oid == oids::SHA256 {
        DigestAlgorithm::Sha256
    } else if *oid == oids::SHA384 {
        DigestAlgorithm::Sha384
    } else if *oid == oids::SHA512 {
        DigestAlgorithm::Sha512
    } else if *oid == oids::SHA1 {
        DigestAlgorithm::Sha1
    } else if *oid == oids::MD5 {
        DigestAlgorithm::Md5
    } else {
        DigestAlgorithm::Unknown
    }
}

/// Resolves a digest-encryption algorithm OID, including the combined
/// hash-and-signature forms.
pub fn encryption_algorithm_from_oid(oid: &ObjectIdentifier) -> EncryptionAndHashAlgorithm {
    let rsa_with = |hash| EncryptionAndHashAlgorithm {
        encryption: DigestEncryptionAlgorithm::Rsa,
        hash: Some(hash),
    };
    if *oid == oids::RSA {
        DigestEncryptionAlgorithm::Rsa.into()
    } else if *oid == oids::DSA {
        DigestEncryptionAlgorithm::Dsa.into()
    } else if *oid == oids::EC_PUBLIC_KEY {
        DigestEncryptionAlgorithm::Ecdsa.into()
    } else if *oid == oids::MD5_WITH_RSA {
        rsa_with(DigestAlgorithm::Md5)
    } else if *oid == oids::SHA1_WITH_RSA {
        rsa_with(DigestAlgorithm::Sha1)
    } else if *oid == oids::SHA256_WITH_RSA {
        rsa_with(DigestAlgorithm::Sha256)
    } else if *oid == oids::SHA384_WITH_RSA {
        rsa_with(DigestAlgorithm::Sha384)
    } else if *oid == oids::SHA512_WITH_RSA {
        rsa_with(DigestAlgorithm::Sha512)
    } else {
        DigestEncryptionAlgorithm::Unknown.into()
    }
}

/// Resolves a signer's digest and encryption algorithms, recording
/// resolution failures and combined-OID mismatches. Returns `false` when
/// verification cannot proceed.
pub fn resolve_signer_algorithms(
    signer: &SignerInfo<'_>,
    digest_alg: &mut DigestAlgorithm,
    encryption_alg: &mut DigestEncryptionAlgorithm,
    errors: &mut ErrorList,
) -> bool {
    *digest_alg = digest_algorithm_from_oid(&signer.digest_algorithm.algorithm);
    if *digest_alg == DigestAlgorithm::Unknown {
        errors.add(CryptoAlgorithmError::UnsupportedDigestAlgorithm);
        return false;
    }

    let resolved = encryption_algorithm_from_oid(&signer.digest_encryption_algorithm.algorithm);
    *encryption_alg = resolved.encryption;
    if resolved.encryption == DigestEncryptionAlgorithm::Unknown {
        errors.add(CryptoAlgorithmError::UnsupportedDigestEncryptionAlgorithm);
        return false;
    }
    if let Some(embedded_hash) = resolved.hash {
        if embedded_hash != *digest_alg {
            errors.add(CryptoAlgorithmError::SignatureHashAndDigestAlgorithmMismatch);
            return false;
        }
    }
    true
}
