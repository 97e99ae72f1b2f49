//! Low-level signature verification over raw key material.

use der::asn1::ObjectIdentifier;
use der::Decode;
use log::debug;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};

use crate::error::{PeErrorCode, SignatureValidatorError};

use super::asn1::{RawTlv, RsaPublicKey as RsaPublicKeyDer};
use super::crypto::{DigestAlgorithm, DigestEncryptionAlgorithm, NamedCurve};

/// Outcome of one signature verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureVerificationResult {
    /// `true` when the signature checked out.
    pub valid: bool,
    /// RSA modulus size in bits.
    pub key_size: Option<u32>,
    /// The ECDSA curve the key lives on.
    pub curve: Option<NamedCurve>,
}

/// Verifies `encrypted_digest` over `message_digest` with the given raw
/// public key.
///
/// `raw_public_key` is the SubjectPublicKeyInfo bit-string content: a
/// PKCS#1 RSAPublicKey for RSA, an SEC1 point for ECDSA. `parameters`
/// carries the certificate's key-algorithm parameters (the named curve
/// for ECDSA). Unrecognized combinations fail with
/// `UnsupportedSignatureAlgorithm`; a key or signature that fails to
/// decode fails with `InvalidSignature`; a mere mismatch reports
/// `valid == false`.
pub fn verify_signature(
    raw_public_key: &[u8],
    message_digest: &[u8],
    encrypted_digest: &[u8],
    digest_alg: DigestAlgorithm,
    encryption_alg: DigestEncryptionAlgorithm,
    parameters: Option<&RawTlv<'_>>,
) -> Result<SignatureVerificationResult, PeErrorCode> {
    match encryption_alg {
        DigestEncryptionAlgorithm::Rsa => {
            verify_rsa(raw_public_key, message_digest, encrypted_digest, digest_alg)
        }
        DigestEncryptionAlgorithm::Ecdsa => verify_ecdsa(
            raw_public_key,
            message_digest,
            encrypted_digest,
            parameters,
        ),
        _ => Err(SignatureValidatorError::UnsupportedSignatureAlgorithm.into()),
    }
}

fn verify_rsa(
    raw_public_key: &[u8],
    message_digest: &[u8],
    encrypted_digest: &[u8],
    digest_alg: DigestAlgorithm,
) -> Result<SignatureVerificationResult, PeErrorCode> {
    let key_der = RsaPublicKeyDer::from_der(raw_public_key)
        .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(key_der.modulus.as_bytes()),
        BigUint::from_bytes_be(key_der.public_exponent.as_bytes()),
    )
    .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
    let key_size = key.size() as u32 * 8;

    let padding = match digest_alg {
        DigestAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        DigestAlgorithm::Unknown => {
            return Err(SignatureValidatorError::UnsupportedSignatureAlgorithm.into())
        }
    };

    let valid = key.verify(padding, message_digest, encrypted_digest).is_ok();
    debug!("RSA-{key_size} signature verification: valid={valid}");
    Ok(SignatureVerificationResult {
        valid,
        key_size: Some(key_size),
        curve: None,
    })
}

fn verify_ecdsa(
    raw_public_key: &[u8],
    message_digest: &[u8],
    encrypted_digest: &[u8],
    parameters: Option<&RawTlv<'_>>,
) -> Result<SignatureVerificationResult, PeErrorCode> {
    let parameters =
        parameters.ok_or(SignatureValidatorError::UnsupportedSignatureAlgorithm)?;
    let curve_oid = ObjectIdentifier::from_der(parameters.full)
        .map_err(|_| PeErrorCode::from(SignatureValidatorError::UnsupportedSignatureAlgorithm))?;
    let curve = NamedCurve::from_oid(&curve_oid)
        .ok_or(SignatureValidatorError::UnsupportedSignatureAlgorithm)?;

    let valid = match curve {
        NamedCurve::Secp256k1 => {
            use k256::ecdsa::signature::hazmat::PrehashVerifier;
            use k256::ecdsa::{Signature, VerifyingKey};
            let key = VerifyingKey::from_sec1_bytes(raw_public_key)
                .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
            let signature = Signature::from_der(encrypted_digest)
                .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
            key.verify_prehash(message_digest, &signature).is_ok()
        }
        NamedCurve::Secp256r1 => {
            use p256::ecdsa::signature::hazmat::PrehashVerifier;
            use p256::ecdsa::{Signature, VerifyingKey};
            let key = VerifyingKey::from_sec1_bytes(raw_public_key)
                .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
            let signature = Signature::from_der(encrypted_digest)
                .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
            key.verify_prehash(message_digest, &signature).is_ok()
        }
        NamedCurve::Secp384r1 => {
            use p384::ecdsa::signature::hazmat::PrehashVerifier;
            use p384::ecdsa::{Signature, VerifyingKey};
            let key = VerifyingKey::from_sec1_bytes(raw_public_key)
                .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
            let signature = Signature::from_der(encrypted_digest)
                .map_err(|_| PeErrorCode::from(SignatureValidatorError::InvalidSignature))?;
            key.verify_prehash(message_digest, &signature).is_ok()
        }
        // Recognized curves without a verifier in the reference stack.
        _ => return Err(SignatureValidatorError::UnsupportedSignatureAlgorithm.into()),
    };

    debug!("ECDSA {curve:?} signature verification: valid={valid}");
    Ok(SignatureVerificationResult {
        valid,
        key_size: None,
        curve: Some(curve),
    })
}
