//! Authenticode verification: certificate resolution, the structured
//! verdict and the image-level entry point.

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{
    AuthenticodeLoaderError, AuthenticodeVerifierError, ErrorList, PeErrorCode,
    SignatureVerifierError,
};
use crate::image::Image;

use super::asn1::{ContentInfo, SignerIdentifier, SignerInfo};
use super::cert_store::{build_certificate_store, CertificateStore};
use super::crypto::{
    resolve_signer_algorithms, DigestAlgorithm, DigestEncryptionAlgorithm,
};
use super::directory::{CertificateType, SecurityLoaderOptions};
use super::format::{validate_authenticated_attributes, validate_authenticode_format};
use super::image_hash::{calculate_image_hash, PageHashOptions};
use super::oids;
use super::page_hashes::get_page_hashes;
use super::pkcs7::{
    authenticated_attributes, calculate_authenticated_attributes_digest, calculate_message_digest,
    unauthenticated_attributes, verify_message_digest_attribute, AttributeMap, AuthenticodePkcs7,
};
use super::program_info::{get_program_info, ProgramInfo};
use super::signature::{verify_signature, SignatureVerificationResult};
use super::timestamp::{
    load_timestamp_signature, verify_timestamp_signature, TimestampSignatureCheckStatus,
};

/// Controls for Authenticode verification.
#[derive(Debug, Clone)]
pub struct VerificationOptions {
    /// Verify the timestamp counter-signature, when one is present.
    pub verify_timestamp_signature: bool,
    /// Verify nested (double-sign) signatures.
    pub verify_nested_signatures: bool,
    /// Cap on the stored and recomputed page-hash blob size.
    pub max_page_hashes_size: u32,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            verify_timestamp_signature: true,
            verify_nested_signatures: true,
            max_page_hashes_size: 10_000_000,
        }
    }
}

/// The structured verdict for one signature.
#[derive(Debug, Clone, Default)]
pub struct AuthenticodeCheckStatus {
    /// Structural violations; any entry invalidates the signature.
    pub format_errors: ErrorList,
    /// Certificate store anomalies that do not by themselves invalidate.
    pub cert_store_warnings: ErrorList,
    /// Whether the recomputed image hash matches the signed digest.
    pub image_hash_valid: Option<bool>,
    /// Present only when the signature stores page hashes.
    pub page_hashes_valid: Option<bool>,
    /// Why page hashes could not be checked, when they could not.
    pub page_hashes_check_error: Option<PeErrorCode>,
    /// Whether the message digest over the signed content matches.
    pub message_digest_valid: Option<bool>,
    /// Outcome of the signature check proper.
    pub signature_result: Option<SignatureVerificationResult>,
    /// The signer's digest algorithm.
    pub image_digest_alg: Option<DigestAlgorithm>,
    /// The signer's signature algorithm.
    pub digest_encryption_alg: Option<DigestEncryptionAlgorithm>,
    /// The authenticated signing time, when the attribute exists.
    pub signing_time: Option<DateTime<Utc>>,
    /// Program name and URL from the opus-info attribute.
    pub program_info: Option<ProgramInfo>,
    /// Verdict for the timestamp counter-signature, when one exists.
    pub timestamp_signature_result: Option<TimestampSignatureCheckStatus>,
}

impl AuthenticodeCheckStatus {
    /// The conjunction of every check: no format errors, image hash and
    /// message digest valid, signature verified, page hashes absent or
    /// valid.
    pub fn is_valid(&self) -> bool {
        !self.format_errors.has_errors()
            && self.image_hash_valid == Some(true)
            && self.message_digest_valid == Some(true)
            && self.signature_result.map(|r| r.valid).unwrap_or(false)
            && self.page_hashes_check_error.is_none()
            && self.page_hashes_valid.unwrap_or(true)
    }
}

/// The verdict for a signature chain: the root signature plus any nested
/// (double-sign) signatures.
#[derive(Debug, Clone, Default)]
pub struct AuthenticodeFullCheckStatus {
    /// The outermost signature.
    pub root: AuthenticodeCheckStatus,
    /// One verdict per nested signature, in declaration order.
    pub nested: Vec<AuthenticodeCheckStatus>,
}

impl AuthenticodeFullCheckStatus {
    /// `true` when the root and every nested signature are fully valid.
    pub fn is_valid(&self) -> bool {
        self.root.is_valid() && self.nested.iter().all(AuthenticodeCheckStatus::is_valid)
    }
}

/// Resolves the signing certificate by the signer's issuer and serial
/// number and verifies the signature over the authenticated-attributes
/// digest. Resolution failures land on `errors`; `None` means
/// verification could not run.
pub fn verify_signer_signature(
    signer: &SignerInfo<'_>,
    cert_store: &CertificateStore<'_>,
    digest_alg: DigestAlgorithm,
    encryption_alg: DigestEncryptionAlgorithm,
    errors: &mut ErrorList,
) -> Option<SignatureVerificationResult> {
    let SignerIdentifier::IssuerAndSerial {
        issuer,
        serial_number,
    } = &signer.sid
    else {
        errors.add(SignatureVerifierError::AbsentSigningCertIssuerAndSn);
        return None;
    };

    let Some(certificate) = cert_store.find_certificate(serial_number.as_bytes(), issuer.full)
    else {
        errors.add(SignatureVerifierError::AbsentSigningCert);
        return None;
    };

    let digest = match calculate_authenticated_attributes_digest(signer) {
        Ok(digest) => digest,
        Err(e) => {
            errors.add(e);
            return None;
        }
    };

    match verify_signature(
        certificate.tbs.spki.subject_public_key,
        &digest,
        signer.encrypted_digest,
        digest_alg,
        encryption_alg,
        certificate.tbs.spki.algorithm.parameters.as_ref(),
    ) {
        Ok(result) => Some(result),
        Err(e) => {
            errors.add(SignatureVerifierError::UnableToVerifySignature);
            errors.add(e);
            None
        }
    }
}

/// Decodes an Authenticode signature from a certificate-table entry.
/// Only `PkcsSignedData` entries are supported; trailing bytes after the
/// DER are tolerated when zero.
pub fn load_authenticode_signature<'s>(
    entry: &'s super::directory::CertificateEntry<'_>,
) -> Result<AuthenticodePkcs7<'s>, PeErrorCode> {
    if entry.certificate_type() != Some(CertificateType::PkcsSignedData) {
        return Err(AuthenticodeLoaderError::UnsupportedCertificateType.into());
    }
    decode_authenticode_signature(entry.certificate.raw_data())
}

/// Decodes an Authenticode `ContentInfo(SignedData)` from raw DER.
pub fn decode_authenticode_signature(bytes: &[u8]) -> Result<AuthenticodePkcs7<'_>, PeErrorCode> {
    let (content_info, _) = super::asn1::decode_with_zero_tail::<ContentInfo>(bytes)
        .map_err(|_| PeErrorCode::from(AuthenticodeLoaderError::UnableToReadDer))?;
    Ok(AuthenticodePkcs7::new(content_info))
}

/// Verifies the image's embedded Authenticode signature.
///
/// Returns `None` when the image carries no security directory or the
/// directory is empty; otherwise a full structured verdict.
pub fn verify_authenticode(
    image: &Image<'_>,
    options: &VerificationOptions,
) -> Option<AuthenticodeFullCheckStatus> {
    let directory = super::directory::load(image, &SecurityLoaderOptions::default())?;

    let mut result = AuthenticodeFullCheckStatus::default();
    if directory.errors.has_errors() {
        result
            .root
            .format_errors
            .add(AuthenticodeVerifierError::ImageSecurityDirectoryHasErrors);
        return Some(result);
    }
    let entry = directory.entries.first()?;

    let signature = match load_authenticode_signature(entry) {
        Ok(signature) => signature,
        Err(_) => {
            result
                .root
                .format_errors
                .add(AuthenticodeVerifierError::InvalidAuthenticodeSignatureFormat);
            return Some(result);
        }
    };

    Some(verify_authenticode_full(&signature, image, options))
}

/// Verifies a loaded signature and every nested signature it carries.
pub fn verify_authenticode_full(
    signature: &AuthenticodePkcs7<'_>,
    image: &Image<'_>,
    options: &VerificationOptions,
) -> AuthenticodeFullCheckStatus {
    let mut result = AuthenticodeFullCheckStatus::default();

    let unauthenticated = match signature.signer(0) {
        Some(signer) => match unauthenticated_attributes(signer) {
            Ok(map) => map,
            Err(e) => {
                result.root.format_errors.add(e);
                return result;
            }
        },
        None => AttributeMap::default(),
    };

    verify_one_signature(signature, image, options, &unauthenticated, &mut result.root);

    if options.verify_nested_signatures {
        for nested in load_nested_signatures(&unauthenticated) {
            let mut status = AuthenticodeCheckStatus::default();
            match nested {
                Ok(nested_signature) => {
                    let nested_unauth = match nested_signature.signer(0) {
                        Some(signer) => match unauthenticated_attributes(signer) {
                            Ok(map) => map,
                            Err(e) => {
                                status.format_errors.add(e);
                                result.nested.push(status);
                                continue;
                            }
                        },
                        None => AttributeMap::default(),
                    };
                    verify_one_signature(
                        &nested_signature,
                        image,
                        options,
                        &nested_unauth,
                        &mut status,
                    );
                }
                Err(_) => status
                    .format_errors
                    .add(AuthenticodeVerifierError::InvalidAuthenticodeSignatureFormat),
            }
            result.nested.push(status);
        }
    }

    result
}

/// Every nested Authenticode signature stored in the unauthenticated
/// attributes, in declaration order.
pub fn load_nested_signatures<'a>(
    unauthenticated: &AttributeMap<'a>,
) -> Vec<Result<AuthenticodePkcs7<'a>, PeErrorCode>> {
    unauthenticated
        .get_attributes(&oids::SPC_NESTED_SIGNATURE)
        .map(|values| {
            values
                .iter()
                .map(|value| decode_authenticode_signature(value.full))
                .collect()
        })
        .unwrap_or_default()
}

fn verify_one_signature(
    signature: &AuthenticodePkcs7<'_>,
    image: &Image<'_>,
    options: &VerificationOptions,
    unauthenticated: &AttributeMap<'_>,
    result: &mut AuthenticodeCheckStatus,
) {
    validate_authenticode_format(signature, &mut result.format_errors);
    if result.format_errors.has_errors() {
        return;
    }

    // Exactly one signer after format validation.
    let signer = match signature.signer(0) {
        Some(signer) => signer,
        None => return,
    };

    let attributes = match authenticated_attributes(signer) {
        Ok(attributes) => attributes,
        Err(e) => {
            result.format_errors.add(e);
            return;
        }
    };
    result.signing_time = validate_authenticated_attributes(
        &attributes,
        Some(&oids::SPC_INDIRECT_DATA),
        &mut result.format_errors,
    );
    if result.format_errors.has_errors() {
        return;
    }
    match get_program_info(&attributes) {
        Ok(info) => result.program_info = info,
        Err(e) => result.format_errors.add(e),
    }

    let mut digest_alg = DigestAlgorithm::Unknown;
    let mut encryption_alg = DigestEncryptionAlgorithm::Unknown;
    let resolved = resolve_signer_algorithms(
        signer,
        &mut digest_alg,
        &mut encryption_alg,
        &mut result.format_errors,
    );
    result.image_digest_alg = Some(digest_alg);
    result.digest_encryption_alg = Some(encryption_alg);
    if !resolved {
        return;
    }

    // Page hashes, when stored.
    let mut page_hash_options = None;
    let mut raw_page_hashes = None;
    match get_page_hashes(signature) {
        Ok(Some(page_hashes)) => {
            if page_hashes.is_valid(digest_alg) {
                page_hash_options = Some(PageHashOptions {
                    algorithm: page_hashes.algorithm,
                    max_page_hashes_size: options.max_page_hashes_size,
                });
                raw_page_hashes = Some(page_hashes.raw);
            } else {
                result.page_hashes_check_error =
                    Some(AuthenticodeVerifierError::InvalidPageHashFormat.into());
            }
        }
        Ok(None) => {}
        Err(e) => result.page_hashes_check_error = Some(e),
    }

    // The image hash, compared against the signed digest.
    let Some(expected_hash) = signature.image_hash() else {
        result
            .format_errors
            .add(AuthenticodeVerifierError::InvalidAuthenticodeSignatureFormat);
        return;
    };
    match calculate_image_hash(digest_alg, image, page_hash_options.as_ref()) {
        Ok(hash_result) => {
            result.image_hash_valid = Some(hash_result.image_hash == expected_hash);
            if let Some(raw) = raw_page_hashes {
                match (&hash_result.page_hashes, &hash_result.page_hash_error) {
                    (Some(computed), _) => {
                        result.page_hashes_valid = Some(computed.as_slice() == raw)
                    }
                    (None, Some(e)) => result.page_hashes_check_error = Some(*e),
                    (None, None) => {}
                }
            }
        }
        Err(_) => {
            result
                .format_errors
                .add(AuthenticodeVerifierError::InvalidImageFormatForHashing);
            return;
        }
    }

    // The signed message digest over the SPC indirect data content.
    let Some(raw_signed_content) = signature.raw_signed_content else {
        result
            .format_errors
            .add(AuthenticodeVerifierError::InvalidAuthenticodeSignatureFormat);
        return;
    };
    match calculate_message_digest(digest_alg, &[raw_signed_content]) {
        Ok(message_digest) => {
            match verify_message_digest_attribute(&message_digest, &attributes) {
                Ok(valid) => result.message_digest_valid = Some(valid),
                Err(e) => {
                    result.format_errors.add(e);
                    return;
                }
            }
        }
        Err(e) => {
            result.format_errors.add(e);
            return;
        }
    }

    let cert_store = build_certificate_store(
        signature.signed_data(),
        Some(&mut result.cert_store_warnings),
    );
    result.signature_result = verify_signer_signature(
        signer,
        &cert_store,
        digest_alg,
        encryption_alg,
        &mut result.format_errors,
    );
    debug!(
        "authenticode verification: image_hash_valid={:?} signature={:?}",
        result.image_hash_valid,
        result.signature_result.map(|r| r.valid)
    );

    if options.verify_timestamp_signature {
        match load_timestamp_signature(unauthenticated) {
            Ok(Some(timestamp)) => {
                result.timestamp_signature_result = Some(verify_timestamp_signature(
                    signer.encrypted_digest,
                    &timestamp,
                    &cert_store,
                ));
            }
            Ok(None) => {}
            Err(e) => result.format_errors.add(e),
        }
    }
}
