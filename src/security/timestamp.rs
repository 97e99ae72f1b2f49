//! Timestamp counter-signatures: RFC 3161 tokens, the Microsoft variant
//! and legacy PKCS#9 counter-signatures.

use chrono::{DateTime, Utc};
use der::asn1::OctetStringRef;
use der::Decode;
use log::debug;

use crate::error::{ErrorList, PeErrorCode, Pkcs7FormatError, TimestampSignatureError};

use super::asn1::{ContentInfo, RawTlv, SignerInfo, TstInfo};
use super::cert_store::{build_certificate_store, CertificateStore};
use super::crypto::{
    digest_algorithm_from_oid, resolve_signer_algorithms, DigestAlgorithm,
    DigestEncryptionAlgorithm,
};
use super::format::{
    validate_authenticated_attributes, validate_signed_data, CMS_SIGNED_DATA_VERSION,
};
use super::hash::calculate_hash;
use super::oids;
use super::pkcs7::{authenticated_attributes, AttributeMap};
use super::verifier::verify_signer_signature;

/// A CMS timestamp token: the SignedData plus its decoded TSTInfo.
#[derive(Clone, Debug)]
pub struct TimestampCms<'a> {
    /// The CMS SignedData wrapper.
    pub content_info: ContentInfo<'a>,
    /// The decoded timestamp token info.
    pub tst_info: TstInfo<'a>,
    /// The TSTInfo TLV bytes; the input of the token's message digest.
    pub tst_raw: &'a [u8],
    /// `true` when the token used Microsoft's non-compliant direct
    /// encoding rather than the RFC 5652 OCTET STRING wrapper.
    pub ms_bug_workaround: bool,
}

/// A loaded timestamp counter-signature in one of its three wire forms.
#[derive(Clone, Debug)]
pub enum TimestampSignature<'a> {
    /// RFC 3161 / Microsoft CMS token.
    Cms(TimestampCms<'a>),
    /// Legacy PKCS#9 counter-signature: a bare SignerInfo.
    CounterSignature(SignerInfo<'a>),
}

/// Outcome of timestamp verification.
#[derive(Clone, Debug, Default)]
pub struct TimestampSignatureCheckStatus {
    /// Structural violations; any entry invalidates the timestamp.
    pub format_errors: ErrorList,
    /// Certificate store anomalies.
    pub cert_store_warnings: ErrorList,
    /// Imprint (CMS) or message-digest (legacy) check over the signer's
    /// encrypted digest.
    pub hash_valid: Option<bool>,
    /// CMS only: the token's own message digest over the TSTInfo bytes.
    pub message_digest_valid: Option<bool>,
    /// The timestamp signer's digest algorithm.
    pub digest_alg: Option<DigestAlgorithm>,
    /// The message-imprint digest algorithm.
    pub imprint_digest_alg: Option<DigestAlgorithm>,
    /// The timestamp signer's signature algorithm.
    pub digest_encryption_alg: Option<DigestEncryptionAlgorithm>,
    /// Outcome of the timestamp signature check.
    pub signature_result: Option<super::signature::SignatureVerificationResult>,
    /// When the timestamp authority vouched for the signature.
    pub signing_time: Option<DateTime<Utc>>,
}

impl TimestampSignatureCheckStatus {
    /// A timestamp is fully formed only when every check passed and a
    /// signing time is present.
    pub fn is_valid(&self) -> bool {
        !self.format_errors.has_errors()
            && self.hash_valid == Some(true)
            && self.message_digest_valid.unwrap_or(true)
            && self.signature_result.map(|r| r.valid).unwrap_or(false)
            && self.signing_time.is_some()
    }
}

/// Searches the unauthenticated attributes for a timestamp, in order:
/// RFC 3161 token, Microsoft token, legacy counter-signature. Returns
/// `None` when no timestamp attribute exists.
pub fn load_timestamp_signature<'a>(
    unauthenticated: &AttributeMap<'a>,
) -> Result<Option<TimestampSignature<'a>>, PeErrorCode> {
    let token = match unauthenticated.get_attribute(&oids::TIMESTAMP_TOKEN)? {
        Some(token) => Some(token),
        None => unauthenticated.get_attribute(&oids::SPC_TIME_STAMP_TOKEN)?,
    };
    if let Some(token) = token {
        return decode_cms_timestamp(token).map(|cms| Some(TimestampSignature::Cms(cms)));
    }

    if let Some(value) = unauthenticated.get_attribute(&oids::COUNTER_SIGNATURE)? {
        let signer = SignerInfo::from_der(value.full)
            .map_err(|_| PeErrorCode::from(TimestampSignatureError::InvalidTimestampSignatureAsn1Der))?;
        return Ok(Some(TimestampSignature::CounterSignature(signer)));
    }

    Ok(None)
}

fn decode_cms_timestamp(token: RawTlv<'_>) -> Result<TimestampCms<'_>, PeErrorCode> {
    let invalid =
        || PeErrorCode::from(TimestampSignatureError::InvalidTimestampSignatureAsn1Der);

    let content_info = ContentInfo::from_der(token.full).map_err(|_| invalid())?;
    let wrapper = content_info
        .content
        .encap_content_info
        .content
        .ok_or_else(invalid)?;
    let inner = RawTlv::from_der(wrapper.value).map_err(|_| invalid())?;

    // Two-phase decode: Microsoft's signer historically embeds the
    // TSTInfo SEQUENCE directly; the strict RFC 5652 form wraps its DER
    // in an OCTET STRING. The permissive form is attempted first.
    if let Ok(tst_info) = TstInfo::from_der(inner.full) {
        debug!("timestamp token uses the direct TSTInfo encoding");
        return Ok(TimestampCms {
            content_info,
            tst_info,
            tst_raw: inner.full,
            ms_bug_workaround: true,
        });
    }
    let octets = OctetStringRef::from_der(inner.full).map_err(|_| invalid())?;
    let tst_info = TstInfo::from_der(octets.as_bytes()).map_err(|_| invalid())?;
    Ok(TimestampCms {
        content_info,
        tst_info,
        tst_raw: octets.as_bytes(),
        ms_bug_workaround: false,
    })
}

/// Verifies a loaded timestamp against the original signer's encrypted
/// digest. `authenticode_store` backs legacy counter-signatures, whose
/// certificate lives in the main signature's store.
pub fn verify_timestamp_signature(
    authenticode_encrypted_digest: &[u8],
    timestamp: &TimestampSignature<'_>,
    authenticode_store: &CertificateStore<'_>,
) -> TimestampSignatureCheckStatus {
    match timestamp {
        TimestampSignature::Cms(cms) => verify_cms_timestamp(authenticode_encrypted_digest, cms),
        TimestampSignature::CounterSignature(signer) => {
            verify_counter_signature(authenticode_encrypted_digest, signer, authenticode_store)
        }
    }
}

fn verify_cms_timestamp(
    authenticode_encrypted_digest: &[u8],
    cms: &TimestampCms<'_>,
) -> TimestampSignatureCheckStatus {
    let mut result = TimestampSignatureCheckStatus::default();

    validate_signed_data(
        &cms.content_info.content_type,
        &cms.content_info.content,
        CMS_SIGNED_DATA_VERSION,
        &mut result.format_errors,
    );
    if cms.tst_info.version != 1 {
        result
            .format_errors
            .add(TimestampSignatureError::InvalidTstInfoVersion);
    }
    if let Some(accuracy) = &cms.tst_info.accuracy {
        for part in [accuracy.millis, accuracy.micros].into_iter().flatten() {
            if !(1..=999).contains(&part) {
                result
                    .format_errors
                    .add(TimestampSignatureError::InvalidTimestampAccuracy);
            }
        }
    }
    if result.format_errors.has_errors() {
        return result;
    }

    let Some(signer) = cms.content_info.content.signer_infos.first() else {
        return result;
    };

    let attributes = match authenticated_attributes(signer) {
        Ok(attributes) => attributes,
        Err(e) => {
            result.format_errors.add(e);
            return result;
        }
    };
    validate_authenticated_attributes(&attributes, None, &mut result.format_errors);
    if result.format_errors.has_errors() {
        return result;
    }

    let mut digest_alg = DigestAlgorithm::Unknown;
    let mut encryption_alg = DigestEncryptionAlgorithm::Unknown;
    if !resolve_signer_algorithms(
        signer,
        &mut digest_alg,
        &mut encryption_alg,
        &mut result.format_errors,
    ) {
        result.digest_alg = Some(digest_alg);
        result.digest_encryption_alg = Some(encryption_alg);
        return result;
    }
    result.digest_alg = Some(digest_alg);
    result.digest_encryption_alg = Some(encryption_alg);

    // The imprint covers the original signer's encrypted digest.
    let imprint = &cms.tst_info.message_imprint;
    let imprint_alg = digest_algorithm_from_oid(&imprint.hash_algorithm.algorithm);
    result.imprint_digest_alg = Some(imprint_alg);
    if imprint_alg == DigestAlgorithm::Unknown {
        return result;
    }
    match calculate_hash(imprint_alg, &[authenticode_encrypted_digest]) {
        Ok(computed) => result.hash_valid = Some(computed == imprint.hashed_message),
        Err(e) => {
            result.format_errors.add(e);
            return result;
        }
    }

    // The token's own message digest covers the TSTInfo bytes.
    match calculate_hash(digest_alg, &[cms.tst_raw]) {
        Ok(computed) => {
            match super::pkcs7::verify_message_digest_attribute(&computed, &attributes) {
                Ok(valid) => result.message_digest_valid = Some(valid),
                Err(_) => {
                    result
                        .format_errors
                        .add(Pkcs7FormatError::InvalidMessageDigest);
                    return result;
                }
            }
        }
        Err(e) => {
            result.format_errors.add(e);
            return result;
        }
    }

    let store = build_certificate_store(
        &cms.content_info.content,
        Some(&mut result.cert_store_warnings),
    );
    result.signature_result = verify_signer_signature(
        signer,
        &store,
        digest_alg,
        encryption_alg,
        &mut result.format_errors,
    );

    result.signing_time =
        chrono::DateTime::from_timestamp(cms.tst_info.gen_time.to_unix_duration().as_secs() as i64, 0);
    result
}

fn verify_counter_signature(
    authenticode_encrypted_digest: &[u8],
    signer: &SignerInfo<'_>,
    authenticode_store: &CertificateStore<'_>,
) -> TimestampSignatureCheckStatus {
    let mut result = TimestampSignatureCheckStatus::default();

    let mut digest_alg = DigestAlgorithm::Unknown;
    let mut encryption_alg = DigestEncryptionAlgorithm::Unknown;
    if !resolve_signer_algorithms(
        signer,
        &mut digest_alg,
        &mut encryption_alg,
        &mut result.format_errors,
    ) {
        result.digest_alg = Some(digest_alg);
        result.digest_encryption_alg = Some(encryption_alg);
        return result;
    }
    result.digest_alg = Some(digest_alg);
    result.digest_encryption_alg = Some(encryption_alg);

    let attributes = match authenticated_attributes(signer) {
        Ok(attributes) => attributes,
        Err(e) => {
            result.format_errors.add(e);
            return result;
        }
    };
    result.signing_time =
        validate_authenticated_attributes(&attributes, None, &mut result.format_errors);

    // The counter-signature's message digest covers the original
    // signer's encrypted digest directly.
    match calculate_hash(digest_alg, &[authenticode_encrypted_digest]) {
        Ok(computed) => {
            match super::pkcs7::verify_message_digest_attribute(&computed, &attributes) {
                Ok(valid) => result.hash_valid = Some(valid),
                Err(_) => {
                    result
                        .format_errors
                        .add(Pkcs7FormatError::InvalidMessageDigest);
                    return result;
                }
            }
        }
        Err(e) => {
            result.format_errors.add(e);
            return result;
        }
    }

    result.signature_result = verify_signer_signature(
        signer,
        authenticode_store,
        digest_alg,
        encryption_alg,
        &mut result.format_errors,
    );
    result
}
