//! Structural validation of PKCS#7 and Authenticode signatures.
//!
//! Validation is best-effort: each violation appends its code and the
//! checks continue.

use chrono::{DateTime, Utc};
use der::asn1::ObjectIdentifier;
use der::Decode;

use crate::error::{AuthenticodeFormatError, ErrorList, Pkcs7FormatError};

use super::asn1::SignedData;
use super::oids;
use super::pkcs7::{decode_signing_time, AttributeMap, AuthenticodePkcs7};

/// SignedData version for plain PKCS#7.
pub const PKCS7_SIGNED_DATA_VERSION: u8 = 1;
/// SignedData version for CMS (timestamp counter-signatures).
pub const CMS_SIGNED_DATA_VERSION: u8 = 3;

/// Validates the invariants common to PKCS#7 and CMS SignedData: the
/// outer OID, the version, the one-signer/one-digest shape and the
/// digest-algorithm agreement between the two levels.
pub fn validate_signed_data(
    content_type: &ObjectIdentifier,
    signed_data: &SignedData<'_>,
    expected_version: u8,
    errors: &mut ErrorList,
) {
    if *content_type != oids::SIGNED_DATA {
        errors.add(Pkcs7FormatError::InvalidSignedDataOid);
    }
    if signed_data.version != expected_version {
        errors.add(Pkcs7FormatError::InvalidSignedDataVersion);
    }
    if signed_data.signer_infos.len() != 1 || signed_data.digest_algorithms.len() != 1 {
        errors.add(Pkcs7FormatError::InvalidSignerCount);
        return;
    }
    let signer = &signed_data.signer_infos[0];
    if signer.digest_algorithm != signed_data.digest_algorithms[0] {
        errors.add(Pkcs7FormatError::NonMatchingDigestAlgorithm);
    }
    if signer.version != 1 {
        errors.add(Pkcs7FormatError::InvalidSignerInfoVersion);
    }
}

/// Validates the Authenticode-specific structure on top of the PKCS#7
/// invariants: the SPC indirect-data content type, the PE-image-data
/// type value and the DigestInfo algorithm agreement.
pub fn validate_authenticode_format(signature: &AuthenticodePkcs7<'_>, errors: &mut ErrorList) {
    let signed_data = signature.signed_data();
    validate_signed_data(
        &signature.content_info.content_type,
        signed_data,
        PKCS7_SIGNED_DATA_VERSION,
        errors,
    );
    if signed_data.signer_infos.len() != 1 {
        return;
    }

    if signed_data.encap_content_info.content_type != oids::SPC_INDIRECT_DATA {
        errors.add(AuthenticodeFormatError::InvalidContentInfoOid);
    }

    let Some(indirect) = &signature.indirect_data else {
        errors.add(AuthenticodeFormatError::InvalidContentInfoOid);
        return;
    };
    if indirect.data.value_type != oids::SPC_PE_IMAGE_DATA {
        errors.add(AuthenticodeFormatError::InvalidTypeValueType);
    }
    if indirect.message_digest.algorithm != signed_data.signer_infos[0].digest_algorithm {
        errors.add(AuthenticodeFormatError::NonMatchingTypeValueDigestAlgorithm);
    }
}

/// Validates the authenticated attributes: `messageDigest` must exist,
/// `contentType` must exist (and equal `expected_content_type` when one
/// is given), and a present `signingTime` must decode.
///
/// Returns the decoded signing time, when present and valid.
pub fn validate_authenticated_attributes(
    attributes: &AttributeMap<'_>,
    expected_content_type: Option<&ObjectIdentifier>,
    errors: &mut ErrorList,
) -> Option<DateTime<Utc>> {
    match attributes.get_message_digest() {
        Ok(Some(_)) => {}
        Ok(None) => errors.add(Pkcs7FormatError::AbsentMessageDigest),
        Err(_) => errors.add(Pkcs7FormatError::InvalidMessageDigest),
    }

    match attributes.get_content_type() {
        Ok(Some(value)) => {
            if let Some(expected) = expected_content_type {
                match ObjectIdentifier::from_der(value.full) {
                    Ok(oid) if oid == *expected => {}
                    _ => errors.add(Pkcs7FormatError::InvalidContentType),
                }
            }
        }
        Ok(None) => errors.add(Pkcs7FormatError::AbsentContentType),
        Err(_) => errors.add(Pkcs7FormatError::InvalidContentType),
    }

    match attributes.get_signing_time() {
        Ok(Some(value)) => match decode_signing_time(&value) {
            Ok(time) => return Some(time),
            Err(_) => errors.add(Pkcs7FormatError::InvalidSigningTime),
        },
        Ok(None) => {}
        Err(_) => errors.add(Pkcs7FormatError::InvalidSigningTime),
    }
    None
}
