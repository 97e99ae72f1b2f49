//! PKCS#7 content access: the Authenticode signature wrapper, the
//! attribute map and the message/attribute digest helpers.

use std::collections::HashMap;

use der::asn1::{GeneralizedTime, ObjectIdentifier, OctetStringRef, UtcTime};
use der::{Decode, Tag};

use crate::error::{
    AttributeMapError, BufferHashError, PeErrorCode, Pkcs7FormatError, SignerInfoError,
};

use super::asn1::{
    AttributesRef, ContentInfo, RawTlv, SignerInfo, SpcIndirectDataContent,
};
use super::crypto::{digest_algorithm_from_oid, DigestAlgorithm};
use super::hash::calculate_hash;
use super::oids;

/// A decoded Authenticode signature: the PKCS#7 content info plus the
/// resolved SPC indirect data (when its encapsulated content decodes).
#[derive(Clone, Debug)]
pub struct AuthenticodePkcs7<'a> {
    /// The decoded PKCS#7 ContentInfo.
    pub content_info: ContentInfo<'a>,
    /// The decoded SpcIndirectDataContent, when present and well formed.
    pub indirect_data: Option<SpcIndirectDataContent<'a>>,
    /// Content octets of the SpcIndirectDataContent; the input of the
    /// signed message digest.
    pub raw_signed_content: Option<&'a [u8]>,
}

impl<'a> AuthenticodePkcs7<'a> {
    /// Wraps a decoded content info, resolving the encapsulated SPC
    /// indirect data.
    pub fn new(content_info: ContentInfo<'a>) -> Self {
        let mut indirect_data = None;
        let mut raw_signed_content = None;
        if let Some(wrapper) = content_info.content.encap_content_info.content {
            if let Ok(inner) = RawTlv::from_der(wrapper.value) {
                raw_signed_content = Some(inner.value);
                indirect_data = SpcIndirectDataContent::from_der(inner.full).ok();
            }
        }
        Self {
            content_info,
            indirect_data,
            raw_signed_content,
        }
    }

    /// The SignedData inside the content info.
    pub fn signed_data(&self) -> &super::asn1::SignedData<'a> {
        &self.content_info.content
    }

    /// The only signer of a well-formed Authenticode signature.
    pub fn signer(&self, index: usize) -> Option<&SignerInfo<'a>> {
        self.content_info.content.signer_infos.get(index)
    }

    /// The signed image digest carried inside the SPC indirect data.
    pub fn image_hash(&self) -> Option<&'a [u8]> {
        self.indirect_data.map(|data| data.message_digest.digest)
    }
}

/// All values of every attribute, keyed by OID. Duplicate OIDs are
/// rejected at construction.
#[derive(Clone, Debug, Default)]
pub struct AttributeMap<'a> {
    map: HashMap<ObjectIdentifier, Vec<RawTlv<'a>>>,
}

impl<'a> AttributeMap<'a> {
    /// Builds the map from a decoded attribute set.
    pub fn from_attributes(attributes: &AttributesRef<'a>) -> Result<Self, SignerInfoError> {
        let mut map = HashMap::with_capacity(attributes.attributes.len());
        for attribute in &attributes.attributes {
            if map
                .insert(attribute.oid, attribute.values.clone())
                .is_some()
            {
                return Err(SignerInfoError::DuplicateAttributeOid);
            }
        }
        Ok(Self { map })
    }

    /// The single value of an attribute. Fails when the attribute carries
    /// no value or several.
    pub fn get_attribute(
        &self,
        oid: &ObjectIdentifier,
    ) -> Result<Option<RawTlv<'a>>, AttributeMapError> {
        let Some(values) = self.map.get(oid) else {
            return Ok(None);
        };
        match values.as_slice() {
            [] => Err(AttributeMapError::AbsentAttributeValue),
            [value] => Ok(Some(*value)),
            _ => Err(AttributeMapError::MultipleAttributeValues),
        }
    }

    /// Every value of an attribute, in declaration order.
    pub fn get_attributes(&self, oid: &ObjectIdentifier) -> Option<&[RawTlv<'a>]> {
        self.map.get(oid).map(Vec::as_slice)
    }

    /// The PKCS#9 message-digest attribute value.
    pub fn get_message_digest(&self) -> Result<Option<RawTlv<'a>>, AttributeMapError> {
        self.get_attribute(&oids::MESSAGE_DIGEST)
    }

    /// The PKCS#9 content-type attribute value.
    pub fn get_content_type(&self) -> Result<Option<RawTlv<'a>>, AttributeMapError> {
        self.get_attribute(&oids::CONTENT_TYPE)
    }

    /// The PKCS#9 signing-time attribute value.
    pub fn get_signing_time(&self) -> Result<Option<RawTlv<'a>>, AttributeMapError> {
        self.get_attribute(&oids::SIGNING_TIME)
    }

    /// `true` when no attributes were recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Builds the authenticated-attributes map of a signer; absent attributes
/// yield an empty map.
pub fn authenticated_attributes<'a>(
    signer: &SignerInfo<'a>,
) -> Result<AttributeMap<'a>, SignerInfoError> {
    signer
        .authenticated_attributes
        .as_ref()
        .map(AttributeMap::from_attributes)
        .unwrap_or_else(|| Ok(AttributeMap::default()))
}

/// Builds the unauthenticated-attributes map of a signer.
pub fn unauthenticated_attributes<'a>(
    signer: &SignerInfo<'a>,
) -> Result<AttributeMap<'a>, SignerInfoError> {
    signer
        .unauthenticated_attributes
        .as_ref()
        .map(AttributeMap::from_attributes)
        .unwrap_or_else(|| Ok(AttributeMap::default()))
}

/// The signer's digest algorithm.
pub fn signer_digest_algorithm(signer: &SignerInfo<'_>) -> DigestAlgorithm {
    digest_algorithm_from_oid(&signer.digest_algorithm.algorithm)
}

/// Hashes the raw signed content parts under the signer's digest
/// algorithm.
pub fn calculate_message_digest(
    algorithm: DigestAlgorithm,
    raw_signed_content: &[&[u8]],
) -> Result<Vec<u8>, BufferHashError> {
    calculate_hash(algorithm, raw_signed_content)
}

/// Compares a computed message digest against the `messageDigest`
/// authenticated attribute (an OCTET STRING).
pub fn verify_message_digest_attribute(
    message_digest: &[u8],
    authenticated_attributes: &AttributeMap<'_>,
) -> Result<bool, PeErrorCode> {
    let Some(value) = authenticated_attributes.get_message_digest()? else {
        return Err(Pkcs7FormatError::AbsentMessageDigest.into());
    };
    let octets = OctetStringRef::from_der(value.full)
        .map_err(|_| PeErrorCode::from(Pkcs7FormatError::InvalidMessageDigest))?;
    Ok(octets.as_bytes() == message_digest)
}

/// Hashes the authenticated-attributes blob after replacing the leading
/// implicit `[0]` tag octet with the universal `SET OF` tag (`0x31`) —
/// Authenticode's documented quirk: the signature covers the attributes
/// as if they were encoded as a SET OF.
pub fn authenticated_attributes_digest(
    algorithm: DigestAlgorithm,
    raw_attributes: &[u8],
) -> Result<Vec<u8>, BufferHashError> {
    const SET_OF_TAG: [u8; 1] = [0x31];
    if raw_attributes.is_empty() {
        return calculate_hash(algorithm, &[]);
    }
    calculate_hash(algorithm, &[&SET_OF_TAG, &raw_attributes[1..]])
}

/// The authenticated-attributes digest of a signer; fails when the
/// signer carries no authenticated attributes.
pub fn calculate_authenticated_attributes_digest(
    signer: &SignerInfo<'_>,
) -> Result<Vec<u8>, PeErrorCode> {
    let attributes = signer
        .authenticated_attributes
        .as_ref()
        .ok_or(SignerInfoError::AbsentAuthenticatedAttributes)?;
    authenticated_attributes_digest(signer_digest_algorithm(signer), attributes.raw.full)
        .map_err(Into::into)
}

/// A signing-time attribute value: UTCTime or GeneralizedTime.
pub fn decode_signing_time(value: &RawTlv<'_>) -> Result<chrono::DateTime<chrono::Utc>, PeErrorCode> {
    let seconds = match value.tag {
        Tag::UtcTime => UtcTime::from_der(value.full)
            .map_err(|_| PeErrorCode::from(Pkcs7FormatError::InvalidSigningTime))?
            .to_unix_duration()
            .as_secs() as i64,
        Tag::GeneralizedTime => GeneralizedTime::from_der(value.full)
            .map_err(|_| PeErrorCode::from(Pkcs7FormatError::InvalidSigningTime))?
            .to_unix_duration()
            .as_secs() as i64,
        _ => return Err(Pkcs7FormatError::InvalidSigningTime.into()),
    };
    chrono::DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| Pkcs7FormatError::InvalidSigningTime.into())
}
