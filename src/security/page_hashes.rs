//! Extraction of the page-hash attribute embedded in the SPC serialized
//! object.

use der::asn1::{ObjectIdentifier, OctetStringRef};
use der::{Decode, Reader, SliceReader, Tag};

use crate::error::{AuthenticodeVerifierError, PeErrorCode};

use super::asn1::{RawTlv, SpcLink};
use super::crypto::DigestAlgorithm;
use super::oids;
use super::pkcs7::AuthenticodePkcs7;

/// The raw page hashes stored inside a signature.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticodePageHashes<'a> {
    /// SHA-1 for the v1 attribute, SHA-256 for v2.
    pub algorithm: DigestAlgorithm,
    /// Concatenated `(u32 file offset, digest)` records.
    pub raw: &'a [u8],
}

impl AuthenticodePageHashes<'_> {
    /// `true` when the blob is non-empty, whole in records and carries a
    /// digest the declared algorithm produces.
    pub fn is_valid(&self, image_digest: DigestAlgorithm) -> bool {
        let digest_size = self.algorithm.digest_size();
        if digest_size == 0 || self.raw.is_empty() {
            return false;
        }
        // The page-hash algorithm tracks the image digest algorithm
        // (v1 signatures pair SHA-1 with SHA-1, v2 SHA-256 with SHA-256).
        if self.algorithm != image_digest {
            return false;
        }
        self.raw.len() % (digest_size + 4) == 0
    }
}

/// Pulls the page hashes out of the SpcSerializedObject moniker, when
/// the signature carries them.
pub fn get_page_hashes<'a>(
    signature: &AuthenticodePkcs7<'a>,
) -> Result<Option<AuthenticodePageHashes<'a>>, PeErrorCode> {
    let Some(indirect) = &signature.indirect_data else {
        return Ok(None);
    };
    let Some(image_data) = &indirect.data.value else {
        return Ok(None);
    };
    let Some(SpcLink::Moniker(moniker)) = &image_data.file else {
        return Ok(None);
    };
    if moniker.class_id != oids::PAGE_HASHES_CLASS_ID {
        return Ok(None);
    }

    parse_serialized_page_hashes(moniker.serialized_data).map(Some)
}

/// The serialized data is a SET (or SEQUENCE) of
/// `SpcAttributeTypeAndOptionalValue`-shaped entries: an OID naming the
/// page-hash version and a SET OF OCTET STRING holding the blob. A valid
/// attribute carries exactly one entry with exactly one blob.
fn parse_serialized_page_hashes(
    serialized_data: &[u8],
) -> Result<AuthenticodePageHashes<'_>, PeErrorCode> {
    let invalid = || PeErrorCode::from(AuthenticodeVerifierError::InvalidPageHashFormat);

    let outer = RawTlv::from_der(serialized_data).map_err(|_| invalid())?;
    if outer.tag != Tag::Set && outer.tag != Tag::Sequence {
        return Err(invalid());
    }

    let mut entries = Vec::new();
    let mut reader = SliceReader::new(outer.value).map_err(|_| invalid())?;
    while !reader.is_finished() {
        let entry = RawTlv::decode(&mut reader).map_err(|_| invalid())?;
        if entry.tag != Tag::Sequence {
            return Err(invalid());
        }
        let mut inner = SliceReader::new(entry.value).map_err(|_| invalid())?;
        let oid = ObjectIdentifier::decode(&mut inner).map_err(|_| invalid())?;
        let set = RawTlv::decode(&mut inner).map_err(|_| invalid())?;
        if set.tag != Tag::Set {
            return Err(invalid());
        }
        let mut hashes = Vec::new();
        let mut values = SliceReader::new(set.value).map_err(|_| invalid())?;
        while !values.is_finished() {
            hashes.push(
                OctetStringRef::decode(&mut values)
                    .map_err(|_| invalid())?
                    .as_bytes(),
            );
        }
        entries.push((oid, hashes));
    }

    let [(oid, hashes)] = entries.as_slice() else {
        return Err(invalid());
    };
    let [raw] = hashes.as_slice() else {
        return Err(invalid());
    };

    let algorithm = if *oid == oids::SPC_PAGE_HASHES_V1 {
        DigestAlgorithm::Sha1
    } else if *oid == oids::SPC_PAGE_HASHES_V2 {
        DigestAlgorithm::Sha256
    } else {
        return Err(invalid());
    };

    Ok(AuthenticodePageHashes { algorithm, raw })
}
