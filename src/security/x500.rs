//! Flat reading of X.501 distinguished names (certificate issuer and
//! subject fields).

use der::asn1::ObjectIdentifier;
use der::{Decode, Reader, SliceReader, Tag};

use crate::error::X500Error;

use super::asn1::RawTlv;

/// commonName
pub const CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
/// serialNumber
pub const SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");
/// countryName
pub const C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
/// localityName
pub const L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
/// stateOrProvinceName
pub const ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
/// organizationName
pub const O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
/// organizationalUnitName
pub const OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
/// emailAddress
pub const EMAIL_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// One attribute of a distinguished name, with its value decoded to
/// text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnComponent {
    /// The attribute type.
    pub oid: ObjectIdentifier,
    /// The attribute value, decoded to text.
    pub value: String,
}

/// A flattened RDNSequence: every attribute of every RDN, in encoding
/// order.
#[derive(Debug, Clone, Default)]
pub struct FlatDistinguishedName {
    components: Vec<DnComponent>,
}

impl FlatDistinguishedName {
    /// Parses the content octets of an X.501 Name (the raw issuer or
    /// subject captured during certificate decoding).
    pub fn parse(name: &RawTlv<'_>) -> Result<Self, X500Error> {
        let mut components = Vec::new();
        let mut reader =
            SliceReader::new(name.value).map_err(|_| X500Error::InvalidRdnSequence)?;

        while !reader.is_finished() {
            let rdn = RawTlv::decode(&mut reader).map_err(|_| X500Error::InvalidRdnSequence)?;
            if rdn.tag != Tag::Set {
                return Err(X500Error::InvalidRdnSequence);
            }
            let mut attrs =
                SliceReader::new(rdn.value).map_err(|_| X500Error::InvalidRdnSequence)?;
            while !attrs.is_finished() {
                let attr =
                    RawTlv::decode(&mut attrs).map_err(|_| X500Error::InvalidRdnSequence)?;
                if attr.tag != Tag::Sequence {
                    return Err(X500Error::InvalidRdnSequence);
                }
                let mut inner =
                    SliceReader::new(attr.value).map_err(|_| X500Error::InvalidRdnSequence)?;
                let oid = ObjectIdentifier::decode(&mut inner)
                    .map_err(|_| X500Error::InvalidRdnSequence)?;
                let value =
                    RawTlv::decode(&mut inner).map_err(|_| X500Error::InvalidRdnSequence)?;
                components.push(DnComponent {
                    oid,
                    value: directory_string(&value)?,
                });
            }
        }
        Ok(Self { components })
    }

    /// Every component, in encoding order.
    pub fn components(&self) -> &[DnComponent] {
        &self.components
    }

    /// Every value recorded for an attribute type.
    pub fn all(&self, oid: &ObjectIdentifier) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| c.oid == *oid)
            .map(|c| c.value.as_str())
            .collect()
    }

    /// The unique value of an attribute type; duplicates are an error.
    pub fn get_unique(&self, oid: &ObjectIdentifier) -> Result<Option<&str>, X500Error> {
        let values = self.all(oid);
        match values.as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(value)),
            _ => Err(X500Error::DuplicateAttribute),
        }
    }

    /// The common name, when unique.
    pub fn common_name(&self) -> Result<Option<&str>, X500Error> {
        self.get_unique(&CN)
    }

    /// The organization, when unique.
    pub fn organization(&self) -> Result<Option<&str>, X500Error> {
        self.get_unique(&O)
    }

    /// The country, when unique.
    pub fn country(&self) -> Result<Option<&str>, X500Error> {
        self.get_unique(&C)
    }
}

/// Decodes a DirectoryString (or the IA5/T61 escape hatches real
/// certificates use).
fn directory_string(value: &RawTlv<'_>) -> Result<String, X500Error> {
    match value.tag {
        Tag::PrintableString | Tag::Utf8String | Tag::Ia5String | Tag::TeletexString => {
            Ok(String::from_utf8_lossy(value.value).into_owned())
        }
        Tag::BmpString => {
            let units: Vec<u16> = value
                .value
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        }
        _ => Err(X500Error::InvalidDirectoryString),
    }
}
