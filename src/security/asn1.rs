//! Schema bindings for the CMS / PKCS#7 / X.509 / TSP structures the
//! Authenticode pipeline consumes, built on the `der` crate's streaming
//! reader.
//!
//! Every structure that later feeds a digest keeps the raw span it was
//! decoded from ([`RawTlv`]); Authenticode hashes concrete encoded bytes,
//! not re-serializations.
//!
//! Field names follow the ASN.1 member names of the defining RFCs.
#![allow(missing_docs)]

use der::asn1::{BitStringRef, GeneralizedTime, IntRef, ObjectIdentifier, OctetStringRef, UtcTime};
use der::{Decode, DecodeValue, Encode, ErrorKind, FixedTag, Header, Length, Reader, SliceReader, Tag};

/// A captured TLV: its tag, the full encoding (header + content) and the
/// content octets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawTlv<'a> {
    pub tag: Tag,
    /// The complete encoding, including tag and length octets.
    pub full: &'a [u8],
    /// The content octets only.
    pub value: &'a [u8],
}

impl<'a> Decode<'a> for RawTlv<'a> {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        let header = reader.peek_header()?;
        let header_len = header.encoded_len()?;
        let total = (header_len + header.length)?;
        let full = reader.read_slice(total)?;
        let value_len = usize::try_from(header.length)?;
        Ok(Self {
            tag: header.tag,
            full,
            value: &full[full.len() - value_len..],
        })
    }
}

impl<'a> RawTlv<'a> {
    /// The context-specific tag number, when the tag is context-specific.
    pub fn context_number(&self) -> Option<u8> {
        match self.tag {
            Tag::ContextSpecific { number, .. } => Some(number.value()),
            _ => None,
        }
    }

    /// `true` for a constructed encoding.
    pub fn is_constructed(&self) -> bool {
        matches!(
            self.tag,
            Tag::ContextSpecific { constructed: true, .. } | Tag::Sequence | Tag::Set
        )
    }

    /// Decodes a value from the content octets (EXPLICIT tagging).
    pub fn decode_inner<T: Decode<'a>>(&self) -> der::Result<T> {
        T::from_der(self.value)
    }

    fn expect(self, tag: Tag) -> der::Result<Self> {
        if self.tag != tag {
            return Err(der::Error::new(
                ErrorKind::TagUnexpected {
                    expected: Some(tag),
                    actual: self.tag,
                },
                Length::ZERO,
            ));
        }
        Ok(self)
    }
}

/// Reads the next TLV only when it carries the given context-specific
/// tag number.
fn peek_context<'a, R: Reader<'a>>(reader: &mut R, number: u8) -> der::Result<Option<RawTlv<'a>>> {
    if reader.is_finished() {
        return Ok(None);
    }
    match reader.peek_tag()? {
        Tag::ContextSpecific { number: n, .. } if n.value() == number => {
            RawTlv::decode(reader).map(Some)
        }
        _ => Ok(None),
    }
}

fn peek_tag_is<'a, R: Reader<'a>>(reader: &mut R, tag: Tag) -> der::Result<bool> {
    if reader.is_finished() {
        return Ok(false);
    }
    Ok(reader.peek_tag()? == tag)
}

/// An algorithm OID with optional raw parameters.
#[derive(Clone, Copy, Debug)]
pub struct AlgorithmIdentifier<'a> {
    pub algorithm: ObjectIdentifier,
    pub parameters: Option<RawTlv<'a>>,
}

impl PartialEq for AlgorithmIdentifier<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm
            && self.parameters.map(|p| p.full) == other.parameters.map(|p| p.full)
    }
}

impl Eq for AlgorithmIdentifier<'_> {}

impl<'a> DecodeValue<'a> for AlgorithmIdentifier<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let algorithm = ObjectIdentifier::decode(reader)?;
        let parameters = if reader.is_finished() {
            None
        } else {
            Some(RawTlv::decode(reader)?)
        };
        Ok(Self {
            algorithm,
            parameters,
        })
    }
}

impl FixedTag for AlgorithmIdentifier<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// DigestInfo: algorithm plus digest octets.
#[derive(Clone, Copy, Debug)]
pub struct DigestInfo<'a> {
    pub algorithm: AlgorithmIdentifier<'a>,
    pub digest: &'a [u8],
}

impl<'a> DecodeValue<'a> for DigestInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let algorithm = AlgorithmIdentifier::decode(reader)?;
        let digest = OctetStringRef::decode(reader)?.as_bytes();
        Ok(Self { algorithm, digest })
    }
}

impl FixedTag for DigestInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// One attribute: an OID and every value recorded for it.
#[derive(Clone, Debug)]
pub struct Attribute<'a> {
    pub oid: ObjectIdentifier,
    pub values: Vec<RawTlv<'a>>,
}

impl<'a> DecodeValue<'a> for Attribute<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let oid = ObjectIdentifier::decode(reader)?;
        let set = RawTlv::decode(reader)?.expect(Tag::Set)?;
        let mut values = Vec::new();
        let mut inner = SliceReader::new(set.value)?;
        while !inner.is_finished() {
            values.push(RawTlv::decode(&mut inner)?);
        }
        Ok(Self { oid, values })
    }
}

impl FixedTag for Attribute<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// A `[0]`/`[1]` IMPLICIT attribute set: the raw span (needed for the
/// authenticated-attributes digest) plus the parsed attributes.
#[derive(Clone, Debug)]
pub struct AttributesRef<'a> {
    pub raw: RawTlv<'a>,
    pub attributes: Vec<Attribute<'a>>,
}

fn parse_attributes(raw: RawTlv<'_>) -> der::Result<AttributesRef<'_>> {
    let mut attributes = Vec::new();
    let mut reader = SliceReader::new(raw.value)?;
    while !reader.is_finished() {
        attributes.push(Attribute::decode(&mut reader)?);
    }
    Ok(AttributesRef { raw, attributes })
}

/// How a SignerInfo names its certificate.
#[derive(Clone, Copy, Debug)]
pub enum SignerIdentifier<'a> {
    /// PKCS#7 form: issuer distinguished name plus serial number.
    IssuerAndSerial {
        /// The raw X.501 Name of the issuer.
        issuer: RawTlv<'a>,
        serial_number: IntRef<'a>,
    },
    /// CMS form: a subject key identifier. Authenticode cannot resolve
    /// this against its store.
    SubjectKeyIdentifier(RawTlv<'a>),
}

/// PKCS#7 / CMS SignerInfo.
#[derive(Clone, Debug)]
pub struct SignerInfo<'a> {
    pub version: u8,
    pub sid: SignerIdentifier<'a>,
    pub digest_algorithm: AlgorithmIdentifier<'a>,
    pub authenticated_attributes: Option<AttributesRef<'a>>,
    pub digest_encryption_algorithm: AlgorithmIdentifier<'a>,
    pub encrypted_digest: &'a [u8],
    pub unauthenticated_attributes: Option<AttributesRef<'a>>,
}

impl<'a> DecodeValue<'a> for SignerInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let version = u8::decode(reader)?;

        let sid = match reader.peek_tag()? {
            Tag::ContextSpecific { .. } => {
                SignerIdentifier::SubjectKeyIdentifier(RawTlv::decode(reader)?)
            }
            _ => {
                let seq = RawTlv::decode(reader)?.expect(Tag::Sequence)?;
                let mut inner = SliceReader::new(seq.value)?;
                let issuer = RawTlv::decode(&mut inner)?;
                let serial_number = IntRef::decode(&mut inner)?;
                SignerIdentifier::IssuerAndSerial {
                    issuer,
                    serial_number,
                }
            }
        };

        let digest_algorithm = AlgorithmIdentifier::decode(reader)?;
        let authenticated_attributes = peek_context(reader, 0)?
            .map(parse_attributes)
            .transpose()?;
        let digest_encryption_algorithm = AlgorithmIdentifier::decode(reader)?;
        let encrypted_digest = OctetStringRef::decode(reader)?.as_bytes();
        let unauthenticated_attributes = peek_context(reader, 1)?
            .map(parse_attributes)
            .transpose()?;

        Ok(Self {
            version,
            sid,
            digest_algorithm,
            authenticated_attributes,
            digest_encryption_algorithm,
            encrypted_digest,
            unauthenticated_attributes,
        })
    }
}

impl FixedTag for SignerInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// X.509 validity instant: UTCTime or GeneralizedTime.
#[derive(Clone, Copy, Debug)]
pub enum Time {
    Utc(UtcTime),
    Generalized(GeneralizedTime),
}

impl Time {
    /// Seconds since the Unix epoch.
    pub fn unix_seconds(&self) -> i64 {
        match self {
            Time::Utc(t) => t.to_unix_duration().as_secs() as i64,
            Time::Generalized(t) => t.to_unix_duration().as_secs() as i64,
        }
    }
}

impl<'a> Decode<'a> for Time {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        match reader.peek_tag()? {
            Tag::UtcTime => UtcTime::decode(reader).map(Time::Utc),
            _ => GeneralizedTime::decode(reader).map(Time::Generalized),
        }
    }
}

/// X.509 validity interval.
#[derive(Clone, Copy, Debug)]
pub struct Validity {
    pub not_before: Time,
    pub not_after: Time,
}

impl<'a> DecodeValue<'a> for Validity {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        Ok(Self {
            not_before: Time::decode(reader)?,
            not_after: Time::decode(reader)?,
        })
    }
}

impl FixedTag for Validity {
    const TAG: Tag = Tag::Sequence;
}

/// SubjectPublicKeyInfo: key algorithm (with curve parameters for EC
/// keys) and the raw public-key bytes.
#[derive(Clone, Copy, Debug)]
pub struct SubjectPublicKeyInfo<'a> {
    pub algorithm: AlgorithmIdentifier<'a>,
    pub subject_public_key: &'a [u8],
}

impl<'a> DecodeValue<'a> for SubjectPublicKeyInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let algorithm = AlgorithmIdentifier::decode(reader)?;
        let subject_public_key = BitStringRef::decode(reader)?.raw_bytes();
        Ok(Self {
            algorithm,
            subject_public_key,
        })
    }
}

impl FixedTag for SubjectPublicKeyInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// The to-be-signed portion of an X.509 certificate. Unique identifiers
/// and extensions are consumed but not modeled.
#[derive(Clone, Copy, Debug)]
pub struct TbsCertificate<'a> {
    pub version: u8,
    pub serial_number: IntRef<'a>,
    pub signature: AlgorithmIdentifier<'a>,
    /// The raw X.501 issuer Name; certificate-store keys compare these
    /// bytes exactly.
    pub issuer: RawTlv<'a>,
    pub validity: Validity,
    pub subject: RawTlv<'a>,
    pub spki: SubjectPublicKeyInfo<'a>,
}

impl<'a> DecodeValue<'a> for TbsCertificate<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let version = match peek_context(reader, 0)? {
            Some(wrapper) => u8::from_der(wrapper.value)?,
            None => 0,
        };
        let serial_number = IntRef::decode(reader)?;
        let signature = AlgorithmIdentifier::decode(reader)?;
        let issuer = RawTlv::decode(reader)?.expect(Tag::Sequence)?;
        let validity = Validity::decode(reader)?;
        let subject = RawTlv::decode(reader)?.expect(Tag::Sequence)?;
        let spki = SubjectPublicKeyInfo::decode(reader)?;
        while !reader.is_finished() {
            let _ = RawTlv::decode(reader)?;
        }
        Ok(Self {
            version,
            serial_number,
            signature,
            issuer,
            validity,
            subject,
            spki,
        })
    }
}

impl FixedTag for TbsCertificate<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// One X.509 certificate, keeping its full raw encoding.
#[derive(Clone, Copy, Debug)]
pub struct Certificate<'a> {
    pub raw: &'a [u8],
    pub tbs: TbsCertificate<'a>,
    pub signature_algorithm: AlgorithmIdentifier<'a>,
    pub signature: &'a [u8],
}

impl<'a> Decode<'a> for Certificate<'a> {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        let raw = RawTlv::decode(reader)?.expect(Tag::Sequence)?;
        let mut inner = SliceReader::new(raw.value)?;
        let tbs = TbsCertificate::decode(&mut inner)?;
        let signature_algorithm = AlgorithmIdentifier::decode(&mut inner)?;
        let signature = BitStringRef::decode(&mut inner)?.raw_bytes();
        Ok(Self {
            raw: raw.full,
            tbs,
            signature_algorithm,
            signature,
        })
    }
}

/// EncapsulatedContentInfo: the inner content type plus the raw `[0]`
/// EXPLICIT content wrapper.
#[derive(Clone, Copy, Debug)]
pub struct EncapContentInfo<'a> {
    pub content_type: ObjectIdentifier,
    /// The `[0]` wrapper TLV; its content octets hold the encapsulated
    /// value's own TLV.
    pub content: Option<RawTlv<'a>>,
}

impl<'a> DecodeValue<'a> for EncapContentInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let content_type = ObjectIdentifier::decode(reader)?;
        let content = peek_context(reader, 0)?;
        Ok(Self {
            content_type,
            content,
        })
    }
}

impl FixedTag for EncapContentInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// CMS / PKCS#7 SignedData.
#[derive(Clone, Debug)]
pub struct SignedData<'a> {
    pub version: u8,
    pub digest_algorithms: Vec<AlgorithmIdentifier<'a>>,
    pub encap_content_info: EncapContentInfo<'a>,
    /// `[0]` IMPLICIT certificate set; empty when the field is absent.
    pub certificates: Vec<Certificate<'a>>,
    /// `[1]` IMPLICIT CRL set, kept raw.
    pub crls: Option<RawTlv<'a>>,
    pub signer_infos: Vec<SignerInfo<'a>>,
}

impl<'a> DecodeValue<'a> for SignedData<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let version = u8::decode(reader)?;

        let algorithms_set = RawTlv::decode(reader)?.expect(Tag::Set)?;
        let mut digest_algorithms = Vec::new();
        let mut inner = SliceReader::new(algorithms_set.value)?;
        while !inner.is_finished() {
            digest_algorithms.push(AlgorithmIdentifier::decode(&mut inner)?);
        }

        let encap_content_info = EncapContentInfo::decode(reader)?;

        let mut certificates = Vec::new();
        if let Some(set) = peek_context(reader, 0)? {
            let mut inner = SliceReader::new(set.value)?;
            while !inner.is_finished() {
                // Other CertificateChoices variants (extended, attribute
                // certs) are skipped.
                match inner.peek_tag()? {
                    Tag::Sequence => certificates.push(Certificate::decode(&mut inner)?),
                    _ => {
                        let _ = RawTlv::decode(&mut inner)?;
                    }
                }
            }
        }
        let crls = peek_context(reader, 1)?;

        let signers_set = RawTlv::decode(reader)?.expect(Tag::Set)?;
        let mut signer_infos = Vec::new();
        let mut inner = SliceReader::new(signers_set.value)?;
        while !inner.is_finished() {
            signer_infos.push(SignerInfo::decode(&mut inner)?);
        }

        Ok(Self {
            version,
            digest_algorithms,
            encap_content_info,
            certificates,
            crls,
            signer_infos,
        })
    }
}

impl FixedTag for SignedData<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// The outermost PKCS#7 ContentInfo carrying a SignedData.
#[derive(Clone, Debug)]
pub struct ContentInfo<'a> {
    pub content_type: ObjectIdentifier,
    pub content: SignedData<'a>,
}

impl<'a> DecodeValue<'a> for ContentInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let content_type = ObjectIdentifier::decode(reader)?;
        let wrapper = RawTlv::decode(reader)?;
        let content = SignedData::from_der(wrapper.value)?;
        Ok(Self {
            content_type,
            content,
        })
    }
}

impl FixedTag for ContentInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// SpcLink: where Authenticode metadata points.
#[derive(Clone, Copy, Debug)]
pub enum SpcLink<'a> {
    /// `[0]` IMPLICIT IA5 URL.
    Url(&'a [u8]),
    /// `[1]` IMPLICIT SpcSerializedObject; carries the page hashes.
    Moniker(SpcSerializedObject<'a>),
    /// `[2]` EXPLICIT SpcString, kept raw.
    File(RawTlv<'a>),
}

/// A class id plus opaque serialized data.
#[derive(Clone, Copy, Debug)]
pub struct SpcSerializedObject<'a> {
    pub class_id: &'a [u8],
    pub serialized_data: &'a [u8],
}

fn decode_spc_link(tlv: RawTlv<'_>) -> der::Result<SpcLink<'_>> {
    match tlv.context_number() {
        Some(0) => Ok(SpcLink::Url(tlv.value)),
        Some(1) => {
            let mut inner = SliceReader::new(tlv.value)?;
            let class_id = OctetStringRef::decode(&mut inner)?.as_bytes();
            let serialized_data = OctetStringRef::decode(&mut inner)?.as_bytes();
            Ok(SpcLink::Moniker(SpcSerializedObject {
                class_id,
                serialized_data,
            }))
        }
        _ => Ok(SpcLink::File(tlv)),
    }
}

/// SpcPeImageData: image flags plus an optional link.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpcPeImageData<'a> {
    /// Raw SpcPeImageFlags bit-string content.
    pub flags: Option<&'a [u8]>,
    pub file: Option<SpcLink<'a>>,
}

impl<'a> DecodeValue<'a> for SpcPeImageData<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let flags = if peek_tag_is(reader, Tag::BitString)? {
            Some(BitStringRef::decode(reader)?.raw_bytes())
        } else {
            None
        };
        let file = if reader.is_finished() {
            None
        } else {
            let tlv = RawTlv::decode(reader)?;
            // `file` is normally wrapped in an extra `[0]` EXPLICIT tag;
            // a bare URL choice shares the number but is primitive.
            if tlv.context_number() == Some(0) && tlv.is_constructed() {
                let inner = RawTlv::from_der(tlv.value)?;
                Some(decode_spc_link(inner)?)
            } else {
                Some(decode_spc_link(tlv)?)
            }
        };
        Ok(Self { flags, file })
    }
}

impl FixedTag for SpcPeImageData<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// SpcAttributeTypeAndOptionalValue for PE image data.
#[derive(Clone, Copy, Debug)]
pub struct SpcAttributeTypeAndOptionalValue<'a> {
    pub value_type: ObjectIdentifier,
    pub value: Option<SpcPeImageData<'a>>,
}

impl<'a> DecodeValue<'a> for SpcAttributeTypeAndOptionalValue<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let value_type = ObjectIdentifier::decode(reader)?;
        let value = if peek_tag_is(reader, Tag::Sequence)? {
            Some(SpcPeImageData::decode(reader)?)
        } else {
            if !reader.is_finished() {
                let _ = RawTlv::decode(reader)?;
            }
            None
        };
        Ok(Self { value_type, value })
    }
}

impl FixedTag for SpcAttributeTypeAndOptionalValue<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// SpcIndirectDataContent: the signed Authenticode payload.
#[derive(Clone, Copy, Debug)]
pub struct SpcIndirectDataContent<'a> {
    pub data: SpcAttributeTypeAndOptionalValue<'a>,
    pub message_digest: DigestInfo<'a>,
}

impl<'a> DecodeValue<'a> for SpcIndirectDataContent<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        Ok(Self {
            data: SpcAttributeTypeAndOptionalValue::decode(reader)?,
            message_digest: DigestInfo::decode(reader)?,
        })
    }
}

impl FixedTag for SpcIndirectDataContent<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// SpcString: BMP (UTF-16BE) or IA5 text.
#[derive(Clone, Copy, Debug)]
pub enum SpcString<'a> {
    /// `[0]` IMPLICIT BMPSTRING.
    Unicode(&'a [u8]),
    /// `[1]` IMPLICIT IA5STRING.
    Ascii(&'a [u8]),
}

impl SpcString<'_> {
    /// Decodes to text, replacing invalid units.
    pub fn to_string_lossy(&self) -> String {
        match self {
            SpcString::Unicode(raw) => {
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
            SpcString::Ascii(raw) => String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

fn decode_spc_string(tlv: RawTlv<'_>) -> SpcString<'_> {
    match tlv.context_number() {
        Some(0) => SpcString::Unicode(tlv.value),
        _ => SpcString::Ascii(tlv.value),
    }
}

/// SpcSpOpusInfo: program name and more-info link from the authenticated
/// attributes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpcSpOpusInfo<'a> {
    pub program_name: Option<SpcString<'a>>,
    pub more_info: Option<SpcLink<'a>>,
}

impl<'a> DecodeValue<'a> for SpcSpOpusInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let mut info = SpcSpOpusInfo::default();
        if let Some(wrapper) = peek_context(reader, 0)? {
            let inner = RawTlv::from_der(wrapper.value)?;
            info.program_name = Some(decode_spc_string(inner));
        }
        if let Some(wrapper) = peek_context(reader, 1)? {
            let inner = RawTlv::from_der(wrapper.value)?;
            info.more_info = Some(decode_spc_link(inner)?);
        }
        Ok(info)
    }
}

impl FixedTag for SpcSpOpusInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// RFC 3161 message imprint.
#[derive(Clone, Copy, Debug)]
pub struct MessageImprint<'a> {
    pub hash_algorithm: AlgorithmIdentifier<'a>,
    pub hashed_message: &'a [u8],
}

impl<'a> DecodeValue<'a> for MessageImprint<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let hash_algorithm = AlgorithmIdentifier::decode(reader)?;
        let hashed_message = OctetStringRef::decode(reader)?.as_bytes();
        Ok(Self {
            hash_algorithm,
            hashed_message,
        })
    }
}

impl FixedTag for MessageImprint<'_> {
    const TAG: Tag = Tag::Sequence;
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// RFC 3161 accuracy; millis/micros are constrained to `[1, 999]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Accuracy {
    pub seconds: Option<u64>,
    pub millis: Option<u16>,
    pub micros: Option<u16>,
}

impl<'a> DecodeValue<'a> for Accuracy {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let mut accuracy = Accuracy::default();
        if peek_tag_is(reader, Tag::Integer)? {
            accuracy.seconds = Some(be_uint(IntRef::decode(reader)?.as_bytes()));
        }
        if let Some(tlv) = peek_context(reader, 0)? {
            accuracy.millis = Some(be_uint(tlv.value) as u16);
        }
        if let Some(tlv) = peek_context(reader, 1)? {
            accuracy.micros = Some(be_uint(tlv.value) as u16);
        }
        Ok(accuracy)
    }
}

impl FixedTag for Accuracy {
    const TAG: Tag = Tag::Sequence;
}

/// RFC 3161 TSTInfo.
#[derive(Clone, Copy, Debug)]
pub struct TstInfo<'a> {
    pub version: u8,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint<'a>,
    pub serial_number: IntRef<'a>,
    pub gen_time: GeneralizedTime,
    pub accuracy: Option<Accuracy>,
    pub ordering: bool,
    pub nonce: Option<IntRef<'a>>,
    /// `[0]` GeneralName of the TSA, kept raw.
    pub tsa: Option<RawTlv<'a>>,
}

impl<'a> DecodeValue<'a> for TstInfo<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        let version = u8::decode(reader)?;
        let policy = ObjectIdentifier::decode(reader)?;
        let message_imprint = MessageImprint::decode(reader)?;
        let serial_number = IntRef::decode(reader)?;
        let gen_time = GeneralizedTime::decode(reader)?;

        let accuracy = if peek_tag_is(reader, Tag::Sequence)? {
            Some(Accuracy::decode(reader)?)
        } else {
            None
        };
        let ordering = if peek_tag_is(reader, Tag::Boolean)? {
            bool::decode(reader)?
        } else {
            false
        };
        let nonce = if peek_tag_is(reader, Tag::Integer)? {
            Some(IntRef::decode(reader)?)
        } else {
            None
        };
        let tsa = peek_context(reader, 0)?;
        while !reader.is_finished() {
            let _ = RawTlv::decode(reader)?;
        }

        Ok(Self {
            version,
            policy,
            message_imprint,
            serial_number,
            gen_time,
            accuracy,
            ordering,
            nonce,
            tsa,
        })
    }
}

impl FixedTag for TstInfo<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// PKCS#1 RSAPublicKey.
#[derive(Clone, Copy, Debug)]
pub struct RsaPublicKey<'a> {
    pub modulus: der::asn1::UintRef<'a>,
    pub public_exponent: der::asn1::UintRef<'a>,
}

impl<'a> DecodeValue<'a> for RsaPublicKey<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, _header: Header) -> der::Result<Self> {
        Ok(Self {
            modulus: der::asn1::UintRef::decode(reader)?,
            public_exponent: der::asn1::UintRef::decode(reader)?,
        })
    }
}

impl FixedTag for RsaPublicKey<'_> {
    const TAG: Tag = Tag::Sequence;
}

/// Decodes a DER value from `bytes`, tolerating trailing bytes only when
/// they are all zero (padding emitted by some signers).
pub fn decode_with_zero_tail<'a, T: Decode<'a>>(bytes: &'a [u8]) -> der::Result<(T, usize)> {
    let mut reader = SliceReader::new(bytes)?;
    let tlv = RawTlv::decode(&mut reader)?;
    let value = T::from_der(tlv.full)?;
    let consumed = tlv.full.len();
    if bytes[consumed..].iter().any(|&b| b != 0) {
        return Err(der::Error::new(ErrorKind::TrailingData {
            decoded: Length::try_from(consumed)?,
            remaining: Length::try_from(bytes.len() - consumed)?,
        }, Length::try_from(consumed)?));
    }
    Ok((value, consumed))
}
