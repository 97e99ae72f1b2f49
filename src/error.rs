use thiserror::Error;

/// Byte-range access errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A read touched bytes outside the physical part of the buffer.
    #[error("read past the end of the buffer")]
    BufferOverrun,
}

/// DOS header errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosHeaderError {
    /// `e_magic` is not `MZ`.
    #[error("invalid DOS header magic")]
    InvalidMagic,
    /// `e_lfanew` points before the end of the DOS header or past the buffer.
    #[error("invalid e_lfanew value")]
    InvalidELfanew,
    /// The buffer is too small to hold a DOS header.
    #[error("unable to read the DOS header")]
    UnableToRead,
}

/// DOS stub errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosStubError {
    /// The stub bytes between the DOS header and `e_lfanew` are unreadable.
    #[error("unable to read the DOS stub")]
    UnableToRead,
}

/// NT signature errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSignatureError {
    /// The four signature bytes are not `PE\0\0`.
    #[error("invalid PE signature")]
    InvalidPeSignature,
    /// The signature bytes are unreadable.
    #[error("unable to read the PE signature")]
    UnableToRead,
}

/// COFF file header errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileHeaderError {
    /// The file header record is unreadable.
    #[error("unable to read the file header")]
    UnableToRead,
}

/// Optional header errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalHeaderError {
    /// The optional-header magic is neither PE32 nor PE32+.
    #[error("invalid PE magic value")]
    InvalidPeMagic,
    /// The optional header record is unreadable.
    #[error("unable to read the optional header")]
    UnableToRead,
    /// `image_base` is not a multiple of 64 KiB.
    #[error("image base is not aligned to 64 KiB")]
    UnalignedImageBase,
    /// An image without relocations crosses the 2 GiB boundary.
    #[error("image base is too large for an image without relocations")]
    TooLargeImageBase,
    /// `file_alignment` is not a power of two.
    #[error("file alignment is not a power of two")]
    IncorrectFileAlignment,
    /// `file_alignment` is outside the allowed range.
    #[error("file alignment is out of range")]
    FileAlignmentOutOfRange,
    /// `section_alignment` is not a power of two.
    #[error("section alignment is not a power of two")]
    IncorrectSectionAlignment,
    /// `section_alignment` is smaller than `file_alignment`.
    #[error("section alignment is out of range")]
    SectionAlignmentOutOfRange,
    /// `size_of_headers` exceeds `section_alignment` or `size_of_image`.
    #[error("invalid size of headers")]
    InvalidSizeOfHeaders,
    /// `address_of_entry_point` lies inside the headers.
    #[error("invalid address of entry point")]
    InvalidAddressOfEntryPoint,
    /// The declared data-directory count exceeds 16.
    #[error("invalid number of RVA and sizes")]
    InvalidNumberOfRvaAndSizes,
}

/// Data-directory table errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirectoriesError {
    /// The directory table is unreadable.
    #[error("unable to read the data directories")]
    UnableToRead,
}

/// Section table and section data errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionError {
    /// The section table is unreadable.
    #[error("unable to read the section table")]
    UnableToReadTable,
    /// A section's raw data lies outside the file.
    #[error("invalid section raw data pointer or size")]
    InvalidRawData,
    /// A section's raw bytes are unreadable.
    #[error("unable to read section data")]
    UnableToReadData,
}

/// Image-level errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// No section (or header range) backs the requested address.
    #[error("section data does not exist at the requested address")]
    SectionDataDoesNotExist,
    /// The requested write does not fit the target location.
    #[error("data does not fit at the requested address")]
    DataDoesNotFit,
}

/// Address conversion errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressConverterError {
    /// The conversion would wrap the pointer width.
    #[error("address conversion overflow")]
    AddressConversionOverflow,
}

/// Debug directory loader errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugDirectoryError {
    /// An entry declares neither a usable RVA nor a usable file offset.
    #[error("debug entry has no valid RVA and no valid file offset")]
    NoRvaAndFileOffset,
    /// An entry's file offset does not point at loadable data.
    #[error("invalid debug entry file offset")]
    InvalidFileOffset,
    /// The directory size is not a multiple of the descriptor size.
    #[error("invalid debug directory size")]
    InvalidDebugDirectorySize,
    /// The directory size exceeds the descriptor count it declares.
    #[error("excessive data in debug directory")]
    ExcessiveDataInDirectory,
    /// The descriptor list could not be read at all.
    #[error("unable to load debug directory entries")]
    UnableToLoadEntries,
    /// An entry's payload could not be read.
    #[error("unable to load debug entry raw data")]
    UnableToLoadRawData,
    /// An entry's RVA and file offset refer to different bytes.
    #[error("debug entry RVA and file offset do not match")]
    RvaAndFileOffsetDoNotMatch,
    /// More descriptors than `max_debug_directories`.
    #[error("too many debug directories")]
    TooManyDebugDirectories,
    /// An entry's payload exceeds `max_raw_data_size`.
    #[error("debug entry raw data is too big")]
    TooBigRawData,
    /// An entry's typed payload does not match its declared format.
    #[error("invalid debug directory entry")]
    InvalidEntry,
}

/// TLS directory loader errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsDirectoryError {
    /// The TLS directory record is unreadable.
    #[error("invalid TLS directory")]
    InvalidDirectory,
    /// The callback list is unreadable or unterminated.
    #[error("invalid TLS callbacks")]
    InvalidCallbacks,
    /// The raw data range is inverted or unreadable.
    #[error("invalid TLS raw data")]
    InvalidRawData,
    /// More callbacks than `max_callbacks`.
    #[error("too many TLS callbacks")]
    TooManyCallbacks,
    /// The raw data slice exceeds `max_raw_data_size`.
    #[error("TLS raw data is too big")]
    TooBigRawData,
}

/// Security (certificate table) directory loader errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityDirectoryError {
    /// The directory does not point at a readable file region.
    #[error("invalid security directory")]
    InvalidDirectory,
    /// The directory size cannot hold a single certificate header.
    #[error("invalid security directory size")]
    InvalidDirectorySize,
    /// The directory file offset is not 8-byte aligned.
    #[error("unaligned security directory")]
    UnalignedDirectory,
    /// An entry's declared length is too small or crosses the directory end.
    #[error("invalid certificate entry size")]
    InvalidEntrySize,
    /// An entry's certificate payload is unreadable.
    #[error("invalid certificate data")]
    InvalidCertificateData,
    /// More entries than `max_entries`.
    #[error("too many certificate entries")]
    TooManyEntries,
}

/// Authenticode signature loader errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticodeLoaderError {
    /// The WIN_CERTIFICATE type is not PKCS_SIGNED_DATA.
    #[error("unsupported security certificate type")]
    UnsupportedCertificateType,
    /// The PKCS#7 DER blob could not be decoded.
    #[error("unable to read the PKCS#7 Authenticode DER")]
    UnableToReadDer,
    /// A borrowed decode was requested over a non-contiguous buffer.
    #[error("PKCS#7 Authenticode DER buffer is not contiguous")]
    BufferIsNotContiguous,
}

/// Authenticode verifier errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticodeVerifierError {
    /// The page-hash attribute blob is malformed.
    #[error("invalid page hash format")]
    InvalidPageHashFormat,
    /// The image geometry prevents hashing.
    #[error("invalid image format for hashing")]
    InvalidImageFormatForHashing,
    /// The security directory itself carried loader errors.
    #[error("image security directory has errors")]
    ImageSecurityDirectoryHasErrors,
    /// The embedded signature failed to decode.
    #[error("invalid Authenticode signature format")]
    InvalidAuthenticodeSignatureFormat,
    /// The page-hash blob exceeds `max_page_hashes_size`.
    #[error("page hashes data is too big")]
    PageHashesDataTooBig,
}

/// PKCS#7 structural validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pkcs7FormatError {
    /// The outer content-type OID is not signed-data.
    #[error("invalid signed data OID")]
    InvalidSignedDataOid,
    /// SignedData version is not 1 (PKCS#7) or 3 (CMS).
    #[error("invalid signed data version")]
    InvalidSignedDataVersion,
    /// Not exactly one signer and one digest algorithm.
    #[error("invalid signer count")]
    InvalidSignerCount,
    /// SignedData and SignerInfo digest algorithms differ.
    #[error("digest algorithm of signed data does not match digest algorithm of signer info")]
    NonMatchingDigestAlgorithm,
    /// SignerInfo version is not 1.
    #[error("invalid signer info version")]
    InvalidSignerInfoVersion,
    /// The message-digest authenticated attribute is missing.
    #[error("absent message digest attribute")]
    AbsentMessageDigest,
    /// The message-digest authenticated attribute is malformed.
    #[error("invalid message digest attribute")]
    InvalidMessageDigest,
    /// The content-type authenticated attribute is missing.
    #[error("absent content type attribute")]
    AbsentContentType,
    /// The content-type authenticated attribute carries the wrong OID.
    #[error("invalid content type attribute value")]
    InvalidContentType,
    /// The signing-time authenticated attribute is malformed.
    #[error("invalid signing time attribute")]
    InvalidSigningTime,
}

/// Authenticode-specific format validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticodeFormatError {
    /// The inner content-type OID is not SPC indirect data.
    #[error("invalid content info OID")]
    InvalidContentInfoOid,
    /// The SpcAttributeTypeAndOptionalValue type is not SPC PE image data.
    #[error("invalid SpcAttributeTypeAndOptionalValue type")]
    InvalidTypeValueType,
    /// The DigestInfo algorithm differs from the signer digest algorithm.
    #[error("digest algorithm of signer info does not match digest algorithm of DigestInfo")]
    NonMatchingTypeValueDigestAlgorithm,
    /// The opus-info attribute is malformed.
    #[error("invalid program info attribute")]
    InvalidProgramInfo,
}

/// Signer-info errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerInfoError {
    /// The same attribute OID appears twice.
    #[error("duplicate attribute OID")]
    DuplicateAttributeOid,
    /// The signer has no authenticated attributes at all.
    #[error("absent authenticated attributes")]
    AbsentAuthenticatedAttributes,
}

/// Attribute-map lookup errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMapError {
    /// The attribute exists but carries no value.
    #[error("absent attribute value")]
    AbsentAttributeValue,
    /// The attribute carries more than one value.
    #[error("multiple attribute values")]
    MultipleAttributeValues,
}

/// Certificate store construction warnings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStoreError {
    /// The signature embeds no certificates.
    #[error("no certificates are present in the Authenticode signature")]
    AbsentCertificates,
    /// The same (serial, issuer) pair appears twice; the first entry wins.
    #[error("duplicate certificates are present in the Authenticode signature")]
    DuplicateCertificates,
}

/// Low-level signature validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureValidatorError {
    /// The public-key blob failed to decode.
    #[error("invalid digital signature")]
    InvalidSignature,
    /// The digest/encryption algorithm combination is not supported.
    #[error("unsupported digital signature or hash algorithm")]
    UnsupportedSignatureAlgorithm,
}

/// Signature verifier errors (certificate resolution layer).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureVerifierError {
    /// No certificate in the store matches the signer identifier.
    #[error("signing certificate is absent")]
    AbsentSigningCert,
    /// The CMS signer lacks the issuer-and-serial-number identifier form.
    #[error("signing certificate issuer and serial number are absent")]
    AbsentSigningCertIssuerAndSn,
    /// The crypto primitive failed outright.
    #[error("unable to verify signature")]
    UnableToVerifySignature,
}

/// Crypto algorithm resolution errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoAlgorithmError {
    /// The digest algorithm OID is unknown.
    #[error("unsupported digest (hash) algorithm")]
    UnsupportedDigestAlgorithm,
    /// The digest-encryption algorithm OID is unknown.
    #[error("unsupported digest encryption algorithm")]
    UnsupportedDigestEncryptionAlgorithm,
    /// A combined signature OID names a hash that differs from the declared one.
    #[error("signature algorithm hash does not match the declared digest algorithm")]
    SignatureHashAndDigestAlgorithmMismatch,
}

/// Multi-part buffer hashing errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHashError {
    /// The digest algorithm has no implementation.
    #[error("unsupported hash algorithm")]
    UnsupportedHashAlgorithm,
}

/// Image hash calculation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCalculatorError {
    /// The security directory offset lies outside the file.
    #[error("invalid security directory offset")]
    InvalidSecurityDirectoryOffset,
    /// A section's raw data cannot be hashed.
    #[error("invalid section data")]
    InvalidSectionData,
    /// The header or overlay bytes cannot be read.
    #[error("unable to read image data")]
    UnableToReadImageData,
    /// The digest algorithm has no implementation.
    #[error("unsupported hash algorithm")]
    UnsupportedHashAlgorithm,
}

/// Timestamp counter-signature errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSignatureError {
    /// The PKCS#7/CMS timestamp blob failed to decode.
    #[error("unable to read the PKCS#7/CMS timestamp signature ASN.1 DER")]
    InvalidTimestampSignatureAsn1Der,
    /// TSTInfo version is not 1.
    #[error("invalid TSTInfo version")]
    InvalidTstInfoVersion,
    /// An accuracy component lies outside [1, 999].
    #[error("invalid TSTInfo accuracy")]
    InvalidTimestampAccuracy,
}

/// X.500 distinguished-name reader errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum X500Error {
    /// The RDNSequence is structurally malformed.
    #[error("invalid RDN sequence")]
    InvalidRdnSequence,
    /// The same attribute type appears twice in the flattened view.
    #[error("duplicate distinguished name attribute")]
    DuplicateAttribute,
    /// An attribute value is not a decodable directory string.
    #[error("invalid directory string")]
    InvalidDirectoryString,
}

/// Umbrella error code covering every subsystem.
///
/// Recoverable codes accumulate in an [`ErrorList`]; unrecoverable ones are
/// returned through `Result` from the operation that hit them.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
#[allow(missing_docs)] // every variant transparently wraps a documented enum
pub enum PeErrorCode {
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    DosHeader(#[from] DosHeaderError),
    #[error(transparent)]
    DosStub(#[from] DosStubError),
    #[error(transparent)]
    ImageSignature(#[from] ImageSignatureError),
    #[error(transparent)]
    FileHeader(#[from] FileHeaderError),
    #[error(transparent)]
    OptionalHeader(#[from] OptionalHeaderError),
    #[error(transparent)]
    DataDirectories(#[from] DataDirectoriesError),
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    AddressConverter(#[from] AddressConverterError),
    #[error(transparent)]
    DebugDirectory(#[from] DebugDirectoryError),
    #[error(transparent)]
    TlsDirectory(#[from] TlsDirectoryError),
    #[error(transparent)]
    SecurityDirectory(#[from] SecurityDirectoryError),
    #[error(transparent)]
    AuthenticodeLoader(#[from] AuthenticodeLoaderError),
    #[error(transparent)]
    AuthenticodeVerifier(#[from] AuthenticodeVerifierError),
    #[error(transparent)]
    Pkcs7Format(#[from] Pkcs7FormatError),
    #[error(transparent)]
    AuthenticodeFormat(#[from] AuthenticodeFormatError),
    #[error(transparent)]
    SignerInfo(#[from] SignerInfoError),
    #[error(transparent)]
    AttributeMap(#[from] AttributeMapError),
    #[error(transparent)]
    CertificateStore(#[from] CertificateStoreError),
    #[error(transparent)]
    SignatureValidator(#[from] SignatureValidatorError),
    #[error(transparent)]
    SignatureVerifier(#[from] SignatureVerifierError),
    #[error(transparent)]
    CryptoAlgorithm(#[from] CryptoAlgorithmError),
    #[error(transparent)]
    BufferHash(#[from] BufferHashError),
    #[error(transparent)]
    HashCalculator(#[from] HashCalculatorError),
    #[error(transparent)]
    TimestampSignature(#[from] TimestampSignatureError),
    #[error(transparent)]
    X500(#[from] X500Error),
}

/// One recorded anomaly: the code plus an optional numeric context
/// (typically the index of the entry that produced it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    /// What went wrong.
    pub code: PeErrorCode,
    /// Typically the index of the entry that produced the code.
    pub context: Option<u32>,
}

/// Append-only list of recoverable anomalies attached to an aggregate.
///
/// Parsers never fail across a recoverable boundary; they record the code
/// here and continue with best-effort defaults. Insertion order is
/// deterministic for identical inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorList {
    entries: Vec<ErrorEntry>,
}

impl ErrorList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a code with no context.
    pub fn add(&mut self, code: impl Into<PeErrorCode>) {
        self.entries.push(ErrorEntry {
            code: code.into(),
            context: None,
        });
    }

    /// Records a code with a numeric context.
    pub fn add_with_context(&mut self, code: impl Into<PeErrorCode>, context: u32) {
        self.entries.push(ErrorEntry {
            code: code.into(),
            context: Some(context),
        });
    }

    /// `true` when anything was recorded.
    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    /// `true` when the given code was recorded (with any context).
    pub fn contains(&self, code: impl Into<PeErrorCode>) -> bool {
        let code = code.into();
        self.entries.iter().any(|e| e.code == code)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The recorded entries, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a ErrorEntry;
    type IntoIter = std::slice::Iter<'a, ErrorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
