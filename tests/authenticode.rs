mod common;

use common::{build_image, ImageSpec};
use der::{Decode, Tag};
use pe_verify::directories::DirectoryType;
use pe_verify::error::{
    AttributeMapError, AuthenticodeVerifierError, SignatureValidatorError,
};
use pe_verify::image::parse_image;
use pe_verify::security::asn1::{Attribute, Certificate, RawTlv};
use pe_verify::security::cert_store::CertificateStore;
use pe_verify::security::hash::calculate_hash;
use pe_verify::security::image_hash::calculate_image_hash;
use pe_verify::security::page_hashes::AuthenticodePageHashes;
use pe_verify::security::pkcs7::{authenticated_attributes_digest, AttributeMap};
use pe_verify::security::signature::verify_signature;
use pe_verify::security::x500::FlatDistinguishedName;
use pe_verify::security::{
    verify_authenticode, DigestAlgorithm, DigestEncryptionAlgorithm, NamedCurve,
    VerificationOptions,
};

// -- DER construction helpers -------------------------------------------

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xFF {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(content);
    out
}

fn der_seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

fn der_set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

fn der_int(bytes: &[u8]) -> Vec<u8> {
    let mut content = bytes.to_vec();
    if content.first().map(|&b| b & 0x80 != 0).unwrap_or(true) {
        content.insert(0, 0);
    }
    tlv(0x02, &content)
}

fn der_oid(encoded: &[u8]) -> Vec<u8> {
    tlv(0x06, encoded)
}

const OID_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];
const OID_SHA256_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
const OID_MESSAGE_DIGEST: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x04];

// -- Digests ------------------------------------------------------------

#[test]
fn md5_known_answer() {
    let digest = calculate_hash(DigestAlgorithm::Md5, &[&[0x01, 0xFF, 0x02]]).unwrap();
    assert_eq!(hex::encode(digest), "8338abee6237257869443017bc8dabea");
}

#[test]
fn multi_part_hash_equals_concatenated_hash() {
    let whole = calculate_hash(DigestAlgorithm::Sha256, &[b"hello world"]).unwrap();
    let parts = calculate_hash(DigestAlgorithm::Sha256, &[b"hello", b" ", b"world"]).unwrap();
    assert_eq!(whole, parts);
}

#[test]
fn attributes_digest_replaces_leading_tag() {
    // The digest input swaps the implicit [0] tag for SET OF (0x31):
    // hashing "abc" therefore hashes "1bc".
    let digest = authenticated_attributes_digest(DigestAlgorithm::Sha256, b"abc").unwrap();
    let expected = calculate_hash(DigestAlgorithm::Sha256, &[b"1bc"]).unwrap();
    assert_eq!(digest, expected);
    assert_eq!(
        hex::encode(digest),
        "fb8e20fc2e4c3f248c60c39bd652f3c1347298bb977b8b4d5903b85055620603"
    );
}

// -- Low-level signature verification -----------------------------------

#[test]
fn rsa_key_resolves_size_and_rejects_garbage_signature() {
    // A syntactically valid 1024-bit RSAPublicKey with an arbitrary
    // modulus; the all-0xA6 signature cannot possibly verify.
    let mut modulus = vec![0xA6u8; 128];
    modulus[127] = 0x01;
    let key = der_seq(&[der_int(&modulus), der_int(&[0x01, 0x00, 0x01])]);

    let digest = calculate_hash(DigestAlgorithm::Sha256, &[b"abc"]).unwrap();
    let signature = vec![0xA6u8; 128];

    let result = verify_signature(
        &key,
        &digest,
        &signature,
        DigestAlgorithm::Sha256,
        DigestEncryptionAlgorithm::Rsa,
        None,
    )
    .unwrap();
    assert!(!result.valid);
    assert_eq!(result.key_size, Some(1024));
    assert_eq!(result.curve, None);
}

#[test]
fn ecdsa_resolves_secp256k1() {
    // The curve's generator point is a valid public key.
    let mut public_key = vec![0x04u8];
    public_key.extend(
        hex::decode("79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798").unwrap(),
    );
    public_key.extend(
        hex::decode("483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8").unwrap(),
    );

    let params = der_oid(&[0x2B, 0x81, 0x04, 0x00, 0x0A]); // 1.3.132.0.10
    let params_tlv = RawTlv {
        tag: Tag::ObjectIdentifier,
        full: &params,
        value: &params[2..],
    };
    // r = 1, s = 1: well-formed, necessarily invalid.
    let signature = der_seq(&[der_int(&[0x01]), der_int(&[0x01])]);
    let digest = calculate_hash(DigestAlgorithm::Sha256, &[b"abc"]).unwrap();

    let result = verify_signature(
        &public_key,
        &digest,
        &signature,
        DigestAlgorithm::Sha256,
        DigestEncryptionAlgorithm::Ecdsa,
        Some(&params_tlv),
    )
    .unwrap();
    assert!(!result.valid);
    assert_eq!(result.curve, Some(NamedCurve::Secp256k1));
}

#[test]
fn unknown_curve_is_unsupported() {
    let params = der_oid(&[0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07]); // brainpoolP256r1
    let params_tlv = RawTlv {
        tag: Tag::ObjectIdentifier,
        full: &params,
        value: &params[2..],
    };
    let result = verify_signature(
        &[0x04; 65],
        &[0u8; 32],
        &[0u8; 8],
        DigestAlgorithm::Sha256,
        DigestEncryptionAlgorithm::Ecdsa,
        Some(&params_tlv),
    );
    assert_eq!(
        result.unwrap_err(),
        SignatureValidatorError::UnsupportedSignatureAlgorithm.into()
    );
}

// -- Certificates and the store -----------------------------------------

fn minimal_certificate(serial: &[u8], issuer_cn: &[u8]) -> Vec<u8> {
    let issuer = der_seq(&[der_set(&[der_seq(&[
        der_oid(&[0x55, 0x04, 0x03]), // commonName
        tlv(0x13, issuer_cn),         // PrintableString
    ])])]);
    let validity = der_seq(&[
        tlv(0x17, b"200101000000Z"),
        tlv(0x17, b"300101000000Z"),
    ]);
    let rsa_key = der_seq(&[der_int(&[0xA6; 64]), der_int(&[0x01, 0x00, 0x01])]);
    let mut bitstring_content = vec![0u8];
    bitstring_content.extend_from_slice(&rsa_key);
    let spki = der_seq(&[
        der_seq(&[der_oid(OID_RSA), tlv(0x05, b"")]),
        tlv(0x03, &bitstring_content),
    ]);
    let tbs = der_seq(&[
        der_int(serial),
        der_seq(&[der_oid(OID_SHA256_RSA)]),
        issuer.clone(),
        validity,
        issuer,
        spki,
    ]);
    let mut signature = vec![0u8];
    signature.extend_from_slice(&[0xA6; 64]);
    der_seq(&[
        tbs,
        der_seq(&[der_oid(OID_SHA256_RSA)]),
        tlv(0x03, &signature),
    ])
}

#[test]
fn certificate_decodes_and_indexes() {
    let bytes = minimal_certificate(&[0x42], b"Test CA");
    let certificate = Certificate::from_der(&bytes).unwrap();
    assert_eq!(certificate.tbs.serial_number.as_bytes(), &[0x42]);

    let issuer = FlatDistinguishedName::parse(&certificate.tbs.issuer).unwrap();
    assert_eq!(issuer.common_name().unwrap(), Some("Test CA"));

    let mut store = CertificateStore::default();
    assert!(store.add_certificate(certificate));
    assert!(!store.add_certificate(certificate));
    assert_eq!(store.len(), 1);

    let found = store
        .find_certificate(
            certificate.tbs.serial_number.as_bytes(),
            certificate.tbs.issuer.full,
        )
        .unwrap();
    assert_eq!(found.raw, certificate.raw);
    assert!(store.find_certificate(&[0x43], certificate.tbs.issuer.full).is_none());
}

// -- Attribute map ------------------------------------------------------

#[test]
fn attribute_map_value_cardinality() {
    let single = der_seq(&[
        der_oid(OID_MESSAGE_DIGEST),
        der_set(&[tlv(0x04, &[1, 2, 3, 4])]),
    ]);
    let attribute = Attribute::from_der(&single).unwrap();
    assert_eq!(attribute.values.len(), 1);

    let multi = der_seq(&[
        der_oid(OID_MESSAGE_DIGEST),
        der_set(&[tlv(0x04, &[1]), tlv(0x04, &[2])]),
    ]);
    let attribute_multi = Attribute::from_der(&multi).unwrap();

    // One value resolves; several are an error.
    let map = map_of(&[attribute.clone()]);
    assert!(map.get_message_digest().unwrap().is_some());

    let map = map_of(&[attribute_multi]);
    assert_eq!(
        map.get_message_digest().unwrap_err(),
        AttributeMapError::MultipleAttributeValues
    );
}

fn map_of<'a>(attributes: &[Attribute<'a>]) -> AttributeMap<'a> {
    use pe_verify::security::asn1::AttributesRef;
    let raw = RawTlv {
        tag: Tag::Set,
        full: &[0x31, 0x00],
        value: &[],
    };
    AttributeMap::from_attributes(&AttributesRef {
        raw,
        attributes: attributes.to_vec(),
    })
    .unwrap()
}

// -- Page hashes --------------------------------------------------------

#[test]
fn page_hash_blob_validity() {
    let record = [0u8; 36]; // u32 offset + SHA-256 digest
    let hashes = AuthenticodePageHashes {
        algorithm: DigestAlgorithm::Sha256,
        raw: &record,
    };
    assert!(hashes.is_valid(DigestAlgorithm::Sha256));
    assert!(!hashes.is_valid(DigestAlgorithm::Sha1));

    let truncated = AuthenticodePageHashes {
        algorithm: DigestAlgorithm::Sha256,
        raw: &record[..35],
    };
    assert!(!truncated.is_valid(DigestAlgorithm::Sha256));
}

// -- Image hash ---------------------------------------------------------

#[test]
fn image_hash_skips_checksum_and_security_entry() {
    let overlay = vec![0x5A; 32];
    let bytes = build_image(&ImageSpec {
        overlay: overlay.clone(),
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let result = calculate_image_hash(DigestAlgorithm::Sha256, &image, None).unwrap();

    // Recompute by hand from the fixed layout: optional header at 152,
    // checksum at 152 + 64, security entry at 152 + 112 + 4 * 8.
    let checksum = 152 + 64;
    let security_entry = 152 + 112 + 32;
    let expected = calculate_hash(
        DigestAlgorithm::Sha256,
        &[
            &bytes[..checksum],
            &bytes[checksum + 4..security_entry],
            &bytes[security_entry + 8..0x200],
            &bytes[0x200..0x400],
            &overlay,
        ],
    )
    .unwrap();
    assert_eq!(result.image_hash, expected);
}

#[test]
fn image_hash_stops_at_certificate_table() {
    // 16 bytes of plain overlay, then a 24-byte certificate blob the
    // hash must exclude.
    let mut overlay = vec![0x5A; 16];
    let mut win_cert = Vec::new();
    win_cert.extend_from_slice(&24u32.to_le_bytes());
    win_cert.extend_from_slice(&0x0200u16.to_le_bytes());
    win_cert.extend_from_slice(&0x0002u16.to_le_bytes());
    win_cert.extend_from_slice(&[0xEE; 16]);
    overlay.extend_from_slice(&win_cert);

    let cert_offset = 0x400 + 16;
    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Security as usize, cert_offset, 24)],
        overlay,
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let result = calculate_image_hash(DigestAlgorithm::Sha256, &image, None).unwrap();

    let checksum = 152 + 64;
    let security_entry = 152 + 112 + 32;
    let expected = calculate_hash(
        DigestAlgorithm::Sha256,
        &[
            &bytes[..checksum],
            &bytes[checksum + 4..security_entry],
            &bytes[security_entry + 8..0x200],
            &bytes[0x200..0x400],
            &bytes[0x400..cert_offset as usize],
        ],
    )
    .unwrap();
    assert_eq!(result.image_hash, expected);
}

// -- End-to-end verdicts ------------------------------------------------

#[test]
fn no_security_directory_means_no_verdict() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert!(verify_authenticode(&image, &VerificationOptions::default()).is_none());
}

#[test]
fn malformed_signature_reports_format_error() {
    // A structurally valid WIN_CERTIFICATE whose payload is not DER.
    let mut win_cert = Vec::new();
    win_cert.extend_from_slice(&16u32.to_le_bytes());
    win_cert.extend_from_slice(&0x0200u16.to_le_bytes());
    win_cert.extend_from_slice(&0x0002u16.to_le_bytes());
    win_cert.extend_from_slice(&[0xEE; 8]);

    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Security as usize, 0x400, 16)],
        overlay: win_cert,
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let status = verify_authenticode(&image, &VerificationOptions::default()).unwrap();
    assert!(!status.is_valid());
    assert!(status
        .root
        .format_errors
        .contains(AuthenticodeVerifierError::InvalidAuthenticodeSignatureFormat));
}
