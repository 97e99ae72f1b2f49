mod common;

use common::{build_image, ImageSpec};
use pe_verify::directories::DirectoryType;
use pe_verify::error::SecurityDirectoryError;
use pe_verify::image::parse_image;
use pe_verify::security::directory::{
    self, CertificateRevision, CertificateType, SecurityLoaderOptions,
};

fn win_cert(certificate_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(8 + payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x0200u16.to_le_bytes());
    out.extend_from_slice(&certificate_type.to_le_bytes());
    out.extend_from_slice(payload);
    // Entries are padded to 8 bytes.
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out
}

#[test]
fn absent_directory_returns_none() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert!(directory::load(&image, &SecurityLoaderOptions::default()).is_none());
}

#[test]
fn walks_the_certificate_chain() {
    let mut overlay = win_cert(0x0002, &[0xAA; 12]);
    overlay.extend(win_cert(0x0001, &[0xBB; 4]));

    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Security as usize, 0x400, overlay.len() as u32)],
        overlay,
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let loaded = directory::load(&image, &SecurityLoaderOptions::default()).unwrap();
    assert!(loaded.errors.is_empty(), "errors: {:?}", loaded.errors);
    assert_eq!(loaded.entries.len(), 2);

    let first = &loaded.entries[0];
    assert_eq!(first.certificate_type(), Some(CertificateType::PkcsSignedData));
    assert_eq!(first.revision(), Some(CertificateRevision::Revision2_0));
    assert_eq!(first.certificate.raw_data(), &[0xAA; 12]);

    let second = &loaded.entries[1];
    assert_eq!(second.certificate_type(), Some(CertificateType::X509));
    assert_eq!(second.certificate.raw_data(), &[0xBB; 4]);
}

#[test]
fn oversized_entry_is_an_error() {
    let mut overlay = win_cert(0x0002, &[0xAA; 8]);
    // Declared length runs past the directory end.
    overlay[0..4].copy_from_slice(&64u32.to_le_bytes());

    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Security as usize, 0x400, overlay.len() as u32)],
        overlay,
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let loaded = directory::load(&image, &SecurityLoaderOptions::default()).unwrap();
    assert!(loaded
        .errors
        .contains(SecurityDirectoryError::InvalidEntrySize));
    assert!(loaded.entries.is_empty());
}

#[test]
fn entry_cap_is_enforced() {
    let mut overlay = Vec::new();
    for _ in 0..3 {
        overlay.extend(win_cert(0x0002, &[0xCC; 8]));
    }
    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Security as usize, 0x400, overlay.len() as u32)],
        overlay,
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let options = SecurityLoaderOptions {
        max_entries: 2,
        ..Default::default()
    };
    let loaded = directory::load(&image, &options).unwrap();
    assert!(loaded
        .errors
        .contains(SecurityDirectoryError::TooManyEntries));
    assert_eq!(loaded.entries.len(), 2);
}
