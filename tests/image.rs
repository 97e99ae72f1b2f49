mod common;

use common::{build_image, ImageSpec, SectionSpec};
use pe_verify::directories::DirectoryType;
use pe_verify::error::{ImageSignatureError, OptionalHeaderError};
use pe_verify::image::parse_image;

#[test]
fn parses_single_section_image() {
    let bytes = build_image(&ImageSpec {
        number_of_dirs: 3,
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    assert!(image.errors().is_empty(), "errors: {:?}", image.errors());
    assert_eq!(image.data_directories().count(), 3);
    assert_eq!(image.section_table().len(), 1);
    assert_eq!(image.section_table()[0].name(), ".text");
    assert_eq!(image.section_data_ranges().len(), 1);
}

#[test]
fn records_invalid_pe_signature() {
    let bytes = build_image(&ImageSpec {
        nt_signature: *b"MZ\0\0",
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    assert!(image
        .errors()
        .contains(ImageSignatureError::InvalidPeSignature));
    assert!(image.optional_header().is_none());
    assert!(image.section_table().is_empty());
}

#[test]
fn roundtrips_unmodified_image() {
    let bytes = build_image(&ImageSpec {
        overlay: vec![0xAB; 64],
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert_eq!(image.to_bytes(), bytes);
}

#[test]
fn parses_overlay() {
    let overlay = vec![0x11u8; 48];
    let bytes = build_image(&ImageSpec {
        overlay: overlay.clone(),
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert_eq!(image.overlay().raw_data(), overlay.as_slice());
}

#[test]
fn update_number_of_sections_keeps_lists_parallel() {
    let bytes = build_image(&ImageSpec::default());
    let mut image = parse_image(&bytes, &Default::default()).unwrap();

    let header = image.section_table()[0];
    image.section_table_mut().push(header);
    image.update_number_of_sections();

    assert_eq!(image.file_header().number_of_sections, 2);
    assert_eq!(image.section_table().len(), image.section_data_ranges().len());
}

#[test]
fn strip_data_directories_honors_min_count() {
    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Debug as usize, 0x1000, 28)],
        ..Default::default()
    });
    let mut image = parse_image(&bytes, &Default::default()).unwrap();
    assert_eq!(image.data_directories().count(), 16);

    // Trailing empty entries go; the debug entry (index 6) blocks
    // stripping below 7.
    let count = image.strip_data_directories(2);
    assert_eq!(count, 7);
    assert_eq!(
        image.optional_header().unwrap().number_of_rva_and_sizes(),
        7
    );

    let count = image.strip_data_directories(10);
    assert_eq!(count, 7);
}

#[test]
fn update_image_size_follows_sections() {
    let mut sections = vec![SectionSpec::text()];
    sections.push(SectionSpec {
        name: b".data",
        rva: 0x3000,
        virtual_size: 0x800,
        data: vec![0u8; 0x200],
        characteristics: 0xC000_0040,
    });
    let bytes = build_image(&ImageSpec {
        sections,
        ..Default::default()
    });
    let mut image = parse_image(&bytes, &Default::default()).unwrap();

    image.update_image_size();
    assert_eq!(image.optional_header().unwrap().size_of_image(), 0x4000);
}

#[test]
fn rejects_truncated_optional_header() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes[..0xA0], &Default::default()).unwrap();
    assert!(image.errors().contains(OptionalHeaderError::UnableToRead));
    assert!(image.optional_header().is_none());
}

#[test]
fn validates_unaligned_image_base() {
    let mut bytes = build_image(&ImageSpec::default());
    // image_base lives 24 bytes into the PE32+ optional header.
    let offset = 128 + 4 + 20 + 24;
    bytes[offset..offset + 8].copy_from_slice(&0x1_4000_1234u64.to_le_bytes());
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert!(image.errors().contains(OptionalHeaderError::UnalignedImageBase));
}
