mod common;

use common::{build_image, ImageSpec, IMAGE_BASE_64, SIZE_OF_HEADERS};
use pe_verify::image::{
    file_offset_to_rva, parse_image, rva_to_file_offset, section_data_from_rva,
    section_data_length_from_rva, section_from_rva, AddressConverter,
};

#[test]
fn rva_va_conversions() {
    let converter = AddressConverter::new(IMAGE_BASE_64);

    assert_eq!(converter.rva_to_va64(0x1000).unwrap(), IMAGE_BASE_64 + 0x1000);
    assert_eq!(converter.va_to_rva(IMAGE_BASE_64 + 0x1000).unwrap(), 0x1000);

    // Below the image base there is no RVA.
    assert!(converter.va_to_rva(IMAGE_BASE_64 - 1).is_err());
    // A 64-bit base does not fit a 32-bit pointer.
    assert!(converter.rva_to_va32(0x1000).is_err());

    let converter = AddressConverter::new(0x40_0000);
    assert_eq!(converter.rva_to_va32(0x1000).unwrap(), 0x40_1000);
    // The difference must fit 32 bits.
    assert!(converter.va_to_rva(0x2_0000_0000).is_err());

    let converter = AddressConverter::new(u64::MAX);
    assert!(converter.rva_to_va64(1).is_err());
}

#[test]
fn header_rvas_map_to_themselves() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();

    for rva in [0u32, 0x3C, 0x80, SIZE_OF_HEADERS - 1] {
        assert_eq!(rva_to_file_offset(&image, rva).unwrap(), rva);
        assert_eq!(file_offset_to_rva(&image, rva).unwrap(), rva);
    }
}

#[test]
fn section_rvas_roundtrip_through_file_offsets() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();

    // .text: RVA 0x1000 backed by file offset 0x200.
    for rva in [0x1000u32, 0x1001, 0x11FF] {
        let offset = rva_to_file_offset(&image, rva).unwrap();
        assert_eq!(offset, rva - 0x1000 + 0x200);
        assert_eq!(file_offset_to_rva(&image, offset).unwrap(), rva);
    }

    // Inside the aligned virtual range but past the raw data.
    assert!(rva_to_file_offset(&image, 0x1200).is_err());
    // In no section at all.
    assert!(rva_to_file_offset(&image, 0x9000).is_err());
}

#[test]
fn section_search_by_rva() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let section = section_from_rva(&image, 0x1000, 4).unwrap();
    assert_eq!(section.index, 0);
    assert_eq!(section.header.name(), ".text");

    // The aligned virtual range extends to 0x2000.
    assert!(section_from_rva(&image, 0x1FFF, 1).is_some());
    assert!(section_from_rva(&image, 0x2000, 0).is_none());
    assert!(section_from_rva(&image, 0x0, 4).is_none());
}

#[test]
fn section_data_extraction_policies() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();

    // Physical read inside the section.
    let view = section_data_from_rva(&image, 0x1000, 4, true, false).unwrap();
    assert_eq!(view.raw_data()[0], 0xC3);

    // Headers are served only on request.
    assert!(section_data_from_rva(&image, 0, 4, false, false).is_err());
    let view = section_data_from_rva(&image, 0, 2, true, false).unwrap();
    assert_eq!(view.raw_data(), b"MZ");

    // Crossing the physical end needs allow_virtual_data.
    assert!(section_data_from_rva(&image, 0x11F0, 0x20, true, false).is_err());
    let view = section_data_from_rva(&image, 0x11F0, 0x20, true, true).unwrap();
    assert_eq!(view.physical_size(), 0x10);
    assert_eq!(view.virtual_size(), 0x20);

    // Length queries under the same flags.
    assert_eq!(
        section_data_length_from_rva(&image, 0x1000, true, false).unwrap(),
        0x200
    );
    assert_eq!(
        section_data_length_from_rva(&image, 0x1000, true, true).unwrap(),
        0x1000
    );
}
