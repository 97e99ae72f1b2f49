mod common;

use common::{build_image, ImageSpec, SectionSpec};
use pe_verify::debug::{self, DebugEntryPayload, DebugLoaderOptions, DebugType};
use pe_verify::directories::DirectoryType;
use pe_verify::error::DebugDirectoryError;
use pe_verify::image::parse_image;

fn descriptor(debug_type: u32, size: u32, rva: u32, file_offset: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(28);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0x5F00_0000u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&debug_type.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&rva.to_le_bytes());
    out.extend_from_slice(&file_offset.to_le_bytes());
    out
}

/// Three debug entries; the third one's payload lives in the overlay
/// (file offset only, no RVA).
fn image_with_debug_directory() -> Vec<u8> {
    let mut rdata = Vec::new();
    rdata.extend(descriptor(DebugType::ExDllCharacteristics as u32, 4, 0x2054, 0x454));
    rdata.extend(descriptor(DebugType::OmapToSrc as u32, 16, 0x2058, 0x458));
    rdata.extend(descriptor(DebugType::Borland as u32, 8, 0, 0x600));

    // Extended DLL characteristics: CET compatible + hotpatch.
    rdata.extend_from_slice(&0x41u32.to_le_bytes());
    // Two OMAP records.
    for (rva, rva_to) in [(0x1000u32, 0x4000u32), (0x1100, 0x4100)] {
        rdata.extend_from_slice(&rva.to_le_bytes());
        rdata.extend_from_slice(&rva_to.to_le_bytes());
    }

    build_image(&ImageSpec {
        directories: vec![(DirectoryType::Debug as usize, 0x2000, 3 * 28)],
        sections: vec![
            SectionSpec::text(),
            SectionSpec {
                name: b".rdata",
                rva: 0x2000,
                virtual_size: 0x200,
                data: rdata,
                characteristics: 0x4000_0040,
            },
        ],
        overlay: vec![0xB0; 8],
        ..Default::default()
    })
}

#[test]
fn absent_directory_returns_none() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert!(debug::load(&image, &DebugLoaderOptions::default()).is_none());
}

#[test]
fn loads_all_entries_including_overlay() {
    let bytes = image_with_debug_directory();
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let list = debug::load(&image, &DebugLoaderOptions::default()).unwrap();
    assert!(list.errors.is_empty(), "errors: {:?}", list.errors);
    assert_eq!(list.entries.len(), 3);

    for entry in &list.entries {
        assert!(entry.errors.is_empty(), "entry errors: {:?}", entry.errors);
    }

    match &list.entries[0].payload {
        DebugEntryPayload::ExDllCharacteristics { raw, .. } => assert_eq!(*raw, 0x41),
        other => panic!("unexpected payload: {other:?}"),
    }
    match &list.entries[1].payload {
        DebugEntryPayload::OmapToSrc(records) => {
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].rva, 0x1000);
            assert_eq!(records[0].rva_to, 0x4000);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    assert!(matches!(list.entries[2].payload, DebugEntryPayload::Raw));
    assert_eq!(
        list.entries[2].raw_data.as_ref().unwrap().raw_data(),
        &[0xB0; 8]
    );
}

#[test]
fn overlay_entry_fails_without_include_overlay() {
    let bytes = image_with_debug_directory();
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let options = DebugLoaderOptions {
        include_overlay: false,
        ..Default::default()
    };
    let list = debug::load(&image, &options).unwrap();
    assert_eq!(list.entries.len(), 3);
    assert!(list.entries[0].errors.is_empty());
    assert!(list.entries[1].errors.is_empty());
    assert!(list.entries[2]
        .errors
        .contains(DebugDirectoryError::InvalidFileOffset));
    assert!(list.entries[2].raw_data.is_none());
}

#[test]
fn caps_oversized_payloads() {
    let bytes = image_with_debug_directory();
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let options = DebugLoaderOptions {
        max_raw_data_size: 8,
        ..Default::default()
    };
    let list = debug::load(&image, &options).unwrap();
    // The 16-byte OMAP payload exceeds the cap; the others fit.
    assert!(list.entries[1]
        .errors
        .contains(DebugDirectoryError::TooBigRawData));
    assert!(matches!(list.entries[1].payload, DebugEntryPayload::None));
    assert!(list.entries[0].errors.is_empty());
}

#[test]
fn odd_directory_size_is_recorded() {
    let mut rdata = Vec::new();
    rdata.extend(descriptor(DebugType::ExDllCharacteristics as u32, 4, 0x2038, 0x438));
    rdata.extend_from_slice(&0x01u32.to_le_bytes());
    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Debug as usize, 0x2000, 28 + 5)],
        sections: vec![
            SectionSpec::text(),
            SectionSpec {
                name: b".rdata",
                rva: 0x2000,
                virtual_size: 0x200,
                data: rdata,
                characteristics: 0x4000_0040,
            },
        ],
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let list = debug::load(&image, &DebugLoaderOptions::default()).unwrap();
    assert!(list
        .errors
        .contains(DebugDirectoryError::InvalidDebugDirectorySize));
    assert!(list
        .errors
        .contains(DebugDirectoryError::ExcessiveDataInDirectory));
    assert_eq!(list.entries.len(), 1);
}

#[test]
fn too_many_descriptors_are_capped() {
    let mut rdata = Vec::new();
    for i in 0..4 {
        rdata.extend(descriptor(DebugType::Repro as u32, 0, 0x2000, 0x400 + i));
    }
    let bytes = build_image(&ImageSpec {
        directories: vec![(DirectoryType::Debug as usize, 0x2000, 4 * 28)],
        sections: vec![
            SectionSpec::text(),
            SectionSpec {
                name: b".rdata",
                rva: 0x2000,
                virtual_size: 0x200,
                data: rdata,
                characteristics: 0x4000_0040,
            },
        ],
        ..Default::default()
    });
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let options = DebugLoaderOptions {
        max_debug_directories: 2,
        ..Default::default()
    };
    let list = debug::load(&image, &options).unwrap();
    assert!(list
        .errors
        .contains(DebugDirectoryError::TooManyDebugDirectories));
    assert_eq!(list.entries.len(), 2);
}
