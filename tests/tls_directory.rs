mod common;

use common::{build_image, ImageSpec, SectionSpec, IMAGE_BASE_64};
use pe_verify::directories::DirectoryType;
use pe_verify::error::TlsDirectoryError;
use pe_verify::image::parse_image;
use pe_verify::tls::{self, TlsDescriptor, TlsLoaderOptions};

fn tls_image(end_offset: u64, callback_count: usize) -> Vec<u8> {
    let mut rdata = Vec::new();
    // IMAGE_TLS_DIRECTORY64
    rdata.extend_from_slice(&(IMAGE_BASE_64 + 0x1000).to_le_bytes());
    rdata.extend_from_slice(&(IMAGE_BASE_64 + end_offset).to_le_bytes());
    rdata.extend_from_slice(&(IMAGE_BASE_64 + 0x2100).to_le_bytes());
    rdata.extend_from_slice(&(IMAGE_BASE_64 + 0x2040).to_le_bytes());
    rdata.extend_from_slice(&0u32.to_le_bytes());
    rdata.extend_from_slice(&0u32.to_le_bytes());

    // Callback list at RVA 0x2040, null-terminated.
    rdata.resize(0x40, 0);
    for i in 0..callback_count {
        rdata.extend_from_slice(&(IMAGE_BASE_64 + 0x1000 + i as u64 * 0x10).to_le_bytes());
    }
    rdata.extend_from_slice(&0u64.to_le_bytes());

    build_image(&ImageSpec {
        directories: vec![(DirectoryType::Tls as usize, 0x2000, 40)],
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
    })
}

#[test]
fn absent_directory_returns_none() {
    let bytes = build_image(&ImageSpec::default());
    let image = parse_image(&bytes, &Default::default()).unwrap();
    assert!(tls::load(&image, &TlsLoaderOptions::default()).is_none());
}

#[test]
fn loads_descriptor_callbacks_and_raw_data() {
    let bytes = tls_image(0x1040, 2);
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let directory = tls::load(&image, &TlsLoaderOptions::default()).unwrap();
    assert!(directory.errors.is_empty(), "errors: {:?}", directory.errors);

    let TlsDescriptor::Tls64(descriptor) = &directory.descriptor else {
        panic!("expected a 64-bit descriptor");
    };
    assert_eq!(descriptor.start_address_of_raw_data, IMAGE_BASE_64 + 0x1000);

    assert_eq!(
        directory.callbacks,
        vec![IMAGE_BASE_64 + 0x1000, IMAGE_BASE_64 + 0x1010]
    );

    let raw = directory.raw_data.as_ref().unwrap();
    assert_eq!(raw.physical_size(), 0x40);
    assert_eq!(raw.raw_data()[0], 0xC3);
}

#[test]
fn inverted_raw_data_range_is_an_error() {
    let bytes = tls_image(0x0800, 0);
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let directory = tls::load(&image, &TlsLoaderOptions::default()).unwrap();
    assert!(directory.errors.contains(TlsDirectoryError::InvalidRawData));
    assert!(directory.raw_data.is_none());
}

#[test]
fn callback_cap_is_enforced() {
    let bytes = tls_image(0x1040, 3);
    let image = parse_image(&bytes, &Default::default()).unwrap();

    let options = TlsLoaderOptions {
        max_callbacks: 2,
        ..Default::default()
    };
    let directory = tls::load(&image, &options).unwrap();
    assert!(directory
        .errors
        .contains(TlsDirectoryError::TooManyCallbacks));
    assert_eq!(directory.callbacks.len(), 2);
}
