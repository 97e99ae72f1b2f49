use std::fs;
use std::path::Path;

use datatest_stable::Result;
use pe_verify::image::parse_image;

fn gauntlet(path: &Path) -> Result<()> {
    let binary = fs::read(path)?;
    let image = parse_image(binary.as_slice(), &Default::default())?;

    // Binary passed initial parsing; the structured fields must agree
    // with each other.

    assert!(image.errors().is_empty(), "errors: {:?}", image.errors());
    assert!(image.signature().is_valid());
    assert_eq!(
        image.section_table().len(),
        image.file_header().number_of_sections as usize
    );
    assert_eq!(image.section_table().len(), image.section_data_ranges().len());

    let optional = image.optional_header().expect("image has an optional header");
    assert_eq!(
        image.data_directories().count(),
        optional.number_of_rva_and_sizes().min(16)
    );
    assert!(optional.file_alignment().is_power_of_two());
    assert!(optional.section_alignment() >= optional.file_alignment());

    // The serialized image must reproduce the input bytes.
    assert_eq!(image.to_bytes(), binary);

    Ok(())
}

datatest_stable::harness! {
    { test = gauntlet, root = "tests/pe", pattern = r"\.((dat)|(exe)|(dll))$" },
}
