use crate::directories::DirectoryType;
use crate::error::PeErrorCode;
use crate::packed::PackedValue;
use crate::section::SectionHeader;

use super::{AddressConverter, DataRange, Image};

/// A matched section: its index, header and parallel data range.
#[derive(Debug, Clone, Copy)]
pub struct SectionRef<'i> {
    /// Position in the section table; the section's identity.
    pub index: usize,
    /// The matched header.
    pub header: &'i PackedValue<SectionHeader>,
    /// The parallel raw-data range.
    pub data: &'i DataRange,
}

fn section_at<'i>(image: &'i Image<'_>, index: usize) -> SectionRef<'i> {
    SectionRef {
        index,
        header: &image.section_table()[index],
        data: &image.section_data_ranges()[index],
    }
}

/// Finds the section whose aligned virtual range contains
/// `[rva, rva + data_size)`. Declaration order breaks ties.
pub fn section_from_rva<'i>(
    image: &'i Image<'_>,
    rva: u32,
    data_size: u32,
) -> Option<SectionRef<'i>> {
    let alignment = image.optional_header()?.section_alignment();
    image
        .section_table()
        .iter()
        .position(|header| header.contains_rva(rva, data_size, alignment))
        .map(|index| section_at(image, index))
}

/// Finds the section containing a VA, translating through the image base
/// first.
pub fn section_from_va<'i>(
    image: &'i Image<'_>,
    va: u64,
    data_size: u32,
) -> Result<Option<SectionRef<'i>>, PeErrorCode> {
    let rva = AddressConverter::from_image(image).va_to_rva(va)?;
    Ok(section_from_rva(image, rva, data_size))
}

/// Finds the section whose raw-data interval contains
/// `[offset, offset + data_size)`.
pub fn section_from_file_offset<'i>(
    image: &'i Image<'_>,
    offset: u32,
    data_size: u32,
) -> Option<SectionRef<'i>> {
    image
        .section_table()
        .iter()
        .position(|header| header.contains_file_offset(offset, data_size))
        .map(|index| section_at(image, index))
}

/// Finds the section a data directory points into.
pub fn section_from_directory<'i>(
    image: &'i Image<'_>,
    directory: DirectoryType,
) -> Option<SectionRef<'i>> {
    let entry = image.data_directories().get_directory(directory)?;
    section_from_rva(image, entry.virtual_address, 0)
}

/// Finds a section by header identity (pointer equality against the
/// table's own storage).
pub fn section_from_reference<'i>(
    image: &'i Image<'_>,
    header: &PackedValue<SectionHeader>,
) -> Option<SectionRef<'i>> {
    image
        .section_table()
        .iter()
        .position(|h| core::ptr::eq(h, header))
        .map(|index| section_at(image, index))
}
