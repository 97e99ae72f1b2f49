//! The in-memory PE image and everything that navigates it.

mod address;
mod data;
mod parse;
mod read;
mod search;
mod serialize;

pub use address::{file_offset_to_rva, rva_to_file_offset, AddressConverter};
pub use data::{
    section_data_from_rva, section_data_from_va, section_data_length_from_rva,
    section_data_strict_from_rva,
};
pub use parse::{parse_image, ImageParseOptions};
pub use read::{
    buffer_to_rva, byte_array_from_rva, byte_vector_from_rva, bytes_to_rva, cstring_from_rva,
    cstring_from_va, cstring_to_rva, struct_from_rva, struct_from_va, struct_to_rva,
    utf16_string_from_rva, WriteOptions,
};
pub use search::{
    section_from_directory, section_from_file_offset, section_from_reference, section_from_rva,
    section_from_va, SectionRef,
};

use std::borrow::Cow;

use crate::buffer::ByteView;
use crate::coff::{FileCharacteristics, FileHeader};
use crate::directories::{DataDirectories, MAX_DATA_DIRECTORIES};
use crate::dos::{DosHeader, DosStub};
use crate::error::ErrorList;
use crate::optional::OptionalHeader;
use crate::packed::{packed_record, PackedValue};
use crate::section::{align_up, SectionHeader};

packed_record! {
    /// The four NT signature bytes that follow the DOS stub.
    pub struct NtSignature {
        /// Must equal `PE\0\0`.
        pub signature: u32,
    }
}

/// `PE\0\0`, little endian.
pub const PE_SIGNATURE: u32 = 0x4550;

impl NtSignature {
    /// `true` when the four bytes equal `PE\0\0`.
    pub fn is_valid(&self) -> bool {
        self.signature == PE_SIGNATURE
    }
}

/// A half-open byte interval of the source file, with a possibly larger
/// virtual size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataRange {
    /// File offset of the first byte.
    pub offset: usize,
    /// Bytes physically present in the file.
    pub physical_size: usize,
    /// Logical size; at least `physical_size`.
    pub virtual_size: usize,
}

impl DataRange {
    /// `true` for a zero-sized range.
    pub fn is_empty(&self) -> bool {
        self.physical_size == 0 && self.virtual_size == 0
    }

    /// File offset one past the physical bytes.
    pub fn end(&self) -> usize {
        self.offset + self.physical_size
    }
}

pub(crate) fn range_view<'s>(data: &'s [u8], range: &DataRange) -> ByteView<'s> {
    let start = range.offset.min(data.len());
    let end = range.end().min(data.len());
    ByteView::from_slice(&data[start..end])
        .with_offsets(range.offset, range.offset)
        .with_virtual_size(range.virtual_size)
}

/// A parsed Portable Executable.
///
/// The image owns (or borrows) the source bytes; every view handed out by
/// its accessors borrows from it. The section table and the section data
/// list stay parallel through every mutation.
#[derive(Debug, Clone)]
pub struct Image<'a> {
    pub(crate) data: Cow<'a, [u8]>,
    pub(crate) loaded_to_memory: bool,
    pub(crate) dos_header: PackedValue<DosHeader>,
    pub(crate) dos_stub: DosStub,
    pub(crate) signature: PackedValue<NtSignature>,
    pub(crate) file_header: PackedValue<FileHeader>,
    pub(crate) optional_header: Option<OptionalHeader>,
    pub(crate) data_directories: DataDirectories,
    pub(crate) section_table: Vec<PackedValue<SectionHeader>>,
    pub(crate) section_data: Vec<DataRange>,
    pub(crate) overlay: DataRange,
    pub(crate) full_headers: DataRange,
    pub(crate) errors: ErrorList,
}

impl<'a> Image<'a> {
    /// The full source bytes.
    pub fn full_data(&self) -> ByteView<'_> {
        ByteView::from_slice(&self.data)
    }

    /// The full source bytes as a plain slice.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The DOS header.
    pub fn dos_header(&self) -> &PackedValue<DosHeader> {
        &self.dos_header
    }

    /// The DOS stub bytes.
    pub fn dos_stub(&self) -> &DosStub {
        &self.dos_stub
    }

    /// The NT signature.
    pub fn signature(&self) -> &PackedValue<NtSignature> {
        &self.signature
    }

    /// The COFF file header.
    pub fn file_header(&self) -> &PackedValue<FileHeader> {
        &self.file_header
    }

    /// The COFF file header, for mutation.
    pub fn file_header_mut(&mut self) -> &mut PackedValue<FileHeader> {
        &mut self.file_header
    }

    /// The optional header; absent for object files and images whose
    /// header failed to parse.
    pub fn optional_header(&self) -> Option<&OptionalHeader> {
        self.optional_header.as_ref()
    }

    /// The optional header, for mutation.
    pub fn optional_header_mut(&mut self) -> Option<&mut OptionalHeader> {
        self.optional_header.as_mut()
    }

    /// The data-directory table.
    pub fn data_directories(&self) -> &DataDirectories {
        &self.data_directories
    }

    /// The data-directory table, for mutation.
    pub fn data_directories_mut(&mut self) -> &mut DataDirectories {
        &mut self.data_directories
    }

    /// The section headers, in declaration order.
    pub fn section_table(&self) -> &[PackedValue<SectionHeader>] {
        &self.section_table
    }

    /// The section headers, for mutation. Call
    /// [`Image::update_number_of_sections`] afterwards.
    pub fn section_table_mut(&mut self) -> &mut Vec<PackedValue<SectionHeader>> {
        &mut self.section_table
    }

    /// The raw-byte ranges parallel to the section table.
    pub fn section_data_ranges(&self) -> &[DataRange] {
        &self.section_data
    }

    /// Borrowed window over one section's raw bytes.
    pub fn section_data_view(&self, index: usize) -> Option<ByteView<'_>> {
        self.section_data
            .get(index)
            .map(|range| range_view(&self.data, range))
    }

    /// Bytes after the last section's raw data.
    pub fn overlay(&self) -> ByteView<'_> {
        range_view(&self.data, &self.overlay)
    }

    /// The overlay's position in the file.
    pub fn overlay_range(&self) -> &DataRange {
        &self.overlay
    }

    /// The file prefix up to the first section's raw data, retained for
    /// hashing and header-resident reads.
    pub fn full_headers(&self) -> ByteView<'_> {
        range_view(&self.data, &self.full_headers)
    }

    /// Anomalies recorded during parsing.
    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// `true` for PE32+ images.
    pub fn is_64bit(&self) -> bool {
        matches!(self.optional_header, Some(OptionalHeader::Pe64(_)))
    }

    /// `true` when base relocations were not stripped from the file.
    pub fn has_relocations(&self) -> bool {
        self.file_header
            .characteristics()
            .map(|c| !c.contains(FileCharacteristics::IMAGE_FILE_RELOCS_STRIPPED))
            .unwrap_or(true)
    }

    /// When set, section raw pointers are RVAs: the image is a memory
    /// snapshot rather than an on-disk file.
    pub fn is_loaded_to_memory(&self) -> bool {
        self.loaded_to_memory
    }

    /// Changes how section raw pointers are interpreted.
    pub fn set_loaded_to_memory(&mut self, loaded_to_memory: bool) {
        self.loaded_to_memory = loaded_to_memory;
    }

    /// Promotes the image to own its source bytes.
    pub fn into_owned(self) -> Image<'static> {
        Image {
            data: Cow::Owned(self.data.into_owned()),
            loaded_to_memory: self.loaded_to_memory,
            dos_header: self.dos_header,
            dos_stub: self.dos_stub,
            signature: self.signature,
            file_header: self.file_header,
            optional_header: self.optional_header,
            data_directories: self.data_directories,
            section_table: self.section_table,
            section_data: self.section_data,
            overlay: self.overlay,
            full_headers: self.full_headers,
            errors: self.errors,
        }
    }

    /// Re-synchronizes `number_of_sections` with the section table,
    /// padding the data list with empty ranges if headers were appended.
    pub fn update_number_of_sections(&mut self) {
        self.section_data
            .resize(self.section_table.len(), DataRange::default());
        self.file_header.get_mut().number_of_sections = self.section_table.len() as u16;
    }

    /// Recomputes `size_of_image` from the section table geometry.
    pub fn update_image_size(&mut self) {
        let Some(optional) = self.optional_header.as_mut() else {
            return;
        };
        let alignment = optional.section_alignment();
        let mut end = optional.size_of_headers() as u64;
        for header in &self.section_table {
            let section_end =
                header.virtual_address as u64 + header.aligned_virtual_size(alignment);
            end = end.max(section_end);
        }
        optional.set_size_of_image(align_up(end, alignment as u64) as u32);
    }

    /// Resizes the data-directory table (capped at 16 entries) and
    /// updates the declared count.
    pub fn set_number_of_data_directories(&mut self, count: u32) {
        let count = count.min(MAX_DATA_DIRECTORIES);
        self.data_directories.resize(count);
        if let Some(optional) = self.optional_header.as_mut() {
            optional.set_number_of_rva_and_sizes(count);
        }
    }

    /// Drops trailing empty data directories, keeping at least
    /// `min_count`. Returns the new count.
    pub fn strip_data_directories(&mut self, min_count: u32) -> u32 {
        let count = self.data_directories.strip(min_count);
        if let Some(optional) = self.optional_header.as_mut() {
            optional.set_number_of_rva_and_sizes(count);
        }
        count
    }
}
