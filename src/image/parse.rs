use std::borrow::Cow;

use log::debug;
use num_traits::FromPrimitive;

use crate::buffer::ByteView;
use crate::coff::FileHeader;
use crate::directories::{DataDirectories, MAX_DATA_DIRECTORIES};
use crate::dos::{DosHeader, DosStub};
use crate::error::{
    DataDirectoriesError, DosStubError, ErrorList, FileHeaderError, ImageSignatureError,
    OptionalHeaderError, PeErrorCode, SectionError,
};
use crate::optional::{Magic, OptionalHeader, OptionalHeader32, OptionalHeader64};
use crate::packed::{PackedByteVec, PackedStruct, PackedValue};
use crate::section::{align_up, SectionHeader};

use super::{DataRange, Image, NtSignature};

/// Controls for [`parse_image`].
#[derive(Debug, Clone)]
pub struct ImageParseOptions {
    /// Run the structural header validations and attach their findings.
    pub validate_headers: bool,
    /// Interpret section raw pointers as RVAs (memory snapshot input).
    pub loaded_to_memory: bool,
}

impl Default for ImageParseOptions {
    fn default() -> Self {
        Self {
            validate_headers: true,
            loaded_to_memory: false,
        }
    }
}

/// Deserializes an image from raw bytes.
///
/// Parsing is sequential and strict: DOS header, stub, NT signature, file
/// header, optional header, data directories, section table, section raw
/// data, overlay. A recoverable anomaly lands on the image's error list
/// and parsing continues (or stops early with defaults in place); only an
/// unreadable DOS header fails outright.
pub fn parse_image<'a>(
    bytes: &'a [u8],
    options: &ImageParseOptions,
) -> Result<Image<'a>, PeErrorCode> {
    let view = ByteView::from_slice(bytes);
    let mut errors = ErrorList::new();

    let dos_header = PackedValue::<DosHeader>::deserialize(&view, 0, false)?;

    let mut image = Image {
        data: Cow::Borrowed(bytes),
        loaded_to_memory: options.loaded_to_memory,
        dos_header,
        dos_stub: DosStub::default(),
        signature: PackedValue::default(),
        file_header: PackedValue::default(),
        optional_header: None,
        data_directories: DataDirectories::default(),
        section_table: Vec::new(),
        section_data: Vec::new(),
        overlay: DataRange::default(),
        full_headers: DataRange::default(),
        errors: ErrorList::new(),
    };

    if let Err(e) = image.dos_header.validate() {
        errors.add(e);
        image.errors = errors;
        return Ok(image);
    }

    let e_lfanew = image.dos_header.e_lfanew as usize;
    let stub_size = e_lfanew - DosHeader::packed_size();
    match PackedByteVec::deserialize(&view, DosHeader::packed_size(), stub_size, false) {
        Ok(stub) => image.dos_stub = stub,
        Err(_) => {
            errors.add(DosStubError::UnableToRead);
            image.errors = errors;
            return Ok(image);
        }
    }

    match PackedValue::<NtSignature>::deserialize(&view, e_lfanew, false) {
        Ok(signature) => image.signature = signature,
        Err(_) => {
            errors.add(ImageSignatureError::UnableToRead);
            image.errors = errors;
            return Ok(image);
        }
    }
    if !image.signature.is_valid() {
        errors.add(ImageSignatureError::InvalidPeSignature);
        image.errors = errors;
        return Ok(image);
    }

    let file_header_pos = e_lfanew + NtSignature::packed_size();
    match PackedValue::<FileHeader>::deserialize(&view, file_header_pos, false) {
        Ok(header) => image.file_header = header,
        Err(_) => {
            errors.add(FileHeaderError::UnableToRead);
            image.errors = errors;
            return Ok(image);
        }
    }

    let optional_pos = file_header_pos + FileHeader::packed_size();
    let optional_size = image.file_header.size_of_optional_header as usize;
    if optional_size != 0 {
        match parse_optional_header(&view, optional_pos, &mut errors) {
            Some(header) => image.optional_header = Some(header),
            None => {
                image.errors = errors;
                return Ok(image);
            }
        }
    }

    if let Some(optional) = &image.optional_header {
        let declared = optional.number_of_rva_and_sizes();
        let count = declared.min(MAX_DATA_DIRECTORIES);
        let dirs_pos = optional_pos + optional.packed_size();
        match DataDirectories::deserialize(&view, dirs_pos, count, false) {
            Ok(dirs) => image.data_directories = dirs,
            Err(_) => errors.add(DataDirectoriesError::UnableToRead),
        }
    }

    let section_table_pos = optional_pos + optional_size;
    let section_count = image.file_header.number_of_sections;
    let mut pos = section_table_pos;
    for index in 0..section_count {
        match PackedValue::<SectionHeader>::deserialize(&view, pos, false) {
            Ok(header) => {
                pos += header.virtual_size();
                image.section_table.push(header);
            }
            Err(_) => {
                errors.add_with_context(SectionError::UnableToReadTable, index as u32);
                break;
            }
        }
    }
    debug!(
        "parsed {} of {} section headers",
        image.section_table.len(),
        section_count
    );

    load_full_headers(&mut image);
    load_section_data(&mut image, &mut errors);
    load_overlay(&mut image);

    if options.validate_headers {
        if let Some(optional) = &image.optional_header {
            let has_relocations = image.has_relocations();
            optional.validate(has_relocations, &mut errors);
        }
    }

    image.errors = errors;
    Ok(image)
}

fn parse_optional_header(
    view: &ByteView<'_>,
    pos: usize,
    errors: &mut ErrorList,
) -> Option<OptionalHeader> {
    let magic_bytes = match view.read(pos, 2) {
        Ok(bytes) => bytes,
        Err(_) => {
            errors.add(OptionalHeaderError::UnableToRead);
            return None;
        }
    };
    let magic = u16::from_le_bytes([magic_bytes[0], magic_bytes[1]]);
    let header = match Magic::from_u16(magic) {
        Some(Magic::PE32) => PackedValue::<OptionalHeader32>::deserialize(view, pos, false)
            .map(OptionalHeader::Pe32),
        Some(Magic::PE64) => PackedValue::<OptionalHeader64>::deserialize(view, pos, false)
            .map(OptionalHeader::Pe64),
        None => {
            errors.add(OptionalHeaderError::InvalidPeMagic);
            return None;
        }
    };
    match header {
        Ok(header) => Some(header),
        Err(_) => {
            errors.add(OptionalHeaderError::UnableToRead);
            None
        }
    }
}

fn load_full_headers(image: &mut Image<'_>) {
    let file_len = image.data.len();
    let mut end = match &image.optional_header {
        Some(optional) => (optional.size_of_headers() as usize).min(file_len),
        None => file_len,
    };
    for header in &image.section_table {
        let start = if image.loaded_to_memory {
            header.virtual_address
        } else {
            header.pointer_to_raw_data
        };
        if start != 0 && header.size_of_raw_data != 0 {
            end = end.min(start as usize);
        }
    }
    image.full_headers = DataRange {
        offset: 0,
        physical_size: end,
        virtual_size: end,
    };
}

fn load_section_data(image: &mut Image<'_>, errors: &mut ErrorList) {
    let file_len = image.data.len();
    let alignment = image
        .optional_header
        .as_ref()
        .map(|o| o.section_alignment())
        .unwrap_or(1);

    for index in 0..image.section_table.len() {
        let header = &image.section_table[index];
        let offset = if image.loaded_to_memory {
            header.virtual_address as usize
        } else {
            header.pointer_to_raw_data as usize
        };
        let raw_size = header.size_of_raw_data as usize;
        let virtual_size = header.aligned_virtual_size(alignment).max(raw_size as u64) as usize;

        if raw_size == 0 {
            image.section_data.push(DataRange {
                offset,
                physical_size: 0,
                virtual_size,
            });
            continue;
        }

        let available = file_len.saturating_sub(offset).min(raw_size);
        if available < raw_size {
            errors.add_with_context(SectionError::InvalidRawData, index as u32);
        }
        image.section_data.push(DataRange {
            offset,
            physical_size: available,
            virtual_size,
        });
    }
}

fn load_overlay(image: &mut Image<'_>) {
    if image.loaded_to_memory {
        return;
    }
    let file_len = image.data.len();
    let mut data_end = image.full_headers.end();
    let file_alignment = image
        .optional_header
        .as_ref()
        .map(|o| o.file_alignment() as u64)
        .unwrap_or(1);
    for range in &image.section_data {
        if range.physical_size != 0 {
            data_end = data_end.max(align_up(range.end() as u64, file_alignment) as usize);
        }
    }
    let data_end = data_end.min(file_len);
    if data_end < file_len {
        image.overlay = DataRange {
            offset: data_end,
            physical_size: file_len - data_end,
            virtual_size: file_len - data_end,
        };
    }
}
