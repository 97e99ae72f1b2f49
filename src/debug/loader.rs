use log::{debug, warn};

use crate::buffer::ByteView;
use crate::directories::DirectoryType;
use crate::error::{DebugDirectoryError, ErrorList};
use crate::image::{range_view, rva_to_file_offset, section_data_from_rva, DataRange, Image};
use crate::packed::{
    PackedByteArray, PackedCString, PackedStruct, PackedValue,
};

use super::{
    CodeViewPdb2, CodeViewPdb7, CodeViewPdb2Header, CodeViewPdb7Header, CoffDebugHeader,
    DebugDescriptor, DebugDirectoryEntry, DebugDirectoryList, DebugEntryPayload, DebugType,
    ExDllCharacteristics, FpoEntry, MiscData, MiscHeader, MpdbHeader, OmapEntry, PogoData,
    PogoEntry, VcFeatureData, CODEVIEW_PDB2_SIGNATURE, CODEVIEW_PDB7_SIGNATURE,
};

/// Controls for the debug directory loader.
#[derive(Debug, Clone)]
pub struct DebugLoaderOptions {
    /// Serve payloads that live inside the headers.
    pub include_headers: bool,
    /// Serve payloads that live in the overlay (file offset only, no RVA).
    pub include_overlay: bool,
    /// Tolerate payloads that extend past a section's physical end.
    pub allow_virtual_data: bool,
    /// Copy payload bytes out of the image instead of borrowing them.
    pub copy_raw_data: bool,
    /// Cap on the number of descriptors.
    pub max_debug_directories: u32,
    /// Cap on one entry's payload size in bytes.
    pub max_raw_data_size: u32,
}

impl Default for DebugLoaderOptions {
    fn default() -> Self {
        Self {
            include_headers: true,
            include_overlay: true,
            allow_virtual_data: false,
            copy_raw_data: false,
            max_debug_directories: 0xff,
            max_raw_data_size: 10_000_000,
        }
    }
}

/// Loads the debug directory. Returns `None` when the image has no debug
/// data-directory entry; otherwise every recoverable anomaly lands on the
/// directory's or the affected entry's error list.
pub fn load<'i>(
    image: &'i Image<'_>,
    options: &DebugLoaderOptions,
) -> Option<DebugDirectoryList<'i>> {
    let directory = image.data_directories().get_directory(DirectoryType::Debug)?;
    let dir_rva = directory.virtual_address;
    let dir_size = directory.size;

    let mut list = DebugDirectoryList::default();
    let descriptor_size = DebugDescriptor::packed_size() as u32;

    if dir_size % descriptor_size != 0 {
        list.errors.add(DebugDirectoryError::InvalidDebugDirectorySize);
    }
    let mut count = dir_size / descriptor_size;
    if count > options.max_debug_directories {
        warn!(
            "debug directory declares {count} descriptors, capping at {}",
            options.max_debug_directories
        );
        list.errors.add(DebugDirectoryError::TooManyDebugDirectories);
        count = options.max_debug_directories;
    }
    if dir_size > count * descriptor_size {
        list.errors.add(DebugDirectoryError::ExcessiveDataInDirectory);
    }

    let table = match section_data_from_rva(
        image,
        dir_rva,
        count * descriptor_size,
        options.include_headers,
        options.allow_virtual_data,
    ) {
        Ok(view) => view,
        Err(_) => {
            list.errors.add(DebugDirectoryError::UnableToLoadEntries);
            return Some(list);
        }
    };

    for index in 0..count {
        let pos = (index * descriptor_size) as usize;
        let descriptor = match PackedValue::<DebugDescriptor>::deserialize(
            &table,
            pos,
            options.allow_virtual_data,
        ) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                list.errors
                    .add_with_context(DebugDirectoryError::UnableToLoadEntries, index);
                break;
            }
        };
        list.entries.push(load_entry(image, descriptor, options));
    }

    debug!("loaded {} debug entries", list.entries.len());
    Some(list)
}

fn load_entry<'i>(
    image: &'i Image<'_>,
    descriptor: PackedValue<DebugDescriptor>,
    options: &DebugLoaderOptions,
) -> DebugDirectoryEntry<'i> {
    let mut entry = DebugDirectoryEntry {
        descriptor,
        ..Default::default()
    };

    let size = entry.descriptor.size_of_data;
    if size > options.max_raw_data_size {
        entry.errors.add(DebugDirectoryError::TooBigRawData);
        return entry;
    }

    let rva = entry.descriptor.address_of_raw_data;
    let file_offset = entry.descriptor.pointer_to_raw_data;

    // An entry may carry both addressing forms; they must agree.
    if rva != 0 && file_offset != 0 {
        match rva_to_file_offset(image, rva) {
            Ok(mapped) if mapped == file_offset => {}
            _ => entry
                .errors
                .add(DebugDirectoryError::RvaAndFileOffsetDoNotMatch),
        }
    }

    let raw_data = if rva != 0 {
        match section_data_from_rva(
            image,
            rva,
            size,
            options.include_headers,
            options.allow_virtual_data,
        ) {
            Ok(view) => Some(view),
            Err(_) => {
                entry.errors.add(DebugDirectoryError::UnableToLoadRawData);
                None
            }
        }
    } else if file_offset != 0 {
        // Pure file-offset payloads live in the overlay.
        if !options.include_overlay {
            entry.errors.add(DebugDirectoryError::InvalidFileOffset);
            None
        } else {
            let offset = file_offset as usize;
            let end = offset.checked_add(size as usize);
            match end {
                Some(end) if end <= image.data().len() => Some(range_view(
                    image.data(),
                    &DataRange {
                        offset,
                        physical_size: size as usize,
                        virtual_size: size as usize,
                    },
                )),
                _ => {
                    entry.errors.add(DebugDirectoryError::InvalidFileOffset);
                    None
                }
            }
        }
    } else {
        entry.errors.add(DebugDirectoryError::NoRvaAndFileOffset);
        None
    };

    let Some(raw_data) = raw_data else {
        return entry;
    };

    entry.payload = parse_payload(&entry.descriptor, &raw_data, options, &mut entry.errors);
    entry.raw_data = if options.copy_raw_data {
        Some(raw_data.clone().into_owned())
    } else {
        Some(raw_data)
    };
    entry
}

fn parse_payload(
    descriptor: &DebugDescriptor,
    data: &ByteView<'_>,
    options: &DebugLoaderOptions,
    errors: &mut ErrorList,
) -> DebugEntryPayload {
    let allow_virtual = options.allow_virtual_data;
    let result = match descriptor.get_type() {
        Some(DebugType::Coff) => PackedValue::<CoffDebugHeader>::deserialize(data, 0, allow_virtual)
            .map(DebugEntryPayload::Coff),
        Some(DebugType::CodeView) => parse_codeview(data, allow_virtual),
        Some(DebugType::Fpo) => parse_array::<FpoEntry>(data, allow_virtual).map(DebugEntryPayload::Fpo),
        Some(DebugType::Misc) => parse_misc(data, allow_virtual),
        Some(DebugType::OmapToSrc) => {
            parse_array::<OmapEntry>(data, allow_virtual).map(DebugEntryPayload::OmapToSrc)
        }
        Some(DebugType::OmapFromSrc) => {
            parse_array::<OmapEntry>(data, allow_virtual).map(DebugEntryPayload::OmapFromSrc)
        }
        Some(DebugType::VcFeature) => {
            PackedValue::<VcFeatureData>::deserialize(data, 0, allow_virtual)
                .map(DebugEntryPayload::VcFeature)
        }
        Some(DebugType::Pogo) => parse_pogo(data, allow_virtual),
        Some(DebugType::ExDllCharacteristics) => data.read_virtual(0, 4).map_err(Into::into).map(|b| {
            let raw = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            DebugEntryPayload::ExDllCharacteristics {
                flags: ExDllCharacteristics::from_bits_truncate(raw),
                raw,
            }
        }),
        Some(DebugType::Clsid) => PackedByteArray::<16>::deserialize(data, 0, allow_virtual)
            .map(DebugEntryPayload::Clsid),
        Some(DebugType::Mpdb) => PackedValue::<MpdbHeader>::deserialize(data, 0, allow_virtual)
            .map(DebugEntryPayload::Mpdb),
        _ => Ok(DebugEntryPayload::Raw),
    };

    match result {
        Ok(payload) => payload,
        Err(_) => {
            errors.add(DebugDirectoryError::InvalidEntry);
            DebugEntryPayload::Raw
        }
    }
}

fn parse_codeview(
    data: &ByteView<'_>,
    allow_virtual: bool,
) -> Result<DebugEntryPayload, crate::error::PeErrorCode> {
    let signature_bytes = data.read_virtual(0, 4)?;
    let signature = u32::from_le_bytes([
        signature_bytes[0],
        signature_bytes[1],
        signature_bytes[2],
        signature_bytes[3],
    ]);
    match signature {
        CODEVIEW_PDB7_SIGNATURE => {
            let header = PackedValue::<CodeViewPdb7Header>::deserialize(data, 0, allow_virtual)?;
            let pdb_path = PackedCString::deserialize(data, header.virtual_size(), allow_virtual)?;
            Ok(DebugEntryPayload::CodeViewPdb7(CodeViewPdb7 {
                header,
                pdb_path,
            }))
        }
        CODEVIEW_PDB2_SIGNATURE => {
            let header = PackedValue::<CodeViewPdb2Header>::deserialize(data, 0, allow_virtual)?;
            let pdb_path = PackedCString::deserialize(data, header.virtual_size(), allow_virtual)?;
            Ok(DebugEntryPayload::CodeViewPdb2(CodeViewPdb2 {
                header,
                pdb_path,
            }))
        }
        signature => Ok(DebugEntryPayload::CodeViewOmf { signature }),
    }
}

fn parse_array<T: PackedStruct>(
    data: &ByteView<'_>,
    allow_virtual: bool,
) -> Result<Vec<PackedValue<T>>, crate::error::PeErrorCode> {
    let mut entries = Vec::new();
    let total = data.virtual_size();
    let mut pos = 0;
    while pos + T::packed_size() <= total {
        entries.push(PackedValue::<T>::deserialize(data, pos, allow_virtual)?);
        pos += T::packed_size();
    }
    Ok(entries)
}

fn parse_misc(
    data: &ByteView<'_>,
    allow_virtual: bool,
) -> Result<DebugEntryPayload, crate::error::PeErrorCode> {
    let header = PackedValue::<MiscHeader>::deserialize(data, 0, allow_virtual)?;
    let name = if header.unicode != 0 {
        let raw = data.read_virtual(
            header.virtual_size(),
            data.virtual_size().saturating_sub(header.virtual_size()),
        )?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        PackedCString::deserialize(data, header.virtual_size(), allow_virtual)?
            .value()
            .to_string()
    };
    Ok(DebugEntryPayload::Misc(MiscData { header, data: name }))
}

fn parse_pogo(
    data: &ByteView<'_>,
    allow_virtual: bool,
) -> Result<DebugEntryPayload, crate::error::PeErrorCode> {
    let signature_bytes = data.read_virtual(0, 4)?;
    let signature = u32::from_le_bytes([
        signature_bytes[0],
        signature_bytes[1],
        signature_bytes[2],
        signature_bytes[3],
    ]);
    let mut pogo = PogoData {
        signature,
        entries: Vec::new(),
    };
    let mut pos = 4usize;
    while pos + 8 < data.virtual_size() {
        let fields = data.read_virtual(pos, 8)?;
        let rva = u32::from_le_bytes([fields[0], fields[1], fields[2], fields[3]]);
        let size = u32::from_le_bytes([fields[4], fields[5], fields[6], fields[7]]);
        if rva == 0 && size == 0 {
            break;
        }
        let name = PackedCString::deserialize(data, pos + 8, allow_virtual)?;
        // Entries are padded to the next 4-byte boundary.
        let name_len = name.value().len() + 1;
        pos += 8 + (name_len + 3) / 4 * 4;
        pogo.entries.push(PogoEntry {
            rva,
            size,
            name: name.value().to_string(),
        });
    }
    Ok(DebugEntryPayload::Pogo(pogo))
}
