use crate::error::AddressConverterError;
use crate::optional::OptionalHeader;

use super::Image;

/// Converts between RVAs and VAs for one image base.
#[derive(Debug, Clone, Copy)]
pub struct AddressConverter {
    image_base: u64,
}

impl AddressConverter {
    pub fn new(image_base: u64) -> Self {
        Self { image_base }
    }

    pub fn from_image(image: &Image<'_>) -> Self {
        Self {
            image_base: image
                .optional_header()
                .map(OptionalHeader::image_base)
                .unwrap_or(0),
        }
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    /// `image_base + rva` as a 32-bit pointer.
    pub fn rva_to_va32(&self, rva: u32) -> Result<u32, AddressConverterError> {
        u32::try_from(self.rva_to_va64(rva)?)
            .map_err(|_| AddressConverterError::AddressConversionOverflow)
    }

    /// `image_base + rva` as a 64-bit pointer.
    pub fn rva_to_va64(&self, rva: u32) -> Result<u64, AddressConverterError> {
        self.image_base
            .checked_add(rva as u64)
            .ok_or(AddressConverterError::AddressConversionOverflow)
    }

    /// `va - image_base`; fails when the VA precedes the base or the
    /// result does not fit 32 bits.
    pub fn va_to_rva(&self, va: u64) -> Result<u32, AddressConverterError> {
        let offset = va
            .checked_sub(self.image_base)
            .ok_or(AddressConverterError::AddressConversionOverflow)?;
        u32::try_from(offset).map_err(|_| AddressConverterError::AddressConversionOverflow)
    }
}

/// Maps an RVA to a file offset.
///
/// Header RVAs (below `size_of_headers`) map to themselves; section RVAs
/// map through the section's raw-data pointer. RVAs that land in no
/// section, or past a section's raw size, have no file offset.
pub fn rva_to_file_offset(image: &Image<'_>, rva: u32) -> Result<u32, crate::error::PeErrorCode> {
    use crate::error::BufferError;

    let Some(optional) = image.optional_header() else {
        return Err(BufferError::BufferOverrun.into());
    };
    if rva < optional.size_of_headers() {
        return Ok(rva);
    }
    let alignment = optional.section_alignment();
    for header in image.section_table() {
        if header.contains_rva(rva, 0, alignment) {
            let delta = rva - header.virtual_address;
            if delta >= header.size_of_raw_data {
                return Err(BufferError::BufferOverrun.into());
            }
            return Ok(header.pointer_to_raw_data + delta);
        }
    }
    Err(BufferError::BufferOverrun.into())
}

/// Maps a file offset back to an RVA; the inverse of
/// [`rva_to_file_offset`].
pub fn file_offset_to_rva(image: &Image<'_>, offset: u32) -> Result<u32, crate::error::PeErrorCode> {
    use crate::error::BufferError;

    let Some(optional) = image.optional_header() else {
        return Err(BufferError::BufferOverrun.into());
    };
    if offset < optional.size_of_headers() {
        return Ok(offset);
    }
    for header in image.section_table() {
        if header.contains_file_offset(offset, 0) {
            return Ok(header.virtual_address + (offset - header.pointer_to_raw_data));
        }
    }
    Err(BufferError::BufferOverrun.into())
}
