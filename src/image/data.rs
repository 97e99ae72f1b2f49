use crate::buffer::ByteView;
use crate::error::{ImageError, PeErrorCode};

use super::{range_view, search::section_from_rva, AddressConverter, DataRange, Image};

/// Borrows `data_size` bytes starting at `rva`.
///
/// Header-resident RVAs are served from the full-headers buffer when
/// `include_headers` is set. The window may cross a section's physical
/// end only when `allow_virtual_data` is set; the result then reports
/// `virtual_size() > physical_size()`.
pub fn section_data_from_rva<'i>(
    image: &'i Image<'_>,
    rva: u32,
    data_size: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<ByteView<'i>, PeErrorCode> {
    let headers_size = image.full_headers.physical_size;
    if (rva as usize) < headers_size {
        let end = (rva as usize)
            .checked_add(data_size as usize)
            .ok_or(ImageError::SectionDataDoesNotExist)?;
        if !include_headers || end > headers_size {
            return Err(ImageError::SectionDataDoesNotExist.into());
        }
        return Ok(range_view(
            &image.data,
            &DataRange {
                offset: rva as usize,
                physical_size: data_size as usize,
                virtual_size: data_size as usize,
            },
        ));
    }

    let section =
        section_from_rva(image, rva, data_size).ok_or(ImageError::SectionDataDoesNotExist)?;
    let data_offset = (rva - section.header.virtual_address) as usize;
    let available = section.data.physical_size.saturating_sub(data_offset);
    if !allow_virtual_data && available < data_size as usize {
        return Err(ImageError::SectionDataDoesNotExist.into());
    }
    Ok(range_view(
        &image.data,
        &DataRange {
            offset: section.data.offset + data_offset,
            physical_size: available.min(data_size as usize),
            virtual_size: data_size as usize,
        },
    ))
}

/// [`section_data_from_rva`] with a VA input.
pub fn section_data_from_va<'i>(
    image: &'i Image<'_>,
    va: u64,
    data_size: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<ByteView<'i>, PeErrorCode> {
    let rva = AddressConverter::from_image(image).va_to_rva(va)?;
    section_data_from_rva(image, rva, data_size, include_headers, allow_virtual_data)
}

/// Borrows everything from `rva` to the end of its containing region
/// (headers or section), without a requested size.
pub fn section_data_strict_from_rva<'i>(
    image: &'i Image<'_>,
    rva: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<ByteView<'i>, PeErrorCode> {
    let length = section_data_length_from_rva(image, rva, include_headers, allow_virtual_data)?;
    section_data_from_rva(image, rva, length, include_headers, allow_virtual_data)
}

/// Largest byte count retrievable from `rva` under the given flags.
pub fn section_data_length_from_rva(
    image: &Image<'_>,
    rva: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<u32, PeErrorCode> {
    let headers_size = image.full_headers.physical_size;
    if (rva as usize) < headers_size {
        if !include_headers {
            return Err(ImageError::SectionDataDoesNotExist.into());
        }
        return Ok((headers_size - rva as usize) as u32);
    }

    let section = section_from_rva(image, rva, 0).ok_or(ImageError::SectionDataDoesNotExist)?;
    let data_offset = (rva - section.header.virtual_address) as usize;
    let physical = section.data.physical_size.saturating_sub(data_offset);
    if allow_virtual_data {
        let total = section.data.virtual_size.saturating_sub(data_offset);
        Ok(total as u32)
    } else {
        Ok(physical as u32)
    }
}
