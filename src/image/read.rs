use crate::error::{ImageError, PeErrorCode};
use crate::packed::{
    PackedByteArray, PackedByteVec, PackedCString, PackedStruct, PackedUtf16String, PackedValue,
};

use super::{
    data::{section_data_from_rva, section_data_strict_from_rva},
    rva_to_file_offset, AddressConverter, Image,
};

/// Policies for the in-place write operations.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Allow the target range to fall inside the headers.
    pub include_headers: bool,
    /// Also write the virtual tail of the value.
    pub write_virtual_part: bool,
    /// Truncate the write instead of failing when the physical target is
    /// too small.
    pub cut_if_does_not_fit: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            include_headers: true,
            write_virtual_part: false,
            cut_if_does_not_fit: false,
        }
    }
}

/// Reads a packed record at `rva`.
pub fn struct_from_rva<T: PackedStruct>(
    image: &Image<'_>,
    rva: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedValue<T>, PeErrorCode> {
    let view = section_data_from_rva(
        image,
        rva,
        T::packed_size() as u32,
        include_headers,
        allow_virtual_data,
    )?;
    PackedValue::deserialize(&view, 0, allow_virtual_data)
}

/// Reads a packed record at `va`.
pub fn struct_from_va<T: PackedStruct>(
    image: &Image<'_>,
    va: u64,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedValue<T>, PeErrorCode> {
    let rva = AddressConverter::from_image(image).va_to_rva(va)?;
    struct_from_rva(image, rva, include_headers, allow_virtual_data)
}

/// Reads a NUL-terminated narrow string at `rva`.
pub fn cstring_from_rva(
    image: &Image<'_>,
    rva: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedCString, PeErrorCode> {
    let view = section_data_strict_from_rva(image, rva, include_headers, allow_virtual_data)?;
    PackedCString::deserialize(&view, 0, allow_virtual_data)
}

/// Reads a NUL-terminated narrow string at `va`.
pub fn cstring_from_va(
    image: &Image<'_>,
    va: u64,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedCString, PeErrorCode> {
    let rva = AddressConverter::from_image(image).va_to_rva(va)?;
    cstring_from_rva(image, rva, include_headers, allow_virtual_data)
}

/// Reads a length-prefixed UTF-16 string at `rva`.
pub fn utf16_string_from_rva(
    image: &Image<'_>,
    rva: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedUtf16String, PeErrorCode> {
    let view = section_data_strict_from_rva(image, rva, include_headers, allow_virtual_data)?;
    PackedUtf16String::deserialize(&view, 0, allow_virtual_data)
}

/// Reads a fixed-size byte array at `rva`.
pub fn byte_array_from_rva<const N: usize>(
    image: &Image<'_>,
    rva: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedByteArray<N>, PeErrorCode> {
    let view = section_data_from_rva(image, rva, N as u32, include_headers, allow_virtual_data)?;
    PackedByteArray::deserialize(&view, 0, allow_virtual_data)
}

/// Reads `size` bytes at `rva`.
pub fn byte_vector_from_rva(
    image: &Image<'_>,
    rva: u32,
    size: u32,
    include_headers: bool,
    allow_virtual_data: bool,
) -> Result<PackedByteVec, PeErrorCode> {
    let view = section_data_from_rva(image, rva, size, include_headers, allow_virtual_data)?;
    PackedByteVec::deserialize(&view, 0, size as usize, allow_virtual_data)
}

/// Writes raw bytes to the file region backing `rva`.
pub fn bytes_to_rva(
    image: &mut Image<'_>,
    rva: u32,
    bytes: &[u8],
    options: &WriteOptions,
) -> Result<usize, PeErrorCode> {
    if !options.include_headers {
        let headers_size = image.full_headers.physical_size;
        if (rva as usize) < headers_size {
            return Err(ImageError::SectionDataDoesNotExist.into());
        }
    }
    let offset = rva_to_file_offset(image, rva)? as usize;
    let data = image.data.to_mut();
    let available = data.len().saturating_sub(offset);
    let len = if bytes.len() > available {
        if !options.cut_if_does_not_fit {
            return Err(ImageError::DataDoesNotFit.into());
        }
        available
    } else {
        bytes.len()
    };
    data[offset..offset + len].copy_from_slice(&bytes[..len]);
    Ok(len)
}

/// Writes a packed record to the file region backing `rva`.
///
/// With `write_virtual_part`, all of the record's bytes go out; otherwise
/// only its physical prefix. `cut_if_does_not_fit` truncates at the end
/// of the backing region instead of failing.
pub fn struct_to_rva<T: PackedStruct>(
    image: &mut Image<'_>,
    rva: u32,
    value: &PackedValue<T>,
    options: &WriteOptions,
) -> Result<usize, PeErrorCode> {
    let mut serialized = Vec::with_capacity(T::packed_size());
    value.serialize_append(&mut serialized, options.write_virtual_part);
    bytes_to_rva(image, rva, &serialized, options)
}

/// Writes a NUL-terminated narrow string to the file region backing
/// `rva`.
pub fn cstring_to_rva(
    image: &mut Image<'_>,
    rva: u32,
    value: &PackedCString,
    options: &WriteOptions,
) -> Result<usize, PeErrorCode> {
    let mut serialized = Vec::with_capacity(value.value().len() + 1);
    value.serialize_append(&mut serialized);
    bytes_to_rva(image, rva, &serialized, options)
}

/// Writes a buffer's bytes to the file region backing `rva`. With
/// `write_virtual_part`, the buffer's implicit-zero tail goes out too.
pub fn buffer_to_rva(
    image: &mut Image<'_>,
    rva: u32,
    buffer: &crate::buffer::ByteView<'_>,
    options: &WriteOptions,
) -> Result<usize, PeErrorCode> {
    if options.write_virtual_part && buffer.is_virtual() {
        let bytes = buffer.read_virtual(0, buffer.virtual_size())?;
        bytes_to_rva(image, rva, &bytes, options)
    } else {
        bytes_to_rva(image, rva, buffer.raw_data(), options)
    }
}
