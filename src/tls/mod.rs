//! TLS data directory loader. Follows the same recipe as the debug
//! loader: fixed descriptor, optional payloads located through address
//! translation, per-directory error accumulation.

use crate::buffer::ByteView;
use crate::directories::DirectoryType;
use crate::error::{ErrorList, TlsDirectoryError};
use crate::image::{section_data_from_va, section_data_length_from_rva, struct_from_rva, struct_from_va, AddressConverter, Image};
use crate::packed::{packed_record, PackedValue};

packed_record! {
    /// PE32 TLS directory descriptor.
    pub struct TlsDirectory32 {
        /// VA of the start of the template raw data.
        pub start_address_of_raw_data: u32,
        /// VA of the end of the template raw data.
        pub end_address_of_raw_data: u32,
        /// VA of the slot that receives the TLS index.
        pub address_of_index: u32,
        /// VA of a null-terminated array of callback VAs.
        pub address_of_callbacks: u32,
        /// Bytes to zero-fill past the template.
        pub size_of_zero_fill: u32,
        /// Alignment characteristics.
        pub characteristics: u32,
    }
}

packed_record! {
    /// PE32+ TLS directory descriptor.
    pub struct TlsDirectory64 {
        /// VA of the start of the template raw data.
        pub start_address_of_raw_data: u64,
        /// VA of the end of the template raw data.
        pub end_address_of_raw_data: u64,
        /// VA of the slot that receives the TLS index.
        pub address_of_index: u64,
        /// VA of a null-terminated array of callback VAs.
        pub address_of_callbacks: u64,
        /// Bytes to zero-fill past the template.
        pub size_of_zero_fill: u32,
        /// Alignment characteristics.
        pub characteristics: u32,
    }
}

packed_record! {
    /// One 32-bit callback pointer.
    pub struct TlsCallback32 {
        /// Callback VA; zero terminates the list.
        pub va: u32,
    }
}

packed_record! {
    /// One 64-bit callback pointer.
    pub struct TlsCallback64 {
        /// Callback VA; zero terminates the list.
        pub va: u64,
    }
}

/// The TLS descriptor in its PE32 or PE32+ form.
#[derive(Debug, Clone)]
pub enum TlsDescriptor {
    /// 32-bit descriptor.
    Tls32(PackedValue<TlsDirectory32>),
    /// 64-bit descriptor.
    Tls64(PackedValue<TlsDirectory64>),
}

/// The loaded TLS directory.
#[derive(Debug, Clone)]
pub struct TlsDirectory<'i> {
    /// The fixed descriptor in its width-specific form.
    pub descriptor: TlsDescriptor,
    /// Callback VAs, in list order, excluding the terminator.
    pub callbacks: Vec<u64>,
    /// The template raw data between the start and end addresses.
    pub raw_data: Option<ByteView<'i>>,
    /// Anomalies recorded while loading.
    pub errors: ErrorList,
}

/// Controls for the TLS loader.
#[derive(Debug, Clone)]
pub struct TlsLoaderOptions {
    /// Serve data that lives inside the headers.
    pub include_headers: bool,
    /// Tolerate data that extends past a section's physical end.
    pub allow_virtual_data: bool,
    /// Copy the template bytes out of the image instead of borrowing.
    pub copy_raw_data: bool,
    /// Cap on the callback list length.
    pub max_callbacks: u32,
    /// Cap on the template size in bytes.
    pub max_raw_data_size: u32,
}

impl Default for TlsLoaderOptions {
    fn default() -> Self {
        Self {
            include_headers: true,
            allow_virtual_data: false,
            copy_raw_data: false,
            max_callbacks: 0x10000,
            max_raw_data_size: 10_000_000,
        }
    }
}

/// Loads the TLS directory. Returns `None` when the image has no TLS
/// data-directory entry.
pub fn load<'i>(image: &'i Image<'_>, options: &TlsLoaderOptions) -> Option<TlsDirectory<'i>> {
    let entry = image.data_directories().get_directory(DirectoryType::Tls)?;
    let rva = entry.virtual_address;

    let mut errors = ErrorList::new();
    let descriptor = if image.is_64bit() {
        struct_from_rva::<TlsDirectory64>(image, rva, options.include_headers, options.allow_virtual_data)
            .map(TlsDescriptor::Tls64)
    } else {
        struct_from_rva::<TlsDirectory32>(image, rva, options.include_headers, options.allow_virtual_data)
            .map(TlsDescriptor::Tls32)
    };
    let descriptor = match descriptor {
        Ok(descriptor) => descriptor,
        Err(_) => {
            errors.add(TlsDirectoryError::InvalidDirectory);
            return Some(TlsDirectory {
                descriptor: TlsDescriptor::Tls32(PackedValue::default()),
                callbacks: Vec::new(),
                raw_data: None,
                errors,
            });
        }
    };

    let mut directory = TlsDirectory {
        descriptor,
        callbacks: Vec::new(),
        raw_data: None,
        errors,
    };

    load_callbacks(image, options, &mut directory);
    load_raw_data(image, options, &mut directory);
    Some(directory)
}

fn load_callbacks(image: &Image<'_>, options: &TlsLoaderOptions, directory: &mut TlsDirectory<'_>) {
    let callbacks_va = match &directory.descriptor {
        TlsDescriptor::Tls32(d) => d.address_of_callbacks as u64,
        TlsDescriptor::Tls64(d) => d.address_of_callbacks,
    };
    if callbacks_va == 0 {
        return;
    }

    let entry_size = if image.is_64bit() { 8u64 } else { 4u64 };
    let mut va = callbacks_va;
    loop {
        if directory.callbacks.len() as u32 >= options.max_callbacks {
            directory.errors.add(TlsDirectoryError::TooManyCallbacks);
            return;
        }
        let callback = if image.is_64bit() {
            struct_from_va::<TlsCallback64>(image, va, options.include_headers, options.allow_virtual_data)
                .map(|c| c.va)
        } else {
            struct_from_va::<TlsCallback32>(image, va, options.include_headers, options.allow_virtual_data)
                .map(|c| c.va as u64)
        };
        match callback {
            Ok(0) => return,
            Ok(callback) => directory.callbacks.push(callback),
            Err(_) => {
                directory.errors.add(TlsDirectoryError::InvalidCallbacks);
                return;
            }
        }
        va += entry_size;
    }
}

fn load_raw_data<'i>(
    image: &'i Image<'_>,
    options: &TlsLoaderOptions,
    directory: &mut TlsDirectory<'i>,
) {
    let (start, end) = match &directory.descriptor {
        TlsDescriptor::Tls32(d) => (
            d.start_address_of_raw_data as u64,
            d.end_address_of_raw_data as u64,
        ),
        TlsDescriptor::Tls64(d) => (d.start_address_of_raw_data, d.end_address_of_raw_data),
    };
    if start == 0 {
        return;
    }
    if start > end || end - start > u32::MAX as u64 {
        directory.errors.add(TlsDirectoryError::InvalidRawData);
        return;
    }
    let declared = (end - start) as u32;
    if declared > options.max_raw_data_size {
        directory.errors.add(TlsDirectoryError::TooBigRawData);
        return;
    }

    let converter = AddressConverter::from_image(image);
    let rva = match converter.va_to_rva(start) {
        Ok(rva) => rva,
        Err(_) => {
            directory.errors.add(TlsDirectoryError::InvalidRawData);
            return;
        }
    };
    let available = match section_data_length_from_rva(image, rva, options.include_headers, false) {
        Ok(length) => length,
        Err(_) => {
            directory.errors.add(TlsDirectoryError::InvalidRawData);
            return;
        }
    };
    let length = declared.min(available);
    if length == 0 {
        return;
    }
    match section_data_from_va(image, start, length, options.include_headers, false) {
        Ok(view) => {
            directory.raw_data = if options.copy_raw_data {
                Some(view.into_owned())
            } else {
                Some(view)
            };
        }
        Err(_) => directory.errors.add(TlsDirectoryError::InvalidRawData),
    }
}
