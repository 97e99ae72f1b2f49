use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{ErrorList, OptionalHeaderError};
use crate::packed::{packed_record, PackedStruct, PackedValue};

/// Magic values discriminating the optional-header variant.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Magic {
    /// 32-bit image
    PE32 = 0x10b,
    /// 64-bit image
    PE64 = 0x20b,
}

packed_record! {
    /// PE32 optional header, up to but not including the data-directory
    /// table (the table length varies with `number_of_rva_and_sizes`).
    pub struct OptionalHeader32 {
        /// Identifies the state of the image file; 0x10B for PE32.
        pub magic: u16,
        /// The linker major version number.
        pub major_linker_version: u8,
        /// The linker minor version number.
        pub minor_linker_version: u8,
        /// The size of the code section(s).
        pub size_of_code: u32,
        /// The size of the initialized data section(s).
        pub size_of_initialized_data: u32,
        /// The size of the uninitialized data section(s).
        pub size_of_uninitialized_data: u32,
        /// Entry point RVA; zero when absent.
        pub address_of_entry_point: u32,
        /// RVA of the beginning-of-code section.
        pub base_of_code: u32,
        /// RVA of the beginning-of-data section. PE32 only.
        pub base_of_data: u32,
        /// Preferred load address; must be a multiple of 64 K.
        pub image_base: u32,
        /// Section alignment in memory; at least `file_alignment`.
        pub section_alignment: u32,
        /// Alignment of section raw data in the file.
        pub file_alignment: u32,
        /// The major version number of the required operating system.
        pub major_operating_system_version: u16,
        /// The minor version number of the required operating system.
        pub minor_operating_system_version: u16,
        /// The major version number of the image.
        pub major_image_version: u16,
        /// The minor version number of the image.
        pub minor_image_version: u16,
        /// The major version number of the subsystem.
        pub major_subsystem_version: u16,
        /// The minor version number of the subsystem.
        pub minor_subsystem_version: u16,
        /// Reserved, must be zero.
        pub win32_version_value: u32,
        /// In-memory size of the image including headers; a multiple of
        /// `section_alignment`.
        pub size_of_image: u32,
        /// Combined size of headers rounded up to `file_alignment`.
        pub size_of_headers: u32,
        /// The image file checksum. Excluded from the Authenticode image
        /// hash.
        pub check_sum: u32,
        /// The subsystem required to run this image.
        pub subsystem: u16,
        /// DLL loading characteristics.
        pub dll_characteristics: u16,
        /// The size of the stack to reserve.
        pub size_of_stack_reserve: u32,
        /// The size of the stack to commit.
        pub size_of_stack_commit: u32,
        /// The size of the local heap space to reserve.
        pub size_of_heap_reserve: u32,
        /// The size of the local heap space to commit.
        pub size_of_heap_commit: u32,
        /// Reserved, must be zero.
        pub loader_flags: u32,
        /// The number of data-directory entries that follow.
        pub number_of_rva_and_sizes: u32,
    }
}

packed_record! {
    /// PE32+ optional header, up to but not including the data-directory
    /// table.
    pub struct OptionalHeader64 {
        /// Identifies the state of the image file; 0x20B for PE32+.
        pub magic: u16,
        /// The linker major version number.
        pub major_linker_version: u8,
        /// The linker minor version number.
        pub minor_linker_version: u8,
        /// The size of the code section(s).
        pub size_of_code: u32,
        /// The size of the initialized data section(s).
        pub size_of_initialized_data: u32,
        /// The size of the uninitialized data section(s).
        pub size_of_uninitialized_data: u32,
        /// Entry point RVA; zero when absent.
        pub address_of_entry_point: u32,
        /// RVA of the beginning-of-code section.
        pub base_of_code: u32,
        /// Preferred load address; must be a multiple of 64 K.
        pub image_base: u64,
        /// Section alignment in memory; at least `file_alignment`.
        pub section_alignment: u32,
        /// Alignment of section raw data in the file.
        pub file_alignment: u32,
        /// The major version number of the required operating system.
        pub major_operating_system_version: u16,
        /// The minor version number of the required operating system.
        pub minor_operating_system_version: u16,
        /// The major version number of the image.
        pub major_image_version: u16,
        /// The minor version number of the image.
        pub minor_image_version: u16,
        /// The major version number of the subsystem.
        pub major_subsystem_version: u16,
        /// The minor version number of the subsystem.
        pub minor_subsystem_version: u16,
        /// Reserved, must be zero.
        pub win32_version_value: u32,
        /// In-memory size of the image including headers; a multiple of
        /// `section_alignment`.
        pub size_of_image: u32,
        /// Combined size of headers rounded up to `file_alignment`.
        pub size_of_headers: u32,
        /// The image file checksum. Excluded from the Authenticode image
        /// hash.
        pub check_sum: u32,
        /// The subsystem required to run this image.
        pub subsystem: u16,
        /// DLL loading characteristics.
        pub dll_characteristics: u16,
        /// The size of the stack to reserve.
        pub size_of_stack_reserve: u64,
        /// The size of the stack to commit.
        pub size_of_stack_commit: u64,
        /// The size of the local heap space to reserve.
        pub size_of_heap_reserve: u64,
        /// The size of the local heap space to commit.
        pub size_of_heap_commit: u64,
        /// Reserved, must be zero.
        pub loader_flags: u32,
        /// The number of data-directory entries that follow.
        pub number_of_rva_and_sizes: u32,
    }
}

/// The subsystem required to run an image.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Subsystem {
    /// An unknown subsystem
    Unknown = 0,
    /// Device drivers and native Windows processes
    Native = 1,
    /// The Windows graphical user interface subsystem
    WindowsGUI = 2,
    /// The Windows character subsystem
    WindowsCUI = 3,
    /// The OS/2 character subsystem
    OS2CUI = 5,
    /// The Posix character subsystem
    PosixCUI = 7,
    /// Native Win9x driver
    NativeWindows = 8,
    /// Windows CE
    WindowsCEGUI = 9,
    /// An EFI application
    EFIApplication = 10,
    /// An EFI driver with boot services
    EFIBootServiceDriver = 11,
    /// An EFI driver with run-time services
    EFIRuntimeDriver = 12,
    /// An EFI ROM image
    EFIROM = 13,
    /// XBOX
    XBOX = 14,
    /// Windows boot application
    WindowsBootApplication = 16,
}

bitflags! {
    /// How a given DLL should be loaded.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DllCharacteristics: u16 {
        /// Reserved, must be zero.
        const IMAGE_DLLCHARACTERISTICS_RESERVED1 = 0x0001;
        /// Reserved, must be zero.
        const IMAGE_DLLCHARACTERISTICS_RESERVED2 = 0x0002;
        /// Reserved, must be zero.
        const IMAGE_DLLCHARACTERISTICS_RESERVED4 = 0x0004;
        /// Reserved, must be zero.
        const IMAGE_DLLCHARACTERISTICS_RESERVED8 = 0x0008;
        /// Image can handle a high entropy 64-bit virtual address space.
        const IMAGE_DLLCHARACTERISTICS_HIGH_ENTROPY_VA = 0x0020;
        /// DLL can be relocated at load time.
        const IMAGE_DLLCHARACTERISTICS_DYNAMIC_BASE = 0x0040;
        /// Code Integrity checks are enforced.
        const IMAGE_DLLCHARACTERISTICS_FORCE_INTEGRITY = 0x0080;
        /// Image is NX compatible.
        const IMAGE_DLLCHARACTERISTICS_NX_COMPAT = 0x0100;
        /// Isolation aware, but do not isolate the image.
        const IMAGE_DLLCHARACTERISTICS_NO_ISOLATION = 0x0200;
        /// Does not use structured exception handling.
        const IMAGE_DLLCHARACTERISTICS_NO_SEH = 0x0400;
        /// Do not bind the image.
        const IMAGE_DLLCHARACTERISTICS_NO_BIND = 0x0800;
        /// Image must execute in an AppContainer.
        const IMAGE_DLLCHARACTERISTICS_APPCONTAINER = 0x1000;
        /// A WDM driver.
        const IMAGE_DLLCHARACTERISTICS_WDM_DRIVER = 0x2000;
        /// Image supports Control Flow Guard.
        const IMAGE_DLLCHARACTERISTICS_GUARD_CF = 0x4000;
        /// Terminal Server aware.
        const IMAGE_DLLCHARACTERISTICS_TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// The optional header: a tagged PE32 / PE32+ variant discriminated by
/// the 2-byte magic, excluding the trailing data-directory table.
#[derive(Debug, Clone)]
pub enum OptionalHeader {
    /// 32-bit image header.
    Pe32(PackedValue<OptionalHeader32>),
    /// 64-bit image header.
    Pe64(PackedValue<OptionalHeader64>),
}

macro_rules! access {
    ($self:ident, $h:ident => $expr:expr) => {
        match $self {
            OptionalHeader::Pe32($h) => $expr,
            OptionalHeader::Pe64($h) => $expr,
        }
    };
}

impl OptionalHeader {
    /// The magic value of the selected variant.
    pub fn magic(&self) -> Magic {
        match self {
            OptionalHeader::Pe32(_) => Magic::PE32,
            OptionalHeader::Pe64(_) => Magic::PE64,
        }
    }

    /// `true` for PE32+.
    pub fn is_64bit(&self) -> bool {
        matches!(self, OptionalHeader::Pe64(_))
    }

    /// The preferred load address, widened to 64 bits.
    pub fn image_base(&self) -> u64 {
        match self {
            OptionalHeader::Pe32(h) => h.image_base as u64,
            OptionalHeader::Pe64(h) => h.image_base,
        }
    }

    /// In-memory section alignment.
    pub fn section_alignment(&self) -> u32 {
        access!(self, h => h.section_alignment)
    }

    /// On-disk section alignment.
    pub fn file_alignment(&self) -> u32 {
        access!(self, h => h.file_alignment)
    }

    /// In-memory size of the image.
    pub fn size_of_image(&self) -> u32 {
        access!(self, h => h.size_of_image)
    }

    /// Combined size of all headers.
    pub fn size_of_headers(&self) -> u32 {
        access!(self, h => h.size_of_headers)
    }

    /// The image file checksum.
    pub fn check_sum(&self) -> u32 {
        access!(self, h => h.check_sum)
    }

    /// Entry point RVA; zero when absent.
    pub fn address_of_entry_point(&self) -> u32 {
        access!(self, h => h.address_of_entry_point)
    }

    /// The declared data-directory count.
    pub fn number_of_rva_and_sizes(&self) -> u32 {
        access!(self, h => h.number_of_rva_and_sizes)
    }

    /// Overwrites the declared data-directory count.
    pub fn set_number_of_rva_and_sizes(&mut self, count: u32) {
        access!(self, h => h.number_of_rva_and_sizes = count)
    }

    /// Overwrites the in-memory image size.
    pub fn set_size_of_image(&mut self, size: u32) {
        access!(self, h => h.size_of_image = size)
    }

    /// The subsystem as an enum.
    pub fn subsystem(&self) -> Option<Subsystem> {
        Subsystem::from_u16(access!(self, h => h.subsystem))
    }

    /// The DLL characteristics as bitflags.
    pub fn dll_characteristics(&self) -> Option<DllCharacteristics> {
        DllCharacteristics::from_bits(access!(self, h => h.dll_characteristics))
    }

    /// Serialized size of the header record, excluding data directories.
    pub fn packed_size(&self) -> usize {
        match self {
            OptionalHeader::Pe32(_) => OptionalHeader32::packed_size(),
            OptionalHeader::Pe64(_) => OptionalHeader64::packed_size(),
        }
    }

    /// Byte offset of the checksum field within the header record. The
    /// Authenticode image hash skips these four bytes.
    pub fn check_sum_offset(&self) -> usize {
        match self {
            OptionalHeader::Pe32(_) => OptionalHeader32::field_offset("check_sum"),
            OptionalHeader::Pe64(_) => OptionalHeader64::field_offset("check_sum"),
        }
    }

    pub(crate) fn serialize_append(&self, out: &mut Vec<u8>) {
        access!(self, h => { h.serialize_append(out, true); })
    }

    /// Structural validation; anomalies accumulate on `errors`.
    pub fn validate(&self, has_relocations: bool, errors: &mut ErrorList) {
        const IMAGE_BASE_MULTIPLE: u64 = 0x10000;
        const MAX_NONRELOC_IMAGE_BASE: u64 = 0x8000_0000;

        if self.image_base() % IMAGE_BASE_MULTIPLE != 0 {
            errors.add(OptionalHeaderError::UnalignedImageBase);
        }
        if !has_relocations
            && self.image_base() + self.size_of_image() as u64 >= MAX_NONRELOC_IMAGE_BASE
        {
            errors.add(OptionalHeaderError::TooLargeImageBase);
        }

        let file_alignment = self.file_alignment();
        let section_alignment = self.section_alignment();
        let low_alignment = file_alignment == section_alignment
            && (1..=0x800).contains(&file_alignment);

        if !file_alignment.is_power_of_two() {
            errors.add(OptionalHeaderError::IncorrectFileAlignment);
        } else if !low_alignment && !(512..=0x10000).contains(&file_alignment) {
            errors.add(OptionalHeaderError::FileAlignmentOutOfRange);
        }

        if !section_alignment.is_power_of_two() {
            errors.add(OptionalHeaderError::IncorrectSectionAlignment);
        } else if section_alignment < file_alignment {
            errors.add(OptionalHeaderError::SectionAlignmentOutOfRange);
        }

        if !low_alignment
            && (self.size_of_headers() > section_alignment
                || self.size_of_headers() > self.size_of_image())
        {
            errors.add(OptionalHeaderError::InvalidSizeOfHeaders);
        }

        let entry = self.address_of_entry_point();
        if entry != 0 && entry < self.size_of_headers() {
            errors.add(OptionalHeaderError::InvalidAddressOfEntryPoint);
        }

        if self.number_of_rva_and_sizes() > crate::directories::MAX_DATA_DIRECTORIES {
            errors.add(OptionalHeaderError::InvalidNumberOfRvaAndSizes);
        }
    }
}
