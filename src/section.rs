use bitflags::bitflags;
use core::fmt;

use crate::packed::packed_record;

packed_record! {
    /// Name, size, characteristics and location of one section.
    pub struct SectionHeader {
        /// An 8-byte, null-padded UTF-8 encoded string.
        pub name: [u8; 8],
        /// The total size of the section when loaded into memory; zero-padded
        /// past `size_of_raw_data`.
        pub virtual_size: u32,
        /// RVA of the first byte of the section.
        pub virtual_address: u32,
        /// The size of the initialized data on disk; a multiple of the file
        /// alignment, possibly larger than `virtual_size`.
        pub size_of_raw_data: u32,
        /// The file pointer to the first page of the section. Interpreted as
        /// an RVA when the image was loaded to memory.
        pub pointer_to_raw_data: u32,
        /// The file pointer to the beginning of relocation entries; zero for
        /// executable images.
        pub pointer_to_relocations: u32,
        /// The file pointer to COFF line-number entries. Deprecated.
        pub pointer_to_linenumbers: u32,
        /// The number of relocation entries; zero for executable images.
        pub number_of_relocations: u16,
        /// The number of line-number entries. Deprecated.
        pub number_of_linenumbers: u16,
        /// The flags that describe the characteristics of the section.
        pub characteristics: u32,
    }
}

impl fmt::Display for SectionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Section Header")?;
        writeln!(f, "--------------")?;
        writeln!(f, "Name:                    {}", self.name())?;
        writeln!(f, "Virtual Size:            {}", self.virtual_size)?;
        writeln!(f, "Virtual Address:         {:#010x}", self.virtual_address)?;
        writeln!(f, "Size of Raw Data:        {}", self.size_of_raw_data)?;
        writeln!(f, "Pointer to Raw Data:     {}", self.pointer_to_raw_data)?;
        writeln!(f, "Characteristics:         {:#010x}", self.characteristics)?;
        Ok(())
    }
}

bitflags! {
    /// Section characteristics.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SectionFlags: u32 {
        /// The section should not be padded to the next boundary. Obsolete.
        const IMAGE_SCN_TYPE_NO_PAD = 0x00000008;
        /// The section contains executable code.
        const IMAGE_SCN_CNT_CODE = 0x00000020;
        /// The section contains initialized data.
        const IMAGE_SCN_CNT_INITALIZED_DATA = 0x00000040;
        /// The section contains uninitialized data.
        const IMAGE_SCN_CNT_UNINITALIZED_DATA = 0x00000080;
        /// Reserved for future use.
        const IMAGE_SCN_LNK_OTHER = 0x00000100;
        /// The section contains comments or other information. Object files
        /// only.
        const IMAGE_SCN_LNK_INFO = 0x00000200;
        /// The section will not become part of the image. Object files only.
        const IMAGE_SCN_LNK_REMOVE = 0x00000800;
        /// The section contains COMDAT data. Object files only.
        const IMAGE_SCN_LNK_COMDAT = 0x00001000;
        /// The section contains data referenced through the global pointer.
        const IMAGE_SCN_GPREL = 0x00008000;
        /// Reserved for future use.
        const IMAGE_SCN_MEM_PURGABLE = 0x00020000;
        /// Reserved for future use.
        const IMAGE_SCN_MEM_LOCKED = 0x00040000;
        /// Reserved for future use.
        const IMAGE_SCN_MEM_PRELOAD = 0x00080000;
        /// Align data on a 1-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_1BYTES = 0x00100000;
        /// Align data on a 2-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_2BYTES = 0x00200000;
        /// Align data on a 4-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_4BYTES = 0x00300000;
        /// Align data on a 8-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_8BYTES = 0x00400000;
        /// Align data on a 16-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_16BYTES = 0x00500000;
        /// Align data on a 32-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_32BYTES = 0x00600000;
        /// Align data on a 64-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_64BYTES = 0x00700000;
        /// Align data on a 128-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_128BYTES = 0x00800000;
        /// Align data on a 256-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_256BYTES = 0x00900000;
        /// Align data on a 512-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_512BYTES = 0x00A00000;
        /// Align data on a 1024-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_1024BYTES = 0x00B00000;
        /// Align data on a 2048-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_2048BYTES = 0x00C00000;
        /// Align data on a 4096-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_4096BYTES = 0x00D00000;
        /// Align data on a 8192-byte boundary. Object files only.
        const IMAGE_SCN_ALIGN_8192BYTES = 0x00E00000;
        /// The section contains extended relocations.
        const IMAGE_SCN_LNK_NRELOC_OVFL = 0x01000000;
        /// The section can be discarded as needed.
        const IMAGE_SCN_MEM_DISCARDABLE = 0x02000000;
        /// The section cannot be cached.
        const IMAGE_SCN_MEM_NOT_CACHED = 0x04000000;
        /// The section is not pageable.
        const IMAGE_SCN_MEM_NOT_PAGED = 0x08000000;
        /// The section can be shared in memory.
        const IMAGE_SCN_MEM_SHARED = 0x10000000;
        /// The section can be executed as code.
        const IMAGE_SCN_MEM_EXECUTE = 0x20000000;
        /// The section can be read.
        const IMAGE_SCN_MEM_READ = 0x40000000;
        /// The section can be written to.
        const IMAGE_SCN_MEM_WRITE = 0x80000000;
    }
}

impl SectionHeader {
    /// The section name with trailing NUL padding removed. May be lossy
    /// for non-UTF-8 names.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.name)
            .trim_end_matches('\0')
            .to_string()
    }

    /// Returns the characteristics as bitflags, dropping unknown bits.
    pub fn section_flags(&self) -> SectionFlags {
        SectionFlags::from_bits_truncate(self.characteristics)
    }

    /// Virtual size rounded up to `section_alignment`; falls back to the
    /// raw size for sections that declare no virtual size.
    pub fn aligned_virtual_size(&self, section_alignment: u32) -> u64 {
        let size = if self.virtual_size != 0 {
            self.virtual_size
        } else {
            self.size_of_raw_data
        };
        align_up(size as u64, section_alignment as u64)
    }

    /// `true` when `[rva, rva + data_size)` lies inside the section's
    /// aligned virtual range.
    pub fn contains_rva(&self, rva: u32, data_size: u32, section_alignment: u32) -> bool {
        let start = self.virtual_address as u64;
        let end = start + self.aligned_virtual_size(section_alignment);
        let rva = rva as u64;
        rva >= start && rva < end && rva + data_size as u64 <= end
    }

    /// `true` when `[offset, offset + data_size)` lies inside the
    /// section's raw data interval.
    pub fn contains_file_offset(&self, offset: u32, data_size: u32) -> bool {
        let start = self.pointer_to_raw_data as u64;
        let end = start + self.size_of_raw_data as u64;
        let offset = offset as u64;
        offset >= start && offset < end && offset + data_size as u64 <= end
    }
}

/// Rounds `value` up to a multiple of `alignment` (a power of two;
/// zero and one leave the value unchanged).
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    (value + alignment - 1) & !(alignment - 1)
}
