use crate::error::DosHeaderError;
use crate::packed::{packed_record, PackedByteVec};

/// `MZ`, little endian.
pub const DOS_MAGIC: u16 = 0x5A4D;

packed_record! {
    /// MS-DOS header at the start of every image. Only `e_magic` and
    /// `e_lfanew` matter to the PE loader; the rest belongs to the real-mode
    /// stub program.
    pub struct DosHeader {
        /// Magic number, `MZ`.
        pub e_magic: u16,
        /// Bytes on last page of file.
        pub e_cblp: u16,
        /// Pages in file.
        pub e_cp: u16,
        /// Relocations.
        pub e_crlc: u16,
        /// Size of header in paragraphs.
        pub e_cparhdr: u16,
        /// Minimum extra paragraphs needed.
        pub e_minalloc: u16,
        /// Maximum extra paragraphs needed.
        pub e_maxalloc: u16,
        /// Initial (relative) SS value.
        pub e_ss: u16,
        /// Initial SP value.
        pub e_sp: u16,
        /// Checksum.
        pub e_csum: u16,
        /// Initial IP value.
        pub e_ip: u16,
        /// Initial (relative) CS value.
        pub e_cs: u16,
        /// File address of relocation table.
        pub e_lfarlc: u16,
        /// Overlay number.
        pub e_ovno: u16,
        /// Reserved words.
        pub e_res: [u16; 4],
        /// OEM identifier.
        pub e_oemid: u16,
        /// OEM information.
        pub e_oeminfo: u16,
        /// Reserved words.
        pub e_res2: [u16; 10],
        /// File address of the NT signature.
        pub e_lfanew: u32,
    }
}

impl DosHeader {
    /// Checks `e_magic` and that `e_lfanew` points past the DOS header.
    pub fn validate(&self) -> Result<(), DosHeaderError> {
        if self.e_magic != DOS_MAGIC {
            return Err(DosHeaderError::InvalidMagic);
        }
        if (self.e_lfanew as usize) < core::mem::size_of::<DosHeader>() {
            return Err(DosHeaderError::InvalidELfanew);
        }
        Ok(())
    }
}

/// The opaque real-mode program between the DOS header and `e_lfanew`.
/// May be empty.
pub type DosStub = PackedByteVec;
