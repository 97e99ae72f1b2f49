use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::buffer::ByteView;
use crate::error::PeErrorCode;
use crate::packed::{packed_record, PackedValue};

/// Largest number of data-directory entries an image may declare.
pub const MAX_DATA_DIRECTORIES: u32 = 16;

packed_record! {
    /// One data-directory entry: the address and size of a table that
    /// Windows consumes at run time.
    pub struct DataDirectory {
        /// RVA of the table. The security directory is the exception: its
        /// value is a file offset into the overlay.
        pub virtual_address: u32,
        /// Size of the table in bytes.
        pub size: u32,
    }
}

/// Index of a data-directory entry.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DirectoryType {
    /// Export table (.edata)
    Exports = 0,
    /// Import table (.idata)
    Imports = 1,
    /// Resource table (.rsrc)
    Resources = 2,
    /// Exception table (.pdata)
    Exceptions = 3,
    /// Attribute certificate table; file offset, not RVA
    Security = 4,
    /// Base relocation table (.reloc)
    BaseReloc = 5,
    /// Debug data (.debug)
    Debug = 6,
    /// Reserved, must be zero
    Architecture = 7,
    /// Global pointer register value
    GlobalPtr = 8,
    /// Thread local storage table (.tls)
    Tls = 9,
    /// Load configuration table
    LoadConfig = 10,
    /// Bound import table
    BoundImport = 11,
    /// Import address table
    Iat = 12,
    /// Delay import descriptor
    DelayImport = 13,
    /// CLR runtime header (.cormeta)
    ComDescriptor = 14,
    /// Reserved, must be zero
    Reserved = 15,
}

/// The data-directory table: a variable-length sequence of
/// [`DataDirectory`] entries, addressable by [`DirectoryType`].
#[derive(Debug, Clone, Default)]
pub struct DataDirectories {
    entries: Vec<PackedValue<DataDirectory>>,
}

impl DataDirectories {
    /// Reads `count` entries starting at `pos`. The caller caps `count`
    /// at [`MAX_DATA_DIRECTORIES`] beforehand.
    pub(crate) fn deserialize(
        view: &ByteView<'_>,
        pos: usize,
        count: u32,
        allow_virtual: bool,
    ) -> Result<Self, PeErrorCode> {
        let mut entries = Vec::with_capacity(count as usize);
        let mut pos = pos;
        for _ in 0..count {
            let entry = PackedValue::<DataDirectory>::deserialize(view, pos, allow_virtual)?;
            pos += entry.virtual_size();
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    pub(crate) fn serialize_append(&self, out: &mut Vec<u8>) {
        for entry in &self.entries {
            entry.serialize_append(out, true);
        }
    }

    /// Number of entries in the table.
    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// `true` when the entry exists and is non-empty.
    pub fn has_directory(&self, ty: DirectoryType) -> bool {
        self.get_directory(ty).is_some()
    }

    /// The entry for `ty`, when present and non-empty.
    pub fn get_directory(&self, ty: DirectoryType) -> Option<&PackedValue<DataDirectory>> {
        self.entries
            .get(ty as u32 as usize)
            .filter(|d| d.virtual_address != 0 || d.size != 0)
    }

    /// The entry for `ty`, for mutation.
    pub fn get_directory_mut(&mut self, ty: DirectoryType) -> Option<&mut PackedValue<DataDirectory>> {
        self.entries
            .get_mut(ty as u32 as usize)
            .filter(|d| d.virtual_address != 0 || d.size != 0)
    }

    /// Every entry, in table order.
    pub fn entries(&self) -> &[PackedValue<DataDirectory>] {
        &self.entries
    }

    /// Grows (zero-filled) or shrinks the table to `count` entries.
    pub(crate) fn resize(&mut self, count: u32) {
        self.entries
            .resize(count.min(MAX_DATA_DIRECTORIES) as usize, PackedValue::default());
    }

    /// Removes trailing empty entries, keeping at least `min_count`.
    /// Returns the new count.
    pub(crate) fn strip(&mut self, min_count: u32) -> u32 {
        while self.entries.len() as u32 > min_count {
            let last = self.entries.last().expect("non-empty by loop condition");
            if last.virtual_address != 0 || last.size != 0 {
                break;
            }
            self.entries.pop();
        }
        self.entries.len() as u32
    }
}

impl DirectoryType {
    /// All sixteen directory indices in table order.
    pub fn all() -> [DirectoryType; MAX_DATA_DIRECTORIES as usize] {
        core::array::from_fn(|i| DirectoryType::from_u32(i as u32).expect("index in range"))
    }
}
