//! Debug data directory: typed entries plus per-entry error accumulation.

mod loader;

pub use loader::{load, DebugLoaderOptions};

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::buffer::ByteView;
use crate::error::ErrorList;
use crate::packed::{packed_record, PackedByteArray, PackedCString, PackedValue};

packed_record! {
    /// One debug directory descriptor; a typed payload follows at the
    /// recorded RVA or file offset.
    pub struct DebugDescriptor {
        /// Reserved, must be zero.
        pub characteristics: u32,
        /// Time and date the debug data was created.
        pub time_date_stamp: u32,
        /// Major version number of the debug data format.
        pub major_version: u16,
        /// Minor version number of the debug data format.
        pub minor_version: u16,
        /// Format of the debugging information.
        pub debug_type: u32,
        /// Size of the debug data, excluding the debug directory itself.
        pub size_of_data: u32,
        /// RVA of the debug data when mapped; zero when the data is not
        /// mapped.
        pub address_of_raw_data: u32,
        /// File pointer to the debug data.
        pub pointer_to_raw_data: u32,
    }
}

/// Debug information formats.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DebugType {
    /// An unknown value, ignored by all tools
    Unknown = 0,
    /// COFF debugging information
    Coff = 1,
    /// CodeView debugging information (PDB)
    CodeView = 2,
    /// Frame pointer omission information
    Fpo = 3,
    /// The location of a DBG file
    Misc = 4,
    /// A copy of the .pdata section
    Exception = 5,
    /// Reserved
    Fixup = 6,
    /// Mapping from an RVA in the image to an RVA in source
    OmapToSrc = 7,
    /// Mapping from an RVA in source to an RVA in the image
    OmapFromSrc = 8,
    /// Reserved for Borland
    Borland = 9,
    /// Reserved (BBT)
    Bbt = 10,
    /// CLSID
    Clsid = 11,
    /// Visual C++ feature counts
    VcFeature = 12,
    /// Profile guided optimization metadata
    Pogo = 13,
    /// Incremental link-time code generation
    Iltcg = 14,
    /// Intel MPX
    Mpx = 15,
    /// The image is reproducible
    Repro = 16,
    /// Embedded portable PDB
    Mpdb = 17,
    /// Sample profile guided optimization metadata
    Spgo = 18,
    /// PDB checksum
    PdbHash = 19,
    /// Extended DLL characteristics
    ExDllCharacteristics = 20,
}

impl DebugDescriptor {
    /// The descriptor's type as an enum.
    pub fn get_type(&self) -> Option<DebugType> {
        DebugType::from_u32(self.debug_type)
    }
}

packed_record! {
    /// COFF debug information header.
    pub struct CoffDebugHeader {
        /// Number of symbols in the COFF symbol table.
        pub number_of_symbols: u32,
        /// Offset of the first symbol within the debug data.
        pub lva_to_first_symbol: u32,
        /// Number of line-number entries.
        pub number_of_linenumbers: u32,
        /// Offset of the first line-number entry within the debug data.
        pub lva_to_first_linenumber: u32,
        /// RVA of the first byte of code.
        pub rva_to_first_byte_of_code: u32,
        /// RVA of the last byte of code.
        pub rva_to_last_byte_of_code: u32,
        /// RVA of the first byte of data.
        pub rva_to_first_byte_of_data: u32,
        /// RVA of the last byte of data.
        pub rva_to_last_byte_of_data: u32,
    }
}

/// `RSDS`
pub const CODEVIEW_PDB7_SIGNATURE: u32 = 0x5344_5352;
/// `NB10`
pub const CODEVIEW_PDB2_SIGNATURE: u32 = 0x3031_424E;

packed_record! {
    /// CodeView PDB 7.0 record (`RSDS`), followed by the PDB path.
    pub struct CodeViewPdb7Header {
        /// `RSDS`.
        pub signature: u32,
        /// GUID identifying the PDB.
        pub guid: [u8; 16],
        /// Incremented each time the PDB is written.
        pub age: u32,
    }
}

packed_record! {
    /// CodeView PDB 2.0 record (`NB10`), followed by the PDB path.
    pub struct CodeViewPdb2Header {
        /// `NB10`.
        pub signature: u32,
        /// Always zero.
        pub offset: u32,
        /// Timestamp identifying the PDB.
        pub timestamp: u32,
        /// Incremented each time the PDB is written.
        pub age: u32,
    }
}

packed_record! {
    /// One frame-pointer-omission record.
    pub struct FpoEntry {
        /// Offset of the first byte of the function code.
        pub ul_off_start: u32,
        /// Number of bytes in the function.
        pub cb_proc_size: u32,
        /// Number of local variables.
        pub cdw_locals: u32,
        /// Size of the parameters, in DWORDs.
        pub cdw_params: u16,
        /// Prolog length, register count, SEH/EBP flags and frame type.
        pub flags: u16,
    }
}

packed_record! {
    /// IMAGE_DEBUG_MISC header; variable data follows.
    pub struct MiscHeader {
        /// The type of data carried; 1 means the external DBG file name.
        pub data_type: u32,
        /// Total record length.
        pub length: u32,
        /// Non-zero when the trailing data is UTF-16.
        pub unicode: u8,
        /// Reserved.
        pub reserved: [u8; 3],
    }
}

packed_record! {
    /// One OMAP address-mapping record.
    pub struct OmapEntry {
        /// Source RVA.
        pub rva: u32,
        /// Mapped RVA.
        pub rva_to: u32,
    }
}

packed_record! {
    /// Visual C++ feature counters.
    pub struct VcFeatureData {
        /// Count of images built before VC++ 11.
        pub pre_vc11_count: u32,
        /// C/C++ translation unit count.
        pub c_cpp_count: u32,
        /// /GS (buffer security check) count.
        pub gs_count: u32,
        /// /sdl (security development lifecycle) count.
        pub sdl_count: u32,
        /// Guarded control flow instrumentation count.
        pub guard_n_count: u32,
    }
}

packed_record! {
    /// Embedded portable PDB header; the compressed blob follows.
    pub struct MpdbHeader {
        /// `MPDB`.
        pub signature: u32,
        /// Size of the PDB once decompressed.
        pub uncompressed_size: u32,
    }
}

bitflags! {
    /// Extended DLL characteristics carried as a debug entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ExDllCharacteristics: u32 {
        /// Image is compatible with control-flow enforcement (CET shadow
        /// stack).
        const IMAGE_DLLCHARACTERISTICS_EX_CET_COMPAT = 0x0001;
        /// CET enforced in strict mode.
        const IMAGE_DLLCHARACTERISTICS_EX_CET_COMPAT_STRICT_MODE = 0x0002;
        /// Context IP validation relaxed.
        const IMAGE_DLLCHARACTERISTICS_EX_CET_SET_CONTEXT_IP_VALIDATION_RELAXED_MODE = 0x0004;
        /// Dynamic APIs restricted to the loader.
        const IMAGE_DLLCHARACTERISTICS_EX_CET_DYNAMIC_APIS_ALLOW_IN_PROC = 0x0008;
        /// Reserved.
        const IMAGE_DLLCHARACTERISTICS_EX_CET_RESERVED_1 = 0x0010;
        /// Reserved.
        const IMAGE_DLLCHARACTERISTICS_EX_CET_RESERVED_2 = 0x0020;
        /// Image was compiled with hotpatching support.
        const IMAGE_DLLCHARACTERISTICS_EX_HOTPATCH_COMPATIBLE = 0x0040;
    }
}

/// A CodeView PDB 7.0 payload.
#[derive(Debug, Clone, Default)]
pub struct CodeViewPdb7 {
    /// The fixed part of the record.
    pub header: PackedValue<CodeViewPdb7Header>,
    /// NUL-terminated path of the matching PDB file.
    pub pdb_path: PackedCString,
}

/// A CodeView PDB 2.0 payload.
#[derive(Debug, Clone, Default)]
pub struct CodeViewPdb2 {
    /// The fixed part of the record.
    pub header: PackedValue<CodeViewPdb2Header>,
    /// NUL-terminated path of the matching PDB file.
    pub pdb_path: PackedCString,
}

/// One named, sized region recorded by profile-guided optimization.
#[derive(Debug, Clone, Default)]
pub struct PogoEntry {
    /// Start of the region.
    pub rva: u32,
    /// Region size in bytes.
    pub size: u32,
    /// The region's name (a section or group name).
    pub name: String,
}

/// POGO payload: a signature plus a region list.
#[derive(Debug, Clone, Default)]
pub struct PogoData {
    /// The POGO format signature.
    pub signature: u32,
    /// The recorded regions.
    pub entries: Vec<PogoEntry>,
}

/// A MISC (external DBG reference) payload.
#[derive(Debug, Clone, Default)]
pub struct MiscData {
    /// The fixed part of the record.
    pub header: PackedValue<MiscHeader>,
    /// The referenced file name; decoded from UTF-16 when
    /// `header.unicode` is set.
    pub data: String,
}

/// Typed payload of one debug entry. One variant per debug type; types
/// without inner structure keep their raw bytes only.
#[derive(Debug, Clone, Default)]
pub enum DebugEntryPayload {
    /// Payload absent or skipped (missing data, over the size cap).
    #[default]
    None,
    /// COFF debug information.
    Coff(PackedValue<CoffDebugHeader>),
    /// CodeView PDB 7.0 (`RSDS`).
    CodeViewPdb7(CodeViewPdb7),
    /// CodeView PDB 2.0 (`NB10`).
    CodeViewPdb2(CodeViewPdb2),
    /// CodeView OMF or another unrecognized CodeView signature.
    CodeViewOmf {
        /// The leading signature value.
        signature: u32,
    },
    /// Frame-pointer-omission records.
    Fpo(Vec<PackedValue<FpoEntry>>),
    /// External DBG file reference.
    Misc(MiscData),
    /// Image-to-source address map.
    OmapToSrc(Vec<PackedValue<OmapEntry>>),
    /// Source-to-image address map.
    OmapFromSrc(Vec<PackedValue<OmapEntry>>),
    /// Visual C++ feature counters.
    VcFeature(PackedValue<VcFeatureData>),
    /// Profile-guided optimization regions.
    Pogo(PogoData),
    /// Extended DLL characteristics.
    ExDllCharacteristics {
        /// Recognized flag bits.
        flags: ExDllCharacteristics,
        /// The raw value, including unknown bits.
        raw: u32,
    },
    /// A 16-byte class identifier.
    Clsid(PackedByteArray<16>),
    /// Embedded portable PDB.
    Mpdb(PackedValue<MpdbHeader>),
    /// Raw payload for types without further structure (Borland, BBT,
    /// ILTCG, MPX, Repro, SPGO, PDB hash, unknown).
    Raw,
}

/// One loaded debug entry: descriptor, typed payload, raw payload bytes
/// and the entry's own error list.
#[derive(Debug, Clone, Default)]
pub struct DebugDirectoryEntry<'i> {
    /// The fixed descriptor.
    pub descriptor: PackedValue<DebugDescriptor>,
    /// The typed payload, dispatched on the descriptor's type.
    pub payload: DebugEntryPayload,
    /// The payload bytes; borrowed from the image unless the loader was
    /// asked to copy.
    pub raw_data: Option<ByteView<'i>>,
    /// Anomalies recorded for this entry.
    pub errors: ErrorList,
}

/// The loaded debug directory.
#[derive(Debug, Clone, Default)]
pub struct DebugDirectoryList<'i> {
    /// The entries, in descriptor order.
    pub entries: Vec<DebugDirectoryEntry<'i>>,
    /// Directory-level anomalies (size mismatches, caps).
    pub errors: ErrorList,
}
