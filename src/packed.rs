use bytemuck::Pod;

use crate::buffer::ByteView;
use crate::error::{BufferError, PeErrorCode};

/// Byte offset and length of one field inside a packed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// The field's name in the record definition.
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: usize,
    /// Field length in bytes.
    pub size: usize,
}

/// A fixed-layout little-endian record.
///
/// Implementations come from the [`packed_record!`] macro, which also
/// emits the per-field layout table used to compute sub-offsets (the
/// Authenticode image hash needs to skip individual header fields
/// precisely).
pub trait PackedStruct: Pod + Default {
    /// The per-field layout table, in declaration order.
    const FIELDS: &'static [FieldLayout];

    /// Serialized size of the record.
    fn packed_size() -> usize {
        core::mem::size_of::<Self>()
    }

    /// Byte offset of a field by name. Panics on an unknown name, which is
    /// a programming error, not a data error.
    fn field_offset(name: &str) -> usize {
        Self::FIELDS
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.offset)
            .unwrap_or_else(|| panic!("unknown packed field {name}"))
    }
}

/// Defines a `#[repr(C)]` plain-old-data record together with its
/// [`PackedStruct`] field table.
macro_rules! packed_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident: $fty:ty,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ::bytemuck::Pod, ::bytemuck::Zeroable)]
        #[repr(C)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )+
        }

        impl $crate::packed::PackedStruct for $name {
            const FIELDS: &'static [$crate::packed::FieldLayout] = &[
                $(
                    $crate::packed::FieldLayout {
                        name: stringify!($field),
                        offset: ::core::mem::offset_of!($name, $field),
                        size: ::core::mem::size_of::<$fty>(),
                    },
                )+
            ];
        }
    };
}

pub(crate) use packed_record;

/// Provenance of a deserialized value: where its bytes came from and how
/// many of them were physically present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataState {
    /// Offset of the first byte within the original source.
    pub absolute_offset: usize,
    /// Offset of the first byte within the parent of the source view.
    pub relative_offset: usize,
    /// Offset of the first byte within the source view itself.
    pub buffer_pos: usize,
}

impl DataState {
    fn at(view: &ByteView<'_>, pos: usize) -> Self {
        Self {
            absolute_offset: view.absolute_offset() + pos,
            relative_offset: view.relative_offset() + pos,
            buffer_pos: pos,
        }
    }
}

/// A decoded record plus its [`DataState`].
///
/// `physical_size <= virtual_size`; bytes past the physical end were
/// implicitly zero at deserialization time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackedValue<T: PackedStruct> {
    value: T,
    state: DataState,
    physical_size: usize,
}

impl<T: PackedStruct> PackedValue<T> {
    /// Wraps an in-memory value with a default state and a fully physical
    /// size.
    pub fn new(value: T) -> Self {
        Self {
            value,
            state: DataState::default(),
            physical_size: T::packed_size(),
        }
    }

    /// Reads `size_of::<T>()` little-endian bytes from `view` at `pos`.
    ///
    /// With `allow_virtual`, a short read within the view's virtual size
    /// is tolerated: missing bytes decode as zero and the value reports
    /// `physical_size() < virtual_size()`. Without it, a short read fails
    /// with a buffer overrun.
    pub fn deserialize(
        view: &ByteView<'_>,
        pos: usize,
        allow_virtual: bool,
    ) -> Result<Self, PeErrorCode> {
        let size = T::packed_size();
        let end = pos.checked_add(size).ok_or(BufferError::BufferOverrun)?;
        let physical = view.physical_size();
        let available = physical.saturating_sub(pos).min(size);
        if available < size && (!allow_virtual || end > view.virtual_size()) {
            return Err(BufferError::BufferOverrun.into());
        }

        let mut raw = vec![0u8; size];
        if available > 0 {
            raw[..available].copy_from_slice(view.read(pos, available)?);
        }
        Ok(Self {
            value: bytemuck::pod_read_unaligned(&raw),
            state: DataState::at(view, pos),
            physical_size: available,
        })
    }

    /// Writes the record into `out`. With `write_virtual`, all
    /// `virtual_size()` bytes go out; otherwise only the physical prefix.
    pub fn serialize_into(&self, out: &mut [u8], write_virtual: bool) -> Result<usize, PeErrorCode> {
        let bytes = bytemuck::bytes_of(&self.value);
        let len = if write_virtual {
            bytes.len()
        } else {
            self.physical_size
        };
        if out.len() < len {
            return Err(BufferError::BufferOverrun.into());
        }
        out[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    /// Appends the serialized record to a vector.
    pub fn serialize_append(&self, out: &mut Vec<u8>, write_virtual: bool) -> usize {
        let bytes = bytemuck::bytes_of(&self.value);
        let len = if write_virtual {
            bytes.len()
        } else {
            self.physical_size
        };
        out.extend_from_slice(&bytes[..len]);
        len
    }

    /// The decoded record.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// The decoded record, for mutation. The state keeps describing the
    /// original source bytes.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Unwraps the record, dropping the state.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Where the record came from.
    pub fn state(&self) -> &DataState {
        &self.state
    }

    /// Bytes actually read from the buffer.
    pub fn physical_size(&self) -> usize {
        self.physical_size
    }

    /// Full serialized size of the record.
    pub fn virtual_size(&self) -> usize {
        T::packed_size()
    }

    /// `true` when part of the record decoded from implicit zeros.
    pub fn is_virtual(&self) -> bool {
        self.physical_size < T::packed_size()
    }
}

impl<T: PackedStruct> core::ops::Deref for PackedValue<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: PackedStruct> core::ops::DerefMut for PackedValue<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// A variable-length byte run with provenance and an optional virtual
/// tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedByteVec {
    value: Vec<u8>,
    virtual_size: usize,
    state: DataState,
}

impl PackedByteVec {
    /// Reads `size` bytes at `pos`, keeping whatever physical part exists
    /// when `allow_virtual` is set.
    pub fn deserialize(
        view: &ByteView<'_>,
        pos: usize,
        size: usize,
        allow_virtual: bool,
    ) -> Result<Self, PeErrorCode> {
        let end = pos.checked_add(size).ok_or(BufferError::BufferOverrun)?;
        let available = view.physical_size().saturating_sub(pos).min(size);
        if available < size && (!allow_virtual || end > view.virtual_size()) {
            return Err(BufferError::BufferOverrun.into());
        }
        let value = if available > 0 {
            view.read(pos, available)?.to_vec()
        } else {
            Vec::new()
        };
        Ok(Self {
            value,
            virtual_size: size,
            state: DataState::at(view, pos),
        })
    }

    /// Appends the bytes; with `write_virtual`, the virtual tail goes
    /// out as zeros.
    pub fn serialize_append(&self, out: &mut Vec<u8>, write_virtual: bool) -> usize {
        out.extend_from_slice(&self.value);
        if write_virtual && self.virtual_size > self.value.len() {
            out.resize(out.len() + self.virtual_size - self.value.len(), 0);
            self.virtual_size
        } else {
            self.value.len()
        }
    }

    /// The physical bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Bytes actually read.
    pub fn physical_size(&self) -> usize {
        self.value.len()
    }

    /// Logical size, including the implicit-zero tail.
    pub fn virtual_size(&self) -> usize {
        self.virtual_size.max(self.value.len())
    }

    /// `true` when a virtual tail exists.
    pub fn is_virtual(&self) -> bool {
        self.value.len() < self.virtual_size
    }

    /// Where the bytes came from.
    pub fn state(&self) -> &DataState {
        &self.state
    }
}

/// A fixed-length byte array, possibly with a virtual tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedByteArray<const N: usize> {
    value: [u8; N],
    physical_size: usize,
    state: DataState,
}

impl<const N: usize> Default for PackedByteArray<N> {
    fn default() -> Self {
        Self {
            value: [0; N],
            physical_size: N,
            state: DataState::default(),
        }
    }
}

impl<const N: usize> PackedByteArray<N> {
    pub fn deserialize(
        view: &ByteView<'_>,
        pos: usize,
        allow_virtual: bool,
    ) -> Result<Self, PeErrorCode> {
        let end = pos.checked_add(N).ok_or(BufferError::BufferOverrun)?;
        let available = view.physical_size().saturating_sub(pos).min(N);
        if available < N && (!allow_virtual || end > view.virtual_size()) {
            return Err(BufferError::BufferOverrun.into());
        }
        let mut value = [0u8; N];
        if available > 0 {
            value[..available].copy_from_slice(view.read(pos, available)?);
        }
        Ok(Self {
            value,
            physical_size: available,
            state: DataState::at(view, pos),
        })
    }

    /// The array contents; bytes past `physical_size()` are implicit
    /// zeros.
    pub fn value(&self) -> &[u8; N] {
        &self.value
    }

    /// Bytes actually read.
    pub fn physical_size(&self) -> usize {
        self.physical_size
    }

    /// `true` when part of the array decoded from implicit zeros.
    pub fn is_virtual(&self) -> bool {
        self.physical_size < N
    }

    /// Where the bytes came from.
    pub fn state(&self) -> &DataState {
        &self.state
    }
}

/// A NUL-terminated narrow string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedCString {
    value: String,
    physical_size: usize,
    state: DataState,
}

impl PackedCString {
    /// Scans forward from `pos` to the first NUL. When the physical bytes
    /// run out first, `allow_virtual` treats the implicit zeros as the
    /// terminator; otherwise the read fails.
    pub fn deserialize(
        view: &ByteView<'_>,
        pos: usize,
        allow_virtual: bool,
    ) -> Result<Self, PeErrorCode> {
        if pos > view.physical_size() {
            if !allow_virtual || pos > view.virtual_size() {
                return Err(BufferError::BufferOverrun.into());
            }
            // Entirely virtual: an empty string.
            return Ok(Self {
                value: String::new(),
                physical_size: 0,
                state: DataState::at(view, pos),
            });
        }

        let tail = view.read(pos, view.physical_size() - pos)?;
        match tail.iter().position(|&b| b == 0) {
            Some(nul) => Ok(Self {
                value: String::from_utf8_lossy(&tail[..nul]).into_owned(),
                physical_size: nul + 1,
                state: DataState::at(view, pos),
            }),
            None if allow_virtual && view.is_virtual() => Ok(Self {
                value: String::from_utf8_lossy(tail).into_owned(),
                physical_size: tail.len(),
                state: DataState::at(view, pos),
            }),
            None => Err(BufferError::BufferOverrun.into()),
        }
    }

    /// Appends the string bytes plus the terminator.
    pub fn serialize_append(&self, out: &mut Vec<u8>) -> usize {
        out.extend_from_slice(self.value.as_bytes());
        out.push(0);
        self.value.len() + 1
    }

    /// The decoded text, without the terminator.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Bytes consumed from the buffer, including the terminator when it
    /// was physically present.
    pub fn physical_size(&self) -> usize {
        self.physical_size
    }

    /// Where the bytes came from.
    pub fn state(&self) -> &DataState {
        &self.state
    }
}

/// A length-prefixed UTF-16LE string: a 16-bit little-endian code-unit
/// count followed by `2 * count` bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedUtf16String {
    value: String,
    physical_size: usize,
    virtual_size: usize,
    state: DataState,
}

impl PackedUtf16String {
    pub fn deserialize(
        view: &ByteView<'_>,
        pos: usize,
        allow_virtual: bool,
    ) -> Result<Self, PeErrorCode> {
        if !allow_virtual && pos + 2 > view.physical_size() {
            return Err(BufferError::BufferOverrun.into());
        }
        let prefix = view.read_virtual(pos, 2)?;
        let count = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
        let total = 2 + count * 2;
        let end = pos.checked_add(total).ok_or(BufferError::BufferOverrun)?;
        let available = view.physical_size().saturating_sub(pos).min(total);
        if available < total && (!allow_virtual || end > view.virtual_size()) {
            return Err(BufferError::BufferOverrun.into());
        }

        let raw = view.read_virtual(pos + 2, count * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(Self {
            value: String::from_utf16_lossy(&units),
            physical_size: available,
            virtual_size: total,
            state: DataState::at(view, pos),
        })
    }

    /// Appends the length prefix and the UTF-16LE code units.
    pub fn serialize_append(&self, out: &mut Vec<u8>) -> usize {
        let units: Vec<u16> = self.value.encode_utf16().collect();
        out.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for unit in &units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        2 + units.len() * 2
    }

    /// The decoded text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Bytes actually read, including the prefix.
    pub fn physical_size(&self) -> usize {
        self.physical_size
    }

    /// Full encoded size: the prefix plus every declared code unit.
    pub fn virtual_size(&self) -> usize {
        self.virtual_size
    }

    /// Where the bytes came from.
    pub fn state(&self) -> &DataState {
        &self.state
    }
}
