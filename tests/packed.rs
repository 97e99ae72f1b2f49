use pe_verify::buffer::ByteView;
use pe_verify::coff::FileHeader;
use pe_verify::error::BufferError;
use pe_verify::packed::{PackedCString, PackedStruct, PackedUtf16String, PackedValue};

#[test]
fn byte_view_read_and_sub_windows() {
    let view = ByteView::from_slice(&[0, 1, 2, 3, 4, 5]);
    assert_eq!(view.read(1, 2).unwrap(), &[1, 2]);
    assert_eq!(view.read(6, 0).unwrap(), &[]);
    assert_eq!(view.read(5, 2), Err(BufferError::BufferOverrun));

    let child = view.sub(2, 3).unwrap();
    assert_eq!(child.raw_data(), &[2, 3, 4]);
    assert_eq!(child.absolute_offset(), 2);
    assert_eq!(child.relative_offset(), 2);

    let grandchild = child.sub(1, 1).unwrap();
    assert_eq!(grandchild.absolute_offset(), 3);
    assert_eq!(grandchild.relative_offset(), 1);
}

#[test]
fn byte_view_virtual_reads() {
    let view = ByteView::from_slice(&[0xAA, 0xBB]).with_virtual_size(5);
    assert_eq!(view.physical_size(), 2);
    assert_eq!(view.virtual_size(), 5);
    assert!(view.is_virtual());
    assert_eq!(view.read_virtual(1, 3).unwrap().as_ref(), &[0xBB, 0, 0]);
    assert!(view.read_virtual(3, 3).is_err());

    let child = view.sub_virtual(1, 4).unwrap();
    assert_eq!(child.physical_size(), 1);
    assert_eq!(child.virtual_size(), 4);
}

#[test]
fn packed_struct_roundtrip_is_identity() {
    let bytes: Vec<u8> = (1..=20).collect();
    let view = ByteView::from_slice(&bytes);
    let header = PackedValue::<FileHeader>::deserialize(&view, 0, false).unwrap();

    assert_eq!(header.machine, u16::from_le_bytes([1, 2]));
    assert_eq!(header.time_date_stamp, u32::from_le_bytes([5, 6, 7, 8]));

    let mut serialized = Vec::new();
    header.serialize_append(&mut serialized, true);
    assert_eq!(serialized, bytes);
}

#[test]
fn packed_struct_virtual_deserialize_zero_fills() {
    let bytes = [0x64u8, 0x86]; // machine only
    let view = ByteView::from_slice(&bytes).with_virtual_size(FileHeader::packed_size());

    assert!(PackedValue::<FileHeader>::deserialize(&view, 0, false).is_err());

    let header = PackedValue::<FileHeader>::deserialize(&view, 0, true).unwrap();
    assert_eq!(header.machine, 0x8664);
    assert_eq!(header.number_of_sections, 0);
    assert!(header.is_virtual());
    assert_eq!(header.physical_size(), 2);
    assert_eq!(header.virtual_size(), 20);

    // Physical-only serialization writes just what was read.
    let mut serialized = Vec::new();
    header.serialize_append(&mut serialized, false);
    assert_eq!(serialized, bytes);
}

#[test]
fn field_reflection_reports_offsets() {
    assert_eq!(FileHeader::field_offset("machine"), 0);
    assert_eq!(FileHeader::field_offset("time_date_stamp"), 4);
    assert_eq!(FileHeader::field_offset("characteristics"), 18);
    assert_eq!(FileHeader::packed_size(), 20);

    let layout = FileHeader::FIELDS
        .iter()
        .find(|f| f.name == "size_of_optional_header")
        .unwrap();
    assert_eq!(layout.offset, 16);
    assert_eq!(layout.size, 2);
}

#[test]
fn c_string_reads() {
    let view = ByteView::from_slice(b"ntdll.dll\0rest");
    let string = PackedCString::deserialize(&view, 0, false).unwrap();
    assert_eq!(string.value(), "ntdll.dll");
    assert_eq!(string.physical_size(), 10);

    // Unterminated without virtual data: an error.
    let view = ByteView::from_slice(b"abc");
    assert!(PackedCString::deserialize(&view, 0, false).is_err());

    // With a virtual tail the implicit zeros terminate.
    let view = ByteView::from_slice(b"abc").with_virtual_size(8);
    let string = PackedCString::deserialize(&view, 0, true).unwrap();
    assert_eq!(string.value(), "abc");
}

#[test]
fn utf16_string_reads() {
    let mut bytes = vec![3, 0]; // three code units
    for unit in [0x0070u16, 0x0065, 0x21] {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let view = ByteView::from_slice(&bytes);
    let string = PackedUtf16String::deserialize(&view, 0, false).unwrap();
    assert_eq!(string.value(), "pe!");
    assert_eq!(string.physical_size(), 8);

    let view = ByteView::from_slice(&bytes[..4]).with_virtual_size(8);
    assert!(PackedUtf16String::deserialize(&view, 0, false).is_err());
    let string = PackedUtf16String::deserialize(&view, 0, true).unwrap();
    assert_eq!(string.value(), "p\0\0");
}
