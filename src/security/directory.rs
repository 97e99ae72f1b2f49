//! Security (certificate table) directory: WIN_CERTIFICATE chain loader.
//!
//! The directory's `virtual_address` is a file offset into the overlay,
//! not an RVA. Entries are 8-byte aligned.

use log::warn;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::buffer::ByteView;
use crate::directories::DirectoryType;
use crate::error::{ErrorList, SecurityDirectoryError};
use crate::image::{range_view, DataRange, Image};
use crate::packed::{packed_record, PackedStruct, PackedValue};

packed_record! {
    /// WIN_CERTIFICATE header; `length - 8` certificate bytes follow,
    /// padded to an 8-byte boundary.
    pub struct WinCertificateHeader {
        /// Length of the entry including this header.
        pub length: u32,
        /// Certificate version number.
        pub revision: u16,
        /// The kind of payload carried.
        pub certificate_type: u16,
    }
}

/// WIN_CERTIFICATE revisions.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CertificateRevision {
    /// Legacy revision.
    Revision1_0 = 0x0100,
    /// Current revision.
    Revision2_0 = 0x0200,
}

/// WIN_CERTIFICATE payload kinds. Only `PkcsSignedData` carries an
/// Authenticode signature.
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CertificateType {
    /// A bare X.509 certificate.
    X509 = 0x0001,
    /// A PKCS#7 SignedData structure.
    PkcsSignedData = 0x0002,
    /// Reserved.
    Reserved1 = 0x0003,
    /// Terminal Server protocol stack certificate.
    TsStackSigned = 0x0004,
    /// PKCS#1 module signature fields.
    Pkcs1Sign = 0x0009,
}

/// One certificate-table entry.
#[derive(Debug, Clone)]
pub struct CertificateEntry<'i> {
    /// The WIN_CERTIFICATE header.
    pub descriptor: PackedValue<WinCertificateHeader>,
    /// The certificate payload, without the header or the alignment
    /// padding.
    pub certificate: ByteView<'i>,
    /// Anomalies recorded for this entry.
    pub errors: ErrorList,
}

impl CertificateEntry<'_> {
    /// The entry's revision as an enum.
    pub fn revision(&self) -> Option<CertificateRevision> {
        CertificateRevision::from_u16(self.descriptor.revision)
    }

    /// The entry's payload kind as an enum.
    pub fn certificate_type(&self) -> Option<CertificateType> {
        CertificateType::from_u16(self.descriptor.certificate_type)
    }
}

/// The loaded certificate table.
#[derive(Debug, Clone, Default)]
pub struct SecurityDirectory<'i> {
    /// The certificate entries, in file order.
    pub entries: Vec<CertificateEntry<'i>>,
    /// Directory-level anomalies.
    pub errors: ErrorList,
}

/// Controls for the security directory loader.
#[derive(Debug, Clone)]
pub struct SecurityLoaderOptions {
    /// Copy certificate payloads out of the image instead of borrowing.
    pub copy_raw_data: bool,
    /// Cap on the entry count.
    pub max_entries: u32,
}

impl Default for SecurityLoaderOptions {
    fn default() -> Self {
        Self {
            copy_raw_data: false,
            max_entries: 10,
        }
    }
}

/// Loads the certificate table. Returns `None` when the image has no
/// security data-directory entry.
pub fn load<'i>(
    image: &'i Image<'_>,
    options: &SecurityLoaderOptions,
) -> Option<SecurityDirectory<'i>> {
    let entry = image
        .data_directories()
        .get_directory(DirectoryType::Security)?;
    // A file offset, unlike every other directory.
    let offset = entry.virtual_address as usize;
    let size = entry.size as usize;

    let mut directory = SecurityDirectory::default();

    if offset % 8 != 0 {
        directory.errors.add(SecurityDirectoryError::UnalignedDirectory);
    }
    if size < WinCertificateHeader::packed_size() {
        directory.errors.add(SecurityDirectoryError::InvalidDirectorySize);
        return Some(directory);
    }
    let end = match offset.checked_add(size) {
        Some(end) if end <= image.data().len() => end,
        _ => {
            directory.errors.add(SecurityDirectoryError::InvalidDirectory);
            return Some(directory);
        }
    };

    let data = image.data();
    let view = ByteView::from_slice(data);
    let mut pos = offset;
    while pos + WinCertificateHeader::packed_size() <= end {
        if directory.entries.len() as u32 >= options.max_entries {
            warn!("certificate table has more than {} entries", options.max_entries);
            directory.errors.add(SecurityDirectoryError::TooManyEntries);
            break;
        }

        let descriptor = match PackedValue::<WinCertificateHeader>::deserialize(&view, pos, false) {
            Ok(descriptor) => descriptor,
            Err(_) => {
                directory.errors.add(SecurityDirectoryError::InvalidCertificateData);
                break;
            }
        };

        let total = descriptor.length as usize;
        if total < WinCertificateHeader::packed_size() || pos + total > end {
            directory.errors.add(SecurityDirectoryError::InvalidEntrySize);
            break;
        }

        let payload = DataRange {
            offset: pos + WinCertificateHeader::packed_size(),
            physical_size: total - WinCertificateHeader::packed_size(),
            virtual_size: total - WinCertificateHeader::packed_size(),
        };
        let certificate = range_view(data, &payload);
        directory.entries.push(CertificateEntry {
            descriptor,
            certificate: if options.copy_raw_data {
                certificate.into_owned()
            } else {
                certificate
            },
            errors: ErrorList::new(),
        });

        // Entries are padded to the next 8-byte boundary.
        pos += (total + 7) & !7;
    }

    if directory.entries.is_empty() && !directory.errors.has_errors() {
        directory.errors.add(SecurityDirectoryError::InvalidDirectory);
    }

    Some(directory)
}
