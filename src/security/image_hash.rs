//! The Authenticode image hash and the optional per-page hashes.
//!
//! The image hash covers the whole file except three ranges: the
//! optional-header checksum field, the security data-directory entry and
//! the certificate-table blob itself.

use log::debug;

use crate::coff::FileHeader;
use crate::directories::{DataDirectory, DirectoryType};
use crate::image::{Image, NtSignature};
use crate::packed::PackedStruct;

use crate::error::{HashCalculatorError, PeErrorCode};

use super::crypto::DigestAlgorithm;
use super::hash::HashAccumulator;

/// Controls for page-hash computation.
#[derive(Debug, Clone)]
pub struct PageHashOptions {
    /// The digest algorithm of the page-hash blob (v1: SHA-1, v2:
    /// SHA-256).
    pub algorithm: DigestAlgorithm,
    /// Cap on the computed blob size in bytes.
    pub max_page_hashes_size: u32,
}

impl Default for PageHashOptions {
    fn default() -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
            max_page_hashes_size: 10_000_000,
        }
    }
}

/// The computed hashes.
#[derive(Debug, Clone, Default)]
pub struct ImageHashResult {
    /// The Authenticode digest of the image.
    pub image_hash: Vec<u8>,
    /// The recomputed page-hash blob, absent when not requested or over
    /// the cap.
    pub page_hashes: Option<Vec<u8>>,
    /// Why page hashes were skipped, when they were.
    pub page_hash_error: Option<PeErrorCode>,
}

struct HashLayout {
    checksum_offset: usize,
    security_entry_offset: Option<usize>,
    headers_end: usize,
    cert_table_offset: Option<usize>,
}

fn hash_layout(image: &Image<'_>) -> Result<HashLayout, PeErrorCode> {
    let optional = image
        .optional_header()
        .ok_or(HashCalculatorError::UnableToReadImageData)?;
    let e_lfanew = image.dos_header().e_lfanew as usize;
    let optional_start = e_lfanew + NtSignature::packed_size() + FileHeader::packed_size();
    let checksum_offset = optional_start + optional.check_sum_offset();

    let security_index = DirectoryType::Security as u32 as usize;
    let security_entry_offset = if image.data_directories().count() as usize > security_index {
        Some(
            optional_start
                + optional.packed_size()
                + security_index * DataDirectory::packed_size(),
        )
    } else {
        None
    };

    let headers_end = image.full_headers().physical_size();
    if checksum_offset + 4 > headers_end {
        return Err(HashCalculatorError::UnableToReadImageData.into());
    }
    if let Some(offset) = security_entry_offset {
        if offset + DataDirectory::packed_size() > headers_end {
            return Err(HashCalculatorError::InvalidSecurityDirectoryOffset.into());
        }
    }

    let cert_table_offset = image
        .data_directories()
        .get_directory(DirectoryType::Security)
        .map(|entry| entry.virtual_address as usize);
    if let Some(offset) = cert_table_offset {
        if offset > image.data().len() {
            return Err(HashCalculatorError::InvalidSecurityDirectoryOffset.into());
        }
    }

    Ok(HashLayout {
        checksum_offset,
        security_entry_offset,
        headers_end,
        cert_table_offset,
    })
}

/// Section indices in ascending file-pointer order: the on-disk order
/// the hash walks, not the declaration order.
fn sections_in_file_order(image: &Image<'_>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..image.section_data_ranges().len())
        .filter(|&i| image.section_data_ranges()[i].physical_size != 0)
        .collect();
    order.sort_by_key(|&i| image.section_data_ranges()[i].offset);
    order
}

/// Computes the Authenticode image hash, and the page hashes when
/// `page_options` is given.
pub fn calculate_image_hash(
    algorithm: DigestAlgorithm,
    image: &Image<'_>,
    page_options: Option<&PageHashOptions>,
) -> Result<ImageHashResult, PeErrorCode> {
    let layout = hash_layout(image)?;
    let headers = image.full_headers();
    let header_bytes = headers.raw_data();

    let mut hasher = HashAccumulator::new(algorithm)?;

    // Headers, skipping the checksum field and the security directory
    // entry.
    hasher.update(&header_bytes[..layout.checksum_offset]);
    match layout.security_entry_offset {
        Some(entry) => {
            hasher.update(&header_bytes[layout.checksum_offset + 4..entry]);
            hasher.update(&header_bytes[entry + DataDirectory::packed_size()..layout.headers_end]);
        }
        None => hasher.update(&header_bytes[layout.checksum_offset + 4..layout.headers_end]),
    }

    // Section raw data in file-pointer order.
    let order = sections_in_file_order(image);
    for &index in &order {
        let view = image
            .section_data_view(index)
            .ok_or(HashCalculatorError::InvalidSectionData)?;
        hasher.update(view.raw_data());
    }

    // Overlay, stopping short of the certificate table.
    let overlay = image.overlay();
    let overlay_bytes = overlay.raw_data();
    if !overlay_bytes.is_empty() {
        let overlay_start = image.overlay_range().offset;
        let end = match layout.cert_table_offset {
            Some(cert) if cert >= overlay_start => {
                (cert - overlay_start).min(overlay_bytes.len())
            }
            Some(_) => 0,
            None => overlay_bytes.len(),
        };
        hasher.update(&overlay_bytes[..end]);
    }

    let mut result = ImageHashResult {
        image_hash: hasher.finalize(),
        ..Default::default()
    };
    debug!("image hash computed over {} sections", order.len());

    if let Some(options) = page_options {
        match calculate_page_hashes(image, &layout, &order, options) {
            Ok(hashes) => result.page_hashes = Some(hashes),
            Err(e) => result.page_hash_error = Some(e),
        }
    }

    Ok(result)
}

/// Recomputes the page-hash blob: `(u32 file offset, digest)` records
/// over every on-disk page, closed by a zero record.
///
/// A page is one section-alignment-sized chunk. The first record covers
/// the headers (with the image-hash exclusions applied); sections
/// contribute one record per chunk of raw data, the trailing partial
/// chunk zero-padded; the terminator carries the end offset of the last
/// section's data and an all-zero digest.
fn calculate_page_hashes(
    image: &Image<'_>,
    layout: &HashLayout,
    section_order: &[usize],
    options: &PageHashOptions,
) -> Result<Vec<u8>, PeErrorCode> {
    let optional = image
        .optional_header()
        .ok_or(HashCalculatorError::UnableToReadImageData)?;
    let page_size = (optional.section_alignment() as usize).max(1);
    let digest_size = options.algorithm.digest_size();
    let record_size = 4 + digest_size;

    let mut total_pages = 1usize; // headers
    for &index in section_order {
        let range = &image.section_data_ranges()[index];
        total_pages += range.physical_size.div_ceil(page_size);
    }
    let blob_size = (total_pages + 1) * record_size;
    if blob_size as u64 > options.max_page_hashes_size as u64 {
        return Err(crate::error::AuthenticodeVerifierError::PageHashesDataTooBig.into());
    }

    let mut blob = Vec::with_capacity(blob_size);
    let headers = image.full_headers();
    let header_bytes = headers.raw_data();

    // Header page: exclusions applied, zero-padded to a full page.
    let mut page = Vec::with_capacity(page_size);
    page.extend_from_slice(&header_bytes[..layout.checksum_offset]);
    match layout.security_entry_offset {
        Some(entry) => {
            page.extend_from_slice(&header_bytes[layout.checksum_offset + 4..entry]);
            page.extend_from_slice(
                &header_bytes[entry + DataDirectory::packed_size()..layout.headers_end],
            );
        }
        None => {
            page.extend_from_slice(&header_bytes[layout.checksum_offset + 4..layout.headers_end])
        }
    }
    page.resize(page_size, 0);
    push_record(&mut blob, 0, &page, options)?;

    let mut data_end = 0u32;
    for &index in section_order {
        let range = &image.section_data_ranges()[index];
        let view = image
            .section_data_view(index)
            .ok_or(HashCalculatorError::InvalidSectionData)?;
        let bytes = view.raw_data();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let chunk_end = (pos + page_size).min(bytes.len());
            let mut page = bytes[pos..chunk_end].to_vec();
            page.resize(page_size, 0);
            push_record(&mut blob, (range.offset + pos) as u32, &page, options)?;
            pos += page_size;
        }
        data_end = data_end.max((range.offset + bytes.len()) as u32);
    }

    // Terminator: the end offset with an all-zero digest.
    blob.extend_from_slice(&data_end.to_le_bytes());
    blob.resize(blob.len() + digest_size, 0);

    Ok(blob)
}

fn push_record(
    blob: &mut Vec<u8>,
    file_offset: u32,
    page: &[u8],
    options: &PageHashOptions,
) -> Result<(), PeErrorCode> {
    let digest = super::hash::calculate_hash(options.algorithm, &[page])?;
    blob.extend_from_slice(&file_offset.to_le_bytes());
    blob.extend_from_slice(&digest);
    Ok(())
}
