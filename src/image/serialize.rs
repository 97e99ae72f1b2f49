use super::Image;

impl Image<'_> {
    /// Serializes the image back to bytes.
    ///
    /// For an unmodified image the output is byte-identical to the parsed
    /// input: the components are written in file order, residual header
    /// slack is taken from the retained full-headers buffer, sections land
    /// at their recorded file pointers (gaps zero-filled) and the overlay
    /// is appended last.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());

        self.dos_header.serialize_append(&mut out, true);
        self.dos_stub.serialize_append(&mut out, true);
        self.signature.serialize_append(&mut out, true);
        self.file_header.serialize_append(&mut out, true);
        if let Some(optional) = &self.optional_header {
            optional.serialize_append(&mut out);
        }
        self.data_directories.serialize_append(&mut out);
        for header in &self.section_table {
            header.serialize_append(&mut out, true);
        }

        // Header bytes past the structured records (alignment padding,
        // bound-import data and similar header-resident blobs).
        let headers = self.full_headers();
        let header_bytes = headers.raw_data();
        if out.len() < header_bytes.len() {
            out.extend_from_slice(&header_bytes[out.len()..]);
        }

        if !self.loaded_to_memory {
            let mut ordered: Vec<usize> = (0..self.section_data.len()).collect();
            ordered.sort_by_key(|&i| self.section_data[i].offset);
            for index in ordered {
                let range = &self.section_data[index];
                if range.physical_size == 0 {
                    continue;
                }
                if out.len() < range.offset {
                    out.resize(range.offset, 0);
                }
                let view = self.section_data_view(index).expect("parallel lists");
                let bytes = view.raw_data();
                let end = range.offset + bytes.len();
                if out.len() >= end {
                    out[range.offset..end].copy_from_slice(bytes);
                } else {
                    let overlap = out.len() - range.offset;
                    out[range.offset..].copy_from_slice(&bytes[..overlap]);
                    out.extend_from_slice(&bytes[overlap..]);
                }
            }

            if self.overlay.physical_size != 0 {
                if out.len() < self.overlay.offset {
                    out.resize(self.overlay.offset, 0);
                }
                out.truncate(self.overlay.offset);
                out.extend_from_slice(self.overlay().raw_data());
            }
        }

        out
    }
}
