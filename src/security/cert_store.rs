//! Certificate store keyed by `(serial number, raw issuer)`.

use std::collections::HashMap;

use crate::error::{CertificateStoreError, ErrorList};

use super::asn1::{Certificate, SignedData};

/// Every X.509 certificate embedded in a signature, indexed for exact
/// `(serial, issuer)` lookup.
#[derive(Clone, Debug, Default)]
pub struct CertificateStore<'a> {
    map: HashMap<(Vec<u8>, Vec<u8>), Certificate<'a>>,
}

impl<'a> CertificateStore<'a> {
    /// Adds a certificate; returns `false` (keeping the first entry) when
    /// the `(serial, issuer)` pair is already present.
    pub fn add_certificate(&mut self, certificate: Certificate<'a>) -> bool {
        let key = (
            certificate.tbs.serial_number.as_bytes().to_vec(),
            certificate.tbs.issuer.full.to_vec(),
        );
        if self.map.contains_key(&key) {
            return false;
        }
        self.map.insert(key, certificate);
        true
    }

    /// Exact-match lookup on both fields.
    pub fn find_certificate(
        &self,
        serial_number: &[u8],
        raw_issuer: &[u8],
    ) -> Option<&Certificate<'a>> {
        self.map
            .get(&(serial_number.to_vec(), raw_issuer.to_vec()))
    }

    /// Number of distinct certificates.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` when the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Indexes the certificates of a SignedData. An empty set attaches
/// `AbsentCertificates`; duplicates attach `DuplicateCertificates` and
/// keep the first occurrence.
pub fn build_certificate_store<'a>(
    signed_data: &SignedData<'a>,
    warnings: Option<&mut ErrorList>,
) -> CertificateStore<'a> {
    let mut store = CertificateStore::default();
    let mut duplicates = false;

    if signed_data.certificates.is_empty() {
        if let Some(warnings) = warnings {
            warnings.add(CertificateStoreError::AbsentCertificates);
        }
        return store;
    }

    for certificate in &signed_data.certificates {
        if !store.add_certificate(*certificate) {
            duplicates = true;
        }
    }
    if duplicates {
        if let Some(warnings) = warnings {
            warnings.add(CertificateStoreError::DuplicateCertificates);
        }
    }
    store
}
