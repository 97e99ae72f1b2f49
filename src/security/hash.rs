//! Multi-part buffer hashing over the supported digest algorithms.

use digest::Digest;

use crate::error::BufferHashError;

use super::crypto::DigestAlgorithm;

fn hash_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

/// Hashes the concatenation of `parts`.
pub fn calculate_hash(
    algorithm: DigestAlgorithm,
    parts: &[&[u8]],
) -> Result<Vec<u8>, BufferHashError> {
    match algorithm {
        DigestAlgorithm::Md5 => Ok(hash_parts::<md5::Md5>(parts)),
        DigestAlgorithm::Sha1 => Ok(hash_parts::<sha1::Sha1>(parts)),
        DigestAlgorithm::Sha256 => Ok(hash_parts::<sha2::Sha256>(parts)),
        DigestAlgorithm::Sha384 => Ok(hash_parts::<sha2::Sha384>(parts)),
        DigestAlgorithm::Sha512 => Ok(hash_parts::<sha2::Sha512>(parts)),
        DigestAlgorithm::Unknown => Err(BufferHashError::UnsupportedHashAlgorithm),
    }
}

/// An incremental hasher over one algorithm; used where the input is
/// assembled from many windows (image hashing).
#[allow(missing_docs)]
pub enum HashAccumulator {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
}

impl HashAccumulator {
    /// An empty accumulator for the given algorithm.
    pub fn new(algorithm: DigestAlgorithm) -> Result<Self, BufferHashError> {
        Ok(match algorithm {
            DigestAlgorithm::Md5 => HashAccumulator::Md5(md5::Md5::new()),
            DigestAlgorithm::Sha1 => HashAccumulator::Sha1(sha1::Sha1::new()),
            DigestAlgorithm::Sha256 => HashAccumulator::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha384 => HashAccumulator::Sha384(sha2::Sha384::new()),
            DigestAlgorithm::Sha512 => HashAccumulator::Sha512(sha2::Sha512::new()),
            DigestAlgorithm::Unknown => return Err(BufferHashError::UnsupportedHashAlgorithm),
        })
    }

    /// Feeds more bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            HashAccumulator::Md5(h) => h.update(bytes),
            HashAccumulator::Sha1(h) => h.update(bytes),
            HashAccumulator::Sha256(h) => h.update(bytes),
            HashAccumulator::Sha384(h) => h.update(bytes),
            HashAccumulator::Sha512(h) => h.update(bytes),
        }
    }

    /// Produces the digest.
    pub fn finalize(self) -> Vec<u8> {
        match self {
            HashAccumulator::Md5(h) => h.finalize().to_vec(),
            HashAccumulator::Sha1(h) => h.finalize().to_vec(),
            HashAccumulator::Sha256(h) => h.finalize().to_vec(),
            HashAccumulator::Sha384(h) => h.finalize().to_vec(),
            HashAccumulator::Sha512(h) => h.finalize().to_vec(),
        }
    }
}
