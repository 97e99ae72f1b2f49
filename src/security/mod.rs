//! Authenticode: the security directory, the PKCS#7/CMS structures and
//! full signature verification.

pub mod asn1;
pub mod cert_store;
pub mod crypto;
pub mod directory;
pub mod format;
pub mod hash;
pub mod image_hash;
pub mod oids;
pub mod page_hashes;
pub mod pkcs7;
pub mod program_info;
pub mod signature;
pub mod timestamp;
pub mod verifier;
pub mod x500;

pub use crypto::{DigestAlgorithm, DigestEncryptionAlgorithm, NamedCurve};
pub use signature::SignatureVerificationResult;
pub use verifier::{
    verify_authenticode, AuthenticodeCheckStatus, AuthenticodeFullCheckStatus,
    VerificationOptions,
};
