//! # pe-verify: safe Portable Executable parsing and Authenticode verification.
//!
//! `pe-verify` reads, validates, and selectively mutates PE/PE32+ binaries:
//! - Every header parsed into native documented structs with provenance
//! - Address translation among file offsets, RVAs and VAs
//! - Directory loaders that accumulate errors instead of failing outright
//! - Authenticode signature extraction and full cryptographic verification
//!
//! ## Examples
//! ```
//! # use std::fs;
//! use pe_verify::image::parse_image;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let path_to_pe = "tests/pe/64_pe_section.dat";
//! // Read the binary from a file
//! let binary = fs::read(path_to_pe)?;
//!
//! // Parse it!
//! let image = parse_image(&binary, &Default::default())?;
//! assert!(image.errors().is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Byte-range abstraction with physical/virtual sizes and provenance
pub mod buffer;
/// COFF file header definitions and helper functions
pub mod coff;
/// Debug directory loader and typed debug entries
pub mod debug;
/// Data-directory table and the closed directory-type enumeration
pub mod directories;
/// DOS header and stub definitions
pub mod dos;
/// Error enumerations and the accumulating error list
pub mod error;
/// The image aggregate: parsing, serialization, address translation,
/// section search and typed reads
pub mod image;
/// PE32/PE32+ optional header definitions and helper functions
pub mod optional;
/// Little-endian packed-record codec with per-field reflection
pub mod packed;
/// Section header definitions and helper functions
pub mod section;
/// Authenticode: security directory, PKCS#7/CMS structures, hashing and
/// signature verification
pub mod security;
/// TLS directory loader
pub mod tls;
