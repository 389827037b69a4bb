//! Object identity and hashing for the grit object store.
//!
//! Provides the 20-byte [`ObjectId`], hex encoding/decoding, and the
//! streaming [`hasher::Hasher`] used both for object identity and for
//! verifying pack index and packfile trailers.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use oid::ObjectId;

/// Length of a SHA-1 digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Length of a SHA-1 digest in hex characters.
pub const HEX_LEN: usize = DIGEST_LEN * 2;
