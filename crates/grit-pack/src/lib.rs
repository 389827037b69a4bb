//! Packfile reading.
//!
//! A packfile stores many objects in one file, some as compressed literals
//! and some as deltas against a base in the same pack (offset delta) or in
//! any pack (ref delta). The companion index (v2) maps sorted object ids to
//! byte offsets. This crate covers the read path only: index lookup, entry
//! header decoding, delta chain resolution, and delta application.

pub mod chain;
pub mod delta;
pub mod entry;
pub mod index;
pub mod pack;

use grit_hash::ObjectId;

/// Errors that can occur while reading packs and pack indexes.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("pack index checksum mismatch: stored {stored}, computed {computed}")]
    IndexChecksumMismatch { stored: ObjectId, computed: ObjectId },

    #[error("invalid pack file: {0}")]
    InvalidPack(String),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("unsupported object kind {kind} at offset {offset}")]
    UnsupportedKind { kind: u8, offset: u64 },

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta chain too deep (>{max_depth} links) at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("pack checksum mismatch: stored {stored}, computed {computed}")]
    PackChecksumMismatch { stored: ObjectId, computed: ObjectId },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

/// Packfile header constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_LEN: usize = 12;

/// Pack index v2 constants.
pub const IDX_SIGNATURE: [u8; 4] = [0xff, b't', b'O', b'c'];
pub const IDX_VERSION: u32 = 2;

/// Packs larger than this carry a 64-bit offset table in their index.
pub const LARGE_PACK_THRESHOLD: u64 = 0x8000_0000;

/// Maximum number of links in a delta chain before resolution bails out.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 512;
