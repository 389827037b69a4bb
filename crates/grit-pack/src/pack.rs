//! PackFile: a memory-mapped `.pack` bound to its index.

use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use grit_hash::hasher::Hasher;
use grit_hash::{ObjectId, DIGEST_LEN};
use memmap2::Mmap;

use crate::entry::{parse_entry_header, EntryHeader};
use crate::index::PackIndex;
use crate::{PackError, PACK_HEADER_LEN, PACK_SIGNATURE, PACK_VERSION};

/// An opened packfile and its companion index.
///
/// The mapping is immutable and offsets are explicit arguments, so a
/// `PackFile` has no cursor state and reads take `&self`.
#[derive(Debug)]
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
}

impl PackFile {
    /// Open a `.pack` file and its companion `.idx`.
    ///
    /// Validates the `PACK` signature, version 2, and that the object
    /// count in the pack header matches the index.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();
        let idx_path = pack_path.with_extension("idx");

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < PACK_HEADER_LEN + DIGEST_LEN {
            return Err(PackError::InvalidPack("file too small".into()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(PackError::InvalidPack("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes(data[4..8].try_into().expect("4-byte slice"));
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let num_objects = u32::from_be_bytes(data[8..12].try_into().expect("4-byte slice"));

        let index = PackIndex::open(&idx_path)?;
        if index.num_objects() != num_objects {
            return Err(PackError::InvalidPack(format!(
                "pack declares {num_objects} objects but index has {}",
                index.num_objects()
            )));
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
        })
    }

    /// Decode the entry header at an absolute pack offset.
    pub fn entry_at(&self, offset: u64) -> Result<EntryHeader, PackError> {
        if offset < PACK_HEADER_LEN as u64 || offset >= self.data.len() as u64 {
            return Err(PackError::CorruptEntry(offset));
        }
        parse_entry_header(&self.data[offset as usize..], offset)
    }

    /// Inflate an entry's zlib payload.
    ///
    /// `payload_offset` must come from a decoded [`EntryHeader`]; the
    /// inflated length must equal the header's declared size.
    pub fn read_payload(&self, payload_offset: u64, expected_len: u64) -> Result<Vec<u8>, PackError> {
        if payload_offset >= self.data.len() as u64 {
            return Err(PackError::CorruptEntry(payload_offset));
        }
        let mut decoder = ZlibDecoder::new(&self.data[payload_offset as usize..]);
        let mut buf = Vec::with_capacity(expected_len.min(1 << 20) as usize);
        decoder
            .read_to_end(&mut buf)
            .map_err(|_| PackError::CorruptEntry(payload_offset))?;
        if buf.len() as u64 != expected_len {
            return Err(PackError::CorruptEntry(payload_offset));
        }
        Ok(buf)
    }

    /// Recompute the pack's trailing SHA-1 and compare it with the
    /// stored one.
    pub fn verify_checksum(&self) -> Result<(), PackError> {
        let content = &self.data[..self.data.len() - DIGEST_LEN];
        let stored = ObjectId::from_bytes(&self.data[self.data.len() - DIGEST_LEN..])?;

        let mut hasher = Hasher::new();
        hasher.update(content);
        let computed = hasher.finalize()?;

        if computed != stored {
            return Err(PackError::PackChecksumMismatch { stored, computed });
        }
        Ok(())
    }

    /// The companion index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Number of objects in the pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Path of the `.pack` file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }
}
