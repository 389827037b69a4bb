//! Pack index (v2) reading and lookup.
//!
//! The index maps sorted object ids to byte offsets in the companion pack:
//!
//! ```text
//! Header:  \xff tOc | version (BE u32 = 2)
//! Fanout:  256 x BE u32 cumulative counts by first id byte
//! Ids:     N x 20-byte ids, ascending
//! CRC32:   N x BE u32, parallel to the ids
//! Offsets: N x BE u32 (high bit set: low 31 bits index the 64-bit table)
//! 64-bit:  M x BE u64 offsets, present only for packs over 2 GiB
//! Trailer: 20-byte pack checksum | 20-byte index checksum
//! ```
//!
//! The whole file is hashed at open time and the trailing checksum must
//! match before any lookup is served.

use std::path::{Path, PathBuf};

use grit_hash::hasher::Hasher;
use grit_hash::{ObjectId, DIGEST_LEN, HEX_LEN};
use memmap2::Mmap;

use crate::{PackError, IDX_SIGNATURE, IDX_VERSION, LARGE_PACK_THRESHOLD};

const FANOUT_LEN: usize = 256 * 4;
const HEADER_LEN: usize = 8;

/// An opened, checksum-verified pack index.
///
/// All fields are immutable after open, so lookups take `&self` and the
/// index may be shared freely for reading.
#[derive(Debug)]
pub struct PackIndex {
    data: Mmap,
    num_objects: u32,
    oid_start: usize,
    crc_start: usize,
    offset32_start: usize,
    offset64_start: usize,
    num_large: usize,
    idx_path: PathBuf,
}

impl PackIndex {
    /// Open and validate a `pack-<sha1>.idx` file.
    ///
    /// The companion `.pack` (same path with the suffix swapped) must exist;
    /// its size decides whether the 64-bit offset table is expected. The
    /// file layout is validated exactly and the trailing SHA-1 is
    /// recomputed over every preceding byte.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let pack_size = std::fs::metadata(idx_path.with_extension("pack"))?.len();

        let file = std::fs::File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < HEADER_LEN + FANOUT_LEN + 2 * DIGEST_LEN {
            return Err(PackError::InvalidIndex("file too small".into()));
        }
        if data[0..4] != IDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad signature".into()));
        }
        let version = read_u32(&data, 4);
        if version != IDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported version {version}, expected {IDX_VERSION}"
            )));
        }

        let mut prev = 0u32;
        for i in 0..256 {
            let count = read_u32(&data, HEADER_LEN + i * 4);
            if count < prev {
                return Err(PackError::InvalidIndex(format!(
                    "fanout table not monotonic at byte {i:#04x}"
                )));
            }
            prev = count;
        }
        let n = prev as usize;

        let oid_start = HEADER_LEN + FANOUT_LEN;
        let crc_start = oid_start + n * DIGEST_LEN;
        let offset32_start = crc_start + n * 4;
        let offset64_start = offset32_start + n * 4;
        let fixed_len = offset64_start + 2 * DIGEST_LEN;
        if data.len() < fixed_len {
            return Err(PackError::InvalidIndex(format!(
                "truncated: {} bytes, need {fixed_len}",
                data.len()
            )));
        }

        // The residual between the fixed sections and the trailer is the
        // 64-bit offset table, which only packs over 2 GiB may carry.
        let residual = data.len() - fixed_len;
        let num_large = if pack_size > LARGE_PACK_THRESHOLD {
            if residual % 8 != 0 {
                return Err(PackError::InvalidIndex(
                    "64-bit offset table length not a multiple of 8".into(),
                ));
            }
            let m = residual / 8;
            if m > n {
                return Err(PackError::InvalidIndex(format!(
                    "{m} 64-bit offsets for {n} objects"
                )));
            }
            m
        } else {
            if residual != 0 {
                return Err(PackError::InvalidIndex(format!(
                    "{residual} unexpected bytes before trailer"
                )));
            }
            0
        };

        let mut hasher = Hasher::new();
        hasher.update(&data[..data.len() - DIGEST_LEN]);
        let computed = hasher.finalize()?;
        let stored = oid_at_raw(&data, data.len() - DIGEST_LEN);
        if computed != stored {
            return Err(PackError::IndexChecksumMismatch { stored, computed });
        }

        Ok(Self {
            data,
            num_objects: prev,
            oid_start,
            crc_start,
            offset32_start,
            offset64_start,
            num_large,
            idx_path,
        })
    }

    /// Look up an id, returning its slot in the sorted id table.
    pub fn lookup(&self, oid: &ObjectId) -> Option<u32> {
        let (mut lo, mut hi) = self.fanout_range(oid.first_byte());
        let target: &[u8] = oid.as_bytes();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.oid_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(mid as u32),
            }
        }
        None
    }

    /// Whether the index contains the given id.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.lookup(oid).is_some()
    }

    /// The id stored at a slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn oid_at(&self, slot: u32) -> ObjectId {
        assert!(slot < self.num_objects, "slot out of range");
        oid_at_raw(&self.data, self.oid_start + slot as usize * DIGEST_LEN)
    }

    /// The CRC32 of the raw pack entry at a slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn crc32_at(&self, slot: u32) -> u32 {
        assert!(slot < self.num_objects, "slot out of range");
        read_u32(&self.data, self.crc_start + slot as usize * 4)
    }

    /// The pack byte offset of the entry at a slot.
    ///
    /// Offsets with the high bit set index the 64-bit table; the derived
    /// index must be in range and the table present.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range.
    pub fn offset_at(&self, slot: u32) -> Result<u64, PackError> {
        assert!(slot < self.num_objects, "slot out of range");
        let raw = read_u32(&self.data, self.offset32_start + slot as usize * 4);
        if raw & 0x8000_0000 == 0 {
            return Ok(u64::from(raw));
        }
        let large_idx = (raw & 0x7fff_ffff) as usize;
        if large_idx >= self.num_large {
            return Err(PackError::InvalidIndex(format!(
                "64-bit offset index {large_idx} out of range ({} present)",
                self.num_large
            )));
        }
        let offset = read_u64(&self.data, self.offset64_start + large_idx * 8);
        if offset > i64::MAX as u64 {
            return Err(PackError::InvalidIndex(format!(
                "64-bit offset {offset:#x} exceeds the representable file size"
            )));
        }
        Ok(offset)
    }

    /// Number of objects in the companion pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Path of the `.idx` file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// The companion pack's checksum, from the trailer.
    pub fn pack_checksum(&self) -> ObjectId {
        oid_at_raw(&self.data, self.data.len() - 2 * DIGEST_LEN)
    }

    /// The index's own trailing checksum.
    pub fn index_checksum(&self) -> ObjectId {
        oid_at_raw(&self.data, self.data.len() - DIGEST_LEN)
    }

    /// Iterate `(id, offset)` pairs in sorted id order.
    pub fn iter(&self) -> PackIndexIter<'_> {
        PackIndexIter {
            index: self,
            slot: 0,
        }
    }

    /// Slot range `[start, end)` holding ids with the given first byte.
    fn fanout_range(&self, first_byte: u8) -> (usize, usize) {
        let end = self.fanout_entry(first_byte) as usize;
        let start = match first_byte {
            0 => 0,
            b => self.fanout_entry(b - 1) as usize,
        };
        (start, end)
    }

    fn fanout_entry(&self, bucket: u8) -> u32 {
        read_u32(&self.data, HEADER_LEN + usize::from(bucket) * 4)
    }

    fn oid_bytes_at(&self, slot: usize) -> &[u8] {
        let start = self.oid_start + slot * DIGEST_LEN;
        &self.data[start..start + DIGEST_LEN]
    }
}

/// Iterator over `(id, offset)` pairs of a pack index.
pub struct PackIndexIter<'a> {
    index: &'a PackIndex,
    slot: u32,
}

impl Iterator for PackIndexIter<'_> {
    type Item = Result<(ObjectId, u64), PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot >= self.index.num_objects {
            return None;
        }
        let oid = self.index.oid_at(self.slot);
        let offset = self.index.offset_at(self.slot);
        self.slot += 1;
        Some(offset.map(|off| (oid, off)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.index.num_objects - self.slot) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PackIndexIter<'_> {}

/// Whether a directory entry name looks like `pack-<40 hex>.idx`.
pub fn is_pack_index_name(name: &str) -> bool {
    const PREFIX: &str = "pack-";
    const SUFFIX: &str = ".idx";
    if name.len() != PREFIX.len() + HEX_LEN + SUFFIX.len() {
        return false;
    }
    let Some(rest) = name.strip_prefix(PREFIX) else {
        return false;
    };
    let Some(hex) = rest.strip_suffix(SUFFIX) else {
        return false;
    };
    hex.bytes().all(|b| b.is_ascii_hexdigit())
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes(data[pos..pos + 4].try_into().expect("4-byte slice"))
}

fn read_u64(data: &[u8], pos: usize) -> u64 {
    u64::from_be_bytes(data[pos..pos + 8].try_into().expect("8-byte slice"))
}

fn oid_at_raw(data: &[u8], pos: usize) -> ObjectId {
    let mut raw = [0u8; DIGEST_LEN];
    raw.copy_from_slice(&data[pos..pos + DIGEST_LEN]);
    ObjectId::from_raw(raw)
}
