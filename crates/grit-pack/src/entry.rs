//! Pack entry header decoding.
//!
//! Every entry starts with a variable-length type-and-size header: the
//! first byte carries the kind in bits 4-6 and the low four size bits,
//! and each continuation byte contributes seven more size bits, low
//! bits first. Offset deltas follow with a big-endian base-distance
//! encoding, ref deltas with the 20-byte id of their base.

use grit_hash::{ObjectId, DIGEST_LEN};
use grit_object::ObjectKind;

use crate::PackError;

/// A size header longer than this cannot fit a 64-bit value.
const MAX_SIZE_BYTES: usize = 10;

/// A base-distance encoding longer than this cannot fit a 64-bit value.
const MAX_DISTANCE_BYTES: usize = 9;

/// How an entry stores its object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A compressed literal of one of the four object kinds.
    Plain(ObjectKind),
    /// Delta whose base starts at `base_offset` in the same pack.
    Offset { base_offset: u64 },
    /// Delta whose base is identified by id and may live in any pack.
    Ref { base_id: ObjectId },
}

/// A decoded entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: EntryKind,
    /// Inflated size of this entry's payload (the object for plain
    /// entries, the delta stream for delta entries).
    pub inflated_size: u64,
    /// Absolute pack offset of the zlib payload, past all header bytes.
    pub payload_offset: u64,
    /// Total header length in bytes, including delta base information.
    pub header_len: usize,
}

/// Decode the entry header at the start of `data`.
///
/// `entry_offset` is the entry's absolute offset in the pack; it anchors
/// offset-delta base computation and error reporting.
pub fn parse_entry_header(data: &[u8], entry_offset: u64) -> Result<EntryHeader, PackError> {
    let mut pos = 0usize;
    let first = *data.get(pos).ok_or(PackError::CorruptEntry(entry_offset))?;
    pos += 1;

    let kind_bits = (first >> 4) & 0x07;
    let mut size = u64::from(first & 0x0f);
    let mut shift = 4u32;
    let mut byte = first;
    while byte & 0x80 != 0 {
        if pos >= MAX_SIZE_BYTES {
            return Err(PackError::InvalidPack(format!(
                "size header at offset {entry_offset} exceeds {MAX_SIZE_BYTES} bytes"
            )));
        }
        byte = *data.get(pos).ok_or(PackError::CorruptEntry(entry_offset))?;
        pos += 1;
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }

    let kind = match kind_bits {
        1 => EntryKind::Plain(ObjectKind::Commit),
        2 => EntryKind::Plain(ObjectKind::Tree),
        3 => EntryKind::Plain(ObjectKind::Blob),
        4 => EntryKind::Plain(ObjectKind::Tag),
        6 => {
            let (distance, len) = parse_base_distance(&data[pos..], entry_offset)?;
            pos += len;
            if distance == 0 || distance >= entry_offset {
                return Err(PackError::InvalidPack(format!(
                    "offset delta at {entry_offset} has invalid base distance {distance}"
                )));
            }
            EntryKind::Offset {
                base_offset: entry_offset - distance,
            }
        }
        7 => {
            let id_bytes = data
                .get(pos..pos + DIGEST_LEN)
                .ok_or(PackError::CorruptEntry(entry_offset))?;
            let mut raw = [0u8; DIGEST_LEN];
            raw.copy_from_slice(id_bytes);
            pos += DIGEST_LEN;
            EntryKind::Ref {
                base_id: ObjectId::from_raw(raw),
            }
        }
        other => {
            // 0 is undefined and 5 is reserved by the pack format.
            return Err(PackError::UnsupportedKind {
                kind: other,
                offset: entry_offset,
            });
        }
    };

    Ok(EntryHeader {
        kind,
        inflated_size: size,
        payload_offset: entry_offset + pos as u64,
        header_len: pos,
    })
}

/// Decode the offset-delta base distance at the start of `data`.
///
/// Big-endian by septet, with a continuation bit and a +1 adjustment per
/// continuation so that multi-byte encodings have no redundant forms.
/// Returns `(distance, bytes_consumed)`.
fn parse_base_distance(data: &[u8], entry_offset: u64) -> Result<(u64, usize), PackError> {
    let mut pos = 0usize;
    let mut byte = *data.get(pos).ok_or(PackError::CorruptEntry(entry_offset))?;
    pos += 1;
    let mut distance = u64::from(byte & 0x7f);
    while byte & 0x80 != 0 {
        if pos >= MAX_DISTANCE_BYTES {
            return Err(PackError::InvalidPack(format!(
                "base distance at offset {entry_offset} exceeds {MAX_DISTANCE_BYTES} bytes"
            )));
        }
        byte = *data.get(pos).ok_or(PackError::CorruptEntry(entry_offset))?;
        pos += 1;
        distance = ((distance + 1) << 7) | u64::from(byte & 0x7f);
    }
    Ok((distance, pos))
}

/// Encode a type-and-size header. Delta base information (base distance
/// or base id) is appended separately by the caller.
pub fn encode_entry_header(kind_bits: u8, size: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_SIZE_BYTES);
    let mut rest = size >> 4;
    let mut byte = (kind_bits << 4) | (size & 0x0f) as u8;
    while rest > 0 {
        buf.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    buf.push(byte);
    buf
}

/// Encode an offset-delta base distance.
pub fn encode_base_distance(distance: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_DISTANCE_BYTES);
    let mut rest = distance;
    buf.push((rest & 0x7f) as u8);
    rest >>= 7;
    while rest > 0 {
        rest -= 1;
        buf.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    buf.reverse();
    buf
}
