//! Fixture support: fabricate `.pack`/`.idx` pairs in memory.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use grit_hash::hasher::Hasher;
use grit_hash::{ObjectId, DIGEST_LEN};
use grit_object::ObjectKind;
use grit_pack::entry::{encode_base_distance, encode_entry_header};
use grit_pack::{IDX_SIGNATURE, IDX_VERSION, PACK_SIGNATURE, PACK_VERSION};

/// One object to place in a fabricated pack, in pack order.
pub enum Entry {
    /// A compressed literal; its id is computed from the payload.
    Plain { kind: ObjectKind, payload: Vec<u8> },
    /// An offset delta against the entry at index `base` of this pack.
    /// `oid` is the id the index will carry for the reconstructed object.
    OffsetDelta {
        oid: ObjectId,
        base: usize,
        delta: Vec<u8>,
    },
    /// A ref delta against `base_id`, wherever that base lives.
    RefDelta {
        oid: ObjectId,
        base_id: ObjectId,
        delta: Vec<u8>,
    },
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = ZlibEncoder::new(&mut out, Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap();
    out
}

pub fn oid_of(kind: ObjectKind, payload: &[u8]) -> ObjectId {
    Hasher::hash_object(kind.as_str(), payload).unwrap()
}

fn kind_bits(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
        ObjectKind::Tag => 4,
    }
}

/// Assemble pack bytes plus `(id, offset, crc)` rows for the index.
pub fn build_pack(entries: &[Entry]) -> (Vec<u8>, Vec<(ObjectId, u64, u32)>) {
    let mut pack = Vec::new();
    pack.extend_from_slice(PACK_SIGNATURE);
    pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
    pack.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    let mut rows: Vec<(ObjectId, u64, u32)> = Vec::new();
    let mut offsets: Vec<u64> = Vec::new();

    for entry in entries {
        let offset = pack.len() as u64;
        offsets.push(offset);

        let (oid, raw) = match entry {
            Entry::Plain { kind, payload } => {
                let mut raw = encode_entry_header(kind_bits(*kind), payload.len() as u64);
                raw.extend_from_slice(&zlib(payload));
                (oid_of(*kind, payload), raw)
            }
            Entry::OffsetDelta { oid, base, delta } => {
                let mut raw = encode_entry_header(6, delta.len() as u64);
                raw.extend_from_slice(&encode_base_distance(offset - offsets[*base]));
                raw.extend_from_slice(&zlib(delta));
                (*oid, raw)
            }
            Entry::RefDelta {
                oid,
                base_id,
                delta,
            } => {
                let mut raw = encode_entry_header(7, delta.len() as u64);
                raw.extend_from_slice(base_id.as_bytes());
                raw.extend_from_slice(&zlib(delta));
                (*oid, raw)
            }
        };

        let mut crc = crc32fast::Hasher::new();
        crc.update(&raw);
        rows.push((oid, offset, crc.finalize()));
        pack.extend_from_slice(&raw);
    }

    let checksum = Hasher::digest(&pack).unwrap();
    pack.extend_from_slice(checksum.as_bytes());
    (pack, rows)
}

/// Build a v2 index for the given rows and pack checksum.
pub fn build_idx(rows: &[(ObjectId, u64, u32)], pack_checksum: &ObjectId) -> Vec<u8> {
    let mut sorted: Vec<_> = rows.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buf = Vec::new();
    buf.extend_from_slice(&IDX_SIGNATURE);
    buf.extend_from_slice(&IDX_VERSION.to_be_bytes());

    let mut fanout = [0u32; 256];
    for (oid, _, _) in &sorted {
        fanout[usize::from(oid.first_byte())] += 1;
    }
    for i in 1..256 {
        fanout[i] += fanout[i - 1];
    }
    for count in fanout {
        buf.extend_from_slice(&count.to_be_bytes());
    }

    for (oid, _, _) in &sorted {
        buf.extend_from_slice(oid.as_bytes());
    }
    for (_, _, crc) in &sorted {
        buf.extend_from_slice(&crc.to_be_bytes());
    }
    for (_, offset, _) in &sorted {
        buf.extend_from_slice(&(*offset as u32).to_be_bytes());
    }

    buf.extend_from_slice(pack_checksum.as_bytes());
    let checksum = Hasher::digest(&buf).unwrap();
    buf.extend_from_slice(checksum.as_bytes());
    buf
}

/// Write `<stem>.pack` and `<stem>.idx` under `dir`.
///
/// Returns the pack path and the entry ids in pack order.
pub fn write_pack(dir: &Path, stem: &str, entries: &[Entry]) -> (PathBuf, Vec<ObjectId>) {
    let (pack, rows) = build_pack(entries);
    let checksum = ObjectId::from_bytes(&pack[pack.len() - DIGEST_LEN..]).unwrap();
    let idx = build_idx(&rows, &checksum);

    let pack_path = dir.join(format!("{stem}.pack"));
    std::fs::write(&pack_path, &pack).unwrap();
    std::fs::write(dir.join(format!("{stem}.idx")), &idx).unwrap();

    (pack_path, rows.iter().map(|(oid, _, _)| *oid).collect())
}

/// A synthetic id with a controlled first byte and counter suffix.
pub fn make_oid(first_byte: u8, counter: u16) -> ObjectId {
    let mut raw = [0u8; DIGEST_LEN];
    raw[0] = first_byte;
    raw[18] = (counter >> 8) as u8;
    raw[19] = counter as u8;
    ObjectId::from_raw(raw)
}

/// A delta stream that reproduces `base` unchanged by one whole copy.
pub fn identity_delta(base_len: usize) -> Vec<u8> {
    use grit_pack::delta::{encode_copy, write_varint};
    let mut delta = Vec::new();
    delta.extend_from_slice(&write_varint(base_len as u64));
    delta.extend_from_slice(&write_varint(base_len as u64));
    delta.extend_from_slice(&encode_copy(0, base_len));
    delta
}
