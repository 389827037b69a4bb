//! Fixture support: fabricate repositories with loose and packed objects.
#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use grit_hash::hasher::Hasher;
use grit_hash::{ObjectId, DIGEST_LEN};
use grit_object::{header, ObjectKind};
use grit_pack::entry::{encode_base_distance, encode_entry_header};
use grit_pack::{IDX_SIGNATURE, IDX_VERSION, PACK_SIGNATURE, PACK_VERSION};

/// One object to place in a fabricated pack, in pack order.
pub enum Entry {
    Plain { kind: ObjectKind, payload: Vec<u8> },
    OffsetDelta {
        oid: ObjectId,
        base: usize,
        delta: Vec<u8>,
    },
    RefDelta {
        oid: ObjectId,
        base_id: ObjectId,
        delta: Vec<u8>,
    },
}

pub fn plain(kind: ObjectKind, payload: &[u8]) -> Entry {
    Entry::Plain {
        kind,
        payload: payload.to_vec(),
    }
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

/// A delta stream built from a base size, a declared result size, and
/// raw instruction bytes.
pub fn delta_stream(base_size: u64, result_size: u64, instructions: &[u8]) -> Vec<u8> {
    use grit_pack::delta::write_varint;
    let mut delta = Vec::new();
    delta.extend_from_slice(&write_varint(base_size));
    delta.extend_from_slice(&write_varint(result_size));
    delta.extend_from_slice(instructions);
    delta
}

fn build_pack(entries: &[Entry]) -> (Vec<u8>, Vec<(ObjectId, u64, u32)>) {
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

fn build_idx(rows: &[(ObjectId, u64, u32)], pack_checksum: &ObjectId) -> Vec<u8> {
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

/// A test repository rooted at a temp directory.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub objects_dir: PathBuf,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let objects_dir = dir.path().join("objects");
        std::fs::create_dir_all(objects_dir.join("pack")).unwrap();
        Self { dir, objects_dir }
    }

    /// Write a loose object and return its id.
    pub fn add_loose(&self, kind: ObjectKind, payload: &[u8]) -> ObjectId {
        let mut raw = header::write_header(kind, payload.len() as u64);
        raw.extend_from_slice(payload);
        let oid = Hasher::digest(&raw).unwrap();

        let path = self.objects_dir.join(oid.loose_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, zlib(&raw)).unwrap();
        oid
    }

    /// Write a pack under `objects/pack/`, named after its checksum the
    /// way git names packs. Returns the idx path and entry ids in pack
    /// order.
    pub fn add_pack(&self, entries: &[Entry]) -> (PathBuf, Vec<ObjectId>) {
        let (pack, rows) = build_pack(entries);
        let checksum = ObjectId::from_bytes(&pack[pack.len() - DIGEST_LEN..]).unwrap();
        let idx = build_idx(&rows, &checksum);

        let pack_dir = self.objects_dir.join("pack");
        let stem = format!("pack-{}", checksum.to_hex());
        std::fs::write(pack_dir.join(format!("{stem}.pack")), &pack).unwrap();
        let idx_path = pack_dir.join(format!("{stem}.idx"));
        std::fs::write(&idx_path, &idx).unwrap();

        (idx_path, rows.iter().map(|(oid, _, _)| *oid).collect())
    }
}
