use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::hasher::Hasher;
use grit_hash::ObjectId;
use grit_object::{header, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Read a whole loose object.
    ///
    /// Returns `Ok(None)` if no loose object with this id exists, the kind
    /// and exactly the declared number of payload bytes otherwise.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let compressed = match fs::read(self.object_path(oid)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let inflated = inflate_all(&compressed, oid)?;
        let (kind, size, header_len) = header::parse_header(&inflated)?;

        let payload = &inflated[header_len..];
        if (payload.len() as u64) < size {
            return Err(LooseError::Corrupt {
                oid: oid.to_hex(),
                reason: format!("declared size {size} but only {} payload bytes", payload.len()),
            });
        }
        Ok(Some((kind, payload[..size as usize].to_vec())))
    }

    /// Read a loose object and verify that re-hashing it yields `oid`.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    pub fn read_verified(
        &self,
        oid: &ObjectId,
    ) -> Result<Option<(ObjectKind, Vec<u8>)>, LooseError> {
        let Some((kind, payload)) = self.read(oid)? else {
            return Ok(None);
        };
        let actual = Hasher::hash_object(kind.as_str(), &payload)?;
        if actual != *oid {
            return Err(LooseError::HashMismatch {
                path: self.object_path(oid),
                expected: oid.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(Some((kind, payload)))
    }
}

/// Zlib-inflate the full contents of a loose object file.
fn inflate_all(compressed: &[u8], oid: &ObjectId) -> Result<Vec<u8>, LooseError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| LooseError::Decompress {
            oid: oid.to_hex(),
            source: e,
        })?;
    Ok(inflated)
}
