use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::ObjectId;
use grit_object::{header, ObjectKind};

use crate::{LooseError, LooseStore};

/// Loose object headers fit well under this; anything longer is corrupt.
const MAX_HEADER_LEN: usize = 64;

/// An opened loose object.
///
/// The header has been parsed; the handle keeps the inflate state and the
/// underlying file open until dropped, and [`Read`] yields payload bytes
/// only, clamped to the declared size.
#[derive(Debug)]
pub struct LooseObject {
    oid: ObjectId,
    kind: ObjectKind,
    size: u64,
    header_len: usize,
    decoder: ZlibDecoder<fs::File>,
    bytes_read: u64,
}

impl LooseObject {
    /// The id this object was opened under.
    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    /// The object kind from the header.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The declared payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Length of the `"<kind> <size>\0"` header in bytes.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// How many payload bytes remain to be read.
    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.bytes_read)
    }

    /// Drain the remaining payload into a buffer.
    ///
    /// Errors if the zlib stream ends before the declared size is reached.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>, LooseError> {
        let want = self.remaining();
        let mut buf = Vec::with_capacity(want.min(1 << 20) as usize);
        self.read_to_end(&mut buf).map_err(|e| LooseError::Decompress {
            oid: self.oid.to_hex(),
            source: e,
        })?;
        if buf.len() as u64 != want {
            return Err(LooseError::Corrupt {
                oid: self.oid.to_hex(),
                reason: format!("payload ended after {} of {} bytes", buf.len(), want),
            });
        }
        Ok(buf)
    }
}

impl Read for LooseObject {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(0);
        }
        let max = remaining.min(buf.len() as u64) as usize;
        let n = self.decoder.read(&mut buf[..max])?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl LooseStore {
    /// Open a loose object for streaming reads.
    ///
    /// Returns `Ok(None)` if no loose object with this id exists. The header
    /// is parsed immediately from a bounded inflate prefix; payload bytes
    /// are inflated on demand through [`Read`].
    pub fn stream(&self, oid: &ObjectId) -> Result<Option<LooseObject>, LooseError> {
        let path = self.object_path(oid);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        // Inflate just enough to find the header's NUL terminator.
        let mut decoder = ZlibDecoder::new(file);
        let mut hdr_buf = [0u8; MAX_HEADER_LEN];
        let mut filled = 0;
        loop {
            if filled >= hdr_buf.len() {
                return Err(LooseError::Corrupt {
                    oid: oid.to_hex(),
                    reason: format!("header exceeds {MAX_HEADER_LEN} bytes"),
                });
            }
            let n = decoder
                .read(&mut hdr_buf[filled..])
                .map_err(|e| LooseError::Decompress {
                    oid: oid.to_hex(),
                    source: e,
                })?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "stream ended before header NUL terminator".into(),
                });
            }
            filled += n;
            if hdr_buf[..filled].contains(&0) {
                break;
            }
        }

        let (kind, size, header_len) = header::parse_header(&hdr_buf[..filled])?;

        // Restart the inflate stream and position it just past the header so
        // reads yield payload bytes only.
        let mut decoder = ZlibDecoder::new(fs::File::open(&path)?);
        let mut skip = vec![0u8; header_len];
        decoder
            .read_exact(&mut skip)
            .map_err(|e| LooseError::Decompress {
                oid: oid.to_hex(),
                source: e,
            })?;

        Ok(Some(LooseObject {
            oid: *oid,
            kind,
            size,
            header_len,
            decoder,
            bytes_read: 0,
        }))
    }
}
