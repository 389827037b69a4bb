//! Delta chain resolution.
//!
//! Opening a delta entry does not materialize it. Resolution walks from
//! the requested entry to its plain base, recording one link per entry
//! visited; extraction later inflates the base and applies each delta
//! outward. Offset deltas stay within one pack, ref deltas may hop to a
//! base in any pack of the repository.

use std::path::PathBuf;

use grit_hash::ObjectId;
use grit_object::ObjectKind;

use crate::entry::EntryKind;
use crate::pack::PackFile;
use crate::{PackError, MAX_DELTA_CHAIN_DEPTH};

/// One link of a delta chain: where an entry's zlib payload lives.
///
/// The pack path is copied so the link stays valid independently of the
/// pack handle it was resolved through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaSpec {
    pub pack_path: PathBuf,
    /// Absolute offset of the entry's zlib payload in that pack.
    pub payload_offset: u64,
    /// Declared inflated size of the payload.
    pub inflated_size: u64,
}

/// The entries visited while resolving a delta, outermost delta first,
/// ending with the plain base entry.
#[derive(Debug, Clone)]
pub struct DeltaChain {
    links: Vec<DeltaSpec>,
    base_kind: ObjectKind,
}

impl DeltaChain {
    /// The object kind of the terminal base, which is the kind the
    /// reconstructed object will have.
    pub fn base_kind(&self) -> ObjectKind {
        self.base_kind
    }

    /// Number of links, the base included. Always at least one.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// A resolved chain always has at least its base link.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The terminal base link.
    pub fn base(&self) -> &DeltaSpec {
        self.links.last().expect("chain holds at least the base")
    }

    /// The delta links, outermost first, base excluded.
    pub fn deltas(&self) -> &[DeltaSpec] {
        &self.links[..self.links.len() - 1]
    }
}

/// Resolve the delta chain for the entry at `entry_offset` in `pack`.
///
/// `find_base` locates the pack holding a ref-delta base id; the caller
/// supplies repository-order search so that the first matching pack
/// wins. Returns the chain with its resolved terminal kind.
pub fn resolve_chain<'a>(
    pack: &'a PackFile,
    entry_offset: u64,
    find_base: impl Fn(&ObjectId) -> Option<&'a PackFile>,
) -> Result<DeltaChain, PackError> {
    let origin = entry_offset;
    let mut current_pack = pack;
    let mut current_offset = entry_offset;
    let mut links = Vec::new();

    loop {
        if links.len() >= MAX_DELTA_CHAIN_DEPTH {
            return Err(PackError::DeltaChainTooDeep {
                offset: origin,
                max_depth: MAX_DELTA_CHAIN_DEPTH,
            });
        }

        let header = current_pack.entry_at(current_offset)?;
        links.push(DeltaSpec {
            pack_path: current_pack.path().to_path_buf(),
            payload_offset: header.payload_offset,
            inflated_size: header.inflated_size,
        });

        match header.kind {
            EntryKind::Plain(kind) => {
                return Ok(DeltaChain {
                    links,
                    base_kind: kind,
                });
            }
            EntryKind::Offset { base_offset } => {
                current_offset = base_offset;
            }
            EntryKind::Ref { base_id } => {
                let base_pack = find_base(&base_id).ok_or(PackError::MissingBase(base_id))?;
                let slot = base_pack
                    .index()
                    .lookup(&base_id)
                    .ok_or(PackError::MissingBase(base_id))?;
                current_offset = base_pack.index().offset_at(slot)?;
                current_pack = base_pack;
            }
        }
    }
}
