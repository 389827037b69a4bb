//! Unified read-only object database.
//!
//! The front door to a repository's object store. An id is first probed
//! in loose storage (`objects/xx/yyyy...`), then in every pack under
//! `objects/pack/`, in directory order, first match wins. Opening yields
//! a handle describing where the object lives; extraction materializes
//! its bytes, applying delta chains as needed.

mod object;
mod search;

pub use object::{Object, PackedObject, PackedRepr};

use std::path::{Path, PathBuf};

use grit_hash::ObjectId;
use grit_loose::LooseStore;
use grit_object::ObjectKind;
use grit_pack::chain::DeltaChain;
use grit_pack::index::is_pack_index_name;
use grit_pack::pack::PackFile;

pub use error::OdbError;

mod error {
    use std::path::PathBuf;

    use grit_hash::ObjectId;

    #[derive(Debug, thiserror::Error)]
    pub enum OdbError {
        #[error("object not found: {0}")]
        NotFound(ObjectId),

        #[error("pack not part of this object store: {0}")]
        UnknownPack(PathBuf),

        #[error(transparent)]
        Loose(#[from] grit_loose::LooseError),

        #[error(transparent)]
        Pack(#[from] grit_pack::PackError),

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }
}

/// Read-only object database over one objects directory.
///
/// Packs are discovered once at open time, in directory-iteration order;
/// lookups search them in that same order so that the first pack holding
/// an id always wins. All state is immutable after open, so the database
/// may be shared for concurrent reads.
#[derive(Debug)]
pub struct ObjectDatabase {
    loose: LooseStore,
    packs: Vec<PackFile>,
    objects_dir: PathBuf,
}

impl ObjectDatabase {
    /// Open the object database at the given objects directory.
    ///
    /// Every `pack-<sha1>.idx` under `objects/pack/` is opened and
    /// verified together with its companion pack; a structurally bad
    /// pack fails the open rather than being skipped.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseStore::open(&objects_dir);
        let packs = discover_packs(&objects_dir)?;
        Ok(Self {
            loose,
            packs,
            objects_dir,
        })
    }

    /// The objects directory this database reads from.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Number of packs the database serves lookups from.
    pub fn num_packs(&self) -> usize {
        self.packs.len()
    }

    /// Open an object by id.
    ///
    /// Returns a handle describing where the object lives and, for
    /// packed deltas, its resolved chain. `NotFound` only after both the
    /// loose store and every pack miss.
    pub fn open_object(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        search::open_object(self, oid)
    }

    /// Materialize an object's payload bytes.
    pub fn extract(&self, object: &mut Object) -> Result<Vec<u8>, OdbError> {
        search::extract(self, object)
    }

    /// Open and extract in one step, returning the kind and payload.
    pub fn read(&self, oid: &ObjectId) -> Result<(ObjectKind, Vec<u8>), OdbError> {
        let mut object = self.open_object(oid)?;
        let kind = object.kind();
        let payload = self.extract(&mut object)?;
        Ok((kind, payload))
    }

    /// Check whether an object exists, without inflating anything.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.loose.contains(oid) || self.packs.iter().any(|p| p.index().contains(oid))
    }

    pub(crate) fn loose(&self) -> &LooseStore {
        &self.loose
    }

    pub(crate) fn packs(&self) -> &[PackFile] {
        &self.packs
    }

    /// The pack a previously resolved handle or chain link refers to.
    pub(crate) fn pack_by_path(&self, path: &Path) -> Result<&PackFile, OdbError> {
        self.packs
            .iter()
            .find(|p| p.path() == path)
            .ok_or_else(|| OdbError::UnknownPack(path.to_path_buf()))
    }

    /// Inflate the chain's base and apply each delta from there outward.
    pub(crate) fn apply_chain(&self, chain: &DeltaChain) -> Result<Vec<u8>, OdbError> {
        let base = chain.base();
        let mut data = self
            .pack_by_path(&base.pack_path)?
            .read_payload(base.payload_offset, base.inflated_size)?;
        for link in chain.deltas().iter().rev() {
            let stream = self
                .pack_by_path(&link.pack_path)?
                .read_payload(link.payload_offset, link.inflated_size)?;
            data = grit_pack::delta::apply(&data, &stream)?;
        }
        Ok(data)
    }
}

/// Scan `objects/pack/` for index files and open their packs.
///
/// A missing pack directory just means no packs. Directory-iteration
/// order is preserved; it decides which pack wins when the same id
/// appears in several.
fn discover_packs(objects_dir: &Path) -> Result<Vec<PackFile>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut packs = Vec::new();
    for entry in std::fs::read_dir(&pack_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_pack_index_name(name) {
            continue;
        }
        packs.push(PackFile::open(entry.path().with_extension("pack"))?);
    }
    Ok(packs)
}
