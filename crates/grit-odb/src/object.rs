//! The opener's object handle.

use std::path::PathBuf;

use grit_loose::LooseObject;
use grit_object::ObjectKind;
use grit_pack::chain::DeltaChain;

/// An opened object: either a loose stream or a packed descriptor.
///
/// The handle owns its file resources; dropping it releases them. Ids
/// recorded inside (chain links, the loose stream's id) are copies.
#[derive(Debug)]
pub enum Object {
    /// A loose object with its inflate stream.
    Loose(LooseObject),
    /// An object inside a pack, not yet materialized.
    Packed(PackedObject),
}

/// Where a packed object lives and how it is stored.
#[derive(Debug, Clone)]
pub struct PackedObject {
    /// Path of the pack holding the entry.
    pub pack_path: PathBuf,
    /// Absolute offset of the entry in that pack.
    pub entry_offset: u64,
    pub repr: PackedRepr,
}

/// Storage representation of a packed entry.
#[derive(Debug, Clone)]
pub enum PackedRepr {
    /// A compressed literal.
    Plain {
        kind: ObjectKind,
        size: u64,
        /// Absolute offset of the zlib payload.
        payload_offset: u64,
    },
    /// A delta whose chain has been resolved down to its plain base.
    Delta(DeltaChain),
}

impl Object {
    /// The object's kind. For deltas this is the resolved kind of the
    /// chain's terminal base.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Loose(loose) => loose.kind(),
            Self::Packed(packed) => match &packed.repr {
                PackedRepr::Plain { kind, .. } => *kind,
                PackedRepr::Delta(chain) => chain.base_kind(),
            },
        }
    }

    /// The declared payload size, when it is known without applying
    /// deltas. `None` for an unextracted delta chain.
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Loose(loose) => Some(loose.size()),
            Self::Packed(packed) => match &packed.repr {
                PackedRepr::Plain { size, .. } => Some(*size),
                PackedRepr::Delta(_) => None,
            },
        }
    }

    /// Whether the object came from a pack.
    pub fn is_packed(&self) -> bool {
        matches!(self, Self::Packed(_))
    }

    /// The delta chain, when the object is stored deltified.
    pub fn delta_chain(&self) -> Option<&DeltaChain> {
        match self {
            Self::Packed(PackedObject {
                repr: PackedRepr::Delta(chain),
                ..
            }) => Some(chain),
            _ => None,
        }
    }
}
