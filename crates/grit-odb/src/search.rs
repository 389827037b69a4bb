//! Lookup and extraction across loose and packed storage.
//!
//! Search order is loose first, then the packs in discovery order.
//! Falling through from a loose miss is silent; any structural failure
//! in a pack the search decides to read is fatal for the call.

use grit_hash::ObjectId;
use grit_pack::chain::resolve_chain;
use grit_pack::entry::EntryKind;

use crate::{Object, ObjectDatabase, OdbError, PackedObject, PackedRepr};

pub(crate) fn open_object(odb: &ObjectDatabase, oid: &ObjectId) -> Result<Object, OdbError> {
    if let Some(loose) = odb.loose().stream(oid)? {
        return Ok(Object::Loose(loose));
    }

    for pack in odb.packs() {
        let Some(slot) = pack.index().lookup(oid) else {
            continue;
        };
        let entry_offset = pack.index().offset_at(slot)?;
        let header = pack.entry_at(entry_offset)?;

        let repr = match header.kind {
            EntryKind::Plain(kind) => PackedRepr::Plain {
                kind,
                size: header.inflated_size,
                payload_offset: header.payload_offset,
            },
            EntryKind::Offset { .. } | EntryKind::Ref { .. } => {
                // Ref-delta bases may live in any pack; search them in
                // the same repository order as the outer lookup.
                let find_base = |id: &ObjectId| odb.packs().iter().find(|p| p.index().contains(id));
                PackedRepr::Delta(resolve_chain(pack, entry_offset, find_base)?)
            }
        };

        return Ok(Object::Packed(PackedObject {
            pack_path: pack.path().to_path_buf(),
            entry_offset,
            repr,
        }));
    }

    Err(OdbError::NotFound(*oid))
}

pub(crate) fn extract(odb: &ObjectDatabase, object: &mut Object) -> Result<Vec<u8>, OdbError> {
    match object {
        Object::Loose(loose) => Ok(loose.read_remaining()?),
        Object::Packed(packed) => match &packed.repr {
            PackedRepr::Plain {
                size,
                payload_offset,
                ..
            } => {
                let pack = odb.pack_by_path(&packed.pack_path)?;
                Ok(pack.read_payload(*payload_offset, *size)?)
            }
            PackedRepr::Delta(chain) => odb.apply_chain(chain),
        },
    }
}
