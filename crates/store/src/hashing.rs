//! Content-address hashing for frozen entities.
//!
//! Grounded on the teacher's `xxhash-rust` dependency (already used
//! workspace-wide for fast non-cryptographic hashing); repurposed here as
//! the content-addressing hash rather than a checksum. A node's content id
//! is a pure function of its payload's bytes: the type name, field names,
//! and field values, with any nested entity replaced by *its own* content
//! id (already known, since the tree builder hashes bottom-up). Identity
//! fields (`lineage_id`, `prior_content_id`, ...) never enter the hash —
//! this is what makes storing an identical payload again a no-op (I3) and
//! what lets change detection skip identity fields entirely (§4.1).

use encr_core::{content_id_from_bytes, ContentId, ContainerKind, FieldValue, MapKey, Value};
use serde::Serialize;

#[derive(Serialize)]
enum HashKey {
    Index(usize),
    String(String),
}

impl From<&MapKey> for HashKey {
    fn from(k: &MapKey) -> Self {
        match k {
            MapKey::Index(i) => HashKey::Index(*i),
            MapKey::String(s) => HashKey::String(s.clone()),
        }
    }
}

/// A field value with entity members replaced by their already-known
/// content id. This is the shape that actually gets hashed.
#[derive(Serialize)]
enum HashField {
    Scalar(Value),
    EntityRef(ContentId),
    Sequence(Vec<HashField>),
    Mapping(Vec<(HashKey, HashField)>),
    Set(Vec<HashField>),
}

#[derive(Serialize)]
struct HashShape {
    type_name: &'static str,
    fields: Vec<(&'static str, HashField)>,
}

/// Resolve a [`FieldValue`] into its hashable shape. Entity members must
/// already carry a `content_id` (guaranteed by bottom-up processing in
/// [`crate::tree::TreeBuilder`]) — panics otherwise, since that would mean
/// the caller violated post-order traversal, a programming error internal
/// to this crate rather than a user-reachable condition.
fn hash_field(value: &FieldValue) -> HashField {
    match value {
        FieldValue::Scalar(v) => HashField::Scalar(v.clone()),
        FieldValue::Entity(e) => {
            let cid = e
                .content_id()
                .expect("entity must be content-addressed before its parent is hashed");
            HashField::EntityRef(cid)
        }
        FieldValue::Sequence(items) => HashField::Sequence(items.iter().map(hash_field).collect()),
        FieldValue::Set(items) => HashField::Set(items.iter().map(hash_field).collect()),
        FieldValue::Mapping(entries) => HashField::Mapping(
            entries.iter().map(|(k, v)| (HashKey::from(k), hash_field(v))).collect(),
        ),
    }
}

/// Compute the content id of one node given its type name and resolved
/// field values (in declaration order, nested entities already hashed).
pub fn content_id_for_node(type_name: &'static str, fields: &[(&'static str, FieldValue)]) -> ContentId {
    let shape = HashShape {
        type_name,
        fields: fields.iter().map(|(name, v)| (*name, hash_field(v))).collect(),
    };
    let bytes = bincode::serialize(&shape).expect("HashShape encoding is infallible");
    content_id_from_bytes(&bytes)
}

/// The container kind implied by a resolved field value, re-exported here
/// so the tree builder does not need a second import of `encr_core`'s
/// `ContainerKind` for this narrow use.
pub fn container_kind_of(value: &FieldValue) -> ContainerKind {
    value.container_kind()
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::Entity;
    use encr_core::EntityPayload;
    use encr_core::entity::test_support::Record;

    fn stamp(mut e: Entity) -> Entity {
        let cid = content_id_for_node(e.payload.type_name(), &[("text", e.payload.get_field("text").unwrap())]);
        e.identity.content_id = Some(cid);
        e
    }

    #[test]
    fn identical_payload_hashes_identically() {
        let a = stamp(Entity::new(Box::new(Record::new("hello"))));
        let b = stamp(Entity::new(Box::new(Record::new("hello"))));
        assert_eq!(a.content_id(), b.content_id());
    }

    #[test]
    fn different_payload_hashes_differently() {
        let a = stamp(Entity::new(Box::new(Record::new("hello"))));
        let b = stamp(Entity::new(Box::new(Record::new("world"))));
        assert_ne!(a.content_id(), b.content_id());
    }

    #[test]
    fn hash_is_independent_of_identity_fields() {
        let mut a = Entity::new(Box::new(Record::new("same")));
        let mut b = Entity::new(Box::new(Record::new("same")));
        a.identity.derived_from_function = Some("f".to_string());
        b.identity.derived_from_function = Some("g".to_string());
        let a = stamp(a);
        let b = stamp(b);
        assert_eq!(a.content_id(), b.content_id());
    }
}
