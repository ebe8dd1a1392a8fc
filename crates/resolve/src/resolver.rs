//! Address Resolver (C3): navigates a frozen entity tree by symbolic path.
//!
//! Grounded on the teacher's `EntityRef`-style universal addressing
//! (`crates/core/contract/entity_ref.rs`), generalized from a fixed set of
//! primitive kinds (kv/event/state/...) to arbitrary payload trees. The
//! navigation state machine below never lets a path step be interpreted as
//! both "field name" and "container position" at once — once a step
//! enters a container, every subsequent step is a position token, which is
//! what resolves the collision spec.md §9 flags between mapping keys and
//! attribute names.

use encr_core::{ContentId, Entity, EncrError, EncrResult, EntityPayload, FieldValue, MapKey};
use encr_store::EntityStore;

use crate::address::Address;

/// How a resolved path terminated (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// The path ends at the root of its tree.
    Entity,
    /// The path ends at a non-root entity within the resolved tree.
    SubEntity,
    /// The path ends at a non-entity payload value.
    FieldValue,
}

/// The result of resolving one address.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The path terminated at an entity (root or non-root).
    Entity {
        /// The resolved entity, a freshly-instanced frozen copy.
        entity: Entity,
        /// Content id of the tree root this entity belongs to.
        root_content_id: ContentId,
        /// Resolution mode: `Entity` if this *is* the root, else `SubEntity`.
        mode: ResolutionMode,
    },
    /// The path terminated at a scalar or a container of non-entity values.
    FieldValue {
        /// The resolved value.
        value: FieldValue,
        /// Content id of the entity whose payload directly holds this
        /// value — what the Input Composer (C5) records as provenance for
        /// an address-sourced field, per spec.md §3 ("the content id of
        /// the entity the value was read from").
        source_content_id: ContentId,
        /// Content id of the tree root this value was read from.
        root_content_id: ContentId,
    },
}

impl Resolved {
    /// Content id of the tree root this resolution depends on — this is
    /// what the Input Composer (C5) records as a dependency root.
    pub fn root_content_id(&self) -> ContentId {
        match self {
            Resolved::Entity { root_content_id, .. } => *root_content_id,
            Resolved::FieldValue { root_content_id, .. } => *root_content_id,
        }
    }
}

enum Cursor {
    Entity(Entity),
    Container { parent: Entity, field_name: String },
}

/// Resolves symbolic addresses against a store (C3).
pub struct AddressResolver<'a> {
    store: &'a EntityStore,
}

impl<'a> AddressResolver<'a> {
    /// Construct a resolver bound to a store.
    pub fn new(store: &'a EntityStore) -> Self {
        AddressResolver { store }
    }

    /// Resolve an address string, per spec.md §4.3: look up the
    /// referenced content id's root via `member_to_root`, fetch a frozen
    /// tree copy, then walk the path.
    pub fn resolve(&self, address: &str) -> EncrResult<Resolved> {
        let addr = Address::parse(address)?;
        self.resolve_parsed(&addr)
    }

    /// Resolve an already-parsed address.
    pub fn resolve_parsed(&self, addr: &Address) -> EncrResult<Resolved> {
        let root_content_id = self
            .store
            .root_of(addr.content_id)
            .ok_or_else(|| EncrError::not_found(format!("no entity with content id {}", addr.content_id)))?;
        let start = self
            .store
            .get_frozen(addr.content_id)
            .ok_or_else(|| EncrError::unknown(format!("content id {} vanished from the store", addr.content_id)))?;

        if addr.steps.is_empty() {
            let mode = if start.content_id() == Some(root_content_id) {
                ResolutionMode::Entity
            } else {
                ResolutionMode::SubEntity
            };
            return Ok(Resolved::Entity {
                entity: start,
                root_content_id,
                mode,
            });
        }

        let mut cursor = Cursor::Entity(start);
        let last_index = addr.steps.len() - 1;
        for (i, step) in addr.steps.iter().enumerate() {
            let is_last = i == last_index;
            cursor = match cursor {
                Cursor::Entity(entity) => {
                    let owner_cid = entity
                        .content_id()
                        .expect("frozen entities returned by the store are always content-addressed");
                    let value = entity
                        .payload
                        .get_field(step)
                        .ok_or_else(|| EncrError::bad_path(format!("no field `{step}` on {}", entity.payload.type_name())))?;
                    match value {
                        FieldValue::Entity(child) => Cursor::Entity(child),
                        FieldValue::Scalar(_) if is_last => {
                            return Ok(Resolved::FieldValue {
                                value,
                                source_content_id: owner_cid,
                                root_content_id,
                            });
                        }
                        FieldValue::Scalar(_) => {
                            return Err(EncrError::bad_path(format!("field `{step}` is a scalar, cannot navigate further")));
                        }
                        container if value_holds_only_scalars(&container) && is_last => {
                            return Ok(Resolved::FieldValue {
                                value: container,
                                source_content_id: owner_cid,
                                root_content_id,
                            });
                        }
                        _container => Cursor::Container {
                            parent: entity,
                            field_name: step.clone(),
                        },
                    }
                }
                Cursor::Container { parent, field_name } => {
                    let owner_cid = parent
                        .content_id()
                        .expect("frozen entities returned by the store are always content-addressed");
                    let container = parent
                        .payload
                        .get_field(&field_name)
                        .expect("field existed moments ago");
                    let navigated = navigate_container(&container, step)?;
                    match navigated {
                        FieldValue::Entity(child) => Cursor::Entity(child),
                        other if is_last => {
                            return Ok(Resolved::FieldValue {
                                value: other,
                                source_content_id: owner_cid,
                                root_content_id,
                            });
                        }
                        _ => return Err(EncrError::bad_path("cannot navigate further into a non-entity container element")),
                    }
                }
            };
        }

        match cursor {
            Cursor::Entity(entity) => {
                let mode = if entity.content_id() == Some(root_content_id) {
                    ResolutionMode::Entity
                } else {
                    ResolutionMode::SubEntity
                };
                Ok(Resolved::Entity {
                    entity,
                    root_content_id,
                    mode,
                })
            }
            Cursor::Container { .. } => Err(EncrError::bad_path("address ends mid-container; expected a position token")),
        }
    }
}

fn value_holds_only_scalars(value: &FieldValue) -> bool {
    !value.holds_entities()
}

fn navigate_container(container: &FieldValue, step: &str) -> EncrResult<FieldValue> {
    match container {
        FieldValue::Sequence(items) | FieldValue::Set(items) => {
            let idx: usize = step
                .parse()
                .map_err(|_| EncrError::bad_path(format!("expected an integer index, got `{step}`")))?;
            items
                .get(idx)
                .cloned()
                .ok_or_else(|| EncrError::not_found(format!("index {idx} out of range")))
        }
        FieldValue::Mapping(entries) => entries
            .iter()
            .find(|(k, _)| key_matches(k, step))
            .map(|(_, v)| v.clone())
            .ok_or_else(|| EncrError::not_found(format!("no mapping key `{step}`"))),
        FieldValue::Entity(_) | FieldValue::Scalar(_) => {
            Err(EncrError::bad_path("expected a container at this position"))
        }
    }
}

fn key_matches(key: &MapKey, step: &str) -> bool {
    match key {
        MapKey::String(s) => s == step,
        MapKey::Index(i) => i.to_string() == step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::entity::test_support::{Bag, Item, Record};
    use encr_core::Limits;

    fn store() -> EntityStore {
        EntityStore::new(Limits::for_testing())
    }

    #[test]
    fn resolves_bare_address_to_the_root_entity() {
        let store = store();
        let committed = store.put_root(Entity::new(Box::new(Record::new("hi")))).unwrap();
        let cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let resolved = resolver.resolve(&format!("@{cid}")).unwrap();
        match resolved {
            Resolved::Entity { mode, root_content_id, .. } => {
                assert_eq!(mode, ResolutionMode::Entity);
                assert_eq!(root_content_id, cid);
            }
            _ => panic!("expected entity resolution"),
        }
    }

    #[test]
    fn resolves_field_value_on_a_scalar_field() {
        let store = store();
        let committed = store.put_root(Entity::new(Box::new(Record::new("hello")))).unwrap();
        let cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let resolved = resolver.resolve(&format!("@{cid}.text")).unwrap();
        match resolved {
            Resolved::FieldValue { value, .. } => {
                assert!(matches!(value, FieldValue::Scalar(encr_core::Value::String(s)) if s == "hello"));
            }
            _ => panic!("expected field value resolution"),
        }
    }

    #[test]
    fn resolves_nested_sub_entity_by_sequence_index() {
        let store = store();
        let item = Entity::new(Box::new(Item { label: "a".into() }));
        let bag = Entity::new(Box::new(Bag { items: vec![item] }));
        let committed = store.put_root(bag).unwrap();
        let root_cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let resolved = resolver.resolve(&format!("@{root_cid}.items.0")).unwrap();
        match resolved {
            Resolved::Entity { mode, entity, .. } => {
                assert_eq!(mode, ResolutionMode::SubEntity);
                assert_eq!(entity.payload.type_name(), "Item");
            }
            _ => panic!("expected sub-entity resolution"),
        }
    }

    #[test]
    fn resolves_field_on_a_nested_sub_entity() {
        let store = store();
        let item = Entity::new(Box::new(Item { label: "a".into() }));
        let bag = Entity::new(Box::new(Bag { items: vec![item] }));
        let committed = store.put_root(bag).unwrap();
        let root_cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let resolved = resolver.resolve(&format!("@{root_cid}.items.0.label")).unwrap();
        match resolved {
            Resolved::FieldValue { value, .. } => {
                assert!(matches!(value, FieldValue::Scalar(encr_core::Value::String(s)) if s == "a"));
            }
            _ => panic!("expected field value resolution"),
        }
    }

    #[test]
    fn unknown_field_name_is_a_bad_path() {
        let store = store();
        let committed = store.put_root(Entity::new(Box::new(Record::new("hi")))).unwrap();
        let cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let err = resolver.resolve(&format!("@{cid}.nonexistent")).unwrap_err();
        assert!(matches!(err, EncrError::BadPath { .. }));
    }

    #[test]
    fn out_of_range_index_is_not_found() {
        let store = store();
        let bag = Entity::new(Box::new(Bag { items: Vec::new() }));
        let committed = store.put_root(bag).unwrap();
        let cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let err = resolver.resolve(&format!("@{cid}.items.0")).unwrap_err();
        assert!(matches!(err, EncrError::NotFound { .. }));
    }

    #[test]
    fn resolving_the_same_address_twice_yields_equal_results_and_no_mutation() {
        let store = store();
        let committed = store.put_root(Entity::new(Box::new(Record::new("hi")))).unwrap();
        let cid = committed.content_id().unwrap();
        let resolver = AddressResolver::new(&store);
        let before_len = store.len();
        let first = resolver.resolve(&format!("@{cid}.text")).unwrap();
        let second = resolver.resolve(&format!("@{cid}.text")).unwrap();
        assert_eq!(store.len(), before_len);
        match (first, second) {
            (Resolved::FieldValue { value: a, .. }, Resolved::FieldValue { value: b, .. }) => {
                assert!(matches!((a, b), (FieldValue::Scalar(x), FieldValue::Scalar(y)) if x == y));
            }
            _ => panic!("expected field value resolution both times"),
        }
    }
}
