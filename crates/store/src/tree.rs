//! Tree Builder (C2): walks a live entity and produces a flattened,
//! content-addressed view of it.
//!
//! spec.md §4.2 describes the tree builder as a DFS walk that assigns
//! content ids bottom-up, rejects cycles, and annotates each parent→child
//! edge with the field name, container kind, and position it was found at.
//! This module does exactly that, but returns the result as an *owned*,
//! content-id-stamped `Entity` (nested entities still embedded in their
//! parent's payload) plus a flat `Vec<Edge>` describing the same tree —
//! the nested form is what the store persists; the flat form is what the
//! resolver (C3) and the store's indices walk.

use std::collections::HashMap;

use encr_core::{
    ContainerKind, ContentId, Entity, EncrError, EncrResult, EntityPayload, FieldValue, LineageId, Limits, MapKey,
};

use crate::hashing::content_id_for_node;

/// One parent→child edge in a built tree, annotated per §4.2.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Content id of the parent entity.
    pub parent_content_id: ContentId,
    /// Content id of the child entity.
    pub child_content_id: ContentId,
    /// Name of the payload field the child was found under.
    pub field_name: &'static str,
    /// Shape of the field the child was found in.
    pub container_kind: ContainerKind,
    /// Position within the field's container, if the container is ordered
    /// or keyed (`None` for a bare `ContainerKind::None` field).
    pub position: Option<MapKey>,
}

/// The result of building a tree from a freshly-constructed (not yet
/// committed) entity: a content-id-stamped, still-nested entity, plus the
/// flattened edge list and the lineage id of every member reached.
pub struct BuiltTree {
    /// The root entity, with `content_id` (but not yet `root_content_id`)
    /// stamped on every member.
    pub root: Entity,
    /// Every `(content_id, lineage_id)` reached, root included, in the
    /// order visited (post-order: children before their parent).
    pub members: Vec<(ContentId, LineageId)>,
    /// Every edge in the tree.
    pub edges: Vec<Edge>,
}

/// Walks and content-addresses an entity tree (C2).
pub struct TreeBuilder<'a> {
    limits: &'a Limits,
}

impl<'a> TreeBuilder<'a> {
    /// Construct a tree builder enforcing the given size/depth limits.
    pub fn new(limits: &'a Limits) -> Self {
        TreeBuilder { limits }
    }

    /// Walk `root`, assign content ids bottom-up, and stamp
    /// `root_content_id` on every member once the root's own id is known.
    pub fn build(&self, root: Entity) -> EncrResult<BuiltTree> {
        let mut ancestors = Vec::new();
        let mut members = Vec::new();
        let mut edges = Vec::new();
        let mut instance_to_content = HashMap::new();
        let mut stamped = self.process(root, &mut ancestors, 0, &mut members, &mut edges, &mut instance_to_content)?;

        let root_cid = stamped
            .content_id()
            .expect("process() always stamps content_id before returning");
        self.limits.validate_tree_size(members.len())?;
        stamp_root_content_id(&mut stamped, root_cid);
        for edge in &mut edges {
            // parent/child ids were already final content ids (computed
            // post-order); nothing left to resolve here, but we still walk
            // the list once to assert that invariant in debug builds.
            debug_assert!(instance_to_content.values().any(|c| *c == edge.parent_content_id));
        }

        Ok(BuiltTree {
            root: stamped,
            members,
            edges,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        mut entity: Entity,
        ancestors: &mut Vec<encr_core::InstanceId>,
        depth: usize,
        members: &mut Vec<(ContentId, LineageId)>,
        edges: &mut Vec<Edge>,
        instance_to_content: &mut HashMap<encr_core::InstanceId, ContentId>,
    ) -> EncrResult<Entity> {
        self.limits.validate_tree_depth(depth)?;
        let self_instance = entity.identity.instance_id;
        if ancestors.contains(&self_instance) {
            return Err(EncrError::cyclic_graph());
        }
        ancestors.push(self_instance);

        let type_name = entity.payload.type_name();
        let field_names: Vec<&'static str> = entity.payload.field_names().to_vec();
        let mut resolved_fields: Vec<(&'static str, FieldValue)> = Vec::with_capacity(field_names.len());

        for name in field_names {
            let Some(value) = entity.payload.get_field(name) else {
                continue;
            };
            validate_field_value(self.limits, &value)?;
            let new_value = if value.holds_entities() {
                self.process_field_value(value, name, ancestors, depth, members, edges, instance_to_content)?
            } else {
                value
            };
            entity
                .payload
                .set_field(name, new_value.clone())
                .map_err(|e| EncrError::bad_path(format!("rebuilding field `{name}`: {e}")))?;
            resolved_fields.push((name, new_value));
        }

        let content_id = content_id_for_node(type_name, &resolved_fields);
        entity.identity.content_id = Some(content_id);
        instance_to_content.insert(self_instance, content_id);
        members.push((content_id, entity.identity.lineage_id));

        ancestors.pop();
        Ok(entity)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_field_value(
        &self,
        value: FieldValue,
        field_name: &'static str,
        ancestors: &mut Vec<encr_core::InstanceId>,
        depth: usize,
        members: &mut Vec<(ContentId, LineageId)>,
        edges: &mut Vec<Edge>,
        instance_to_content: &mut HashMap<encr_core::InstanceId, ContentId>,
    ) -> EncrResult<FieldValue> {
        match value {
            FieldValue::Entity(child) => {
                let parent_instance = *ancestors.last().expect("process() pushes before recursing");
                let child = self.process(child, ancestors, depth + 1, members, edges, instance_to_content)?;
                let child_cid = child.content_id().expect("child was just stamped");
                let parent_cid = *instance_to_content
                    .get(&parent_instance)
                    .unwrap_or(&ContentId::from_raw(0));
                edges.push(Edge {
                    parent_content_id: parent_cid,
                    child_content_id: child_cid,
                    field_name,
                    container_kind: ContainerKind::None,
                    position: None,
                });
                Ok(FieldValue::Entity(child))
            }
            FieldValue::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.process_positional(
                        item,
                        field_name,
                        ContainerKind::Sequence,
                        MapKey::Index(i),
                        ancestors,
                        depth,
                        members,
                        edges,
                        instance_to_content,
                    )?);
                }
                Ok(FieldValue::Sequence(out))
            }
            FieldValue::Set(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.process_positional(
                        item,
                        field_name,
                        ContainerKind::Set,
                        MapKey::Index(i),
                        ancestors,
                        depth,
                        members,
                        edges,
                        instance_to_content,
                    )?);
                }
                Ok(FieldValue::Set(out))
            }
            FieldValue::Mapping(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, item) in entries.into_iter() {
                    let processed = self.process_positional(
                        item,
                        field_name,
                        ContainerKind::Mapping,
                        key.clone(),
                        ancestors,
                        depth,
                        members,
                        edges,
                        instance_to_content,
                    )?;
                    out.push((key, processed));
                }
                Ok(FieldValue::Mapping(out))
            }
            scalar @ FieldValue::Scalar(_) => Ok(scalar),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_positional(
        &self,
        item: FieldValue,
        field_name: &'static str,
        container_kind: ContainerKind,
        position: MapKey,
        ancestors: &mut Vec<encr_core::InstanceId>,
        depth: usize,
        members: &mut Vec<(ContentId, LineageId)>,
        edges: &mut Vec<Edge>,
        instance_to_content: &mut HashMap<encr_core::InstanceId, ContentId>,
    ) -> EncrResult<FieldValue> {
        match item {
            FieldValue::Entity(child) => {
                let parent_instance = *ancestors.last().expect("process() pushes before recursing");
                let child = self.process(child, ancestors, depth + 1, members, edges, instance_to_content)?;
                let child_cid = child.content_id().expect("child was just stamped");
                let parent_cid = *instance_to_content
                    .get(&parent_instance)
                    .unwrap_or(&ContentId::from_raw(0));
                edges.push(Edge {
                    parent_content_id: parent_cid,
                    child_content_id: child_cid,
                    field_name,
                    container_kind,
                    position: Some(position),
                });
                Ok(FieldValue::Entity(child))
            }
            other => self.process_field_value(other, field_name, ancestors, depth, members, edges, instance_to_content),
        }
    }
}

/// Validate a field value's scalar leaves and container sizes. Entity
/// members are skipped here — they carry their own depth/size bookkeeping
/// through the recursive `process` call that already guards them.
fn validate_field_value(limits: &Limits, value: &FieldValue) -> EncrResult<()> {
    match value {
        FieldValue::Scalar(v) => limits.validate_value(v).map_err(EncrError::from),
        FieldValue::Entity(_) => Ok(()),
        FieldValue::Sequence(items) | FieldValue::Set(items) => {
            if items.len() > limits.max_collection_len {
                return Err(encr_core::LimitError::ValueTooLarge {
                    reason: "container_too_long",
                    actual: items.len(),
                    max: limits.max_collection_len,
                }
                .into());
            }
            items.iter().try_for_each(|v| validate_field_value(limits, v))
        }
        FieldValue::Mapping(entries) => {
            if entries.len() > limits.max_collection_len {
                return Err(encr_core::LimitError::ValueTooLarge {
                    reason: "container_too_many_entries",
                    actual: entries.len(),
                    max: limits.max_collection_len,
                }
                .into());
            }
            entries.iter().try_for_each(|(_, v)| validate_field_value(limits, v))
        }
    }
}

/// After the root's content id is known, stamp it onto every member of the
/// now-nested, already-content-addressed tree (I2: every non-root entity's
/// `root_content_id` equals the tree root's `content_id`).
fn stamp_root_content_id(entity: &mut Entity, root_cid: ContentId) {
    entity.identity.root_content_id = Some(root_cid);
    let field_names: Vec<&'static str> = entity.payload.field_names().to_vec();
    for name in field_names {
        let Some(value) = entity.payload.get_field(name) else {
            continue;
        };
        if !value.holds_entities() {
            continue;
        }
        let stamped = stamp_field_value(value, root_cid);
        let _ = entity.payload.set_field(name, stamped);
    }
}

fn stamp_field_value(value: FieldValue, root_cid: ContentId) -> FieldValue {
    match value {
        FieldValue::Entity(mut e) => {
            stamp_root_content_id(&mut e, root_cid);
            FieldValue::Entity(e)
        }
        FieldValue::Sequence(items) => {
            FieldValue::Sequence(items.into_iter().map(|v| stamp_field_value(v, root_cid)).collect())
        }
        FieldValue::Set(items) => FieldValue::Set(items.into_iter().map(|v| stamp_field_value(v, root_cid)).collect()),
        FieldValue::Mapping(entries) => FieldValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k, stamp_field_value(v, root_cid)))
                .collect(),
        ),
        scalar @ FieldValue::Scalar(_) => scalar,
    }
}

/// Find a member entity by content id within an already-built (frozen)
/// tree, returning an owned copy (the store's "frozen copies are handed
/// out, never aliased" posture — see `EntityStore::get_frozen_member`).
pub fn find_member_owned(root: &Entity, target: ContentId) -> Option<Entity> {
    if root.content_id() == Some(target) {
        return Some(root.clone());
    }
    for name in root.payload.field_names() {
        if let Some(value) = root.payload.get_field(name) {
            if let Some(found) = find_member_in_field_value(&value, target) {
                return Some(found);
            }
        }
    }
    None
}

fn find_member_in_field_value(value: &FieldValue, target: ContentId) -> Option<Entity> {
    match value {
        FieldValue::Entity(e) => find_member_owned(e, target),
        FieldValue::Sequence(items) | FieldValue::Set(items) => {
            items.iter().find_map(|v| find_member_in_field_value(v, target))
        }
        FieldValue::Mapping(entries) => entries.iter().find_map(|(_, v)| find_member_in_field_value(v, target)),
        FieldValue::Scalar(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::entity::test_support::{Bag, Item, Record};

    #[test]
    fn single_entity_tree_has_one_member_and_no_edges() {
        let limits = Limits::for_testing();
        let builder = TreeBuilder::new(&limits);
        let built = builder.build(Entity::new(Box::new(Record::new("hello")))).unwrap();
        assert_eq!(built.members.len(), 1);
        assert!(built.edges.is_empty());
        assert_eq!(built.root.identity.root_content_id, built.root.content_id());
    }

    #[test]
    fn nested_tree_stamps_root_content_id_on_children() {
        let limits = Limits::for_testing();
        let builder = TreeBuilder::new(&limits);
        let item = Entity::new(Box::new(Item { label: "a".into() }));
        let bag = Entity::new(Box::new(Bag { items: vec![item] }));
        let built = builder.build(bag).unwrap();
        assert_eq!(built.members.len(), 2);
        assert_eq!(built.edges.len(), 1);
        let root_cid = built.root.content_id().unwrap();
        assert_eq!(built.edges[0].parent_content_id, root_cid);

        let FieldValue::Sequence(items) = built.root.payload.get_field("items").unwrap() else {
            panic!("expected sequence");
        };
        let FieldValue::Entity(child) = &items[0] else {
            panic!("expected entity");
        };
        assert_eq!(child.identity.root_content_id, Some(root_cid));
        assert_ne!(child.content_id(), Some(root_cid));
    }

    #[test]
    fn cyclic_self_reference_is_rejected() {
        let limits = Limits::for_testing();
        let builder = TreeBuilder::new(&limits);
        let mut bag = Entity::new(Box::new(Bag { items: Vec::new() }));
        let clone = bag.deep_copy_fresh_instance();
        // Force a cycle: give `bag` itself (with its original instance id)
        // as one of its own items.
        let cyclic_child = Entity {
            identity: bag.identity.clone(),
            payload: clone.payload,
        };
        bag.payload.set_field("items", FieldValue::Sequence(vec![FieldValue::Entity(cyclic_child)])).unwrap();
        let result = builder.build(bag);
        assert!(matches!(result, Err(EncrError::CyclicGraph { .. })));
    }

    #[test]
    fn identical_payloads_hash_to_the_same_content_id() {
        let limits = Limits::for_testing();
        let builder = TreeBuilder::new(&limits);
        let a = builder.build(Entity::new(Box::new(Record::new("x")))).unwrap();
        let b = builder.build(Entity::new(Box::new(Record::new("x")))).unwrap();
        assert_eq!(a.root.content_id(), b.root.content_id());
    }

    #[test]
    fn find_member_owned_locates_nested_entity_by_content_id() {
        let limits = Limits::for_testing();
        let builder = TreeBuilder::new(&limits);
        let item = Entity::new(Box::new(Item { label: "a".into() }));
        let bag = Entity::new(Box::new(Bag { items: vec![item] }));
        let built = builder.build(bag).unwrap();
        let FieldValue::Sequence(items) = built.root.payload.get_field("items").unwrap() else {
            panic!("expected sequence");
        };
        let FieldValue::Entity(child) = &items[0] else {
            panic!("expected entity");
        };
        let child_cid = child.content_id().unwrap();
        let found = find_member_owned(&built.root, child_cid).unwrap();
        assert_eq!(found.content_id(), Some(child_cid));
    }

    proptest::proptest! {
        /// P1: for a bag of any number of arbitrarily-labeled items, every
        /// member's `root_content_id` equals the tree root's `content_id`
        /// (I2), whatever the bag's size or the items' labels.
        #[test]
        fn every_member_root_content_id_matches_the_tree_root(labels in proptest::collection::vec(".{0,20}", 0..8)) {
            let limits = Limits::for_testing();
            let builder = TreeBuilder::new(&limits);
            let items: Vec<Entity> = labels.into_iter().map(|label| Entity::new(Box::new(Item { label }))).collect();
            let bag = Entity::new(Box::new(Bag { items }));
            let built = builder.build(bag).unwrap();
            let root_cid = built.root.content_id().unwrap();
            proptest::prop_assert_eq!(built.root.identity.root_content_id, Some(root_cid));

            let FieldValue::Sequence(items) = built.root.payload.get_field("items").unwrap() else {
                panic!("expected sequence");
            };
            for item in items {
                let FieldValue::Entity(child) = item else {
                    panic!("expected entity");
                };
                proptest::prop_assert_eq!(child.identity.root_content_id, Some(root_cid));
            }
        }
    }
}
