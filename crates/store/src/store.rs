//! Entity Store (C1): the content-addressed home for every committed
//! entity tree.
//!
//! Grounded on the teacher's `strata_storage` unified storage layer in
//! shape (one struct owning the indices, guarded by a lock, with read
//! operations handing back owned copies rather than aliasing internal
//! state) but drastically simplified per spec.md §5: ENCR uses a single
//! store-wide mutex rather than the teacher's per-branch
//! `TransactionManager`, since the spec's concurrency model is "two
//! concurrent `invoke` calls against the same registry serialize on one
//! store-wide lock."
//!
//! Three indices, as named in spec.md §4.1:
//! - `by_content_id`: content id of a tree **root** → the frozen root tree.
//! - `member_to_root`: content id of *any* member (root or nested) → the
//!   content id of the root whose tree it belongs to.
//! - `by_lineage`: lineage id → ordered history of content ids committed
//!   under that lineage (oldest first).

use rustc_hash::FxHashMap;

use encr_core::{ContentId, Entity, EncrError, EncrResult, EntityPayload, LineageId, Limits};
use parking_lot::Mutex;

use crate::tree::{find_member_owned, TreeBuilder};

struct StoreState {
    by_content_id: FxHashMap<ContentId, Entity>,
    member_to_root: FxHashMap<ContentId, ContentId>,
    by_lineage: FxHashMap<LineageId, Vec<ContentId>>,
}

impl StoreState {
    fn new() -> Self {
        StoreState {
            by_content_id: FxHashMap::default(),
            member_to_root: FxHashMap::default(),
            by_lineage: FxHashMap::default(),
        }
    }
}

/// The content-addressed entity store (C1).
///
/// All mutating and reading operations go through a single
/// `parking_lot::Mutex`, matching the store-wide serialization point
/// described in spec.md §5 (locked between step 3 and step 10 of the
/// executor's `invoke` sequence).
pub struct EntityStore {
    state: Mutex<StoreState>,
    limits: Limits,
}

impl EntityStore {
    /// Construct an empty store enforcing the given limits.
    pub fn new(limits: Limits) -> Self {
        EntityStore {
            state: Mutex::new(StoreState::new()),
            limits,
        }
    }

    /// Commit a freshly-built entity (no prior committed version) as a new
    /// tree root.
    ///
    /// Content-addresses every member bottom-up (C2). If a tree with the
    /// same root payload bytes is already stored, returns the existing
    /// stored version unchanged (P2: "two `put_root` calls with the same
    /// frozen payload return the same content id and leave the store
    /// unchanged on the second call") rather than fabricating a second
    /// lineage for identical content.
    pub fn put_root(&self, root: Entity) -> EncrResult<Entity> {
        let built = TreeBuilder::new(&self.limits).build(root)?;
        let root_cid = built
            .root
            .content_id()
            .expect("TreeBuilder::build always stamps a content id");

        let mut state = self.state.lock();
        if let Some(existing) = state.by_content_id.get(&root_cid) {
            return Ok(existing.deep_copy_fresh_instance());
        }

        state.by_content_id.insert(root_cid, built.root.clone());
        for (member_cid, lineage_id) in &built.members {
            state.member_to_root.insert(*member_cid, root_cid);
            let history = state.by_lineage.entry(*lineage_id).or_default();
            if history.last() != Some(member_cid) {
                history.push(*member_cid);
            }
        }
        drop(state);
        Ok(built.root.deep_copy_fresh_instance())
    }

    /// Commit a mutated working copy as a new version of the root it was
    /// deep-copied from.
    ///
    /// `mutated` must carry identity fields inherited from a prior
    /// `get_frozen`/`get_frozen_member` call (i.e. `identity.content_id`
    /// names the previously committed version of the same lineage). Change
    /// detection (§4.1) is implicit: content ids are a pure function of
    /// payload bytes, so an unchanged subtree re-hashes to its old content
    /// id automatically, and only genuinely different members receive a
    /// fresh content id with `prior_content_id` pointing at what they
    /// replaced.
    pub fn version(&self, mutated: Entity) -> EncrResult<Entity> {
        let old_root_cid = mutated.identity.content_id.ok_or_else(|| {
            EncrError::invariant_violation("version() requires a working copy derived from a committed entity")
        })?;

        let mut state = self.state.lock();
        let old_root = state
            .by_content_id
            .get(&old_root_cid)
            .cloned()
            .ok_or_else(|| EncrError::not_found(format!("no committed tree for content id {old_root_cid}")))?;

        let mut old_by_lineage = FxHashMap::default();
        collect_lineage_map(&old_root, &mut old_by_lineage);

        let built = TreeBuilder::new(&self.limits).build(mutated)?;
        let new_root_cid = built
            .root
            .content_id()
            .expect("TreeBuilder::build always stamps a content id");

        if new_root_cid == old_root_cid {
            return Ok(old_root.deep_copy_fresh_instance());
        }

        let mut new_root = built.root;
        stamp_prior_content_ids(&mut new_root, &old_by_lineage);

        state.by_content_id.insert(new_root_cid, new_root.clone());
        for (member_cid, lineage_id) in &built.members {
            state.member_to_root.insert(*member_cid, new_root_cid);
            let history = state.by_lineage.entry(*lineage_id).or_default();
            if history.last() != Some(member_cid) {
                history.push(*member_cid);
            }
        }
        drop(state);
        Ok(new_root.deep_copy_fresh_instance())
    }

    /// Fetch a read-only, freshly-instanced copy of any committed entity
    /// (root or nested member) by its content id.
    pub fn get_frozen(&self, content_id: ContentId) -> Option<Entity> {
        let state = self.state.lock();
        if let Some(root) = state.by_content_id.get(&content_id) {
            return Some(root.deep_copy_fresh_instance());
        }
        let root_cid = *state.member_to_root.get(&content_id)?;
        let root = state.by_content_id.get(&root_cid)?;
        find_member_owned(root, content_id).map(|e| e.deep_copy_fresh_instance())
    }

    /// Fetch a read-only, freshly-instanced copy of a member known to
    /// belong to a specific root, without needing `member_to_root` to
    /// already be populated under `member_id` (useful when the caller
    /// already resolved the root via an address and just needs the leaf).
    pub fn get_frozen_member(&self, root_id: ContentId, member_id: ContentId) -> Option<Entity> {
        let state = self.state.lock();
        let root = state.by_content_id.get(&root_id)?;
        find_member_owned(root, member_id).map(|e| e.deep_copy_fresh_instance())
    }

    /// The content id this member belongs to, if it is known to the store.
    pub fn root_of(&self, content_id: ContentId) -> Option<ContentId> {
        let state = self.state.lock();
        if state.by_content_id.contains_key(&content_id) {
            return Some(content_id);
        }
        state.member_to_root.get(&content_id).copied()
    }

    /// Ordered version history for a lineage, oldest first. Empty if the
    /// lineage has never been committed.
    pub fn history(&self, lineage_id: LineageId) -> Vec<ContentId> {
        self.state.lock().by_lineage.get(&lineage_id).cloned().unwrap_or_default()
    }

    /// Number of distinct roots committed to the store.
    pub fn len(&self) -> usize {
        self.state.lock().by_content_id.len()
    }

    /// `true` if the store has no committed roots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if `content_id` names a committed root or member.
    pub fn contains(&self, content_id: ContentId) -> bool {
        let state = self.state.lock();
        state.by_content_id.contains_key(&content_id) || state.member_to_root.contains_key(&content_id)
    }

    /// Content ids of every committed root, in no particular order.
    pub fn roots(&self) -> Vec<ContentId> {
        self.state.lock().by_content_id.keys().copied().collect()
    }

    /// Stamp execution-linkage identity fields onto an already-committed
    /// root in place, without re-running change detection.
    ///
    /// Used by the executor (C6 §4.6 step 9, "link") once every primary of
    /// a call has been committed and its final content id is known: siblings
    /// are only nameable by content id after every one of them exists, which
    /// is necessarily after the commit these fields describe. Safe because
    /// content ids are computed from payload bytes alone (DESIGN.md), so
    /// updating these identity-only fields never changes `content_id` and
    /// never requires a new version.
    pub fn stamp_execution_metadata(
        &self,
        content_id: ContentId,
        function_name: &str,
        execution_id: encr_core::ExecutionId,
        output_index: Option<usize>,
        sibling_ids: Vec<ContentId>,
    ) -> EncrResult<Entity> {
        let mut state = self.state.lock();
        let root = state
            .by_content_id
            .get_mut(&content_id)
            .ok_or_else(|| EncrError::not_found(format!("no committed root for content id {content_id}")))?;
        root.identity.derived_from_function = Some(function_name.to_string());
        root.identity.derived_from_execution = Some(execution_id);
        root.identity.output_index = output_index;
        root.identity.sibling_ids = sibling_ids;
        Ok(root.deep_copy_fresh_instance())
    }
}

fn collect_lineage_map(entity: &Entity, map: &mut FxHashMap<LineageId, ContentId>) {
    if let Some(cid) = entity.content_id() {
        map.insert(entity.lineage_id(), cid);
    }
    for name in entity.payload.field_names() {
        if let Some(value) = entity.payload.get_field(name) {
            collect_lineage_map_from_field(&value, map);
        }
    }
}

fn collect_lineage_map_from_field(value: &encr_core::FieldValue, map: &mut FxHashMap<LineageId, ContentId>) {
    use encr_core::FieldValue;
    match value {
        FieldValue::Entity(e) => collect_lineage_map(e, map),
        FieldValue::Sequence(items) | FieldValue::Set(items) => {
            items.iter().for_each(|v| collect_lineage_map_from_field(v, map))
        }
        FieldValue::Mapping(entries) => entries.iter().for_each(|(_, v)| collect_lineage_map_from_field(v, map)),
        FieldValue::Scalar(_) => {}
    }
}

fn stamp_prior_content_ids(entity: &mut Entity, old_by_lineage: &FxHashMap<LineageId, ContentId>) {
    if let Some(old_cid) = old_by_lineage.get(&entity.lineage_id()) {
        if Some(*old_cid) != entity.content_id() {
            entity.identity.prior_content_id = Some(*old_cid);
        }
    }
    let field_names: Vec<&'static str> = entity.payload.field_names().to_vec();
    for name in field_names {
        let Some(value) = entity.payload.get_field(name) else {
            continue;
        };
        if !value.holds_entities() {
            continue;
        }
        let stamped = stamp_prior_in_field(value, old_by_lineage);
        let _ = entity.payload.set_field(name, stamped);
    }
}

fn stamp_prior_in_field(
    value: encr_core::FieldValue,
    old_by_lineage: &FxHashMap<LineageId, ContentId>,
) -> encr_core::FieldValue {
    use encr_core::FieldValue;
    match value {
        FieldValue::Entity(mut e) => {
            stamp_prior_content_ids(&mut e, old_by_lineage);
            FieldValue::Entity(e)
        }
        FieldValue::Sequence(items) => {
            FieldValue::Sequence(items.into_iter().map(|v| stamp_prior_in_field(v, old_by_lineage)).collect())
        }
        FieldValue::Set(items) => {
            FieldValue::Set(items.into_iter().map(|v| stamp_prior_in_field(v, old_by_lineage)).collect())
        }
        FieldValue::Mapping(entries) => FieldValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k, stamp_prior_in_field(v, old_by_lineage)))
                .collect(),
        ),
        scalar @ FieldValue::Scalar(_) => scalar,
    }
}
