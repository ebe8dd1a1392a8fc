//! The entity model: identity fields, payload trait, and the container
//! shapes a payload field can take.
//!
//! This module implements the data model of spec.md §3. It deliberately
//! stops short of any data-class/validation machinery (§1 names that as an
//! external collaborator): [`EntityPayload`] is a trait embedders implement
//! by hand for their own record types, the same way the host language's
//! "data-class machinery" is assumed to exist outside the engine in the
//! original spec.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ContentId, ExecutionId, InstanceId, LineageId};
use crate::value::Value;
use crate::EncrError;

/// How a field's value is held in its parent's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// The field directly holds one value (scalar or single entity).
    None,
    /// The field holds an ordered sequence.
    Sequence,
    /// The field holds a keyed mapping.
    Mapping,
    /// The field holds an unordered set.
    Set,
}

/// A key used to address an element inside a sequence, mapping, or set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapKey {
    /// Sequence index or set member index.
    Index(usize),
    /// Mapping key.
    String(String),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Index(i) => write!(f, "{i}"),
            MapKey::String(s) => write!(f, "{s}"),
        }
    }
}

/// The value held by one payload field: a scalar, a single entity, or a
/// container of either.
///
/// Containers are homogeneous in practice (either all-entity or
/// all-scalar) but the type does not enforce that; the tree builder (C2,
/// in `encr-store`) is what walks `Entity` members out of a `FieldValue`
/// and would reject a cyclic or malformed shape, not this type.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A non-entity scalar or structured-scalar value.
    Scalar(Value),
    /// A single entity reference.
    Entity(Entity),
    /// An ordered sequence of field values.
    Sequence(Vec<FieldValue>),
    /// A keyed mapping of field values.
    Mapping(Vec<(MapKey, FieldValue)>),
    /// An unordered set of field values, represented as a vector for
    /// deterministic iteration order (insertion order).
    Set(Vec<FieldValue>),
}

impl FieldValue {
    /// The container kind this field value represents.
    pub fn container_kind(&self) -> ContainerKind {
        match self {
            FieldValue::Scalar(_) | FieldValue::Entity(_) => ContainerKind::None,
            FieldValue::Sequence(_) => ContainerKind::Sequence,
            FieldValue::Mapping(_) => ContainerKind::Mapping,
            FieldValue::Set(_) => ContainerKind::Set,
        }
    }

    /// `true` if this field value is, or contains, at least one entity.
    pub fn holds_entities(&self) -> bool {
        match self {
            FieldValue::Scalar(_) => false,
            FieldValue::Entity(_) => true,
            FieldValue::Sequence(items) | FieldValue::Set(items) => {
                items.iter().any(FieldValue::holds_entities)
            }
            FieldValue::Mapping(entries) => entries.iter().any(|(_, v)| v.holds_entities()),
        }
    }
}

/// Where a field's value came from, mirroring the shape of the field
/// itself (I5: "provenance for container payloads mirrors the container's
/// shape").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Provenance {
    /// Produced locally by the call; no upstream source.
    Local,
    /// Read from the given source entity's content id.
    Source(ContentId),
    /// A container whose elements each carry their own provenance.
    Container(Vec<(MapKey, Provenance)>),
}

/// Per-entity provenance: a subset of payload field names mapped to where
/// their values came from (I5). Absent keys mean "produced locally", same
/// as an explicit [`Provenance::Local`] — callers may use either, and the
/// tree-diffing/display paths treat them identically.
pub type ProvenanceMap = HashMap<String, Provenance>;

/// Runtime-managed identity fields of one entity instance (§3).
#[derive(Debug, Clone)]
pub struct Identity {
    /// Opaque immutable handle of this specific version, assigned at
    /// commit time. `None` for a working copy that has not yet been
    /// committed to the store.
    pub content_id: Option<ContentId>,
    /// Handle of this in-memory object; fresh on every deep copy.
    pub instance_id: InstanceId,
    /// Shared across all versions descended from the same original.
    pub lineage_id: LineageId,
    /// The content id this version was derived from, if any.
    pub prior_content_id: Option<ContentId>,
    /// Content id of the root of the tree this entity currently belongs
    /// to. Equal to `content_id` iff this entity is itself a root.
    pub root_content_id: Option<ContentId>,
    /// Field-name to provenance mapping (I5).
    pub provenance_map: ProvenanceMap,
    /// Name of the function whose call produced this version, if any.
    pub derived_from_function: Option<String>,
    /// Execution id of the call that produced this version, if any.
    pub derived_from_execution: Option<ExecutionId>,
    /// Content ids of sibling entities unpacked from the same call.
    pub sibling_ids: Vec<ContentId>,
    /// Position among siblings from the same call, if any.
    pub output_index: Option<usize>,
}

impl Identity {
    /// A fresh identity for a brand-new lineage (used on creation).
    pub fn new_lineage() -> Self {
        Identity {
            content_id: None,
            instance_id: crate::ids::IDS.next_instance(),
            lineage_id: crate::ids::IDS.next_lineage(),
            prior_content_id: None,
            root_content_id: None,
            provenance_map: ProvenanceMap::new(),
            derived_from_function: None,
            derived_from_execution: None,
            sibling_ids: Vec::new(),
            output_index: None,
        }
    }

    /// `true` if this identity, at its last commit, was a tree root.
    pub fn is_root(&self) -> bool {
        match (self.content_id, self.root_content_id) {
            (Some(c), Some(r)) => c == r,
            _ => false,
        }
    }
}

/// A tracked object: identity fields managed by the runtime plus a payload
/// defined by the embedder's schema.
pub struct Entity {
    /// Runtime-managed identity fields.
    pub identity: Identity,
    /// The embedder-defined payload.
    pub payload: Box<dyn EntityPayload>,
}

impl Entity {
    /// Wrap a freshly-created payload as a brand-new lineage.
    pub fn new(payload: Box<dyn EntityPayload>) -> Self {
        Entity {
            identity: Identity::new_lineage(),
            payload,
        }
    }

    /// The entity's content id, if it has been committed.
    pub fn content_id(&self) -> Option<ContentId> {
        self.identity.content_id
    }

    /// The entity's lineage id.
    pub fn lineage_id(&self) -> LineageId {
        self.identity.lineage_id
    }

    /// Deep-copy this entity with a fresh [`InstanceId`] throughout,
    /// including nested entities reachable through the payload. Identity
    /// fields other than `instance_id` are preserved verbatim.
    pub fn deep_copy_fresh_instance(&self) -> Entity {
        let mut payload = self.payload.clone_box();
        refresh_instance_ids_in_payload(payload.as_mut());
        let mut identity = self.identity.clone();
        identity.instance_id = crate::ids::IDS.next_instance();
        Entity { identity, payload }
    }
}

impl Clone for Entity {
    fn clone(&self) -> Self {
        Entity {
            identity: self.identity.clone(),
            payload: self.payload.clone_box(),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type_name", &self.payload.type_name())
            .field("content_id", &self.identity.content_id)
            .field("instance_id", &self.identity.instance_id)
            .field("lineage_id", &self.identity.lineage_id)
            .finish()
    }
}

fn refresh_instance_ids_in_payload(payload: &mut dyn EntityPayload) {
    let fields: Vec<String> = payload.field_names().iter().map(|s| s.to_string()).collect();
    for name in fields {
        if let Some(value) = payload.get_field(&name) {
            if value.holds_entities() {
                let refreshed = refresh_field_value(value);
                let _ = payload.set_field(&name, refreshed);
            }
        }
    }
}

fn refresh_field_value(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Entity(mut e) => {
            refresh_instance_ids_in_payload(e.payload.as_mut());
            e.identity.instance_id = crate::ids::IDS.next_instance();
            FieldValue::Entity(e)
        }
        FieldValue::Sequence(items) => {
            FieldValue::Sequence(items.into_iter().map(refresh_field_value).collect())
        }
        FieldValue::Set(items) => FieldValue::Set(items.into_iter().map(refresh_field_value).collect()),
        FieldValue::Mapping(entries) => FieldValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k, refresh_field_value(v)))
                .collect(),
        ),
        scalar @ FieldValue::Scalar(_) => scalar,
    }
}

/// The trait an embedder implements for each entity payload type.
///
/// This is the seam named in SPEC_FULL.md §1: the engine defines the
/// boundary (field enumeration, typed get/set, equality ignoring identity
/// fields, and cloning) but never the derive/validation logic behind it —
/// that is the host-language data-class machinery spec.md §1 places out of
/// scope.
pub trait EntityPayload: Send + Sync {
    /// Stable name for this payload type, used in diagnostics and as the
    /// type tag consulted by the signature analyzer (C4).
    fn type_name(&self) -> &'static str;

    /// The payload's field names, in a stable declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// Read one field's current value, or `None` if `name` is not a field
    /// of this payload.
    fn get_field(&self, name: &str) -> Option<FieldValue>;

    /// Overwrite one field's value.
    ///
    /// # Errors
    ///
    /// Returns [`EncrError::BadPath`] if `name` is not a field of this
    /// payload or if `value`'s shape is incompatible with the field.
    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError>;

    /// Deep-clone this payload as a trait object. Implementors with a
    /// `#[derive(Clone)]` struct typically write `Box::new(self.clone())`.
    fn clone_box(&self) -> Box<dyn EntityPayload>;

    /// Structural equality ignoring identity fields — used by the entity
    /// store's change detection (§4.1: "compares field values deeply but
    /// skips identity fields").
    fn payload_eq(&self, other: &dyn EntityPayload) -> bool;
}

/// Marker for payload types that back a configuration entity (§3,
/// "Configuration entity"): a bundle of primitive parameters, tracked
/// identically to any other entity but distinguished at the type level so
/// the signature analyzer (C4, in `encr-signature`) can recognize a
/// top-level `config`-kind parameter. Carries no methods of its own —
/// everything a configuration entity needs is already on [`EntityPayload`].
pub trait ConfigPayload: EntityPayload {}

impl Clone for Box<dyn EntityPayload> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}

impl fmt::Debug for dyn EntityPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.type_name()).finish_non_exhaustive()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! A minimal `EntityPayload` implementation reused by tests across the
    //! workspace so every crate does not need to hand-roll one.
    use super::*;

    /// A record with a single string field, used as the default test
    /// fixture in scenarios S1/S2 of spec.md §8.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Record {
        /// The record's sole payload field.
        pub text: String,
    }

    impl Record {
        /// Construct a record.
        pub fn new(text: impl Into<String>) -> Self {
            Record { text: text.into() }
        }
    }

    impl EntityPayload for Record {
        fn type_name(&self) -> &'static str {
            "Record"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["text"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "text" => Some(FieldValue::Scalar(Value::String(self.text.clone()))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("text", FieldValue::Scalar(Value::String(s))) => {
                    self.text = s;
                    Ok(())
                }
                ("text", _) => Err(EncrError::bad_path("Record.text expects a string scalar")),
                _ => Err(EncrError::bad_path(format!("Record has no field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("text")
                .map(|v| matches!(v, FieldValue::Scalar(Value::String(s)) if s == self.text))
                .unwrap_or(false)
                && other.type_name() == self.type_name()
        }
    }

    /// A counter record, used in scenario S2 (single-entity mutation).
    #[derive(Debug, Clone, PartialEq)]
    pub struct Counter {
        /// Current count.
        pub n: i64,
    }

    impl EntityPayload for Counter {
        fn type_name(&self) -> &'static str {
            "Counter"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["n"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "n" => Some(FieldValue::Scalar(Value::Int(self.n))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("n", FieldValue::Scalar(Value::Int(v))) => {
                    self.n = v;
                    Ok(())
                }
                ("n", _) => Err(EncrError::bad_path("Counter.n expects an int scalar")),
                _ => Err(EncrError::bad_path(format!("Counter has no field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("n")
                .map(|v| matches!(v, FieldValue::Scalar(Value::Int(n)) if n == self.n))
                .unwrap_or(false)
        }
    }

    /// A bag holding a sequence of `Item` entities, used in scenario S3
    /// (detachment).
    #[derive(Debug, Clone)]
    pub struct Bag {
        /// Nested item entities.
        pub items: Vec<Entity>,
    }

    impl EntityPayload for Bag {
        fn type_name(&self) -> &'static str {
            "Bag"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["items"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "items" => Some(FieldValue::Sequence(
                    self.items.iter().cloned().map(FieldValue::Entity).collect(),
                )),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("items", FieldValue::Sequence(items)) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            FieldValue::Entity(e) => out.push(e),
                            _ => return Err(EncrError::bad_path("Bag.items expects entities")),
                        }
                    }
                    self.items = out;
                    Ok(())
                }
                ("items", _) => Err(EncrError::bad_path("Bag.items expects a sequence")),
                _ => Err(EncrError::bad_path(format!("Bag has no field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            let Some(FieldValue::Sequence(other_items)) = other.get_field("items") else {
                return false;
            };
            if other_items.len() != self.items.len() {
                return false;
            }
            self.items.iter().zip(other_items.iter()).all(|(a, b)| match b {
                FieldValue::Entity(b) => a.payload.payload_eq(b.payload.as_ref()),
                _ => false,
            })
        }
    }

    /// A configuration entity used in scenario S4 (multi-entity unpacking).
    #[derive(Debug, Clone, PartialEq)]
    pub struct Cfg {
        /// The configured threshold.
        pub threshold: f64,
    }

    impl EntityPayload for Cfg {
        fn type_name(&self) -> &'static str {
            "Cfg"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["threshold"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "threshold" => Some(FieldValue::Scalar(Value::Float(self.threshold))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("threshold", FieldValue::Scalar(Value::Float(f))) => {
                    self.threshold = f;
                    Ok(())
                }
                ("threshold", _) => Err(EncrError::bad_path("Cfg.threshold expects a float scalar")),
                _ => Err(EncrError::bad_path(format!("Cfg has no field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("threshold")
                .map(|v| matches!(v, FieldValue::Scalar(Value::Float(f)) if f == self.threshold))
                .unwrap_or(false)
        }
    }

    impl ConfigPayload for Cfg {}

    /// A single-field wrapper used as an `Item` entity in scenario S3.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Item {
        /// The item's label.
        pub label: String,
    }

    impl EntityPayload for Item {
        fn type_name(&self) -> &'static str {
            "Item"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["label"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "label" => Some(FieldValue::Scalar(Value::String(self.label.clone()))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("label", FieldValue::Scalar(Value::String(s))) => {
                    self.label = s;
                    Ok(())
                }
                _ => Err(EncrError::bad_path(format!("Item has no settable field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("label")
                .map(|v| matches!(v, FieldValue::Scalar(Value::String(s)) if s == self.label))
                .unwrap_or(false)
        }
    }

    /// A numeric operand, used in scenario S5 (failing call).
    #[derive(Debug, Clone, PartialEq)]
    pub struct Num {
        /// The wrapped value.
        pub v: i64,
    }

    impl EntityPayload for Num {
        fn type_name(&self) -> &'static str {
            "Num"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["v"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "v" => Some(FieldValue::Scalar(Value::Int(self.v))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("v", FieldValue::Scalar(Value::Int(i))) => {
                    self.v = i;
                    Ok(())
                }
                _ => Err(EncrError::bad_path(format!("Num has no settable field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("v")
                .map(|v| matches!(v, FieldValue::Scalar(Value::Int(i)) if i == self.v))
                .unwrap_or(false)
        }
    }

    /// A student record, used as the single-entity input in scenario S4
    /// (multi-entity unpacking).
    #[derive(Debug, Clone, PartialEq)]
    pub struct Student {
        /// The student's name.
        pub name: String,
        /// Raw grade values to analyze.
        pub grades: Vec<i64>,
    }

    impl EntityPayload for Student {
        fn type_name(&self) -> &'static str {
            "Student"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["name", "grades"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "name" => Some(FieldValue::Scalar(Value::String(self.name.clone()))),
                "grades" => Some(FieldValue::Scalar(Value::Array(
                    self.grades.iter().map(|g| Value::Int(*g)).collect(),
                ))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("name", FieldValue::Scalar(Value::String(s))) => {
                    self.name = s;
                    Ok(())
                }
                ("grades", FieldValue::Scalar(Value::Array(items))) => {
                    self.grades = items
                        .into_iter()
                        .map(|v| match v {
                            Value::Int(i) => Ok(i),
                            _ => Err(EncrError::bad_path("Student.grades expects an array of ints")),
                        })
                        .collect::<Result<_, _>>()?;
                    Ok(())
                }
                _ => Err(EncrError::bad_path(format!("Student has no settable field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            let name_matches = matches!(
                other.get_field("name"),
                Some(FieldValue::Scalar(Value::String(ref s))) if *s == self.name
            );
            let grades_match = matches!(
                other.get_field("grades"),
                Some(FieldValue::Scalar(Value::Array(ref items)))
                    if items.len() == self.grades.len()
                        && items.iter().zip(self.grades.iter()).all(|(v, g)| matches!(v, Value::Int(i) if i == g))
            );
            name_matches && grades_match
        }
    }

    /// One analysis result, part of the tuple return of scenario S4.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Analysis {
        /// Mean of the analyzed grades.
        pub mean: f64,
    }

    impl EntityPayload for Analysis {
        fn type_name(&self) -> &'static str {
            "Analysis"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["mean"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "mean" => Some(FieldValue::Scalar(Value::Float(self.mean))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("mean", FieldValue::Scalar(Value::Float(f))) => {
                    self.mean = f;
                    Ok(())
                }
                _ => Err(EncrError::bad_path(format!("Analysis has no settable field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("mean")
                .map(|v| matches!(v, FieldValue::Scalar(Value::Float(f)) if f == self.mean))
                .unwrap_or(false)
        }
    }

    /// One flagged-grade record, part of the `list[Rec]` return slot of
    /// scenario S4.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Rec {
        /// The flagged grade value.
        pub grade: i64,
    }

    impl EntityPayload for Rec {
        fn type_name(&self) -> &'static str {
            "Rec"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["grade"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "grade" => Some(FieldValue::Scalar(Value::Int(self.grade))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("grade", FieldValue::Scalar(Value::Int(i))) => {
                    self.grade = i;
                    Ok(())
                }
                _ => Err(EncrError::bad_path(format!("Rec has no settable field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("grade")
                .map(|v| matches!(v, FieldValue::Scalar(Value::Int(i)) if i == self.grade))
                .unwrap_or(false)
        }
    }

    /// Final metrics slot of scenario S4's three-way tuple return.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Metrics {
        /// Count of grades above the configured threshold.
        pub above_threshold: i64,
    }

    impl EntityPayload for Metrics {
        fn type_name(&self) -> &'static str {
            "Metrics"
        }

        fn field_names(&self) -> &'static [&'static str] {
            &["above_threshold"]
        }

        fn get_field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "above_threshold" => Some(FieldValue::Scalar(Value::Int(self.above_threshold))),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
            match (name, value) {
                ("above_threshold", FieldValue::Scalar(Value::Int(i))) => {
                    self.above_threshold = i;
                    Ok(())
                }
                _ => Err(EncrError::bad_path(format!("Metrics has no settable field `{name}`"))),
            }
        }

        fn clone_box(&self) -> Box<dyn EntityPayload> {
            Box::new(self.clone())
        }

        fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
            other
                .get_field("above_threshold")
                .map(|v| matches!(v, FieldValue::Scalar(Value::Int(i)) if i == self.above_threshold))
                .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn new_entity_has_no_content_id_and_no_prior() {
        let e = Entity::new(Box::new(Record::new("hello")));
        assert!(e.content_id().is_none());
        assert!(e.identity.prior_content_id.is_none());
    }

    #[test]
    fn deep_copy_preserves_payload_but_refreshes_instance_id() {
        let e = Entity::new(Box::new(Record::new("hello")));
        let copy = e.deep_copy_fresh_instance();
        assert_ne!(e.identity.instance_id, copy.identity.instance_id);
        assert_eq!(e.identity.lineage_id, copy.identity.lineage_id);
        assert!(e.payload.payload_eq(copy.payload.as_ref()));
    }

    #[test]
    fn deep_copy_refreshes_nested_entity_instance_ids() {
        let item = Entity::new(Box::new(Item { label: "a".into() }));
        let bag = Entity::new(Box::new(Bag { items: vec![item.clone()] }));
        let copy = bag.deep_copy_fresh_instance();
        let Some(FieldValue::Sequence(items)) = copy.payload.get_field("items") else {
            panic!("expected sequence");
        };
        let FieldValue::Entity(copied_item) = &items[0] else {
            panic!("expected entity");
        };
        assert_ne!(copied_item.identity.instance_id, item.identity.instance_id);
    }

    #[test]
    fn payload_eq_ignores_identity_fields() {
        let a = Record::new("same");
        let b = Record::new("same");
        assert!(a.payload_eq(&b));
        let c = Record::new("different");
        assert!(!a.payload_eq(&c));
    }

    #[test]
    fn field_value_holds_entities_detects_nested_entities() {
        let scalar = FieldValue::Scalar(Value::Int(1));
        assert!(!scalar.holds_entities());
        let seq = FieldValue::Sequence(vec![FieldValue::Entity(Entity::new(Box::new(Record::new("x"))))]);
        assert!(seq.holds_entities());
    }

    #[test]
    fn is_root_requires_matching_content_and_root_ids() {
        let mut identity = Identity::new_lineage();
        assert!(!identity.is_root());
        identity.content_id = Some(ContentId::from_raw(1));
        identity.root_content_id = Some(ContentId::from_raw(1));
        assert!(identity.is_root());
        identity.root_content_id = Some(ContentId::from_raw(2));
        assert!(!identity.is_root());
    }
}
