//! Unpacker (C7): validates a handler's raw [`crate::outcome::CallOutcome`]
//! against its declared [`encr_signature::OutputDescriptor`] and flattens it
//! into primary entities plus, for every shape that supports unpacking, a
//! container entity callers can ask for instead (§4.7).
//!
//! The container entity is built in two passes because primaries are not
//! committed yet when unpacking happens: [`unpack`] produces a [`Shape`]
//! describing *where* each primary and scalar sits, and [`build_container`]
//! is called again afterward, once the executor has committed every
//! primary and knows its final content id.

use encr_core::{ContentId, EncrError, EncrResult, Entity, EntityPayload, FieldValue, MapKey, Value};
use encr_signature::OutputPattern;

use crate::outcome::{CallOutcome, NonEntityValue, OutcomeSlot, OutcomeValue};

/// Where one container slot's value lives.
#[derive(Debug, Clone)]
pub enum SlotShape {
    /// The slot holds an entity; the index is a position into the
    /// unpacked primaries list.
    EntitySlot(usize),
    /// The slot holds a scalar carried verbatim.
    ScalarSlot(Value),
}

/// Positional or keyed description of a container's slots, recorded so the
/// container entity can be rebuilt once primaries are committed (R2: "an
/// unpacked call's entities can be repacked into a structurally equal
/// container").
#[derive(Debug, Clone)]
pub struct Shape {
    /// A short tag identifying the output pattern, stored on the container
    /// entity and in the execution ledger.
    pub tag: &'static str,
    /// Slots in declaration/iteration order. The key is `None` for a tuple
    /// position recorded purely positionally (index = position in this
    /// vector).
    pub slots: Vec<(Option<MapKey>, SlotShape)>,
}

/// The result of unpacking one handler's raw [`CallOutcome`].
pub struct UnpackResult {
    /// Primary entities, in the order the executor must commit and
    /// classify them.
    pub primaries: Vec<Entity>,
    /// Shape metadata used to build the container entity once `primaries`
    /// are committed. `None` for B1/B7, which never produce a container.
    pub shape: Option<Shape>,
}

/// Validate `outcome` against `pattern` and flatten it (§4.7).
///
/// # Errors
///
/// Returns [`EncrError::InvariantViolation`] if the handler's returned
/// variant does not match the declared output pattern, or if a fixed-arity
/// shape's slot count does not match the declared arity.
pub fn unpack(pattern: OutputPattern, expected_entity_count: Option<usize>, outcome: CallOutcome) -> EncrResult<UnpackResult> {
    match (pattern, outcome) {
        (OutputPattern::B1Single, CallOutcome::Single(e)) => Ok(UnpackResult { primaries: vec![e], shape: None }),

        (OutputPattern::B2FixedTuple, CallOutcome::Tuple(slots)) => {
            check_arity(expected_entity_count, slots.len())?;
            let mut primaries = Vec::with_capacity(slots.len());
            let mut shape_slots = Vec::with_capacity(slots.len());
            for slot in slots {
                match slot {
                    OutcomeSlot::Entity(e) => {
                        shape_slots.push((None, SlotShape::EntitySlot(primaries.len())));
                        primaries.push(e);
                    }
                    OutcomeSlot::Scalar(_) => {
                        return Err(EncrError::invariant_violation("B2 tuple slots must all be entities"));
                    }
                }
            }
            Ok(UnpackResult {
                primaries,
                shape: Some(Shape { tag: "fixed_tuple", slots: shape_slots }),
            })
        }

        (OutputPattern::B3Sequence, CallOutcome::Sequence(items)) => {
            let mut primaries = Vec::with_capacity(items.len());
            let mut shape_slots = Vec::with_capacity(items.len());
            for item in items {
                shape_slots.push((None, SlotShape::EntitySlot(primaries.len())));
                primaries.push(item);
            }
            Ok(UnpackResult {
                primaries,
                shape: Some(Shape { tag: "sequence", slots: shape_slots }),
            })
        }

        (OutputPattern::B4Mapping, CallOutcome::Mapping(entries)) => {
            let mut primaries = Vec::with_capacity(entries.len());
            let mut shape_slots = Vec::with_capacity(entries.len());
            for (key, entity) in entries {
                shape_slots.push((Some(key), SlotShape::EntitySlot(primaries.len())));
                primaries.push(entity);
            }
            Ok(UnpackResult {
                primaries,
                shape: Some(Shape { tag: "mapping", slots: shape_slots }),
            })
        }

        (OutputPattern::B5MixedTuple, CallOutcome::Tuple(slots)) => {
            check_arity(expected_entity_count, slots.len())?;
            let mut primaries = Vec::new();
            let mut shape_slots = Vec::with_capacity(slots.len());
            for slot in slots {
                match slot {
                    OutcomeSlot::Entity(e) => {
                        shape_slots.push((None, SlotShape::EntitySlot(primaries.len())));
                        primaries.push(e);
                    }
                    OutcomeSlot::Scalar(v) => shape_slots.push((None, SlotShape::ScalarSlot(v))),
                }
            }
            Ok(UnpackResult {
                primaries,
                shape: Some(Shape { tag: "mixed_tuple", slots: shape_slots }),
            })
        }

        (OutputPattern::B6Nested, CallOutcome::Nested(value)) => {
            let mut primaries = Vec::new();
            let mut shape_slots = Vec::new();
            flatten_nested(value, Vec::new(), &mut primaries, &mut shape_slots);
            Ok(UnpackResult {
                primaries,
                shape: Some(Shape { tag: "nested", slots: shape_slots }),
            })
        }

        (OutputPattern::B7NonEntity, CallOutcome::NonEntity(value)) => {
            let wrapper = wrap_non_entity(value);
            Ok(UnpackResult { primaries: vec![Entity::new(Box::new(wrapper))], shape: None })
        }

        _ => Err(EncrError::invariant_violation(
            "handler's returned shape does not match its declared output pattern",
        )),
    }
}

fn check_arity(expected: Option<usize>, actual: usize) -> EncrResult<()> {
    match expected {
        Some(n) if n != actual => Err(EncrError::invariant_violation(format!(
            "declared tuple arity {n} but handler returned {actual} slots"
        ))),
        _ => Ok(()),
    }
}

/// Flatten a B6 nested container into a flat primaries list plus a path-keyed
/// shape. A nested path is recorded as a single `MapKey::String` joining
/// each level's index/key with `.`, which is enough to rebuild one level of
/// nesting without teaching the container payload a recursive shape.
fn flatten_nested(
    value: OutcomeValue,
    path: Vec<String>,
    primaries: &mut Vec<Entity>,
    slots: &mut Vec<(Option<MapKey>, SlotShape)>,
) {
    match value {
        OutcomeValue::Entity(e) => {
            let key = MapKey::String(path.join("."));
            slots.push((Some(key), SlotShape::EntitySlot(primaries.len())));
            primaries.push(e);
        }
        OutcomeValue::Sequence(items) => {
            for (i, item) in items.into_iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(i.to_string());
                flatten_nested(item, child_path, primaries, slots);
            }
        }
        OutcomeValue::Mapping(entries) => {
            for (key, item) in entries {
                let mut child_path = path.clone();
                child_path.push(key.to_string());
                flatten_nested(item, child_path, primaries, slots);
            }
        }
    }
}

fn wrap_non_entity(value: NonEntityValue) -> WrapperPayload {
    match value {
        NonEntityValue::Scalar(v) => WrapperPayload {
            type_name: "NonEntityResult",
            field_names: &["result"],
            values: vec![v],
        },
        NonEntityValue::Record(fields) => {
            let names: Vec<String> = fields.iter().map(|(k, _)| k.clone()).collect();
            let leaked = encr_signature::composite::leak_field_names(names);
            WrapperPayload {
                type_name: "NonEntityRecord",
                field_names: leaked,
                values: fields.into_iter().map(|(_, v)| v).collect(),
            }
        }
    }
}

/// Generic payload wrapping a B7 non-entity return in entity clothing, since
/// every value the store and ledger handle is an [`Entity`].
#[derive(Debug, Clone)]
struct WrapperPayload {
    type_name: &'static str,
    field_names: &'static [&'static str],
    values: Vec<Value>,
}

impl EntityPayload for WrapperPayload {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn field_names(&self) -> &'static [&'static str] {
        self.field_names
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        self.field_names
            .iter()
            .position(|&f| f == name)
            .map(|i| FieldValue::Scalar(self.values[i].clone()))
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
        let FieldValue::Scalar(scalar) = value else {
            return Err(EncrError::bad_path(format!("{}.{name} expects a scalar", self.type_name)));
        };
        match self.field_names.iter().position(|&f| f == name) {
            Some(i) => {
                self.values[i] = scalar;
                Ok(())
            }
            None => Err(EncrError::bad_path(format!("{} has no field `{name}`", self.type_name))),
        }
    }

    fn clone_box(&self) -> Box<dyn EntityPayload> {
        Box::new(self.clone())
    }

    fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
        other.type_name() == self.type_name
            && self
                .field_names
                .iter()
                .zip(&self.values)
                .all(|(&name, value)| matches!(other.get_field(name), Some(FieldValue::Scalar(ref v)) if v == value))
    }
}

/// Payload of the container entity built for any output pattern that
/// supports unpacking, once its primaries are committed (§4.7, "callers
/// that opt out of unpacking receive the original shape, carried as its own
/// entity").
#[derive(Debug, Clone)]
pub struct ContainerPayload {
    shape_tag: &'static str,
    slots: Vec<Value>,
}

impl ContainerPayload {
    fn new(shape_tag: &'static str, slots: Vec<Value>) -> Self {
        ContainerPayload { shape_tag, slots }
    }
}

impl EntityPayload for ContainerPayload {
    fn type_name(&self) -> &'static str {
        "UnpackContainer"
    }

    fn field_names(&self) -> &'static [&'static str] {
        &["shape", "slots"]
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "shape" => Some(FieldValue::Scalar(Value::string(self.shape_tag))),
            "slots" => Some(FieldValue::Scalar(Value::Array(self.slots.clone()))),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
        match (name, value) {
            ("slots", FieldValue::Scalar(Value::Array(items))) => {
                self.slots = items;
                Ok(())
            }
            ("shape", _) => Err(EncrError::bad_path("UnpackContainer.shape is read-only after construction")),
            _ => Err(EncrError::bad_path(format!("UnpackContainer has no settable field `{name}`"))),
        }
    }

    fn clone_box(&self) -> Box<dyn EntityPayload> {
        Box::new(self.clone())
    }

    fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
        other.type_name() == self.type_name()
            && matches!(other.get_field("shape"), Some(FieldValue::Scalar(Value::String(s))) if s == self.shape_tag)
            && matches!(other.get_field("slots"), Some(FieldValue::Scalar(Value::Array(items))) if items == self.slots)
    }
}

/// Build the container entity for a shape, once every primary has a
/// committed content id. Returns `None` for shapes with no container
/// (B1/B7, modeled as `shape: None` in [`UnpackResult`]).
pub fn build_container(shape: &Shape, committed_primaries: &[Entity]) -> Entity {
    let slots: Vec<Value> = shape
        .slots
        .iter()
        .map(|(key, slot)| {
            let mut entries = Vec::new();
            if let Some(key) = key {
                entries.push(("key".to_string(), map_key_to_value(key)));
            }
            match slot {
                SlotShape::EntitySlot(i) => {
                    entries.push(("kind".to_string(), Value::string("entity")));
                    let cid: ContentId = committed_primaries[*i]
                        .content_id()
                        .expect("container built only after primaries are committed");
                    entries.push(("content_id".to_string(), Value::string(cid.to_string())));
                }
                SlotShape::ScalarSlot(v) => {
                    entries.push(("kind".to_string(), Value::string("scalar")));
                    entries.push(("value".to_string(), v.clone()));
                }
            }
            Value::Map(entries)
        })
        .collect();
    Entity::new(Box::new(ContainerPayload::new(shape.tag, slots)))
}

fn map_key_to_value(key: &MapKey) -> Value {
    match key {
        MapKey::Index(i) => Value::Int(*i as i64),
        MapKey::String(s) => Value::string(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::entity::test_support::{Item, Record};

    #[test]
    fn single_unpacks_with_no_shape() {
        let result = unpack(
            OutputPattern::B1Single,
            Some(1),
            CallOutcome::Single(Entity::new(Box::new(Record::new("x")))),
        )
        .unwrap();
        assert_eq!(result.primaries.len(), 1);
        assert!(result.shape.is_none());
    }

    #[test]
    fn mismatched_variant_is_rejected() {
        let err = unpack(OutputPattern::B1Single, Some(1), CallOutcome::Sequence(vec![])).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn fixed_tuple_arity_mismatch_is_rejected() {
        let slots = vec![OutcomeSlot::Entity(Entity::new(Box::new(Item { label: "a".into() })))];
        let err = unpack(OutputPattern::B2FixedTuple, Some(2), CallOutcome::Tuple(slots)).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn sequence_produces_one_slot_per_item() {
        let items = vec![
            Entity::new(Box::new(Item { label: "a".into() })),
            Entity::new(Box::new(Item { label: "b".into() })),
        ];
        let result = unpack(OutputPattern::B3Sequence, None, CallOutcome::Sequence(items)).unwrap();
        assert_eq!(result.primaries.len(), 2);
        assert_eq!(result.shape.unwrap().slots.len(), 2);
    }

    #[test]
    fn mixed_tuple_keeps_scalars_out_of_primaries() {
        let slots = vec![
            OutcomeSlot::Entity(Entity::new(Box::new(Item { label: "a".into() }))),
            OutcomeSlot::Scalar(Value::Int(7)),
        ];
        let result = unpack(OutputPattern::B5MixedTuple, Some(2), CallOutcome::Tuple(slots)).unwrap();
        assert_eq!(result.primaries.len(), 1);
        assert_eq!(result.shape.unwrap().slots.len(), 2);
    }

    #[test]
    fn non_entity_scalar_is_wrapped_as_a_single_field_entity() {
        let result = unpack(
            OutputPattern::B7NonEntity,
            Some(1),
            CallOutcome::NonEntity(NonEntityValue::Scalar(Value::Float(3.5))),
        )
        .unwrap();
        assert_eq!(result.primaries.len(), 1);
        assert!(matches!(
            result.primaries[0].payload.get_field("result"),
            Some(FieldValue::Scalar(Value::Float(f))) if f == 3.5
        ));
    }

    #[test]
    fn build_container_records_committed_content_ids() {
        let mut e = Entity::new(Box::new(Item { label: "a".into() }));
        e.identity.content_id = Some(ContentId::from_raw(99));
        let shape = Shape {
            tag: "sequence",
            slots: vec![(None, SlotShape::EntitySlot(0))],
        };
        let container = build_container(&shape, std::slice::from_ref(&e));
        assert!(matches!(container.payload.get_field("shape"), Some(FieldValue::Scalar(Value::String(s))) if s == "sequence"));
    }

    proptest::proptest! {
        /// R2: unpacking a B3 sequence of any length and rebuilding its
        /// container records exactly one slot per primary, each naming that
        /// primary's committed content id in order — enough to rebuild a
        /// structurally-equal sequence from the primaries alone.
        #[test]
        fn sequence_round_trips_through_unpack_and_build_container(raw_ids in proptest::collection::vec(proptest::prelude::any::<u64>(), 0..6)) {
            let items: Vec<Entity> = raw_ids
                .iter()
                .map(|label| Entity::new(Box::new(Item { label: label.to_string() })))
                .collect();
            let result = unpack(OutputPattern::B3Sequence, None, CallOutcome::Sequence(items)).unwrap();
            proptest::prop_assert_eq!(result.primaries.len(), raw_ids.len());

            let mut committed = result.primaries;
            for (i, e) in committed.iter_mut().enumerate() {
                e.identity.content_id = Some(ContentId::from_raw(i as u64));
            }

            let shape = result.shape.unwrap();
            let container = build_container(&shape, &committed);
            let Some(FieldValue::Scalar(Value::Array(slots))) = container.payload.get_field("slots") else {
                panic!("expected array of slots");
            };
            proptest::prop_assert_eq!(slots.len(), committed.len());
            for (i, slot) in slots.iter().enumerate() {
                let expected_cid = committed[i].content_id().unwrap().to_string();
                proptest::prop_assert_eq!(slot.map_get("content_id"), Some(&Value::string(expected_cid)));
            }
        }
    }
}
