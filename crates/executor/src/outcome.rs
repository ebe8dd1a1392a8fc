//! The shape of a user function's raw return value, before unpacking (C7).
//!
//! A handler's return must match the [`encr_signature::OutputDescriptor`] it
//! registered under; [`crate::unpack`] is what checks and flattens it.

use encr_core::{Entity, MapKey, Value};

/// One slot of a tuple return that may mix entities and plain scalars (B2 /
/// B5).
#[derive(Debug)]
pub enum OutcomeSlot {
    /// An entity occupying this tuple position.
    Entity(Entity),
    /// A non-entity value occupying this tuple position.
    Scalar(Value),
}

/// One node of an arbitrarily nested container return (B6).
#[derive(Debug)]
pub enum OutcomeValue {
    /// A leaf entity.
    Entity(Entity),
    /// A nested ordered sequence.
    Sequence(Vec<OutcomeValue>),
    /// A nested keyed mapping.
    Mapping(Vec<(MapKey, OutcomeValue)>),
}

/// A non-entity return (B7): either a bare scalar or a named-field record.
#[derive(Debug)]
pub enum NonEntityValue {
    /// A single scalar result.
    Scalar(Value),
    /// A structured, named-field result (e.g. a validated record that never
    /// became an entity).
    Record(Vec<(String, Value)>),
}

/// The raw value a registered handler hands back to the executor.
///
/// One variant per output pattern (§4.4, B1–B7); [`crate::unpack::unpack`]
/// validates the variant actually used against the function's declared
/// [`encr_signature::OutputDescriptor`].
#[derive(Debug)]
pub enum CallOutcome {
    /// B1: a single entity.
    Single(Entity),
    /// B2 (all-entity slots) or B5 (mixed): a fixed-length tuple.
    Tuple(Vec<OutcomeSlot>),
    /// B3: a homogeneous sequence of entities, possibly empty.
    Sequence(Vec<Entity>),
    /// B4: a keyed mapping of entities, possibly empty.
    Mapping(Vec<(MapKey, Entity)>),
    /// B6: an arbitrarily nested container of entities.
    Nested(OutcomeValue),
    /// B7: a non-entity result.
    NonEntity(NonEntityValue),
}
