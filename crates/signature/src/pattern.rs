//! Input and output pattern classification (the rest of C4's descriptors).

use crate::param::{ParamKind, ParamSpec};

/// The shape of a function's parameter list (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPattern {
    /// No `entity`/`config` parameters; addresses or scalars only.
    PureBorrowing,
    /// Exactly one `entity`, no `config`, no extra scalars.
    SingleEntityDirect,
    /// Exactly one `entity`, plus `config` or scalars resolvable into one.
    SingleEntityWithConfig,
    /// Two or more `entity` parameters.
    MultiEntityComposite,
    /// Only `config`/scalars, no `entity`.
    PureConfig,
}

/// Classify a declared parameter list into one of the five input patterns.
pub fn classify_input_pattern(params: &[ParamSpec]) -> InputPattern {
    let entity_count = params.iter().filter(|p| p.kind == ParamKind::Entity).count();
    let has_config = params.iter().any(|p| p.kind == ParamKind::Config);
    let has_scalar = params.iter().any(|p| p.kind == ParamKind::Scalar);

    match entity_count {
        0 if has_config => InputPattern::PureConfig,
        0 => InputPattern::PureBorrowing,
        1 if has_config || has_scalar => InputPattern::SingleEntityWithConfig,
        1 => InputPattern::SingleEntityDirect,
        _ => InputPattern::MultiEntityComposite,
    }
}

/// The shape of a function's declared return type (§4.4, B1–B7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPattern {
    /// A single entity.
    B1Single,
    /// A fixed-length tuple of entities.
    B2FixedTuple,
    /// A homogeneous sequence of entities, possibly empty.
    B3Sequence,
    /// A mapping with entity values, possibly empty.
    B4Mapping,
    /// A tuple mixing entities and non-entities.
    B5MixedTuple,
    /// A nested container-of-container.
    B6Nested,
    /// A non-entity result (scalar, structured value, or validated record).
    B7NonEntity,
}

impl OutputPattern {
    /// `true` if this pattern produces more than one primary entity at a
    /// time that still benefits from an unpack/no-unpack distinction (§4.7).
    /// B1 and B7 always produce exactly one top-level result and ignore the
    /// `unpack` flag; every other pattern honors it.
    pub fn supports_unpacking(self) -> bool {
        !matches!(self, OutputPattern::B1Single | OutputPattern::B7NonEntity)
    }
}

/// Cached output metadata for one registered function (§4.4).
#[derive(Debug, Clone)]
pub struct OutputDescriptor {
    /// The declared return shape.
    pub pattern: OutputPattern,
    /// Whether `unpack=false` is meaningful for this return shape.
    pub supports_unpacking: bool,
    /// Number of primary entities the shape is expected to produce, when
    /// statically known (fixed tuples and single-entity returns); `None` for
    /// shapes whose cardinality is only known at call time (sequences,
    /// mappings).
    pub expected_entity_count: Option<usize>,
}

impl OutputDescriptor {
    /// Describe a B1 (single entity) return.
    pub fn single() -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B1Single,
            supports_unpacking: false,
            expected_entity_count: Some(1),
        }
    }

    /// Describe a B2 (fixed tuple of entities) return of the given arity.
    pub fn fixed_tuple(arity: usize) -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B2FixedTuple,
            supports_unpacking: true,
            expected_entity_count: Some(arity),
        }
    }

    /// Describe a B3 (homogeneous sequence) return.
    pub fn sequence() -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B3Sequence,
            supports_unpacking: true,
            expected_entity_count: None,
        }
    }

    /// Describe a B4 (keyed mapping) return.
    pub fn mapping() -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B4Mapping,
            supports_unpacking: true,
            expected_entity_count: None,
        }
    }

    /// Describe a B5 (mixed tuple) return of the given arity.
    pub fn mixed_tuple(arity: usize) -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B5MixedTuple,
            supports_unpacking: true,
            expected_entity_count: Some(arity),
        }
    }

    /// Describe a B6 (nested container-of-container) return.
    pub fn nested() -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B6Nested,
            supports_unpacking: true,
            expected_entity_count: None,
        }
    }

    /// Describe a B7 (non-entity) return.
    pub fn non_entity() -> Self {
        OutputDescriptor {
            pattern: OutputPattern::B7NonEntity,
            supports_unpacking: false,
            expected_entity_count: Some(1),
        }
    }
}
