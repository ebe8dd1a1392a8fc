//! # encr
//!
//! An entity-native callable registry: ordinary functions become callable
//! entities whose arguments and return values are themselves
//! content-addressed, immutably versioned entities rather than opaque
//! blobs.
//!
//! # Quick Start
//!
//! ```no_run
//! use encr::{ArgValue, OutputDescriptor, ParamSpec, Registry, RegistryConfig};
//! use encr_core::entity::test_support::Counter;
//! use encr_core::{Entity, FieldValue, Value};
//! use std::collections::HashMap;
//!
//! # fn main() -> encr_core::EncrResult<()> {
//! let mut registry = Registry::new(RegistryConfig::default());
//! registry.register(
//!     "bump",
//!     vec![ParamSpec::entity("counter")],
//!     OutputDescriptor::single(),
//!     None,
//!     |mut args| {
//!         let mut counter = args.take_entity("counter").unwrap();
//!         let FieldValue::Scalar(Value::Int(n)) = counter.payload.get_field("n").unwrap() else {
//!             panic!("expected int");
//!         };
//!         counter.payload.set_field("n", FieldValue::Scalar(Value::Int(n + 1)))?;
//!         Ok(encr::CallOutcome::Single(counter))
//!     },
//! )?;
//!
//! let committed = registry.put(Entity::new(Box::new(Counter { n: 0 })))?;
//! let mut args = HashMap::new();
//! args.insert("counter".to_string(), ArgValue::Entity(committed));
//! let bumped = registry.invoke("bump", args)?.into_single().unwrap();
//! assert_eq!(registry.history(bumped.identity.lineage_id).len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | Entity Store | content-addressed, immutably versioned tree storage |
//! | Tree Builder | walks a working copy into a frozen, content-addressed tree |
//! | Address Resolver | `@content_id.path` symbolic navigation into committed trees |
//! | Signature Analyzer | declared parameter/output shape for a registered function |
//! | Input Composer | merges heterogeneous call arguments into one composite entity |
//! | Executor | runs one call end to end: compose, invoke, classify, commit, log |
//! | Unpacker | flattens a declared multi-entity return into its primaries |
//! | Execution Ledger | one immutable audit record per call |
//!
//! [`Registry`] is the entry point; everything else is reachable through it
//! or re-exported here for callers who need the finer-grained types (e.g.
//! to build an [`encr_signature::ConfigSchema`] or inspect a
//! [`encr_executor::ExecutionRecordPayload`] directly).

pub use encr_core::{
    ConfigPayload, ContainerKind, Entity, EntityPayload, EncrError, EncrResult, FieldValue, Identity, MapKey,
    Provenance, ProvenanceMap, RegistryConfig, Value,
};
pub use encr_core::{ContentId, ExecutionId, IdParseError, InstanceId, LineageId};
pub use encr_resolve::{Address, AddressResolver, ResolutionMode, Resolved};
pub use encr_signature::{
    ArgValue, CompositeInputPayload, ComposedInput, ConfigSchema, InputComposer, InputPattern, OutputDescriptor,
    OutputPattern, ParamKind, ParamSpec, Signature,
};
pub use encr_executor::{
    CallArgs, CallOutcome, ExecutionLedger, ExecutionRecordPayload, Executor, Handler, InvokeOutput, NonEntityValue,
    OutcomeSlot, OutcomeValue, Registry, SemanticClassification, Shape, SlotShape, SuccessDetails, UnpackResult,
};
