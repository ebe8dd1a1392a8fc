//! Execution: C6 (call orchestration), C7 (result unpacking), C8 (the
//! execution ledger), and the [`Registry`] that ties them to C1–C5.
//!
//! Grounded on the teacher's `strata-executor` crate, which plays the same
//! role (turn a dispatched call into a committed, auditable state change)
//! for a command-oriented store rather than an entity-oriented one.

pub mod args;
pub mod executor;
pub mod ledger;
pub mod outcome;
pub mod registry;
pub mod unpack;

pub use args::CallArgs;
pub use executor::{Executor, Handler, InvokeOutput};
pub use ledger::{ExecutionLedger, ExecutionRecordPayload, SemanticClassification, SuccessDetails};
pub use outcome::{CallOutcome, NonEntityValue, OutcomeSlot, OutcomeValue};
pub use registry::Registry;
pub use unpack::{build_container, unpack, Shape, SlotShape, UnpackResult};
