//! Signature Analyzer (C4) and Input Composer (C5).
//!
//! - [`param`]/[`pattern`]/[`signature`]: the declared parameter/output
//!   descriptors and their classification into the five input patterns and
//!   seven output patterns (B1–B7) of spec.md §4.4.
//! - [`composite`]: the synthesized composite-input entity payload C5
//!   instantiates once per call.
//! - [`config`]: configuration-entity schemas, the mechanism spec.md §6
//!   names as "registration of a configuration entity class."
//! - [`compose`]: the Input Composer itself (C5), turning one call's
//!   arguments into a [`compose::ComposedInput`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compose;
pub mod composite;
pub mod config;
pub mod param;
pub mod pattern;
pub mod signature;

pub use compose::{ArgValue, ComposedInput, InputComposer};
pub use composite::CompositeInputPayload;
pub use config::{ConfigPayloadImpl, ConfigSchema};
pub use param::{ParamKind, ParamSpec};
pub use pattern::{InputPattern, OutputDescriptor, OutputPattern};
pub use signature::Signature;
