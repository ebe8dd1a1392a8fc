//! Core identity, value, and error types for the ENCR engine.
//!
//! This crate defines the foundational types shared by every other ENCR
//! crate:
//! - [`ids`]: opaque id types (`ContentId`, `InstanceId`, `LineageId`,
//!   `ExecutionId`) and the id generator.
//! - [`value`]: the scalar `Value` type for non-entity payload fields.
//! - [`entity`]: the `Entity`/`Identity`/`EntityPayload` data model (§3 of
//!   spec.md).
//! - [`error`]: the unified `EncrError` type.
//! - [`limits`]: configurable size/depth limits.
//! - [`config`]: registry-wide configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod entity;
pub mod error;
pub mod ids;
pub mod limits;
pub mod value;

pub use config::RegistryConfig;
pub use entity::{
    ConfigPayload, ContainerKind, Entity, EntityPayload, FieldValue, Identity, MapKey, Provenance, ProvenanceMap,
};
pub use error::{EncrError, EncrResult};
pub use ids::{content_id_from_bytes, ContentId, ExecutionId, IdGenerator, IdParseError, InstanceId, LineageId, IDS};
pub use limits::{LimitError, Limits};
pub use value::Value;
