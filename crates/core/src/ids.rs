//! Opaque identity handles.
//!
//! Four id kinds appear throughout the engine, each answering a different
//! question about an entity:
//!
//! - [`ContentId`]: which bytes? Derived deterministically from an entity's
//!   frozen payload, so identical payloads always produce the same id
//!   (invariant I3 in the data model).
//! - [`InstanceId`]: which in-memory object? Fresh on every deep copy,
//!   never reused. Used only for identity comparisons during the
//!   mutation/creation/detachment classification in the executor.
//! - [`LineageId`]: which story? Assigned once at creation and preserved
//!   across every subsequent mutation; a new lineage id marks a creation.
//! - [`ExecutionId`]: which call? One per `invoke`, shared by the
//!   execution record and every entity it produced.
//!
//! `ContentId` is the only one derived from content; the other three are
//! arbitrary per-process identities handed out by atomic counters. None of
//! them are meaningful across process boundaries — persistence beyond the
//! in-memory store is out of scope (see SPEC_FULL.md §4).

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

fn encode(n: u64) -> String {
    URL_SAFE_NO_PAD.encode(n.to_be_bytes())
}

fn decode(s: &str) -> Option<u64> {
    let bytes = URL_SAFE_NO_PAD.decode(s).ok()?;
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

macro_rules! opaque_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw 64-bit value. Exposed for codecs and tests; callers
            /// should otherwise treat the id as opaque.
            pub const fn from_raw(v: u64) -> Self {
                $name(v)
            }

            /// The raw 64-bit value backing this id.
            pub const fn as_raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode(s).map($name).ok_or(IdParseError::Malformed)
            }
        }
    };
}

opaque_id!(ContentId, "Identifies one immutable version of an entity.");
opaque_id!(InstanceId, "Identifies one in-memory object, fresh per deep copy.");
opaque_id!(LineageId, "Identifies all versions descended from one original.");
opaque_id!(ExecutionId, "Identifies one `invoke` call and its execution record.");

/// Failure parsing an id back out of its textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// The string was not valid base64 or did not decode to 8 bytes.
    #[error("malformed id")]
    Malformed,
}

/// Hashes a frozen entity payload into a [`ContentId`].
///
/// The input must already be a deterministic byte encoding of the payload
/// (identity fields excluded) — see `encr_store::hashing`. xxh3 is used
/// rather than a cryptographic hash because content ids only need to be
/// collision-resistant within one process's store, not across adversarial
/// inputs; this mirrors how the teacher crate uses `xxhash-rust` for
/// integrity checksums rather than as a security primitive.
pub fn content_id_from_bytes(bytes: &[u8]) -> ContentId {
    ContentId(xxhash_rust::xxh3::xxh3_64(bytes))
}

/// Process-local generators for the three non-content-derived id kinds.
///
/// A single set of counters is shared by the whole process; tests that need
/// deterministic ids construct entities directly rather than going through
/// these counters.
pub struct IdGenerator {
    instance: AtomicU64,
    lineage: AtomicU64,
    execution: AtomicU64,
}

impl IdGenerator {
    /// Create a fresh generator starting all counters at zero.
    pub const fn new() -> Self {
        IdGenerator {
            instance: AtomicU64::new(0),
            lineage: AtomicU64::new(0),
            execution: AtomicU64::new(0),
        }
    }

    /// Mint a fresh [`InstanceId`].
    pub fn next_instance(&self) -> InstanceId {
        InstanceId(self.instance.fetch_add(1, Ordering::Relaxed))
    }

    /// Mint a fresh [`LineageId`].
    pub fn next_lineage(&self) -> LineageId {
        LineageId(self.lineage.fetch_add(1, Ordering::Relaxed))
    }

    /// Mint a fresh [`ExecutionId`].
    pub fn next_execution(&self) -> ExecutionId {
        ExecutionId(self.execution.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide id generator. One per process is sufficient: instance ids
/// only need to be unique for the lifetime of a single working-copy set,
/// and lineage/execution ids only need to be unique within one store.
pub static IDS: IdGenerator = IdGenerator::new();
