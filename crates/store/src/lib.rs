//! Content-addressed entity store and tree builder.
//!
//! - [`tree`]: the Tree Builder (C2) — walks a live entity, assigns
//!   content ids bottom-up, and rejects cyclic graphs.
//! - [`store`]: the Entity Store (C1) — the three-index, mutex-guarded
//!   home for every committed tree.
//! - [`hashing`]: the content-addressing hash used by the tree builder.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod hashing;
pub mod store;
pub mod tree;

pub use store::EntityStore;
pub use tree::{BuiltTree, Edge, TreeBuilder};
