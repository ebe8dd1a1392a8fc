//! Size and depth limits enforced by the tree builder and value validation.
//!
//! spec.md does not name specific numbers, but §5 assumes a bounded,
//! single-threaded, in-memory engine, and the tree builder (C2) must be
//! able to fail deterministically on pathological input rather than
//! recursing unbounded. Defaults here are conservative; `for_testing()`
//! shrinks them for fast property tests, in the same spirit as the
//! teacher's `Limits::with_small_limits()`.

use crate::Value;
use thiserror::Error;

/// Configurable size/depth limits.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum depth of the entity tree walked by the tree builder (C2).
    pub max_tree_depth: usize,
    /// Maximum number of entities reachable from one root.
    pub max_tree_size: usize,
    /// Maximum string length in bytes for a scalar [`Value::String`].
    pub max_string_bytes: usize,
    /// Maximum byte length for a scalar [`Value::Bytes`].
    pub max_bytes_len: usize,
    /// Maximum element count for a [`Value::Array`] or [`Value::Map`].
    pub max_collection_len: usize,
    /// Maximum nesting depth for a [`Value`] itself (distinct from tree
    /// depth, which counts entity-to-entity edges).
    pub max_value_nesting_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_tree_depth: 64,
            max_tree_size: 100_000,
            max_string_bytes: 16 * 1024 * 1024,
            max_bytes_len: 16 * 1024 * 1024,
            max_collection_len: 1_000_000,
            max_value_nesting_depth: 64,
        }
    }
}

impl Limits {
    /// Small limits for fast unit/property tests.
    pub fn for_testing() -> Self {
        Limits {
            max_tree_depth: 8,
            max_tree_size: 200,
            max_string_bytes: 1000,
            max_bytes_len: 1000,
            max_collection_len: 100,
            max_value_nesting_depth: 8,
        }
    }

    /// Validate a scalar value against the size/nesting limits.
    pub fn validate_value(&self, value: &Value) -> Result<(), LimitError> {
        self.validate_value_at(value, 0)
    }

    fn validate_value_at(&self, value: &Value, depth: usize) -> Result<(), LimitError> {
        if depth > self.max_value_nesting_depth {
            return Err(LimitError::NestingTooDeep {
                actual: depth,
                max: self.max_value_nesting_depth,
            });
        }
        match value {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(()),
            Value::String(s) => {
                if s.len() > self.max_string_bytes {
                    return Err(LimitError::ValueTooLarge {
                        reason: "string_too_long",
                        actual: s.len(),
                        max: self.max_string_bytes,
                    });
                }
                Ok(())
            }
            Value::Bytes(b) => {
                if b.len() > self.max_bytes_len {
                    return Err(LimitError::ValueTooLarge {
                        reason: "bytes_too_long",
                        actual: b.len(),
                        max: self.max_bytes_len,
                    });
                }
                Ok(())
            }
            Value::Array(items) => {
                if items.len() > self.max_collection_len {
                    return Err(LimitError::ValueTooLarge {
                        reason: "array_too_long",
                        actual: items.len(),
                        max: self.max_collection_len,
                    });
                }
                items.iter().try_for_each(|v| self.validate_value_at(v, depth + 1))
            }
            Value::Map(entries) => {
                if entries.len() > self.max_collection_len {
                    return Err(LimitError::ValueTooLarge {
                        reason: "map_too_many_entries",
                        actual: entries.len(),
                        max: self.max_collection_len,
                    });
                }
                entries
                    .iter()
                    .try_for_each(|(_, v)| self.validate_value_at(v, depth + 1))
            }
        }
    }

    /// Validate a tree depth observed by the tree builder.
    pub fn validate_tree_depth(&self, depth: usize) -> Result<(), LimitError> {
        if depth > self.max_tree_depth {
            return Err(LimitError::TreeTooDeep {
                actual: depth,
                max: self.max_tree_depth,
            });
        }
        Ok(())
    }

    /// Validate a tree size observed by the tree builder.
    pub fn validate_tree_size(&self, size: usize) -> Result<(), LimitError> {
        if size > self.max_tree_size {
            return Err(LimitError::TreeTooLarge {
                actual: size,
                max: self.max_tree_size,
            });
        }
        Ok(())
    }
}

/// A limit violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// A scalar value exceeded a size limit.
    #[error("value too large ({reason}): {actual} exceeds maximum {max}")]
    ValueTooLarge {
        /// Which limit was exceeded.
        reason: &'static str,
        /// Observed size.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },
    /// A scalar value nested deeper than allowed.
    #[error("value nesting too deep: {actual} exceeds maximum {max}")]
    NestingTooDeep {
        /// Observed nesting depth.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The entity tree exceeded the configured maximum depth.
    #[error("entity tree too deep: {actual} exceeds maximum {max}")]
    TreeTooDeep {
        /// Observed depth.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The entity tree exceeded the configured maximum member count.
    #[error("entity tree too large: {actual} members exceeds maximum {max}")]
    TreeTooLarge {
        /// Observed member count.
        actual: usize,
        /// Configured maximum.
        max: usize,
    },
}
