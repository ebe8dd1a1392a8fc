//! Registry-wide configuration.
//!
//! Grounded on the teacher's `DatabaseConfig` (`strata_storage::database`):
//! a small struct with a `Default` and a `for_testing()` constructor, owned
//! by the top-level facade and threaded down into the components that need
//! it (here, the entity store's [`crate::limits::Limits`] and the
//! executor's suspension timeout).

use std::time::Duration;

use crate::limits::Limits;

/// Configuration for one [`encr::Registry`](../encr/struct.Registry.html)
/// instance.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Size/depth limits applied by the tree builder and value validation.
    pub limits: Limits,
    /// How long a suspended user function may run before the executor
    /// treats the call as failed (§5: "the executor must tolerate both
    /// synchronous and cooperatively-suspending user functions and wait
    /// for full completion"; this bounds that wait so a stuck function
    /// cannot hold the store-wide mutex forever).
    pub invocation_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            limits: Limits::default(),
            invocation_timeout: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Configuration tuned for fast unit/property tests: small limits and a
    /// short timeout so a misbehaving test function fails fast.
    pub fn for_testing() -> Self {
        RegistryConfig {
            limits: Limits::for_testing(),
            invocation_timeout: Duration::from_secs(5),
        }
    }
}
