//! The external interface (spec.md §6): `register`, `invoke`, address
//! resolution, store access helpers, and execution-ledger queries, all
//! gathered behind one [`Registry`].
//!
//! Grounded on the teacher's `Strata` facade (`src/lib.rs`,
//! `crates/api/src/lib.rs`): a single struct owning every subsystem, with
//! the public surface expressed as plain methods rather than a
//! command/dispatch enum, since ENCR has no cross-process wire boundary to
//! serialize a command across.

use std::collections::HashMap;

use encr_core::{ContentId, EncrError, EncrResult, Entity, LineageId, RegistryConfig};
use encr_resolve::{AddressResolver, Resolved};
use encr_signature::{ArgValue, ConfigSchema, OutputDescriptor, ParamSpec, Signature};
use encr_store::EntityStore;

use crate::executor::{Executor, Handler, InvokeOutput};
use crate::ledger::ExecutionLedger;

struct RegisteredFunction {
    signature: Signature,
    config_schema: Option<ConfigSchema>,
    handler: Box<Handler>,
}

/// The entity registry: owns the store and every registered function, and
/// is the sole entry point callers use to register and invoke them.
pub struct Registry {
    store: EntityStore,
    functions: HashMap<String, RegisteredFunction>,
    config: RegistryConfig,
}

impl Registry {
    /// Construct an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Registry {
            store: EntityStore::new(config.limits.clone()),
            functions: HashMap::new(),
            config,
        }
    }

    /// Register a function under `name` (§4.4, §6).
    ///
    /// # Errors
    ///
    /// Returns [`EncrError::AlreadyRegistered`] if `name` is already bound,
    /// or [`EncrError::SignatureError`] if `output` is missing or the
    /// parameter list is inconsistent with a declared `config_schema`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        output: OutputDescriptor,
        config_schema: Option<ConfigSchema>,
        handler: impl Fn(crate::args::CallArgs) -> EncrResult<crate::outcome::CallOutcome> + Send + Sync + 'static,
    ) -> EncrResult<()> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(EncrError::already_registered(name));
        }
        let signature = Signature::build(name.clone(), params, Some(output))?;
        self.functions.insert(
            name,
            RegisteredFunction {
                signature,
                config_schema,
                handler: Box::new(handler),
            },
        );
        Ok(())
    }

    /// Invoke a registered function, unpacking its result (§4.6, §4.7).
    pub fn invoke(&self, name: &str, args: HashMap<String, ArgValue>) -> EncrResult<InvokeOutput> {
        self.invoke_with_unpack(name, true, args)
    }

    /// Invoke a registered function, choosing whether to unpack a
    /// multi-entity return shape into its primaries or receive the
    /// original-shape container entity instead (§4.6 step 11).
    pub fn invoke_with_unpack(&self, name: &str, unpack: bool, args: HashMap<String, ArgValue>) -> EncrResult<InvokeOutput> {
        let entry = self
            .functions
            .get(name)
            .ok_or_else(|| EncrError::unknown(format!("function `{name}`")))?;
        let executor = Executor::new(&self.store, self.config.invocation_timeout);
        executor.invoke(&entry.signature, entry.config_schema.as_ref(), entry.handler.as_ref(), args, unpack)
    }

    /// Fetch a committed entity (root or nested member) by content id.
    pub fn get(&self, content_id: ContentId) -> Option<Entity> {
        self.store.get_frozen(content_id)
    }

    /// Resolve a symbolic address (§4.3) against the store.
    pub fn resolve(&self, address: &str) -> EncrResult<Resolved> {
        AddressResolver::new(&self.store).resolve(address)
    }

    /// Promote a freshly-built entity to a root without going through a
    /// registered function (§3, "an entity not yet known to the store").
    pub fn put(&self, entity: Entity) -> EncrResult<Entity> {
        self.store.put_root(entity)
    }

    /// Ordered version history for a lineage, oldest first.
    pub fn history(&self, lineage_id: LineageId) -> Vec<ContentId> {
        self.store.history(lineage_id)
    }

    /// The sibling entities produced alongside `entity` by the same call,
    /// if any (§6).
    pub fn siblings(&self, entity: &Entity) -> Vec<Entity> {
        entity
            .identity
            .sibling_ids
            .iter()
            .filter_map(|&cid| self.store.get_frozen(cid))
            .collect()
    }

    /// Every execution record that touched `lineage_id` (SPEC_FULL.md §3).
    pub fn executions_for(&self, lineage_id: LineageId) -> Vec<Entity> {
        ExecutionLedger::new(&self.store).executions_for(lineage_id)
    }

    /// Every execution record with `succeeded=false` (SPEC_FULL.md §3).
    pub fn failed_executions(&self) -> Vec<Entity> {
        ExecutionLedger::new(&self.store).failed_executions()
    }

    /// Direct access to the underlying store, for embedders that need
    /// lower-level introspection (`len`/`contains`/`roots`) than the
    /// registry surface exposes.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::entity::test_support::{Counter, Record};
    use encr_core::{EntityPayload, FieldValue, Value};
    use encr_signature::OutputDescriptor;

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = Registry::new(RegistryConfig::for_testing());
        registry
            .register("f", vec![ParamSpec::scalar("x")], OutputDescriptor::single(), None, |_| {
                Ok(crate::outcome::CallOutcome::Single(Entity::new(Box::new(Record::new("x")))))
            })
            .unwrap();
        let err = registry
            .register("f", vec![ParamSpec::scalar("x")], OutputDescriptor::single(), None, |_| {
                Ok(crate::outcome::CallOutcome::Single(Entity::new(Box::new(Record::new("x")))))
            })
            .unwrap_err();
        assert!(matches!(err, EncrError::AlreadyRegistered { .. }));
    }

    #[test]
    fn invoke_unknown_function_is_an_unknown_error() {
        let registry = Registry::new(RegistryConfig::for_testing());
        let err = registry.invoke("missing", HashMap::new()).unwrap_err();
        assert!(matches!(err, EncrError::Unknown { .. }));
    }

    #[test]
    fn end_to_end_mutation_is_queryable_through_history_and_ledger() {
        let mut registry = Registry::new(RegistryConfig::for_testing());
        registry
            .register("bump", vec![ParamSpec::entity("counter")], OutputDescriptor::single(), None, |mut args| {
                let mut counter = args.take_entity("counter").unwrap();
                let FieldValue::Scalar(Value::Int(n)) = counter.payload.get_field("n").unwrap() else {
                    panic!("expected int");
                };
                counter.payload.set_field("n", FieldValue::Scalar(Value::Int(n + 1))).unwrap();
                Ok(crate::outcome::CallOutcome::Single(counter))
            })
            .unwrap();
        let committed = registry.put(Entity::new(Box::new(Counter { n: 1 }))).unwrap();
        let mut args = HashMap::new();
        args.insert("counter".to_string(), ArgValue::Entity(committed.clone()));
        let output = registry.invoke("bump", args).unwrap();
        let bumped = output.into_single().unwrap();
        assert_eq!(registry.history(bumped.identity.lineage_id).len(), 2);
        assert!(registry.failed_executions().is_empty());
        assert_eq!(registry.executions_for(bumped.identity.lineage_id).len(), 1);
    }
}
