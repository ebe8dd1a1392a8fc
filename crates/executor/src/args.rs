//! The working-copy bundle a registered handler receives (§4.6 steps 4–5).
//!
//! Grounded on the teacher's handler-function convention
//! (`crates/executor/handlers/*.rs`, each taking a small typed args struct
//! pulled out of the dispatched `Command`): here the args struct is generic
//! across every registered function, since there is no per-function
//! generated type to carry the fields instead.

use std::collections::HashMap;

use encr_core::{Entity, Value};

/// Arguments handed to a registered handler for one call.
///
/// Entity-kind and config-kind parameters are already resolved into fresh
/// working copies (§4.6 step 4: "obtain a frozen copy ... these become the
/// working copies the user function operates on"); scalar-kind parameters
/// are handed through as plain values. A handler takes ownership of whatever
/// working copy it intends to mutate or return, via [`CallArgs::take_entity`]
/// or [`CallArgs::take_config`].
pub struct CallArgs {
    entities: HashMap<String, Entity>,
    config: Option<Entity>,
    scalars: HashMap<String, Value>,
}

impl CallArgs {
    pub(crate) fn new(entities: HashMap<String, Entity>, config: Option<Entity>, scalars: HashMap<String, Value>) -> Self {
        CallArgs { entities, config, scalars }
    }

    /// Take ownership of the named entity-kind parameter's working copy.
    pub fn take_entity(&mut self, name: &str) -> Option<Entity> {
        self.entities.remove(name)
    }

    /// Borrow the named entity-kind parameter's working copy without
    /// consuming it.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Take ownership of the configuration entity's working copy, if this
    /// function declared a `config`-kind parameter.
    pub fn take_config(&mut self) -> Option<Entity> {
        self.config.take()
    }

    /// Borrow the configuration entity's working copy without consuming it.
    pub fn config(&self) -> Option<&Entity> {
        self.config.as_ref()
    }

    /// Read a scalar-kind parameter's value.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.scalars.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::entity::test_support::Record;

    #[test]
    fn take_entity_removes_it_and_returns_none_on_second_call() {
        let mut entities = HashMap::new();
        entities.insert("a".to_string(), Entity::new(Box::new(Record::new("x"))));
        let mut args = CallArgs::new(entities, None, HashMap::new());
        assert!(args.take_entity("a").is_some());
        assert!(args.take_entity("a").is_none());
    }

    #[test]
    fn scalar_reads_by_name() {
        let mut scalars = HashMap::new();
        scalars.insert("n".to_string(), Value::Int(5));
        let args = CallArgs::new(HashMap::new(), None, scalars);
        assert_eq!(args.scalar("n"), Some(&Value::Int(5)));
        assert_eq!(args.scalar("missing"), None);
    }
}
