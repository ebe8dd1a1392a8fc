//! Configuration-entity schemas and their generic payload implementation.
//!
//! spec.md §6 names "registration of a configuration entity class: a
//! factory that produces a new entity subclass with the given payload field
//! schema." Without runtime class synthesis, that factory is [`ConfigSchema`]
//! plus [`ConfigPayloadImpl`]: a declared field list (leaked once, at
//! schema-construction time, to satisfy `EntityPayload::field_names`'s
//! `&'static` signature — the same one-time-leak technique
//! `crate::composite` uses for synthesized input entities) and a generic
//! payload that stores values by name.

use encr_core::{ConfigPayload, EncrError, EntityPayload, FieldValue, Value};

/// Declares the shape of one configuration-entity class (§3, "Configuration
/// entity"): a type name plus an ordered field list, each with a default
/// value used when a call omits it (§4.5 step 3: "using defaults for absent
/// fields").
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    type_name: &'static str,
    fields: &'static [&'static str],
    defaults: Vec<Value>,
}

impl ConfigSchema {
    /// Declare a configuration schema. `fields` and their `defaults` must be
    /// the same length and in the same order; `type_name`/`fields` are
    /// leaked once, at schema-construction time, not per call.
    pub fn new(type_name: impl Into<String>, fields: Vec<(&str, Value)>) -> Self {
        let type_name: &'static str = Box::leak(type_name.into().into_boxed_str());
        let names: Vec<&'static str> = fields
            .iter()
            .map(|(name, _)| -> &'static str { Box::leak(name.to_string().into_boxed_str()) })
            .collect();
        let defaults = fields.into_iter().map(|(_, default)| default).collect();
        ConfigSchema {
            type_name,
            fields: Box::leak(names.into_boxed_slice()),
            defaults,
        }
    }

    /// The configuration class's stable type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The schema's declared field names, in order.
    pub fn field_names(&self) -> &'static [&'static str] {
        self.fields
    }

    /// The default value for a field, if declared.
    pub fn default_for(&self, field: &str) -> Option<&Value> {
        self.fields.iter().position(|f| *f == field).map(|i| &self.defaults[i])
    }

    /// Build a payload from loose scalar arguments, falling back to this
    /// schema's defaults for any field not present in `provided`.
    pub fn instantiate(&self, provided: &[(String, Value)]) -> ConfigPayloadImpl {
        let values = self
            .fields
            .iter()
            .map(|&name| {
                let value = provided
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.clone())
                    .or_else(|| self.default_for(name).cloned())
                    .unwrap_or(Value::Null);
                (name, value)
            })
            .collect();
        ConfigPayloadImpl {
            type_name: self.type_name,
            fields: self.fields,
            values,
        }
    }
}

/// Generic payload for a configuration entity built from a [`ConfigSchema`].
#[derive(Debug, Clone)]
pub struct ConfigPayloadImpl {
    type_name: &'static str,
    fields: &'static [&'static str],
    values: Vec<(&'static str, Value)>,
}

impl EntityPayload for ConfigPayloadImpl {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn field_names(&self) -> &'static [&'static str] {
        self.fields
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        self.values
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| FieldValue::Scalar(v.clone()))
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
        let FieldValue::Scalar(scalar) = value else {
            return Err(EncrError::bad_path(format!("{}.{name} expects a scalar", self.type_name)));
        };
        match self.values.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => {
                *slot = scalar;
                Ok(())
            }
            None => Err(EncrError::bad_path(format!("{} has no field `{name}`", self.type_name))),
        }
    }

    fn clone_box(&self) -> Box<dyn EntityPayload> {
        Box::new(self.clone())
    }

    fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
        if other.type_name() != self.type_name {
            return false;
        }
        self.values.iter().all(|(name, value)| {
            matches!(other.get_field(name), Some(FieldValue::Scalar(ref v)) if v == value)
        })
    }
}

impl ConfigPayload for ConfigPayloadImpl {}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_schema() -> ConfigSchema {
        ConfigSchema::new("Cfg", vec![("threshold", Value::Float(1.0))])
    }

    #[test]
    fn instantiate_uses_provided_value_over_default() {
        let schema = threshold_schema();
        let payload = schema.instantiate(&[("threshold".to_string(), Value::Float(2.0))]);
        assert!(matches!(payload.get_field("threshold"), Some(FieldValue::Scalar(Value::Float(f))) if f == 2.0));
    }

    #[test]
    fn instantiate_falls_back_to_default_for_absent_field() {
        let schema = threshold_schema();
        let payload = schema.instantiate(&[]);
        assert!(matches!(payload.get_field("threshold"), Some(FieldValue::Scalar(Value::Float(f))) if f == 1.0));
    }

    #[test]
    fn payload_eq_compares_values_and_type_name() {
        let schema = threshold_schema();
        let a = schema.instantiate(&[("threshold".to_string(), Value::Float(2.0))]);
        let b = schema.instantiate(&[("threshold".to_string(), Value::Float(2.0))]);
        assert!(a.payload_eq(&b));
        let c = schema.instantiate(&[("threshold".to_string(), Value::Float(3.0))]);
        assert!(!a.payload_eq(&c));
    }
}
