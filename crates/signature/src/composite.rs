//! The synthesized composite input entity (§4.4, "input entity class"; §4.5
//! step 4).
//!
//! C4 synthesizes, per registered function, an entity class whose payload
//! fields are the function's non-config parameters; C5 instantiates one
//! instance of it per call to carry the call's composed arguments as a
//! single auditable snapshot. Here that synthesized class is
//! [`CompositeInputPayload`] plus a leaked, per-function field list —
//! leaked once when the [`crate::Signature`] is built, not once per call,
//! to satisfy `EntityPayload::field_names`'s `&'static` signature without a
//! derive macro to generate a concrete per-function type.

use encr_core::{EncrError, EntityPayload, FieldValue};

/// Payload for one call's composite input snapshot.
///
/// Field order and names are fixed per function at [`crate::Signature`]
/// construction time (`field_names`, leaked once); `values` holds one entry
/// per declared field, in that same order, for this specific call.
#[derive(Debug, Clone)]
pub struct CompositeInputPayload {
    type_name: &'static str,
    field_names: &'static [&'static str],
    values: Vec<Option<FieldValue>>,
}

impl CompositeInputPayload {
    /// Construct a composite input payload. `values` must have the same
    /// length as `field_names`, in the same order; a `None` slot means the
    /// corresponding parameter was omitted (had a default and was not
    /// supplied at the call site).
    pub fn new(type_name: &'static str, field_names: &'static [&'static str], values: Vec<Option<FieldValue>>) -> Self {
        debug_assert_eq!(field_names.len(), values.len());
        CompositeInputPayload {
            type_name,
            field_names,
            values,
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|f| *f == name)
    }
}

impl EntityPayload for CompositeInputPayload {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn field_names(&self) -> &'static [&'static str] {
        self.field_names
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        self.index_of(name).and_then(|i| self.values[i].clone())
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EncrError> {
        match self.index_of(name) {
            Some(i) => {
                self.values[i] = Some(value);
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
        self.field_names.iter().all(|&name| {
            match (self.get_field(name), other.get_field(name)) {
                (None, None) => true,
                (Some(a), Some(b)) => field_value_eq(&a, &b),
                _ => false,
            }
        })
    }
}

fn field_value_eq(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Scalar(x), FieldValue::Scalar(y)) => x == y,
        (FieldValue::Entity(x), FieldValue::Entity(y)) => x.payload.payload_eq(y.payload.as_ref()),
        (FieldValue::Sequence(x), FieldValue::Sequence(y)) | (FieldValue::Set(x), FieldValue::Set(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| field_value_eq(a, b))
        }
        (FieldValue::Mapping(x), FieldValue::Mapping(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && field_value_eq(va, vb))
        }
        _ => false,
    }
}

/// Leak a per-function type name once, at [`crate::Signature`] construction
/// time. Intentionally bounded: called once per `register`, never per call.
pub fn leak_type_name(function_name: &str) -> &'static str {
    Box::leak(format!("CompositeInputOf_{function_name}").into_boxed_str())
}

/// Leak a per-function field-name list once, at [`crate::Signature`]
/// construction time.
pub fn leak_field_names(names: Vec<String>) -> &'static [&'static str] {
    let leaked: Vec<&'static str> = names.into_iter().map(|n| -> &'static str { Box::leak(n.into_boxed_str()) }).collect();
    Box::leak(leaked.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use encr_core::Value;

    #[test]
    fn get_and_set_round_trip_by_name() {
        let fields = leak_field_names(vec!["a".to_string(), "b".to_string()]);
        let mut payload = CompositeInputPayload::new(
            leak_type_name("concat"),
            fields,
            vec![Some(FieldValue::Scalar(Value::string("x"))), None],
        );
        assert!(payload.get_field("b").is_none());
        payload.set_field("b", FieldValue::Scalar(Value::string("y"))).unwrap();
        assert!(matches!(payload.get_field("b"), Some(FieldValue::Scalar(Value::String(s))) if s == "y"));
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        let fields = leak_field_names(vec!["a".to_string()]);
        let mut payload = CompositeInputPayload::new(leak_type_name("f"), fields, vec![None]);
        assert!(payload.set_field("nope", FieldValue::Scalar(Value::Null)).is_err());
    }

    #[test]
    fn payload_eq_compares_by_field_value() {
        let fields = leak_field_names(vec!["a".to_string()]);
        let p1 = CompositeInputPayload::new(leak_type_name("g"), fields, vec![Some(FieldValue::Scalar(Value::Int(1)))]);
        let p2 = CompositeInputPayload::new(leak_type_name("g"), fields, vec![Some(FieldValue::Scalar(Value::Int(1)))]);
        assert!(p1.payload_eq(&p2));
    }
}
