//! Input Composer (C5): turns one call's heterogeneous arguments into a
//! single composite input entity, a dependency-root list, and (when the
//! function declares one) a committed configuration entity.
//!
//! Implements spec.md §4.5's five-step algorithm. Grounded on the same
//! declared-shape-drives-dispatch pattern the teacher's command layer uses
//! (`crates/executor/command.rs`): rather than inspecting argument values at
//! runtime to decide their role, the composer consults the already-computed
//! [`Signature`] and asks only "does this declared name classify as entity,
//! config, or scalar?"

use std::collections::{HashMap, HashSet};

use encr_core::{ContentId, Entity, EncrError, EncrResult, FieldValue, Provenance, Value};
use encr_resolve::{AddressResolver, Resolved};
use encr_store::EntityStore;

use crate::composite::CompositeInputPayload;
use crate::config::ConfigSchema;
use crate::param::ParamKind;
use crate::pattern::InputPattern;
use crate::signature::Signature;

/// One call argument, already classified by the caller (§4.5 step 1: "for
/// each argument, classify the value").
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// A committed entity passed directly.
    Entity(Entity),
    /// A symbolic address string (`@content_id[.path]`).
    Address(String),
    /// A raw scalar.
    Scalar(Value),
}

/// The result of composing one call's arguments (§4.5 step 5).
pub struct ComposedInput {
    /// The not-yet-committed composite input entity. The executor commits
    /// this as a root at the start of `invoke` (§4.6 step 3).
    pub composite: Entity,
    /// Content ids of every tree this call depends on (deduplicated).
    pub dependency_roots: Vec<ContentId>,
    /// The committed configuration entity, if the function declares a
    /// `config`-kind parameter.
    pub config_entity: Option<Entity>,
}

/// Composes call arguments into a [`ComposedInput`] (C5).
pub struct InputComposer<'a> {
    store: &'a EntityStore,
}

impl<'a> InputComposer<'a> {
    /// Construct a composer bound to a store (used to resolve addresses and
    /// to commit the configuration entity, per §4.5 step 3).
    pub fn new(store: &'a EntityStore) -> Self {
        InputComposer { store }
    }

    /// Compose one call's arguments.
    ///
    /// `config_schema` only needs to be `Some` when the call omits the
    /// `config`-kind parameter entirely: it supplies the field schema used
    /// to flatten loose scalar arguments into a configuration entity, or to
    /// fill in defaults for fields the call omitted. A call that binds the
    /// config parameter directly to an existing entity or address needs no
    /// schema at all.
    pub fn compose(
        &self,
        signature: &Signature,
        config_schema: Option<&ConfigSchema>,
        args: &HashMap<String, ArgValue>,
    ) -> EncrResult<ComposedInput> {
        let resolver = AddressResolver::new(self.store);
        let mut dependency_roots = Vec::new();
        let mut consumed: HashSet<String> = HashSet::new();

        let config_entity = match signature.config_param() {
            Some(config_param) => {
                consumed.insert(config_param.name.clone());
                Some(self.compose_config_entity(
                    config_param.name.as_str(),
                    config_schema,
                    args,
                    &resolver,
                    &mut dependency_roots,
                    &mut consumed,
                )?)
            }
            None => None,
        };

        let mut provenance = encr_core::ProvenanceMap::new();
        let mut field_values = Vec::with_capacity(signature.composite_field_names().len());
        for &name in signature.composite_field_names() {
            if consumed.contains(name) {
                field_values.push(None);
                continue;
            }
            let param_kind = signature
                .params
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.kind)
                .expect("composite field names are derived from signature.params");
            let value = match args.get(name) {
                None => None,
                Some(ArgValue::Entity(entity)) => {
                    if param_kind == ParamKind::Scalar {
                        return Err(EncrError::signature_error(
                            name,
                            "a scalar parameter cannot be bound to a whole entity",
                        ));
                    }
                    let content_id = entity.content_id().ok_or_else(|| {
                        EncrError::invariant_violation("direct entity arguments must already be committed")
                    })?;
                    let root_id = entity.identity.root_content_id.unwrap_or(content_id);
                    dependency_roots.push(root_id);
                    provenance.insert(name.to_string(), Provenance::Source(content_id));
                    Some(FieldValue::Entity(entity.clone()))
                }
                Some(ArgValue::Address(address)) => {
                    let resolved = resolver.resolve(address)?;
                    dependency_roots.push(resolved.root_content_id());
                    match resolved {
                        Resolved::Entity { entity, .. } => {
                            if param_kind == ParamKind::Scalar {
                                return Err(EncrError::signature_error(
                                    name,
                                    "a scalar parameter's address must resolve to a field, not a whole entity",
                                ));
                            }
                            let cid = entity
                                .content_id()
                                .expect("addresses resolve only against committed, frozen entities");
                            provenance.insert(name.to_string(), Provenance::Source(cid));
                            Some(FieldValue::Entity(entity))
                        }
                        Resolved::FieldValue { value, source_content_id, .. } => {
                            if param_kind == ParamKind::Entity {
                                return Err(EncrError::signature_error(
                                    name,
                                    "an entity parameter's address must resolve to a whole entity, not a field",
                                ));
                            }
                            provenance.insert(name.to_string(), Provenance::Source(source_content_id));
                            Some(value)
                        }
                    }
                }
                Some(ArgValue::Scalar(value)) => {
                    if param_kind == ParamKind::Entity {
                        return Err(EncrError::signature_error(
                            name,
                            "an entity parameter cannot be bound to a single scalar directly",
                        ));
                    }
                    Some(FieldValue::Scalar(value.clone()))
                }
            };
            field_values.push(value);
        }

        let payload = CompositeInputPayload::new(
            signature.composite_type_name(),
            signature.composite_field_names(),
            field_values,
        );
        let mut composite = Entity::new(Box::new(payload));
        composite.identity.provenance_map = provenance;

        dependency_roots.sort();
        dependency_roots.dedup();

        Ok(ComposedInput {
            composite,
            dependency_roots,
            config_entity,
        })
    }

    fn compose_config_entity(
        &self,
        param_name: &str,
        schema: Option<&ConfigSchema>,
        args: &HashMap<String, ArgValue>,
        resolver: &AddressResolver<'_>,
        dependency_roots: &mut Vec<ContentId>,
        consumed: &mut HashSet<String>,
    ) -> EncrResult<Entity> {
        match args.get(param_name) {
            Some(ArgValue::Entity(entity)) => self.store.put_root(entity.clone()),
            Some(ArgValue::Address(address)) => {
                let resolved = resolver.resolve(address)?;
                match resolved {
                    Resolved::Entity { entity, root_content_id, .. } => {
                        dependency_roots.push(root_content_id);
                        Ok(entity)
                    }
                    Resolved::FieldValue { .. } => Err(EncrError::bad_path(format!(
                        "config parameter `{param_name}` must address a whole entity"
                    ))),
                }
            }
            Some(ArgValue::Scalar(_)) => Err(EncrError::signature_error(
                param_name,
                "a config parameter cannot be bound to a single scalar directly",
            )),
            None => {
                let schema = schema.ok_or_else(|| {
                    EncrError::signature_error(param_name, "config parameter declared without a schema and no value was bound at the call site")
                })?;
                let provided: Vec<(String, Value)> = schema
                    .field_names()
                    .iter()
                    .filter_map(|&field| match args.get(field) {
                        Some(ArgValue::Scalar(v)) => Some((field.to_string(), v.clone())),
                        _ => None,
                    })
                    .collect();
                for &field in schema.field_names() {
                    if args.contains_key(field) {
                        consumed.insert(field.to_string());
                    }
                }
                let payload = schema.instantiate(&provided);
                self.store.put_root(Entity::new(Box::new(payload)))
            }
        }
    }
}
