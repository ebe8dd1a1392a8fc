//! Executor (C6): runs spec.md §4.6's eleven-step `invoke` sequence.
//!
//! Grounded on the teacher's own `executor.rs`: one lock held across
//! validation, the call itself, and the commit, with every step either
//! fully applied or not applied at all. Here the lock is the store-wide
//! `parking_lot::Mutex` inside [`EntityStore`] (§5) rather than a
//! per-branch transaction guard.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use encr_core::{ContentId, EncrError, EncrResult, Entity, EntityPayload, FieldValue, InstanceId, IDS};
use encr_signature::{ArgValue, ComposedInput, ConfigSchema, InputComposer, ParamKind, Signature};
use encr_store::EntityStore;

use crate::args::CallArgs;
use crate::ledger::{ExecutionLedger, SemanticClassification, SuccessDetails};
use crate::outcome::CallOutcome;
use crate::unpack::{build_container, unpack};

/// A registered handler: takes the call's working copies and scalars,
/// returns the shape declared at registration or an error.
pub type Handler = dyn Fn(CallArgs) -> EncrResult<CallOutcome> + Send + Sync;

/// What `invoke` hands back to the caller (§4.6 step 11).
pub enum InvokeOutput {
    /// B1/B7: exactly one entity, regardless of the caller's `unpack` flag.
    Single(Entity),
    /// Any other shape with `unpack=true`: the flattened primary entities.
    Many(Vec<Entity>),
    /// Any other shape with `unpack=false`: the container entity carrying
    /// the original return shape.
    Container(Entity),
}

impl InvokeOutput {
    /// The primary entities this call produced, regardless of unpacking —
    /// `Container` is expanded back to its slot entities via the lookups
    /// already performed at commit time. Convenience for callers that don't
    /// care about the unpack/no-unpack distinction.
    pub fn into_single(self) -> Option<Entity> {
        match self {
            InvokeOutput::Single(e) => Some(e),
            InvokeOutput::Container(e) => Some(e),
            InvokeOutput::Many(mut v) if v.len() == 1 => v.pop(),
            InvokeOutput::Many(_) => None,
        }
    }
}

/// Runs one `invoke` call end to end (C6).
pub struct Executor<'a> {
    store: &'a EntityStore,
    invocation_timeout: Duration,
}

impl<'a> Executor<'a> {
    /// Bind an executor to a store, bounding how long a single handler call
    /// may run before the executor treats the call as failed.
    pub fn new(store: &'a EntityStore, invocation_timeout: Duration) -> Self {
        Executor { store, invocation_timeout }
    }

    /// Run one call against `signature`, composing `args`, invoking
    /// `handler`, classifying and committing its result, and recording an
    /// execution-ledger entry (§4.6).
    pub fn invoke(
        &self,
        signature: &Signature,
        config_schema: Option<&ConfigSchema>,
        handler: &Handler,
        args: HashMap<String, ArgValue>,
        unpack_result: bool,
    ) -> EncrResult<InvokeOutput> {
        let execution_id = IDS.next_execution();
        let span = tracing::debug_span!("invoke", function = %signature.function_name, execution = %execution_id);
        let _enter = span.enter();

        // Step 2: compose this call's arguments (C5).
        tracing::debug!("composing input");
        let composer = InputComposer::new(self.store);
        let composed: ComposedInput = composer.compose(signature, config_schema, &args)?;

        // Step 3: commit the composite input snapshot as a root.
        let committed_input = self.store.put_root(composed.composite.clone())?;
        let input_root_id = committed_input
            .content_id()
            .expect("put_root always stamps a content id");
        let config_ids: Vec<ContentId> = composed.config_entity.iter().filter_map(|e| e.content_id()).collect();

        // Step 4: obtain working copies for every entity/config-kind
        // parameter and record the identity map used for classification.
        tracing::debug!("preparing working copies");
        let mut identity_map: HashMap<InstanceId, ContentId> = HashMap::new();
        let mut call_entities: HashMap<String, Entity> = HashMap::new();
        let mut call_scalars: HashMap<String, encr_core::Value> = HashMap::new();
        let mut call_config: Option<Entity> = None;

        for param in &signature.params {
            match param.kind {
                ParamKind::Entity => {
                    let bound = match committed_input.payload.get_field(&param.name) {
                        Some(FieldValue::Entity(e)) => e,
                        _ => {
                            return Err(EncrError::signature_error(
                                &signature.function_name,
                                format!("missing entity argument `{}`", param.name),
                            ))
                        }
                    };
                    let cid = bound.content_id().expect("composed entity fields are committed");
                    let for_handler = self
                        .store
                        .get_frozen(cid)
                        .ok_or_else(|| EncrError::not_found(format!("committed entity {cid} disappeared")))?;
                    identity_map.insert(for_handler.identity.instance_id, cid);
                    call_entities.insert(param.name.clone(), for_handler);
                }
                ParamKind::Config => {
                    if let Some(config_entity) = &composed.config_entity {
                        let cid = config_entity.content_id().expect("config entity is committed");
                        let for_handler = self
                            .store
                            .get_frozen(cid)
                            .ok_or_else(|| EncrError::not_found(format!("committed config entity {cid} disappeared")))?;
                        identity_map.insert(for_handler.identity.instance_id, cid);
                        call_config = Some(for_handler);
                    }
                }
                ParamKind::Scalar => {
                    if let Some(FieldValue::Scalar(v)) = committed_input.payload.get_field(&param.name) {
                        call_scalars.insert(param.name.clone(), v);
                    }
                }
            }
        }

        // Step 5/6: invoke the handler, timing it for the ledger.
        tracing::debug!("invoking handler");
        let call_args = CallArgs::new(call_entities, call_config, call_scalars);
        let start = Instant::now();
        let outcome = handler(call_args);
        let duration = start.elapsed();

        let raw = match outcome {
            Ok(_) if duration > self.invocation_timeout => {
                tracing::warn!(?duration, timeout = ?self.invocation_timeout, "handler exceeded invocation timeout");
                let message = format!(
                    "handler ran for {duration:?}, exceeding the configured invocation timeout of {:?}",
                    self.invocation_timeout
                );
                let ledger = ExecutionLedger::new(self.store);
                ledger.record_failure(
                    execution_id,
                    &signature.function_name,
                    input_root_id,
                    config_ids,
                    duration,
                    signature.input_pattern,
                    &message,
                )?;
                return Err(EncrError::execution_failed(&signature.function_name, execution_id, input_root_id, message));
            }
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "handler returned an error");
                let message = err.to_string();
                let ledger = ExecutionLedger::new(self.store);
                ledger.record_failure(
                    execution_id,
                    &signature.function_name,
                    input_root_id,
                    config_ids,
                    duration,
                    signature.input_pattern,
                    &message,
                )?;
                return Err(EncrError::execution_failed(&signature.function_name, execution_id, input_root_id, message));
            }
        };

        // Step 7: validate and flatten the return value against the
        // declared output descriptor.
        let unpacked = unpack(signature.output.pattern, signature.output.expected_entity_count, raw)?;

        // Step 8: classify and commit each primary entity.
        tracing::debug!(count = unpacked.primaries.len(), "classifying and committing primaries");
        let mut committed_primaries = Vec::with_capacity(unpacked.primaries.len());
        let mut classifications = Vec::with_capacity(unpacked.primaries.len());
        for primary in unpacked.primaries {
            let (committed, classification) = classify_and_commit(self.store, primary, &identity_map, &composed.dependency_roots)?;
            committed_primaries.push(committed);
            classifications.push(classification);
        }

        // Step 9: link siblings now that every primary has a final content
        // id.
        let sibling_cids: Vec<ContentId> = committed_primaries
            .iter()
            .map(|e| e.content_id().expect("just committed"))
            .collect();
        let multi = committed_primaries.len() > 1;
        let mut final_primaries = Vec::with_capacity(committed_primaries.len());
        for (i, primary) in committed_primaries.into_iter().enumerate() {
            let cid = primary.content_id().expect("just committed");
            let siblings: Vec<ContentId> = sibling_cids.iter().copied().filter(|&c| c != cid).collect();
            let stamped = self.store.stamp_execution_metadata(
                cid,
                &signature.function_name,
                execution_id,
                if multi { Some(i) } else { None },
                siblings,
            )?;
            final_primaries.push(stamped);
        }

        let container = unpacked.shape.as_ref().map(|shape| build_container(shape, &final_primaries));
        let committed_container = match container {
            Some(c) => Some(self.store.put_root(c)?),
            None => None,
        };

        // Step 10: record the ledger entry.
        tracing::debug!("recording execution ledger entry");
        let ledger = ExecutionLedger::new(self.store);
        ledger.record_success(
            execution_id,
            &signature.function_name,
            input_root_id,
            config_ids,
            duration,
            signature.input_pattern,
            signature.output.pattern,
            SuccessDetails {
                output_root_ids: sibling_cids,
                semantic_classifications: classifications,
                was_unpacked: unpack_result,
                original_return_shape: unpacked.shape.as_ref().map(|s| s.tag).unwrap_or("single"),
            },
        )?;

        // Step 11: shape the return value.
        if !signature.output.pattern.supports_unpacking() {
            return Ok(InvokeOutput::Single(
                final_primaries.into_iter().next().expect("B1/B7 always produce one primary"),
            ));
        }
        if unpack_result {
            Ok(InvokeOutput::Many(final_primaries))
        } else {
            Ok(InvokeOutput::Container(
                committed_container.expect("non-B1/B7 shapes always build a container"),
            ))
        }
    }
}

fn classify_and_commit(
    store: &EntityStore,
    primary: Entity,
    identity_map: &HashMap<InstanceId, ContentId>,
    dependency_roots: &[ContentId],
) -> EncrResult<(Entity, SemanticClassification)> {
    if identity_map.contains_key(&primary.identity.instance_id) {
        let committed = store.version(primary)?;
        return Ok((committed, SemanticClassification::Mutation));
    }

    if let Some(cid) = primary.content_id() {
        if let Some(root_cid) = store.root_of(cid) {
            if dependency_roots.contains(&root_cid) {
                let committed_root = store
                    .get_frozen(root_cid)
                    .ok_or_else(|| EncrError::invariant_violation(format!("dependency root {root_cid} vanished from the store")))?;
                let detached_parent = remove_member(committed_root, cid)?;
                store.version(detached_parent)?;
                let promoted = store.put_root(primary)?;
                return Ok((promoted, SemanticClassification::Detachment));
            }
        }
    }

    let committed = store.put_root(primary)?;
    Ok((committed, SemanticClassification::Creation))
}

/// Remove the member with content id `target` from somewhere inside
/// `root`'s tree, returning the modified root. Used to commit the
/// now-orphaned parent side of a detachment (§4.6 step 8).
fn remove_member(mut root: Entity, target: ContentId) -> EncrResult<Entity> {
    if remove_in_payload(&mut root, target) {
        Ok(root)
    } else {
        Err(EncrError::invariant_violation(format!(
            "detached entity {target} was not found inside its reported parent tree"
        )))
    }
}

fn remove_in_payload(entity: &mut Entity, target: ContentId) -> bool {
    let field_names: Vec<&'static str> = entity.payload.field_names().to_vec();
    for name in field_names {
        let Some(value) = entity.payload.get_field(name) else { continue };
        if !value.holds_entities() {
            continue;
        }
        let (new_value, found) = remove_in_field(value, target);
        if found {
            let _ = entity.payload.set_field(name, new_value);
            return true;
        }
    }
    false
}

fn remove_in_field(value: FieldValue, target: ContentId) -> (FieldValue, bool) {
    match value {
        FieldValue::Sequence(items) => remove_in_list(items, target, FieldValue::Sequence),
        FieldValue::Set(items) => remove_in_list(items, target, FieldValue::Set),
        FieldValue::Mapping(entries) => {
            let mut found = false;
            let mut out = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                if !found && matches!(&value, FieldValue::Entity(e) if e.content_id() == Some(target)) {
                    found = true;
                    continue;
                }
                let (value, inner_found) = if found { (value, false) } else { remove_in_field(value, target) };
                found = found || inner_found;
                out.push((key, value));
            }
            (FieldValue::Mapping(out), found)
        }
        FieldValue::Entity(mut e) => {
            let found = remove_in_payload(&mut e, target);
            (FieldValue::Entity(e), found)
        }
        scalar @ FieldValue::Scalar(_) => (scalar, false),
    }
}

fn remove_in_list(
    items: Vec<FieldValue>,
    target: ContentId,
    rewrap: fn(Vec<FieldValue>) -> FieldValue,
) -> (FieldValue, bool) {
    let mut found = false;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if !found && matches!(&item, FieldValue::Entity(e) if e.content_id() == Some(target)) {
            found = true;
            continue;
        }
        let (item, inner_found) = if found { (item, false) } else { remove_in_field(item, target) };
        found = found || inner_found;
        out.push(item);
    }
    (rewrap(out), found)
}
