//! Execution Ledger (C8): commits one audit record per `invoke` call (§4.8).
//!
//! The record is itself an entity, stored like any other (§3, "Execution
//! record"): it goes through the same [`EntityStore::put_root`] as
//! user-defined payloads, so its own history is queryable the same way.
//! Grounded on the teacher's append-only `EventLog` primitive
//! (`crates/primitives/src/event_log.rs`): one immutable record per logical
//! event, never mutated after it is written.

use encr_core::{ContentId, EncrError, EncrResult, Entity, EntityPayload, ExecutionId, FieldValue, LineageId, Value};
use encr_signature::{InputPattern, OutputPattern};
use encr_store::EntityStore;
use std::str::FromStr;
use std::time::Duration;

/// How the executor classified one primary entity (§4.6 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticClassification {
    /// The handler returned a working copy unchanged (in identity terms)
    /// from one of its own entity/config parameters.
    Mutation,
    /// The handler returned a brand-new entity never previously committed.
    Creation,
    /// The handler returned a sub-entity pulled out of one of its
    /// parameters' trees.
    Detachment,
}

impl SemanticClassification {
    fn as_str(self) -> &'static str {
        match self {
            SemanticClassification::Mutation => "mutation",
            SemanticClassification::Creation => "creation",
            SemanticClassification::Detachment => "detachment",
        }
    }
}

fn input_pattern_tag(p: InputPattern) -> &'static str {
    match p {
        InputPattern::PureBorrowing => "pure_borrowing",
        InputPattern::SingleEntityDirect => "single_entity_direct",
        InputPattern::SingleEntityWithConfig => "single_entity_with_config",
        InputPattern::MultiEntityComposite => "multi_entity_composite",
        InputPattern::PureConfig => "pure_config",
    }
}

fn output_pattern_tag(p: OutputPattern) -> &'static str {
    match p {
        OutputPattern::B1Single => "single",
        OutputPattern::B2FixedTuple => "fixed_tuple",
        OutputPattern::B3Sequence => "sequence",
        OutputPattern::B4Mapping => "mapping",
        OutputPattern::B5MixedTuple => "mixed_tuple",
        OutputPattern::B6Nested => "nested",
        OutputPattern::B7NonEntity => "non_entity",
    }
}

/// Payload of one execution record (§3, §4.8).
#[derive(Debug, Clone)]
pub struct ExecutionRecordPayload {
    execution_id: ExecutionId,
    function_name: String,
    input_root_id: ContentId,
    config_ids: Vec<ContentId>,
    output_root_ids: Vec<ContentId>,
    duration: Duration,
    succeeded: bool,
    error_message: Option<String>,
    input_pattern: &'static str,
    output_pattern: &'static str,
    semantic_classifications: Vec<SemanticClassification>,
    was_unpacked: bool,
    sibling_groups: Vec<Vec<ContentId>>,
    original_return_shape: &'static str,
    touched_lineages: Vec<LineageId>,
}

const FIELDS: &[&str] = &[
    "execution_id",
    "function_name",
    "input_root_id",
    "config_ids",
    "output_root_ids",
    "duration_secs",
    "succeeded",
    "error_message",
    "input_pattern",
    "output_pattern",
    "semantic_classifications",
    "was_unpacked",
    "sibling_groups",
    "original_return_shape",
    "touched_lineages",
];

fn ids_to_value<I: std::fmt::Display>(ids: &[I]) -> Value {
    Value::Array(ids.iter().map(|id| Value::string(id.to_string())).collect())
}

impl EntityPayload for ExecutionRecordPayload {
    fn type_name(&self) -> &'static str {
        "ExecutionRecord"
    }

    fn field_names(&self) -> &'static [&'static str] {
        FIELDS
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "execution_id" => Value::string(self.execution_id.to_string()),
            "function_name" => Value::string(&self.function_name),
            "input_root_id" => Value::string(self.input_root_id.to_string()),
            "config_ids" => ids_to_value(&self.config_ids),
            "output_root_ids" => ids_to_value(&self.output_root_ids),
            "duration_secs" => Value::Float(self.duration.as_secs_f64()),
            "succeeded" => Value::Bool(self.succeeded),
            "error_message" => self.error_message.clone().map(Value::String).unwrap_or(Value::Null),
            "input_pattern" => Value::string(self.input_pattern),
            "output_pattern" => Value::string(self.output_pattern),
            "semantic_classifications" => Value::Array(
                self.semantic_classifications
                    .iter()
                    .map(|c| Value::string(c.as_str()))
                    .collect(),
            ),
            "was_unpacked" => Value::Bool(self.was_unpacked),
            "sibling_groups" => {
                Value::Array(self.sibling_groups.iter().map(|g| ids_to_value(g)).collect())
            }
            "original_return_shape" => Value::string(self.original_return_shape),
            "touched_lineages" => ids_to_value(&self.touched_lineages),
            _ => return None,
        };
        Some(FieldValue::Scalar(value))
    }

    fn set_field(&mut self, name: &str, _value: FieldValue) -> Result<(), EncrError> {
        Err(EncrError::bad_path(format!(
            "ExecutionRecord.{name} is immutable once written"
        )))
    }

    fn clone_box(&self) -> Box<dyn EntityPayload> {
        Box::new(self.clone())
    }

    fn payload_eq(&self, other: &dyn EntityPayload) -> bool {
        other.type_name() == self.type_name()
            && FIELDS
                .iter()
                .all(|&name| self.get_field(name).map(|v| scalar_eq(&v, other.get_field(name).as_ref())).unwrap_or(false))
    }
}

fn scalar_eq(a: &FieldValue, b: Option<&FieldValue>) -> bool {
    match (a, b) {
        (FieldValue::Scalar(x), Some(FieldValue::Scalar(y))) => x == y,
        _ => false,
    }
}

/// Builds and commits execution records (C8).
pub struct ExecutionLedger<'a> {
    store: &'a EntityStore,
}

/// Everything the success path needs to populate an execution record, beyond
/// what [`record_failure`](ExecutionLedger::record_failure) already takes.
pub struct SuccessDetails {
    /// Final committed content ids of this call's primary entities.
    pub output_root_ids: Vec<ContentId>,
    /// One classification per primary, same order as `output_root_ids`.
    pub semantic_classifications: Vec<SemanticClassification>,
    /// `true` if the caller requested (and received) unpacked primaries
    /// rather than a single container entity.
    pub was_unpacked: bool,
    /// The original return shape's tag, for rebuilding intent even when the
    /// caller chose unpacking.
    pub original_return_shape: &'static str,
}

impl<'a> ExecutionLedger<'a> {
    /// Bind a ledger to a store.
    pub fn new(store: &'a EntityStore) -> Self {
        ExecutionLedger { store }
    }

    /// Commit a failure record (§4.6 step 5: "update the ledger entry with
    /// `succeeded=false` ... commit it").
    pub fn record_failure(
        &self,
        execution_id: ExecutionId,
        function_name: &str,
        input_root_id: ContentId,
        config_ids: Vec<ContentId>,
        duration: Duration,
        input_pattern: InputPattern,
        message: &str,
    ) -> EncrResult<Entity> {
        let touched_lineages = self.lineages_of(&config_ids);
        let payload = ExecutionRecordPayload {
            execution_id,
            function_name: function_name.to_string(),
            input_root_id,
            config_ids,
            output_root_ids: Vec::new(),
            duration,
            succeeded: false,
            error_message: Some(message.to_string()),
            input_pattern: input_pattern_tag(input_pattern),
            output_pattern: "",
            semantic_classifications: Vec::new(),
            was_unpacked: false,
            sibling_groups: Vec::new(),
            original_return_shape: "",
            touched_lineages,
        };
        self.store.put_root(Entity::new(Box::new(payload)))
    }

    /// Commit a success record (§4.6 step 10).
    #[allow(clippy::too_many_arguments)]
    pub fn record_success(
        &self,
        execution_id: ExecutionId,
        function_name: &str,
        input_root_id: ContentId,
        config_ids: Vec<ContentId>,
        duration: Duration,
        input_pattern: InputPattern,
        output_pattern: OutputPattern,
        details: SuccessDetails,
    ) -> EncrResult<Entity> {
        let mut touched = config_ids.clone();
        touched.extend(details.output_root_ids.iter().copied());
        let touched_lineages = self.lineages_of(&touched);
        let sibling_groups = if details.output_root_ids.len() > 1 {
            vec![details.output_root_ids.clone()]
        } else {
            Vec::new()
        };
        let payload = ExecutionRecordPayload {
            execution_id,
            function_name: function_name.to_string(),
            input_root_id,
            config_ids,
            output_root_ids: details.output_root_ids,
            duration,
            succeeded: true,
            error_message: None,
            input_pattern: input_pattern_tag(input_pattern),
            output_pattern: output_pattern_tag(output_pattern),
            semantic_classifications: details.semantic_classifications,
            was_unpacked: details.was_unpacked,
            sibling_groups,
            original_return_shape: details.original_return_shape,
            touched_lineages,
        };
        self.store.put_root(Entity::new(Box::new(payload)))
    }

    fn lineages_of(&self, content_ids: &[ContentId]) -> Vec<LineageId> {
        content_ids
            .iter()
            .filter_map(|&cid| self.store.get_frozen(cid))
            .map(|e| e.lineage_id())
            .collect()
    }

    /// Every committed execution record whose `touched_lineages` includes
    /// `lineage_id` (SPEC_FULL.md §3 supplemental helper).
    pub fn executions_for(&self, lineage_id: LineageId) -> Vec<Entity> {
        self.store
            .roots()
            .into_iter()
            .filter_map(|cid| self.store.get_frozen(cid))
            .filter(|e| e.payload.type_name() == "ExecutionRecord")
            .filter(|e| matches!(
                e.payload.get_field("touched_lineages"),
                Some(FieldValue::Scalar(Value::Array(items))) if items.iter().any(|v| matches!(v, Value::String(s) if s.parse::<LineageId>().map(|l| l == lineage_id).unwrap_or(false)))
            ))
            .collect()
    }

    /// Every committed execution record with `succeeded=false` (SPEC_FULL.md
    /// §3 supplemental helper).
    pub fn failed_executions(&self) -> Vec<Entity> {
        self.store
            .roots()
            .into_iter()
            .filter_map(|cid| self.store.get_frozen(cid))
            .filter(|e| e.payload.type_name() == "ExecutionRecord")
            .filter(|e| matches!(e.payload.get_field("succeeded"), Some(FieldValue::Scalar(Value::Bool(false)))))
            .collect()
    }
}
