//! End-to-end scenarios S1-S6 from spec.md §8, exercised against the public
//! `encr` facade exactly as an embedder would use it: register a handler,
//! commit some entities, invoke, and inspect what the registry committed.

use std::collections::HashMap;

use encr::{
    ArgValue, CallOutcome, ConfigSchema, Entity, EntityPayload, FieldValue, OutcomeSlot, OutputDescriptor, ParamSpec,
    Registry, RegistryConfig, Value,
};
use encr_core::entity::test_support::{Analysis, Bag, Counter, Item, Metrics, Num, Record, Rec, Student};

fn registry() -> Registry {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Registry::new(RegistryConfig::for_testing())
}

fn args(pairs: Vec<(&str, ArgValue)>) -> HashMap<String, ArgValue> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn field_str(e: &Entity, name: &str) -> String {
    match e.payload.get_field(name) {
        Some(FieldValue::Scalar(Value::String(s))) => s,
        other => panic!("expected a string field `{name}`, got {other:?}"),
    }
}

/// S1: pure borrowing. `concat(a, b) -> Record` reads two field values off
/// two committed entities by address and produces a brand-new entity.
#[test]
fn s1_pure_borrowing_concatenates_addressed_fields() {
    let mut registry = registry();
    registry
        .register(
            "concat",
            vec![ParamSpec::scalar("a"), ParamSpec::scalar("b")],
            OutputDescriptor::single(),
            None,
            |call_args| {
                let Some(Value::String(a)) = call_args.scalar("a") else {
                    panic!("expected string scalar `a`");
                };
                let Some(Value::String(b)) = call_args.scalar("b") else {
                    panic!("expected string scalar `b`");
                };
                let text = format!("{a}{b}");
                Ok(CallOutcome::Single(Entity::new(Box::new(Record::new(text)))))
            },
        )
        .unwrap();

    let e1 = registry.put(Entity::new(Box::new(Record::new("Ada")))).unwrap();
    let e2 = registry.put(Entity::new(Box::new(Record::new("Lovelace")))).unwrap();

    let call_args = args(vec![
        ("a", ArgValue::Address(format!("@{}.text", e1.content_id().unwrap()))),
        ("b", ArgValue::Address(format!("@{}.text", e2.content_id().unwrap()))),
    ]);
    let output = registry.invoke("concat", call_args).unwrap();
    let result = output.into_single().unwrap();

    assert_eq!(field_str(&result, "text"), "AdaLovelace");
    assert!(result.identity.provenance_map.get("text").is_none());
    assert_ne!(result.identity.lineage_id, e1.identity.lineage_id);
    assert_ne!(result.identity.lineage_id, e2.identity.lineage_id);

    let executions = registry.executions_for(result.identity.lineage_id);
    assert_eq!(executions.len(), 1);
    assert!(matches!(
        executions[0].payload.get_field("input_pattern"),
        Some(FieldValue::Scalar(Value::String(ref s))) if s == "pure_borrowing"
    ));
    let source_executions = registry.executions_for(e1.identity.lineage_id);
    assert!(source_executions.is_empty(), "e1 was only ever read by address, not versioned or produced");

    assert!(registry.failed_executions().is_empty());
}

/// S2: single-entity mutation. `bump(counter) -> Counter` increments `n` on
/// the same underlying object it was handed.
#[test]
fn s2_single_entity_mutation_produces_a_new_version_in_place() {
    let mut registry = registry();
    registry
        .register("bump", vec![ParamSpec::entity("counter")], OutputDescriptor::single(), None, |mut call_args| {
            let mut counter = call_args.take_entity("counter").unwrap();
            let FieldValue::Scalar(Value::Int(n)) = counter.payload.get_field("n").unwrap() else {
                panic!("expected int field `n`");
            };
            counter.payload.set_field("n", FieldValue::Scalar(Value::Int(n + 1))).unwrap();
            Ok(CallOutcome::Single(counter))
        })
        .unwrap();

    let c0 = registry.put(Entity::new(Box::new(Counter { n: 0 }))).unwrap();
    let call_args = args(vec![("counter", ArgValue::Entity(c0.clone()))]);
    let output = registry.invoke("bump", call_args).unwrap();
    let c1 = output.into_single().unwrap();

    assert!(matches!(c1.payload.get_field("n"), Some(FieldValue::Scalar(Value::Int(1)))));
    assert_eq!(c1.identity.lineage_id, c0.identity.lineage_id);
    assert_eq!(c1.identity.prior_content_id, c0.content_id());
    assert_ne!(c1.content_id(), c0.content_id());

    let history = registry.history(c0.identity.lineage_id);
    assert_eq!(history, vec![c0.content_id().unwrap(), c1.content_id().unwrap()]);

    let executions = registry.executions_for(c0.identity.lineage_id);
    assert_eq!(executions.len(), 1);
    assert!(matches!(
        executions[0].payload.get_field("semantic_classifications"),
        Some(FieldValue::Scalar(Value::Array(ref items)))
            if items.len() == 1 && items[0] == Value::string("mutation")
    ));
}

/// S3: detachment. `extract_first(list) -> Item` pulls the first item out of
/// a bag of two, leaving the bag re-versioned with one item and the
/// extracted item standing alone as its own root.
#[test]
fn s3_detachment_reparents_the_extracted_item_and_versions_the_parent() {
    let mut registry = registry();
    registry
        .register("extract_first", vec![ParamSpec::entity("list")], OutputDescriptor::single(), None, |mut call_args| {
            let mut bag = call_args.take_entity("list").unwrap();
            let FieldValue::Sequence(items) = bag.payload.get_field("items").unwrap() else {
                panic!("expected sequence field `items`");
            };
            let mut items = items;
            let FieldValue::Entity(first) = items.remove(0) else {
                panic!("expected entity in items");
            };
            bag.payload
                .set_field("items", FieldValue::Sequence(items))
                .unwrap();
            Ok(CallOutcome::Single(first))
        })
        .unwrap();

    let item_a = Entity::new(Box::new(Item { label: "a".into() }));
    let item_b = Entity::new(Box::new(Item { label: "b".into() }));
    let b0 = registry
        .put(Entity::new(Box::new(Bag { items: vec![item_a, item_b] })))
        .unwrap();

    let call_args = args(vec![("list", ArgValue::Entity(b0.clone()))]);
    let output = registry.invoke("extract_first", call_args).unwrap();
    let extracted = output.into_single().unwrap();

    assert_eq!(extracted.identity.root_content_id, extracted.content_id());
    assert!(matches!(extracted.payload.get_field("label"), Some(FieldValue::Scalar(Value::String(ref s))) if s == "a"));

    let b1 = registry
        .history(b0.identity.lineage_id)
        .last()
        .copied()
        .and_then(|cid| registry.get(cid))
        .unwrap();
    let FieldValue::Sequence(remaining) = b1.payload.get_field("items").unwrap() else {
        panic!("expected sequence field `items`");
    };
    assert_eq!(remaining.len(), 1);
    assert!(matches!(
        &remaining[0],
        FieldValue::Entity(e) if matches!(e.payload.get_field("label"), Some(FieldValue::Scalar(Value::String(ref s))) if s == "b")
    ));

    // The ledger touches the extracted item's own lineage (it is a primary
    // output), not the re-versioned parent's — the parent is spliced and
    // re-committed as a side effect of detachment, not returned as a
    // primary itself (spec.md §4.6 step 8).
    let executions = registry.executions_for(extracted.identity.lineage_id);
    assert_eq!(executions.len(), 1);
    assert!(matches!(
        executions[0].payload.get_field("semantic_classifications"),
        Some(FieldValue::Scalar(Value::Array(ref items)))
            if items == &vec![Value::string("detachment")]
    ));
}

/// S4: multi-entity unpacking. `split(s, cfg) -> (Analysis, [Rec], Metrics)`
/// mixes a direct B5-style tuple return with an on-demand configuration
/// entity built from loose scalars.
#[test]
fn s4_multi_entity_unpacking_links_siblings_and_builds_the_config_entity() {
    let mut registry = registry();
    let schema = ConfigSchema::new("Cfg", vec![("threshold", Value::Float(1.0))]);
    registry
        .register(
            "split",
            vec![ParamSpec::entity("s"), ParamSpec::config("cfg")],
            OutputDescriptor::mixed_tuple(3),
            Some(schema),
            |mut call_args| {
                let student = call_args.take_entity("s").unwrap();
                let cfg = call_args.config().unwrap();
                let FieldValue::Scalar(Value::Float(threshold)) = cfg.payload.get_field("threshold").unwrap() else {
                    panic!("expected float field `threshold`");
                };
                let FieldValue::Scalar(Value::Array(grades)) = student.payload.get_field("grades").unwrap() else {
                    panic!("expected array field `grades`");
                };
                let grades: Vec<i64> = grades
                    .into_iter()
                    .map(|v| match v {
                        Value::Int(i) => i,
                        _ => panic!("expected int grade"),
                    })
                    .collect();
                let mean = grades.iter().sum::<i64>() as f64 / grades.len() as f64;
                let above = grades.iter().filter(|&&g| (g as f64) > threshold).count() as i64;
                let recs: Vec<Entity> = grades
                    .iter()
                    .filter(|&&g| (g as f64) > threshold)
                    .map(|&g| Entity::new(Box::new(Rec { grade: g })))
                    .collect();
                Ok(CallOutcome::Tuple(vec![
                    OutcomeSlot::Entity(Entity::new(Box::new(Analysis { mean }))),
                    OutcomeSlot::Entity(Entity::new(Box::new(Bag { items: recs }))),
                    OutcomeSlot::Entity(Entity::new(Box::new(Metrics { above_threshold: above }))),
                ]))
            },
        )
        .unwrap();

    let s0 = registry
        .put(Entity::new(Box::new(Student {
            name: "Grace".into(),
            grades: vec![1, 2, 3, 4],
        })))
        .unwrap();

    let call_args = args(vec![
        ("s", ArgValue::Entity(s0.clone())),
        ("threshold", ArgValue::Scalar(Value::Float(2.0))),
    ]);
    let output = registry.invoke("split", call_args).unwrap();
    let primaries = match output {
        encr::InvokeOutput::Many(v) => v,
        other => panic!("expected an unpacked multi-entity return, got {other:?}"),
    };
    assert_eq!(primaries.len(), 3);

    let execution_id = primaries[0].identity.derived_from_execution;
    assert!(execution_id.is_some());
    for (i, primary) in primaries.iter().enumerate() {
        assert_eq!(primary.identity.derived_from_execution, execution_id);
        assert_eq!(primary.identity.output_index, Some(i));
        let siblings = registry.siblings(primary);
        assert_eq!(siblings.len(), 2);
        for sibling in &siblings {
            assert_ne!(sibling.content_id(), primary.content_id());
        }
    }

    // `s0`'s own lineage isn't touched (it was read, not mutated or
    // reparented); the ledger's `touched_lineages` cover the config entity
    // and the freshly-created primaries instead.
    let executions = registry.executions_for(primaries[0].identity.lineage_id);
    assert_eq!(executions.len(), 1);
    let record = &executions[0];
    assert!(matches!(
        record.payload.get_field("input_pattern"),
        Some(FieldValue::Scalar(Value::String(ref s))) if s == "single_entity_with_config"
    ));
    assert!(matches!(
        record.payload.get_field("config_ids"),
        Some(FieldValue::Scalar(Value::Array(ref ids))) if ids.len() == 1
    ));
}

/// S5: a failing call leaves the input snapshot and a failure ledger entry
/// behind, but commits no output and leaves the input entity unchanged.
#[test]
fn s5_failing_call_is_recorded_and_leaves_no_output_entity() {
    let mut registry = registry();
    registry
        .register("divide", vec![ParamSpec::entity("a"), ParamSpec::entity("b")], OutputDescriptor::single(), None, |mut call_args| {
            let a = call_args.take_entity("a").unwrap();
            let b = call_args.take_entity("b").unwrap();
            let FieldValue::Scalar(Value::Int(bv)) = b.payload.get_field("v").unwrap() else {
                panic!("expected int field `v`");
            };
            if bv == 0 {
                return Err(encr_core::EncrError::invariant_violation("division by zero"));
            }
            let FieldValue::Scalar(Value::Int(av)) = a.payload.get_field("v").unwrap() else {
                panic!("expected int field `v`");
            };
            Ok(CallOutcome::Single(Entity::new(Box::new(Num { v: av / bv }))))
        })
        .unwrap();

    let a = registry.put(Entity::new(Box::new(Num { v: 10 }))).unwrap();
    let b = registry.put(Entity::new(Box::new(Num { v: 0 }))).unwrap();

    let call_args = args(vec![("a", ArgValue::Entity(a.clone())), ("b", ArgValue::Entity(b.clone()))]);
    let err = registry.invoke("divide", call_args).unwrap_err();
    assert!(matches!(err, encr_core::EncrError::ExecutionFailed { .. }));

    let failed = registry.failed_executions();
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0].payload.get_field("succeeded"), Some(FieldValue::Scalar(Value::Bool(false)))));
    assert!(matches!(
        failed[0].payload.get_field("error_message"),
        Some(FieldValue::Scalar(Value::String(ref s))) if !s.is_empty()
    ));
    assert!(matches!(
        failed[0].payload.get_field("output_root_ids"),
        Some(FieldValue::Scalar(Value::Array(ref ids))) if ids.is_empty()
    ));

    assert_eq!(registry.history(a.identity.lineage_id), vec![a.content_id().unwrap()]);
    let a_current = registry.get(a.content_id().unwrap()).unwrap();
    assert!(matches!(a_current.payload.get_field("v"), Some(FieldValue::Scalar(Value::Int(10)))));
}

/// S6: idempotent address resolution. Resolving the same address twice in a
/// row yields equal results and does not change the store.
#[test]
fn s6_resolving_an_address_twice_is_idempotent() {
    let mut registry = registry();
    registry
        .register(
            "concat",
            vec![ParamSpec::scalar("a"), ParamSpec::scalar("b")],
            OutputDescriptor::single(),
            None,
            |call_args| {
                let Some(Value::String(a)) = call_args.scalar("a") else {
                    panic!("expected string scalar `a`");
                };
                let Some(Value::String(b)) = call_args.scalar("b") else {
                    panic!("expected string scalar `b`");
                };
                Ok(CallOutcome::Single(Entity::new(Box::new(Record::new(format!("{a}{b}"))))))
            },
        )
        .unwrap();
    let e1 = registry.put(Entity::new(Box::new(Record::new("Ada")))).unwrap();
    let e2 = registry.put(Entity::new(Box::new(Record::new("Lovelace")))).unwrap();
    let call_args = args(vec![
        ("a", ArgValue::Address(format!("@{}.text", e1.content_id().unwrap()))),
        ("b", ArgValue::Address(format!("@{}.text", e2.content_id().unwrap()))),
    ]);
    let out = registry.invoke("concat", call_args).unwrap().into_single().unwrap();

    let address = format!("@{}.text", out.content_id().unwrap());
    let first = registry.resolve(&address).unwrap();
    let second = registry.resolve(&address).unwrap();

    let roots_before = registry.store().roots().len();
    let _ = registry.resolve(&address).unwrap();
    let roots_after = registry.store().roots().len();
    assert_eq!(roots_before, roots_after);

    match (first, second) {
        (encr_resolve::Resolved::FieldValue { value: v1, .. }, encr_resolve::Resolved::FieldValue { value: v2, .. }) => {
            assert!(matches!((v1, v2), (FieldValue::Scalar(Value::String(a)), FieldValue::Scalar(Value::String(b))) if a == b));
        }
        other => panic!("expected two equal field-value resolutions, got {other:?}"),
    }
}
