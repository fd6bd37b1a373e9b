//! Property-based tests using proptest.
//!
//! Covers the invariants spec.md §8 states as universal (for all ids, for all
//! refresh sequences) rather than as single literal scenarios:
//! - `EntryId`/`DatasetKey` construction round-trips for arbitrary strings
//! - The retry ledger's first-failure timestamp is idempotent under repeated
//!   failures and cleared exactly by `clear`
//! - `with_staleness_and_tag` always preserves the expanded plan's identity
//! - `schema_changed` agrees with structural equality for arbitrary JSON
//!   schema values
//! - The snapshot cell's CAS loop always converges to a map containing every
//!   id from an arbitrary sequence of single-entry inserts

use materialization_cache::change_detection::schema_changed;
use materialization_cache::collaborators::CatalogView;
use materialization_cache::model::{
    DatasetKey, EntryId, ExpandedDescriptor, PlanNode, RawDescriptor, SchemaSnapshot,
};
use materialization_cache::retry_ledger::RetryLedger;
use materialization_cache::snapshot::{cas_retry_loop, SnapshotCell};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn arb_entry_id() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_-]{0,32}"
}

fn arb_json_scalar() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i64>().prop_map(|n| serde_json::json!(n)),
        "[a-z]{0,12}".prop_map(serde_json::Value::String),
    ]
}

fn arb_json_object() -> impl Strategy<Value = serde_json::Value> {
    prop::collection::btree_map("[a-z]{1,8}", arb_json_scalar(), 0..5)
        .prop_map(|map| serde_json::Value::Object(map.into_iter().collect()))
}

fn descriptor_with_plan(plan: PlanNode) -> ExpandedDescriptor {
    ExpandedDescriptor {
        source: Arc::new(RawDescriptor {
            id: EntryId::from("e1"),
            dataset_key: DatasetKey::new(["a"]),
            schema_version_tag: "v1".into(),
            is_stale: false,
            plan_blob: vec![],
        }),
        expanded_plan: Arc::new(plan),
        schema_snapshot: SchemaSnapshot(serde_json::json!({})),
        is_stale: false,
        version_tag: "t1".into(),
    }
}

struct FixedCatalog {
    schema: Option<SchemaSnapshot>,
}

impl CatalogView for FixedCatalog {
    async fn dataset_config(&self, _key: &DatasetKey) -> Option<SchemaSnapshot> {
        self.schema.clone()
    }

    async fn current_dataset_tag(&self, _key: &DatasetKey) -> Option<String> {
        None
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ── EntryId / DatasetKey construction ──────────────────────────────

    #[test]
    fn prop_entry_id_from_str_and_string_agree(s in arb_entry_id()) {
        let from_str = EntryId::from(s.as_str());
        let from_string = EntryId::from(s.clone());
        prop_assert_eq!(from_str, from_string);
    }

    #[test]
    fn prop_entry_id_display_roundtrips_the_input(s in arb_entry_id()) {
        let id = EntryId::from(s.clone());
        prop_assert_eq!(id.to_string(), s);
    }

    #[test]
    fn prop_dataset_key_display_joins_every_part_with_a_dot(
        parts in prop::collection::vec("[a-z]{1,8}", 1..5)
    ) {
        let key = DatasetKey::new(parts.clone());
        prop_assert_eq!(key.to_string(), parts.join("."));
    }

    // ── Retry ledger: idempotent first-failure time ────────────────────

    #[test]
    fn prop_record_failure_is_idempotent_across_repeated_calls(
        id in arb_entry_id(), repeats in 1usize..10
    ) {
        let ledger = RetryLedger::new(Duration::from_secs(3600));
        let entry = EntryId::from(id);

        let first = ledger.record_failure(&entry);
        for _ in 0..repeats {
            let again = ledger.record_failure(&entry);
            prop_assert_eq!(again, first);
        }
        prop_assert_eq!(ledger.first_failure_time(&entry), Some(first));
    }

    #[test]
    fn prop_clear_always_removes_the_record(id in arb_entry_id()) {
        let ledger = RetryLedger::new(Duration::from_secs(3600));
        let entry = EntryId::from(id);
        ledger.record_failure(&entry);
        ledger.clear(&entry);
        prop_assert!(ledger.first_failure_time(&entry).is_none());
    }

    // ── Copy-on-write staleness/tag updates never touch plan identity ──

    #[test]
    fn prop_with_staleness_and_tag_never_changes_plan_identity(
        is_stale in any::<bool>(), tag in "[a-z0-9]{1,10}"
    ) {
        let original = descriptor_with_plan(PlanNode::Compound { children: vec![] });
        let updated = original.with_staleness_and_tag(is_stale, tag.clone());

        prop_assert!(Arc::ptr_eq(&original.expanded_plan, &updated.expanded_plan));
        prop_assert_eq!(updated.is_stale, is_stale);
        prop_assert_eq!(updated.version_tag, tag);
    }

    // ── schema_changed agrees with structural (in)equality ──────────────

    #[test]
    fn prop_schema_changed_matches_structural_inequality(
        captured in arb_json_object(), current in arb_json_object()
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let catalog = FixedCatalog { schema: Some(SchemaSnapshot(current.clone())) };
        let captured_snapshot = SchemaSnapshot(captured.clone());

        let changed = rt.block_on(schema_changed(&catalog, &DatasetKey::new(["x"]), &captured_snapshot));
        prop_assert_eq!(changed, current != captured);
    }

    #[test]
    fn prop_schema_changed_is_always_true_when_dataset_is_gone(captured in arb_json_object()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let catalog = FixedCatalog { schema: None };
        let captured_snapshot = SchemaSnapshot(captured);

        let changed = rt.block_on(schema_changed(&catalog, &DatasetKey::new(["x"]), &captured_snapshot));
        prop_assert!(changed);
    }

    // ── Snapshot cell: CAS loop converges and never loses an insert ────

    #[test]
    fn prop_cas_retry_loop_preserves_every_inserted_id(
        ids in prop::collection::vec(arb_entry_id(), 1..20)
    ) {
        let cell = SnapshotCell::new();
        for raw_id in &ids {
            let entry = EntryId::from(raw_id.as_str());
            cas_retry_loop(&cell, {
                let entry = entry.clone();
                move |current| {
                    let mut next = current.clone();
                    next.insert(entry.clone(), Arc::new(descriptor_with_plan(PlanNode::Compound { children: vec![] })));
                    next
                }
            });
        }

        let snapshot = cell.load();
        for raw_id in &ids {
            prop_assert!(snapshot.contains_key(&EntryId::from(raw_id.as_str())));
        }
    }
}
