//! Data model for the materialization cache: ids, raw and expanded
//! descriptors, and the expanded-plan tree used for scan-leaf inspection.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque identifier for a cache entry (one internal materialization or one
/// external reflection).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(Arc<str>);

impl EntryId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        EntryId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        EntryId(Arc::from(s))
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        EntryId(Arc::from(s.as_str()))
    }
}

/// A dataset's fully qualified name, used for catalog lookups.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey(pub Vec<String>);

impl DatasetKey {
    pub fn new(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        DatasetKey(parts.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A catalog-resident internal materialization, as seen from the plan
/// provider.
#[derive(Clone, Debug)]
pub struct RawMaterialization {
    pub id: EntryId,
    pub dataset_key: DatasetKey,
    pub schema_version_tag: String,
    pub is_stale: bool,
    pub plan_blob: Vec<u8>,
    pub status: MaterializationStatus,
}

/// The durable status of a materialization record in the
/// [`crate::collaborators::MaterializationStore`], as distinct from the
/// cache's own per-entry state machine (spec.md §4.6). `Failed` is written
/// only by failure escalation (§4.7); the provider never hands the cache a
/// materialization already in this state worth re-expanding.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum MaterializationStatus {
    #[default]
    Valid,
    Failed {
        message: String,
    },
}

/// A reflection defined outside the provider (e.g. a user-created
/// accelerator), tracked by the status service rather than by schema
/// comparison.
#[derive(Clone, Debug)]
pub struct ExternalReflection {
    pub id: EntryId,
    pub dataset_key: DatasetKey,
}

/// The common shape handed to [`crate::collaborators::Expander::expand`]:
/// internal materializations are already in this shape; external
/// reflections reach it through `Expander::get_descriptor`.
#[derive(Clone, Debug)]
pub struct RawDescriptor {
    pub id: EntryId,
    pub dataset_key: DatasetKey,
    pub schema_version_tag: String,
    pub is_stale: bool,
    pub plan_blob: Vec<u8>,
}

impl From<RawMaterialization> for RawDescriptor {
    fn from(m: RawMaterialization) -> Self {
        RawDescriptor {
            id: m.id,
            dataset_key: m.dataset_key,
            schema_version_tag: m.schema_version_tag,
            is_stale: m.is_stale,
            plan_blob: m.plan_blob,
        }
    }
}

/// A structural snapshot of a dataset's record schema, compared by value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot(pub serde_json::Value);

/// A node in an expanded query plan. Only scan leaves carry catalog
/// provenance; everything else is an opaque compound node that the change
/// detectors walk through without interpreting.
#[derive(Clone, Debug)]
pub enum PlanNode {
    /// A table scan against a dataset.
    Scan {
        /// Version tag captured at expansion time, if the scan targets a
        /// catalog-resident dataset.
        captured_version_tag: Option<String>,
        /// `None` marks a scan against something the catalog doesn't know
        /// about (e.g. a raw file path); such scans are conservatively
        /// treated as always out of date. See `change_detection`.
        qualified_name: Option<DatasetKey>,
    },
    /// Any non-leaf plan node; children are walked recursively.
    Compound { children: Vec<PlanNode> },
}

impl PlanNode {
    /// Visit every scan leaf reachable from this node.
    pub fn for_each_scan<'a>(&'a self, f: &mut impl FnMut(&'a PlanNode)) {
        match self {
            PlanNode::Scan { .. } => f(self),
            PlanNode::Compound { children } => {
                for child in children {
                    child.for_each_scan(f);
                }
            }
        }
    }
}

/// The fully expanded query plan for one entry, plus the change-detection
/// metadata captured when it was expanded.
#[derive(Clone, Debug)]
pub struct ExpandedDescriptor {
    pub source: Arc<RawDescriptor>,
    pub expanded_plan: Arc<PlanNode>,
    pub schema_snapshot: SchemaSnapshot,
    pub is_stale: bool,
    pub version_tag: String,
}

impl ExpandedDescriptor {
    /// Build a new descriptor that shares the same expanded plan tree but
    /// carries an updated staleness flag and version tag. Used when the
    /// refresh engine determines nothing about a reflection's *expansion*
    /// needs to change, only its tracked freshness flag.
    pub fn with_staleness_and_tag(&self, is_stale: bool, version_tag: impl Into<String>) -> Self {
        ExpandedDescriptor {
            source: Arc::clone(&self.source),
            expanded_plan: Arc::clone(&self.expanded_plan),
            schema_snapshot: self.schema_snapshot.clone(),
            is_stale,
            version_tag: version_tag.into(),
        }
    }
}

/// An immutable point-in-time view of the cache: every entry currently
/// resolvable without a round trip to the expander.
pub type Snapshot = std::collections::HashMap<EntryId, Arc<ExpandedDescriptor>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialization_status_defaults_to_valid() {
        assert_eq!(MaterializationStatus::default(), MaterializationStatus::Valid);
    }

    #[test]
    fn entry_id_from_str_and_string_agree() {
        let a = EntryId::from("abc");
        let b = EntryId::from(String::from("abc"));
        assert_eq!(a, b);
    }

    #[test]
    fn dataset_key_display_joins_with_dot() {
        let key = DatasetKey::new(["space", "folder", "table"]);
        assert_eq!(key.to_string(), "space.folder.table");
    }

    #[test]
    fn with_staleness_and_tag_preserves_plan_identity() {
        let desc = ExpandedDescriptor {
            source: Arc::new(RawDescriptor {
                id: EntryId::from("e1"),
                dataset_key: DatasetKey::new(["a"]),
                schema_version_tag: "v1".into(),
                is_stale: false,
                plan_blob: vec![],
            }),
            expanded_plan: Arc::new(PlanNode::Compound { children: vec![] }),
            schema_snapshot: SchemaSnapshot(serde_json::json!({})),
            is_stale: false,
            version_tag: "t1".into(),
        };

        let updated = desc.with_staleness_and_tag(true, "t2");
        assert!(Arc::ptr_eq(&desc.expanded_plan, &updated.expanded_plan));
        assert!(updated.is_stale);
        assert_eq!(updated.version_tag, "t2");
    }

    #[test]
    fn for_each_scan_visits_nested_leaves() {
        let tree = PlanNode::Compound {
            children: vec![
                PlanNode::Scan {
                    captured_version_tag: Some("v1".into()),
                    qualified_name: Some(DatasetKey::new(["a"])),
                },
                PlanNode::Compound {
                    children: vec![PlanNode::Scan {
                        captured_version_tag: None,
                        qualified_name: None,
                    }],
                },
            ],
        };

        let mut count = 0;
        tree.for_each_scan(&mut |_| count += 1);
        assert_eq!(count, 2);
    }
}
