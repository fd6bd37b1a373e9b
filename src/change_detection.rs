//! Predicates the refresh engine uses to decide whether an entry's cached
//! expansion can be reused as-is, per spec.md §4.3.

use crate::collaborators::CatalogView;
use crate::model::{DatasetKey, ExpandedDescriptor, PlanNode, SchemaSnapshot};

/// Has the dataset's record schema changed since `descriptor` was expanded?
///
/// Looks up the dataset's current structural schema in the catalog and
/// compares it by value against the schema captured at expansion time. A
/// dataset that has disappeared from the catalog is treated as changed
/// (forces re-expansion, which will itself fail and enter the retry path).
pub async fn schema_changed(
    catalog: &impl CatalogView,
    dataset_key: &DatasetKey,
    captured: &SchemaSnapshot,
) -> bool {
    match catalog.dataset_config(dataset_key).await {
        Some(current) => &current != captured,
        None => true,
    }
}

/// Has any table scan inside this descriptor's expanded plan fallen behind
/// the catalog's current version tag for its dataset?
///
/// A scan leaf with no catalog-resident qualified name (e.g. a raw file
/// scan) is conservatively treated as always out of date, per spec.md
/// §4.3's note on non-catalog-resident scans.
pub async fn is_external_metadata_updated(
    catalog: &impl CatalogView,
    descriptor: &ExpandedDescriptor,
) -> bool {
    let mut leaves = Vec::new();
    descriptor.expanded_plan.for_each_scan(&mut |node| {
        if let PlanNode::Scan {
            captured_version_tag,
            qualified_name,
        } = node
        {
            leaves.push((captured_version_tag.clone(), qualified_name.clone()));
        }
    });

    for (captured_tag, qualified_name) in leaves {
        let Some(key) = qualified_name else {
            return true;
        };
        let current_tag = catalog.current_dataset_tag(&key).await;
        if current_tag != captured_tag {
            return true;
        }
    }

    false
}
