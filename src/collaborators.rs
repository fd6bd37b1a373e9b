//! Contracts for the systems the materialization cache depends on but does
//! not implement: the plan expander, the catalog, the durable
//! materialization store, the status service, and the option manager.
//!
//! None of these are implemented by this crate. Callers supply real
//! implementations; [`crate::testing`] supplies in-memory fakes for tests.

use crate::error::{ExpansionFailure, StoreError};
use crate::model::{DatasetKey, ExternalReflection, PlanNode, RawDescriptor, RawMaterialization, SchemaSnapshot};

/// Expands raw descriptors into fully resolved query plans.
///
/// All methods are fallible only in the `ExpansionFailure`/provider-access
/// sense; `absent` is modeled as `Ok(None)`, matching spec.md §6/§7's "Absent
/// expansion result" row — non-fatal, silently dropped, no retry tracking.
pub trait Expander: Send + Sync {
    /// All internal materializations the provider currently considers
    /// valid. Called exactly once per `refresh()`.
    fn get_valid_materializations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RawMaterialization>, ExpansionFailure>> + Send;

    /// All externally defined reflections. Called exactly once per
    /// `refresh()`.
    fn get_external_reflections(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ExternalReflection>, ExpansionFailure>> + Send;

    /// Resolve an external reflection into the common descriptor shape
    /// needed for expansion. `Ok(None)` if the reflection no longer exists.
    fn get_descriptor(
        &self,
        reflection: &ExternalReflection,
    ) -> impl std::future::Future<Output = Result<Option<RawDescriptor>, ExpansionFailure>> + Send;

    /// Expand an internal materialization into a fully resolved plan tree
    /// and its captured schema snapshot, against a live catalog view
    /// (spec.md §4.3.1's `Expander.expand(materialization, catalog)`).
    /// `Ok(None)` means "non-fatal, drop" — the entry is left out of the
    /// refreshed snapshot with no retry record.
    fn expand_materialization(
        &self,
        materialization: &RawMaterialization,
        catalog: &impl CatalogView,
    ) -> impl std::future::Future<Output = Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure>> + Send;

    /// Expand a raw descriptor (typically obtained via `get_descriptor` for
    /// an external reflection) against a live catalog view (spec.md
    /// §4.3.2's `Expander.expand(rawDescriptor, catalog)`). Same `Ok(None)`
    /// semantics as [`Self::expand_materialization`].
    fn expand_raw(
        &self,
        descriptor: &RawDescriptor,
        catalog: &impl CatalogView,
    ) -> impl std::future::Future<Output = Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure>> + Send;
}

/// A live handle onto the catalog for the duration of one refresh. Acquired
/// once per `refresh()` call and held across every CAS retry (see
/// DESIGN.md's open-question resolution), then released.
pub trait CatalogView: Send + Sync {
    /// The dataset's current structural schema, if the dataset still
    /// exists in the catalog.
    fn dataset_config(
        &self,
        key: &DatasetKey,
    ) -> impl std::future::Future<Output = Option<SchemaSnapshot>> + Send;

    /// The dataset's current version tag, if it is catalog-resident.
    fn current_dataset_tag(
        &self,
        key: &DatasetKey,
    ) -> impl std::future::Future<Output = Option<String>> + Send;

    /// Drop any per-dataset caches this view accumulated. Called once at
    /// the end of a successful refresh. Implementations with nothing to
    /// clear may leave this as a no-op.
    fn clear_caches(&self) {}
}

/// Acquires catalog views.
pub trait CatalogService: Send + Sync {
    type View: CatalogView;

    fn acquire(&self) -> impl std::future::Future<Output = Result<Self::View, String>> + Send;
}

/// Tracks whether an external reflection is in sync with its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigStatus {
    InSync,
    OutOfSync,
}

/// Reports the sync status of external reflections.
pub trait StatusService: Send + Sync {
    fn external_reflection_status(
        &self,
        id: &crate::model::EntryId,
    ) -> impl std::future::Future<Output = ConfigStatus> + Send;
}

/// The durable store backing raw (un-expanded) materialization records.
/// Used only by the failure-escalation path (§4.7) to persist a `FAILED`
/// status after the retry budget for a non-source-down failure is spent.
pub trait MaterializationStore: Send + Sync {
    fn get(
        &self,
        id: &crate::model::EntryId,
    ) -> impl std::future::Future<Output = Result<Option<RawMaterialization>, StoreError>> + Send;

    /// Persist a materialization record, e.g. after marking it `FAILED`.
    /// Implementations return `StoreError::ConcurrentModification` if the
    /// record changed underneath the caller; §4.7 swallows exactly that
    /// case.
    fn save(
        &self,
        materialization: &RawMaterialization,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// Runtime-configurable options. See [`crate::config::CacheConfig`] for the
/// snapshot built from this once per cache construction.
pub trait OptionManager: Send + Sync {
    /// Whether the cache performs any work at all. When `false`, the init
    /// barrier is opened immediately at construction (see
    /// `init_barrier.rs`) so readers never block.
    fn cache_enabled(&self) -> bool {
        true
    }

    /// How long `getAll`-style readers wait for the first refresh to
    /// complete before giving up.
    fn init_timeout_seconds(&self) -> u64 {
        60
    }

    /// Minutes between a descriptor's first expansion failure and when its
    /// retry budget is considered exhausted.
    fn retry_minutes(&self) -> u64 {
        15
    }

    /// Hours after which a stale, unresolved retry-ledger entry is dropped
    /// outright (failure-escalation having presumably already run).
    fn max_retry_hours(&self) -> u64 {
        4
    }
}
