//! In-memory fakes for every collaborator trait, for use in tests and
//! doc examples. Mirrors the teacher's always-available `InMemoryRepository`
//! convention: these are plain structs, not feature-gated.

use crate::collaborators::{
    CatalogService, CatalogView, ConfigStatus, Expander, MaterializationStore, OptionManager,
    StatusService,
};
use crate::error::{ExpansionFailure, StoreError};
use crate::model::{
    DatasetKey, EntryId, ExternalReflection, PlanNode, RawDescriptor, RawMaterialization,
    SchemaSnapshot,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A scriptable fake expander. Tests populate its fields directly before
/// handing it to a cache.
#[derive(Default)]
pub struct FakeExpander {
    pub materializations: Vec<RawMaterialization>,
    pub reflections: Vec<ExternalReflection>,
    pub descriptors: HashMap<EntryId, RawDescriptor>,
    /// Keyed by entry id; `Err` entries simulate expansion failures, `Ok(None)`
    /// simulates an absent expansion result.
    pub expansions: Mutex<HashMap<EntryId, Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure>>>,
}

impl FakeExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the result of expanding `id`.
    pub fn set_expansion(
        &self,
        id: EntryId,
        result: Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure>,
    ) {
        self.expansions
            .lock()
            .expect("lock poisoned")
            .insert(id, result);
    }

    fn scripted_or_default(
        &self,
        id: &EntryId,
        dataset_key: &DatasetKey,
        schema_version_tag: &str,
    ) -> Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure> {
        match self.expansions.lock().expect("lock poisoned").get(id) {
            Some(result) => result.clone(),
            None => Ok(Some((
                PlanNode::Scan {
                    captured_version_tag: Some(schema_version_tag.to_string()),
                    qualified_name: Some(dataset_key.clone()),
                },
                SchemaSnapshot(serde_json::json!({})),
            ))),
        }
    }
}

impl Expander for FakeExpander {
    async fn get_valid_materializations(&self) -> Result<Vec<RawMaterialization>, ExpansionFailure> {
        Ok(self.materializations.clone())
    }

    async fn get_external_reflections(&self) -> Result<Vec<ExternalReflection>, ExpansionFailure> {
        Ok(self.reflections.clone())
    }

    async fn get_descriptor(
        &self,
        reflection: &ExternalReflection,
    ) -> Result<Option<RawDescriptor>, ExpansionFailure> {
        Ok(self.descriptors.get(&reflection.id).cloned())
    }

    async fn expand_materialization(
        &self,
        materialization: &RawMaterialization,
        _catalog: &impl CatalogView,
    ) -> Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure> {
        self.scripted_or_default(
            &materialization.id,
            &materialization.dataset_key,
            &materialization.schema_version_tag,
        )
    }

    async fn expand_raw(
        &self,
        descriptor: &RawDescriptor,
        _catalog: &impl CatalogView,
    ) -> Result<Option<(PlanNode, SchemaSnapshot)>, ExpansionFailure> {
        self.scripted_or_default(
            &descriptor.id,
            &descriptor.dataset_key,
            &descriptor.schema_version_tag,
        )
    }
}

/// An in-memory catalog view over a fixed set of dataset schemas and tags.
#[derive(Clone, Default)]
pub struct InMemoryCatalogView {
    pub schemas: HashMap<DatasetKey, SchemaSnapshot>,
    pub tags: HashMap<DatasetKey, String>,
}

impl CatalogView for InMemoryCatalogView {
    async fn dataset_config(&self, key: &DatasetKey) -> Option<SchemaSnapshot> {
        self.schemas.get(key).cloned()
    }

    async fn current_dataset_tag(&self, key: &DatasetKey) -> Option<String> {
        self.tags.get(key).cloned()
    }
}

/// Hands out clones of a fixed catalog view. Real implementations would
/// acquire a scoped, possibly-pooled resource per call; this fake just
/// clones its snapshot.
#[derive(Clone, Default)]
pub struct InMemoryCatalogService {
    pub view: InMemoryCatalogView,
}

impl CatalogService for InMemoryCatalogService {
    type View = InMemoryCatalogView;

    async fn acquire(&self) -> Result<Self::View, String> {
        Ok(self.view.clone())
    }
}

/// Reports a scripted status for each reflection id.
#[derive(Default)]
pub struct FakeStatusService {
    pub statuses: Mutex<HashMap<EntryId, ConfigStatus>>,
}

impl FakeStatusService {
    pub fn set_status(&self, id: EntryId, status: ConfigStatus) {
        self.statuses.lock().expect("lock poisoned").insert(id, status);
    }
}

impl StatusService for FakeStatusService {
    async fn external_reflection_status(&self, id: &EntryId) -> ConfigStatus {
        self.statuses
            .lock()
            .expect("lock poisoned")
            .get(id)
            .copied()
            .unwrap_or(ConfigStatus::InSync)
    }
}

/// An in-memory materialization store. `Clone`s share the same underlying
/// records (an `Arc<Mutex<_>>` pair), so a test can hand one clone to a
/// cache and keep another to assert against after the cache has consumed
/// its owning collaborators by value.
#[derive(Clone, Default)]
pub struct InMemoryMaterializationStore {
    records: Arc<Mutex<HashMap<EntryId, RawMaterialization>>>,
    /// If set, the next `save` for this id fails with `ConcurrentModification`.
    fail_next_save: Arc<Mutex<Option<EntryId>>>,
}

impl InMemoryMaterializationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, m: RawMaterialization) {
        self.records.lock().expect("lock poisoned").insert(m.id.clone(), m);
    }

    /// Arrange for the next `save` of `id` to fail with
    /// `StoreError::ConcurrentModification`.
    pub fn fail_next_save_for(&self, id: EntryId) {
        *self.fail_next_save.lock().expect("lock poisoned") = Some(id);
    }
}

impl MaterializationStore for InMemoryMaterializationStore {
    async fn get(&self, id: &EntryId) -> Result<Option<RawMaterialization>, StoreError> {
        Ok(self.records.lock().expect("lock poisoned").get(id).cloned())
    }

    async fn save(&self, materialization: &RawMaterialization) -> Result<(), StoreError> {
        let mut fail_next = self.fail_next_save.lock().expect("lock poisoned");
        if fail_next.as_ref() == Some(&materialization.id) {
            *fail_next = None;
            return Err(StoreError::ConcurrentModification);
        }
        drop(fail_next);

        self.records
            .lock()
            .expect("lock poisoned")
            .insert(materialization.id.clone(), materialization.clone());
        Ok(())
    }
}

/// An `OptionManager` with fixed values, set via builder methods.
#[derive(Clone, Debug)]
pub struct StaticOptionManager {
    cache_enabled: bool,
    init_timeout_seconds: u64,
    retry_minutes: u64,
    max_retry_hours: u64,
}

impl Default for StaticOptionManager {
    fn default() -> Self {
        StaticOptionManager {
            cache_enabled: true,
            init_timeout_seconds: 60,
            retry_minutes: 15,
            max_retry_hours: 4,
        }
    }
}

impl StaticOptionManager {
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_init_timeout_seconds(mut self, seconds: u64) -> Self {
        self.init_timeout_seconds = seconds;
        self
    }

    pub fn with_retry_minutes(mut self, minutes: u64) -> Self {
        self.retry_minutes = minutes;
        self
    }

    pub fn with_max_retry_hours(mut self, hours: u64) -> Self {
        self.max_retry_hours = hours;
        self
    }
}

impl OptionManager for StaticOptionManager {
    fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    fn init_timeout_seconds(&self) -> u64 {
        self.init_timeout_seconds
    }

    fn retry_minutes(&self) -> u64 {
        self.retry_minutes
    }

    fn max_retry_hours(&self) -> u64 {
        self.max_retry_hours
    }
}
