//! The public surface of the materialization cache: construction, the
//! snapshot-consistent read API, `refresh`, `reset`, and the on-demand
//! `update` path. Mirrors the teacher's `CacheService<B>` shape — an
//! `Arc`-wrapped inner handle, cheap `Clone`, thin delegating methods.

use crate::collaborators::{CatalogService, Expander, MaterializationStore, OptionManager, StatusService};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::init_barrier::{InitBarrier, UPDATE_WAIT_CEILING};
use crate::metrics::{MetricsSink, NoOpMetrics};
use crate::model::{EntryId, ExpandedDescriptor, RawDescriptor, RawMaterialization, Snapshot};
use crate::refresh::{self, RefreshContext, RefreshOutcome};
use crate::retry_ledger::RetryLedger;
use crate::snapshot::{self, cas_retry_loop, SnapshotCell};
use std::sync::Arc;

struct Inner<E, C, St, M> {
    expander: E,
    catalog_service: C,
    status_service: St,
    store: M,
    metrics: Box<dyn MetricsSink>,
    config: CacheConfig,
    snapshot: SnapshotCell,
    retry_ledger: RetryLedger,
    barrier: InitBarrier,
}

/// The materialization cache itself. `E`, `C`, `St`, `M` are the caller's
/// concrete collaborator implementations; see [`crate::collaborators`].
///
/// Cheap to `Clone` — every clone shares the same underlying snapshot cell,
/// retry ledger, and init barrier, so a scheduler, planner readers, and
/// on-demand `update` callers can each hold an independent handle.
pub struct MaterializationCache<E, C, St, M> {
    inner: Arc<Inner<E, C, St, M>>,
}

impl<E, C, St, M> Clone for MaterializationCache<E, C, St, M> {
    fn clone(&self) -> Self {
        MaterializationCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, C, St, M> MaterializationCache<E, C, St, M>
where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    /// Build a cache from its collaborators and the current option values.
    /// Options are snapshotted once here; the cache does not re-read the
    /// option manager on every refresh (see [`CacheConfig`]).
    pub fn new(expander: E, catalog_service: C, status_service: St, store: M, options: &impl OptionManager) -> Self {
        Self::with_metrics(
            expander,
            catalog_service,
            status_service,
            store,
            options,
            Box::new(NoOpMetrics),
        )
    }

    /// Build a cache with a custom metrics sink.
    pub fn with_metrics(
        expander: E,
        catalog_service: C,
        status_service: St,
        store: M,
        options: &impl OptionManager,
        metrics: Box<dyn MetricsSink>,
    ) -> Self {
        let config = CacheConfig::from_options(options);
        let barrier = if config.cache_enabled {
            InitBarrier::new()
        } else {
            // §6: when cache-enabled is false, the barrier is treated as
            // already open so readers never block on a refresh that will
            // never run.
            InitBarrier::pre_opened()
        };
        let retry_ledger = RetryLedger::new(config.max_retry);

        MaterializationCache {
            inner: Arc::new(Inner {
                expander,
                catalog_service,
                status_service,
                store,
                metrics,
                config,
                snapshot: SnapshotCell::new(),
                retry_ledger,
                barrier,
            }),
        }
    }

    fn ctx(&self) -> RefreshContext<'_, E, C, St, M> {
        RefreshContext {
            expander: &self.inner.expander,
            catalog_service: &self.inner.catalog_service,
            status_service: &self.inner.status_service,
            store: &self.inner.store,
            metrics: self.inner.metrics.as_ref(),
            config: &self.inner.config,
            snapshot: &self.inner.snapshot,
            retry_ledger: &self.inner.retry_ledger,
            barrier: &self.inner.barrier,
        }
    }

    /// Run one full reconciliation pass against the provider, per spec.md
    /// §4.3. Safe to call concurrently (each call CAS-retries against the
    /// latest snapshot), though production scheduling assumes a single
    /// owner.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        refresh::refresh(&self.ctx()).await
    }

    /// Replace the current snapshot with an empty one. Does not touch the
    /// retry ledger and does not re-close the init barrier (spec.md §3, §9
    /// open question #3).
    pub fn reset(&self) {
        self.inner.snapshot.clear();
    }

    /// Snapshot-consistent lookup. Non-blocking.
    pub fn get(&self, id: &EntryId) -> Option<Arc<ExpandedDescriptor>> {
        snapshot::get(&self.inner.snapshot.load(), id)
    }

    /// Membership test against the current snapshot. Non-blocking.
    pub fn contains(&self, id: &EntryId) -> bool {
        self.inner.snapshot.load().contains_key(id)
    }

    /// Wait for the first refresh to complete (up to `init-timeout-seconds`)
    /// and return every expanded descriptor currently cached.
    pub async fn get_all(&self) -> Result<Arc<Snapshot>> {
        if self.inner.barrier.wait(self.inner.config.init_timeout).await {
            Ok(self.inner.snapshot.load())
        } else {
            Err(Error::CacheTimeout(format!(
                "materialization cache did not initialize within {:?}",
                self.inner.config.init_timeout
            )))
        }
    }

    /// `true` iff the cache either has `cache-enabled = false` or at least
    /// one refresh has returned (success or failure).
    pub fn is_initialized(&self) -> bool {
        self.inner.barrier.is_open()
    }

    /// Remove a single entry from the current snapshot. A no-op (no CAS
    /// loop entered) if the id is already absent.
    pub fn invalidate(&self, id: &EntryId) {
        if !self.inner.snapshot.load().contains_key(id) {
            return;
        }
        cas_retry_loop(&self.inner.snapshot, |current| {
            let mut next = (**current).clone();
            next.remove(id);
            next
        });
    }

    /// Expand and insert a single materialization outside the normal
    /// refresh cycle. Waits on the init barrier up to a fixed ten-minute
    /// ceiling, proceeding regardless if it elapses (spec.md §4.5) — the
    /// scheduled refresh will converge eventually. Any expansion failure
    /// propagates to the caller; a `None` plan from the expander is a no-op.
    pub async fn update(&self, materialization: RawMaterialization) -> Result<()> {
        self.inner.barrier.wait(UPDATE_WAIT_CEILING).await;

        let catalog = self
            .inner
            .catalog_service
            .acquire()
            .await
            .map_err(Error::Catalog)?;

        let (plan, schema_snapshot) = match self
            .inner
            .expander
            .expand_materialization(&materialization, &catalog)
            .await
        {
            Ok(Some(result)) => result,
            Ok(None) => return Ok(()),
            Err(failure) => return Err(Error::Expansion(failure)),
        };

        let raw: RawDescriptor = materialization.clone().into();
        let id = materialization.id.clone();
        let descriptor = Arc::new(ExpandedDescriptor {
            source: Arc::new(raw),
            expanded_plan: Arc::new(plan),
            schema_snapshot,
            is_stale: materialization.is_stale,
            version_tag: materialization.schema_version_tag,
        });

        cas_retry_loop(&self.inner.snapshot, |current| {
            let mut next = (**current).clone();
            next.insert(id.clone(), Arc::clone(&descriptor));
            next
        });

        Ok(())
    }
}
