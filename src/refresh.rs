//! The refresh engine: one full reconciliation pass per call, per spec.md
//! §4.3. Pulls the provider's current view once, diffs it against the
//! current snapshot, expands what changed, and CAS-swaps a freshly built
//! map into the snapshot cell.

use crate::change_detection::{is_external_metadata_updated, schema_changed};
use crate::collaborators::{
    CatalogService, CatalogView, ConfigStatus, Expander, MaterializationStore, StatusService,
};
use crate::config::CacheConfig;
use crate::error::{Error, ExpansionFailure, Result};
use crate::init_barrier::InitBarrier;
use crate::metrics::MetricsSink;
use crate::model::{
    EntryId, ExpandedDescriptor, ExternalReflection, MaterializationStatus, RawDescriptor,
    RawMaterialization, Snapshot,
};
use crate::retry_ledger::RetryLedger;
use crate::snapshot::SnapshotCell;
use std::sync::Arc;
use std::time::Instant;

/// Counts from one completed reconciliation pass, used for the entries gauge
/// and for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub entries: usize,
    pub expanded: usize,
    pub reused: usize,
    pub errors: usize,
}

/// Everything one `refresh()` call needs. Borrowed from
/// [`crate::cache::MaterializationCache`]; grouped here so the reconciliation
/// functions below don't carry an eight-parameter argument list.
pub struct RefreshContext<'a, E, C, St, M> {
    pub expander: &'a E,
    pub catalog_service: &'a C,
    pub status_service: &'a St,
    pub store: &'a M,
    pub metrics: &'a dyn MetricsSink,
    pub config: &'a CacheConfig,
    pub snapshot: &'a SnapshotCell,
    pub retry_ledger: &'a RetryLedger,
    pub barrier: &'a InitBarrier,
}

/// Run one full refresh: spec.md §4.3 steps 1-9.
///
/// The init barrier opens whether this returns `Ok` or `Err` (the source's
/// `countDown` runs in a `finally` block; see spec.md §4.4) — only catalog
/// acquisition and the provider's own fetch calls can make this return `Err`,
/// every per-entry failure is handled internally and never aborts the pass.
pub async fn refresh<E, C, St, M>(ctx: &RefreshContext<'_, E, C, St, M>) -> Result<RefreshOutcome>
where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    let start = Instant::now();
    let was_initial = !ctx.barrier.is_open();

    let outcome = reconcile(ctx).await;

    ctx.barrier.open();
    ctx.metrics.record_sync(start.elapsed(), was_initial);
    if let Ok(o) = &outcome {
        ctx.metrics.set_entries_gauge(o.entries);
    }

    outcome
}

async fn reconcile<E, C, St, M>(ctx: &RefreshContext<'_, E, C, St, M>) -> Result<RefreshOutcome>
where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    // Step 1: pull the provider's current view exactly once. A losing CAS
    // below restarts the diff against the latest snapshot, never this fetch.
    let materializations = ctx
        .expander
        .get_valid_materializations()
        .await
        .map_err(Error::Provider)?;
    let reflections = ctx
        .expander
        .get_external_reflections()
        .await
        .map_err(Error::Provider)?;

    // Step 3: one catalog view for the whole refresh, including every CAS
    // retry (DESIGN.md open-question #2).
    let catalog = ctx
        .catalog_service
        .acquire()
        .await
        .map_err(Error::Catalog)?;

    let mut current = ctx.snapshot.load();
    let mut outcome = RefreshOutcome::default();

    let final_snapshot = loop {
        let mut updated = Snapshot::new();
        outcome = RefreshOutcome::default();

        for m in &materializations {
            reconcile_materialization(ctx, &catalog, &current, m, &mut updated, &mut outcome)
                .await;
        }

        for r in &reflections {
            reconcile_reflection(ctx, &catalog, &current, r, &mut updated, &mut outcome).await;
        }

        outcome.entries = updated.len();

        if ctx.snapshot.compare_and_set(&current, updated) {
            break ctx.snapshot.load();
        }
        warn!("materialization cache refresh lost snapshot CAS race, restarting reconciliation from latest snapshot");
        current = ctx.snapshot.load();
    };
    debug_assert_eq!(final_snapshot.len(), outcome.entries);

    // Step 8: release the per-refresh catalog's accumulated per-dataset
    // caches now that every entry has been reconciled against it.
    catalog.clear_caches();

    Ok(outcome)
}

async fn reconcile_materialization<E, C, St, M>(
    ctx: &RefreshContext<'_, E, C, St, M>,
    catalog: &C::View,
    current: &Snapshot,
    m: &RawMaterialization,
    updated: &mut Snapshot,
    outcome: &mut RefreshOutcome,
) where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    let old_entry = current.get(&m.id);
    let needs_expansion = match old_entry {
        None => true,
        Some(old) => schema_changed(catalog, &m.dataset_key, &old.schema_snapshot).await,
    };

    // Reuse per §4.3 step 5's "else" branch: `needs_expansion` is false only
    // when `old_entry` matched, so matching both together never panics.
    if let (false, Some(old)) = (needs_expansion, old_entry) {
        let descriptor = if old.is_stale != m.is_stale || old.version_tag != m.schema_version_tag {
            Arc::new(old.with_staleness_and_tag(m.is_stale, m.schema_version_tag.clone()))
        } else {
            Arc::clone(old)
        };
        updated.insert(m.id.clone(), descriptor);
        outcome.reused += 1;
        return;
    }

    match ctx.expander.expand_materialization(m, catalog).await {
        Ok(Some((plan, schema_snapshot))) => {
            let raw: RawDescriptor = m.clone().into();
            let descriptor = ExpandedDescriptor {
                source: Arc::new(raw),
                expanded_plan: Arc::new(plan),
                schema_snapshot,
                is_stale: m.is_stale,
                version_tag: m.schema_version_tag.clone(),
            };
            updated.insert(m.id.clone(), Arc::new(descriptor));
            ctx.retry_ledger.clear(&m.id);
            outcome.expanded += 1;
        }
        Ok(None) => {
            // Absent: silently dropped, no retry tracking (§6/§7's "Absent
            // expansion result" row).
        }
        Err(failure) => {
            outcome.errors += 1;
            let source_down = matches!(failure, ExpansionFailure::SourceDown(_));
            ctx.metrics
                .record_error(m.id.as_str(), &failure.to_string(), source_down);
            handle_internal_failure(ctx, m, failure, source_down).await;
        }
    }
}

/// §4.3.1: on a non-source-down failure, escalate once the elapsed time
/// since first failure reaches `retry_minutes`; source-down failures retry
/// indefinitely (bounded only by the ledger's own expiry).
async fn handle_internal_failure<E, C, St, M>(
    ctx: &RefreshContext<'_, E, C, St, M>,
    m: &RawMaterialization,
    failure: ExpansionFailure,
    source_down: bool,
) where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    let first_failure = ctx.retry_ledger.record_failure(&m.id);

    if source_down {
        return;
    }

    if first_failure.elapsed() >= ctx.config.retry {
        escalate_to_failed(ctx, m, &failure, source_down).await;
        ctx.retry_ledger.clear(&m.id);
    }
}

/// §4.7: persist the entry as `FAILED` in the durable store, swallowing a
/// concurrent-modification save failure (a peer coordinator escalated
/// first).
async fn escalate_to_failed<E, C, St, M>(
    ctx: &RefreshContext<'_, E, C, St, M>,
    m: &RawMaterialization,
    failure: &ExpansionFailure,
    source_down: bool,
) where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    let current = match ctx.store.get(&m.id).await {
        Ok(Some(record)) => record,
        Ok(None) => m.clone(),
        Err(e) => {
            warn!(
                "materialization cache could not load {} from the store before escalating: {}",
                m.id, e
            );
            m.clone()
        }
    };

    let failed = RawMaterialization {
        status: MaterializationStatus::Failed {
            message: failure.to_string(),
        },
        ..current
    };

    match ctx.store.save(&failed).await {
        Ok(()) => {}
        Err(crate::error::StoreError::ConcurrentModification) => {
            debug!(
                "materialization cache lost the race to escalate {} to FAILED; a peer got there first",
                m.id
            );
        }
        Err(e) => {
            warn!(
                "materialization cache failed to persist FAILED status for {}: {}",
                m.id, e
            );
        }
    }

    ctx.metrics.record_retry_failed(m.id.as_str(), source_down);
}

async fn reconcile_reflection<E, C, St, M>(
    ctx: &RefreshContext<'_, E, C, St, M>,
    catalog: &C::View,
    current: &Snapshot,
    r: &ExternalReflection,
    updated: &mut Snapshot,
    outcome: &mut RefreshOutcome,
) where
    E: Expander,
    C: CatalogService,
    St: StatusService,
    M: MaterializationStore,
{
    let old_entry = current.get(&r.id);

    let needs_expansion = match old_entry {
        None => true,
        Some(old) => {
            ctx.status_service.external_reflection_status(&r.id).await == ConfigStatus::OutOfSync
                || is_external_metadata_updated(catalog, old).await
        }
    };

    if let (false, Some(old)) = (needs_expansion, old_entry) {
        updated.insert(r.id.clone(), Arc::clone(old));
        outcome.reused += 1;
        return;
    }

    let raw = match ctx.expander.get_descriptor(r).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return, // absent: silently dropped, no retry tracking (§4.3.2)
        Err(failure) => {
            outcome.errors += 1;
            let source_down = matches!(failure, ExpansionFailure::SourceDown(_));
            ctx.metrics
                .record_error(r.id.as_str(), &failure.to_string(), source_down);
            return;
        }
    };

    match ctx.expander.expand_raw(&raw, catalog).await {
        Ok(Some((plan, schema_snapshot))) => {
            let is_stale = raw.is_stale;
            let version_tag = raw.schema_version_tag.clone();
            let descriptor = ExpandedDescriptor {
                source: Arc::new(raw),
                expanded_plan: Arc::new(plan),
                schema_snapshot,
                is_stale,
                version_tag,
            };
            updated.insert(r.id.clone(), Arc::new(descriptor));
            outcome.expanded += 1;
        }
        Ok(None) => {
            // Absent: silently dropped, no retry tracking (§6/§7's "Absent
            // expansion result" row).
        }
        Err(failure) => {
            // External reflections have no FAILED escalation; they are
            // governed entirely by the status service (§4.3.2).
            outcome.errors += 1;
            let source_down = matches!(failure, ExpansionFailure::SourceDown(_));
            ctx.metrics
                .record_error(r.id.as_str(), &failure.to_string(), source_down);
        }
    }
}
