//! # materialization-cache
//!
//! The in-memory, concurrently-refreshed cache of pre-expanded query-plan
//! descriptors a query engine's planner matches incoming queries against
//! (reflections / materialized views).
//!
//! The cache itself owns exactly three pieces of state: an atomically
//! swapped snapshot of expanded descriptors ([`snapshot`]), a per-entry
//! retry ledger ([`retry_ledger`]), and a one-shot init barrier
//! ([`init_barrier`]). Everything else — the plan expander, the catalog,
//! the durable materialization store, the option manager, the external
//! reflection status service — is a collaborator the caller supplies; see
//! [`collaborators`] for the traits and [`testing`] for in-memory fakes.
//!
//! ## Quick start
//!
//! ```ignore
//! use materialization_cache::{MaterializationCache, testing::*};
//!
//! let cache = MaterializationCache::new(
//!     my_expander,
//!     my_catalog_service,
//!     my_status_service,
//!     my_materialization_store,
//!     &my_option_manager,
//! );
//!
//! cache.refresh().await?;
//! let descriptor = cache.get(&entry_id);
//! ```
//!
//! `MaterializationCache` is cheap to `Clone` (`Arc`-backed): a scheduler
//! invoking `refresh()`, a planner calling `get`/`get_all`, and an on-demand
//! `update()` caller can each hold their own handle over the same
//! underlying state.

#[macro_use]
extern crate log;

pub mod cache;
pub mod change_detection;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod init_barrier;
pub mod metrics;
pub mod model;
pub mod refresh;
pub mod retry_ledger;
pub mod snapshot;
pub mod testing;

pub use cache::MaterializationCache;
pub use collaborators::{CatalogService, CatalogView, Expander, MaterializationStore, OptionManager, StatusService};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use metrics::{MetricsSink, NoOpMetrics};
pub use model::{
    DatasetKey, EntryId, ExpandedDescriptor, ExternalReflection, MaterializationStatus, PlanNode,
    RawDescriptor, RawMaterialization, SchemaSnapshot, Snapshot,
};
pub use refresh::RefreshOutcome;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
