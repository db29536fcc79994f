//! Postgres durable store for leads and the entities they reference.
//!
//! `PgStore` is the source of truth behind the seen-entity cache
//! (`EntityLedger`), the merge engine (`LeadStore` / `MergeTx`) and the
//! route planner (`RouteLeadSource`). `PgMarkerCache` keeps seen-markers in
//! the same database so they survive between runs.

mod ledger;
mod marker_cache;
mod merge_tx;
mod route_source;
mod rows;
mod store;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use marker_cache::PgMarkerCache;
pub use merge_tx::PgMergeTx;
pub use route_source::ROUTE_PLANNED_ACTIVITY;
pub use store::PgStore;
