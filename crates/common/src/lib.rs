/**
 * Archival Unit identity and per-AU capabilities.
 *  - Serde-loadable settings (TOML / JSON)
 *  - Crawl rules, content type map, validation result
 *    overrides and rate limiter source selection
 */
pub mod au;
/**
 * Archive container virtualization.
 * Exposes entries inside zip / tar / gzip versions
 *  (including split and nested archives) as
 *  read-only member nodes.
 */
pub mod archive;
/**
 * Fetch -> redirect -> validate -> commit pipeline
 *  that writes new versions into the store.
 */
pub mod ingest;
/**
 * Selection of sub-ranges of an AU's node tree and
 *  the relation algebra between two selections.
 */
pub mod node_set;
/**
 * Shared, named pacing gates for fetches.
 */
pub mod rate_limiter;
/**
 * Append-only, per-URL version history for an AU.
 *  Nodes form a tree keyed by URL path components.
 */
pub mod store;
/**
 * In-process fixtures for tests: a scripted transport,
 *  a recording notification sink, a manual clock and
 *  archive builders.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::archive::{ArchiveView, Entry, MemberNode};
    pub use crate::au::{Au, AuId, AuSettings};
    pub use crate::ingest::{
        FetchError, FetchOutcome, IngestionPipeline, RedirectPolicy, Transport,
    };
    pub use crate::node_set::{NodeSet, NodeSetSpec, Relation};
    pub use crate::rate_limiter::{Rate, RateLimiter, RateLimiterPool};
    pub use crate::store::{Node, Repository, StoreError, Version, VersionedStore};
}
