//! # cw-adapters
//!
//! Adapter contract for Crosswatch provider integrations.
//!
//! An adapter fetches raw provider data for one (tenant, data source,
//! entity type) unit of work. The pipeline treats "fetch data from
//! provider X" as an injected capability with a fixed contract — the
//! provider HTTP clients themselves (OAuth exchange, pagination
//! mechanics, rate-limit backoff) live outside this workspace and
//! implement [`Adapter`] at the boundary.

pub mod registry;
pub mod testing;
pub mod traits;

pub use registry::AdapterRegistry;
pub use traits::{
    Adapter, FetchError, FetchErrorKind, FetchRequest, FetchResult, RawBatch, RawRecord,
};
