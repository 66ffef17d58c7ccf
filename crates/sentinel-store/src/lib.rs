//! Durable `Store` implementations for the CI auto-remediation control
//! loop: an in-memory default and an embedded-SurrealDB backend for
//! single-node durability across restarts.
//!
//! Both implement `sentinel_core::substrate::Store`; callers depend on the
//! trait, not on either concrete type, so `sentineld` can swap backends via
//! configuration alone.

mod error;
mod memory;
mod surreal;

use std::sync::Arc;

use sentinel_core::substrate::Store;
use sentinel_core::Result;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use surreal::SurrealStore;

/// Build the `Store` named by `SENTINEL_STORE_DSN`'s value: `None` or
/// `"memory"` opens an `InMemoryStore`; anything else is treated as a
/// filesystem path and opens a file-backed `SurrealStore` there. Shared by
/// `sentinel-cli` and `sentineld` so the two binaries can never disagree on
/// what a given DSN means.
pub async fn open_store(dsn: Option<&str>) -> Result<Arc<dyn Store>> {
    match dsn {
        None | Some("") | Some("memory") => Ok(Arc::new(InMemoryStore::new())),
        Some(path) => Ok(Arc::new(SurrealStore::connect_file(path).await?)),
    }
}
