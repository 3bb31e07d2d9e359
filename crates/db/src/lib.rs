//! `db` crate — pure persistence layer.
//!
//! Provides a connection pool, typed row structs, the `Store`/`StoreTx`
//! transactional store abstraction, its Postgres implementation, and an
//! in-memory implementation used as a test double.  No business logic
//! lives here.

pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use pool::{DbConfig, DbPool};
pub use postgres::PgStore;
pub use store::{Store, StoreTx};
