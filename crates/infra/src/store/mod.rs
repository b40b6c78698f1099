//! Transactional storage boundary.
//!
//! The engine talks to storage only through [`Storage`] / [`StorageTx`], so the
//! same orchestration runs against the in-memory tables in tests and dev and
//! against Postgres in production.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryStorage, InMemoryTx};
pub use postgres::{PostgresStorage, PostgresTx};
pub use r#trait::{
    ONE_ACTIVE_RECEPTION_CONSTRAINT, Storage, StorageTx, StoreError, UNIQUE_EMAIL_CONSTRAINT,
};
