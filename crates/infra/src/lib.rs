//! Infrastructure layer: storage backends, configuration, accounts and the
//! reception lifecycle engine that orchestrates them.

pub mod accounts;
pub mod config;
pub mod reception_engine;
pub mod store;

pub use accounts::{AccountError, AccountService};
pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use reception_engine::{ReceptionEngine, ReceptionError};
pub use store::{InMemoryStorage, PostgresStorage, Storage, StorageTx, StoreError};
