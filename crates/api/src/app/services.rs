//! Storage, engine and account wiring.
//!
//! The backend is picked once at startup (`USE_PERSISTENT_STORES`); handlers
//! only see [`AppServices`] and never know which one is running.

use std::sync::Arc;

use pvz_auth::{PasswordHasher, Role, User};
use pvz_core::PickupPointId;
use pvz_infra::{
    AccountError, AccountService, AppConfig, InMemoryStorage, PostgresStorage, ReceptionEngine, ReceptionError,
    StoreError,
};
use pvz_reception::{City, PickupPoint, PickupPointPage, Product, ProductType, Reception};

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        engine: Arc<ReceptionEngine<InMemoryStorage>>,
        accounts: Arc<AccountService<InMemoryStorage>>,
    },
    Persistent {
        engine: Arc<ReceptionEngine<PostgresStorage>>,
        accounts: Arc<AccountService<PostgresStorage>>,
    },
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    if config.use_persistent_stores {
        build_persistent_services(config).await
    } else {
        Ok(build_in_memory_services(config.password_hasher))
    }
}

/// Both services share one set of in-memory tables.
pub fn build_in_memory_services(hasher: PasswordHasher) -> AppServices {
    let storage = InMemoryStorage::new();
    AppServices::InMemory {
        accounts: Arc::new(AccountService::new(storage.clone(), hasher)),
        engine: Arc::new(ReceptionEngine::new(storage)),
    }
}

async fn build_persistent_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let storage = PostgresStorage::connect(&config.database).await?;
    storage.migrate().await?;
    Ok(AppServices::Persistent {
        accounts: Arc::new(AccountService::new(storage.clone(), config.password_hasher)),
        engine: Arc::new(ReceptionEngine::new(storage)),
    })
}

impl AppServices {
    pub fn backend(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "in_memory",
            AppServices::Persistent { .. } => "postgres",
        }
    }

    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<User, AccountError> {
        match self {
            AppServices::InMemory { accounts, .. } => accounts.register(email, password, role).await,
            AppServices::Persistent { accounts, .. } => accounts.register(email, password, role).await,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AccountError> {
        match self {
            AppServices::InMemory { accounts, .. } => accounts.login(email, password).await,
            AppServices::Persistent { accounts, .. } => accounts.login(email, password).await,
        }
    }

    pub async fn create_pickup_point(&self, role: Role, city: City) -> Result<PickupPoint, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.create_pickup_point(role, city).await,
            AppServices::Persistent { engine, .. } => engine.create_pickup_point(role, city).await,
        }
    }

    pub async fn list_pickup_points(
        &self,
        role: Role,
        page: PickupPointPage,
    ) -> Result<Vec<PickupPoint>, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.list_pickup_points(role, page).await,
            AppServices::Persistent { engine, .. } => engine.list_pickup_points(role, page).await,
        }
    }

    pub async fn list_receptions(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Vec<Reception>, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.list_receptions(role, pickup_point_id).await,
            AppServices::Persistent { engine, .. } => engine.list_receptions(role, pickup_point_id).await,
        }
    }

    pub async fn create_reception(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.create_reception(role, pickup_point_id).await,
            AppServices::Persistent { engine, .. } => engine.create_reception(role, pickup_point_id).await,
        }
    }

    pub async fn add_product(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.add_product(role, pickup_point_id, product_type).await,
            AppServices::Persistent { engine, .. } => engine.add_product(role, pickup_point_id, product_type).await,
        }
    }

    pub async fn remove_last_product(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.remove_last_product(role, pickup_point_id).await,
            AppServices::Persistent { engine, .. } => engine.remove_last_product(role, pickup_point_id).await,
        }
    }

    pub async fn close_reception(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ReceptionError> {
        match self {
            AppServices::InMemory { engine, .. } => engine.close_reception(role, pickup_point_id).await,
            AppServices::Persistent { engine, .. } => engine.close_reception(role, pickup_point_id).await,
        }
    }
}
