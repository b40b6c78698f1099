//! Reception lifecycle orchestration.
//!
//! `ReceptionEngine` is the one place where role gating, storage transactions
//! and domain rules meet. Every operation follows the same pipeline:
//!
//! ```text
//! (role, input)
//!   ↓
//! 1. Authorize the role for the action (no IO)
//!   ↓
//! 2. Begin one storage transaction
//!   ↓
//! 3. Read / lock the rows involved, apply the domain rule, write back
//!   ↓
//! 4. Commit (dropping the transaction instead rolls everything back)
//!   ↓
//! 5. Fire-and-forget metrics signal
//! ```
//!
//! A transaction that loses against a concurrent writer
//! ([`ReceptionError::StorageConflict`]) is retried once with a fresh
//! transaction. Closing is the exception: a conflicting close is surfaced as is.

use std::future::Future;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use pvz_auth::{Action, AuthzError, Role, authorize};
use pvz_core::{DomainError, Entity, PickupPointId};
use pvz_observability::metrics;
use pvz_reception::{City, PickupPoint, PickupPointPage, Product, ProductType, Reception};

use crate::store::{ONE_ACTIVE_RECEPTION_CONSTRAINT, Storage, StorageTx, StoreError};

/// Canonical error of every engine operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReceptionError {
    /// Malformed or unknown input. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("pickup point already has a reception in progress")]
    AlreadyActiveReception,

    #[error("pickup point has no reception in progress")]
    NoActiveReception,

    #[error("reception has no products to remove")]
    EmptyReception,

    /// Lost against a concurrent write. Transient.
    #[error("storage conflict: {0}")]
    StorageConflict(String),

    /// The durable store could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Unexpected backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for ReceptionError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ReceptionError::Validation(msg),
            DomainError::NoActiveReception => ReceptionError::NoActiveReception,
            DomainError::EmptyReception => ReceptionError::EmptyReception,
        }
    }
}

impl From<AuthzError> for ReceptionError {
    fn from(value: AuthzError) -> Self {
        ReceptionError::Forbidden(value.to_string())
    }
}

impl From<StoreError> for ReceptionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ReceptionError::StorageConflict(msg),
            StoreError::Unavailable(msg) => ReceptionError::StorageUnavailable(msg),
            StoreError::UniqueViolation(constraint) => {
                ReceptionError::Storage(format!("unexpected unique violation: {constraint}"))
            }
            StoreError::Backend(msg) => ReceptionError::Storage(msg),
        }
    }
}

/// Reception lifecycle engine over any [`Storage`] backend.
///
/// Holds no state of its own besides the store handle; every call is a short
/// transaction, so one engine can be shared by all request handlers.
#[derive(Debug)]
pub struct ReceptionEngine<S> {
    store: S,
}

impl<S> ReceptionEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> ReceptionEngine<S>
where
    S: Storage,
{
    /// Register a new pickup point (moderators only).
    #[instrument(skip(self))]
    pub async fn create_pickup_point(&self, role: Role, city: City) -> Result<PickupPoint, ReceptionError> {
        authorize(role, Action::CreatePickupPoint)?;

        let point = self
            .retry_on_conflict("create_pickup_point", || self.try_create_pickup_point(city))
            .await?;

        metrics::pickup_point_created();
        tracing::info!(pickup_point_id = %point.id, city = %point.city, "pickup point registered");
        Ok(point)
    }

    async fn try_create_pickup_point(&self, city: City) -> Result<PickupPoint, ReceptionError> {
        let point = PickupPoint::register(city, Utc::now());
        let mut tx = self.store.begin().await?;
        tx.insert_pickup_point(&point).await?;
        tx.commit().await?;
        Ok(point)
    }

    /// One page of pickup points, newest registration first.
    #[instrument(skip(self))]
    pub async fn list_pickup_points(
        &self,
        role: Role,
        page: PickupPointPage,
    ) -> Result<Vec<PickupPoint>, ReceptionError> {
        authorize(role, Action::ListPickupPoints)?;

        let mut tx = self.store.begin().await?;
        let points = tx.list_pickup_points(&page).await?;
        tx.commit().await?;
        Ok(points)
    }

    /// Reception history of one pickup point, newest first.
    #[instrument(skip(self))]
    pub async fn list_receptions(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Vec<Reception>, ReceptionError> {
        authorize(role, Action::ListReceptions)?;

        let mut tx = self.store.begin().await?;
        ensure_pickup_point(&mut tx, pickup_point_id).await?;
        let receptions = tx.list_receptions(pickup_point_id).await?;
        tx.commit().await?;
        Ok(receptions)
    }

    /// Open a new reception.
    ///
    /// The "one open reception per pickup point" rule is left entirely to the
    /// storage constraint; there is no separate existence check for it.
    #[instrument(skip(self))]
    pub async fn create_reception(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ReceptionError> {
        authorize(role, Action::CreateReception)?;

        let reception = self
            .retry_on_conflict("create_reception", || self.try_create_reception(pickup_point_id))
            .await?;

        metrics::reception_created();
        tracing::info!(
            reception_id = %reception.id(),
            pickup_point_id = %pickup_point_id,
            "reception opened"
        );
        Ok(reception)
    }

    async fn try_create_reception(&self, pickup_point_id: PickupPointId) -> Result<Reception, ReceptionError> {
        let mut tx = self.store.begin().await?;
        ensure_pickup_point(&mut tx, pickup_point_id).await?;

        let reception = Reception::open(pickup_point_id, Utc::now());
        tx.insert_reception(&reception).await.map_err(|e| match e {
            StoreError::UniqueViolation(constraint) if constraint == ONE_ACTIVE_RECEPTION_CONSTRAINT => {
                ReceptionError::AlreadyActiveReception
            }
            other => other.into(),
        })?;

        tx.commit().await?;
        Ok(reception)
    }

    /// Take a product into the open reception of a pickup point.
    #[instrument(skip(self))]
    pub async fn add_product(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, ReceptionError> {
        authorize(role, Action::AddProduct)?;

        let product = self
            .retry_on_conflict("add_product", || self.try_add_product(pickup_point_id, product_type))
            .await?;

        metrics::product_added();
        tracing::info!(
            product_id = %product.id,
            reception_id = %product.reception_id,
            product_type = %product.product_type,
            "product added"
        );
        Ok(product)
    }

    async fn try_add_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, ReceptionError> {
        let mut tx = self.store.begin().await?;
        let mut reception = tx
            .lock_active_reception(pickup_point_id)
            .await?
            .ok_or(ReceptionError::NoActiveReception)?;

        let product = Product::receive(*reception.id(), product_type, Utc::now());
        reception.push_product(product.id)?;
        tx.insert_product(&product).await?;
        tx.save_product_ids(&reception).await?;

        tx.commit().await?;
        Ok(product)
    }

    /// Undo the most recent intake of the open reception.
    #[instrument(skip(self))]
    pub async fn remove_last_product(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ReceptionError> {
        authorize(role, Action::RemoveLastProduct)?;

        let reception = self
            .retry_on_conflict("remove_last_product", || {
                self.try_remove_last_product(pickup_point_id)
            })
            .await?;

        tracing::info!(
            reception_id = %reception.id(),
            remaining = reception.product_ids().len(),
            "last product removed"
        );
        Ok(reception)
    }

    async fn try_remove_last_product(&self, pickup_point_id: PickupPointId) -> Result<Reception, ReceptionError> {
        let mut tx = self.store.begin().await?;
        let mut reception = tx
            .lock_active_reception(pickup_point_id)
            .await?
            .ok_or(ReceptionError::NoActiveReception)?;

        let product_id = reception.pop_last_product()?;
        if !tx.delete_product(product_id).await? {
            return Err(ReceptionError::Storage(format!(
                "product {product_id} is listed on reception {} but has no row",
                reception.id()
            )));
        }
        tx.save_product_ids(&reception).await?;

        tx.commit().await?;
        Ok(reception)
    }

    /// Close the open reception of a pickup point. Not retried on conflict.
    #[instrument(skip(self))]
    pub async fn close_reception(
        &self,
        role: Role,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ReceptionError> {
        authorize(role, Action::CloseReception)?;

        let mut tx = self.store.begin().await?;
        let reception = tx
            .close_active_reception(pickup_point_id)
            .await?
            .ok_or(ReceptionError::NoActiveReception)?;
        tx.commit().await?;

        tracing::info!(
            reception_id = %reception.id(),
            products = reception.product_ids().len(),
            "reception closed"
        );
        Ok(reception)
    }

    async fn retry_on_conflict<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, ReceptionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReceptionError>>,
    {
        match attempt().await {
            Err(ReceptionError::StorageConflict(reason)) => {
                tracing::warn!(operation, %reason, "storage conflict, retrying once");
                attempt().await
            }
            other => other,
        }
    }
}

async fn ensure_pickup_point<T: StorageTx>(tx: &mut T, id: PickupPointId) -> Result<(), ReceptionError> {
    if tx.pickup_point_exists(id).await? {
        Ok(())
    } else {
        Err(ReceptionError::Validation(format!("pickup point {id} not found")))
    }
}
