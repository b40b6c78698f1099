use async_trait::async_trait;
use thiserror::Error;

use pvz_auth::{Email, User};
use pvz_core::{PickupPointId, ProductId};
use pvz_reception::{PickupPoint, PickupPointPage, Product, Reception};

/// Storage operation error.
///
/// These are **infrastructure errors** (constraints, contention,
/// connectivity) as opposed to domain errors (validation, lifecycle rules).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (constraint name).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The transaction lost against a concurrent writer (serialization
    /// failure, deadlock). Safe to retry with a fresh transaction.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// The backing store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure (bad row, unexpected SQL error).
    #[error("storage error: {0}")]
    Backend(String),
}

/// Name of the partial unique index that allows at most one `InProgress`
/// reception per pickup point.
pub const ONE_ACTIVE_RECEPTION_CONSTRAINT: &str = "receptions_one_in_progress_per_pickup_point";

/// Unique constraint on `users.email`.
pub const UNIQUE_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Durable store of pickup points, receptions, products and user accounts.
///
/// Every unit of work runs inside a [`StorageTx`] obtained from
/// [`Storage::begin`].
#[async_trait]
pub trait Storage: Send + Sync {
    type Tx: StorageTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One storage transaction.
///
/// Writes become visible only after [`StorageTx::commit`]. Dropping the
/// transaction without committing rolls everything back, which is also what
/// happens when the owning request future is cancelled.
#[async_trait]
pub trait StorageTx: Send {
    async fn insert_pickup_point(&mut self, pickup_point: &PickupPoint) -> Result<(), StoreError>;

    async fn pickup_point_exists(&mut self, id: PickupPointId) -> Result<bool, StoreError>;

    /// Newest registrations first.
    async fn list_pickup_points(&mut self, page: &PickupPointPage) -> Result<Vec<PickupPoint>, StoreError>;

    /// Insert a new reception.
    ///
    /// Fails with [`StoreError::UniqueViolation`] carrying
    /// [`ONE_ACTIVE_RECEPTION_CONSTRAINT`] when the pickup point already has
    /// an `InProgress` reception.
    async fn insert_reception(&mut self, reception: &Reception) -> Result<(), StoreError>;

    /// Load the most recent `InProgress` reception of a pickup point and hold
    /// it exclusively until the transaction ends.
    async fn lock_active_reception(
        &mut self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError>;

    /// Persist the reception's current `product_ids`.
    async fn save_product_ids(&mut self, reception: &Reception) -> Result<(), StoreError>;

    /// Flip the `InProgress` reception of a pickup point to `Closed` in a single
    /// conditional write. Returns `None` when nothing was open at write time.
    async fn close_active_reception(
        &mut self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError>;

    /// Full history of a pickup point, newest first.
    async fn list_receptions(&mut self, pickup_point_id: PickupPointId) -> Result<Vec<Reception>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Returns `false` when no such product row existed.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] carrying
    /// [`UNIQUE_EMAIL_CONSTRAINT`] when the email is already registered.
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
