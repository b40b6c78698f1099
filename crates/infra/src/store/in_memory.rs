use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use pvz_auth::{Email, User};
use pvz_core::{Entity, PickupPointId, ProductId, ReceptionId, UserId};
use pvz_reception::{PickupPoint, PickupPointPage, Product, Reception};

use super::r#trait::{
    ONE_ACTIVE_RECEPTION_CONSTRAINT, Storage, StorageTx, StoreError, UNIQUE_EMAIL_CONSTRAINT,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    pickup_points: HashMap<PickupPointId, PickupPoint>,
    receptions: HashMap<ReceptionId, Reception>,
    products: HashMap<ProductId, Product>,
    users: HashMap<UserId, User>,
}

impl Tables {
    fn active_reception_id(&self, pickup_point_id: PickupPointId) -> Option<ReceptionId> {
        self.receptions
            .values()
            .filter(|r| r.pickup_point_id() == pickup_point_id && r.is_in_progress())
            .max_by_key(|r| (r.date_time(), *r.id()))
            .map(|r| *r.id())
    }
}

/// In-memory storage.
///
/// Intended for tests/dev. Transactions are fully serialized: a transaction
/// owns the table lock from `begin` until commit or drop and works on a private
/// copy, so an abandoned transaction leaves no trace.
///
/// `begin` clones every table, so each operation costs O(total rows). Fine for
/// a development store; production runs on [`super::PostgresStorage`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed snapshot of a product row.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.tables.lock().await.products.get(&id).cloned()
    }

    /// Committed snapshot of a reception row.
    pub async fn reception(&self, id: ReceptionId) -> Option<Reception> {
        self.tables.lock().await.receptions.get(&id).cloned()
    }

    pub async fn product_count(&self) -> usize {
        self.tables.lock().await.products.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(InMemoryTx { guard, working })
    }
}

/// A serialized in-memory transaction.
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StorageTx for InMemoryTx {
    async fn insert_pickup_point(&mut self, pickup_point: &PickupPoint) -> Result<(), StoreError> {
        if self.working.pickup_points.contains_key(&pickup_point.id) {
            return Err(StoreError::UniqueViolation("pickup_points_pkey".to_string()));
        }
        self.working
            .pickup_points
            .insert(pickup_point.id, pickup_point.clone());
        Ok(())
    }

    async fn pickup_point_exists(&mut self, id: PickupPointId) -> Result<bool, StoreError> {
        Ok(self.working.pickup_points.contains_key(&id))
    }

    async fn list_pickup_points(&mut self, page: &PickupPointPage) -> Result<Vec<PickupPoint>, StoreError> {
        let mut points: Vec<&PickupPoint> = self
            .working
            .pickup_points
            .values()
            .filter(|p| page.matches(p))
            .collect();
        points.sort_by(|a, b| {
            b.registration_date
                .cmp(&a.registration_date)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(points
            .into_iter()
            .skip(offset)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn insert_reception(&mut self, reception: &Reception) -> Result<(), StoreError> {
        if reception.is_in_progress()
            && self
                .working
                .active_reception_id(reception.pickup_point_id())
                .is_some()
        {
            return Err(StoreError::UniqueViolation(
                ONE_ACTIVE_RECEPTION_CONSTRAINT.to_string(),
            ));
        }
        self.working.receptions.insert(*reception.id(), reception.clone());
        Ok(())
    }

    async fn lock_active_reception(
        &mut self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        Ok(self
            .working
            .active_reception_id(pickup_point_id)
            .and_then(|id| self.working.receptions.get(&id).cloned()))
    }

    async fn save_product_ids(&mut self, reception: &Reception) -> Result<(), StoreError> {
        match self.working.receptions.get_mut(reception.id()) {
            Some(stored) => {
                *stored = Reception::restore(
                    *stored.id(),
                    stored.pickup_point_id(),
                    stored.date_time(),
                    stored.status(),
                    reception.product_ids().to_vec(),
                );
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "reception {} not found",
                reception.id()
            ))),
        }
    }

    async fn close_active_reception(
        &mut self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        let Some(id) = self.working.active_reception_id(pickup_point_id) else {
            return Ok(None);
        };
        let Some(reception) = self.working.receptions.get_mut(&id) else {
            return Ok(None);
        };
        reception
            .close()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(reception.clone()))
    }

    async fn list_receptions(&mut self, pickup_point_id: PickupPointId) -> Result<Vec<Reception>, StoreError> {
        let mut receptions: Vec<Reception> = self
            .working
            .receptions
            .values()
            .filter(|r| r.pickup_point_id() == pickup_point_id)
            .cloned()
            .collect();
        receptions.sort_by(|a, b| {
            b.date_time()
                .cmp(&a.date_time())
                .then_with(|| b.id().cmp(a.id()))
        });
        Ok(receptions)
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if !self.working.receptions.contains_key(&product.reception_id) {
            return Err(StoreError::Backend(format!(
                "reception {} not found",
                product.reception_id
            )));
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        Ok(self.working.products.remove(&id).is_some())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        if self.working.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(UNIQUE_EMAIL_CONSTRAINT.to_string()));
        }
        if self.working.users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation("users_pkey".to_string()));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pvz_auth::Role;
    use pvz_reception::{City, ProductType};

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let storage = InMemoryStorage::new();
        let point = PickupPoint::register(City::Kazan, Utc::now());

        {
            let mut tx = storage.begin().await.unwrap();
            tx.insert_pickup_point(&point).await.unwrap();
        }

        let mut tx = storage.begin().await.unwrap();
        assert!(!tx.pickup_point_exists(point.id).await.unwrap());
    }

    #[tokio::test]
    async fn second_in_progress_reception_is_a_unique_violation() {
        let storage = InMemoryStorage::new();
        let point = PickupPoint::register(City::Moscow, Utc::now());

        let mut tx = storage.begin().await.unwrap();
        tx.insert_pickup_point(&point).await.unwrap();
        tx.insert_reception(&Reception::open(point.id, Utc::now()))
            .await
            .unwrap();
        let err = tx
            .insert_reception(&Reception::open(point.id, Utc::now()))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::UniqueViolation(ONE_ACTIVE_RECEPTION_CONSTRAINT.to_string())
        );
    }

    #[tokio::test]
    async fn close_then_open_again() {
        let storage = InMemoryStorage::new();
        let point = PickupPoint::register(City::Moscow, Utc::now());

        let mut tx = storage.begin().await.unwrap();
        tx.insert_pickup_point(&point).await.unwrap();
        tx.insert_reception(&Reception::open(point.id, Utc::now()))
            .await
            .unwrap();
        let closed = tx.close_active_reception(point.id).await.unwrap().unwrap();
        assert!(!closed.is_in_progress());
        assert!(tx.close_active_reception(point.id).await.unwrap().is_none());

        tx.insert_reception(&Reception::open(point.id, Utc::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        assert_eq!(tx.list_receptions(point.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_paged() {
        let storage = InMemoryStorage::new();
        let base = Utc::now();

        let mut tx = storage.begin().await.unwrap();
        for i in 0..5 {
            let city = if i % 2 == 0 { City::Moscow } else { City::Kazan };
            tx.insert_pickup_point(&PickupPoint::register(city, base + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let first = tx
            .list_pickup_points(&PickupPointPage::new(1, 2, None).unwrap())
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].registration_date, base + Duration::seconds(4));
        assert_eq!(first[1].registration_date, base + Duration::seconds(3));

        let last = tx
            .list_pickup_points(&PickupPointPage::new(3, 2, None).unwrap())
            .await
            .unwrap();
        assert_eq!(last.len(), 1);

        let kazan = tx
            .list_pickup_points(&PickupPointPage::new(1, 10, Some(City::Kazan)).unwrap())
            .await
            .unwrap();
        assert_eq!(kazan.len(), 2);
        assert!(kazan.iter().all(|p| p.city == City::Kazan));

        let window = PickupPointPage::default()
            .with_registration_window(Some(base + Duration::seconds(1)), Some(base + Duration::seconds(3)))
            .unwrap();
        let in_window = tx.list_pickup_points(&window).await.unwrap();
        let dates: Vec<_> = in_window.iter().map(|p| p.registration_date).collect();
        assert_eq!(
            dates,
            vec![
                base + Duration::seconds(3),
                base + Duration::seconds(2),
                base + Duration::seconds(1),
            ]
        );
    }

    #[tokio::test]
    async fn product_rows_follow_commit() {
        let storage = InMemoryStorage::new();
        let point = PickupPoint::register(City::Moscow, Utc::now());

        let mut tx = storage.begin().await.unwrap();
        tx.insert_pickup_point(&point).await.unwrap();
        tx.insert_reception(&Reception::open(point.id, Utc::now()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(storage.product_count().await, 0);

        let mut tx = storage.begin().await.unwrap();
        let mut active = tx.lock_active_reception(point.id).await.unwrap().unwrap();
        let product = Product::receive(*active.id(), ProductType::Footwear, Utc::now());
        tx.insert_product(&product).await.unwrap();
        active.push_product(product.id).unwrap();
        tx.save_product_ids(&active).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(storage.product(product.id).await, Some(product.clone()));
        let stored = storage.reception(*active.id()).await.unwrap();
        assert_eq!(stored.product_ids(), &[product.id]);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let storage = InMemoryStorage::new();
        let email: Email = "staff@example.com".parse().unwrap();
        let first = User::register(email.clone(), "$2b$04$a".into(), Role::Employee, Utc::now());
        let second = User::register(email.clone(), "$2b$04$b".into(), Role::Moderator, Utc::now());

        let mut tx = storage.begin().await.unwrap();
        tx.insert_user(&first).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let err = tx.insert_user(&second).await.unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation(UNIQUE_EMAIL_CONSTRAINT.to_string()));
        assert_eq!(tx.user_by_email(&email).await.unwrap(), Some(first));
        assert!(tx
            .user_by_email(&"nobody@example.com".parse().unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
