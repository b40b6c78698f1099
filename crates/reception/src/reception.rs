use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, DomainResult, Entity, PickupPointId, ProductId, ReceptionId};

/// Reception lifecycle status. `Closed` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceptionStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "close")]
    Closed,
}

impl ReceptionStatus {
    /// Canonical (wire and storage) spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceptionStatus::InProgress => "in_progress",
            ReceptionStatus::Closed => "close",
        }
    }
}

impl core::fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceptionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ReceptionStatus::InProgress),
            "close" => Ok(ReceptionStatus::Closed),
            other => Err(DomainError::validation(format!(
                "unknown reception status '{other}'"
            ))),
        }
    }
}

/// A batch intake session at a pickup point.
///
/// # Invariants
/// - Created `InProgress` with no products; `Closed` is one-way.
/// - `product_ids` keeps insertion order and only changes while `InProgress`.
/// - Only the most recently added product can be removed (stack semantics).
///
/// "At most one `InProgress` reception per pickup point" spans many rows and
/// is therefore enforced by storage, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reception {
    id: ReceptionId,
    pickup_point_id: PickupPointId,
    date_time: DateTime<Utc>,
    status: ReceptionStatus,
    product_ids: Vec<ProductId>,
}

impl Reception {
    /// Open a new, empty reception for a pickup point.
    pub fn open(pickup_point_id: PickupPointId, at: DateTime<Utc>) -> Self {
        Self {
            id: ReceptionId::new(),
            pickup_point_id,
            date_time: at,
            status: ReceptionStatus::InProgress,
            product_ids: Vec::new(),
        }
    }

    /// Rebuild a reception from persisted state.
    pub fn restore(
        id: ReceptionId,
        pickup_point_id: PickupPointId,
        date_time: DateTime<Utc>,
        status: ReceptionStatus,
        product_ids: Vec<ProductId>,
    ) -> Self {
        Self {
            id,
            pickup_point_id,
            date_time,
            status,
            product_ids,
        }
    }

    pub fn pickup_point_id(&self) -> PickupPointId {
        self.pickup_point_id
    }

    pub fn date_time(&self) -> DateTime<Utc> {
        self.date_time
    }

    pub fn status(&self) -> ReceptionStatus {
        self.status
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == ReceptionStatus::InProgress
    }

    /// Append a product to the end of the batch.
    pub fn push_product(&mut self, product_id: ProductId) -> DomainResult<()> {
        self.ensure_in_progress()?;
        self.product_ids.push(product_id);
        Ok(())
    }

    /// Remove and return the most recently added product.
    pub fn pop_last_product(&mut self) -> DomainResult<ProductId> {
        self.ensure_in_progress()?;
        self.product_ids.pop().ok_or(DomainError::EmptyReception)
    }

    /// Seal the batch.
    pub fn close(&mut self) -> DomainResult<()> {
        self.ensure_in_progress()?;
        self.status = ReceptionStatus::Closed;
        Ok(())
    }

    fn ensure_in_progress(&self) -> DomainResult<()> {
        if self.is_in_progress() {
            Ok(())
        } else {
            Err(DomainError::NoActiveReception)
        }
    }
}

impl Entity for Reception {
    type Id = ReceptionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_reception() -> Reception {
        Reception::open(PickupPointId::new(), Utc::now())
    }

    #[test]
    fn opens_empty_and_in_progress() {
        let r = open_reception();
        assert_eq!(r.status(), ReceptionStatus::InProgress);
        assert!(r.product_ids().is_empty());
    }

    #[test]
    fn products_keep_insertion_order() {
        let mut r = open_reception();
        let (p1, p2, p3) = (ProductId::new(), ProductId::new(), ProductId::new());
        r.push_product(p1).unwrap();
        r.push_product(p2).unwrap();
        r.push_product(p3).unwrap();
        assert_eq!(r.product_ids(), &[p1, p2, p3]);

        assert_eq!(r.pop_last_product().unwrap(), p3);
        assert_eq!(r.product_ids(), &[p1, p2]);
    }

    #[test]
    fn pop_on_empty_reception_fails_without_change() {
        let mut r = open_reception();
        let before = r.clone();
        assert_eq!(r.pop_last_product().unwrap_err(), DomainError::EmptyReception);
        assert_eq!(r, before);
    }

    #[test]
    fn closed_reception_is_frozen() {
        let mut r = open_reception();
        let p1 = ProductId::new();
        r.push_product(p1).unwrap();
        r.close().unwrap();

        assert_eq!(r.status(), ReceptionStatus::Closed);
        assert_eq!(r.push_product(ProductId::new()).unwrap_err(), DomainError::NoActiveReception);
        assert_eq!(r.pop_last_product().unwrap_err(), DomainError::NoActiveReception);
        assert_eq!(r.product_ids(), &[p1]);
    }

    #[test]
    fn close_is_one_way() {
        let mut r = open_reception();
        r.close().unwrap();
        assert_eq!(r.close().unwrap_err(), DomainError::NoActiveReception);
    }

    #[test]
    fn status_spelling_round_trips() {
        for s in [ReceptionStatus::InProgress, ReceptionStatus::Closed] {
            assert_eq!(s.as_str().parse::<ReceptionStatus>().unwrap(), s);
        }
        assert!("closed".parse::<ReceptionStatus>().is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Push,
            Pop,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![3 => Just(Op::Push), 2 => Just(Op::Pop)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: push/pop behave exactly like a stack of product ids.
            #[test]
            fn product_ids_follow_stack_semantics(ops in proptest::collection::vec(op(), 0..64)) {
                let mut reception = open_reception();
                let mut model: Vec<ProductId> = Vec::new();

                for op in ops {
                    match op {
                        Op::Push => {
                            let id = ProductId::new();
                            reception.push_product(id).unwrap();
                            model.push(id);
                        }
                        Op::Pop => match model.pop() {
                            Some(expected) => {
                                prop_assert_eq!(reception.pop_last_product().unwrap(), expected);
                            }
                            None => {
                                prop_assert_eq!(
                                    reception.pop_last_product().unwrap_err(),
                                    DomainError::EmptyReception
                                );
                            }
                        },
                    }
                    prop_assert_eq!(reception.product_ids(), model.as_slice());
                }
            }

            /// Property: nothing mutates a closed reception's product list.
            #[test]
            fn closing_freezes_product_ids(pushes in 0usize..16, attempts in proptest::collection::vec(op(), 0..16)) {
                let mut reception = open_reception();
                for _ in 0..pushes {
                    reception.push_product(ProductId::new()).unwrap();
                }
                reception.close().unwrap();
                let frozen = reception.product_ids().to_vec();

                for op in attempts {
                    let result = match op {
                        Op::Push => reception.push_product(ProductId::new()),
                        Op::Pop => reception.pop_last_product().map(|_| ()),
                    };
                    prop_assert_eq!(result.unwrap_err(), DomainError::NoActiveReception);
                }
                prop_assert_eq!(reception.product_ids(), frozen.as_slice());
            }
        }
    }
}
