//! Reception domain module.
//!
//! This crate contains the business rules for pickup points, receptions and
//! products, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod pickup_point;
pub mod product;
pub mod reception;

pub use pickup_point::{City, PickupPoint, PickupPointPage};
pub use product::{Product, ProductType};
pub use reception::{Reception, ReceptionStatus};
