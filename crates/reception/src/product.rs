use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, Entity, ProductId, ReceptionId};

/// Product category accepted at intake.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "электроника", alias = "electronics")]
    Electronics,
    #[serde(rename = "одежда", alias = "clothing", alias = "clothes")]
    Clothing,
    #[serde(rename = "обувь", alias = "footwear", alias = "shoes")]
    Footwear,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [
        ProductType::Electronics,
        ProductType::Clothing,
        ProductType::Footwear,
    ];

    /// Canonical (wire and storage) spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Electronics => "электроника",
            ProductType::Clothing => "одежда",
            ProductType::Footwear => "обувь",
        }
    }
}

impl core::fmt::Display for ProductType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "электроника" | "electronics" => Ok(ProductType::Electronics),
            "одежда" | "clothing" | "clothes" => Ok(ProductType::Clothing),
            "обувь" | "footwear" | "shoes" => Ok(ProductType::Footwear),
            other => Err(DomainError::validation(format!(
                "unknown product type '{other}'"
            ))),
        }
    }
}

/// A single item registered during a reception.
///
/// `reception_id` is a convenience back-reference; the reception's own
/// `product_ids` list is authoritative for batch membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub reception_id: ReceptionId,
    pub product_type: ProductType,
    pub added_at: DateTime<Utc>,
}

impl Product {
    pub fn receive(reception_id: ReceptionId, product_type: ProductType, at: DateTime<Utc>) -> Self {
        Self {
            id: ProductId::new(),
            reception_id,
            product_type,
            added_at: at,
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_and_english_names() {
        assert_eq!("электроника".parse::<ProductType>().unwrap(), ProductType::Electronics);
        assert_eq!("Electronics".parse::<ProductType>().unwrap(), ProductType::Electronics);
        assert_eq!("clothes".parse::<ProductType>().unwrap(), ProductType::Clothing);
        assert_eq!("обувь".parse::<ProductType>().unwrap(), ProductType::Footwear);
        assert_eq!("footwear".parse::<ProductType>().unwrap(), ProductType::Footwear);
    }

    #[test]
    fn canonical_names_round_trip() {
        for t in ProductType::ALL {
            assert_eq!(t.as_str().parse::<ProductType>().unwrap(), t);
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let err = "furniture".parse::<ProductType>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn received_product_points_at_its_reception() {
        let reception_id = ReceptionId::new();
        let product = Product::receive(reception_id, ProductType::Clothing, Utc::now());
        assert_eq!(product.reception_id, reception_id);
        assert_eq!(product.product_type, ProductType::Clothing);
    }
}
