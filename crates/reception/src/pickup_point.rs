use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, Entity, PickupPointId};

/// Cities where pickup points may be registered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    #[serde(rename = "Москва")]
    Moscow,
    #[serde(rename = "Санкт-Петербург")]
    SaintPetersburg,
    #[serde(rename = "Казань")]
    Kazan,
}

impl City {
    pub const ALL: [City; 3] = [City::Moscow, City::SaintPetersburg, City::Kazan];

    /// Canonical (wire and storage) spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            City::Moscow => "Москва",
            City::SaintPetersburg => "Санкт-Петербург",
            City::Kazan => "Казань",
        }
    }
}

impl core::fmt::Display for City {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        City::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown city '{s}'")))
    }
}

/// A registered pickup point. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPoint {
    pub id: PickupPointId,
    pub city: City,
    pub registration_date: DateTime<Utc>,
}

impl PickupPoint {
    pub fn register(city: City, at: DateTime<Utc>) -> Self {
        Self {
            id: PickupPointId::new(),
            city,
            registration_date: at,
        }
    }
}

impl Entity for PickupPoint {
    type Id = PickupPointId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One page of the pickup-point listing, optionally filtered by city and by
/// an inclusive registration-date window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PickupPointPage {
    page: u32,
    limit: u32,
    city: Option<City>,
    registered_from: Option<DateTime<Utc>>,
    registered_to: Option<DateTime<Utc>>,
}

impl PickupPointPage {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 30;

    /// Pages are 1-based; `limit` must be within `1..=MAX_LIMIT`.
    pub fn new(page: u32, limit: u32, city: Option<City>) -> Result<Self, DomainError> {
        if page == 0 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self {
            page,
            limit,
            city,
            registered_from: None,
            registered_to: None,
        })
    }

    /// Keep only points registered within `[from, to]`. Either bound may be open.
    pub fn with_registration_window(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(DomainError::validation(format!(
                    "startDate {} is after endDate {}",
                    from.to_rfc3339(),
                    to.to_rfc3339()
                )));
            }
        }
        self.registered_from = from;
        self.registered_to = to;
        Ok(self)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn city(&self) -> Option<City> {
        self.city
    }

    pub fn registered_from(&self) -> Option<DateTime<Utc>> {
        self.registered_from
    }

    pub fn registered_to(&self) -> Option<DateTime<Utc>> {
        self.registered_to
    }

    /// Whether `point` passes the city and registration-date filters.
    pub fn matches(&self, point: &PickupPoint) -> bool {
        self.city.is_none_or(|city| point.city == city)
            && self.registered_from.is_none_or(|from| point.registration_date >= from)
            && self.registered_to.is_none_or(|to| point.registration_date <= to)
    }
}

impl Default for PickupPointPage {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
            city: None,
            registered_from: None,
            registered_to: None,
        }
    }
}
