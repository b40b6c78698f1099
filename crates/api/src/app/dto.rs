use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pvz_auth::{Role, User};
use pvz_core::{Entity, PickupPointId};
use pvz_reception::{City, PickupPoint, PickupPointPage, Product, ProductType, Reception};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DummyLoginRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePickupPointRequest {
    pub city: String,
}

/// Body of the reception routes that only name a pickup point.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupPointRef {
    pub pvz_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    pub pvz_id: String,
    #[serde(rename = "type")]
    pub product_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPickupPointsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub city: Option<String>,
    /// RFC 3339, inclusive.
    pub start_date: Option<String>,
    /// RFC 3339, inclusive.
    pub end_date: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: *u.id.as_uuid(),
            email: u.email.as_str().to_owned(),
            role: u.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupPointResponse {
    pub id: Uuid,
    pub city: City,
    pub registration_date: DateTime<Utc>,
}

impl From<PickupPoint> for PickupPointResponse {
    fn from(p: PickupPoint) -> Self {
        Self {
            id: *p.id.as_uuid(),
            city: p.city,
            registration_date: p.registration_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionResponse {
    pub id: Uuid,
    pub pvz_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub status: &'static str,
    pub product_ids: Vec<Uuid>,
}

impl From<Reception> for ReceptionResponse {
    fn from(r: Reception) -> Self {
        Self {
            id: *r.id().as_uuid(),
            pvz_id: *r.pickup_point_id().as_uuid(),
            date_time: r.date_time(),
            status: r.status().as_str(),
            product_ids: r.product_ids().iter().map(|id| *id.as_uuid()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub reception_id: Uuid,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub date_time: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: *p.id.as_uuid(),
            reception_id: *p.reception_id.as_uuid(),
            product_type: p.product_type,
            date_time: p.added_at,
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

fn bad_request(message: impl Into<String>) -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

pub fn parse_role(s: &str) -> Result<Role, axum::response::Response> {
    s.parse().map_err(|e: pvz_auth::roles::UnknownRole| bad_request(e.to_string()))
}

pub fn parse_pickup_point_id(s: &str) -> Result<PickupPointId, axum::response::Response> {
    s.parse().map_err(|e: pvz_core::DomainError| bad_request(e.to_string()))
}

pub fn parse_city(s: &str) -> Result<City, axum::response::Response> {
    s.parse().map_err(|e: pvz_core::DomainError| bad_request(e.to_string()))
}

pub fn parse_product_type(s: &str) -> Result<ProductType, axum::response::Response> {
    s.parse().map_err(|e: pvz_core::DomainError| bad_request(e.to_string()))
}

impl ListPickupPointsQuery {
    pub fn into_page(self) -> Result<PickupPointPage, axum::response::Response> {
        let city = match self.city.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_city(raw)?),
        };
        let start = parse_date("startDate", self.start_date.as_deref())?;
        let end = parse_date("endDate", self.end_date.as_deref())?;

        PickupPointPage::new(
            self.page.unwrap_or(PickupPointPage::DEFAULT_PAGE),
            self.limit.unwrap_or(PickupPointPage::DEFAULT_LIMIT),
            city,
        )
        .and_then(|page| page.with_registration_window(start, end))
        .map_err(|e| bad_request(e.to_string()))
    }
}

fn parse_date(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, axum::response::Response> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| bad_request(format!("{field} must be an RFC 3339 timestamp: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reception_serializes_camel_case() {
        let pvz = PickupPointId::new();
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap();
        let json = serde_json::to_value(ReceptionResponse::from(Reception::open(pvz, at))).unwrap();

        assert_eq!(json["pvzId"], pvz.to_string());
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["productIds"], serde_json::json!([]));
        assert!(json["dateTime"].as_str().unwrap().starts_with("2025-04-01T09:30:00"));
    }

    #[test]
    fn product_type_is_serialized_under_type_key() {
        let product = Product::receive(pvz_core::ReceptionId::new(), ProductType::Footwear, Utc::now());
        let json = serde_json::to_value(ProductResponse::from(product)).unwrap();
        assert_eq!(json["type"], "обувь");
        assert!(json.get("receptionId").is_some());
    }

    #[test]
    fn user_response_omits_password_hash() {
        let user = User::register(
            "staff@example.com".parse().unwrap(),
            "$2b$04$hash".into(),
            Role::Employee,
            Utc::now(),
        );
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["email"], "staff@example.com");
        assert_eq!(json["role"], "employee");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn add_product_request_reads_type_field() {
        let req: AddProductRequest =
            serde_json::from_value(serde_json::json!({"pvzId": "x", "type": "electronics"})).unwrap();
        assert_eq!(req.product_type, "electronics");
        assert_eq!(parse_product_type(&req.product_type).unwrap(), ProductType::Electronics);
    }

    #[test]
    fn query_defaults_and_bounds() {
        let page = ListPickupPointsQuery::default().into_page().unwrap();
        assert_eq!(page, PickupPointPage::default());

        let over = ListPickupPointsQuery {
            limit: Some(31),
            ..Default::default()
        };
        assert_eq!(over.into_page().unwrap_err().status(), StatusCode::BAD_REQUEST);

        let unknown_city = ListPickupPointsQuery {
            city: Some("Тверь".into()),
            ..Default::default()
        };
        assert!(unknown_city.into_page().is_err());
    }

    #[test]
    fn query_reads_registration_window() {
        let query: ListPickupPointsQuery = serde_json::from_value(serde_json::json!({
            "startDate": "2025-04-01T00:00:00Z",
            "endDate": "2025-04-30T23:59:59+03:00",
        }))
        .unwrap();
        let page = query.into_page().unwrap();
        assert_eq!(
            page.registered_from(),
            Some(Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            page.registered_to(),
            Some(Utc.with_ymd_and_hms(2025, 4, 30, 20, 59, 59).unwrap())
        );
    }

    #[test]
    fn query_rejects_bad_or_inverted_dates() {
        let garbage = ListPickupPointsQuery {
            start_date: Some("yesterday".into()),
            ..Default::default()
        };
        assert_eq!(garbage.into_page().unwrap_err().status(), StatusCode::BAD_REQUEST);

        let inverted = ListPickupPointsQuery {
            start_date: Some("2025-05-01T00:00:00Z".into()),
            end_date: Some("2025-04-01T00:00:00Z".into()),
            ..Default::default()
        };
        assert_eq!(inverted.into_page().unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
