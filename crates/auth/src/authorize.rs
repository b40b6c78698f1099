use serde::Serialize;
use thiserror::Error;

use crate::Role;

/// Operations that are gated by role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreatePickupPoint,
    ListPickupPoints,
    ListReceptions,
    CreateReception,
    AddProduct,
    RemoveLastProduct,
    CloseReception,
}

impl Action {
    /// Roles allowed to perform this action.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Action::CreatePickupPoint => &[Role::Moderator],
            Action::ListPickupPoints | Action::ListReceptions => &[Role::Employee, Role::Moderator],
            Action::CreateReception
            | Action::AddProduct
            | Action::RemoveLastProduct
            | Action::CloseReception => &[Role::Employee],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreatePickupPoint => "create_pickup_point",
            Action::ListPickupPoints => "list_pickup_points",
            Action::ListReceptions => "list_receptions",
            Action::CreateReception => "create_reception",
            Action::AddProduct => "add_product",
            Action::RemoveLastProduct => "remove_last_product",
            Action::CloseReception => "close_reception",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' may not {action}")]
    Forbidden { role: Role, action: Action },
}

/// Authorize a role for an action.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(role: Role, action: Action) -> Result<(), AuthzError> {
    if action.allowed_roles().contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { role, action })
    }
}
