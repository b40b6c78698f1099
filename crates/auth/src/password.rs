//! Password policy and bcrypt hashing.

use thiserror::Error;

use pvz_core::DomainError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt only reads this many bytes of input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Length rules applied at registration. Length is counted in characters.
pub fn check_password_policy(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(DomainError::validation(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes long"
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt cost must be between {min} and {max}, got {0}", min = PasswordHasher::MIN_COST, max = PasswordHasher::MAX_COST)]
    InvalidCost(u32),

    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// bcrypt with a fixed work factor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;
    pub const MIN_COST: u32 = 4;
    pub const MAX_COST: u32 = 31;

    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        if !(Self::MIN_COST..=Self::MAX_COST).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Salted hash in the modular crypt format (`$2b$...`).
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    /// The cost is read from `hash`, so hashes made with another cost still verify.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        Ok(bcrypt::verify(password, hash)?)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: Self::DEFAULT_COST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> PasswordHasher {
        PasswordHasher::new(PasswordHasher::MIN_COST).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hasher = fast();
        let hash = hasher.hash("correct horse").unwrap();

        assert_ne!(hash, "correct horse");
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("correct horsf", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        let hasher = fast();
        assert_ne!(hasher.hash("password123").unwrap(), hasher.hash("password123").unwrap());
    }

    #[test]
    fn verify_rejects_a_malformed_hash() {
        assert!(fast().verify("password123", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn cost_outside_bcrypt_range_is_rejected() {
        assert!(matches!(PasswordHasher::new(3), Err(PasswordError::InvalidCost(3))));
        assert!(matches!(PasswordHasher::new(32), Err(PasswordError::InvalidCost(32))));
        assert_eq!(PasswordHasher::default().cost(), PasswordHasher::DEFAULT_COST);
    }

    #[test]
    fn policy_enforces_length_bounds() {
        assert!(check_password_policy("short").is_err());
        assert!(check_password_policy("1234567").is_err());
        assert!(check_password_policy("12345678").is_ok());
        assert!(check_password_policy("пароль12").is_ok());
        assert!(check_password_policy(&"x".repeat(MAX_PASSWORD_BYTES + 1)).is_err());
    }
}
