//! Login accounts, customer profiles and registration.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::{CustomerId, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::DomainError;

const MIN_PASSWORD_LEN: usize = 6;

/// What a logged-in account is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    Admin,
    #[default]
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Customer => "Customer",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            _ => Err(DomainError::UnknownRole(s.to_string())),
        }
    }
}

/// A login account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

/// Profile used on orders: who buys and where it ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub email: String,
    pub shipping_address: String,
}

/// Sign-up form. Creates both a [`User`] and its [`Customer`] profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub shipping_address: String,
    #[serde(default)]
    pub role: Role,
}

impl Registration {
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("Username", &self.username, 100),
            ("First name", &self.name, 200),
            ("Last name", &self.surname, 200),
            ("Shipping address", &self.shipping_address, 500),
            ("Email", &self.email, 255),
        ];
        for (label, value, max) in required {
            let value = value.trim();
            if value.is_empty() {
                return Err(DomainError::validation(format!("{label} is required")));
            }
            if value.chars().count() > max {
                return Err(DomainError::validation(format!(
                    "{label} must be at most {max} characters"
                )));
            }
        }
        if !looks_like_email(self.email.trim()) {
            return Err(DomainError::validation("Email address is not valid"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.confirm_password {
            return Err(DomainError::validation("Passwords do not match"));
        }
        Ok(())
    }

    /// Validates the form and builds the account and profile it describes.
    pub fn into_accounts(self) -> Result<(User, Customer), DomainError> {
        self.validate()?;
        let username = self.username.trim().to_string();
        let user = User {
            id: UserId::new(),
            username: username.clone(),
            password_hash: hash_password(&self.password),
            role: self.role,
        };
        let customer = Customer {
            id: CustomerId::new(),
            name: self.name.trim().to_string(),
            surname: self.surname.trim().to_string(),
            username,
            email: self.email.trim().to_string(),
            shipping_address: self.shipping_address.trim().to_string(),
        };
        Ok((user, customer))
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Hashes a password with a fresh random salt, as `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let hash = digest(&salt, password);
    format!("{salt}${hash}")
}

/// Checks a password against a value produced by [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => secrets_match(&digest(salt, password), hash),
        None => false,
    }
}

/// Compares two secrets in time independent of where they differ.
///
/// Both sides are hashed first, so their lengths do not show either.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
