//! User accounts (identity store records).

use serde::Deserialize;

use cakestore_core::{DomainError, DomainResult, Entity, UserId};

/// A stored account. The password is only ever held as a bcrypt hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Username/password pair as submitted to register or login.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.username.trim().is_empty() {
            return Err(DomainError::validation("username must not be empty"));
        }
        if self.password.is_empty() {
            return Err(DomainError::validation("password must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials::new("baker", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("baker"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(Credentials::new("", "pw").validate().is_err());
        assert!(Credentials::new("baker", "").validate().is_err());
        assert!(Credentials::new("baker", "pw").validate().is_ok());
    }
}
