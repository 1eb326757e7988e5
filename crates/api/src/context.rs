use cakestore_core::UserId;

/// Identity of the caller, inserted by the access middleware once the bearer
/// token's subject has been resolved to a stored user.
///
/// Absent on public routes reached without a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    user_id: UserId,
    username: String,
}

impl AuthenticatedUser {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}
