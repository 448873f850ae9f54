//! Admin role management.
//!
//! Accounts register as customers through the storefront; these commands
//! promote an existing account to admin or demote it again.

use bazaar_core::{Email, UserRole};
use bazaar_storefront::db::{PgUserStore, RepositoryError, UserStore};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with this email.
    #[error("No account with email: {0}")]
    UnknownUser(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Set the role of the account registered under `email`.
pub async fn set_role(users: &dyn UserStore, email: &str, role: UserRole) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    match users.set_role(&email, role).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, email = %user.email, role = %role.as_str(), "Role updated");
            Ok(())
        }
        Err(RepositoryError::NotFound) => Err(AdminError::UnknownUser(email.into_inner())),
        Err(e) => Err(e.into()),
    }
}

/// Grant the admin role.
pub async fn grant(email: &str) -> Result<(), AdminError> {
    let pool = connect().await?;
    set_role(&PgUserStore::new(pool), email, UserRole::Admin).await
}

/// Revoke the admin role.
pub async fn revoke(email: &str) -> Result<(), AdminError> {
    let pool = connect().await?;
    set_role(&PgUserStore::new(pool), email, UserRole::Customer).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_storefront::db::memory::InMemoryUserStore;

    use super::*;

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let users = InMemoryUserStore::new();
        let email = Email::parse("keeper@shop.test").unwrap();
        users.create("Keeper", &email, "hash").await.unwrap();

        set_role(&users, "Keeper@Shop.test", UserRole::Admin).await.unwrap();
        let (user, _) = users.find_credentials(&email).await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::Admin);

        set_role(&users, "keeper@shop.test", UserRole::Customer).await.unwrap();
        let (user, _) = users.find_credentials(&email).await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::Customer);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let users = InMemoryUserStore::new();
        let err = set_role(&users, "ghost@shop.test", UserRole::Admin).await.unwrap_err();
        assert!(matches!(err, AdminError::UnknownUser(_)));

        let err = set_role(&users, "not-an-email", UserRole::Admin).await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidEmail(_)));
    }
}
