//! Registration and login.

use domain::{Customer, Registration, Role, verify_password};
use store::Store;

use crate::error::StorefrontError;
use crate::session::Session;

#[derive(Clone)]
pub struct AccountService<S: Store> {
    store: S,
}

impl<S: Store> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a login account and its customer record.
    ///
    /// Does not log the new account in.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<Customer, StorefrontError> {
        let (user, customer) = registration.into_accounts()?;

        if self.store.get_user_by_username(&user.username).await?.is_some() {
            return Err(StorefrontError::UsernameTaken);
        }
        if self.store.customer_email_exists(&customer.email).await? {
            return Err(StorefrontError::EmailTaken);
        }

        self.store.insert_user(&user).await?;
        self.store.insert_customer(&customer).await?;

        tracing::info!(role = %user.role, "account registered");
        Ok(customer)
    }

    /// Checks credentials and the role picked on the login form.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Session, StorefrontError> {
        let user = self
            .store
            .get_user_by_username(username.trim())
            .await?
            .filter(|user| verify_password(password, &user.password_hash))
            .ok_or(StorefrontError::InvalidCredentials)?;

        if user.role != role {
            return Err(StorefrontError::RoleMismatch(user.role));
        }

        let customer_id = self
            .store
            .get_customer_by_username(&user.username)
            .await?
            .map(|customer| customer.id);

        tracing::info!(username = %user.username, role = %user.role, "login succeeded");
        Ok(Session {
            user_id: user.id,
            username: user.username,
            role: user.role,
            customer_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    fn registration(username: &str, email: &str, role: Role) -> Registration {
        Registration {
            username: username.to_string(),
            password: "secret123".to_string(),
            confirm_password: "secret123".to_string(),
            email: email.to_string(),
            name: "Jane".to_string(),
            surname: "Doe".to_string(),
            shipping_address: "1 Main Street".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let accounts = AccountService::new(InMemoryStore::new());
        let customer = accounts
            .register(registration("jdoe", "jane@example.com", Role::Customer))
            .await
            .unwrap();

        let session = accounts.login("jdoe", "secret123", Role::Customer).await.unwrap();
        assert_eq!(session.username, "jdoe");
        assert_eq!(session.customer_id, Some(customer.id));
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_rejected() {
        let accounts = AccountService::new(InMemoryStore::new());
        accounts
            .register(registration("jdoe", "jane@example.com", Role::Customer))
            .await
            .unwrap();

        let err = accounts
            .register(registration("jdoe", "other@example.com", Role::Customer))
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::UsernameTaken));

        let err = accounts
            .register(registration("jane", "jane@example.com", Role::Customer))
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::EmailTaken));
    }

    #[tokio::test]
    async fn wrong_password_and_wrong_role_are_rejected() {
        let accounts = AccountService::new(InMemoryStore::new());
        accounts
            .register(registration("boss", "boss@example.com", Role::Admin))
            .await
            .unwrap();

        let err = accounts.login("boss", "nope", Role::Admin).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InvalidCredentials));

        let err = accounts
            .login("boss", "secret123", Role::Customer)
            .await
            .unwrap_err();
        assert!(matches!(err, StorefrontError::RoleMismatch(Role::Admin)));

        let err = accounts.login("ghost", "secret123", Role::Admin).await.unwrap_err();
        assert!(matches!(err, StorefrontError::InvalidCredentials));
    }
}
