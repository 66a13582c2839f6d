//! Accounts and caller identity.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};
use store::{Address, NewUser, Role, Store, StoreError, User};

use crate::DomainError;

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn client(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Client,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Registration input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub full_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub full_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    #[serde(flatten)]
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            role: user.role,
            address: user.address,
            created_at: user.created_at,
        }
    }
}

/// Service for registering and loading users.
#[derive(Clone)]
pub struct UserService<S: Store> {
    store: S,
}

impl<S: Store> UserService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a client account.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> Result<UserView, DomainError> {
        self.create(registration, Role::Client).await
    }

    /// Creates an account with an explicit role. Used for seeding admins.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn create(
        &self,
        registration: Registration,
        role: Role,
    ) -> Result<UserView, DomainError> {
        let user = self
            .store
            .insert_user(NewUser {
                full_name: registration.full_name,
                email: registration.email.trim().to_lowercase(),
                phone: registration.phone,
                role,
                address: registration.address,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => DomainError::EmailTaken,
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user.into())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: UserId) -> Result<UserView, DomainError> {
        self.store
            .get_user(id)
            .await?
            .map(UserView::from)
            .ok_or(DomainError::UserNotFound(id))
    }
}
