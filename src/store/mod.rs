//! Credential store: user records, their embedded favorites and pending
//! password-reset tokens.
//!
//! [`UserStore`] is the only shared mutable resource of the service. Both
//! backends enforce username/email uniqueness themselves and make
//! [`UserStore::toggle_favorite`] and [`UserStore::reset_password`] atomic, so
//! handlers never do load-then-save on user data.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

mod memory;
mod models;
mod postgres;

pub use memory::MemoryUserStore;
pub use models::{Favorite, ItemType, NewFavorite, NewUser, ToggleAction, User};
pub use postgres::PgUserStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => f.write_str("username"),
            UniqueField::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already taken")]
    Duplicate(UniqueField),
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Inserts a user. Fails with [`StoreError::Duplicate`] if the username or
    /// email is already taken.
    async fn create(&self, user: NewUser) -> StoreResult<User>;

    async fn update_profile(&self, id: Uuid, username: &str, email: &str) -> StoreResult<User>;

    /// Removes the favorite if present, adds it otherwise, as one atomic step.
    async fn toggle_favorite(&self, user_id: Uuid, fav: NewFavorite) -> StoreResult<ToggleAction>;

    async fn list_favorites(
        &self,
        user_id: Uuid,
        item_type: Option<ItemType>,
    ) -> StoreResult<Vec<Favorite>>;

    /// Replaces any pending reset token of the user with `token_hash`.
    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Owner of a pending, unexpired reset token. Does not consume it.
    async fn reset_token_owner(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Uuid>>;

    /// Consumes the reset token and sets the new password hash. Returns the
    /// user id, or `None` when the token is unknown or expired. Every pending
    /// token of that user is gone afterwards.
    async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Uuid>>;
}

pub type DynUserStore = Arc<dyn UserStore>;

/// Picks a backend from the connection string.
pub async fn connect(database_url: &str) -> anyhow::Result<DynUserStore> {
    if database_url.starts_with("memory://") {
        tracing::warn!("using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryUserStore::default()));
    }
    let store = PgUserStore::connect(database_url).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}
