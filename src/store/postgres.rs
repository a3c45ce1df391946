use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::models::FavoriteRow;
use super::{
    Favorite, ItemType, NewFavorite, NewUser, StoreError, StoreResult, ToggleAction, UniqueField,
    User, UserStore,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, terms_accepted, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    async fn find_one(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

/// Maps unique-constraint violations on `users` to [`StoreError::Duplicate`].
fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            match db.constraint() {
                Some("users_email_key") => return StoreError::Duplicate(UniqueField::Email),
                Some("users_username_key") => return StoreError::Duplicate(UniqueField::Username),
                _ => {}
            }
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_one("username", username).await
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, terms_accepted)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.terms_accepted)
            .fetch_one(&self.db)
            .await
            .map_err(map_unique)
    }

    async fn update_profile(&self, id: Uuid, username: &str, email: &str) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET username = $2, email = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(map_unique)?
            .ok_or(StoreError::NotFound)
    }

    async fn toggle_favorite(&self, user_id: Uuid, fav: NewFavorite) -> StoreResult<ToggleAction> {
        let mut tx = self.db.begin().await?;

        // Serializes toggles of the same user.
        let owner: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owner.is_none() {
            return Err(StoreError::NotFound);
        }

        let removed = sqlx::query(
            "DELETE FROM favorites WHERE user_id = $1 AND item_type = $2 AND item_id = $3",
        )
        .bind(user_id)
        .bind(fav.item_type.as_str())
        .bind(&fav.item_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let action = if removed > 0 {
            ToggleAction::Removed
        } else {
            sqlx::query(
                r#"
                INSERT INTO favorites (user_id, item_type, item_id, title, poster_url, genres, authors)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(user_id)
            .bind(fav.item_type.as_str())
            .bind(&fav.item_id)
            .bind(&fav.title)
            .bind(&fav.poster_url)
            .bind(&fav.genres)
            .bind(&fav.authors)
            .execute(&mut *tx)
            .await?;
            ToggleAction::Added
        };

        tx.commit().await?;
        debug!(%user_id, item_type = %fav.item_type, item_id = %fav.item_id, ?action, "favorite toggled");
        Ok(action)
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        item_type: Option<ItemType>,
    ) -> StoreResult<Vec<Favorite>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT item_type, item_id, title, poster_url, genres, authors, created_at
              FROM favorites
             WHERE user_id = $1
               AND ($2::TEXT IS NULL OR item_type = $2)
             ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(item_type.map(ItemType::as_str))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| Favorite::try_from(r).map_err(StoreError::Corrupt))
            .collect()
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM password_resets WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn reset_token_owner(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM password_resets WHERE token_hash = $1 AND expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Uuid>> {
        let mut tx = self.db.begin().await?;

        let row: Option<(Uuid, OffsetDateTime)> = sqlx::query_as(
            "DELETE FROM password_resets WHERE token_hash = $1 RETURNING user_id, expires_at",
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let user_id = match row {
            Some((user_id, expires_at)) if expires_at > now => user_id,
            Some(_) => {
                // drop the stale token anyway
                tx.commit().await?;
                return Ok(None);
            }
            None => return Ok(None),
        };

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM password_resets WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(user_id))
    }
}
