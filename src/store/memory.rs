use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Favorite, ItemType, NewFavorite, NewUser, StoreError, StoreResult, ToggleAction, UniqueField,
    User, UserStore,
};

struct PendingReset {
    user_id: Uuid,
    expires_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    favorites: HashMap<Uuid, Vec<Favorite>>,
    resets: HashMap<String, PendingReset>,
}

impl Inner {
    fn taken(&self, field: UniqueField, value: &str, except: Option<Uuid>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except
                && match field {
                    UniqueField::Username => u.username == value,
                    UniqueField::Email => u.email == value,
                }
        })
    }
}

/// In-process store. Every mutation runs under a single write lock, which is
/// what makes toggles and resets atomic here.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.taken(UniqueField::Email, &user.email, None) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if inner.taken(UniqueField::Username, &user.username, None) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            terms_accepted: user.terms_accepted,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, username: &str, email: &str) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if inner.taken(UniqueField::Email, email, Some(id)) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if inner.taken(UniqueField::Username, username, Some(id)) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.username = username.to_string();
        user.email = email.to_string();
        Ok(user.clone())
    }

    async fn toggle_favorite(&self, user_id: Uuid, fav: NewFavorite) -> StoreResult<ToggleAction> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let list = inner.favorites.entry(user_id).or_default();
        let existing = list
            .iter()
            .position(|f| f.item_type == fav.item_type && f.item_id == fav.item_id);
        match existing {
            Some(idx) => {
                list.remove(idx);
                Ok(ToggleAction::Removed)
            }
            None => {
                list.push(fav.into_favorite(OffsetDateTime::now_utc()));
                Ok(ToggleAction::Added)
            }
        }
    }

    async fn list_favorites(
        &self,
        user_id: Uuid,
        item_type: Option<ItemType>,
    ) -> StoreResult<Vec<Favorite>> {
        let inner = self.inner.read().await;
        Ok(inner
            .favorites
            .get(&user_id)
            .map(|list| {
                list.iter()
                    .filter(|f| item_type.map_or(true, |t| f.item_type == t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.resets.retain(|_, r| r.user_id != user_id);
        inner
            .resets
            .insert(token_hash.to_string(), PendingReset { user_id, expires_at });
        Ok(())
    }

    async fn reset_token_owner(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .resets
            .get(token_hash)
            .filter(|r| r.expires_at > now)
            .map(|r| r.user_id))
    }

    async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Uuid>> {
        let mut inner = self.inner.write().await;
        let Some(pending) = inner.resets.remove(token_hash) else {
            return Ok(None);
        };
        if pending.expires_at <= now {
            return Ok(None);
        }
        let user_id = pending.user_id;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(None);
        };
        user.password_hash = password_hash.to_string();
        inner.resets.retain(|_, r| r.user_id != user_id);
        Ok(Some(user_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            terms_accepted: true,
        }
    }

    fn inception() -> NewFavorite {
        NewFavorite {
            item_type: ItemType::Movie,
            item_id: "27205".into(),
            title: "Inception".into(),
            poster_url: None,
            genres: Some("Sci-Fi".into()),
            authors: None,
        }
    }

    #[tokio::test]
    async fn create_enforces_unique_email_and_username() {
        let store = MemoryUserStore::default();
        store.create(new_user("ann", "ann@x.com")).await.unwrap();

        let err = store.create(new_user("ann2", "ann@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        let err = store.create(new_user("ann", "other@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Username)));

        assert!(store.find_by_username("ann2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_profile_allows_keeping_own_values() {
        let store = MemoryUserStore::default();
        let ann = store.create(new_user("ann", "ann@x.com")).await.unwrap();
        store.create(new_user("bob", "bob@x.com")).await.unwrap();

        let same = store.update_profile(ann.id, "ann", "ann@x.com").await.unwrap();
        assert_eq!(same.email, "ann@x.com");

        let err = store.update_profile(ann.id, "ann", "bob@x.com").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        let err = store
            .update_profile(Uuid::new_v4(), "x", "x@x.com")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn toggle_alternates_and_filters_by_type() {
        let store = MemoryUserStore::default();
        let ann = store.create(new_user("ann", "ann@x.com")).await.unwrap();

        assert_eq!(store.toggle_favorite(ann.id, inception()).await.unwrap(), ToggleAction::Added);

        let mut book = inception();
        book.item_type = ItemType::Book;
        book.title = "Same id, different type".into();
        assert_eq!(store.toggle_favorite(ann.id, book).await.unwrap(), ToggleAction::Added);

        let movies = store.list_favorites(ann.id, Some(ItemType::Movie)).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Inception");
        assert_eq!(store.list_favorites(ann.id, None).await.unwrap().len(), 2);

        assert_eq!(store.toggle_favorite(ann.id, inception()).await.unwrap(), ToggleAction::Removed);
        assert!(store.list_favorites(ann.id, Some(ItemType::Movie)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_for_unknown_user_is_not_found() {
        let store = MemoryUserStore::default();
        let err = store.toggle_favorite(Uuid::new_v4(), inception()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_never_duplicate() {
        let store = Arc::new(MemoryUserStore::default());
        let ann = store.create(new_user("ann", "ann@x.com")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.toggle_favorite(ann.id, inception()).await.unwrap()
            }));
        }
        let mut added = 0;
        for h in handles {
            if h.await.unwrap() == ToggleAction::Added {
                added += 1;
            }
        }
        assert_eq!(added, 1);
        assert!(store.list_favorites(ann.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_token_is_single_use_and_expires() {
        let store = MemoryUserStore::default();
        let ann = store.create(new_user("ann", "ann@x.com")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        store.store_reset_token(ann.id, "h1", now + Duration::hours(1)).await.unwrap();
        assert_eq!(store.reset_password("h1", "new-hash", now).await.unwrap(), Some(ann.id));
        assert_eq!(store.reset_password("h1", "newer-hash", now).await.unwrap(), None);
        assert_eq!(
            store.find_by_id(ann.id).await.unwrap().unwrap().password_hash,
            "new-hash"
        );

        store.store_reset_token(ann.id, "h2", now - Duration::seconds(1)).await.unwrap();
        assert_eq!(store.reset_password("h2", "late-hash", now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_reset_token_replaces_previous_one() {
        let store = MemoryUserStore::default();
        let ann = store.create(new_user("ann", "ann@x.com")).await.unwrap();
        let later = OffsetDateTime::now_utc() + Duration::hours(1);

        store.store_reset_token(ann.id, "old", later).await.unwrap();
        store.store_reset_token(ann.id, "new", later).await.unwrap();
        let now = OffsetDateTime::now_utc();
        assert_eq!(store.reset_password("old", "x", now).await.unwrap(), None);
        assert_eq!(store.reset_password("new", "x", now).await.unwrap(), Some(ann.id));
    }

    #[tokio::test]
    async fn token_owner_lookup_does_not_consume() {
        let store = MemoryUserStore::default();
        let ann = store.create(new_user("ann", "ann@x.com")).await.unwrap();
        let now = OffsetDateTime::now_utc();

        store.store_reset_token(ann.id, "h1", now + Duration::hours(1)).await.unwrap();
        assert_eq!(store.reset_token_owner("h1", now).await.unwrap(), Some(ann.id));
        assert_eq!(store.reset_token_owner("h1", now).await.unwrap(), Some(ann.id));
        assert_eq!(store.reset_token_owner("nope", now).await.unwrap(), None);
        assert_eq!(
            store.reset_token_owner("h1", now + Duration::hours(2)).await.unwrap(),
            None
        );
        assert_eq!(store.reset_password("h1", "new-hash", now).await.unwrap(), Some(ann.id));
        assert_eq!(store.reset_token_owner("h1", now).await.unwrap(), None);
    }
}
