use tracing::info;
use uuid::Uuid;

use super::dto::ToggleFavoriteRequest;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::{Favorite, ItemType, NewFavorite, StoreError, ToggleAction};

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Adds the item if the user does not have it yet, removes it otherwise.
pub async fn toggle_favorite(
    state: &AppState,
    user_id: Uuid,
    req: ToggleFavoriteRequest,
) -> Result<ToggleAction, AppError> {
    if req.item_id.is_empty() {
        return Err(AppError::Validation("itemId is required".into()));
    }
    let title = match req.title.trim() {
        "" => "Untitled".to_string(),
        t => t.to_string(),
    };

    let fav = NewFavorite {
        item_type: req.item_type,
        item_id: req.item_id,
        title,
        poster_url: non_blank(req.poster_url),
        genres: non_blank(req.genres),
        authors: non_blank(req.authors),
    };
    let item_type = fav.item_type;

    let action = state
        .store
        .toggle_favorite(user_id, fav)
        .await
        .map_err(|e| match e {
            // the session outlived its user
            StoreError::NotFound => AppError::Unauthorized,
            other => AppError::from(other),
        })?;

    info!(%user_id, %item_type, ?action, "favorite toggled");
    Ok(action)
}

/// Lists `owner`'s favorites on behalf of `requester`. Only the owner may look.
pub async fn list_favorites(
    state: &AppState,
    requester: Uuid,
    owner: Uuid,
    item_type: Option<ItemType>,
) -> Result<Vec<Favorite>, AppError> {
    if requester != owner {
        return Err(AppError::Forbidden);
    }
    Ok(state.store.list_favorites(owner, item_type).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewUser;

    async fn ann(state: &AppState) -> Uuid {
        state
            .store
            .create(NewUser {
                username: "ann".into(),
                email: "ann@x.com".into(),
                password_hash: "$argon2id$fake".into(),
                terms_accepted: true,
            })
            .await
            .unwrap()
            .id
    }

    fn inception() -> ToggleFavoriteRequest {
        ToggleFavoriteRequest {
            item_type: ItemType::Movie,
            item_id: "27205".into(),
            title: "Inception".into(),
            poster_url: Some("  ".into()),
            genres: None,
            authors: None,
        }
    }

    #[tokio::test]
    async fn toggling_twice_nets_no_change() {
        let (state, _) = AppState::fake();
        let id = ann(&state).await;

        assert_eq!(toggle_favorite(&state, id, inception()).await.unwrap(), ToggleAction::Added);
        let listed = list_favorites(&state, id, id, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].poster_url, None);

        assert_eq!(toggle_favorite(&state, id, inception()).await.unwrap(), ToggleAction::Removed);
        assert!(list_favorites(&state, id, id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_title_defaults_and_blank_id_is_rejected() {
        let (state, _) = AppState::fake();
        let id = ann(&state).await;

        let mut req = inception();
        req.title = "   ".into();
        toggle_favorite(&state, id, req).await.unwrap();
        let listed = list_favorites(&state, id, id, Some(ItemType::Movie)).await.unwrap();
        assert_eq!(listed[0].title, "Untitled");

        let mut req = inception();
        req.item_id = String::new();
        assert!(matches!(
            toggle_favorite(&state, id, req).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn other_users_cannot_list() {
        let (state, _) = AppState::fake();
        let id = ann(&state).await;
        let err = list_favorites(&state, Uuid::new_v4(), id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn toggle_without_user_record_is_unauthorized() {
        let (state, _) = AppState::fake();
        let err = toggle_favorite(&state, Uuid::new_v4(), inception()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
