use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never the raw password
    pub terms_accepted: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Movie,
    Book,
    Music,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Book => "book",
            ItemType::Music => "music",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ItemType::Movie),
            "book" => Ok(ItemType::Book),
            "music" => Ok(ItemType::Music),
            other => Err(format!("unknown item type `{other}`")),
        }
    }
}

/// A favorite embedded in its owner's record; it has no identity of its own
/// beyond `(owner, item_type, item_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub item_type: ItemType,
    pub item_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFavorite {
    pub item_type: ItemType,
    pub item_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub genres: Option<String>,
    pub authors: Option<String>,
}

impl NewFavorite {
    pub(crate) fn into_favorite(self, created_at: OffsetDateTime) -> Favorite {
        Favorite {
            item_type: self.item_type,
            item_id: self.item_id,
            title: self.title,
            poster_url: self.poster_url,
            genres: self.genres,
            authors: self.authors,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Added,
    Removed,
}

/// Raw `favorites` row; `item_type` is stored as text.
#[derive(Debug, FromRow)]
pub(crate) struct FavoriteRow {
    pub item_type: String,
    pub item_id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub genres: Option<String>,
    pub authors: Option<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<FavoriteRow> for Favorite {
    type Error = String;

    fn try_from(r: FavoriteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            item_type: r.item_type.parse()?,
            item_id: r.item_id,
            title: r.title,
            poster_url: r.poster_url,
            genres: r.genres,
            authors: r.authors,
            created_at: r.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_parses_and_prints() {
        for t in [ItemType::Movie, ItemType::Book, ItemType::Music] {
            assert_eq!(t.as_str().parse::<ItemType>().unwrap(), t);
        }
        assert!("podcast".parse::<ItemType>().is_err());
    }

    #[test]
    fn user_serialization_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "ann".into(),
            email: "ann@x.com".into(),
            password_hash: "$argon2id$secret".into(),
            terms_accepted: true,
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("ann@x.com"));
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn toggle_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ToggleAction::Added).unwrap(), "\"added\"");
        assert_eq!(serde_json::to_string(&ToggleAction::Removed).unwrap(), "\"removed\"");
    }
}
