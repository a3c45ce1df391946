use serde::{Deserialize, Serialize};

use crate::payload::string_or_number;
use crate::store::{ItemType, ToggleAction};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFavoriteRequest {
    pub item_type: ItemType,
    #[serde(deserialize_with = "string_or_number")]
    pub item_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub genres: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToggleFavoriteResponse {
    pub action: ToggleAction,
}

#[derive(Debug, Deserialize)]
pub struct FavoritesQuery {
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
}
