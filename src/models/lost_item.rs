//! Represents a lost item report and the payloads that create or update it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Description of the physical object that was found.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Category (中分類) used for filtering and for the subcategory view.
    pub category_name: String,

    /// Free-form name given by the person registering the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,

    /// Additional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Yen denominations, serialized as their face value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum JapaneseCurrency {
    #[serde(rename = "1")]
    Yen1,
    #[serde(rename = "5")]
    Yen5,
    #[serde(rename = "10")]
    Yen10,
    #[serde(rename = "50")]
    Yen50,
    #[serde(rename = "100")]
    Yen100,
    #[serde(rename = "500")]
    Yen500,
    #[serde(rename = "1000")]
    Yen1000,
    #[serde(rename = "2000")]
    Yen2000,
    #[serde(rename = "5000")]
    Yen5000,
    #[serde(rename = "10000")]
    Yen10000,
}

/// Cash found with the item: a denomination and how many of it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Currency {
    pub denomination: JapaneseCurrency,
    pub count: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
    Gray,
    Silver,
    Gold,
    Red,
    Blue,
    Green,
    Yellow,
    Orange,
    Pink,
    Purple,
    Brown,
    Beige,
    Transparent,
    Other,
}

/// Where the item currently is in its handling lifecycle.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Stored,
    Returned,
    Transferred,
    Disposed,
}

/// A found-object report as persisted in the `lost_items` collection.
///
/// `id` and `DateFound` are assigned by the service on creation and never
/// change afterwards. `DateUpdated` is only present once the record has been
/// updated at least once.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LostItem {
    /// Server-generated UUIDv4.
    pub id: String,

    /// The object itself.
    pub item: Item,

    /// Municipality where the item was registered. Partition key.
    pub create_user_place: String,

    /// When the record was created.
    #[serde(rename = "DateFound")]
    pub date_found: DateTime<Utc>,

    /// When the record was last updated, if ever.
    #[serde(
        rename = "DateUpdated",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub date_updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub currency: Vec<Currency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl LostItem {
    /// Build a new record from a create payload, stamping the server-side fields.
    pub fn from_request(request: LostItemRequest, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            item: request.item,
            create_user_place: request.create_user_place,
            date_found: now,
            date_updated: None,
            currency: request.currency,
            color: request.color,
            status: request.status,
        }
    }

    /// Category value shared with the subcategory view.
    pub fn category_name(&self) -> &str {
        &self.item.category_name
    }
}

/// Body of `POST /lostitems`.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LostItemRequest {
    pub item: Item,
    pub create_user_place: String,
    #[serde(default)]
    pub currency: Vec<Currency>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub status: Option<Status>,
}

/// Body of `PUT /lostitems/{item_id}`.
///
/// `createUserPlace` selects the partition the record lives in and is never
/// written back. Every other field is applied only when present.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LostItemUpdate {
    pub create_user_place: String,
    #[serde(default)]
    pub item: Option<Item>,
    #[serde(default)]
    pub currency: Option<Vec<Currency>>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl LostItemUpdate {
    /// Merge the present fields into `target` and stamp `DateUpdated`.
    pub fn apply_to(self, target: &mut LostItem, now: DateTime<Utc>) {
        if let Some(item) = self.item {
            target.item = item;
        }
        if let Some(currency) = self.currency {
            target.currency = currency;
        }
        if let Some(color) = self.color {
            target.color = Some(color);
        }
        if let Some(status) = self.status {
            target.status = Some(status);
        }
        target.date_updated = Some(now);
    }
}

/// Row of the `lost_items_by_subcategory` collection.
///
/// Shares `id` with the [`LostItem`] it was projected from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LostItemBySubcategory {
    pub id: String,
    pub item: Item,
    pub create_user_place: String,
    #[serde(rename = "DateFound")]
    pub date_found: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl From<&LostItem> for LostItemBySubcategory {
    fn from(item: &LostItem) -> Self {
        Self {
            id: item.id.clone(),
            item: item.item.clone(),
            create_user_place: item.create_user_place.clone(),
            date_found: item.date_found,
            color: item.color,
            status: item.status,
        }
    }
}
