//! Turns the optional listing parameters into a typed, parameterised filter.
//!
//! Free-text values are canonicalised through the [`ChatService`] before they
//! become equality clauses, and clauses are always pushed as bound values.

use crate::services::chat_service::{ChatResult, ChatService};
use sqlx::{QueryBuilder, Sqlite};

/// Equality filters over the `lost_items` collection. Both `None` means a
/// full, unfiltered read across every partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LostItemFilter {
    pub municipality: Option<String>,
    pub category_name: Option<String>,
}

impl LostItemFilter {
    /// Normalise the raw query parameters. Empty strings count as absent.
    pub async fn resolve(
        chat: &dyn ChatService,
        municipality: Option<&str>,
        category_name: Option<&str>,
    ) -> ChatResult<Self> {
        let municipality = match non_empty(municipality) {
            Some(raw) => Some(chat.select_location(raw).await?),
            None => None,
        };
        let category_name = match non_empty(category_name) {
            Some(raw) => Some(chat.select_category(raw).await?),
            None => None,
        };
        Ok(Self {
            municipality,
            category_name,
        })
    }

    /// Append ` WHERE a = ? AND b = ?` for the filters that are set.
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let mut clauses = Vec::new();
        if let Some(place) = &self.municipality {
            clauses.push(("create_user_place", place.clone()));
        }
        if let Some(category) = &self.category_name {
            clauses.push(("category_name", category.clone()));
        }

        for (idx, (column, value)) in clauses.into_iter().enumerate() {
            builder.push(if idx == 0 { " WHERE " } else { " AND " });
            builder.push(column);
            builder.push(" = ");
            builder.push_bind(value);
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
