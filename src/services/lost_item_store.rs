//! src/services/lost_item_store.rs
//!
//! LostItemStore — the two lost-item collections backed by SQLite. Each record
//! is kept as a JSON document; `create_user_place` and `category_name` are
//! mirrored into columns so filters can be bound parameters instead of JSON
//! path expressions.
//!
//! `lost_items_by_subcategory` is a projection of `lost_items` and is written
//! in the same transaction as the primary document.

use crate::{
    models::lost_item::{LostItem, LostItemBySubcategory, LostItemRequest, LostItemUpdate},
    services::lost_item_query::LostItemFilter,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lost item `{id}` not found in partition `{partition}`")]
    NotFound { id: String, partition: String },
    #[error("stored document does not match the expected shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("could not encode document: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the lost-item collections. Cheap to clone; the pool is shared.
#[derive(Clone)]
pub struct LostItemStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl LostItemStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded migrations. Safe to run on every start.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&*self.db).await?;
        Ok(())
    }

    /// Lightweight connectivity probe.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }

    /// List lost items matching `filter`, across all partitions.
    ///
    /// Any document that fails to deserialize aborts the whole listing.
    pub async fn list(&self, filter: &LostItemFilter) -> StoreResult<Vec<LostItem>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT document FROM lost_items");
        filter.push_where(&mut builder);
        builder.push(" ORDER BY rowid ASC");

        tracing::info!(sql = builder.sql(), ?filter, "executing lost item query");
        let rows: Vec<String> = builder
            .build_query_scalar::<String>()
            .fetch_all(&*self.db)
            .await?;
        tracing::info!(count = rows.len(), "retrieved lost items");

        decode_all(&rows)
    }

    /// List projected records whose category equals `category_name`.
    pub async fn list_by_subcategory(
        &self,
        category_name: &str,
    ) -> StoreResult<Vec<LostItemBySubcategory>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT document FROM lost_items_by_subcategory
             WHERE category_name = ? ORDER BY rowid ASC",
        )
        .bind(category_name)
        .fetch_all(&*self.db)
        .await?;
        tracing::info!(
            count = rows.len(),
            subcategory = %category_name,
            "retrieved lost items by subcategory"
        );

        decode_all(&rows)
    }

    /// Persist a new lost item with a fresh id and `DateFound`.
    pub async fn create(&self, request: LostItemRequest) -> StoreResult<LostItem> {
        let item = LostItem::from_request(request, Uuid::new_v4().to_string(), Utc::now());
        let document = serde_json::to_string(&item).map_err(StoreError::Encode)?;

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO lost_items (id, create_user_place, category_name, document)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.create_user_place)
        .bind(item.category_name())
        .bind(&document)
        .execute(&mut *tx)
        .await?;
        upsert_projection(&mut tx, &item).await?;
        tx.commit().await?;

        tracing::info!(id = %item.id, partition = %item.create_user_place, "added lost item");
        Ok(item)
    }

    /// Fetch a single record by id within its partition.
    pub async fn get(&self, id: &str, partition: &str) -> StoreResult<LostItem> {
        let document: Option<String> = sqlx::query_scalar(
            "SELECT document FROM lost_items WHERE id = ? AND create_user_place = ?",
        )
        .bind(id)
        .bind(partition)
        .fetch_optional(&*self.db)
        .await?;

        let document = document.ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
            partition: partition.to_string(),
        })?;
        serde_json::from_str(&document).map_err(StoreError::Shape)
    }

    /// Merge the present fields of `update` into the stored record.
    ///
    /// The record is looked up by `id` and the update's `createUserPlace`;
    /// a mismatched partition reads as not found.
    pub async fn update(&self, id: &str, update: LostItemUpdate) -> StoreResult<LostItem> {
        let partition = update.create_user_place.clone();
        let mut item = self.get(id, &partition).await?;
        tracing::debug!(id = %id, "retrieved existing lost item");

        update.apply_to(&mut item, Utc::now());
        let document = serde_json::to_string(&item).map_err(StoreError::Encode)?;

        let mut tx = self.db.begin().await?;
        let result = sqlx::query(
            "UPDATE lost_items SET category_name = ?, document = ?
             WHERE id = ? AND create_user_place = ?",
        )
        .bind(item.category_name())
        .bind(&document)
        .bind(id)
        .bind(&partition)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                id: id.to_string(),
                partition,
            });
        }
        upsert_projection(&mut tx, &item).await?;
        tx.commit().await?;

        tracing::info!(id = %id, "updated lost item");
        Ok(item)
    }
}

/// Write the subcategory view of `item`, replacing any previous one.
async fn upsert_projection(tx: &mut Transaction<'_, Sqlite>, item: &LostItem) -> StoreResult<()> {
    let view = LostItemBySubcategory::from(item);
    let document = serde_json::to_string(&view).map_err(StoreError::Encode)?;
    sqlx::query(
        "INSERT INTO lost_items_by_subcategory (id, category_name, document)
         VALUES (?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             category_name = excluded.category_name,
             document = excluded.document",
    )
    .bind(&view.id)
    .bind(&view.item.category_name)
    .bind(&document)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn decode_all<T: serde::de::DeserializeOwned>(rows: &[String]) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|row| serde_json::from_str(row).map_err(StoreError::Shape))
        .collect()
}
