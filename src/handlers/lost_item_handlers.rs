//! HTTP handlers for lost item records.
//! Filter values are normalised through the chat delegate before they reach
//! the store; every failure aborts the request with a localised detail.

use crate::{
    errors::{AppError, detail},
    models::lost_item::{LostItem, LostItemBySubcategory, LostItemRequest, LostItemUpdate},
    services::{lost_item_query::LostItemFilter, lost_item_store::StoreError},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

/// Query params accepted by `GET /lostitems`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLostItemsQuery {
    pub municipality: Option<String>,
    pub category_name: Option<String>,
}

/// Query params accepted by `GET /lostitems/subcategory`.
#[derive(Debug, Deserialize)]
pub struct SubcategoryQuery {
    pub subcategory: String,
}

/// GET `/lostitems` — list records, optionally filtered by municipality and
/// category. No match is an empty list.
pub async fn list_lost_items(
    State(state): State<AppState>,
    Query(q): Query<ListLostItemsQuery>,
) -> Result<Json<Vec<LostItem>>, AppError> {
    let filter = LostItemFilter::resolve(
        state.chat.as_ref(),
        q.municipality.as_deref(),
        q.category_name.as_deref(),
    )
    .await
    .map_err(|err| {
        tracing::error!(error = %err, "failed to normalise filters");
        AppError::internal_with(detail::NORMALIZE_FAILED, err)
    })?;

    let items = state.store.list(&filter).await.map_err(read_error)?;
    Ok(Json(items))
}

/// GET `/lostitems/subcategory` — list the subcategory view for one category.
/// No match is a 404.
pub async fn list_by_subcategory(
    State(state): State<AppState>,
    Query(q): Query<SubcategoryQuery>,
) -> Result<Json<Vec<LostItemBySubcategory>>, AppError> {
    let subcategory = state
        .chat
        .select_category(&q.subcategory)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "failed to normalise subcategory");
            AppError::internal_with(detail::NORMALIZE_FAILED, err)
        })?;

    let items = state
        .store
        .list_by_subcategory(&subcategory)
        .await
        .map_err(read_error)?;

    if items.is_empty() {
        return Err(AppError::not_found(format!(
            "Lost items with subcategory '{}' not found",
            subcategory
        )));
    }
    Ok(Json(items))
}

/// POST `/lostitems` — create a record with a fresh id and `DateFound`.
pub async fn create_lost_item(
    State(state): State<AppState>,
    Json(payload): Json<LostItemRequest>,
) -> Result<Json<LostItem>, AppError> {
    tracing::info!(?payload, "adding lost item");
    let item = state.store.create(payload).await.map_err(|err| {
        tracing::error!(error = %err, "failed to add lost item");
        AppError::internal_with(detail::CREATE_FAILED, err)
    })?;
    Ok(Json(item))
}

/// PUT `/lostitems/{item_id}` — merge the fields present in the body.
/// A missing record is reported as a 500 like any other update failure.
pub async fn update_lost_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Json(payload): Json<LostItemUpdate>,
) -> Result<Json<LostItem>, AppError> {
    tracing::info!(id = %item_id, ?payload, "updating lost item");
    let item = state
        .store
        .update(&item_id, payload)
        .await
        .map_err(|err| {
            tracing::error!(id = %item_id, error = %err, "failed to update lost item");
            AppError::internal_with(detail::UPDATE_FAILED, err)
        })?;
    Ok(Json(item))
}

fn read_error(err: StoreError) -> AppError {
    match err {
        StoreError::Shape(_) => {
            tracing::error!(error = %err, "failed to convert stored documents");
            AppError::internal_with(detail::CONVERT_FAILED, err)
        }
        other => {
            tracing::error!(error = %other, "failed to execute query");
            AppError::internal_with(detail::FETCH_FAILED, other)
        }
    }
}
