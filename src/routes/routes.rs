//! Defines routes for the lost-item service.
//!
//! ## Structure
//! - **Record endpoints**
//!   - `GET  /lostitems`               — list, filters `municipality`, `categoryName`
//!   - `GET  /lostitems/subcategory`   — list the subcategory view, `subcategory`
//!   - `POST /lostitems`               — create
//!   - `PUT  /lostitems/{item_id}`     — partial update
//!
//! - **Image endpoints** (multipart field `image`)
//!   - `POST /imagescan`               — classify via the chat delegate
//!   - `POST /upload-image`            — store in blob storage, return its URL

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::{scan_image, upload_image},
        lost_item_handlers::{
            create_lost_item, list_by_subcategory, list_lost_items, update_lost_item,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Upper bound for multipart image bodies.
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Build and return the router for all service routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    let images = Router::new()
        .route("/imagescan", post(scan_image))
        .route("/upload-image", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // record routes
        .route("/lostitems", get(list_lost_items).post(create_lost_item))
        .route("/lostitems/subcategory", get(list_by_subcategory))
        .route("/lostitems/{item_id}", put(update_lost_item))
        .merge(images)
        .layer(TraceLayer::new_for_http())
}
