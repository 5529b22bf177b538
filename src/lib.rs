//! Lost-item record service.
//!
//! An HTTP facade over a document-style record store (SQLite via `sqlx`),
//! blob storage for images, and a chat/vision delegate that canonicalises
//! free-text filters.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use state::AppState;

/// Build the full application router over `state`.
pub fn app(state: AppState) -> Router {
    routes::routes::routes().with_state(state)
}
