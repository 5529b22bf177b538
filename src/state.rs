//! Shared handles injected into every handler through axum's `State`.

use crate::services::{
    blob_service::BlobService, chat_service::ChatService, lost_item_store::LostItemStore,
};
use std::sync::Arc;

/// Built once at startup. Cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub store: LostItemStore,
    pub blobs: BlobService,
    pub chat: Arc<dyn ChatService>,
}

impl AppState {
    pub fn new(store: LostItemStore, blobs: BlobService, chat: Arc<dyn ChatService>) -> Self {
        Self { store, blobs, chat }
    }
}
