//! External collaborators of the HTTP layer: the record store, blob storage,
//! the chat/vision delegate and the credential used to reach Azure.

pub mod blob_service;
pub mod chat_service;
pub mod credential;
pub mod lost_item_query;
pub mod lost_item_store;
