//! Core data models for the lost-item service.
//!
//! Lost items are stored as JSON documents, so these types double as the
//! storage shape and the HTTP wire shape via `serde`.

pub mod image;
pub mod lost_item;
