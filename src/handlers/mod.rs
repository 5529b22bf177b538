pub mod health_handlers;
pub mod image_handlers;
pub mod lost_item_handlers;
