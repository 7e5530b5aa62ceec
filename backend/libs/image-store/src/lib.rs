//! PostgreSQL status store for the image pipeline
//!
//! One `images` row per source object. The pipeline writes through
//! `StatusStore::upsert`; the read helpers serve the gallery frontend.

pub mod config;
pub mod models;
pub mod repository;

pub use config::DbConfig;
pub use models::ImageRecord;
pub use repository::{connect_status_store, create_pool, ImageRepository, PgImageRepository};
