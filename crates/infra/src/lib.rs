//! Infrastructure layer: stores, image uploads, config, catalog orchestration.

pub mod catalog;
pub mod config;
pub mod images;
pub mod store;
