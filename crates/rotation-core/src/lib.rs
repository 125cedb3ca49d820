// Data model, store seams, SQLite persistence, CSV ingestion and
// configuration for the minutes projection core.

pub mod config;
pub mod db;
pub mod ingest;
pub mod model;
pub mod profile;
pub mod store;
