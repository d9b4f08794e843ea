// Persistence core for the content of a small CMS: criteria,
// the SQLite gateway, the content entity and its handlers.
// main.rs is only an admin tool on top of it.
pub mod app;
pub mod cache;
pub mod config;
pub mod content;
pub mod counter;
pub mod db;
pub mod error;
pub mod utils;
