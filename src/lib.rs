// Library exports for Folio
// This allows integration tests and the binary to share the same modules

pub mod accounts;
pub mod auth;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
