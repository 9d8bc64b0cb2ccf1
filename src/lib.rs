pub mod config;
pub mod error;
pub mod handlers;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod state;
