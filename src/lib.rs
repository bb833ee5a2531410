// Public API for integration tests and embedding

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod liveness;
pub mod registry;
pub mod routes;
pub mod state;
pub mod ws;
