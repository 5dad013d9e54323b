//! Library crate for picks-ledger-back, exposing modules for binaries and integration tests.

pub mod auth;
pub mod config;
/// Storage contract, domain models and backends.
pub mod dao;
/// Request and response bodies of the HTTP API.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers and handlers.
pub mod routes;
/// Domain services built on top of the game store.
pub mod services;
/// Shared application state.
pub mod state;
