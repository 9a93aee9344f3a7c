//! Milo restaurant backend.
//!
//! Session and authentication lifecycle (password login, signed access
//! tokens, rotating refresh tokens) and the order status state machine,
//! served over HTTP with Axum and persisted in `PostgreSQL`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
