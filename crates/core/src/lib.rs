//! Milo Core - Shared domain types.
//!
//! This crate provides the types used across every Milo component:
//! - `api` - The restaurant HTTP backend
//! - `cli` - Command-line tools for migrations and account management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP. The order status transition table lives here so that
//! every caller evaluates transitions the same way.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails and the order status state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
