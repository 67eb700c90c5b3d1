//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront server and its
//! integration tests:
//! - `storefront` - Server-rendered shop in front of the commerce REST backend
//! - `integration-tests` - End-to-end tests against a mock backend
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
