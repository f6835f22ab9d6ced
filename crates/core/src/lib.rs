//! Larder Core - Shared types library.
//!
//! This crate provides common types used across all Larder components:
//! - `server` - JSON API for recipes, pantry, shopping list and the assistant
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and chat roles
//! - [`shopping`] - Shopping list items, name normalization and consolidation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod shopping;
pub mod types;

pub use shopping::{
    FinalizeOutcome, RawItem, ShoppingItem, finalize_shopping_items, normalize_ingredient_name,
};
pub use types::*;
