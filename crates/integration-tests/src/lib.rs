//! Integration tests for Larder.
//!
//! # Running Tests
//!
//! ```bash
//! # Library-level tests (no services needed)
//! cargo test -p larder-integration-tests
//!
//! # End-to-end HTTP tests against a running server
//! LARDER_BASE_URL=http://localhost:8000 LARDER_MASTER_KEY=... \
//!     cargo test -p larder-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `tool_catalogue` - The assistant's tool definitions
//! - `consolidation` - Shopping list consolidation through the public API
//! - `http_api` - Signup, recipes and the shopping trip over HTTP
