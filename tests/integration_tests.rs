//! Integration Tests Entry Point
//!
//! Live database scenarios, ignored by default. Run them with
//! `CHAT_STORE_TEST_DATABASE_URL` set and `cargo test -- --ignored`.
//! Tests are organized by module:
//! - `store/` - repository and sidebar scenarios
//! - `common/` - Shared fixtures

mod common;
mod store;
