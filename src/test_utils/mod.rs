//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory user store
//! - A scripted billing provider that records every call
//! - A builder for `AppState` used by HTTP-level tests

mod app_state_builder;
mod billing_mocks;
mod factories;
mod user_mocks;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use factories::*;
pub use user_mocks::*;
