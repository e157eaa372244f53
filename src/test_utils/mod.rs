//! Test utilities for unit and HTTP-level testing.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - A manual clock and a static identity provider
//! - Builders wiring use cases and `AppState` from those mocks

mod app_state_builder;
mod factories;
mod identity_mocks;
mod subscription_mocks;
mod usage_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use identity_mocks::*;
pub use subscription_mocks::*;
pub use usage_mocks::*;
