//! Reconciliation engine for polsync
//!
//! The engine orchestrates:
//! 1. Planning - Bind each declared policy by type and name, then diff it
//! 2. Display - Show what would be created, updated or deleted
//! 3. Executing - Apply changes in parallel with retries and cancellation

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ExecuteOptions, execute};
