//! Shared utilities.
//!
//! Test helpers live here so every module's tests build on the same fixtures.

#[cfg(test)]
pub mod testutil;
