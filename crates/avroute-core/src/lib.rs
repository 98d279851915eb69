/*!
 * avroute Core
 *
 * This crate provides the ambient pieces shared by the avroute crates:
 * error types, logging setup, layered configuration, driver identifiers
 * and caller-side helpers.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;
pub mod utils;

/// avroute core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
