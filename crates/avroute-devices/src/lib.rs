/*!
 * avroute devices
 *
 * Location parsing, transports, vendor protocol codecs and the driver
 * registry used to control A/V switches and monitors.
 */

#![warn(missing_docs)]

// Re-export core types
pub use avroute_core::prelude;

pub mod driver;
pub mod drivers;
pub mod location;
pub mod protocol;
pub mod protocols;
pub mod registry;
pub mod transport;

pub use driver::{
    Bindings, Capabilities, DriverDescriptor, DriverEntry, DriverError, DriverKind, DriverMetadata,
};
pub use drivers::{register_builtin, DriverOverrides};
pub use location::{is_valid_location, validate_location, Location, LocationError};
pub use protocol::{Protocol, ProtocolError, Tie};
pub use registry::DriverRegistry;
pub use transport::{CommandTransport, SystemTransport, TransportError, TransportOptions};

/// avroute devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
