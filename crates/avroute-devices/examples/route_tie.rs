//! Route one input to one output on a real device.
//!
//! ```text
//! cargo run -p avroute-devices --example route_tie -- <driver-id> <location> <input> <output>
//! ```

use std::sync::Arc;

use avroute_core::types::DriverId;
use avroute_devices::transport::SystemPortLister;
use avroute_devices::{register_builtin, DriverOverrides, DriverRegistry, SystemTransport, Tie};

use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    avroute_core::logging::init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [driver, location, input, output] = args.as_slice() else {
        eprintln!("usage: route_tie <driver-id> <location> <input> <output>");
        std::process::exit(2);
    };
    let driver: DriverId = driver.parse()?;
    let tie = Tie::new(input.parse()?, output.parse()?);

    let registry = DriverRegistry::new(Arc::new(SystemPortLister::new()));
    register_builtin(&registry, Arc::new(SystemTransport::new()), DriverOverrides::default());

    match registry.get(&driver) {
        Some(entry) => info!(
            "Using {}",
            entry.descriptor.title("en").unwrap_or("unnamed driver")
        ),
        None => {
            eprintln!("unknown driver {}; known drivers:", driver);
            for descriptor in registry.list() {
                eprintln!("  {}  {}", descriptor.id, descriptor.title("en").unwrap_or(""));
            }
            std::process::exit(2);
        }
    }

    registry.activate(&driver, location, tie).await?;
    info!("Routed input {} to output {} at {}", tie.input, tie.video_output, location);
    Ok(())
}
