/*!
 * Driver registry.
 *
 * Maps driver ids to their descriptor and bindings, and is the single entry
 * point for device operations. Every operation checks, in order: the driver
 * exists, the location is usable, and only then touches a transport.
 */
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, Instrument};

use avroute_core::logging::operation_span;
use avroute_core::types::DriverId;

use crate::driver::{Bindings, DriverDescriptor, DriverEntry, DriverError, Result};
use crate::location::{validate_location, Location, LocationError};
use crate::protocol::Tie;
use crate::transport::{PortInfo, PortLister, SystemPortLister};

#[derive(Debug, Default)]
struct Drivers {
    by_id: HashMap<DriverId, Arc<DriverEntry>>,
    order: Vec<DriverId>,
}

/// Driver registry
#[derive(Debug)]
pub struct DriverRegistry {
    drivers: RwLock<Drivers>,
    ports: Arc<dyn PortLister>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemPortLister::new()))
    }
}

impl DriverRegistry {
    /// Create an empty registry that validates serial locations against `ports`
    pub fn new(ports: Arc<dyn PortLister>) -> Self {
        Self {
            drivers: RwLock::new(Drivers::default()),
            ports,
        }
    }

    /// Register a driver.
    ///
    /// If the id is already registered the existing entry is returned and
    /// `bindings` are dropped. Missing power operations become no-ops.
    pub fn register(&self, descriptor: DriverDescriptor, bindings: Bindings) -> Arc<DriverEntry> {
        let mut drivers = self.drivers.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = drivers.by_id.get(&descriptor.id) {
            debug!("Driver {} already registered, keeping the existing entry", descriptor.id);
            return existing.clone();
        }

        let id = descriptor.id;
        let entry = Arc::new(DriverEntry {
            descriptor,
            bindings: bindings.resolve(),
        });
        drivers.by_id.insert(id, entry.clone());
        drivers.order.push(id);
        debug!("Registered driver {}", id);
        entry
    }

    /// Every registered descriptor, in registration order.
    ///
    /// Disabled drivers are included; filtering on `enabled` is up to the caller.
    pub fn list(&self) -> Vec<DriverDescriptor> {
        let drivers = self.drivers.read().unwrap_or_else(PoisonError::into_inner);
        drivers
            .order
            .iter()
            .filter_map(|id| drivers.by_id.get(id))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Look up a driver
    pub fn get(&self, id: &DriverId) -> Option<Arc<DriverEntry>> {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .cloned()
    }

    /// Number of registered drivers
    pub fn len(&self) -> usize {
        self.drivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    /// Whether no driver is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a tie on the device at `location`
    pub async fn activate(&self, id: &DriverId, location: &str, tie: Tie) -> Result<()> {
        let span = operation_span("activate", &id.to_string());
        async {
            let (entry, location) = self.resolve(id, location).await?;
            debug!(location = %location, ?tie, "activating");
            entry.bindings.activate(location, tie).await
        }
        .instrument(span)
        .await
    }

    /// Power on the device at `location`
    pub async fn power_on(&self, id: &DriverId, location: &str) -> Result<()> {
        let span = operation_span("power_on", &id.to_string());
        async {
            let (entry, location) = self.resolve(id, location).await?;
            debug!(location = %location, "powering on");
            entry.bindings.power_on(location).await
        }
        .instrument(span)
        .await
    }

    /// Power off the device at `location`
    pub async fn power_off(&self, id: &DriverId, location: &str) -> Result<()> {
        let span = operation_span("power_off", &id.to_string());
        async {
            let (entry, location) = self.resolve(id, location).await?;
            debug!(location = %location, "powering off");
            entry.bindings.power_off(location).await
        }
        .instrument(span)
        .await
    }

    /// Check that `location` would be accepted right now.
    ///
    /// A failed port enumeration is a transport error, not a bad location.
    pub async fn check_location(&self, location: &str) -> Result<Location> {
        let ports = self.ports_for(location).await?;
        validate_location(location, &ports).map_err(invalid_location)
    }

    async fn resolve(&self, id: &DriverId, location: &str) -> Result<(Arc<DriverEntry>, Location)> {
        let entry = self.get(id).ok_or(DriverError::UnknownDriver(*id))?;
        let location = self.check_location(location).await?;
        Ok((entry, location))
    }

    /// Ports are only enumerated when the location is a serial one.
    async fn ports_for(&self, location: &str) -> Result<Vec<PortInfo>> {
        if !matches!(Location::parse(location), Some(Location::Serial { .. })) {
            return Ok(Vec::new());
        }
        Ok(self.ports.list_ports().await?)
    }
}

fn invalid_location(err: LocationError) -> DriverError {
    DriverError::InvalidLocation(err.to_string())
}
