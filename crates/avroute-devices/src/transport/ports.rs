/*!
 * Serial port enumeration.
 *
 * The registry only needs the list of paths to decide whether a `port:`
 * location is usable right now. The rest of [`PortInfo`] is for callers that
 * present ports to a user.
 */
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Result, TransportError};

/// Bus prefixes stripped from a PnP id when deriving a title
const BUS_PREFIXES: &[&str] = &["usb-", "pci-", "platform-", "acpi-", "pnp-"];

/// A serial port reported by the operating system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// OS path or name (`/dev/ttyUSB0`, `COM3`)
    pub path: String,
    /// Manufacturer string, if reported
    pub manufacturer: Option<String>,
    /// Plug-and-play id (`usb-FTDI_FT232R_USB_UART_A50285BI-if00-port0`)
    pub pnp_id: Option<String>,
    /// USB vendor id
    pub vendor_id: Option<u16>,
    /// USB product id
    pub product_id: Option<u16>,
    /// Device serial number
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// A port known only by its path
    pub fn from_path<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the PnP id
    pub fn with_pnp_id<S: Into<String>>(mut self, pnp_id: S) -> Self {
        self.pnp_id = Some(pnp_id.into());
        self
    }

    /// Set the manufacturer
    pub fn with_manufacturer<S: Into<String>>(mut self, manufacturer: S) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Human-readable name for the port.
    ///
    /// Derived from the PnP id with the bus prefix and the trailing
    /// interface/port suffixes removed. Falls back to the manufacturer, then
    /// the raw path.
    pub fn title(&self) -> String {
        self.pnp_id
            .as_deref()
            .and_then(title_from_pnp_id)
            .or_else(|| {
                self.manufacturer
                    .as_deref()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.path.clone())
    }
}

fn title_from_pnp_id(pnp_id: &str) -> Option<String> {
    let mut name = pnp_id.trim();
    for prefix in BUS_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
            break;
        }
    }

    // `-if00-port0`, `-port0`, `-if00` in any combination at the end.
    loop {
        let stripped = strip_numbered_suffix(name, "-port")
            .or_else(|| strip_numbered_suffix(name, "-if"));
        match stripped {
            Some(rest) => name = rest,
            None => break,
        }
    }

    let title = name.replace('_', " ");
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn strip_numbered_suffix<'a>(value: &'a str, marker: &str) -> Option<&'a str> {
    let index = value.rfind(marker)?;
    let digits = &value[index + marker.len()..];
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(&value[..index])
    } else {
        None
    }
}

/// Lists the serial ports currently attached.
#[async_trait]
pub trait PortLister: Send + Sync + Debug {
    /// Enumerate ports
    async fn list_ports(&self) -> Result<Vec<PortInfo>>;
}

/// Enumerates ports through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortLister;

impl SystemPortLister {
    /// Create the system lister
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortLister for SystemPortLister {
    async fn list_ports(&self) -> Result<Vec<PortInfo>> {
        tokio::task::spawn_blocking(enumerate)
            .await
            .map_err(|e| TransportError::Enumerate(e.to_string()))?
    }
}

#[cfg(feature = "serial")]
fn enumerate() -> Result<Vec<PortInfo>> {
    use serialport::SerialPortType;

    let ports =
        serialport::available_ports().map_err(|e| TransportError::Enumerate(e.to_string()))?;
    let by_id = pnp_ids();

    Ok(ports
        .into_iter()
        .map(|port| {
            let mut info = PortInfo::from_path(port.port_name);
            if let SerialPortType::UsbPort(usb) = port.port_type {
                info.vendor_id = Some(usb.vid);
                info.product_id = Some(usb.pid);
                info.manufacturer = usb.manufacturer;
                info.serial_number = usb.serial_number;
            }
            info.pnp_id = by_id
                .iter()
                .find(|(target, _)| *target == info.path)
                .map(|(_, id)| id.clone());
            info
        })
        .collect())
}

#[cfg(not(feature = "serial"))]
fn enumerate() -> Result<Vec<PortInfo>> {
    Ok(Vec::new())
}

/// `(device path, by-id name)` pairs from `/dev/serial/by-id`.
#[cfg(all(feature = "serial", target_os = "linux"))]
fn pnp_ids() -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir("/dev/serial/by-id") else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let target = std::fs::canonicalize(entry.path()).ok()?;
            let target = target.to_str()?.to_string();
            let id = entry.file_name().to_str()?.to_string();
            Some((target, id))
        })
        .collect()
}

#[cfg(all(feature = "serial", not(target_os = "linux")))]
fn pnp_ids() -> Vec<(String, String)> {
    Vec::new()
}

/// A fixed port list, for tests and offline tooling.
#[derive(Debug, Default, Clone)]
pub struct StaticPortLister {
    ports: Vec<PortInfo>,
}

impl StaticPortLister {
    /// Lister that always reports `ports`
    pub fn new(ports: Vec<PortInfo>) -> Self {
        Self { ports }
    }

    /// Lister reporting bare paths
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(paths.into_iter().map(PortInfo::from_path).collect())
    }
}

#[async_trait]
impl PortLister for StaticPortLister {
    async fn list_ports(&self) -> Result<Vec<PortInfo>> {
        Ok(self.ports.clone())
    }
}
