/*!
 * Driver descriptors and operation bindings.
 *
 * A driver pairs static metadata with the three operations every device
 * exposes. Bindings are closures so a driver can be backed by a
 * [`Protocol`] or by anything else that can produce a future.
 */
use std::fmt;
use std::future::Future;
use std::ops::BitOr;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use avroute_core::types::{DriverId, Localized};

use crate::location::Location;
use crate::protocol::{Protocol, ProtocolError, Tie};
use crate::protocols::sony::packet::PacketError;
use crate::transport::TransportError;

/// Driver errors.
///
/// Lookup and construction errors happen before any I/O, so callers can tell
/// bad input apart from a failing device.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The location is malformed or names a port that is not attached
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// No driver is registered under this id
    #[error("unknown driver: {0}")]
    UnknownDriver(DriverId),

    /// The command could not be built
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The channel failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<PacketError> for DriverError {
    fn from(err: PacketError) -> Self {
        DriverError::Protocol(ProtocolError::Packet(err))
    }
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// What kind of device a driver controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Matrix, KVM or presentation switch
    Switch,
    /// Display with selectable inputs
    Monitor,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Switch => f.pad("switch"),
            DriverKind::Monitor => f.pad("monitor"),
        }
    }
}

/// Optional hardware features. Informational only; nothing enforces them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(u32);

impl Capabilities {
    /// No optional features
    pub const NONE: Capabilities = Capabilities(0);
    /// One input can feed several outputs
    pub const MULTI_OUTPUT: Capabilities = Capabilities(1);
    /// Audio can be routed separately from video
    pub const DECOUPLE_AUDIO: Capabilities = Capabilities(1 << 1);

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 | rhs.0)
    }
}

/// Human-facing driver metadata for one locale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverMetadata {
    /// Product or product line
    pub title: String,
    /// Manufacturer
    pub company: String,
    /// Who maintains the driver
    pub provider: String,
}

impl DriverMetadata {
    /// Create metadata
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            provider: provider.into(),
        }
    }
}

/// Static description of a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverDescriptor {
    /// Stable identifier
    pub id: DriverId,
    /// Whether callers should offer this driver. Not enforced by the registry.
    pub enabled: bool,
    /// Whether the driver is untested against real hardware
    pub experimental: bool,
    /// Device kind
    pub kind: DriverKind,
    /// Optional features
    pub capabilities: Capabilities,
    /// Metadata per locale
    pub metadata: Localized<DriverMetadata>,
}

impl DriverDescriptor {
    /// An enabled, non-experimental driver with no capabilities
    pub fn new(id: DriverId, kind: DriverKind, metadata: Localized<DriverMetadata>) -> Self {
        Self {
            id,
            enabled: true,
            experimental: false,
            kind,
            capabilities: Capabilities::NONE,
            metadata,
        }
    }

    /// Mark as experimental
    pub fn experimental(mut self) -> Self {
        self.experimental = true;
        self
    }

    /// Mark as disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Title in `locale`, with the usual fallbacks
    pub fn title(&self, locale: &str) -> Option<&str> {
        self.metadata.get(locale).map(|m| m.title.as_str())
    }
}

/// Routes a tie at a location
pub type ActivateFn = Arc<dyn Fn(Location, Tie) -> BoxFuture<'static, Result<()>> + Send + Sync>;
/// Changes power state at a location
pub type PowerFn = Arc<dyn Fn(Location) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Operations supplied at registration; the power operations are optional.
pub struct Bindings {
    activate: ActivateFn,
    power_on: Option<PowerFn>,
    power_off: Option<PowerFn>,
}

impl Bindings {
    /// Bindings with only an activate operation
    pub fn new<F, Fut>(activate: F) -> Self
    where
        F: Fn(Location, Tie) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            activate: Arc::new(move |location: Location, tie: Tie| activate(location, tie).boxed()),
            power_on: None,
            power_off: None,
        }
    }

    /// Add a power-on operation
    pub fn with_power_on<F, Fut>(mut self, power_on: F) -> Self
    where
        F: Fn(Location) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.power_on = Some(Arc::new(move |location: Location| power_on(location).boxed()));
        self
    }

    /// Add a power-off operation
    pub fn with_power_off<F, Fut>(mut self, power_off: F) -> Self
    where
        F: Fn(Location) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.power_off = Some(Arc::new(move |location: Location| power_off(location).boxed()));
        self
    }

    /// Bind a protocol. Power operations are only bound when the protocol
    /// has a power concept.
    pub fn from_protocol(protocol: Arc<dyn Protocol>) -> Self {
        let activate = {
            let protocol = protocol.clone();
            move |location: Location, tie: Tie| {
                let protocol = protocol.clone();
                async move { protocol.activate(&location, tie).await }
            }
        };
        let bindings = Self::new(activate);
        if !protocol.supports_power() {
            return bindings;
        }

        let on = protocol.clone();
        let off = protocol;
        bindings
            .with_power_on(move |location: Location| {
                let protocol = on.clone();
                async move { protocol.power_on(&location).await }
            })
            .with_power_off(move |location: Location| {
                let protocol = off.clone();
                async move { protocol.power_off(&location).await }
            })
    }

    /// Whether a power-on operation was supplied
    pub fn has_power_on(&self) -> bool {
        self.power_on.is_some()
    }

    /// Whether a power-off operation was supplied
    pub fn has_power_off(&self) -> bool {
        self.power_off.is_some()
    }

    /// Fill missing power operations with no-ops
    pub(crate) fn resolve(self) -> DriverBindings {
        DriverBindings {
            activate: self.activate,
            power_on: self.power_on.unwrap_or_else(noop),
            power_off: self.power_off.unwrap_or_else(noop),
        }
    }
}

fn noop() -> PowerFn {
    Arc::new(|_: Location| future::ok(()).boxed())
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("power_on", &self.has_power_on())
            .field("power_off", &self.has_power_off())
            .finish_non_exhaustive()
    }
}

/// Complete bindings held by the registry
#[derive(Clone)]
pub struct DriverBindings {
    activate: ActivateFn,
    power_on: PowerFn,
    power_off: PowerFn,
}

impl DriverBindings {
    /// Route a tie
    pub fn activate(&self, location: Location, tie: Tie) -> BoxFuture<'static, Result<()>> {
        (self.activate)(location, tie)
    }

    /// Power on
    pub fn power_on(&self, location: Location) -> BoxFuture<'static, Result<()>> {
        (self.power_on)(location)
    }

    /// Power off
    pub fn power_off(&self, location: Location) -> BoxFuture<'static, Result<()>> {
        (self.power_off)(location)
    }
}

impl fmt::Debug for DriverBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverBindings").finish_non_exhaustive()
    }
}

/// A registered driver
#[derive(Debug, Clone)]
pub struct DriverEntry {
    /// Metadata
    pub descriptor: DriverDescriptor,
    /// Operations
    pub bindings: DriverBindings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn metadata() -> Localized<DriverMetadata> {
        Localized::new().with("en", DriverMetadata::new("Test Switch", "Acme", "avroute"))
    }

    #[test]
    fn test_capabilities() {
        let caps = Capabilities::MULTI_OUTPUT | Capabilities::DECOUPLE_AUDIO;
        assert_eq!(caps.bits(), 3);
        assert!(caps.contains(Capabilities::DECOUPLE_AUDIO));
        assert!(!Capabilities::NONE.contains(Capabilities::MULTI_OUTPUT));
    }

    #[test]
    fn test_descriptor_serializes() {
        let descriptor = DriverDescriptor::new(
            DriverId::from_u128(7),
            DriverKind::Monitor,
            metadata(),
        )
        .experimental()
        .with_capabilities(Capabilities::MULTI_OUTPUT);

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["kind"], "monitor");
        assert_eq!(json["capabilities"], 1);
        assert_eq!(json["experimental"], true);
        assert_eq!(json["metadata"]["en"]["company"], "Acme");
        assert_eq!(descriptor.title("en-US"), Some("Test Switch"));
    }

    #[tokio::test]
    async fn test_missing_power_resolves_to_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let bindings = Bindings::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        assert!(!bindings.has_power_on());

        let resolved = bindings.resolve();
        let location: Location = "ip:10.0.0.1".parse().unwrap();
        resolved.power_on(location.clone()).await.unwrap();
        resolved.power_off(location.clone()).await.unwrap();
        resolved.activate(location, Tie::new(1, 1)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_supplied_power_is_kept() {
        let bindings = Bindings::new(|_, _| async { Ok(()) })
            .with_power_on(|location: Location| async move {
                Err(DriverError::InvalidLocation(location.to_string()))
            });

        let resolved = bindings.resolve();
        let location: Location = "ip:10.0.0.1".parse().unwrap();
        assert!(resolved.power_on(location.clone()).await.is_err());
        assert!(resolved.power_off(location).await.is_ok());
    }

    #[test]
    fn test_packet_errors_are_protocol_errors() {
        let err: DriverError = PacketError::Empty.into();
        assert!(matches!(err, DriverError::Protocol(ProtocolError::Packet(PacketError::Empty))));
        assert_eq!(err.to_string(), "invalid Sony packet: packet data is empty");
    }
}
