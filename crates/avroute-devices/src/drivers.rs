/*!
 * Built-in driver table.
 *
 * Ids are persisted by callers next to each device, so they must never
 * change once released.
 */
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use avroute_core::config::TransportConfig;
use avroute_core::types::{DriverId, Localized};

use crate::driver::{Bindings, Capabilities, DriverDescriptor, DriverKind, DriverMetadata};
use crate::protocol::{CommandLink, Protocol};
use crate::protocols::{ExtronSis, Shinybow, ShinybowVersion, SonyRs485, TeslaElec, TeslaElecModel};
use crate::registry::DriverRegistry;
use crate::transport::{CommandTransport, TransportOptions};

/// Extron SIS
pub const EXTRON_SIS: DriverId = DriverId::from_u128(0x4f1c_2a7e_9d3b_4c61_8e05_7b2d_1a90_c3e4);
/// Shinybow v2.0
pub const SHINYBOW_V2: DriverId = DriverId::from_u128(0x8a6e_0b5d_31f2_4e97_a4c8_52d1_6f0e_b713);
/// Shinybow v3.0
pub const SHINYBOW_V3: DriverId = DriverId::from_u128(0x2c94_d7e1_5a08_4b3f_9612_e07a_c4b5_58d9);
/// Tesla Elec KVM
pub const TESLA_ELEC_KVM: DriverId = DriverId::from_u128(0xd3b7_6e20_14ac_4f58_b9e1_0c6f_72a4_9e35);
/// Tesla Elec HDMI matrix
pub const TESLA_ELEC_MATRIX: DriverId =
    DriverId::from_u128(0x61e0_f4a9_c82d_47b6_8357_ab19_e6d0_2f7c);
/// Tesla Elec SDI
pub const TESLA_ELEC_SDI: DriverId = DriverId::from_u128(0xb5c2_8d4f_e716_4a09_9cd3_4f8e_10b7_a662);
/// Sony RS-485 monitors
pub const SONY_RS485: DriverId = DriverId::from_u128(0x7e48_13c6_a95f_4d2e_b07a_e9c3_5d61_04fb);

const PROVIDER: &str = "avroute";

/// Deployment overrides applied on top of each vendor's framing defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverOverrides {
    /// Connect/write timeout
    pub timeout: Option<Duration>,
    /// TCP port for network locations without one
    pub network_port: Option<u16>,
}

impl DriverOverrides {
    /// Take both overrides from configuration
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            timeout: Some(config.connect_timeout()),
            network_port: Some(config.network_port),
        }
    }

    fn apply(&self, mut options: TransportOptions) -> TransportOptions {
        if let Some(timeout) = self.timeout {
            options.timeout = timeout;
        }
        if let Some(port) = self.network_port {
            options.default_port = port;
        }
        options
    }
}

fn entry<P: Protocol + 'static>(
    descriptor: DriverDescriptor,
    protocol: P,
) -> (DriverDescriptor, Arc<dyn Protocol>) {
    let protocol: Arc<dyn Protocol> = Arc::new(protocol);
    (descriptor, protocol)
}

fn metadata(title: &str, company: &str) -> Localized<DriverMetadata> {
    Localized::new().with("en", DriverMetadata::new(title, company, PROVIDER))
}

/// Register every built-in driver.
///
/// Safe to call more than once; later calls leave existing entries alone.
pub fn register_builtin(
    registry: &DriverRegistry,
    transport: Arc<dyn CommandTransport>,
    overrides: DriverOverrides,
) {
    let link = |options: TransportOptions| CommandLink::new(transport.clone(), overrides.apply(options));

    let table = vec![
        entry(
            DriverDescriptor::new(EXTRON_SIS, DriverKind::Switch, metadata("SIS", "Extron"))
                .with_capabilities(Capabilities::MULTI_OUTPUT | Capabilities::DECOUPLE_AUDIO),
            ExtronSis::new(link(ExtronSis::default_options())),
        ),
        entry(
            DriverDescriptor::new(
                SHINYBOW_V2,
                DriverKind::Switch,
                metadata("Matrix v2.0", "Shinybow"),
            )
            .with_capabilities(Capabilities::MULTI_OUTPUT),
            Shinybow::new(ShinybowVersion::V2, link(Shinybow::default_options())),
        ),
        entry(
            DriverDescriptor::new(
                SHINYBOW_V3,
                DriverKind::Switch,
                metadata("Matrix v3.0", "Shinybow"),
            )
            .with_capabilities(Capabilities::MULTI_OUTPUT),
            Shinybow::new(ShinybowVersion::V3, link(Shinybow::default_options())),
        ),
        entry(
            DriverDescriptor::new(TESLA_ELEC_KVM, DriverKind::Switch, metadata("KVM", "Tesla Elec")),
            TeslaElec::new(TeslaElecModel::Kvm, link(TeslaElec::default_options())),
        ),
        entry(
            DriverDescriptor::new(
                TESLA_ELEC_MATRIX,
                DriverKind::Switch,
                metadata("HDMI Matrix", "Tesla Elec"),
            )
            .with_capabilities(Capabilities::MULTI_OUTPUT),
            TeslaElec::new(TeslaElecModel::Matrix, link(TeslaElec::default_options())),
        ),
        entry(
            DriverDescriptor::new(
                TESLA_ELEC_SDI,
                DriverKind::Switch,
                metadata("SDI Switch", "Tesla Elec"),
            ),
            TeslaElec::new(TeslaElecModel::Sdi, link(TeslaElec::default_options())),
        ),
        entry(
            DriverDescriptor::new(
                SONY_RS485,
                DriverKind::Monitor,
                metadata("RS-485 Monitor", "Sony"),
            )
            .experimental(),
            SonyRs485::new(link(SonyRs485::default_options())),
        ),
    ];

    let count = table.len();
    for (descriptor, protocol) in table {
        registry.register(descriptor, Bindings::from_protocol(protocol));
    }
    info!("Registered {} built-in drivers", count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::transport::StaticPortLister;
    use std::collections::HashSet;

    fn setup(overrides: DriverOverrides) -> (DriverRegistry, MockTransport) {
        let registry = DriverRegistry::new(Arc::new(StaticPortLister::from_paths(["/dev/ttyUSB0"])));
        let transport = MockTransport::new();
        register_builtin(&registry, Arc::new(transport.clone()), overrides);
        (registry, transport)
    }

    #[test]
    fn test_all_builtins_registered_with_unique_ids() {
        let (registry, _) = setup(DriverOverrides::default());
        let ids: HashSet<_> = registry.list().iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 7);
        assert!(registry.list().iter().all(|d| d.title("en").is_some()));
    }

    #[test]
    fn test_only_sony_is_experimental_monitor() {
        let (registry, _) = setup(DriverOverrides::default());
        for descriptor in registry.list() {
            let is_sony = descriptor.id == SONY_RS485;
            assert_eq!(descriptor.experimental, is_sony);
            assert_eq!(descriptor.kind == DriverKind::Monitor, is_sony);
        }
    }

    #[tokio::test]
    async fn test_overrides_reach_the_transport() {
        let (registry, transport) = setup(DriverOverrides {
            timeout: Some(Duration::from_millis(750)),
            network_port: Some(4999),
        });

        registry
            .power_on(&SONY_RS485, "port:/dev/ttyUSB0")
            .await
            .unwrap();

        let options = transport.last_options().unwrap();
        assert_eq!(options.timeout, Duration::from_millis(750));
        assert_eq!(options.default_port, 4999);
        assert_eq!(options.baud_rate, 38400);
    }

    #[tokio::test]
    async fn test_power_is_noop_for_switches_without_power() {
        let (registry, transport) = setup(DriverOverrides::default());

        for id in [EXTRON_SIS, TESLA_ELEC_KVM, TESLA_ELEC_MATRIX, TESLA_ELEC_SDI] {
            registry.power_on(&id, "ip:10.1.1.1").await.unwrap();
            registry.power_off(&id, "ip:10.1.1.1").await.unwrap();
        }
        assert_eq!(transport.open_count(), 0);
    }
}
