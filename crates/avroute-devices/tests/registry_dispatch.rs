use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use avroute_core::types::{DriverId, Localized};
use avroute_devices::drivers::{
    EXTRON_SIS, SHINYBOW_V2, SHINYBOW_V3, SONY_RS485, TESLA_ELEC_KVM, TESLA_ELEC_MATRIX,
    TESLA_ELEC_SDI,
};
use avroute_devices::transport::mock::MockTransport;
use avroute_devices::transport::{PortInfo, PortLister, StaticPortLister};
use avroute_devices::{
    register_builtin, Bindings, DriverDescriptor, DriverError, DriverKind, DriverMetadata,
    DriverOverrides, DriverRegistry, Tie, TransportError,
};
use tokio_test::{assert_err, assert_ok};

const SERIAL: &str = "port:/dev/ttyUSB0";

fn setup() -> (DriverRegistry, MockTransport) {
    let ports = StaticPortLister::new(vec![
        PortInfo::from_path("/dev/ttyUSB0").with_pnp_id("usb-FTDI_FT232R_USB_UART_A1-if00-port0")
    ]);
    let registry = DriverRegistry::new(Arc::new(ports));
    let transport = MockTransport::new();
    register_builtin(&registry, Arc::new(transport.clone()), DriverOverrides::default());
    (registry, transport)
}

#[test_log::test(tokio::test)]
async fn unknown_driver_fails_before_any_transport_is_opened() {
    let (registry, transport) = setup();
    let missing = DriverId::from_u128(0xdead_beef);

    for result in [
        registry.activate(&missing, SERIAL, Tie::new(1, 1)).await,
        registry.power_on(&missing, "not a location:").await,
        registry.power_off(&missing, "").await,
    ] {
        assert!(matches!(result, Err(DriverError::UnknownDriver(id)) if id == missing));
    }
    assert_eq!(transport.open_count(), 0);
}

#[test_log::test(tokio::test)]
async fn invalid_location_fails_before_any_transport_is_opened() {
    let (registry, transport) = setup();

    for location in ["", "ip:", "port:", "file:", "port:/dev/ttyUSB7", "ip:bad_host"] {
        let result = registry.activate(&EXTRON_SIS, location, Tie::new(1, 1)).await;
        assert!(
            matches!(result, Err(DriverError::InvalidLocation(_))),
            "{:?}",
            location
        );
    }
    assert_eq!(transport.open_count(), 0);
}

#[test_log::test(tokio::test)]
async fn vendor_bytes_are_exact() {
    let cases: Vec<(DriverId, Tie, Vec<u8>)> = vec![
        (EXTRON_SIS, Tie::new(1, 2).with_audio_output(3), b"1*2%\r\n1*3$\r\n".to_vec()),
        (SHINYBOW_V2, Tie::new(1, 20), b"OUTPUT20 01;\r\n".to_vec()),
        (SHINYBOW_V3, Tie::new(1, 202), b"OUTPUT202 001;\r\n".to_vec()),
        (TESLA_ELEC_KVM, Tie::new(5, 1), vec![0xAA, 0xBB, 0x03, 0x01, 0x05, 0xEE]),
        (TESLA_ELEC_MATRIX, Tie::new(4, 2), b"MT00SW0402NT\r\n".to_vec()),
        (TESLA_ELEC_SDI, Tie::new(7, 1), vec![0xAA, 0xCC, 0x01, 0x07]),
    ];

    for (id, tie, expected) in cases {
        let (registry, transport) = setup();
        assert_ok!(registry.activate(&id, SERIAL, tie).await);
        assert_eq!(transport.writes(), vec![expected], "driver {}", id);
        assert_eq!(transport.open_count(), 1);
        assert_eq!(transport.close_count(), 1);
    }
}

#[test_log::test(tokio::test)]
async fn sony_power_frames_and_framing() {
    let (registry, transport) = setup();

    assert_ok!(registry.power_on(&SONY_RS485, SERIAL).await);
    assert_ok!(registry.power_off(&SONY_RS485, SERIAL).await);

    assert_eq!(
        transport.writes(),
        vec![
            vec![0x02, 0x04, 0xC0, 0xC0, 0x29, 0x3E, 0x15],
            vec![0x02, 0x04, 0xC0, 0xC0, 0x2A, 0x3E, 0x14],
        ]
    );
    let options = transport.last_options().unwrap();
    assert_eq!(options.baud_rate, 38400);
    assert_eq!(options.parity, avroute_devices::transport::Parity::Odd);
}

#[test_log::test(tokio::test)]
async fn shinybow_power_goes_through_registry() {
    let (registry, transport) = setup();

    assert_ok!(registry.power_on(&SHINYBOW_V2, "ip:10.0.0.2:4001").await);

    assert_eq!(transport.writes(), vec![b"POWER 01;\r\n".to_vec()]);
    assert_eq!(transport.opened_locations()[0].to_string(), "ip:10.0.0.2:4001");
}

#[test_log::test(tokio::test)]
async fn transport_errors_propagate_unchanged() {
    let (registry, transport) = setup();
    transport.fail_writes(io::ErrorKind::TimedOut);

    let result = registry.activate(&EXTRON_SIS, "ip:10.0.0.3", Tie::new(1, 1)).await;

    match assert_err!(result) {
        DriverError::Transport(TransportError::Write { source, .. }) => {
            assert_eq!(source.kind(), io::ErrorKind::TimedOut)
        }
        other => panic!("unexpected error: {other}"),
    }
    // Closed on the failure path as well.
    assert_eq!(transport.close_count(), 1);
}

#[test_log::test(tokio::test)]
async fn close_failures_propagate_unchanged() {
    let (registry, transport) = setup();
    transport.fail_closes(io::ErrorKind::ConnectionReset);

    let result = registry.power_on(&SHINYBOW_V3, "ip:10.0.0.3").await;

    assert!(matches!(
        assert_err!(result),
        DriverError::Transport(TransportError::Close { .. })
    ));
    assert_eq!(transport.writes(), vec![b"POWER 001;\r\n".to_vec()]);
    assert_eq!(transport.close_count(), 1);
}

#[derive(Debug)]
struct FailingPorts;

#[async_trait::async_trait]
impl PortLister for FailingPorts {
    async fn list_ports(&self) -> Result<Vec<PortInfo>, TransportError> {
        Err(TransportError::Enumerate("os enumeration failed".to_string()))
    }
}

#[test_log::test(tokio::test)]
async fn port_enumeration_failure_is_not_an_invalid_location() {
    let registry = DriverRegistry::new(Arc::new(FailingPorts));
    let transport = MockTransport::new();
    register_builtin(&registry, Arc::new(transport.clone()), DriverOverrides::default());

    let result = registry.activate(&EXTRON_SIS, SERIAL, Tie::new(1, 2)).await;

    assert!(matches!(
        assert_err!(result),
        DriverError::Transport(TransportError::Enumerate(_))
    ));
    assert_eq!(transport.open_count(), 0);
    assert!(matches!(
        registry.check_location(SERIAL).await,
        Err(DriverError::Transport(TransportError::Enumerate(_)))
    ));
}

#[test_log::test(tokio::test)]
async fn construction_errors_precede_io() {
    let (registry, transport) = setup();

    let result = registry.activate(&SONY_RS485, SERIAL, Tie::new(256, 1)).await;

    assert!(matches!(result, Err(DriverError::Protocol(_))));
    assert_eq!(transport.open_count(), 0);
}

#[test_log::test(tokio::test)]
async fn registration_is_idempotent_and_keeps_first_bindings() {
    let (registry, transport) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let replacement = DriverDescriptor::new(
        EXTRON_SIS,
        DriverKind::Monitor,
        Localized::new().with("en", DriverMetadata::new("Other", "Other", "test")),
    );
    let entry = registry.register(
        replacement,
        Bindings::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }),
    );

    assert_eq!(entry.descriptor.kind, DriverKind::Switch);
    assert_eq!(registry.list().len(), 7);

    assert_ok!(registry.activate(&EXTRON_SIS, "ip:10.0.0.4", Tie::new(2, 3)).await);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.writes(), vec![b"2*3%\r\n2*3$\r\n".to_vec()]);
}

#[test_log::test(tokio::test)]
async fn custom_driver_without_power_gets_noops() {
    let registry = DriverRegistry::new(Arc::new(StaticPortLister::default()));
    let id = DriverId::new_random();
    registry.register(
        DriverDescriptor::new(
            id,
            DriverKind::Switch,
            Localized::new().with("en", DriverMetadata::new("Bare", "Acme", "test")),
        ),
        Bindings::new(|_, _| async { Ok(()) }),
    );

    assert_ok!(registry.power_on(&id, "/run/switch.sock").await);
    assert_ok!(registry.power_off(&id, "/run/switch.sock").await);
}

#[tokio::test]
async fn concurrent_calls_each_open_their_own_stream() {
    let (registry, transport) = setup();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (1..=8)
        .map(|input| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .activate(&TESLA_ELEC_SDI, "ip:10.0.0.5", Tie::new(input, 1))
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert_ok!(handle.await.unwrap());
    }

    assert_eq!(transport.open_count(), 8);
    assert_eq!(transport.close_count(), 8);
}
