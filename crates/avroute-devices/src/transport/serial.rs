/*!
 * Serial channels for `port:` locations.
 *
 * Backed by `tokio-serial` when the `serial` feature is enabled. Flow
 * control is always off.
 */
#[cfg(feature = "serial")]
use tracing::debug;

use super::{ChannelStream, Result, TransportError, TransportOptions};
use crate::location::Location;

#[cfg(feature = "serial")]
use super::{DataBits, Parity, StopBits};

#[cfg(feature = "serial")]
fn parity(location: &Location, parity: Parity) -> Result<tokio_serial::Parity> {
    match parity {
        Parity::None => Ok(tokio_serial::Parity::None),
        Parity::Odd => Ok(tokio_serial::Parity::Odd),
        Parity::Even => Ok(tokio_serial::Parity::Even),
        Parity::Mark | Parity::Space => Err(TransportError::Unsupported(format!(
            "{} parity on {}",
            parity, location
        ))),
    }
}

#[cfg(feature = "serial")]
fn data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Five => tokio_serial::DataBits::Five,
        DataBits::Six => tokio_serial::DataBits::Six,
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

#[cfg(feature = "serial")]
fn stop_bits(bits: StopBits) -> tokio_serial::StopBits {
    match bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

/// Open the serial device at `path` with the options' framing.
#[cfg(feature = "serial")]
pub(crate) fn open(
    location: &Location,
    path: &str,
    options: &TransportOptions,
) -> Result<ChannelStream> {
    let builder = tokio_serial::new(path, options.baud_rate)
        .data_bits(data_bits(options.data_bits))
        .stop_bits(stop_bits(options.stop_bits))
        .parity(parity(location, options.parity)?)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(options.timeout);

    let port = tokio_serial::SerialStream::open(&builder).map_err(|e| TransportError::Open {
        location: location.to_string(),
        source: e.into(),
    })?;

    debug!(
        location = %location,
        baud = options.baud_rate,
        parity = %options.parity,
        "serial port open"
    );
    Ok(ChannelStream::spawn(location.clone(), port, options.timeout))
}

/// Serial support was compiled out.
#[cfg(not(feature = "serial"))]
pub(crate) fn open(
    location: &Location,
    _path: &str,
    _options: &TransportOptions,
) -> Result<ChannelStream> {
    Err(TransportError::Unsupported(format!(
        "serial channels are not enabled in this build ({})",
        location
    )))
}
