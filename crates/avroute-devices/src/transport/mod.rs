/*!
 * Command transports.
 *
 * A transport opens one duplex byte channel for a [`Location`]. Serial,
 * TCP and local channels all end up behind the same [`CommandStream`]
 * contract: write, observe inbound traffic for diagnostics, close.
 *
 * Every device command gets a fresh stream. Nothing is pooled, so a wedged
 * device only ever holds up the call that is talking to it.
 */
use std::fmt::{self, Debug};
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::location::Location;

pub mod local;
pub mod mock;
pub mod network;
pub mod ports;
pub mod serial;
mod stream;

pub use ports::{PortInfo, PortLister, StaticPortLister, SystemPortLister};
pub use stream::ChannelStream;

/// Default connect/write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// TCP port used when a network location carries none
pub const DEFAULT_NETWORK_PORT: u16 = 23;

/// Errors raised while opening, writing or closing a channel
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel could not be opened
    #[error("failed to open {location}: {source}")]
    Open {
        /// Location being opened
        location: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// The OS rejected a write
    #[error("write to {location} failed: {source}")]
    Write {
        /// Location being written
        location: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Graceful shutdown failed; the handle is released regardless
    #[error("closing {location} failed: {source}")]
    Close {
        /// Location being closed
        location: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// An operation did not finish within the configured timeout
    #[error("{operation} on {location} timed out after {after:?}")]
    Timeout {
        /// Location involved
        location: String,
        /// `connect`, `write` or `close`
        operation: &'static str,
        /// The timeout that expired
        after: Duration,
    },

    /// The stream was used after `close()`
    #[error("stream for {0} is already closed")]
    Closed(String),

    /// The requested option or channel is not available on this platform/build
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Serial port enumeration failed
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Serial data bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataBits {
    /// 5 bits per character
    Five,
    /// 6 bits per character
    Six,
    /// 7 bits per character
    Seven,
    /// 8 bits per character
    Eight,
}

/// Serial stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopBits {
    /// One stop bit
    One,
    /// Two stop bits
    Two,
}

/// Serial parity. `Mark` and `Space` only make sense on serial channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Parity bit always 1
    Mark,
    /// Parity bit always 0
    Space,
}

/// Options used to open a channel.
///
/// Framing fields are ignored by network and local channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Serial baud rate
    pub baud_rate: u32,
    /// Serial data bits
    pub data_bits: DataBits,
    /// Serial stop bits
    pub stop_bits: StopBits,
    /// Serial parity
    pub parity: Parity,
    /// Connect and write timeout
    pub timeout: Duration,
    /// TCP port for network locations without one
    pub default_port: u16,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            timeout: DEFAULT_TIMEOUT,
            default_port: DEFAULT_NETWORK_PORT,
        }
    }
}

impl TransportOptions {
    /// Creates options with 9600 8N1 framing and a 5 second timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Sets the data bits
    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Sets the stop bits
    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Sets the parity
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Sets the connect/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the default TCP port
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }
}

/// Inbound traffic observed on an open stream.
///
/// Nothing in this crate interprets it; it exists for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Bytes received from the device
    Data(Bytes),
    /// The channel reported an error
    Error(String),
}

/// An open duplex channel bound to one location.
///
/// Owned by exactly one call. `close` must run on every exit path; use
/// [`send_command`] rather than driving a stream by hand.
#[async_trait]
pub trait CommandStream: Send + Debug {
    /// The location this stream is bound to
    fn location(&self) -> &Location;

    /// Subscribe to inbound data and error events
    fn subscribe(&self) -> broadcast::Receiver<StreamEvent>;

    /// Write all bytes, resolving once the OS has accepted them
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Shut the channel down gracefully, then release the handle.
    ///
    /// Calling it again after a successful close is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens command streams.
#[async_trait]
pub trait CommandTransport: Send + Sync + Debug {
    /// Open a fresh stream for `location`, waiting until it is ready or fails
    async fn open(
        &self,
        location: &Location,
        options: &TransportOptions,
    ) -> Result<Box<dyn CommandStream>>;
}

/// Open a stream, write `payload`, and close it.
///
/// The stream is closed whether or not the write succeeded. A write error
/// takes precedence over a close error.
pub async fn send_command(
    transport: &dyn CommandTransport,
    location: &Location,
    options: &TransportOptions,
    payload: &[u8],
) -> Result<()> {
    let mut stream = transport.open(location, options).await?;
    debug!(location = %location, bytes = payload.len(), "sending command");

    let written = stream.write(payload).await;
    let closed = stream.close().await;

    if let Err(e) = &closed {
        warn!(location = %location, "close failed: {}", e);
    }
    written?;
    closed
}

/// The transport backed by real OS channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTransport;

impl SystemTransport {
    /// Create the system transport
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandTransport for SystemTransport {
    async fn open(
        &self,
        location: &Location,
        options: &TransportOptions,
    ) -> Result<Box<dyn CommandStream>> {
        debug!(location = %location, kind = location.kind(), "opening channel");
        let stream = match location {
            Location::Serial { path } => serial::open(location, path, options)?,
            Location::Network { host, port } => {
                network::open(location, host, port.unwrap_or(options.default_port), options)
                    .await?
            }
            Location::Local { path } => local::open(location, path, options).await?,
        };
        Ok(Box::new(stream))
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "none",
            Parity::Odd => "odd",
            Parity::Even => "even",
            Parity::Mark => "mark",
            Parity::Space => "space",
        };
        f.write_str(name)
    }
}
