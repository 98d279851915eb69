/*!
 * The vendor protocol interface.
 *
 * A protocol turns a tie or a power request into exact wire bytes and sends
 * them through one open/write/close cycle. No protocol waits for or parses
 * a reply.
 */
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::driver::Result;
use crate::location::Location;
use crate::protocols::sony::packet::PacketError;
use crate::transport::{send_command, CommandTransport, TransportOptions};

/// A request to route one input to a video and an audio output.
///
/// Channel numbers are 1-based as printed on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tie {
    /// Input channel
    pub input: u32,
    /// Video output channel
    pub video_output: u32,
    /// Audio output channel
    pub audio_output: u32,
}

impl Tie {
    /// Route `input` to the same video and audio output
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input,
            video_output: output,
            audio_output: output,
        }
    }

    /// Route audio to a different output than video
    pub fn with_audio_output(mut self, audio_output: u32) -> Self {
        self.audio_output = audio_output;
        self
    }
}

/// Errors raised while building a command, before any I/O
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A Sony packet could not be built or verified
    #[error("invalid Sony packet: {0}")]
    Packet(#[from] PacketError),

    /// A channel number does not fit the vendor's wire format
    #[error("{field} {value} is out of range for {protocol} (maximum {max})")]
    ChannelOutOfRange {
        /// Protocol name
        protocol: &'static str,
        /// `input` or `output`
        field: &'static str,
        /// Requested value
        value: u32,
        /// Largest value the format can carry
        max: u32,
    },
}

/// Reject channel numbers wider than the wire format allows.
pub(crate) fn check_channel(
    protocol: &'static str,
    field: &'static str,
    value: u32,
    max: u32,
) -> std::result::Result<u32, ProtocolError> {
    if value > max {
        return Err(ProtocolError::ChannelOutOfRange {
            protocol,
            field,
            value,
            max,
        });
    }
    Ok(value)
}

/// A vendor control protocol.
#[async_trait]
pub trait Protocol: Send + Sync + Debug {
    /// Short protocol name used in logs
    fn name(&self) -> &'static str;

    /// Whether the device has a power concept at all.
    ///
    /// When false the power operations are never bound and callers get the
    /// registry's no-op instead.
    fn supports_power(&self) -> bool {
        false
    }

    /// Route a tie
    async fn activate(&self, location: &Location, tie: Tie) -> Result<()>;

    /// Power the device on
    async fn power_on(&self, _location: &Location) -> Result<()> {
        Ok(())
    }

    /// Power the device off
    async fn power_off(&self, _location: &Location) -> Result<()> {
        Ok(())
    }
}

/// Transport plus framing, shared by the vendor protocols.
#[derive(Debug, Clone)]
pub struct CommandLink {
    transport: Arc<dyn CommandTransport>,
    options: TransportOptions,
}

impl CommandLink {
    /// Bind a transport to a set of options
    pub fn new(transport: Arc<dyn CommandTransport>, options: TransportOptions) -> Self {
        Self { transport, options }
    }

    /// The options every command is sent with
    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Send one payload on a fresh stream
    pub async fn send(&self, protocol: &'static str, location: &Location, payload: &[u8]) -> Result<()> {
        debug!(protocol, location = %location, payload = ?payload, "sending");
        send_command(self.transport.as_ref(), location, &self.options, payload).await?;
        Ok(())
    }
}
