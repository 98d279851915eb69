//! Sony professional monitors over RS-485.
//!
//! Every command is broadcast: source and destination are both ALL/0. The
//! frame format can address groups and single monitors but no caller needs
//! it yet, so a bus with several monitors switches all of them together.

use async_trait::async_trait;
use tracing::trace;

use crate::driver::Result;
use crate::location::Location;
use crate::protocol::{check_channel, CommandLink, Protocol, ProtocolError, Tie};
use crate::transport::{Parity, TransportOptions};

pub mod packet;

use packet::{Address, Command, CommandBlock, Packet};

const NAME: &str = "sony-rs485";

/// SET_CHANNEL's first argument. Its meaning is undocumented; monitors
/// expect 1.
const SET_CHANNEL_ARG0: u8 = 1;

/// Sony RS-485 monitor protocol
#[derive(Debug, Clone)]
pub struct SonyRs485 {
    link: CommandLink,
}

impl SonyRs485 {
    /// 38400 8O1
    pub fn default_options() -> TransportOptions {
        TransportOptions::default()
            .with_baud_rate(38400)
            .with_parity(Parity::Odd)
    }

    /// Create the protocol over `link`
    pub fn new(link: CommandLink) -> Self {
        Self { link }
    }

    /// Frame selecting input `input`
    pub fn set_channel_frame(input: u32) -> std::result::Result<Packet, ProtocolError> {
        let input = check_channel(NAME, "input", input, u32::from(u8::MAX))?;
        // Bounded by the check above.
        let block = broadcast(Command::SET_CHANNEL).with_args(SET_CHANNEL_ARG0, input as u8);
        Ok(Packet::command(&block)?)
    }

    /// Frame for a power command
    pub fn power_frame(on: bool) -> std::result::Result<Packet, ProtocolError> {
        let command = if on { Command::POWER_ON } else { Command::POWER_OFF };
        Ok(Packet::command(&broadcast(command))?)
    }

    async fn send(&self, location: &Location, packet: Packet) -> Result<()> {
        let frame = packet.encode();
        trace!(location = %location, checksum = packet.checksum(), "sony frame built");
        self.link.send(NAME, location, &frame).await
    }
}

fn broadcast(command: Command) -> CommandBlock {
    CommandBlock::new(Address::ALL, Address::ALL, command)
}

#[async_trait]
impl Protocol for SonyRs485 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports_power(&self) -> bool {
        true
    }

    async fn activate(&self, location: &Location, tie: Tie) -> Result<()> {
        let packet = Self::set_channel_frame(tie.input)?;
        self.send(location, packet).await
    }

    async fn power_on(&self, location: &Location) -> Result<()> {
        let packet = Self::power_frame(true)?;
        self.send(location, packet).await
    }

    async fn power_off(&self, location: &Location) -> Result<()> {
        let packet = Self::power_frame(false)?;
        self.send(location, packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverError;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;

    fn sony(transport: &MockTransport) -> SonyRs485 {
        SonyRs485::new(CommandLink::new(
            Arc::new(transport.clone()),
            SonyRs485::default_options(),
        ))
    }

    #[test]
    fn test_framing_is_38400_odd() {
        let options = SonyRs485::default_options();
        assert_eq!(options.baud_rate, 38400);
        assert_eq!(options.parity, Parity::Odd);
    }

    #[tokio::test]
    async fn test_power_frames_on_the_wire() {
        let transport = MockTransport::new();
        let protocol = sony(&transport);
        let location: Location = "port:/dev/ttyUSB0".parse().unwrap();

        protocol.power_on(&location).await.unwrap();
        protocol.power_off(&location).await.unwrap();

        assert_eq!(
            transport.writes(),
            vec![
                vec![0x02, 0x04, 0xC0, 0xC0, 0x29, 0x3E, 0x15],
                vec![0x02, 0x04, 0xC0, 0xC0, 0x2A, 0x3E, 0x14],
            ]
        );
        assert_eq!(transport.last_options().unwrap().parity, Parity::Odd);
    }

    #[tokio::test]
    async fn test_activate_sets_channel() {
        let transport = MockTransport::new();
        let location: Location = "port:/dev/ttyUSB0".parse().unwrap();

        sony(&transport)
            .activate(&location, Tie::new(3, 1))
            .await
            .unwrap();

        let frame = transport.written_bytes();
        assert_eq!(&frame[..8], &[0x02, 0x06, 0xC0, 0xC0, 0x21, 0x00, 0x01, 0x03]);
        assert_eq!(frame[8], packet::checksum(&frame[2..8]));
    }

    #[test]
    fn test_input_zero_truncates_argument() {
        let frame = SonyRs485::set_channel_frame(0).unwrap().encode();
        assert_eq!(&frame[..7], &[0x02, 0x05, 0xC0, 0xC0, 0x21, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn test_wide_input_fails_before_io() {
        let transport = MockTransport::new();
        let location: Location = "port:/dev/ttyUSB0".parse().unwrap();

        let result = sony(&transport).activate(&location, Tie::new(300, 1)).await;

        assert!(matches!(result, Err(DriverError::Protocol(_))));
        assert_eq!(transport.open_count(), 0);
    }
}
