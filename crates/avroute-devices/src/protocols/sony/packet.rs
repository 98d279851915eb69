//! Sony RS-485 monitor control framing.
//!
//! Wire format:
//! ```text
//! [type:1][length:1][data:length][checksum:1]
//! ```
//! `data` is a command block:
//! ```text
//! [destination:1][source:1][command:2][arg0:1]?[arg1:1]?
//! ```
//! Addresses carry their kind in the top 3 bits and a number in the bottom 5.
//! Commands are big-endian. All arithmetic is on wrapping `u8`.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Largest data field a packet can carry
pub const MAX_DATA_LEN: usize = 255;
/// Largest address number
pub const MAX_ADDRESS_NUMBER: u8 = 0x1F;

const ADDRESS_NUMBER_MASK: u8 = 0x1F;
const ADDRESS_KIND_MASK: u8 = 0xE0;

/// Errors raised while building or verifying a packet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The data field is empty.
    #[error("packet data is empty")]
    Empty,

    /// The data field is longer than 255 bytes.
    #[error("packet data is {0} bytes, the maximum is 255")]
    TooLong(usize),

    /// An address number does not fit in 5 bits.
    #[error("address number {0} is out of range (0-31)")]
    AddressOutOfRange(u8),

    /// Fewer bytes than the smallest possible frame.
    #[error("frame is truncated: need at least {needed} bytes, got {available}")]
    Truncated {
        /// Minimum bytes needed
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// The length byte does not match the frame size.
    #[error("length byte says {declared}, frame carries {actual}")]
    LengthMismatch {
        /// Length from the header
        declared: usize,
        /// Data bytes actually present
        actual: usize,
    },

    /// The trailing byte is not the checksum of the data.
    #[error("checksum mismatch: expected 0x{expected:02X}, found 0x{found:02X}")]
    ChecksumMismatch {
        /// Computed checksum
        expected: u8,
        /// Checksum in the frame
        found: u8,
    },
}

/// Top 3 bits of an address byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// Broadcast to every monitor
    All,
    /// A monitor group
    Group,
    /// A single monitor
    Monitor,
}

impl AddressKind {
    /// Wire bits for this kind
    pub const fn bits(self) -> u8 {
        match self {
            AddressKind::All => 0xC0,
            AddressKind::Group => 0x80,
            AddressKind::Monitor => 0x00,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits & ADDRESS_KIND_MASK {
            0xC0 => Some(AddressKind::All),
            0x80 => Some(AddressKind::Group),
            0x00 => Some(AddressKind::Monitor),
            _ => None,
        }
    }
}

/// A source or destination address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    kind: AddressKind,
    number: u8,
}

impl Address {
    /// Broadcast address, number 0
    pub const ALL: Address = Address {
        kind: AddressKind::All,
        number: 0,
    };

    /// Build an address; `number` must be 0-31.
    pub fn new(kind: AddressKind, number: u8) -> Result<Self, PacketError> {
        if number > MAX_ADDRESS_NUMBER {
            return Err(PacketError::AddressOutOfRange(number));
        }
        Ok(Self { kind, number })
    }

    /// Address kind
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Address number
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Encoded address byte
    pub fn to_byte(self) -> u8 {
        (self.kind.bits() & ADDRESS_KIND_MASK) | (self.number & ADDRESS_NUMBER_MASK)
    }

    /// Decode an address byte. Kinds other than ALL/GROUP/MONITOR yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        AddressKind::from_bits(byte).map(|kind| Self {
            kind,
            number: byte & ADDRESS_NUMBER_MASK,
        })
    }
}

/// 16-bit command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command(pub u16);

impl Command {
    /// Select an input channel
    pub const SET_CHANNEL: Command = Command(0x2100);
    /// Power on
    pub const POWER_ON: Command = Command(0x293E);
    /// Power off (standby)
    pub const POWER_OFF: Command = Command(0x2A3E);
    /// Front-panel button emulation
    pub const BUTTON: Command = Command(0x3F44);
}

/// Packet type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(pub u8);

impl PacketType {
    /// Command packet; the only type sent today
    pub const COMMAND: PacketType = PacketType(0x02);
}

/// Addressed command carried in a packet's data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBlock {
    /// Destination address
    pub destination: Address,
    /// Source address
    pub source: Address,
    /// Command code
    pub command: Command,
    /// First argument; absent or zero is not sent
    pub arg0: Option<u8>,
    /// Second argument; only sent after a non-zero `arg0`
    pub arg1: Option<u8>,
}

impl CommandBlock {
    /// A block with no arguments
    pub fn new(destination: Address, source: Address, command: Command) -> Self {
        Self {
            destination,
            source,
            command,
            arg0: None,
            arg1: None,
        }
    }

    /// Set both arguments
    pub fn with_args(mut self, arg0: u8, arg1: u8) -> Self {
        self.arg0 = Some(arg0);
        self.arg1 = Some(arg1);
        self
    }

    /// Encode the block. Trailing absent or zero arguments are dropped.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6);
        out.push(self.destination.to_byte());
        out.push(self.source.to_byte());
        out.extend_from_slice(&self.command.0.to_be_bytes());

        if let Some(arg0) = self.arg0.filter(|&a| a != 0) {
            out.push(arg0);
            if let Some(arg1) = self.arg1.filter(|&a| a != 0) {
                out.push(arg1);
            }
        }
        out
    }
}

/// Checksum over a data field.
///
/// Complement of the 8-bit sum, minus `len - 1`, wrapping. `data` must be
/// 1-255 bytes long.
pub fn checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    let len_minus_one = (data.len().wrapping_sub(1) & 0xFF) as u8;
    (!sum).wrapping_sub(len_minus_one)
}

/// A framed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    data: Vec<u8>,
}

impl Packet {
    /// Build a packet; `data` must be 1-255 bytes.
    pub fn new(packet_type: PacketType, data: Vec<u8>) -> Result<Self, PacketError> {
        if data.is_empty() {
            return Err(PacketError::Empty);
        }
        if data.len() > MAX_DATA_LEN {
            return Err(PacketError::TooLong(data.len()));
        }
        Ok(Self { packet_type, data })
    }

    /// A COMMAND packet carrying `block`
    pub fn command(block: &CommandBlock) -> Result<Self, PacketError> {
        Self::new(PacketType::COMMAND, block.to_bytes())
    }

    /// Packet type
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// Data field
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Checksum of the data field
    pub fn checksum(&self) -> u8 {
        checksum(&self.data)
    }

    /// Wire bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 3);
        buf.put_u8(self.packet_type.0);
        // Length is bounded to 255 by construction.
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
        buf.put_u8(self.checksum());
        buf.freeze()
    }

    /// Parse and verify a frame. `frame` must be exactly one packet.
    pub fn decode(frame: &[u8]) -> Result<Self, PacketError> {
        const MIN_FRAME: usize = 4;
        if frame.len() < MIN_FRAME {
            return Err(PacketError::Truncated {
                needed: MIN_FRAME,
                available: frame.len(),
            });
        }

        let declared = usize::from(frame[1]);
        let actual = frame.len() - 3;
        if declared != actual {
            return Err(PacketError::LengthMismatch { declared, actual });
        }

        let data = &frame[2..2 + declared];
        let expected = checksum(data);
        let found = frame[frame.len() - 1];
        if expected != found {
            return Err(PacketError::ChecksumMismatch { expected, found });
        }

        Self::new(PacketType(frame[0]), data.to_vec())
    }

    /// Interpret the data field as a command block, if it is shaped like one.
    pub fn command_block(&self) -> Option<CommandBlock> {
        if self.data.len() < 4 || self.data.len() > 6 {
            return None;
        }
        Some(CommandBlock {
            destination: Address::from_byte(self.data[0])?,
            source: Address::from_byte(self.data[1])?,
            command: Command(u16::from_be_bytes([self.data[2], self.data[3]])),
            arg0: self.data.get(4).copied(),
            arg1: self.data.get(5).copied(),
        })
    }
}
