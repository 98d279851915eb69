//! Shinybow matrix switchers.
//!
//! Two firmware generations share one grammar and differ only in channel
//! width: v2.0 uses two zero-padded digits, v3.0 uses three.
//!
//! ```text
//! OUTPUT{out} {in};\r\n
//! POWER 01;\r\n / POWER 00;\r\n
//! ```

use async_trait::async_trait;

use crate::driver::Result;
use crate::location::Location;
use crate::protocol::{check_channel, CommandLink, Protocol, ProtocolError, Tie};
use crate::transport::TransportOptions;

/// Firmware generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShinybowVersion {
    /// v2.0, two-digit channels
    V2,
    /// v3.0, three-digit channels
    V3,
}

impl ShinybowVersion {
    fn width(self) -> usize {
        match self {
            ShinybowVersion::V2 => 2,
            ShinybowVersion::V3 => 3,
        }
    }

    fn max_channel(self) -> u32 {
        match self {
            ShinybowVersion::V2 => 99,
            ShinybowVersion::V3 => 999,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ShinybowVersion::V2 => "shinybow-v2",
            ShinybowVersion::V3 => "shinybow-v3",
        }
    }
}

/// Shinybow protocol for one firmware generation
#[derive(Debug, Clone)]
pub struct Shinybow {
    version: ShinybowVersion,
    link: CommandLink,
}

impl Shinybow {
    /// 9600 8N1
    pub fn default_options() -> TransportOptions {
        TransportOptions::default()
    }

    /// Create the protocol over `link`
    pub fn new(version: ShinybowVersion, link: CommandLink) -> Self {
        Self { version, link }
    }

    /// Firmware generation
    pub fn version(&self) -> ShinybowVersion {
        self.version
    }

    fn pad(&self, field: &'static str, value: u32) -> std::result::Result<String, ProtocolError> {
        let value = check_channel(self.version.name(), field, value, self.version.max_channel())?;
        Ok(format!("{:0width$}", value, width = self.version.width()))
    }

    /// Bytes routing `tie.input` to `tie.video_output`
    pub fn tie_command(&self, tie: Tie) -> std::result::Result<String, ProtocolError> {
        Ok(format!(
            "OUTPUT{} {};\r\n",
            self.pad("output", tie.video_output)?,
            self.pad("input", tie.input)?
        ))
    }

    /// Bytes for a power state
    pub fn power_command(&self, on: bool) -> String {
        let state = if on { 1 } else { 0 };
        format!("POWER {:0width$};\r\n", state, width = self.version.width())
    }
}

#[async_trait]
impl Protocol for Shinybow {
    fn name(&self) -> &'static str {
        self.version.name()
    }

    fn supports_power(&self) -> bool {
        true
    }

    async fn activate(&self, location: &Location, tie: Tie) -> Result<()> {
        let command = self.tie_command(tie)?;
        self.link.send(self.name(), location, command.as_bytes()).await
    }

    async fn power_on(&self, location: &Location) -> Result<()> {
        let command = self.power_command(true);
        self.link.send(self.name(), location, command.as_bytes()).await
    }

    async fn power_off(&self, location: &Location) -> Result<()> {
        let command = self.power_command(false);
        self.link.send(self.name(), location, command.as_bytes()).await
    }
}
