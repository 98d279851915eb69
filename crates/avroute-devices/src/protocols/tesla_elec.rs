//! Tesla Elec KVM, HDMI matrix and SDI switchers.
//!
//! The KVM and SDI models take raw binary frames carrying the input as one
//! byte. The matrix takes an ASCII line. None of them have a power command.

use async_trait::async_trait;

use crate::driver::Result;
use crate::location::Location;
use crate::protocol::{check_channel, CommandLink, Protocol, ProtocolError, Tie};
use crate::transport::TransportOptions;

/// Which Tesla Elec product line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeslaElecModel {
    /// KVM switch, `AA BB 03 01 {in} EE`
    Kvm,
    /// HDMI matrix, `MT00SW{in:02}{out:02}NT\r\n`
    Matrix,
    /// SDI switch, `AA CC 01 {in}`
    Sdi,
}

impl TeslaElecModel {
    fn name(self) -> &'static str {
        match self {
            TeslaElecModel::Kvm => "tesla-elec-kvm",
            TeslaElecModel::Matrix => "tesla-elec-matrix",
            TeslaElecModel::Sdi => "tesla-elec-sdi",
        }
    }
}

/// Tesla Elec protocol for one product line
#[derive(Debug, Clone)]
pub struct TeslaElec {
    model: TeslaElecModel,
    link: CommandLink,
}

impl TeslaElec {
    /// 9600 8N1
    pub fn default_options() -> TransportOptions {
        TransportOptions::default()
    }

    /// Create the protocol over `link`
    pub fn new(model: TeslaElecModel, link: CommandLink) -> Self {
        Self { model, link }
    }

    /// Product line
    pub fn model(&self) -> TeslaElecModel {
        self.model
    }

    /// Bytes for a tie
    pub fn tie_command(&self, tie: Tie) -> std::result::Result<Vec<u8>, ProtocolError> {
        let name = self.model.name();
        match self.model {
            TeslaElecModel::Kvm => {
                let input = raw_byte(name, tie.input)?;
                Ok(vec![0xAA, 0xBB, 0x03, 0x01, input, 0xEE])
            }
            TeslaElecModel::Sdi => {
                let input = raw_byte(name, tie.input)?;
                Ok(vec![0xAA, 0xCC, 0x01, input])
            }
            TeslaElecModel::Matrix => {
                let input = check_channel(name, "input", tie.input, 99)?;
                let output = check_channel(name, "output", tie.video_output, 99)?;
                Ok(format!("MT00SW{:02}{:02}NT\r\n", input, output).into_bytes())
            }
        }
    }
}

fn raw_byte(protocol: &'static str, input: u32) -> std::result::Result<u8, ProtocolError> {
    let value = check_channel(protocol, "input", input, u32::from(u8::MAX))?;
    // Bounded by the check above.
    Ok(value as u8)
}

#[async_trait]
impl Protocol for TeslaElec {
    fn name(&self) -> &'static str {
        self.model.name()
    }

    async fn activate(&self, location: &Location, tie: Tie) -> Result<()> {
        let command = self.tie_command(tie)?;
        self.link.send(self.name(), location, &command).await
    }
}
