//! Extron SIS (Simple Instruction Set) matrix switchers.
//!
//! A tie is two commands on one line each: `{in}*{out}%` routes video and
//! `{in}*{out}$` routes audio. SIS has no power command.

use async_trait::async_trait;

use crate::driver::Result;
use crate::location::Location;
use crate::protocol::{CommandLink, Protocol, Tie};
use crate::transport::TransportOptions;

const NAME: &str = "extron-sis";

/// Extron SIS protocol
#[derive(Debug, Clone)]
pub struct ExtronSis {
    link: CommandLink,
}

impl ExtronSis {
    /// 9600 8N1
    pub fn default_options() -> TransportOptions {
        TransportOptions::default()
    }

    /// Create the protocol over `link`
    pub fn new(link: CommandLink) -> Self {
        Self { link }
    }

    /// Bytes for a tie
    pub fn tie_command(tie: Tie) -> String {
        format!(
            "{input}*{video}%\r\n{input}*{audio}$\r\n",
            input = tie.input,
            video = tie.video_output,
            audio = tie.audio_output
        )
    }
}

#[async_trait]
impl Protocol for ExtronSis {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn activate(&self, location: &Location, tie: Tie) -> Result<()> {
        let command = Self::tie_command(tie);
        self.link.send(NAME, location, command.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::sync::Arc;

    #[test]
    fn test_tie_command() {
        let tie = Tie::new(1, 2).with_audio_output(3);
        assert_eq!(ExtronSis::tie_command(tie), "1*2%\r\n1*3$\r\n");
        assert_eq!(ExtronSis::tie_command(Tie::new(12, 16)), "12*16%\r\n12*16$\r\n");
    }

    #[tokio::test]
    async fn test_activate_sends_one_write() {
        let transport = MockTransport::new();
        let protocol = ExtronSis::new(CommandLink::new(
            Arc::new(transport.clone()),
            ExtronSis::default_options(),
        ));
        let location: Location = "ip:10.0.0.7".parse().unwrap();

        protocol
            .activate(&location, Tie::new(1, 2).with_audio_output(3))
            .await
            .unwrap();
        protocol.power_on(&location).await.unwrap();

        assert_eq!(transport.writes(), vec![b"1*2%\r\n1*3$\r\n".to_vec()]);
        assert_eq!(transport.open_count(), 1);
        assert!(!protocol.supports_power());
    }
}
