/*!
 * TCP channels for `ip:` locations.
 */
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{ChannelStream, Result, TransportError, TransportOptions};
use crate::location::Location;

/// Connect to `host:port`, bounded by the options' timeout.
pub(crate) async fn open(
    location: &Location,
    host: &str,
    port: u16,
    options: &TransportOptions,
) -> Result<ChannelStream> {
    let label = location.to_string();
    let connect = TcpStream::connect((host, port));

    let stream = timeout(options.timeout, connect)
        .await
        .map_err(|_| TransportError::Timeout {
            location: label.clone(),
            operation: "connect",
            after: options.timeout,
        })?
        .map_err(|source| TransportError::Open {
            location: label.clone(),
            source,
        })?;

    // Commands are tiny; don't let Nagle hold them back.
    stream
        .set_nodelay(true)
        .map_err(|source| TransportError::Open {
            location: label.clone(),
            source,
        })?;

    debug!(location = %label, peer = ?stream.peer_addr().ok(), "connected");
    Ok(ChannelStream::spawn(location.clone(), stream, options.timeout))
}
