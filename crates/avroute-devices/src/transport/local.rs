/*!
 * Local IPC channels: Unix domain sockets, or named pipes on Windows.
 */
use tokio::time::timeout;

use super::{ChannelStream, Result, TransportError, TransportOptions};
use crate::location::Location;

fn open_error(location: &Location, source: std::io::Error) -> TransportError {
    TransportError::Open {
        location: location.to_string(),
        source,
    }
}

/// Connect to the socket at `path`.
#[cfg(unix)]
pub(crate) async fn open(
    location: &Location,
    path: &str,
    options: &TransportOptions,
) -> Result<ChannelStream> {
    let stream = timeout(options.timeout, tokio::net::UnixStream::connect(path))
        .await
        .map_err(|_| TransportError::Timeout {
            location: location.to_string(),
            operation: "connect",
            after: options.timeout,
        })?
        .map_err(|e| open_error(location, e))?;

    Ok(ChannelStream::spawn(location.clone(), stream, options.timeout))
}

/// Open the named pipe at `path`.
#[cfg(windows)]
pub(crate) async fn open(
    location: &Location,
    path: &str,
    options: &TransportOptions,
) -> Result<ChannelStream> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let connect = async { ClientOptions::new().open(path) };
    let pipe = timeout(options.timeout, connect)
        .await
        .map_err(|_| TransportError::Timeout {
            location: location.to_string(),
            operation: "connect",
            after: options.timeout,
        })?
        .map_err(|e| open_error(location, e))?;

    Ok(ChannelStream::spawn(location.clone(), pipe, options.timeout))
}

#[cfg(not(any(unix, windows)))]
pub(crate) async fn open(
    location: &Location,
    _path: &str,
    _options: &TransportOptions,
) -> Result<ChannelStream> {
    Err(TransportError::Unsupported(format!(
        "local channels are not available on this platform ({})",
        location
    )))
}
