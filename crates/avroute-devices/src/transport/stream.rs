/*!
 * A [`CommandStream`] over any tokio duplex I/O object.
 */
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use super::{CommandStream, Result, StreamEvent, TransportError};
use crate::location::Location;

const EVENT_CAPACITY: usize = 32;
const READ_CHUNK: usize = 256;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Duplex channel split into a writer owned by the caller and a reader task
/// that republishes inbound bytes as [`StreamEvent`]s.
pub struct ChannelStream {
    location: Location,
    writer: Option<BoxedWriter>,
    reader: Option<JoinHandle<()>>,
    events: broadcast::Sender<StreamEvent>,
    timeout: Duration,
}

impl ChannelStream {
    /// Wrap an already-connected I/O object.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(location: Location, io: T, timeout: Duration) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let reader = tokio::spawn(read_loop(
            location.to_string(),
            read_half,
            events.clone(),
        ));

        Self {
            location,
            writer: Some(Box::new(write_half)),
            reader: Some(reader),
            events,
            timeout,
        }
    }

    fn label(&self) -> String {
        self.location.to_string()
    }

    fn stop_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop<R>(label: String, mut reader: R, events: broadcast::Sender<StreamEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        buf.reserve(READ_CHUNK);
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                trace!(location = %label, "peer closed the channel");
                break;
            }
            Ok(n) => {
                let data = buf.split().freeze();
                debug!(location = %label, bytes = n, data = ?data, "received");
                // No subscribers is the common case.
                let _ = events.send(StreamEvent::Data(data));
            }
            Err(e) => {
                warn!(location = %label, "channel error: {}", e);
                let _ = events.send(StreamEvent::Error(e.to_string()));
                break;
            }
        }
    }
}

#[async_trait]
impl CommandStream for ChannelStream {
    fn location(&self) -> &Location {
        &self.location
    }

    fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let label = self.label();
        let after = self.timeout;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TransportError::Closed(label.clone()))?;

        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        match timeout(after, write).await {
            Ok(Ok(())) => {
                trace!(location = %label, bytes = bytes.len(), "written");
                Ok(())
            }
            Ok(Err(source)) => Err(TransportError::Write {
                location: label,
                source,
            }),
            Err(_) => Err(TransportError::Timeout {
                location: label,
                operation: "write",
                after,
            }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        let label = self.label();
        let after = self.timeout;

        let shutdown = timeout(after, writer.shutdown()).await;
        // Release the handle even when the graceful shutdown failed.
        drop(writer);
        self.stop_reader();
        trace!(location = %label, "closed");

        match shutdown {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TransportError::Close {
                location: label,
                source,
            }),
            Err(_) => Err(TransportError::Timeout {
                location: label,
                operation: "close",
                after,
            }),
        }
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

impl fmt::Debug for ChannelStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelStream")
            .field("location", &self.location)
            .field("open", &self.writer.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn location() -> Location {
        "ip:127.0.0.1".parse().unwrap()
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (ours, mut theirs) = duplex(64);
        let mut stream = ChannelStream::spawn(location(), ours, Duration::from_secs(1));

        stream.write(b"POWER 01;\r\n").await.unwrap();
        stream.close().await.unwrap();

        let mut received = Vec::new();
        theirs.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"POWER 01;\r\n");
    }

    #[tokio::test]
    async fn test_inbound_bytes_are_published() {
        let (ours, mut theirs) = duplex(64);
        let stream = ChannelStream::spawn(location(), ours, Duration::from_secs(1));
        let mut events = stream.subscribe();

        theirs.write_all(b"OK").await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event, StreamEvent::Data(bytes::Bytes::from_static(b"OK")));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (ours, _theirs) = duplex(64);
        let mut stream = ChannelStream::spawn(location(), ours, Duration::from_secs(1));

        stream.close().await.unwrap();
        // Second close is a no-op.
        stream.close().await.unwrap();

        let result = stream.write(b"x").await;
        assert!(matches!(result, Err(TransportError::Closed(_))));
    }

    #[tokio::test]
    async fn test_write_times_out_when_peer_stalls() {
        // Buffer of 1 byte and nobody reading on the other side.
        let (ours, _theirs) = duplex(1);
        let mut stream = ChannelStream::spawn(location(), ours, Duration::from_millis(50));

        let result = stream.write(b"too many bytes").await;
        assert!(matches!(
            result,
            Err(TransportError::Timeout {
                operation: "write",
                ..
            })
        ));
    }
}
