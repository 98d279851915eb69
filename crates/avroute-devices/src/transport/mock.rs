//! In-memory transport for unit and integration tests.
//!
//! [`MockTransport`] records every open, write and close so tests can assert
//! the exact bytes a driver sent, or that no I/O happened at all.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use super::{CommandStream, CommandTransport, Result, StreamEvent, TransportError, TransportOptions};
use crate::location::Location;

#[derive(Debug, Default)]
struct Recorded {
    opens: Vec<(Location, TransportOptions)>,
    writes: Vec<(Location, Vec<u8>)>,
    closes: usize,
    fail_open: Option<io::ErrorKind>,
    fail_write: Option<io::ErrorKind>,
    fail_close: Option<io::ErrorKind>,
    replies: Vec<Bytes>,
}

/// A recording [`CommandTransport`].
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<Recorded>>,
}

impl MockTransport {
    /// Creates a transport where every operation succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent open fail with `kind`.
    pub fn fail_opens(&self, kind: io::ErrorKind) {
        self.state().fail_open = Some(kind);
    }

    /// Make every subsequent write fail with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        self.state().fail_write = Some(kind);
    }

    /// Make every subsequent close fail with `kind`.
    pub fn fail_closes(&self, kind: io::ErrorKind) {
        self.state().fail_close = Some(kind);
    }

    /// Bytes each opened stream publishes as inbound data right after a write.
    pub fn reply_with(&self, data: impl Into<Bytes>) {
        self.state().replies.push(data.into());
    }

    /// Number of open attempts, including failed ones.
    pub fn open_count(&self) -> usize {
        self.state().opens.len()
    }

    /// Number of completed closes.
    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    /// Locations passed to `open`, in order.
    pub fn opened_locations(&self) -> Vec<Location> {
        self.state().opens.iter().map(|(l, _)| l.clone()).collect()
    }

    /// Options passed to the most recent `open`.
    pub fn last_options(&self) -> Option<TransportOptions> {
        self.state().opens.last().map(|(_, o)| o.clone())
    }

    /// Payloads of every write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.iter().map(|(_, w)| w.clone()).collect()
    }

    /// All written bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state()
            .writes
            .iter()
            .flat_map(|(_, w)| w.iter().copied())
            .collect()
    }

    /// Forget everything recorded so far. Injected failures are kept.
    pub fn clear(&self) {
        let mut state = self.state();
        state.opens.clear();
        state.writes.clear();
        state.closes = 0;
    }
}

#[async_trait]
impl CommandTransport for MockTransport {
    async fn open(
        &self,
        location: &Location,
        options: &TransportOptions,
    ) -> Result<Box<dyn CommandStream>> {
        let mut state = self.state();
        state.opens.push((location.clone(), options.clone()));
        if let Some(kind) = state.fail_open {
            return Err(TransportError::Open {
                location: location.to_string(),
                source: io::Error::new(kind, "injected open failure"),
            });
        }
        drop(state);

        let (events, _) = broadcast::channel(16);
        Ok(Box::new(MockStream {
            location: location.clone(),
            transport: self.clone(),
            events,
            open: true,
        }))
    }
}

/// Stream handed out by [`MockTransport`].
#[derive(Debug)]
pub struct MockStream {
    location: Location,
    transport: MockTransport,
    events: broadcast::Sender<StreamEvent>,
    open: bool,
}

#[async_trait]
impl CommandStream for MockStream {
    fn location(&self) -> &Location {
        &self.location
    }

    fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(TransportError::Closed(self.location.to_string()));
        }
        let replies = {
            let mut state = self.transport.state();
            state.writes.push((self.location.clone(), bytes.to_vec()));
            if let Some(kind) = state.fail_write {
                return Err(TransportError::Write {
                    location: self.location.to_string(),
                    source: io::Error::new(kind, "injected write failure"),
                });
            }
            state.replies.clone()
        };
        for reply in replies {
            let _ = self.events.send(StreamEvent::Data(reply));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut state = self.transport.state();
        state.closes += 1;
        match state.fail_close {
            Some(kind) => Err(TransportError::Close {
                location: self.location.to_string(),
                source: io::Error::new(kind, "injected close failure"),
            }),
            None => Ok(()),
        }
    }
}
