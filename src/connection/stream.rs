//! Blocking byte-stream adapters of a connection.
//!
//! The `StreamBridge` is a single-producer/single-consumer hand-off between
//! the layer delivering data and an application thread reading an
//! [`InputStream`]:
//!
//! ```text
//! layer ──push──► [accumulator] ──swap on read──► [window] ──► InputStream::read
//!                      │ condvar
//!                      └─ close() wakes every waiting reader
//! ```
//!
//! Once the shared window is consumed, a reader waits until the accumulator
//! holds data, then swaps it for a fresh one and reads from the swapped-out
//! bytes. Two producer appends are never torn apart, and the history is not
//! copied on each read. Both halves count as available.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};

use super::Payload;
use crate::layer::PeerLink;

struct Accumulator {
    buffer: BytesMut,
    /// Swapped-out bytes not yet handed to a reader
    window: Bytes,
    closed: bool,
}

/// Condvar-guarded byte accumulator
pub(crate) struct StreamBridge {
    state: Mutex<Accumulator>,
    ready: Condvar,
    initial_capacity: usize,
}

impl StreamBridge {
    pub(crate) fn new(initial_capacity: usize) -> Self {
        Self {
            state: Mutex::new(Accumulator {
                buffer: BytesMut::with_capacity(initial_capacity),
                window: Bytes::new(),
                closed: false,
            }),
            ready: Condvar::new(),
            initial_capacity,
        }
    }

    /// Append data and wake a reader; returns `false` once closed.
    pub(crate) fn push(&self, data: &[u8]) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }

        state.buffer.extend_from_slice(data);
        drop(state);
        self.ready.notify_all();
        true
    }

    /// Bytes readable without blocking
    pub(crate) fn available(&self) -> usize {
        let state = self.state.lock();
        state.window.len() + state.buffer.len()
    }

    /// Copy up to `buf.len()` bytes out, waiting for data if none is buffered.
    ///
    /// Returns `Ok(0)` at end of stream, i.e. closed and drained.
    pub(crate) fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        while state.window.is_empty() && state.buffer.is_empty() && !state.closed {
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out()
                        && state.window.is_empty()
                        && state.buffer.is_empty()
                        && !state.closed
                    {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "no stream data before deadline",
                        ));
                    }
                },
                None => self.ready.wait(&mut state),
            }
        }

        if state.window.is_empty() {
            if state.buffer.is_empty() {
                return Ok(0);
            }
            let fresh = BytesMut::with_capacity(self.initial_capacity);
            state.window = std::mem::replace(&mut state.buffer, fresh).freeze();
        }

        let n = buf.len().min(state.window.len());
        buf[..n].copy_from_slice(&state.window[..n]);
        state.window.advance(n);
        Ok(n)
    }

    /// Mark end of stream and wake all readers
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }
}

/// Blocking reader over the data a connection receives.
///
/// Buffered bytes stay readable after the connection closed; afterwards reads
/// return `Ok(0)`.
pub struct InputStream {
    bridge: Arc<StreamBridge>,
}

impl InputStream {
    pub(crate) fn new(bridge: Arc<StreamBridge>) -> Self {
        Self { bridge }
    }

    /// Bytes readable without blocking
    pub fn available(&self) -> usize {
        self.bridge.available()
    }

    /// Like [`Read::read`], but fails with `TimedOut` after `timeout`
    pub fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.read_with(buf, Some(timeout))
    }

    fn read_with(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.bridge.read(buf, timeout)
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_with(buf, None)
    }
}

/// Writer funnelling bytes to the peer of a connection.
///
/// Each write copies the caller's slice before handing it to the layer.
pub struct OutputStream {
    link: Arc<dyn PeerLink>,
    closed: Arc<AtomicBool>,
}

impl OutputStream {
    pub(crate) fn new(link: Arc<dyn PeerLink>, closed: Arc<AtomicBool>) -> Self {
        Self { link, closed }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) || !self.link.is_connected() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection is broken"));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        self.link
            .send_data_to_peer(Payload::Bytes(Bytes::copy_from_slice(buf)))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
