//! Serialized request/reply exchange over one physical link.
//!
//! The wire is half-duplex and replies carry no request identifier (iseg
//! replies carry no address at all), so a request must be written and its
//! reply fully read before the next request may start. [`Transport`]
//! enforces that structurally: one worker task owns the [`Link`] and serves a
//! queue of `(frame, reply_lines, reply_channel)` requests in order. Every
//! module and channel handle shares the same `Arc<Transport>`, so there is no
//! way to reach the link except through that queue.
//!
//! A missing reply surfaces as [`HvpsError::Timeout`]. Nothing is retried.
//! A reply that arrives after its deadline would otherwise be read as the
//! answer to the next request, so after a failed exchange the worker marks
//! the link stale and discards input until the line has been quiet for one
//! timeout before it writes again.

mod stream;

#[cfg(feature = "tokio_serial")]
mod serial;

pub use stream::{DynStream, StreamLink, StreamIO};

#[cfg(feature = "tokio_serial")]
pub use serial::SerialLinkBuilder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

use crate::error::{HvpsError, Result};

/// Default per-line read deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Capacity of the request queue before callers start waiting.
const QUEUE_CAPACITY: usize = 32;

/// A byte-stream endpoint: write a frame, read newline-terminated lines.
#[async_trait]
pub trait Link: Send {
    /// Writes the whole frame.
    async fn write(&mut self, frame: &[u8]) -> Result<()>;

    /// Reads one line including its terminator.
    ///
    /// Returns an empty vector at end of stream.
    ///
    /// # Errors
    /// `Timeout` if no complete line arrives within `timeout`.
    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Whether the endpoint can still carry traffic.
    fn is_open(&self) -> bool;

    /// Throws away unread input until nothing has arrived for `settle`, and
    /// returns the number of bytes dropped.
    ///
    /// Links that never hold input between exchanges keep the default.
    async fn discard_input(&mut self, _settle: Duration) -> Result<usize> {
        Ok(0)
    }
}

#[async_trait]
impl<L: Link + ?Sized> Link for Box<L> {
    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        (**self).write(frame).await
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_line(timeout).await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn discard_input(&mut self, settle: Duration) -> Result<usize> {
        (**self).discard_input(settle).await
    }
}

struct Exchange {
    frame: Vec<u8>,
    reply_lines: usize,
    reply: oneshot::Sender<Result<Vec<u8>>>,
}

/// Handle to the worker that owns a link.
///
/// Share it behind an `Arc`. Dropping the last handle closes the queue; the
/// worker finishes what is queued and stops.
#[derive(Debug)]
pub struct Transport {
    queue: mpsc::Sender<Exchange>,
    timeout: Duration,
    /// Set when the link may hold input that belongs to an earlier request.
    stale: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl Transport {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// # Arguments
    /// * `link` - Endpoint the worker takes exclusive ownership of
    /// * `timeout` - Deadline for each reply line
    pub fn spawn<L: Link + 'static>(link: L, timeout: Duration) -> Self {
        let (queue, rx) = mpsc::channel(QUEUE_CAPACITY);
        let stale = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(run_worker(link, rx, timeout, Arc::clone(&stale)));
        Self {
            queue,
            timeout,
            stale,
            worker,
        }
    }

    /// Per-line read deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Makes the worker resynchronize the link before the next write.
    ///
    /// Callers use this when a reply arrived but did not belong to the
    /// request (wrong echo, wrong board).
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Whether the worker is still accepting requests.
    pub fn is_running(&self) -> bool {
        !self.queue.is_closed() && !self.worker.is_finished()
    }

    /// Writes `frame` and returns the next `reply_lines` lines, concatenated.
    ///
    /// Exchanges are served strictly one at a time in submission order.
    ///
    /// # Errors
    /// `Timeout` when a line does not arrive in time, `LinkClosed` when the
    /// link or the worker is gone, `Io` for stream failures.
    #[instrument(skip(self, frame), fields(bytes = frame.len()), err)]
    pub async fn exchange(&self, frame: Vec<u8>, reply_lines: usize) -> Result<Vec<u8>> {
        let (reply, rx) = oneshot::channel();
        self.queue
            .send(Exchange {
                frame,
                reply_lines,
                reply,
            })
            .await
            .map_err(|_| HvpsError::LinkClosed)?;
        rx.await.map_err(|_| HvpsError::LinkClosed)?
    }
}

async fn run_worker<L: Link>(
    mut link: L,
    mut rx: mpsc::Receiver<Exchange>,
    timeout: Duration,
    stale: Arc<AtomicBool>,
) {
    debug!(?timeout, "transport worker started");
    while let Some(request) = rx.recv().await {
        let result = match resync(&mut link, &stale, timeout).await {
            Ok(()) => serve(&mut link, &request.frame, request.reply_lines, timeout).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(error = %e, "exchange failed");
            if !matches!(e, HvpsError::LinkClosed) {
                stale.store(true, Ordering::SeqCst);
            }
        }
        // The caller may have given up waiting. A failed exchange has
        // already marked the link stale for the next one.
        let _ = request.reply.send(result);
    }
    debug!("transport worker stopped");
}

async fn resync<L: Link>(link: &mut L, stale: &AtomicBool, settle: Duration) -> Result<()> {
    if !stale.swap(false, Ordering::SeqCst) || !link.is_open() {
        return Ok(());
    }
    let dropped = link.discard_input(settle).await?;
    debug!(dropped, "stale input discarded");
    Ok(())
}

async fn serve<L: Link>(
    link: &mut L,
    frame: &[u8],
    reply_lines: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    if !link.is_open() {
        return Err(HvpsError::LinkClosed);
    }

    trace!(frame = %String::from_utf8_lossy(frame).trim_end(), "write");
    link.write(frame).await?;

    let mut reply = Vec::new();
    for _ in 0..reply_lines {
        let line = link.read_line(timeout).await?;
        if line.is_empty() {
            break;
        }
        trace!(line = %String::from_utf8_lossy(&line).trim_end(), "read");
        reply.extend_from_slice(&line);
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_over_scripted_stream() {
        let mock = tokio_test::io::Builder::new()
            .write(b"$BD:00,CMD:MON,PAR:BDNAME\r\n")
            .read(b"#BD:00,CMD:OK,VAL:N1471\r\n")
            .build();
        let transport = Transport::spawn(StreamLink::new(mock), Duration::from_millis(200));

        let reply = transport
            .exchange(b"$BD:00,CMD:MON,PAR:BDNAME\r\n".to_vec(), 1)
            .await
            .unwrap();
        assert_eq!(reply, b"#BD:00,CMD:OK,VAL:N1471\r\n");
    }

    #[tokio::test]
    async fn test_two_line_reply() {
        let mock = tokio_test::io::Builder::new()
            .write(b":MEAS:VOLT? (@0)\r\n")
            .read(b":MEAS:VOLT? (@0)\r\n1.0E2V\r\n")
            .build();
        let transport = Transport::spawn(StreamLink::new(mock), Duration::from_millis(200));

        let reply = transport
            .exchange(b":MEAS:VOLT? (@0)\r\n".to_vec(), 2)
            .await
            .unwrap();
        assert_eq!(reply, b":MEAS:VOLT? (@0)\r\n1.0E2V\r\n");
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        let mock = tokio_test::io::Builder::new()
            .write(b"$BD:00,CMD:MON,PAR:BDNAME\r\n")
            .wait(Duration::from_millis(500))
            .build();
        let transport = Transport::spawn(StreamLink::new(mock), Duration::from_millis(50));

        let err = transport
            .exchange(b"$BD:00,CMD:MON,PAR:BDNAME\r\n".to_vec(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, HvpsError::Timeout(_)));
    }
}
