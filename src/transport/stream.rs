use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use super::Link;
use crate::error::{HvpsError, Result};

/// Any async byte stream a [`StreamLink`] can drive: serial ports, TCP
/// sockets, in-memory duplex pipes, scripted mocks.
pub trait StreamIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> StreamIO for T {}

/// Type-erased stream, for callers that pick the backend at runtime.
pub type DynStream = Box<dyn StreamIO>;

/// [`Link`] over a buffered async byte stream.
#[derive(Debug)]
pub struct StreamLink<S> {
    stream: BufReader<S>,
    open: bool,
}

impl<S: StreamIO> StreamLink<S> {
    /// Wraps `stream`; the link starts open.
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            open: true,
        }
    }

    /// Gives the underlying stream back.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

#[async_trait]
impl<S: StreamIO> Link for StreamLink<S> {
    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        let port = self.stream.get_mut();
        port.write_all(frame).await?;
        port.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let read = tokio::time::timeout(timeout, self.stream.read_until(b'\n', &mut line))
            .await
            .map_err(|_| HvpsError::Timeout(timeout))??;
        if read == 0 {
            debug!("stream reached end of file");
            self.open = false;
        }
        Ok(line)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn discard_input(&mut self, settle: Duration) -> Result<usize> {
        let mut dropped = 0;
        loop {
            let available = match tokio::time::timeout(settle, self.stream.fill_buf()).await {
                Err(_) => break,
                Ok(buf) => buf?.len(),
            };
            if available == 0 {
                debug!("stream reached end of file");
                self.open = false;
                break;
            }
            self.stream.consume(available);
            dropped += available;
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_one_line_at_a_time() {
        let mock = tokio_test::io::Builder::new()
            .read(b"first\r\nsecond\r\n")
            .build();
        let mut link = StreamLink::new(mock);
        let timeout = Duration::from_millis(100);

        assert_eq!(link.read_line(timeout).await.unwrap(), b"first\r\n");
        assert_eq!(link.read_line(timeout).await.unwrap(), b"second\r\n");
        assert!(link.is_open());
    }

    #[tokio::test]
    async fn test_eof_closes_link() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut link = StreamLink::new(client);

        let line = link.read_line(Duration::from_millis(100)).await.unwrap();
        assert!(line.is_empty());
        assert!(!link.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_buffered_and_late_input() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut link = StreamLink::new(client);
        server.write_all(b"old\r\nreply\r\n").await.unwrap();

        // pull one line so the rest sits in the read buffer
        let timeout = Duration::from_millis(100);
        assert_eq!(link.read_line(timeout).await.unwrap(), b"old\r\n");

        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            server.write_all(b"late\r\n").await.unwrap();
            server
        });
        let dropped = link.discard_input(timeout).await.unwrap();
        assert_eq!(dropped, b"reply\r\nlate\r\n".len());
        assert!(link.is_open());

        let mut server = late.await.unwrap();
        server.write_all(b"fresh\r\n").await.unwrap();
        assert_eq!(link.read_line(timeout).await.unwrap(), b"fresh\r\n");
    }

    #[tokio::test]
    async fn test_discard_on_quiet_line_is_a_no_op() {
        let (client, _server) = tokio::io::duplex(64);
        let mut link = StreamLink::new(client);
        assert_eq!(link.discard_input(Duration::from_millis(10)).await.unwrap(), 0);
        assert!(link.is_open());
    }

    #[tokio::test]
    async fn test_boxed_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut link = StreamLink::new(Box::new(client) as DynStream);

        link.write(b"ping\r\n").await.unwrap();
        let mut buf = [0u8; 6];
        tokio::io::AsyncReadExt::read_exact(&mut server, &mut buf)
            .await
            .unwrap();
        assert_eq!(&buf, b"ping\r\n");
    }
}
