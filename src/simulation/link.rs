use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::engine::SimulationEngine;
use crate::error::{HvpsError, Result};
use crate::transport::Link;

/// [`Link`] whose far end is a [`SimulationEngine`].
///
/// Each written frame is answered immediately; the reply lines queue up
/// until read. A frame the device ignores leaves the queue empty, so the
/// next read waits out its timeout exactly like a silent serial line.
#[derive(Debug)]
pub struct SimulatedLink {
    engine: SimulationEngine,
    pending: VecDeque<Vec<u8>>,
    open: bool,
}

impl SimulatedLink {
    /// Connects a fresh link to `engine`.
    pub fn new(engine: SimulationEngine) -> Self {
        Self {
            engine,
            pending: VecDeque::new(),
            open: true,
        }
    }

    /// The simulator behind this link.
    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Makes every later exchange fail with `LinkClosed`.
    pub fn close(&mut self) {
        self.open = false;
        self.pending.clear();
    }
}

#[async_trait]
impl Link for SimulatedLink {
    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        if !self.open {
            return Err(HvpsError::LinkClosed);
        }
        // A new request discards whatever the previous one left unread.
        self.pending.clear();
        if let Some(reply) = self.engine.respond(frame).await {
            self.pending.extend(
                reply
                    .split_inclusive(|b| *b == b'\n')
                    .map(<[u8]>::to_vec),
            );
        }
        trace!(lines = self.pending.len(), "simulated reply queued");
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        match self.pending.pop_front() {
            Some(line) => Ok(line),
            None => {
                tokio::time::sleep(timeout).await;
                Err(HvpsError::Timeout(timeout))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn discard_input(&mut self, _settle: Duration) -> Result<usize> {
        let dropped = self.pending.iter().map(Vec::len).sum();
        self.pending.clear();
        Ok(dropped)
    }
}
