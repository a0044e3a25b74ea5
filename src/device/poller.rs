use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use super::channel::Channel;
use crate::error::Result;
use crate::protocol::status::ChannelStatus;

/// Debounced status reads for periodic refresh loops.
///
/// A poll that starts while the previous one is still waiting on the link
/// is skipped instead of queueing behind it, so a slow link never builds a
/// backlog of stale status requests.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    channel: Channel,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag even if the poll future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl StatusPoller {
    /// Poller for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The polled channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Whether a poll is waiting on the link.
    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Reads the channel status, or returns `None` without touching the link
    /// if a poll is already in flight.
    pub async fn poll(&self) -> Option<Result<ChannelStatus>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            trace!(channel = self.channel.index(), "status poll skipped");
            return None;
        }
        let _guard = InFlight(&self.in_flight);
        Some(self.channel.status().await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::simulation::{SimulatedLink, SimulationEngine, SimulationOptions};
    use crate::{Brand, Hvps};

    #[tokio::test]
    async fn test_overlapping_poll_is_skipped() {
        let engine = SimulationEngine::new(SimulationOptions::new(Brand::Caen));
        let hvps = Hvps::new(Brand::Caen, SimulatedLink::new(engine), Duration::from_millis(50));
        let channel = hvps.module(0).await.unwrap().channel(0).await.unwrap();
        let poller = StatusPoller::new(channel);

        let (first, second) = tokio::join!(poller.poll(), poller.poll());
        assert!(first.unwrap().is_ok());
        assert!(second.is_none());
        assert!(!poller.is_polling());

        assert!(poller.poll().await.is_some());
    }
}
