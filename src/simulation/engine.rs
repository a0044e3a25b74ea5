//! Shared, ticking simulation state.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::module::SimulatedModule;
use super::rng::SimRng;
use crate::protocol::codec::{codec, DeviceReply, Request};
use crate::protocol::Brand;

/// Construction parameters of a [`SimulationEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    /// Protocol the module speaks.
    pub brand: Brand,
    /// Board address the module answers to. iseg frames carry none, so iseg
    /// modules always sit at 0.
    pub board: u8,
    /// Number of channels.
    pub channels: usize,
    /// Probability that at least one channel trips in a tick.
    pub trip_probability: f64,
    /// `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Period of [`SimulationEngine::spawn_ticker`].
    pub tick_interval: Duration,
}

impl SimulationOptions {
    /// Four channels, board 0, no trips, one tick per second.
    pub fn new(brand: Brand) -> Self {
        Self {
            brand,
            board: 0,
            channels: 4,
            trip_probability: 0.0,
            seed: None,
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Sets the board address.
    pub fn with_board(mut self, board: u8) -> Self {
        self.board = board;
        self
    }

    /// Sets the channel count.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the per-tick module trip probability.
    pub fn with_trip_probability(mut self, probability: f64) -> Self {
        self.trip_probability = probability;
        self
    }

    /// Fixes the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the ticker period.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

#[derive(Debug)]
struct State {
    module: SimulatedModule,
    rng: SimRng,
    ticks: u64,
}

#[derive(Debug)]
struct Shared {
    options: SimulationOptions,
    state: RwLock<State>,
}

/// A simulated module behind a lock, advanced by [`tick`](Self::tick) or by
/// the background task from [`spawn_ticker`](Self::spawn_ticker).
///
/// Ticks and requests are mutually exclusive; a request always sees the
/// last committed tick. Clones share the same module.
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    shared: Arc<Shared>,
}

impl SimulationEngine {
    /// Builds the module and initializes it with brand defaults.
    pub fn new(options: SimulationOptions) -> Self {
        let board = match options.brand {
            Brand::Caen => options.board,
            Brand::Iseg => 0,
        };
        let module = SimulatedModule::new(
            options.brand,
            board,
            options.channels,
            options.trip_probability,
        );
        info!(
            brand = %options.brand,
            board,
            channels = options.channels,
            seed = ?options.seed,
            "simulation engine created"
        );
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    module,
                    rng: SimRng::new(options.seed),
                    ticks: 0,
                }),
                options,
            }),
        }
    }

    /// Protocol of the simulated module.
    pub fn brand(&self) -> Brand {
        self.shared.options.brand
    }

    /// Options the engine was built with.
    pub fn options(&self) -> &SimulationOptions {
        &self.shared.options
    }

    /// Advances the module by one tick.
    pub async fn tick(&self) {
        let mut state = self.shared.state.write().await;
        let State { module, rng, ticks } = &mut *state;
        *module = module.tick(rng);
        *ticks += 1;
        trace!(ticks = *ticks, "simulation tick");
    }

    /// Number of ticks committed so far.
    pub async fn ticks(&self) -> u64 {
        self.shared.state.read().await.ticks
    }

    /// A copy of the current module state.
    pub async fn snapshot(&self) -> SimulatedModule {
        self.shared.state.read().await.module.clone()
    }

    /// Runs `f` on the module under the write lock, for fault injection in
    /// tests and demos.
    pub async fn with_module<R>(&self, f: impl FnOnce(&mut SimulatedModule) -> R) -> R {
        let mut state = self.shared.state.write().await;
        f(&mut state.module)
    }

    /// Serves a decoded request.
    pub async fn handle(&self, request: &Request) -> Option<DeviceReply> {
        self.shared.state.write().await.module.handle(request)
    }

    /// Serves a raw request frame and returns the raw reply, or `None` when
    /// the device would stay silent (malformed frame or foreign board).
    pub async fn respond(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let codec = codec(self.brand());
        let request = match codec.decode_request(frame) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "unreadable request frame dropped");
                return None;
            }
        };
        let reply = self.handle(&request).await?;
        Some(codec.encode_reply(&request, &reply))
    }

    /// Ticks at the configured interval until every engine handle is dropped.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let period = self.shared.options.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                SimulationEngine { shared }.tick().await;
            }
            debug!("simulation ticker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_tick_counts() {
        let engine = SimulationEngine::new(SimulationOptions::new(Brand::Caen).with_seed(1));
        engine.tick().await;
        engine.tick().await;
        assert_eq!(engine.ticks().await, 2);
    }

    #[tokio::test]
    async fn test_respond_to_raw_frame() {
        let engine = SimulationEngine::new(SimulationOptions::new(Brand::Caen).with_board(2));
        let reply = engine.respond(b"$BD:02,CMD:MON,PAR:BDNCH\r\n").await.unwrap();
        assert_eq!(reply, b"#BD:02,CMD:OK,VAL:4\r\n");
        assert!(engine.respond(b"$BD:01,CMD:MON,PAR:BDNCH\r\n").await.is_none());
        assert!(engine.respond(b"garbage\r\n").await.is_none());
    }

    #[tokio::test]
    async fn test_iseg_always_board_zero() {
        let engine = SimulationEngine::new(SimulationOptions::new(Brand::Iseg).with_board(5));
        let reply = engine.respond(b":READ:MODULE:CHANNELNUMBER?\r\n").await.unwrap();
        assert_eq!(reply, b":READ:MODULE:CHANNELNUMBER?\r\n4\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_advances_and_stops() {
        let engine = SimulationEngine::new(
            SimulationOptions::new(Brand::Caen).with_tick_interval(Duration::from_millis(100)),
        );
        let ticker = engine.spawn_ticker();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(engine.ticks().await >= 3);

        drop(engine);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ticker.is_finished());
    }
}
