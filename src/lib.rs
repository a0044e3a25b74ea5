//! # hvps
//!
//! Control of CAEN and iseg high-voltage power supplies over a half-duplex
//! serial link, plus a software simulator that answers the same wire protocol.
//!
//! ## Crate Structure
//!
//! - **`protocol`**: Static command tables, the input/output validator, the
//!   per-brand frame codecs and the status register decoders. Pure, no I/O.
//! - **`transport`**: The `Link` byte-stream contract and the `Transport`
//!   worker that serializes every request/reply exchange on one link.
//! - **`device`**: `Hvps` → `Module` → `Channel` handles. Generic `get`/`set`
//!   plus typed accessors layered on top of them.
//! - **`simulation`**: A stochastic ramp/trip model of a module, driven by a
//!   fixed tick and reachable through `SimulatedLink`.
//! - **`config`**: Figment-based configuration (TOML file + `HVPS_` env vars).
//! - **`logging`**: `tracing-subscriber` initialization.
//! - **`error`**: The `HvpsError` enum shared by every layer.
//!
//! ## Example
//! ```no_run
//! use hvps::{simulation::{SimulatedLink, SimulationEngine, SimulationOptions}, Brand, Hvps};
//! use std::time::Duration;
//!
//! # async fn run() -> hvps::Result<()> {
//! let engine = SimulationEngine::new(SimulationOptions::new(Brand::Caen));
//! let _ticker = engine.spawn_ticker();
//! let hvps = Hvps::new(Brand::Caen, SimulatedLink::new(engine), Duration::from_millis(500));
//!
//! let module = hvps.module(0).await?;
//! let channel = module.channel(1).await?;
//! channel.set_voltage(250.0).await?;
//! channel.turn_on().await?;
//! println!("{:?}", channel.status().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod simulation;
pub mod transport;

pub use device::{Channel, Hvps, Module, StatusPoller};
pub use error::{HvpsError, Result};
pub use protocol::{Address, Brand, Direction, Entity, Value};
