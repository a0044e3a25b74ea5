//! Software stand-in for a CAEN or iseg module.
//!
//! The simulator speaks the same wire protocol as the hardware: a
//! [`SimulatedLink`] hands each request frame to a [`SimulationEngine`],
//! which decodes it with the brand's codec, runs it against a
//! [`SimulatedModule`] and encodes the reply. Every client-side layer
//! (validation, encoding, transport, decoding) is therefore exercised
//! unchanged.
//!
//! # Model
//!
//! Each channel holds a hidden ramp level that moves toward the (MAXV
//! clamped) voltage setpoint by at most the ramp rate per tick. Monitored
//! voltage is Gaussian noise around that level; monitored current is noise
//! around `level / 10 MΩ`, amplified and sign-flipped while ramping down.
//! Trips are drawn per tick; a trip latches the module alarm, which
//! interlocks every channel until the alarm is cleared. Channels in `KILL`
//! power-down mode drop to zero at once; in `RAMP` mode they ramp down.
//!
//! State transitions are pure (`tick(&self, rng) -> Self`), so a seeded
//! [`SimRng`] replays a run exactly.
//!
//! # Example
//!
//! ```
//! use hvps::simulation::{SimulationEngine, SimulationOptions};
//! use hvps::Brand;
//!
//! # tokio_test::block_on(async {
//! let engine = SimulationEngine::new(SimulationOptions::new(Brand::Caen).with_seed(7));
//! let reply = engine.respond(b"$BD:00,CMD:MON,PAR:BDNAME\r\n").await;
//! assert_eq!(reply.as_deref(), Some(&b"#BD:00,CMD:OK,VAL:N1471H SIMULATOR\r\n"[..]));
//! # });
//! ```

mod caen;
mod channel;
mod engine;
mod firmware;
mod iseg;
mod link;
mod module;
mod rng;

pub use channel::{ChannelSetpoint, SimulatedChannel, VOLTAGE_TOLERANCE};
pub use engine::{SimulationEngine, SimulationOptions};
pub use link::SimulatedLink;
pub use module::{channel_trip_probability, SimulatedModule};
pub use rng::SimRng;
