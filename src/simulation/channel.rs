//! Physics of one simulated output.

use serde::Serialize;

use super::rng::SimRng;
use crate::protocol::status::{CaenChannelStatus, IsegChannelStatus};
use crate::protocol::{CurrentRange, Polarity, PowerDownMode};

/// Deviation between ramp level and target beyond which OVV/UNV are raised.
pub const VOLTAGE_TOLERANCE: f64 = 2.5;

/// Load seen by every output, in MΩ.
const LOAD_MOHM: f64 = 10.0;

/// Flags that are stored; OVV, UNV and MAXV are derived on read.
const STORED: CaenChannelStatus = CaenChannelStatus::ON
    .union(CaenChannelStatus::RUP)
    .union(CaenChannelStatus::RDW)
    .union(CaenChannelStatus::OVC)
    .union(CaenChannelStatus::TRIP)
    .union(CaenChannelStatus::OVP)
    .union(CaenChannelStatus::OVT)
    .union(CaenChannelStatus::DIS)
    .union(CaenChannelStatus::KILL)
    .union(CaenChannelStatus::ILK)
    .union(CaenChannelStatus::NOCAL);

/// Values a client can write. Currents are µA, rates V per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelSetpoint {
    /// `VSET`, V
    pub vset: f64,
    /// `ISET`
    pub iset: f64,
    /// Software voltage limit (`MAXV`)
    pub max_v: f64,
    /// `RUP`
    pub ramp_up_rate: f64,
    /// `RDW`
    pub ramp_down_rate: f64,
    /// Seconds (CAEN `TRIP`).
    pub trip_timeout: f64,
    /// Reaction to a trip or interlock (`PDWN`)
    pub power_down_mode: PowerDownMode,
    /// `IMRANGE`
    pub current_range: CurrentRange,
}

impl Default for ChannelSetpoint {
    fn default() -> Self {
        Self {
            vset: 100.0,
            iset: 0.6,
            max_v: 5500.0,
            ramp_up_rate: 3.0,
            ramp_down_rate: 10.0,
            trip_timeout: 10.0,
            power_down_mode: PowerDownMode::Ramp,
            current_range: CurrentRange::High,
        }
    }
}

/// One output: setpoint, status flags, the hidden ramp level and the last
/// monitored values.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedChannel {
    /// Written values.
    pub setpoint: ChannelSetpoint,
    /// Fixed at construction on real hardware.
    pub polarity: Polarity,
    /// Trip probability per tick while on.
    pub trip_probability: f64,
    flags: CaenChannelStatus,
    /// Voltage the output is currently driven to (effective vset).
    level: f64,
    vmon: f64,
    /// µA.
    imon: f64,
}

impl SimulatedChannel {
    /// An output that is off at 0 V.
    pub fn new(trip_probability: f64) -> Self {
        Self {
            setpoint: ChannelSetpoint::default(),
            polarity: Polarity::Positive,
            trip_probability,
            flags: CaenChannelStatus::empty(),
            level: 0.0,
            vmon: 0.0,
            imon: 0.0,
        }
    }

    /// Noise-free ramp level, V.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Last monitored voltage.
    pub fn vmon(&self) -> f64 {
        self.vmon
    }

    /// Last monitored current.
    pub fn imon(&self) -> f64 {
        self.imon
    }

    /// Output enabled.
    pub fn is_on(&self) -> bool {
        self.flags.contains(CaenChannelStatus::ON)
    }

    /// Trip latched.
    pub fn is_tripped(&self) -> bool {
        self.flags.contains(CaenChannelStatus::TRIP)
    }

    /// Cut by kill.
    pub fn is_killed(&self) -> bool {
        self.flags.contains(CaenChannelStatus::KILL)
    }

    /// Voltage the ramp heads for while on: the setpoint, clamped by `MAXV`.
    pub fn target(&self) -> f64 {
        self.setpoint.vset.min(self.setpoint.max_v)
    }

    /// Enables the output; ramps toward the target on later ticks.
    pub fn turn_on(&mut self) {
        self.flags.remove(CaenChannelStatus::TRIP | CaenChannelStatus::KILL | CaenChannelStatus::ILK);
        self.flags.insert(CaenChannelStatus::ON);
    }

    /// Disables the output.
    pub fn turn_off(&mut self) {
        self.flags.remove(
            CaenChannelStatus::ON
                | CaenChannelStatus::TRIP
                | CaenChannelStatus::KILL
                | CaenChannelStatus::ILK,
        );
    }

    /// Emergency off: cut the output without ramping.
    pub fn kill(&mut self) {
        self.flags.remove(CaenChannelStatus::ON | CaenChannelStatus::RUP | CaenChannelStatus::RDW);
        self.flags.insert(CaenChannelStatus::KILL);
        self.zero_output();
    }

    /// Clears the kill flag.
    pub fn clear_kill(&mut self) {
        self.flags.remove(CaenChannelStatus::KILL);
    }

    /// Clears trip, interlock and kill flags.
    pub fn clear_alarms(&mut self) {
        self.flags.remove(CaenChannelStatus::TRIP | CaenChannelStatus::ILK);
    }

    /// Asserts the interlock; takes effect on the next tick.
    pub fn set_interlocked(&mut self) {
        self.flags.insert(CaenChannelStatus::ILK);
    }

    /// Sets or clears the hardware disable flag.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.flags.set(CaenChannelStatus::DIS, disabled);
    }

    /// Status register in CAEN layout, with OVV/UNV/MAXV derived from the
    /// current level and setpoint.
    pub fn status(&self) -> CaenChannelStatus {
        let mut status = self.flags & STORED;
        let on = self.is_on();
        let target = self.target();
        status.set(
            CaenChannelStatus::OVV,
            on && self.level > target + VOLTAGE_TOLERANCE,
        );
        status.set(
            CaenChannelStatus::UNV,
            on && self.level < target - VOLTAGE_TOLERANCE,
        );
        status.set(
            CaenChannelStatus::MAXV,
            self.setpoint.vset > self.setpoint.max_v,
        );
        status
    }

    /// The same state in the iseg channel register layout.
    pub fn iseg_status(&self) -> IsegChannelStatus {
        let caen = self.status();
        let mut status = IsegChannelStatus::empty();
        status.set(IsegChannelStatus::POSITIVE, self.polarity == Polarity::Positive);
        status.set(IsegChannelStatus::ON, caen.contains(CaenChannelStatus::ON));
        status.set(
            IsegChannelStatus::RAMPING,
            caen.intersects(CaenChannelStatus::RUP | CaenChannelStatus::RDW),
        );
        status.set(IsegChannelStatus::EMERGENCY_OFF, caen.contains(CaenChannelStatus::KILL));
        status.set(
            IsegChannelStatus::CONSTANT_VOLTAGE,
            caen.contains(CaenChannelStatus::ON)
                && !caen.intersects(
                    CaenChannelStatus::RUP
                        | CaenChannelStatus::RDW
                        | CaenChannelStatus::OVV
                        | CaenChannelStatus::UNV,
                ),
        );
        status.set(
            IsegChannelStatus::LOW_CURRENT_RANGE,
            self.setpoint.current_range == CurrentRange::Low,
        );
        status.set(
            IsegChannelStatus::VOLTAGE_BOUNDS,
            caen.intersects(CaenChannelStatus::OVV | CaenChannelStatus::UNV),
        );
        status.set(IsegChannelStatus::EXTERNAL_INHIBIT, caen.contains(CaenChannelStatus::ILK));
        status.set(IsegChannelStatus::CURRENT_TRIP, caen.contains(CaenChannelStatus::TRIP));
        status.set(IsegChannelStatus::VOLTAGE_LIMIT, caen.contains(CaenChannelStatus::MAXV));
        status.set(IsegChannelStatus::INPUT_ERROR, caen.contains(CaenChannelStatus::NOCAL));
        status
    }

    /// Advances the channel by one tick and returns the new state.
    pub fn tick(&self, rng: &mut SimRng) -> Self {
        let mut next = self.clone();
        next.advance(rng);
        next
    }

    fn advance(&mut self, rng: &mut SimRng) {
        if self.flags.intersects(CaenChannelStatus::KILL | CaenChannelStatus::DIS) {
            self.flags.remove(CaenChannelStatus::ON | CaenChannelStatus::RUP | CaenChannelStatus::RDW);
            self.zero_output();
            return;
        }

        if self.flags.intersects(CaenChannelStatus::TRIP | CaenChannelStatus::ILK) {
            self.flags.remove(CaenChannelStatus::ON);
            if self.setpoint.power_down_mode == PowerDownMode::Kill {
                self.kill();
                return;
            }
        }

        self.vmon = rng.gauss(self.level, self.level / 300.0);
        // V / MΩ = µA, with a 10 % spread.
        let mean = self.vmon / LOAD_MOHM;
        self.imon = rng.gauss(mean, mean.abs() / 10.0);

        if !self.is_on() {
            self.flags.remove(CaenChannelStatus::RUP);
            self.level -= self.setpoint.ramp_down_rate;
            self.imon = -self.imon * 10.0;
            if self.level <= 0.0 {
                self.flags.remove(CaenChannelStatus::RDW);
                self.zero_output();
            } else {
                self.flags.insert(CaenChannelStatus::RDW);
            }
            return;
        }

        if !self.is_tripped() && rng.chance(self.trip_probability) {
            self.flags.insert(CaenChannelStatus::TRIP);
        }

        let target = self.target();
        if self.level < target {
            self.flags.insert(CaenChannelStatus::RUP);
            self.flags.remove(CaenChannelStatus::RDW);
            self.level = (self.level + self.setpoint.ramp_up_rate).min(target);
            self.imon *= 10.0;
        } else if self.level > target {
            self.flags.insert(CaenChannelStatus::RDW);
            self.flags.remove(CaenChannelStatus::RUP);
            self.level = (self.level - self.setpoint.ramp_down_rate).max(target);
            self.imon *= -10.0;
        } else {
            self.flags.remove(CaenChannelStatus::RUP | CaenChannelStatus::RDW);
        }
    }

    fn zero_output(&mut self) {
        self.level = 0.0;
        self.vmon = 0.0;
        self.imon = 0.0;
    }
}
