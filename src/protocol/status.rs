//! Status register decoding.
//!
//! Registers arrive as plain integers and are read as little-endian bit
//! vectors: bit 0 is the least significant bit. Each brand gets a `bitflags`
//! type mirroring its register layout; [`ChannelStatus`] and
//! [`ModuleStatus`] are the brand-neutral views the device layer hands out.

use bitflags::bitflags;
use serde::Serialize;

use crate::error::{HvpsError, Result};
use crate::protocol::Brand;

bitflags! {
    /// CAEN `STAT` register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CaenChannelStatus: u32 {
        const ON = 1 << 0;
        const RUP = 1 << 1;
        const RDW = 1 << 2;
        const OVC = 1 << 3;
        const OVV = 1 << 4;
        const UNV = 1 << 5;
        const MAXV = 1 << 6;
        const TRIP = 1 << 7;
        const OVP = 1 << 8;
        const OVT = 1 << 9;
        const DIS = 1 << 10;
        const KILL = 1 << 11;
        const ILK = 1 << 12;
        const NOCAL = 1 << 13;
    }
}

bitflags! {
    /// CAEN `BDALARM` register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CaenBoardAlarm: u32 {
        const CH0 = 1 << 0;
        const CH1 = 1 << 1;
        const CH2 = 1 << 2;
        const CH3 = 1 << 3;
        const PWFAIL = 1 << 4;
        const OVP = 1 << 5;
        const HVCKFAIL = 1 << 6;
    }
}

impl CaenBoardAlarm {
    /// Alarm bit of channel `index`; only channels 0..=3 have one.
    pub fn channel(index: usize) -> Self {
        if index < 4 {
            Self::from_bits_truncate(1 << index)
        } else {
            Self::empty()
        }
    }

    /// Indices of channels with a raised alarm bit.
    pub fn channels(&self) -> Vec<u8> {
        (0u8..4)
            .filter(|i| self.contains(Self::channel(usize::from(*i))))
            .collect()
    }
}

bitflags! {
    /// iseg `:READ:CHAN:STATUS` register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IsegChannelStatus: u32 {
        const POSITIVE = 1 << 0;
        const ARC = 1 << 1;
        const INPUT_ERROR = 1 << 2;
        const ON = 1 << 3;
        const RAMPING = 1 << 4;
        const EMERGENCY_OFF = 1 << 5;
        const CONSTANT_CURRENT = 1 << 6;
        const CONSTANT_VOLTAGE = 1 << 7;
        const LOW_CURRENT_RANGE = 1 << 8;
        const ARC_ERROR = 1 << 9;
        const CURRENT_BOUNDS = 1 << 10;
        const VOLTAGE_BOUNDS = 1 << 11;
        const EXTERNAL_INHIBIT = 1 << 12;
        const CURRENT_TRIP = 1 << 13;
        const CURRENT_LIMIT = 1 << 14;
        const VOLTAGE_LIMIT = 1 << 15;
    }
}

bitflags! {
    /// iseg `:READ:MODULE:STATUS` register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IsegModuleStatus: u32 {
        const FINE_ADJUSTMENT = 1 << 0;
        const VOLTAGE_ON = 1 << 3;
        const SERVICE = 1 << 4;
        const INPUT_ERROR = 1 << 6;
        const NO_SUM = 1 << 8;
        const NO_RAMP = 1 << 9;
        const SAFETY_LOOP_GOOD = 1 << 10;
        const EVENT_ACTIVE = 1 << 11;
        const MODULE_GOOD = 1 << 12;
        const SUPPLY_GOOD = 1 << 13;
        const TEMPERATURE_GOOD = 1 << 14;
        const KILL_ENABLE = 1 << 15;
        const FAST_RAMP_DOWN = 1 << 16;
        const RAMP_SPEED_LIMITED = 1 << 21;
    }
}

fn register(raw: i64) -> Result<u32> {
    u32::try_from(raw)
        .map_err(|_| HvpsError::InvalidResponse(format!("status register {raw} out of range")))
}

/// Brand-neutral channel status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    /// Brand the register came from.
    pub brand: Brand,
    /// Register value as read.
    pub raw: u32,
    /// Output enabled.
    pub on: bool,
    /// Ramping up.
    pub ramp_up: bool,
    /// Ramping down.
    pub ramp_down: bool,
    /// Current above its limit.
    pub over_current: bool,
    /// Voltage above the setpoint tolerance.
    pub over_voltage: bool,
    /// Voltage below the setpoint tolerance.
    pub under_voltage: bool,
    /// Output held at the hardware maximum.
    pub max_v_clamp: bool,
    /// Switched off by a trip.
    pub tripped: bool,
    /// Power limit exceeded.
    pub over_power: bool,
    /// Temperature out of range.
    pub over_temp: bool,
    /// Disabled by hardware.
    pub disabled: bool,
    /// Output cut without ramping.
    pub killed: bool,
    /// Held off by the interlock.
    pub interlocked: bool,
    /// Calibration data is invalid.
    pub calibration_error: bool,
}

impl ChannelStatus {
    /// Decodes a register value read from a device of `brand`.
    ///
    /// # Errors
    /// `InvalidResponse` if `raw` does not fit a 32-bit register.
    pub fn from_register(brand: Brand, raw: i64) -> Result<Self> {
        let bits = register(raw)?;
        Ok(match brand {
            Brand::Caen => Self::from(CaenChannelStatus::from_bits_retain(bits)),
            Brand::Iseg => Self::from(IsegChannelStatus::from_bits_retain(bits)),
        })
    }

    /// Ramping in either direction.
    pub fn is_ramping(&self) -> bool {
        self.ramp_up || self.ramp_down
    }

    /// Output was cut by a fault rather than by a user command.
    pub fn is_faulted(&self) -> bool {
        self.tripped || self.killed || self.interlocked || self.disabled
    }

    /// The output sits at its setpoint: neither over- nor under-voltage and
    /// not ramping.
    pub fn voltage_target_reached(&self) -> bool {
        !self.over_voltage && !self.under_voltage && !self.is_ramping()
    }
}

impl From<CaenChannelStatus> for ChannelStatus {
    fn from(f: CaenChannelStatus) -> Self {
        Self {
            brand: Brand::Caen,
            raw: f.bits(),
            on: f.contains(CaenChannelStatus::ON),
            ramp_up: f.contains(CaenChannelStatus::RUP),
            ramp_down: f.contains(CaenChannelStatus::RDW),
            over_current: f.contains(CaenChannelStatus::OVC),
            over_voltage: f.contains(CaenChannelStatus::OVV),
            under_voltage: f.contains(CaenChannelStatus::UNV),
            max_v_clamp: f.contains(CaenChannelStatus::MAXV),
            tripped: f.contains(CaenChannelStatus::TRIP),
            over_power: f.contains(CaenChannelStatus::OVP),
            over_temp: f.contains(CaenChannelStatus::OVT),
            disabled: f.contains(CaenChannelStatus::DIS),
            killed: f.contains(CaenChannelStatus::KILL),
            interlocked: f.contains(CaenChannelStatus::ILK),
            calibration_error: f.contains(CaenChannelStatus::NOCAL),
        }
    }
}

impl From<IsegChannelStatus> for ChannelStatus {
    fn from(f: IsegChannelStatus) -> Self {
        let on = f.contains(IsegChannelStatus::ON);
        let ramping = f.contains(IsegChannelStatus::RAMPING);
        Self {
            brand: Brand::Iseg,
            raw: f.bits(),
            on,
            ramp_up: ramping && on,
            ramp_down: ramping && !on,
            over_current: f.intersects(
                IsegChannelStatus::CONSTANT_CURRENT
                    | IsegChannelStatus::CURRENT_LIMIT
                    | IsegChannelStatus::CURRENT_BOUNDS,
            ),
            over_voltage: f
                .intersects(IsegChannelStatus::VOLTAGE_LIMIT | IsegChannelStatus::VOLTAGE_BOUNDS),
            under_voltage: false,
            max_v_clamp: f.contains(IsegChannelStatus::VOLTAGE_LIMIT),
            tripped: f.contains(IsegChannelStatus::CURRENT_TRIP),
            over_power: false,
            over_temp: false,
            disabled: false,
            killed: f.contains(IsegChannelStatus::EMERGENCY_OFF),
            interlocked: f.contains(IsegChannelStatus::EXTERNAL_INHIBIT),
            calibration_error: f.contains(IsegChannelStatus::INPUT_ERROR),
        }
    }
}

/// Brand-neutral module status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStatus {
    /// Brand the register came from.
    pub brand: Brand,
    /// Register value as read.
    pub raw: u32,
    /// No alarm or error condition is active.
    pub healthy: bool,
    /// At least one event or alarm bit is latched.
    pub event_active: bool,
    /// Channels whose trip raised a module alarm (CAEN only).
    pub tripped_channels: Vec<u8>,
}

impl ModuleStatus {
    /// Decodes `BDALARM` (CAEN) or `:READ:MODULE:STATUS` (iseg).
    ///
    /// # Errors
    /// `InvalidResponse` if `raw` does not fit a 32-bit register.
    pub fn from_register(brand: Brand, raw: i64) -> Result<Self> {
        let bits = register(raw)?;
        Ok(match brand {
            Brand::Caen => {
                let alarm = CaenBoardAlarm::from_bits_retain(bits);
                Self {
                    brand,
                    raw: bits,
                    healthy: alarm.is_empty(),
                    event_active: !alarm.is_empty(),
                    tripped_channels: alarm.channels(),
                }
            }
            Brand::Iseg => {
                let status = IsegModuleStatus::from_bits_retain(bits);
                Self {
                    brand,
                    raw: bits,
                    healthy: status.contains(IsegModuleStatus::MODULE_GOOD)
                        && !status.contains(IsegModuleStatus::INPUT_ERROR),
                    event_active: status.contains(IsegModuleStatus::EVENT_ACTIVE),
                    tripped_channels: Vec::new(),
                }
            }
        })
    }
}
