//! CAEN N1470-family mnemonics.

use super::{Allowed, CommandDescriptor as C, CommandTable, Kind, Literal, Vocabulary};
use crate::protocol::{Brand, Direction, Entity};

const YES_NO: Allowed = Allowed::OneOf(&[Literal::Str("YES"), Literal::Str("NO")]);
const OPEN_CLOSED: Allowed = Allowed::OneOf(&[Literal::Str("OPEN"), Literal::Str("CLOSED")]);
const LOCAL_REMOTE: Allowed = Allowed::OneOf(&[Literal::Str("LOCAL"), Literal::Str("REMOTE")]);
const ON_OFF: Allowed = Allowed::OneOf(&[Literal::Str("ON"), Literal::Str("OFF")]);
const HIGH_LOW: Allowed = Allowed::OneOf(&[Literal::Str("HIGH"), Literal::Str("LOW")]);
const RAMP_KILL: Allowed = Allowed::OneOf(&[Literal::Str("RAMP"), Literal::Str("KILL")]);
const PLUS_MINUS: Allowed = Allowed::OneOf(&[Literal::Str("+"), Literal::Str("-")]);

pub(super) static MODULE_MONITOR: CommandTable = CommandTable {
    brand: Brand::Caen,
    entity: Entity::Module,
    direction: Direction::Monitor,
    commands: &[
        C::monitor("BDNAME", Kind::Str, "Module name"),
        C::monitor("BDNCH", Kind::Int, "Number of channels"),
        C::monitor("BDFREL", Kind::Str, "Firmware release"),
        C::monitor("BDSNUM", Kind::Str, "Serial number"),
        C::monitor("BDILK", Kind::Str, "Interlock status").possible(YES_NO),
        C::monitor("BDILKM", Kind::Str, "Interlock mode").possible(OPEN_CLOSED),
        C::monitor("BDCTR", Kind::Str, "Control mode").possible(LOCAL_REMOTE),
        C::monitor("BDTERM", Kind::Str, "Local bus termination").possible(ON_OFF),
        C::monitor("BDALARM", Kind::Int, "Board alarm status register"),
    ],
};

pub(super) static MODULE_SET: CommandTable = CommandTable {
    brand: Brand::Caen,
    entity: Entity::Module,
    direction: Direction::Set,
    commands: &[
        C::set("BDILKM", Kind::Str, "Set interlock mode").allowed(OPEN_CLOSED),
        C::set("BDCTR", Kind::Str, "Set control mode").allowed(LOCAL_REMOTE),
        C::set("BDCLR", Kind::None, "Clear alarm signal"),
    ],
};

pub(super) static CHANNEL_MONITOR: CommandTable = CommandTable {
    brand: Brand::Caen,
    entity: Entity::Channel,
    direction: Direction::Monitor,
    commands: &[
        C::monitor("VSET", Kind::Float, "Voltage setpoint (V)"),
        C::monitor("VMIN", Kind::Float, "Voltage setpoint minimum (V)"),
        C::monitor("VMAX", Kind::Float, "Voltage setpoint maximum (V)"),
        C::monitor("VDEC", Kind::Int, "Voltage setpoint decimal digits"),
        C::monitor("VMON", Kind::Float, "Monitored voltage (V)"),
        C::monitor("ISET", Kind::Float, "Current setpoint (uA)"),
        C::monitor("IMIN", Kind::Float, "Current setpoint minimum (uA)"),
        C::monitor("IMAX", Kind::Float, "Current setpoint maximum (uA)"),
        C::monitor("ISDEC", Kind::Int, "Current setpoint decimal digits"),
        C::monitor("IMON", Kind::Float, "Monitored current (uA)"),
        C::monitor("IMRANGE", Kind::Str, "Current monitor range").possible(HIGH_LOW),
        C::monitor("IMDEC", Kind::Int, "Monitored current decimal digits"),
        C::monitor("MAXV", Kind::Float, "Software voltage limit (V)"),
        C::monitor("MVMIN", Kind::Float, "Voltage limit minimum (V)"),
        C::monitor("MVMAX", Kind::Float, "Voltage limit maximum (V)"),
        C::monitor("MVDEC", Kind::Int, "Voltage limit decimal digits"),
        C::monitor("RUP", Kind::Float, "Ramp-up rate (V/s)"),
        C::monitor("RUPMIN", Kind::Float, "Ramp-up rate minimum (V/s)"),
        C::monitor("RUPMAX", Kind::Float, "Ramp-up rate maximum (V/s)"),
        C::monitor("RUPDEC", Kind::Int, "Ramp-up rate decimal digits"),
        C::monitor("RDW", Kind::Float, "Ramp-down rate (V/s)"),
        C::monitor("RDWMIN", Kind::Float, "Ramp-down rate minimum (V/s)"),
        C::monitor("RDWMAX", Kind::Float, "Ramp-down rate maximum (V/s)"),
        C::monitor("RDWDEC", Kind::Float, "Ramp-down rate decimal digits"),
        C::monitor("TRIP", Kind::Float, "Trip time (s)"),
        C::monitor("TRIPMIN", Kind::Float, "Trip time minimum (s)"),
        C::monitor("TRIPMAX", Kind::Float, "Trip time maximum (s)"),
        C::monitor("TRIPDEC", Kind::Int, "Trip time decimal digits"),
        C::monitor("PDWN", Kind::Str, "Power-down mode").possible(RAMP_KILL),
        C::monitor("POL", Kind::Str, "Output polarity").possible(PLUS_MINUS),
        C::monitor("STAT", Kind::Int, "Channel status register"),
    ],
};

pub(super) static CHANNEL_SET: CommandTable = CommandTable {
    brand: Brand::Caen,
    entity: Entity::Channel,
    direction: Direction::Set,
    commands: &[
        C::set("VSET", Kind::Float, "Set voltage setpoint (V)"),
        C::set("ISET", Kind::Float, "Set current setpoint (uA)"),
        C::set("MAXV", Kind::Float, "Set software voltage limit (V)"),
        C::set("RUP", Kind::Float, "Set ramp-up rate (V/s)"),
        C::set("RDW", Kind::Float, "Set ramp-down rate (V/s)"),
        C::set("TRIP", Kind::Float, "Set trip time (s)"),
        C::set("PDWN", Kind::Str, "Set power-down mode").allowed(RAMP_KILL),
        C::set("IMRANGE", Kind::Str, "Set current monitor range").allowed(HIGH_LOW),
        C::set("ON", Kind::None, "Turn the channel on"),
        C::set("OFF", Kind::None, "Turn the channel off"),
    ],
};

pub(super) static VOCABULARY: Vocabulary = Vocabulary {
    voltage_setpoint: "VSET",
    set_voltage: "VSET",
    current_setpoint: "ISET",
    set_current: "ISET",
    measured_voltage: "VMON",
    measured_current: "IMON",
    ramp_up: "RUP",
    set_ramp_up: "RUP",
    ramp_down: "RDW",
    set_ramp_down: "RDW",
    voltage_limit: "MAXV",
    set_voltage_limit: Some("MAXV"),
    status: "STAT",
    turn_on: "ON",
    turn_off: "OFF",
    polarity: "POL",
    power_down_mode: Some("PDWN"),
    set_power_down_mode: Some("PDWN"),
    current_range: Some("IMRANGE"),
    set_current_range: Some("IMRANGE"),
    module_name: "BDNAME",
    firmware_release: "BDFREL",
    serial_number: Some("BDSNUM"),
    channel_count: "BDNCH",
    module_status: "BDALARM",
    interlock_status: Some("BDILK"),
    interlock_mode: Some("BDILKM"),
    set_interlock_mode: Some("BDILKM"),
    clear_alarm: "BDCLR",
};
