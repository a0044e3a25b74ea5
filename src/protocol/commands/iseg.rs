//! iseg SCPI-style commands.
//!
//! Every set command is sent with a trailing `*OPC?` and answers `1` once the
//! module has processed it.

use super::{Allowed, CommandDescriptor as C, CommandTable, Kind, Literal, Scalar, Vocabulary};
use crate::protocol::{Brand, Direction, Entity};

const OPC: Allowed = Allowed::OneOf(&[Literal::Int(1)]);
const ZERO_ONE: Allowed = Allowed::OneOf(&[Literal::Int(0), Literal::Int(1)]);
const ACTION: Allowed = Allowed::Range(0, 4);
const OUTPUT_MODE: Allowed = Allowed::OneOf(&[Literal::Int(1), Literal::Int(2), Literal::Int(3)]);
const POLARITY: Allowed = Allowed::OneOf(&[Literal::Str("p"), Literal::Str("n")]);
const BAUD: Allowed = Allowed::OneOf(&[
    Literal::Int(9600),
    Literal::Int(19200),
    Literal::Int(38400),
    Literal::Int(57600),
    Literal::Int(115200),
]);
const AVERAGE: Allowed = Allowed::OneOf(&[
    Literal::Int(1),
    Literal::Int(16),
    Literal::Int(64),
    Literal::Int(256),
    Literal::Int(512),
    Literal::Int(1024),
]);
const CAN_BITRATE: Allowed = Allowed::OneOf(&[Literal::Int(125000), Literal::Int(250000)]);

const fn order(name: &'static str, input: Kind, description: &'static str) -> C {
    C::set(name, input, description).answers(Kind::Int, OPC)
}

pub(super) static CHANNEL_MONITOR: CommandTable = CommandTable {
    brand: Brand::Iseg,
    entity: Entity::Channel,
    direction: Direction::Monitor,
    commands: &[
        C::monitor(":CONF:TRIP:ACTION", Kind::Int, "Action on current trip").possible(ACTION),
        C::monitor(":CONF:TRIP:TIME", Kind::Int, "Trip timeout (ms)"),
        C::monitor(":CONF:INHP:ACTION", Kind::Int, "Action on external inhibit").possible(ACTION),
        C::monitor(":CONF:OUTPUT:MODE", Kind::Int, "Output mode").possible(OUTPUT_MODE),
        C::monitor(":CONF:OUTPUT:MODE:LIST", Kind::ListOf(Scalar::Int), "Available output modes"),
        C::monitor(":CONF:OUTPUT:POL", Kind::Str, "Output polarity").possible(POLARITY),
        C::monitor(":CONF:OUTPUT:POL:LIST", Kind::ListOf(Scalar::Str), "Available polarities")
            .possible(POLARITY),
        C::monitor(":READ:VOLT", Kind::Float, "Voltage setpoint").unit("V"),
        C::monitor(":READ:VOLT:LIM", Kind::Float, "Voltage limit").unit("V"),
        C::monitor(":READ:VOLT:NOM", Kind::Float, "Nominal voltage").unit("V"),
        C::monitor(":READ:VOLT:MODE", Kind::Float, "Voltage mode").unit("V"),
        C::monitor(":READ:VOLT:MODE:LIST", Kind::ListOf(Scalar::Float), "Available voltage modes")
            .unit("V"),
        C::monitor(":READ:VOLT:BOUNDS", Kind::Float, "Voltage bounds").unit("V"),
        C::monitor(":READ:VOLT:ON", Kind::Int, "Channel switched on").possible(ZERO_ONE),
        C::monitor(":READ:VOLT:EMCY", Kind::Int, "Emergency off active").possible(ZERO_ONE),
        C::monitor(":READ:CURR", Kind::Float, "Current setpoint").unit("A"),
        C::monitor(":READ:CURR:LIM", Kind::Float, "Current limit").unit("A"),
        C::monitor(":READ:CURR:NOM", Kind::Float, "Nominal current").unit("A"),
        C::monitor(":READ:CURR:MODE", Kind::Float, "Current mode").unit("A"),
        C::monitor(":READ:CURR:MODE:LIST", Kind::ListOf(Scalar::Float), "Available current modes")
            .unit("A"),
        C::monitor(":READ:CURR:BOUNDS", Kind::Float, "Current bounds").unit("A"),
        C::monitor(":READ:RAMP:CURR", Kind::Float, "Current ramp speed").unit("A/s"),
        C::monitor(":READ:RAMP:VOLT", Kind::Float, "Voltage ramp speed").unit("V/s"),
        C::monitor(":READ:RAMP:VOLT:MIN", Kind::Float, "Voltage ramp speed minimum").unit("V/s"),
        C::monitor(":READ:RAMP:VOLT:MAX", Kind::Float, "Voltage ramp speed maximum").unit("V/s"),
        C::monitor(":READ:RAMP:CURR:MIN", Kind::Float, "Current ramp speed minimum").unit("A/s"),
        C::monitor(":READ:RAMP:CURR:MAX", Kind::Float, "Current ramp speed maximum").unit("A/s"),
        C::monitor(":READ:CHAN:CONTROL", Kind::Int, "Channel control register"),
        C::monitor(":READ:CHAN:STATUS", Kind::Int, "Channel status register"),
        C::monitor(":READ:CHAN:EVENT:MASK", Kind::Int, "Channel event mask register"),
        C::monitor(":MEAS:VOLT", Kind::Float, "Measured voltage").unit("V"),
        C::monitor(":MEAS:CURR", Kind::Float, "Measured current").unit("A"),
        C::monitor(":CONF:RAMP:VOLT:UP", Kind::Float, "Voltage ramp-up speed").unit("V/s"),
        C::monitor(":CONF:RAMP:VOLT:DOWN", Kind::Float, "Voltage ramp-down speed").unit("V/s"),
        C::monitor(":CONF:RAMP:CURR:UP", Kind::Float, "Current ramp-up speed").unit("A/s"),
        C::monitor(":CONF:RAMP:CURR:DOWN", Kind::Float, "Current ramp-down speed").unit("A/s"),
    ],
};

pub(super) static CHANNEL_SET: CommandTable = CommandTable {
    brand: Brand::Iseg,
    entity: Entity::Channel,
    direction: Direction::Set,
    commands: &[
        order(":CONF:TRIP:ACTION", Kind::Int, "Set action on current trip").allowed(ACTION),
        order(":CONF:TRIP:TIME", Kind::Int, "Set trip timeout (ms)").allowed(Allowed::Range(1, 4095)),
        order(":CONF:INHP:ACTION", Kind::Int, "Set action on external inhibit").allowed(ACTION),
        order(":CONF:OUTPUT:MODE", Kind::Int, "Set output mode").allowed(OUTPUT_MODE),
        order(":CONF:OUTPUT:POL", Kind::Str, "Set output polarity").allowed(POLARITY),
        order(":VOLT", Kind::Float, "Set voltage setpoint (V)"),
        order(":VOLT:BOUNDS", Kind::Float, "Set voltage bounds (V)"),
        order(":CURR", Kind::Float, "Set current setpoint (A)"),
        order(":CURR:BOUNDS", Kind::Float, "Set current bounds (A)"),
        order(":CONF:RAMP:VOLT", Kind::Float, "Set voltage ramp speed, both directions (V/s)"),
        order(":CONF:RAMP:VOLT:UP", Kind::Float, "Set voltage ramp-up speed (V/s)"),
        order(":CONF:RAMP:VOLT:DOWN", Kind::Float, "Set voltage ramp-down speed (V/s)"),
        order(":CONF:RAMP:CURR", Kind::Float, "Set current ramp speed, both directions (A/s)"),
        order(":CONF:RAMP:CURR:UP", Kind::Float, "Set current ramp-up speed (A/s)"),
        order(":CONF:RAMP:CURR:DOWN", Kind::Float, "Set current ramp-down speed (A/s)"),
        order(":VOLT ON", Kind::None, "Switch high voltage on"),
        order(":VOLT OFF", Kind::None, "Switch high voltage off"),
        order(":VOLT EMCY OFF", Kind::None, "Emergency shutdown without ramp"),
        order(":VOLT EMCY CLR", Kind::None, "Clear emergency shutdown"),
        order(":EVENT CLEAR", Kind::None, "Clear channel event status"),
        order(":EVENT", Kind::Int, "Clear channel event status bits"),
        order(":EVENT:MASK", Kind::Int, "Set channel event mask"),
    ],
};

pub(super) static MODULE_MONITOR: CommandTable = CommandTable {
    brand: Brand::Iseg,
    entity: Entity::Module,
    direction: Direction::Monitor,
    commands: &[
        C::monitor(":READ:MODULE:CHANNELNUMBER", Kind::Int, "Number of channels"),
        C::monitor(":READ:FIRMWARE:RELEASE", Kind::Str, "Firmware release"),
        C::monitor(":READ:FIRMWARE:NAME", Kind::Str, "Firmware name"),
        C::monitor(":READ:MODULE:STATUS", Kind::Int, "Module status register"),
        C::monitor(":READ:MODULE:CONTROL", Kind::Int, "Module control register"),
        C::monitor(":READ:MODULE:EVENT:STATUS", Kind::Int, "Module event status register"),
        C::monitor(":READ:MODULE:EVENT:MASK", Kind::Int, "Module event mask register"),
        C::monitor(":READ:MODULE:EVENT:CHANSTAT", Kind::Int, "Module event channel status"),
        C::monitor(":READ:MODULE:EVENT:CHANMASK", Kind::Int, "Module event channel mask"),
        C::monitor(":READ:MODULE:SUPPLY:P24V", Kind::Float, "Supply +24 V").unit("V"),
        C::monitor(":READ:MODULE:SUPPLY:N24V", Kind::Float, "Supply -24 V").unit("V"),
        C::monitor(":READ:MODULE:SUPPLY:P5V", Kind::Float, "Supply +5 V").unit("V"),
        C::monitor(":READ:MODULE:SUPPLY:P3V", Kind::Float, "Supply +3.3 V").unit("V"),
        C::monitor(":READ:MODULE:SUPPLY:P12V", Kind::Float, "Supply +12 V").unit("V"),
        C::monitor(":READ:MODULE:SUPPLY:N12V", Kind::Float, "Supply -12 V").unit("V"),
        C::monitor(":READ:MODULE:TEMPERATURE", Kind::Float, "Module temperature").unit("C"),
        C::monitor(":READ:MODULE:SETVALUE", Kind::Int, "Setvalue changes counter"),
        C::monitor(":READ:VOLT:LIM", Kind::Float, "Module voltage limit").unit("%"),
        C::monitor(":READ:CURR:LIM", Kind::Float, "Module current limit").unit("%"),
        C::monitor(":READ:RAMP:VOLT", Kind::Float, "Module voltage ramp speed").unit("%/s"),
        C::monitor(":READ:RAMP:CURR", Kind::Float, "Module current ramp speed").unit("%/s"),
        C::monitor(":CONF:AVER", Kind::Int, "Digital filter averaging steps").possible(AVERAGE),
        C::monitor(":CONF:KILL", Kind::Int, "Kill enable").possible(ZERO_ONE),
        C::monitor(":CONF:ADJUST", Kind::Int, "Fine adjustment").possible(ZERO_ONE),
        C::monitor(":CONF:CAN:ADDR", Kind::Int, "CAN bus address"),
        C::monitor(":CONF:CAN:BITRATE", Kind::Int, "CAN bus bit rate").possible(CAN_BITRATE),
        C::monitor(":CONF:SERIAL:BAUD", Kind::Int, "Serial baud rate").possible(BAUD),
        C::monitor(":CONF:SERIAL:ECHO", Kind::Int, "Serial echo enabled").possible(ZERO_ONE),
        C::monitor(":SYSTEM:USER:CONFIG", Kind::Int, "Configuration mode active").possible(ZERO_ONE),
    ],
};

pub(super) static MODULE_SET: CommandTable = CommandTable {
    brand: Brand::Iseg,
    entity: Entity::Module,
    direction: Direction::Set,
    commands: &[
        order(":CONF:SERIAL:BAUD", Kind::Int, "Set serial baud rate").allowed(BAUD),
        order(":CONF:SERIAL:ECHO", Kind::Int, "Enable or disable serial echo").allowed(ZERO_ONE),
        order(":CONF:AVER", Kind::Int, "Set digital filter averaging steps").allowed(AVERAGE),
        order(":CONF:KILL", Kind::Int, "Set kill enable").allowed(ZERO_ONE),
        order(":CONF:ADJUST", Kind::Int, "Set fine adjustment").allowed(ZERO_ONE),
        order(":CONF:EVENT:MASK", Kind::Int, "Set module event mask"),
        order(":CONF:EVENT:CHANMASK", Kind::Int, "Set module event channel mask"),
        order(":CONF:CAN:ADDR", Kind::Int, "Set CAN bus address").allowed(Allowed::Range(0, 63)),
        order(":CONF:CAN:BITRATE", Kind::Int, "Set CAN bus bit rate").allowed(CAN_BITRATE),
        order(":SYSTEM:USER:CONFIG", Kind::Int, "Enter configuration mode (serial number) or leave it (0)"),
        order(":CONF:EVENT CLEAR", Kind::None, "Clear module event status"),
        order(":CONF:EVENT", Kind::Int, "Clear module event status bits"),
    ],
};

pub(super) static VOCABULARY: Vocabulary = Vocabulary {
    voltage_setpoint: ":READ:VOLT",
    set_voltage: ":VOLT",
    current_setpoint: ":READ:CURR",
    set_current: ":CURR",
    measured_voltage: ":MEAS:VOLT",
    measured_current: ":MEAS:CURR",
    ramp_up: ":CONF:RAMP:VOLT:UP",
    set_ramp_up: ":CONF:RAMP:VOLT:UP",
    ramp_down: ":CONF:RAMP:VOLT:DOWN",
    set_ramp_down: ":CONF:RAMP:VOLT:DOWN",
    voltage_limit: ":READ:VOLT:LIM",
    set_voltage_limit: None,
    status: ":READ:CHAN:STATUS",
    turn_on: ":VOLT ON",
    turn_off: ":VOLT OFF",
    polarity: ":CONF:OUTPUT:POL",
    power_down_mode: None,
    set_power_down_mode: None,
    current_range: None,
    set_current_range: None,
    module_name: ":READ:FIRMWARE:NAME",
    firmware_release: ":READ:FIRMWARE:RELEASE",
    serial_number: None,
    channel_count: ":READ:MODULE:CHANNELNUMBER",
    module_status: ":READ:MODULE:STATUS",
    interlock_status: None,
    interlock_mode: None,
    set_interlock_mode: None,
    clear_alarm: ":CONF:EVENT CLEAR",
};
