use std::str::FromStr;

use super::channel::SimulatedChannel;
use super::firmware::{float, Applied, Firmware};
use super::module::SimulatedModule;
use crate::protocol::codec::DeviceReply;
use crate::protocol::commands::CommandDescriptor;
use crate::protocol::{Brand, ControlMode, CurrentRange, InterlockMode, PowerDownMode, Value};

/// An N1471H-style desktop module.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaenFirmware;

/// Range registers (`VMAX`, `RUPMIN`, ...) and digit counts.
fn defaults() -> [(&'static str, Value); 19] {
    [
        ("VMIN", Value::Float(0.0)),
        ("VMAX", Value::Float(5500.0)),
        ("VDEC", Value::Int(1)),
        ("IMIN", Value::Float(0.0)),
        ("IMAX", Value::Float(20.0)),
        ("ISDEC", Value::Int(2)),
        ("IMDEC", Value::Int(3)),
        ("MVMIN", Value::Float(0.0)),
        ("MVMAX", Value::Float(5600.0)),
        ("MVDEC", Value::Int(0)),
        ("RUPMIN", Value::Float(1.0)),
        ("RUPMAX", Value::Float(500.0)),
        ("RUPDEC", Value::Int(0)),
        ("RDWMIN", Value::Float(1.0)),
        ("RDWMAX", Value::Float(500.0)),
        ("RDWDEC", Value::Float(0.0)),
        ("TRIPMIN", Value::Float(0.0)),
        ("TRIPMAX", Value::Float(1000.0)),
        ("TRIPDEC", Value::Int(1)),
    ]
}

impl Firmware for CaenFirmware {
    fn initialize(&self, module: &mut SimulatedModule) {
        module.name = "N1471H SIMULATOR".to_string();
        module.firmware_release = "2.03".to_string();
        module.serial_number = "00042".to_string();
        for index in 0..module.channels.len() {
            let ch = u8::try_from(index).ok();
            for (name, value) in defaults() {
                module.set_register(ch, name, value);
            }
        }
    }

    fn read_channel(&self, channel: &SimulatedChannel, name: &str) -> Option<Value> {
        let sp = &channel.setpoint;
        Some(match name {
            "VSET" => Value::Float(sp.vset),
            "VMON" => Value::Float(channel.vmon()),
            "ISET" => Value::Float(sp.iset),
            "IMON" => Value::Float(channel.imon()),
            "IMRANGE" => Value::from(sp.current_range.as_wire()),
            "MAXV" => Value::Float(sp.max_v),
            "RUP" => Value::Float(sp.ramp_up_rate),
            "RDW" => Value::Float(sp.ramp_down_rate),
            "TRIP" => Value::Float(sp.trip_timeout),
            "PDWN" => Value::from(sp.power_down_mode.as_wire()),
            "POL" => Value::from(channel.polarity.as_wire(Brand::Caen)),
            "STAT" => Value::Int(i64::from(channel.status().bits())),
            _ => return None,
        })
    }

    fn write_channel(
        &self,
        channel: &mut SimulatedChannel,
        name: &'static str,
        value: Option<&Value>,
    ) -> Applied {
        let sp = &mut channel.setpoint;
        match (name, float(value)) {
            ("VSET", Some(v)) => sp.vset = v,
            ("ISET", Some(v)) => sp.iset = v,
            ("MAXV", Some(v)) => sp.max_v = v,
            ("RUP", Some(v)) => sp.ramp_up_rate = v,
            ("RDW", Some(v)) => sp.ramp_down_rate = v,
            ("TRIP", Some(v)) => sp.trip_timeout = v,
            ("PDWN", _) => {
                if let Some(Ok(mode)) = value.and_then(Value::as_str).map(PowerDownMode::from_str) {
                    sp.power_down_mode = mode;
                }
            }
            ("IMRANGE", _) => {
                if let Some(Ok(range)) = value.and_then(Value::as_str).map(CurrentRange::from_str) {
                    sp.current_range = range;
                }
            }
            ("ON", _) => channel.turn_on(),
            ("OFF", _) => channel.turn_off(),
            _ => return Applied::Store(name),
        }
        Applied::Done
    }

    fn read_module(&self, module: &SimulatedModule, name: &str) -> Option<Value> {
        Some(match name {
            "BDNAME" => Value::from(module.name.as_str()),
            "BDNCH" => Value::Int(module.channels.len() as i64),
            "BDFREL" => Value::from(module.firmware_release.as_str()),
            "BDSNUM" => Value::from(module.serial_number.as_str()),
            "BDILK" => Value::from(if module.interlock_active() { "YES" } else { "NO" }),
            "BDILKM" => Value::from(module.interlock_mode.as_wire()),
            "BDCTR" => Value::from(module.control_mode.as_wire()),
            "BDALARM" => Value::Int(i64::from(module.alarm.bits())),
            _ => return None,
        })
    }

    fn write_module(
        &self,
        module: &mut SimulatedModule,
        name: &'static str,
        value: Option<&Value>,
    ) -> Applied {
        let text = value.and_then(Value::as_str);
        match (name, text) {
            ("BDILKM", Some(text)) => {
                if let Ok(mode) = InterlockMode::from_str(text) {
                    module.interlock_mode = mode;
                }
            }
            ("BDCTR", Some(text)) => {
                if let Ok(mode) = ControlMode::from_str(text) {
                    module.control_mode = mode;
                }
            }
            ("BDCLR", _) => module.clear_alarm(),
            _ => return Applied::Store(name),
        }
        Applied::Done
    }

    fn render(&self, command: &CommandDescriptor, value: &Value) -> String {
        match value {
            // Currents carry three decimals (IMDEC), everything else one.
            Value::Float(v) if command.name.starts_with('I') => format!("{v:.3}"),
            Value::Float(v) => format!("{v:.1}"),
            other => other.to_string(),
        }
    }

    fn acknowledge(&self) -> DeviceReply {
        DeviceReply::Ack
    }
}
