use super::channel::SimulatedChannel;
use super::firmware::{flag, float, Applied, Firmware};
use super::module::SimulatedModule;
use crate::protocol::codec::{format_scientific, DeviceReply};
use crate::protocol::commands::CommandDescriptor;
use crate::protocol::status::IsegModuleStatus;
use crate::protocol::{Brand, Polarity, Value};

/// Currents are kept in µA by the model and reported in A.
const MICRO: f64 = 1e-6;

/// A four-channel NHR-style module.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsegFirmware;

fn module_defaults() -> [(&'static str, Value); 14] {
    [
        (":READ:MODULE:SUPPLY:P24V", Value::Float(24.0)),
        (":READ:MODULE:SUPPLY:N24V", Value::Float(-24.0)),
        (":READ:MODULE:SUPPLY:P5V", Value::Float(5.0)),
        (":READ:MODULE:SUPPLY:P3V", Value::Float(3.3)),
        (":READ:MODULE:SUPPLY:P12V", Value::Float(12.0)),
        (":READ:MODULE:SUPPLY:N12V", Value::Float(-12.0)),
        (":READ:MODULE:TEMPERATURE", Value::Float(25.0)),
        (":READ:VOLT:LIM", Value::Float(100.0)),
        (":READ:CURR:LIM", Value::Float(100.0)),
        (":READ:RAMP:VOLT", Value::Float(10.0)),
        (":READ:RAMP:CURR", Value::Float(10.0)),
        (":CONF:AVER", Value::Int(64)),
        (":CONF:SERIAL:BAUD", Value::Int(9600)),
        (":CONF:SERIAL:ECHO", Value::Int(1)),
    ]
}

fn channel_defaults() -> [(&'static str, Value); 10] {
    [
        (":CONF:TRIP:TIME", Value::Int(100)),
        (":CONF:OUTPUT:MODE", Value::Int(1)),
        (
            ":CONF:OUTPUT:MODE:LIST",
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        ),
        (":READ:VOLT:NOM", Value::Float(6000.0)),
        (":READ:CURR:NOM", Value::Float(1e-3)),
        (":READ:VOLT:MODE", Value::Float(6000.0)),
        (":READ:VOLT:MODE:LIST", Value::List(vec![Value::Float(6000.0)])),
        (":READ:CURR:MODE", Value::Float(1e-3)),
        (":READ:CURR:MODE:LIST", Value::List(vec![Value::Float(1e-3)])),
        (":READ:RAMP:VOLT:MAX", Value::Float(1200.0)),
    ]
}

impl Firmware for IsegFirmware {
    fn initialize(&self, module: &mut SimulatedModule) {
        module.name = "NHR SIMULATOR".to_string();
        module.firmware_release = "1.09".to_string();
        for (name, value) in module_defaults() {
            module.set_register(None, name, value);
        }
        for index in 0..module.channels.len() {
            let ch = u8::try_from(index).ok();
            for (name, value) in channel_defaults() {
                module.set_register(ch, name, value);
            }
        }
    }

    fn read_channel(&self, channel: &SimulatedChannel, name: &str) -> Option<Value> {
        let sp = &channel.setpoint;
        Some(match name {
            ":READ:VOLT" => Value::Float(sp.vset),
            ":READ:VOLT:LIM" => Value::Float(sp.max_v),
            ":READ:VOLT:ON" => flag(channel.is_on()),
            ":READ:VOLT:EMCY" => flag(channel.is_killed()),
            ":READ:CURR" => Value::Float(sp.iset * MICRO),
            ":MEAS:VOLT" => Value::Float(channel.vmon()),
            ":MEAS:CURR" => Value::Float(channel.imon() * MICRO),
            ":CONF:RAMP:VOLT:UP" | ":READ:RAMP:VOLT" => Value::Float(sp.ramp_up_rate),
            ":CONF:RAMP:VOLT:DOWN" => Value::Float(sp.ramp_down_rate),
            ":CONF:OUTPUT:POL" => Value::from(channel.polarity.as_wire(Brand::Iseg)),
            ":CONF:OUTPUT:POL:LIST" => Value::List(vec![Value::from("p"), Value::from("n")]),
            ":READ:CHAN:STATUS" => Value::Int(i64::from(channel.iseg_status().bits())),
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
            (":VOLT", Some(v)) => sp.vset = v,
            (":CURR", Some(v)) => sp.iset = v / MICRO,
            (":CONF:RAMP:VOLT", Some(v)) => {
                sp.ramp_up_rate = v;
                sp.ramp_down_rate = v;
            }
            (":CONF:RAMP:VOLT:UP", Some(v)) => sp.ramp_up_rate = v,
            (":CONF:RAMP:VOLT:DOWN", Some(v)) => sp.ramp_down_rate = v,
            (":CONF:OUTPUT:POL", _) => {
                if let Some(Ok(polarity)) = value.and_then(Value::as_str).map(Polarity::from_wire) {
                    channel.polarity = polarity;
                }
            }
            (":VOLT ON", _) => channel.turn_on(),
            (":VOLT OFF", _) => channel.turn_off(),
            (":VOLT EMCY OFF", _) => channel.kill(),
            (":VOLT EMCY CLR", _) => channel.clear_kill(),
            (":EVENT CLEAR", _) | (":EVENT", _) => channel.clear_alarms(),
            (":EVENT:MASK", _) => return Applied::Store(":READ:CHAN:EVENT:MASK"),
            _ => return Applied::Store(name),
        }
        Applied::Done
    }

    fn read_module(&self, module: &SimulatedModule, name: &str) -> Option<Value> {
        Some(match name {
            ":READ:MODULE:CHANNELNUMBER" => Value::Int(module.channels.len() as i64),
            ":READ:FIRMWARE:NAME" => Value::from(module.name.as_str()),
            ":READ:FIRMWARE:RELEASE" => Value::from(module.firmware_release.as_str()),
            ":READ:MODULE:STATUS" => Value::Int(i64::from(module_status(module).bits())),
            ":READ:MODULE:EVENT:STATUS" => {
                Value::Int(i64::from(module.interlock_active()) << 11)
            }
            ":READ:MODULE:EVENT:CHANSTAT" => Value::Int(i64::from(module.alarm.bits() & 0xf)),
            _ => return None,
        })
    }

    fn write_module(
        &self,
        module: &mut SimulatedModule,
        name: &'static str,
        _value: Option<&Value>,
    ) -> Applied {
        match name {
            ":CONF:EVENT CLEAR" | ":CONF:EVENT" => module.clear_alarm(),
            ":CONF:EVENT:MASK" => return Applied::Store(":READ:MODULE:EVENT:MASK"),
            ":CONF:EVENT:CHANMASK" => return Applied::Store(":READ:MODULE:EVENT:CHANMASK"),
            _ => return Applied::Store(name),
        }
        Applied::Done
    }

    fn render(&self, command: &CommandDescriptor, value: &Value) -> String {
        let unit = command.unit.unwrap_or_default();
        match value {
            Value::Float(v) => format!("{}{unit}", format_scientific(*v)),
            Value::List(items) => items
                .iter()
                .map(|item| self.render(command, item))
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }
    }

    fn acknowledge(&self) -> DeviceReply {
        DeviceReply::Value("1".to_string())
    }
}

fn module_status(module: &SimulatedModule) -> IsegModuleStatus {
    let mut status = IsegModuleStatus::MODULE_GOOD
        | IsegModuleStatus::SUPPLY_GOOD
        | IsegModuleStatus::TEMPERATURE_GOOD
        | IsegModuleStatus::SAFETY_LOOP_GOOD;
    status.set(
        IsegModuleStatus::VOLTAGE_ON,
        module.channels.iter().any(SimulatedChannel::is_on),
    );
    status.set(IsegModuleStatus::EVENT_ACTIVE, module.interlock_active());
    status.set(
        IsegModuleStatus::KILL_ENABLE,
        module.register(None, ":CONF:KILL").and_then(Value::as_i64) == Some(1),
    );
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{codec, Request};
    use crate::simulation::rng::SimRng;

    fn request(frame: &str) -> Request {
        codec(Brand::Iseg).decode_request(frame.as_bytes()).unwrap()
    }

    fn value(module: &mut SimulatedModule, frame: &str) -> String {
        match module.handle(&request(frame)) {
            Some(DeviceReply::Value(v)) => v,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_units_and_notation() {
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        assert_eq!(value(&mut module, ":READ:VOLT? (@0)"), "1.000000E+02V");
        assert_eq!(value(&mut module, ":READ:CURR? (@0)"), "6.000000E-07A");
        assert_eq!(value(&mut module, ":CONF:OUTPUT:POL:LIST? (@0)"), "p,n");
        assert_eq!(value(&mut module, ":READ:MODULE:TEMPERATURE?"), "2.500000E+01C");
        assert_eq!(value(&mut module, ":READ:MODULE:CHANNELNUMBER?"), "4");
    }

    #[test]
    fn test_set_answers_one() {
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        assert_eq!(value(&mut module, ":VOLT 2.000000E+02,(@1);*OPC?"), "1");
        assert_eq!(value(&mut module, ":READ:VOLT? (@1)"), "2.000000E+02V");
        assert_eq!(value(&mut module, ":CURR 1.000000E-06,(@1);*OPC?"), "1");
        assert_eq!(value(&mut module, ":READ:CURR? (@1)"), "1.000000E-06A");
    }

    #[test]
    fn test_on_sets_status_bits() {
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        value(&mut module, ":VOLT ON,(@0);*OPC?");
        assert_eq!(value(&mut module, ":READ:VOLT:ON? (@0)"), "1");
        let status: u32 = value(&mut module, ":READ:CHAN:STATUS? (@0)").parse().unwrap();
        // positive, on, below bounds
        assert_eq!(status, (1 << 0) | (1 << 3) | (1 << 11));
    }

    #[test]
    fn test_emergency_off_and_clear() {
        let mut rng = SimRng::new(Some(8));
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        value(&mut module, ":VOLT ON,(@2);*OPC?");
        module = module.tick(&mut rng);
        value(&mut module, ":VOLT EMCY OFF,(@2);*OPC?");
        assert_eq!(value(&mut module, ":READ:VOLT:EMCY? (@2)"), "1");
        assert_eq!(value(&mut module, ":MEAS:VOLT? (@2)"), "0.000000E+00V");

        value(&mut module, ":VOLT EMCY CLR,(@2);*OPC?");
        assert_eq!(value(&mut module, ":READ:VOLT:EMCY? (@2)"), "0");
    }

    #[test]
    fn test_module_status_healthy() {
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        let raw: i64 = value(&mut module, ":READ:MODULE:STATUS?").parse().unwrap();
        let status = crate::protocol::status::ModuleStatus::from_register(Brand::Iseg, raw).unwrap();
        assert!(status.healthy);
        assert!(!status.event_active);
    }

    #[test]
    fn test_rejected_value() {
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        assert!(matches!(
            module.handle(&request(":CONF:AVER 15;*OPC?")),
            Some(DeviceReply::Rejected(_))
        ));
        assert_eq!(value(&mut module, ":CONF:AVER?"), "64");
    }
}
