//! A simulated module: channels, alarm logic and the register file that
//! answers every command of the brand's tables.

use std::collections::HashMap;

use tracing::debug;

use super::channel::SimulatedChannel;
use super::firmware::{firmware, Applied};
use super::rng::SimRng;
use crate::protocol::codec::{DeviceReply, Rejection, Request};
use crate::protocol::commands::{lookup, Allowed, CommandDescriptor, Kind, Literal};
use crate::protocol::status::CaenBoardAlarm;
use crate::protocol::validate::{parse_input, validate_input};
use crate::protocol::{Brand, ControlMode, Direction, InterlockMode, Value};

type RegisterKey = (Option<u8>, &'static str);

/// State of one simulated board.
#[derive(Debug, Clone)]
pub struct SimulatedModule {
    /// Protocol family.
    pub brand: Brand,
    /// Board address.
    pub board: u8,
    /// Model name reported by the firmware.
    pub name: String,
    /// Firmware release string.
    pub firmware_release: String,
    /// Serial number string.
    pub serial_number: String,
    /// Outputs, by index.
    pub channels: Vec<SimulatedChannel>,
    /// Latched board alarm register.
    pub alarm: CaenBoardAlarm,
    /// Interlock input logic.
    pub interlock_mode: InterlockMode,
    /// Local or remote control.
    pub control_mode: ControlMode,
    /// Values of configuration commands that do not feed the physics.
    registers: HashMap<RegisterKey, Value>,
}

/// Per-channel trip probability such that the chance of at least one trip
/// per tick across `channels` outputs equals `module_probability`.
pub fn channel_trip_probability(module_probability: f64, channels: usize) -> f64 {
    if channels == 0 {
        return 0.0;
    }
    let p = module_probability.clamp(0.0, 1.0);
    1.0 - (1.0 - p).powf(1.0 / channels as f64)
}

impl SimulatedModule {
    /// Bare module; the firmware fills in identity and defaults.
    pub fn new(brand: Brand, board: u8, channels: usize, trip_probability: f64) -> Self {
        let per_channel = channel_trip_probability(trip_probability, channels);
        let mut module = Self {
            brand,
            board,
            name: String::new(),
            firmware_release: "1.0".to_string(),
            serial_number: "0001".to_string(),
            channels: vec![SimulatedChannel::new(per_channel); channels],
            alarm: CaenBoardAlarm::empty(),
            interlock_mode: InterlockMode::Closed,
            control_mode: ControlMode::Remote,
            registers: HashMap::new(),
        };
        firmware(brand).initialize(&mut module);
        module
    }

    /// Any alarm bit drives the interlock.
    pub fn interlock_active(&self) -> bool {
        !self.alarm.is_empty()
    }

    /// Clears the alarm register and every channel's trip and interlock.
    pub fn clear_alarm(&mut self) {
        self.alarm = CaenBoardAlarm::empty();
        for channel in &mut self.channels {
            channel.clear_alarms();
        }
    }

    /// Stored value of a configuration command.
    pub fn register(&self, channel: Option<u8>, name: &'static str) -> Option<&Value> {
        self.registers.get(&(channel, name))
    }

    /// Stores a configuration value.
    pub fn set_register(&mut self, channel: Option<u8>, name: &'static str, value: Value) {
        self.registers.insert((channel, name), value);
    }

    /// Advances the module by one tick: latch trips into the alarm register,
    /// propagate the interlock, then tick every channel.
    pub fn tick(&self, rng: &mut SimRng) -> Self {
        let mut next = self.clone();
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.is_tripped() {
                next.alarm |= CaenBoardAlarm::channel(index);
            }
        }
        if next.interlock_active() {
            for channel in &mut next.channels {
                channel.set_interlocked();
            }
        }
        next.channels = next.channels.iter().map(|ch| ch.tick(rng)).collect();
        next
    }

    /// Serves one request frame. Returns `None` when the request is
    /// addressed to another board, which stays silent like real hardware.
    pub fn handle(&mut self, request: &Request) -> Option<DeviceReply> {
        if request.address.board() != self.board {
            debug!(board = request.address.board(), "request for another board ignored");
            return None;
        }
        Some(match self.respond(request) {
            Ok(reply) => reply,
            Err(rejection) => {
                debug!(command = %request.command, %rejection, "request rejected");
                DeviceReply::Rejected(rejection)
            }
        })
    }

    fn respond(&mut self, request: &Request) -> Result<DeviceReply, Rejection> {
        let channel = request.address.channel_index();
        if let Some(ch) = channel {
            if usize::from(ch) >= self.channels.len() {
                return Err(Rejection::Channel);
            }
        }
        let entity = request.address.entity();
        let command = lookup(self.brand, entity, request.direction, &request.command)
            .map_err(|_| Rejection::Parameter)?;

        match request.direction {
            Direction::Monitor => {
                let value = self.read(channel, command);
                Ok(DeviceReply::Value(firmware(self.brand).render(command, &value)))
            }
            Direction::Set => {
                let value =
                    parse_input(command, request.value.as_deref()).map_err(|_| Rejection::Value)?;
                validate_input(command, value.as_ref()).map_err(|_| Rejection::Value)?;
                if self.control_mode == ControlMode::Local && command.name != "BDCTR" {
                    return Err(Rejection::Local);
                }
                self.write(channel, command, value);
                Ok(firmware(self.brand).acknowledge())
            }
        }
    }

    fn read(&self, channel: Option<u8>, command: &'static CommandDescriptor) -> Value {
        let fw = firmware(self.brand);
        let live = match channel {
            Some(ch) => fw.read_channel(&self.channels[usize::from(ch)], command.name),
            None => fw.read_module(self, command.name),
        };
        live.or_else(|| self.register(channel, command.name).cloned())
            .unwrap_or_else(|| default_value(command))
    }

    fn write(&mut self, channel: Option<u8>, command: &'static CommandDescriptor, value: Option<Value>) {
        let fw = firmware(self.brand);
        let applied = match channel {
            Some(ch) => fw.write_channel(&mut self.channels[usize::from(ch)], command.name, value.as_ref()),
            None => fw.write_module(self, command.name, value.as_ref()),
        };
        match (applied, value) {
            (Applied::Store(key), Some(value)) => self.set_register(channel, key, value),
            (Applied::Store(_), None) | (Applied::Done, _) => {}
        }
        debug!(brand = %self.brand, ?channel, command = command.name, "setting applied");
    }
}

/// What a never-written register reads as: the first possible answer, else
/// zero.
fn default_value(command: &CommandDescriptor) -> Value {
    let literal = |lit: &Literal| match lit {
        Literal::Int(v) => Value::Int(*v),
        Literal::Str(s) => Value::Str((*s).to_string()),
    };
    match (command.output, command.possible_outputs) {
        (Kind::ListOf(_), Allowed::OneOf(set)) => Value::List(set.iter().map(literal).collect()),
        (Kind::ListOf(_), _) => Value::List(Vec::new()),
        (_, Allowed::OneOf(set)) if !set.is_empty() => literal(&set[0]),
        (_, Allowed::Range(lo, _)) => Value::Int(lo),
        (Kind::Float, _) => Value::Float(0.0),
        (Kind::Str, _) => Value::Str(String::new()),
        _ => Value::Int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::codec;

    fn request(brand: Brand, frame: &str) -> Request {
        codec(brand).decode_request(frame.as_bytes()).unwrap()
    }

    #[test]
    fn test_channel_trip_probability() {
        assert_eq!(channel_trip_probability(0.0, 4), 0.0);
        let p = channel_trip_probability(0.05, 4);
        let module = 1.0 - (1.0 - p).powi(4);
        assert!((module - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_trip_raises_alarm_and_interlocks_all() {
        let mut rng = SimRng::new(Some(1));
        let mut module = SimulatedModule::new(Brand::Caen, 0, 4, 0.0);
        for ch in &mut module.channels {
            ch.turn_on();
        }
        module = module.tick(&mut rng);
        module.channels[2].trip_probability = 1.0;
        module = module.tick(&mut rng);
        assert!(module.channels[2].is_tripped());

        module = module.tick(&mut rng);
        assert!(module.alarm.contains(CaenBoardAlarm::CH2));
        assert!(module.interlock_active());
        assert!(module.channels.iter().all(|ch| !ch.is_on()));

        module.clear_alarm();
        assert!(!module.interlock_active());
        assert!(module.channels.iter().all(|ch| !ch.is_tripped()));
    }

    #[test]
    fn test_unknown_parameter_and_channel() {
        let mut module = SimulatedModule::new(Brand::Caen, 0, 4, 0.0);
        assert_eq!(
            module.handle(&request(Brand::Caen, "$BD:00,CMD:MON,CH:0,PAR:NOPE\r\n")),
            Some(DeviceReply::Rejected(Rejection::Parameter))
        );
        assert_eq!(
            module.handle(&request(Brand::Caen, "$BD:00,CMD:MON,CH:5,PAR:VMON\r\n")),
            Some(DeviceReply::Rejected(Rejection::Channel))
        );
        assert_eq!(
            module.handle(&request(Brand::Caen, "$BD:00,CMD:SET,CH:0,PAR:PDWN,VAL:SLOW\r\n")),
            Some(DeviceReply::Rejected(Rejection::Value))
        );
    }

    #[test]
    fn test_other_board_is_silent() {
        let mut module = SimulatedModule::new(Brand::Caen, 3, 4, 0.0);
        assert_eq!(module.handle(&request(Brand::Caen, "$BD:01,CMD:MON,PAR:BDNAME\r\n")), None);
        assert!(module.handle(&request(Brand::Caen, "$BD:03,CMD:MON,PAR:BDNAME\r\n")).is_some());
    }

    #[test]
    fn test_local_control_refuses_sets() {
        let mut module = SimulatedModule::new(Brand::Caen, 0, 4, 0.0);
        module.handle(&request(Brand::Caen, "$BD:00,CMD:SET,PAR:BDCTR,VAL:LOCAL\r\n"));
        assert_eq!(
            module.handle(&request(Brand::Caen, "$BD:00,CMD:SET,CH:0,PAR:VSET,VAL:10\r\n")),
            Some(DeviceReply::Rejected(Rejection::Local))
        );
        assert_eq!(
            module.handle(&request(Brand::Caen, "$BD:00,CMD:SET,PAR:BDCTR,VAL:REMOTE\r\n")),
            Some(DeviceReply::Ack)
        );
    }

    #[test]
    fn test_config_registers_round_trip() {
        let mut module = SimulatedModule::new(Brand::Iseg, 0, 4, 0.0);
        module.handle(&request(Brand::Iseg, ":CONF:TRIP:ACTION 2,(@1);*OPC?\r\n"));
        assert_eq!(
            module.handle(&request(Brand::Iseg, ":CONF:TRIP:ACTION? (@1)\r\n")),
            Some(DeviceReply::Value("2".into()))
        );
        assert_eq!(
            module.handle(&request(Brand::Iseg, ":CONF:TRIP:ACTION? (@0)\r\n")),
            Some(DeviceReply::Value("0".into()))
        );
    }
}
