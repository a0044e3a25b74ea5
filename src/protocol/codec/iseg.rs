use once_cell::sync::Lazy;
use regex::Regex;

use super::{format_scientific, utf8, DeviceReply, FrameCodec, Reply, Request};
use crate::error::{HvpsError, Result};
use crate::protocol::commands::{table, CommandDescriptor};
use crate::protocol::{Address, Brand, Direction, Entity, Value};

const OPC_SUFFIX: &str = ";*OPC?";
/// Payload the simulator uses for a refused request.
const REJECTED: &str = "?";

static MONITOR_REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^?\s][^?]*)\?\s*(?:\(@(\d+)\))?$").expect("Invalid iseg query regex")
});

static CHANNEL_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*),\(@(\d+)\)$").expect("Invalid iseg channel regex"));

/// SCPI-like frames with an echo handshake.
///
/// The device echoes every request line before answering, so one exchange
/// spans two reply lines. Replies carry no address; correlation relies on
/// there being a single request in flight.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsegCodec;

fn render(value: &Value) -> String {
    match value {
        Value::Float(v) => format_scientific(*v),
        other => other.to_string(),
    }
}

/// Splits a value line into comma-separated fields.
pub fn split_fields(line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    line.split(',').map(|f| f.trim().to_string()).collect()
}

impl FrameCodec for IsegCodec {
    fn brand(&self) -> Brand {
        Brand::Iseg
    }

    fn reply_lines(&self) -> usize {
        2
    }

    fn encode_monitor(&self, address: Address, command: &CommandDescriptor) -> Vec<u8> {
        let name = command.name.trim();
        let frame = match address.channel_index() {
            Some(ch) => format!("{name}? (@{ch})\r\n"),
            None => format!("{name}?\r\n"),
        };
        frame.into_bytes()
    }

    fn encode_set(
        &self,
        address: Address,
        command: &CommandDescriptor,
        value: Option<&Value>,
    ) -> Vec<u8> {
        let mut frame = command.name.trim().to_string();
        if let Some(value) = value {
            frame.push(' ');
            frame.push_str(&render(value));
        }
        if let Some(ch) = address.channel_index() {
            frame.push_str(&format!(",(@{ch})"));
        }
        frame.push_str(OPC_SUFFIX);
        frame.push_str("\r\n");
        frame.into_bytes()
    }

    fn decode(&self, sent: &[u8], _address: Address, raw: &[u8]) -> Result<Reply> {
        let text = utf8(raw)?;
        if text.trim().is_empty() {
            return Err(HvpsError::EmptyResponse);
        }
        let mut lines = text.lines();

        let echo = lines.next().unwrap_or_default().trim();
        let expected = utf8(sent)?.trim();
        if echo != expected {
            return Err(HvpsError::InvalidResponse(format!(
                "invalid handshake echo '{echo}', expected '{expected}'"
            )));
        }

        let payload = lines.next().ok_or_else(|| {
            HvpsError::InvalidResponse(format!("no value line after echo of '{expected}'"))
        })?;
        if payload.trim() == REJECTED {
            return Err(HvpsError::InvalidResponse(format!(
                "device rejected '{expected}'"
            )));
        }

        Ok(Reply {
            board: None,
            fields: split_fields(payload),
        })
    }

    fn decode_request(&self, frame: &[u8]) -> Result<Request> {
        let text = utf8(frame)?.trim_end_matches(['\r', '\n']);

        if let Some(body) = text.strip_suffix(OPC_SUFFIX) {
            let (body, channel) = match CHANNEL_CLAUSE.captures(body) {
                Some(caps) => (
                    caps.get(1).map_or("", |m| m.as_str()),
                    Some(parse_channel(&caps[2])?),
                ),
                None => (body, None),
            };
            let address = address_for(channel)?;
            let (command, value) = split_set_body(address.entity(), body.trim());
            return Ok(Request {
                address,
                direction: Direction::Set,
                command,
                value,
                frame: text.to_string(),
            });
        }

        let caps = MONITOR_REQUEST.captures(text).ok_or_else(|| {
            HvpsError::InvalidResponse(format!("not an iseg request frame: '{text}'"))
        })?;
        let channel = caps.get(2).map(|m| parse_channel(m.as_str())).transpose()?;
        Ok(Request {
            address: address_for(channel)?,
            direction: Direction::Monitor,
            command: caps[1].trim().to_string(),
            value: None,
            frame: text.to_string(),
        })
    }

    fn encode_reply(&self, request: &Request, reply: &DeviceReply) -> Vec<u8> {
        let payload = match reply {
            DeviceReply::Ack => "1",
            DeviceReply::Value(v) => v.as_str(),
            DeviceReply::Rejected(_) => REJECTED,
        };
        format!("{}\r\n{payload}\r\n", request.frame).into_bytes()
    }
}

fn parse_channel(text: &str) -> Result<u8> {
    text.parse::<u8>()
        .map_err(|_| HvpsError::InvalidValue(format!("channel '{text}' out of range")))
}

fn address_for(channel: Option<u8>) -> Result<Address> {
    match channel {
        Some(ch) => Address::channel(0, ch),
        None => Address::module(0),
    }
}

/// Separates the command name from its value. Names may contain spaces
/// (`:VOLT EMCY OFF`), so the longest known name that prefixes the body wins.
fn split_set_body(entity: Entity, body: &str) -> (String, Option<String>) {
    let known = table(Brand::Iseg, entity, Direction::Set)
        .commands
        .iter()
        .map(|c| c.name)
        .filter(|name| {
            body == *name
                || body
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with(' '))
        })
        .max_by_key(|name| name.len());

    let (name, rest) = match known {
        Some(name) => (name, &body[name.len()..]),
        None => body.split_once(' ').unwrap_or((body, "")),
    };
    let rest = rest.trim();
    (
        name.to_string(),
        (!rest.is_empty()).then(|| rest.to_string()),
    )
}
