use once_cell::sync::Lazy;
use regex::Regex;

use super::{format_decimal, utf8, DeviceReply, FrameCodec, Reply, Request};
use crate::error::{HvpsError, Result};
use crate::protocol::commands::CommandDescriptor;
use crate::protocol::{Address, Brand, Direction, Value};

static REPLY_OK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#BD:(\d{2}),CMD:OK(?:,VAL:(.+))?$").expect("Invalid CAEN reply regex")
});

static REPLY_ERR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#BD:(\d{2}),(CMD|CH|PAR|VAL|LOC):ERR$").expect("Invalid CAEN error regex")
});

static REQUEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$BD:(\d{1,2}),CMD:(MON|SET)(?:,CH:(\d+))?,PAR:([A-Za-z]+)(?:,VAL:(.+))?$")
        .expect("Invalid CAEN request regex")
});

/// `$BD:` / `#BD:` fixed-field frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaenCodec;

impl CaenCodec {
    fn frame(address: Address, cmd: &str, name: &str, value: Option<&Value>) -> Vec<u8> {
        let mut frame = format!("$BD:{:02},CMD:{cmd}", address.board());
        if let Some(ch) = address.channel_index() {
            frame.push_str(&format!(",CH:{ch}"));
        }
        frame.push_str(&format!(",PAR:{name}"));
        if let Some(value) = value {
            frame.push_str(&format!(",VAL:{}", render(value)));
        }
        frame.push_str("\r\n");
        frame.into_bytes()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Float(v) => format_decimal(*v),
        other => other.to_string(),
    }
}

impl FrameCodec for CaenCodec {
    fn brand(&self) -> Brand {
        Brand::Caen
    }

    fn reply_lines(&self) -> usize {
        1
    }

    fn encode_monitor(&self, address: Address, command: &CommandDescriptor) -> Vec<u8> {
        Self::frame(address, "MON", command.name, None)
    }

    fn encode_set(
        &self,
        address: Address,
        command: &CommandDescriptor,
        value: Option<&Value>,
    ) -> Vec<u8> {
        Self::frame(address, "SET", command.name, value)
    }

    fn decode(&self, _sent: &[u8], address: Address, raw: &[u8]) -> Result<Reply> {
        let text = utf8(raw)?.trim();
        if text.is_empty() {
            return Err(HvpsError::EmptyResponse);
        }

        if let Some(caps) = REPLY_OK.captures(text) {
            let board = parse_board(&caps[1])?;
            check_board(address, board)?;
            let fields = caps
                .get(2)
                .map(|m| vec![m.as_str().to_string()])
                .unwrap_or_default();
            return Ok(Reply {
                board: Some(board),
                fields,
            });
        }

        if let Some(caps) = REPLY_ERR.captures(text) {
            let board = parse_board(&caps[1])?;
            check_board(address, board)?;
            return Err(HvpsError::InvalidResponse(format!(
                "device rejected the command ({}:ERR)",
                &caps[2]
            )));
        }

        Err(HvpsError::InvalidResponse(format!(
            "unexpected reply '{text}'"
        )))
    }

    fn decode_request(&self, frame: &[u8]) -> Result<Request> {
        let text = utf8(frame)?.trim_end_matches(['\r', '\n']);
        let caps = REQUEST.captures(text).ok_or_else(|| {
            HvpsError::InvalidResponse(format!("not a CAEN request frame: '{text}'"))
        })?;

        let board = parse_board(&caps[1])?;
        let address = match caps.get(3) {
            Some(ch) => {
                let ch = ch.as_str().parse::<u8>().map_err(|_| {
                    HvpsError::InvalidValue(format!("channel '{}' out of range", ch.as_str()))
                })?;
                Address::channel(board, ch)?
            }
            None => Address::module(board)?,
        };
        let direction = if &caps[2] == "MON" {
            Direction::Monitor
        } else {
            Direction::Set
        };

        Ok(Request {
            address,
            direction,
            command: caps[4].to_string(),
            value: caps.get(5).map(|m| m.as_str().to_string()),
            frame: text.to_string(),
        })
    }

    fn encode_reply(&self, request: &Request, reply: &DeviceReply) -> Vec<u8> {
        let board = request.address.board();
        let text = match reply {
            DeviceReply::Ack => format!("#BD:{board:02},CMD:OK\r\n"),
            DeviceReply::Value(v) => format!("#BD:{board:02},CMD:OK,VAL:{v}\r\n"),
            DeviceReply::Rejected(r) => format!("#BD:{board:02},{r}\r\n"),
        };
        text.into_bytes()
    }
}

fn parse_board(text: &str) -> Result<u8> {
    text.parse::<u8>()
        .map_err(|_| HvpsError::InvalidResponse(format!("bad board field '{text}'")))
}

fn check_board(address: Address, board: u8) -> Result<()> {
    if board != address.board() {
        return Err(HvpsError::AddressMismatch {
            expected: address.board(),
            actual: board,
        });
    }
    Ok(())
}
