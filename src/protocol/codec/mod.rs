//! Frame codecs.
//!
//! A [`FrameCodec`] turns a validated (address, command, value) triple into
//! the bytes of one request frame and turns the raw reply back into string
//! fields. Both brands also know how to read a request frame and write a
//! reply frame, which is what the simulator needs to sit on the far end of a
//! link.
//!
//! | Brand | Request | Reply lines |
//! |-------|---------|-------------|
//! | CAEN  | `$BD:01,CMD:MON,CH:2,PAR:VMON\r\n` | 1 (`#BD:01,CMD:OK,VAL:...`) |
//! | iseg  | `:MEAS:VOLT? (@2)\r\n` | 2 (echo, then value) |

mod caen;
mod iseg;

pub use caen::CaenCodec;
pub use iseg::IsegCodec;

use std::fmt;

use crate::error::Result;
use crate::protocol::commands::CommandDescriptor;
use crate::protocol::{Address, Brand, Direction, Value};

/// Fields decoded from a device reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Board echoed by the device, if the protocol carries one.
    pub board: Option<u8>,
    /// Payload fields, units still attached.
    pub fields: Vec<String>,
}

/// A request frame as seen from the device side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target board and channel.
    pub address: Address,
    /// Monitor or set.
    pub direction: Direction,
    /// Command name as sent.
    pub command: String,
    /// Raw value text, not yet typed.
    pub value: Option<String>,
    /// The frame without its line terminator.
    pub frame: String,
}

/// Device-side answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReply {
    /// Command accepted, nothing to report.
    Ack,
    /// Command accepted, with a payload.
    Value(String),
    /// Command refused.
    Rejected(Rejection),
}

/// Reason a device refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Malformed frame.
    Command,
    /// Channel out of range.
    Channel,
    /// Unknown parameter.
    Parameter,
    /// Value missing, malformed or out of range.
    Value,
    /// Module is in local control and refuses remote sets.
    Local,
}

impl Rejection {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            Rejection::Command => "CMD",
            Rejection::Channel => "CH",
            Rejection::Parameter => "PAR",
            Rejection::Value => "VAL",
            Rejection::Local => "LOC",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:ERR", self.tag())
    }
}

/// Brand-specific wire format.
pub trait FrameCodec: Send + Sync + fmt::Debug {
    /// Brand this codec speaks.
    fn brand(&self) -> Brand;

    /// Number of lines a reply to one request spans.
    fn reply_lines(&self) -> usize;

    /// Encodes a read of `command` at `address`.
    fn encode_monitor(&self, address: Address, command: &CommandDescriptor) -> Vec<u8>;

    /// Encodes a write of `command` at `address`. `value` is `None` for
    /// value-less commands.
    fn encode_set(
        &self,
        address: Address,
        command: &CommandDescriptor,
        value: Option<&Value>,
    ) -> Vec<u8>;

    /// Decodes `raw`, the reply to `sent`, addressed to `address`.
    ///
    /// # Errors
    /// `EmptyResponse` for zero bytes, `InvalidResponse` for grammar or
    /// handshake failures and `AddressMismatch` when the reply names another
    /// board.
    fn decode(&self, sent: &[u8], address: Address, raw: &[u8]) -> Result<Reply>;

    /// Reads a request frame (device side).
    ///
    /// # Errors
    /// `InvalidResponse` if the frame does not follow the request grammar,
    /// `InvalidValue` if it names an address out of range.
    fn decode_request(&self, frame: &[u8]) -> Result<Request>;

    /// Writes the reply frame for `request` (device side).
    fn encode_reply(&self, request: &Request, reply: &DeviceReply) -> Vec<u8>;
}

/// The stateless codec of a brand.
pub fn codec(brand: Brand) -> &'static dyn FrameCodec {
    match brand {
        Brand::Caen => &CaenCodec,
        Brand::Iseg => &IsegCodec,
    }
}

/// Scientific notation with six decimals and a signed two-digit exponent,
/// e.g. `1.000000E+01`.
pub fn format_scientific(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string().to_uppercase();
    }
    let text = format!("{value:.6E}");
    match text.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exponent.abs())
        }
        None => text,
    }
}

/// Plain decimal notation that always keeps a fractional part for whole
/// numbers (`100.0`, `0.25`).
pub fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn utf8(raw: &[u8]) -> Result<&str> {
    std::str::from_utf8(raw).map_err(|_| {
        crate::error::HvpsError::InvalidResponse(format!("reply is not valid ASCII: {raw:?}"))
    })
}
