//! Wire-level vocabulary shared by the device layer and the simulator.
//!
//! Everything in here is pure: command tables, validation, frame encoding and
//! decoding, status register decoding. No module in `protocol` performs I/O.

/// Frame encoding and decoding per brand.
pub mod codec;
/// Static command tables.
pub mod commands;
/// Status register decoding.
pub mod status;
/// Client-side checks of values against command contracts.
pub mod validate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HvpsError, Result};

/// Highest board address on a CAEN daisy chain.
pub const MAX_BOARD: u8 = 31;
/// Highest channel index of a module.
pub const MAX_CHANNEL: u8 = 7;

/// Device family. Selects the command tables and the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    /// CAEN desktop modules (N1470 family), fixed-field `$BD:` frames.
    Caen,
    /// iseg modules, SCPI-like frames with an echo handshake.
    Iseg,
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Brand::Caen => write!(f, "CAEN"),
            Brand::Iseg => write!(f, "iseg"),
        }
    }
}

impl FromStr for Brand {
    type Err = HvpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "caen" => Ok(Brand::Caen),
            "iseg" => Ok(Brand::Iseg),
            other => Err(HvpsError::InvalidValue(format!(
                "unknown brand '{other}', expected 'caen' or 'iseg'"
            ))),
        }
    }
}

/// Whether a command addresses the whole module or one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    /// The whole board.
    Module,
    /// One output channel.
    Channel,
}

/// Whether a command reads (monitor) or writes (set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Read a value.
    Monitor,
    /// Write a value or trigger an action.
    Set,
}

/// Board plus optional channel. Only constructible within range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    board: u8,
    channel: Option<u8>,
}

impl Address {
    /// Module-level address.
    ///
    /// # Errors
    /// `InvalidValue` if `board` exceeds [`MAX_BOARD`].
    pub fn module(board: u8) -> Result<Self> {
        if board > MAX_BOARD {
            return Err(HvpsError::InvalidValue(format!(
                "board {board} out of range 0..={MAX_BOARD}"
            )));
        }
        Ok(Self {
            board,
            channel: None,
        })
    }

    /// Channel-level address.
    ///
    /// # Errors
    /// `InvalidValue` if either index is out of range.
    pub fn channel(board: u8, channel: u8) -> Result<Self> {
        let module = Self::module(board)?;
        if channel > MAX_CHANNEL {
            return Err(HvpsError::InvalidValue(format!(
                "channel {channel} out of range 0..={MAX_CHANNEL}"
            )));
        }
        Ok(Self {
            channel: Some(channel),
            ..module
        })
    }

    /// Board index.
    pub fn board(&self) -> u8 {
        self.board
    }

    /// Channel index, `None` for a module address.
    pub fn channel_index(&self) -> Option<u8> {
        self.channel
    }

    /// Module or channel, depending on whether a channel is set.
    pub fn entity(&self) -> Entity {
        match self.channel {
            Some(_) => Entity::Channel,
            None => Entity::Module,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(ch) => write!(f, "BD{:02}/CH{}", self.board, ch),
            None => write!(f, "BD{:02}", self.board),
        }
    }
}

/// Runtime value carried in or out of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Text, including enumerated keywords such as `ON`.
    Str(String),
    /// Comma-separated list.
    List(Vec<Value>),
}

impl Value {
    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view. Floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// What a channel does when it trips or is interlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerDownMode {
    /// Ramp down at the ramp-down rate.
    Ramp,
    /// Cut the output immediately.
    Kill,
}

impl PowerDownMode {
    /// Keyword sent on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            PowerDownMode::Ramp => "RAMP",
            PowerDownMode::Kill => "KILL",
        }
    }
}

impl FromStr for PowerDownMode {
    type Err = HvpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RAMP" => Ok(PowerDownMode::Ramp),
            "KILL" => Ok(PowerDownMode::Kill),
            other => Err(HvpsError::InvalidResponse(format!(
                "unknown power-down mode '{other}'"
            ))),
        }
    }
}

/// Current monitor range of a CAEN channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrentRange {
    /// Full-scale range.
    High,
    /// Higher resolution, lower full scale.
    Low,
}

impl CurrentRange {
    /// Keyword sent on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            CurrentRange::High => "HIGH",
            CurrentRange::Low => "LOW",
        }
    }
}

impl FromStr for CurrentRange {
    type Err = HvpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HIGH" => Ok(CurrentRange::High),
            "LOW" => Ok(CurrentRange::Low),
            other => Err(HvpsError::InvalidResponse(format!(
                "unknown current range '{other}'"
            ))),
        }
    }
}

/// Interlock input logic of a CAEN module (`BDILKM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterlockMode {
    /// Interlock asserted while the input is open.
    Open,
    /// Interlock asserted while the input is closed.
    Closed,
}

impl InterlockMode {
    /// Keyword sent on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            InterlockMode::Open => "OPEN",
            InterlockMode::Closed => "CLOSED",
        }
    }
}

impl FromStr for InterlockMode {
    type Err = HvpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OPEN" => Ok(InterlockMode::Open),
            "CLOSED" => Ok(InterlockMode::Closed),
            other => Err(HvpsError::InvalidResponse(format!(
                "unknown interlock mode '{other}'"
            ))),
        }
    }
}

/// Whether a CAEN module accepts settings from the front panel or the bus
/// (`BDCTR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMode {
    /// Front panel.
    Local,
    /// Serial bus.
    Remote,
}

impl ControlMode {
    /// Keyword sent on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ControlMode::Local => "LOCAL",
            ControlMode::Remote => "REMOTE",
        }
    }
}

impl FromStr for ControlMode {
    type Err = HvpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LOCAL" => Ok(ControlMode::Local),
            "REMOTE" => Ok(ControlMode::Remote),
            other => Err(HvpsError::InvalidResponse(format!(
                "unknown control mode '{other}'"
            ))),
        }
    }
}

/// Output polarity. CAEN reports `+`/`-`, iseg `p`/`n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Positive output.
    Positive,
    /// Negative output.
    Negative,
}

impl Polarity {
    /// Parses either brand's spelling.
    pub fn from_wire(s: &str) -> Result<Self> {
        match s {
            "+" | "p" => Ok(Polarity::Positive),
            "-" | "n" => Ok(Polarity::Negative),
            other => Err(HvpsError::InvalidResponse(format!(
                "unknown polarity '{other}'"
            ))),
        }
    }

    /// The brand's spelling.
    pub fn as_wire(&self, brand: Brand) -> &'static str {
        match (brand, self) {
            (Brand::Caen, Polarity::Positive) => "+",
            (Brand::Caen, Polarity::Negative) => "-",
            (Brand::Iseg, Polarity::Positive) => "p",
            (Brand::Iseg, Polarity::Negative) => "n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_ranges() {
        assert!(Address::module(0).is_ok());
        assert!(Address::module(31).is_ok());
        assert!(matches!(
            Address::module(32),
            Err(HvpsError::InvalidValue(_))
        ));
        assert!(Address::channel(3, 7).is_ok());
        assert!(matches!(
            Address::channel(3, 8),
            Err(HvpsError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_address_entity() {
        let addr = Address::channel(1, 2).unwrap();
        assert_eq!(addr.entity(), Entity::Channel);
        assert_eq!(addr.board(), 1);
        assert_eq!(addr.channel_index(), Some(2));
        assert_eq!(Address::module(1).unwrap().entity(), Entity::Module);
        assert_eq!(addr.to_string(), "BD01/CH2");
    }

    #[test]
    fn test_brand_parse() {
        assert_eq!("CAEN".parse::<Brand>().unwrap(), Brand::Caen);
        assert_eq!("iseg".parse::<Brand>().unwrap(), Brand::Iseg);
        assert!("wiener".parse::<Brand>().is_err());
    }

    #[test]
    fn test_value_display_list() {
        let v = Value::List(vec![Value::from("p"), Value::from("n")]);
        assert_eq!(v.to_string(), "p,n");
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::from("x").as_f64(), None);
    }

    #[test]
    fn test_polarity_spellings() {
        assert_eq!(Polarity::from_wire("+").unwrap(), Polarity::Positive);
        assert_eq!(Polarity::from_wire("n").unwrap(), Polarity::Negative);
        assert_eq!(Polarity::Negative.as_wire(Brand::Caen), "-");
        assert!(Polarity::from_wire("x").is_err());
    }
}
