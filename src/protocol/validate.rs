//! Input and output checks against a [`CommandDescriptor`].
//!
//! Input validation runs before encoding, so a rejected value never reaches
//! the wire. Output validation turns the raw string fields of a decoded reply
//! into a typed [`Value`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{HvpsError, Result};
use crate::protocol::commands::{CommandDescriptor, Kind, Scalar};
use crate::protocol::Value;

/// Checks a caller-supplied value against the command's input contract.
///
/// # Errors
/// `InvalidValue` when the value is missing, superfluous, of the wrong type
/// or outside the allowed set.
pub fn validate_input(command: &CommandDescriptor, value: Option<&Value>) -> Result<()> {
    let value = match (command.input, value) {
        (Kind::None, None) => return Ok(()),
        (Kind::None, Some(v)) => {
            return Err(HvpsError::InvalidValue(format!(
                "{} takes no value, got '{v}'",
                command.name
            )))
        }
        (_, None) => {
            return Err(HvpsError::InvalidValue(format!(
                "{} requires a value",
                command.name
            )))
        }
        (kind, Some(v)) => {
            let matches = matches!(
                (kind, v),
                (Kind::Int, Value::Int(_)) | (Kind::Float, Value::Float(_)) | (Kind::Str, Value::Str(_))
            );
            if !matches {
                return Err(HvpsError::InvalidValue(format!(
                    "{} expects {kind:?}, got {} '{v}'",
                    command.name,
                    v.type_name()
                )));
            }
            v
        }
    };

    if let Value::Float(f) = value {
        if !f.is_finite() {
            return Err(HvpsError::InvalidValue(format!(
                "{} requires a finite number, got {f}",
                command.name
            )));
        }
    }

    if !command.allowed_inputs.admits(value) {
        return Err(HvpsError::InvalidValue(format!(
            "{} does not accept '{value}', allowed: {}",
            command.name,
            command.allowed_inputs.describe()
        )));
    }
    Ok(())
}

/// Converts decoded reply fields according to the command's output contract.
///
/// Returns `None` for commands that answer nothing.
///
/// # Errors
/// `InvalidResponse` when the field count, type or value does not match.
pub fn validate_output(command: &CommandDescriptor, fields: &[String]) -> Result<Option<Value>> {
    let value = match command.output {
        Kind::None => {
            if fields.iter().any(|f| !f.trim().is_empty()) {
                return Err(HvpsError::InvalidResponse(format!(
                    "no response expected for {}, got '{}'",
                    command.name,
                    fields.join(",")
                )));
            }
            return Ok(None);
        }
        Kind::ListOf(scalar) => {
            let items = fields
                .iter()
                .map(|f| parse_field(command, scalar, f))
                .collect::<Result<Vec<_>>>()?;
            if let Some(bad) = items.iter().find(|v| !command.possible_outputs.admits(v)) {
                return Err(unexpected(command, bad));
            }
            Value::List(items)
        }
        kind => {
            let [field] = fields else {
                return Err(HvpsError::InvalidResponse(format!(
                    "{} expects exactly one value, got {}",
                    command.name,
                    fields.len()
                )));
            };
            let scalar = kind.scalar().ok_or_else(|| {
                HvpsError::InvalidResponse(format!("{} has no scalar output", command.name))
            })?;
            let value = parse_field(command, scalar, field)?;
            if !command.possible_outputs.admits(&value) {
                return Err(unexpected(command, &value));
            }
            value
        }
    };
    Ok(Some(value))
}

fn unexpected(command: &CommandDescriptor, value: &Value) -> HvpsError {
    HvpsError::InvalidResponse(format!(
        "{} answered '{value}', possible: {}",
        command.name,
        command.possible_outputs.describe()
    ))
}

fn parse_field(command: &CommandDescriptor, scalar: Scalar, field: &str) -> Result<Value> {
    let text = match scalar {
        Scalar::Str => field.trim(),
        Scalar::Int | Scalar::Float => strip_units(field, command.unit),
    };
    parse_scalar(scalar, text).map_err(|_| {
        HvpsError::InvalidResponse(format!(
            "{} answered '{}', not a valid {scalar:?}",
            command.name,
            field.trim()
        ))
    })
}

/// A number followed by an optional unit made of letters, `/` and `%`.
static NUMBER_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*[A-Za-z/%]*$")
        .expect("Invalid unit regex")
});

/// Removes a trailing unit from a numeric field.
///
/// The named suffix is removed first; any remaining trailing letters, `/`
/// and `%` go too. Exponent markers survive because they are always
/// followed by digits. Text that is not a number comes back trimmed and
/// fails to parse later.
pub fn strip_units<'a>(field: &'a str, unit: Option<&str>) -> &'a str {
    let mut text = field.trim();
    if let Some(unit) = unit {
        text = text.strip_suffix(unit).unwrap_or(text).trim_end();
    }
    NUMBER_WITH_UNIT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// Parses free text (e.g. a CLI argument or a request frame field) as a
/// scalar of the given type.
///
/// # Errors
/// `InvalidValue` if the text does not parse.
pub fn parse_scalar(scalar: Scalar, text: &str) -> Result<Value> {
    let text = text.trim();
    let parsed = match scalar {
        Scalar::Int => text.parse::<i64>().ok().map(Value::Int),
        Scalar::Float => text
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float),
        Scalar::Str => Some(Value::Str(text.to_string())),
    };
    parsed.ok_or_else(|| HvpsError::InvalidValue(format!("'{text}' is not a valid {scalar:?}")))
}

/// Parses text as the input of `command`, or `None` for value-less commands.
///
/// # Errors
/// `InvalidValue` if text is given for a value-less command (or missing for
/// one that needs it) or does not parse.
pub fn parse_input(command: &CommandDescriptor, text: Option<&str>) -> Result<Option<Value>> {
    match (command.input.scalar(), text) {
        (None, None) => Ok(None),
        (None, Some(t)) => Err(HvpsError::InvalidValue(format!(
            "{} takes no value, got '{t}'",
            command.name
        ))),
        (Some(_), None) => Err(HvpsError::InvalidValue(format!(
            "{} requires a value",
            command.name
        ))),
        (Some(scalar), Some(t)) => parse_scalar(scalar, t).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::{lookup, table, Allowed, Literal};
    use crate::protocol::{Brand, Direction, Entity};

    fn fields(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_units() {
        assert_eq!(strip_units("10.5kg", None), "10.5");
        assert_eq!(strip_units("1.23400E3V", Some("V")), "1.23400E3");
        assert_eq!(strip_units("5.0E1V/s", Some("V/s")), "5.0E1");
        assert_eq!(strip_units("2.5E-06A", None), "2.5E-06");
        assert_eq!(strip_units(" 42 ", None), "42");
        assert_eq!(strip_units("-3.3 V", None), "-3.3");
        assert_eq!(strip_units("1.000000E+02%/s", Some("%/s")), "1.000000E+02");
        // not a number: left for the parser to reject
        assert_eq!(strip_units("ON", None), "ON");
    }

    #[test]
    fn test_input_type_mismatch() {
        let vset = lookup(Brand::Caen, Entity::Channel, Direction::Set, "VSET").unwrap();
        assert!(validate_input(vset, Some(&Value::Float(10.0))).is_ok());
        assert!(matches!(
            validate_input(vset, Some(&Value::from("10"))),
            Err(HvpsError::InvalidValue(_))
        ));
        assert!(validate_input(vset, None).is_err());
        assert!(validate_input(vset, Some(&Value::Float(f64::NAN))).is_err());
    }

    #[test]
    fn test_valueless_command_rejects_value() {
        let on = lookup(Brand::Caen, Entity::Channel, Direction::Set, "ON").unwrap();
        assert!(validate_input(on, None).is_ok());
        assert!(validate_input(on, Some(&Value::Int(1))).is_err());
    }

    #[test]
    fn test_allowed_inputs_enforced_for_every_constrained_command() {
        for brand in [Brand::Caen, Brand::Iseg] {
            for entity in [Entity::Module, Entity::Channel] {
                for c in table(brand, entity, Direction::Set).commands {
                    match c.allowed_inputs {
                        Allowed::Any => {}
                        Allowed::OneOf(set) => {
                            for lit in set {
                                let v = match lit {
                                    Literal::Int(i) => Value::Int(*i),
                                    Literal::Str(s) => Value::from(*s),
                                };
                                assert!(validate_input(c, Some(&v)).is_ok(), "{} {v}", c.name);
                            }
                            let outside = match set[0] {
                                Literal::Int(_) => Value::Int(-12345),
                                Literal::Str(_) => Value::from("NOT-ALLOWED"),
                            };
                            assert!(validate_input(c, Some(&outside)).is_err(), "{}", c.name);
                        }
                        Allowed::Range(lo, hi) => {
                            assert!(validate_input(c, Some(&Value::Int(lo))).is_ok());
                            assert!(validate_input(c, Some(&Value::Int(hi))).is_ok());
                            assert!(validate_input(c, Some(&Value::Int(lo - 1))).is_err());
                            assert!(validate_input(c, Some(&Value::Int(hi + 1))).is_err());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_iseg_average_rejects_15() {
        let aver = lookup(Brand::Iseg, Entity::Module, Direction::Set, ":CONF:AVER").unwrap();
        assert!(validate_input(aver, Some(&Value::Int(16))).is_ok());
        assert!(validate_input(aver, Some(&Value::Int(15))).is_err());
    }

    #[test]
    fn test_output_scalar() {
        let vmon = lookup(Brand::Caen, Entity::Channel, Direction::Monitor, "VMON").unwrap();
        assert_eq!(
            validate_output(vmon, &fields(&["0100.5"])).unwrap(),
            Some(Value::Float(100.5))
        );
        assert!(validate_output(vmon, &fields(&["abc"])).is_err());
        assert!(validate_output(vmon, &fields(&[])).is_err());
        assert!(validate_output(vmon, &fields(&["1", "2"])).is_err());
    }

    #[test]
    fn test_output_possible_values() {
        let pdwn = lookup(Brand::Caen, Entity::Channel, Direction::Monitor, "PDWN").unwrap();
        assert_eq!(
            validate_output(pdwn, &fields(&["KILL"])).unwrap(),
            Some(Value::from("KILL"))
        );
        assert!(matches!(
            validate_output(pdwn, &fields(&["SLOW"])),
            Err(HvpsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_output_list() {
        let pols = lookup(Brand::Iseg, Entity::Channel, Direction::Monitor, ":CONF:OUTPUT:POL:LIST")
            .unwrap();
        assert_eq!(
            validate_output(pols, &fields(&["p", "n"])).unwrap(),
            Some(Value::List(vec![Value::from("p"), Value::from("n")]))
        );
        let modes = lookup(Brand::Iseg, Entity::Channel, Direction::Monitor, ":READ:VOLT:MODE:LIST")
            .unwrap();
        assert_eq!(
            validate_output(modes, &fields(&["2.0E3V", "4.0E3V", "6.0E3V"])).unwrap(),
            Some(Value::List(vec![
                Value::Float(2000.0),
                Value::Float(4000.0),
                Value::Float(6000.0)
            ]))
        );
    }

    #[test]
    fn test_output_none_rejects_payload() {
        let on = lookup(Brand::Caen, Entity::Channel, Direction::Set, "ON").unwrap();
        assert_eq!(validate_output(on, &[]).unwrap(), None);
        assert!(matches!(
            validate_output(on, &fields(&["1"])),
            Err(HvpsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_iseg_set_requires_opc_one() {
        let volt = lookup(Brand::Iseg, Entity::Channel, Direction::Set, ":VOLT").unwrap();
        assert_eq!(validate_output(volt, &fields(&["1"])).unwrap(), Some(Value::Int(1)));
        assert!(validate_output(volt, &fields(&["0"])).is_err());
    }

    #[test]
    fn test_parse_input() {
        let vset = lookup(Brand::Caen, Entity::Channel, Direction::Set, "VSET").unwrap();
        assert_eq!(parse_input(vset, Some("12.5")).unwrap(), Some(Value::Float(12.5)));
        assert!(parse_input(vset, Some("twelve")).is_err());
        let on = lookup(Brand::Caen, Entity::Channel, Direction::Set, "ON").unwrap();
        assert_eq!(parse_input(on, None).unwrap(), None);
        assert!(parse_input(on, Some("1")).is_err());
    }
}
