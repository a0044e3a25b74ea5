//! Static command tables.
//!
//! One table exists per (brand, entity, direction), eight in total. A
//! [`CommandDescriptor`] is the full contract of one command: what it accepts,
//! what it answers, which literal values are legal on either side and which
//! unit suffix the device may append to numbers.
//!
//! Tables are `static` arrays built with `const fn` helpers, so lookups never
//! allocate and the tables cannot be mutated at runtime.

mod caen;
mod iseg;

use crate::error::{HvpsError, Result};
use crate::protocol::{Brand, Direction, Entity, Value};

/// Scalar wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    /// Integer.
    Int,
    /// Decimal or scientific notation.
    Float,
    /// Free text or keyword.
    Str,
}

/// Type of a command input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// No value at all (`ON`, `:VOLT OFF`, a CAEN set acknowledgement).
    None,
    /// Single integer.
    Int,
    /// Single float.
    Float,
    /// Single string.
    Str,
    /// Comma-separated list of scalars.
    ListOf(Scalar),
}

impl Kind {
    /// Scalar used to parse a single field, if any.
    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            Kind::None => None,
            Kind::Int => Some(Scalar::Int),
            Kind::Float => Some(Scalar::Float),
            Kind::Str => Some(Scalar::Str),
            Kind::ListOf(s) => Some(*s),
        }
    }
}

/// Literal in an allowed-value set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    /// Integer literal.
    Int(i64),
    /// Keyword literal.
    Str(&'static str),
}

impl Literal {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Int(a), Value::Int(b)) => a == b,
            (Literal::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Literal::Str(a), Value::Str(b)) => *a == b.as_str(),
            _ => false,
        }
    }
}

/// Constraint on the values a command accepts or returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allowed {
    /// Unconstrained.
    Any,
    /// One of a finite set of literals.
    OneOf(&'static [Literal]),
    /// Inclusive integer range.
    Range(i64, i64),
}

impl Allowed {
    /// Anything but [`Allowed::Any`].
    pub fn is_constrained(&self) -> bool {
        !matches!(self, Allowed::Any)
    }

    /// Whether `value` satisfies the constraint.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            Allowed::Any => true,
            Allowed::OneOf(set) => set.iter().any(|lit| lit.matches(value)),
            Allowed::Range(lo, hi) => value.as_i64().is_some_and(|v| (*lo..=*hi).contains(&v)),
        }
    }

    /// Human-readable rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            Allowed::Any => "any".to_string(),
            Allowed::OneOf(set) => set
                .iter()
                .map(|lit| match lit {
                    Literal::Int(v) => v.to_string(),
                    Literal::Str(s) => (*s).to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Allowed::Range(lo, hi) => format!("{lo}..={hi}"),
        }
    }
}

/// The full contract of one command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandDescriptor {
    /// Wire name: CAEN mnemonic or iseg SCPI path.
    pub name: &'static str,
    /// Type of the value sent with the command.
    pub input: Kind,
    /// Values accepted before anything is written.
    pub allowed_inputs: Allowed,
    /// Type of the answer.
    pub output: Kind,
    /// Values the device may answer with.
    pub possible_outputs: Allowed,
    /// Unit the device may append to numeric answers (`V`, `A`, `V/s`).
    pub unit: Option<&'static str>,
    /// One-line help text.
    pub description: &'static str,
}

impl CommandDescriptor {
    /// Monitor command: no input, answers with `output`.
    pub const fn monitor(name: &'static str, output: Kind, description: &'static str) -> Self {
        Self {
            name,
            input: Kind::None,
            allowed_inputs: Allowed::Any,
            output,
            possible_outputs: Allowed::Any,
            unit: None,
            description,
        }
    }

    /// Set command: takes `input`, answers with nothing.
    pub const fn set(name: &'static str, input: Kind, description: &'static str) -> Self {
        Self {
            name,
            input,
            allowed_inputs: Allowed::Any,
            output: Kind::None,
            possible_outputs: Allowed::Any,
            unit: None,
            description,
        }
    }

    /// Restricts the accepted inputs.
    pub const fn allowed(self, allowed: Allowed) -> Self {
        Self {
            allowed_inputs: allowed,
            ..self
        }
    }

    /// For sets that answer with a value.
    pub const fn answers(self, output: Kind, possible: Allowed) -> Self {
        Self {
            output,
            possible_outputs: possible,
            ..self
        }
    }

    /// Restricts the possible outputs.
    pub const fn possible(self, possible: Allowed) -> Self {
        Self {
            possible_outputs: possible,
            ..self
        }
    }

    /// Unit suffix the device appends to answers.
    pub const fn unit(self, unit: &'static str) -> Self {
        Self {
            unit: Some(unit),
            ..self
        }
    }
}

/// All commands of one (brand, entity, direction) triple.
#[derive(Debug)]
pub struct CommandTable {
    /// Protocol family.
    pub brand: Brand,
    /// Module or channel commands.
    pub entity: Entity,
    /// Monitor or set commands.
    pub direction: Direction,
    /// Descriptors, names unique.
    pub commands: &'static [CommandDescriptor],
}

impl CommandTable {
    /// Looks up a command by name.
    ///
    /// CAEN mnemonics are matched case-insensitively; iseg names are exact.
    ///
    /// # Errors
    /// `InvalidCommand` listing the table's names.
    pub fn get(&self, name: &str) -> Result<&'static CommandDescriptor> {
        let name = name.trim();
        let found = match self.brand {
            Brand::Caen => self
                .commands
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name)),
            Brand::Iseg => self.commands.iter().find(|c| c.name == name),
        };
        found.ok_or_else(|| HvpsError::InvalidCommand {
            command: name.to_string(),
            valid: self.names().join(", "),
        })
    }

    /// Command names in table order.
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.name).collect()
    }
}

/// Returns the static table for a brand, entity and direction.
pub fn table(brand: Brand, entity: Entity, direction: Direction) -> &'static CommandTable {
    match (brand, entity, direction) {
        (Brand::Caen, Entity::Module, Direction::Monitor) => &caen::MODULE_MONITOR,
        (Brand::Caen, Entity::Module, Direction::Set) => &caen::MODULE_SET,
        (Brand::Caen, Entity::Channel, Direction::Monitor) => &caen::CHANNEL_MONITOR,
        (Brand::Caen, Entity::Channel, Direction::Set) => &caen::CHANNEL_SET,
        (Brand::Iseg, Entity::Module, Direction::Monitor) => &iseg::MODULE_MONITOR,
        (Brand::Iseg, Entity::Module, Direction::Set) => &iseg::MODULE_SET,
        (Brand::Iseg, Entity::Channel, Direction::Monitor) => &iseg::CHANNEL_MONITOR,
        (Brand::Iseg, Entity::Channel, Direction::Set) => &iseg::CHANNEL_SET,
    }
}

/// Shortcut for `table(..).get(name)`.
pub fn lookup(
    brand: Brand,
    entity: Entity,
    direction: Direction,
    name: &str,
) -> Result<&'static CommandDescriptor> {
    table(brand, entity, direction).get(name)
}

/// Brand-specific command names behind the typed accessors.
///
/// `None` marks an accessor the brand has no command for.
#[derive(Debug)]
pub struct Vocabulary {
    /// Behind [`Channel::voltage_setpoint`](crate::Channel::voltage_setpoint).
    pub voltage_setpoint: &'static str,
    /// Behind [`Channel::set_voltage`](crate::Channel::set_voltage).
    pub set_voltage: &'static str,
    /// Behind [`Channel::current_setpoint`](crate::Channel::current_setpoint).
    pub current_setpoint: &'static str,
    /// Behind [`Channel::set_current`](crate::Channel::set_current).
    pub set_current: &'static str,
    /// Behind [`Channel::measured_voltage`](crate::Channel::measured_voltage).
    pub measured_voltage: &'static str,
    /// Behind [`Channel::measured_current`](crate::Channel::measured_current).
    pub measured_current: &'static str,
    /// Behind [`Channel::ramp_up`](crate::Channel::ramp_up).
    pub ramp_up: &'static str,
    /// Behind [`Channel::set_ramp_up`](crate::Channel::set_ramp_up).
    pub set_ramp_up: &'static str,
    /// Behind [`Channel::ramp_down`](crate::Channel::ramp_down).
    pub ramp_down: &'static str,
    /// Behind [`Channel::set_ramp_down`](crate::Channel::set_ramp_down).
    pub set_ramp_down: &'static str,
    /// Behind [`Channel::voltage_limit`](crate::Channel::voltage_limit).
    pub voltage_limit: &'static str,
    /// Behind [`Channel::set_voltage_limit`](crate::Channel::set_voltage_limit).
    pub set_voltage_limit: Option<&'static str>,
    /// Behind [`Channel::status`](crate::Channel::status).
    pub status: &'static str,
    /// Behind [`Channel::turn_on`](crate::Channel::turn_on).
    pub turn_on: &'static str,
    /// Behind [`Channel::turn_off`](crate::Channel::turn_off).
    pub turn_off: &'static str,
    /// Behind [`Channel::polarity`](crate::Channel::polarity).
    pub polarity: &'static str,
    /// Behind [`Channel::power_down_mode`](crate::Channel::power_down_mode).
    pub power_down_mode: Option<&'static str>,
    /// Behind [`Channel::set_power_down_mode`](crate::Channel::set_power_down_mode).
    pub set_power_down_mode: Option<&'static str>,
    /// Behind [`Channel::current_range`](crate::Channel::current_range).
    pub current_range: Option<&'static str>,
    /// Behind [`Channel::set_current_range`](crate::Channel::set_current_range).
    pub set_current_range: Option<&'static str>,
    /// Behind [`Module::name`](crate::Module::name).
    pub module_name: &'static str,
    /// Behind [`Module::firmware_release`](crate::Module::firmware_release).
    pub firmware_release: &'static str,
    /// Behind [`Module::serial_number`](crate::Module::serial_number).
    pub serial_number: Option<&'static str>,
    /// Behind [`Module::channel_count`](crate::Module::channel_count).
    pub channel_count: &'static str,
    /// Behind [`Module::status`](crate::Module::status).
    pub module_status: &'static str,
    /// Behind [`Module::interlock_active`](crate::Module::interlock_active).
    pub interlock_status: Option<&'static str>,
    /// Behind [`Module::interlock_mode`](crate::Module::interlock_mode).
    pub interlock_mode: Option<&'static str>,
    /// Behind [`Module::set_interlock_mode`](crate::Module::set_interlock_mode).
    pub set_interlock_mode: Option<&'static str>,
    /// Behind [`Module::clear_alarm`](crate::Module::clear_alarm).
    pub clear_alarm: &'static str,
}

/// Vocabulary of a brand.
pub fn vocabulary(brand: Brand) -> &'static Vocabulary {
    match brand {
        Brand::Caen => &caen::VOCABULARY,
        Brand::Iseg => &iseg::VOCABULARY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [(Brand, Entity, Direction); 8] = [
        (Brand::Caen, Entity::Module, Direction::Monitor),
        (Brand::Caen, Entity::Module, Direction::Set),
        (Brand::Caen, Entity::Channel, Direction::Monitor),
        (Brand::Caen, Entity::Channel, Direction::Set),
        (Brand::Iseg, Entity::Module, Direction::Monitor),
        (Brand::Iseg, Entity::Module, Direction::Set),
        (Brand::Iseg, Entity::Channel, Direction::Monitor),
        (Brand::Iseg, Entity::Channel, Direction::Set),
    ];

    #[test]
    fn test_names_unique_per_table() {
        for (brand, entity, direction) in ALL {
            let t = table(brand, entity, direction);
            let mut seen = HashSet::new();
            for c in t.commands {
                assert!(
                    seen.insert(c.name),
                    "duplicate {} in {brand:?}/{entity:?}/{direction:?}",
                    c.name
                );
            }
            assert!(!t.commands.is_empty());
        }
    }

    #[test]
    fn test_monitor_commands_take_no_input() {
        for (brand, entity, direction) in ALL {
            if direction != Direction::Monitor {
                continue;
            }
            for c in table(brand, entity, direction).commands {
                assert_eq!(c.input, Kind::None, "{}", c.name);
                assert_ne!(c.output, Kind::None, "{}", c.name);
            }
        }
    }

    #[test]
    fn test_caen_lookup_ignores_case() {
        let c = lookup(Brand::Caen, Entity::Channel, Direction::Monitor, "vmon").unwrap();
        assert_eq!(c.name, "VMON");
    }

    #[test]
    fn test_unknown_command_lists_names() {
        let err = lookup(Brand::Caen, Entity::Module, Direction::Monitor, "TEST").unwrap_err();
        match err {
            HvpsError::InvalidCommand { command, valid } => {
                assert_eq!(command, "TEST");
                assert!(valid.contains("BDNAME"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_iseg_lookup_is_exact() {
        assert!(lookup(Brand::Iseg, Entity::Channel, Direction::Set, ":VOLT ON").is_ok());
        assert!(lookup(Brand::Iseg, Entity::Channel, Direction::Set, ":volt on").is_err());
    }

    #[test]
    fn test_vocabulary_names_resolve() {
        for brand in [Brand::Caen, Brand::Iseg] {
            let v = vocabulary(brand);
            let ch_mon = table(brand, Entity::Channel, Direction::Monitor);
            let ch_set = table(brand, Entity::Channel, Direction::Set);
            let md_mon = table(brand, Entity::Module, Direction::Monitor);
            let md_set = table(brand, Entity::Module, Direction::Set);
            for name in [
                v.voltage_setpoint,
                v.current_setpoint,
                v.measured_voltage,
                v.measured_current,
                v.ramp_up,
                v.ramp_down,
                v.voltage_limit,
                v.status,
                v.polarity,
            ] {
                assert!(ch_mon.get(name).is_ok(), "{brand}: {name}");
            }
            for name in [v.set_voltage, v.set_current, v.set_ramp_up, v.set_ramp_down, v.turn_on, v.turn_off] {
                assert!(ch_set.get(name).is_ok(), "{brand}: {name}");
            }
            for name in [v.module_name, v.firmware_release, v.channel_count, v.module_status] {
                assert!(md_mon.get(name).is_ok(), "{brand}: {name}");
            }
            assert!(md_set.get(v.clear_alarm).is_ok());
            for name in [v.power_down_mode, v.current_range].into_iter().flatten() {
                assert!(ch_mon.get(name).is_ok(), "{brand}: {name}");
            }
            for name in [v.set_power_down_mode, v.set_current_range, v.set_voltage_limit]
                .into_iter()
                .flatten()
            {
                assert!(ch_set.get(name).is_ok(), "{brand}: {name}");
            }
            for name in [v.serial_number, v.interlock_status, v.interlock_mode]
                .into_iter()
                .flatten()
            {
                assert!(md_mon.get(name).is_ok(), "{brand}: {name}");
            }
            if let Some(name) = v.set_interlock_mode {
                assert!(md_set.get(name).is_ok(), "{brand}: {name}");
            }
        }
    }
}
