//! Brand-specific behavior of a simulated module: which commands are live
//! views of the physics, which writes change it, and how values are printed.

use std::fmt;

use super::channel::SimulatedChannel;
use super::module::SimulatedModule;
use crate::protocol::codec::DeviceReply;
use crate::protocol::commands::CommandDescriptor;
use crate::protocol::{Brand, Value};

/// Outcome of a write the firmware has seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Consumed by the model.
    Done,
    /// Not a physics setting; keep the value in the register under this
    /// monitor name.
    Store(&'static str),
}

/// Brand-specific behavior of the simulated module.
pub trait Firmware: Send + Sync + fmt::Debug {
    /// Sets identity strings and realistic register defaults.
    fn initialize(&self, module: &mut SimulatedModule);

    /// Live value of a channel monitor command, or `None` to fall back to
    /// the register file.
    fn read_channel(&self, channel: &SimulatedChannel, name: &str) -> Option<Value>;

    fn write_channel(
        &self,
        channel: &mut SimulatedChannel,
        name: &'static str,
        value: Option<&Value>,
    ) -> Applied;

    fn read_module(&self, module: &SimulatedModule, name: &str) -> Option<Value>;

    fn write_module(
        &self,
        module: &mut SimulatedModule,
        name: &'static str,
        value: Option<&Value>,
    ) -> Applied;

    /// Payload text of a monitor answer.
    fn render(&self, command: &CommandDescriptor, value: &Value) -> String;

    /// Answer to an accepted set.
    fn acknowledge(&self) -> DeviceReply;
}

/// Firmware model of `brand`.
pub fn firmware(brand: Brand) -> &'static dyn Firmware {
    match brand {
        Brand::Caen => &super::caen::CaenFirmware,
        Brand::Iseg => &super::iseg::IsegFirmware,
    }
}

pub(super) fn float(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

pub(super) fn flag(on: bool) -> Value {
    Value::Int(i64::from(on))
}
