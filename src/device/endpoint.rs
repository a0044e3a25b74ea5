use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::{HvpsError, Result};
use crate::protocol::codec::codec;
use crate::protocol::commands::{lookup, vocabulary, CommandDescriptor, Vocabulary};
use crate::protocol::validate::{validate_input, validate_output};
use crate::protocol::{Address, Brand, Direction, Value};
use crate::transport::Transport;

/// One addressable entity (module or channel) on a transport.
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    brand: Brand,
    address: Address,
    transport: Arc<Transport>,
}

impl Endpoint {
    pub(crate) fn new(brand: Brand, address: Address, transport: Arc<Transport>) -> Self {
        Self {
            brand,
            address,
            transport,
        }
    }

    pub(crate) fn brand(&self) -> Brand {
        self.brand
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub(crate) fn vocabulary(&self) -> &'static Vocabulary {
        vocabulary(self.brand)
    }

    fn command(&self, direction: Direction, name: &str) -> Result<&'static CommandDescriptor> {
        lookup(self.brand, self.address.entity(), direction, name)
    }

    #[instrument(skip(self), fields(brand = %self.brand, address = %self.address), err)]
    pub(crate) async fn get(&self, name: &str) -> Result<Value> {
        let command = self.command(Direction::Monitor, name)?;
        let frame = codec(self.brand).encode_monitor(self.address, command);
        let fields = self.round_trip(frame).await?;
        validate_output(command, &fields)?.ok_or_else(|| {
            HvpsError::InvalidResponse(format!("{} returned no value", command.name))
        })
    }

    #[instrument(skip(self), fields(brand = %self.brand, address = %self.address), err)]
    pub(crate) async fn set(&self, name: &str, value: Option<Value>) -> Result<Option<Value>> {
        let command = self.command(Direction::Set, name)?;
        validate_input(command, value.as_ref())?;
        let frame = codec(self.brand).encode_set(self.address, command, value.as_ref());
        let fields = self.round_trip(frame).await?;
        let answer = validate_output(command, &fields)?;
        debug!(command = command.name, "set acknowledged");
        Ok(answer)
    }

    async fn round_trip(&self, frame: Vec<u8>) -> Result<Vec<String>> {
        let codec = codec(self.brand);
        let raw = self
            .transport
            .exchange(frame.clone(), codec.reply_lines())
            .await?;
        let reply = codec.decode(&frame, self.address, &raw).inspect_err(|e| {
            warn!(error = %e, "reply refused");
            // the lines read may have answered an earlier request
            self.transport.mark_stale();
        })?;
        Ok(reply.fields)
    }

    /// Reads `name` and requires a number.
    pub(crate) async fn get_f64(&self, name: &str) -> Result<f64> {
        let value = self.get(name).await?;
        value
            .as_f64()
            .ok_or_else(|| HvpsError::InvalidResponse(format!("{name} is not numeric: {value}")))
    }

    pub(crate) async fn get_i64(&self, name: &str) -> Result<i64> {
        let value = self.get(name).await?;
        value
            .as_i64()
            .ok_or_else(|| HvpsError::InvalidResponse(format!("{name} is not an integer: {value}")))
    }

    pub(crate) async fn get_string(&self, name: &str) -> Result<String> {
        match self.get(name).await? {
            Value::Str(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    /// Resolves an optional vocabulary entry.
    pub(crate) fn supported(
        &self,
        entry: Option<&'static str>,
        operation: &'static str,
    ) -> Result<&'static str> {
        entry.ok_or(HvpsError::Unsupported {
            brand: self.brand,
            operation,
        })
    }
}
