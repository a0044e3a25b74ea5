use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use super::endpoint::Endpoint;
use crate::error::{HvpsError, Result};
use crate::protocol::status::ChannelStatus;
use crate::protocol::{Address, Brand, CurrentRange, Polarity, PowerDownMode, Value};
use crate::transport::Transport;

/// One output channel of a module.
///
/// Voltages are in V, currents in the unit the brand reports (µA for CAEN,
/// A for iseg), ramp rates in V/s.
#[derive(Debug, Clone)]
pub struct Channel {
    endpoint: Endpoint,
}

impl Channel {
    pub(crate) fn new(brand: Brand, address: Address, transport: Arc<Transport>) -> Self {
        Self {
            endpoint: Endpoint::new(brand, address, transport),
        }
    }

    /// Brand of the device.
    pub fn brand(&self) -> Brand {
        self.endpoint.brand()
    }

    /// Board the channel belongs to.
    pub fn board(&self) -> u8 {
        self.endpoint.address().board()
    }

    /// Channel index within the module.
    pub fn index(&self) -> u8 {
        self.endpoint.address().channel_index().unwrap_or_default()
    }

    /// Reads a channel-level command by name.
    pub async fn get(&self, name: &str) -> Result<Value> {
        self.endpoint.get(name).await
    }

    /// Writes a channel-level command by name.
    pub async fn set(&self, name: &str, value: Option<Value>) -> Result<Option<Value>> {
        self.endpoint.set(name, value).await
    }

    async fn set_f64(&self, name: &str, value: f64) -> Result<()> {
        self.endpoint.set(name, Some(Value::Float(value))).await?;
        Ok(())
    }

    /// Voltage setpoint, V.
    pub async fn voltage_setpoint(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().voltage_setpoint)
            .await
    }

    /// Writes the voltage setpoint.
    pub async fn set_voltage(&self, volts: f64) -> Result<()> {
        self.set_f64(self.endpoint.vocabulary().set_voltage, volts)
            .await
    }

    /// Current limit.
    pub async fn current_setpoint(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().current_setpoint)
            .await
    }

    /// Writes the current limit.
    pub async fn set_current(&self, current: f64) -> Result<()> {
        self.set_f64(self.endpoint.vocabulary().set_current, current)
            .await
    }

    /// Monitored output voltage.
    pub async fn measured_voltage(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().measured_voltage)
            .await
    }

    /// Monitored output current.
    pub async fn measured_current(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().measured_current)
            .await
    }

    /// Ramp-up rate.
    pub async fn ramp_up(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().ramp_up)
            .await
    }

    /// Writes the ramp-up rate.
    pub async fn set_ramp_up(&self, rate: f64) -> Result<()> {
        self.set_f64(self.endpoint.vocabulary().set_ramp_up, rate)
            .await
    }

    /// Ramp-down rate.
    pub async fn ramp_down(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().ramp_down)
            .await
    }

    /// Writes the ramp-down rate.
    pub async fn set_ramp_down(&self, rate: f64) -> Result<()> {
        self.set_f64(self.endpoint.vocabulary().set_ramp_down, rate)
            .await
    }

    /// Software voltage limit (CAEN `MAXV`, iseg limit in percent of nominal).
    pub async fn voltage_limit(&self) -> Result<f64> {
        self.endpoint
            .get_f64(self.endpoint.vocabulary().voltage_limit)
            .await
    }

    /// Writes the software voltage limit. CAEN only.
    pub async fn set_voltage_limit(&self, volts: f64) -> Result<()> {
        let vocab = self.endpoint.vocabulary();
        let name = self
            .endpoint
            .supported(vocab.set_voltage_limit, "set_voltage_limit")?;
        self.set_f64(name, volts).await
    }

    /// Output polarity.
    pub async fn polarity(&self) -> Result<Polarity> {
        let text = self
            .endpoint
            .get_string(self.endpoint.vocabulary().polarity)
            .await?;
        Polarity::from_wire(&text)
    }

    /// Reaction to a trip or interlock. CAEN only.
    pub async fn power_down_mode(&self) -> Result<PowerDownMode> {
        let vocab = self.endpoint.vocabulary();
        let name = self
            .endpoint
            .supported(vocab.power_down_mode, "power_down_mode")?;
        PowerDownMode::from_str(&self.endpoint.get_string(name).await?)
    }

    /// Writes the power-down mode. CAEN only.
    pub async fn set_power_down_mode(&self, mode: PowerDownMode) -> Result<()> {
        let vocab = self.endpoint.vocabulary();
        let name = self
            .endpoint
            .supported(vocab.set_power_down_mode, "set_power_down_mode")?;
        self.endpoint
            .set(name, Some(Value::from(mode.as_wire())))
            .await?;
        Ok(())
    }

    /// Current monitor range. CAEN only.
    pub async fn current_range(&self) -> Result<CurrentRange> {
        let vocab = self.endpoint.vocabulary();
        let name = self.endpoint.supported(vocab.current_range, "current_range")?;
        CurrentRange::from_str(&self.endpoint.get_string(name).await?)
    }

    /// Writes the current monitor range. CAEN only.
    pub async fn set_current_range(&self, range: CurrentRange) -> Result<()> {
        let vocab = self.endpoint.vocabulary();
        let name = self
            .endpoint
            .supported(vocab.set_current_range, "set_current_range")?;
        self.endpoint
            .set(name, Some(Value::from(range.as_wire())))
            .await?;
        Ok(())
    }

    /// Reads and decodes the channel status register.
    pub async fn status(&self) -> Result<ChannelStatus> {
        let raw = self
            .endpoint
            .get_i64(self.endpoint.vocabulary().status)
            .await?;
        ChannelStatus::from_register(self.brand(), raw)
    }

    /// Enables the output.
    #[instrument(skip(self), fields(board = self.board(), channel = self.index()), err)]
    pub async fn turn_on(&self) -> Result<()> {
        self.endpoint
            .set(self.endpoint.vocabulary().turn_on, None)
            .await?;
        info!("channel output switched on");
        Ok(())
    }

    /// Disables the output; it ramps down or is cut per the power-down mode.
    #[instrument(skip(self), fields(board = self.board(), channel = self.index()), err)]
    pub async fn turn_off(&self) -> Result<()> {
        self.endpoint
            .set(self.endpoint.vocabulary().turn_off, None)
            .await?;
        info!("channel output switched off");
        Ok(())
    }

    /// Polls the status every `poll` until the output has settled at its
    /// setpoint, and returns the settling status.
    ///
    /// # Errors
    /// `Timeout(timeout)` if the channel is still ramping or off target when
    /// `timeout` runs out. Exchange errors abort the wait.
    pub async fn wait_for_voltage(&self, timeout: Duration, poll: Duration) -> Result<ChannelStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status().await?;
            if status.voltage_target_reached() {
                return Ok(status);
            }
            debug!(
                ramp_up = status.ramp_up,
                ramp_down = status.ramp_down,
                "waiting for voltage to settle"
            );
            if Instant::now() + poll > deadline {
                return Err(HvpsError::Timeout(timeout));
            }
            sleep(poll).await;
        }
    }
}
