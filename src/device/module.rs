use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use super::channel::Channel;
use super::endpoint::Endpoint;
use crate::error::{HvpsError, Result};
use crate::protocol::status::ModuleStatus;
use crate::protocol::{Address, Brand, InterlockMode, Value};
use crate::transport::Transport;

/// A module (board) on the link.
///
/// The channel list is built on first use from the channel count the module
/// reports, then shared by every clone of the handle.
#[derive(Debug, Clone)]
pub struct Module {
    endpoint: Endpoint,
    channels: Arc<OnceCell<Vec<Channel>>>,
}

impl Module {
    pub(crate) fn new(brand: Brand, address: Address, transport: Arc<Transport>) -> Self {
        Self {
            endpoint: Endpoint::new(brand, address, transport),
            channels: Arc::new(OnceCell::new()),
        }
    }

    /// Brand of the device.
    pub fn brand(&self) -> Brand {
        self.endpoint.brand()
    }

    /// Board address.
    pub fn board(&self) -> u8 {
        self.endpoint.address().board()
    }

    /// Reads a module-level command by name.
    ///
    /// # Errors
    /// `InvalidCommand` if `name` is not a module monitor command of this
    /// brand, otherwise any exchange error.
    pub async fn get(&self, name: &str) -> Result<Value> {
        self.endpoint.get(name).await
    }

    /// Writes a module-level command by name. Returns what the device
    /// answered, if the command answers anything.
    pub async fn set(&self, name: &str, value: Option<Value>) -> Result<Option<Value>> {
        self.endpoint.set(name, value).await
    }

    /// All channels, fetching the channel count on first call.
    pub async fn channels(&self) -> Result<&[Channel]> {
        let channels = self
            .channels
            .get_or_try_init(|| async {
                let count = self.channel_count().await?;
                debug!(board = self.board(), count, "channel list built");
                (0..count)
                    .map(|index| {
                        let index = u8::try_from(index).map_err(|_| {
                            HvpsError::InvalidResponse(format!("channel count {count} too large"))
                        })?;
                        let address = Address::channel(self.board(), index)?;
                        Ok(Channel::new(
                            self.brand(),
                            address,
                            Arc::clone(self.endpoint.transport()),
                        ))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .await?;
        Ok(channels.as_slice())
    }

    /// Channel `index`.
    ///
    /// # Errors
    /// `InvalidValue` if the module has no such channel.
    pub async fn channel(&self, index: usize) -> Result<Channel> {
        let channels = self.channels().await?;
        channels.get(index).cloned().ok_or_else(|| {
            HvpsError::InvalidValue(format!(
                "channel {index} out of range, module {} has {} channels",
                self.board(),
                channels.len()
            ))
        })
    }

    /// Model name.
    pub async fn name(&self) -> Result<String> {
        let vocab = self.endpoint.vocabulary();
        self.endpoint.get_string(vocab.module_name).await
    }

    /// Firmware release.
    pub async fn firmware_release(&self) -> Result<String> {
        let vocab = self.endpoint.vocabulary();
        self.endpoint.get_string(vocab.firmware_release).await
    }

    /// Serial number. CAEN only.
    pub async fn serial_number(&self) -> Result<String> {
        let vocab = self.endpoint.vocabulary();
        let name = self.endpoint.supported(vocab.serial_number, "serial_number")?;
        self.endpoint.get_string(name).await
    }

    /// Number of channels the module reports.
    pub async fn channel_count(&self) -> Result<usize> {
        let vocab = self.endpoint.vocabulary();
        let count = self.endpoint.get_i64(vocab.channel_count).await?;
        usize::try_from(count)
            .map_err(|_| HvpsError::InvalidResponse(format!("negative channel count {count}")))
    }

    /// Decoded alarm (CAEN) or module status (iseg) register.
    pub async fn status(&self) -> Result<ModuleStatus> {
        let vocab = self.endpoint.vocabulary();
        let raw = self.endpoint.get_i64(vocab.module_status).await?;
        ModuleStatus::from_register(self.brand(), raw)
    }

    /// Whether the interlock input is currently asserted.
    pub async fn interlock_active(&self) -> Result<bool> {
        let vocab = self.endpoint.vocabulary();
        let name = self
            .endpoint
            .supported(vocab.interlock_status, "interlock_active")?;
        Ok(self.endpoint.get_string(name).await? == "YES")
    }

    /// Interlock input logic. CAEN only.
    pub async fn interlock_mode(&self) -> Result<InterlockMode> {
        let vocab = self.endpoint.vocabulary();
        let name = self.endpoint.supported(vocab.interlock_mode, "interlock_mode")?;
        InterlockMode::from_str(&self.endpoint.get_string(name).await?)
    }

    /// Writes the interlock input logic. CAEN only.
    pub async fn set_interlock_mode(&self, mode: InterlockMode) -> Result<()> {
        let vocab = self.endpoint.vocabulary();
        let name = self
            .endpoint
            .supported(vocab.set_interlock_mode, "set_interlock_mode")?;
        self.endpoint
            .set(name, Some(Value::from(mode.as_wire())))
            .await?;
        Ok(())
    }

    /// Clears latched alarms and events.
    pub async fn clear_alarm(&self) -> Result<()> {
        let vocab = self.endpoint.vocabulary();
        self.endpoint.set(vocab.clear_alarm, None).await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn shares_channels_with(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.channels, &other.channels)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::simulation::{SimulatedLink, SimulationEngine, SimulationOptions};
    use crate::Hvps;

    fn connect(brand: Brand, channels: usize) -> Hvps {
        let engine =
            SimulationEngine::new(SimulationOptions::new(brand).with_channels(channels));
        Hvps::new(brand, SimulatedLink::new(engine), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_identity_and_channels() {
        let hvps = connect(Brand::Caen, 2);
        let module = hvps.module(0).await.unwrap();
        assert_eq!(module.name().await.unwrap(), "N1471H SIMULATOR");
        assert_eq!(module.channels().await.unwrap().len(), 2);
        assert_eq!(module.channel(1).await.unwrap().index(), 1);
        assert!(matches!(
            module.channel(2).await,
            Err(HvpsError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn test_interlock_mode_round_trip() {
        let hvps = connect(Brand::Caen, 4);
        let module = hvps.module(0).await.unwrap();
        assert_eq!(module.interlock_mode().await.unwrap(), InterlockMode::Closed);
        module.set_interlock_mode(InterlockMode::Open).await.unwrap();
        assert_eq!(module.interlock_mode().await.unwrap(), InterlockMode::Open);
        assert!(!module.interlock_active().await.unwrap());
    }

    #[tokio::test]
    async fn test_iseg_lacks_interlock_commands() {
        let hvps = connect(Brand::Iseg, 4);
        let module = hvps.module(0).await.unwrap();
        let err = module.interlock_mode().await.unwrap_err();
        assert!(matches!(
            err,
            HvpsError::Unsupported {
                brand: Brand::Iseg,
                ..
            }
        ));
        assert!(module.status().await.unwrap().healthy);
    }

    #[tokio::test]
    async fn test_unknown_command_never_sent() {
        let hvps = connect(Brand::Caen, 4);
        let module = hvps.module(0).await.unwrap();
        assert!(matches!(
            module.get("VSET").await,
            Err(HvpsError::InvalidCommand { .. })
        ));
    }
}
