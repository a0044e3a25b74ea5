use std::time::Duration;

use tokio_serial::SerialPortBuilderExt;
use tracing::info;

use super::{DynStream, StreamLink, DEFAULT_TIMEOUT};
use crate::error::Result;

/// Opens a serial port as a [`StreamLink`].
///
/// Both brands talk 8N1 without flow control; only the baud rate differs
/// between installations.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use hvps::transport::SerialLinkBuilder;
///
/// # async fn open() -> hvps::Result<()> {
/// let link = SerialLinkBuilder::new("/dev/ttyUSB0", 9600)
///     .with_timeout(Duration::from_millis(500))
///     .open()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SerialLinkBuilder {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialLinkBuilder {
    /// # Arguments
    /// * `port_name` - Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    /// * `baud_rate` - Communication speed (e.g., 9600, 115200)
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Driver-level timeout of the port itself.
    ///
    /// Default: [`DEFAULT_TIMEOUT`]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens the port. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `Serial` if the port does not exist or is busy.
    pub fn open(&self) -> Result<StreamLink<DynStream>> {
        let port = tokio_serial::new(&self.port_name, self.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.timeout)
            .open_native_async()?;

        info!(port = %self.port_name, baud = self.baud_rate, "serial port opened");
        Ok(StreamLink::new(Box::new(port) as DynStream))
    }
}
