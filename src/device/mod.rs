//! Client-side handles: [`Hvps`] → [`Module`] → [`Channel`].
//!
//! Every request goes through the same path: command lookup, input
//! validation, encoding, one exchange on the shared [`Transport`], decoding
//! and output validation. Validation failures never reach the wire.
//!
//! Handles are cheap to clone; all clones of an [`Hvps`] share one
//! transport, so requests from any number of tasks are serialized on the
//! link in submission order.

mod channel;
mod endpoint;
mod module;
mod poller;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

pub use channel::Channel;
pub use module::Module;
pub use poller::StatusPoller;

use crate::error::Result;
use crate::protocol::{Address, Brand};
use crate::transport::{Link, Transport};

/// Connection to one serial line carrying modules of a single brand.
#[derive(Debug, Clone)]
pub struct Hvps {
    brand: Brand,
    transport: Arc<Transport>,
    modules: Arc<Mutex<HashMap<u8, Module>>>,
}

impl Hvps {
    /// Takes ownership of `link` and starts the transport worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<L: Link + 'static>(brand: Brand, link: L, timeout: Duration) -> Self {
        info!(%brand, ?timeout, "hvps connection opened");
        Self::with_transport(brand, Transport::spawn(link, timeout))
    }

    /// Wraps an already running transport.
    pub fn with_transport(brand: Brand, transport: Transport) -> Self {
        Self {
            brand,
            transport: Arc::new(transport),
            modules: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Brand all handles speak.
    pub fn brand(&self) -> Brand {
        self.brand
    }

    /// The shared transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Handle for the module at `board`. Repeated calls return the same
    /// handle, so its channel list is only fetched once.
    ///
    /// # Errors
    /// `InvalidValue` if `board` is outside 0..=31.
    pub async fn module(&self, board: u8) -> Result<Module> {
        let address = Address::module(board)?;
        let mut modules = self.modules.lock().await;
        let module = modules
            .entry(board)
            .or_insert_with(|| Module::new(self.brand, address, Arc::clone(&self.transport)));
        Ok(module.clone())
    }
}
