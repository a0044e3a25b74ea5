//! CLI entry point for hvps
//!
//! Talks to one CAEN or iseg module, either over a serial port or against
//! the built-in simulator.
//!
//! # Usage
//!
//! ```bash
//! hvps --simulate list --channel
//! hvps --port /dev/ttyUSB0 get BDNAME
//! hvps --brand iseg --simulate set :VOLT 150 --channel 1
//! hvps --simulate ramp 0 500 --timeout 30
//! hvps --simulate status
//! ```
//!
//! Settings not given on the command line come from `hvps.toml` and
//! `HVPS_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hvps::config::HvpsConfig;
use hvps::logging::{self, LoggingConfig};
use hvps::protocol::commands::{lookup, table};
use hvps::protocol::validate::parse_input;
use hvps::simulation::{SimulatedLink, SimulationEngine};
use hvps::{Brand, Direction, Entity, Hvps, Module};
use tracing::info;

#[derive(Parser)]
#[command(name = "hvps")]
#[command(about = "Control CAEN and iseg high-voltage power supplies", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = hvps::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Device family (caen or iseg)
    #[arg(long)]
    brand: Option<Brand>,

    /// Serial port path
    #[arg(long)]
    port: Option<String>,

    /// Board address (CAEN only)
    #[arg(long)]
    board: Option<u8>,

    /// Talk to a simulated module instead of a serial port
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the commands the device understands
    List {
        /// Channel commands instead of module commands
        #[arg(long)]
        channel: bool,
    },

    /// Read a value
    Get {
        /// Command name, e.g. VMON or :MEAS:VOLT
        name: String,
        /// Channel index; omit for a module command
        #[arg(long)]
        channel: Option<usize>,
    },

    /// Write a value (omit the value for commands such as ON)
    Set {
        name: String,
        value: Option<String>,
        #[arg(long)]
        channel: Option<usize>,
    },

    /// Print module status and a line per channel
    Status,

    /// Set a voltage, switch the channel on and wait until it has settled
    Ramp {
        channel: usize,
        volts: f64,
        /// Seconds to wait for the ramp
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HvpsConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(brand) = cli.brand {
        config.device.brand = brand;
    }
    if let Some(port) = cli.port.clone() {
        config.connection.port = port;
    }
    if let Some(board) = cli.board {
        config.device.board = board;
    }
    config.validate()?;
    logging::init(LoggingConfig::from_settings(&config.logging)?)?;

    let brand = config.device.brand;
    if let Commands::List { channel } = cli.command {
        list(brand, channel);
        return Ok(());
    }

    let hvps = connect(&config, cli.simulate)?;
    let module = hvps.module(config.device.board).await?;

    match cli.command {
        Commands::List { .. } => {}
        Commands::Get { name, channel } => {
            let value = match channel {
                Some(index) => module.channel(index).await?.get(&name).await?,
                None => module.get(&name).await?,
            };
            println!("{value}");
        }
        Commands::Set {
            name,
            value,
            channel,
        } => {
            let entity = if channel.is_some() {
                Entity::Channel
            } else {
                Entity::Module
            };
            let command = lookup(brand, entity, Direction::Set, &name)?;
            let typed = parse_input(command, value.as_deref())?;
            let answer = match channel {
                Some(index) => module.channel(index).await?.set(&name, typed).await?,
                None => module.set(&name, typed).await?,
            };
            match answer {
                Some(answer) => println!("OK ({answer})"),
                None => println!("OK"),
            }
        }
        Commands::Status => status(&module).await?,
        Commands::Ramp {
            channel,
            volts,
            timeout,
        } => {
            let channel = module.channel(channel).await?;
            channel.set_voltage(volts).await?;
            channel.turn_on().await?;
            info!(channel = channel.index(), volts, "ramping");
            let settled = channel
                .wait_for_voltage(Duration::from_secs(timeout), Duration::from_millis(500))
                .await?;
            println!(
                "channel {} at {:.1} V ({:?})",
                channel.index(),
                channel.measured_voltage().await?,
                settled
            );
        }
    }
    Ok(())
}

fn connect(config: &HvpsConfig, simulate: bool) -> Result<Hvps> {
    let brand = config.device.brand;
    let timeout = config.connection.timeout();
    if simulate {
        let engine = SimulationEngine::new(config.simulator.options(&config.device));
        // Detached: the ticker stops once the link's engine handle is dropped.
        let _ticker = engine.spawn_ticker();
        return Ok(Hvps::new(brand, SimulatedLink::new(engine), timeout));
    }
    open_serial(config, brand, timeout)
}

#[cfg(feature = "tokio_serial")]
fn open_serial(config: &HvpsConfig, brand: Brand, timeout: Duration) -> Result<Hvps> {
    let link = hvps::transport::SerialLinkBuilder::new(
        config.connection.port.as_str(),
        config.connection.baud_rate,
    )
    .with_timeout(timeout)
    .open()
    .with_context(|| format!("opening {}", config.connection.port))?;
    Ok(Hvps::new(brand, link, timeout))
}

#[cfg(not(feature = "tokio_serial"))]
fn open_serial(_config: &HvpsConfig, _brand: Brand, _timeout: Duration) -> Result<Hvps> {
    anyhow::bail!("built without serial support; rebuild with --features tokio_serial or use --simulate")
}

fn list(brand: Brand, channel: bool) {
    let entity = if channel {
        Entity::Channel
    } else {
        Entity::Module
    };
    for direction in [Direction::Monitor, Direction::Set] {
        println!("{brand} {entity:?} {direction:?}:");
        for command in table(brand, entity, direction).commands {
            println!("  {:<28} {}", command.name, command.description);
        }
    }
}

async fn status(module: &Module) -> Result<()> {
    let summary = module.status().await?;
    println!(
        "{} (board {}), firmware {}: {}",
        module.name().await?,
        module.board(),
        module.firmware_release().await?,
        if summary.healthy { "healthy" } else { "ALARM" }
    );
    if !summary.tripped_channels.is_empty() {
        println!("  tripped: {:?}", summary.tripped_channels);
    }
    for channel in module.channels().await? {
        let status = channel.status().await?;
        let vmon = channel.measured_voltage().await?;
        let imon = channel.measured_current().await?;
        let state = match (status.on, status.is_faulted(), status.is_ramping()) {
            (_, true, _) => "FAULT",
            (true, _, true) => "RAMPING",
            (true, _, false) => "ON",
            (false, _, _) => "OFF",
        };
        println!("  CH{} {state:<8} {vmon:>9.1} V {imon:>12.4}", channel.index());
    }
    Ok(())
}
