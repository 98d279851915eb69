use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use avroute_core::config::{Config, ConfigBuilder, ENV_PREFIX};
use avroute_core::logging;
use avroute_core::types::DriverId;
use avroute_core::utils::with_retry_if;
use avroute_devices::transport::{PortLister, SystemPortLister};
use avroute_devices::{
    register_builtin, DriverDescriptor, DriverError, DriverOverrides, DriverRegistry, Location,
    SystemTransport, Tie,
};

#[derive(Parser, Debug)]
#[command(name = "avroute")]
#[command(version)]
#[command(
    about = "Drive A/V matrix switches, KVMs and RS-485 monitors over serial, TCP or local sockets.",
    long_about = None,
    after_help = "Examples:\n  avroute list\n  avroute check port:/dev/ttyUSB0\n  avroute activate <driver-id> ip:10.0.0.20 3 1\n  avroute power-on <driver-id> port:/dev/ttyUSB0"
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "AVROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Retry a failed device command this many times
    #[arg(long, global = true, default_value_t = 0)]
    retries: usize,

    /// Pause between retries, in milliseconds
    #[arg(long, global = true, default_value_t = 500)]
    retry_delay_ms: u64,

    /// Log filter, overrides the configured level (e.g. `debug`)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List drivers
    List {
        /// Include disabled and experimental drivers
        #[arg(long)]
        all: bool,

        /// Print JSON
        #[arg(long)]
        json: bool,

        /// Locale for titles
        #[arg(long, default_value = "en")]
        locale: String,
    },

    /// List attached serial ports
    Ports {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a location is usable right now
    Check {
        /// `port:<path>`, `ip:<host[:port]>` or a local socket path
        location: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Route an input to an output
    Activate {
        /// Driver id
        driver: DriverId,
        /// Device location
        location: String,
        /// Input channel
        input: u32,
        /// Video output channel
        video: u32,
        /// Audio output channel; defaults to the video output
        audio: Option<u32>,
    },

    /// Power a device on
    PowerOn {
        /// Driver id
        driver: DriverId,
        /// Device location
        location: String,
    },

    /// Power a device off
    PowerOff {
        /// Driver id
        driver: DriverId,
        /// Device location
        location: String,
    },
}

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    location: String,
    kind: &'a str,
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 2 for bad input, 1 for device or channel failures.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<DriverError>() {
        Some(DriverError::Transport(_)) => 1,
        Some(_) => 2,
        None => 1,
    }
}

/// Only channel failures can clear up on their own.
fn is_retryable(err: &DriverError) -> bool {
    matches!(err, DriverError::Transport(_))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut builder = ConfigBuilder::new().with_environment_prefix(ENV_PREFIX);
    if let Some(path) = path {
        builder = builder.with_config_file(path);
    }
    builder.build().context("failed to load configuration")
}

fn registry(config: &Config) -> DriverRegistry {
    let registry = DriverRegistry::new(Arc::new(SystemPortLister::new()));
    register_builtin(
        &registry,
        Arc::new(SystemTransport::new()),
        DriverOverrides::from_config(&config.transport),
    );
    registry
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let logged = match &cli.log {
        Some(filter) => logging::init_with_filter(filter),
        None => logging::init_with_config(&config.logging),
    };
    logged.context("failed to initialise logging")?;
    debug!(environment = %config.general.environment, "configuration loaded");

    let registry = registry(&config);
    let retries = cli.retries;
    let delay = Duration::from_millis(cli.retry_delay_ms);

    match cli.command {
        Commands::List { all, json, locale } => {
            let show_experimental = all || config.general.show_experimental;
            let drivers: Vec<DriverDescriptor> = registry
                .list()
                .into_iter()
                .filter(|d| all || d.enabled)
                .filter(|d| show_experimental || !d.experimental)
                .collect();
            print_drivers(&drivers, json, &locale)
        }
        Commands::Ports { json } => {
            let ports = SystemPortLister::new()
                .list_ports()
                .await
                .context("failed to list serial ports")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ports)?);
            } else if ports.is_empty() {
                println!("no serial ports found");
            } else {
                for port in ports {
                    println!("port:{}\t{}", port.path, port.title());
                }
            }
            Ok(())
        }
        Commands::Check { location, json } => {
            let parsed = registry.check_location(&location).await?;
            print_location(&parsed, &config, json)
        }
        Commands::Activate {
            driver,
            location,
            input,
            video,
            audio,
        } => {
            let tie = Tie::new(input, video).with_audio_output(audio.unwrap_or(video));
            let registry = &registry;
            let location = location.as_str();
            let driver = &driver;
            with_retry_if(retries, delay, is_retryable, move || {
                registry.activate(driver, location, tie)
            })
            .await?;
            println!("ok");
            Ok(())
        }
        Commands::PowerOn { driver, location } => {
            let registry = &registry;
            let location = location.as_str();
            let driver = &driver;
            with_retry_if(retries, delay, is_retryable, move || {
                registry.power_on(driver, location)
            })
            .await?;
            println!("ok");
            Ok(())
        }
        Commands::PowerOff { driver, location } => {
            let registry = &registry;
            let location = location.as_str();
            let driver = &driver;
            with_retry_if(retries, delay, is_retryable, move || {
                registry.power_off(driver, location)
            })
            .await?;
            println!("ok");
            Ok(())
        }
    }
}

fn print_drivers(drivers: &[DriverDescriptor], json: bool, locale: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(drivers)?);
        return Ok(());
    }
    for driver in drivers {
        let (company, title) = driver
            .metadata
            .get(locale)
            .map(|m| (m.company.as_str(), m.title.as_str()))
            .unwrap_or(("", ""));
        let mut flags = Vec::new();
        if driver.experimental {
            flags.push("experimental");
        }
        if !driver.enabled {
            flags.push("disabled");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!("{}  {:<7}  {} {}{}", driver.id, driver.kind, company, title, flags);
    }
    Ok(())
}

fn print_location(location: &Location, config: &Config, json: bool) -> Result<()> {
    let report = CheckReport {
        location: location.to_string(),
        kind: location.kind(),
        port: location.port_or(config.transport.network_port),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match report.port {
            Some(port) => println!("{} ({}, tcp port {})", report.location, report.kind, port),
            None => println!("{} ({})", report.location, report.kind),
        }
    }
    Ok(())
}
