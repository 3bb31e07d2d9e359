//! `iot-registry` CLI entry-point.
//!
//! Available sub-commands:
//! - `migrate` — run pending database migrations.
//! - `device …` — device CRUD, finders, and the composite `provision`.
//! - `config …` — network configuration CRUD and finders.
//!
//! Business errors (validation, duplicates, missing entities) print their
//! message and exit non-zero; only a failed initial database connection
//! is treated as a startup failure.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use db::{DbConfig, PgStore};
use service::{ConfigService, Device, DeviceService, NetworkConfig};

#[derive(Parser)]
#[command(
    name = "iot-registry",
    about = "IoT device and network configuration registry",
    version
)]
struct Cli {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Pool size ceiling.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate,
    /// Manage devices.
    #[command(subcommand)]
    Device(DeviceCommand),
    /// Manage network configurations.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum DeviceCommand {
    /// Register a new device.
    Add {
        #[arg(long)]
        serial: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        firmware: Option<String>,
    },
    /// Register a device together with its network configuration in one
    /// transaction.
    Provision {
        #[arg(long)]
        serial: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        firmware: Option<String>,
        /// Use DHCP; the address flags are ignored.
        #[arg(long)]
        dhcp: bool,
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long, default_value = "")]
        mask: String,
        #[arg(long, default_value = "")]
        gateway: String,
        #[arg(long, default_value = "")]
        dns: String,
    },
    /// List all active devices.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one device by id.
    Get {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Update a device's fields.
    Update {
        id: i64,
        #[arg(long)]
        serial: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        firmware: Option<String>,
    },
    /// Soft-delete a device (and its linked configuration).
    Delete { id: i64 },
    /// Look a device up by serial.
    FindSerial { serial: String },
    /// List devices whose location contains the given text.
    FindLocation { text: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Register a standalone network configuration.
    Add {
        /// Use DHCP; the address flags are ignored.
        #[arg(long)]
        dhcp: bool,
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long, default_value = "")]
        mask: String,
        #[arg(long, default_value = "")]
        gateway: String,
        #[arg(long, default_value = "")]
        dns: String,
    },
    /// List all active configurations.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one configuration by id.
    Get {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Update a configuration's fields.
    Update {
        id: i64,
        #[arg(long)]
        dhcp: bool,
        #[arg(long, default_value = "")]
        ip: String,
        #[arg(long, default_value = "")]
        mask: String,
        #[arg(long, default_value = "")]
        gateway: String,
        #[arg(long, default_value = "")]
        dns: String,
    },
    /// Soft-delete a configuration (refused while a device references it).
    Delete { id: i64 },
    /// Look a configuration up by IP address.
    FindIp { ip: String },
    /// List configurations by DHCP state.
    FindDhcp {
        #[arg(long)]
        enabled: bool,
    },
}

fn build_config(dhcp: bool, ip: String, mask: String, gateway: String, dns: String) -> NetworkConfig {
    if dhcp {
        NetworkConfig::new_dhcp()
    } else {
        NetworkConfig::new_static(ip, mask, gateway, dns)
    }
}

fn print_device(device: &Device, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(device)?);
        return Ok(());
    }
    let id = device.id.unwrap_or_default();
    let firmware = device.firmware_version.as_deref().unwrap_or("-");
    let config = match &device.config {
        Some(config) if config.dhcp_enabled => "dhcp".to_owned(),
        Some(config) => config.ip.clone(),
        None => "-".to_owned(),
    };
    println!(
        "#{id}  {}  {}  {}  firmware: {firmware}  config: {config}",
        device.serial, device.model, device.location
    );
    Ok(())
}

fn print_config(config: &NetworkConfig, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }
    let id = config.id.unwrap_or_default();
    let mode = if config.dhcp_enabled { "dhcp" } else { "static" };
    let device = match config.device_id {
        Some(device_id) => format!("device #{device_id}"),
        None => "unassigned".to_owned(),
    };
    println!(
        "#{id}  {mode}  ip: {}  mask: {}  gw: {}  dns: {}  {device}",
        config.ip, config.subnet_mask, config.gateway, config.primary_dns
    );
    Ok(())
}

async fn run_device_command(
    devices: &DeviceService,
    command: DeviceCommand,
) -> anyhow::Result<()> {
    match command {
        DeviceCommand::Add {
            serial,
            model,
            location,
            firmware,
        } => {
            let device = devices
                .insert(Device::new(serial, model, location, firmware))
                .await?;
            println!("Created device #{}", device.id.unwrap_or_default());
        }
        DeviceCommand::Provision {
            serial,
            model,
            location,
            firmware,
            dhcp,
            ip,
            mask,
            gateway,
            dns,
        } => {
            let device = devices
                .insert_with_config(
                    Device::new(serial, model, location, firmware),
                    build_config(dhcp, ip, mask, gateway, dns),
                )
                .await?;
            let config_id = device
                .config
                .as_ref()
                .and_then(|c| c.id)
                .unwrap_or_default();
            println!(
                "Provisioned device #{} with configuration #{config_id}",
                device.id.unwrap_or_default()
            );
        }
        DeviceCommand::List { json } => {
            for device in devices.get_all().await? {
                print_device(&device, json)?;
            }
        }
        DeviceCommand::Get { id, json } => {
            print_device(&devices.get_by_id(id).await?, json)?;
        }
        DeviceCommand::Update {
            id,
            serial,
            model,
            location,
            firmware,
        } => {
            let mut device = Device::new(serial, model, location, firmware);
            device.id = Some(id);
            devices.update(device).await?;
            println!("Updated device #{id}");
        }
        DeviceCommand::Delete { id } => {
            devices.delete(id).await?;
            println!("Deleted device #{id}");
        }
        DeviceCommand::FindSerial { serial } => {
            print_device(&devices.find_by_serial(&serial).await?, false)?;
        }
        DeviceCommand::FindLocation { text } => {
            for device in devices.find_by_location(&text).await? {
                print_device(&device, false)?;
            }
        }
    }
    Ok(())
}

async fn run_config_command(
    configs: &ConfigService,
    command: ConfigCommand,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Add {
            dhcp,
            ip,
            mask,
            gateway,
            dns,
        } => {
            let config = configs
                .insert(build_config(dhcp, ip, mask, gateway, dns))
                .await?;
            println!("Created configuration #{}", config.id.unwrap_or_default());
        }
        ConfigCommand::List { json } => {
            for config in configs.get_all().await? {
                print_config(&config, json)?;
            }
        }
        ConfigCommand::Get { id, json } => {
            print_config(&configs.get_by_id(id).await?, json)?;
        }
        ConfigCommand::Update {
            id,
            dhcp,
            ip,
            mask,
            gateway,
            dns,
        } => {
            let mut config = build_config(dhcp, ip, mask, gateway, dns);
            config.id = Some(id);
            configs.update(config).await?;
            println!("Updated configuration #{id}");
        }
        ConfigCommand::Delete { id } => {
            configs.delete(id).await?;
            println!("Deleted configuration #{id}");
        }
        ConfigCommand::FindIp { ip } => {
            print_config(&configs.find_by_ip(&ip).await?, false)?;
        }
        ConfigCommand::FindDhcp { enabled } => {
            for config in configs.find_by_dhcp(enabled).await? {
                print_config(&config, false)?;
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DbConfig {
        url: cli.database_url,
        max_connections: cli.max_connections,
    };
    let pool = db::pool::create_pool(&config)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Command::Migrate => {
            db::pool::run_migrations(&pool).await?;
            info!("Migrations applied successfully");
            Ok(())
        }
        Command::Device(command) => {
            let store = Arc::new(PgStore::new(pool));
            let devices = DeviceService::new(store);
            run_device_command(&devices, command).await
        }
        Command::Config(command) => {
            let store = Arc::new(PgStore::new(pool));
            let configs = ConfigService::new(store);
            run_config_command(&configs, command).await
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
