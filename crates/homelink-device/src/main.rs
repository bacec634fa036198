//! Runs a `homelink` device until interrupted.

use std::net::IpAddr;

use clap::Parser;

use homelink::device::DeviceKind;

use homelink_device::command::CommandHandler;
use homelink_device::device::Device;
use homelink_device::network::NetworkHandler;

use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Device kind: light, fan or ac.
    #[arg(long = "type")]
    kind: DeviceKind,

    /// Device identifier.
    #[arg(long)]
    id: String,

    /// Device password.
    #[arg(long)]
    password: String,

    /// Command server port.
    #[arg(long)]
    port: u16,

    /// Address announced in discovery beacons.
    #[arg(long)]
    address: Option<IpAddr>,

    /// Maximum log level.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let device = Device::new(cli.kind, &cli.id, &cli.password);

    let mut network = NetworkHandler::new(CommandHandler::new(device.clone()), cli.port);
    if let Some(address) = cli.address {
        network = network.advertised_address(address);
    }

    let server = match network.start().await {
        Ok(server) => server,
        Err(e) => {
            error!("Unable to start device `{}`: {e}", cli.id);
            device.shutdown();
            std::process::exit(1);
        }
    };

    info!(
        "Device `{}` ({}) running on {}",
        cli.id,
        cli.kind,
        server.local_address()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for the shutdown signal: {e}");
    }

    info!("Shutting down device `{}`", cli.id);

    server.stop().await;
    device.shutdown();
}
