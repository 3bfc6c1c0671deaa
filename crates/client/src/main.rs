mod discover;
mod session;

use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use session::PlayerSession;
use treads::{NetworkConfig, NetworkSystem};

#[derive(Parser)]
#[command(name = "treads-client")]
#[command(about = "Joins a Treads game")]
struct Args {
    #[arg(
        short,
        long,
        help = "Server address (e.g., 192.168.1.20:19014); found on the LAN if omitted"
    )]
    server: Option<String>,

    #[arg(short, long, default_value = "Player")]
    name: String,

    #[arg(
        long,
        default_value_t = Ipv4Addr::UNSPECIFIED,
        help = "Interface to listen for LAN games on"
    )]
    interface: Ipv4Addr,

    #[arg(long, default_value_t = 3, help = "Seconds to listen for LAN games")]
    discover_secs: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = NetworkConfig::default();

    let addr = match args.server {
        Some(server) => resolve(&server)?,
        None => {
            let wait = Duration::from_secs(args.discover_secs);
            let servers = discover::find_servers(args.interface, &config, wait)?;
            let Some(advert) = servers.into_iter().next() else {
                bail!("no games found on the local network; pass --server");
            };
            println!("Joining '{}' ({})", advert.server_name, advert.map_name);
            SocketAddr::new(advert.address, config.port)
        }
    };

    let mut net = NetworkSystem::new(config);
    net.connect(addr, &args.name)
        .with_context(|| format!("could not connect to {addr}"))?;

    PlayerSession::new(net, &args.name).run()
}

fn resolve(server: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = server.parse() {
        return Ok(addr);
    }
    (server, treads::DEFAULT_PORT)
        .to_socket_addrs()?
        .next()
        .with_context(|| format!("could not resolve {server}"))
}
