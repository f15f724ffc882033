//! Homelab Monitor plugin (hlmon-plugin) - Netdata external plugin
//!
//! Netdata runs external plugins with the update interval as the first
//! argument:
//!
//!   hlmon-plugin lighthouse [update_every]
//!   hlmon-plugin --config /etc/netdata/hlmon.toml earnings 60

#[cfg(feature = "cli")]
use clap::Parser;
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "hlmon-plugin")]
#[command(about = "Netdata external plugin for blockchain node health", long_about = None)]
#[command(version)]
struct Cli {
    /// Collector to run: lighthouse, reth, octez, helium or earnings
    collector: homelab::CollectorKind,

    /// Seconds between collections (defaults to the collector's own interval)
    update_every: Option<u64>,

    /// Configuration file; built-in defaults are used if it does not exist
    #[arg(short, long, default_value = "hlmon.toml")]
    config: PathBuf,
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Duration;

    // stdout belongs to Netdata
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        homelab::Config::from_file(&cli.config)?
    } else {
        log::info!("{} not found, using defaults", cli.config.display());
        homelab::Config::default()
    };

    let collector = homelab::chain::build(cli.collector, &config)?;
    let update_every = cli.update_every.filter(|s| *s > 0).map(Duration::from_secs);
    homelab::plugin::run(collector.as_ref(), update_every, std::io::stdout()).await?;
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
