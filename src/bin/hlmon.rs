//! Homelab Monitor (hlmon) - MCP server for AI agents
//!
//! Usage:
//!   hlmon [--config hlmon.toml]          - Serve MCP over stdio (default)
//!   hlmon tools                          - Print tool definitions as JSON
//!   hlmon call <tool> [json-arguments]   - Run one tool and print the result
//!   hlmon sample-config                  - Print a commented sample config

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "hlmon")]
#[command(about = "Homelab Monitor: Netdata, RouterOS and Dozzle for AI agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<HlmonCommand>,

    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, default_value = "hlmon.toml", global = true)]
    config: PathBuf,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum HlmonCommand {
    /// Start the MCP (Model Context Protocol) server on stdio
    Serve,
    /// Print the tools available under the current configuration
    Tools,
    /// Run a single tool and print its JSON result
    Call {
        /// Tool name, e.g. get_all_servers_overview
        tool: String,
        /// Arguments object as JSON
        #[arg(default_value = "{}")]
        arguments: String,
    },
    /// Print a commented sample configuration
    SampleConfig,
}

#[cfg(feature = "cli")]
fn load_config(path: &std::path::Path) -> Result<homelab::Config, Box<dyn std::error::Error>> {
    let config = homelab::Config::from_file(path)?;
    config.validate()?;
    log::info!(
        "Loaded {} ({} servers, router {}, logs {})",
        path.display(),
        config.servers.len(),
        if config.router().is_some() { "on" } else { "off" },
        if config.log_aggregator().is_some() { "on" } else { "off" },
    );
    Ok(config)
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use homelab::{tools, McpServer, Orchestrator};
    use std::sync::Arc;

    // stdout carries the protocol; logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(HlmonCommand::Serve) {
        HlmonCommand::SampleConfig => {
            print!("{}", homelab::Config::sample_toml());
        }
        HlmonCommand::Tools => {
            let config = load_config(&cli.config)?;
            println!("{}", serde_json::to_string_pretty(&tools::definitions(&config))?);
        }
        HlmonCommand::Call { tool, arguments } => {
            let config = Arc::new(load_config(&cli.config)?);
            let arguments: serde_json::Value = serde_json::from_str(&arguments)?;
            let op = tools::parse_call(&tool, &arguments)?;
            let result = Orchestrator::from_config(config).run(&op).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        HlmonCommand::Serve => {
            let config = Arc::new(load_config(&cli.config)?);
            eprintln!("[*] Starting MCP server on stdio...");
            eprintln!("[*] Protocol version: {}", homelab::mcp_server::MCP_PROTOCOL_VERSION);

            let server = McpServer::new(Orchestrator::from_config(config));
            server.run_stdio().await?;
        }
    }

    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features not enabled. Please compile with --features cli");
    std::process::exit(1);
}
