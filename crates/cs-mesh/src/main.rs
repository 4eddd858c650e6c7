//! cs-mesh: customer service agent mesh
//!
//! Usage:
//!   cs-mesh                   - Run gateway, specialists and orchestrator
//!   cs-mesh gateway           - Run only the Tool Gateway
//!   cs-mesh customer-info     - Run only the customer information agent
//!   cs-mesh support           - Run only the support agent
//!   cs-mesh orchestrator      - Run only the orchestrator
//!   cs-mesh ask "<message>"   - Send one request to a running orchestrator
//!   cs-mesh demo [--local]    - Run the demo scenarios
//!   cs-mesh --help            - Show help

mod demo;
mod mesh;

use cs_a2a::AgentClient;
use cs_core::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::mesh::Specialist;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Every service in one process
    All,
    Gateway,
    CustomerInfo,
    Support,
    Orchestrator,
    /// Send one request to the orchestrator
    Ask(String),
    /// Demo scenarios, over HTTP or in-process
    Demo { local: bool },
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mode = match parse_args(&args) {
        Ok(mode) => mode,
        Err(e) => {
            print_help();
            return Err(e);
        }
    };

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("cs-mesh {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down...");
                shutdown.cancel();
            }
        });
    }

    match mode {
        RunMode::All => {
            tracing::info!("Starting cs-mesh...");
            mesh::run_all(config, shutdown).await
        }
        RunMode::Gateway => {
            let store = mesh::open_store(&config)?;
            mesh::run_gateway(&config, store, shutdown).await
        }
        RunMode::CustomerInfo => mesh::run_specialist(Specialist::CustomerInfo, &config, shutdown).await,
        RunMode::Support => mesh::run_specialist(Specialist::Support, &config, shutdown).await,
        RunMode::Orchestrator => mesh::run_orchestrator(&config, shutdown).await,
        RunMode::Ask(message) => ask(&config, &message).await,
        RunMode::Demo { local: true } => demo::run_local(&config).await,
        RunMode::Demo { local: false } => demo::run_remote(&config).await,
        RunMode::Help | RunMode::Version => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> anyhow::Result<RunMode> {
    let mut rest = args.iter().skip(1).map(String::as_str);

    let mode = match rest.next() {
        None => RunMode::All,
        Some("--help" | "-h" | "help") => RunMode::Help,
        Some("--version" | "-v" | "version") => RunMode::Version,
        Some("all") => RunMode::All,
        Some("gateway") => RunMode::Gateway,
        Some("customer-info") => RunMode::CustomerInfo,
        Some("support") => RunMode::Support,
        Some("orchestrator") => RunMode::Orchestrator,
        Some("ask") => {
            let message = rest.collect::<Vec<_>>().join(" ");
            if message.trim().is_empty() {
                anyhow::bail!("ask needs a message");
            }
            return Ok(RunMode::Ask(message));
        }
        Some("demo") => match rest.next() {
            None => RunMode::Demo { local: false },
            Some("--local" | "-l") => RunMode::Demo { local: true },
            Some(other) => anyhow::bail!("Unknown demo option: {}", other),
        },
        Some(other) => anyhow::bail!("Unknown command: {}", other),
    };

    if let Some(extra) = rest.next() {
        anyhow::bail!("Unexpected argument: {}", extra);
    }
    Ok(mode)
}

/// Print help message
fn print_help() {
    println!("cs-mesh - Customer service agent mesh");
    println!();
    println!("Usage:");
    println!("  cs-mesh                   Run gateway, specialists and orchestrator");
    println!("  cs-mesh gateway           Run only the Tool Gateway");
    println!("  cs-mesh customer-info     Run only the customer information agent");
    println!("  cs-mesh support           Run only the support agent");
    println!("  cs-mesh orchestrator      Run only the orchestrator");
    println!("  cs-mesh ask <message>     Send one request to a running orchestrator");
    println!("  cs-mesh demo [--local]    Run the demo scenarios");
    println!("  cs-mesh --help            Show this help message");
    println!("  cs-mesh --version         Show version");
    println!();
    println!("Environment Variables:");
    println!("  CS_DB_PATH                SQLite database path (default: data/cs-mesh.db)");
    println!("  CS_SEED                   Reset and seed demo data at startup (default: true)");
    println!("  CS_GATEWAY_PORT           Tool Gateway port (default: 8000)");
    println!("  CS_CUSTOMER_INFO_PORT     Customer information agent port (default: 9300)");
    println!("  CS_SUPPORT_PORT           Support agent port (default: 9301)");
    println!("  CS_ORCHESTRATOR_PORT      Orchestrator port (default: 9400)");
    println!("  CS_DELEGATION_TIMEOUT_SECS  Per-step delegation timeout (default: 60)");
    println!("  CS_PEERS_FILE             JSON or TOML list of specialist peers");
    println!("  RUST_LOG                  Log filter");
    println!();
    println!("A cs-mesh.toml in the working directory is used instead when present.");
}

async fn ask(config: &Config, message: &str) -> anyhow::Result<()> {
    let client = AgentClient::new(config.delegation.timeout())?;
    let response = client.ask(&config.agents.orchestrator_url(), message).await?;

    println!("{}", response.message);
    println!();
    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_completed() {
        anyhow::bail!("Request did not complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("cs-mesh")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_default_runs_everything() {
        assert_eq!(parse_args(&args(&[])).unwrap(), RunMode::All);
    }

    #[test]
    fn test_single_services() {
        assert_eq!(parse_args(&args(&["gateway"])).unwrap(), RunMode::Gateway);
        assert_eq!(parse_args(&args(&["customer-info"])).unwrap(), RunMode::CustomerInfo);
        assert_eq!(parse_args(&args(&["support"])).unwrap(), RunMode::Support);
        assert_eq!(parse_args(&args(&["orchestrator"])).unwrap(), RunMode::Orchestrator);
        assert_eq!(parse_args(&args(&["-h"])).unwrap(), RunMode::Help);
    }

    #[test]
    fn test_ask_joins_words() {
        assert_eq!(
            parse_args(&args(&["ask", "show", "customer", "1"])).unwrap(),
            RunMode::Ask("show customer 1".to_string())
        );
        assert!(parse_args(&args(&["ask"])).is_err());
    }

    #[test]
    fn test_demo_modes() {
        assert_eq!(parse_args(&args(&["demo"])).unwrap(), RunMode::Demo { local: false });
        assert_eq!(
            parse_args(&args(&["demo", "--local"])).unwrap(),
            RunMode::Demo { local: true }
        );
        assert!(parse_args(&args(&["demo", "--fast"])).is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse_args(&args(&["serve"])).is_err());
        assert!(parse_args(&args(&["gateway", "extra"])).is_err());
    }
}
