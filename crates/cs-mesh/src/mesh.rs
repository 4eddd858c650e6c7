//! Service wiring
//!
//! Builds the gateway, the specialists and the orchestrator from the
//! configuration and serves them until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use cs_a2a::{AgentClient, GatewayClient, HttpAgentTransport, PeersConfig, discover_directory};
use cs_core::agents::{
    CapabilityDirectory, CustomerInfoPolicy, InProcessTransport, RetryPolicy, SpecialistPolicy,
    SupportPolicy,
};
use cs_core::{
    CapabilityCard, Config, Orchestrator, RecordStore, RulePlanner, SpecialistAgent, ToolInvoker,
};
use cs_tools::ToolGateway;

/// Card fetches at startup wait for peers that are still binding
const DISCOVERY_RETRIES: u32 = 10;
const DISCOVERY_BACKOFF: Duration = Duration::from_millis(300);

/// Which specialist a process hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialist {
    CustomerInfo,
    Support,
}

impl Specialist {
    fn card(&self, config: &Config) -> CapabilityCard {
        match self {
            Self::CustomerInfo => CapabilityCard::customer_info(config.agents.customer_info_url()),
            Self::Support => CapabilityCard::support(config.agents.support_url()),
        }
    }

    fn policy(&self) -> Arc<dyn SpecialistPolicy> {
        match self {
            Self::CustomerInfo => Arc::new(CustomerInfoPolicy),
            Self::Support => Arc::new(SupportPolicy),
        }
    }

    fn port(&self, config: &Config) -> u16 {
        match self {
            Self::CustomerInfo => config.agents.customer_info_port,
            Self::Support => config.agents.support_port,
        }
    }
}

/// Open the record store, resetting it to the demo data when configured
pub fn open_store(config: &Config) -> anyhow::Result<Arc<RecordStore>> {
    let store = RecordStore::new(&config.store.db_path)?;
    if config.store.seed {
        store.reset_and_seed()?;
    }
    info!(db_path = %config.store.db_path, seeded = config.store.seed, "Record store ready");
    Ok(Arc::new(store))
}

/// Build a specialist calling tools through `tools`
pub fn specialist(kind: Specialist, tools: Arc<dyn ToolInvoker>, config: &Config) -> SpecialistAgent {
    SpecialistAgent::new(kind.card(config), kind.policy(), tools)
        .with_retry(RetryPolicy::new(
            config.delegation.max_retries,
            config.delegation.retry_backoff(),
        ))
        .with_call_timeout(config.gateway.call_timeout())
}

/// Orchestrator and specialists in one process over a shared store, no HTTP
pub fn local_orchestrator(store: Arc<RecordStore>, config: &Config) -> Orchestrator {
    let tools: Arc<dyn ToolInvoker> = Arc::new(ToolGateway::new(store));
    let customer_info = Arc::new(specialist(Specialist::CustomerInfo, tools.clone(), config));
    let support = Arc::new(specialist(Specialist::Support, tools, config));

    let directory = CapabilityDirectory::new([customer_info.card().clone(), support.card().clone()]);
    let transport = InProcessTransport::new()
        .with_agent(customer_info)
        .with_agent(support);

    Orchestrator::new(
        Arc::new(directory),
        Arc::new(RulePlanner),
        Arc::new(transport),
        config.delegation.clone(),
    )
}

/// Serve the Tool Gateway
pub async fn run_gateway(
    config: &Config,
    store: Arc<RecordStore>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = cs_api::gateway_app(Arc::new(ToolGateway::new(store)));
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    cs_api::serve("gateway", &addr, app, shutdown.cancelled_owned()).await
}

/// Serve one specialist, calling the gateway over HTTP
pub async fn run_specialist(
    kind: Specialist,
    config: &Config,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let tools = GatewayClient::new(config.gateway.url(), config.gateway.call_timeout())?;
    let agent = Arc::new(specialist(kind, Arc::new(tools), config));
    let name = agent.name().to_string();

    let app = cs_api::agent_app(agent);
    let addr = format!("{}:{}", config.agents.host, kind.port(config));
    cs_api::serve(&name, &addr, app, shutdown.cancelled_owned()).await
}

/// Discover the specialists and serve the orchestrator
pub async fn run_orchestrator(config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let client = AgentClient::new(config.delegation.timeout())?;
    let peers = PeersConfig::load(&config.agents)?;
    let directory = discover_directory(
        &peers,
        &client,
        RetryPolicy::new(DISCOVERY_RETRIES, DISCOVERY_BACKOFF),
    )
    .await;
    info!(agents = ?directory.names(), "Orchestrator directory ready");

    let orchestrator = Orchestrator::new(
        Arc::new(directory),
        Arc::new(RulePlanner),
        Arc::new(HttpAgentTransport::new(client)),
        config.delegation.clone(),
    );
    let card = CapabilityCard::orchestrator(config.agents.orchestrator_url());
    let app = cs_api::orchestrator_app(Arc::new(orchestrator), card);
    let addr = format!("{}:{}", config.agents.host, config.agents.orchestrator_port);
    cs_api::serve("orchestrator", &addr, app, shutdown.cancelled_owned()).await
}

/// Run the whole mesh in one process, each service on its own port
pub async fn run_all(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let config = Arc::new(config);
    let mut service_handles = Vec::new();

    {
        let (config, shutdown) = (config.clone(), shutdown.clone());
        service_handles.push(tokio::spawn(async move {
            run_gateway(&config, store, shutdown).await
        }));
    }
    for kind in [Specialist::CustomerInfo, Specialist::Support] {
        let (config, shutdown) = (config.clone(), shutdown.clone());
        service_handles.push(tokio::spawn(async move {
            run_specialist(kind, &config, shutdown).await
        }));
    }
    {
        let (config, shutdown) = (config.clone(), shutdown.clone());
        service_handles.push(tokio::spawn(async move {
            run_orchestrator(&config, shutdown).await
        }));
    }
    info!(services = service_handles.len(), "Mesh started");

    let mut first_error = None;
    for handle in service_handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("Service task failed: {}", e)),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Service stopped with an error");
            // One failed service takes the rest of the mesh down with it
            shutdown.cancel();
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
