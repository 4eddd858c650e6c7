//! Demo scenarios
//!
//! The five end-to-end requests the mesh was built around, sent to the
//! orchestrator over HTTP or run in-process.

use cs_a2a::AgentClient;
use cs_core::{Config, RecordStore, WorkflowResponse};

use crate::mesh::local_orchestrator;

/// One demo request
pub struct Scenario {
    pub name: &'static str,
    pub message: &'static str,
    pub expected: &'static str,
}

pub const SCENARIOS: [Scenario; 5] = [
    Scenario {
        name: "Simple data retrieval",
        message: "Please get the full record for customer ID 1",
        expected: "Full customer record with all fields",
    },
    Scenario {
        name: "Coordinated service request",
        message: "I am customer ID 2 and I need to upgrade my service plan to Premium.",
        expected: "A medium priority upgrade ticket",
    },
    Scenario {
        name: "Complex filtering query",
        message: "Show me all active customer accounts that have open support tickets.",
        expected: "Active accounts with at least one open ticket",
    },
    Scenario {
        name: "High-priority ticket logging",
        message: "URGENT! I was charged twice for my subscription! I need a refund immediately! My account ID is 1.",
        expected: "A high priority ticket for the billing issue",
    },
    Scenario {
        name: "Multi-step update and history",
        message: "For customer ID 5: change their email to newaddress@corp.com and then show me their complete ticket history.",
        expected: "Email updated, then the full ticket history",
    },
];

fn print_response(index: usize, scenario: &Scenario, response: &WorkflowResponse) {
    println!();
    println!("[{}/{}] {}", index + 1, SCENARIOS.len(), scenario.name);
    println!("Request:  {}", scenario.message);
    println!("Expected: {}", scenario.expected);
    println!("{}", "-".repeat(80));
    println!("Status: {:?} ({})", response.status, response.outcome);
    println!("{}", response.message);
}

/// Send every scenario to a running orchestrator
pub async fn run_remote(config: &Config) -> anyhow::Result<()> {
    let client = AgentClient::new(config.delegation.timeout())?;
    let url = config.agents.orchestrator_url();
    let mut failures = 0;

    for (i, scenario) in SCENARIOS.iter().enumerate() {
        match client.ask(&url, scenario.message).await {
            Ok(response) => {
                if !response.is_completed() {
                    failures += 1;
                }
                print_response(i, scenario, &response);
            }
            Err(e) => {
                failures += 1;
                println!();
                println!("[{}/{}] {}: request failed: {}", i + 1, SCENARIOS.len(), scenario.name, e);
            }
        }
    }

    summarize(failures)
}

/// Run every scenario in-process against a fresh in-memory store
pub async fn run_local(config: &Config) -> anyhow::Result<()> {
    let store = RecordStore::in_memory()?;
    store.reset_and_seed()?;
    let orchestrator = local_orchestrator(std::sync::Arc::new(store), config);
    let mut failures = 0;

    for (i, scenario) in SCENARIOS.iter().enumerate() {
        let response = orchestrator.handle(scenario.message).await;
        if !response.is_completed() {
            failures += 1;
        }
        print_response(i, scenario, &response);
    }

    summarize(failures)
}

fn summarize(failures: usize) -> anyhow::Result<()> {
    println!();
    println!("{}", "=".repeat(80));
    println!("{} of {} scenarios completed", SCENARIOS.len() - failures, SCENARIOS.len());
    if failures > 0 {
        anyhow::bail!("{} scenario(s) failed", failures);
    }
    Ok(())
}
