//! Capability discovery
//!
//! Fetches every enabled peer's capability card once and builds the
//! immutable directory from them. Unreachable peers are skipped; the
//! orchestrator then rejects steps aimed at them.

use tracing::{info, warn};

use cs_core::CapabilityDirectory;
use cs_core::agents::RetryPolicy;

use crate::client::AgentClient;
use crate::config::PeersConfig;

/// Build the capability directory from the configured peers.
///
/// Card fetches are retried under `retry` so peers that are still starting
/// are picked up.
pub async fn discover_directory(
    peers: &PeersConfig,
    client: &AgentClient,
    retry: RetryPolicy,
) -> CapabilityDirectory {
    let mut cards = Vec::new();

    for peer in peers.enabled_peers() {
        let what = format!("card of '{}'", peer.name);
        let (result, attempts) = retry
            .run(&what, false, || client.fetch_card(&peer.url))
            .await;

        match result {
            Ok(mut card) => {
                if card.name != peer.name {
                    warn!(
                        peer = %peer.name,
                        card_name = %card.name,
                        "Card name differs from configured peer name; using the card's"
                    );
                }
                if card.url.is_empty() {
                    card.url = peer.url.clone();
                }
                info!(
                    agent = %card.name,
                    url = %card.url,
                    tools = card.permitted_tools.len(),
                    attempts,
                    "Discovered agent"
                );
                cards.push(card);
            }
            Err(e) => {
                warn!(
                    peer = %peer.name,
                    url = %peer.url,
                    attempts,
                    error = %e,
                    "Skipping agent whose card could not be fetched"
                );
            }
        }
    }

    if cards.is_empty() {
        warn!("No agents discovered");
    }
    CapabilityDirectory::new(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;
    use axum::Router;
    use axum::routing::get;
    use cs_core::CapabilityCard;
    use cs_core::agents::AGENT_CARD_PATH;
    use cs_core::ToolName;
    use std::time::Duration;

    async fn serve_card(card: CapabilityCard) -> String {
        let router = Router::new().route(
            AGENT_CARD_PATH,
            get(move || {
                let card = card.clone();
                async move { axum::Json(card) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        url
    }

    #[tokio::test]
    async fn test_discovery_skips_unreachable_peers() {
        let support_url = serve_card(CapabilityCard::support("")).await;

        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_url = format!("http://{}", dead.local_addr().unwrap());
        drop(dead);

        let mut peers = PeersConfig::new();
        peers.add_peer(PeerConfig::new("support", support_url.clone()));
        peers.add_peer(PeerConfig::new("customer_info", dead_url));

        let client = AgentClient::new(Duration::from_secs(2)).unwrap();
        let directory =
            discover_directory(&peers, &client, RetryPolicy::new(1, Duration::from_millis(5))).await;

        assert_eq!(directory.names(), vec!["support"]);
        let support = directory.resolve("support").unwrap();
        assert_eq!(support.address, support_url);
        assert!(support.permits(ToolName::RegisterSupportIssue));
        assert!(directory.resolve("customer_info").is_err());
    }
}
