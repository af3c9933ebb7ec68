//! RPC node selection
//!
//! Selection always runs discovery first: the seed list is probed, the
//! refreshed registry is ranked by health score, and the top node is taken.
//! When consensus validation is on, the choice is confirmed by reading the
//! registry contract's own `getBestNode()` through the candidate endpoint
//! under a hard timeout; a rejected candidate escalates to the failover
//! controller.
//!
//! Acquisition states:
//! `Idle → Discovering → {Selected | Failed}`
//! `Selected → ValidatingConsensus → {Confirmed | Rejected}`
//! `Rejected → Failover → {Selected(fallback) | FailoverExhausted}`

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::directory::ConsensusProbe;
use super::failover::FailoverController;
use super::probe::NodeProber;
use super::registry::NodeRegistry;
use crate::types::{Result, SwitchboardError};

/// Where the selector currently is in the acquisition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionState {
    Idle,
    Discovering,
    Selected,
    Failed,
    ValidatingConsensus,
    Confirmed,
    Rejected,
    Failover,
    FailoverExhausted,
}

/// Selector configuration
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Seed endpoints probed on every selection
    pub seeds: Vec<String>,
    /// Whether selections must pass on-chain consensus validation
    pub consensus_required: bool,
    /// Hard bound on the consensus read
    pub consensus_timeout: Duration,
}

/// Selects the healthiest RPC node, with consensus validation and failover
pub struct NodeSelector {
    config: SelectorConfig,
    registry: Arc<NodeRegistry>,
    prober: Arc<NodeProber>,
    consensus: Option<Arc<dyn ConsensusProbe>>,
    failover: FailoverController,
    state: RwLock<AcquisitionState>,
    current: RwLock<Option<String>>,
}

impl NodeSelector {
    pub fn new(
        config: SelectorConfig,
        registry: Arc<NodeRegistry>,
        prober: Arc<NodeProber>,
        consensus: Option<Arc<dyn ConsensusProbe>>,
        failover: FailoverController,
    ) -> Self {
        Self {
            config,
            registry,
            prober,
            consensus,
            failover,
            state: RwLock::new(AcquisitionState::Idle),
            current: RwLock::new(None),
        }
    }

    /// Current acquisition state (for /status)
    pub async fn state(&self) -> AcquisitionState {
        *self.state.read().await
    }

    /// The most recently selected endpoint, if any
    pub async fn current_endpoint(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Failover attempts consumed so far
    pub fn failover_attempts(&self) -> u32 {
        self.failover.attempts()
    }

    /// The configured fallback endpoint
    pub fn fallback_endpoint(&self) -> &str {
        self.failover.fallback_endpoint()
    }

    /// Whether consensus validation is enabled
    pub fn consensus_required(&self) -> bool {
        self.config.consensus_required
    }

    /// Select the best available RPC endpoint.
    ///
    /// Never returns an empty endpoint: an empty registry after discovery is
    /// `NoNodesAvailable`, and an exhausted failover budget is
    /// `MaxFailoverAttemptsExceeded`.
    pub async fn get_best_node(&self) -> Result<String> {
        self.set_state(AcquisitionState::Discovering).await;
        self.prober.probe_all(&self.config.seeds, &self.registry).await;

        let ranked = self.registry.ranked();
        let Some(best) = ranked.first() else {
            self.set_state(AcquisitionState::Failed).await;
            return Err(SwitchboardError::NoNodesAvailable);
        };
        let candidate = best.endpoint.clone();
        self.set_state(AcquisitionState::Selected).await;
        debug!(
            endpoint = %candidate,
            score = best.health_score(),
            candidates = ranked.len(),
            "Ranked best node"
        );

        if self.config.consensus_required {
            if let Some(probe) = self.consensus.clone() {
                self.set_state(AcquisitionState::ValidatingConsensus).await;

                if let Err(e) = self.validate_consensus(probe.as_ref(), &candidate).await {
                    warn!(endpoint = %candidate, error = %e, "Consensus rejected selection");
                    self.set_state(AcquisitionState::Rejected).await;
                    self.set_state(AcquisitionState::Failover).await;

                    match self.failover.handle_failover() {
                        Ok(fallback) => {
                            self.set_state(AcquisitionState::Selected).await;
                            *self.current.write().await = Some(fallback.clone());
                            info!(endpoint = %fallback, "Selected fallback RPC node");
                            return Ok(fallback);
                        }
                        Err(e) => {
                            self.set_state(AcquisitionState::FailoverExhausted).await;
                            return Err(e);
                        }
                    }
                }
            } else {
                // Config validation should prevent this; don't fail selection
                // over a missing collaborator.
                warn!("Consensus required but no registry contract configured, skipping");
            }
        }

        self.set_state(AcquisitionState::Confirmed).await;
        self.failover.reset();
        *self.current.write().await = Some(candidate.clone());
        info!(endpoint = %candidate, "Selected RPC node");
        Ok(candidate)
    }

    async fn validate_consensus(
        &self,
        probe: &dyn ConsensusProbe,
        candidate: &str,
    ) -> Result<()> {
        let read = tokio::time::timeout(
            self.config.consensus_timeout,
            probe.best_node_via(candidate),
        )
        .await;

        match read {
            Ok(Ok(best)) if best.is_usable() => Ok(()),
            Ok(Ok(best)) => {
                debug!(
                    endpoint = %candidate,
                    operator = %best.operator,
                    "Consensus read returned unusable node"
                );
                Err(SwitchboardError::ConsensusValidationFailed {
                    endpoint: candidate.to_string(),
                })
            }
            Ok(Err(e)) => {
                debug!(endpoint = %candidate, error = %e, "Consensus read failed");
                Err(SwitchboardError::ConsensusValidationFailed {
                    endpoint: candidate.to_string(),
                })
            }
            Err(_) => {
                debug!(endpoint = %candidate, "Consensus read timed out");
                Err(SwitchboardError::ConsensusValidationFailed {
                    endpoint: candidate.to_string(),
                })
            }
        }
    }

    async fn set_state(&self, next: AcquisitionState) {
        *self.state.write().await = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::directory::BestNode;
    use async_trait::async_trait;

    struct AcceptingProbe;

    #[async_trait]
    impl ConsensusProbe for AcceptingProbe {
        async fn best_node_via(&self, endpoint: &str) -> Result<BestNode> {
            Ok(BestNode {
                operator: "0x00000000000000000000000000000000000000a1".to_string(),
                endpoint: endpoint.to_string(),
            })
        }
    }

    struct RejectingProbe;

    #[async_trait]
    impl ConsensusProbe for RejectingProbe {
        async fn best_node_via(&self, _endpoint: &str) -> Result<BestNode> {
            Err(SwitchboardError::Directory("registry unreachable".into()))
        }
    }

    struct StalledProbe;

    #[async_trait]
    impl ConsensusProbe for StalledProbe {
        async fn best_node_via(&self, endpoint: &str) -> Result<BestNode> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(BestNode {
                operator: "0x00000000000000000000000000000000000000a1".to_string(),
                endpoint: endpoint.to_string(),
            })
        }
    }

    fn selector_with(
        registry: Arc<NodeRegistry>,
        consensus_required: bool,
        consensus: Option<Arc<dyn ConsensusProbe>>,
        max_failover_attempts: u32,
    ) -> NodeSelector {
        NodeSelector::new(
            SelectorConfig {
                seeds: Vec::new(),
                consensus_required,
                consensus_timeout: Duration::from_millis(50),
            },
            registry,
            Arc::new(NodeProber::new(Duration::from_millis(100))),
            consensus,
            FailoverController::new(max_failover_attempts, "http://fallback:8545".to_string()),
        )
    }

    #[tokio::test]
    async fn test_empty_registry_fails_with_no_nodes_available() {
        let registry = Arc::new(NodeRegistry::new());
        let selector = selector_with(Arc::clone(&registry), false, None, 3);

        let err = selector.get_best_node().await.unwrap_err();
        assert!(matches!(err, SwitchboardError::NoNodesAvailable));
        assert_eq!(selector.state().await, AcquisitionState::Failed);
        assert!(selector.current_endpoint().await.is_none());
    }

    #[tokio::test]
    async fn test_selects_highest_scoring_node() {
        let registry = Arc::new(NodeRegistry::new());
        registry.record_success("http://slow:8545", Duration::from_millis(600));
        registry.record_success("http://fast:8545", Duration::from_millis(30));
        let selector = selector_with(Arc::clone(&registry), false, None, 3);

        let endpoint = selector.get_best_node().await.unwrap();
        assert_eq!(endpoint, "http://fast:8545");
        assert_eq!(selector.state().await, AcquisitionState::Confirmed);
        assert_eq!(selector.current_endpoint().await.as_deref(), Some("http://fast:8545"));
    }

    #[tokio::test]
    async fn test_consensus_confirmation_resets_failover_counter() {
        let registry = Arc::new(NodeRegistry::new());
        registry.record_success("http://node-0:8545", Duration::from_millis(30));
        let selector =
            selector_with(Arc::clone(&registry), true, Some(Arc::new(AcceptingProbe)), 3);

        let endpoint = selector.get_best_node().await.unwrap();
        assert_eq!(endpoint, "http://node-0:8545");
        assert_eq!(selector.state().await, AcquisitionState::Confirmed);
        assert_eq!(selector.failover_attempts(), 0);
    }

    #[tokio::test]
    async fn test_rejected_consensus_falls_back() {
        let registry = Arc::new(NodeRegistry::new());
        registry.record_success("http://node-0:8545", Duration::from_millis(30));
        let selector =
            selector_with(Arc::clone(&registry), true, Some(Arc::new(RejectingProbe)), 3);

        let endpoint = selector.get_best_node().await.unwrap();
        assert_eq!(endpoint, "http://fallback:8545");
        assert_eq!(selector.state().await, AcquisitionState::Selected);
        assert_eq!(selector.failover_attempts(), 1);
        assert_eq!(
            selector.current_endpoint().await.as_deref(),
            Some("http://fallback:8545")
        );
    }

    #[tokio::test]
    async fn test_repeated_rejections_exhaust_failover() {
        let registry = Arc::new(NodeRegistry::new());
        registry.record_success("http://node-0:8545", Duration::from_millis(30));
        let selector =
            selector_with(Arc::clone(&registry), true, Some(Arc::new(RejectingProbe)), 2);

        // First rejection consumes the only allowed fallback
        assert_eq!(selector.get_best_node().await.unwrap(), "http://fallback:8545");

        // Second rejection exhausts the budget
        let err = selector.get_best_node().await.unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::MaxFailoverAttemptsExceeded { .. }
        ));
        assert_eq!(selector.state().await, AcquisitionState::FailoverExhausted);
    }

    #[tokio::test]
    async fn test_consensus_timeout_counts_as_rejection() {
        let registry = Arc::new(NodeRegistry::new());
        registry.record_success("http://node-0:8545", Duration::from_millis(30));
        let selector =
            selector_with(Arc::clone(&registry), true, Some(Arc::new(StalledProbe)), 3);

        // The probe sleeps past the 50ms consensus timeout
        let endpoint = selector.get_best_node().await.unwrap();
        assert_eq!(endpoint, "http://fallback:8545");
        assert_eq!(selector.failover_attempts(), 1);
    }

    #[tokio::test]
    async fn test_consensus_required_without_probe_still_selects() {
        let registry = Arc::new(NodeRegistry::new());
        registry.record_success("http://node-0:8545", Duration::from_millis(30));
        let selector = selector_with(Arc::clone(&registry), true, None, 3);

        let endpoint = selector.get_best_node().await.unwrap();
        assert_eq!(endpoint, "http://node-0:8545");
    }
}
