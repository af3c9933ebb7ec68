//! Sovereign RPC node selection
//!
//! - [`registry`]: known-node records with health scoring
//! - [`probe`]: JSON-RPC liveness probes (discovery)
//! - [`selector`]: discovery → ranking → consensus validation → failover
//! - [`failover`]: bounded fallback to the configured endpoint
//! - [`directory`]: on-chain collaborator reads (registry + stream validator)
//! - [`abi`]: minimal contract call codec

pub mod abi;
pub mod directory;
pub mod failover;
pub mod probe;
pub mod registry;
pub mod selector;

pub use directory::{BestNode, ChainDirectory, ConsensusProbe, StreamValidator};
pub use failover::FailoverController;
pub use probe::{spawn_probe_task, NodeProber};
pub use registry::{NodeRegistry, RpcNodeRecord};
pub use selector::{AcquisitionState, NodeSelector, SelectorConfig};
