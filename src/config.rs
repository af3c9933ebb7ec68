//! Configuration for Switchboard
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Switchboard - signaling relay and sovereign RPC gateway for JoyNet
#[derive(Parser, Debug, Clone)]
#[command(name = "switchboard")]
#[command(about = "Signaling relay and sovereign RPC gateway for the JoyNet network")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (relaxed readiness, empty seed list allowed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Enable the signal service for WebRTC signaling
    #[arg(long, env = "SIGNAL_ENABLED", default_value = "true")]
    pub signal_enabled: bool,

    /// Maximum concurrent signal connections
    #[arg(long, env = "SIGNAL_MAX_CLIENTS")]
    pub signal_max_clients: Option<usize>,

    /// Signal connection idle timeout in milliseconds
    #[arg(long, env = "SIGNAL_IDLE_TIMEOUT_MS")]
    pub signal_idle_timeout_ms: Option<u64>,

    /// RPC node selection configuration
    #[command(flatten)]
    pub rpc: RpcArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Sovereign RPC selection configuration
#[derive(Parser, Debug, Clone)]
pub struct RpcArgs {
    /// Comma-separated list of seed RPC endpoints to probe and rank
    /// e.g. "http://node-0:8545,http://node-1:8545"
    #[arg(long, env = "RPC_ENDPOINTS")]
    pub rpc_endpoints: Option<String>,

    /// Fallback RPC endpoint returned when selection fails over
    #[arg(long, env = "FALLBACK_RPC_URL", default_value = "http://localhost:8545")]
    pub fallback_rpc_url: String,

    /// Maximum failover attempts before selection fails hard
    #[arg(long, env = "MAX_FAILOVER_ATTEMPTS", default_value = "3")]
    pub max_failover_attempts: u32,

    /// Require on-chain consensus validation of the selected node
    #[arg(long, env = "CONSENSUS_REQUIRED", default_value = "false")]
    pub consensus_required: bool,

    /// SovereignRPC registry contract address (required when consensus is on)
    #[arg(long, env = "SOVEREIGN_RPC_ADDRESS")]
    pub sovereign_rpc_address: Option<String>,

    /// Stream validator contract address (enables /rpc/streams/* reads)
    #[arg(long, env = "STREAM_VALIDATOR_ADDRESS")]
    pub stream_validator_address: Option<String>,

    /// Timeout for the on-chain consensus read in milliseconds
    #[arg(long, env = "CONSENSUS_TIMEOUT_MS", default_value = "5000")]
    pub consensus_timeout_ms: u64,

    /// Timeout for a single node health probe in milliseconds
    #[arg(long, env = "PROBE_TIMEOUT_MS", default_value = "5000")]
    pub probe_timeout_ms: u64,

    /// Interval between background probe cycles in seconds
    #[arg(long, env = "PROBE_INTERVAL_SECS", default_value = "60")]
    pub probe_interval_secs: u64,
}

impl Args {
    /// Get the list of seed RPC endpoints
    pub fn rpc_endpoint_list(&self) -> Vec<String> {
        match self.rpc.rpc_endpoints {
            Some(ref urls) => urls
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rpc.max_failover_attempts == 0 {
            return Err("MAX_FAILOVER_ATTEMPTS must be at least 1".to_string());
        }

        if self.rpc.fallback_rpc_url.trim().is_empty() {
            return Err("FALLBACK_RPC_URL must not be empty".to_string());
        }

        if self.rpc.consensus_required && self.rpc.sovereign_rpc_address.is_none() {
            return Err(
                "SOVEREIGN_RPC_ADDRESS is required when CONSENSUS_REQUIRED is set".to_string(),
            );
        }

        if !self.dev_mode && self.rpc_endpoint_list().is_empty() {
            return Err("RPC_ENDPOINTS is required in production mode".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["switchboard", "--dev-mode"])
    }

    #[test]
    fn test_endpoint_list_parsing() {
        let mut args = base_args();
        args.rpc.rpc_endpoints = Some("http://a:8545, http://b:8545,,".to_string());

        let list = args.rpc_endpoint_list();
        assert_eq!(list, vec!["http://a:8545", "http://b:8545"]);
    }

    #[test]
    fn test_endpoint_list_empty_when_unset() {
        let args = base_args();
        assert!(args.rpc_endpoint_list().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_failover_attempts() {
        let mut args = base_args();
        args.rpc.max_failover_attempts = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_requires_registry_address_for_consensus() {
        let mut args = base_args();
        args.rpc.consensus_required = true;
        args.rpc.sovereign_rpc_address = None;
        assert!(args.validate().is_err());

        args.rpc.sovereign_rpc_address = Some("0x0000000000000000000000000000000000000001".into());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_endpoints_in_production() {
        let mut args = base_args();
        args.dev_mode = false;
        assert!(args.validate().is_err());

        args.rpc.rpc_endpoints = Some("http://node-0:8545".to_string());
        assert!(args.validate().is_ok());
    }
}
