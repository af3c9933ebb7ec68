//! Switchboard - signaling relay and sovereign RPC gateway for the JoyNet network
//!
//! Switchboard is the piece of JoyNet infrastructure that sits between browser
//! peers and the decentralized backend: it relays WebRTC session negotiation
//! between peers and hands out the healthiest sovereign RPC endpoint for
//! on-chain reads, with bounded failover when the network misbehaves.
//!
//! ## Services
//!
//! - **Signal**: WebRTC signaling relay — a connection registry of live peer
//!   handles, a group membership table, and offer/answer/ICE-candidate
//!   forwarding over WebSocket and HTTP
//! - **RPC**: sovereign RPC node selection — health-probed node registry,
//!   score-ranked selection, on-chain consensus validation, failover control
//! - **Streams**: thin on-chain stream validation reads for marketplace
//!   data feeds

pub mod config;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod signal;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, SwitchboardError};
