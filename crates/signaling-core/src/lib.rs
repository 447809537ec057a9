//! # Portero signaling coordinator
//!
//! The coordinator lets one gatekeeper endpoint ring any of several
//! department endpoints and, once a department accepts, relays the
//! offer/answer and ICE candidate exchange so the two endpoints can open a
//! direct audio/video call. Media never passes through the coordinator.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ws    ┌────────────────────────────────────────────┐
//! │  endpoint A  │◄───────►│ server (one task per connection)           │
//! └──────────────┘         │        │                                   │
//! ┌──────────────┐   ws    │ ┌──────▼──────┐                            │
//! │  endpoint B  │◄───────►│ │ Coordinator │──► CallRouter ──┐          │
//! └──────────────┘         │ └──────┬──────┘──► SignalingRelay┤         │
//!                          │        │                          ▼         │
//!                          │  DeviceRegistry (role → conn)   Outbox     │
//!                          └────────────────────────────────────────────┘
//! ```
//!
//! - [`registry::DeviceRegistry`] maps a role name to exactly one live connection.
//! - [`routing::CallRouter`] forwards call-control events (initiate, accept, reject, end).
//! - [`relay::SignalingRelay`] forwards offers, answers and candidates, tagged with the sender.
//! - [`coordinator::Coordinator`] owns the per-connection bookkeeping and dispatches
//!   [`protocol::ClientMessage`]s to the two components above.
//! - [`server`] exposes the coordinator over an axum WebSocket endpoint.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portero_signaling_core::{config::CoordinatorConfig, server};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CoordinatorConfig::default();
//! server::serve(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod outbox;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod routing;
pub mod server;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::{SignalingError, SignalingResult};
pub use protocol::{
    ClientMessage, ConnectionId, IceCandidate, Role, SdpType, ServerMessage, SessionDescription,
};
pub use registry::DeviceRegistry;
