//! Game-state synchronization core of a live "killer" party game: a shared
//! game document per join code, realtime snapshots to every device, and the
//! lobby / active / finished lifecycle computed on the clients.
//!
//! The `killer-party-relay` binary exposes a [`dao::game_store::GameStore`]
//! over HTTP and SSE; everything else runs inside the clients.

/// File-backed application configuration.
pub mod config;
/// Storage layer: document model and store backends.
pub mod dao;
/// Payloads of the relay HTTP surface.
pub mod dto;
/// Error types of every layer.
pub mod error;
/// Relay HTTP routes.
pub mod routes;
/// Lifecycle, channel, session and relay services.
pub mod services;
/// Domain model, rules and shared relay state.
pub mod state;
