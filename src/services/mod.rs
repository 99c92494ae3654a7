/// Realtime per-game subscriptions with automatic reconnection.
pub mod channel;
/// Device-side facade: lifecycle calls, player views and join links.
pub mod client;
/// OpenAPI documentation generation.
pub mod documentation;
/// Removal of games past their time to live.
pub mod expiry;
/// Health check service.
pub mod health_service;
/// Per-player history of finished games.
pub mod ledger;
/// Lobby, match start and elimination operations.
pub mod lifecycle;
/// Mission providers and the fallback catalog.
pub mod missions;
/// Store operations behind the relay REST routes.
pub mod relay_service;
/// Local persistence of identity, active game and history.
pub mod session;
/// Game feed to Server-Sent Events forwarding.
pub mod sse_service;
/// Game store connection supervisor and degraded mode.
pub mod storage_supervisor;
