use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Game listing payloads.
pub mod game;
/// Healthcheck payload.
pub mod health;
/// Server-sent event payloads.
pub mod sse;
/// Validation helpers for relay payloads.
pub mod validation;

fn format_millis(millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|time| time.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
