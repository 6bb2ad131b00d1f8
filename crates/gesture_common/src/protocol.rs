//! Bus topic protocol.
//!
//! Per device id `n` in 1..=5:
//! - `LED{n}` — outbound command channel, payload `ON` / `OFF`
//! - `LED{n}/status` — inbound truth channel, payload `ON` / `OFF`
//! - `LED{n}/get` — initial-state query, empty payload, sent once at startup
//!
//! The status topic is the only one the state-sync side treats as truth;
//! bare `LED{n}` traffic is our own outbound channel echoed back by the
//! broker and is ignored on the inbound path.

use crate::types::DeviceId;

const TOPIC_PREFIX: &str = "LED";

/// Outbound command topic for a device.
pub fn command_topic(device: DeviceId) -> String {
    format!("{TOPIC_PREFIX}{device}")
}

/// Inbound status-report topic for a device.
pub fn status_topic(device: DeviceId) -> String {
    format!("{TOPIC_PREFIX}{device}/status")
}

/// Initial-state query topic for a device.
pub fn get_topic(device: DeviceId) -> String {
    format!("{TOPIC_PREFIX}{device}/get")
}

/// Classification of an inbound topic string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundTopic {
    /// Bare `LED{n}` — the command channel, not a source of truth.
    Command(DeviceId),
    /// `LED{n}/status` — a device announcing its actual state.
    Status(DeviceId),
}

/// Parses an inbound topic. Returns `None` for anything outside the
/// protocol, including device ids out of range.
pub fn parse_topic(topic: &str) -> Option<InboundTopic> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?;
    let (id, suffix) = match rest.split_once('/') {
        Some((id, suffix)) => (id, Some(suffix)),
        None => (rest, None),
    };
    // Single-digit ids only; "LED01" or "LED12" are not ours.
    if id.len() != 1 {
        return None;
    }
    let device = DeviceId::new(id.parse().ok()?)?;
    match suffix {
        None => Some(InboundTopic::Command(device)),
        Some("status") => Some(InboundTopic::Status(device)),
        Some(_) => None,
    }
}
