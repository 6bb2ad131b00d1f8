//! Decodes classifier labels into structured commands.
//!
//! The vocabulary is closed: `<on|off>_device_<1..5>`, exactly three
//! tokens. Anything else is `UnrecognizedLabel` and the frame is treated
//! as "no command" — a bad label must never crash the pipeline or address
//! a device outside the known range.

use gesture_common::{DeviceId, GestureError, SwitchAction};

/// Parses a gesture label into its target device and action.
pub fn decode(label: &str) -> Result<(DeviceId, SwitchAction), GestureError> {
    let unrecognized = || GestureError::UnrecognizedLabel(label.to_string());

    let mut tokens = label.split('_');
    let action = match tokens.next() {
        Some("on") => SwitchAction::On,
        Some("off") => SwitchAction::Off,
        _ => return Err(unrecognized()),
    };
    if tokens.next() != Some("device") {
        return Err(unrecognized());
    }
    let id = tokens
        .next()
        .and_then(|t| t.parse::<u8>().ok())
        .and_then(DeviceId::new)
        .ok_or_else(unrecognized)?;
    if tokens.next().is_some() {
        return Err(unrecognized());
    }
    Ok((id, action))
}
