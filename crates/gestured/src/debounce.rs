//! Command debouncing.
//!
//! The capture loop re-evaluates roughly every 30 ms, so a hand held in
//! one pose would otherwise publish the same command on every tick and
//! flood both the bus and the actuator. The filter remembers the last
//! emitted command per device: an identical repeat inside the quiet
//! window is suppressed, while a changed action (or another device) always
//! passes so state flips stay responsive.

use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use gesture_common::{DeviceId, SwitchAction};

#[derive(Debug)]
pub struct CommandDebouncer {
    quiet: Duration,
    last_emitted: HashMap<DeviceId, (SwitchAction, Instant)>,
}

impl CommandDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_emitted: HashMap::new(),
        }
    }

    /// Decides whether a command may be emitted at `now`. Admitted
    /// commands are recorded and re-arm the quiet window.
    pub fn admit(&mut self, device: DeviceId, action: SwitchAction, now: Instant) -> bool {
        if let Some((last_action, emitted_at)) = self.last_emitted.get(&device) {
            if *last_action == action && now.duration_since(*emitted_at) < self.quiet {
                return false;
            }
        }
        self.last_emitted.insert(device, (action, now));
        true
    }
}
