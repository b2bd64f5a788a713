use embassy_time::{Duration, Instant};

/// A completed press: how long the button was held at release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub held: Duration,
}

/// Turns polled button levels into press gestures. The press start is
/// latched on the first poll that sees the button down; the gesture is
/// emitted on the first poll that sees it released again. Hold duration is
/// therefore quantized to the tick cadence, which is all the menu needs.
pub struct ButtonTracker {
    pressed_since: Option<Instant>,
}

impl ButtonTracker {
    pub fn new() -> Self {
        Self {
            pressed_since: None,
        }
    }

    pub fn poll(&mut self, pressed: bool, now: Instant) -> Option<ButtonPress> {
        match (self.pressed_since, pressed) {
            (None, true) => {
                self.pressed_since = Some(now);
                None
            }
            (Some(start), false) => {
                self.pressed_since = None;
                Some(ButtonPress {
                    held: now.duration_since(start),
                })
            }
            _ => None,
        }
    }
}

impl Default for ButtonTracker {
    fn default() -> Self {
        Self::new()
    }
}
