//! Long-press detection.
//!
//! ```text
//! Idle -> Debouncing -> Held -> (hold reached) -> WaitRelease -> Done
//!            |            |
//!            +-- release -+-> Idle
//! ```
//!
//! The hold time is measured from the first asserted sample, so the debounce
//! window counts toward it. Time is passed in by the caller.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Debouncing { since: Instant },
    Held { since: Instant },
    WaitRelease,
    Done,
}

/// Observable transitions returned by [`ResetButton::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    None,
    /// Input stayed asserted through the debounce window.
    Pressed,
    /// Released before the hold threshold.
    Released,
    /// Hold threshold reached; fires once per press.
    Triggered,
    /// Released after triggering; time to restart.
    RestartDue,
}

/// Debounced long-press state machine.
#[derive(Debug, Clone)]
pub struct ResetButton {
    debounce: Duration,
    hold: Duration,
    state: State,
}

impl ResetButton {
    pub fn new(debounce: Duration, hold: Duration) -> Self {
        Self {
            debounce,
            hold,
            state: State::Idle,
        }
    }

    /// Feed one sample.
    pub fn poll(&mut self, pressed: bool, now: Instant) -> ButtonEvent {
        match self.state {
            State::Idle => {
                if pressed {
                    self.state = State::Debouncing { since: now };
                }
                ButtonEvent::None
            }
            State::Debouncing { since } => {
                if !pressed {
                    self.state = State::Idle;
                    return ButtonEvent::None;
                }
                if now.duration_since(since) < self.debounce {
                    return ButtonEvent::None;
                }
                if now.duration_since(since) >= self.hold {
                    self.state = State::WaitRelease;
                    return ButtonEvent::Triggered;
                }
                self.state = State::Held { since };
                ButtonEvent::Pressed
            }
            State::Held { since } => {
                if !pressed {
                    self.state = State::Idle;
                    return ButtonEvent::Released;
                }
                if now.duration_since(since) >= self.hold {
                    self.state = State::WaitRelease;
                    return ButtonEvent::Triggered;
                }
                ButtonEvent::None
            }
            State::WaitRelease => {
                if pressed {
                    return ButtonEvent::None;
                }
                self.state = State::Done;
                ButtonEvent::RestartDue
            }
            State::Done => ButtonEvent::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(50);

    fn button() -> ResetButton {
        ResetButton::new(Duration::from_millis(40), Duration::from_millis(6000))
    }

    /// Hold for `held`, then release; returns all non-`None` events.
    fn press(button: &mut ResetButton, held: Duration) -> Vec<ButtonEvent> {
        let start = Instant::now();
        let mut events = Vec::new();
        let mut t = Duration::ZERO;
        while t <= held {
            events.push(button.poll(true, start + t));
            t += POLL;
        }
        events.push(button.poll(false, start + t));
        events.retain(|e| *e != ButtonEvent::None);
        events
    }

    #[test]
    fn test_hold_at_threshold_triggers_once() {
        let mut b = button();
        let events = press(&mut b, Duration::from_millis(6000));
        assert_eq!(
            events,
            vec![
                ButtonEvent::Pressed,
                ButtonEvent::Triggered,
                ButtonEvent::RestartDue
            ]
        );
    }

    #[test]
    fn test_long_hold_still_triggers_once() {
        let mut b = button();
        let events = press(&mut b, Duration::from_millis(15_000));
        let triggers = events
            .iter()
            .filter(|e| **e == ButtonEvent::Triggered)
            .count();
        assert_eq!(triggers, 1);
    }

    #[test]
    fn test_short_hold_returns_to_idle() {
        let mut b = button();
        let events = press(&mut b, Duration::from_millis(3000));
        assert_eq!(events, vec![ButtonEvent::Pressed, ButtonEvent::Released]);

        // A fresh press starts over
        let events = press(&mut b, Duration::from_millis(3000));
        assert_eq!(events, vec![ButtonEvent::Pressed, ButtonEvent::Released]);
    }

    #[test]
    fn test_bounce_is_ignored() {
        let mut b = button();
        let t0 = Instant::now();
        assert_eq!(b.poll(true, t0), ButtonEvent::None);
        assert_eq!(b.poll(false, t0 + Duration::from_millis(10)), ButtonEvent::None);
        assert_eq!(b.poll(true, t0 + Duration::from_millis(20)), ButtonEvent::None);
        assert_eq!(b.poll(true, t0 + Duration::from_millis(40)), ButtonEvent::None);
        assert_eq!(
            b.poll(true, t0 + Duration::from_millis(60)),
            ButtonEvent::Pressed
        );
    }

    #[test]
    fn test_waits_for_release_before_restart() {
        let mut b = button();
        let t0 = Instant::now();
        b.poll(true, t0);
        b.poll(true, t0 + Duration::from_millis(50));
        assert_eq!(
            b.poll(true, t0 + Duration::from_millis(6000)),
            ButtonEvent::Triggered
        );
        assert_eq!(
            b.poll(true, t0 + Duration::from_millis(9000)),
            ButtonEvent::None
        );
        assert_eq!(
            b.poll(false, t0 + Duration::from_millis(9050)),
            ButtonEvent::RestartDue
        );
        assert_eq!(
            b.poll(false, t0 + Duration::from_millis(9100)),
            ButtonEvent::None
        );
    }
}
