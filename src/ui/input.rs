/// Keyboard state tracker.
///
/// Tracks which keys are currently held, so movement can be read as a
/// 2-axis value every tick. The motion controller debounces on its own:
/// a held key yields one move, and the axis has to return to zero
/// (every direction key released) before the next.
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't
/// report releases; key repeat keeps a held key alive. The fallback
/// timeout has to outlast the OS's initial repeat delay, or a held key
/// would lapse before its first repeat and count as a second press.
/// The price is that two taps closer together than the timeout read as
/// one hold.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::rules::AxisInput;

/// After this long without a Press/Repeat event, the key counts as released.
/// Longer than common initial key-repeat delays (250–600 ms).
const REPEAT_TIMEOUT: Duration = Duration::from_millis(650);

/// Safety net for a lost Release event when releases are reported.
const RELEASE_TIMEOUT: Duration = Duration::from_millis(1500);

pub const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('h')];
pub const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('l')];
pub const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('k')];
pub const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('j')];

pub struct InputState {
    /// Timestamp of the last Press/Repeat event per key.
    last_active: HashMap<KeyCode, Instant>,
    /// Keys that went from "not held" to "held" in the latest drain.
    fresh_presses: Vec<KeyCode>,
    /// Raw key events of the latest drain, for meta keys.
    pub raw_events: Vec<KeyEvent>,
    /// Honor Release events (only once keyboard enhancement is confirmed).
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events. Call once per frame, before `step`.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            self.raw_events.push(key);
            match key.kind {
                KeyEventKind::Release if self.honor_release => {
                    self.last_active.remove(&normalize(key.code));
                }
                KeyEventKind::Release => {}
                _ => {
                    let code = normalize(key.code);
                    if !self.is_held(code) {
                        self.fresh_presses.push(code);
                    }
                    self.last_active.insert(code, Instant::now());
                }
            }
        }

        let now = Instant::now();
        let honor_release = self.honor_release;
        self.last_active.retain(|_, t| still_held(now.duration_since(*t), honor_release));
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&normalize(code))
            .is_some_and(|t| still_held(t.elapsed(), self.honor_release))
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&normalize(code))
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Movement axis from the held direction keys (+y is up).
    pub fn axis(&self) -> AxisInput {
        held_axis(
            self.any_held(KEYS_LEFT),
            self.any_held(KEYS_RIGHT),
            self.any_held(KEYS_UP),
            self.any_held(KEYS_DOWN),
        )
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('C'))
        })
    }
}

/// Letters are tracked case-insensitively (Shift or Caps Lock held).
fn normalize(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

/// Does a key last seen `quiet` ago still count as held?
fn still_held(quiet: Duration, honor_release: bool) -> bool {
    let timeout = if honor_release { RELEASE_TIMEOUT } else { REPEAT_TIMEOUT };
    quiet < timeout
}

/// Opposite keys cancel out.
fn held_axis(left: bool, right: bool, up: bool, down: bool) -> AxisInput {
    let x = (right as i8 - left as i8) as f32;
    let y = (up as i8 - down as i8) as f32;
    AxisInput::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_from_held_keys() {
        assert_eq!(held_axis(false, true, false, false), AxisInput::new(1.0, 0.0));
        assert_eq!(held_axis(false, false, false, true), AxisInput::new(0.0, -1.0));
        assert!(held_axis(true, true, false, false).is_released());
        assert!(held_axis(false, false, false, false).is_released());
    }

    #[test]
    fn held_key_survives_the_initial_repeat_delay() {
        // Typical gap between the press and its first repeat event.
        for gap in [250, 400, 600] {
            assert!(still_held(Duration::from_millis(gap), false), "{gap} ms");
        }
        assert!(!still_held(Duration::from_millis(700), false));
        assert!(still_held(Duration::from_millis(700), true));
        assert!(!still_held(RELEASE_TIMEOUT, true));
    }

    #[test]
    fn fallback_hold_keeps_the_axis_until_timeout() {
        let mut kb = InputState::new();
        let Some(pressed) = Instant::now().checked_sub(Duration::from_millis(500)) else {
            return;
        };
        kb.last_active.insert(KeyCode::Right, pressed);
        assert_eq!(kb.axis(), AxisInput::new(1.0, 0.0));

        let Some(stale) = Instant::now().checked_sub(REPEAT_TIMEOUT) else {
            return;
        };
        kb.last_active.insert(KeyCode::Right, stale);
        assert!(kb.axis().is_released());
    }

    #[test]
    fn letters_ignore_case() {
        assert_eq!(normalize(KeyCode::Char('W')), KeyCode::Char('w'));
        assert_eq!(normalize(KeyCode::Up), KeyCode::Up);
    }
}
