/// Gamepad input using gilrs.
///
/// Movement comes from the D-pad (unit steps) or the left stick (analog,
/// radial deadzone). The motion controller picks the dominant axis and
/// rounds it, so a stick pushed past halfway counts as a step and has to
/// return inside the deadzone before the next one.
///
/// Button mapping comes from `[gamepad]` in config.toml:
///   confirm (default Start, A)   cancel (Select, B)   restart (Y)

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};
#[cfg(feature = "gamepad")]
use log::info;

use crate::config::GamepadConfig;
use crate::domain::rules::AxisInput;

/// Logical button identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    Start,
    Select,
}

const BUTTON_COUNT: usize = 8;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH" => Some(Btn::A),
            "B" | "EAST" => Some(Btn::B),
            "X" | "WEST" => Some(Btn::X),
            "Y" | "NORTH" => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East => Some(Btn::B),
            Button::West => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::Start => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

struct ActionMap {
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
    restart: Vec<Btn>,
}

impl ActionMap {
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn list(names: &[String], fallback: &[Btn]) -> Vec<Btn> {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if parsed.is_empty() {
                fallback.to_vec()
            } else {
                parsed
            }
        }
        ActionMap {
            confirm: list(&cfg.confirm, &[Btn::Start, Btn::A]),
            cancel: list(&cfg.cancel, &[Btn::Select, Btn::B]),
            restart: list(&cfg.restart, &[Btn::Y]),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Dpad {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    just_pressed: [bool; BUTTON_COUNT],
    dpad: Dpad,
    stick_x: f32,
    stick_y: f32,
    deadzone: f32,
    actions: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new(cfg: &GamepadConfig) -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                info!("[Gamepad] unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            just_pressed: [false; BUTTON_COUNT],
            dpad: Dpad::default(),
            stick_x: 0.0,
            stick_y: 0.0,
            deadzone: cfg.stick_deadzone,
            actions: ActionMap::from_config(cfg),
            connected,
        }
    }

    /// Poll pending events. Call once per frame.
    pub fn update(&mut self) {
        self.just_pressed = [false; BUTTON_COUNT];

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else {
            return;
        };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => self.set_button(btn, false),
                EventType::AxisChanged(Axis::LeftStickX, value, _) => self.stick_x = value,
                EventType::AxisChanged(Axis::LeftStickY, value, _) => self.stick_y = value,
                EventType::Connected => self.connected = true,
                EventType::Disconnected => {
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, btn: Button, down: bool) {
        match btn {
            Button::DPadUp => self.dpad.up = down,
            Button::DPadDown => self.dpad.down = down,
            Button::DPadLeft => self.dpad.left = down,
            Button::DPadRight => self.dpad.right = down,
            other => {
                if let Some(b) = Btn::from_gilrs(other) {
                    if down {
                        self.just_pressed[b as usize] = true;
                    }
                }
            }
        }
    }

    /// Movement axis (+y is up). The D-pad wins over the stick.
    pub fn axis(&self) -> AxisInput {
        let d = self.dpad;
        if d.up || d.down || d.left || d.right {
            let x = (d.right as i8 - d.left as i8) as f32;
            let y = (d.up as i8 - d.down as i8) as f32;
            return AxisInput::new(x, y);
        }
        stick_axis(self.stick_x, self.stick_y, self.deadzone)
    }

    // ── Action queries ──

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.just_pressed[b as usize])
    }

    pub fn confirm_pressed(&self) -> bool {
        self.any_just_pressed(&self.actions.confirm)
    }

    pub fn cancel_pressed(&self) -> bool {
        self.any_just_pressed(&self.actions.cancel)
    }

    pub fn restart_pressed(&self) -> bool {
        self.any_just_pressed(&self.actions.restart)
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.just_pressed = [false; BUTTON_COUNT];
        self.dpad = Dpad::default();
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}

/// Zero inside the radial deadzone; the raw value outside it.
fn stick_axis(x: f32, y: f32, deadzone: f32) -> AxisInput {
    if (x * x + y * y).sqrt() < deadzone {
        AxisInput::ZERO
    } else {
        AxisInput::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stick_deadzone_is_radial() {
        assert!(stick_axis(0.2, 0.1, 0.25).is_released());
        assert_eq!(stick_axis(0.8, -0.1, 0.25), AxisInput::new(0.8, -0.1));
        assert!(!stick_axis(0.2, 0.2, 0.25).is_released());
    }

    #[test]
    fn button_names() {
        assert_eq!(Btn::from_name("start"), Some(Btn::Start));
        assert_eq!(Btn::from_name("South"), Some(Btn::A));
        assert_eq!(Btn::from_name("turbo"), None);
    }

    #[test]
    fn unknown_names_fall_back_to_defaults() {
        let cfg = GamepadConfig {
            confirm: vec!["nope".into()],
            cancel: vec!["X".into()],
            restart: vec![],
            stick_deadzone: 0.25,
        };
        let map = ActionMap::from_config(&cfg);
        assert_eq!(map.confirm, vec![Btn::Start, Btn::A]);
        assert_eq!(map.cancel, vec![Btn::X]);
        assert_eq!(map.restart, vec![Btn::Y]);
    }
}
