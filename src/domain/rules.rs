/// Movement rules — truth-table driven.
///
/// Pure functions: they decide "what a raw input means" and "is this move
/// legal" without performing anything. The motion controller owns state.
///
/// ## Input Resolution Truth Table
///
/// Raw input is a 2-axis value (stick convention: +x right, +y up).
/// ┌──────────────────────────────┬────────────────────────────┐
/// │ Condition                     │ Result                      │
/// ├──────────────────────────────┼────────────────────────────┤
/// │ x == 0 && y == 0              │ released (clears debounce)  │
/// │ |y| > |x|                     │ vertical axis kept, x = 0   │
/// │ otherwise (incl. |x| == |y|)  │ horizontal axis kept, y = 0 │
/// │ round(kept axis) == 0         │ no move attempted           │
/// │ round(kept axis) != 0         │ one unit step in its sign   │
/// └──────────────────────────────┴────────────────────────────┘
///
/// ## Move Resolution
/// ┌──────────────────────────────┬──────────────┐
/// │ Condition                     │ Outcome      │
/// ├──────────────────────────────┼──────────────┤
/// │ target cell blocked           │ Bump         │
/// │ otherwise                     │ Move         │
/// └──────────────────────────────┴──────────────┘
/// Both outcomes count as one resolved turn.

use super::geom::{Cell, Dir};
use super::physics::Occupancy;

/// Raw 2-axis input for one tick.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct AxisInput {
    pub x: f32,
    pub y: f32,
}

impl AxisInput {
    pub const ZERO: AxisInput = AxisInput { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        AxisInput { x, y }
    }

    /// Released control: both axes exactly zero.
    pub fn is_released(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// What an accepted input resolves to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveKind {
    Move,
    Bump,
}

/// Collapse a 2-axis input to at most one 4-way step.
pub fn resolve_direction(input: AxisInput) -> Option<Dir> {
    let (mut x, mut y) = (input.x, input.y);
    if x.is_nan() || y.is_nan() {
        return None;
    }
    if y.abs() > x.abs() {
        x = 0.0;
    } else {
        y = 0.0;
    }

    let sx = x.round() as i32;
    let sy = y.round() as i32;
    // Stick +y is up; grid +y is down.
    Dir::from_delta(sx.signum(), -sy.signum())
}

/// Cell one step from `from` in `dir`.
pub fn step_target(from: Cell, dir: Dir) -> Cell {
    let (dx, dy) = dir.delta();
    from.offset(dx, dy)
}

/// Decide whether the step is a real move or a bump.
pub fn classify_move(occupancy: &impl Occupancy, from: Cell, dir: Dir) -> (Cell, MoveKind) {
    let target = step_target(from, dir);
    if occupancy.is_blocked(target) {
        (target, MoveKind::Bump)
    } else {
        (target, MoveKind::Move)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_only_when_both_axes_zero() {
        assert!(AxisInput::ZERO.is_released());
        assert!(!AxisInput::new(0.1, 0.0).is_released());
        assert!(!AxisInput::new(0.0, -0.1).is_released());
    }

    #[test]
    fn cardinal_inputs() {
        assert_eq!(resolve_direction(AxisInput::new(1.0, 0.0)), Some(Dir::Right));
        assert_eq!(resolve_direction(AxisInput::new(-1.0, 0.0)), Some(Dir::Left));
        assert_eq!(resolve_direction(AxisInput::new(0.0, 1.0)), Some(Dir::Up));
        assert_eq!(resolve_direction(AxisInput::new(0.0, -1.0)), Some(Dir::Down));
    }

    #[test]
    fn dominant_axis_wins() {
        assert_eq!(resolve_direction(AxisInput::new(0.9, 0.6)), Some(Dir::Right));
        assert_eq!(resolve_direction(AxisInput::new(-0.6, -0.9)), Some(Dir::Down));
    }

    #[test]
    fn diagonal_tie_prefers_horizontal() {
        assert_eq!(resolve_direction(AxisInput::new(1.0, 1.0)), Some(Dir::Right));
        assert_eq!(resolve_direction(AxisInput::new(-0.7, 0.7)), Some(Dir::Left));
    }

    #[test]
    fn small_axis_rounds_to_no_move() {
        assert_eq!(resolve_direction(AxisInput::new(0.3, 0.0)), None);
        assert_eq!(resolve_direction(AxisInput::new(0.2, 0.4)), None);
        assert_eq!(resolve_direction(AxisInput::new(0.5, 0.0)), Some(Dir::Right));
    }

    #[test]
    fn nan_input_is_ignored() {
        assert_eq!(resolve_direction(AxisInput::new(f32::NAN, 1.0)), None);
    }

    #[test]
    fn classify_against_occupancy() {
        let wall = Cell::new(2, 1);
        let occ = move |c: Cell| c == wall;
        assert_eq!(classify_move(&occ, Cell::new(1, 1), Dir::Right), (wall, MoveKind::Bump));
        assert_eq!(
            classify_move(&occ, Cell::new(1, 1), Dir::Up),
            (Cell::new(1, 0), MoveKind::Move)
        );
    }
}
