/// Grid motion controller: one discrete move per physical key press.
///
/// ## State machine
///
/// ```text
///   Idle ──(input, debounce clear)──▶ MoveAttempt ─┬─▶ Moving  ──(duration)──▶ Idle
///                                                   └─▶ Bumping ──(2 × leg)───▶ Idle
/// ```
///
/// A new attempt is accepted only when the phase is `Idle` **and** the
/// debounce flag is clear. The flag is set the instant an attempt is
/// accepted and cleared only when the input returns to exactly zero,
/// so a held key yields a single move no matter how many ticks pass.
///
/// Every accepted attempt resolves exactly once (move or bump), and the
/// resolution is reported from `update` on the tick the animation
/// finishes. New input is never accepted on that same tick, so the
/// caller can settle the turn before the next one starts.
///
/// Animations are time-accumulating sub-states advanced by `dt`; nothing
/// blocks. Releasing the input mid-animation clears the debounce flag but
/// does not cancel the animation.

use log::debug;

use super::entity::MIN_DURATION;
use super::geom::{Cell, Dir, Vec2};
use super::physics::Occupancy;
use super::rules::{self, AxisInput, MoveKind};

/// Farthest a bump may lean, in cells. Kept under half a cell so the
/// actor's nearest cell never becomes the blocked one.
pub const MAX_BUMP_DISTANCE: f32 = 0.45;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MotionPhase {
    Idle,
    Moving,
    Bumping,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionConfig {
    /// Seconds to slide one cell.
    pub move_duration: f32,
    /// Seconds for each leg of a bump (toward the wall, then back).
    pub bump_duration: f32,
    /// How far toward the blocked cell the bump travels, in cells.
    pub bump_distance: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig { move_duration: 0.15, bump_duration: 0.1, bump_distance: 0.2 }
    }
}

impl MotionConfig {
    /// Clamp malformed values instead of rejecting them.
    pub fn sanitized(self) -> Self {
        let fix = |v: f32| if v.is_finite() && v > MIN_DURATION { v } else { MIN_DURATION };
        MotionConfig {
            move_duration: fix(self.move_duration),
            bump_duration: fix(self.bump_duration),
            bump_distance: if self.bump_distance.is_finite() {
                self.bump_distance.clamp(0.0, MAX_BUMP_DISTANCE)
            } else {
                0.0
            },
        }
    }
}

/// The single actor driven by the controller.
#[derive(Clone, Debug)]
pub struct ActorState {
    /// Committed grid cell (updated when a move completes).
    pub cell: Cell,
    /// Interpolated position for presentation and overlap tests.
    pub position: Vec2,
    pub facing: Dir,
    pub phase: MotionPhase,
    /// Debounce: set on accept, cleared on release.
    pub input_consumed: bool,
}

/// Report for one resolved input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TurnResolved {
    pub kind: MoveKind,
    pub dir: Dir,
    pub from: Cell,
    /// Cell the attempt targeted (the blocked cell for a bump).
    pub target: Cell,
}

impl TurnResolved {
    pub fn moved(&self) -> bool {
        self.kind == MoveKind::Move
    }
}

#[derive(Clone, Copy, Debug)]
struct Transition {
    kind: MoveKind,
    dir: Dir,
    from: Cell,
    target: Cell,
    elapsed: f32,
}

pub struct GridMotionController {
    actor: ActorState,
    config: MotionConfig,
    transition: Option<Transition>,
}

impl GridMotionController {
    pub fn new(start: Cell, config: MotionConfig) -> Self {
        GridMotionController {
            actor: ActorState {
                cell: start,
                position: start.center(),
                facing: Dir::Down,
                phase: MotionPhase::Idle,
                input_consumed: false,
            },
            config: config.sanitized(),
            transition: None,
        }
    }

    pub fn actor(&self) -> &ActorState {
        &self.actor
    }

    pub fn cell(&self) -> Cell {
        self.actor.cell
    }

    pub fn position(&self) -> Vec2 {
        self.actor.position
    }

    pub fn phase(&self) -> MotionPhase {
        self.actor.phase
    }

    pub fn is_idle(&self) -> bool {
        self.actor.phase == MotionPhase::Idle
    }

    /// Cell the actor is heading to while `Moving`.
    pub fn pending_target(&self) -> Option<Cell> {
        self.transition
            .filter(|t| t.kind == MoveKind::Move)
            .map(|t| t.target)
    }

    /// Advance one simulation tick.
    ///
    /// Returns the resolution of an input whose animation finished this tick.
    pub fn update(
        &mut self,
        input: AxisInput,
        dt: f32,
        occupancy: &impl Occupancy,
    ) -> Option<TurnResolved> {
        if input.is_released() {
            self.actor.input_consumed = false;
        }

        if self.transition.is_some() {
            return self.advance(dt.max(0.0));
        }

        if self.actor.input_consumed || input.is_released() {
            return None;
        }

        let dir = rules::resolve_direction(input)?;
        self.begin(dir, occupancy);
        None
    }

    /// Force any in-progress motion to a safe idle state.
    ///
    /// A move in flight snaps to its destination cell, a bump snaps back to
    /// its origin. The cancelled attempt does not resolve into a turn, and
    /// the debounce flag is set so the still-held key cannot fire again.
    pub fn cancel(&mut self) {
        if let Some(t) = self.transition.take() {
            let settle = match t.kind {
                MoveKind::Move => t.target,
                MoveKind::Bump => t.from,
            };
            debug!("[Motion] cancelled {:?} toward {:?}, settling at {:?}", t.kind, t.target, settle);
            self.actor.cell = settle;
        }
        self.actor.position = self.actor.cell.center();
        self.actor.phase = MotionPhase::Idle;
        self.actor.input_consumed = true;
    }

    /// Cancel any motion and place the actor on `cell`.
    pub fn teleport(&mut self, cell: Cell) {
        self.cancel();
        self.actor.cell = cell;
        self.actor.position = cell.center();
    }

    // ── Internal ──

    fn begin(&mut self, dir: Dir, occupancy: &impl Occupancy) {
        let from = self.actor.cell;
        let (target, kind) = rules::classify_move(occupancy, from, dir);

        self.actor.input_consumed = true;
        self.actor.facing = dir;
        self.actor.phase = match kind {
            MoveKind::Move => MotionPhase::Moving,
            MoveKind::Bump => MotionPhase::Bumping,
        };
        self.transition = Some(Transition { kind, dir, from, target, elapsed: 0.0 });
        debug!("[Motion] accepted {:?} {:?} -> {:?}", kind, dir, target);
    }

    fn advance(&mut self, dt: f32) -> Option<TurnResolved> {
        let t = self.transition.as_mut()?;
        t.elapsed += dt;
        let t = *t;

        let total = match t.kind {
            MoveKind::Move => self.config.move_duration,
            MoveKind::Bump => self.config.bump_duration * 2.0,
        };

        if t.elapsed < total {
            self.actor.position = match t.kind {
                MoveKind::Move => t.from.center().lerp(t.target.center(), t.elapsed / total),
                MoveKind::Bump => {
                    let leg = self.config.bump_duration;
                    let peak = t.from.center().lerp(t.target.center(), self.config.bump_distance);
                    if t.elapsed < leg {
                        t.from.center().lerp(peak, t.elapsed / leg)
                    } else {
                        peak.lerp(t.from.center(), (t.elapsed - leg) / leg)
                    }
                }
            };
            return None;
        }

        // Finished: snap exactly onto the grid.
        self.transition = None;
        if t.kind == MoveKind::Move {
            self.actor.cell = t.target;
        }
        self.actor.position = self.actor.cell.center();
        self.actor.phase = MotionPhase::Idle;

        Some(TurnResolved { kind: t.kind, dir: t.dir, from: t.from, target: t.target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f32 = 0.016;

    fn open(_: Cell) -> bool {
        false
    }

    fn controller() -> GridMotionController {
        GridMotionController::new(Cell::new(5, 5), MotionConfig::default())
    }

    /// Tick until a turn resolves (bounded), returning it.
    fn run_until_resolved(
        m: &mut GridMotionController,
        input: AxisInput,
        occ: &impl Occupancy,
    ) -> Option<TurnResolved> {
        for _ in 0..200 {
            if let Some(r) = m.update(input, DT, occ) {
                return Some(r);
            }
        }
        None
    }

    #[test]
    fn move_lands_exactly_on_target() {
        let mut m = controller();
        let right = AxisInput::new(1.0, 0.0);
        assert!(m.update(right, DT, &open).is_none());
        assert_eq!(m.phase(), MotionPhase::Moving);
        assert_eq!(m.pending_target(), Some(Cell::new(6, 5)));

        let r = run_until_resolved(&mut m, right, &open).expect("resolves");
        assert_eq!(r.kind, MoveKind::Move);
        assert_eq!(r.from, Cell::new(5, 5));
        assert_eq!(r.target, Cell::new(6, 5));
        assert_eq!(m.cell(), Cell::new(6, 5));
        assert_eq!(m.position(), Vec2::new(6.0, 5.0));
        assert!(m.is_idle());
    }

    #[test]
    fn interpolates_between_cells() {
        let mut m = controller();
        let up = AxisInput::new(0.0, 1.0);
        m.update(up, 0.0, &open);
        m.update(up, 0.075, &open); // half of 0.15
        let p = m.position();
        assert!((p.x - 5.0).abs() < 1e-4);
        assert!((p.y - 4.5).abs() < 1e-3);
        assert_eq!(m.cell(), Cell::new(5, 5));
    }

    #[test]
    fn blocked_target_bumps_and_stays() {
        let wall = Cell::new(5, 6);
        let occ = move |c: Cell| c == wall;
        let mut m = controller();
        let down = AxisInput::new(0.0, -1.0);
        m.update(down, DT, &occ);
        assert_eq!(m.phase(), MotionPhase::Bumping);

        // Partway in, the actor leans toward the wall but not past bump_distance
        m.update(down, 0.1, &occ);
        assert!(m.position().y > 5.0 && m.position().y <= 5.2 + 1e-4);

        let r = run_until_resolved(&mut m, down, &occ).expect("bump resolves");
        assert_eq!(r.kind, MoveKind::Bump);
        assert_eq!(r.target, wall);
        assert_eq!(m.cell(), Cell::new(5, 5));
        assert_eq!(m.position(), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn held_input_moves_once() {
        let mut m = controller();
        let right = AxisInput::new(1.0, 0.0);
        let mut turns = 0;
        for _ in 0..300 {
            if m.update(right, DT, &open).is_some() {
                turns += 1;
            }
        }
        assert_eq!(turns, 1);
        assert_eq!(m.cell(), Cell::new(6, 5));
    }

    #[test]
    fn release_and_press_again_moves_again() {
        let mut m = controller();
        let right = AxisInput::new(1.0, 0.0);
        run_until_resolved(&mut m, right, &open).unwrap();
        m.update(AxisInput::ZERO, DT, &open);
        run_until_resolved(&mut m, right, &open).unwrap();
        assert_eq!(m.cell(), Cell::new(7, 5));
    }

    #[test]
    fn bump_also_consumes_press() {
        let occ = |_: Cell| true;
        let mut m = controller();
        let left = AxisInput::new(-1.0, 0.0);
        let mut turns = 0;
        for _ in 0..300 {
            if m.update(left, DT, &occ).is_some() {
                turns += 1;
            }
        }
        assert_eq!(turns, 1);
    }

    #[test]
    fn release_mid_animation_does_not_cancel_it() {
        let mut m = controller();
        m.update(AxisInput::new(1.0, 0.0), DT, &open);
        // Released: debounce clears, animation keeps going
        m.update(AxisInput::ZERO, DT, &open);
        assert!(!m.actor().input_consumed);
        assert_eq!(m.phase(), MotionPhase::Moving);
        // A new press while still moving is not accepted
        let r = run_until_resolved(&mut m, AxisInput::new(0.0, 1.0), &open).unwrap();
        assert_eq!(r.dir, Dir::Right);
        // ... and after resolving, the still-held press is picked up next tick
        assert!(m.update(AxisInput::new(0.0, 1.0), DT, &open).is_none());
        assert_eq!(m.phase(), MotionPhase::Moving);
        assert_eq!(m.pending_target(), Some(Cell::new(6, 4)));
    }

    #[test]
    fn no_new_accept_on_resolving_tick() {
        let mut m = GridMotionController::new(
            Cell::new(0, 0),
            MotionConfig { move_duration: 0.01, ..MotionConfig::default() },
        );
        m.update(AxisInput::new(1.0, 0.0), DT, &open);
        m.update(AxisInput::ZERO, DT * 0.1, &open);
        // Input is fresh, but this tick resolves the move: stays Idle
        let r = m.update(AxisInput::new(1.0, 0.0), 1.0, &open);
        assert!(r.is_some());
        assert!(m.is_idle());
    }

    #[test]
    fn sub_unit_input_is_not_consumed() {
        let mut m = controller();
        assert!(m.update(AxisInput::new(0.3, 0.1), DT, &open).is_none());
        assert!(m.is_idle());
        assert!(!m.actor().input_consumed);
        // Pushing further on the same press is now accepted
        m.update(AxisInput::new(0.8, 0.1), DT, &open);
        assert_eq!(m.phase(), MotionPhase::Moving);
    }

    #[test]
    fn cancel_settles_on_target_and_blocks_held_key() {
        let mut m = controller();
        let right = AxisInput::new(1.0, 0.0);
        m.update(right, DT, &open);
        m.update(right, DT, &open);
        m.cancel();
        assert!(m.is_idle());
        assert_eq!(m.cell(), Cell::new(6, 5));
        assert_eq!(m.position(), Vec2::new(6.0, 5.0));
        for _ in 0..50 {
            assert!(m.update(right, DT, &open).is_none());
        }
        assert!(m.is_idle());
    }

    #[test]
    fn teleport_places_actor() {
        let mut m = controller();
        m.update(AxisInput::new(0.0, 1.0), DT, &open);
        m.teleport(Cell::new(20, 3));
        assert_eq!(m.cell(), Cell::new(20, 3));
        assert_eq!(m.position(), Vec2::new(20.0, 3.0));
        assert!(m.pending_target().is_none());
    }

    #[test]
    fn malformed_durations_are_clamped() {
        let cfg = MotionConfig { move_duration: 0.0, bump_duration: -3.0, bump_distance: f32::NAN }
            .sanitized();
        assert!(cfg.move_duration > 0.0);
        assert!(cfg.bump_duration > 0.0);
        assert_eq!(cfg.bump_distance, 0.0);

        let mut m = GridMotionController::new(Cell::new(0, 0), cfg);
        m.update(AxisInput::new(1.0, 0.0), DT, &open);
        assert!(m.update(AxisInput::new(1.0, 0.0), DT, &open).is_some());
    }

    #[test]
    fn bump_never_reaches_the_blocked_cell() {
        let cfg = MotionConfig { bump_distance: 0.5, ..MotionConfig::default() }.sanitized();
        assert_eq!(cfg.bump_distance, MAX_BUMP_DISTANCE);

        let wall = Cell::new(6, 5);
        let occ = move |c: Cell| c == wall;
        let mut m = GridMotionController::new(Cell::new(5, 5), cfg);
        let right = AxisInput::new(1.0, 0.0);
        for _ in 0..100 {
            let done = m.update(right, 0.005, &occ).is_some();
            assert_eq!(m.position().nearest_cell(), Cell::new(5, 5));
            if done {
                return;
            }
        }
        panic!("bump did not resolve");
    }

    proptest! {
        /// Turns never outnumber distinct presses.
        #[test]
        fn at_most_one_turn_per_press(
            frames in prop::collection::vec((any::<bool>(), 0.0f32..0.2), 1..400)
        ) {
            let mut m = controller();
            let mut presses = 0u32;
            let mut was_down = false;
            let mut turns = 0u32;
            for (down, dt) in frames {
                if down && !was_down { presses += 1; }
                was_down = down;
                let input = if down { AxisInput::new(1.0, 0.0) } else { AxisInput::ZERO };
                if m.update(input, dt, &open).is_some() { turns += 1; }
            }
            prop_assert!(turns <= presses);
        }
    }
}
