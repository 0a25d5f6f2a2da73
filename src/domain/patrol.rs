/// Turn-paced patrol walls.
///
/// A patrol wall advances one cell per completed player turn, walking
/// `distance` cells along its direction and then back (ping-pong).
/// It blocks movement like any other wall. If the next cell is blocked
/// (terrain, another blocker, the actor) it holds for that turn.
///
/// The slide between cells is cosmetic and advanced by `tick(dt)`;
/// gameplay only ever sees `cell`.

use super::entity::MIN_DURATION;
use super::geom::{Cell, Dir, Vec2};

#[derive(Clone, Debug)]
pub struct PatrolWall {
    pub cell: Cell,
    pub dir: Dir,
    pub distance: u32,
    /// Cells travelled from the origin (0..=distance).
    step: u32,
    outbound: bool,
    slide_from: Cell,
    slide_elapsed: f32,
    slide_duration: f32,
}

impl PatrolWall {
    pub fn new(cell: Cell, dir: Dir, distance: u32) -> Self {
        PatrolWall {
            cell,
            dir,
            distance,
            step: 0,
            outbound: true,
            slide_from: cell,
            slide_elapsed: 0.0,
            slide_duration: MIN_DURATION,
        }
    }

    /// Next (direction, step) this wall wants to take.
    fn intent(&self) -> Option<(Dir, u32, bool)> {
        if self.distance == 0 {
            return None;
        }
        let forward = if self.outbound { self.step < self.distance } else { self.step == 0 };
        if forward {
            Some((self.dir, self.step + 1, self.step + 1 < self.distance))
        } else {
            Some((self.dir.reverse(), self.step - 1, self.step - 1 == 0))
        }
    }

    /// Advance one turn. Returns true if the wall moved.
    pub fn on_turn(&mut self, is_blocked: impl Fn(Cell) -> bool, slide: f32) -> bool {
        let Some((dir, step, outbound)) = self.intent() else {
            return false;
        };
        let (dx, dy) = dir.delta();
        let target = self.cell.offset(dx, dy);
        if is_blocked(target) {
            return false;
        }
        self.slide_from = self.cell;
        self.slide_elapsed = 0.0;
        self.slide_duration = slide.max(MIN_DURATION);
        self.cell = target;
        self.step = step;
        self.outbound = outbound;
        true
    }

    pub fn tick(&mut self, dt: f32) {
        self.slide_elapsed = (self.slide_elapsed + dt.max(0.0)).min(self.slide_duration);
    }

    /// Interpolated position for drawing.
    pub fn position(&self) -> Vec2 {
        self.slide_from
            .center()
            .lerp(self.cell.center(), self.slide_elapsed / self.slide_duration)
    }
}
