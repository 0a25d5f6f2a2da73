/// Entities placed on top of the terrain: collectibles, obstacle groups
/// and exit points, plus the timed fade they all animate with.
///
/// Every entity carries a `Visual` (alpha + optional running fade).
/// Gameplay flags (`collected`, `active`, `open`, `interactable`) flip
/// immediately; the fade is cosmetic and advanced by `tick(dt)`.

use super::geom::{Cell, Vec2};

/// Shortest duration any timed transition may have (seconds).
pub const MIN_DURATION: f32 = 0.0001;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ItemId(pub usize);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ObstacleId(pub usize);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ZoneId(pub usize);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

impl std::fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obstacle#{}", self.0)
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "zone#{}", self.0)
    }
}

/// Fade: a scalar moving from `from` to `to` over `duration` seconds.
///
/// Elapsed time accumulates per tick; once `elapsed >= duration` the
/// value is pinned to `to` exactly.
#[derive(Clone, Copy, Debug)]
pub struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    pub fn new(from: f32, to: f32, duration: f32) -> Self {
        Fade { from, to, elapsed: 0.0, duration: duration.max(MIN_DURATION) }
    }

    /// Advance by `dt` seconds. Returns true once the fade has finished.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub fn value(&self) -> f32 {
        if self.is_done() {
            return self.to;
        }
        self.from + (self.to - self.from) * (self.elapsed / self.duration)
    }

    pub fn target(&self) -> f32 {
        self.to
    }
}

/// Alpha channel with an optional running fade.
#[derive(Clone, Copy, Debug)]
pub struct Visual {
    alpha: f32,
    fade: Option<Fade>,
}

impl Visual {
    pub fn shown() -> Self {
        Visual { alpha: 1.0, fade: None }
    }

    pub fn hidden() -> Self {
        Visual { alpha: 0.0, fade: None }
    }

    pub fn alpha(&self) -> f32 {
        self.fade.map_or(self.alpha, |f| f.value())
    }

    /// Start fading from the current alpha toward `target`.
    pub fn fade_to(&mut self, target: f32, duration: f32) {
        let current = self.alpha();
        self.alpha = current;
        self.fade = Some(Fade::new(current, target, duration));
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn tick(&mut self, dt: f32) {
        if let Some(fade) = self.fade.as_mut() {
            if fade.tick(dt) {
                self.alpha = fade.target();
                self.fade = None;
            }
        }
    }
}

/// A pickup placed in the level.
#[derive(Clone, Debug)]
pub struct CollectibleItem {
    pub id: ItemId,
    /// Display name; slot rules may match by substring.
    pub name: String,
    pub tag: String,
    pub cell: Cell,
    pub zone: Option<ZoneId>,
    /// Explicit "this is a key" marker from the level data.
    pub key_marker: bool,
    pub collected: bool,
    /// Only interactable items can be picked up.
    pub interactable: bool,
    pub visual: Visual,
}

impl CollectibleItem {
    pub fn new(id: ItemId, name: &str, tag: &str, cell: Cell) -> Self {
        CollectibleItem {
            id,
            name: name.to_string(),
            tag: tag.to_string(),
            cell,
            zone: None,
            key_marker: false,
            collected: false,
            interactable: true,
            visual: Visual::shown(),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.cell.center()
    }

    /// Can the actor pick this up right now?
    pub fn is_pickable(&self) -> bool {
        !self.collected && self.interactable
    }

    /// Mark collected and start the fade-out. Returns false if it was
    /// already collected (collection happens at most once).
    pub fn collect(&mut self, fade: f32) -> bool {
        if self.collected {
            return false;
        }
        self.collected = true;
        self.interactable = false;
        self.visual.fade_to(0.0, fade);
        true
    }

    pub fn reveal(&mut self, fade: f32) {
        if self.collected {
            return;
        }
        self.interactable = true;
        self.visual.fade_to(1.0, fade);
    }

    pub fn hide(&mut self, fade: f32) {
        if self.collected {
            return;
        }
        self.interactable = false;
        self.visual.fade_to(0.0, fade);
    }
}

/// A group of obstacle cells removed together by one key.
#[derive(Clone, Debug)]
pub struct ObstacleGroup {
    pub id: ObstacleId,
    pub zone: Option<ZoneId>,
    pub cells: Vec<Cell>,
    /// Centroid of `cells`; used for nearest-obstacle matching.
    pub position: Vec2,
    pub active: bool,
    pub visual: Visual,
}

impl ObstacleGroup {
    pub fn new(id: ObstacleId, cells: Vec<Cell>) -> Self {
        let n = cells.len().max(1) as f32;
        let (sx, sy) = cells.iter().fold((0.0, 0.0), |(sx, sy), c| (sx + c.x as f32, sy + c.y as f32));
        ObstacleGroup {
            id,
            zone: None,
            position: Vec2::new(sx / n, sy / n),
            cells,
            active: true,
            visual: Visual::shown(),
        }
    }

    pub fn covers(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Stop blocking immediately and fade out. Returns false if the
    /// group was already inactive (deactivation happens at most once).
    pub fn deactivate(&mut self, fade: f32) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.visual.fade_to(0.0, fade);
        true
    }
}

/// A zone's exit: hidden and non-traversable until the zone's quota is met.
#[derive(Clone, Debug)]
pub struct ExitPoint {
    pub zone: Option<ZoneId>,
    pub cell: Cell,
    pub open: bool,
    pub visual: Visual,
}

impl ExitPoint {
    pub fn new(cell: Cell) -> Self {
        ExitPoint { zone: None, cell, open: false, visual: Visual::hidden() }
    }

    /// Returns true if this call opened it.
    pub fn open(&mut self, fade: f32) -> bool {
        if self.open {
            return false;
        }
        self.open = true;
        self.visual.fade_to(1.0, fade);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_lifecycle() {
        let mut f = Fade::new(0.0, 1.0, 1.0);
        assert!(!f.is_done());
        assert!(!f.tick(0.25));
        assert!((f.value() - 0.25).abs() < 1e-4);
        assert!(!f.tick(0.5));
        assert!((f.value() - 0.75).abs() < 1e-4);
        assert!(f.tick(0.5));
        assert_eq!(f.value(), 1.0);
    }

    #[test]
    fn fade_zero_duration_is_clamped() {
        let mut f = Fade::new(1.0, 0.0, 0.0);
        assert!(f.tick(0.001));
        assert_eq!(f.value(), 0.0);
    }

    #[test]
    fn visual_fade_from_midway() {
        let mut v = Visual::hidden();
        v.fade_to(1.0, 1.0);
        v.tick(0.5);
        assert!((v.alpha() - 0.5).abs() < 1e-4);
        // Reverse mid-fade: starts from the current alpha
        v.fade_to(0.0, 1.0);
        assert!((v.alpha() - 0.5).abs() < 1e-4);
        v.tick(2.0);
        assert_eq!(v.alpha(), 0.0);
        assert!(!v.is_fading());
    }

    #[test]
    fn item_collects_once() {
        let mut item = CollectibleItem::new(ItemId(0), "star", "star", Cell::new(1, 1));
        assert!(item.is_pickable());
        assert!(item.collect(0.5));
        assert!(!item.collect(0.5));
        assert!(!item.is_pickable());
        // Hidden/revealed state no longer applies once collected
        item.reveal(0.5);
        assert!(!item.interactable);
    }

    #[test]
    fn obstacle_centroid_and_single_deactivation() {
        let mut g = ObstacleGroup::new(
            ObstacleId(3),
            vec![Cell::new(2, 2), Cell::new(3, 2), Cell::new(4, 2)],
        );
        assert_eq!(g.position, Vec2::new(3.0, 2.0));
        assert!(g.covers(Cell::new(4, 2)));
        assert!(g.deactivate(0.2));
        assert!(!g.deactivate(0.2));
        assert!(!g.active);
    }

    #[test]
    fn exit_opens_once() {
        let mut e = ExitPoint::new(Cell::new(0, 0));
        assert_eq!(e.visual.alpha(), 0.0);
        assert!(e.open(0.1));
        assert!(!e.open(0.1));
        e.visual.tick(1.0);
        assert_eq!(e.visual.alpha(), 1.0);
    }
}
