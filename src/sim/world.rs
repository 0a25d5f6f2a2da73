/// WorldState: the complete snapshot of a running session.
///
/// ## Layers
///
///   - `tiles`     — static terrain as loaded. Never mutated after load.
///   - entities    — items, obstacle groups, exits, patrol walls.
///   - `blockers`  — derived O(1) grid of cells currently blocked by
///                   entities. Rebuilt by `rebuild_blockers()` whenever an
///                   obstacle unlocks, an exit opens or a patrol moves.
///
/// ## Services
///
/// The ledger, reveal gate, unlock resolver and slot table are plain
/// values owned by the session (`services`) and handed the entity slices
/// they work on. Nothing is globally reachable.
///
/// ## Camera / Viewport
///
/// World coordinates and screen coordinates are separate:
///   - `camera` — viewport into the world (top-left corner + size)
///   - Renderer maps: `screen(sx, sy) = world(camera.x + sx, camera.y + sy)`
///   - The camera frames the actor's current zone; zones smaller than the
///     viewport are centered, larger ones scroll with a dead zone

use crate::config::{GameConfig, TimingConfig};
use crate::domain::entity::{CollectibleItem, ExitPoint, ObstacleGroup, ZoneId};
use crate::domain::geom::Cell;
use crate::domain::motion::{GridMotionController, MotionConfig};
use crate::domain::patrol::PatrolWall;
use crate::domain::physics::{self, Occupancy, OccupancyView};
use crate::domain::tile::Tile;
use super::event::GameOverReason;
use super::ledger::ZoneBudgetLedger;
use super::reveal::RevealGate;
use super::slots::SlotTable;
use super::unlock::ObstacleUnlockResolver;
use super::zone::ZoneMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    LevelSelect,
    Playing,
    ZoneTransition,
    LevelComplete,
    GameOver,
    GameComplete,
}

/// Camera: a viewport into the world.
///
/// `(x, y)` is the world coordinate of the top-left visible cell.
/// `(view_w, view_h)` is how many world cells fit in the viewport.
/// These are computed from terminal size and set during `render()`.
#[derive(Clone, Debug)]
pub struct Camera {
    /// World X of the top-left visible cell (can be negative for centering)
    pub x: i32,
    /// World Y of the top-left visible cell
    pub y: i32,
    /// Number of world columns visible
    pub view_w: usize,
    /// Number of world rows visible
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera { x: 0, y: 0, view_w: 0, view_h: 0 }
    }

    /// Keep `target` in view inside `region` (inclusive cell span).
    /// A region that fits is centered; a larger one scrolls only when the
    /// target nears the viewport edge.
    pub fn follow(&mut self, target: Cell, region: (Cell, Cell)) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = follow_axis(self.x, self.view_w as i32, target.x, region.0.x, region.1.x);
        self.y = follow_axis(self.y, self.view_h as i32, target.y, region.0.y, region.1.y);
    }

    /// Snap directly onto `target` (no dead zone). Used on load and zone change.
    pub fn center_on(&mut self, target: Cell, region: (Cell, Cell)) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = target.x - self.view_w as i32 / 2;
        self.y = target.y - self.view_h as i32 / 2;
        self.follow(target, region);
    }

    /// Convert world cell to viewport coordinate.
    /// Returns None if outside the visible area.
    pub fn world_to_view(&self, cell: Cell) -> Option<(usize, usize)> {
        let vx = cell.x - self.x;
        let vy = cell.y - self.y;
        if vx >= 0 && vx < self.view_w as i32 && vy >= 0 && vy < self.view_h as i32 {
            Some((vx as usize, vy as usize))
        } else {
            None
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.world_to_view(cell).is_some()
    }
}

fn follow_axis(pos: i32, view: i32, target: i32, lo: i32, hi: i32) -> i32 {
    let span = hi - lo + 1;
    if span <= view {
        return lo - (view - span) / 2;
    }
    // Dead zone: inner 60% of the viewport.
    let margin = view / 5;
    let mut pos = pos;
    if target < pos + margin {
        pos = target - margin;
    } else if target > pos + view - margin - 1 {
        pos = target - view + margin + 1;
    }
    pos.clamp(lo, hi - view + 1)
}

/// Pause between reaching an exit and arriving in the next zone.
#[derive(Clone, Copy, Debug)]
pub struct ZoneTransition {
    pub from: Option<ZoneId>,
    /// `None` when the exit ends the level.
    pub to: Option<ZoneId>,
    pub remaining: f32,
}

/// The core services of one session.
pub struct Services {
    pub ledger: ZoneBudgetLedger,
    pub reveal: RevealGate,
    pub unlock: ObstacleUnlockResolver,
    pub slots: SlotTable,
}

impl Services {
    pub fn empty(config: &GameConfig) -> Self {
        let zones = ZoneMap::default();
        Services {
            ledger: ZoneBudgetLedger::new(&zones),
            reveal: RevealGate::new(&zones, &[], config.reveal),
            unlock: ObstacleUnlockResolver::new(&zones, &[], config.timing.obstacle_fade),
            slots: SlotTable::default(),
        }
    }
}

pub struct WorldState {
    // ── Terrain ──
    pub tiles: Vec<Vec<Tile>>,
    pub width: usize,
    pub height: usize,

    // ── Entities ──
    pub motion: GridMotionController,
    pub items: Vec<CollectibleItem>,
    pub obstacles: Vec<ObstacleGroup>,
    pub exits: Vec<ExitPoint>,
    pub patrols: Vec<PatrolWall>,

    // ── Derived: O(1) blocker grid ──
    pub blockers: Vec<Vec<bool>>,

    // ── Zones and services ──
    pub zones: ZoneMap,
    pub services: Services,
    pub timing: TimingConfig,

    // ── Session tracking ──
    pub spawn: Cell,
    pub turns: u32,
    pub transition: Option<ZoneTransition>,
    pub game_over_reason: Option<GameOverReason>,

    // ── Meta ──
    pub phase: Phase,
    pub paused: bool,
    pub current_level: usize,
    pub total_levels: usize,
    pub level_name: String,
    /// Seconds since the level started; drives blinking.
    pub clock: f32,

    // ── UI ──
    pub message: String,
    pub message_timer: f32,
    pub camera: Camera,

    // ── Level select ──
    pub select_cursor: usize,
    pub select_scroll: usize,
    pub level_names: Vec<String>,
}

// ── Construction ──

impl WorldState {
    pub fn new(config: &GameConfig) -> Self {
        WorldState {
            tiles: vec![],
            width: 0,
            height: 0,
            motion: GridMotionController::new(Cell::new(0, 0), MotionConfig::default()),
            items: vec![],
            obstacles: vec![],
            exits: vec![],
            patrols: vec![],
            blockers: vec![],
            zones: ZoneMap::default(),
            services: Services::empty(config),
            timing: config.timing.clone(),
            spawn: Cell::new(0, 0),
            turns: 0,
            transition: None,
            game_over_reason: None,
            phase: Phase::Title,
            paused: false,
            current_level: 0,
            total_levels: 0,
            level_name: String::new(),
            clock: 0.0,
            message: String::new(),
            message_timer: 0.0,
            camera: Camera::new(),
            select_cursor: 0,
            select_scroll: 0,
            level_names: vec![],
        }
    }

    /// Show `msg` for `seconds` (0 = until replaced).
    pub fn set_message(&mut self, msg: &str, seconds: f32) {
        self.message = msg.to_string();
        self.message_timer = seconds;
    }

    pub fn tick_message(&mut self, dt: f32) {
        if self.message_timer > 0.0 {
            self.message_timer -= dt;
            if self.message_timer <= 0.0 {
                self.message_timer = 0.0;
                self.message.clear();
            }
        }
    }
}

// ── Occupancy ──

impl WorldState {
    /// Rebuild the blocker grid from current entity state.
    pub fn rebuild_blockers(&mut self) {
        self.blockers = physics::build_blocker_grid(
            self.width,
            self.height,
            &self.obstacles,
            &self.exits,
            &self.patrols,
        );
    }

    pub fn occupancy(&self) -> OccupancyView<'_> {
        OccupancyView {
            tiles: &self.tiles,
            width: self.width,
            height: self.height,
            blockers: &self.blockers,
        }
    }

    pub fn terrain_at(&self, cell: Cell) -> Tile {
        physics::terrain_at(&self.tiles, self.width, self.height, cell)
    }
}

// ── Zone queries ──

impl WorldState {
    /// Zone the actor was last located in.
    pub fn actor_zone(&self) -> Option<ZoneId> {
        self.services.ledger.current_zone()
    }

    /// Inclusive cell span of `zone`, or the whole map.
    pub fn region(&self, zone: Option<ZoneId>) -> (Cell, Cell) {
        let whole = (
            Cell::new(0, 0),
            Cell::new(self.width.saturating_sub(1) as i32, self.height.saturating_sub(1) as i32),
        );
        zone.and_then(|z| self.zones.get(z))
            .map_or(whole, |z| z.bounds.cell_span())
    }

    /// The exit belonging to `zone` (any exit when the level has no zones).
    pub fn exit_of(&self, zone: Option<ZoneId>) -> Option<&ExitPoint> {
        if self.zones.is_empty() {
            return self.exits.first();
        }
        self.exits.iter().find(|e| e.zone.is_some() && e.zone == zone)
    }

    /// Where the actor arrives in `zone`: its start cell, else the first
    /// free cell of its bounds, else the level spawn.
    pub fn arrival_cell(&self, zone: ZoneId) -> Cell {
        let Some(z) = self.zones.get(zone) else {
            return self.spawn;
        };
        if let Some(start) = z.start {
            return start;
        }
        let (lo, hi) = z.bounds.cell_span();
        let occ = self.occupancy();
        (lo.y..=hi.y)
            .flat_map(|y| (lo.x..=hi.x).map(move |x| Cell::new(x, y)))
            .find(|&c| !occ.is_blocked(c))
            .unwrap_or(self.spawn)
    }

    /// Keep the camera on the actor within its zone.
    pub fn follow_actor(&mut self) {
        let region = self.region(self.actor_zone());
        let target = self.motion.position().nearest_cell();
        self.camera.follow(target, region);
    }

    pub fn center_camera(&mut self) {
        let region = self.region(self.actor_zone());
        let target = self.motion.cell();
        self.camera.center_on(target, region);
    }

    /// Advance every cosmetic fade and slide.
    pub fn tick_visuals(&mut self, dt: f32) {
        for item in &mut self.items {
            item.visual.tick(dt);
        }
        for group in &mut self.obstacles {
            group.visual.tick(dt);
        }
        for exit in &mut self.exits {
            exit.visual.tick(dt);
        }
        for patrol in &mut self.patrols {
            patrol.tick(dt);
        }
    }
}
