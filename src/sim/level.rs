/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, sorted by filename)
///   2. Built-in embedded levels
///
/// ## Level format (`.txt`):
///   Line 1: `# Level Name`
///   Optional: `@` directives, one per line
///   Lines: map rows
///
/// ## Directives:
///   `@zone name=Hall x=0 y=0 w=10 h=8 budget=30 reveal=1,2 reset=1 hide=1 hideprev=1`
///       `budget=inf` marks the zone unlimited; omitted keys use the config.
///   `@slot name=glass tag=bonus item=3,4 turns=5 effect=unlock consume=1 msg=Nice_find`
///       `item=x,y` refers to the item placed at that map cell.
///   `@patrol x=4 y=2 dir=left dist=3`   (replaces a patrol glyph on that cell)
///   `@item x=4 y=2 name=brass_key tag=key key=1`   (overrides a placed item)
///   Underscores in `name`/`msg` values read as spaces.
///
/// A malformed directive is logged and skipped; a level without map rows
/// is rejected.
///
/// ## Tile legend:
///   '#' = Wall                 '~' = Void (outside the map)
///   ' ' / '.' = Floor          'P' = Player spawn
///   '*' = Star                 'k' = Key
///   '+' = Hourglass (bonus)    'X' = Obstacle cell
///   'E' = Zone exit            'S' = Zone start
///   '>' '<' '^' 'v' = Patrol wall and its direction
///
/// Items are numbered in row-major scan order, which is also their reveal
/// order inside a zone. 4-connected `X` cells form one obstacle group.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{info, warn};
use thiserror::Error;

use crate::config::GameConfig;
use crate::domain::entity::{CollectibleItem, ExitPoint, ItemId, ObstacleGroup, ObstacleId};
use crate::domain::geom::{Bounds, Cell, Dir};
use crate::domain::motion::GridMotionController;
use crate::domain::patrol::PatrolWall;
use crate::domain::physics::Occupancy;
use crate::domain::tile::Tile;
use super::ledger::ZoneBudgetLedger;
use super::reveal::{RevealGate, RevealRules};
use super::slots::{SlotEffect, SlotRule, SlotTable};
use super::unlock::ObstacleUnlockResolver;
use super::world::{Phase, Services, WorldState};
use super::zone::{Zone, ZoneMap};

/// Letters that can appear in map rows; a `#` line with any other letter is a name.
const MAP_LETTERS: [char; 6] = ['P', 'k', 'X', 'E', 'S', 'v'];

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("could not read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("level '{name}' has no map rows")]
    EmptyMap { name: String },
    #[error("line {line}: unknown directive '@{name}'")]
    UnknownDirective { line: usize, name: String },
    #[error("line {line}: expected key=value, got '{token}'")]
    BadToken { line: usize, token: String },
    #[error("line {line}: bad value for '{key}': '{value}'")]
    BadValue { line: usize, key: String, value: String },
    #[error("line {line}: @{directive} needs '{key}'")]
    MissingKey { line: usize, directive: String, key: &'static str },
}

// ── Level data ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BudgetSpec {
    /// Use `[budget] default_zone_budget`.
    Default,
    Unlimited,
    Turns(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ZoneSpec {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub budget: BudgetSpec,
    pub reveal: Option<(usize, usize)>,
    pub reset: Option<bool>,
    pub hide: Option<bool>,
    pub hide_prev: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlotSpec {
    pub name: String,
    pub tag: String,
    pub item: Option<Cell>,
    pub turns: Option<u32>,
    pub unlock: bool,
    pub consume: bool,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatrolSpec {
    pub cell: Cell,
    pub dir: Dir,
    pub distance: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ItemSpec {
    pub cell: Cell,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub key: Option<bool>,
}

/// Runtime level data (owned strings, loaded from file or embedded).
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub name: String,
    pub rows: Vec<String>,
    pub zones: Vec<ZoneSpec>,
    pub slots: Vec<SlotSpec>,
    pub patrols: Vec<PatrolSpec>,
    pub items: Vec<ItemSpec>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// All playable levels: the levels directory if it has any, else the
/// embedded set.
pub fn load_levels(config: &GameConfig) -> Vec<LevelDef> {
    let dir = &config.levels_dir;
    if dir.is_dir() {
        let levels = load_from_directory(dir);
        if !levels.is_empty() {
            info!("[Level] {} levels from {}", levels.len(), dir.display());
            return levels;
        }
    }
    embedded_levels()
}

/// Load level `idx` into the world, replacing the whole session state.
pub fn load_level(world: &mut WorldState, levels: &[LevelDef], idx: usize, config: &GameConfig) {
    let Some(def) = levels.get(idx) else {
        world.phase = Phase::GameComplete;
        return;
    };
    world.current_level = idx;
    world.total_levels = levels.len();
    world.level_name = def.name.clone();
    populate(world, def, config);
    world.phase = Phase::Playing;
    world.set_message(&def.name, 2.0);
}

/// Parse a single level from text content.
pub fn parse_level(content: &str) -> Result<LevelDef, LevelError> {
    let mut def = LevelDef {
        name: String::new(),
        rows: vec![],
        zones: vec![],
        slots: vec![],
        patrols: vec![],
        items: vec![],
    };

    for (i, line) in content.lines().enumerate() {
        let line_no = i + 1;
        if def.rows.is_empty() && def.name.is_empty() && is_name_line(line) {
            def.name = line[1..].trim().to_string();
        } else if let Some(rest) = line.strip_prefix('@') {
            if let Err(e) = parse_directive(line_no, rest, &mut def) {
                warn!("[Level] {e}; skipped");
            }
        } else if def.rows.is_empty() && line.trim().is_empty() {
            continue;
        } else {
            def.rows.push(line.to_string());
        }
    }

    while def.rows.last().is_some_and(|r| r.trim().is_empty()) {
        def.rows.pop();
    }
    if def.name.is_empty() {
        def.name = "Unnamed Level".to_string();
    }
    if def.rows.is_empty() {
        return Err(LevelError::EmptyMap { name: def.name });
    }
    Ok(def)
}

/// Distinguish `# Level Name` from `#####  ###` (map data).
/// A name line starts with `#` and has a letter the map legend never uses.
fn is_name_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('#') else {
        return false;
    };
    rest.chars().any(|c| c.is_alphabetic() && !MAP_LETTERS.contains(&c))
}

// ══════════════════════════════════════════════════════════════
// Directives
// ══════════════════════════════════════════════════════════════

struct Args<'a> {
    line: usize,
    directive: &'a str,
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Args<'a> {
    fn parse(line: usize, directive: &'a str, tokens: impl Iterator<Item = &'a str>) -> Result<Self, LevelError> {
        let mut pairs = vec![];
        for token in tokens {
            let Some((k, v)) = token.split_once('=') else {
                return Err(LevelError::BadToken { line, token: token.to_string() });
            };
            pairs.push((k, v));
        }
        Ok(Args { line, directive, pairs })
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.pairs.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn bad(&self, key: &str, value: &str) -> LevelError {
        LevelError::BadValue { line: self.line, key: key.to_string(), value: value.to_string() }
    }

    fn opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, LevelError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.parse().map(Some).map_err(|_| self.bad(key, v)),
        }
    }

    fn require<T: FromStr>(&self, key: &'static str) -> Result<T, LevelError> {
        self.opt(key)?.ok_or_else(|| LevelError::MissingKey {
            line: self.line,
            directive: self.directive.to_string(),
            key,
        })
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, LevelError> {
        match self.get(key) {
            None => Ok(None),
            Some("1" | "true" | "yes") => Ok(Some(true)),
            Some("0" | "false" | "no") => Ok(Some(false)),
            Some(v) => Err(self.bad(key, v)),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.replace('_', " "))
    }

    fn cell(&self) -> Result<Cell, LevelError> {
        Ok(Cell::new(self.require("x")?, self.require("y")?))
    }

    fn pair(&self, key: &str) -> Result<Option<(i64, i64)>, LevelError> {
        let Some(v) = self.get(key) else {
            return Ok(None);
        };
        let parsed = v
            .split_once(',')
            .and_then(|(a, b)| Some((a.trim().parse().ok()?, b.trim().parse().ok()?)));
        parsed.map(Some).ok_or_else(|| self.bad(key, v))
    }
}

fn parse_directive(line: usize, rest: &str, def: &mut LevelDef) -> Result<(), LevelError> {
    let mut tokens = rest.split_whitespace();
    let name = tokens.next().unwrap_or("");
    let args = Args::parse(line, name, tokens)?;
    match name {
        "zone" => def.zones.push(parse_zone(&args)?),
        "slot" => def.slots.push(parse_slot(&args)?),
        "patrol" => def.patrols.push(parse_patrol(&args)?),
        "item" => def.items.push(ItemSpec {
            cell: args.cell()?,
            name: args.text("name"),
            tag: args.get("tag").map(str::to_string),
            key: args.flag("key")?,
        }),
        _ => return Err(LevelError::UnknownDirective { line, name: name.to_string() }),
    }
    Ok(())
}

fn parse_zone(args: &Args) -> Result<ZoneSpec, LevelError> {
    let budget = match args.get("budget") {
        None => BudgetSpec::Default,
        Some("inf" | "none") => BudgetSpec::Unlimited,
        Some(v) => BudgetSpec::Turns(v.parse().map_err(|_| args.bad("budget", v))?),
    };
    let reveal = match args.pair("reveal")? {
        Some((init, batch)) if init >= 0 && batch > 0 => Some((init as usize, batch as usize)),
        Some(_) => return Err(args.bad("reveal", args.get("reveal").unwrap_or(""))),
        None => None,
    };
    Ok(ZoneSpec {
        name: args.text("name").unwrap_or_default(),
        x: args.require("x")?,
        y: args.require("y")?,
        w: args.require("w")?,
        h: args.require("h")?,
        budget,
        reveal,
        reset: args.flag("reset")?,
        hide: args.flag("hide")?,
        hide_prev: args.flag("hideprev")?,
    })
}

fn parse_slot(args: &Args) -> Result<SlotSpec, LevelError> {
    let unlock = match args.get("effect") {
        None | Some("turns") => false,
        Some("unlock") => true,
        Some(v) => return Err(args.bad("effect", v)),
    };
    let item = match args.pair("item")? {
        Some((x, y)) => Some(Cell::new(x as i32, y as i32)),
        None => None,
    };
    Ok(SlotSpec {
        name: args.text("name").unwrap_or_default(),
        tag: args.get("tag").unwrap_or_default().to_string(),
        item,
        turns: args.opt("turns")?,
        unlock,
        consume: args.flag("consume")?.unwrap_or(false),
        message: args.text("msg"),
    })
}

fn parse_patrol(args: &Args) -> Result<PatrolSpec, LevelError> {
    let dir_text: String = args.require("dir")?;
    let dir = parse_dir(&dir_text).ok_or_else(|| args.bad("dir", &dir_text))?;
    Ok(PatrolSpec { cell: args.cell()?, dir, distance: args.opt("dist")? })
}

fn parse_dir(s: &str) -> Option<Dir> {
    match s.to_ascii_lowercase().as_str() {
        "left" | "l" | "<" => Some(Dir::Left),
        "right" | "r" | ">" => Some(Dir::Right),
        "up" | "u" | "^" => Some(Dir::Up),
        "down" | "d" | "v" => Some(Dir::Down),
        _ => None,
    }
}

// ══════════════════════════════════════════════════════════════
// Building the world
// ══════════════════════════════════════════════════════════════

fn populate(world: &mut WorldState, def: &LevelDef, config: &GameConfig) {
    let height = def.rows.len();
    let width = def.rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    // Short rows are padded with void.
    let grid: Vec<Vec<char>> = def
        .rows
        .iter()
        .map(|r| {
            let mut row: Vec<char> = r.chars().collect();
            row.resize(width, '~');
            row
        })
        .collect();

    let mut tiles = vec![vec![Tile::Floor; width]; height];
    let mut items = vec![];
    let mut exits = vec![];
    let mut patrols = vec![];
    let mut starts = vec![];
    let mut spawn = None;

    for (y, row) in grid.iter().enumerate() {
        for (x, &ch) in row.iter().enumerate() {
            let cell = Cell::new(x as i32, y as i32);
            tiles[y][x] = Tile::from_char(ch);
            match ch {
                'P' => spawn = Some(cell),
                '*' => items.push(CollectibleItem::new(ItemId(items.len()), "star", "star", cell)),
                'k' => {
                    let mut key = CollectibleItem::new(ItemId(items.len()), "key", "key", cell);
                    key.key_marker = true;
                    items.push(key);
                }
                '+' => items.push(CollectibleItem::new(ItemId(items.len()), "hourglass", "bonus", cell)),
                'E' => exits.push(ExitPoint::new(cell)),
                'S' => starts.push(cell),
                '>' | '<' | '^' | 'v' => {
                    if let Some(dir) = parse_dir(&ch.to_string()) {
                        patrols.push(PatrolWall::new(cell, dir, config.patrol.default_distance));
                    }
                }
                _ => {}
            }
        }
    }

    apply_item_overrides(&mut items, &def.items);
    for spec in &def.patrols {
        let distance = spec.distance.unwrap_or(config.patrol.default_distance);
        patrols.retain(|p| p.cell != spec.cell);
        patrols.push(PatrolWall::new(spec.cell, spec.dir, distance));
    }

    let mut obstacles: Vec<ObstacleGroup> = group_obstacles(&grid)
        .into_iter()
        .enumerate()
        .map(|(i, cells)| ObstacleGroup::new(ObstacleId(i), cells))
        .collect();

    let mut zones = ZoneMap::new(def.zones.iter().map(|z| build_zone(z, config)).collect());
    zones.assign_members(&mut items, &mut obstacles, &mut exits);
    for &start in &starts {
        zones.assign_start(start);
    }

    let slots = build_slots(&def.slots, &items, config);

    world.tiles = tiles;
    world.width = width;
    world.height = height;
    world.timing = config.timing.clone();
    world.services = Services {
        ledger: ZoneBudgetLedger::new(&zones),
        reveal: RevealGate::new(&zones, &items, config.reveal),
        unlock: ObstacleUnlockResolver::new(&zones, &obstacles, config.timing.obstacle_fade),
        slots,
    };
    world.items = items;
    world.obstacles = obstacles;
    world.exits = exits;
    world.patrols = patrols;
    world.zones = zones;
    world.turns = 0;
    world.clock = 0.0;
    world.transition = None;
    world.game_over_reason = None;
    world.paused = false;
    world.rebuild_blockers();

    let spawn = spawn.unwrap_or_else(|| {
        warn!("[Level] '{}' has no 'P'; using first free cell", def.name);
        let occ = world.occupancy();
        starts
            .first()
            .copied()
            .or_else(|| {
                (0..height as i32)
                    .flat_map(|y| (0..width as i32).map(move |x| Cell::new(x, y)))
                    .find(|&c| !occ.is_blocked(c))
            })
            .unwrap_or_default()
    });
    world.spawn = spawn;
    world.motion = GridMotionController::new(spawn, config.timing.motion);

    // Initial visibility and the spawn zone are not announced.
    let mut events = vec![];
    world.services.reveal.start(&mut world.items, &mut world.exits, &mut events);
    world.services.ledger.track(&world.zones, spawn.center(), &mut events);
    world.rebuild_blockers();
    world.center_camera();

    info!(
        "[Level] '{}': {}x{}, {} zones, {} items, {} obstacles, {} patrols",
        def.name,
        width,
        height,
        world.zones.len(),
        world.items.len(),
        world.obstacles.len(),
        world.patrols.len()
    );
}

fn build_zone(spec: &ZoneSpec, config: &GameConfig) -> Zone {
    let budget = match spec.budget {
        BudgetSpec::Default => config.budget.default_zone_budget,
        BudgetSpec::Unlimited => None,
        BudgetSpec::Turns(n) => Some(n),
    };
    let d = config.reveal.defaults;
    let (initial_visible, batch_size) = spec.reveal.unwrap_or((d.initial_visible, d.batch_size));
    let rules = RevealRules {
        initial_visible,
        batch_size: batch_size.max(1),
        hide_completed_batches: spec.hide.unwrap_or(d.hide_completed_batches),
        hide_previous_batches: spec.hide_prev.unwrap_or(d.hide_previous_batches),
        reset_on_enter: spec.reset.unwrap_or(d.reset_on_enter),
    };
    Zone::new(&spec.name, Bounds::from_cells(spec.x, spec.y, spec.w, spec.h), budget, rules)
}

fn apply_item_overrides(items: &mut [CollectibleItem], specs: &[ItemSpec]) {
    for spec in specs {
        let Some(item) = items.iter_mut().find(|i| i.cell == spec.cell) else {
            warn!("[Level] @item at {:?}: no item there", spec.cell);
            continue;
        };
        if let Some(name) = &spec.name {
            item.name = name.clone();
        }
        if let Some(tag) = &spec.tag {
            item.tag = tag.clone();
        }
        if let Some(key) = spec.key {
            item.key_marker = key;
        }
    }
}

/// Slot rules from directives, plus a reusable hourglass rule when some
/// hourglass would otherwise grant nothing.
fn build_slots(specs: &[SlotSpec], items: &[CollectibleItem], config: &GameConfig) -> SlotTable {
    let mut rules = vec![];
    for spec in specs {
        let item = match spec.item {
            Some(cell) => match items.iter().find(|i| i.cell == cell) {
                Some(i) => Some(i.id),
                None => {
                    warn!("[Level] @slot item={},{}: no item there", cell.x, cell.y);
                    continue;
                }
            },
            None => None,
        };
        let effect = if spec.unlock {
            SlotEffect::UnlockObstacle
        } else {
            SlotEffect::ExtraTurns(spec.turns.unwrap_or(config.budget.default_extra_turns))
        };
        rules.push(SlotRule {
            name: spec.name.clone(),
            tag: spec.tag.clone(),
            item,
            effect,
            consume_on_collect: spec.consume,
            message: spec.message.clone(),
        });
    }

    let table = SlotTable::new(rules.clone());
    let unmatched = items
        .iter()
        .any(|i| i.tag == "bonus" && table.find(i).is_none());
    if unmatched {
        rules.push(SlotRule {
            tag: "bonus".to_string(),
            message: Some(format!("+{} turns", config.budget.default_extra_turns)),
            ..SlotRule::new(SlotEffect::ExtraTurns(config.budget.default_extra_turns))
        });
        return SlotTable::new(rules);
    }
    table
}

/// 4-connected groups of `X` cells, in scan order of their first cell.
fn group_obstacles(grid: &[Vec<char>]) -> Vec<Vec<Cell>> {
    let mut seen: Vec<Vec<bool>> = grid.iter().map(|r| vec![false; r.len()]).collect();
    let mut groups = vec![];

    for y in 0..grid.len() {
        for x in 0..grid[y].len() {
            if grid[y][x] != 'X' || seen[y][x] {
                continue;
            }
            let mut cells = vec![];
            let mut queue = VecDeque::from([(x, y)]);
            seen[y][x] = true;
            while let Some((cx, cy)) = queue.pop_front() {
                cells.push(Cell::new(cx as i32, cy as i32));
                let neighbors = [
                    (cx.wrapping_sub(1), cy),
                    (cx + 1, cy),
                    (cx, cy.wrapping_sub(1)),
                    (cx, cy + 1),
                ];
                for (nx, ny) in neighbors {
                    if ny < grid.len() && nx < grid[ny].len() && grid[ny][nx] == 'X' && !seen[ny][nx] {
                        seen[ny][nx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
            groups.push(cells);
        }
    }
    groups
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("[Level] {}: {e}", dir.display());
            return vec![];
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "txt"))
        .collect();
    paths.sort();

    paths
        .iter()
        .filter_map(|path| match read_level(path) {
            Ok(def) => Some(def),
            Err(e) => {
                warn!("[Level] {e}; skipped");
                None
            }
        })
        .collect()
}

fn read_level(path: &Path) -> Result<LevelDef, LevelError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| LevelError::Io { path: path.to_path_buf(), source })?;
    parse_level(&content)
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

const EMBEDDED: [&str; 3] = [
    include_str!("../../levels/01-first-light.txt"),
    include_str!("../../levels/02-patrol-hall.txt"),
    include_str!("../../levels/03-three-rooms.txt"),
];

fn embedded_levels() -> Vec<LevelDef> {
    EMBEDDED
        .iter()
        .filter_map(|text| match parse_level(text) {
            Ok(def) => Some(def),
            Err(e) => {
                warn!("[Level] embedded level: {e}");
                None
            }
        })
        .collect()
}
