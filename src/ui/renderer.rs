/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into the `front` buffer (array of Glyph)
///   2. Compare each glyph with the `back` buffer (previous frame)
///   3. Only emit terminal commands for glyphs that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// Each map cell is two terminal columns wide. Fading entities (items,
/// obstacles, exits) are drawn by blending their colour toward the
/// background by the visual's alpha.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::geom::{Cell, Dir, Vec2};
use crate::domain::tile::Tile;
use crate::sim::event::GameOverReason;
use crate::sim::ledger::Budget;
use crate::sim::world::{Camera, Phase, WorldState};

// ── Glyph: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Glyph {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Glyph {
    /// Explicit dark background for every cell, so row gaps never show the
    /// terminal's own default colour.
    const BASE_BG: Color = Color::Rgb { r: 14, g: 16, b: 30 };

    const BLANK: Glyph = Glyph { ch: ' ', fg: Color::White, bg: Glyph::BASE_BG };

    /// Differs from any real glyph; forces a full repaint.
    const INVALID: Glyph = Glyph { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = if bg == Color::Reset { Self::BASE_BG } else { bg };
        Glyph { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Glyphs ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Glyph>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Glyph::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Glyph::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Glyph::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, g: Glyph) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = g;
        }
    }

    fn get(&self, x: usize, y: usize) -> Glyph {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Glyph::BLANK
        }
    }

    /// Write a string at (x, y). Each char occupies one column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Glyph::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Glyph::new(' ', Color::White, bg));
        }
    }

    fn put_centered(&mut self, y: usize, s: &str, fg: Color) {
        let x = self.width.saturating_sub(s.chars().count()) / 2;
        self.put_str(x, y, s, fg, Color::Reset);
    }
}

// ── Palette ──

const HUD_BG: Color = Color::Rgb { r: 24, g: 30, b: 70 };
const MSG_BG: Color = Color::Rgb { r: 210, g: 180, b: 60 };
const WALL: Color = Color::Rgb { r: 70, g: 80, b: 120 };
const FLOOR: Color = Color::Rgb { r: 40, g: 44, b: 66 };
const STAR: Color = Color::Rgb { r: 255, g: 225, b: 90 };
const KEY: Color = Color::Rgb { r: 120, g: 220, b: 255 };
const HOURGLASS: Color = Color::Rgb { r: 120, g: 255, b: 140 };
const OBSTACLE: Color = Color::Rgb { r: 200, g: 90, b: 60 };
const EXIT_OPEN: Color = Color::Rgb { r: 90, g: 255, b: 200 };
const EXIT_CLOSED: Color = Color::Rgb { r: 90, g: 90, b: 110 };
const PATROL: Color = Color::Rgb { r: 230, g: 70, b: 160 };
const ACTOR: Color = Color::Rgb { r: 255, g: 255, b: 255 };
const ARROW: Color = Color::Rgb { r: 90, g: 255, b: 200 };
const DIM: Color = Color::DarkGrey;

// ── Renderer ──

/// Terminal columns per map cell.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Glyph::BASE_BG),
            Clear(ClearType::All)
        )?;
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        self.back.cells.fill(Glyph::INVALID);
    }

    pub fn render(&mut self, world: &mut WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let resized = tw as usize != self.term_w || th as usize != self.term_h;
        if resized {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
        }

        // Viewport: terminal minus HUD, message and help rows; capped to the map.
        let reserved_rows = MAP_ROW + 4;
        let view_w = (self.term_w / CELL_W).min(world.width.max(1));
        let view_h = self.term_h.saturating_sub(reserved_rows).max(1).min(world.height.max(1));
        let view_changed = world.camera.view_w != view_w || world.camera.view_h != view_h;
        world.camera.view_w = view_w;
        world.camera.view_h = view_h;

        let phase_changed = self.last_phase != Some(world.phase);
        if phase_changed {
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }
        if view_changed || phase_changed {
            world.center_camera();
        }

        self.front.clear();
        match world.phase {
            Phase::Title => self.compose_title(world),
            Phase::LevelSelect => self.compose_level_select(world),
            Phase::Playing | Phase::ZoneTransition => self.compose_game(world),
            Phase::LevelComplete => {
                self.compose_game(world);
                self.compose_level_complete(world);
            }
            Phase::GameOver => {
                self.compose_game(world);
                self.compose_game_over(world);
            }
            Phase::GameComplete => self.compose_game_complete(world),
        }
        if world.paused && world.phase == Phase::Playing {
            self.compose_pause_overlay(world);
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed glyphs ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Glyph::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let g = self.front.get(x, y);
                if g == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if g.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(g.fg))?;
                    last_fg = g.fg;
                }
                if g.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(g.bg))?;
                    last_bg = g.bg;
                }
                queue!(self.writer, Print(g.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }
        self.writer.flush()
    }

    // ═══════════════════════════════════════════════════════════
    // In-game view
    // ═══════════════════════════════════════════════════════════

    fn compose_game(&mut self, w: &WorldState) {
        let cam = w.camera.clone();

        self.compose_hud(w);

        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            for vx in 0..cam.view_w {
                let cell = Cell::new(cam.x + vx as i32, cam.y + vy as i32);
                let (a, b) = self.world_glyphs(w, cell);
                self.front.set(vx * CELL_W, row, a);
                self.front.set(vx * CELL_W + 1, row, b);
            }
        }

        // Sprites that move between cells are placed by interpolated position.
        for patrol in &w.patrols {
            self.put_sprite(&cam, patrol.position(), '▓', '▓', PATROL);
        }
        let (l, r) = actor_glyphs(w.motion.actor().facing);
        self.put_sprite(&cam, w.motion.position(), l, r, ACTOR);

        self.compose_exit_indicator(w);

        let msg_row = MAP_ROW + cam.view_h + 1;
        if !w.message.is_empty() && msg_row < self.front.height {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(1, msg_row, &format!("◈ {}", w.message), Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + cam.view_h + 3;
        if help_row < self.front.height {
            let help = " ←↑↓→/WASD:Move  R:Restart  P:Pause  Esc:Title";
            self.front.put_str(0, help_row, help, DIM, Color::Reset);
        }
    }

    fn compose_hud(&mut self, w: &WorldState) {
        self.front.fill_row(HUD_ROW, HUD_BG);
        let zone = w.actor_zone();
        let zone_name = zone
            .and_then(|z| w.zones.get(z))
            .map_or("-", |z| z.name.as_str());
        let budget = match zone.map(|z| w.services.ledger.budget(z)) {
            Some(Budget::Remaining(n)) => format!("⧗{n}"),
            _ => "⧗∞".to_string(),
        };
        let progress = w
            .services
            .reveal
            .progress(zone)
            .map_or(String::new(), |p| format!("★{}/{}", p.collected, p.total));
        let mut hud = format!(
            " Lv{} {}  {}  {}  {}  Turns:{}",
            w.current_level + 1,
            w.level_name,
            zone_name,
            budget,
            progress,
            w.turns
        );
        let bonus = w.services.ledger.bonus();
        if bonus > 0 {
            hud.push_str(&format!("  Bonus:+{bonus}"));
        }
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    /// Static content of one map cell: terrain, then items, obstacles, exits.
    fn world_glyphs(&self, w: &WorldState, cell: Cell) -> (Glyph, Glyph) {
        let pair = |ch: char, ch2: char, fg: Color| (Glyph::new(ch, fg, Color::Reset), Glyph::new(ch2, fg, Color::Reset));

        match w.terrain_at(cell) {
            Tile::Void => return (Glyph::BLANK, Glyph::BLANK),
            Tile::Wall => return pair('█', '█', WALL),
            Tile::Floor => {}
        }

        if let Some(g) = w.obstacles.iter().find(|g| g.covers(cell)) {
            let alpha = g.visual.alpha();
            if alpha > 0.05 {
                return pair('▒', '▒', fade(OBSTACLE, alpha));
            }
        }
        if let Some(e) = w.exits.iter().find(|e| e.cell == cell) {
            return if e.open {
                pair('▶', '▶', fade(EXIT_OPEN, e.visual.alpha().max(0.3)))
            } else {
                pair('▯', '▯', EXIT_CLOSED)
            };
        }
        if let Some(item) = w.items.iter().find(|i| i.cell == cell) {
            let alpha = item.visual.alpha();
            if alpha > 0.05 {
                let (ch, fg) = item_look(&item.tag, item.key_marker);
                return (Glyph::new(ch, fade(fg, alpha), Color::Reset), Glyph::new(' ', FLOOR, Color::Reset));
            }
        }
        pair('·', ' ', FLOOR)
    }

    fn put_sprite(&mut self, cam: &Camera, pos: Vec2, l: char, r: char, fg: Color) {
        if let Some((vx, vy)) = cam.world_to_view(pos.nearest_cell()) {
            self.front.set(vx * CELL_W, MAP_ROW + vy, Glyph::new(l, fg, Color::Reset));
            self.front.set(vx * CELL_W + 1, MAP_ROW + vy, Glyph::new(r, fg, Color::Reset));
        }
    }

    /// Arrow at the viewport edge toward an open, off-screen exit.
    fn compose_exit_indicator(&mut self, w: &WorldState) {
        if w.phase != Phase::Playing {
            return;
        }
        let Some(exit) = w.exit_of(w.actor_zone()).filter(|e| e.open) else {
            return;
        };
        let Some(ind) = exit_indicator(&w.camera, w.motion.cell(), exit.cell) else {
            return;
        };
        let label = format!("{}{}", ind.arrow, ind.distance);
        let col = (ind.x * CELL_W).min(self.front.width.saturating_sub(label.chars().count()));
        self.front.put_str(col, MAP_ROW + ind.y, &label, Color::Black, ARROW);
    }

    // ═══════════════════════════════════════════════════════════
    // Overlays and menus
    // ═══════════════════════════════════════════════════════════

    fn compose_title(&mut self, w: &WorldState) {
        let art = [
            "╔══════════════════════════════╗",
            "║     ✦ S T A R S E E K E R ✦  ║",
            "╚══════════════════════════════╝",
        ];
        for (i, line) in art.iter().enumerate() {
            self.front.put_centered(3 + i, line, STAR);
        }
        self.front.put_centered(7, "Every step costs a turn. Every zone has a budget.", Color::White);
        let blink = (w.clock * 2.0) as u32 % 2 == 0;
        if blink {
            self.front.put_centered(10, "▸ ENTER  Start", EXIT_OPEN);
        }
        self.front.put_centered(11, "L  Level select    Esc  Quit", DIM);
        self.front.put_centered(13, &format!("{} levels", w.level_names.len()), DIM);
    }

    fn compose_level_select(&mut self, w: &WorldState) {
        self.front.put_str(2, 1, "SELECT LEVEL", STAR, Color::Reset);
        let visible = self.front.height.saturating_sub(6).max(1);
        for (i, name) in w.level_names.iter().enumerate().skip(w.select_scroll).take(visible) {
            let row = 3 + i - w.select_scroll;
            let selected = i == w.select_cursor;
            let (marker, fg) = if selected { ("▸", EXIT_OPEN) } else { (" ", Color::White) };
            self.front.put_str(2, row, &format!("{marker} {:>2}. {name}", i + 1), fg, Color::Reset);
        }
        let footer = self.front.height.saturating_sub(2);
        self.front.put_str(2, footer, "ENTER: Play   ↑↓: Browse   Esc: Back", DIM, Color::Reset);
    }

    fn compose_game_over(&mut self, w: &WorldState) {
        let zone = match w.game_over_reason {
            Some(GameOverReason::ZoneExhausted(z)) => w.zones.get(z).map_or("the zone".to_string(), |z| z.name.clone()),
            None => "the zone".to_string(),
        };
        let lines = [
            "╔══════════════════════════╗".to_string(),
            "║       OUT OF TURNS       ║".to_string(),
            "╚══════════════════════════╝".to_string(),
            format!("No moves left in {zone}"),
            "ENTER / R: Retry    Esc: Title".to_string(),
        ];
        self.compose_banner(&lines, OBSTACLE);
    }

    fn compose_level_complete(&mut self, w: &WorldState) {
        let lines = [
            "╔══════════════════════════╗".to_string(),
            "║        LEVEL CLEAR       ║".to_string(),
            "╚══════════════════════════╝".to_string(),
            format!("{} in {} turns", w.level_name, w.turns),
            "ENTER: Next level".to_string(),
        ];
        self.compose_banner(&lines, STAR);
    }

    fn compose_game_complete(&mut self, w: &WorldState) {
        let art = [
            "╔════════════════════════════════╗",
            "║ ★ EVERY STAR FOUND. WELL DONE ★ ║",
            "╚════════════════════════════════╝",
        ];
        for (i, line) in art.iter().enumerate() {
            self.front.put_centered(4 + i, line, STAR);
        }
        self.front.put_centered(9, &format!("All {} levels cleared", w.total_levels), HOURGLASS);
        self.front.put_centered(11, "ENTER / Esc: Back to title", DIM);
    }

    fn compose_pause_overlay(&mut self, w: &WorldState) {
        let blink = (w.clock * 2.0) as u32 % 2 == 0;
        let title = if blink { "▶  PAUSED  ◀" } else { "   PAUSED   " };
        let lines = [
            title.to_string(),
            String::new(),
            "P    Resume".to_string(),
            "R    Restart level".to_string(),
            "L    Level select".to_string(),
            "Esc  Back to title".to_string(),
        ];
        self.compose_banner(&lines, KEY);
    }

    /// Lines centered on the map area over a dark box.
    fn compose_banner(&mut self, lines: &[String], fg: Color) {
        let bg = Color::Rgb { r: 30, g: 30, b: 40 };
        let view_cols = self.front.width;
        let box_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
        let box_x = view_cols.saturating_sub(box_w) / 2;
        let top = MAP_ROW + 2;
        for (i, line) in lines.iter().enumerate() {
            for x in box_x..box_x + box_w {
                self.front.set(x, top + i, Glyph::new(' ', fg, bg));
            }
            let x = box_x + (box_w - line.chars().count()) / 2;
            self.front.put_str(x, top + i, line, fg, bg);
        }
    }
}

// ── Pure helpers ──

fn actor_glyphs(facing: Dir) -> (char, char) {
    match facing {
        Dir::Left => ('◀', '●'),
        Dir::Right => ('●', '▶'),
        Dir::Up => ('▲', '●'),
        Dir::Down => ('●', '▼'),
    }
}

fn item_look(tag: &str, key: bool) -> (char, Color) {
    if key {
        return ('⚷', KEY);
    }
    match tag {
        "bonus" => ('⧗', HOURGLASS),
        _ => ('✦', STAR),
    }
}

/// Blend `c` toward the background by `alpha` (0 = invisible).
fn fade(c: Color, alpha: f32) -> Color {
    let Color::Rgb { r, g, b } = c else {
        return c;
    };
    let Color::Rgb { r: br, g: bg, b: bb } = Glyph::BASE_BG else {
        return c;
    };
    let a = alpha.clamp(0.0, 1.0);
    let mix = |fg: u8, back: u8| (back as f32 + (fg as f32 - back as f32) * a).round() as u8;
    Color::Rgb { r: mix(r, br), g: mix(g, bg), b: mix(b, bb) }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Indicator {
    /// Viewport cell the arrow is drawn on.
    x: usize,
    y: usize,
    arrow: char,
    /// Rounded distance in cells.
    distance: u32,
}

/// Where to point when `target` lies outside the viewport.
fn exit_indicator(cam: &Camera, from: Cell, target: Cell) -> Option<Indicator> {
    if cam.view_w == 0 || cam.view_h == 0 || cam.contains(target) {
        return None;
    }
    let dx = target.x - from.x;
    let dy = target.y - from.y;
    let sx = if dx.abs() * 2 > dy.abs() { dx.signum() } else { 0 };
    let sy = if dy.abs() * 2 > dx.abs() { dy.signum() } else { 0 };
    let arrow = match (sx, sy) {
        (1, 0) => '→',
        (-1, 0) => '←',
        (0, -1) => '↑',
        (0, 1) => '↓',
        (1, -1) => '↗',
        (-1, -1) => '↖',
        (1, 1) => '↘',
        _ => '↙',
    };
    let x = (target.x - cam.x).clamp(0, cam.view_w as i32 - 1) as usize;
    let y = (target.y - cam.y).clamp(0, cam.view_h as i32 - 1) as usize;
    let distance = from.center().distance(target.center()).round() as u32;
    Some(Indicator { x, y, arrow, distance })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cam() -> Camera {
        Camera { x: 0, y: 0, view_w: 10, view_h: 6 }
    }

    #[test]
    fn no_indicator_when_exit_visible() {
        assert_eq!(exit_indicator(&cam(), Cell::new(1, 1), Cell::new(8, 5)), None);
    }

    #[test]
    fn indicator_clamped_to_edge() {
        let ind = exit_indicator(&cam(), Cell::new(2, 3), Cell::new(20, 3)).unwrap();
        assert_eq!((ind.x, ind.y, ind.arrow, ind.distance), (9, 3, '→', 18));

        let ind = exit_indicator(&cam(), Cell::new(2, 3), Cell::new(-6, -5)).unwrap();
        assert_eq!((ind.x, ind.y, ind.arrow), (0, 0, '↖'));
    }

    #[test]
    fn fade_blends_toward_background() {
        assert_eq!(fade(STAR, 1.0), STAR);
        assert_eq!(fade(STAR, 0.0), Glyph::BASE_BG);
        assert_eq!(fade(Color::White, 0.5), Color::White);
    }

    #[test]
    fn frame_buffer_diff_unit() {
        let mut fb = FrameBuffer::new(4, 2);
        fb.put_str(1, 1, "★ok!", Color::White, Color::Reset);
        assert_eq!(fb.get(1, 1).ch, '★');
        assert_eq!(fb.get(3, 1).ch, 'k');
        // Clipped at the right edge; reads outside are blank.
        assert!(fb.get(4, 1) == Glyph::BLANK);
        assert_eq!(fb.get(1, 1).bg, Glyph::BASE_BG);
    }
}
