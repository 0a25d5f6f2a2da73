/// Geometry primitives shared by every layer.
///
/// Two coordinate kinds:
///   - `Cell`  — integer grid coordinates (what the rules reason about)
///   - `Vec2`  — continuous position (what the presentation interpolates)
///
/// Grid convention: x grows to the right, y grows downward (row index).
/// Cell (x, y) has its center at Vec2 (x, y).

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Cell { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Cell {
        Cell { x: self.x + dx, y: self.y + dy }
    }

    pub fn center(self) -> Vec2 {
        Vec2 { x: self.x as f32, y: self.y as f32 }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Linear interpolation; `t` is clamped to 0..=1.
    pub fn lerp(self, to: Vec2, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        Vec2 {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Nearest grid cell (round half away from zero).
    pub fn nearest_cell(self) -> Cell {
        Cell { x: self.x.round() as i32, y: self.y.round() as i32 }
    }
}

/// Axis-aligned rectangle in world space. Both edges are inclusive,
/// so a cell lying on the boundary belongs to the zone.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Bounds covering the cells `x..x+w` × `y..y+h`.
    pub fn from_cells(x: i32, y: i32, w: u32, h: u32) -> Self {
        let w = w.max(1) as f32;
        let h = h.max(1) as f32;
        Bounds {
            min: Vec2::new(x as f32 - 0.5, y as f32 - 0.5),
            max: Vec2::new(x as f32 - 0.5 + w, y as f32 - 0.5 + h),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// First and last cell covered (inclusive), for camera fitting.
    pub fn cell_span(&self) -> (Cell, Cell) {
        let lo = Cell::new((self.min.x + 0.5).ceil() as i32, (self.min.y + 0.5).ceil() as i32);
        let hi = Cell::new((self.max.x - 0.5).floor() as i32, (self.max.y - 0.5).floor() as i32);
        (lo, hi)
    }
}

/// Four-way direction of a single grid step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dir {
    Left,
    Right,
    Up,
    Down,
}

impl Dir {
    /// Cell delta in grid space (y down).
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
        }
    }

    pub fn reverse(self) -> Dir {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Option<Dir> {
        match (dx.signum(), dy.signum()) {
            (-1, 0) => Some(Dir::Left),
            (1, 0) => Some(Dir::Right),
            (0, -1) => Some(Dir::Up),
            (0, 1) => Some(Dir::Down),
            _ => None,
        }
    }
}
