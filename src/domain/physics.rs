/// Occupancy layer — single source of truth for "can the actor enter this cell?".
///
/// ## Architecture
///
/// Two distinct concepts:
///   1. TERRAIN  — what the cell IS (static tile: floor / wall / void)
///   2. BLOCKERS — what currently stands IN the cell (active obstacle
///      groups, closed exits, patrol walls)
///
/// Blocked = terrain solid || blocker present. Out of bounds is solid.
///
/// ## Blocker Grid (O(1) lookup)
///
/// Blockers are tracked in a boolean grid (`blockers[y][x]`) rather than
/// scanned from entity lists on every query. The grid must be rebuilt
/// whenever an obstacle is unlocked, an exit opens or a patrol moves.

use super::entity::{ExitPoint, ObstacleGroup};
use super::geom::Cell;
use super::patrol::PatrolWall;
use super::tile::Tile;

/// External collision predicate consumed by the motion controller.
pub trait Occupancy {
    fn is_blocked(&self, cell: Cell) -> bool;
}

impl<F: Fn(Cell) -> bool> Occupancy for F {
    fn is_blocked(&self, cell: Cell) -> bool {
        self(cell)
    }
}

/// Query the static tile at `cell`. Out-of-bounds reads as `Void`.
#[inline]
pub fn terrain_at(tiles: &[Vec<Tile>], width: usize, height: usize, cell: Cell) -> Tile {
    if cell.x < 0 || cell.y < 0 || cell.x as usize >= width || cell.y as usize >= height {
        return Tile::Void;
    }
    tiles[cell.y as usize][cell.x as usize]
}

/// Build the blocker grid from the current entity state.
pub fn build_blocker_grid(
    width: usize,
    height: usize,
    obstacles: &[ObstacleGroup],
    exits: &[ExitPoint],
    patrols: &[PatrolWall],
) -> Vec<Vec<bool>> {
    let mut grid = vec![vec![false; width]; height];
    let mut mark = |cell: Cell| {
        if cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < width && (cell.y as usize) < height {
            grid[cell.y as usize][cell.x as usize] = true;
        }
    };
    for group in obstacles.iter().filter(|g| g.active) {
        for &cell in &group.cells {
            mark(cell);
        }
    }
    for exit in exits.iter().filter(|e| !e.open) {
        mark(exit.cell);
    }
    for patrol in patrols {
        mark(patrol.cell);
    }
    grid
}

/// Borrowed view combining terrain and blockers.
pub struct OccupancyView<'a> {
    pub tiles: &'a [Vec<Tile>],
    pub width: usize,
    pub height: usize,
    pub blockers: &'a [Vec<bool>],
}

impl<'a> OccupancyView<'a> {
    pub fn has_blocker(&self, cell: Cell) -> bool {
        if cell.x < 0 || cell.y < 0 {
            return false;
        }
        let (x, y) = (cell.x as usize, cell.y as usize);
        y < self.blockers.len() && x < self.blockers[y].len() && self.blockers[y][x]
    }
}

impl<'a> Occupancy for OccupancyView<'a> {
    #[inline]
    fn is_blocked(&self, cell: Cell) -> bool {
        terrain_at(self.tiles, self.width, self.height, cell).is_solid() || self.has_blocker(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::ObstacleId;
    use crate::domain::geom::Dir;

    fn tiles_from(rows: &[&str]) -> (Vec<Vec<Tile>>, usize, usize) {
        let height = rows.len();
        let width = rows[0].len();
        let tiles = rows
            .iter()
            .map(|r| r.chars().map(Tile::from_char).collect())
            .collect();
        (tiles, width, height)
    }

    #[test]
    fn terrain_out_of_bounds_is_void() {
        let (t, w, h) = tiles_from(&["..", ".."]);
        assert_eq!(terrain_at(&t, w, h, Cell::new(-1, 0)), Tile::Void);
        assert_eq!(terrain_at(&t, w, h, Cell::new(2, 0)), Tile::Void);
        assert_eq!(terrain_at(&t, w, h, Cell::new(1, 1)), Tile::Floor);
    }

    #[test]
    fn walls_and_blockers_block() {
        let (t, w, h) = tiles_from(&[
            "....",
            ".#..",
        ]);
        let mut obstacle = ObstacleGroup::new(ObstacleId(0), vec![Cell::new(3, 0)]);
        let exit = ExitPoint::new(Cell::new(0, 1));
        let patrol = PatrolWall::new(Cell::new(2, 1), Dir::Right, 1);

        let grid = build_blocker_grid(w, h, std::slice::from_ref(&obstacle), std::slice::from_ref(&exit), std::slice::from_ref(&patrol));
        let view = OccupancyView { tiles: &t, width: w, height: h, blockers: &grid };
        assert!(view.is_blocked(Cell::new(1, 1)));  // wall
        assert!(view.is_blocked(Cell::new(3, 0)));  // obstacle
        assert!(view.is_blocked(Cell::new(0, 1)));  // closed exit
        assert!(view.is_blocked(Cell::new(2, 1)));  // patrol wall
        assert!(!view.is_blocked(Cell::new(0, 0)));
        assert!(view.is_blocked(Cell::new(4, 0)));  // off map

        obstacle.deactivate(0.1);
        let grid = build_blocker_grid(w, h, std::slice::from_ref(&obstacle), &[], &[]);
        let view = OccupancyView { tiles: &t, width: w, height: h, blockers: &grid };
        assert!(!view.is_blocked(Cell::new(3, 0)));
        assert!(!view.is_blocked(Cell::new(0, 1)));
    }

    #[test]
    fn closures_are_occupancy() {
        let wall = Cell::new(1, 0);
        let occ = move |c: Cell| c == wall;
        assert!(occ.is_blocked(Cell::new(1, 0)));
        assert!(!occ.is_blocked(Cell::new(0, 0)));
    }
}
