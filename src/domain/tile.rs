/// Tile types and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.
///
/// Tiles describe the static terrain only. Collectibles, obstacles,
/// exits and patrol walls are entities layered on top (see `physics`).

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tile {
    #[default]
    Floor,
    Wall,  // Solid, part of the level geometry
    Void,  // Outside the playable map; solid, drawn as background
}

impl Tile {
    /// Does this tile block an actor from entering?
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Wall | Tile::Void)
    }

    /// Is this tile passable (an actor can occupy this cell)?
    pub fn is_passable(self) -> bool {
        !self.is_solid()
    }

    /// Map character for this tile, used by the level loader.
    pub fn from_char(ch: char) -> Tile {
        match ch {
            '#' => Tile::Wall,
            '~' => Tile::Void,
            _ => Tile::Floor,
        }
    }
}
