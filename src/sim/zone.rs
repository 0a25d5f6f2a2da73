/// Zones: rectangular regions with their own budget, items and obstacles.
///
/// Zones are created once at level load and never destroyed during a
/// session. `locate` is a plain point-in-rectangle scan; the first zone
/// in configuration order wins, so overlapping zones are order-sensitive
/// (a warning is logged at load when any two overlap).

use log::{debug, warn};

use crate::domain::entity::{CollectibleItem, ExitPoint, ItemId, ObstacleGroup, ObstacleId, ZoneId};
use crate::domain::geom::{Bounds, Cell, Vec2};
use super::reveal::RevealRules;

#[derive(Clone, Debug)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub bounds: Bounds,
    /// Starting move budget; `None` = unlimited.
    pub budget: Option<u32>,
    /// Item membership in reveal order.
    pub items: Vec<ItemId>,
    pub obstacles: Vec<ObstacleId>,
    pub exit: Option<Cell>,
    /// Where the actor arrives when transitioning into this zone.
    pub start: Option<Cell>,
    pub reveal: RevealRules,
}

impl Zone {
    pub fn new(name: &str, bounds: Bounds, budget: Option<u32>, reveal: RevealRules) -> Self {
        Zone {
            id: ZoneId(0),
            name: name.to_string(),
            bounds,
            budget,
            items: Vec::new(),
            obstacles: Vec::new(),
            exit: None,
            start: None,
            reveal,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ZoneMap {
    zones: Vec<Zone>,
}

impl ZoneMap {
    /// Build from configuration order. Ids are assigned by position.
    pub fn new(mut zones: Vec<Zone>) -> Self {
        for (i, zone) in zones.iter_mut().enumerate() {
            zone.id = ZoneId(i);
        }
        for (i, a) in zones.iter().enumerate() {
            for b in &zones[i + 1..] {
                if overlaps(&a.bounds, &b.bounds) {
                    warn!("[Zone] '{}' overlaps '{}'; '{}' wins on shared cells", a.name, b.name, a.name);
                }
            }
        }
        ZoneMap { zones }
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.0)
    }

    /// First zone whose bounds contain `p`.
    pub fn locate(&self, p: Vec2) -> Option<ZoneId> {
        self.zones.iter().find(|z| z.bounds.contains(p)).map(|z| z.id)
    }

    /// Zone following `id` in configuration order.
    pub fn next_after(&self, id: ZoneId) -> Option<ZoneId> {
        self.get(ZoneId(id.0 + 1)).map(|z| z.id)
    }

    /// Distribute entities to zones by position.
    ///
    /// Items keep their slice order inside each zone, which is the reveal
    /// order. Obstacle groups are located by centroid, falling back to
    /// their first cell. Each zone takes the first exit found inside it.
    pub fn assign_members(
        &mut self,
        items: &mut [CollectibleItem],
        obstacles: &mut [ObstacleGroup],
        exits: &mut [ExitPoint],
    ) {
        for item in items.iter_mut() {
            item.zone = self.locate(item.position());
            if let Some(z) = item.zone {
                self.zones[z.0].items.push(item.id);
            }
        }
        for group in obstacles.iter_mut() {
            group.zone = self
                .locate(group.position)
                .or_else(|| group.cells.first().and_then(|c| self.locate(c.center())));
            if let Some(z) = group.zone {
                self.zones[z.0].obstacles.push(group.id);
            }
        }
        for exit in exits.iter_mut() {
            exit.zone = self.locate(exit.cell.center());
            if let Some(z) = exit.zone {
                let zone = &mut self.zones[z.0];
                if zone.exit.is_none() {
                    zone.exit = Some(exit.cell);
                } else {
                    warn!("[Zone] '{}' already has an exit; ignoring {:?}", zone.name, exit.cell);
                }
            }
        }
        for zone in &self.zones {
            debug!(
                "[Zone] {} '{}': {} items, {} obstacles, exit {:?}, budget {:?}",
                zone.id, zone.name, zone.items.len(), zone.obstacles.len(), zone.exit, zone.budget
            );
        }
    }

    /// Record a start cell for whichever zone contains it.
    pub fn assign_start(&mut self, cell: Cell) {
        if let Some(z) = self.locate(cell.center()) {
            self.zones[z.0].start = Some(cell);
        }
    }
}

fn overlaps(a: &Bounds, b: &Bounds) -> bool {
    // Touching edges are not an overlap; no cell center lies on them.
    a.min.x < b.max.x && b.min.x < a.max.x && a.min.y < b.max.y && b.min.y < a.max.y
}
