/// ObstacleUnlockResolver: each collected key removes one obstacle.
///
/// The key's zone is found by point lookup at the key's position, falling
/// back to the actor's tracked zone when the key lies outside every zone.
/// Within that zone the nearest still-active obstacle group (Euclidean
/// distance from the key to the group's centroid; ties go to the earlier
/// group) is deactivated and dropped from the zone's active list.
/// No active obstacle left is a no-op.
///
/// Obstacles outside every zone form their own bucket, used by keys that
/// resolve to no zone.

use log::{debug, info};

use crate::domain::entity::{ObstacleGroup, ObstacleId, ZoneId};
use crate::domain::geom::Vec2;
use super::event::GameEvent;
use super::zone::ZoneMap;

pub struct ObstacleUnlockResolver {
    /// Still-active obstacles per zone, indexed by zone id.
    zoned: Vec<Vec<ObstacleId>>,
    unzoned: Vec<ObstacleId>,
    fade: f32,
}

impl ObstacleUnlockResolver {
    /// Seed the active lists from each zone's obstacle membership.
    /// Groups that belong to no zone go to the unzoned bucket.
    pub fn new(zones: &ZoneMap, obstacles: &[ObstacleGroup], fade: f32) -> Self {
        let is_active = |id: &&ObstacleId| obstacles.get(id.0).is_some_and(|g| g.active);
        let zoned: Vec<Vec<ObstacleId>> = zones
            .iter()
            .map(|z| z.obstacles.iter().filter(is_active).copied().collect())
            .collect();
        let unzoned: Vec<ObstacleId> = obstacles
            .iter()
            .filter(|g| g.active && g.zone.is_none())
            .map(|g| g.id)
            .collect();
        ObstacleUnlockResolver { zoned, unzoned, fade }
    }

    /// Active obstacles still registered to `zone`.
    pub fn remaining(&self, zone: Option<ZoneId>) -> usize {
        self.bucket(zone).map_or(0, |b| b.len())
    }

    /// Remove the obstacle nearest to a key collected at `key_pos`.
    pub fn on_key_collected(
        &mut self,
        zones: &ZoneMap,
        key_pos: Vec2,
        actor_zone: Option<ZoneId>,
        obstacles: &mut [ObstacleGroup],
        events: &mut Vec<GameEvent>,
    ) -> Option<ObstacleId> {
        let zone = zones.locate(key_pos).or(actor_zone);
        let fade = self.fade;
        let bucket = self.bucket_mut(zone)?;

        let mut best: Option<(usize, f32)> = None;
        for (i, id) in bucket.iter().enumerate() {
            let Some(group) = obstacles.get(id.0).filter(|g| g.active) else {
                continue;
            };
            let d = key_pos.distance(group.position);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }

        let Some((i, d)) = best else {
            debug!("[Unlock] key in {:?}: no active obstacle left", zone);
            return None;
        };
        let id = bucket.remove(i);
        if let Some(group) = obstacles.get_mut(id.0) {
            group.deactivate(fade);
        }
        info!("[Unlock] key in {:?} removed {} at distance {:.2}", zone, id, d);
        events.push(GameEvent::ObstacleUnlocked { obstacle: id });
        Some(id)
    }

    fn bucket(&self, zone: Option<ZoneId>) -> Option<&Vec<ObstacleId>> {
        match zone {
            Some(z) => self.zoned.get(z.0),
            None => Some(&self.unzoned),
        }
    }

    fn bucket_mut(&mut self, zone: Option<ZoneId>) -> Option<&mut Vec<ObstacleId>> {
        match zone {
            Some(z) => self.zoned.get_mut(z.0),
            None => Some(&mut self.unzoned),
        }
    }
}
