/// ZoneBudgetLedger: per-zone move budgets and the terminal game-over.
///
/// ## State machine
///
/// ```text
///   Active ──(a zone's budget reaches 0)──▶ GameOver   (terminal)
/// ```
///
/// Every completed turn re-locates the actor and costs one move in the
/// zone it stands in. Turns outside every zone, or inside a zone with an
/// unlimited budget, are free. Budgets are floored at zero and reaching
/// zero raises `GameOver` exactly once. After that every mutation is a
/// silent no-op.
///
/// Credits for no particular zone collect in a bonus pool, which is
/// handed to the next budgeted zone the actor enters.
///
/// A zone configured with a budget of zero is a configuration error: it
/// starts with one move instead, so zero is only ever reached by play.

use log::{debug, info, warn};

use crate::domain::entity::ZoneId;
use crate::domain::geom::Vec2;
use super::event::{GameEvent, GameOverReason};
use super::zone::ZoneMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LedgerState {
    Active,
    GameOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Budget {
    Unlimited,
    Remaining(u32),
}

#[derive(Clone, Debug)]
pub struct ZoneBudgetLedger {
    budgets: Vec<Budget>,
    bonus: u32,
    current: Option<ZoneId>,
    state: LedgerState,
}

impl ZoneBudgetLedger {
    pub fn new(zones: &ZoneMap) -> Self {
        let budgets = zones
            .iter()
            .map(|z| match z.budget {
                None => Budget::Unlimited,
                Some(0) => {
                    warn!("[Ledger] {} '{}' configured with a zero budget; using 1", z.id, z.name);
                    Budget::Remaining(1)
                }
                Some(n) => Budget::Remaining(n),
            })
            .collect();
        ZoneBudgetLedger { budgets, bonus: 0, current: None, state: LedgerState::Active }
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn is_game_over(&self) -> bool {
        self.state == LedgerState::GameOver
    }

    /// Zone the actor was last located in.
    pub fn current_zone(&self) -> Option<ZoneId> {
        self.current
    }

    /// Budget of `zone`; unknown zones read as unlimited.
    pub fn budget(&self, zone: ZoneId) -> Budget {
        self.budgets.get(zone.0).copied().unwrap_or(Budget::Unlimited)
    }

    /// Turns held in the global bonus pool.
    pub fn bonus(&self) -> u32 {
        self.bonus
    }

    /// Point-in-rectangle lookup; first configured zone wins.
    pub fn locate(&self, zones: &ZoneMap, position: Vec2) -> Option<ZoneId> {
        zones.locate(position)
    }

    /// Track the actor's zone. Emits `ZoneEntered` on change and pays out
    /// the bonus pool into a budgeted zone being entered.
    pub fn track(&mut self, zones: &ZoneMap, position: Vec2, events: &mut Vec<GameEvent>) -> Option<ZoneId> {
        let zone = self.locate(zones, position);
        if zone == self.current || self.is_game_over() {
            return zone;
        }
        self.current = zone;
        events.push(GameEvent::ZoneEntered { zone });
        debug!("[Ledger] entered {:?}", zone);

        if let Some(z) = zone {
            if self.bonus > 0 && matches!(self.budget(z), Budget::Remaining(_)) {
                let amount = std::mem::take(&mut self.bonus);
                self.credit(Some(z), amount, events);
            }
        }
        zone
    }

    /// Charge one turn to the zone containing `position`.
    pub fn on_turn_completed(&mut self, zones: &ZoneMap, position: Vec2, events: &mut Vec<GameEvent>) {
        if self.is_game_over() {
            return;
        }
        let Some(zone) = self.track(zones, position, events) else {
            return;
        };
        let Some(Budget::Remaining(left)) = self.budgets.get_mut(zone.0) else {
            return;
        };

        *left = left.saturating_sub(1);
        debug!("[Ledger] {} budget -> {}", zone, left);
        if *left == 0 {
            self.state = LedgerState::GameOver;
            info!("[Ledger] {} exhausted: game over", zone);
            events.push(GameEvent::GameOver { reason: GameOverReason::ZoneExhausted(zone) });
        }
    }

    /// Add turns to `zone`, or to the bonus pool when `zone` is `None`.
    /// Returns true if anything was credited.
    pub fn credit(&mut self, zone: Option<ZoneId>, amount: u32, events: &mut Vec<GameEvent>) -> bool {
        if self.is_game_over() || amount == 0 {
            return false;
        }
        match zone {
            None => {
                self.bonus = self.bonus.saturating_add(amount);
                debug!("[Ledger] +{} to bonus pool ({})", amount, self.bonus);
            }
            Some(z) => match self.budgets.get_mut(z.0) {
                Some(Budget::Remaining(left)) => {
                    *left = left.saturating_add(amount);
                    debug!("[Ledger] +{} to {} ({})", amount, z, left);
                }
                Some(Budget::Unlimited) => {
                    debug!("[Ledger] {} has no budget; credit of {} ignored", z, amount);
                    return false;
                }
                None => return false,
            },
        }
        events.push(GameEvent::TurnsCredited { zone, amount });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geom::Bounds;
    use crate::sim::reveal::RevealRules;
    use crate::sim::zone::Zone;
    use proptest::prelude::*;

    fn zones(budgets: &[Option<u32>]) -> ZoneMap {
        ZoneMap::new(
            budgets
                .iter()
                .enumerate()
                .map(|(i, b)| Zone::new("z", Bounds::from_cells(i as i32 * 10, 0, 10, 10), *b, RevealRules::default()))
                .collect(),
        )
    }

    fn in_zone(i: usize) -> Vec2 {
        Vec2::new(i as f32 * 10.0 + 2.0, 2.0)
    }

    fn game_overs(events: &[GameEvent]) -> usize {
        events.iter().filter(|e| matches!(e, GameEvent::GameOver { .. })).count()
    }

    #[test]
    fn turns_decrement_current_zone() {
        let map = zones(&[Some(3), Some(5)]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        ledger.on_turn_completed(&map, in_zone(1), &mut ev);
        assert_eq!(ledger.budget(ZoneId(1)), Budget::Remaining(4));
        assert_eq!(ledger.budget(ZoneId(0)), Budget::Remaining(3));
        assert_eq!(ev[0], GameEvent::ZoneEntered { zone: Some(ZoneId(1)) });
    }

    #[test]
    fn zero_configured_budget_starts_at_one() {
        let map = zones(&[Some(5), Some(0)]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        assert_eq!(ledger.budget(ZoneId(1)), Budget::Remaining(1));

        let mut ev = vec![];
        for _ in 0..3 {
            ledger.on_turn_completed(&map, in_zone(0), &mut ev);
        }
        assert!(!ledger.is_game_over());
        assert_eq!(game_overs(&ev), 0);

        ledger.on_turn_completed(&map, in_zone(1), &mut ev);
        assert_eq!(ledger.budget(ZoneId(1)), Budget::Remaining(0));
        assert!(ledger.is_game_over());
        assert_eq!(game_overs(&ev), 1);
    }

    #[test]
    fn outside_zones_is_free() {
        let map = zones(&[Some(1)]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        for _ in 0..10 {
            ledger.on_turn_completed(&map, Vec2::new(-50.0, 0.0), &mut ev);
        }
        assert_eq!(ledger.budget(ZoneId(0)), Budget::Remaining(1));
        assert!(!ledger.is_game_over());
    }

    #[test]
    fn unlimited_zone_never_ends() {
        let map = zones(&[None]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        for _ in 0..100 {
            ledger.on_turn_completed(&map, in_zone(0), &mut ev);
        }
        assert_eq!(ledger.budget(ZoneId(0)), Budget::Unlimited);
        assert_eq!(game_overs(&ev), 0);
    }

    #[test]
    fn exhaustion_is_terminal_and_fires_once() {
        let map = zones(&[Some(2)]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        for _ in 0..5 {
            ledger.on_turn_completed(&map, in_zone(0), &mut ev);
        }
        assert_eq!(ledger.budget(ZoneId(0)), Budget::Remaining(0));
        assert_eq!(game_overs(&ev), 1);
        assert!(ev.contains(&GameEvent::GameOver { reason: GameOverReason::ZoneExhausted(ZoneId(0)) }));

        // Credits after game over are ignored
        assert!(!ledger.credit(Some(ZoneId(0)), 5, &mut ev));
        assert_eq!(ledger.budget(ZoneId(0)), Budget::Remaining(0));
    }

    #[test]
    fn credit_zone_and_pool() {
        let map = zones(&[Some(2), Some(2), None]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        assert!(ledger.credit(Some(ZoneId(0)), 3, &mut ev));
        assert_eq!(ledger.budget(ZoneId(0)), Budget::Remaining(5));
        assert!(!ledger.credit(Some(ZoneId(2)), 3, &mut ev));
        assert!(!ledger.credit(Some(ZoneId(9)), 3, &mut ev));

        assert!(ledger.credit(None, 4, &mut ev));
        assert_eq!(ledger.bonus(), 4);
        assert_eq!(ev.last(), Some(&GameEvent::TurnsCredited { zone: None, amount: 4 }));
    }

    #[test]
    fn bonus_pool_pays_into_next_budgeted_zone() {
        let map = zones(&[None, Some(2)]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        ledger.credit(None, 3, &mut ev);
        // Unlimited zone keeps the pool
        ledger.track(&map, in_zone(0), &mut ev);
        assert_eq!(ledger.bonus(), 3);
        ledger.track(&map, in_zone(1), &mut ev);
        assert_eq!(ledger.bonus(), 0);
        assert_eq!(ledger.budget(ZoneId(1)), Budget::Remaining(5));
    }

    #[test]
    fn zone_entered_only_on_change() {
        let map = zones(&[Some(50)]);
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        for _ in 0..3 {
            ledger.on_turn_completed(&map, in_zone(0), &mut ev);
        }
        ledger.on_turn_completed(&map, Vec2::new(-5.0, 0.0), &mut ev);
        let entered: Vec<_> = ev.iter().filter(|e| matches!(e, GameEvent::ZoneEntered { .. })).collect();
        assert_eq!(entered.len(), 2);
    }

    #[test]
    fn no_zones_means_unlimited() {
        let map = ZoneMap::default();
        let mut ledger = ZoneBudgetLedger::new(&map);
        let mut ev = vec![];
        ledger.on_turn_completed(&map, Vec2::new(0.0, 0.0), &mut ev);
        assert!(!ledger.is_game_over());
        assert!(ev.is_empty());
    }

    proptest! {
        #[test]
        fn budget_floor_and_single_game_over(
            start in 0u32..8,
            ops in prop::collection::vec((0u8..3, 0u32..4), 0..80)
        ) {
            let map = zones(&[Some(start)]);
            let mut ledger = ZoneBudgetLedger::new(&map);
            let mut ev = vec![];
            for (op, amount) in ops {
                match op {
                    0 | 1 => ledger.on_turn_completed(&map, in_zone(0), &mut ev),
                    _ => { ledger.credit(Some(ZoneId(0)), amount, &mut ev); }
                }
                let Budget::Remaining(left) = ledger.budget(ZoneId(0)) else {
                    return Err(TestCaseError::fail("budget became unlimited"));
                };
                prop_assert_eq!(left == 0, ledger.is_game_over());
                prop_assert_eq!(game_overs(&ev), usize::from(left == 0));
            }
        }
    }
}
