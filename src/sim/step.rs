/// Simulation step: one frame of game logic.
///
/// ## Processing order (per tick):
///   1. Advance cosmetic fades, patrol slides and the message timer
///   2. Motion controller update (may resolve a turn)
///   3. Zone entry, as soon as the actor's nearest cell crosses into a
///      new zone (before anything is picked up there)
///   4. Pickup under the actor's interpolated position
///      → slot rules, reveal gate, unlock resolver
///   5. On a resolved turn: ledger charge, patrol walls
///   6. Game over check
///   7. Exit check (idle on the open exit of the current zone)
///
/// Services never call each other. Each one pushes events; this module
/// hands them to the next service in order and returns everything that
/// happened to the caller (sound, HUD).

use log::{debug, info};

use crate::domain::geom::Cell;
use crate::domain::motion::TurnResolved;
use crate::domain::physics::{Occupancy, OccupancyView};
use crate::domain::rules::AxisInput;
use super::event::GameEvent;
use super::slots::{self, SlotEffect};
use super::world::{Phase, WorldState, ZoneTransition};

/// Advance the session by `dt` seconds. Returns the events of this tick.
pub fn step(world: &mut WorldState, input: AxisInput, dt: f32) -> Vec<GameEvent> {
    let mut events = vec![];
    let dt = dt.max(0.0);

    match world.phase {
        Phase::Playing if !world.paused => {}
        Phase::ZoneTransition => {
            tick_ambient(world, dt);
            advance_transition(world, dt, &mut events);
            return events;
        }
        Phase::GameOver | Phase::LevelComplete => {
            tick_ambient(world, dt);
            return events;
        }
        _ => {
            // Menus and pause only need the clock for blinking prompts.
            world.clock += dt;
            return events;
        }
    }

    tick_ambient(world, dt);

    let turn = update_motion(world, input, dt);
    track_zone(world, &mut events);
    resolve_pickup(world, &mut events);
    if let Some(turn) = turn {
        resolve_turn(world, turn, &mut events);
    }

    if world.services.ledger.is_game_over() && world.phase == Phase::Playing {
        enter_game_over(world, &events);
    }
    if world.phase == Phase::Playing {
        check_exit(world, &mut events);
    }

    world.follow_actor();
    events
}

// ══════════════════════════════════════════════════════════════
// Motion
// ══════════════════════════════════════════════════════════════

fn tick_ambient(world: &mut WorldState, dt: f32) {
    world.clock += dt;
    world.tick_message(dt);
    world.tick_visuals(dt);
}

fn update_motion(world: &mut WorldState, input: AxisInput, dt: f32) -> Option<TurnResolved> {
    let occ = OccupancyView {
        tiles: &world.tiles,
        width: world.width,
        height: world.height,
        blockers: &world.blockers,
    };
    world.motion.update(input, dt, &occ)
}

/// Follow the actor's nearest cell into a new zone. The turn charge later
/// re-locates the same zone and so emits no second entry.
fn track_zone(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let here = world.motion.position().nearest_cell();
    let mut entered = vec![];
    world.services.ledger.track(&world.zones, here.center(), &mut entered);
    route_zone_entries(world, entered, events);
}

// ══════════════════════════════════════════════════════════════
// Pickups
// ══════════════════════════════════════════════════════════════

/// Collect the item under the actor, if any. Runs every tick so items are
/// picked up mid-move, as the actor passes over them.
fn resolve_pickup(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let here = world.motion.position().nearest_cell();
    let Some(idx) = world.items.iter().position(|i| i.cell == here && i.is_pickable()) else {
        return;
    };
    if !world.items[idx].collect(world.timing.item_fade) {
        return;
    }
    let item = world.items[idx].clone();
    debug!("[Step] collected {} '{}' at {:?}", item.id, item.name, item.cell);
    events.push(GameEvent::ItemCollected { item: item.id, cell: item.cell });

    let hit = world.services.slots.fire(&item);
    if let Some(hit) = &hit {
        if let SlotEffect::ExtraTurns(amount) = hit.effect {
            world.services.ledger.credit(item.zone, amount, events);
        }
        if let Some(msg) = &hit.message {
            world.set_message(msg, 1.5);
        }
    }

    world.services.reveal.on_item_collected(&item, &mut world.items, &mut world.exits, events);

    if slots::is_key(&item, hit.as_ref()) {
        let actor_zone = world.services.ledger.current_zone();
        world.services.unlock.on_key_collected(
            &world.zones,
            item.position(),
            actor_zone,
            &mut world.obstacles,
            events,
        );
    }

    world.rebuild_blockers();
}

// ══════════════════════════════════════════════════════════════
// Turn resolution
// ══════════════════════════════════════════════════════════════

fn resolve_turn(world: &mut WorldState, turn: TurnResolved, events: &mut Vec<GameEvent>) {
    world.turns += 1;
    events.push(GameEvent::TurnCompleted { kind: turn.kind, dir: turn.dir, cell: world.motion.cell() });

    let mut ledger_events = vec![];
    world.services.ledger.on_turn_completed(&world.zones, world.motion.position(), &mut ledger_events);
    route_zone_entries(world, ledger_events, events);

    if !world.services.ledger.is_game_over() {
        move_patrols(world, events);
    }
}

/// Pass ledger events on in order. Each `ZoneEntered` goes to the reveal
/// gate right away, so whatever a reset does follows the entry.
fn route_zone_entries(world: &mut WorldState, source: Vec<GameEvent>, events: &mut Vec<GameEvent>) {
    let mut entered = false;
    for ev in source {
        let zone = match &ev {
            GameEvent::ZoneEntered { zone } => Some(*zone),
            _ => None,
        };
        events.push(ev);
        let Some(zone) = zone else {
            continue;
        };
        entered = true;
        world.services.reveal.on_zone_entered(zone, &mut world.items, &mut world.exits, events);
        if let Some(z) = zone.and_then(|z| world.zones.get(z)) {
            let name = z.name.clone();
            world.set_message(&name, 1.5);
        }
    }
    if entered {
        world.rebuild_blockers();
    }
}

fn move_patrols(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let actor = world.motion.cell();
    let slide = world.timing.motion.move_duration;
    for i in 0..world.patrols.len() {
        let moved = {
            let occ = OccupancyView {
                tiles: &world.tiles,
                width: world.width,
                height: world.height,
                blockers: &world.blockers,
            };
            world.patrols[i].on_turn(|c: Cell| c == actor || occ.is_blocked(c), slide)
        };
        if moved {
            let cell = world.patrols[i].cell;
            events.push(GameEvent::PatrolMoved { cell });
            world.rebuild_blockers();
        }
    }
}

fn enter_game_over(world: &mut WorldState, events: &[GameEvent]) {
    world.game_over_reason = events.iter().find_map(|e| match e {
        GameEvent::GameOver { reason } => Some(*reason),
        _ => None,
    });
    world.motion.cancel();
    world.phase = Phase::GameOver;
    world.set_message("Out of turns", 0.0);
    info!("[Step] game over after {} turns ({:?})", world.turns, world.game_over_reason);
}

// ══════════════════════════════════════════════════════════════
// Exits and zone transitions
// ══════════════════════════════════════════════════════════════

fn check_exit(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if !world.motion.is_idle() {
        return;
    }
    let zone = world.actor_zone();
    let Some(exit) = world.exit_of(zone) else {
        return;
    };
    if !exit.open || exit.cell != world.motion.cell() {
        return;
    }
    let from = exit.zone;
    let to = from.and_then(|z| world.zones.next_after(z));
    events.push(GameEvent::ExitReached { zone: from });
    info!("[Step] exit of {:?} reached; next {:?}", from, to);

    world.transition = Some(ZoneTransition { from, to, remaining: world.timing.transition_delay });
    world.phase = Phase::ZoneTransition;
    world.set_message(if to.is_some() { "Zone clear!" } else { "Level clear!" }, world.timing.transition_delay);
}

fn advance_transition(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let Some(t) = world.transition.as_mut() else {
        world.phase = Phase::Playing;
        return;
    };
    t.remaining -= dt;
    if t.remaining > 0.0 {
        return;
    }
    let t = *t;
    world.transition = None;

    let Some(next) = t.to else {
        events.push(GameEvent::LevelCleared);
        world.phase = Phase::LevelComplete;
        info!("[Step] '{}' cleared in {} turns", world.level_name, world.turns);
        return;
    };

    let arrival = world.arrival_cell(next);
    world.motion.teleport(arrival);
    let mut ledger_events = vec![];
    world.services.ledger.track(&world.zones, arrival.center(), &mut ledger_events);
    route_zone_entries(world, ledger_events, events);
    world.phase = Phase::Playing;
    world.center_camera();
}

/// Toggle pause while playing.
pub fn toggle_pause(world: &mut WorldState) {
    if world.phase == Phase::Playing {
        world.paused = !world.paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::entity::{ItemId, ObstacleId, ZoneId};
    use crate::domain::geom::Dir;
    use crate::domain::rules::MoveKind;
    use crate::sim::event::GameOverReason;
    use crate::sim::ledger::Budget;
    use crate::sim::level::{load_level, parse_level};

    const DT: f32 = 0.05;

    fn world(text: &str) -> WorldState {
        let config = GameConfig::default();
        let def = parse_level(text).unwrap();
        let mut w = WorldState::new(&config);
        load_level(&mut w, &[def], 0, &config);
        w
    }

    /// Press `input` until one turn resolves, then release.
    fn press(w: &mut WorldState, input: AxisInput) -> Vec<GameEvent> {
        let mut all = vec![];
        for _ in 0..40 {
            let ev = step(w, input, DT);
            let done = ev.iter().any(|e| matches!(e, GameEvent::TurnCompleted { .. }));
            all.extend(ev);
            if done {
                break;
            }
        }
        all.extend(step(w, AxisInput::ZERO, DT));
        all
    }

    fn right() -> AxisInput {
        AxisInput::new(1.0, 0.0)
    }

    fn count<F: Fn(&GameEvent) -> bool>(events: &[GameEvent], f: F) -> usize {
        events.iter().filter(|e| f(e)).count()
    }

    #[test]
    fn move_and_bump_both_count_as_turns() {
        let mut w = world("# T\n@zone name=A x=0 y=0 w=5 h=3 budget=9\n#####\n#P  #\n#####\n");
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::TurnCompleted { kind: MoveKind::Move, dir: Dir::Right, cell: Cell::new(2, 1) }));
        let ev = press(&mut w, AxisInput::new(0.0, -1.0));
        assert_eq!(count(&ev, |e| matches!(e, GameEvent::TurnCompleted { kind: MoveKind::Bump, .. })), 1);
        assert_eq!(w.services.ledger.budget(ZoneId(0)), Budget::Remaining(7));
        assert_eq!(w.turns, 2);
    }

    #[test]
    fn holding_a_key_moves_once() {
        let mut w = world("# T\n#######\n#P    #\n#######\n");
        let mut turns = 0;
        for _ in 0..60 {
            let ev = step(&mut w, right(), DT);
            turns += count(&ev, |e| matches!(e, GameEvent::TurnCompleted { .. }));
        }
        assert_eq!(turns, 1);
        assert_eq!(w.motion.cell(), Cell::new(2, 1));
    }

    #[test]
    fn budget_exhaustion_ends_the_run() {
        let mut w = world("# T\n@zone name=A x=0 y=0 w=6 h=3 budget=2\n######\n#P   #\n######\n");
        press(&mut w, right());
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::GameOver { reason: GameOverReason::ZoneExhausted(ZoneId(0)) }));
        assert_eq!(w.phase, Phase::GameOver);
        assert_eq!(w.game_over_reason, Some(GameOverReason::ZoneExhausted(ZoneId(0))));

        // Input is ignored from now on.
        let ev = press(&mut w, right());
        assert!(ev.is_empty());
        assert_eq!(w.motion.cell(), Cell::new(3, 1));
    }

    #[test]
    fn pickup_reveals_next_batch_and_opens_exit() {
        // Global group, defaults: 1 visible, batches of 2.
        let mut w = world("# T\n#######\n#P***E#\n#######\n");
        assert!(w.items[0].interactable);
        assert!(!w.items[1].interactable);

        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::ItemCollected { item: ItemId(0), cell: Cell::new(2, 1) }));
        assert!(ev.contains(&GameEvent::BatchRevealed { zone: None, items: vec![ItemId(1), ItemId(2)] }));
        press(&mut w, right());
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::ZoneExitOpened { zone: None }));
        assert!(w.exits[0].open);
    }

    #[test]
    fn hidden_items_are_not_picked_up() {
        let w = world("# T\n@zone name=A x=0 y=0 w=6 h=3 reveal=0,1\n######\n#P*  #\n######\n");
        // A zero initial set still reveals the first batch at once.
        assert!(w.items[0].interactable);

        // Row-major: (5,1) is item 0 and visible, (2,2) waits for it.
        let mut w = world("# T\n@zone name=A x=0 y=0 w=7 h=4 reveal=1,1\n#######\n#P   *#\n# *   #\n#######\n");
        assert!(!w.items[1].interactable);
        press(&mut w, AxisInput::new(0.0, -1.0));
        let ev = press(&mut w, right());
        assert_eq!(w.motion.cell(), Cell::new(2, 2));
        assert!(!w.items[1].collected);
        assert_eq!(count(&ev, |e| matches!(e, GameEvent::ItemCollected { .. })), 0);
    }

    #[test]
    fn key_removes_nearest_obstacle() {
        let mut w = world("# T\n########\n#Pk X X#\n########\n");
        assert_eq!(w.obstacles.len(), 2);
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::ObstacleUnlocked { obstacle: ObstacleId(0) }));
        assert!(!w.obstacles[0].active);
        assert!(w.obstacles[1].active);
        // The unlocked cell is walkable now.
        press(&mut w, right());
        press(&mut w, right());
        assert_eq!(w.motion.cell(), Cell::new(4, 1));
    }

    #[test]
    fn hourglass_credits_zone() {
        let mut w = world(
            "# T\n@zone name=A x=0 y=0 w=5 h=3 budget=5\n@slot tag=bonus turns=4 msg=Bonus\n#####\n#P+ #\n#####\n",
        );
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::TurnsCredited { zone: Some(ZoneId(0)), amount: 4 }));
        // 5 + 4 - 1
        assert_eq!(w.services.ledger.budget(ZoneId(0)), Budget::Remaining(8));
        assert_eq!(w.message, "Bonus");
    }

    #[test]
    fn patrol_walls_move_each_turn_and_block() {
        let mut w = world("# T\n@patrol x=3 y=2 dir=up dist=1\n#######\n#P    #\n#  ^  #\n#######\n");
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::PatrolMoved { cell: Cell::new(3, 1) }));
        // The wall now stands right of the actor.
        let ev = press(&mut w, right());
        assert!(ev.iter().any(|e| matches!(e, GameEvent::TurnCompleted { kind: MoveKind::Bump, .. })));
        assert_eq!(w.motion.cell(), Cell::new(2, 1));
        // ...and steps back on the same turn.
        assert!(ev.contains(&GameEvent::PatrolMoved { cell: Cell::new(3, 2) }));
    }

    #[test]
    fn patrol_never_enters_actor_cell() {
        let mut w = world("# T\n@patrol x=2 y=2 dir=up dist=1\n######\n#P   #\n#    #\n######\n");
        // Actor moves onto (2,1), the wall's target: it must hold.
        let ev = press(&mut w, right());
        assert_eq!(count(&ev, |e| matches!(e, GameEvent::PatrolMoved { .. })), 0);
        assert_eq!(w.patrols[0].cell, Cell::new(2, 2));
    }

    #[test]
    fn exit_transitions_to_next_zone() {
        let text = "# T\n\
            @zone name=West x=0 y=0 w=4 h=3\n\
            @zone name=East x=4 y=0 w=5 h=3\n\
            #########\n\
            #P E#S  E\n\
            #########\n";
        let mut w = world(text);
        // West has no items: its exit is open from the start.
        assert!(w.exits[0].open);
        press(&mut w, right());
        let ev = press(&mut w, right());
        assert!(ev.contains(&GameEvent::ExitReached { zone: Some(ZoneId(0)) }));
        assert_eq!(w.phase, Phase::ZoneTransition);

        let mut ev = vec![];
        for _ in 0..40 {
            ev.extend(step(&mut w, AxisInput::ZERO, DT));
        }
        assert_eq!(w.phase, Phase::Playing);
        assert_eq!(w.motion.cell(), Cell::new(5, 1));
        assert!(ev.contains(&GameEvent::ZoneEntered { zone: Some(ZoneId(1)) }));
        assert_eq!(w.actor_zone(), Some(ZoneId(1)));
    }

    fn index_of(events: &[GameEvent], target: &GameEvent) -> usize {
        events.iter().position(|e| e == target).unwrap_or(usize::MAX)
    }

    #[test]
    fn first_entry_pickup_keeps_its_reveal() {
        let text = "# T\n\
            @zone name=West x=0 y=0 w=4 h=3\n\
            @zone name=East x=4 y=0 w=6 h=3 reset=1\n\
            ##########\n\
            #P  ***  #\n\
            ##########\n";
        let mut w = world(text);
        press(&mut w, right());
        press(&mut w, right());
        let ev = press(&mut w, right());

        let entered = GameEvent::ZoneEntered { zone: Some(ZoneId(1)) };
        let picked = GameEvent::ItemCollected { item: ItemId(0), cell: Cell::new(4, 1) };
        assert!(index_of(&ev, &entered) < index_of(&ev, &picked));
        assert_eq!(count(&ev, |e| matches!(e, GameEvent::ItemHidden { .. })), 0);
        assert!(w.items[1].is_pickable());
        assert!(w.items[2].is_pickable());
        let progress = w.services.reveal.progress(Some(ZoneId(1))).unwrap();
        assert_eq!((progress.collected, progress.total), (1, 3));

        // Stepping out and back in restarts East over its pending items,
        // and the restart follows the entry that caused it.
        press(&mut w, AxisInput::new(-1.0, 0.0));
        let ev = press(&mut w, right());
        let hidden = GameEvent::ItemHidden { item: ItemId(2) };
        assert!(index_of(&ev, &entered) < index_of(&ev, &hidden));
        assert!(w.items[1].is_pickable());
        assert!(!w.items[2].is_pickable());
    }

    #[test]
    fn batch_hiding_finds_nothing_left_in_play() {
        let mut w = world(
            "# T\n@zone name=A x=0 y=0 w=9 h=3 reveal=1,2 hide=1 hideprev=1\n#########\n#P*****E#\n#########\n",
        );
        let mut ev = vec![];
        for _ in 0..5 {
            ev.extend(press(&mut w, right()));
        }
        assert_eq!(count(&ev, |e| matches!(e, GameEvent::ItemCollected { .. })), 5);
        assert_eq!(count(&ev, |e| matches!(e, GameEvent::ItemHidden { .. })), 0);
        assert!(ev.contains(&GameEvent::ZoneExitOpened { zone: Some(ZoneId(0)) }));
    }

    #[test]
    fn last_exit_clears_level() {
        let mut w = world("# T\n#####\n#P E#\n#####\n");
        press(&mut w, right());
        press(&mut w, right());
        assert_eq!(w.phase, Phase::ZoneTransition);
        let mut ev = vec![];
        for _ in 0..40 {
            ev.extend(step(&mut w, AxisInput::ZERO, DT));
        }
        assert!(ev.contains(&GameEvent::LevelCleared));
        assert_eq!(w.phase, Phase::LevelComplete);
    }

    #[test]
    fn pause_freezes_simulation() {
        let mut w = world("# T\n#####\n#P  #\n#####\n");
        toggle_pause(&mut w);
        for _ in 0..20 {
            assert!(step(&mut w, right(), DT).is_empty());
        }
        assert_eq!(w.motion.cell(), Cell::new(1, 1));
        toggle_pause(&mut w);
        assert!(!w.paused);
    }
}
