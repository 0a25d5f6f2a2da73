/// Events emitted during a simulation step.
/// The presentation layer consumes these for animation, sound and HUD text.
///
/// Core services never call into each other through callbacks; they push
/// events into the `Vec<GameEvent>` the step orchestrator hands them, and
/// the orchestrator routes each event to the next service in order.

use crate::domain::entity::{ItemId, ObstacleId, ZoneId};
use crate::domain::geom::{Cell, Dir};
use crate::domain::rules::MoveKind;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameOverReason {
    /// The named zone's move budget hit zero.
    ZoneExhausted(ZoneId),
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// One accepted input fully resolved (moved or bumped).
    TurnCompleted { kind: MoveKind, dir: Dir, cell: Cell },
    GameOver { reason: GameOverReason },
    ItemCollected { item: ItemId, cell: Cell },
    BatchRevealed { zone: Option<ZoneId>, items: Vec<ItemId> },
    ItemHidden { item: ItemId },
    ZoneExitOpened { zone: Option<ZoneId> },
    ObstacleUnlocked { obstacle: ObstacleId },
    /// A slot rule granted turns; `zone == None` means the global bonus pool.
    TurnsCredited { zone: Option<ZoneId>, amount: u32 },
    ZoneEntered { zone: Option<ZoneId> },
    ExitReached { zone: Option<ZoneId> },
    PatrolMoved { cell: Cell },
    LevelCleared,
}
