pub mod event;
pub mod ledger;
pub mod level;
pub mod reveal;
pub mod slots;
pub mod step;
pub mod unlock;
pub mod world;
pub mod zone;
