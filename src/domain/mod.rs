pub mod entity;
pub mod geom;
pub mod motion;
pub mod patrol;
pub mod physics;
pub mod rules;
pub mod tile;
