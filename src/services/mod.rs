//! Player-facing operations built on top of the state layer.

pub mod actions;
