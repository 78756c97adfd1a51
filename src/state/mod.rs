//! Client-side game state: domain entities, the reconciling list store, and
//! the event hub observers subscribe to.

pub mod events;
pub mod game;
pub mod store;
