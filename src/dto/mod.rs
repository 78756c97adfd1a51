//! Wire shapes exchanged with the game server.

pub mod game;
pub mod response;
