//! Client-side state manager for a turn-based social poetry game.
//!
//! The crate keeps a local, display-ready model of the player's games in sync
//! with an authoritative server. Server snapshots arrive as flat lists of raw
//! game records; the state layer threads consecutive rounds into chains,
//! derives presentation fields (action items, stage labels, deadline text)
//! and keeps the list ordered by urgency. Player actions are applied
//! optimistically and rolled back from a snapshot when the server disagrees.
//!
//! Entry point is [`services::actions::GameClient`]; the transport and
//! session persistence are supplied by the embedding application through the
//! [`remote::RemoteApi`] and [`session::SessionStore`] traits.

pub mod config;
pub mod dto;
pub mod error;
pub mod remote;
pub mod services;
pub mod session;
pub mod state;
