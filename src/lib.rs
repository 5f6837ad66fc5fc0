//! Hidden-role social deduction game sessions: secret role assignment,
//! timer-driven night/day phases, sealed ballots, and win evaluation.
//! Transport, rooms and identity live outside; a session talks to its
//! players only through the injected [`notifier::Notifier`].

pub mod error;
pub mod notifier;
pub mod protocol;
pub mod session;
pub mod types;
