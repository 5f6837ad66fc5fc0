use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type SessionId = String;

/// Roles a player can secretly hold. `Everyone` is a pseudo-role that
/// only addresses the public day phase; it is never assigned to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    Killer,
    Doctor,
    Cop,
    Sniper,
    Cabby,
    Nitwit,
    Everyone,
}

impl Role {
    pub fn faction(self) -> Faction {
        match self {
            Role::Killer => Faction::Killers,
            _ => Faction::Town,
        }
    }

    /// Whether this role's ballot carries a SKIP candidate.
    pub fn allows_skip(self) -> bool {
        matches!(self, Role::Sniper)
    }

    /// Silent roles are allocated but never woken at night.
    pub fn is_silent(self) -> bool {
        matches!(self, Role::Nitwit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Killers,
    Town,
}

/// Something a ballot can be cast for: a player, or the SKIP sentinel
/// on stages that permit abstention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteTarget {
    Player(PlayerId),
    Skip,
}

/// Immutable roster snapshot handed in by the room layer at start.
/// Identity, display name and emoji are owned out there; the session
/// only carries them for broadcasts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub id: PlayerId,
    pub name: String,
    pub emoji: String,
}

/// A seated player for the lifetime of one session. Created at start,
/// mutated only by death application, never removed; dead players stay
/// addressable for reveal messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub emoji: String,
    pub role: Role,
    pub is_dead: bool,
    pub is_revealed: bool,
}

impl Player {
    pub fn seat(member: &RosterMember, role: Role) -> Self {
        Self {
            id: member.id.clone(),
            name: member.name.clone(),
            emoji: member.emoji.clone(),
            role,
            is_dead: false,
            is_revealed: false,
        }
    }
}

/// How a finished game came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameOutcome {
    KillersWin,
    TownWins,
    Draw,
}

/// Per-session tunables. Delays are wall-clock seconds; the defaults
/// match the pacing the game was designed around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Pause between the role announcement and the first night.
    pub settle_seconds: u32,
    /// Pause after a sleep broadcast before the next stage wakes.
    pub sleep_seconds: u32,
    /// Debounce between a ballot turning valid and its auto-seal.
    pub seal_seconds: u32,
    /// Pause after the night summary before the day vote opens.
    pub summary_seconds: u32,
    /// Pause after the day reveal before the next round.
    pub reveal_seconds: u32,
    /// Delay before a cop investigation result comes back.
    pub investigate_seconds: u32,
    /// Bounds for the randomized delay that masks a stage whose role
    /// has no living holder.
    pub absent_wake_min_seconds: u32,
    pub absent_wake_max_seconds: u32,
    /// How often the doctors may heal one of their own.
    pub doctor_self_heals: u32,
    /// How many shots the snipers share for the whole session.
    pub sniper_shots: u32,
    /// Explicit role counts; when set they are used verbatim and the
    /// citizen remainder absorbs the rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_overrides: Option<HashMap<Role, usize>>,
    /// Seed for the session RNG; `None` seeds from the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            settle_seconds: 10,
            sleep_seconds: 5,
            seal_seconds: 5,
            summary_seconds: 5,
            reveal_seconds: 5,
            investigate_seconds: 2,
            absent_wake_min_seconds: 4,
            absent_wake_max_seconds: 9,
            doctor_self_heals: 1,
            sniper_shots: 1,
            role_overrides: None,
            rng_seed: None,
        }
    }
}
