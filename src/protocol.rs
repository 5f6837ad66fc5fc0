use crate::types::*;
use serde::{Deserialize, Serialize};

/// Outbound notifications. Every event reaching a player goes through
/// this enum; what each player may see is decided before sending, so a
/// serialized event is always safe to put on the wire as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum GameEvent {
    /// Roles were dealt. Each recipient gets their own roster view with
    /// only the roles they are entitled to see.
    Start {
        roster: Vec<RosterEntry>,
        server_now: String,
    },
    /// Close your eyes.
    Sleep,
    /// A stage opened and the recipient is eligible to vote in it.
    Wake {
        message: String,
        can_skip: bool,
        candidates: Vec<VoteTarget>,
    },
    /// Interim tally after an accepted vote change.
    Vote {
        is_valid: bool,
        standings: Vec<CandidateStanding>,
    },
    /// Night results. Victims additionally receive the full role table.
    Summary {
        is_killed: bool,
        killed: Vec<PlayerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        revealed_roles: Option<Vec<RevealEntry>>,
    },
    /// A role disclosure: the day elimination shown to all, or a cop
    /// investigation shown to the cops. `None` means the day vote ended
    /// with no elimination.
    Reveal {
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<RevealEntry>,
    },
    /// The session is over.
    End {
        result: GameOutcome,
        server_now: String,
    },
}

/// One roster line as a particular recipient is allowed to see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: PlayerId,
    pub name: String,
    pub emoji: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub is_dead: bool,
}

/// What a reveal discloses about a player: the exact role, or just the
/// faction alignment (cop investigations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealedInfo {
    Role(Role),
    Alignment(Faction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealEntry {
    pub id: PlayerId,
    #[serde(flatten)]
    pub info: RevealedInfo,
    pub is_dead: bool,
}

impl From<&Player> for RevealEntry {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            info: RevealedInfo::Role(p.role),
            is_dead: p.is_dead,
        }
    }
}

/// Current support for one candidate, in casting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStanding {
    pub target: VoteTarget,
    pub voters: Vec<PlayerId>,
    pub is_leading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_shape_is_tagged() {
        let event = GameEvent::Wake {
            message: "Killer, choose your victim.".to_string(),
            can_skip: false,
            candidates: vec![VoteTarget::Player("p1".to_string()), VoteTarget::Skip],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["t"], "wake");
        assert_eq!(json["candidates"][0]["player"], "p1");
        assert_eq!(json["candidates"][1], "skip");
    }

    #[test]
    fn hidden_roles_are_omitted_from_roster_entries() {
        let entry = RosterEntry {
            id: "p2".to_string(),
            name: "Mara".to_string(),
            emoji: "🦊".to_string(),
            role: None,
            is_dead: false,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("role").is_none());
    }

    #[test]
    fn reveal_flattens_role_and_alignment() {
        let exact = RevealEntry {
            id: "p1".to_string(),
            info: RevealedInfo::Role(Role::Killer),
            is_dead: true,
        };
        let json = serde_json::to_value(&exact).unwrap();
        assert_eq!(json["role"], "KILLER");

        let aligned = RevealEntry {
            id: "p2".to_string(),
            info: RevealedInfo::Alignment(Faction::Town),
            is_dead: false,
        };
        let json = serde_json::to_value(&aligned).unwrap();
        assert_eq!(json["alignment"], "town");
    }
}
