//! Win-condition evaluation over current player states. The session
//! caches the first decided result; this module never re-derives one.

use crate::types::{Faction, GameOutcome, Player, Role};

/// `None` while the game is still undecided.
///
/// Standard rule: a faction with no living members loses. The one
/// exception is the two-player standoff of a cabby against a
/// killer-aligned survivor: the cabby's block makes further resolution
/// impossible, so the game is declared a draw on the spot.
pub fn evaluate(players: &[Player]) -> Option<GameOutcome> {
    let living: Vec<&Player> = players.iter().filter(|p| !p.is_dead).collect();
    let killers = living
        .iter()
        .filter(|p| p.role.faction() == Faction::Killers)
        .count();
    let town = living.len() - killers;

    if killers == 0 {
        return Some(GameOutcome::TownWins);
    }
    if town == 0 {
        return Some(GameOutcome::KillersWin);
    }
    if living.len() == 2 && killers == 1 && living.iter().any(|p| p.role == Role::Cabby) {
        return Some(GameOutcome::Draw);
    }
    None
}
