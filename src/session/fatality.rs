//! Resolution of one round's sealed ballots into a death set. Pure
//! reads: player state is only mutated by the session afterwards.

use crate::session::RoundRecord;
use crate::types::{Faction, Player, PlayerId, Role, VoteTarget};
use std::collections::HashSet;

/// The sealed player target of `role`'s ballot, if the stage ran,
/// sealed, and did not abstain.
fn sealed_target(record: &RoundRecord, role: Role) -> Option<PlayerId> {
    match record.get(&role)?.decision()? {
        Some(VoteTarget::Player(id)) => Some(id),
        _ => None,
    }
}

/// Whether `actor`'s action was nullified by the blocking role this
/// round: the cabby drove off the actor's target, or drove off the
/// actor themself (a living holder of the acting role).
pub fn is_blocked(record: &RoundRecord, players: &[Player], actor: Role) -> bool {
    let Some(cabby_target) = sealed_target(record, Role::Cabby) else {
        return false;
    };
    let Some(actor_target) = sealed_target(record, actor) else {
        return false;
    };
    if cabby_target == actor_target {
        return true;
    }
    players
        .iter()
        .any(|p| !p.is_dead && p.role == actor && p.id == cabby_target)
}

/// Compute who dies tonight. Order matters: the killer's pick, then the
/// sniper's shot (with collateral on a wrong guess), then the doctor's
/// heal pulling its target back out. Each step is subject to the block
/// rule.
pub fn resolve_deaths(record: &RoundRecord, players: &[Player]) -> HashSet<PlayerId> {
    let mut deaths = HashSet::new();

    if let Some(target) = sealed_target(record, Role::Killer) {
        if !is_blocked(record, players, Role::Killer) {
            deaths.insert(target);
        }
    }

    if let Some(target) = sealed_target(record, Role::Sniper) {
        if !is_blocked(record, players, Role::Sniper) {
            let wrong_guess = players
                .iter()
                .find(|p| p.id == target)
                .map(|p| p.role.faction() != Faction::Killers)
                .unwrap_or(false);
            deaths.insert(target);
            if wrong_guess {
                for sniper in players.iter().filter(|p| !p.is_dead && p.role == Role::Sniper) {
                    deaths.insert(sniper.id.clone());
                }
            }
        }
    }

    if let Some(target) = sealed_target(record, Role::Doctor) {
        if !is_blocked(record, players, Role::Doctor) {
            deaths.remove(&target);
        }
    }

    deaths
}
