//! Role allocation: how many of each role a game of N players gets, the
//! order the night wakes them in, and the shuffled deal itself.

use crate::error::SessionError;
use crate::types::{Player, Role, RosterMember};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

/// Canonical stage order. Allocation walks it top to bottom and the
/// night wakes the allocated roles in the same order.
pub const NIGHT_ORDER: [Role; 6] = [
    Role::Cabby,
    Role::Killer,
    Role::Cop,
    Role::Doctor,
    Role::Sniper,
    Role::Nitwit,
];

struct Weight {
    priority: f64,
    gain: f64,
}

fn weight(role: Role) -> Weight {
    match role {
        Role::Killer => Weight { priority: 4.5, gain: 1.1 },
        Role::Doctor => Weight { priority: 9.0, gain: 1.0 },
        Role::Cop => Weight { priority: 9.5, gain: 1.1 },
        Role::Nitwit => Weight { priority: 10.0, gain: 1.75 },
        Role::Cabby => Weight { priority: 15.0, gain: 1.1 },
        Role::Sniper => Weight { priority: 13.0, gain: 1.75 },
        // Citizens absorb the remainder; Everyone is never allocated.
        Role::Citizen | Role::Everyone => Weight { priority: 1.0, gain: 1.0 },
    }
}

fn weighted_count(role: Role, players: usize) -> usize {
    let w = weight(role);
    (players as f64 / w.priority).powf(w.gain).round() as usize
}

/// Compute the role distribution for `players` seats, terminating in the
/// citizen remainder. Counts sum to `players`; an override set whose sum
/// exceeds the roster is a configuration error, checked before any
/// player is touched.
pub fn role_counts(
    players: usize,
    overrides: Option<&HashMap<Role, usize>>,
) -> Result<Vec<(Role, usize)>, SessionError> {
    let mut counts: Vec<(Role, usize)> = Vec::new();
    for role in NIGHT_ORDER {
        let n = match overrides {
            Some(set) => set.get(&role).copied().unwrap_or(0),
            None => weighted_count(role, players),
        };
        if n == 0 {
            continue;
        }
        counts.push((role, n));
    }

    let assigned: usize = counts.iter().map(|(_, n)| n).sum();
    if assigned > players {
        return Err(SessionError::Configuration {
            assigned,
            roster: players,
        });
    }

    counts.push((Role::Citizen, players - assigned));
    Ok(counts)
}

/// The subsequence of [`NIGHT_ORDER`] that actually wakes at night:
/// allocated roles only, silent ones excluded.
pub fn role_order(players: usize, overrides: Option<&HashMap<Role, usize>>) -> Vec<Role> {
    NIGHT_ORDER
        .iter()
        .copied()
        .filter(|role| !role.is_silent())
        .filter(|role| match overrides {
            Some(set) => set.get(role).copied().unwrap_or(0) > 0,
            None => weighted_count(*role, players) > 0,
        })
        .collect()
}

/// Deal roles to a roster. The pool is shuffled before slicing into
/// per-role blocks, and the seated list is shuffled again afterwards so
/// a player's role cannot be inferred from their roster position.
pub fn assign<R: Rng>(
    roster: &[RosterMember],
    counts: &[(Role, usize)],
    rng: &mut R,
) -> Vec<Player> {
    let mut pool: Vec<&RosterMember> = roster.iter().collect();
    pool.shuffle(rng);

    let mut players = Vec::with_capacity(roster.len());
    let mut offset = 0;
    for (role, count) in counts {
        for member in &pool[offset..offset + count] {
            players.push(Player::seat(member, *role));
        }
        offset += count;
    }

    players.shuffle(rng);
    players
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roster(n: usize) -> Vec<RosterMember> {
        (0..n)
            .map(|i| RosterMember {
                id: format!("p{i}"),
                name: format!("Player {i}"),
                emoji: "🙂".to_string(),
            })
            .collect()
    }

    #[test]
    fn counts_sum_to_player_count_for_all_small_games() {
        // Above ~34 players the weight curves oversubscribe the roster
        // and allocation correctly refuses; test the playable range.
        for n in 4..=32 {
            let counts = role_counts(n, None).unwrap();
            let total: usize = counts.iter().map(|(_, c)| c).sum();
            assert_eq!(total, n, "allocation for {n} players");

            let (last_role, citizen_count) = counts.last().unwrap();
            assert_eq!(*last_role, Role::Citizen);
            // usize already guarantees >= 0; make the remainder explicit.
            assert!(*citizen_count <= n);
        }
    }

    #[test]
    fn four_players_resolve_to_one_killer() {
        let counts = role_counts(4, None).unwrap();
        assert_eq!(counts, vec![(Role::Killer, 1), (Role::Citizen, 3)]);
        assert_eq!(role_order(4, None), vec![Role::Killer]);
    }

    #[test]
    fn order_is_a_subsequence_of_the_canonical_order() {
        for n in 4..=32 {
            let order = role_order(n, None);
            let mut canon = NIGHT_ORDER.iter();
            for role in &order {
                assert!(
                    canon.any(|c| c == role),
                    "{role:?} out of order for {n} players"
                );
                assert!(!role.is_silent());
            }
        }
    }

    #[test]
    fn overrides_are_used_verbatim() {
        let mut set = HashMap::new();
        set.insert(Role::Killer, 2);
        set.insert(Role::Doctor, 1);
        set.insert(Role::Sniper, 0);

        let counts = role_counts(6, Some(&set)).unwrap();
        assert_eq!(
            counts,
            vec![(Role::Killer, 2), (Role::Doctor, 1), (Role::Citizen, 3)]
        );
        assert_eq!(role_order(6, Some(&set)), vec![Role::Killer, Role::Doctor]);
    }

    #[test]
    fn oversized_overrides_are_a_configuration_error() {
        let mut set = HashMap::new();
        set.insert(Role::Killer, 3);
        set.insert(Role::Doctor, 3);

        let err = role_counts(5, Some(&set)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Configuration {
                assigned: 6,
                roster: 5
            }
        ));
    }

    #[test]
    fn nitwit_is_allocated_but_never_wakes() {
        let mut set = HashMap::new();
        set.insert(Role::Killer, 1);
        set.insert(Role::Nitwit, 1);

        let counts = role_counts(6, Some(&set)).unwrap();
        assert!(counts.contains(&(Role::Nitwit, 1)));
        assert_eq!(role_order(6, Some(&set)), vec![Role::Killer]);
    }

    #[test]
    fn assignment_covers_the_roster_with_the_requested_counts() {
        let roster = roster(9);
        let counts = role_counts(9, None).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let players = assign(&roster, &counts, &mut rng);
        assert_eq!(players.len(), 9);

        for (role, count) in &counts {
            let seated = players.iter().filter(|p| p.role == *role).count();
            assert_eq!(seated, *count, "{role:?}");
        }

        let mut ids: Vec<_> = players.iter().map(|p| p.id.clone()).collect();
        ids.sort();
        let mut expected: Vec<_> = roster.iter().map(|m| m.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }
}
