//! One phase's secret ballot: who may vote, who can be voted for, and
//! the exactly-once seal that freezes the result.

use crate::types::{PlayerId, VoteTarget};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;

/// Snapshot returned after an accepted vote change.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    /// Every eligible voter has cast, and unanimity (when required) holds.
    pub is_valid: bool,
    /// Candidates currently tied for the most votes; empty when nobody
    /// has voted yet.
    pub leaders: Vec<VoteTarget>,
}

#[derive(Debug, Clone)]
pub struct Ballot {
    /// Candidate order, for stable reporting.
    candidates: Vec<VoteTarget>,
    /// Candidate → voters currently on it, in casting order.
    buckets: HashMap<VoteTarget, Vec<PlayerId>>,
    /// Eligible voter → current choice.
    voters: HashMap<PlayerId, Option<VoteTarget>>,
    unanimous_required: bool,
    /// `Some` once sealed; the inner `None` is a sealed no-decision.
    outcome: Option<Option<VoteTarget>>,
}

impl Ballot {
    pub fn new(
        candidates: Vec<VoteTarget>,
        voters: Vec<PlayerId>,
        unanimous_required: bool,
    ) -> Self {
        let buckets = candidates.iter().cloned().map(|c| (c, Vec::new())).collect();
        let voters = voters.into_iter().map(|v| (v, None)).collect();
        Self {
            candidates,
            buckets,
            voters,
            unanimous_required,
            outcome: None,
        }
    }

    /// Apply one vote. Casting the voter's current target again toggles
    /// it off; a different target moves the voter. Returns `None` (and
    /// changes nothing) when the ballot is sealed, the voter is not
    /// eligible, or the target is not a candidate.
    pub fn cast(&mut self, voter: &PlayerId, target: &VoteTarget) -> Option<Standing> {
        if self.outcome.is_some() {
            return None;
        }
        if !self.buckets.contains_key(target) {
            return None;
        }
        let Some(slot) = self.voters.get_mut(voter) else {
            return None;
        };

        let previous = slot.take();
        if let Some(prev) = &previous {
            if let Some(bucket) = self.buckets.get_mut(prev) {
                bucket.retain(|v| v != voter);
            }
        }

        if previous.as_ref() != Some(target) {
            *slot = Some(target.clone());
            if let Some(bucket) = self.buckets.get_mut(target) {
                bucket.push(voter.clone());
            }
        }

        Some(self.standing())
    }

    pub fn standing(&self) -> Standing {
        let leaders = self.leaders();
        let all_voted = self.voters.values().all(|v| v.is_some());
        let is_valid = all_voted && (!self.unanimous_required || leaders.len() == 1);
        Standing { is_valid, leaders }
    }

    fn leaders(&self) -> Vec<VoteTarget> {
        let top = self
            .candidates
            .iter()
            .map(|c| self.buckets[c].len())
            .max()
            .unwrap_or(0);
        if top == 0 {
            return Vec::new();
        }
        self.candidates
            .iter()
            .filter(|c| self.buckets[*c].len() == top)
            .cloned()
            .collect()
    }

    /// Freeze the result. A unanimity ballot still tied seals to `None`
    /// (no decision); otherwise the winner is drawn uniformly among the
    /// leaders (`None` when nobody voted). Idempotent: a second call
    /// returns the frozen value without re-randomizing.
    pub fn seal<R: Rng>(&mut self, rng: &mut R) -> Option<VoteTarget> {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let leaders = self.leaders();
        let outcome = if self.unanimous_required && leaders.len() > 1 {
            None
        } else {
            leaders.choose(rng).cloned()
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    pub fn is_sealed(&self) -> bool {
        self.outcome.is_some()
    }

    /// The sealed result: `None` until sealed, `Some(None)` for a sealed
    /// no-decision.
    pub fn decision(&self) -> Option<Option<VoteTarget>> {
        self.outcome.clone()
    }

    pub fn candidates(&self) -> &[VoteTarget] {
        &self.candidates
    }

    pub fn voters_for(&self, target: &VoteTarget) -> &[PlayerId] {
        self.buckets.get(target).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn player(id: &str) -> VoteTarget {
        VoteTarget::Player(id.to_string())
    }

    fn ballot(candidates: &[&str], voters: &[&str], unanimous: bool) -> Ballot {
        Ballot::new(
            candidates.iter().map(|c| player(c)).collect(),
            voters.iter().map(|v| v.to_string()).collect(),
            unanimous,
        )
    }

    #[test]
    fn becomes_valid_once_every_voter_has_cast() {
        let mut b = ballot(&["a", "b", "c"], &["a", "b"], false);

        let s = b.cast(&"a".to_string(), &player("b")).unwrap();
        assert!(!s.is_valid);
        assert_eq!(s.leaders, vec![player("b")]);

        let s = b.cast(&"b".to_string(), &player("b")).unwrap();
        assert!(s.is_valid);
        assert_eq!(s.leaders, vec![player("b")]);
    }

    #[test]
    fn voting_the_same_target_twice_toggles_off() {
        let mut b = ballot(&["a", "b"], &["a", "b"], false);

        b.cast(&"a".to_string(), &player("b")).unwrap();
        let s = b.cast(&"a".to_string(), &player("b")).unwrap();

        assert!(!s.is_valid);
        assert!(s.leaders.is_empty());
        assert!(b.voters_for(&player("b")).is_empty());
    }

    #[test]
    fn revoting_moves_the_voter_between_buckets() {
        let mut b = ballot(&["a", "b"], &["a", "b"], false);

        b.cast(&"a".to_string(), &player("a")).unwrap();
        let s = b.cast(&"a".to_string(), &player("b")).unwrap();

        assert!(b.voters_for(&player("a")).is_empty());
        assert_eq!(b.voters_for(&player("b")), ["a".to_string()]);
        assert_eq!(s.leaders, vec![player("b")]);
    }

    #[test]
    fn ineligible_voter_and_unknown_target_are_rejected() {
        let mut b = ballot(&["a", "b"], &["a"], false);

        assert!(b.cast(&"ghost".to_string(), &player("a")).is_none());
        assert!(b.cast(&"a".to_string(), &player("nobody")).is_none());
        assert!(b.cast(&"a".to_string(), &VoteTarget::Skip).is_none());
    }

    #[test]
    fn unanimity_requires_a_single_leader() {
        let mut b = ballot(&["a", "b", "c"], &["a", "b"], true);

        b.cast(&"a".to_string(), &player("b")).unwrap();
        let s = b.cast(&"b".to_string(), &player("c")).unwrap();

        // Everyone voted, but the tally is split.
        assert!(!s.is_valid);
        assert_eq!(s.leaders.len(), 2);
    }

    #[test]
    fn tied_unanimity_ballot_seals_to_no_decision() {
        let mut b = ballot(&["a", "b", "c"], &["a", "b"], true);
        b.cast(&"a".to_string(), &player("b")).unwrap();
        b.cast(&"b".to_string(), &player("c")).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(b.seal(&mut rng), None);
        assert_eq!(b.decision(), Some(None));
    }

    #[test]
    fn seal_is_idempotent() {
        let mut b = ballot(&["a", "b", "c"], &["a", "b", "c"], false);
        b.cast(&"a".to_string(), &player("a")).unwrap();
        b.cast(&"b".to_string(), &player("b")).unwrap();
        b.cast(&"c".to_string(), &player("c")).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let first = b.seal(&mut rng);
        for _ in 0..8 {
            assert_eq!(b.seal(&mut rng), first);
        }
    }

    #[test]
    fn sealed_ballot_ignores_further_votes() {
        let mut b = ballot(&["a", "b"], &["a"], false);
        b.cast(&"a".to_string(), &player("a")).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let sealed = b.seal(&mut rng);
        assert_eq!(sealed, Some(player("a")));

        assert!(b.cast(&"a".to_string(), &player("b")).is_none());
        assert_eq!(b.decision(), Some(sealed));
    }

    #[test]
    fn empty_ballot_seals_to_none() {
        let mut b = ballot(&["a", "b"], &["a", "b"], false);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(b.seal(&mut rng), None);
    }

    #[test]
    fn plurality_seal_picks_among_the_leaders() {
        let mut b = ballot(&["a", "b", "c"], &["a", "b", "c"], false);
        b.cast(&"a".to_string(), &player("a")).unwrap();
        b.cast(&"b".to_string(), &player("b")).unwrap();
        b.cast(&"c".to_string(), &player("a")).unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(b.seal(&mut rng), Some(player("a")));
    }
}
