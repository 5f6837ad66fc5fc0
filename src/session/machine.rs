//! Phase transitions. The night walks the role order one stage at a
//! time, the day puts everyone on one ballot, and every pause in
//! between is a cancellable timer arming the next transition.

use super::{
    ballot::Ballot, fatality, outcome, roles, GameSession, PendingAction, RoundRecord,
    SessionPhase, SessionState, Step, MIN_PLAYERS,
};
use crate::error::{RejectReason, SessionError, SessionResult};
use crate::protocol::{CandidateStanding, GameEvent, RevealEntry, RevealedInfo, RosterEntry};
use crate::types::{GameOutcome, Player, PlayerId, Role, RosterMember, VoteTarget};
use rand::Rng;

fn stage_prompt(role: Role) -> &'static str {
    match role {
        Role::Cabby => "Cabby, pick a passenger to drive across town.",
        Role::Killer => "Killer, choose your victim.",
        Role::Cop => "Cop, pick a suspect to investigate.",
        Role::Doctor => "Doctor, choose someone to protect tonight.",
        Role::Sniper => "Sniper, take your shot or hold your fire.",
        Role::Everyone => "The town gathers. Agree on someone to eliminate.",
        Role::Citizen | Role::Nitwit => "",
    }
}

/// One roster line as `viewer` is allowed to see it: roles are visible
/// to their owner, on publicly revealed players, and between teammates
/// sharing a non-citizen role.
fn roster_entry(p: &Player, viewer: &Player) -> RosterEntry {
    let visible =
        p.id == viewer.id || p.is_revealed || (p.role == viewer.role && p.role != Role::Citizen);
    RosterEntry {
        id: p.id.clone(),
        name: p.name.clone(),
        emoji: p.emoji.clone(),
        role: visible.then_some(p.role),
        is_dead: p.is_dead,
    }
}

impl GameSession {
    /// Begin the game over an immutable roster snapshot. The only
    /// operation that surfaces errors, and it does so before anything
    /// is broadcast or mutated.
    pub async fn start(&self, roster: Vec<RosterMember>) -> SessionResult<()> {
        let mut state = self.state.lock().await;
        if state.phase != SessionPhase::Lobby {
            return Err(SessionError::AlreadyStarted);
        }
        if roster.len() < MIN_PLAYERS {
            return Err(SessionError::RosterTooSmall {
                min: MIN_PLAYERS,
                got: roster.len(),
            });
        }
        let overrides = self.config.role_overrides.as_ref();
        let counts = roles::role_counts(roster.len(), overrides)?;
        let order = roles::role_order(roster.len(), overrides);

        let seated = roles::assign(&roster, &counts, &mut state.rng);
        state.players = seated;
        state.game_order = order;
        state.phase = SessionPhase::Intro;

        tracing::info!(
            session = %self.id,
            players = roster.len(),
            order = ?state.game_order,
            "game starting"
        );

        let server_now = chrono::Utc::now().to_rfc3339();
        for viewer in &state.players {
            let view: Vec<RosterEntry> = state
                .players
                .iter()
                .map(|p| roster_entry(p, viewer))
                .collect();
            self.notifier.send(
                &viewer.id,
                GameEvent::Start {
                    roster: view,
                    server_now: server_now.clone(),
                },
            );
        }

        self.arm(
            &mut state,
            self.delay(self.config.settle_seconds),
            PendingAction::BeginRound,
        );
        Ok(())
    }

    /// Cast or change a vote in the currently open stage. Anything
    /// stale, malformed or forbidden is ignored without feedback; a
    /// racing client must never be able to wedge the session.
    pub async fn vote(&self, voter: &PlayerId, target: VoteTarget) {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let reject = |reason: RejectReason| {
            tracing::debug!(session = %self.id, voter = %voter, ?reason, "vote ignored");
        };

        if state.end_result.is_some() {
            return reject(RejectReason::Ended);
        }
        if state.interrupted {
            return reject(RejectReason::Interrupted);
        }
        let Some(caster) = state.players.iter().find(|p| p.id == *voter) else {
            return reject(RejectReason::UnknownVoter);
        };
        if caster.is_dead {
            return reject(RejectReason::DeadVoter);
        }

        let stage = state.current_role;
        if target == VoteTarget::Skip && !stage.allows_skip() {
            return reject(RejectReason::SkipNotAllowed);
        }
        if stage == Role::Sniper && target != VoteTarget::Skip && state.shots_left == 0 {
            return reject(RejectReason::ShotsExhausted);
        }
        if let VoteTarget::Player(target_id) = &target {
            match stage {
                Role::Doctor if target_id == voter && state.self_heals_left == 0 => {
                    return reject(RejectReason::SelfHealExhausted);
                }
                Role::Cop | Role::Sniper | Role::Cabby => {
                    let peer = state.players.iter().find(|p| p.id == *target_id);
                    if peer.is_some_and(|p| p.role == stage) {
                        return reject(RejectReason::SameRoleTarget(stage));
                    }
                }
                _ => {}
            }
        }

        let Some(ballot) = state
            .history
            .last_mut()
            .and_then(|record| record.get_mut(&stage))
        else {
            return reject(RejectReason::NoOpenBallot);
        };
        let Some(standing) = ballot.cast(voter, &target) else {
            return reject(RejectReason::NotEligible);
        };

        let is_valid = standing.is_valid;
        let standings: Vec<CandidateStanding> = ballot
            .candidates()
            .iter()
            .map(|candidate| CandidateStanding {
                target: candidate.clone(),
                voters: ballot.voters_for(candidate).to_vec(),
                is_leading: standing.leaders.contains(candidate),
            })
            .collect();

        self.broadcast_stage(state, stage, GameEvent::Vote { is_valid, standings });

        // Debounce: any accepted change resets the pending auto-seal.
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        if is_valid {
            self.arm(
                state,
                self.delay(self.config.seal_seconds),
                PendingAction::SealBallot,
            );
        }
    }

    /// Abandon the session: no further broadcasts, no result, inert
    /// forever. Observed at the next suspension point, so in-flight
    /// synchronous work completes and sent messages stay sent.
    pub async fn interrupt(&self) {
        let mut state = self.state.lock().await;
        if state.interrupted {
            return;
        }
        state.interrupted = true;
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        tracing::info!(session = %self.id, "session interrupted");
    }

    pub(super) fn begin_round(&self, state: &mut SessionState) {
        state.round += 1;
        state.history.push(RoundRecord::new());
        state.phase = SessionPhase::Asleep;
        state.chain = state.game_order.iter().copied().map(Step::Stage).collect();
        state.chain.push_back(Step::Summary);

        tracing::info!(session = %self.id, round = state.round, "night falls");
        self.broadcast_living(state, GameEvent::Sleep);
        self.arm(
            state,
            self.delay(self.config.sleep_seconds),
            PendingAction::NextStage,
        );
    }

    pub(super) fn next_stage(&self, state: &mut SessionState) {
        match state.chain.pop_front() {
            Some(Step::Stage(role)) => self.wake(state, role),
            Some(Step::Summary) | None => self.summarize(state),
        }
    }

    fn wake(&self, state: &mut SessionState, role: Role) {
        let voters: Vec<PlayerId> = state.holders(role).map(|p| p.id.clone()).collect();
        if voters.is_empty() {
            // Randomized, so outsiders cannot tell a skipped stage from
            // a slow one.
            let min = self.config.absent_wake_min_seconds;
            let max = self.config.absent_wake_max_seconds.max(min);
            let masking = state.rng.random_range(min..=max);
            tracing::debug!(session = %self.id, ?role, "no living holder, masking the stage");
            self.arm(state, self.delay(masking), PendingAction::NextStage);
            return;
        }

        state.current_role = role;
        state.phase = SessionPhase::VoteWindow;

        let mut candidates: Vec<VoteTarget> = state
            .living()
            .map(|p| VoteTarget::Player(p.id.clone()))
            .collect();
        if role.allows_skip() {
            candidates.push(VoteTarget::Skip);
        }

        let ballot = Ballot::new(candidates.clone(), voters.clone(), role == Role::Everyone);
        if let Some(record) = state.history.last_mut() {
            record.insert(role, ballot);
        }

        tracing::info!(session = %self.id, ?role, voters = voters.len(), "stage open");
        let event = GameEvent::Wake {
            message: stage_prompt(role).to_string(),
            can_skip: role.allows_skip(),
            candidates,
        };
        for voter in &voters {
            self.notifier.send(voter, event.clone());
        }
    }

    pub(super) fn seal_ballot(&self, state: &mut SessionState) {
        let stage = state.current_role;
        let sealed = {
            let SessionState { history, rng, .. } = state;
            history
                .last_mut()
                .and_then(|record| record.get_mut(&stage))
                .map(|ballot| ballot.seal(rng))
        };
        let Some(decision) = sealed else {
            return self.stage_end(state);
        };
        tracing::info!(session = %self.id, ?stage, ?decision, "ballot sealed");

        if let Some(VoteTarget::Player(target_id)) = &decision {
            match stage {
                Role::Doctor => {
                    let healed_a_doctor = state
                        .players
                        .iter()
                        .any(|p| p.id == *target_id && p.role == Role::Doctor);
                    if healed_a_doctor && state.self_heals_left > 0 {
                        state.self_heals_left -= 1;
                    }
                }
                Role::Sniper => {
                    state.shots_left = state.shots_left.saturating_sub(1);
                }
                _ => {}
            }
        }

        if stage == Role::Cop && matches!(decision, Some(VoteTarget::Player(_))) {
            // The investigation result comes back on its own delay.
            self.arm(
                state,
                self.delay(self.config.investigate_seconds),
                PendingAction::Disclose,
            );
            return;
        }

        self.stage_end(state);
    }

    /// Deliver the cop's investigation result, unless the cabby got to
    /// them first. The delay has already elapsed either way, so the cop
    /// audience cannot distinguish a block from a slow answer.
    pub(super) fn disclose(&self, state: &mut SessionState) {
        let decision = state
            .history
            .last()
            .and_then(|record| record.get(&Role::Cop))
            .and_then(|ballot| ballot.decision())
            .flatten();

        if let Some(VoteTarget::Player(target_id)) = decision {
            let blocked = state
                .history
                .last()
                .is_some_and(|record| fatality::is_blocked(record, &state.players, Role::Cop));
            if blocked {
                tracing::debug!(session = %self.id, "investigation blocked, result withheld");
            } else if let Some(target) = state.players.iter().find(|p| p.id == target_id) {
                let entry = RevealEntry {
                    id: target.id.clone(),
                    info: RevealedInfo::Alignment(target.role.faction()),
                    is_dead: target.is_dead,
                };
                self.broadcast_stage(state, Role::Cop, GameEvent::Reveal { target: Some(entry) });
            }
        }

        self.stage_end(state);
    }

    fn stage_end(&self, state: &mut SessionState) {
        if state.current_role == Role::Everyone {
            return self.reveal_day(state);
        }
        self.broadcast_stage(state, state.current_role, GameEvent::Sleep);
        state.phase = SessionPhase::Asleep;
        self.arm(
            state,
            self.delay(self.config.sleep_seconds),
            PendingAction::NextStage,
        );
    }

    fn summarize(&self, state: &mut SessionState) {
        state.phase = SessionPhase::Summary;
        let deaths = state
            .history
            .last()
            .map(|record| fatality::resolve_deaths(record, &state.players))
            .unwrap_or_default();

        for p in state.players.iter_mut() {
            if deaths.contains(&p.id) {
                p.is_dead = true;
            }
        }
        let killed: Vec<PlayerId> = state
            .players
            .iter()
            .filter(|p| deaths.contains(&p.id))
            .map(|p| p.id.clone())
            .collect();

        tracing::info!(
            session = %self.id,
            round = state.round,
            casualties = killed.len(),
            "night over"
        );

        // Victims learn everything; survivors only learn who is gone.
        let full_table: Vec<RevealEntry> = state.players.iter().map(RevealEntry::from).collect();
        for victim in &killed {
            self.notifier.send(
                victim,
                GameEvent::Summary {
                    is_killed: true,
                    killed: killed.clone(),
                    revealed_roles: Some(full_table.clone()),
                },
            );
        }
        self.broadcast_living(
            state,
            GameEvent::Summary {
                is_killed: false,
                killed,
                revealed_roles: None,
            },
        );

        self.arm(
            state,
            self.delay(self.config.summary_seconds),
            PendingAction::Daybreak,
        );
    }

    pub(super) fn daybreak(&self, state: &mut SessionState) {
        if let Some(result) = outcome::evaluate(&state.players) {
            return self.finish(state, result);
        }
        self.wake(state, Role::Everyone);
    }

    fn reveal_day(&self, state: &mut SessionState) {
        state.phase = SessionPhase::Reveal;
        let decision = state
            .history
            .last()
            .and_then(|record| record.get(&Role::Everyone))
            .and_then(|ballot| ballot.decision())
            .flatten();

        let target_id = match decision {
            Some(VoteTarget::Player(id)) => id,
            _ => {
                tracing::info!(session = %self.id, round = state.round, "no elimination today");
                self.broadcast_living(state, GameEvent::Reveal { target: None });
                self.arm(
                    state,
                    self.delay(self.config.reveal_seconds),
                    PendingAction::BeginRound,
                );
                return;
            }
        };

        let mut entry = None;
        for p in state.players.iter_mut() {
            if p.id == target_id {
                p.is_dead = true;
                p.is_revealed = true;
                entry = Some(RevealEntry::from(&*p));
            }
        }
        let Some(entry) = entry else {
            self.broadcast_living(state, GameEvent::Reveal { target: None });
            self.arm(
                state,
                self.delay(self.config.reveal_seconds),
                PendingAction::BeginRound,
            );
            return;
        };

        tracing::info!(session = %self.id, eliminated = %entry.id, "the town has decided");
        self.notifier
            .send(&target_id, GameEvent::Reveal { target: Some(entry.clone()) });
        self.broadcast_living(state, GameEvent::Reveal { target: Some(entry) });

        match outcome::evaluate(&state.players) {
            Some(result) => self.finish(state, result),
            None => self.arm(
                state,
                self.delay(self.config.reveal_seconds),
                PendingAction::BeginRound,
            ),
        }
    }

    fn finish(&self, state: &mut SessionState, result: GameOutcome) {
        state.end_result = Some(result);
        state.phase = SessionPhase::Ended;
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        tracing::info!(session = %self.id, ?result, "game over");

        // Dead players stay addressable; everyone hears the ending.
        let server_now = chrono::Utc::now().to_rfc3339();
        for p in &state.players {
            self.notifier.send(
                &p.id,
                GameEvent::End {
                    result,
                    server_now: server_now.clone(),
                },
            );
        }
    }

    fn broadcast_living(&self, state: &SessionState, event: GameEvent) {
        for p in state.living() {
            self.notifier.send(&p.id, event.clone());
        }
    }

    /// Send to a stage's audience: the role's living holders, or every
    /// living player for the day pseudo-role.
    fn broadcast_stage(&self, state: &SessionState, stage: Role, event: GameEvent) {
        for p in state.holders(stage) {
            self.notifier.send(&p.id, event.clone());
        }
    }
}
