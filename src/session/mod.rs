//! The game session aggregate: players, round history, the single
//! pending timer, and the cooperating units that drive one game from
//! role assignment to its end result.

pub mod ballot;
pub mod fatality;
mod machine;
pub mod outcome;
pub mod roles;

pub use ballot::{Ballot, Standing};

use crate::notifier::Notifier;
use crate::types::{GameConfig, GameOutcome, Player, Role, SessionId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The smallest roster a game makes sense with.
pub const MIN_PLAYERS: usize = 4;

/// One round's ballots, keyed by the role that cast them. Entries are
/// appended as stages open and become read-only once sealed.
pub type RoundRecord = HashMap<Role, Ballot>;

/// Where the session currently is, coarsely. Useful for observers and
/// assertions; the fine-grained flow lives in the pending-action chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Lobby,
    Intro,
    Asleep,
    VoteWindow,
    Summary,
    Reveal,
    Ended,
}

/// A queued step of the current round's action chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Stage(Role),
    Summary,
}

/// What the pending timer does when it fires. Every suspension point in
/// the phase flow arms exactly one of these; arming replaces (and
/// cancels) whatever was pending before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    BeginRound,
    NextStage,
    SealBallot,
    Disclose,
    Daybreak,
}

struct SessionState {
    players: Vec<Player>,
    game_order: Vec<Role>,
    current_role: Role,
    round: u32,
    history: Vec<RoundRecord>,
    chain: VecDeque<Step>,
    timer: Option<JoinHandle<()>>,
    end_result: Option<GameOutcome>,
    interrupted: bool,
    phase: SessionPhase,
    self_heals_left: u32,
    shots_left: u32,
    rng: StdRng,
}

impl SessionState {
    fn living(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_dead)
    }

    /// Living players addressed by a stage: holders of the role, or
    /// every living player for the day pseudo-role.
    fn holders(&self, role: Role) -> impl Iterator<Item = &Player> {
        self.living()
            .filter(move |p| role == Role::Everyone || p.role == role)
    }
}

/// A single running game. Cheap to share (`Arc`); all mutation funnels
/// through one async mutex, so the session advances strictly
/// sequentially no matter how many timers and clients poke at it.
pub struct GameSession {
    id: SessionId,
    config: GameConfig,
    notifier: Arc<dyn Notifier>,
    state: Mutex<SessionState>,
    /// Handle to ourselves for the timer tasks; weak, so a session the
    /// room dropped never lingers on behalf of a sleeping timer.
    weak: Weak<GameSession>,
}

impl GameSession {
    pub fn new(config: GameConfig, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Arc::new_cyclic(|weak| Self {
            id: ulid::Ulid::new().to_string(),
            state: Mutex::new(SessionState {
                players: Vec::new(),
                game_order: Vec::new(),
                current_role: Role::Everyone,
                round: 0,
                history: Vec::new(),
                chain: VecDeque::new(),
                timer: None,
                end_result: None,
                interrupted: false,
                phase: SessionPhase::Lobby,
                self_heals_left: config.doctor_self_heals,
                shots_left: config.sniper_shots,
                rng,
            }),
            config,
            notifier,
            weak: weak.clone(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub async fn round(&self) -> u32 {
        self.state.lock().await.round
    }

    /// Write-once: `Some` from the moment the game decides, never
    /// changed afterwards.
    pub async fn end_result(&self) -> Option<GameOutcome> {
        self.state.lock().await.end_result
    }

    pub async fn is_interrupted(&self) -> bool {
        self.state.lock().await.interrupted
    }

    /// Snapshot of the seated players, roles included. Meant for the
    /// owning room and for tests; clients only ever see redacted views.
    pub async fn players(&self) -> Vec<Player> {
        self.state.lock().await.players.clone()
    }

    fn delay(&self, seconds: u32) -> Duration {
        Duration::from_secs(seconds.into())
    }

    /// Arm the session timer, cancelling whatever was pending. The task
    /// holds only a weak handle so a dropped session dies quietly.
    fn arm(&self, state: &mut SessionState, delay: Duration, action: PendingAction) {
        if let Some(handle) = state.timer.take() {
            handle.abort();
        }
        let weak = self.weak.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(session) = weak.upgrade() {
                session.fire(action).await;
            }
        }));
    }

    /// Timer callback: every suspension point resumes here, and an
    /// interrupted or finished session goes permanently inert.
    async fn fire(self: Arc<Self>, action: PendingAction) {
        let mut state = self.state.lock().await;
        // This handle is the running task itself; just forget it.
        state.timer = None;
        if state.interrupted || state.end_result.is_some() {
            return;
        }
        match action {
            PendingAction::BeginRound => self.begin_round(&mut state),
            PendingAction::NextStage => self.next_stage(&mut state),
            PendingAction::SealBallot => self.seal_ballot(&mut state),
            PendingAction::Disclose => self.disclose(&mut state),
            PendingAction::Daybreak => self.daybreak(&mut state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::protocol::GameEvent;
    use crate::types::{PlayerId, RosterMember};

    struct NullNotifier;

    impl Notifier for NullNotifier {
        fn send(&self, _to: &PlayerId, _event: GameEvent) {}
    }

    fn roster(n: usize) -> Vec<RosterMember> {
        (0..n)
            .map(|i| RosterMember {
                id: format!("p{i}"),
                name: format!("Player {i}"),
                emoji: "🙂".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn a_fresh_session_sits_in_the_lobby() {
        let session = GameSession::new(GameConfig::default(), Arc::new(NullNotifier));

        assert_eq!(session.phase().await, SessionPhase::Lobby);
        assert_eq!(session.round().await, 0);
        assert_eq!(session.end_result().await, None);
        assert!(!session.is_interrupted().await);
        assert!(session.players().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_is_rejected() {
        let session = GameSession::new(GameConfig::default(), Arc::new(NullNotifier));

        session.start(roster(4)).await.unwrap();
        let err = session.start(roster(4)).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyStarted));
    }

    #[tokio::test]
    async fn undersized_rosters_are_rejected() {
        let session = GameSession::new(GameConfig::default(), Arc::new(NullNotifier));

        let err = session.start(roster(3)).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::RosterTooSmall { min: MIN_PLAYERS, got: 3 }
        ));
        assert_eq!(session.phase().await, SessionPhase::Lobby);
    }
}
