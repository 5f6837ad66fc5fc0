use crate::types::Role;

pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced to the caller. Configuration problems are rejected at
/// `start()` before any broadcast or player mutation; nothing that
/// happens inside a running session is ever fatal.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("role overrides assign {assigned} players but the roster has {roster}")]
    Configuration { assigned: usize, roster: usize },

    #[error("at least {min} players are required, got {got}")]
    RosterTooSmall { min: usize, got: usize },

    #[error("the game has already started")]
    AlreadyStarted,
}

/// Why a client action was silently ignored. These are logged at debug
/// level and never surfaced; a stale or racing client message must not
/// destabilize the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RejectReason {
    Ended,
    Interrupted,
    UnknownVoter,
    DeadVoter,
    NoOpenBallot,
    NotEligible,
    SkipNotAllowed,
    SelfHealExhausted,
    ShotsExhausted,
    SameRoleTarget(Role),
}
