use thiserror::Error;

/// Lifecycle phases of a game. Forward-only; `Finished` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Players are joining; nothing is assigned yet.
    Lobby,
    /// Every alive player hunts exactly one other alive player.
    Active,
    /// At most one player remains alive.
    Finished,
}

/// Events that move a game forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// The host started the match and targets were dealt.
    MatchStarted,
    /// An elimination left at most one player alive.
    LastSurvivorStanding,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the game was in when the event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

impl GamePhase {
    /// Compute the phase following `event`, or reject it.
    pub fn next(self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::Lobby, GameEvent::MatchStarted) => GamePhase::Active,
            (GamePhase::Active, GameEvent::LastSurvivorStanding) => GamePhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Whether players can still join.
    pub fn accepts_players(self) -> bool {
        matches!(self, GamePhase::Lobby)
    }

    /// Whether no further transition exists.
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(phase: GamePhase, event: GameEvent) -> GamePhase {
        phase.next(event).unwrap()
    }

    #[test]
    fn full_happy_path_through_game() {
        let phase = apply(GamePhase::Lobby, GameEvent::MatchStarted);
        assert_eq!(phase, GamePhase::Active);
        assert_eq!(
            apply(phase, GameEvent::LastSurvivorStanding),
            GamePhase::Finished
        );
    }

    #[test]
    fn finished_is_absorbing() {
        for event in [GameEvent::MatchStarted, GameEvent::LastSurvivorStanding] {
            let err = GamePhase::Finished.next(event).unwrap_err();
            assert_eq!(err.from, GamePhase::Finished);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn phases_never_move_backwards() {
        assert!(GamePhase::Active.next(GameEvent::MatchStarted).is_err());
        assert!(
            GamePhase::Lobby
                .next(GameEvent::LastSurvivorStanding)
                .is_err()
        );
    }

    #[test]
    fn only_the_lobby_accepts_players() {
        assert!(GamePhase::Lobby.accepts_players());
        assert!(!GamePhase::Active.accepts_players());
        assert!(!GamePhase::Finished.accepts_players());
        assert!(GamePhase::Finished.is_terminal());
    }
}
