//! Pure game rules: every function maps a snapshot (plus injected randomness
//! and clock) to the next snapshot without touching storage.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    error::GameError,
    state::{
        game::{Game, Identity, KillEvent, Mission, Player, PlayerId, PlayerStatus},
        state_machine::GameEvent,
    },
};

/// Points awarded per difficulty tier of the fulfilled mission.
pub const POINTS_PER_TIER: u32 = 10;
/// Smallest lobby that can form a target cycle.
pub const MIN_PLAYERS: usize = 2;

/// Result of admitting an identity into a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The identity already plays in this game; nothing to write.
    Returning(Player),
    /// A new lobby player was appended.
    Joined { player: Player, next: Game },
}

/// Admit `identity` into the lobby, or recognize a returning player.
pub fn admit_player(game: &Game, identity: &Identity) -> Result<Admission, GameError> {
    if let Some(existing) = game.player(identity.id) {
        return Ok(Admission::Returning(existing.clone()));
    }
    if !game.phase.accepts_players() {
        return Err(GameError::AlreadyStarted {
            code: game.code.to_string(),
        });
    }

    let player = Player::recruit(identity);
    let mut next = game.clone();
    next.players.insert(player.id, player.clone());
    Ok(Admission::Joined { player, next })
}

/// Check the start preconditions and return the players who will hunt, in
/// join order. Spectators sit the match out.
pub fn contestants(game: &Game, caller: PlayerId) -> Result<Vec<PlayerId>, GameError> {
    if !game.is_host(caller) {
        return Err(GameError::NotHost { player: caller.0 });
    }
    if game.phase.next(GameEvent::MatchStarted).is_err() {
        return Err(GameError::AlreadyStarted {
            code: game.code.to_string(),
        });
    }

    let ids: Vec<PlayerId> = game
        .players
        .values()
        .filter(|player| player.status != PlayerStatus::Spectator)
        .map(|player| player.id)
        .collect();
    if ids.len() < MIN_PLAYERS {
        return Err(GameError::InsufficientPlayers {
            required: MIN_PLAYERS,
            actual: ids.len(),
        });
    }
    Ok(ids)
}

/// Deal targets along `order`: position `i` hunts position `i + 1` (wrapping)
/// and receives `missions[i % missions.len()]`.
///
/// `order` must be a permutation of the contestants.
pub fn deal_targets(
    game: &Game,
    order: &[PlayerId],
    missions: &[Mission],
    now: u64,
) -> Result<Game, GameError> {
    let phase = game
        .phase
        .next(GameEvent::MatchStarted)
        .map_err(|_| GameError::AlreadyStarted {
            code: game.code.to_string(),
        })?;
    if order.len() < MIN_PLAYERS {
        return Err(GameError::InsufficientPlayers {
            required: MIN_PLAYERS,
            actual: order.len(),
        });
    }

    let mut next = game.clone();
    for (index, id) in order.iter().enumerate() {
        let target = order[(index + 1) % order.len()];
        let mission = (!missions.is_empty()).then(|| missions[index % missions.len()].clone());
        let Some(player) = next.players.get_mut(id) else {
            return Err(GameError::PlayerNotFound {
                code: game.code.to_string(),
                player: id.0,
            });
        };
        player.status = PlayerStatus::Alive;
        player.target = Some(target);
        player.mission = mission;
    }
    next.phase = phase;
    next.start_time = Some(now);
    Ok(next)
}

/// Apply `killer` eliminating their current target.
///
/// The killer inherits the victim's target (cleared if it points back at the
/// killer) and mission, and scores ten points per tier of the mission they
/// just fulfilled. The game finishes once at most one player is alive.
pub fn eliminate(
    game: &Game,
    killer: PlayerId,
    kill_id: Uuid,
    now: u64,
) -> Result<Game, GameError> {
    let Some(hunter) = game.player(killer) else {
        return Err(GameError::PlayerNotFound {
            code: game.code.to_string(),
            player: killer.0,
        });
    };
    let refuse = |reason| GameError::NotEliminable {
        player: killer.0,
        reason,
    };
    if game.phase.is_terminal() || game.phase.accepts_players() {
        return Err(refuse("the game is not active"));
    }
    if !hunter.is_alive() {
        return Err(refuse("the player is not alive"));
    }
    let Some(victim) = hunter.target.and_then(|id| game.player(id)) else {
        return Err(refuse("the player has no target"));
    };
    if !victim.is_alive() {
        return Err(refuse("the target is not alive"));
    }

    let fulfilled = hunter.mission.clone();
    let points = fulfilled
        .as_ref()
        .map_or(1, |mission| u32::from(mission.difficulty.tier()))
        * POINTS_PER_TIER;
    let inherited_target = victim.target.filter(|id| *id != killer);
    let inherited_mission = victim.mission.clone();
    let victim_id = victim.id;

    let mut next = game.clone();
    if let Some(victim) = next.players.get_mut(&victim_id) {
        victim.status = PlayerStatus::Eliminated;
        victim.eliminated_by = Some(killer);
    }
    if let Some(hunter) = next.players.get_mut(&killer) {
        hunter.target = inherited_target;
        hunter.mission = inherited_mission;
        hunter.kill_count += 1;
        hunter.score += points;
    }
    next.kill_log.push(KillEvent {
        id: kill_id,
        killer,
        victim: victim_id,
        timestamp: now,
        mission_desc: fulfilled.map(|mission| mission.description).unwrap_or_default(),
    });

    if next.alive_count() <= 1 {
        next.phase = next
            .phase
            .next(GameEvent::LastSurvivorStanding)
            .map_err(|_| refuse("the game is not active"))?;
        for player in next.players.values_mut().filter(|player| player.is_alive()) {
            player.target = None;
        }
    }
    Ok(next)
}

/// Players by score, highest first; join order breaks ties.
pub fn compute_standing(game: &Game) -> Vec<&Player> {
    let mut standing: Vec<&Player> = game.players.values().collect();
    standing.sort_by(|a, b| b.score.cmp(&a.score));
    standing
}

/// Whether the targets of alive players form a single cycle covering all of
/// them. A lone survivor must have no target.
pub fn is_single_cycle(game: &Game) -> bool {
    let alive: Vec<&Player> = game.alive_players().collect();
    match alive.as_slice() {
        [] => true,
        [survivor] => survivor.target.is_none(),
        [first, ..] => {
            let mut seen = HashSet::with_capacity(alive.len());
            let mut cursor = first.id;
            for _ in 0..alive.len() {
                let Some(player) = game.player(cursor).filter(|p| p.is_alive()) else {
                    return false;
                };
                if !seen.insert(cursor) {
                    return false;
                }
                let Some(target) = player.target else {
                    return false;
                };
                cursor = target;
            }
            cursor == first.id && seen.len() == alive.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::state::{
        game::{Difficulty, GameCode, GameConfig, MissionCategory},
        state_machine::GamePhase,
    };

    fn identity(name: &str) -> Identity {
        Identity {
            id: PlayerId::new(),
            name: name.into(),
            avatar: String::new(),
        }
    }

    fn lobby(names: &[&str]) -> Game {
        let identities: Vec<Identity> = names.iter().map(|name| identity(name)).collect();
        let players: IndexMap<PlayerId, Player> = identities
            .iter()
            .map(|identity| (identity.id, Player::recruit(identity)))
            .collect();
        Game {
            code: GameCode::parse("TEST").unwrap(),
            name: Game::default_name(names[0]),
            phase: GamePhase::Lobby,
            host: identities[0].id,
            players,
            kill_log: Vec::new(),
            config: GameConfig::default(),
            start_time: None,
            created_at: 0,
            last_updated: 0,
            revision: 1,
        }
    }

    fn mission(id: &str, difficulty: Difficulty) -> Mission {
        Mission {
            id: id.into(),
            description: format!("mission {id}"),
            difficulty,
            category: MissionCategory::Social,
        }
    }

    fn ids(game: &Game) -> Vec<PlayerId> {
        game.players.keys().copied().collect()
    }

    #[test]
    fn join_appends_alive_player_in_lobby() {
        let game = lobby(&["Ann"]);
        let newcomer = identity("Bob");
        let Admission::Joined { player, next } = admit_player(&game, &newcomer).unwrap() else {
            panic!("expected a new player");
        };
        assert_eq!(player.status, PlayerStatus::Alive);
        assert_eq!((player.kill_count, player.score), (0, 0));
        assert!(player.target.is_none() && player.mission.is_none());
        assert_eq!(next.players.len(), 2);
        assert_eq!(next.players.last().map(|(id, _)| *id), Some(newcomer.id));
    }

    #[test]
    fn join_is_idempotent_per_player_id() {
        let game = lobby(&["Ann", "Bob"]);
        let bob = game.players.values().nth(1).cloned().unwrap();
        let again = Identity {
            id: bob.id,
            name: "Bob".into(),
            avatar: String::new(),
        };
        assert_eq!(
            admit_player(&game, &again).unwrap(),
            Admission::Returning(bob)
        );
    }

    #[test]
    fn join_after_start_is_rejected() {
        let mut game = lobby(&["Ann", "Bob"]);
        game.phase = GamePhase::Active;
        assert!(matches!(
            admit_player(&game, &identity("Cat")),
            Err(GameError::AlreadyStarted { .. })
        ));
    }

    #[test]
    fn only_host_can_start() {
        let game = lobby(&["Ann", "Bob"]);
        let guest = ids(&game)[1];
        assert!(matches!(
            contestants(&game, guest),
            Err(GameError::NotHost { .. })
        ));
    }

    #[test]
    fn start_needs_two_players() {
        let game = lobby(&["Ann"]);
        assert!(matches!(
            contestants(&game, game.host),
            Err(GameError::InsufficientPlayers {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn spectators_are_left_out_of_the_cycle() {
        let mut game = lobby(&["Ann", "Bob", "Cat"]);
        let cat = ids(&game)[2];
        game.players[&cat].status = PlayerStatus::Spectator;
        assert_eq!(contestants(&game, game.host).unwrap().len(), 2);
    }

    #[test]
    fn three_player_scenario() {
        let game = lobby(&["A", "B", "C"]);
        let order = ids(&game);
        let (a, b, c) = (order[0], order[1], order[2]);
        let missions = [
            mission("1", Difficulty::Medium),
            mission("2", Difficulty::Easy),
            mission("3", Difficulty::Hard),
        ];

        let started = deal_targets(&game, &order, &missions, 100).unwrap();
        assert_eq!(started.phase, GamePhase::Active);
        assert_eq!(started.start_time, Some(100));
        assert_eq!(started.players[&a].target, Some(b));
        assert_eq!(started.players[&b].target, Some(c));
        assert_eq!(started.players[&c].target, Some(a));
        assert!(is_single_cycle(&started));

        let first = eliminate(&started, a, Uuid::new_v4(), 200).unwrap();
        assert_eq!(first.players[&b].status, PlayerStatus::Eliminated);
        assert_eq!(first.players[&b].eliminated_by, Some(a));
        assert_eq!(first.players[&a].target, Some(c));
        assert_eq!(first.players[&a].kill_count, 1);
        assert_eq!(first.players[&a].score, 20);
        assert_eq!(first.players[&a].mission, Some(missions[1].clone()));
        assert_eq!(first.kill_log.len(), 1);
        assert_eq!(first.kill_log[0].mission_desc, "mission 1");
        assert_eq!(first.phase, GamePhase::Active);
        assert!(is_single_cycle(&first));

        let second = eliminate(&first, a, Uuid::new_v4(), 300).unwrap();
        assert_eq!(second.phase, GamePhase::Finished);
        assert_eq!(second.alive_count(), 1);
        assert_eq!(second.players[&a].target, None);
        assert_eq!(second.players[&a].score, 30);
        assert!(is_single_cycle(&second));
    }

    #[test]
    fn missing_mission_scores_one_tier() {
        let game = lobby(&["A", "B", "C"]);
        let order = ids(&game);
        let started = deal_targets(&game, &order, &[], 0).unwrap();
        let next = eliminate(&started, order[0], Uuid::new_v4(), 1).unwrap();
        assert_eq!(next.players[&order[0]].score, POINTS_PER_TIER);
        assert_eq!(next.kill_log[0].mission_desc, "");
    }

    #[test]
    fn eliminated_player_cannot_kill() {
        let game = lobby(&["A", "B", "C"]);
        let order = ids(&game);
        let started = deal_targets(&game, &order, &[], 0).unwrap();
        let next = eliminate(&started, order[0], Uuid::new_v4(), 1).unwrap();
        assert!(matches!(
            eliminate(&next, order[1], Uuid::new_v4(), 2),
            Err(GameError::NotEliminable { .. })
        ));
    }

    #[test]
    fn lobby_and_finished_games_refuse_eliminations() {
        let game = lobby(&["A", "B"]);
        let order = ids(&game);
        assert!(matches!(
            eliminate(&game, order[0], Uuid::new_v4(), 0),
            Err(GameError::NotEliminable { .. })
        ));

        let started = deal_targets(&game, &order, &[], 0).unwrap();
        let finished = eliminate(&started, order[0], Uuid::new_v4(), 1).unwrap();
        assert_eq!(finished.phase, GamePhase::Finished);
        assert!(matches!(
            eliminate(&finished, order[0], Uuid::new_v4(), 2),
            Err(GameError::NotEliminable { .. })
        ));
    }

    #[test]
    fn unknown_killer_is_reported() {
        let game = lobby(&["A", "B"]);
        let started = deal_targets(&game, &ids(&game), &[], 0).unwrap();
        assert!(matches!(
            eliminate(&started, PlayerId::new(), Uuid::new_v4(), 1),
            Err(GameError::PlayerNotFound { .. })
        ));
    }

    #[test]
    fn standing_is_stable_on_ties() {
        let mut game = lobby(&["A", "B", "C"]);
        let order = ids(&game);
        game.players[&order[1]].score = 20;
        game.players[&order[2]].score = 20;
        let standing: Vec<PlayerId> = compute_standing(&game).iter().map(|p| p.id).collect();
        assert_eq!(standing, vec![order[1], order[2], order[0]]);
    }

    #[test]
    fn sub_cycles_are_detected() {
        let game = lobby(&["A", "B", "C", "D"]);
        let order = ids(&game);
        let mut broken = deal_targets(&game, &order, &[], 0).unwrap();
        broken.players[&order[1]].target = Some(order[0]);
        broken.players[&order[3]].target = Some(order[2]);
        assert!(!is_single_cycle(&broken));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn named_lobby(size: usize) -> Game {
            let names: Vec<String> = (0..size).map(|i| format!("P{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            lobby(&refs)
        }

        proptest! {
            #[test]
            fn start_forms_one_cycle(
                order in (2usize..16).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
            ) {
                let game = named_lobby(order.len());
                let ids = ids(&game);
                let shuffled: Vec<PlayerId> = order.iter().map(|i| ids[*i]).collect();
                let started = deal_targets(&game, &shuffled, &[mission("m", Difficulty::Easy)], 0).unwrap();
                prop_assert!(is_single_cycle(&started));
                prop_assert_eq!(started.alive_count(), order.len());
            }

            #[test]
            fn eliminations_keep_one_cycle_and_monotonic_scores(
                size in 2usize..12,
                picks in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
            ) {
                let game = named_lobby(size);
                let order = ids(&game);
                let missions = [
                    mission("1", Difficulty::Easy),
                    mission("2", Difficulty::Medium),
                    mission("3", Difficulty::Hard),
                ];
                let mut current = deal_targets(&game, &order, &missions, 0).unwrap();

                for (step, pick) in picks.into_iter().enumerate() {
                    if current.phase == GamePhase::Finished {
                        break;
                    }
                    let alive: Vec<PlayerId> = current.alive_players().map(|p| p.id).collect();
                    let killer = alive[pick.index(alive.len())];
                    let next = eliminate(&current, killer, Uuid::new_v4(), step as u64).unwrap();

                    for (id, before) in &current.players {
                        let after = &next.players[id];
                        prop_assert!(after.kill_count >= before.kill_count);
                        prop_assert!(after.score >= before.score);
                    }
                    prop_assert_eq!(next.kill_log.len(), current.kill_log.len() + 1);
                    prop_assert!(is_single_cycle(&next));
                    prop_assert_eq!(next.phase == GamePhase::Finished, next.alive_count() <= 1);
                    current = next;
                }
            }
        }
    }
}
