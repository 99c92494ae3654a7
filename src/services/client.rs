//! One device's view of the game: lifecycle calls on behalf of the local
//! identity, a per-snapshot [`PlayerView`] and the bookkeeping that goes with
//! it (active game code, history once the game is over).

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use tracing::{info, warn};
use url::Url;

use crate::{
    dao::models::now_millis,
    error::{GameError, GameResult},
    services::{
        channel::{ChannelEvent, RealtimeChannel},
        ledger::HistoryEntry,
        lifecycle::GameEngine,
        session::SessionManager,
    },
    state::{
        game::{Game, GameCode, GameConfig, Identity, Player, PlayerId},
        rules::compute_standing,
        state_machine::GamePhase,
    },
};

/// Query parameter carrying the code in a join link.
pub const JOIN_PARAM: &str = "join";

/// State of the realtime link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Snapshots are flowing.
    Connected,
    /// Link lost; reconnecting.
    Disconnected,
}

/// What one player sees after a delivery: the shared document filtered
/// against their identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    /// Latest document, `None` once the game is gone.
    pub game: Option<Game>,
    /// This device's player.
    pub me: Option<Player>,
    /// Player this device is hunting.
    pub target: Option<Player>,
    /// Highest score first.
    pub standings: Vec<Player>,
    /// Link state when the view was derived.
    pub connection: ConnectionStatus,
}

impl PlayerView {
    /// Filter the shared document down to what player `me` sees.
    pub fn derive(game: Option<&Game>, me: PlayerId, connection: ConnectionStatus) -> Self {
        let own = game.and_then(|game| game.player(me)).cloned();
        let target = own
            .as_ref()
            .and_then(|player| player.target)
            .and_then(|target| game.and_then(|game| game.player(target)))
            .cloned();
        let standings = game
            .map(|game| compute_standing(game).into_iter().cloned().collect())
            .unwrap_or_default();

        Self {
            game: game.cloned(),
            me: own,
            target,
            standings,
            connection,
        }
    }

    /// Phase of the game, if it exists.
    pub fn phase(&self) -> Option<GamePhase> {
        self.game.as_ref().map(|game| game.phase)
    }
}

/// Lifecycle operations bound to the local identity and session.
#[derive(Clone)]
pub struct GameClient {
    engine: GameEngine,
    channel: RealtimeChannel,
    session: SessionManager,
    identity: Identity,
}

impl GameClient {
    /// Bind `identity` to this device and persist it.
    pub fn new(
        engine: GameEngine,
        channel: RealtimeChannel,
        session: SessionManager,
        identity: Identity,
    ) -> GameResult<Self> {
        session.save_identity(&identity)?;
        Ok(Self {
            engine,
            channel,
            session,
            identity,
        })
    }

    /// Identity this device plays as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Persisted session of this device.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Create a lobby hosted by the local player and remember it.
    pub async fn host(&self, config: GameConfig) -> GameResult<Game> {
        let game = self.engine.create_game(&self.identity, config).await?;
        self.session.set_game(&game.code)?;
        Ok(game)
    }

    /// Join by raw code or join link.
    pub async fn join(&self, input: &str) -> GameResult<Player> {
        let code = parse_join_input(input)?;
        let player = self.engine.join_game(&code, &self.identity).await?;
        self.session.set_game(&code)?;
        Ok(player)
    }

    /// Reattach to the game remembered by the session, if it still exists
    /// and still lists the local player. Never creates a player.
    pub async fn resume(&self) -> GameResult<Option<Game>> {
        let restored = self.session.restore();
        let Some((identity, code)) = restored.resumable() else {
            return Ok(None);
        };
        if identity.id != self.identity.id {
            return Ok(None);
        }

        // A lost link surfaces as an error and keeps the session intact.
        match self.channel.current(code).await? {
            Some(game) if game.player(self.identity.id).is_some() => {
                info!(code = %code, player = %self.identity.id, "session resumed");
                Ok(Some(game))
            }
            _ => {
                warn!(code = %code, "remembered game is gone; clearing session");
                self.session.clear_game()?;
                Ok(None)
            }
        }
    }

    /// Start the match; host only.
    pub async fn start(&self, code: &GameCode) -> GameResult<Game> {
        self.engine.start_match(code, self.identity.id).await
    }

    /// Report that the local player completed their mission on their target.
    pub async fn eliminate_target(&self, code: &GameCode) -> GameResult<Game> {
        self.engine.record_elimination(code, self.identity.id).await
    }

    /// Stylized avatar from a photo.
    pub async fn generate_portrait(&self, image: String) -> GameResult<String> {
        self.engine.generate_portrait(image).await
    }

    /// Leave the current game locally; the shared document is untouched.
    pub fn leave(&self) -> GameResult<()> {
        Ok(self.session.clear_game()?)
    }

    /// Views derived from every delivery of the game.
    ///
    /// The first FINISHED snapshot the local player appears in is written to
    /// the history ledger once and the remembered game code is cleared.
    pub fn watch(&self, code: GameCode) -> BoxStream<'static, PlayerView> {
        let mut events = self.channel.subscribe(code);
        let session = self.session.clone();
        let me = self.identity.id;

        Box::pin(stream! {
            let mut last: Option<Game> = None;
            let mut recorded = false;
            while let Some(event) = events.next().await {
                let connection = match event {
                    ChannelEvent::Snapshot(game) => {
                        last = game;
                        ConnectionStatus::Connected
                    }
                    ChannelEvent::Disconnected => ConnectionStatus::Disconnected,
                };

                if let Some(game) = last.as_ref().filter(|game| game.phase.is_terminal())
                    && !recorded
                {
                    recorded = record_finished(&session, game, me);
                }
                yield PlayerView::derive(last.as_ref(), me, connection);
            }
        })
    }
}

/// Returns whether the game is settled for this device.
fn record_finished(session: &SessionManager, game: &Game, me: PlayerId) -> bool {
    let Some(entry) = HistoryEntry::for_player(game, me, now_millis()) else {
        return true;
    };
    let outcome = entry.result;
    match session.record_outcome(entry) {
        Ok(new) => {
            if new {
                info!(code = %game.code, player = %me, outcome = ?outcome, "game recorded in history");
            }
        }
        Err(err) => {
            warn!(code = %game.code, error = %err, "failed to record history");
            return false;
        }
    }
    if let Err(err) = session.clear_game() {
        warn!(code = %game.code, error = %err, "failed to clear finished game from session");
    }
    true
}

/// `<base>?join=<CODE>`, replacing any existing query.
pub fn join_link(base: &Url, code: &GameCode) -> Url {
    let mut link = base.clone();
    link.set_query(None);
    link.query_pairs_mut().append_pair(JOIN_PARAM, code.as_str());
    link
}

/// Extract the code from a join link.
pub fn parse_join_link(link: &str) -> GameResult<GameCode> {
    let invalid = || GameError::InvalidCode {
        raw: link.to_string(),
    };
    let url = Url::parse(link.trim()).map_err(|_| invalid())?;
    let (_, raw) = url
        .query_pairs()
        .find(|(key, _)| key == JOIN_PARAM)
        .ok_or_else(invalid)?;
    GameCode::parse(&raw)
}

/// Accept either a bare code or a join link.
pub fn parse_join_input(input: &str) -> GameResult<GameCode> {
    if input.contains("://") {
        parse_join_link(input)
    } else {
        GameCode::parse(input)
    }
}
