mod common;

use std::sync::Arc;

use common::{FlakyStore, engine, fast_channel, identity, next};
use killer_party_sync::{
    config::AppConfig,
    dao::game_store::{GameStore, MemoryGameStore},
    error::GameError,
    services::{
        client::{ConnectionStatus, GameClient, PlayerView},
        ledger::GameOutcome,
        missions::DisabledProvider,
        session::{MemoryStorage, SessionManager},
    },
    state::{game::GameConfig, state_machine::GamePhase},
};

fn device(store: &Arc<dyn GameStore>, name: &str) -> (GameClient, SessionManager) {
    let session = SessionManager::from_config(Arc::new(MemoryStorage::new()), &AppConfig::default());
    let client = GameClient::new(
        engine(store.clone(), Arc::new(DisabledProvider)),
        fast_channel(store.clone()),
        session.clone(),
        identity(name),
    )
    .unwrap();
    (client, session)
}

async fn view_until(
    views: &mut futures::stream::BoxStream<'static, PlayerView>,
    done: impl Fn(&PlayerView) -> bool,
) -> PlayerView {
    loop {
        let view = next(views).await;
        if done(&view) {
            return view;
        }
    }
}

#[tokio::test]
async fn finished_game_is_recorded_once_and_session_cleared() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let (host, host_session) = device(&store, "Host");
    let (guest, guest_session) = device(&store, "Guest");

    let game = host.host(GameConfig::default()).await.unwrap();
    guest.join(&format!("https://party.example/?join={}", game.code.as_str().to_lowercase()))
        .await
        .unwrap();
    assert_eq!(guest_session.restore().game, Some(game.code.clone()));

    let mut host_views = host.watch(game.code.clone());
    let lobby = view_until(&mut host_views, |view| {
        view.game.as_ref().is_some_and(|game| game.players.len() == 2)
    })
    .await;
    assert_eq!(lobby.phase(), Some(GamePhase::Lobby));
    assert_eq!(lobby.connection, ConnectionStatus::Connected);
    assert!(lobby.target.is_none());

    host.start(&game.code).await.unwrap();
    let active = view_until(&mut host_views, |view| view.phase() == Some(GamePhase::Active)).await;
    assert_eq!(
        active.target.as_ref().map(|target| target.id),
        Some(guest.identity().id)
    );

    host.eliminate_target(&game.code).await.unwrap();
    let finished =
        view_until(&mut host_views, |view| view.phase() == Some(GamePhase::Finished)).await;
    assert_eq!(finished.me.as_ref().map(|me| me.kill_count), Some(1));
    assert_eq!(finished.standings[0].id, host.identity().id);

    let restored = host_session.restore();
    assert_eq!(restored.game, None);
    assert_eq!(restored.identity.as_ref(), Some(host.identity()));
    assert_eq!(restored.history.entries().len(), 1);
    assert_eq!(restored.history.entries()[0].result, GameOutcome::Winner);
    assert_eq!(restored.history.entries()[0].kills, 1);

    // A second subscription replays FINISHED without a second entry.
    let mut again = host.watch(game.code.clone());
    view_until(&mut again, |view| view.phase() == Some(GamePhase::Finished)).await;
    assert_eq!(host_session.restore().history.entries().len(), 1);

    let mut guest_views = guest.watch(game.code.clone());
    view_until(&mut guest_views, |view| view.phase() == Some(GamePhase::Finished)).await;
    let guest_history = guest_session.restore().history;
    assert_eq!(guest_history.entries()[0].result, GameOutcome::Eliminated);
}

#[tokio::test]
async fn resume_reattaches_without_creating_players() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let (host, session) = device(&store, "Host");
    let game = host.host(GameConfig::default()).await.unwrap();

    let resumed = host.resume().await.unwrap().expect("session should resume");
    assert_eq!(resumed.code, game.code);
    assert_eq!(resumed.players.len(), 1);
    assert_eq!(resumed.revision, game.revision);

    store.delete_game(game.code.to_string()).await.unwrap();
    assert!(host.resume().await.unwrap().is_none());
    assert_eq!(session.restore().game, None);
    assert!(session.restore().identity.is_some());
}

#[tokio::test]
async fn resume_over_a_dead_link_keeps_the_session() {
    let store: Arc<dyn GameStore> = Arc::new(FlakyStore::offline());
    let (host, session) = device(&store, "Host");
    let game = host.host(GameConfig::default()).await.unwrap();

    assert!(matches!(
        host.resume().await,
        Err(GameError::TransportDisconnected)
    ));
    assert_eq!(session.restore().game, Some(game.code));
}

#[tokio::test]
async fn bad_join_input_is_rejected_before_any_request() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let (guest, session) = device(&store, "Guest");
    assert!(matches!(
        guest.join("https://party.example/?join=").await,
        Err(GameError::InvalidCode { .. })
    ));
    assert!(matches!(
        guest.join("ZZZZ").await,
        Err(GameError::NotFound { .. })
    ));
    assert_eq!(session.restore().game, None);
}

#[tokio::test]
async fn portraits_surface_provider_failures() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let (client, _) = device(&store, "Host");
    assert!(matches!(
        client.generate_portrait("data:image/jpeg;base64,AAAA".into()).await,
        Err(GameError::ProviderUnavailable(_))
    ));
}
