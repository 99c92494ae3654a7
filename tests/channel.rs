mod common;

use std::{sync::Arc, time::Duration};

use common::{FlakyStore, engine, fast_channel, identity, next};
use killer_party_sync::{
    dao::game_store::{GameStore, MemoryGameStore},
    error::GameError,
    services::{
        channel::{ChannelEvent, RealtimeChannel},
        missions::DisabledProvider,
    },
    state::game::{GameCode, GameConfig},
};
use tokio::{sync::mpsc, time::timeout};

fn snapshot_players(event: ChannelEvent) -> Option<usize> {
    match event {
        ChannelEvent::Snapshot(game) => game.map(|game| game.players.len()),
        ChannelEvent::Disconnected => panic!("unexpected disconnect"),
    }
}

#[tokio::test]
async fn subscribers_see_every_write_in_order() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let engine = engine(store.clone(), Arc::new(DisabledProvider));
    let channel = RealtimeChannel::new(store.clone());
    let host = identity("Host");

    let game = engine.create_game(&host, GameConfig::default()).await.unwrap();
    let mut events = channel.subscribe(game.code.clone());
    assert_eq!(snapshot_players(next(&mut events).await), Some(1));

    engine.join_game(&game.code, &identity("Ana")).await.unwrap();
    engine.join_game(&game.code, &identity("Ben")).await.unwrap();
    assert_eq!(snapshot_players(next(&mut events).await), Some(2));
    assert_eq!(snapshot_players(next(&mut events).await), Some(3));

    assert!(store.delete_game(game.code.to_string()).await.unwrap());
    assert_eq!(snapshot_players(next(&mut events).await), None);
}

#[tokio::test]
async fn absent_game_is_delivered_as_empty_snapshot() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let channel = RealtimeChannel::new(store);
    let mut events = channel.subscribe(GameCode::parse("NONE").unwrap());
    assert_eq!(next(&mut events).await, ChannelEvent::Snapshot(None));
}

#[tokio::test]
async fn unsubscribing_from_the_callback_stops_deliveries() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let engine = engine(store.clone(), Arc::new(DisabledProvider));
    let channel = RealtimeChannel::new(store);
    let host = identity("Host");
    let game = engine.create_game(&host, GameConfig::default()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = channel.subscribe_with(game.code.clone(), move |handle, event| {
        let _ = tx.send(event);
        handle.unsubscribe();
        handle.unsubscribe();
    });

    let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(matches!(first, Some(ChannelEvent::Snapshot(Some(_)))));
    assert!(handle.is_unsubscribed());

    engine.join_game(&game.code, &identity("Ana")).await.unwrap();
    // The task exits and drops the sender once it notices the cancellation.
    let rest = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(rest, None);
}

#[tokio::test]
async fn external_unsubscribe_is_idempotent() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let channel = RealtimeChannel::new(store);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = channel.subscribe_with(GameCode::parse("AB12").unwrap(), move |_, event| {
        let _ = tx.send(event);
    });

    let first = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(first, Some(ChannelEvent::Snapshot(None)));
    handle.unsubscribe();
    handle.clone().unsubscribe();
    assert!(handle.is_unsubscribed());
    let rest = timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert_eq!(rest, None);
}

#[tokio::test]
async fn lost_link_reports_disconnect_then_resumes_with_fresh_snapshot() {
    let flaky = FlakyStore::new(2);
    let store: Arc<dyn GameStore> = Arc::new(flaky.clone());
    let engine = engine(store.clone(), Arc::new(DisabledProvider));
    let channel = fast_channel(store);
    let host = identity("Host");
    let game = engine.create_game(&host, GameConfig::default()).await.unwrap();

    let mut events = channel.subscribe(game.code.clone());
    assert_eq!(snapshot_players(next(&mut events).await), Some(1));
    assert_eq!(next(&mut events).await, ChannelEvent::Disconnected);

    // The second watch delivers a snapshot then drops again; no new
    // Disconnected is announced before that snapshot.
    assert_eq!(snapshot_players(next(&mut events).await), Some(1));
    assert_eq!(next(&mut events).await, ChannelEvent::Disconnected);

    engine.join_game(&game.code, &identity("Ana")).await.unwrap();
    while snapshot_players(next(&mut events).await) != Some(2) {}
    assert_eq!(flaky.watches(), 3);
}

#[tokio::test]
async fn current_reads_the_first_snapshot() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::default());
    let engine = engine(store.clone(), Arc::new(DisabledProvider));
    let channel = RealtimeChannel::new(store);
    let game = engine.create_game(&identity("Host"), GameConfig::default()).await.unwrap();

    let current = channel.current(&game.code).await.unwrap();
    assert_eq!(current.map(|game| game.players.len()), Some(1));
    assert_eq!(channel.current(&GameCode::parse("NONE").unwrap()).await.unwrap(), None);
}

#[tokio::test]
async fn current_reports_a_dead_link_as_transport_error() {
    let store: Arc<dyn GameStore> = Arc::new(FlakyStore::offline());
    let engine = engine(store.clone(), Arc::new(DisabledProvider));
    let channel = fast_channel(store);
    let game = engine.create_game(&identity("Host"), GameConfig::default()).await.unwrap();

    assert!(matches!(
        channel.current(&game.code).await,
        Err(GameError::TransportDisconnected)
    ));
}
