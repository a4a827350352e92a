//! Live-socket scenarios: token uniqueness at the upgrade, mid-round state
//! delivery and the action round trip, all over real WebSocket connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use maze_arena::core::point::Point;
use maze_arena::game::player::Controls;
use maze_arena::game::round::RoundManager;
use maze_arena::game::state::GameState;
use maze_arena::manager::auth::{AuthManager, MemoryUserStore};
use maze_arena::manager::game::GameManager;
use maze_arena::manager::score::{MemoryLeaderboard, MemoryScoreHistory, ScoreManager};
use maze_arena::network::broker::{ActiveTokens, NetworkManager};
use maze_arena::network::protocol::{self, ClientMessage};
use maze_arena::network::server::WsServer;

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    auth: Arc<AuthManager>,
    game: Arc<GameManager>,
}

impl TestServer {
    async fn spawn() -> Self {
        let auth = Arc::new(AuthManager::new(Box::new(MemoryUserStore::new())));
        let state = Arc::new(GameState::new());
        let network = NetworkManager::new(Arc::new(ActiveTokens::new()));
        let scores = Arc::new(ScoreManager::new(
            Box::new(MemoryLeaderboard::new()),
            Box::new(MemoryScoreHistory::new()),
        ));
        let game = GameManager::new(
            state.clone(),
            network.clone(),
            scores,
            RoundManager::with_default_stages(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server = WsServer::new(addr, auth.clone(), state, network);
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Self { addr, auth, game }
    }

    async fn connect(&self, token: &str) -> Result<WsClient, Error> {
        let mut request = format!("ws://{}/echo", self.addr)
            .into_client_request()
            .expect("client request");
        if !token.is_empty() {
            request
                .headers_mut()
                .insert("Authorization", token.parse().expect("header value"));
        }

        connect_async(request).await.map(|(ws, _)| ws)
    }
}

async fn next_binary(ws: &mut WsClient) -> Option<Vec<u8>> {
    loop {
        let message = timeout(Duration::from_secs(5), ws.next()).await.ok()??;
        match message {
            Ok(Message::Binary(data)) => return Some(data),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

#[tokio::test]
async fn duplicate_token_is_refused_with_401() {
    let server = TestServer::spawn().await;
    let token = server.auth.register("alice", false).expect("register");

    let first = server.connect(&token).await;
    assert!(first.is_ok(), "first connection upgrades");

    match server.connect(&token).await {
        Err(Error::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("duplicate upgrade should fail with 401, got {other:?}"),
    }
}

#[tokio::test]
async fn token_is_reusable_after_disconnect() {
    let server = TestServer::spawn().await;
    let token = server.auth.register("alice", false).expect("register");

    let mut ws = server.connect(&token).await.expect("first connection");
    ws.close(None).await.expect("close");
    drop(ws);

    // The broker frees the token once the connection tasks unwind.
    let mut reconnected = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if server.connect(&token).await.is_ok() {
            reconnected = true;
            break;
        }
    }
    assert!(reconnected, "token never became reusable");
}

#[tokio::test]
async fn unknown_token_is_disconnected() {
    let server = TestServer::spawn().await;

    // The upgrade itself succeeds (the token is unused), but the server
    // closes the connection instead of registering a player.
    let mut ws = server
        .connect("no-such-token")
        .await
        .expect("upgrade completes");
    assert!(next_binary(&mut ws).await.is_none());
    assert!(server.game.state().world().players.is_empty());
}

#[tokio::test]
async fn wrong_path_is_not_found() {
    let server = TestServer::spawn().await;

    let request = format!("ws://{}/other", server.addr)
        .into_client_request()
        .expect("client request");
    match connect_async(request).await {
        Err(Error::Http(response)) => assert_eq!(response.status(), 404),
        other => panic!("wrong path should 404, got {other:?}"),
    }
}

#[tokio::test]
async fn mid_round_join_receives_map_state() {
    let server = TestServer::spawn().await;
    server.game.start();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let token = server.auth.register("alice", false).expect("register");
    let mut ws = server.connect(&token).await.expect("connect");

    // The map frame arrives right away; regular broadcasts may interleave.
    let mut seen_map = false;
    for _ in 0..5 {
        let frame = next_binary(&mut ws).await.expect("inbound frame");
        if let ClientMessage::MapState(map) = protocol::decode(&frame).expect("decodable frame") {
            assert!(!map.density.is_empty());
            // Regular players never see wall geometry.
            assert!(map.walls.is_empty());
            seen_map = true;
            break;
        }
    }
    assert!(seen_map, "mid-round join never received a map-state frame");

    server.game.freeze(true);
}

#[tokio::test]
async fn actions_flow_into_broadcast_state() {
    let server = TestServer::spawn().await;
    let token = server.auth.register("alice", false).expect("register");

    let mut ws = server.connect(&token).await.expect("connect");
    server.game.start();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let start = server.game.state().world().players["alice"].position;
    let dest = Point::new(start.x + 0.4, start.y);
    let action = protocol::encode_player_action(&Controls {
        dest: Some(dest),
        ..Controls::default()
    });
    ws.send(Message::Binary(action)).await.expect("send action");

    // Watch broadcast frames until the destination is reflected.
    let mut observed = false;
    for _ in 0..60 {
        let Some(frame) = next_binary(&mut ws).await else {
            break;
        };
        if let Ok(ClientMessage::GameState(state)) = protocol::decode(&frame) {
            let alice = state
                .players
                .iter()
                .find(|p| p.nickname == "alice")
                .expect("alice in frame");
            if alice.dest == Some(dest) {
                observed = true;
                break;
            }
        }
    }
    assert!(observed, "destination never showed up in broadcast state");

    server.game.freeze(true);
}
