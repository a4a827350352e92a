//! Maze Arena Server
//!
//! Binary entry point: wires the stores, managers and both listeners
//! together and serves until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use maze_arena::config::Config;
use maze_arena::consts::{TICKRATE, TICKS_PER_ROUND};
use maze_arena::game::round::RoundManager;
use maze_arena::game::state::GameState;
use maze_arena::manager::auth::{AuthManager, MemoryUserStore};
use maze_arena::manager::game::GameManager;
use maze_arena::manager::score::{MemoryLeaderboard, MemoryScoreHistory, ScoreManager};
use maze_arena::network::admin;
use maze_arena::network::broker::{ActiveTokens, NetworkManager};
use maze_arena::network::server::WsServer;
use maze_arena::VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("maze_arena=info".parse()?))
        .init();

    info!("Maze Arena Server v{VERSION}");
    info!("Tick Rate: {TICKRATE} Hz");
    info!(
        "Round Length: {TICKS_PER_ROUND} ticks ({} seconds)",
        TICKS_PER_ROUND / TICKRATE
    );

    let config = Config::from_env();

    let auth = Arc::new(AuthManager::new(Box::new(MemoryUserStore::new())));
    auth.setup_admins(&config.admins);

    let scores = Arc::new(ScoreManager::new(
        Box::new(MemoryLeaderboard::new()),
        Box::new(MemoryScoreHistory::new()),
    ));

    let state = Arc::new(GameState::new());
    let network = NetworkManager::new(Arc::new(ActiveTokens::new()));
    let game = GameManager::new(
        state.clone(),
        network.clone(),
        scores.clone(),
        RoundManager::with_default_stages(),
    );

    // Admin surface runs beside the game socket on its own port.
    tokio::spawn(admin::serve(
        config.admin_addr(),
        game.clone(),
        auth.clone(),
        scores.clone(),
    ));

    let server = WsServer::new(config.ws_addr(), auth, state, network);
    server.run().await.context("websocket server failed")?;

    Ok(())
}
