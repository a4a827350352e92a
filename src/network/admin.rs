//! HTTP Admin Surface
//!
//! Onboarding and operator endpoints, served on their own port next to the
//! WebSocket listener:
//!
//! - `POST /create {username}` mints a player token
//! - `POST /start` begins the next round (admin)
//! - `GET  /leaderboard` live standings plus score histories
//! - `POST /toggle_leaderboard` flips public visibility (admin)
//! - `POST /kill?name=X` forces lethal damage (admin)
//! - `POST /freeze` / `POST /unfreeze` gate the next round start (admin)
//! - `GET  /users` registered tokens (admin)
//!
//! Admin endpoints authenticate via the `Authorization` header.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::manager::auth::AuthManager;
use crate::manager::game::GameManager;
use crate::manager::score::ScoreManager;

#[derive(Debug, Deserialize)]
struct CreateRequest {
    username: String,
}

#[derive(Debug, Serialize)]
struct ApiResponse {
    #[serde(rename = "type")]
    kind: &'static str,
    subject: &'static str,
    message: String,
}

#[derive(Debug, Deserialize)]
struct KillQuery {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct LeaderboardResponse<T, H> {
    leaderboard: T,
    histories: H,
}

/// Run the admin server until the process exits.
pub async fn serve(
    addr: SocketAddr,
    game: Arc<GameManager>,
    auth: Arc<AuthManager>,
    scores: Arc<ScoreManager>,
) {
    info!("admin server listening on {addr}");
    warp::serve(routes(game, auth, scores)).run(addr).await;
}

/// The full admin route tree.
pub fn routes(
    game: Arc<GameManager>,
    auth: Arc<AuthManager>,
    scores: Arc<ScoreManager>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("create")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(auth.clone()))
        .and_then(handle_create);

    let start = warp::path!("start")
        .and(warp::post())
        .and(admin_gate(auth.clone()))
        .and(with(game.clone()))
        .and_then(handle_start);

    let leaderboard = warp::path!("leaderboard")
        .and(warp::get())
        .and(authorization())
        .and(with(auth.clone()))
        .and(with(scores.clone()))
        .and_then(handle_leaderboard);

    let toggle_leaderboard = warp::path!("toggle_leaderboard")
        .and(warp::post())
        .and(admin_gate(auth.clone()))
        .and(with(scores))
        .and_then(handle_toggle_leaderboard);

    let kill = warp::path!("kill")
        .and(warp::post())
        .and(admin_gate(auth.clone()))
        .and(warp::query::<KillQuery>())
        .and(with(game.clone()))
        .and_then(handle_kill);

    let freeze = warp::path!("freeze")
        .and(warp::post())
        .and(admin_gate(auth.clone()))
        .and(with(game.clone()))
        .and_then(|allowed: bool, game: Arc<GameManager>| handle_freeze(allowed, game, true));

    let unfreeze = warp::path!("unfreeze")
        .and(warp::post())
        .and(admin_gate(auth.clone()))
        .and(with(game))
        .and_then(|allowed: bool, game: Arc<GameManager>| handle_freeze(allowed, game, false));

    let users = warp::path!("users")
        .and(warp::get())
        .and(admin_gate(auth.clone()))
        .and(with(auth))
        .and_then(handle_users);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "authorization"]);

    create
        .or(start)
        .or(leaderboard)
        .or(toggle_leaderboard)
        .or(kill)
        .or(freeze)
        .or(unfreeze)
        .or(users)
        .with(cors)
        .with(warp::log("maze_arena::admin"))
}

fn with<T: Clone + Send>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

fn authorization() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
}

/// Resolve the `Authorization` header to an admin yes/no.
fn admin_gate(
    auth: Arc<AuthManager>,
) -> impl Filter<Extract = (bool,), Error = Rejection> + Clone {
    authorization().map(move |token: Option<String>| {
        token.as_deref().is_some_and(|t| auth.is_admin_token(t))
    })
}

fn json_status<T: Serialize>(value: &T, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(value), status)
}

fn forbidden() -> warp::reply::WithStatus<warp::reply::Json> {
    json_status(
        &ApiResponse {
            kind: "error",
            subject: "authorization",
            message: "admin token required".to_string(),
        },
        StatusCode::UNAUTHORIZED,
    )
}

async fn handle_create(
    body: CreateRequest,
    auth: Arc<AuthManager>,
) -> Result<impl Reply, Infallible> {
    let reply = match auth.register(&body.username, false) {
        Ok(token) => ApiResponse {
            kind: "success",
            subject: "Token generation",
            message: token,
        },
        Err(e) => ApiResponse {
            kind: "error",
            subject: "Token generation",
            message: e.to_string(),
        },
    };

    Ok(json_status(&reply, StatusCode::OK))
}

async fn handle_start(
    allowed: bool,
    game: Arc<GameManager>,
) -> Result<impl Reply, Infallible> {
    if !allowed {
        return Ok(forbidden());
    }

    game.start();
    Ok(json_status(
        &ApiResponse {
            kind: "success",
            subject: "game",
            message: "started".to_string(),
        },
        StatusCode::OK,
    ))
}

async fn handle_leaderboard(
    token: Option<String>,
    auth: Arc<AuthManager>,
    scores: Arc<ScoreManager>,
) -> Result<impl Reply, Infallible> {
    let admin = token.as_deref().is_some_and(|t| auth.is_admin_token(t));
    if !scores.is_visible() && !admin {
        return Ok(json_status(
            &ApiResponse {
                kind: "error",
                subject: "leaderboard",
                message: "leaderboard is disabled".to_string(),
            },
            StatusCode::FORBIDDEN,
        ));
    }

    let leaderboard = scores.rank().unwrap_or_default();
    let histories = scores.histories().unwrap_or_else(|_| HashMap::new());

    Ok(json_status(
        &LeaderboardResponse {
            leaderboard,
            histories,
        },
        StatusCode::OK,
    ))
}

async fn handle_toggle_leaderboard(
    allowed: bool,
    scores: Arc<ScoreManager>,
) -> Result<impl Reply, Infallible> {
    if !allowed {
        return Ok(forbidden());
    }

    let status = if scores.toggle_visibility() {
        "enabled"
    } else {
        "disabled"
    };

    Ok(json_status(
        &ApiResponse {
            kind: "success",
            subject: "leaderboard",
            message: format!("leaderboard access has been {status}"),
        },
        StatusCode::OK,
    ))
}

async fn handle_kill(
    allowed: bool,
    query: KillQuery,
    game: Arc<GameManager>,
) -> Result<impl Reply, Infallible> {
    if !allowed {
        return Ok(forbidden());
    }

    if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
        game.kill(name);
    }

    Ok(json_status(
        &ApiResponse {
            kind: "success",
            subject: "kill",
            message: "done".to_string(),
        },
        StatusCode::OK,
    ))
}

async fn handle_freeze(
    allowed: bool,
    game: Arc<GameManager>,
    freeze: bool,
) -> Result<impl Reply, Infallible> {
    if !allowed {
        return Ok(forbidden());
    }

    game.freeze(freeze);
    Ok(json_status(
        &ApiResponse {
            kind: "success",
            subject: "freeze",
            message: freeze.to_string(),
        },
        StatusCode::OK,
    ))
}

async fn handle_users(
    allowed: bool,
    auth: Arc<AuthManager>,
) -> Result<impl Reply, Infallible> {
    if !allowed {
        return Ok(forbidden());
    }

    Ok(json_status(&auth.list(), StatusCode::OK))
}

// =============================================================================
// TESTS
// =============================================================================
