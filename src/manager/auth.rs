//! Token Authentication
//!
//! Players register once over HTTP and receive an opaque UUID token; the
//! WebSocket layer authenticates every connection against the user store.
//! The store itself is an external collaborator behind the `UserStore`
//! trait; an in-memory implementation backs the binary and the tests.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Username length bounds, inclusive.
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 16;

/// One registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub token: String,
    pub username: String,
    pub color: i32,
    #[serde(default)]
    pub is_admin: bool,
}

/// Public listing entry (no token).
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub color: i32,
}

/// Authentication errors.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    /// Username length outside the accepted range.
    #[error("username must be between {USERNAME_MIN} and {USERNAME_MAX} characters")]
    InvalidUsername,

    /// Username already registered.
    #[error("user already exists")]
    AlreadyExists,

    /// The backing store refused the operation.
    #[error("store error: {0}")]
    Store(String),
}

/// Persistent registry of users and their tokens.
pub trait UserStore: Send + Sync {
    fn insert(&self, user: UserRecord) -> Result<(), AuthError>;
    fn find_by_username(&self, username: &str) -> Option<UserRecord>;
    fn find_by_token(&self, token: &str) -> Option<UserRecord>;
    fn list(&self) -> Vec<UserRecord>;
}

/// In-memory user store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn insert(&self, user: UserRecord) -> Result<(), AuthError> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(user);
        Ok(())
    }

    fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    fn find_by_token(&self, token: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|u| u.token == token)
            .cloned()
    }

    fn list(&self) -> Vec<UserRecord> {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// User registration and token authentication.
pub struct AuthManager {
    store: Box<dyn UserStore>,
}

impl AuthManager {
    pub fn new(store: Box<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Register a new user and mint their token. The color is derived from
    /// the nickname so it is stable across rounds and reconnects.
    pub fn register(&self, username: &str, is_admin: bool) -> Result<String, AuthError> {
        if username.len() < USERNAME_MIN || username.len() > USERNAME_MAX {
            return Err(AuthError::InvalidUsername);
        }

        if self.store.find_by_username(username).is_some() {
            return Err(AuthError::AlreadyExists);
        }

        let token = Uuid::new_v4().to_string();
        self.store.insert(UserRecord {
            token: token.clone(),
            username: username.to_string(),
            color: name_color(username),
            is_admin,
        })?;

        Ok(token)
    }

    /// Look a token up. `None` means the connection must be refused.
    pub fn authenticate(&self, token: &str) -> Option<UserRecord> {
        self.store.find_by_token(token)
    }

    pub fn is_admin_token(&self, token: &str) -> bool {
        self.authenticate(token).is_some_and(|u| u.is_admin)
    }

    /// All registered users with their tokens (admin-only surface).
    pub fn list(&self) -> Vec<UserRecord> {
        self.store.list()
    }

    /// Public user listing.
    pub fn users(&self) -> Vec<UserInfo> {
        self.store
            .list()
            .into_iter()
            .map(|u| UserInfo {
                username: u.username,
                color: u.color,
            })
            .collect()
    }

    /// Seed admin accounts from configuration, skipping usernames that
    /// already exist.
    pub fn setup_admins(&self, admins: &[UserRecord]) {
        let mut count = 0;
        for admin in admins {
            if self.store.find_by_username(&admin.username).is_some() {
                continue;
            }

            let record = UserRecord {
                is_admin: true,
                ..admin.clone()
            };
            if self.store.insert(record).is_ok() {
                count += 1;
            }
        }

        info!(count, "admins configured");
    }
}

/// Derive a display color from a nickname: SHA-256 the name, map the low
/// bytes onto a hue, then HSL -> RGB at fixed saturation and lightness.
pub fn name_color(name: &str) -> i32 {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let hash = hasher.finalize();

    let seed = hash[0] as u32 + hash[1] as u32 * 256 + hash[2] as u32 * 256 * 256;
    let hue = (seed % 360) as f64;

    let (r, g, b) = hsl_to_rgb(hue, 0.6, 0.7);
    ((r << 16) | (g << 8) | b) as i32
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u32, u32, u32) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u32,
        ((g + m) * 255.0) as u32,
        ((b + m) * 255.0) as u32,
    )
}

// =============================================================================
// TESTS
// =============================================================================
