//! Environment Configuration
//!
//! Runtime settings come from the environment: the two listen ports and the
//! admin accounts seeded at boot (`ADMINS`, a JSON array of user records).

use std::net::SocketAddr;

use tracing::{info, warn};

use crate::manager::auth::UserRecord;

const DEFAULT_PORT: u16 = 8087;
const DEFAULT_ADMIN_PORT: u16 = 8088;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket listen port.
    pub port: u16,
    /// HTTP admin surface port.
    pub admin_port: u16,
    /// Admin accounts seeded into the user store at boot.
    pub admins: Vec<UserRecord>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            admin_port: DEFAULT_ADMIN_PORT,
            admins: Vec::new(),
        }
    }
}

impl Config {
    /// Read configuration from environment variables, falling back to
    /// defaults on anything missing or malformed.
    pub fn from_env() -> Self {
        let port = read_port("PORT", DEFAULT_PORT);
        let admin_port = read_port("ADMIN_PORT", DEFAULT_ADMIN_PORT);

        let admins = match std::env::var("ADMINS") {
            Ok(raw) => match serde_json::from_str::<Vec<UserRecord>>(&raw) {
                Ok(admins) => admins,
                Err(e) => {
                    warn!("ADMINS is not valid JSON, ignoring: {e}");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        info!(count = admins.len(), "admins retrieved from environment");

        Self {
            port,
            admin_port,
            admins,
        }
    }

    pub fn ws_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.admin_port))
    }
}

fn read_port(var: &str, fallback: u16) -> u16 {
    std::env::var(var)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.admin_port, DEFAULT_ADMIN_PORT);
        assert!(config.admins.is_empty());
    }

    #[test]
    fn test_admins_json_shape() {
        let raw = r#"[{"token":"t","username":"op","color":0,"is_admin":true}]"#;
        let admins: Vec<UserRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(admins.len(), 1);
        assert!(admins[0].is_admin);
    }
}
