//! Protocol Messages
//!
//! Binary wire format for client-server communication over WebSocket.
//! Every frame starts with a message-type byte and is little-endian
//! throughout; strings are null-terminated UTF-8. The player action body is
//! a null-terminated JSON document so bots can compose it by hand.

use thiserror::Error;

use crate::core::codec::{ByteReader, ByteWriter, CodecError};
use crate::core::collider::Collider;
use crate::core::point::Point;
use crate::game::map::ArenaMap;
use crate::game::player::{Controls, STORAGE_SIZE};
use crate::game::state::World;

/// Frame discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    GameState = 1,
    PlayerAction = 3,
    MapState = 4,
    GameEnd = 5,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::GameState),
            3 => Ok(MessageType::PlayerAction),
            4 => Ok(MessageType::MapState),
            5 => Ok(MessageType::GameEnd),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame's leading type byte is not a known message type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The frame body was truncated or malformed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The player action JSON payload did not parse.
    #[error("invalid action payload: {0}")]
    InvalidAction(#[from] serde_json::Error),

    /// A zero-length frame carries no type byte.
    #[error("empty frame")]
    EmptyFrame,
}

/// A decoded frame.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    GameState(GameStateFrame),
    PlayerAction(Controls),
    MapState(MapStateFrame),
    GameEnd,
}

/// Decoded view of one projectile in a game-state frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub uuid: [u8; 16],
    pub position: Point,
    pub destination: Point,
}

/// Decoded view of a player's blade.
#[derive(Debug, Clone, PartialEq)]
pub struct BladeSnapshot {
    pub start: Point,
    pub end: Point,
    pub rotation: f64,
}

/// Decoded view of one player in a game-state frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub nickname: String,
    pub color: i32,
    pub health: i32,
    pub score: i64,
    pub position: Point,
    pub dest: Option<Point>,
    pub current_weapon: u8,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub blade: BladeSnapshot,
}

/// Decoded view of one coin.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinSnapshot {
    pub uuid: [u8; 16],
    pub position: Point,
    pub value: i32,
}

/// Decoded game-state frame body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameStateFrame {
    pub current_tick: i32,
    pub current_round: i8,
    pub players: Vec<PlayerSnapshot>,
    pub coins: Vec<CoinSnapshot>,
}

/// Decoded map-state frame body.
#[derive(Debug, Clone, PartialEq)]
pub struct MapStateFrame {
    pub density: Vec<Vec<u8>>,
    pub walls: Vec<Collider>,
    pub storage: [u8; STORAGE_SIZE],
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a full game-state frame: tick, round, every player (with
/// projectiles and blade), every coin.
pub fn encode_game_state(world: &World, current_tick: i32, current_round: i8) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageType::GameState as u8);

    w.write_i32(current_tick);
    w.write_i8(current_round);

    w.write_i32(world.players.len() as i32);
    for player in world.players.values() {
        player.encode(&mut w);
    }

    w.write_i32(world.coins.len() as i32);
    for coin in world.coins.list() {
        coin.encode(&mut w);
    }

    w.into_bytes()
}

/// Encode a map-state frame. Wall geometry is included only for admins;
/// everyone gets the density grid and the receiving player's storage blob.
pub fn encode_map_state(
    map: &ArenaMap,
    with_walls: bool,
    storage: &[u8; STORAGE_SIZE],
) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageType::MapState as u8);

    map.encode(&mut w, with_walls);
    w.write_bytes(storage);

    w.into_bytes()
}

/// Encode the empty game-end frame.
pub fn encode_game_end() -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageType::GameEnd as u8);
    w.into_bytes()
}

/// Encode a player action the way bot clients send it: type byte followed by
/// a null-terminated JSON document.
pub fn encode_player_action(controls: &Controls) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageType::PlayerAction as u8);

    let json = serde_json::to_string(controls).unwrap_or_default();
    w.write_string(&json);

    w.into_bytes()
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a frame by its leading message-type byte.
pub fn decode(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let (&type_byte, body) = data.split_first().ok_or(ProtocolError::EmptyFrame)?;
    let message_type = MessageType::try_from(type_byte)?;

    let mut r = ByteReader::new(body);
    match message_type {
        MessageType::GameState => Ok(ClientMessage::GameState(decode_game_state(&mut r)?)),
        MessageType::PlayerAction => Ok(ClientMessage::PlayerAction(decode_player_action(&mut r)?)),
        MessageType::MapState => Ok(ClientMessage::MapState(decode_map_state(&mut r)?)),
        MessageType::GameEnd => Ok(ClientMessage::GameEnd),
    }
}

fn decode_player_action(r: &mut ByteReader<'_>) -> Result<Controls, ProtocolError> {
    let json = r.read_string()?;
    Ok(serde_json::from_str(&json)?)
}

fn decode_game_state(r: &mut ByteReader<'_>) -> Result<GameStateFrame, ProtocolError> {
    let current_tick = r.read_i32()?;
    let current_round = r.read_i8()?;

    let player_count = r.read_i32()?;
    let mut players = Vec::with_capacity(player_count.max(0) as usize);
    for _ in 0..player_count {
        players.push(decode_player(r)?);
    }

    let coin_count = r.read_i32()?;
    let mut coins = Vec::with_capacity(coin_count.max(0) as usize);
    for _ in 0..coin_count {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(r.read_bytes(16)?);
        let position = Point::decode(r)?;
        let value = r.read_i32()?;
        coins.push(CoinSnapshot {
            uuid,
            position,
            value,
        });
    }

    Ok(GameStateFrame {
        current_tick,
        current_round,
        players,
        coins,
    })
}

fn decode_player(r: &mut ByteReader<'_>) -> Result<PlayerSnapshot, ProtocolError> {
    let nickname = r.read_string()?;
    let color = r.read_i32()?;
    let health = r.read_i32()?;
    let score = r.read_i64()?;
    let position = Point::decode(r)?;

    let dest = if r.read_bool()? {
        Some(Point::decode(r)?)
    } else {
        None
    };

    let current_weapon = r.read_u8()?;

    let projectile_count = r.read_i32()?;
    let mut projectiles = Vec::with_capacity(projectile_count.max(0) as usize);
    for _ in 0..projectile_count {
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(r.read_bytes(16)?);
        let position = Point::decode(r)?;
        let destination = Point::decode(r)?;
        projectiles.push(ProjectileSnapshot {
            uuid,
            position,
            destination,
        });
    }

    let blade = BladeSnapshot {
        start: Point::decode(r)?,
        end: Point::decode(r)?,
        rotation: r.read_f64()?,
    };

    Ok(PlayerSnapshot {
        nickname,
        color,
        health,
        score,
        position,
        dest,
        current_weapon,
        projectiles,
        blade,
    })
}

fn decode_map_state(r: &mut ByteReader<'_>) -> Result<MapStateFrame, ProtocolError> {
    let size = r.read_i8()?.max(0) as usize;

    let mut density = Vec::with_capacity(size);
    for _ in 0..size {
        let mut row = Vec::with_capacity(size);
        for _ in 0..size {
            row.push(r.read_u8()?);
        }
        density.push(row);
    }

    let wall_count = r.read_i32()?;
    let mut walls = Vec::with_capacity(wall_count.max(0) as usize);
    for _ in 0..wall_count {
        walls.push(Collider::decode(r)?);
    }

    let mut storage = [0u8; STORAGE_SIZE];
    storage.copy_from_slice(r.read_bytes(STORAGE_SIZE)?);

    Ok(MapStateFrame {
        density,
        walls,
        storage,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::{Player, Weapon};
    use crate::game::scorer::Scorer;
    use crate::network::client::Client;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_world() -> World {
        let mut world = World::default();

        let mut alice = Player::new(
            "alice".to_string(),
            0x00FF_AA11,
            Client::detached(),
            Point::new(5.0, 5.0),
        );
        alice.controls.dest = Some(Point::new(9.0, 9.0));
        alice.controls.switch_weapon = Some(Weapon::Cannon);
        world.players.insert("alice".to_string(), alice);

        let mut bob = Player::new(
            "bob".to_string(),
            0x0012_3456,
            Client::detached(),
            Point::new(15.0, 25.0),
        );
        bob.take_dmg(40);
        bob.add_score(80);
        world.players.insert("bob".to_string(), bob);

        world.coins.set(vec![
            Scorer::coin_at(Point::new(33.0, 44.0)),
            Scorer::big_coin(Point::new(55.0, 55.0)),
        ]);

        world
    }

    #[test]
    fn test_game_state_roundtrip() {
        let world = sample_world();
        let frame = encode_game_state(&world, 120, 1);

        let decoded = match decode(&frame).unwrap() {
            ClientMessage::GameState(state) => state,
            other => panic!("wrong message type: {other:?}"),
        };

        assert_eq!(decoded.current_tick, 120);
        assert_eq!(decoded.current_round, 1);
        assert_eq!(decoded.players.len(), 2);
        assert_eq!(decoded.coins.len(), 2);

        let alice = decoded
            .players
            .iter()
            .find(|p| p.nickname == "alice")
            .unwrap();
        assert_eq!(alice.color, 0x00FF_AA11);
        assert_eq!(alice.health, 100);
        assert_eq!(alice.dest, Some(Point::new(9.0, 9.0)));

        let bob = decoded.players.iter().find(|p| p.nickname == "bob").unwrap();
        assert_eq!(bob.health, 60);
        assert_eq!(bob.score, 80);
        assert_eq!(bob.dest, None);
    }

    #[test]
    fn test_game_state_carries_projectiles() {
        let mut world = sample_world();
        {
            let alice = world.players.get_mut("alice").unwrap();
            alice
                .cannon
                .shoot_at(Point::new(5.0, 5.0), Point::new(50.0, 5.0));
        }

        let frame = encode_game_state(&world, 1, 0);
        let ClientMessage::GameState(decoded) = decode(&frame).unwrap() else {
            panic!("wrong message type");
        };

        let alice = decoded
            .players
            .iter()
            .find(|p| p.nickname == "alice")
            .unwrap();
        assert_eq!(alice.projectiles.len(), 1);
        assert_eq!(alice.projectiles[0].position, Point::new(5.0, 5.0));
        assert_eq!(alice.projectiles[0].destination, Point::new(50.0, 5.0));
    }

    #[test]
    fn test_map_state_roundtrip() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut map = ArenaMap::new();
        map.setup_with(&mut rng).expect("map setup");

        let mut storage = [0u8; STORAGE_SIZE];
        storage[..5].copy_from_slice(b"state");

        let frame = encode_map_state(&map, true, &storage);
        let ClientMessage::MapState(decoded) = decode(&frame).unwrap() else {
            panic!("wrong message type");
        };

        assert_eq!(decoded.density.len(), map.discrete_map().len());
        assert_eq!(decoded.walls.len(), map.colliders().len());
        assert_eq!(&decoded.storage[..5], b"state");
    }

    #[test]
    fn test_map_state_without_walls() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut map = ArenaMap::new();
        map.setup_with(&mut rng).expect("map setup");

        let frame = encode_map_state(&map, false, &[0u8; STORAGE_SIZE]);
        let ClientMessage::MapState(decoded) = decode(&frame).unwrap() else {
            panic!("wrong message type");
        };

        assert!(decoded.walls.is_empty());
        assert!(!decoded.density.is_empty());
    }

    #[test]
    fn test_player_action_roundtrip() {
        let controls = Controls {
            dest: Some(Point::new(5.0, 6.5)),
            save: Some("YWJj".to_string()),
            switch_weapon: Some(Weapon::Blade),
            shoot: None,
            rotate_blade: Some(0.25),
        };

        let frame = encode_player_action(&controls);
        assert_eq!(frame[0], MessageType::PlayerAction as u8);
        assert_eq!(*frame.last().unwrap(), 0);

        let ClientMessage::PlayerAction(decoded) = decode(&frame).unwrap() else {
            panic!("wrong message type");
        };
        assert_eq!(decoded.dest, Some(Point::new(5.0, 6.5)));
        assert_eq!(decoded.save.as_deref(), Some("YWJj"));
        assert_eq!(decoded.switch_weapon, Some(Weapon::Blade));
        assert_eq!(decoded.rotate_blade, Some(0.25));
    }

    #[test]
    fn test_raw_json_action_decodes() {
        let mut frame = vec![MessageType::PlayerAction as u8];
        frame.extend_from_slice(br#"{"dest":{"x":1.0,"y":2.0},"rotate_blade":3.14}"#);
        frame.push(0);

        let ClientMessage::PlayerAction(controls) = decode(&frame).unwrap() else {
            panic!("wrong message type");
        };
        assert_eq!(controls.dest, Some(Point::new(1.0, 2.0)));
        assert_eq!(controls.rotate_blade, Some(3.14));
    }

    #[test]
    fn test_malformed_action_is_an_error() {
        let mut frame = vec![MessageType::PlayerAction as u8];
        frame.extend_from_slice(b"{not json");
        frame.push(0);

        assert!(matches!(
            decode(&frame),
            Err(ProtocolError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_unknown_weapon_id_is_an_error() {
        let mut frame = vec![MessageType::PlayerAction as u8];
        frame.extend_from_slice(br#"{"switch":7}"#);
        frame.push(0);

        assert!(matches!(
            decode(&frame),
            Err(ProtocolError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_game_end_roundtrip() {
        let frame = encode_game_end();
        assert_eq!(frame, vec![MessageType::GameEnd as u8]);
        assert!(matches!(decode(&frame).unwrap(), ClientMessage::GameEnd));
    }

    #[test]
    fn test_unknown_type_and_empty_frame() {
        assert!(matches!(
            decode(&[9]),
            Err(ProtocolError::UnknownMessageType(9))
        ));
        assert!(matches!(decode(&[]), Err(ProtocolError::EmptyFrame)));
    }

    #[test]
    fn test_truncated_game_state_is_an_error() {
        let world = sample_world();
        let frame = encode_game_state(&world, 1, 0);

        let truncated = &frame[..frame.len() / 2];
        assert!(matches!(decode(truncated), Err(ProtocolError::Codec(_))));
    }
}
