use serde::{Deserialize, Serialize};
use std::fmt;

pub const TILE_SIZE: i32 = 32;
pub const ATTACK_COOLDOWN_MS: u64 = 1000;
pub const STATE_SYNC_INTERVAL_MS: u64 = 100;
pub const AI_TICK_INTERVAL_MS: u64 = 500;
pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 20;
/// Largest UDP payload over IPv4. Every packet must fit in one datagram.
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Transport session key assigned by the server when a client joins.
pub type ConnectionId = u32;

/// Identity shared by players and monsters.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Pixel offset of a single one-tile step in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -TILE_SIZE),
            Direction::South => (0, TILE_SIZE),
            Direction::East => (TILE_SIZE, 0),
            Direction::West => (-TILE_SIZE, 0),
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::South
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TileData {
    pub sprite_id: u32,
    pub walkable: bool,
    pub transparent: bool,
}

/// Monster placement, in tile units.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonsterSpawn {
    pub monster_type: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MapData {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub spawn_x: i32,
    pub spawn_y: i32,
    /// Indexed `[layer][y][x]`.
    pub tiles: Vec<Vec<Vec<TileData>>>,
    #[serde(default)]
    pub monster_spawns: Vec<MonsterSpawn>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: EntityId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub sprite_id: u32,
    pub health: u32,
    pub max_health: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonsterState {
    pub id: EntityId,
    pub type_id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub health: u32,
    pub max_health: u32,
    pub sprite_id: u32,
    pub direction: Direction,
    pub is_alive: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DamageEvent {
    pub attacker_id: EntityId,
    pub target_id: EntityId,
    pub damage: u32,
    pub target_health: u32,
    pub target_max_health: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Client -> server intents
    Join {
        name: String,
    },
    Move {
        direction: Direction,
        timestamp: u64,
    },
    Attack {
        target_id: EntityId,
    },
    Heartbeat,
    Leave,

    // Server -> client facts
    Init {
        player_id: EntityId,
        map: MapData,
        players: Vec<PlayerState>,
        monsters: Vec<MonsterState>,
    },
    PlayerJoined(PlayerState),
    PlayerLeft {
        player_id: EntityId,
    },
    PlayerMoved {
        id: EntityId,
        x: i32,
        y: i32,
        direction: Direction,
    },
    GameState {
        players: Vec<PlayerState>,
        monsters: Vec<MonsterState>,
        timestamp: u64,
    },
    CombatDamage(DamageEvent),
    MonsterDied {
        monster_id: EntityId,
    },
    MonsterRespawned(MonsterState),
    MonstersState {
        monsters: Vec<MonsterState>,
    },
    Error {
        message: String,
    },
}

impl Packet {
    /// True for packets a client is allowed to send.
    pub fn is_intent(&self) -> bool {
        matches!(
            self,
            Packet::Join { .. }
                | Packet::Move { .. }
                | Packet::Attack { .. }
                | Packet::Heartbeat
                | Packet::Leave
        )
    }
}

/// Checks the join name length, counted in characters.
pub fn validate_player_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len < MIN_NAME_LEN || len > MAX_NAME_LEN {
        return Err(format!(
            "name must be between {} and {} characters",
            MIN_NAME_LEN, MAX_NAME_LEN
        ));
    }
    Ok(())
}
