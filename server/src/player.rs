use shared::{ConnectionId, Direction, EntityId, PlayerState};

pub const DEFAULT_PLAYER_HEALTH: u32 = 100;

/// Result of applying damage to a player or monster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub died: bool,
    pub damage_applied: u32,
}

/// A connected player. Owned by the game state; only engine operations
/// mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: EntityId,
    pub connection_id: ConnectionId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub sprite_id: u32,
    pub health: u32,
    pub max_health: u32,
}

impl Player {
    pub fn new(id: EntityId, connection_id: ConnectionId, name: &str, x: i32, y: i32) -> Self {
        Self {
            id,
            connection_id,
            name: name.to_string(),
            x,
            y,
            direction: Direction::South,
            sprite_id: 0,
            health: DEFAULT_PLAYER_HEALTH,
            max_health: DEFAULT_PLAYER_HEALTH,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Caps damage at the remaining health so health never underflows.
    pub fn take_damage(&mut self, amount: u32) -> DamageResult {
        if !self.is_alive() {
            return DamageResult {
                died: false,
                damage_applied: 0,
            };
        }

        let applied = amount.min(self.health);
        self.health -= applied;

        DamageResult {
            died: self.health == 0,
            damage_applied: applied,
        }
    }

    pub fn to_state(&self) -> PlayerState {
        PlayerState {
            id: self.id,
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            direction: self.direction,
            sprite_id: self.sprite_id,
            health: self.health,
            max_health: self.max_health,
        }
    }
}
