//! Monster types and live monster instances

use crate::error::{GameError, MapError};
use crate::player::DamageResult;
use crate::scheduler::RespawnScheduler;
use log::info;
use serde::{Deserialize, Serialize};
use shared::{Direction, EntityId, MonsterState};
use std::collections::BTreeMap;
use std::path::Path;

/// Immutable catalog entry describing a kind of monster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterType {
    pub id: u32,
    pub name: String,
    pub health: u32,
    pub damage: u32,
    pub sprite_id: u32,
    #[serde(alias = "respawnTime")]
    pub respawn_time_ms: u64,
}

/// Monster types keyed by their catalog key (`"rat"`, `"snake"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonsterCatalog {
    types: BTreeMap<String, MonsterType>,
}

impl MonsterCatalog {
    pub fn new(types: BTreeMap<String, MonsterType>) -> Result<Self, MapError> {
        let catalog = Self { types };
        if catalog.is_empty() {
            return Err(MapError::EmptyCatalog);
        }
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, MapError> {
        let types: BTreeMap<String, MonsterType> = serde_json::from_str(json)?;
        Self::new(types)
    }

    pub fn load(path: &Path) -> Result<Self, MapError> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&contents)?;
        info!(
            "Loaded {} monster types from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn get(&self, key: &str) -> Option<&MonsterType> {
        self.types.get(key)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for MonsterCatalog {
    /// Rat, snake and spider.
    fn default() -> Self {
        let entry = |id, name: &str, health, damage, sprite_id, respawn_time_ms| MonsterType {
            id,
            name: name.to_string(),
            health,
            damage,
            sprite_id,
            respawn_time_ms,
        };

        let mut types = BTreeMap::new();
        types.insert("rat".to_string(), entry(1, "Rat", 20, 5, 100, 10_000));
        types.insert("snake".to_string(), entry(2, "Snake", 35, 8, 101, 15_000));
        types.insert("spider".to_string(), entry(3, "Spider", 50, 12, 102, 20_000));

        Self { types }
    }
}

/// A live monster.
///
/// While `is_alive` is false the monster's health stays at zero, it takes no
/// damage and the behavior loop skips it until its respawn fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Monster {
    pub id: EntityId,
    pub type_id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub health: u32,
    pub max_health: u32,
    pub damage: u32,
    pub sprite_id: u32,
    pub respawn_time_ms: u64,
    pub direction: Direction,
    pub is_alive: bool,
    pub spawn_x: i32,
    pub spawn_y: i32,
}

impl Monster {
    /// Builds a monster of catalog type `type_key` at pixel position `(x, y)`.
    pub fn new(
        id: EntityId,
        catalog: &MonsterCatalog,
        type_key: &str,
        x: i32,
        y: i32,
    ) -> Result<Self, GameError> {
        let monster_type = catalog
            .get(type_key)
            .ok_or_else(|| GameError::UnknownMonsterType(type_key.to_string()))?;

        Ok(Self {
            id,
            type_id: monster_type.id,
            name: monster_type.name.clone(),
            x,
            y,
            health: monster_type.health,
            max_health: monster_type.health,
            damage: monster_type.damage,
            sprite_id: monster_type.sprite_id,
            respawn_time_ms: monster_type.respawn_time_ms,
            direction: Direction::South,
            is_alive: true,
            spawn_x: x,
            spawn_y: y,
        })
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn take_damage(&mut self, amount: u32) -> DamageResult {
        if !self.is_alive {
            return DamageResult {
                died: false,
                damage_applied: 0,
            };
        }

        let applied = amount.min(self.health);
        self.health -= applied;

        if self.health == 0 {
            self.is_alive = false;
            return DamageResult {
                died: true,
                damage_applied: applied,
            };
        }

        DamageResult {
            died: false,
            damage_applied: applied,
        }
    }

    /// Arms this monster's single respawn, `respawn_time_ms` after `now`.
    /// Any previously pending respawn for it is replaced.
    pub fn schedule_respawn(&self, scheduler: &mut RespawnScheduler, now: u64) -> u64 {
        let fire_at = now + self.respawn_time_ms;
        scheduler.schedule(self.id, fire_at);
        fire_at
    }

    /// Back to full health at the original spawn, facing south.
    pub fn respawn(&mut self) {
        self.x = self.spawn_x;
        self.y = self.spawn_y;
        self.health = self.max_health;
        self.direction = Direction::South;
        self.is_alive = true;
    }

    pub fn to_snapshot(&self) -> MonsterState {
        MonsterState {
            id: self.id,
            type_id: self.type_id,
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            health: self.health,
            max_health: self.max_health,
            sprite_id: self.sprite_id,
            direction: self.direction,
            is_alive: self.is_alive,
        }
    }
}
