//! Cooldown-gated combat between players and monsters
//!
//! The same rules apply in both directions. An attack is checked for
//! cooldown, then target liveness, then range; the first failing check wins.
//! A successful hit rolls `floor(base * [0.8, 1.2))`, clamps it to the
//! target's health and stamps the attacker's cooldown.

use crate::error::GameError;
use crate::monster::Monster;
use crate::movement::distance;
use crate::player::{DamageResult, Player};
use rand::{Rng, RngCore};
use shared::{EntityId, ATTACK_COOLDOWN_MS, TILE_SIZE};
use std::collections::HashMap;

pub const PLAYER_ATTACK_RANGE: f64 = 2.0 * TILE_SIZE as f64;
pub const MONSTER_ATTACK_RANGE: f64 = 1.5 * TILE_SIZE as f64;
pub const PLAYER_BASE_DAMAGE: u32 = 10;

const MIN_ROLL: f64 = 0.8;
const MAX_ROLL: f64 = 1.2;

/// Everything combat needs to know about the attacking side, copied out so
/// the target can be borrowed mutably from the same engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attacker {
    pub id: EntityId,
    pub position: (i32, i32),
    pub base_damage: u32,
    pub range: f64,
}

impl Attacker {
    pub fn player(player: &Player) -> Self {
        Self {
            id: player.id,
            position: player.position(),
            base_damage: PLAYER_BASE_DAMAGE,
            range: PLAYER_ATTACK_RANGE,
        }
    }

    pub fn monster(monster: &Monster) -> Self {
        Self {
            id: monster.id,
            position: monster.position(),
            base_damage: monster.damage,
            range: MONSTER_ATTACK_RANGE,
        }
    }
}

pub enum Target<'a> {
    Player(&'a mut Player),
    Monster(&'a mut Monster),
}

impl Target<'_> {
    pub fn id(&self) -> EntityId {
        match self {
            Target::Player(player) => player.id,
            Target::Monster(monster) => monster.id,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        match self {
            Target::Player(player) => player.position(),
            Target::Monster(monster) => monster.position(),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Target::Player(player) => player.is_alive(),
            Target::Monster(monster) => monster.is_alive,
        }
    }

    pub fn health(&self) -> u32 {
        match self {
            Target::Player(player) => player.health,
            Target::Monster(monster) => monster.health,
        }
    }

    pub fn max_health(&self) -> u32 {
        match self {
            Target::Player(player) => player.max_health,
            Target::Monster(monster) => monster.max_health,
        }
    }

    fn apply_damage(&mut self, amount: u32) -> DamageResult {
        match self {
            Target::Player(player) => player.take_damage(amount),
            Target::Monster(monster) => monster.take_damage(amount),
        }
    }
}

/// A successful attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackHit {
    pub attacker_id: EntityId,
    pub target_id: EntityId,
    pub damage: u32,
    pub target_health: u32,
    pub target_max_health: u32,
    pub target_died: bool,
}

pub struct CombatSystem {
    /// Last successful attack per entity. Never pruned.
    cooldowns: HashMap<EntityId, u64>,
    rng: Box<dyn RngCore + Send>,
}

impl CombatSystem {
    pub fn new(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            cooldowns: HashMap::new(),
            rng,
        }
    }

    pub fn attack(
        &mut self,
        attacker: &Attacker,
        mut target: Target<'_>,
        now: u64,
    ) -> Result<AttackHit, GameError> {
        let remaining_ms = self.cooldown_remaining(attacker.id, now);
        if remaining_ms > 0 {
            return Err(GameError::OnCooldown { remaining_ms });
        }

        if !target.is_alive() {
            return Err(GameError::TargetDead);
        }

        if distance(attacker.position, target.position()) > attacker.range {
            return Err(GameError::OutOfRange);
        }

        let rolled = self.roll_damage(attacker.base_damage);
        let result = target.apply_damage(rolled.min(target.health()));
        self.cooldowns.insert(attacker.id, now);

        Ok(AttackHit {
            attacker_id: attacker.id,
            target_id: target.id(),
            damage: result.damage_applied,
            target_health: target.health(),
            target_max_health: target.max_health(),
            target_died: result.died,
        })
    }

    pub fn cooldown_remaining(&self, id: EntityId, now: u64) -> u64 {
        match self.cooldowns.get(&id) {
            Some(&last) => ATTACK_COOLDOWN_MS.saturating_sub(now.saturating_sub(last)),
            None => 0,
        }
    }

    pub fn is_on_cooldown(&self, id: EntityId, now: u64) -> bool {
        self.cooldown_remaining(id, now) > 0
    }

    pub fn clear(&mut self) {
        self.cooldowns.clear();
    }

    fn roll_damage(&mut self, base_damage: u32) -> u32 {
        let multiplier: f64 = self.rng.gen_range(MIN_ROLL..MAX_ROLL);
        (base_damage as f64 * multiplier).floor() as u32
    }
}
