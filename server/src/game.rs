//! Authoritative game state
//!
//! `GameState` owns every player and monster, the cooldown ledger and the
//! respawn queue. It is driven from a single task (the server loop), so each
//! operation runs to completion before the next one starts. Outbound facts go
//! through the injected `Broadcaster`; the engine never touches a socket.

use crate::behavior::{self, AiAction};
use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::combat::{AttackHit, Attacker, CombatSystem, Target};
use crate::error::GameError;
use crate::ids::IdGenerator;
use crate::monster::{Monster, MonsterCatalog};
use crate::movement::{greedy_step, step};
use crate::player::Player;
use crate::scheduler::RespawnScheduler;
use crate::world::World;
use log::{debug, info, warn};
use rand::RngCore;
use shared::{
    ConnectionId, DamageEvent, Direction, EntityId, MapData, MonsterState, Packet, PlayerState,
};
use std::collections::BTreeMap;

/// Collaborators the engine is constructed with.
pub struct GameServices {
    pub clock: Box<dyn Clock>,
    pub ids: Box<dyn IdGenerator>,
    pub broadcaster: Box<dyn Broadcaster>,
    pub rng: Box<dyn RngCore + Send>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    pub moved: bool,
    pub player: PlayerState,
}

/// A successful monster hit on a player during a behavior tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonsterAttackEvent {
    pub connection_id: ConnectionId,
    pub hit: AttackHit,
}

/// Fully copied view of every entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldSnapshot {
    pub players: Vec<PlayerState>,
    pub monsters: Vec<MonsterState>,
}

pub struct GameState {
    world: World,
    catalog: MonsterCatalog,
    players: BTreeMap<ConnectionId, Player>,
    monsters: BTreeMap<EntityId, Monster>,
    combat: CombatSystem,
    respawns: RespawnScheduler,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    broadcaster: Box<dyn Broadcaster>,
}

impl GameState {
    /// Starts with no players and no monsters; see `spawn_configured_monsters`.
    pub fn new(world: World, catalog: MonsterCatalog, services: GameServices) -> Self {
        Self {
            world,
            catalog,
            players: BTreeMap::new(),
            monsters: BTreeMap::new(),
            combat: CombatSystem::new(services.rng),
            respawns: RespawnScheduler::new(),
            clock: services.clock,
            ids: services.ids,
            broadcaster: services.broadcaster,
        }
    }

    /// Places a new player at the spawn point, sends them the full world and
    /// announces them to everyone else. A connection that already has a
    /// player is rejoined from scratch.
    pub fn join(&mut self, connection_id: ConnectionId, name: &str) -> PlayerState {
        if self.players.contains_key(&connection_id) {
            warn!("Connection {} joined twice, replacing its player", connection_id);
            self.leave(connection_id);
        }

        let id = self.ids.next_id();
        let (x, y) = self.world.spawn_point();
        let player = Player::new(id, connection_id, name.trim(), x, y);
        let state = player.to_state();
        self.players.insert(connection_id, player);

        info!(
            "Player {} '{}' joined on connection {} at ({}, {})",
            id, state.name, connection_id, x, y
        );

        let snapshot = self.snapshot();
        self.broadcaster.send_to(
            connection_id,
            Packet::Init {
                player_id: id,
                map: self.world.map().clone(),
                players: snapshot.players,
                monsters: snapshot.monsters,
            },
        );
        self.broadcaster
            .broadcast(Packet::PlayerJoined(state.clone()), Some(connection_id));

        state
    }

    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<PlayerState> {
        let player = self.players.remove(&connection_id)?;
        info!("Player {} '{}' left", player.id, player.name);

        self.broadcaster.broadcast(
            Packet::PlayerLeft {
                player_id: player.id,
            },
            Some(connection_id),
        );

        Some(player.to_state())
    }

    /// Turns the player to face `direction` and steps one tile if the
    /// destination is walkable.
    pub fn move_player(
        &mut self,
        connection_id: ConnectionId,
        direction: Direction,
    ) -> Result<MoveResult, GameError> {
        let player = self
            .players
            .get_mut(&connection_id)
            .ok_or(GameError::UnknownPlayer(connection_id))?;

        player.direction = direction;
        let (x, y) = step(player.position(), direction);
        let moved = self.world.is_walkable(x, y);

        if moved {
            player.x = x;
            player.y = y;
            self.broadcaster.broadcast(moved_packet(player), None);
        }

        Ok(MoveResult {
            moved,
            player: player.to_state(),
        })
    }

    /// Player attacks monster `target_id`.
    ///
    /// An out-of-range attack still fails, but the player takes one greedy
    /// step toward the target and the step is published like a normal move.
    pub fn attack_target(
        &mut self,
        connection_id: ConnectionId,
        target_id: EntityId,
    ) -> Result<AttackHit, GameError> {
        let now = self.clock.now_ms();

        let player = self
            .players
            .get_mut(&connection_id)
            .ok_or(GameError::UnknownPlayer(connection_id))?;
        let monster = self
            .monsters
            .get_mut(&target_id)
            .ok_or(GameError::UnknownMonster(target_id))?;

        let attacker = Attacker::player(player);
        match self
            .combat
            .attack(&attacker, Target::Monster(&mut *monster), now)
        {
            Ok(hit) => {
                self.broadcaster.broadcast(damage_packet(&hit), None);

                if hit.target_died {
                    let fire_at = monster.schedule_respawn(&mut self.respawns, now);
                    info!(
                        "{} {} killed by player {}, respawning at {}",
                        monster.name, monster.id, player.id, fire_at
                    );
                    self.broadcaster.broadcast(
                        Packet::MonsterDied {
                            monster_id: monster.id,
                        },
                        None,
                    );
                }

                Ok(hit)
            }
            Err(GameError::OutOfRange) => {
                if let Some((direction, (x, y))) =
                    greedy_step(&self.world, player.position(), monster.position())
                {
                    player.direction = direction;
                    player.x = x;
                    player.y = y;
                    self.broadcaster.broadcast(moved_packet(player), None);
                }
                Err(GameError::OutOfRange)
            }
            Err(e) => Err(e),
        }
    }

    /// One behavior pass over every living monster, in id order.
    pub fn tick_monster_ai(&mut self, now: u64) -> Vec<MonsterAttackEvent> {
        let mut events = Vec::new();
        let mut any_moved = false;

        for monster in self.monsters.values_mut() {
            let action = behavior::decide(
                monster,
                self.players.values(),
                &self.world,
                &self.combat,
                now,
            );

            match action {
                AiAction::Idle => {}
                AiAction::Step(direction, (x, y)) => {
                    monster.direction = direction;
                    monster.x = x;
                    monster.y = y;
                    any_moved = true;
                }
                AiAction::Attack(connection_id) => {
                    let Some(player) = self.players.get_mut(&connection_id) else {
                        continue;
                    };
                    let attacker = Attacker::monster(monster);

                    match self
                        .combat
                        .attack(&attacker, Target::Player(&mut *player), now)
                    {
                        Ok(hit) => {
                            debug!(
                                "{} {} hit player {} for {} ({} left)",
                                monster.name, monster.id, player.id, hit.damage, hit.target_health
                            );
                            self.broadcaster.broadcast(damage_packet(&hit), None);
                            events.push(MonsterAttackEvent { connection_id, hit });
                        }
                        Err(e) => debug!("{} {} attack failed: {}", monster.name, monster.id, e),
                    }
                }
            }
        }

        if any_moved {
            self.broadcaster.broadcast(
                Packet::MonstersState {
                    monsters: self.monster_snapshots(),
                },
                None,
            );
        }

        events
    }

    /// Fires every respawn due at `now`.
    pub fn process_respawns(&mut self, now: u64) -> Vec<MonsterState> {
        let mut respawned = Vec::new();

        for id in self.respawns.take_due(now) {
            let Some(monster) = self.monsters.get_mut(&id) else {
                continue;
            };
            monster.respawn();
            info!(
                "{} {} respawned at ({}, {})",
                monster.name, monster.id, monster.x, monster.y
            );

            let snapshot = monster.to_snapshot();
            self.broadcaster
                .broadcast(Packet::MonsterRespawned(snapshot.clone()), None);
            respawned.push(snapshot);
        }

        respawned
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            players: self.players.values().map(Player::to_state).collect(),
            monsters: self.monster_snapshots(),
        }
    }

    /// Publishes the periodic full-state packet.
    pub fn broadcast_state(&self) {
        let snapshot = self.snapshot();
        self.broadcaster.broadcast(
            Packet::GameState {
                players: snapshot.players,
                monsters: snapshot.monsters,
                timestamp: self.clock.now_ms(),
            },
            None,
        );
    }

    /// Adds a monster of catalog type `type_key` at tile `(tile_x, tile_y)`.
    pub fn spawn_monster(
        &mut self,
        type_key: &str,
        tile_x: i32,
        tile_y: i32,
    ) -> Result<EntityId, GameError> {
        if self.catalog.get(type_key).is_none() {
            return Err(GameError::UnknownMonsterType(type_key.to_string()));
        }

        let x = World::tile_to_pixel(tile_x);
        let y = World::tile_to_pixel(tile_y);
        if !self.world.is_walkable(x, y) {
            warn!(
                "Spawning {} on unwalkable tile ({}, {})",
                type_key, tile_x, tile_y
            );
        }

        let id = self.ids.next_id();
        let monster = Monster::new(id, &self.catalog, type_key, x, y)?;
        info!("Spawned {} {} at ({}, {})", monster.name, id, tile_x, tile_y);
        self.monsters.insert(id, monster);

        Ok(id)
    }

    /// Spawns everything in the map's spawn list. An unknown type stops
    /// world initialization.
    pub fn spawn_configured_monsters(&mut self) -> Result<usize, GameError> {
        let spawns = self.world.monster_spawns().to_vec();
        for spawn in &spawns {
            self.spawn_monster(&spawn.monster_type, spawn.x, spawn.y)?;
        }
        Ok(spawns.len())
    }

    /// Drops every player, clears cooldowns and pending respawns and puts
    /// every monster back at its spawn.
    pub fn reset(&mut self) {
        self.players.clear();
        self.combat.clear();
        self.respawns.clear();
        for monster in self.monsters.values_mut() {
            monster.respawn();
        }
        info!("Game state reset, {} monsters restored", self.monsters.len());
    }

    pub fn player(&self, connection_id: ConnectionId) -> Option<&Player> {
        self.players.get(&connection_id)
    }

    pub fn player_by_id(&self, id: EntityId) -> Option<&Player> {
        self.players.values().find(|player| player.id == id)
    }

    pub fn monster(&self, id: EntityId) -> Option<&Monster> {
        self.monsters.get(&id)
    }

    pub fn monsters(&self) -> impl Iterator<Item = &Monster> {
        self.monsters.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn monster_count(&self) -> usize {
        self.monsters.len()
    }

    pub fn pending_respawns(&self) -> usize {
        self.respawns.pending()
    }

    pub fn map(&self) -> &MapData {
        self.world.map()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn monster_snapshots(&self) -> Vec<MonsterState> {
        self.monsters.values().map(Monster::to_snapshot).collect()
    }
}

fn moved_packet(player: &Player) -> Packet {
    Packet::PlayerMoved {
        id: player.id,
        x: player.x,
        y: player.y,
        direction: player.direction,
    }
}

fn damage_packet(hit: &AttackHit) -> Packet {
    Packet::CombatDamage(DamageEvent {
        attacker_id: hit.attacker_id,
        target_id: hit.target_id,
        damage: hit.damage,
        target_health: hit.target_health,
        target_max_health: hit.target_max_health,
    })
}
