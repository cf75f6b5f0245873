//! Monster aggro, chase and attack decisions.

use crate::combat::{CombatSystem, MONSTER_ATTACK_RANGE};
use crate::monster::Monster;
use crate::movement::{distance, greedy_step};
use crate::player::Player;
use crate::world::World;
use shared::{ConnectionId, Direction, TILE_SIZE};

pub const AGGRO_RADIUS: f64 = 3.0 * TILE_SIZE as f64;

/// What one monster does during one behavior tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    Idle,
    /// Attack the player on this connection.
    Attack(ConnectionId),
    /// Step one tile in the direction, landing on the position.
    Step(Direction, (i32, i32)),
}

/// Closest living player within `radius` of `position`. Ties keep the
/// first player yielded.
pub fn nearest_player<'a, I>(position: (i32, i32), players: I, radius: f64) -> Option<(&'a Player, f64)>
where
    I: IntoIterator<Item = &'a Player>,
{
    let mut nearest: Option<(&Player, f64)> = None;

    for player in players {
        if !player.is_alive() {
            continue;
        }
        let d = distance(position, player.position());
        if d > radius {
            continue;
        }
        if nearest.map_or(true, |(_, best)| d < best) {
            nearest = Some((player, d));
        }
    }

    nearest
}

/// Never both moves and attacks. A monster within striking distance but still
/// on cooldown waits instead of closing in further.
pub fn decide<'a, I>(
    monster: &Monster,
    players: I,
    world: &World,
    combat: &CombatSystem,
    now: u64,
) -> AiAction
where
    I: IntoIterator<Item = &'a Player>,
{
    if !monster.is_alive {
        return AiAction::Idle;
    }

    let Some((target, d)) = nearest_player(monster.position(), players, AGGRO_RADIUS) else {
        return AiAction::Idle;
    };

    if d <= MONSTER_ATTACK_RANGE {
        if combat.is_on_cooldown(monster.id, now) {
            return AiAction::Idle;
        }
        return AiAction::Attack(target.connection_id);
    }

    match greedy_step(world, monster.position(), target.position()) {
        Some((direction, to)) => AiAction::Step(direction, to),
        None => AiAction::Idle,
    }
}
