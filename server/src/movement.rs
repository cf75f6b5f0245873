//! Tile-step helpers shared by player movement, auto-approach and monster chase.

use crate::world::World;
use shared::Direction;

/// Position one tile away from `from` in `direction`.
pub fn step(from: (i32, i32), direction: Direction) -> (i32, i32) {
    let (dx, dy) = direction.offset();
    (from.0 + dx, from.1 + dy)
}

/// Euclidean distance in pixels.
pub fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// One tile toward `to`, moving along the axis with the larger gap first and
/// falling back to the other axis when the first is blocked. Equal gaps go
/// horizontal first. Returns `None` when already there or both are blocked.
pub fn greedy_step(
    world: &World,
    from: (i32, i32),
    to: (i32, i32),
) -> Option<(Direction, (i32, i32))> {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;

    let horizontal = match dx {
        d if d > 0 => Some(Direction::East),
        d if d < 0 => Some(Direction::West),
        _ => None,
    };
    let vertical = match dy {
        d if d > 0 => Some(Direction::South),
        d if d < 0 => Some(Direction::North),
        _ => None,
    };

    let (primary, secondary) = if dx.abs() >= dy.abs() {
        (horizontal, vertical)
    } else {
        (vertical, horizontal)
    };

    [primary, secondary]
        .into_iter()
        .flatten()
        .map(|direction| (direction, step(from, direction)))
        .find(|&(_, (x, y))| world.is_walkable(x, y))
}
