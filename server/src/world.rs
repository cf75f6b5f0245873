//! Static collision map
//!
//! The world is loaded once at startup and never mutated afterwards. Every
//! movement in the game, player or monster, goes through `World::is_walkable`.

use crate::error::MapError;
use log::info;
use shared::{MapData, MonsterSpawn, TileData, MAX_PACKET_SIZE, TILE_SIZE};
use std::path::Path;

/// Room left in the init packet for the player and monster lists.
const INIT_HEADROOM: usize = 16 * 1024;

/// Largest encoded map that still fits in a single init datagram.
pub const MAX_MAP_BYTES: u64 = (MAX_PACKET_SIZE - INIT_HEADROOM) as u64;

const GRASS: TileData = TileData {
    sprite_id: 0,
    walkable: true,
    transparent: true,
};
const TREE: TileData = TileData {
    sprite_id: 1,
    walkable: false,
    transparent: false,
};
const STONE_WALL: TileData = TileData {
    sprite_id: 3,
    walkable: false,
    transparent: false,
};

/// Immutable tile grid plus the player spawn point.
#[derive(Debug, Clone)]
pub struct World {
    map: MapData,
}

impl World {
    /// Validates the map shape, encoded size and spawn point.
    pub fn new(map: MapData) -> Result<Self, MapError> {
        if map.width == 0 || map.height == 0 {
            return Err(MapError::EmptyDimensions {
                width: map.width,
                height: map.height,
            });
        }
        if map.tiles.is_empty() {
            return Err(MapError::NoLayers);
        }

        for (layer, rows) in map.tiles.iter().enumerate() {
            let bad_row = rows.iter().find(|row| row.len() != map.width);
            if rows.len() != map.height || bad_row.is_some() {
                return Err(MapError::LayerShape {
                    layer,
                    rows: rows.len(),
                    columns: bad_row.map_or(map.width, |row| row.len()),
                    width: map.width,
                    height: map.height,
                });
            }
        }

        let bytes = bincode::serialized_size(&map)?;
        if bytes > MAX_MAP_BYTES {
            return Err(MapError::TooLarge {
                bytes,
                limit: MAX_MAP_BYTES,
            });
        }

        let world = World { map };
        let (sx, sy) = world.spawn_point();
        if !world.is_walkable(sx, sy) {
            return Err(MapError::UnwalkableSpawn {
                x: world.map.spawn_x,
                y: world.map.spawn_y,
            });
        }

        Ok(world)
    }

    pub fn from_json(json: &str) -> Result<Self, MapError> {
        let map: MapData = serde_json::from_str(json)?;
        Self::new(map)
    }

    pub fn load(path: &Path) -> Result<Self, MapError> {
        let contents = std::fs::read_to_string(path)?;
        let world = Self::from_json(&contents)?;
        info!(
            "Loaded map '{}' ({}x{}) from {}",
            world.map.name,
            world.map.width,
            world.map.height,
            path.display()
        );
        Ok(world)
    }

    /// The built-in 20x20 starter map: stone border, four trees, grass
    /// everywhere else, spawn in the middle.
    pub fn starter_town() -> Self {
        let (width, height) = (20usize, 20usize);
        let trees = [(5, 5), (14, 5), (5, 14), (14, 14)];

        let layer: Vec<Vec<TileData>> = (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| {
                        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                            STONE_WALL
                        } else if trees.contains(&(x, y)) {
                            TREE
                        } else {
                            GRASS
                        }
                    })
                    .collect()
            })
            .collect();

        let spawn = |monster_type: &str, x: i32, y: i32| MonsterSpawn {
            monster_type: monster_type.to_string(),
            x,
            y,
        };

        World {
            map: MapData {
                version: "1.0.0".to_string(),
                name: "Starter Town".to_string(),
                width,
                height,
                spawn_x: 10,
                spawn_y: 10,
                tiles: vec![layer],
                monster_spawns: vec![
                    spawn("rat", 3, 3),
                    spawn("rat", 16, 3),
                    spawn("snake", 3, 16),
                    spawn("spider", 16, 16),
                ],
            },
        }
    }

    /// Pixel coordinates of the tile-aligned spawn location.
    pub fn spawn_point(&self) -> (i32, i32) {
        (
            Self::tile_to_pixel(self.map.spawn_x),
            Self::tile_to_pixel(self.map.spawn_y),
        )
    }

    /// Looks up the tile under a pixel position. Floor division keeps
    /// negative pixels off the grid instead of folding them onto tile 0.
    pub fn tile_at(&self, x: i32, y: i32, layer: usize) -> Option<&TileData> {
        let tile_x = Self::pixel_to_tile(x);
        let tile_y = Self::pixel_to_tile(y);

        if tile_x < 0
            || tile_x as usize >= self.map.width
            || tile_y < 0
            || tile_y as usize >= self.map.height
        {
            return None;
        }

        self.map
            .tiles
            .get(layer)?
            .get(tile_y as usize)?
            .get(tile_x as usize)
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile_at(x, y, 0).map_or(false, |tile| tile.walkable)
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn monster_spawns(&self) -> &[MonsterSpawn] {
        &self.map.monster_spawns
    }

    pub fn width(&self) -> usize {
        self.map.width
    }

    pub fn height(&self) -> usize {
        self.map.height
    }

    pub fn pixel_to_tile(px: i32) -> i32 {
        px.div_euclid(TILE_SIZE)
    }

    pub fn tile_to_pixel(tile: i32) -> i32 {
        tile * TILE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map(width: usize, height: usize) -> MapData {
        MapData {
            version: "1.0.0".to_string(),
            name: "test".to_string(),
            width,
            height,
            spawn_x: 0,
            spawn_y: 0,
            tiles: vec![vec![vec![GRASS; width]; height]],
            monster_spawns: vec![],
        }
    }

    #[test]
    fn test_spawn_point_in_pixels() {
        let world = World::starter_town();
        assert_eq!(world.spawn_point(), (320, 320));
    }

    #[test]
    fn test_starter_town_layout() {
        let world = World::starter_town();
        assert_eq!(world.width(), 20);
        assert_eq!(world.height(), 20);
        // Border
        assert!(!world.is_walkable(0, 0));
        assert!(!world.is_walkable(19 * 32, 19 * 32));
        // Tree
        assert!(!world.is_walkable(5 * 32, 5 * 32));
        assert_eq!(world.tile_at(5 * 32, 5 * 32, 0).unwrap().sprite_id, 1);
        // Grass
        assert!(world.is_walkable(6 * 32, 5 * 32));
        assert_eq!(world.monster_spawns().len(), 4);
    }

    #[test]
    fn test_tile_at_uses_floor_division() {
        let world = World::new(open_map(4, 4)).unwrap();
        assert!(world.tile_at(31, 31, 0).is_some());
        assert!(world.tile_at(127, 0, 0).is_some());
        assert!(world.tile_at(128, 0, 0).is_none());
        // -1px is tile -1, not tile 0
        assert!(world.tile_at(-1, 0, 0).is_none());
        assert!(world.tile_at(0, -1, 0).is_none());
        assert!(!world.is_walkable(-1, 0));
    }

    #[test]
    fn test_tile_at_missing_layer() {
        let world = World::new(open_map(2, 2)).unwrap();
        assert!(world.tile_at(0, 0, 0).is_some());
        assert!(world.tile_at(0, 0, 1).is_none());
    }

    #[test]
    fn test_rejects_empty_dimensions() {
        let mut map = open_map(1, 1);
        map.width = 0;
        assert!(matches!(
            World::new(map),
            Err(MapError::EmptyDimensions { .. })
        ));
    }

    #[test]
    fn test_rejects_ragged_layer() {
        let mut map = open_map(3, 3);
        map.tiles[0][1].pop();
        match World::new(map) {
            Err(MapError::LayerShape { layer, columns, .. }) => {
                assert_eq!(layer, 0);
                assert_eq!(columns, 2);
            }
            other => panic!("expected LayerShape, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unwalkable_spawn() {
        let mut map = open_map(2, 2);
        map.tiles[0][0][0] = STONE_WALL;
        assert!(matches!(
            World::new(map),
            Err(MapError::UnwalkableSpawn { x: 0, y: 0 })
        ));
    }

    #[test]
    fn test_rejects_map_too_large_for_init_packet() {
        let mut map = open_map(100, 100);
        map.tiles.push(map.tiles[0].clone());

        match World::new(map) {
            Err(MapError::TooLarge { bytes, limit }) => {
                assert!(bytes > limit);
                assert_eq!(limit, MAX_MAP_BYTES);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_accepts_map_within_packet_budget() {
        let world = World::new(open_map(64, 64)).unwrap();
        assert!(bincode::serialized_size(world.map()).unwrap() <= MAX_MAP_BYTES);
        assert!(bincode::serialized_size(World::starter_town().map()).unwrap() <= MAX_MAP_BYTES);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::to_string(World::starter_town().map()).unwrap();
        let world = World::from_json(&json).unwrap();
        assert_eq!(world.map().name, "Starter Town");
        assert_eq!(world.spawn_point(), (320, 320));
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            World::from_json("not json"),
            Err(MapError::Json(_))
        ));
    }
}
